//! Entry- and feed-level codec composed from the per-structure codecs.

use chrono::{DateTime, Utc};

use crate::error::{ContactsError, Result};
use crate::models::{
    Contact, Email, EntryMeta, ExtendedProperty, FeedPage, InstantMessage, Link, Name, PhoneNumber,
    PostalAddress,
};

use super::gd::GdStructure;
use super::xml::{Element, XmlOut};
use super::{ATOM_NS, CONTACT_TERM, GD_NS, KIND_SCHEME, link_rel};

/// Decode a single `<entry>` document into a [`Contact`].
pub fn decode_entry(xml: &[u8]) -> Result<Contact> {
    let root = Element::parse(xml)?;
    decode_entry_element(&root)
}

/// Decode one `<feed>` page.
pub fn decode_feed(xml: &[u8]) -> Result<FeedPage> {
    let root = Element::parse(xml)?;
    expect_atom_root(&root, "feed")?;

    let contacts = root
        .children
        .iter()
        .filter(|c| c.local == "entry")
        .map(decode_entry_element)
        .collect::<Result<Vec<_>>>()?;

    let next_link = links(&root)
        .into_iter()
        .find(|l| l.rel == link_rel::NEXT)
        .map(|l| l.href);

    let total_results = root
        .child("totalResults")
        .and_then(|c| c.text.trim().parse::<u64>().ok());

    Ok(FeedPage {
        etag: root.attr_or_empty("etag"),
        updated: timestamp(&root)?,
        contacts,
        next_link,
        total_results,
    })
}

/// Encode the caller-settable fields of a contact as an `<entry>` request body.
pub fn encode_entry(contact: &Contact) -> Result<Vec<u8>> {
    let mut out = XmlOut::new();
    out.start("entry", &[("xmlns", ATOM_NS), ("xmlns:gd", GD_NS)])?;
    out.empty("category", &[("scheme", KIND_SCHEME), ("term", CONTACT_TERM)])?;

    contact.name.encode(&mut out)?;
    out.text_element("content", &contact.content)?;
    encode_all(&contact.emails, &mut out)?;
    encode_all(&contact.phone_numbers, &mut out)?;
    encode_all(&contact.postal_addresses, &mut out)?;
    encode_all(&contact.ims, &mut out)?;
    for (name, value) in &contact.extended_properties {
        ExtendedProperty {
            name: name.clone(),
            value: value.clone(),
            realm: String::new(),
        }
        .encode(&mut out)?;
    }

    out.end("entry")?;
    Ok(out.into_inner())
}

fn encode_all<T: GdStructure>(items: &[T], out: &mut XmlOut) -> Result<()> {
    items.iter().try_for_each(|item| item.encode(out))
}

fn decode_entry_element(entry: &Element) -> Result<Contact> {
    expect_atom_root(entry, "entry")?;
    check_category(entry)?;

    let name = match entry.children_named(Some(GD_NS), Name::TAG).next() {
        Some(element) => Name::decode(element)?,
        None => Name::default(),
    };

    // Last pair wins when a name repeats.
    let extended_properties = decode_all::<ExtendedProperty>(entry)?
        .into_iter()
        .map(|p| (p.name, p.value))
        .collect();

    let mut meta = EntryMeta {
        id: entry.child_text("id").trim().to_string(),
        etag: entry.attr_or_empty("etag"),
        updated: timestamp(entry)?,
        deleted: entry.children_named(Some(GD_NS), "deleted").next().is_some(),
        ..Default::default()
    };
    for link in links(entry) {
        match link.rel.as_str() {
            link_rel::EDIT => meta.edit_link = link.href,
            link_rel::SELF => meta.self_link = link.href,
            link_rel::PHOTO => meta.photo_link = link.href,
            _ => {}
        }
    }

    Ok(Contact {
        name,
        emails: decode_all::<Email>(entry)?,
        phone_numbers: decode_all::<PhoneNumber>(entry)?,
        postal_addresses: decode_all::<PostalAddress>(entry)?,
        ims: decode_all::<InstantMessage>(entry)?,
        extended_properties,
        content: entry.child_text("content"),
        meta,
    })
}

fn decode_all<T: GdStructure>(parent: &Element) -> Result<Vec<T>> {
    parent
        .children_named(Some(GD_NS), T::TAG)
        .map(T::decode)
        .collect()
}

fn expect_atom_root(element: &Element, local: &str) -> Result<()> {
    let namespace_ok = element.ns.is_none() || element.ns.as_deref() == Some(ATOM_NS);
    if element.local != local || !namespace_ok {
        return Err(ContactsError::Format(format!(
            "expected Atom <{}>, found <{}> in namespace {:?}",
            local, element.local, element.ns
        )));
    }
    Ok(())
}

/// The kind category decides the entry type. A category without a scheme is
/// accepted as the kind when no `#kind` category is present.
fn check_category(entry: &Element) -> Result<()> {
    let categories: Vec<&Element> = entry
        .children
        .iter()
        .filter(|c| c.local == "category")
        .collect();

    let kind = categories
        .iter()
        .find(|c| c.attr("scheme") == Some(KIND_SCHEME))
        .or_else(|| categories.iter().find(|c| c.attr("scheme").is_none()));

    match kind.and_then(|c| c.attr("term")) {
        Some(CONTACT_TERM) => Ok(()),
        term => Err(ContactsError::Format(format!(
            "type mismatch: expected {}, got {}",
            CONTACT_TERM,
            term.unwrap_or("no kind category")
        ))),
    }
}

fn links(element: &Element) -> Vec<Link> {
    element
        .children
        .iter()
        .filter(|c| c.local == "link")
        .map(|c| Link {
            rel: c.attr_or_empty("rel"),
            link_type: c.attr_or_empty("type"),
            href: c.attr_or_empty("href"),
        })
        .collect()
}

fn timestamp(element: &Element) -> Result<Option<DateTime<Utc>>> {
    let text = element.child_text("updated");
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(text)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| ContactsError::Format(format!("invalid <updated> {:?}: {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rel;

    const ENTRY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<entry xmlns="http://www.w3.org/2005/Atom"
    xmlns:gd="http://schemas.google.com/g/2005"
    gd:etag="&quot;Qn04eTVSLyp7I2A9WxNaGEoKQAY.&quot;">
  <id>http://www.google.com/m8/feeds/contacts/example.com/base/c9012de</id>
  <updated>2008-12-10T04:45:03.331Z</updated>
  <category scheme="http://schemas.google.com/g/2005#kind"
      term="http://schemas.google.com/contact/2008#contact"/>
  <title>Fitzwilliam Darcy</title>
  <content>Owns Pemberley</content>
  <link rel="http://schemas.google.com/contacts/2008/rel#photo" type="image/*"
      href="https://www.google.com/m8/feeds/photos/media/example.com/c9012de"/>
  <link rel="self" type="application/atom+xml"
      href="https://www.google.com/m8/feeds/contacts/example.com/full/c9012de"/>
  <link rel="edit" type="application/atom+xml"
      href="https://www.google.com/m8/feeds/contacts/example.com/full/c9012de"/>
  <link rel="alternate" type="text/html" href="https://example.com/ignored"/>
  <gd:name>
    <gd:givenName>Fitzwilliam</gd:givenName>
    <gd:familyName>Darcy</gd:familyName>
    <gd:fullName>  Fitzwilliam Darcy  </gd:fullName>
  </gd:name>
  <gd:email rel="http://schemas.google.com/g/2005#work" primary="true" address="fitz@example.com"/>
  <gd:email label="Old" address="darcy@example.org"/>
  <gd:phoneNumber rel="http://schemas.google.com/g/2005#work" primary="true">
    (206)555-1212
  </gd:phoneNumber>
  <gd:phoneNumber rel="http://schemas.google.com/g/2005#home">(206)555-1213</gd:phoneNumber>
  <gd:im address="liz@gmail.com" protocol="http://schemas.google.com/g/2005#GOOGLE_TALK"
      rel="http://schemas.google.com/g/2005#home"/>
  <gd:structuredPostalAddress rel="http://schemas.google.com/g/2005#work" primary="true">
    <gd:city>Mountain View</gd:city>
    <gd:street>1600 Amphitheatre Pkwy</gd:street>
  </gd:structuredPostalAddress>
  <gd:extendedProperty name="team" value="first"/>
  <gd:extendedProperty name="floor" value="3"/>
  <gd:extendedProperty name="team" value="second"/>
</entry>"#;

    #[test]
    fn test_decode_entry() {
        let contact = decode_entry(ENTRY.as_bytes()).unwrap();

        assert_eq!(contact.id(), "c9012de");
        assert_eq!(contact.etag(), "\"Qn04eTVSLyp7I2A9WxNaGEoKQAY.\"");
        assert_eq!(
            contact.updated().unwrap().to_rfc3339(),
            "2008-12-10T04:45:03.331+00:00"
        );
        assert_eq!(contact.content, "Owns Pemberley");
        assert!(!contact.is_deleted());

        assert_eq!(contact.name.full_name, "Fitzwilliam Darcy");
        assert_eq!(contact.name.given_name, "Fitzwilliam");

        assert_eq!(contact.emails.len(), 2);
        assert_eq!(contact.emails[0].address, "fitz@example.com");
        assert!(contact.emails[0].primary);
        assert_eq!(contact.emails[1].label, "Old");

        assert_eq!(contact.phone_numbers.len(), 2);
        assert_eq!(contact.phone_numbers[0].number, "(206)555-1212");
        assert_eq!(contact.phone_numbers[1].rel, rel::HOME);

        assert_eq!(contact.ims.len(), 1);
        assert_eq!(contact.postal_addresses[0].city, "Mountain View");
        assert_eq!(contact.postal_addresses[0].rel, rel::WORK);
    }

    #[test]
    fn test_decode_entry_links() {
        let contact = decode_entry(ENTRY.as_bytes()).unwrap();
        assert_eq!(
            contact.edit_link(),
            "https://www.google.com/m8/feeds/contacts/example.com/full/c9012de"
        );
        assert_eq!(contact.self_link(), contact.edit_link());
        assert_eq!(
            contact.photo_link(),
            "https://www.google.com/m8/feeds/photos/media/example.com/c9012de"
        );
    }

    #[test]
    fn test_extended_properties_last_wins() {
        let contact = decode_entry(ENTRY.as_bytes()).unwrap();
        assert_eq!(contact.extended_properties.len(), 2);
        assert_eq!(contact.extended_properties["team"], "second");
        assert_eq!(contact.extended_properties["floor"], "3");
    }

    #[test]
    fn test_decode_minimal_entry_has_empty_sequences() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <category scheme="http://schemas.google.com/g/2005#kind" term="http://schemas.google.com/contact/2008#contact"/>
        </entry>"#;
        let contact = decode_entry(xml.as_bytes()).unwrap();
        assert!(contact.emails.is_empty());
        assert!(contact.phone_numbers.is_empty());
        assert!(contact.postal_addresses.is_empty());
        assert!(contact.ims.is_empty());
        assert!(contact.extended_properties.is_empty());
        assert!(contact.name.is_empty());
        assert!(contact.updated().is_none());
    }

    #[test]
    fn test_decode_rejects_other_kind() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <category scheme="http://schemas.google.com/g/2005#kind" term="http://schemas.google.com/g/2005#event"/>
        </entry>"#;
        let err = decode_entry(xml.as_bytes()).unwrap_err();
        match err {
            ContactsError::Format(msg) => assert!(msg.contains("type mismatch")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_kind_category_takes_precedence() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <category term="http://schemas.google.com/contact/2008#contact"/>
            <category scheme="http://schemas.google.com/g/2005#kind" term="http://schemas.google.com/g/2005#event"/>
        </entry>"#;
        assert!(matches!(
            decode_entry(xml.as_bytes()),
            Err(ContactsError::Format(_))
        ));
    }

    #[test]
    fn test_decode_ignores_contact_term_under_other_scheme() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom">
            <category scheme="http://example.com/tags" term="http://schemas.google.com/contact/2008#contact"/>
        </entry>"#;
        assert!(matches!(
            decode_entry(xml.as_bytes()),
            Err(ContactsError::Format(_))
        ));
    }

    #[test]
    fn test_decode_rejects_missing_category() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom"><id>x</id></entry>"#;
        assert!(matches!(
            decode_entry(xml.as_bytes()),
            Err(ContactsError::Format(_))
        ));
    }

    #[test]
    fn test_decode_rejects_foreign_root() {
        let xml = r#"<entry xmlns="urn:other"><category term="http://schemas.google.com/contact/2008#contact"/></entry>"#;
        assert!(matches!(
            decode_entry(xml.as_bytes()),
            Err(ContactsError::Format(_))
        ));
    }

    #[test]
    fn test_decode_malformed_xml() {
        assert!(matches!(
            decode_entry(b"<entry><id></entry>"),
            Err(ContactsError::XmlParseError(_))
        ));
    }

    #[test]
    fn test_decode_deleted_marker() {
        let xml = r#"<entry xmlns="http://www.w3.org/2005/Atom" xmlns:gd="http://schemas.google.com/g/2005">
            <category term="http://schemas.google.com/contact/2008#contact"/>
            <gd:deleted/>
        </entry>"#;
        assert!(decode_entry(xml.as_bytes()).unwrap().is_deleted());
    }

    #[test]
    fn test_encode_skips_server_fields() {
        let contact = decode_entry(ENTRY.as_bytes()).unwrap();
        let body = String::from_utf8(encode_entry(&contact).unwrap()).unwrap();

        assert!(body.starts_with(
            r#"<entry xmlns="http://www.w3.org/2005/Atom" xmlns:gd="http://schemas.google.com/g/2005">"#
        ));
        assert!(body.contains(
            r#"<category scheme="http://schemas.google.com/g/2005#kind" term="http://schemas.google.com/contact/2008#contact"/>"#
        ));
        assert!(!body.contains("<id>"));
        assert!(!body.contains("etag"));
        assert!(!body.contains("<updated>"));
        assert!(!body.contains("<link"));
        assert!(!body.contains("deleted"));
    }

    #[test]
    fn test_encode_then_decode_preserves_editable_fields() {
        let original = decode_entry(ENTRY.as_bytes()).unwrap();
        let body = encode_entry(&original).unwrap();
        let decoded = decode_entry(&body).unwrap();

        assert_eq!(decoded, original.editable());
    }

    #[test]
    fn test_multiline_extended_property_survives_encoding() {
        let contact = Contact::new("A").with_extended_property("note", "line1\nline2\tx\r");
        let body = String::from_utf8(encode_entry(&contact).unwrap()).unwrap();
        assert!(!body.contains("line1\nline2"));
        assert!(body.contains(r#"value="line1&#xA;line2&#x9;x&#xD;""#));

        let decoded = decode_entry(&encode_entry(&contact).unwrap()).unwrap();
        assert_eq!(decoded.extended_properties["note"], "line1\nline2\tx\r");
    }

    #[test]
    fn test_encode_empty_contact() {
        let body = String::from_utf8(encode_entry(&Contact::default()).unwrap()).unwrap();
        assert_eq!(
            body,
            concat!(
                r#"<entry xmlns="http://www.w3.org/2005/Atom" xmlns:gd="http://schemas.google.com/g/2005">"#,
                r#"<category scheme="http://schemas.google.com/g/2005#kind" term="http://schemas.google.com/contact/2008#contact"/>"#,
                r#"<gd:name></gd:name>"#,
                r#"</entry>"#
            )
        );
    }

    #[test]
    fn test_encode_extended_properties_in_key_order() {
        let contact = Contact::new("A")
            .with_extended_property("zeta", "1")
            .with_extended_property("alpha", "2");
        let body = String::from_utf8(encode_entry(&contact).unwrap()).unwrap();
        let alpha = body.find(r#"name="alpha""#).unwrap();
        let zeta = body.find(r#"name="zeta""#).unwrap();
        assert!(alpha < zeta);
    }

    const FEED: &str = r#"<feed xmlns="http://www.w3.org/2005/Atom"
        xmlns:openSearch="http://a9.com/-/spec/opensearch/1.1/"
        xmlns:gd="http://schemas.google.com/g/2005"
        gd:etag="W/&quot;feed-1&quot;">
      <id>example.com</id>
      <updated>2024-03-01T10:00:00.000Z</updated>
      <openSearch:totalResults>2</openSearch:totalResults>
      <link rel="self" href="https://example.com/feed"/>
      <link rel="next" href="https://example.com/feed?start-index=26"/>
      <entry gd:etag="&quot;a&quot;">
        <id>https://example.com/base/1</id>
        <category term="http://schemas.google.com/contact/2008#contact"/>
        <gd:name><gd:fullName>One</gd:fullName></gd:name>
      </entry>
      <entry gd:etag="&quot;b&quot;">
        <id>https://example.com/base/2</id>
        <category term="http://schemas.google.com/contact/2008#contact"/>
        <gd:name><gd:fullName>Two</gd:fullName></gd:name>
      </entry>
    </feed>"#;

    #[test]
    fn test_decode_feed() {
        let page = decode_feed(FEED.as_bytes()).unwrap();
        assert_eq!(page.etag, "W/\"feed-1\"");
        assert_eq!(page.total_results, Some(2));
        assert_eq!(
            page.next_link.as_deref(),
            Some("https://example.com/feed?start-index=26")
        );
        let names: Vec<&str> = page.contacts.iter().map(|c| c.name.full_name.as_str()).collect();
        assert_eq!(names, vec!["One", "Two"]);
        assert_eq!(page.contacts[1].etag(), "\"b\"");
        assert_eq!(page.status().etag, page.etag);
    }

    #[test]
    fn test_decode_feed_without_next() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><updated>2024-03-01T10:00:00Z</updated></feed>"#;
        let page = decode_feed(xml.as_bytes()).unwrap();
        assert!(page.next_link.is_none());
        assert!(page.contacts.is_empty());
        assert!(page.updated.is_some());
    }
}
