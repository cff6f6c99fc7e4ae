//! Encoders and decoders for the `gd:` extension elements.
//!
//! Each structure kind implements [`GdStructure`]; the entry codec composes
//! them and never looks inside a structure itself.

use crate::error::{ContactsError, Result};
use crate::models::{Email, ExtendedProperty, InstantMessage, Name, PhoneNumber, PostalAddress};

use super::xml::{Element, XmlOut, flag};

/// One `gd:` element kind: its tag and a pure encode/decode pair.
pub trait GdStructure: Sized {
    /// Local name in the `gd` namespace.
    const TAG: &'static str;

    fn decode(element: &Element) -> Result<Self>;

    fn encode(&self, out: &mut XmlOut) -> Result<()>;

    /// Prefixed tag as written on the wire.
    fn qualified_tag() -> String {
        format!("gd:{}", Self::TAG)
    }
}

/// Decode a standalone `gd:` element, e.g. `<gd:email .../>`.
///
/// The snippet does not need to declare the `gd` prefix.
pub fn decode_structure<T: GdStructure>(xml: &str) -> Result<T> {
    let wrapped = format!(r#"<wrapper xmlns:gd="{}">{}</wrapper>"#, super::GD_NS, xml);
    let root = Element::parse(wrapped.as_bytes())?;
    let element = root.children.first().ok_or_else(|| {
        ContactsError::Format(format!("expected <gd:{}>, found nothing", T::TAG))
    })?;
    if element.local != T::TAG {
        return Err(ContactsError::Format(format!(
            "expected <gd:{}>, found <{}>",
            T::TAG,
            element.local
        )));
    }
    T::decode(element)
}

/// Encode a single structure to a standalone snippet.
pub fn encode_structure<T: GdStructure>(value: &T) -> Result<String> {
    let mut out = XmlOut::new();
    value.encode(&mut out)?;
    String::from_utf8(out.into_inner()).map_err(|e| ContactsError::XmlWriteError(e.to_string()))
}

impl GdStructure for Name {
    const TAG: &'static str = "name";

    fn decode(element: &Element) -> Result<Self> {
        Ok(Self {
            given_name: element.child_text("givenName"),
            additional_name: element.child_text("additionalName"),
            family_name: element.child_text("familyName"),
            prefix: element.child_text("namePrefix"),
            suffix: element.child_text("nameSuffix"),
            full_name: element.child_text("fullName").trim().to_string(),
        })
    }

    fn encode(&self, out: &mut XmlOut) -> Result<()> {
        let tag = Self::qualified_tag();
        out.start(&tag, &[])?;
        out.text_element("gd:givenName", &self.given_name)?;
        out.text_element("gd:additionalName", &self.additional_name)?;
        out.text_element("gd:familyName", &self.family_name)?;
        out.text_element("gd:namePrefix", &self.prefix)?;
        out.text_element("gd:nameSuffix", &self.suffix)?;
        out.text_element("gd:fullName", self.full_name.trim())?;
        out.end(&tag)
    }
}

impl GdStructure for Email {
    const TAG: &'static str = "email";

    fn decode(element: &Element) -> Result<Self> {
        Ok(Self {
            address: element.attr_or_empty("address"),
            rel: element.attr_or_empty("rel"),
            label: element.attr_or_empty("label"),
            primary: element.bool_attr("primary")?,
            display_name: element.attr_or_empty("displayName"),
        })
    }

    fn encode(&self, out: &mut XmlOut) -> Result<()> {
        out.empty_with(
            &Self::qualified_tag(),
            &[("address", self.address.as_str())],
            &[
                ("rel", self.rel.as_str()),
                ("label", self.label.as_str()),
                ("primary", flag(self.primary)),
                ("displayName", self.display_name.as_str()),
            ],
        )
    }
}

impl GdStructure for PhoneNumber {
    const TAG: &'static str = "phoneNumber";

    fn decode(element: &Element) -> Result<Self> {
        Ok(Self {
            number: element.text.trim().to_string(),
            rel: element.attr_or_empty("rel"),
            label: element.attr_or_empty("label"),
            uri: element.attr_or_empty("uri"),
            primary: element.bool_attr("primary")?,
        })
    }

    fn encode(&self, out: &mut XmlOut) -> Result<()> {
        let tag = Self::qualified_tag();
        let attrs = [
            ("rel", self.rel.as_str()),
            ("label", self.label.as_str()),
            ("uri", self.uri.as_str()),
            ("primary", flag(self.primary)),
        ];
        let number = self.number.trim();
        if number.is_empty() {
            return out.empty(&tag, &attrs);
        }
        out.start(&tag, &attrs)?;
        out.text(number)?;
        out.end(&tag)
    }
}

impl GdStructure for InstantMessage {
    const TAG: &'static str = "im";

    fn decode(element: &Element) -> Result<Self> {
        Ok(Self {
            address: element.attr_or_empty("address"),
            protocol: element.attr_or_empty("protocol"),
            rel: element.attr_or_empty("rel"),
            label: element.attr_or_empty("label"),
            primary: element.bool_attr("primary")?,
        })
    }

    fn encode(&self, out: &mut XmlOut) -> Result<()> {
        out.empty_with(
            &Self::qualified_tag(),
            &[("address", self.address.as_str())],
            &[
                ("label", self.label.as_str()),
                ("rel", self.rel.as_str()),
                ("protocol", self.protocol.as_str()),
                ("primary", flag(self.primary)),
            ],
        )
    }
}

impl GdStructure for PostalAddress {
    const TAG: &'static str = "structuredPostalAddress";

    fn decode(element: &Element) -> Result<Self> {
        Ok(Self {
            rel: element.attr_or_empty("rel"),
            label: element.attr_or_empty("label"),
            mail_class: element.attr_or_empty("mailClass"),
            usage: element.attr_or_empty("usage"),
            primary: element.bool_attr("primary")?,
            agent: element.child_text("agent"),
            house_name: element.child_text("housename"),
            street: element.child_text("street"),
            po_box: element.child_text("pobox"),
            neighborhood: element.child_text("neighborhood"),
            city: element.child_text("city"),
            subregion: element.child_text("subregion"),
            region: element.child_text("region"),
            postcode: element.child_text("postcode"),
            country: element.child_text("country"),
            formatted_address: element.child_text("formattedAddress"),
        })
    }

    fn encode(&self, out: &mut XmlOut) -> Result<()> {
        let tag = Self::qualified_tag();
        out.start(
            &tag,
            &[
                ("rel", self.rel.as_str()),
                ("mailClass", self.mail_class.as_str()),
                ("usage", self.usage.as_str()),
                ("label", self.label.as_str()),
                ("primary", flag(self.primary)),
            ],
        )?;
        out.text_element("gd:agent", &self.agent)?;
        out.text_element("gd:housename", &self.house_name)?;
        out.text_element("gd:street", &self.street)?;
        out.text_element("gd:pobox", &self.po_box)?;
        out.text_element("gd:neighborhood", &self.neighborhood)?;
        out.text_element("gd:city", &self.city)?;
        out.text_element("gd:subregion", &self.subregion)?;
        out.text_element("gd:region", &self.region)?;
        out.text_element("gd:postcode", &self.postcode)?;
        out.text_element("gd:country", &self.country)?;
        out.text_element("gd:formattedAddress", &self.formatted_address)?;
        out.end(&tag)
    }
}

impl GdStructure for ExtendedProperty {
    const TAG: &'static str = "extendedProperty";

    fn decode(element: &Element) -> Result<Self> {
        Ok(Self {
            name: element.attr_or_empty("name"),
            value: element.attr_or_empty("value"),
            realm: element.attr_or_empty("realm"),
        })
    }

    fn encode(&self, out: &mut XmlOut) -> Result<()> {
        out.empty_with(
            &Self::qualified_tag(),
            &[("name", self.name.as_str())],
            &[
                ("value", self.value.as_str()),
                ("realm", self.realm.as_str()),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::GD_NS;
    use crate::models::rel;

    #[test]
    fn test_name_decode_trims_full_name() {
        let xml = r#"<gd:name>
            <gd:fullName>
                FIRST_NAME LAST_NAME
            </gd:fullName>
            <gd:givenName>FIRST_NAME</gd:givenName>
            <gd:familyName>LAST_NAME</gd:familyName>
        </gd:name>"#;

        let name: Name = decode_structure(xml).unwrap();
        assert_eq!(name.full_name, "FIRST_NAME LAST_NAME");
        assert_eq!(name.given_name, "FIRST_NAME");
        assert_eq!(name.family_name, "LAST_NAME");
        assert!(name.prefix.is_empty());
    }

    #[test]
    fn test_name_encode_omits_empty_parts() {
        let name = Name {
            full_name: "  FIRST_NAME LAST_NAME \n".to_string(),
            ..Default::default()
        };
        assert_eq!(
            encode_structure(&name).unwrap(),
            "<gd:name><gd:fullName>FIRST_NAME LAST_NAME</gd:fullName></gd:name>"
        );
    }

    #[test]
    fn test_name_round_trip() {
        let name = Name {
            given_name: "Elizabeth".to_string(),
            additional_name: "Anne".to_string(),
            family_name: "Bennet".to_string(),
            prefix: "Miss".to_string(),
            suffix: "II".to_string(),
            full_name: "Miss Elizabeth Anne Bennet II".to_string(),
        };
        let xml = encode_structure(&name).unwrap();
        assert_eq!(decode_structure::<Name>(&xml).unwrap(), name);
    }

    #[test]
    fn test_email_decode() {
        let xml = r#"<gd:email address="a@b.com" rel="http://schemas.google.com/g/2005#home" primary="true"/>"#;
        let email: Email = decode_structure(xml).unwrap();
        assert_eq!(email.address, "a@b.com");
        assert_eq!(email.rel, rel::HOME);
        assert!(email.primary);
        assert!(email.label.is_empty());
    }

    #[test]
    fn test_email_reencode_keeps_attribute_values() {
        let xml = r#"<gd:email address="a@b.com" rel="http://schemas.google.com/g/2005#home" primary="true"/>"#;
        let email: Email = decode_structure(xml).unwrap();
        let encoded = encode_structure(&email).unwrap();

        let wrapped = format!(r#"<w xmlns:gd="{}">{}</w>"#, GD_NS, encoded);
        let element = Element::parse(wrapped.as_bytes()).unwrap();
        let element = &element.children[0];
        assert_eq!(element.attr("address"), Some("a@b.com"));
        assert_eq!(element.attr("rel"), Some(rel::HOME));
        assert_eq!(element.attr("primary"), Some("true"));
        assert_eq!(element.attr("label"), None);
        assert_eq!(element.attrs.len(), 3);
    }

    #[test]
    fn test_email_with_rel_and_label_is_kept() {
        let xml = r#"<gd:email address="fubar@gmail.com" rel="http://schemas.google.com/g/2005#home" label="Personal" primary="true"></gd:email>"#;
        let email: Email = decode_structure(xml).unwrap();
        assert_eq!(email.label, "Personal");
        assert_eq!(email.rel, rel::HOME);
        assert_eq!(
            encode_structure(&email).unwrap(),
            r#"<gd:email address="fubar@gmail.com" rel="http://schemas.google.com/g/2005#home" label="Personal" primary="true"/>"#
        );
    }

    #[test]
    fn test_email_address_always_written() {
        let email = Email::default();
        assert_eq!(encode_structure(&email).unwrap(), r#"<gd:email address=""/>"#);
    }

    #[test]
    fn test_phone_number_trims_dial_string() {
        let xml = "<gd:phoneNumber rel=\"http://schemas.google.com/g/2005#work\" uri=\"tel:+1-425-555-8080;ext=52585\">\n  (425) 555-8080 ext. 52585\n</gd:phoneNumber>";
        let phone: PhoneNumber = decode_structure(xml).unwrap();
        assert_eq!(phone.number, "(425) 555-8080 ext. 52585");
        assert_eq!(phone.rel, rel::WORK);
        assert_eq!(phone.uri, "tel:+1-425-555-8080;ext=52585");
        assert!(!phone.primary);
        assert!(phone.label.is_empty());

        let encoded = encode_structure(&phone).unwrap();
        assert!(encoded.starts_with("<gd:phoneNumber"));
        assert!(encoded.contains(r#"rel="http://schemas.google.com/g/2005#work""#));
        assert!(encoded.contains(r#"uri="tel:+1-425-555-8080;ext=52585""#));
        assert!(encoded.ends_with(">(425) 555-8080 ext. 52585</gd:phoneNumber>"));
    }

    #[test]
    fn test_phone_number_encode_trims() {
        let phone = PhoneNumber::with_label("  +1 555 0100\t", "desk");
        assert_eq!(
            encode_structure(&phone).unwrap(),
            r#"<gd:phoneNumber label="desk">+1 555 0100</gd:phoneNumber>"#
        );
    }

    #[test]
    fn test_im_round_trip() {
        let im = InstantMessage {
            address: "liz@gmail.com".to_string(),
            protocol: "http://schemas.google.com/g/2005#GOOGLE_TALK".to_string(),
            rel: rel::HOME.to_string(),
            label: String::new(),
            primary: true,
        };
        let xml = encode_structure(&im).unwrap();
        assert!(!xml.contains("label="));
        assert_eq!(decode_structure::<InstantMessage>(&xml).unwrap(), im);
    }

    #[test]
    fn test_address_decode_keeps_rel() {
        let xml = r#"<gd:structuredPostalAddress rel="http://schemas.google.com/g/2005#work" primary="true" mailClass="http://schemas.google.com/g/2005#letters">
            <gd:city>Mountain View</gd:city>
            <gd:street>1600 Amphitheatre Pkwy</gd:street>
            <gd:region>CA</gd:region>
            <gd:postcode>94043</gd:postcode>
            <gd:country>United States</gd:country>
            <gd:formattedAddress>1600 Amphitheatre Pkwy Mountain View</gd:formattedAddress>
        </gd:structuredPostalAddress>"#;

        let address: PostalAddress = decode_structure(xml).unwrap();
        assert_eq!(address.rel, rel::WORK);
        assert_eq!(address.region, "CA");
        assert_eq!(address.city, "Mountain View");
        assert_eq!(address.mail_class, "http://schemas.google.com/g/2005#letters");
        assert!(address.primary);
        assert!(address.usage.is_empty());
        assert!(address.house_name.is_empty());
    }

    #[test]
    fn test_address_with_only_rel_has_no_children() {
        let address = PostalAddress::with_rel(rel::HOME);
        let xml = encode_structure(&address).unwrap();
        assert_eq!(
            xml,
            r#"<gd:structuredPostalAddress rel="http://schemas.google.com/g/2005#home"></gd:structuredPostalAddress>"#
        );
        let decoded: PostalAddress = decode_structure(&xml).unwrap();
        assert_eq!(decoded, address);
    }

    #[test]
    fn test_address_round_trip() {
        let address = PostalAddress {
            label: "Cabin".to_string(),
            usage: "http://schemas.google.com/g/2005#local".to_string(),
            agent: "c/o Jane".to_string(),
            house_name: "Birch House".to_string(),
            street: "1 Lake Rd".to_string(),
            po_box: "PO 12".to_string(),
            neighborhood: "North Shore".to_string(),
            city: "Tahoe".to_string(),
            subregion: "Placer".to_string(),
            region: "CA".to_string(),
            postcode: "96145".to_string(),
            country: "US".to_string(),
            formatted_address: "Birch House, 1 Lake Rd".to_string(),
            ..Default::default()
        };
        let xml = encode_structure(&address).unwrap();
        assert_eq!(decode_structure::<PostalAddress>(&xml).unwrap(), address);
    }

    #[test]
    fn test_extended_property_round_trip() {
        let prop = ExtendedProperty {
            name: "employee-id".to_string(),
            value: "42".to_string(),
            realm: String::new(),
        };
        let xml = encode_structure(&prop).unwrap();
        assert_eq!(xml, r#"<gd:extendedProperty name="employee-id" value="42"/>"#);
        assert_eq!(decode_structure::<ExtendedProperty>(&xml).unwrap(), prop);
    }

    #[test]
    fn test_decode_structure_rejects_wrong_tag() {
        let err = decode_structure::<Email>(r#"<gd:im address="x"/>"#).unwrap_err();
        assert!(matches!(err, ContactsError::Format(_)));
    }

    #[test]
    fn test_invalid_primary_is_format_error() {
        let err = decode_structure::<Email>(r#"<gd:email address="x" primary="yes"/>"#).unwrap_err();
        assert!(matches!(err, ContactsError::Format(_)));
    }
}
