//! Data models for the shared contacts feed

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well-known `rel` values for emails, phone numbers, IM handles and addresses.
///
/// When `OTHER` fits best, prefer setting a free-text `label` instead.
pub mod rel {
    pub const HOME: &str = "http://schemas.google.com/g/2005#home";
    pub const WORK: &str = "http://schemas.google.com/g/2005#work";
    pub const OTHER: &str = "http://schemas.google.com/g/2005#other";
    pub const MOBILE: &str = "http://schemas.google.com/g/2005#mobile";
    pub const MAIN: &str = "http://schemas.google.com/g/2005#main";
    pub const FAX: &str = "http://schemas.google.com/g/2005#fax";
    pub const HOME_FAX: &str = "http://schemas.google.com/g/2005#home_fax";
    pub const WORK_FAX: &str = "http://schemas.google.com/g/2005#work_fax";
    pub const WORK_MOBILE: &str = "http://schemas.google.com/g/2005#work_mobile";
    pub const PAGER: &str = "http://schemas.google.com/g/2005#pager";
    pub const NETMEETING: &str = "http://schemas.google.com/g/2005#netmeeting";
}

/// `mailClass` values for [`PostalAddress`].
pub mod mail_class {
    pub const BOTH: &str = "http://schemas.google.com/g/2005#both";
    pub const LETTERS: &str = "http://schemas.google.com/g/2005#letters";
    pub const PARCELS: &str = "http://schemas.google.com/g/2005#parcels";
    pub const NEITHER: &str = "http://schemas.google.com/g/2005#neither";
}

/// `usage` values for [`PostalAddress`].
pub mod usage {
    pub const GENERAL: &str = "http://schemas.google.com/g/2005#general";
    pub const LOCAL: &str = "http://schemas.google.com/g/2005#local";
}

/// A person's contact entry.
///
/// The public fields are the ones a caller may set and send back to the
/// service. Identity, version tag, timestamps and links are assigned by the
/// service and only readable through accessors.
///
/// For `emails`, `ims`, `phone_numbers` and `postal_addresses`, every entry
/// must carry either `rel` or `label`, never both and never neither. The
/// service rejects the whole entry otherwise; the client does not check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub name: Name,
    #[serde(default)]
    pub emails: Vec<Email>,
    #[serde(default)]
    pub phone_numbers: Vec<PhoneNumber>,
    #[serde(default)]
    pub postal_addresses: Vec<PostalAddress>,
    #[serde(default)]
    pub ims: Vec<InstantMessage>,
    /// Arbitrary key/value metadata. Sent as one element per pair, in key order.
    #[serde(default)]
    pub extended_properties: BTreeMap<String, String>,
    /// Free-text note.
    #[serde(default)]
    pub content: String,

    #[serde(skip)]
    pub(crate) meta: EntryMeta,
}

/// Server-managed part of an entry. Never encoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct EntryMeta {
    pub id: String,
    pub etag: String,
    pub updated: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub edit_link: String,
    pub self_link: String,
    pub photo_link: String,
}

impl Contact {
    /// Create a new contact with a full name
    pub fn new(full_name: impl Into<String>) -> Self {
        Self {
            name: Name {
                full_name: full_name.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Add an email address
    pub fn with_email(mut self, email: Email) -> Self {
        self.emails.push(email);
        self
    }

    /// Add a phone number
    pub fn with_phone(mut self, phone: PhoneNumber) -> Self {
        self.phone_numbers.push(phone);
        self
    }

    /// Add a postal address
    pub fn with_address(mut self, address: PostalAddress) -> Self {
        self.postal_addresses.push(address);
        self
    }

    /// Add an instant-message handle
    pub fn with_im(mut self, im: InstantMessage) -> Self {
        self.ims.push(im);
        self
    }

    /// Set an extended property, replacing any previous value
    pub fn with_extended_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extended_properties.insert(name.into(), value.into());
        self
    }

    /// Set the note
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Short identifier: the last path segment of the Atom id.
    pub fn id(&self) -> &str {
        match self.meta.id.rfind('/') {
            Some(idx) => &self.meta.id[idx + 1..],
            None => &self.meta.id,
        }
    }

    /// The Atom id exactly as the service sent it.
    pub fn raw_id(&self) -> &str {
        &self.meta.id
    }

    pub fn etag(&self) -> &str {
        &self.meta.etag
    }

    pub fn updated(&self) -> Option<DateTime<Utc>> {
        self.meta.updated
    }

    /// Set on tombstones returned when listing with `showdeleted=true`.
    pub fn is_deleted(&self) -> bool {
        self.meta.deleted
    }

    pub fn edit_link(&self) -> &str {
        &self.meta.edit_link
    }

    pub fn self_link(&self) -> &str {
        &self.meta.self_link
    }

    pub fn photo_link(&self) -> &str {
        &self.meta.photo_link
    }

    /// Copy of this contact with only the caller-settable fields.
    pub fn editable(&self) -> Self {
        Self {
            meta: EntryMeta::default(),
            ..self.clone()
        }
    }
}

/// Structured name. `full_name` is whitespace-trimmed on both decode and encode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name {
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub additional_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
    #[serde(default)]
    pub full_name: String,
}

impl Name {
    pub fn is_empty(&self) -> bool {
        self.given_name.is_empty()
            && self.additional_name.is_empty()
            && self.family_name.is_empty()
            && self.prefix.is_empty()
            && self.suffix.is_empty()
            && self.full_name.is_empty()
    }
}

/// Email address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub address: String,
    #[serde(default)]
    pub rel: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub display_name: String,
}

impl Email {
    /// Email classified by a well-known relation
    pub fn with_rel(address: impl Into<String>, rel: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            rel: rel.into(),
            ..Default::default()
        }
    }

    /// Email classified by a free-text label
    pub fn with_label(address: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// Phone number. The dial string is free text and may contain spaces;
/// leading and trailing whitespace is trimmed on decode and encode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    pub number: String,
    #[serde(default)]
    pub rel: String,
    #[serde(default)]
    pub label: String,
    /// `tel:` URI form of the number
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub primary: bool,
}

impl PhoneNumber {
    pub fn with_rel(number: impl Into<String>, rel: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            rel: rel.into(),
            ..Default::default()
        }
    }

    pub fn with_label(number: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            label: label.into(),
            ..Default::default()
        }
    }
}

/// Instant-message handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantMessage {
    pub address: String,
    #[serde(default)]
    pub protocol: String,
    #[serde(default)]
    pub rel: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub primary: bool,
}

impl InstantMessage {
    pub fn with_rel(address: impl Into<String>, protocol: impl Into<String>, rel: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            protocol: protocol.into(),
            rel: rel.into(),
            ..Default::default()
        }
    }
}

/// Structured postal address
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    #[serde(default)]
    pub rel: String,
    #[serde(default)]
    pub label: String,
    /// One of the [`mail_class`] values
    #[serde(default)]
    pub mail_class: String,
    /// One of the [`usage`] values
    #[serde(default)]
    pub usage: String,
    #[serde(default)]
    pub primary: bool,

    #[serde(default)]
    pub agent: String,
    #[serde(default)]
    pub house_name: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub po_box: String,
    #[serde(default)]
    pub neighborhood: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub subregion: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub formatted_address: String,
}

impl PostalAddress {
    pub fn with_rel(rel: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            ..Default::default()
        }
    }

    pub fn with_street(mut self, street: impl Into<String>) -> Self {
        self.street = street.into();
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = city.into();
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }
}

/// A single key/value pair as it appears on the wire.
///
/// [`Contact`] keeps these as a map, so `realm` is not retained there.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedProperty {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub realm: String,
}

/// Atom `<link>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    pub rel: String,
    pub link_type: String,
    pub href: String,
}

/// State of a feed after a complete listing: the last page's version tag and timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryStatus {
    pub etag: String,
    pub updated: Option<DateTime<Utc>>,
}

/// One decoded page of a contacts feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedPage {
    pub etag: String,
    pub updated: Option<DateTime<Utc>>,
    pub contacts: Vec<Contact>,
    /// `rel="next"` link, absent on the last page
    pub next_link: Option<String>,
    /// `openSearch:totalResults`, when the service reports it
    pub total_results: Option<u64>,
}

impl FeedPage {
    pub fn status(&self) -> QueryStatus {
        QueryStatus {
            etag: self.etag.clone(),
            updated: self.updated,
        }
    }
}
