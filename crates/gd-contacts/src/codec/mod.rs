//! Wire codec: Atom entries and feeds with `gd:` extension elements.
//!
//! Decoding admits everything the service sends, including server-managed
//! fields (id, version tag, timestamps, links, tombstone flag). Encoding only
//! writes the caller-settable fields, since the result is always a request
//! body.

mod entry;
mod gd;
mod xml;

pub use entry::{decode_entry, decode_feed, encode_entry};
pub use gd::{GdStructure, decode_structure, encode_structure};
pub use xml::{Element, XmlOut};

/// Atom namespace.
pub const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// GData extension namespace (`gd:` prefix).
pub const GD_NS: &str = "http://schemas.google.com/g/2005";

/// Category scheme identifying the kind of an entry.
pub const KIND_SCHEME: &str = "http://schemas.google.com/g/2005#kind";

/// Category term every contact entry carries.
pub const CONTACT_TERM: &str = "http://schemas.google.com/contact/2008#contact";

/// Link relations recognised on entries and feeds.
pub mod link_rel {
    pub const EDIT: &str = "edit";
    pub const SELF: &str = "self";
    pub const NEXT: &str = "next";
    pub const PHOTO: &str = "http://schemas.google.com/contacts/2008/rel#photo";
}
