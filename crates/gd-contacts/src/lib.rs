//! gd-contacts: client for a domain's shared contacts feed
//!
//! This crate talks to the GData contacts API (Atom entries extended with
//! `gd:` elements) and maps entries to plain Rust values.
//!
//! ## Features
//!
//! - Bidirectional XML codec for contact entries and feeds
//! - Create, get, list, update and delete with version-tag concurrency
//! - Conditional fetches (`If-None-Match`) with an explicit "unchanged" result
//! - Lazy pagination across feed pages as a `Stream`
//! - Pluggable HTTP transport; a `reqwest` one is provided
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gd_contacts::prelude::*;
//!
//! let config = DirectoryConfig::load()?;
//! let client = DirectoryClient::from_config(&config)?;
//!
//! // Create
//! let contact = Contact::new("Elizabeth Bennet")
//!     .with_email(Email::with_rel("liz@example.com", rel::WORK).primary());
//! let created = client.create(&contact).await?;
//!
//! // List everything updated recently
//! let listing = client
//!     .list(None, None, &[ListOption::UpdatedMin(since), ListOption::ShowDeleted(true)])
//!     .await?;
//!
//! // Update, guarded by the version tag we last saw
//! let mut edited = created.editable();
//! edited.content = "Met at Netherfield".to_string();
//! client.update(created.id(), created.etag(), &edited).await?;
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod models;
pub mod options;
pub mod transport;

pub use client::{DirectoryClient, Fetch, Listing, WILDCARD_ETAG};
pub use config::{DirectoryConfig, SCOPES};
pub use error::{ContactsError, Result};
pub use models::{
    Contact, Email, ExtendedProperty, FeedPage, InstantMessage, Link, Name, PhoneNumber,
    PostalAddress, QueryStatus, mail_class, rel, usage,
};
pub use options::{ListOption, QueryParams, SortOrder};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// Re-export the common types for easy use
pub mod prelude {
    pub use super::{
        Contact, DirectoryClient, DirectoryConfig, Email, Fetch, ListOption, Listing, Name,
        PhoneNumber, PostalAddress, SortOrder, WILDCARD_ETAG, rel,
    };
}
