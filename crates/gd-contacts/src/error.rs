//! Error types for gd-contacts

use http::StatusCode;
use thiserror::Error;

/// gd-contacts error type
#[derive(Error, Debug)]
pub enum ContactsError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The transport failed before a response was received.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The body was not well-formed XML.
    #[error("XML parsing error: {0}")]
    XmlParseError(String),

    /// The XML was well-formed but is not a contact entry or feed we understand.
    #[error("Format error: {0}")]
    Format(String),

    #[error("XML writing error: {0}")]
    XmlWriteError(String),

    /// The service answered HTTP 409 while creating a contact.
    #[error("Version conflict")]
    VersionConflict,

    /// The supplied version tag differs from the one currently stored.
    ///
    /// Raised locally, before any mutating request is sent.
    #[error("Version mismatch: supplied etag {supplied:?}, current etag {current:?}")]
    VersionMismatch { supplied: String, current: String },

    /// The service rejected the request (400, 401, 403 or 404).
    #[error("Request rejected: {0}")]
    Request(StatusCode),

    #[error("Unexpected HTTP status {status} from {operation}")]
    UnexpectedStatus {
        operation: &'static str,
        status: StatusCode,
    },

    #[error("Contact not found: {0}")]
    ContactNotFound(String),

    #[error("Contact {0} has no edit link")]
    MissingEditLink(String),

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

impl ContactsError {
    /// Whether this error is one of the optimistic-concurrency failures.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict | Self::VersionMismatch { .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Request(status) | Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::VersionConflict => Some(StatusCode::CONFLICT),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for ContactsError {
    fn from(e: quick_xml::Error) -> Self {
        Self::XmlParseError(e.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ContactsError {
    fn from(e: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlParseError(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ContactsError>;
