//! Directory client: CRUD over the contacts feed with version-tag concurrency

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use http::header::{CONTENT_TYPE, IF_MATCH, IF_NONE_MATCH};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::codec::{decode_entry, decode_feed, encode_entry};
use crate::config::{DEFAULT_PROJECTION, DirectoryConfig};
use crate::error::{ContactsError, Result};
use crate::models::{Contact, FeedPage, QueryStatus};
use crate::options::{ListOption, QueryParams};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// Version tag that matches any current version.
pub const WILDCARD_ETAG: &str = "*";

/// Projection used to look up a contact before deleting it.
const THIN_PROJECTION: &str = "thin";

const GDATA_VERSION: HeaderName = HeaderName::from_static("gdata-version");
const PROTOCOL_VERSION: &str = "3.0";
const ATOM_CONTENT_TYPE: &str = "application/atom+xml";

/// Result of a (possibly conditional) fetch of one contact.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetch {
    Changed(Contact),
    /// The service answered 304: the supplied version tag is still current.
    Unchanged,
    NotFound,
}

impl Fetch {
    pub fn into_contact(self) -> Option<Contact> {
        match self {
            Self::Changed(contact) => Some(contact),
            Self::Unchanged | Self::NotFound => None,
        }
    }
}

/// Result of a full list traversal.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    /// All contacts across every page, in page order, plus the last page's status.
    Changed {
        contacts: Vec<Contact>,
        status: QueryStatus,
    },
    /// The feed still carries the supplied version tag.
    Unchanged,
}

/// Client for one domain's shared-contacts feed.
///
/// Holds no mutable state; clones share the transport and can be used from
/// several tasks at once.
#[derive(Clone)]
pub struct DirectoryClient {
    transport: Arc<dyn HttpTransport>,
    endpoint: String,
    projection: String,
}

impl DirectoryClient {
    /// Create a client for `endpoint` (e.g.
    /// `https://www.google.com/m8/feeds/contacts/example.com`).
    ///
    /// An empty default projection means `full`.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        endpoint: impl Into<String>,
        default_projection: impl Into<String>,
    ) -> Self {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let mut projection = default_projection.into();
        if projection.is_empty() {
            projection = DEFAULT_PROJECTION.to_string();
        }

        info!("Directory client initialized for: {} ({})", endpoint, projection);

        Self {
            transport,
            endpoint,
            projection,
        }
    }

    /// Create a client with a [`ReqwestTransport`] built from the config.
    pub fn from_config(config: &DirectoryConfig) -> Result<Self> {
        let transport = ReqwestTransport::from_config(config)?;
        Ok(Self::new(
            Arc::new(transport),
            config.endpoint(),
            config.default_projection.clone(),
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn default_projection(&self) -> &str {
        &self.projection
    }

    /// Create a contact. Returns the contact as stored by the service,
    /// including its id, version tag and links.
    pub async fn create(&self, contact: &Contact) -> Result<Contact> {
        let url = format!("{}/{}", self.endpoint, self.projection);
        debug!("Creating contact: {}", contact.name.full_name);

        let body = encode_entry(contact)?;
        let response = self
            .execute(Method::POST, &url, HeaderMap::new(), Some(body))
            .await?;

        match response.status {
            StatusCode::CREATED => {
                let created = decode_entry(&response.body)?;
                info!("Created contact: {}", created.id());
                Ok(created)
            }
            StatusCode::CONFLICT => {
                log_failure("create", &response);
                Err(ContactsError::VersionConflict)
            }
            status @ (StatusCode::BAD_REQUEST
            | StatusCode::UNAUTHORIZED
            | StatusCode::FORBIDDEN
            | StatusCode::NOT_FOUND) => {
                log_failure("create", &response);
                Err(ContactsError::Request(status))
            }
            status => {
                log_failure("create", &response);
                Err(ContactsError::UnexpectedStatus {
                    operation: "create",
                    status,
                })
            }
        }
    }

    /// Fetch one contact.
    ///
    /// When `etag` is given (and is neither empty nor the wildcard) the
    /// request is conditional and a 304 yields [`Fetch::Unchanged`].
    pub async fn get(
        &self,
        id: &str,
        projection: Option<&str>,
        etag: Option<&str>,
    ) -> Result<Fetch> {
        let url = format!("{}/{}/{}", self.endpoint, self.projection_or_default(projection), id);
        debug!("Fetching contact: {}", url);

        let mut headers = HeaderMap::new();
        if let Some(tag) = conditional_etag(etag) {
            headers.insert(IF_NONE_MATCH, header_value(tag)?);
        }

        let response = self.execute(Method::GET, &url, headers, None).await?;
        match response.status {
            StatusCode::OK => Ok(Fetch::Changed(decode_entry(&response.body)?)),
            StatusCode::NOT_MODIFIED => {
                debug!("Contact unchanged: {}", id);
                Ok(Fetch::Unchanged)
            }
            StatusCode::NOT_FOUND => Ok(Fetch::NotFound),
            status => {
                log_failure("get", &response);
                Err(ContactsError::UnexpectedStatus {
                    operation: "get",
                    status,
                })
            }
        }
    }

    /// List every contact, following `next` links until the last page.
    ///
    /// `etag` conditions the first page request only. If the feed changes
    /// while later pages are fetched, they reflect the newer state and the
    /// returned status carries the last page's version tag.
    pub async fn list(
        &self,
        projection: Option<&str>,
        etag: Option<&str>,
        options: &[ListOption],
    ) -> Result<Listing> {
        let mut pages = self.list_pages(projection, etag, options);
        let mut contacts = Vec::new();
        let mut status = None;

        while let Some(page) = pages.try_next().await? {
            status = Some(page.status());
            contacts.extend(page.contacts);
        }

        match status {
            Some(status) => {
                info!("Listed {} contacts", contacts.len());
                Ok(Listing::Changed { contacts, status })
            }
            None => Ok(Listing::Unchanged),
        }
    }

    /// Lazily fetch feed pages one at a time.
    ///
    /// The next page is requested only when the stream is polled past the
    /// current one; dropping the stream stops the traversal. A 304 on the
    /// first page ends the stream without yielding anything.
    pub fn list_pages<'a>(
        &'a self,
        projection: Option<&str>,
        etag: Option<&str>,
        options: &[ListOption],
    ) -> BoxStream<'a, Result<FeedPage>> {
        let first = match self.list_url(projection, options) {
            Ok(url) => PageRequest {
                url,
                if_none_match: conditional_etag(etag).map(str::to_string),
                first: true,
            },
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        stream::try_unfold(Some(first), move |next| async move {
            let Some(request) = next else {
                return Ok(None);
            };
            self.fetch_page(request).await
        })
        .boxed()
    }

    /// Lazily yield contacts across all pages, in page order.
    pub fn list_stream<'a>(
        &'a self,
        projection: Option<&str>,
        etag: Option<&str>,
        options: &[ListOption],
    ) -> BoxStream<'a, Result<Contact>> {
        self.list_pages(projection, etag, options)
            .map_ok(|page| stream::iter(page.contacts.into_iter().map(Ok::<_, ContactsError>)))
            .try_flatten()
            .boxed()
    }

    /// Replace a contact's caller-settable fields.
    ///
    /// `etag` must equal the contact's current version tag, or be
    /// [`WILDCARD_ETAG`] to overwrite unconditionally. A mismatch fails with
    /// [`ContactsError::VersionMismatch`] before anything is written.
    pub async fn update(&self, id: &str, etag: &str, contact: &Contact) -> Result<Contact> {
        debug!("Updating contact: {}", id);

        let current = self.fetch_current(id, DEFAULT_PROJECTION).await?;
        check_version(etag, current.etag())?;
        let edit_link = edit_link(id, &current)?;

        let mut headers = HeaderMap::new();
        headers.insert(IF_MATCH, header_value(etag)?);
        let body = encode_entry(contact)?;

        let response = self
            .execute(Method::PUT, edit_link, headers, Some(body))
            .await?;
        if response.status != StatusCode::OK {
            log_failure("update", &response);
            return Err(ContactsError::UnexpectedStatus {
                operation: "update",
                status: response.status,
            });
        }

        let updated = decode_entry(&response.body)?;
        info!("Updated contact: {}", id);
        Ok(updated)
    }

    /// Delete a contact. `etag` is checked the same way as for [`Self::update`].
    ///
    /// Only 200 and 204 count as success.
    pub async fn delete(&self, id: &str, etag: &str) -> Result<()> {
        debug!("Deleting contact: {}", id);

        let current = self.fetch_current(id, THIN_PROJECTION).await?;
        check_version(etag, current.etag())?;
        let edit_link = edit_link(id, &current)?;

        let mut headers = HeaderMap::new();
        headers.insert(IF_MATCH, header_value(etag)?);

        let response = self
            .execute(Method::DELETE, edit_link, headers, None)
            .await?;
        match response.status {
            StatusCode::OK | StatusCode::NO_CONTENT => {
                info!("Deleted contact: {}", id);
                Ok(())
            }
            status => {
                log_failure("delete", &response);
                Err(ContactsError::UnexpectedStatus {
                    operation: "delete",
                    status,
                })
            }
        }
    }

    fn projection_or_default<'p>(&'p self, projection: Option<&'p str>) -> &'p str {
        projection.filter(|p| !p.is_empty()).unwrap_or(&self.projection)
    }

    fn list_url(&self, projection: Option<&str>, options: &[ListOption]) -> Result<String> {
        let base = format!("{}/{}", self.endpoint, self.projection_or_default(projection));
        let mut url = Url::parse(&base)
            .map_err(|e| ContactsError::Configuration(format!("invalid endpoint {}: {}", base, e)))?;

        let params = QueryParams::from_options(options);
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter());
        }
        Ok(url.into())
    }

    async fn fetch_page(&self, request: PageRequest) -> Result<Option<(FeedPage, Option<PageRequest>)>> {
        debug!("Fetching feed page: {}", request.url);

        let mut headers = HeaderMap::new();
        if let Some(tag) = request.if_none_match.as_deref() {
            headers.insert(IF_NONE_MATCH, header_value(tag)?);
        }

        let response = self.execute(Method::GET, &request.url, headers, None).await?;
        match response.status {
            StatusCode::OK => {
                let page = decode_feed(&response.body)?;
                debug!("Feed page with {} contacts", page.contacts.len());
                let next = page.next_link.clone().map(|url| PageRequest {
                    url,
                    if_none_match: None,
                    first: false,
                });
                Ok(Some((page, next)))
            }
            StatusCode::NOT_MODIFIED if request.first => {
                debug!("Feed unchanged");
                Ok(None)
            }
            status => {
                log_failure("list", &response);
                Err(ContactsError::UnexpectedStatus {
                    operation: "list",
                    status,
                })
            }
        }
    }

    /// Unconditional fetch used before a mutation.
    async fn fetch_current(&self, id: &str, projection: &str) -> Result<Contact> {
        match self.get(id, Some(projection), None).await? {
            Fetch::Changed(contact) => Ok(contact),
            Fetch::NotFound => Err(ContactsError::ContactNotFound(id.to_string())),
            Fetch::Unchanged => Err(ContactsError::UnexpectedStatus {
                operation: "get",
                status: StatusCode::NOT_MODIFIED,
            }),
        }
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        mut headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        headers.insert(GDATA_VERSION, HeaderValue::from_static(PROTOCOL_VERSION));
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(ATOM_CONTENT_TYPE));
        }

        let mut request = HttpRequest::new(method, url);
        request.headers = headers;
        request.body = body;

        self.transport.send(request).await
    }
}

struct PageRequest {
    url: String,
    if_none_match: Option<String>,
    first: bool,
}

/// Version tag worth sending as `If-None-Match`.
fn conditional_etag(etag: Option<&str>) -> Option<&str> {
    etag.filter(|tag| !tag.is_empty() && *tag != WILDCARD_ETAG)
}

fn check_version(supplied: &str, current: &str) -> Result<()> {
    if supplied != WILDCARD_ETAG && supplied != current {
        warn!("Version mismatch: supplied {}, current {}", supplied, current);
        return Err(ContactsError::VersionMismatch {
            supplied: supplied.to_string(),
            current: current.to_string(),
        });
    }
    Ok(())
}

fn edit_link<'c>(id: &str, contact: &'c Contact) -> Result<&'c str> {
    match contact.edit_link() {
        "" => Err(ContactsError::MissingEditLink(id.to_string())),
        link => Ok(link),
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| ContactsError::InvalidHeader(format!("{:?}: {}", value, e)))
}

fn log_failure(operation: &str, response: &HttpResponse) {
    warn!(
        "{} failed: {} - {}",
        operation,
        response.status,
        String::from_utf8_lossy(&response.body)
    );
}
