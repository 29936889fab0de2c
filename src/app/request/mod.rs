//! Request descriptors
//!
//! A `RequestDescriptor` is the caller-supplied, immutable description of one HTTP call:
//! endpoint, method, body, auth requirement and task kind. It is validated before any
//! network activity and consumed by the transport on submission.

pub mod body;
pub mod query;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use url::Url;

use crate::errors::{TransportError, TransportResult};

pub use body::RequestBody;
pub use query::QueryParams;

/// HTTP methods supported by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// GET and DELETE never carry a body; their parameters travel in the query string
    pub fn allows_body(&self) -> bool {
        !matches!(self, Method::Get | Method::Delete)
    }

    /// PUT and PATCH must carry a body
    pub fn requires_body(&self) -> bool {
        matches!(self, Method::Put | Method::Patch)
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which bounded queue, and which transfer primitive, handles a request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[default]
    Interactive,
    Upload,
    Download,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Interactive => "interactive",
            TaskKind::Upload => "upload",
            TaskKind::Download => "download",
        };
        f.write_str(name)
    }
}

/// Request target: a path on the configured home host, or a URL on a foreign host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    path: String,
    home: bool,
}

impl Endpoint {
    /// Path resolved against the configured base URL
    pub fn home(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            home: true,
        }
    }

    /// Absolute URL on another host; receives no client identifier headers
    pub fn foreign(url: impl Into<String>) -> Self {
        Self {
            path: url.into(),
            home: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_home(&self) -> bool {
        self.home
    }

    /// Substitute `{name}` tokens in the path template
    pub fn replacing_tokens<K, V>(mut self, tokens: &[(K, V)]) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (name, value) in tokens {
            let token = format!("{{{}}}", name.as_ref());
            self.path = self.path.replace(&token, &urlencoding::encode(value.as_ref()));
        }
        self
    }

    /// Resolve to an absolute URL
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfiguration` when a home endpoint is resolved without a base URL,
    /// or when the result is not a valid URL.
    pub fn resolve(&self, base_url: Option<&Url>) -> TransportResult<Url> {
        let joined = if self.home {
            let base = base_url.ok_or_else(|| {
                TransportError::invalid_configuration("base URL is not configured")
            })?;
            format!(
                "{}/{}",
                base.as_str().trim_end_matches('/'),
                self.path.trim_start_matches('/')
            )
        } else {
            self.path.clone()
        };

        Url::parse(&joined).map_err(|e| {
            TransportError::invalid_configuration(format!("invalid URL {}: {}", joined, e))
        })
    }
}

/// Download progress callback: `(bytes_written, total_bytes_written, total_expected)`.
/// The expected total is `-1` when the server did not announce a length.
#[derive(Clone)]
pub struct ProgressSink(Arc<dyn Fn(i64, i64, i64) + Send + Sync>);

impl ProgressSink {
    pub fn new(callback: impl Fn(i64, i64, i64) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    pub fn report(&self, bytes_written: i64, total_written: i64, total_expected: i64) {
        (self.0)(bytes_written, total_written, total_expected)
    }
}

impl fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressSink")
    }
}

/// Immutable description of one HTTP call
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub endpoint: Endpoint,
    pub method: Method,
    pub body: Option<RequestBody>,
    pub query: Option<QueryParams>,
    pub requires_auth: bool,
    pub kind: TaskKind,
    /// Upload source file
    pub file: Option<PathBuf>,
    /// Download progress callback
    pub progress: Option<ProgressSink>,
}

impl RequestDescriptor {
    /// Authenticated interactive request with no body
    pub fn new(method: Method, endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            method,
            body: None,
            query: None,
            requires_auth: true,
            kind: TaskKind::Interactive,
            file: None,
            progress: None,
        }
    }

    pub fn get(endpoint: Endpoint) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn post(endpoint: Endpoint) -> Self {
        Self::new(Method::Post, endpoint)
    }

    pub fn put(endpoint: Endpoint) -> Self {
        Self::new(Method::Put, endpoint)
    }

    pub fn patch(endpoint: Endpoint) -> Self {
        Self::new(Method::Patch, endpoint)
    }

    pub fn delete(endpoint: Endpoint) -> Self {
        Self::new(Method::Delete, endpoint)
    }

    /// Multipart upload of `file` with an optional JSON body alongside
    pub fn upload(endpoint: Endpoint, file: impl Into<PathBuf>) -> Self {
        Self {
            kind: TaskKind::Upload,
            file: Some(file.into()),
            ..Self::new(Method::Post, endpoint)
        }
    }

    /// File download through the download queue
    pub fn download(endpoint: Endpoint) -> Self {
        Self {
            kind: TaskKind::Download,
            ..Self::new(Method::Get, endpoint)
        }
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a JSON body
    ///
    /// # Errors
    ///
    /// Returns `FailedEncodingRequestBody` if the value cannot be represented as JSON.
    pub fn with_json<T: serde::Serialize + ?Sized>(self, body: &T) -> TransportResult<Self> {
        Ok(self.with_body(RequestBody::json(body)?))
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = Some(query);
        self
    }

    /// Send without an `Authorization` header and skip the refresh gate
    pub fn without_auth(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Check method/body consistency before any network activity
    ///
    /// # Errors
    ///
    /// * `UnexpectedRequestBody` - a body on GET or DELETE, or a non-JSON upload body
    /// * `MissingRequestBody` - no body on PUT or PATCH, or an upload without a file
    pub fn validate(&self) -> TransportResult<()> {
        let method = self.method.to_string();

        if self.body.is_some() && !self.method.allows_body() {
            return Err(TransportError::UnexpectedRequestBody { method });
        }

        if self.body.is_none() && self.method.requires_body() {
            return Err(TransportError::MissingRequestBody { method });
        }

        if self.kind == TaskKind::Upload {
            if self.file.is_none() {
                return Err(TransportError::MissingRequestBody { method });
            }
            if matches!(&self.body, Some(body) if !body.is_json()) {
                return Err(TransportError::UnexpectedRequestBody { method });
            }
        }

        Ok(())
    }

    /// Absolute URL including query parameters
    pub fn url(&self, base_url: Option<&Url>) -> TransportResult<Url> {
        let mut url = self.endpoint.resolve(base_url)?;
        if let Some(query) = self.query.as_ref().filter(|query| !query.is_empty()) {
            url.set_query(Some(&query.to_string()));
        }
        Ok(url)
    }
}
