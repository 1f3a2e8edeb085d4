//! Inbound request parsing using the [`httparse`] crate.

use std::borrow::Cow;
use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use super::{Headers, Method};

/// Errors that can occur while turning raw bytes into a [`Request`].
///
/// Workers treat every variant the same way: the connection is logged and
/// abandoned without a response.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request head is incomplete")]
    Incomplete,

    #[error("malformed request: {0}")]
    Parse(#[from] httparse::Error),
}

/// Values captured from named route parameters, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters {
    map: HashMap<String, String>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.map.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A parsed inbound request.
///
/// Built by [`Request::parse`] from the bytes of a single read. The route
/// that accepts the request fills in [`Request::parameters`].
///
/// ```
/// use waypost::http::Request;
///
/// let raw = b"GET /user/42?verbose=1 HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let request = Request::parse(raw).unwrap();
///
/// assert_eq!(request.method().as_str(), "GET");
/// assert_eq!(request.path(), "/user/42");
/// assert_eq!(request.query_string(), Some("verbose=1"));
/// assert_eq!(request.headers().get("HOST"), Some("localhost"));
/// assert!(request.parameters().is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Option<String>,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Bytes,
    parameters: Parameters,
}

impl Request {
    const MAX_HEADERS: usize = 64;

    /// Builds a request without going through the parser.
    ///
    /// Handy for exercising routes and handlers directly.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            version: 1,
            headers: Headers::new(),
            body: Bytes::new(),
            parameters: Parameters::new(),
        }
    }

    /// Parses a request head and whatever body bytes followed it in `buf`.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] if the head is not terminated by a blank line.
    /// - [`RequestError::Parse`] if the bytes are not a valid HTTP/1.x request.
    ///
    /// Header values that are not UTF-8 are kept with the offending bytes
    /// replaced by `U+FFFD`.
    pub fn parse(buf: &[u8]) -> Result<Self, RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw = httparse::Request::new(&mut headers);

        let body_offset = match raw.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        // httparse fills in all three once the head is complete.
        let (Some(method), Some(target), Some(version)) = (raw.method, raw.path, raw.version)
        else {
            return Err(RequestError::Incomplete);
        };

        let method = method.parse::<Method>().unwrap_or_else(|never| match never {});
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path.to_owned(), Some(query.to_owned())),
            None => (target.to_owned(), None),
        };

        let mut header_map = Headers::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            let value = String::from_utf8_lossy(header.value);
            if let Cow::Owned(_) = value {
                debug!(header = header.name, "header value is not valid UTF-8");
            }
            header_map.insert(header.name, value);
        }

        Ok(Self {
            method,
            path,
            query,
            version,
            headers: header_map,
            body: Bytes::copy_from_slice(&buf[body_offset..]),
            parameters: Parameters::new(),
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request target without its query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string without the leading `?`, if any.
    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Body bytes received in the same read as the head.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Named route parameters captured while matching.
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Shorthand for `self.parameters().get(name)`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.parameters.get(name)
    }

    pub(crate) fn set_parameter(&mut self, name: &str, value: &str) {
        self.parameters.insert(name, value);
    }
}
