//! Outbound response accumulator and its HTTP/1.1 serialization.

use bytes::{BufMut, BytesMut};

use super::{Headers, StatusCode};

/// A response being filled in by a handler.
///
/// Handlers receive a `&mut Response` that starts out as `200 OK` with an
/// empty body, and append to it. The worker serializes it with
/// [`to_bytes`](Self::to_bytes) once the handler returns. Connections are
/// never reused, so every response carries `Connection: close`.
///
/// ```
/// use waypost::http::{Response, StatusCode};
///
/// let mut response = Response::default();
/// response.set_header("Content-Type", "application/json");
/// response.write(r#"{"id":"#);
/// response.write("42}");
///
/// let bytes = response.to_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
/// assert!(text.contains("Content-Length: 9\r\n"));
/// assert!(text.ends_with(r#"{"id":42}"#));
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// The response produced when no route accepts a request.
    pub fn not_found() -> Self {
        let mut response = Self::new(StatusCode::NotFound);
        response.write(StatusCode::NotFound.canonical_reason());
        response
    }

    /// The response produced when a handler panics.
    pub fn internal_error() -> Self {
        let mut response = Self::new(StatusCode::InternalServerError);
        response.write(StatusCode::InternalServerError.canonical_reason());
        response
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Appends a header, keeping earlier values for the same name.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// Replaces all values of a header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Appends to the body.
    pub fn write(&mut self, chunk: impl AsRef<[u8]>) {
        self.body.extend_from_slice(chunk.as_ref());
    }

    /// Discards whatever was written so far and uses `body` instead.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        self.body = body.into();
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serializes status line, headers and body.
    ///
    /// Adds `Content-Type: text/plain; charset=utf-8` when a body is present
    /// and no content type was set. `Content-Length` and `Connection` are
    /// always written by this method; values a handler set for either are
    /// ignored.
    pub fn to_bytes(&self) -> BytesMut {
        let content_length = self.body.len();
        let mut buf = BytesMut::with_capacity(128 + self.headers.len() * 64 + content_length);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        for (name, value) in self.headers.iter() {
            if name.eq_ignore_ascii_case("content-length") || name.eq_ignore_ascii_case("connection")
            {
                continue;
            }
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }
        if content_length > 0 && !self.headers.contains("content-type") {
            buf.put(&b"Content-Type: text/plain; charset=utf-8\r\n"[..]);
        }
        buf.put(&b"Connection: close\r\n"[..]);
        buf.put(format!("Content-Length: {content_length}\r\n\r\n").as_bytes());

        buf.put(self.body.as_slice());
        buf
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::Ok)
    }
}
