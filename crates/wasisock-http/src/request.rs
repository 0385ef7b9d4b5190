//! Request types and wire rendering.

use std::fmt;
use std::fmt::Write as _;

use url::Url;

use crate::HttpError;

/// HTTP method enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Options,
}

impl HttpMethod {
    /// The method token as sent on the request line.
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Target URL. Must use the `http` scheme.
    pub url: Url,
    /// Extra request headers.
    pub headers: Vec<(String, String)>,
    /// Request body.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Create a request, validating that `url` is usable over a plain socket.
    pub fn new(method: HttpMethod, url: &str) -> Result<Self, HttpError> {
        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if parsed.scheme() != "http" {
            return Err(HttpError::UnsupportedScheme {
                scheme: parsed.scheme().to_string(),
            });
        }
        if parsed.host_str().is_none() {
            return Err(HttpError::MissingHost {
                url: url.to_string(),
            });
        }

        Ok(Self {
            method,
            url: parsed,
            headers: Vec::new(),
            body: None,
        })
    }

    /// Shorthand for a `GET` request.
    pub fn get(url: &str) -> Result<Self, HttpError> {
        Self::new(HttpMethod::Get, url)
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Host to resolve, without IPv6 brackets.
    pub fn host(&self) -> &str {
        let host = self.url.host_str().unwrap_or_default();
        host.trim_start_matches('[').trim_end_matches(']')
    }

    /// Port to connect to; 80 unless the URL names one.
    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(80)
    }

    /// Path and query as sent on the request line.
    pub fn target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{query}", self.url.path()),
            None => self.url.path().to_string(),
        }
    }

    /// `Host` header value; the port is included only when non-default.
    fn host_header(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    /// Render the request head and body.
    ///
    /// `Host`, `Connection: close` and `User-Agent` are always sent; caller
    /// headers with the same names are dropped in favour of these.
    pub fn to_bytes(&self, user_agent: &str) -> Vec<u8> {
        let mut head = String::new();
        let _ = write!(head, "{} {} HTTP/1.1\r\n", self.method, self.target());
        let _ = write!(head, "Host: {}\r\n", self.host_header());
        head.push_str("Connection: close\r\n");
        let _ = write!(head, "User-Agent: {user_agent}\r\n");

        for (name, value) in &self.headers {
            if is_managed_header(name) {
                continue;
            }
            let _ = write!(head, "{name}: {value}\r\n");
        }

        if let Some(body) = &self.body {
            let _ = write!(head, "Content-Length: {}\r\n", body.len());
        }
        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        if let Some(body) = &self.body {
            bytes.extend_from_slice(body);
        }
        bytes
    }
}

fn is_managed_header(name: &str) -> bool {
    ["host", "connection", "user-agent", "content-length"]
        .iter()
        .any(|managed| name.eq_ignore_ascii_case(managed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(request: &HttpRequest) -> String {
        String::from_utf8(request.to_bytes("wasisock-test")).unwrap()
    }

    #[test]
    fn test_get_request_line() {
        let request = HttpRequest::get("http://example.com/").unwrap();
        let text = render(&request);

        assert!(text.starts_with("GET / HTTP/1.1\r\n"));
        assert!(text.contains("Host: example.com\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.contains("User-Agent: wasisock-test\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
        assert!(!text.contains("Content-Length"));
    }

    #[test]
    fn test_path_query_and_port() {
        let request = HttpRequest::get("http://example.com:8080/search?q=rust").unwrap();

        assert_eq!(request.host(), "example.com");
        assert_eq!(request.port(), 8080);
        assert_eq!(request.target(), "/search?q=rust");
        assert!(render(&request).contains("Host: example.com:8080\r\n"));
    }

    #[test]
    fn test_default_port() {
        let request = HttpRequest::get("http://example.com").unwrap();
        assert_eq!(request.port(), 80);
        assert_eq!(request.target(), "/");
    }

    #[test]
    fn test_body_sets_content_length() {
        let request = HttpRequest::new(HttpMethod::Post, "http://example.com/submit")
            .unwrap()
            .header("Content-Type", "text/plain")
            .header("Content-Length", "999")
            .body("hello");
        let text = render(&request);

        assert!(text.starts_with("POST /submit HTTP/1.1\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.contains("Content-Length: 5\r\n"));
        assert!(!text.contains("999"));
        assert!(text.ends_with("\r\n\r\nhello"));
    }

    #[test]
    fn test_https_rejected() {
        let err = HttpRequest::get("https://example.com/").unwrap_err();
        assert!(matches!(err, HttpError::UnsupportedScheme { scheme } if scheme == "https"));
    }

    #[test]
    fn test_invalid_url() {
        let err = HttpRequest::get("not a url").unwrap_err();
        assert!(matches!(err, HttpError::InvalidUrl { .. }));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Options.as_str(), "OPTIONS");
    }
}
