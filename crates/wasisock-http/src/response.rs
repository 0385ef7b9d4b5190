//! Response parsing.
//!
//! The client reads the whole connection into memory (it always sends
//! `Connection: close`), so parsing works on one complete buffer.

use crate::HttpError;

/// A parsed HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase from the status line.
    pub reason: String,
    /// Response headers, in the order received.
    pub headers: Vec<(String, String)>,
    /// Response body, de-chunked if needed.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Parse a complete response.
    pub fn parse(raw: &[u8]) -> Result<Self, HttpError> {
        let head_end = find(raw, b"\r\n\r\n")
            .ok_or_else(|| HttpError::malformed("missing end of headers"))?;
        let head = std::str::from_utf8(&raw[..head_end])
            .map_err(|_| HttpError::malformed("headers are not valid UTF-8"))?;
        let rest = &raw[head_end + 4..];

        let mut lines = head.split("\r\n");
        let (status, reason) = parse_status_line(lines.next().unwrap_or_default())?;

        let mut headers = Vec::new();
        for line in lines {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| HttpError::malformed(format!("bad header line '{line}'")))?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let mut response = Self {
            status,
            reason,
            headers,
            body: Vec::new(),
        };

        response.body = if response.is_chunked() {
            dechunk(rest)?
        } else if let Some(len) = response.content_length() {
            rest[..len.min(rest.len())].to_vec()
        } else {
            rest.to_vec()
        };

        Ok(response)
    }

    /// First header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"))
    }

    fn content_length(&self) -> Option<usize> {
        self.header("content-length")?.parse().ok()
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_status_line(line: &str) -> Result<(u16, String), HttpError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::malformed(format!("bad status line '{line}'")));
    }

    let status = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .filter(|s| (100..1000).contains(s))
        .ok_or_else(|| HttpError::malformed(format!("bad status code in '{line}'")))?;
    let reason = parts.next().unwrap_or_default().to_string();

    Ok((status, reason))
}

/// Decode a `Transfer-Encoding: chunked` body. Trailers are ignored.
fn dechunk(mut data: &[u8]) -> Result<Vec<u8>, HttpError> {
    let mut body = Vec::new();

    loop {
        let line_end =
            find(data, b"\r\n").ok_or_else(|| HttpError::malformed("truncated chunk size"))?;
        let size_line = std::str::from_utf8(&data[..line_end])
            .map_err(|_| HttpError::malformed("chunk size is not ASCII"))?;
        // drop chunk extensions
        let size_hex = size_line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_hex, 16)
            .map_err(|_| HttpError::malformed(format!("bad chunk size '{size_hex}'")))?;
        data = &data[line_end + 2..];

        if size == 0 {
            return Ok(body);
        }
        let framed = size
            .checked_add(2)
            .filter(|framed| *framed <= data.len())
            .ok_or_else(|| HttpError::malformed("truncated chunk"))?;
        body.extend_from_slice(&data[..size]);
        data = &data[framed..];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 5\r\n\r\nhello";
        let response = HttpResponse::parse(raw).unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.reason, "OK");
        assert!(response.is_success());
        assert_eq!(response.header("content-type"), Some("text/plain"));
        assert_eq!(response.text(), "hello");
    }

    #[test]
    fn test_parse_content_length_truncates() {
        let raw = b"HTTP/1.0 404 Not Found\r\nContent-Length: 3\r\n\r\nabcdef";
        let response = HttpResponse::parse(raw).unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.reason, "Not Found");
        assert!(!response.is_success());
        assert_eq!(response.body, b"abc");
    }

    #[test]
    fn test_parse_read_to_eof() {
        let raw = b"HTTP/1.1 200 OK\r\n\r\nall of it";
        let response = HttpResponse::parse(raw).unwrap();
        assert_eq!(response.body, b"all of it");
    }

    #[test]
    fn test_parse_chunked() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
                    5\r\nhello\r\n7;ext=1\r\n, world\r\n0\r\nX-Trailer: 1\r\n\r\n";
        let response = HttpResponse::parse(raw).unwrap();
        assert_eq!(response.text(), "hello, world");
    }

    #[test]
    fn test_parse_truncated_chunk() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nA\r\nshort\r\n";
        let err = HttpResponse::parse(raw).unwrap_err();
        assert!(matches!(err, HttpError::MalformedResponse { .. }));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for raw in [
            &b"not http at all"[..],
            b"SSH-2.0-OpenSSH\r\n\r\n",
            b"HTTP/1.1 abc OK\r\n\r\n",
            b"HTTP/1.1 200 OK\r\nno-colon-here\r\n\r\n",
        ] {
            assert!(HttpResponse::parse(raw).is_err());
        }
    }

    #[test]
    fn test_empty_reason_phrase() {
        let response = HttpResponse::parse(b"HTTP/1.1 204\r\n\r\n").unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(response.reason, "");
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_chunk_size_larger_than_body() {
        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nffffffffffffffff\r\nabc\r\n0\r\n\r\n";
        let err = HttpResponse::parse(raw).unwrap_err();
        assert!(matches!(err, HttpError::MalformedResponse { .. }));

        let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n10\r\nabc\r\n0\r\n\r\n";
        assert!(HttpResponse::parse(raw).is_err());
    }
}
