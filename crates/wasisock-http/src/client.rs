//! HTTP client over an injected [`SocketProvider`].

use std::time::Duration;

use tracing::{debug, info, warn};
use wasisock_core::{ConnectPolicy, DEFAULT_RECV_SIZE, Socket, SocketProvider, create_connection_with};

use crate::{HttpError, HttpRequest, HttpResponse};

/// Default response size limit (10MB).
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Blocking HTTP/1.1 client.
///
/// Every request opens a fresh connection through the provider, sends
/// `Connection: close`, and reads until the peer closes. There is no pooling,
/// no TLS and no redirect following.
///
/// # Example
///
/// ```no_run
/// use wasisock_core::StdProvider;
/// use wasisock_http::HttpClient;
///
/// let client = HttpClient::new(StdProvider::new());
/// let response = client.get("http://example.com/")?;
/// println!("{}", response.status);
/// # Ok::<(), wasisock_http::HttpError>(())
/// ```
#[derive(Debug)]
pub struct HttpClient<P> {
    provider: P,
    user_agent: String,
    timeout: Option<Duration>,
    policy: ConnectPolicy,
    max_response_bytes: usize,
}

impl<P: SocketProvider> HttpClient<P> {
    /// Create a client that opens its sockets through `provider`.
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            user_agent: concat!("wasisock/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: None,
            policy: ConnectPolicy::default(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Override the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Nominal timeout recorded on each connection.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// How resolved candidates are tried when connecting.
    #[must_use]
    pub fn with_policy(mut self, policy: ConnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Limit on the raw response size, headers included.
    #[must_use]
    pub fn with_max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    /// The provider requests go through.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Perform a `GET` request.
    pub fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        self.send(&HttpRequest::get(url)?)
    }

    /// Perform a request.
    ///
    /// The connection is closed before this returns, on success and on error.
    pub fn send(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
        let host = request.host();
        let port = request.port();

        debug!(
            method = %request.method,
            url = %request.url,
            "Executing HTTP request"
        );

        let mut socket = create_connection_with(&self.provider, (host, port), self.timeout, self.policy)?;
        let result = self.exchange(&mut socket, request);
        socket.close();

        let raw = result?;
        let response = HttpResponse::parse(&raw)?;

        info!(
            url = %request.url,
            status = response.status,
            body_size = response.body.len(),
            "HTTP request completed"
        );

        Ok(response)
    }

    fn exchange<Q: SocketProvider>(
        &self,
        socket: &mut Socket<Q>,
        request: &HttpRequest,
    ) -> Result<Vec<u8>, HttpError> {
        socket.send_all(&request.to_bytes(&self.user_agent))?;

        let mut raw = Vec::new();
        loop {
            let chunk = socket.recv(DEFAULT_RECV_SIZE)?;
            if chunk.is_empty() {
                return Ok(raw);
            }
            raw.extend_from_slice(&chunk);
            if raw.len() > self.max_response_bytes {
                warn!(
                    url = %request.url,
                    limit = self.max_response_bytes,
                    "HTTP response exceeded size limit"
                );
                return Err(HttpError::BodyTooLarge {
                    limit: self.max_response_bytes,
                });
            }
        }
    }
}
