//! reqwest-backed [`DavTransport`].
//!
//! Every request carries a Basic `Authorization` header; iCloud does not
//! negotiate other schemes for app-specific passwords. Server-relative URLs
//! are resolved against the configured base URL.

use reqwest::{Client, Method};
use tracing::{debug, trace, warn};

use crate::auth::basic_auth;
use crate::config::{Credentials, ICloudConfig};
use crate::error::{CalendarError, Result};
use crate::transport::{
    BoxFuture, DavRequest, DavResponse, DavTransport, Depth, PropName, PropfindResponse,
    TransportFactory,
};
use crate::xml::{parse_multistatus, propfind_body};

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";

/// HTTP transport for one set of credentials.
pub struct HttpTransport {
    client: Client,
    config: ICloudConfig,
    authorization: String,
}

impl HttpTransport {
    /// Creates a transport with its own connection pool.
    pub fn new(config: ICloudConfig, credentials: &Credentials) -> Result<Self> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                CalendarError::configuration(format!("Failed to create HTTP client: {}", e))
                    .with_source(e)
            })?;

        Ok(Self {
            client,
            config,
            authorization: basic_auth(credentials),
        })
    }

    async fn send(&self, request: DavRequest) -> Result<DavResponse> {
        let url = self.config.resolve(&request.url);
        let method = request.method.clone();

        let mut builder = self
            .client
            .request(request.method, &url)
            .header("Authorization", &self.authorization);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        trace!(method = %method, url = %url, "Sending request");

        let response = builder.send().await.map_err(|e| {
            CalendarError::network(format!("{} {} failed: {}", method, url, e)).with_source(e)
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            CalendarError::network(format!("Failed to read response: {}", e)).with_source(e)
        })?;

        debug!(method = %method, url = %url, status, "Received response");

        Ok(DavResponse::new(status, body))
    }
}

impl DavTransport for HttpTransport {
    fn request(&self, request: DavRequest) -> BoxFuture<'_, Result<DavResponse>> {
        Box::pin(self.send(request))
    }

    fn propfind<'a>(
        &'a self,
        url: &'a str,
        props: &'a [PropName],
        depth: Depth,
    ) -> BoxFuture<'a, Result<PropfindResponse>> {
        Box::pin(async move {
            let method = Method::from_bytes(b"PROPFIND")
                .map_err(|e| CalendarError::invalid_request("Invalid HTTP method").with_source(e))?;

            let request = DavRequest::new(method, url)
                .with_header("Depth", depth.as_str())
                .with_header("Content-Type", XML_CONTENT_TYPE)
                .with_body(propfind_body(props)?);

            let response = self.send(request).await?;

            if !response.is_success() {
                warn!(url = %url, status = response.status, "PROPFIND was not successful");
                return Ok(PropfindResponse::new(response.status, Vec::new()));
            }

            let resources = parse_multistatus(&response.body, props)?;
            Ok(PropfindResponse::new(response.status, resources))
        })
    }
}

/// Builds a new [`HttpTransport`] for every session operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTransportFactory;

impl TransportFactory for HttpTransportFactory {
    fn connect(
        &self,
        config: &ICloudConfig,
        credentials: &Credentials,
    ) -> Result<Box<dyn DavTransport>> {
        Ok(Box::new(HttpTransport::new(config.clone(), credentials)?))
    }
}
