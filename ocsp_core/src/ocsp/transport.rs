use crate::ocsp::config::OcspConfig;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use snafu::{IntoError, Location, ResultExt, Snafu};
use std::future::Future;

pub const OCSP_REQUEST_CONTENT_TYPE: &str = "application/ocsp-request";
pub const OCSP_RESPONSE_CONTENT_TYPE: &str = "application/ocsp-response";

#[derive(Snafu, Debug)]
#[snafu(visibility(pub))]
pub enum TransportError {
    #[snafu(display("Invalid OCSP responder URL: {url}"))]
    InvalidUrl {
        url: String,
        source: url::ParseError,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("OCSP request to {url} failed"))]
    Request {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to read OCSP response body from {url}"))]
    Body {
        url: String,
        source: Box<dyn std::error::Error + Send + Sync>,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("Failed to build HTTP client for OCSP requests"))]
    ClientBuild {
        source: reqwest::Error,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Clone)]
pub struct HttpReply {
    pub status: StatusCode,
    pub body: Bytes,
}

/// Posts an encoded OCSP request to one responder.
///
/// Cancellation is by drop: callers race the returned future against their context and
/// abandon it, which must abort the underlying request.
pub trait OcspTransport: Send + Sync + 'static {
    fn post(
        &self,
        url: &str,
        body: Bytes,
    ) -> impl Future<Output = Result<HttpReply, TransportError>> + Send;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(config: &OcspConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .timeout(config.http_timeout)
            .connect_timeout(config.connection_timeout)
            .build()
            .context(ClientBuildSnafu)?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl OcspTransport for ReqwestTransport {
    async fn post(&self, url: &str, body: Bytes) -> Result<HttpReply, TransportError> {
        let parsed = url::Url::parse(url).context(InvalidUrlSnafu { url })?;
        let response = self
            .client
            .post(parsed)
            .header(CONTENT_TYPE, OCSP_REQUEST_CONTENT_TYPE)
            .header(ACCEPT, OCSP_RESPONSE_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| RequestSnafu { url }.into_error(e.into()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| BodySnafu { url }.into_error(e.into()))?;
        Ok(HttpReply { status, body })
    }
}
