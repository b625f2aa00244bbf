use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use dotlake_core::{BlockSource, RawBlock, SourceError};
use error_stack::{Report, Result, ResultExt};
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client, StatusCode,
};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarError {
    Request,
    NotFound,
    DeserializeResponse,
    Timeout,
    Unauthorized,
    ServerError,
    Configuration,
}

#[derive(Debug, Clone)]
pub struct SidecarProvider {
    client: Client,
    url: String,
    options: SidecarProviderOptions,
}

#[derive(Debug, Clone)]
pub struct SidecarProviderOptions {
    /// Timeout of each request.
    pub timeout: Duration,
    /// Headers to send with the requests.
    pub headers: HeaderMap<HeaderValue>,
}

/// Head block header. Only the number is used.
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderResponse {
    pub number: HeaderNumber,
}

/// The sidecar encodes block numbers as decimal strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HeaderNumber {
    Text(String),
    Number(u64),
}

impl SidecarProvider {
    pub fn new(url: impl Into<String>, options: SidecarProviderOptions) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            url,
            options,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn get_block(&self, number: u64) -> Result<RawBlock, SidecarError> {
        self.send_request(BlockRequest::new(number)).await
    }

    pub async fn get_head_header(&self) -> Result<HeaderResponse, SidecarError> {
        self.send_request(HeadHeaderRequest).await
    }

    /// Send a GET request to the sidecar.
    #[tracing::instrument(level = "debug", skip(self))]
    async fn send_request<Req>(&self, request: Req) -> Result<Req::Response, SidecarError>
    where
        Req: SidecarRequest + Debug,
    {
        let url = format!("{}{}", self.url, request.path());
        let response = match self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .headers(self.options.headers.clone())
            .timeout(self.options.timeout)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                return Err(err)
                    .change_context(SidecarError::Timeout)
                    .attach_printable_lazy(|| format!("url: {url}"));
            }
            Err(err) => {
                return Err(err)
                    .change_context(SidecarError::Request)
                    .attach_printable_lazy(|| format!("url: {url}"));
            }
        };

        let status = response.status();
        match status {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(SidecarError::NotFound.into()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(SidecarError::Unauthorized.into())
            }
            status if status.is_server_error() => {
                return Err(Report::new(SidecarError::ServerError)
                    .attach_printable(format!("status: {status}")))
            }
            // The sidecar answers 400 for heights above the chain head.
            StatusCode::BAD_REQUEST => {
                return Err(Report::new(SidecarError::NotFound)
                    .attach_printable(format!("status: {status}")))
            }
            status => {
                return Err(Report::new(SidecarError::Request)
                    .attach_printable(format!("unexpected status: {status}")))
            }
        }

        let text_response = response
            .text()
            .await
            .change_context(SidecarError::Request)?;
        debug!(bytes = text_response.len(), "received sidecar response");

        let response = serde_json::from_str(&text_response)
            .change_context(SidecarError::DeserializeResponse)
            .attach_printable_lazy(|| format!("url: {url}"))?;

        Ok(response)
    }
}

#[async_trait]
impl BlockSource for SidecarProvider {
    async fn fetch_block(&self, number: u64) -> Result<RawBlock, SourceError> {
        self.get_block(number).await.map_err(to_source_error)
    }

    async fn head_number(&self) -> Result<u64, SourceError> {
        let header = self.get_head_header().await.map_err(to_source_error)?;
        match header.number {
            HeaderNumber::Number(number) => Ok(number),
            HeaderNumber::Text(text) => text
                .parse::<u64>()
                .change_context(SourceError::InvalidResponse)
                .attach_printable_lazy(|| format!("invalid head number {text:?}")),
        }
    }
}

fn to_source_error(report: Report<SidecarError>) -> Report<SourceError> {
    let context = match report.current_context() {
        SidecarError::NotFound => SourceError::NotFound,
        SidecarError::Request | SidecarError::Timeout | SidecarError::ServerError => {
            SourceError::Unavailable
        }
        SidecarError::DeserializeResponse
        | SidecarError::Unauthorized
        | SidecarError::Configuration => SourceError::InvalidResponse,
    };
    report.change_context(context)
}

pub trait SidecarRequest {
    type Response: serde::de::DeserializeOwned;

    fn path(&self) -> String;
}

#[derive(Debug)]
pub struct BlockRequest {
    number: u64,
}

#[derive(Debug)]
pub struct HeadHeaderRequest;

impl BlockRequest {
    pub fn new(number: u64) -> Self {
        Self { number }
    }
}

impl SidecarRequest for BlockRequest {
    type Response = RawBlock;

    fn path(&self) -> String {
        format!("/blocks/{}", self.number)
    }
}

impl SidecarRequest for HeadHeaderRequest {
    type Response = HeaderResponse;

    fn path(&self) -> String {
        "/blocks/head/header".to_string()
    }
}

impl std::fmt::Display for SidecarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SidecarError::Request => write!(f, "failed to send request"),
            SidecarError::DeserializeResponse => write!(f, "failed to deserialize response"),
            SidecarError::NotFound => write!(f, "not found"),
            SidecarError::Timeout => write!(f, "the request timed out"),
            SidecarError::Unauthorized => write!(f, "unauthorized"),
            SidecarError::ServerError => write!(f, "server error"),
            SidecarError::Configuration => write!(f, "invalid sidecar configuration"),
        }
    }
}

impl error_stack::Context for SidecarError {}

impl Default for SidecarProviderOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            headers: HeaderMap::default(),
        }
    }
}
