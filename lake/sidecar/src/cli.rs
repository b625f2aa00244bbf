use std::time::Duration;

use clap::Args;
use error_stack::{Result, ResultExt};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue},
    Url,
};

use crate::provider::{SidecarError, SidecarProvider, SidecarProviderOptions};

#[derive(Args, Clone, Debug)]
pub struct SidecarArgs {
    /// Substrate API sidecar URL.
    #[arg(
        long = "sidecar.url",
        env = "SIDECAR_URL",
        default_value = "http://localhost:8080"
    )]
    pub sidecar_url: String,

    /// Timeout of each request.
    #[arg(
        long = "sidecar.timeout-sec",
        env = "SIDECAR_TIMEOUT_SEC",
        default_value = "20"
    )]
    pub sidecar_timeout_sec: u64,

    /// Headers to send with the requests, formatted as `name: value`.
    #[arg(long = "sidecar.headers", env = "SIDECAR_HEADERS", value_delimiter = ',')]
    pub sidecar_headers: Vec<String>,
}

impl SidecarArgs {
    pub fn to_sidecar_provider(&self) -> Result<SidecarProvider, SidecarError> {
        let url = self
            .sidecar_url
            .parse::<Url>()
            .change_context(SidecarError::Configuration)
            .attach_printable("failed to parse sidecar URL")
            .attach_printable_lazy(|| format!("url: {}", self.sidecar_url))?;

        let mut headers = HeaderMap::default();
        for kv in self.sidecar_headers.iter() {
            let (key, value) = kv
                .split_once(':')
                .ok_or(SidecarError::Configuration)
                .attach_printable("invalid header")
                .attach_printable_lazy(|| format!("header: {}", kv))?;

            headers.insert(
                key.trim()
                    .parse::<HeaderName>()
                    .change_context(SidecarError::Configuration)
                    .attach_printable("invalid header name")
                    .attach_printable_lazy(|| format!("header name: {}", key))?,
                value
                    .trim()
                    .parse::<HeaderValue>()
                    .change_context(SidecarError::Configuration)
                    .attach_printable("invalid header value")
                    .attach_printable_lazy(|| format!("header value: {}", value))?,
            );
        }

        let options = SidecarProviderOptions {
            timeout: Duration::from_secs(self.sidecar_timeout_sec),
            headers,
        };

        Ok(SidecarProvider::new(url, options))
    }
}
