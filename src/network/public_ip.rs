use std::{fmt::Debug, net::IpAddr};

use async_trait::async_trait;

use crate::error::Result;

/// Resolves the machine's public address as seen from the internet
#[async_trait]
pub trait PublicIpLookup: Send + Sync + Debug {
    async fn lookup(&self) -> Result<IpAddr>;
}

#[cfg(feature = "public-ip")]
pub use http::IpifyLookup;

#[cfg(feature = "public-ip")]
mod http {
    use std::{net::IpAddr, time::Duration};

    use async_trait::async_trait;
    use serde::Deserialize;

    use super::PublicIpLookup;
    use crate::error::{Error, Result};

    const DEFAULT_URL: &str = "https://api.ipify.org?format=json";
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

    #[derive(Debug, Deserialize)]
    struct IpifyResponse {
        ip: String,
    }

    /// [`PublicIpLookup`] against the ipify JSON API
    #[derive(Debug, Clone)]
    pub struct IpifyLookup {
        client: reqwest::Client,
        url: String,
    }

    impl IpifyLookup {
        pub fn new() -> Result<Self> {
            Self::with_url(DEFAULT_URL)
        }

        /// Same response format, different endpoint
        pub fn with_url(url: impl Into<String>) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .map_err(|e| Error::system(format!("failed to build HTTP client: {}", e)))?;
            Ok(Self { client, url: url.into() })
        }
    }

    fn map_err(e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(format!("public IP lookup timed out: {}", e))
        } else if e.is_decode() {
            Error::invalid_data(format!("unexpected public IP response: {}", e))
        } else {
            Error::system(format!("public IP lookup failed: {}", e))
        }
    }

    #[async_trait]
    impl PublicIpLookup for IpifyLookup {
        async fn lookup(&self) -> Result<IpAddr> {
            let response = self
                .client
                .get(&self.url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(map_err)?;
            let body: IpifyResponse = response.json().await.map_err(map_err)?;
            body.ip
                .parse()
                .map_err(|_| Error::invalid_data(format!("not an IP address: {:?}", body.ip)))
        }
    }
}
