//! gRPC client implementation of `CookieDispenserClientV1`

use anyhow::Result;
use async_trait::async_trait;
use tonic::transport::Channel;

use crate::api::{CookieDispenserClientV1, CookieDispenserError, ResetSummary};
use crate::proto::cookie_service_client::CookieServiceClient;
use crate::proto::{GetCookieRequest, ResetCookiesRequest};

/// gRPC client implementation of `CookieDispenserClientV1`
#[derive(Debug, Clone)]
pub struct CookieDispenserGrpcClient {
    inner: CookieServiceClient<Channel>,
}

impl CookieDispenserGrpcClient {
    /// Connect to the `CookieService` at `uri`.
    ///
    /// # Errors
    /// Returns an error if the URI is invalid or the connection cannot be established.
    pub async fn connect(uri: impl Into<String>) -> Result<Self> {
        let uri = uri.into();
        tracing::debug!(%uri, "connecting to cookie dispenser");
        let inner = CookieServiceClient::connect(uri).await?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl CookieDispenserClientV1 for CookieDispenserGrpcClient {
    async fn get_cookie(&self, name: &str) -> Result<String, CookieDispenserError> {
        let mut client = self.inner.clone();
        let response = client
            .get_cookie(GetCookieRequest {
                name: name.to_owned(),
            })
            .await?;
        Ok(response.into_inner().msg)
    }

    async fn reset_cookies(
        &self,
        cookies_left: Option<u32>,
    ) -> Result<ResetSummary, CookieDispenserError> {
        let mut client = self.inner.clone();
        let response = client
            .reset_cookies(ResetCookiesRequest { cookies_left })
            .await?
            .into_inner();
        Ok(ResetSummary {
            previous_cookies_left: response.previous_cookies_left,
            current_cookies_left: response.current_cookies_left,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_rejects_invalid_uri() {
        assert!(CookieDispenserGrpcClient::connect("not a uri").await.is_err());
    }
}
