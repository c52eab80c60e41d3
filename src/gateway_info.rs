//! Gateway metadata lookup
//!
//! The manager needs the socket URL and the recommended shard count before
//! it can bring anything up. The lookup itself is an authenticated REST call
//! (`GET /gateway/bot`), done here through twilight-http.

use crate::error::GatewayError;
use futures::future::BoxFuture;

/// Result of the metadata lookup, immutable once fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayInfo {
    pub url: String,
    pub recommended_shards: u32,
}

/// Source of [`GatewayInfo`]
pub trait GatewayInfoSource: Send + Sync {
    fn gateway_info(&self) -> BoxFuture<'_, Result<GatewayInfo, GatewayError>>;
}

impl GatewayInfoSource for twilight_http::Client {
    fn gateway_info(&self) -> BoxFuture<'_, Result<GatewayInfo, GatewayError>> {
        Box::pin(async move {
            let response = self
                .gateway()
                .authed()
                .await
                .map_err(|e| GatewayError::GatewayInfo(Box::new(e)))?;
            let info = response
                .model()
                .await
                .map_err(|e| GatewayError::GatewayInfo(Box::new(e)))?;

            Ok(GatewayInfo {
                url: info.url,
                recommended_shards: info.shards,
            })
        })
    }
}

/// Fixed metadata, for pinned deployments and tests
#[derive(Debug, Clone)]
pub struct StaticGatewayInfo(pub GatewayInfo);

impl GatewayInfoSource for StaticGatewayInfo {
    fn gateway_info(&self) -> BoxFuture<'_, Result<GatewayInfo, GatewayError>> {
        let info = self.0.clone();
        Box::pin(async move { Ok(info) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_source_returns_its_info() {
        let source = StaticGatewayInfo(GatewayInfo {
            url: "wss://gateway.example".to_string(),
            recommended_shards: 3,
        });
        let info = source.gateway_info().await.unwrap();
        assert_eq!(info.url, "wss://gateway.example");
        assert_eq!(info.recommended_shards, 3);
    }
}
