//! HTTP blockchain adapter targeting a Horizon-style token service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::domain::{
    AdapterError, AppError, AssetEvent, AssetMetadata, BlockchainAdapter, MintedAsset,
};

/// Configuration for the Horizon-style adapter
#[derive(Debug, Clone)]
pub struct HorizonConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl HorizonConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Blockchain adapter backed by an HTTP token service
pub struct HorizonBlockchainAdapter {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct MintRequest<'a> {
    asset_code: String,
    serial_number: &'a str,
    brand: &'a str,
    model: &'a str,
    owner_account: &'a str,
}

#[derive(Debug, Deserialize)]
struct MintResponse {
    asset_code: String,
    issuer: String,
}

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    from_account: &'a str,
    to_account: &'a str,
}

#[derive(Debug, Deserialize)]
struct TransferResponse {
    tx_hash: String,
}

impl HorizonBlockchainAdapter {
    pub fn new(config: HorizonConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AppError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn map_request_error(e: reqwest::Error) -> AppError {
        if e.is_timeout() {
            AppError::Adapter(AdapterError::Timeout(e.to_string()))
        } else {
            AppError::Adapter(AdapterError::Blockchain(e.to_string()))
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => {
                Err(AppError::NotFound("asset not found on chain".to_string()))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                warn!(status = %status, body = %body, "Token service returned an error");
                Err(AppError::Adapter(AdapterError::Blockchain(format!(
                    "token service returned {}: {}",
                    status, body
                ))))
            }
        }
    }
}

#[async_trait]
impl BlockchainAdapter for HorizonBlockchainAdapter {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), AppError> {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map_err(Self::map_request_error)?;
        Self::check_status(response).await?;
        Ok(())
    }

    #[instrument(skip(self, metadata), fields(watch_id = metadata.watch_id))]
    async fn mint_asset(&self, metadata: &AssetMetadata) -> Result<MintedAsset, AppError> {
        let request = MintRequest {
            asset_code: format!("WTCH{:04}", metadata.watch_id),
            serial_number: &metadata.serial_number,
            brand: &metadata.brand,
            model: &metadata.model,
            owner_account: &metadata.owner_account,
        };

        let response = self
            .client
            .post(format!("{}/assets", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let minted: MintResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Adapter(AdapterError::Blockchain(e.to_string())))?;

        info!(asset_code = %minted.asset_code, "Asset minted via token service");
        Ok(MintedAsset {
            asset_code: minted.asset_code,
            issuer: minted.issuer,
        })
    }

    #[instrument(skip(self))]
    async fn transfer_asset(
        &self,
        asset_code: &str,
        from_account: &str,
        to_account: &str,
    ) -> Result<String, AppError> {
        let request = TransferRequest {
            from_account,
            to_account,
        };

        let response = self
            .client
            .post(format!("{}/assets/{}/transfers", self.base_url, asset_code))
            .json(&request)
            .send()
            .await
            .map_err(Self::map_request_error)?;

        let transfer: TransferResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Adapter(AdapterError::Blockchain(e.to_string())))?;

        info!(asset_code = %asset_code, tx_hash = %transfer.tx_hash, "Asset transferred via token service");
        Ok(transfer.tx_hash)
    }

    #[instrument(skip(self))]
    async fn asset_history(&self, asset_code: &str) -> Result<Vec<AssetEvent>, AppError> {
        let response = self
            .client
            .get(format!("{}/assets/{}/operations", self.base_url, asset_code))
            .send()
            .await
            .map_err(Self::map_request_error)?;

        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AppError::Adapter(AdapterError::Blockchain(e.to_string())))
    }
}
