//! Simulated Stellar-style blockchain adapter.
//!
//! Mints deterministic asset codes and transaction hashes so runs are
//! reproducible, and keeps the full event history in memory for the
//! asset-history endpoint.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, instrument};

use crate::domain::{
    AdapterError, AppError, AssetEvent, AssetMetadata, BlockchainAdapter, MintedAsset,
};

/// Issuer account used for all simulated mints
const SIMULATED_ISSUER: &str = "GWATCHLEDGERSIMISSUER";

/// In-memory simulated blockchain
pub struct SimulatedBlockchainAdapter {
    /// Event log per asset code
    events: Mutex<HashMap<String, Vec<AssetEvent>>>,
}

impl SimulatedBlockchainAdapter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: Mutex::new(HashMap::new()),
        }
    }

    /// Deterministic pseudo-hash over the operation inputs
    fn tx_hash(parts: &[&str]) -> String {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
        }
        hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_be_bytes());
        hex::encode(hasher.finalize())
    }

    fn record_event(&self, asset_code: &str, event: AssetEvent) -> Result<(), AppError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| AppError::Internal("blockchain event log poisoned".to_string()))?;
        events.entry(asset_code.to_string()).or_default().push(event);
        Ok(())
    }
}

impl Default for SimulatedBlockchainAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlockchainAdapter for SimulatedBlockchainAdapter {
    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }

    #[instrument(skip(self, metadata), fields(watch_id = metadata.watch_id))]
    async fn mint_asset(&self, metadata: &AssetMetadata) -> Result<MintedAsset, AppError> {
        let asset_code = format!("WTCH{:04}", metadata.watch_id);
        let tx_ref = Self::tx_hash(&[
            "mint",
            &asset_code,
            &metadata.serial_number,
            &metadata.owner_account,
        ]);

        self.record_event(
            &asset_code,
            AssetEvent {
                kind: "mint".to_string(),
                tx_ref,
                from_account: Some(SIMULATED_ISSUER.to_string()),
                to_account: Some(metadata.owner_account.clone()),
                at: Utc::now(),
            },
        )?;

        info!(asset_code = %asset_code, "Simulated asset minted");
        Ok(MintedAsset {
            asset_code,
            issuer: SIMULATED_ISSUER.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn transfer_asset(
        &self,
        asset_code: &str,
        from_account: &str,
        to_account: &str,
    ) -> Result<String, AppError> {
        {
            let events = self
                .events
                .lock()
                .map_err(|_| AppError::Internal("blockchain event log poisoned".to_string()))?;
            if !events.contains_key(asset_code) {
                return Err(AppError::Adapter(AdapterError::Blockchain(format!(
                    "unknown asset {}",
                    asset_code
                ))));
            }
        }

        let tx_ref = Self::tx_hash(&["transfer", asset_code, from_account, to_account]);
        self.record_event(
            asset_code,
            AssetEvent {
                kind: "transfer".to_string(),
                tx_ref: tx_ref.clone(),
                from_account: Some(from_account.to_string()),
                to_account: Some(to_account.to_string()),
                at: Utc::now(),
            },
        )?;

        info!(asset_code = %asset_code, tx_ref = %tx_ref, "Simulated asset transferred");
        Ok(tx_ref)
    }

    async fn asset_history(&self, asset_code: &str) -> Result<Vec<AssetEvent>, AppError> {
        let events = self
            .events
            .lock()
            .map_err(|_| AppError::Internal("blockchain event log poisoned".to_string()))?;
        events
            .get(asset_code)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Asset {} not found", asset_code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> AssetMetadata {
        AssetMetadata {
            watch_id: 42,
            brand: "Rolex".to_string(),
            model: "Submariner".to_string(),
            serial_number: "116610LN-9X4122".to_string(),
            owner_account: "GSTOREACCOUNT".to_string(),
        }
    }

    #[tokio::test]
    async fn test_mint_produces_stable_asset_code() {
        let adapter = SimulatedBlockchainAdapter::new();
        let minted = adapter.mint_asset(&metadata()).await.unwrap();
        assert_eq!(minted.asset_code, "WTCH0042");
        assert_eq!(minted.issuer, SIMULATED_ISSUER);
    }

    #[tokio::test]
    async fn test_transfer_requires_minted_asset() {
        let adapter = SimulatedBlockchainAdapter::new();
        let result = adapter
            .transfer_asset("WTCH9999", "GFROM", "GTO")
            .await;
        assert!(matches!(
            result,
            Err(AppError::Adapter(AdapterError::Blockchain(_)))
        ));
    }

    #[tokio::test]
    async fn test_history_records_mint_and_transfer() {
        let adapter = SimulatedBlockchainAdapter::new();
        let minted = adapter.mint_asset(&metadata()).await.unwrap();
        adapter
            .transfer_asset(&minted.asset_code, "GSTOREACCOUNT", "GBUYERACCOUNT")
            .await
            .unwrap();

        let history = adapter.asset_history(&minted.asset_code).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, "mint");
        assert_eq!(history[1].kind, "transfer");
        assert_eq!(history[1].to_account.as_deref(), Some("GBUYERACCOUNT"));
    }
}
