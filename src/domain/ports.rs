use super::card::{Card, CardId};
use super::event::{Consumption, TransferOutcome};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A card snapshot together with the optimistic-concurrency version it was read at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCard {
    pub card: Card,
    pub version: u64,
}

/// Money-movement record persisted alongside the snapshot it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub card: CardId,
    /// Card version written together with this record.
    pub sequence: u64,
    pub consumption: Consumption,
    pub outcome: TransferOutcome,
}

#[async_trait]
pub trait CardStore: Send + Sync {
    /// Stores a freshly issued card at version 0.
    async fn insert(&self, card: Card) -> Result<()>;
    async fn get(&self, card_id: CardId) -> Result<Option<StoredCard>>;
    /// Atomically replaces the snapshot and appends `record`, provided the stored
    /// version still equals `expected_version`. Returns the new version.
    async fn commit(&self, expected_version: u64, card: Card, record: TransferRecord)
    -> Result<u64>;
    async fn transfers(&self, card_id: CardId) -> Result<Vec<TransferRecord>>;
    async fn all_cards(&self) -> Result<Vec<StoredCard>>;
}

pub type CardStoreBox = Box<dyn CardStore>;
