use crate::domain::card::{Card, CardId};
use crate::domain::ports::{CardStore, StoredCard, TransferRecord};
use crate::error::{EscrowError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    cards: BTreeMap<CardId, StoredCard>,
    transfers: HashMap<CardId, Vec<TransferRecord>>,
}

/// A thread-safe in-memory card store.
///
/// Snapshots and transfer records live behind one `RwLock`, so a commit updates
/// both under a single write guard. Ideal for tests and one-shot replays.
#[derive(Default, Clone)]
pub struct InMemoryCardStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryCardStore {
    /// Creates a new, empty in-memory card store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CardStore for InMemoryCardStore {
    async fn insert(&self, card: Card) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.cards.contains_key(&card.id) {
            return Err(EscrowError::DuplicateCard(card.id));
        }
        tables.cards.insert(card.id, StoredCard { card, version: 0 });
        Ok(())
    }

    async fn get(&self, card_id: CardId) -> Result<Option<StoredCard>> {
        let tables = self.tables.read().await;
        Ok(tables.cards.get(&card_id).cloned())
    }

    async fn commit(
        &self,
        expected_version: u64,
        card: Card,
        record: TransferRecord,
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let card_id = card.id;
        let stored = tables
            .cards
            .get_mut(&card_id)
            .ok_or(EscrowError::CardNotFound(card_id))?;
        if stored.version != expected_version {
            return Err(EscrowError::VersionConflict {
                card: card_id,
                expected: expected_version,
                found: stored.version,
            });
        }

        let version = expected_version + 1;
        *stored = StoredCard { card, version };
        tables.transfers.entry(card_id).or_default().push(TransferRecord {
            sequence: version,
            ..record
        });
        Ok(version)
    }

    async fn transfers(&self, card_id: CardId) -> Result<Vec<TransferRecord>> {
        let tables = self.tables.read().await;
        Ok(tables.transfers.get(&card_id).cloned().unwrap_or_default())
    }

    async fn all_cards(&self) -> Result<Vec<StoredCard>> {
        let tables = self.tables.read().await;
        Ok(tables.cards.values().cloned().collect())
    }
}
