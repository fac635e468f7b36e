use crate::domain::card::{Card, CardId};
use crate::domain::ports::{CardStore, StoredCard, TransferRecord};
use crate::error::{EscrowError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing card snapshots.
pub const CF_CARDS: &str = "cards";
/// Column Family for storing transfer records, keyed by card then sequence.
pub const CF_TRANSFERS: &str = "transfers";

/// A persistent card store backed by RocksDB.
///
/// A commit writes the new snapshot and its transfer record in one `WriteBatch`,
/// and the version check before it runs under a store-wide commit lock.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families ("cards" and "transfers") exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_cards = ColumnFamilyDescriptor::new(CF_CARDS, Options::default());
        let cf_transfers = ColumnFamilyDescriptor::new(CF_TRANSFERS, Options::default());

        let db = DB::open_cf_descriptors(&opts, path, vec![cf_cards, cf_transfers])?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            EscrowError::InternalError(Box::new(std::io::Error::other(format!(
                "{name} column family not found"
            ))))
        })
    }

    fn read_card(&self, card_id: CardId) -> Result<Option<StoredCard>> {
        let cf = self.cf(CF_CARDS)?;
        self.db
            .get_cf(cf, card_id.to_be_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }
}

fn transfer_key(card_id: CardId, sequence: u64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&card_id.to_be_bytes());
    key[8..].copy_from_slice(&sequence.to_be_bytes());
    key
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| {
        EscrowError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Serialization error: {}", e),
        )))
    })
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| {
        EscrowError::InternalError(Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("Deserialization error: {}", e),
        )))
    })
}

#[async_trait]
impl CardStore for RocksDBStore {
    async fn insert(&self, card: Card) -> Result<()> {
        let _guard = self.commit_lock.lock().await;
        if self.read_card(card.id)?.is_some() {
            return Err(EscrowError::DuplicateCard(card.id));
        }
        let cf = self.cf(CF_CARDS)?;
        let id = card.id;
        let value = encode(&StoredCard { card, version: 0 })?;
        self.db.put_cf(cf, id.to_be_bytes(), value)?;
        Ok(())
    }

    async fn get(&self, card_id: CardId) -> Result<Option<StoredCard>> {
        self.read_card(card_id)
    }

    async fn commit(
        &self,
        expected_version: u64,
        card: Card,
        record: TransferRecord,
    ) -> Result<u64> {
        let _guard = self.commit_lock.lock().await;
        let card_id = card.id;
        let stored = self
            .read_card(card_id)?
            .ok_or(EscrowError::CardNotFound(card_id))?;
        if stored.version != expected_version {
            return Err(EscrowError::VersionConflict {
                card: card_id,
                expected: expected_version,
                found: stored.version,
            });
        }

        let version = expected_version + 1;
        let record = TransferRecord {
            sequence: version,
            ..record
        };
        let mut batch = WriteBatch::default();
        batch.put_cf(
            self.cf(CF_CARDS)?,
            card_id.to_be_bytes(),
            encode(&StoredCard { card, version })?,
        );
        batch.put_cf(
            self.cf(CF_TRANSFERS)?,
            transfer_key(card_id, version),
            encode(&record)?,
        );
        self.db.write(batch)?;
        Ok(version)
    }

    async fn transfers(&self, card_id: CardId) -> Result<Vec<TransferRecord>> {
        let cf = self.cf(CF_TRANSFERS)?;
        let prefix = card_id.to_be_bytes();
        let start = transfer_key(card_id, 0);
        let mut records = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&start, Direction::Forward))
        {
            let (key, value) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            records.push(decode(&value)?);
        }
        Ok(records)
    }

    async fn all_cards(&self) -> Result<Vec<StoredCard>> {
        let cf = self.cf(CF_CARDS)?;
        let mut cards = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            cards.push(decode(&value)?);
        }
        Ok(cards)
    }
}
