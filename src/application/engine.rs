use crate::application::command::{CardSpec, Command, Movement, MovementKind};
use crate::domain::card::{Card, CardId, CardKind, IssueTerms};
use crate::domain::event::{Consumption, RefundQuote, SettlementBranch};
use crate::domain::money::SettlementPolicy;
use crate::domain::ports::{CardStoreBox, StoredCard, TransferRecord};
use crate::domain::{refund, transfer};
use crate::error::{EscrowError, Result, SettlementError};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The main entry point for settling prepaid-card events.
///
/// `SettlementEngine` owns the card store and the settlement policy. Transfer
/// events on the same card are serialized through a per-card writer lock, and
/// each commit is additionally checked against the version the snapshot was
/// read at.
pub struct SettlementEngine {
    store: CardStoreBox,
    policy: SettlementPolicy,
    writers: Mutex<HashMap<CardId, Arc<Mutex<()>>>>,
}

impl SettlementEngine {
    /// Creates a new `SettlementEngine` instance.
    ///
    /// # Arguments
    ///
    /// * `store` - The store for card snapshots and transfer records.
    /// * `policy` - Rounding and minimum-unit rules applied to every event.
    pub fn new(store: CardStoreBox, policy: SettlementPolicy) -> Self {
        Self {
            store,
            policy,
            writers: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &SettlementPolicy {
        &self.policy
    }

    async fn writer(&self, card_id: CardId) -> Arc<Mutex<()>> {
        let mut writers = self.writers.lock().await;
        writers.entry(card_id).or_default().clone()
    }

    async fn load(&self, card_id: CardId) -> Result<StoredCard> {
        self.store
            .get(card_id)
            .await?
            .ok_or(EscrowError::CardNotFound(card_id))
    }

    /// Issues a new card and stores it at version 0.
    pub async fn issue(&self, card_id: CardId, terms: IssueTerms, spec: CardSpec) -> Result<Card> {
        let card = match spec {
            CardSpec::Count { total_count } => {
                Card::issue_count(card_id, terms, total_count, &self.policy)?
            }
            CardSpec::Days { window } => Card::issue_days(card_id, terms, window, &self.policy)?,
            CardSpec::Equity { equity_amount } => {
                Card::issue_equity(card_id, terms, equity_amount, &self.policy)?
            }
        };
        self.store.insert(card.clone()).await?;
        info!(
            card = card_id,
            kind = card.kind().as_str(),
            reserve = %card.card_reserve_amount,
            available = %card.card_available_amount,
            "card issued"
        );
        Ok(card)
    }

    /// Applies one consumption event and persists the new snapshot with its record.
    ///
    /// `at` is only checked against the validity window of day cards.
    pub async fn consume(
        &self,
        card_id: CardId,
        consumption: Consumption,
        at: Option<u64>,
    ) -> Result<TransferRecord> {
        self.serialized(card_id, at, |_| Ok(consumption)).await
    }

    /// Like [`consume`](Self::consume), reading `quantity` as units or face value
    /// according to the kind of the stored card.
    pub async fn consume_quantity(
        &self,
        card_id: CardId,
        quantity: Decimal,
        at: Option<u64>,
    ) -> Result<TransferRecord> {
        self.serialized(card_id, at, |card| {
            Ok(Consumption::for_kind(card_id, card.kind(), quantity)?)
        })
        .await
    }

    /// Runs one event under the card's writer lock. The lock is dropped from the
    /// map once the card can take no further events.
    async fn serialized(
        &self,
        card_id: CardId,
        at: Option<u64>,
        consumption: impl FnOnce(&Card) -> Result<Consumption>,
    ) -> Result<TransferRecord> {
        let writer = self.writer(card_id).await;
        let _guard = writer.lock().await;

        let result: Result<TransferRecord> = async {
            let stored = self.load(card_id).await?;
            let consumption = consumption(&stored.card)?;
            self.apply(stored, consumption, at).await
        }
        .await;

        if closes_card(&result) {
            self.writers.lock().await.remove(&card_id);
        }
        result
    }

    async fn apply(
        &self,
        stored: StoredCard,
        consumption: Consumption,
        at: Option<u64>,
    ) -> Result<TransferRecord> {
        let card_id = stored.card.id;
        if let (Some(at), Some(window)) = (at, stored.card.validity_window())
            && !window.contains(at)
        {
            return Err(SettlementError::OutsideValidityWindow {
                at,
                start: window.start_time,
                end: window.end_time,
            }
            .into());
        }

        let settled = transfer::settle(&stored.card, consumption, &self.policy)?;
        let outcome = settled.outcome;
        let record = TransferRecord {
            card: card_id,
            sequence: stored.version + 1,
            consumption,
            outcome,
        };
        let version = self
            .store
            .commit(stored.version, settled.card, record.clone())
            .await?;

        debug!(
            card = card_id,
            version,
            branch = ?outcome.branch,
            plan = %outcome.plan_amount,
            actual = %outcome.actual_amount,
            "consumption settled"
        );
        if outcome.branch == SettlementBranch::Flush {
            info!(card = card_id, actual = %outcome.actual_amount, "reserve fully released");
        }
        Ok(record)
    }

    /// Computes both cancellation amounts from the current snapshot.
    pub async fn quote_refund(&self, card_id: CardId) -> Result<RefundQuote> {
        let stored = self.load(card_id).await?;
        let quote = refund::quote(&stored.card, &self.policy)?;
        debug!(
            card = card_id,
            version = stored.version,
            consumer = %quote.consumer_refund,
            custody = %quote.custody_refund,
            "refund quoted"
        );
        Ok(quote)
    }

    /// Executes one event-log command and returns the money movements it produced.
    pub async fn process_command(&self, command: Command) -> Result<Vec<Movement>> {
        match command {
            Command::Issue { card, terms, spec } => {
                self.issue(card, terms, spec).await?;
                Ok(Vec::new())
            }
            Command::Consume { card, quantity, at } => {
                let record = self.consume_quantity(card, quantity, at).await?;
                Ok(vec![Movement {
                    card,
                    kind: MovementKind::Transfer,
                    amount: record.outcome.actual_amount,
                }])
            }
            Command::Refund { card } => {
                let quote = self.quote_refund(card).await?;
                Ok(vec![
                    Movement {
                        card,
                        kind: MovementKind::ConsumerRefund,
                        amount: quote.consumer_refund,
                    },
                    Movement {
                        card,
                        kind: MovementKind::CustodyRefund,
                        amount: quote.custody_refund,
                    },
                ])
            }
        }
    }

    pub async fn transfers(&self, card_id: CardId) -> Result<Vec<TransferRecord>> {
        self.store.transfers(card_id).await
    }

    pub async fn card_kind(&self, card_id: CardId) -> Result<CardKind> {
        Ok(self.load(card_id).await?.card.kind())
    }

    /// Consumes the engine and returns the final snapshot of every card.
    pub async fn into_results(self) -> Result<Vec<StoredCard>> {
        self.store.all_cards().await
    }
}

fn closes_card(result: &Result<TransferRecord>) -> bool {
    match result {
        Ok(record) => record.outcome.branch == SettlementBranch::Flush,
        Err(EscrowError::CardNotFound(_))
        | Err(EscrowError::Settlement(
            SettlementError::EntitlementDepleted(_) | SettlementError::ReserveExhausted(_),
        )) => true,
        Err(_) => false,
    }
}
