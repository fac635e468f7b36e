use crate::domain::card::CardId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures raised by the settlement core before any mutation takes place.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SettlementError {
    #[error("invalid card state: {0}")]
    InvalidCardState(String),
    #[error("card {0} reserve already fully released")]
    ReserveExhausted(CardId),
    #[error("card {card} entitlement exceeded: requested {requested}, remaining {remaining}")]
    EntitlementExceeded {
        card: CardId,
        requested: Decimal,
        remaining: Decimal,
    },
    #[error("card {0} entitlement already depleted")]
    EntitlementDepleted(CardId),
    #[error("card {0} computes a zero transfer amount per unit")]
    DegenerateTransfer(CardId),
    #[error("card {card} expects a {expected} consumption")]
    ConsumptionMismatch { card: CardId, expected: &'static str },
    #[error("consumption must be positive, got {0}")]
    NonPositiveConsumption(Decimal),
    #[error("amount {amount} has more than {scale} fractional digits")]
    ExcessPrecision { amount: Decimal, scale: u32 },
    #[error("face value {amount} is below the minimum settlable unit {minimum}")]
    BelowMinimumUnit { amount: Decimal, minimum: Decimal },
    #[error("consumption at {at} is outside validity window [{start}, {end})")]
    OutsideValidityWindow { at: u64, start: u64, end: u64 },
    #[error("invalid issuance: {0}")]
    InvalidIssuance(String),
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
    #[error("amount overflow computing {0}")]
    AmountOverflow(String),
}

#[derive(Error, Debug)]
pub enum EscrowError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("card {0} not found")]
    CardNotFound(CardId),
    #[error("card {0} already issued")]
    DuplicateCard(CardId),
    #[error("card {card} modified concurrently: expected version {expected}, found {found}")]
    VersionConflict {
        card: CardId,
        expected: u64,
        found: u64,
    },
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, EscrowError>;
