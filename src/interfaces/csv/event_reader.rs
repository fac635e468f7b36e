use crate::application::command::{CardSpec, Command};
use crate::domain::card::{CardId, IssueTerms, ValidityWindow};
use crate::error::{EscrowError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    IssueCount,
    IssueDays,
    IssueEquity,
    Consume,
    Refund,
}

/// One raw row of the event log. Which columns are required depends on `type`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct EventRecord {
    pub r#type: EventType,
    pub card: CardId,
    #[serde(default)]
    pub pay: Option<Decimal>,
    #[serde(default)]
    pub arrival: Option<Decimal>,
    #[serde(default)]
    pub reserve: Option<Decimal>,
    #[serde(default)]
    pub entitlement: Option<Decimal>,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub end: Option<u64>,
    #[serde(default)]
    pub at: Option<u64>,
}

impl EventRecord {
    fn require<T>(&self, value: Option<T>, column: &str) -> Result<T> {
        value.ok_or_else(|| {
            EscrowError::ValidationError(format!(
                "{:?} row for card {} is missing `{column}`",
                self.r#type, self.card
            ))
        })
    }

    fn terms(&self) -> Result<IssueTerms> {
        Ok(IssueTerms {
            pay_amount: self.require(self.pay, "pay")?,
            arrival_amount: self.require(self.arrival, "arrival")?,
            reserve_percent: self.require(self.reserve, "reserve")?,
        })
    }
}

impl TryFrom<EventRecord> for Command {
    type Error = EscrowError;

    fn try_from(record: EventRecord) -> Result<Self> {
        let card = record.card;
        let command = match record.r#type {
            EventType::IssueCount => {
                let entitlement = record.require(record.entitlement, "entitlement")?;
                let total_count = entitlement
                    .fract()
                    .is_zero()
                    .then(|| entitlement.to_u32())
                    .flatten()
                    .ok_or_else(|| {
                        EscrowError::ValidationError(format!(
                            "count entitlement {entitlement} for card {card} is not a whole number"
                        ))
                    })?;
                Command::Issue {
                    card,
                    terms: record.terms()?,
                    spec: CardSpec::Count { total_count },
                }
            }
            EventType::IssueDays => {
                let start = record.require(record.start, "start")?;
                let end = record.require(record.end, "end")?;
                Command::Issue {
                    card,
                    terms: record.terms()?,
                    spec: CardSpec::Days {
                        window: ValidityWindow::new(start, end)?,
                    },
                }
            }
            EventType::IssueEquity => Command::Issue {
                card,
                terms: record.terms()?,
                spec: CardSpec::Equity {
                    equity_amount: record.require(record.entitlement, "entitlement")?,
                },
            },
            EventType::Consume => Command::Consume {
                card,
                quantity: record.require(record.quantity, "quantity")?,
                at: record.at,
            },
            EventType::Refund => Command::Refund { card },
        };
        Ok(command)
    }
}

/// Reads event-log commands from a CSV source.
///
/// Wraps `csv::Reader`, trimming whitespace and accepting short rows, and turns
/// every record into a [`Command`].
pub struct EventReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> EventReader<R> {
    /// Creates a new `EventReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and converts commands.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader.into_deserialize::<EventRecord>().map(|result| {
            result
                .map_err(EscrowError::from)
                .and_then(Command::try_from)
        })
    }
}
