use crate::domain::card::CardId;
use crate::domain::ports::StoredCard;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct SnapshotRow<'a> {
    card: CardId,
    kind: &'a str,
    version: u64,
    pay: String,
    arrival: String,
    card_reserve: String,
    card_available: String,
    current_reserve: String,
    cumulative_transfer: String,
    remaining_entitlement: String,
    reserve_triggered: bool,
}

/// Writes final card snapshots, one CSV row per card.
pub struct SnapshotWriter<W: Write> {
    writer: csv::Writer<W>,
    scale: usize,
}

impl<W: Write> SnapshotWriter<W> {
    pub fn new(sink: W, scale: u32) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
            scale: scale as usize,
        }
    }

    pub fn write_cards(&mut self, cards: &[StoredCard]) -> Result<()> {
        let scale = self.scale;
        for StoredCard { card, version } in cards {
            self.writer.serialize(SnapshotRow {
                card: card.id,
                kind: card.kind().as_str(),
                version: *version,
                pay: format!("{:.*}", scale, card.pay_amount),
                arrival: format!("{:.*}", scale, card.arrival_amount),
                card_reserve: format!("{:.*}", scale, card.card_reserve_amount),
                card_available: format!("{:.*}", scale, card.card_available_amount),
                current_reserve: format!("{:.*}", scale, card.current_reserve_amount),
                cumulative_transfer: format!("{:.*}", scale, card.cumulative_transfer_amount),
                remaining_entitlement: card.entitlement.remaining().normalize().to_string(),
                reserve_triggered: card.reserve_transfer_triggered,
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
