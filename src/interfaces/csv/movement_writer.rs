use crate::application::command::{Movement, MovementKind};
use crate::domain::card::CardId;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct MovementRow {
    card: CardId,
    movement: MovementKind,
    amount: String,
}

/// Writes money movements as `card,movement,amount` CSV rows.
///
/// Amounts are printed with exactly `scale` fractional digits.
pub struct MovementWriter<W: Write> {
    writer: csv::Writer<W>,
    scale: usize,
}

impl<W: Write> MovementWriter<W> {
    pub fn new(sink: W, scale: u32) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
            scale: scale as usize,
        }
    }

    pub fn write(&mut self, movement: &Movement) -> Result<()> {
        self.writer.serialize(MovementRow {
            card: movement.card,
            movement: movement.kind,
            amount: format!("{:.*}", self.scale, movement.amount),
        })?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
