//! Application layer orchestrating the settlement core against a card store.
//!
//! `SettlementEngine` loads a snapshot, applies exactly one event through the
//! domain engines, and commits the result. Events on the same card are
//! serialized; refunds read a single consistent snapshot.

pub mod command;
pub mod engine;
