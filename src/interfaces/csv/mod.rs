//! CSV adapters: the event log read by the CLI and the ledgers it writes.

pub mod event_reader;
pub mod movement_writer;
pub mod snapshot_writer;
