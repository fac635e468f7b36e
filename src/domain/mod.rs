//! Settlement core: card state, validation, and the transfer and refund engines.
//!
//! Nothing in this module performs I/O; storage is reached only through [`ports`].

pub mod card;
pub mod event;
pub mod money;
pub mod ports;
pub mod refund;
pub mod transfer;
pub mod validation;
