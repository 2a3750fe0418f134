//! Panel Bus Wire Protocol
//!
//! This crate defines the byte-level conversation between the controller
//! and the four panel boards. Every exchange is a half-duplex transaction
//! started by the controller:
//!
//! ```text
//! controller ──► COMMAND (1B)
//! controller ◄── ACK 0xAC, COMMAND (2B)     if a command ack is expected
//! controller ──► PAYLOAD (N B)              if the request carries data
//! controller ◄── ACK 0xAC (1B)              if data was sent, no response
//! controller ◄── RESPONSE (M B)             if a response is expected
//! ```
//!
//! A command that carries no payload but expects a response skips the
//! command ack: the panel answers with the response directly.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod ack;
pub mod command;
pub mod port;
pub mod transaction;

pub use ack::{AckError, ACK, COMMAND_ACK_LEN, DATA_ACK_LEN};
pub use command::Command;
pub use port::{ComportId, InvalidPort, COMPORT_NONE, PORT_COUNT};
pub use transaction::TransactionShape;
