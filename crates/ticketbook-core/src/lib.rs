//! ticketbook-core library.
//!
//! A local ticket manager: one [`store::RecordStore`] per category, bound to
//! a host form through [`form::FormBridge`], snapshotted through
//! [`persist::PersistenceAdapter`], and exchanged as per-ticket JSON files
//! through [`transfer`]. [`session::Session`] wires the pieces to host
//! events.

pub mod clock;
pub mod config;
pub mod error;
pub mod form;
pub mod id;
pub mod kv;
pub mod lock;
pub mod logging;
pub mod normalize;
pub mod persist;
pub mod record;
pub mod session;
pub mod store;
pub mod transfer;
pub mod view;

/// # Conventions
///
/// - **Errors**: `thiserror` enums with an [`error::ErrorCode`] per variant;
///   `anyhow::Result` only for config loading.
/// - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
pub use error::{ErrorCode, ParseError, PersistenceError, ReferenceError, TransferError};
pub use record::{FieldMap, FieldValue, Record};
pub use session::{ImportReport, Session};
pub use store::{MergeOutcome, RecordStore, StoreSettings};
