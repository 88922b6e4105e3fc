//! # aoc-broker
//!
//! A rate-limited outbound request broker for the Advent of Code website.
//!
//! adventofcode.com tolerates at most one request in flight at a time, and
//! each class of request (fetching puzzle input, submitting an answer,
//! checking a page) has its own cool-down that the server may extend with a
//! hint in the response body. The broker serializes all outbound calls
//! through a single worker task, persists per-category cool-downs across
//! process restarts, and hands every submitter a handle it can await for the
//! eventual result.
//!
//! ## Example
//!
//! ```no_run
//! use aoc_broker::{AocClient, RequestBroker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let broker = RequestBroker::builder().build()?;
//!     let client = AocClient::new(broker, "session=...".to_string());
//!     let input = client.download_input(2015, 1).await?;
//!     println!("{input}");
//!     Ok(())
//! }
//! ```

mod broker;
mod pending;

pub mod api;
pub mod category;
pub mod cooldown;
pub mod transport;

pub use crate::broker::{BrokerError, BrokerResult, RequestBroker, RequestBrokerBuilder};

pub use crate::pending::{CallError, CallResult, PendingRequest};

pub use crate::category::Category;

pub use crate::cooldown::{
    CooldownStore,
    MemoryCooldownStore,
    RedbCooldownStore,
    StoreError,
    cooldown_hint,
};

pub use crate::transport::{
    ReqwestTransport,
    Transport,
    TransportError,
    TransportRequest,
    TransportResponse,
};

pub use crate::api::{AocClient, ApiError, Part, SubmitStatus};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
