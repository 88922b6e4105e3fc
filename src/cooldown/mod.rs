//! Per-category cool-down handling: the persisted next-allowed store and the
//! response-body hint parser.

pub mod hint;
pub mod store;

pub use hint::cooldown_hint;
pub use store::{CooldownStore, MemoryCooldownStore, RedbCooldownStore, StoreError};
