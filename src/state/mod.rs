//! Swap history persistence
//!
//! Executed swaps are written to SQLite so tracking survives restarts and
//! history can be listed after the fact.

mod store;

pub use store::{SwapStats, SwapStore};
