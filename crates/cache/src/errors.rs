//! Error handling for the cache engine
//!
//! Only hard failures are errors. Soft admission outcomes (slot already
//! written, cache frozen, size budget exhausted, disk full) surface as
//! `Ok(false)` from `put` and `Ok(None)` from `get`.

mod conversions;
mod display;
mod recovery;
mod types;

pub use types::*;
