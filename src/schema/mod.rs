//! Raw log input
//!
//! This module defines the per-turn record format written by the skill and the
//! log stores that load a batch of such records.

mod raw_record;
mod store;

pub use raw_record::*;
pub use store::*;
