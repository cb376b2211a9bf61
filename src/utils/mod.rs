//! Utility Module
//!
//! - [`time`]: platform `Instant` and the shared toon animation epoch

pub mod time;
