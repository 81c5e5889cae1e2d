//! Database module for Nutrivance.
//!
//! Provides SQLite storage for the shared key-value area and the local
//! nutrient sample log.

mod models;
mod store;

pub use models::*;
pub use store::*;
