//! skillfeed/crates/sf-core/src/lib.rs
//!
//! Domain models, capability traits and remote port definitions for skillfeed.

pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
