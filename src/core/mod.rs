/*!
 * Core Module
 * Fundamental types, limits and error handling
 */

pub mod config;
pub mod errors;
pub mod limits;
pub mod sync;
pub mod types;

// Re-export for convenience
pub use config::BusConfig;
pub use errors::*;
pub use sync::RcuCell;
pub use types::*;
