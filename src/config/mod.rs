//! Scenario configuration
//!
//! Loading and validation of scenario files: roster, task timeline, phase
//! policy and simulator tuning.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning, LoaderOptions};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
