//! Shared data model for Jirai content tables.

pub mod defs;
pub mod table;
pub mod validate;

pub use defs::*;
pub use table::*;
pub use validate::{ValidationError, validate_tables};
