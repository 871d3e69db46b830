//! Annotation dataset loading.
//!
//! Reads rows of labels from JSON, JSON Lines and CSV sources and
//! rejects labels that cannot act as categories.

pub mod error;
pub mod loader;

pub use error::DatasetError;
pub use loader::*;
