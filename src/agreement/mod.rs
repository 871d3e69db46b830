//! Per-category agreement computation.
//!
//! This module turns per-item label multisets into pairwise agreement
//! counts and normalizes them into one rate per category.

pub mod calculator;
pub mod error;

pub use calculator::*;
pub use error::*;
