//! catagree - per-category inter-annotator agreement.
//!
//! Given items labeled by several annotators, computes for every observed
//! category the fraction of annotator pairs that both applied the category
//! among the pairs where at least one of them did.
//!
//! ```
//! use catagree::agreement::{compute_agreement, Rate};
//!
//! let rows = vec![vec!["spam", "spam"], vec!["spam", "ham"]];
//! let result = compute_agreement(&rows);
//!
//! assert_eq!(result.rate(&"spam"), Some(Rate::Defined(0.5)));
//! ```

pub mod agreement;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod models;
pub mod report;
pub mod simulate;
