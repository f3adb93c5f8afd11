//! Validation stages and the diagnostics they produce.
//!
//! Validation is staged and fails closed. Each stage checks every item of
//! the batch and then passes or fails as a whole; a later stage never runs
//! once an earlier one has failed.
//!
//! | Stage | Module | Kind of error |
//! |---|---|---|
//! | schema | [`crate::params::schema`] | `schema_violation` |
//! | business rules | [`rules`] | `business_rule_violation` |
//! | references | [`references`] | `reference_not_found` |
//! | linking | [`crate::link`] | `mapping_unresolved` |

mod error;
pub mod references;
pub mod rules;

pub use error::*;
pub use references::ReferenceValidator;
pub use rules::{check_business_rules, Plan};
