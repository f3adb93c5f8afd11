//! Metadata provider module.
//!
//! The compiler never talks to the host directly. Everything it needs to
//! confirm (that a field exists, that a saved query has output columns, what
//! parameters a saved query already carries) goes through a
//! [`MetadataProvider`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  MetadataProvider                    │
//! │  - get_table_fields(table_id)        references      │
//! │  - get_query_output_columns(query)   references      │
//! │  - get_query_parameters(query)       linking         │
//! └──────────────────────────────────────────────────────┘
//!                          │
//!            ┌─────────────┴─────────────┐
//!            ▼                           ▼
//!  SnapshotMetadataProvider      host API client
//!   (JSON file, CLI, tests)      (embedding application)
//! ```

mod provider;
mod snapshot;
mod types;

pub use provider::{MetadataError, MetadataProvider, MetadataResult};
pub use snapshot::SnapshotMetadataProvider;
pub use types::*;
