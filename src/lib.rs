//! # Trellis
//!
//! Compiles human-authored, name-addressed filter parameters into the
//! id-addressed parameter structures a BI host persists on saved queries and
//! dashboards, and links dashboard filters to the queries placed on them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                raw parameter / dashcard JSON             │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [params::schema]
//! ┌─────────────────────────────────────────────────────────┐
//! │              ParameterSpec / DashCardSpec                │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [validation::rules + classify]
//! ┌─────────────────────────────────────────────────────────┐
//! │       Plan (classification, multiplicity, values)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [validation::references]  ◀── MetadataProvider
//! ┌─────────────────────────────────────────────────────────┐
//! │   CompiledParameter (+ BindingTag)   [ids, slug, compile]│
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [link]                    ◀── MetadataProvider
//! ┌─────────────────────────────────────────────────────────┐
//! │          LinkedDashCard { parameter_mappings }           │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Each stage collects every error it finds and the first failing stage
//! stops the pipeline, so metadata is never consulted for input that is
//! already known to be invalid.

pub mod classify;
pub mod compile;
pub mod config;
pub mod ids;
pub mod link;
pub mod metadata;
pub mod params;
pub mod slug;
pub mod validation;
pub mod values_source;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::compile::{
        compile_dashboard_layout, compile_dashboard_parameters, compile_query_parameters,
        BindingTag, CompileOptions, CompiledParameter, DashboardLayout, ParameterTarget,
        QueryParameters,
    };
    pub use crate::config::Settings;
    pub use crate::link::{link_dashcards, LinkedDashCard, ResolvedMapping};
    pub use crate::metadata::{MetadataProvider, SnapshotMetadataProvider};
    pub use crate::params::{DashCardSpec, ParameterSpec, ParameterType, Scope};
    pub use crate::validation::{CompileFailure, CompileResult, ErrorKind, ParameterError, Stage};
}
