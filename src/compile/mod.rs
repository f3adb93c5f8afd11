//! Parameter compilation for queries and dashboards.
//!
//! Both compilers share one staged pipeline:
//!
//! ```text
//! raw JSON → schema → business rules → references → ids/slugs → output
//!                                                                  │
//!                           (dashboard layouts only) dashcards → link
//! ```
//!
//! # Example
//!
//! ```ignore
//! use trellis::compile::{compile_query_parameters, CompileOptions};
//! use trellis::metadata::SnapshotMetadataProvider;
//!
//! let provider = SnapshotMetadataProvider::load("metadata.json").await?;
//! let specs = serde_json::json!([
//!     {"name": "order_status", "type": "category", "default": "pending"}
//! ]);
//! let compiled = compile_query_parameters(
//!     specs.as_array().unwrap(),
//!     &provider,
//!     CompileOptions::default(),
//! )
//! .await?;
//! println!("{}", serde_json::to_string_pretty(&compiled)?);
//! ```

mod dashboard;
mod output;
mod query;

pub use dashboard::{compile_dashboard_parameters, DashboardParameterCompiler};
pub use output::{BindingTag, CompiledParameter, ParameterTarget, QueryParameters};
pub use query::{compile_query_parameters, QueryParameterCompiler};

use serde::Serialize;
use serde_json::Value;

use crate::config::Settings;
use crate::link::{LinkedDashCard, ParameterMappingLinker};
use crate::metadata::MetadataProvider;
use crate::params::{schema, Scope};
use crate::validation::CompileResult;

// ============================================================================
// Options
// ============================================================================

/// Options for compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Upper bound on concurrent metadata lookups within one stage.
    pub max_concurrent_lookups: usize,
    /// Dashboard grid width in columns.
    pub grid_width: i64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_concurrent_lookups: 8,
            grid_width: 24,
        }
    }
}

impl CompileOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_concurrent_lookups: settings.compile.max_concurrent_lookups,
            grid_width: settings.dashboard.grid_width,
        }
    }

    /// Set the lookup concurrency bound (at least 1).
    pub fn with_max_concurrent_lookups(mut self, max: usize) -> Self {
        self.max_concurrent_lookups = max.max(1);
        self
    }

    /// Set the grid width.
    pub fn with_grid_width(mut self, width: i64) -> Self {
        self.grid_width = width;
        self
    }
}

// ============================================================================
// Dashboard layout
// ============================================================================

/// Compiled dashboard parameters plus linked dashcards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardLayout {
    pub parameters: Vec<CompiledParameter>,
    pub dashcards: Vec<LinkedDashCard>,
}

/// Compile dashboard parameters, then link `dashcards` against them.
///
/// Dashcards are schema-checked before anything else runs, so a malformed
/// dashcard never costs a metadata lookup.
pub async fn compile_dashboard_layout<P: MetadataProvider + ?Sized>(
    raw_parameters: &[Value],
    raw_dashcards: &[Value],
    provider: &P,
    options: CompileOptions,
) -> CompileResult<DashboardLayout> {
    let specs = schema::parse_parameters(raw_parameters, Scope::Dashboard);
    let dashcards = schema::parse_dashcards(raw_dashcards);
    let (specs, dashcards) = match (specs, dashcards) {
        (Ok(specs), Ok(dashcards)) => (specs, dashcards),
        (Err(mut failure), Err(more)) => {
            failure.errors.extend(more.errors);
            return Err(failure);
        }
        (Err(failure), _) | (_, Err(failure)) => return Err(failure),
    };

    let parameters = DashboardParameterCompiler::new(provider, options)
        .compile_specs(&specs)
        .await?;
    let dashcards = ParameterMappingLinker::new(provider, options)
        .link(&dashcards, &parameters)
        .await?;

    Ok(DashboardLayout {
        parameters,
        dashcards,
    })
}
