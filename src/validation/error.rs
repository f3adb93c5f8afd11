//! Diagnostics produced by the compilation stages.

use std::fmt;

use serde::Serialize;

/// Error taxonomy shared by every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Structural or type mismatch against the declared input shape.
    SchemaViolation,
    /// Duplicate names, reserved names, illegal combinations of attributes.
    BusinessRuleViolation,
    /// A field or query referenced by a spec is absent or unusable.
    ReferenceNotFound,
    /// A named dashboard or query parameter is absent at link time.
    MappingUnresolved,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SchemaViolation => "schema_violation",
            ErrorKind::BusinessRuleViolation => "business_rule_violation",
            ErrorKind::ReferenceNotFound => "reference_not_found",
            ErrorKind::MappingUnresolved => "mapping_unresolved",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a diagnostic points at, by position in the caller's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum Location {
    Parameter { index: usize },
    Dashcard { index: usize },
    Mapping { dashcard: usize, mapping: usize },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Parameter { index } => write!(f, "parameter {}", index),
            Location::Dashcard { index } => write!(f, "dashcard {}", index),
            Location::Mapping { dashcard, mapping } => {
                write!(f, "dashcard {} mapping {}", dashcard, mapping)
            }
        }
    }
}

/// A single actionable failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterError {
    pub kind: ErrorKind,
    pub location: Location,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub message: String,
}

impl ParameterError {
    pub fn new(
        kind: ErrorKind,
        location: Location,
        name: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            location,
            name: name.map(str::to_string),
            message: message.into(),
        }
    }

    pub fn schema(index: usize, name: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::SchemaViolation,
            Location::Parameter { index },
            name,
            message,
        )
    }

    pub fn business(index: usize, name: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::BusinessRuleViolation,
            Location::Parameter { index },
            Some(name),
            message,
        )
    }

    pub fn reference(index: usize, name: &str, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::ReferenceNotFound,
            Location::Parameter { index },
            Some(name),
            message,
        )
    }

    pub fn unresolved(
        dashcard: usize,
        mapping: usize,
        name: &str,
        message: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorKind::MappingUnresolved,
            Location::Mapping { dashcard, mapping },
            Some(name),
            message,
        )
    }
}

impl fmt::Display for ParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(
                f,
                "{}: {} ({}): {}",
                self.kind, self.location, name, self.message
            ),
            None => write!(f, "{}: {}: {}", self.kind, self.location, self.message),
        }
    }
}

impl std::error::Error for ParameterError {}

/// Pipeline stage that stopped a compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Schema,
    BusinessRules,
    References,
    Linking,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Schema => write!(f, "schema"),
            Stage::BusinessRules => write!(f, "business rules"),
            Stage::References => write!(f, "references"),
            Stage::Linking => write!(f, "linking"),
        }
    }
}

/// Every error from the first stage that failed. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{stage} stage failed with {count} error(s)", count = .errors.len())]
pub struct CompileFailure {
    pub stage: Stage,
    pub errors: Vec<ParameterError>,
}

impl CompileFailure {
    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.errors.iter().map(|e| e.kind).collect()
    }
}

pub type CompileResult<T> = Result<T, CompileFailure>;

/// Collects diagnostics for one stage, then either passes or fails it as a whole.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<ParameterError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ParameterError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, errors: impl IntoIterator<Item = ParameterError>) {
        self.errors.extend(errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Close the stage: `Ok` only if nothing was recorded.
    pub fn finish(self, stage: Stage) -> CompileResult<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            tracing::warn!(%stage, errors = self.errors.len(), "stage failed");
            Err(CompileFailure {
                stage,
                errors: self.errors,
            })
        }
    }
}
