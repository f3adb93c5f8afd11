//! Opaque parameter identifiers.
//!
//! Id formats are part of the host's persistence contract: query-scoped
//! parameters carry a UUID v4, dashboard-scoped parameters an 8-character
//! mixed-case alphanumeric token.

use std::collections::HashSet;

use rand::distr::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use crate::params::Scope;

/// Length of a dashboard parameter id.
pub const SHORT_ID_LEN: usize = 8;

/// Fresh random id in the format used by `scope`.
///
/// Both generators draw from cryptographically secure sources: `Uuid::new_v4`
/// uses the OS generator and `rand::rng` is a reseeding CSPRNG.
pub fn generate(scope: Scope) -> String {
    match scope {
        Scope::Query => Uuid::new_v4().to_string(),
        Scope::Dashboard => rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SHORT_ID_LEN)
            .map(char::from)
            .collect(),
    }
}

/// Hands out ids that are unique within one compilation batch.
pub struct IdAllocator {
    scope: Scope,
    taken: HashSet<String>,
    generator: Box<dyn FnMut() -> String + Send>,
}

impl IdAllocator {
    pub fn new(scope: Scope) -> Self {
        Self::with_generator(scope, move || generate(scope))
    }

    /// Allocator drawing candidates from `generator` instead of the RNG.
    pub fn with_generator(scope: Scope, generator: impl FnMut() -> String + Send + 'static) -> Self {
        Self {
            scope,
            taken: HashSet::new(),
            generator: Box::new(generator),
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Mark a caller-supplied id as used. Returns `false` if it already was.
    pub fn reserve(&mut self, id: &str) -> bool {
        self.taken.insert(id.to_string())
    }

    /// Next id not yet handed out or reserved in this batch.
    pub fn allocate(&mut self) -> String {
        loop {
            let candidate = (self.generator)();
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            tracing::debug!(scope = %self.scope, "parameter id collision, retrying");
        }
    }
}

impl std::fmt::Debug for IdAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdAllocator")
            .field("scope", &self.scope)
            .field("taken", &self.taken.len())
            .finish()
    }
}
