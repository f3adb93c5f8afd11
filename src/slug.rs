//! URL slugs derived from parameter names.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

static NON_ALNUM_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

/// Used when a name has no ASCII alphanumerics at all.
pub const FALLBACK_SLUG: &str = "parameter";

/// Base slug for `name`: lower-cased, runs of anything that is not an ASCII
/// letter or digit collapsed to `_`, edge underscores trimmed.
pub fn base_slug(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let replaced = NON_ALNUM_RUN.replace_all(&lowered, "_");
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Slug for `name` that does not collide with anything in `existing`.
///
/// Collisions get `_1`, `_2`, ... appended until the result is free.
pub fn slug(name: &str, existing: &HashSet<String>) -> String {
    let base = base_slug(name);
    if !existing.contains(&base) {
        return base;
    }

    let mut n = 1usize;
    loop {
        let candidate = format!("{}_{}", base, n);
        if !existing.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Slugs handed out within one compilation batch.
#[derive(Debug, Default)]
pub struct SlugSet {
    taken: HashSet<String>,
}

impl SlugSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a unique slug for `name` and remember it.
    pub fn allocate(&mut self, name: &str) -> String {
        let s = slug(name, &self.taken);
        self.taken.insert(s.clone());
        s
    }
}
