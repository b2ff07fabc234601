//! Parsing of named template sets at startup.

use std::collections::HashMap;
use std::sync::Arc;

use tera::Tera;
use tracing::info;

use super::render::register_helpers;
use crate::error::TemplateError;

/// A pre-parsed, immutable collection of template fragments.
///
/// The first fragment is the entry point rendered by
/// [`TemplateSet::render`](super::TemplateSet::render); the others exist to be
/// extended or included by it.
pub struct TemplateSet {
    name: String,
    entry: String,
    pub(super) tera: Tera,
}

impl TemplateSet {
    /// Parse `fragments` into a new set named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Empty`] if no fragment is given and
    /// [`TemplateError::Parse`] if any fragment fails to parse or extends a
    /// template that is not part of the set.
    pub fn parse(name: &str, fragments: &[(&str, &str)]) -> Result<Self, TemplateError> {
        let (entry, _) = fragments
            .first()
            .ok_or_else(|| TemplateError::Empty(name.to_string()))?;

        let mut tera = Tera::default();
        tera.autoescape_on(vec![".html"]);
        register_helpers(&mut tera);
        tera.add_raw_templates(fragments.iter().copied())
            .map_err(|source| TemplateError::Parse {
                set: name.to_string(),
                source,
            })?;

        Ok(Self {
            name: name.to_string(),
            entry: entry.to_string(),
            tera,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the fragment rendered by this set.
    pub fn entry(&self) -> &str {
        &self.entry
    }
}

impl std::fmt::Debug for TemplateSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateSet")
            .field("name", &self.name)
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

/// Registry of template sets, populated once at startup.
///
/// Loading takes `&mut self`; once the store is shared (behind an `Arc` in
/// application state) sets can only be read.
#[derive(Debug, Default)]
pub struct TemplateStore {
    sets: HashMap<String, Arc<TemplateSet>>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and register a set.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::DuplicateSet`] if `set_name` is already loaded,
    /// otherwise the errors of [`TemplateSet::parse`].
    pub fn load(
        &mut self,
        set_name: &str,
        fragments: &[(&str, &str)],
    ) -> Result<Arc<TemplateSet>, TemplateError> {
        if self.sets.contains_key(set_name) {
            return Err(TemplateError::DuplicateSet(set_name.to_string()));
        }

        let set = Arc::new(TemplateSet::parse(set_name, fragments)?);
        self.sets.insert(set_name.to_string(), Arc::clone(&set));

        info!(set = set_name, fragments = fragments.len(), "Loaded template set");
        Ok(set)
    }

    pub fn get(&self, set_name: &str) -> Option<Arc<TemplateSet>> {
        self.sets.get(set_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
