//! Greeting template repositories.

use enki_core::{Error, Result, types::DEFAULT_TEMPLATE};
use std::collections::HashMap;

/// Looks up the greeting template for a name.
pub trait TemplateRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns [`Error::TemplateLookup`] if there is no template for `name`.
    fn hello_template(&self, name: &str) -> Result<String>;
}

/// In-memory templates: per-name overrides with an optional fallback.
#[derive(Debug, Clone)]
pub struct StaticTemplates {
    fallback: Option<String>,
    overrides: HashMap<String, String>,
}

impl StaticTemplates {
    /// A repository without any templates; every lookup fails until
    /// templates are added.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            fallback: None,
            overrides: HashMap::new(),
        }
    }

    /// Uses `template` for names without an override.
    #[must_use]
    pub fn with_fallback(mut self, template: impl Into<String>) -> Self {
        self.fallback = Some(template.into());
        self
    }

    /// Uses `template` for `name` only.
    #[must_use]
    pub fn with_template(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.overrides.insert(name.into(), template.into());
        self
    }
}

impl Default for StaticTemplates {
    fn default() -> Self {
        Self::empty().with_fallback(DEFAULT_TEMPLATE)
    }
}

impl TemplateRepository for StaticTemplates {
    fn hello_template(&self, name: &str) -> Result<String> {
        self.overrides
            .get(name)
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| Error::TemplateLookup {
                name: name.to_string(),
            })
    }
}
