//! # Greeting Domain Model
//!
//! A [`Greeting`] pairs a caller-supplied name with a template fetched from a
//! template repository. Rendering substitutes every occurrence of
//! [`NAME_PLACEHOLDER`] in the template with the name.
//!
//! ```
//! use enki_core::types::Greeting;
//!
//! let mut greeting = Greeting::new("Ferris");
//! greeting.validate().unwrap();
//! greeting.apply_template("Hello, {name}!");
//! assert_eq!(greeting.rendered, "Hello, Ferris!");
//! ```

use crate::{Error, Result};
use core::fmt;

/// Placeholder replaced by the greeted name when rendering a template.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Template used when no per-name override is configured.
pub const DEFAULT_TEMPLATE: &str = "Hello, {name}!";

/// A greeting for a single name, before and after rendering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Greeting {
    /// Template the greeting was rendered from.
    pub template: String,
    /// Name being greeted.
    pub name: String,
    /// Result of substituting `name` into `template`.
    pub rendered: String,
}

impl Greeting {
    /// Creates an unrendered greeting for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Rejects greetings without a name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyName`] if the name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::EmptyName);
        }
        Ok(())
    }

    /// Renders the current template with the current name.
    #[must_use]
    pub fn render(&self) -> String {
        self.template.replace(NAME_PLACEHOLDER, &self.name)
    }

    /// Stores `template` and renders it in one step.
    pub fn apply_template(&mut self, template: impl Into<String>) {
        self.template = template.into();
        self.rendered = self.render();
    }
}

impl fmt::Display for Greeting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}
