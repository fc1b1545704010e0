//! The `engine` module owns the handlebars registry used by the renderers.
//!
//! A [`TemplateEngine`] is configured once: helpers are registered and named partials (like the
//! built-in "base" containerd config) are parsed while it is being set up.  After that it's only
//! read, so a single engine can render any number of caller-supplied bodies, from any number of
//! threads.  A caller body can invoke a registered partial with `{{> name}}`, or shadow it for
//! one render with an inline partial of the same name.

use crate::helpers;
use handlebars::{Handlebars, Template};
use serde::Serialize;
use snafu::ResultExt;

/// Compiles and executes templates against a fixed set of helpers and partials.
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl TemplateEngine {
    /// Builds an engine with every helper registered and no partials.
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        // Fail the render on references to keys that aren't in the data.
        registry.set_strict_mode(true);
        // Everything we render is TOML.
        registry.register_escape_fn(handlebars::no_escape);

        registry.register_helper("quote", Box::new(helpers::quote));
        registry.register_helper("default", Box::new(helpers::default));

        Self { registry }
    }

    /// Parses `body` and makes it available to every later render as `{{> name}}`.  A partial
    /// registered under an existing name replaces it.
    pub fn register_partial(&mut self, name: &str, body: &str) -> Result<()> {
        debug!("Registering partial template '{}'", name);
        self.registry
            .register_partial(name, body)
            .context(error::TemplateParseSnafu { name })
    }

    /// Whether a partial has been registered under `name`.
    pub fn has_partial(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    /// Renders `body` with `data` as the root context.  `name` identifies the body in errors.
    ///
    /// The body is parsed before anything is executed, so malformed syntax is always reported as
    /// a parse error rather than an execution error.
    pub fn render<T>(&self, name: &str, body: &str, data: &T) -> Result<String>
    where
        T: Serialize,
    {
        trace!("Parsing template '{}'", name);
        Template::compile(body).context(error::TemplateParseSnafu { name })?;

        trace!("Executing template '{}'", name);
        self.registry
            .render_template(body, data)
            .context(error::TemplateExecutionSnafu { name })
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

pub mod error {
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(crate)))]
    pub enum Error {
        #[snafu(display("Unable to parse template '{}': {}", name, source))]
        TemplateParse {
            name: String,
            #[snafu(source(from(handlebars::TemplateError, Box::new)))]
            source: Box<handlebars::TemplateError>,
        },

        #[snafu(display("Unable to render template '{}': {}", name, source))]
        TemplateExecution {
            name: String,
            #[snafu(source(from(handlebars::RenderError, Box::new)))]
            source: Box<handlebars::RenderError>,
        },
    }
}

pub use error::Error;
pub type Result<T> = std::result::Result<T, error::Error>;
