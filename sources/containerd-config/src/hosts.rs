//! Renders the `hosts.toml` that containerd reads for each registry from its registry config
//! directory.  Unlike `config.toml` there's nothing to compose with; the caller's body is the
//! whole file, and [`HOSTS_TEMPLATE`] is the one used by default.

use crate::engine::{Result, TemplateEngine};
use crate::model::HostConfig;

/// The built-in `hosts.toml` body.
pub const HOSTS_TEMPLATE: &str = include_str!("templates/hosts.toml.hbs");

const HOSTS_TEMPLATE_NAME: &str = "hosts.toml";

pub struct HostsConfigRenderer {
    engine: TemplateEngine,
}

impl HostsConfigRenderer {
    pub fn new(engine: TemplateEngine) -> Self {
        Self { engine }
    }

    /// Renders `template_body` with `config` as the root context.
    pub fn render(&self, template_body: &str, config: &HostConfig) -> Result<String> {
        debug!(
            "Rendering {} with {} endpoint(s)",
            HOSTS_TEMPLATE_NAME,
            config.endpoints.len()
        );
        self.engine
            .render(HOSTS_TEMPLATE_NAME, template_body, config)
    }
}

impl Default for HostsConfigRenderer {
    fn default() -> Self {
        Self::new(TemplateEngine::new())
    }
}
