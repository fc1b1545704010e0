/*!
Renders containerd's `config.toml`.

The built-in configuration is registered with the engine as the partial `base`.  Callers pass a
template body that decides how it's used: the default body is just `{{> base}}`, while an
override can add content around it, leave it out entirely, or redefine `base` with an inline
partial.

```
use containerd_config::{RuntimeConfig, RuntimeConfigRenderer, DEFAULT_TEMPLATE};

let renderer = RuntimeConfigRenderer::new().unwrap();
let rendered = renderer.render(DEFAULT_TEMPLATE, &RuntimeConfig::default()).unwrap();
assert!(rendered.starts_with("# File generated by"));
```
*/

use crate::engine::{Result, TemplateEngine};
use crate::model::RuntimeConfig;

/// The built-in containerd configuration.
pub const BASE_TEMPLATE: &str = include_str!("templates/config.toml.hbs");

/// The name callers use to include [`BASE_TEMPLATE`] from their own body.
pub const BASE_TEMPLATE_NAME: &str = "base";

/// The body used when there's no user-supplied `config.toml.tmpl`.
pub const DEFAULT_TEMPLATE: &str = "{{> base}}";

/// Name of the caller-supplied body in errors.
const CONFIG_TEMPLATE_NAME: &str = "config.toml";

/// Renders [`RuntimeConfig`]s with the built-in base configuration available.
pub struct RuntimeConfigRenderer {
    engine: TemplateEngine,
}

impl RuntimeConfigRenderer {
    /// Builds a renderer around a fresh [`TemplateEngine`].
    pub fn new() -> Result<Self> {
        Self::with_engine(TemplateEngine::new())
    }

    /// Builds a renderer around an engine that may carry additional partials.  The base
    /// configuration is registered on top, replacing any partial already named `base`.
    pub fn with_engine(mut engine: TemplateEngine) -> Result<Self> {
        engine.register_partial(BASE_TEMPLATE_NAME, BASE_TEMPLATE)?;
        Ok(Self { engine })
    }

    /// Renders `template_body` with `config` as the root context.
    pub fn render(&self, template_body: &str, config: &RuntimeConfig) -> Result<String> {
        debug!("Rendering {} for '{}'", CONFIG_TEMPLATE_NAME, config.program);
        self.engine
            .render(CONFIG_TEMPLATE_NAME, template_body, config)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::engine::Error;
    use crate::model::{AuthConfig, Registry, RegistryConfig, RuntimeClass};
    use maplit::btreemap;

    fn render(config: &RuntimeConfig) -> String {
        RuntimeConfigRenderer::new()
            .unwrap()
            .render(DEFAULT_TEMPLATE, config)
            .unwrap()
    }

    fn config_with_auth(snapshotter: &str, auth: AuthConfig) -> RuntimeConfig {
        let mut config = RuntimeConfig::default();
        config.node_config.agent.snapshotter = Some(snapshotter.to_string());
        config.private_registry_config = Some(Registry {
            configs: btreemap! {
                "registry.example.com".to_string() => RegistryConfig {
                    auth: Some(auth),
                    tls: None,
                },
            },
        });
        config
    }

    fn has_line(rendered: &str, line: &str) -> bool {
        rendered.lines().any(|l| l.trim() == line)
    }

    #[test]
    fn disable_cgroup() {
        let mut config = RuntimeConfig::default();
        assert!(!render(&config).contains("disable_cgroup"));

        config.disable_cgroup = true;
        let rendered = render(&config);
        assert_eq!(rendered.matches("disable_cgroup = true").count(), 1);
    }

    #[test]
    fn user_namespace() {
        let mut config = RuntimeConfig::default();
        let rendered = render(&config);
        assert!(!rendered.contains("disable_apparmor"));
        assert!(!rendered.contains("restrict_oom_score_adj"));

        config.is_running_in_user_ns = true;
        let rendered = render(&config);
        assert!(has_line(&rendered, "disable_apparmor = true"));
        assert!(has_line(&rendered, "restrict_oom_score_adj = true"));
    }

    #[test]
    fn sandbox_image() {
        let mut config = RuntimeConfig::default();
        assert!(!render(&config).contains("sandbox_image"));

        config.node_config.agent.pause_image = Some("rancher/mirrored-pause:3.6".to_string());
        assert!(has_line(
            &render(&config),
            r#"sandbox_image = "rancher/mirrored-pause:3.6""#
        ));
    }

    #[test]
    fn no_snapshotter_no_block() {
        let mut config = RuntimeConfig::default();
        config.node_config.default_runtime = Some("crun".to_string());
        let rendered = render(&config);
        assert!(!has_line(
            &rendered,
            r#"[plugins."io.containerd.grpc.v1.cri".containerd]"#
        ));
        assert!(!rendered.contains("disable_snapshot_annotations"));
        assert!(!rendered.contains("default_runtime_name"));
    }

    #[test]
    fn empty_snapshotter_no_block() {
        let mut config = RuntimeConfig::default();
        config.node_config.agent.snapshotter = Some(String::new());
        let rendered = render(&config);
        assert!(!rendered.contains("snapshotter ="));
        assert!(!rendered.contains("disable_snapshot_annotations"));
    }

    #[test]
    fn stargz_exclusivity() {
        let mut config = RuntimeConfig::default();
        config.node_config.agent.snapshotter = Some("stargz".to_string());
        config.node_config.agent.image_service_socket = Some("/run/socket".to_string());
        let rendered = render(&config);
        assert!(has_line(&rendered, "disable_snapshot_annotations = false"));
        assert!(has_line(
            &rendered,
            r#"[plugins."io.containerd.snapshotter.v1.stargz".registry]"#
        ));
        assert!(has_line(&rendered, "enable_keychain = true"));

        config.node_config.agent.snapshotter = Some("overlayfs".to_string());
        let rendered = render(&config);
        assert!(has_line(&rendered, "disable_snapshot_annotations = true"));
        assert!(!rendered.contains("io.containerd.snapshotter.v1.stargz"));
        assert!(!rendered.contains("cri_keychain"));
    }

    #[test]
    fn stargz_without_socket_has_no_keychain() {
        let mut config = RuntimeConfig::default();
        config.node_config.agent.snapshotter = Some("stargz".to_string());
        let rendered = render(&config);
        assert!(!rendered.contains("cri_keychain"));
        assert!(has_line(
            &rendered,
            r#"[plugins."io.containerd.snapshotter.v1.stargz".registry]"#
        ));
    }

    #[test]
    fn default_runtime_name() {
        let mut config = RuntimeConfig::default();
        config.node_config.agent.snapshotter = Some("overlayfs".to_string());
        config.node_config.default_runtime = Some("crun".to_string());
        assert!(has_line(
            &render(&config),
            r#"default_runtime_name = "crun""#
        ));
    }

    #[test]
    fn auth_fields_are_independent() {
        let config = config_with_auth(
            "overlayfs",
            AuthConfig {
                password: Some("secret".to_string()),
                ..Default::default()
            },
        );
        let rendered = render(&config);
        assert!(has_line(
            &rendered,
            r#"[plugins."io.containerd.grpc.v1.cri".registry.configs."registry.example.com".auth]"#
        ));
        assert!(has_line(&rendered, r#"password = "secret""#));
        for field in ["username =", "auth =", "identitytoken ="] {
            assert!(
                !rendered.lines().any(|l| l.trim().starts_with(field)),
                "unexpected '{}' in:\n{}",
                field,
                rendered
            );
        }
    }

    #[test]
    fn empty_auth_emits_nothing() {
        let config = config_with_auth(
            "overlayfs",
            AuthConfig {
                username: Some(String::new()),
                ..Default::default()
            },
        );
        assert!(!render(&config).contains(".auth]"));
    }

    #[test]
    fn stargz_auth_is_emitted_twice() {
        let auth = AuthConfig {
            username: Some("user".to_string()),
            identity_token: Some("token".to_string()),
            ..Default::default()
        };
        let rendered = render(&config_with_auth("stargz", auth.clone()));
        assert!(has_line(
            &rendered,
            r#"[plugins."io.containerd.snapshotter.v1.stargz".registry.configs."registry.example.com".auth]"#
        ));
        assert_eq!(rendered.matches(r#"username = "user""#).count(), 2);
        assert_eq!(rendered.matches(r#"identitytoken = "token""#).count(), 2);

        let rendered = render(&config_with_auth("native", auth));
        assert_eq!(rendered.matches(r#"username = "user""#).count(), 1);
    }

    #[test]
    fn cni_and_runc_section() {
        let mut config = RuntimeConfig::default();
        config.node_config.agent.cni_bin_dir = "/opt/cni/bin".to_string();
        config.node_config.agent.cni_conf_dir = "/etc/cni/net.d".to_string();
        config.systemd_cgroup = true;
        let rendered = render(&config);

        let cni = rendered
            .find(r#"[plugins."io.containerd.grpc.v1.cri".cni]"#)
            .unwrap();
        let bin_dir = rendered.find(r#"bin_dir = "/opt/cni/bin""#).unwrap();
        let conf_dir = rendered.find(r#"conf_dir = "/etc/cni/net.d""#).unwrap();
        assert!(cni < bin_dir && bin_dir < conf_dir);

        let runc = rendered
            .find(r#"[plugins."io.containerd.grpc.v1.cri".containerd.runtimes.runc]"#)
            .unwrap();
        assert!(rendered[runc..].contains(r#"runtime_type = "io.containerd.runc.v2""#));
        assert!(rendered[runc..].contains("SystemdCgroup = true"));
    }

    #[test]
    fn no_flannel_leaves_cni_out() {
        let mut config = RuntimeConfig::default();
        config.node_config.no_flannel = true;
        let rendered = render(&config);
        assert!(!rendered.contains(r#"[plugins."io.containerd.grpc.v1.cri".cni]"#));
        assert!(!rendered.contains("bin_dir"));
    }

    #[test]
    fn tasks_service_only_when_configured() {
        let mut config = RuntimeConfig::default();
        assert!(!render(&config).contains("tasks-service"));

        config.node_config.containerd.rdt_config = Some("/etc/rdt.yaml".to_string());
        let rendered = render(&config);
        assert!(has_line(
            &rendered,
            r#"[plugins."io.containerd.service.v1.tasks-service"]"#
        ));
        assert!(has_line(&rendered, r#"rdt_config_file = "/etc/rdt.yaml""#));
        assert!(!rendered.contains("blockio_config_file"));
    }

    #[test]
    fn extra_runtimes_are_sorted() {
        let mut config = RuntimeConfig::default();
        config.systemd_cgroup = true;
        config.extra_runtimes = btreemap! {
            "nvidia".to_string() => RuntimeClass {
                runtime_type: "io.containerd.runc.v2".to_string(),
                binary_name: "/usr/bin/nvidia-container-runtime".to_string(),
            },
            "crun".to_string() => RuntimeClass {
                runtime_type: "io.containerd.runc.v2".to_string(),
                binary_name: "/usr/bin/crun".to_string(),
            },
        };
        let rendered = render(&config);
        let crun = rendered
            .find(r#"[plugins."io.containerd.grpc.v1.cri".containerd.runtimes."crun"]"#)
            .unwrap();
        let nvidia = rendered
            .find(r#"[plugins."io.containerd.grpc.v1.cri".containerd.runtimes."nvidia"]"#)
            .unwrap();
        assert!(crun < nvidia);
        assert!(has_line(&rendered, r#"BinaryName = "/usr/bin/crun""#));
        // runc plus the two extra runtimes
        assert_eq!(rendered.matches("SystemdCgroup = true").count(), 3);
    }

    #[test]
    fn deterministic() {
        let config = config_with_auth(
            "stargz",
            AuthConfig {
                username: Some("user".to_string()),
                password: Some("pass".to_string()),
                ..Default::default()
            },
        );
        let renderer = RuntimeConfigRenderer::new().unwrap();
        let first = renderer.render(DEFAULT_TEMPLATE, &config).unwrap();
        let second = renderer.render(DEFAULT_TEMPLATE, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn override_wraps_base() {
        let renderer = RuntimeConfigRenderer::new().unwrap();
        let body = "{{> base}}\n[plugins.\"io.containerd.grpc.v1.cri\".extra]\n  enabled = true\n";
        let rendered = renderer.render(body, &RuntimeConfig::default()).unwrap();
        assert!(rendered.starts_with("# File generated by"));
        assert!(rendered.ends_with("  enabled = true\n"));
    }

    #[test]
    fn override_replaces_base() {
        let renderer = RuntimeConfigRenderer::new().unwrap();
        let config = RuntimeConfig {
            systemd_cgroup: true,
            ..Default::default()
        };
        let rendered = renderer
            .render("SystemdCgroup = {{systemd_cgroup}}", &config)
            .unwrap();
        assert_eq!(rendered, "SystemdCgroup = true");
    }

    #[test]
    fn malformed_override_is_parse_error() {
        let renderer = RuntimeConfigRenderer::new().unwrap();
        let err = renderer
            .render("{{#if disable_cgroup}}", &RuntimeConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::TemplateParse { .. }));
    }

    #[test]
    fn unknown_field_is_execution_error() {
        let renderer = RuntimeConfigRenderer::new().unwrap();
        let err = renderer
            .render("{{> base}}{{node_config.bogus}}", &RuntimeConfig::default())
            .unwrap_err();
        assert!(matches!(err, Error::TemplateExecution { .. }));
    }
}
