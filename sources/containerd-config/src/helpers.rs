// This module contains the helpers registered with the Handlebars library for rendering the
// containerd templates.  The output of every template is TOML, so the helpers deal in TOML
// values rather than HTML.

use handlebars::{Context, Handlebars, Helper, Output, RenderContext, RenderError};
use serde_json::value::Value;
use snafu::{OptionExt, ResultExt};

/// Potential errors during helper execution
mod error {
    use handlebars::RenderError;
    use snafu::Snafu;

    #[derive(Debug, Snafu)]
    #[snafu(visibility(pub(super)))]
    pub(super) enum TemplateHelperError {
        #[snafu(display(
            "Incorrect number of params provided to helper '{}' in template '{}' - {} expected, {} received",
            helper,
            template,
            expected,
            received,
        ))]
        IncorrectNumberOfParams {
            expected: usize,
            received: usize,
            helper: String,
            template: String,
        },

        // handlebars::JsonValue is a serde_json::Value, which implements
        // the 'Display' trait and should provide valuable context
        #[snafu(display(
            "Invalid template value, expected {}, got '{}' in template {}",
            expected,
            value,
            template
        ))]
        InvalidTemplateValue {
            expected: &'static str,
            value: handlebars::JsonValue,
            template: String,
        },

        #[snafu(display("Missing param {} for helper '{}'", index, helper_name))]
        MissingParam { index: usize, helper_name: String },

        #[snafu(display("Unable to write template '{}': '{}'", template, source))]
        TemplateWrite {
            template: String,
            source: std::io::Error,
        },
    }

    // Handlebars helpers are required to return a RenderError.
    // Implement "From" for TemplateHelperError.
    impl From<TemplateHelperError> for RenderError {
        fn from(e: TemplateHelperError) -> RenderError {
            RenderError::from_error("TemplateHelperError", e)
        }
    }
}

/// `quote` writes its parameter as a TOML basic string, surrounded by double quotes and with
/// backslashes, quotes, and control characters escaped.
///
/// An unset value is written as the empty string `""`.  Booleans and numbers are quoted in their
/// display form.  Arrays and objects can't be quoted and fail the render.
///
/// Example:
///    root = {{quote node_config.containerd.root}}
///    ...where `root` is: /var/lib/rancher/k3s/agent/containerd
///    ...will produce: root = "/var/lib/rancher/k3s/agent/containerd"
pub fn quote(
    helper: &Helper<'_, '_>,
    _: &Handlebars,
    _: &Context,
    renderctx: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> Result<(), RenderError> {
    trace!("Starting quote helper");
    let template_name = template_name(renderctx);
    trace!("Template name: {}", &template_name);

    trace!("Number of params: {}", helper.params().len());
    check_param_count(helper, template_name, 1)?;

    let value = get_param(helper, 0)?;
    let unquoted = match value {
        Value::String(s) => s.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        Value::Array(_) | Value::Object(_) => {
            return Err(RenderError::from(
                error::TemplateHelperError::InvalidTemplateValue {
                    expected: "scalar",
                    value: value.to_owned(),
                    template: template_name.to_owned(),
                },
            ))
        }
    };

    let quoted = toml_string(&unquoted);
    trace!("Quoted value: {}", quoted);
    out.write(&quoted).context(error::TemplateWriteSnafu {
        template: template_name.to_owned(),
    })?;
    Ok(())
}

/// `default` lets you specify the default value for a key in a template in case that key isn't
/// set.  The first argument is the default (scalar) value; the second argument is the key to
/// check.  Empty strings count as unset, since the config model uses them for absent paths.
///
/// Example:
///    conf_dir = "{{default "/etc/cni/net.d" node_config.agent.cni_conf_dir}}"
pub fn default(
    helper: &Helper<'_, '_>,
    _: &Handlebars,
    _: &Context,
    renderctx: &mut RenderContext<'_, '_>,
    out: &mut dyn Output,
) -> Result<(), RenderError> {
    trace!("Starting default helper");
    let template_name = template_name(renderctx);
    trace!("Template name: {}", &template_name);

    trace!("Number of params: {}", helper.params().len());
    check_param_count(helper, template_name, 2)?;

    let default_val = get_param(helper, 0)?;
    let default = scalar_string(default_val).context(error::InvalidTemplateValueSnafu {
        expected: "non-null scalar",
        value: default_val.to_owned(),
        template: template_name.to_owned(),
    })?;
    trace!("Default value if key is not set: {}", default);

    let requested_value = get_param(helper, 1)?;
    let value = match requested_value {
        Value::Null => default,
        Value::String(s) if s.is_empty() => default,
        _ => scalar_string(requested_value).context(error::InvalidTemplateValueSnafu {
            expected: "scalar",
            value: requested_value.to_owned(),
            template: template_name.to_owned(),
        })?,
    };

    out.write(&value).context(error::TemplateWriteSnafu {
        template: template_name.to_owned(),
    })?;
    Ok(())
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=

/// The display form of a non-null scalar, or None for nulls and composite values.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Formats `s` as a TOML basic string.
fn toml_string(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\u{8}' => quoted.push_str("\\b"),
            '\t' => quoted.push_str("\\t"),
            '\n' => quoted.push_str("\\n"),
            '\u{c}' => quoted.push_str("\\f"),
            '\r' => quoted.push_str("\\r"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04X}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Gets the value at `idx` and unwraps it. Returns an error if the param cannot be unwrapped.
fn get_param<'a>(helper: &'a Helper<'_, '_>, idx: usize) -> Result<&'a Value, RenderError> {
    Ok(helper
        .param(idx)
        .map(|v| v.value())
        .context(error::MissingParamSnafu {
            index: idx,
            helper_name: helper.name(),
        })?)
}

/// Get the template name if there is one, otherwise return "dynamic template"
fn template_name<'a>(renderctx: &'a RenderContext<'_, '_>) -> &'a str {
    match renderctx.get_root_template_name() {
        Some(s) => s.as_str(),
        None => "dynamic template",
    }
}

/// Creates an `IncorrectNumberOfParams` error if the number of `helper` params does not equal
/// `expected`.
fn check_param_count<S: AsRef<str>>(
    helper: &Helper<'_, '_>,
    template_name: S,
    expected: usize,
) -> Result<(), RenderError> {
    if helper.params().len() != expected {
        return Err(RenderError::from(
            error::TemplateHelperError::IncorrectNumberOfParams {
                expected,
                received: helper.params().len(),
                helper: helper.name().to_string(),
                template: template_name.as_ref().into(),
            },
        ));
    }
    Ok(())
}

// =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=   =^..^=


#[cfg(test)]
mod test_default {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    // A thin wrapper around the handlebars render_template method that includes
    // setup and registration of helpers
    fn setup_and_render_template<T>(tmpl: &str, data: &T) -> Result<String, RenderError>
    where
        T: Serialize,
    {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_helper("default", Box::new(default));

        registry.render_template(tmpl, data)
    }

    const TEMPLATE: &str = r#"{{default "/etc/cni/net.d" dir}}"#;

    #[test]
    fn have_setting() {
        let result = setup_and_render_template(TEMPLATE, &json!({"dir": "/x"})).unwrap();
        assert_eq!(result, "/x");
    }

    #[test]
    fn null_setting() {
        let result = setup_and_render_template(TEMPLATE, &json!({"dir": null})).unwrap();
        assert_eq!(result, "/etc/cni/net.d");
    }

    #[test]
    fn empty_setting() {
        let result = setup_and_render_template(TEMPLATE, &json!({"dir": ""})).unwrap();
        assert_eq!(result, "/etc/cni/net.d");
    }

    #[test]
    fn number_setting() {
        let result =
            setup_and_render_template("{{default 5 port}}", &json!({"port": 42})).unwrap();
        assert_eq!(result, "42");
    }

    #[test]
    fn null_default_fails() {
        setup_and_render_template("{{default missing dir}}", &json!({"dir": "/x"}))
            .unwrap_err();
    }

    #[test]
    fn array_setting_fails() {
        setup_and_render_template(TEMPLATE, &json!({"dir": ["a"]})).unwrap_err();
    }
}
