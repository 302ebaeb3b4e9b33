//! Emitting the configuration into HTML pages.
//!
//! Some page pipelines (PDF export in particular) drop local script sources,
//! so the configuration is injected inline. A hidden marker-class element with
//! `\gdef` definitions makes the macros available from inside TeX as well.

use super::math::escape_html;
use crate::config::Configuration;
use crate::error::{RenderError, Result};

/// Subscription re-typesetting math after every page swap.
const SUBSCRIBE_SNIPPET: &str = "document$.subscribe(() => {\n  MathJax.typesetPromise();\n});";

const HIDDEN_STYLE: &str = "height:0;overflow:hidden;opacity:0;pointer-events:none;";

/// Element ids used to keep injection idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectOptions {
    pub script_id: String,
    pub bootstrap_id: String,
}

impl Default for InjectOptions {
    fn default() -> Self {
        Self {
            script_id: "mathjax-config".to_string(),
            bootstrap_id: "mathjax-macro-bootstrap".to_string(),
        }
    }
}

/// The `window.MathJax = {...}` payload followed by the navigation
/// subscription.
pub fn render_config_script(config: &Configuration) -> Result<String> {
    let json = serde_json::to_string_pretty(config).map_err(|e| RenderError::Script(e.to_string()))?;
    Ok(format!("window.MathJax = {json};\n\n{SUBSCRIBE_SNIPPET}\n"))
}

/// TeX source loading the packages and defining every macro with `\gdef`.
pub fn macro_bootstrap(config: &Configuration) -> String {
    let mut out = String::from("\\(");

    for package in &config.tex.packages.add {
        out.push_str(&format!("\\require{{{package}}}"));
    }

    for (name, def) in config.tex.macros.iter() {
        out.push_str(&format!("\\gdef\\{name}"));
        for index in 1..=def.arity() {
            out.push_str(&format!("#{index}"));
        }
        out.push_str(&format!("{{{}}}", def.template()));
    }

    out.push_str("\\)");
    out
}

/// Insert the configuration script and the macro bootstrap as the first
/// children of `<body>`.
///
/// Each element is skipped when its id already appears in the page, so
/// running the hook twice changes nothing. Pages without a `<body>` are
/// returned unchanged.
pub fn inject_config(html: &str, config: &Configuration, options: &InjectOptions) -> Result<String> {
    let Some(insert_at) = body_content_start(html) else {
        tracing::debug!("no <body> element, page left unchanged");
        return Ok(html.to_string());
    };

    let mut injected = String::new();

    if !has_id(html, &options.script_id) {
        // A literal "</" would end the script element early.
        let script = render_config_script(config)?.replace("</", "<\\/");
        injected.push_str(&format!(
            "<script id=\"{}\">\n{}</script>\n",
            escape_html(&options.script_id),
            script
        ));
    }

    if !has_id(html, &options.bootstrap_id) {
        injected.push_str(&format!(
            "<div id=\"{}\" class=\"{}\" style=\"{}\">{}</div>\n",
            escape_html(&options.bootstrap_id),
            escape_html(&config.options.process_html_class),
            HIDDEN_STYLE,
            escape_html(&macro_bootstrap(config))
        ));
    }

    if injected.is_empty() {
        return Ok(html.to_string());
    }

    tracing::debug!(bytes = injected.len(), "injected math configuration");
    let mut out = String::with_capacity(html.len() + injected.len());
    out.push_str(&html[..insert_at]);
    out.push_str(&injected);
    out.push_str(&html[insert_at..]);
    Ok(out)
}

/// Byte offset just past the `<body ...>` start tag.
fn body_content_start(html: &str) -> Option<usize> {
    let lower = html.to_ascii_lowercase();
    let mut from = 0;

    while let Some(pos) = lower[from..].find("<body") {
        let tag_start = from + pos;
        let after = tag_start + "<body".len();
        match lower[after..].chars().next() {
            Some(c) if c == '>' || c.is_ascii_whitespace() => {
                let close = lower[after..].find('>')?;
                return Some(after + close + 1);
            }
            _ => from = after,
        }
    }

    None
}

fn has_id(html: &str, id: &str) -> bool {
    html.contains(&format!("id=\"{id}\"")) || html.contains(&format!("id='{id}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{build_configuration, MacroDef};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_script_layout() {
        let script = render_config_script(&build_configuration()).unwrap();
        assert!(script.starts_with("window.MathJax = {"));
        assert!(script.contains(r#""load": ["#));
        assert!(script.contains(r#""[+]": ["#));
        assert!(script.contains(r#""R": "\\mathbb{R}""#));
        assert!(script.contains(r#""inlineMath": ["#));
        assert!(script.contains(r#""displayMath": ["#));
        assert!(script.contains(r#""processEscapes": true"#));
        assert!(script.contains(r#""processEnvironments": true"#));
        assert!(script.contains(r#""ignoreHtmlClass": ".*|""#));
        assert!(script.contains(r#""processHtmlClass": "arithmatex""#));
        assert!(script.ends_with("MathJax.typesetPromise();\n});\n"));
    }

    #[test]
    fn test_config_script_round_trips_through_json() {
        let config = build_configuration();
        let script = render_config_script(&config).unwrap();
        let json = script
            .strip_prefix("window.MathJax = ")
            .and_then(|rest| rest.split_once(";\n\n"))
            .map(|(json, _)| json)
            .unwrap();
        let parsed: Configuration = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_macro_bootstrap() {
        let mut config = build_configuration();
        config.tex.macros = [
            ("R", MacroDef::literal("\\mathbb{R}")),
            ("norm", MacroDef::with_args("\\left\\lVert#1\\right\\rVert", 1)),
        ]
        .into_iter()
        .collect();

        assert_eq!(
            macro_bootstrap(&config),
            "\\(\\require{boldsymbol}\\gdef\\R{\\mathbb{R}}\\gdef\\norm#1{\\left\\lVert#1\\right\\rVert}\\)"
        );
    }

    #[test]
    fn test_inject_into_body() {
        let html = "<html><head></head><body class=\"md\"><p>x</p></body></html>";
        let out = inject_config(html, &build_configuration(), &InjectOptions::default()).unwrap();

        let body = out.find("<body class=\"md\">").unwrap() + "<body class=\"md\">".len();
        assert!(out[body..].starts_with("<script id=\"mathjax-config\">\nwindow.MathJax"));
        assert!(out.contains("<div id=\"mathjax-macro-bootstrap\" class=\"arithmatex\""));
        assert!(out.contains("\\gdef\\vecb#1{\\boldsymbol{#1}}"));
        assert!(out.ends_with("<p>x</p></body></html>"));
    }

    #[test]
    fn test_inject_is_idempotent() {
        let config = build_configuration();
        let options = InjectOptions::default();
        let once = inject_config("<body><p>x</p></body>", &config, &options).unwrap();
        let twice = inject_config(&once, &config, &options).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_inject_without_body() {
        let html = "<div>fragment</div><bodyguard>";
        let out = inject_config(html, &build_configuration(), &InjectOptions::default()).unwrap();
        assert_eq!(out, html);
    }
}
