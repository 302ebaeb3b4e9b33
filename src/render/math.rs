//! Math output for client-side typesetting.

use crate::error::Result;

/// Trait for math renderers.
pub trait MathRenderer: Send + Sync {
    /// Render inline math.
    fn render_inline(&self, latex: &str) -> Result<String>;

    /// Render display math.
    fn render_display(&self, latex: &str) -> Result<String>;

    /// Render math that failed to expand or render. The source is shown as
    /// is, with the failure in the `title` attribute.
    fn render_error(&self, source: &str, message: &str) -> String {
        format!(
            r#"<span class="math error" title="{}">{}</span>"#,
            escape_html(message).replace('"', "&quot;"),
            escape_html(source)
        )
    }
}

/// Renderer that wraps expanded TeX in the engine's own delimiters so the
/// browser-side engine can pick it up.
#[derive(Debug, Clone, Default)]
pub struct MathJaxRenderer;

impl MathJaxRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl MathRenderer for MathJaxRenderer {
    fn render_inline(&self, latex: &str) -> Result<String> {
        Ok(format!(r#"<span class="math inline">\({}\)</span>"#, escape_html(latex)))
    }

    fn render_display(&self, latex: &str) -> Result<String> {
        Ok(format!(r#"<div class="math display">\[{}\]</div>"#, escape_html(latex)))
    }
}

/// Escape the characters that would otherwise be read as markup.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
