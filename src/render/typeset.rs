//! In-process typesetting engine over a shared page model.

use super::math::{escape_html, MathJaxRenderer, MathRenderer};
use super::{TypesetEngine, TypesetReport, Typesetting};
use crate::config::{ClassFilter, Configuration, MathMode};
use crate::error::{RenderError, Result};
use crate::parser::{scan, Segment};
use std::sync::{Arc, PoisonError, RwLock};

/// One element of the page: its class attribute, its source text and the
/// output of the last pass that processed it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    pub classes: String,
    pub source: String,
    pub rendered: Option<String>,
}

impl Region {
    pub fn new(classes: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            classes: classes.into(),
            source: source.into(),
            rendered: None,
        }
    }
}

#[derive(Debug, Default)]
struct PageState {
    generation: u64,
    regions: Vec<Region>,
}

/// The currently displayed content, shared between the host and the engine.
#[derive(Debug, Clone, Default)]
pub struct Page {
    inner: Arc<RwLock<PageState>>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the content, as a navigation does.
    pub fn swap(&self, regions: impl IntoIterator<Item = Region>) {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        state.regions = regions.into_iter().collect();
        tracing::trace!(generation = state.generation, regions = state.regions.len(), "page swapped");
    }

    pub fn regions(&self) -> Vec<Region> {
        self.snapshot().1
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).generation
    }

    fn snapshot(&self) -> (u64, Vec<Region>) {
        let state = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        (state.generation, state.regions.clone())
    }

    /// Store pass output unless the page changed since `generation`.
    fn write_back(&self, generation: u64, rendered: Vec<Option<String>>) -> bool {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if state.generation != generation {
            return false;
        }
        for (region, output) in state.regions.iter_mut().zip(rendered) {
            region.rendered = output;
        }
        true
    }
}

struct Prepared {
    config: Configuration,
    filter: ClassFilter,
}

/// Engine that expands macros and renders math in every region the class
/// filter accepts.
pub struct Typesetter {
    page: Page,
    renderer: Arc<dyn MathRenderer>,
    prepared: Option<Arc<Prepared>>,
}

impl Typesetter {
    pub fn new(page: Page) -> Self {
        Self::with_renderer(page, Arc::new(MathJaxRenderer::new()))
    }

    pub fn with_renderer(page: Page, renderer: Arc<dyn MathRenderer>) -> Self {
        Self {
            page,
            renderer,
            prepared: None,
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn is_initialized(&self) -> bool {
        self.prepared.is_some()
    }
}

impl TypesetEngine for Typesetter {
    fn initialize(&mut self, config: Configuration) -> Result<()> {
        config.validate()?;
        let filter = config.class_filter()?;
        tracing::debug!(macros = config.tex.macros.len(), "typesetter initialized");
        self.prepared = Some(Arc::new(Prepared { config, filter }));
        Ok(())
    }

    fn typeset(&self) -> Typesetting {
        let Some(prepared) = self.prepared.clone() else {
            tracing::warn!("typeset requested before initialization");
            return Typesetting::ready(Err(RenderError::NotInitialized.into()));
        };
        let page = self.page.clone();
        let renderer = Arc::clone(&self.renderer);

        Typesetting::spawn(async move { run_pass(&page, &prepared, renderer.as_ref()) })
    }
}

fn run_pass(page: &Page, prepared: &Prepared, renderer: &dyn MathRenderer) -> Result<TypesetReport> {
    let (generation, regions) = page.snapshot();
    let mut report = TypesetReport::default();
    let mut rendered = Vec::with_capacity(regions.len());

    for region in &regions {
        if prepared.filter.is_ignored(&region.classes) {
            report.skipped += 1;
            rendered.push(None);
            continue;
        }
        let output = render_region(&region.source, &prepared.config, renderer);
        report.processed += 1;
        report.math += output.math;
        report.errors += output.errors;
        rendered.push(Some(output.html));
    }

    if !page.write_back(generation, rendered) {
        tracing::debug!(generation, "page changed during pass, output discarded");
        report.stale = true;
    }

    tracing::debug!(
        processed = report.processed,
        skipped = report.skipped,
        math = report.math,
        errors = report.errors,
        "typeset pass finished"
    );
    Ok(report)
}

#[derive(Debug, Default)]
struct RegionOutput {
    html: String,
    math: usize,
    errors: usize,
}

/// Render one region. A failing math segment becomes an error span and the
/// rest of the region is still rendered.
fn render_region(
    source: &str,
    config: &Configuration,
    renderer: &dyn MathRenderer,
) -> RegionOutput {
    let mut output = RegionOutput {
        html: String::with_capacity(source.len()),
        ..Default::default()
    };

    for segment in scan(source, config) {
        match &segment {
            Segment::Text(text) => output.html.push_str(&escape_html(text)),
            Segment::Math { mode, body, .. } => match render_math(*mode, body, config, renderer) {
                Ok(html) => {
                    output.html.push_str(&html);
                    output.math += 1;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "math segment failed to render");
                    output.html.push_str(&renderer.render_error(&segment.source(), &e.to_string()));
                    output.errors += 1;
                }
            },
        }
    }

    output
}

fn render_math(
    mode: MathMode,
    body: &str,
    config: &Configuration,
    renderer: &dyn MathRenderer,
) -> Result<String> {
    let expanded = config.tex.macros.expand(body)?;
    match mode {
        MathMode::Inline => renderer.render_inline(&expanded),
        MathMode::Display => renderer.render_display(&expanded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{build_configuration, MARKER_CLASS};
    use crate::error::{ConfigError, Error};
    use pretty_assertions::assert_eq;

    fn page() -> Page {
        let page = Page::new();
        page.swap([
            Region::new(MARKER_CLASS, "Let $x \\in \\R^n$ and $$\\norm{x} \\le 1$$"),
            Region::new("md-content", "plain $y$ stays"),
            Region::new("", "no classes $z$"),
        ]);
        page
    }

    fn typesetter() -> Typesetter {
        let mut engine = Typesetter::new(page());
        engine.initialize(build_configuration()).unwrap();
        engine
    }

    #[tokio::test]
    async fn test_only_marked_regions_are_rendered() {
        let engine = typesetter();
        let report = engine.typeset().await.unwrap();

        assert_eq!(
            report,
            TypesetReport {
                processed: 1,
                skipped: 2,
                math: 2,
                errors: 0,
                stale: false
            }
        );

        let regions = engine.page().regions();
        assert_eq!(
            regions[0].rendered.as_deref(),
            Some(concat!(
                r#"Let <span class="math inline">\(x \in \mathbb{R}^n\)</span> and "#,
                r#"<div class="math display">\[\left\lVert x\right\rVert \le 1\]</div>"#
            ))
        );
        assert_eq!(regions[1].rendered, None);
        assert_eq!(regions[2].rendered, None);
    }

    #[tokio::test]
    async fn test_typeset_before_initialize() {
        let engine = Typesetter::new(page());
        assert!(!engine.is_initialized());
        let result = engine.typeset().await;
        assert!(matches!(result, Err(Error::Render(RenderError::NotInitialized))));
    }

    #[test]
    fn test_initialize_rejects_invalid_configuration() {
        let mut config = build_configuration();
        config.options.process_html_class = "[".to_string();
        let mut engine = Typesetter::new(Page::new());
        let err = engine.initialize(config).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::InvalidClassPattern { .. })));
        assert!(!engine.is_initialized());
    }

    #[tokio::test]
    async fn test_failing_math_does_not_block_other_regions() {
        let page = Page::new();
        page.swap([
            Region::new(MARKER_CLASS, "$\\R$"),
            Region::new(MARKER_CLASS, "bad $\\vecb$ then $y$"),
        ]);
        let mut engine = Typesetter::new(page);
        engine.initialize(build_configuration()).unwrap();

        let report = engine.typeset().await.unwrap();
        assert_eq!(
            report,
            TypesetReport {
                processed: 2,
                skipped: 0,
                math: 2,
                errors: 1,
                stale: false
            }
        );

        let regions = engine.page().regions();
        assert_eq!(
            regions[0].rendered.as_deref(),
            Some(r#"<span class="math inline">\(\mathbb{R}\)</span>"#)
        );
        let second = regions[1].rendered.as_deref().unwrap();
        assert!(second.starts_with(r#"bad <span class="math error" title=""#));
        assert!(second.contains("Missing or unbalanced argument for macro \\vecb"));
        assert!(second.contains(r#">$\vecb$</span> then "#));
        assert!(second.ends_with(r#"<span class="math inline">\(y\)</span>"#));
    }

    #[test]
    fn test_stale_write_back_is_discarded() {
        let page = page();
        let generation = page.generation();
        page.swap([Region::new(MARKER_CLASS, "$a$")]);

        assert!(!page.write_back(generation, vec![Some("old".into())]));
        assert_eq!(page.regions()[0].rendered, None);
        assert!(page.write_back(page.generation(), vec![Some("new".into())]));
        assert_eq!(page.regions()[0].rendered.as_deref(), Some("new"));
    }
}
