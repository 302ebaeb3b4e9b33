//! # mathjax-config
//!
//! MathJax configuration for a documentation site: macro definitions,
//! delimiter sets, class filters, and re-typesetting after client-side
//! navigation.
//!
//! ## Features
//!
//! - **Configuration record**: [`build_configuration`] returns the site's
//!   macros, delimiters and options as one immutable value
//! - **Validation**: macro arity against template placeholders, delimiter
//!   disjointness, class pattern syntax
//! - **Macro expansion**: TeX-style expansion of the macro table, usable
//!   without a browser
//! - **Scanning**: splitting text into text and math by the configured
//!   delimiters, escapes and environments
//! - **Navigation**: a subscriber issuing fire-and-forget reprocessing
//!   requests on every navigation-settled notification
//! - **Injection**: the `window.MathJax` script and a `\gdef` bootstrap,
//!   inserted into HTML pages
//!
//! ## Quick Start
//!
//! ```rust
//! use mathjax_config::build_configuration;
//!
//! let config = build_configuration();
//! config.validate().unwrap();
//!
//! let norm = config.tex.macros.expand_macro("norm", &["x"]).unwrap();
//! assert_eq!(norm, "\\left\\lVert x\\right\\rVert");
//! ```
//!
//! ## Wiring
//!
//! ```rust,no_run
//! use mathjax_config::{build_configuration, start, NavigationBus, Page, Region, Typesetter};
//!
//! # async fn run() -> mathjax_config::Result<()> {
//! let page = Page::new();
//! let bus = NavigationBus::new();
//! start(Typesetter::new(page.clone()), build_configuration(), &bus)?;
//!
//! page.swap([Region::new("arithmatex", "$\\vecb{v} \\in \\R^n$")]);
//! bus.settle();
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Overrides (TOML)
//!
//! ```text
//! extensions = ["cancel"]
//!
//! [macros]
//! Prob = "\\mathbb{P}"
//! inner = ["\\langle #1, #2 \\rangle", 2]
//! ```

pub mod config;
pub mod error;
pub mod navigation;
pub mod parser;
pub mod render;

// Convenience re-exports
pub use config::{build_configuration, Configuration, MacroDef, MacroTable};
pub use error::{ConfigError, Error, RenderError, Result};
pub use navigation::{MathRefresher, NavigationBus, NavigationListener, NavigationSource};
pub use parser::{scan, Segment};
pub use render::{Page, Region, TypesetEngine, TypesetReport, Typesetter, Typesetting};

use std::sync::Arc;

/// Initialize `engine` with `config`, then subscribe a [`MathRefresher`] for
/// it to `source`.
///
/// The engine reads the configuration before any subscription exists, so the
/// first notification always finds it ready.
pub fn start<E>(mut engine: E, config: Configuration, source: &dyn NavigationSource) -> Result<Arc<E>>
where
    E: TypesetEngine + 'static,
{
    engine.initialize(config)?;
    let engine = Arc::new(engine);
    source.subscribe(Arc::new(MathRefresher::new(engine.clone())));
    tracing::debug!("math refresher subscribed");
    Ok(engine)
}
