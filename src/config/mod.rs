//! The configuration record handed to the math-rendering engine.
//!
//! [`build_configuration`] produces the site's table of macros, delimiters and
//! class filters. The record mirrors the engine's own configuration object,
//! so it serializes directly into the `window.MathJax` script payload.

pub mod classes;
pub mod delimiters;
pub mod macros;

pub use classes::ClassFilter;
pub use delimiters::{DelimiterPair, DelimiterSet, MathMode};
pub use macros::{MacroDef, MacroTable};

use crate::error::{ConfigError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Class name marking elements whose math is typeset.
pub const MARKER_CLASS: &str = "arithmatex";

/// Ignore pattern matching any class name or none at all.
pub const IGNORE_ALL_CLASSES: &str = ".*|";

/// Complete engine configuration. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub loader: Loader,
    pub tex: TexOptions,
    pub options: RenderOptions,
}

/// Extensions loaded before the configuration is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loader {
    pub load: Vec<String>,
}

/// TeX input settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TexOptions {
    pub packages: Packages,
    pub macros: MacroTable,
    pub inline_math: DelimiterSet,
    pub display_math: DelimiterSet,
    /// Treat `\$` as a literal dollar sign outside math.
    pub process_escapes: bool,
    /// Treat `\begin{..}...\end{..}` outside delimiters as display math.
    pub process_environments: bool,
}

/// TeX packages added to the engine's default package list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packages {
    #[serde(rename = "[+]")]
    pub add: Vec<String>,
}

/// Document-level options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    pub ignore_html_class: String,
    pub process_html_class: String,
}

/// Build the site configuration.
pub fn build_configuration() -> Configuration {
    let macros = [
        ("R", MacroDef::literal("\\mathbb{R}")),
        ("E", MacroDef::literal("\\mathbb{E}")),
        ("N", MacroDef::literal("\\mathbb{N}")),
        ("Z", MacroDef::literal("\\mathbb{Z}")),
        ("Q", MacroDef::literal("\\mathbb{Q}")),
        ("C", MacroDef::literal("\\mathbb{C}")),
        ("vecb", MacroDef::with_args("\\boldsymbol{#1}", 1)),
        ("unitv", MacroDef::with_args("\\hat{\\boldsymbol{#1}}", 1)),
        ("norm", MacroDef::with_args("\\left\\lVert#1\\right\\rVert", 1)),
        ("abs", MacroDef::with_args("\\left\\lvert#1\\right\\rvert", 1)),
        ("tbf", MacroDef::with_args("\\textbf{#1}", 1)),
        ("Span", MacroDef::literal("\\operatorname{span}")),
        ("rank", MacroDef::literal("\\operatorname{rank}")),
        ("diag", MacroDef::literal("\\operatorname{diag}")),
        ("image", MacroDef::literal("\\operatorname{Im}")),
        ("bmat", MacroDef::with_args("\\begin{bmatrix}#1\\end{bmatrix}", 1)),
        ("pmat", MacroDef::with_args("\\begin{pmatrix}#1\\end{pmatrix}", 1)),
        ("cmat", MacroDef::with_args("\\begin{Bmatrix}#1\\end{Bmatrix}", 1)),
        ("vmat", MacroDef::with_args("\\begin{vmatrix}#1\\end{vmatrix}", 1)),
        ("vvmat", MacroDef::with_args("\\begin{Vmatrix}#1\\end{Vmatrix}", 1)),
        ("matt", MacroDef::with_args("\\begin{bmatrix}#1\\end{bmatrix}", 1)),
    ]
    .into_iter()
    .collect();

    Configuration {
        loader: Loader {
            load: vec!["[tex]/boldsymbol".to_string()],
        },
        tex: TexOptions {
            packages: Packages {
                add: vec!["boldsymbol".to_string()],
            },
            macros,
            inline_math: DelimiterSet::new(vec![
                DelimiterPair::new("$", "$"),
                DelimiterPair::new("\\(", "\\)"),
            ]),
            display_math: DelimiterSet::new(vec![
                DelimiterPair::new("$$", "$$"),
                DelimiterPair::new("\\[", "\\]"),
            ]),
            process_escapes: true,
            process_environments: true,
        },
        options: RenderOptions {
            ignore_html_class: IGNORE_ALL_CLASSES.to_string(),
            process_html_class: MARKER_CLASS.to_string(),
        },
    }
}

impl Default for Configuration {
    fn default() -> Self {
        build_configuration()
    }
}

impl Configuration {
    /// Check macro arity, delimiter sets and class patterns.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.tex.macros.validate()?;
        delimiters::validate_delimiters(&self.tex.inline_math, &self.tex.display_math)?;
        self.class_filter()?;
        tracing::debug!(
            macros = self.tex.macros.len(),
            inline = self.tex.inline_math.len(),
            display = self.tex.display_math.len(),
            "configuration validated"
        );
        Ok(())
    }

    /// Compile the ignore/process class patterns.
    pub fn class_filter(&self) -> std::result::Result<ClassFilter, ConfigError> {
        ClassFilter::new(&self.options.ignore_html_class, &self.options.process_html_class)
    }

    /// Load an extension such as `boldsymbol`: `[tex]/<name>` is added to the
    /// loader and `<name>` to the package list. Adding twice is a no-op.
    pub fn add_extension(&mut self, name: &str) {
        let load = format!("[tex]/{name}");
        if !self.loader.load.contains(&load) {
            self.loader.load.push(load);
        }
        if !self.tex.packages.add.iter().any(|p| p == name) {
            self.tex.packages.add.push(name.to_string());
        }
    }

    /// The defaults with TOML overrides applied, validated.
    ///
    /// ```text
    /// extensions = ["cancel"]
    /// process_escapes = false
    ///
    /// [macros]
    /// Prob = "\\mathbb{P}"
    /// inner = ["\\langle #1, #2 \\rangle", 2]
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let raw: RawOverrides =
            toml::from_str(input).map_err(|e| ConfigError::Toml(e.to_string()))?;

        let mut config = build_configuration();
        raw.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Read overrides from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading configuration overrides");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// Raw override file structure for deserialization.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawOverrides {
    #[serde(default)]
    macros: IndexMap<String, MacroDef>,
    inline_math: Option<DelimiterSet>,
    display_math: Option<DelimiterSet>,
    process_escapes: Option<bool>,
    process_environments: Option<bool>,
    ignore_html_class: Option<String>,
    process_html_class: Option<String>,
    #[serde(default)]
    extensions: Vec<String>,
}

impl RawOverrides {
    fn apply(self, config: &mut Configuration) {
        for (name, def) in self.macros {
            if config.tex.macros.insert(name.as_str(), def).is_some() {
                tracing::trace!(%name, "macro redefined");
            }
        }
        if let Some(inline) = self.inline_math {
            config.tex.inline_math = inline;
        }
        if let Some(display) = self.display_math {
            config.tex.display_math = display;
        }
        if let Some(value) = self.process_escapes {
            config.tex.process_escapes = value;
        }
        if let Some(value) = self.process_environments {
            config.tex.process_environments = value;
        }
        if let Some(pattern) = self.ignore_html_class {
            config.options.ignore_html_class = pattern;
        }
        if let Some(pattern) = self.process_html_class {
            config.options.process_html_class = pattern;
        }
        for name in &self.extensions {
            config.add_extension(name);
        }
    }
}
