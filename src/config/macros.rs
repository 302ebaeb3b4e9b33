//! Macro table and TeX-style macro expansion.

use crate::error::ConfigError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum number of expansion passes before a macro is considered recursive.
pub const MAX_EXPANSION_DEPTH: usize = 32;

/// Maximum number of macro calls expanded for one source, across all passes.
/// Matches MathJax's `maxMacros` default.
pub const MAX_MACRO_EXPANSIONS: usize = 10_000;

/// Maximum length in bytes of expanded output. Matches MathJax's `maxBuffer`
/// default.
pub const MAX_EXPANSION_LEN: usize = 5 * 1024;

/// A single macro definition.
///
/// Serializes the way the engine expects it: a bare string for literal macros
/// and a `[template, arity]` pair for macros taking arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawMacro", into = "RawMacro")]
pub enum MacroDef {
    /// Replaced verbatim; takes no arguments.
    Literal(String),
    /// Template using `#1`..`#9` for positional arguments.
    Parameterized { template: String, arity: usize },
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawMacro {
    Literal(String),
    WithArgs(String, usize),
}

impl From<RawMacro> for MacroDef {
    fn from(raw: RawMacro) -> Self {
        match raw {
            RawMacro::Literal(template) => MacroDef::Literal(template),
            RawMacro::WithArgs(template, arity) => MacroDef::Parameterized { template, arity },
        }
    }
}

impl From<MacroDef> for RawMacro {
    fn from(def: MacroDef) -> Self {
        match def {
            MacroDef::Literal(template) => RawMacro::Literal(template),
            MacroDef::Parameterized { template, arity } => RawMacro::WithArgs(template, arity),
        }
    }
}

impl MacroDef {
    /// A macro replaced by `template` as is.
    pub fn literal(template: impl Into<String>) -> Self {
        MacroDef::Literal(template.into())
    }

    /// A macro taking `arity` arguments.
    pub fn with_args(template: impl Into<String>, arity: usize) -> Self {
        MacroDef::Parameterized {
            template: template.into(),
            arity,
        }
    }

    pub fn template(&self) -> &str {
        match self {
            MacroDef::Literal(template) => template,
            MacroDef::Parameterized { template, .. } => template,
        }
    }

    /// Number of arguments the macro consumes (0 for literal macros).
    pub fn arity(&self) -> usize {
        match self {
            MacroDef::Literal(_) => 0,
            MacroDef::Parameterized { arity, .. } => *arity,
        }
    }
}

/// Macro definitions keyed by name (without the leading backslash).
///
/// Iteration follows declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MacroTable {
    entries: IndexMap<String, MacroDef>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or redefine a macro. Returns the previous definition, if any.
    pub fn insert(&mut self, name: impl Into<String>, def: MacroDef) -> Option<MacroDef> {
        self.entries.insert(name.into(), def)
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MacroDef)> {
        self.entries.iter().map(|(name, def)| (name.as_str(), def))
    }

    /// Check every entry: names must be control words, templates must not call
    /// their own macro and each template must reference exactly `arity`
    /// distinct placeholders, none above `arity`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, def) in &self.entries {
            validate_entry(name, def)?;
        }
        tracing::trace!(count = self.entries.len(), "macro table validated");
        Ok(())
    }

    /// Expand a single invocation of `name` with already separated arguments.
    pub fn expand_macro(&self, name: &str, args: &[&str]) -> Result<String, ConfigError> {
        let def = self
            .entries
            .get(name)
            .ok_or_else(|| ConfigError::UnknownMacro(name.to_string()))?;

        if args.len() != def.arity() {
            return Err(ConfigError::WrongArgumentCount {
                name: name.to_string(),
                expected: def.arity(),
                found: args.len(),
            });
        }

        Ok(substitute(def.template(), args))
    }

    /// Expand every macro call in `source` until none remain.
    ///
    /// Fails with [`ConfigError::RecursiveMacro`] when the passes, the number
    /// of calls or the output length exceed their limits.
    pub fn expand(&self, source: &str) -> Result<String, ConfigError> {
        if self.entries.is_empty() {
            return Ok(source.to_string());
        }

        let mut budget = MAX_MACRO_EXPANSIONS;
        let mut current = source.to_string();
        for _ in 0..MAX_EXPANSION_DEPTH {
            let (expanded, last) = self.expand_once(&current, &mut budget)?;
            if last.is_none() {
                return Ok(current);
            }
            current = expanded;
        }

        match self.expand_once(&current, &mut budget)? {
            (_, Some(name)) => Err(ConfigError::RecursiveMacro(name)),
            (_, None) => Ok(current),
        }
    }

    /// One left-to-right pass. Returns the output and the name of the last
    /// macro expanded, or `None` when nothing was expanded. Every call
    /// consumes one unit of `budget`.
    fn expand_once(
        &self,
        source: &str,
        budget: &mut usize,
    ) -> Result<(String, Option<String>), ConfigError> {
        let mut out = String::with_capacity(source.len());
        let mut last = None;
        let mut boundary = false;
        let mut rest = source;

        while let Some(pos) = rest.find('\\') {
            push_text(&mut out, &rest[..pos], &mut boundary);
            let after = &rest[pos + 1..];
            let name_len = control_word_len(after);

            if name_len == 0 {
                // Control symbol or escaped backslash, copied through whole.
                let len = after.chars().next().map_or(0, char::len_utf8);
                push_text(&mut out, &rest[pos..pos + 1 + len], &mut boundary);
                rest = &after[len..];
                continue;
            }

            let name = &after[..name_len];
            let tail = &after[name_len..];

            if self.entries.contains_key(name) {
                *budget = budget
                    .checked_sub(1)
                    .ok_or_else(|| ConfigError::RecursiveMacro(name.to_string()))?;
            }

            match self.entries.get(name) {
                Some(def) if def.arity() == 0 => {
                    boundary = true;
                    push_text(&mut out, def.template(), &mut boundary);
                    boundary = true;
                    rest = tail;
                }
                Some(def) => {
                    let (args, remaining) = take_arguments(tail, def.arity())
                        .ok_or_else(|| ConfigError::MissingArgument(name.to_string()))?;
                    boundary = true;
                    push_text(&mut out, &substitute(def.template(), &args), &mut boundary);
                    boundary = true;
                    rest = remaining;
                }
                None => {
                    push_text(&mut out, &rest[pos..pos + 1 + name_len], &mut boundary);
                    rest = tail;
                    continue;
                }
            }

            if out.len() > MAX_EXPANSION_LEN {
                return Err(ConfigError::RecursiveMacro(name.to_string()));
            }
            last = Some(name.to_string());
        }

        push_text(&mut out, rest, &mut boundary);
        Ok((out, last))
    }
}

impl<N: Into<String>> FromIterator<(N, MacroDef)> for MacroTable {
    fn from_iter<I: IntoIterator<Item = (N, MacroDef)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(name, def)| (name.into(), def)).collect(),
        }
    }
}

/// Distinct placeholder indices (`#1`..`#9`) referenced by a template.
/// `##` is an escaped hash and is not a placeholder.
pub fn placeholders(template: &str) -> BTreeSet<usize> {
    let mut found = BTreeSet::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '#' {
            continue;
        }
        match chars.peek() {
            Some('#') => {
                chars.next();
            }
            Some(d) => {
                if let Some(n) = d.to_digit(10).filter(|&n| n > 0) {
                    found.insert(n as usize);
                }
            }
            None => {}
        }
    }

    found
}

fn validate_entry(name: &str, def: &MacroDef) -> Result<(), ConfigError> {
    if name.is_empty() || control_word_len(name) != name.len() {
        return Err(ConfigError::InvalidMacroName(name.to_string()));
    }

    if control_words(def.template()).any(|word| word == name) {
        return Err(ConfigError::RecursiveMacro(name.to_string()));
    }

    let arity = def.arity();
    let used = placeholders(def.template());

    if let Some(&index) = used.iter().find(|&&index| index > arity) {
        return Err(ConfigError::PlaceholderOutOfRange {
            name: name.to_string(),
            index,
            arity,
        });
    }

    if used.len() != arity {
        return Err(ConfigError::ArityMismatch {
            name: name.to_string(),
            declared: arity,
            found: used.len(),
        });
    }

    Ok(())
}

/// Replace each placeholder with its argument. Arguments are inserted once and
/// never rescanned for placeholders.
fn substitute(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len() + args.iter().map(|a| a.len()).sum::<usize>());
    let mut boundary = false;
    let mut chars = template.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c == '#' {
            match chars.peek().map(|&(_, d)| d) {
                Some('#') => {
                    chars.next();
                    push_text(&mut out, "#", &mut boundary);
                    continue;
                }
                Some(d) => {
                    let index = d.to_digit(10).unwrap_or(0) as usize;
                    if (1..=args.len()).contains(&index) {
                        chars.next();
                        boundary = true;
                        push_text(&mut out, args[index - 1], &mut boundary);
                        boundary = true;
                        continue;
                    }
                }
                None => {}
            }
        }
        push_text(&mut out, &template[i..i + c.len_utf8()], &mut boundary);
    }

    out
}

/// Append `text`. When `boundary` is set, a control word at the end of `out`
/// is kept from fusing with leading letters of `text`. Clears `boundary`.
fn push_text(out: &mut String, text: &str, boundary: &mut bool) {
    let Some(first) = text.chars().next() else {
        return;
    };
    if *boundary && first.is_ascii_alphabetic() && ends_with_control_word(out) {
        out.push(' ');
    }
    *boundary = false;
    out.push_str(text);
}

/// True when `s` ends in an unescaped control word such as `\lVert`.
fn ends_with_control_word(s: &str) -> bool {
    let letters = s.bytes().rev().take_while(u8::is_ascii_alphabetic).count();
    if letters == 0 {
        return false;
    }
    let backslashes = s.as_bytes()[..s.len() - letters]
        .iter()
        .rev()
        .take_while(|&&b| b == b'\\')
        .count();
    backslashes % 2 == 1
}

/// Control words in `s`, skipping control symbols and escaped backslashes.
fn control_words(s: &str) -> impl Iterator<Item = &str> {
    let mut rest = s;
    std::iter::from_fn(move || {
        while let Some(pos) = rest.find('\\') {
            let after = &rest[pos + 1..];
            let len = control_word_len(after);
            if len == 0 {
                let skip = after.chars().next().map_or(0, char::len_utf8);
                rest = &after[skip..];
                continue;
            }
            rest = &after[len..];
            return Some(&after[..len]);
        }
        None
    })
}

fn control_word_len(s: &str) -> usize {
    s.bytes().take_while(u8::is_ascii_alphabetic).count()
}

fn take_arguments(input: &str, count: usize) -> Option<(Vec<&str>, &str)> {
    let mut args = Vec::with_capacity(count);
    let mut remaining = input;

    for _ in 0..count {
        let (arg, rest) = take_argument(remaining.trim_start())?;
        args.push(arg);
        remaining = rest;
    }

    Some((args, remaining))
}

/// A brace group (braces stripped) or a single token.
fn take_argument(input: &str) -> Option<(&str, &str)> {
    let first = input.chars().next()?;
    match first {
        '{' => {
            let end = matching_brace(input)?;
            Some((&input[1..end], &input[end + 1..]))
        }
        '}' => None,
        '\\' => {
            let after = &input[1..];
            let len = match control_word_len(after) {
                0 => after.chars().next()?.len_utf8(),
                n => n,
            };
            Some((&input[..1 + len], &input[1 + len..]))
        }
        c => Some(input.split_at(c.len_utf8())),
    }
}

/// Byte index of the brace closing the group opened at the start of `input`.
pub(crate) fn matching_brace(input: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut escaped = false;

    for (i, c) in input.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> MacroTable {
        [
            ("R", MacroDef::literal("\\mathbb{R}")),
            ("Span", MacroDef::literal("\\operatorname{span}")),
            ("vecb", MacroDef::with_args("\\boldsymbol{#1}", 1)),
            ("norm", MacroDef::with_args("\\left\\lVert#1\\right\\rVert", 1)),
            ("pair", MacroDef::with_args("(#1, #2)", 2)),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_expand_literal_macro() {
        assert_eq!(table().expand_macro("R", &[]).unwrap(), "\\mathbb{R}");
    }

    #[test]
    fn test_expand_norm_inserts_token_boundary() {
        assert_eq!(
            table().expand_macro("norm", &["x"]).unwrap(),
            "\\left\\lVert x\\right\\rVert"
        );
    }

    #[test]
    fn test_expand_macro_argument_count() {
        let err = table().expand_macro("norm", &[]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::WrongArgumentCount {
                name: "norm".into(),
                expected: 1,
                found: 0
            }
        );
        assert!(matches!(
            table().expand_macro("R", &["x"]),
            Err(ConfigError::WrongArgumentCount { .. })
        ));
        assert_eq!(
            table().expand_macro("nope", &[]),
            Err(ConfigError::UnknownMacro("nope".into()))
        );
    }

    #[test]
    fn test_substitution_is_not_rescanned() {
        assert_eq!(table().expand_macro("pair", &["#2", "b"]).unwrap(), "(#2, b)");
    }

    #[test]
    fn test_expand_source() {
        let result = table().expand("x \\in \\R^n, \\vecb{v} \\in \\Span S").unwrap();
        assert_eq!(result, "x \\in \\mathbb{R}^n, \\boldsymbol{v} \\in \\operatorname{span} S");
    }

    #[test]
    fn test_expand_respects_control_word_boundary() {
        assert_eq!(table().expand("\\Rank + \\R").unwrap(), "\\Rank + \\mathbb{R}");
        assert_eq!(table().expand("\\\\R").unwrap(), "\\\\R");
    }

    #[test]
    fn test_expand_nested_and_single_token_arguments() {
        assert_eq!(
            table().expand("\\norm{\\vecb{x}_{i}}").unwrap(),
            "\\left\\lVert\\boldsymbol{x}_{i}\\right\\rVert"
        );
        assert_eq!(table().expand("\\vecb x").unwrap(), "\\boldsymbol{x}");
        assert_eq!(table().expand("\\pair{a}\\alpha").unwrap(), "(a, \\alpha)");
        assert_eq!(table().expand("\\norm{x}y").unwrap(), "\\left\\lVert x\\right\\rVert y");
    }

    #[test]
    fn test_expand_missing_argument() {
        assert_eq!(
            table().expand("\\vecb{x"),
            Err(ConfigError::MissingArgument("vecb".into()))
        );
        assert_eq!(
            table().expand("{\\vecb}"),
            Err(ConfigError::MissingArgument("vecb".into()))
        );
    }

    #[test]
    fn test_expand_detects_recursion() {
        let mut macros = table();
        macros.insert("loop", MacroDef::literal("a\\loop"));
        assert_eq!(
            macros.expand("\\loop"),
            Err(ConfigError::RecursiveMacro("loop".into()))
        );
    }

    #[test]
    fn test_expand_detects_exponential_recursion() {
        let mut macros = table();
        macros.insert("dbl", MacroDef::literal("\\dbl\\dbl"));
        assert_eq!(
            macros.expand("\\dbl"),
            Err(ConfigError::RecursiveMacro("dbl".into()))
        );

        // Mutual recursion passes validation but still hits the limits.
        let mut macros = table();
        macros.insert("ping", MacroDef::literal("\\pong\\pong"));
        macros.insert("pong", MacroDef::literal("\\ping\\ping"));
        assert!(macros.validate().is_ok());
        assert!(matches!(macros.expand("\\ping"), Err(ConfigError::RecursiveMacro(_))));
    }

    #[test]
    fn test_expand_output_limit() {
        let mut macros = MacroTable::new();
        macros.insert("big", MacroDef::literal("x".repeat(MAX_EXPANSION_LEN + 1)));
        assert_eq!(macros.expand("\\big"), Err(ConfigError::RecursiveMacro("big".into())));
    }

    #[test]
    fn test_validate_rejects_self_reference() {
        let mut bad = MacroTable::new();
        bad.insert("dbl", MacroDef::literal("\\dbl\\dbl"));
        assert_eq!(bad.validate(), Err(ConfigError::RecursiveMacro("dbl".into())));

        let mut ok = MacroTable::new();
        ok.insert("dbl", MacroDef::literal("\\\\dbl \\dblx"));
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_placeholders() {
        assert!(placeholders("\\mathbb{R}").is_empty());
        assert_eq!(placeholders("\\frac{#1}{#2}#1").into_iter().collect::<Vec<_>>(), vec![1, 2]);
        assert!(placeholders("##1").is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(table().validate().is_ok());

        let mut bad = MacroTable::new();
        bad.insert("frac", MacroDef::with_args("\\dfrac{#1}{#2}", 3));
        assert_eq!(
            bad.validate(),
            Err(ConfigError::ArityMismatch {
                name: "frac".into(),
                declared: 3,
                found: 2
            })
        );

        let mut bad = MacroTable::new();
        bad.insert("v", MacroDef::with_args("#2", 1));
        assert!(matches!(
            bad.validate(),
            Err(ConfigError::PlaceholderOutOfRange { index: 2, arity: 1, .. })
        ));

        let mut bad = MacroTable::new();
        bad.insert("x1", MacroDef::literal("x"));
        assert_eq!(bad.validate(), Err(ConfigError::InvalidMacroName("x1".into())));
    }

    #[test]
    fn test_serialized_layout() {
        let json = serde_json::to_string(&table()).unwrap();
        assert!(json.starts_with(r#"{"R":"\\mathbb{R}","Span""#));
        assert!(json.contains(r#""vecb":["\\boldsymbol{#1}",1]"#));

        let back: MacroTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table());
    }
}
