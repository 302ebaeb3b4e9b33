//! HTML class filters deciding which elements are searched for math.
//!
//! Both patterns are regular expressions matched against whole class names in
//! an element's space-separated class list, the same way the engine wraps them:
//! `(^| )(pattern)( |$)`. The process pattern wins over the ignore pattern, so
//! an ignore pattern of `.*|` together with a marker class makes math opt-in.

use crate::error::ConfigError;
use regex::Regex;

/// Compiled ignore/process class patterns.
#[derive(Debug, Clone)]
pub struct ClassFilter {
    ignore: Regex,
    process: Regex,
}

impl ClassFilter {
    pub fn new(ignore_pattern: &str, process_pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            ignore: class_regex(ignore_pattern)?,
            process: class_regex(process_pattern)?,
        })
    }

    /// Does the raw ignore pattern match this class list?
    pub fn matches_ignore(&self, classes: &str) -> bool {
        self.ignore.is_match(&normalize(classes))
    }

    /// Does the process pattern match this class list?
    pub fn matches_process(&self, classes: &str) -> bool {
        self.process.is_match(&normalize(classes))
    }

    /// Whether an element with these classes is searched for math.
    pub fn should_process(&self, classes: &str) -> bool {
        let classes = normalize(classes);
        self.process.is_match(&classes) || !self.ignore.is_match(&classes)
    }

    pub fn is_ignored(&self, classes: &str) -> bool {
        !self.should_process(classes)
    }
}

fn class_regex(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("(^| )({pattern})( |$)")).map_err(|e| ConfigError::InvalidClassPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

fn normalize(classes: &str) -> String {
    classes.split_whitespace().collect::<Vec<_>>().join(" ")
}
