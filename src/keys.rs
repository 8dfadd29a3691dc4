//! Permission key construction and parsing.
//!
//! A key is `format(action) + separator + format(subject)`. Parsing only
//! splits on the first separator; it never tries to undo the case transform.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::PermissionKeyConfig;
use crate::errors::{GuardianError, GuardianResult};
use crate::strings;

/// Case transform applied to both halves of a permission key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseStyle {
    Snake,
    Kebab,
    Pascal,
    Camel,
    UpperSnake,
    LowerSnake,
}

impl CaseStyle {
    pub const ALL: [CaseStyle; 6] = [
        CaseStyle::Snake,
        CaseStyle::Kebab,
        CaseStyle::Pascal,
        CaseStyle::Camel,
        CaseStyle::UpperSnake,
        CaseStyle::LowerSnake,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStyle::Snake => "snake",
            CaseStyle::Kebab => "kebab",
            CaseStyle::Pascal => "pascal",
            CaseStyle::Camel => "camel",
            CaseStyle::UpperSnake => "upper_snake",
            CaseStyle::LowerSnake => "lower_snake",
        }
    }

    pub fn apply(&self, value: &str) -> String {
        match self {
            CaseStyle::Snake => strings::snake(value),
            CaseStyle::Kebab => strings::kebab(value),
            CaseStyle::Pascal => strings::studly(value),
            CaseStyle::Camel => strings::camel(value),
            CaseStyle::UpperSnake => strings::upper_snake(value),
            CaseStyle::LowerSnake => strings::snake(value).to_lowercase(),
        }
    }
}

impl fmt::Display for CaseStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CaseStyle {
    type Err = GuardianError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        CaseStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == value)
            .ok_or_else(|| {
                let valid: Vec<&str> = CaseStyle::ALL.iter().map(|s| s.as_str()).collect();
                GuardianError::configuration(format!(
                    "invalid case '{}'. Valid options: {}",
                    value,
                    valid.join(", ")
                ))
            })
    }
}

/// Strategy for building and parsing permission keys.
///
/// [`KeyCodec`] is the default implementation. Callers hold it as a
/// [`SharedKeyBuilder`] so a custom scheme can be injected at construction.
pub trait PermissionKeyBuilder: Send + Sync + fmt::Debug {
    fn build(&self, action: &str, subject: &str) -> String;

    fn format(&self, value: &str) -> String;

    fn separator(&self) -> &str;

    fn case(&self) -> CaseStyle;

    /// Everything after the first separator, or the whole key when the
    /// separator is empty or missing.
    fn extract_subject<'k>(&self, key: &'k str) -> &'k str {
        self.parse(key).map(|(_, subject)| subject).unwrap_or(key)
    }

    /// Splits a key into `(action, subject)` on the first separator.
    fn parse<'k>(&self, key: &'k str) -> Option<(&'k str, &'k str)> {
        let separator = self.separator();
        if separator.is_empty() {
            return None;
        }
        key.split_once(separator)
    }
}

pub type SharedKeyBuilder = Arc<dyn PermissionKeyBuilder>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    separator: String,
    case: CaseStyle,
}

impl KeyCodec {
    /// Fails with a configuration error when `case` is not a known style.
    pub fn new(separator: impl Into<String>, case: &str) -> GuardianResult<Self> {
        Ok(Self {
            separator: separator.into(),
            case: case.parse()?,
        })
    }

    pub fn with_style(separator: impl Into<String>, case: CaseStyle) -> Self {
        Self {
            separator: separator.into(),
            case,
        }
    }

    pub fn from_config(config: &PermissionKeyConfig) -> GuardianResult<Self> {
        Self::new(config.separator.clone(), &config.case)
    }

    pub fn shared(self) -> SharedKeyBuilder {
        Arc::new(self)
    }
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::with_style(":", CaseStyle::Pascal)
    }
}

impl PermissionKeyBuilder for KeyCodec {
    fn build(&self, action: &str, subject: &str) -> String {
        format!("{}{}{}", self.format(action), self.separator, self.format(subject))
    }

    fn format(&self, value: &str) -> String {
        self.case.apply(value)
    }

    fn separator(&self) -> &str {
        &self.separator
    }

    fn case(&self) -> CaseStyle {
        self.case
    }
}
