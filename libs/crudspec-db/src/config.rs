//! Compiler configuration.
//!
//! Loaded from the `crudspec` section of a [`Figment`]; a missing section
//! yields the defaults. Typical YAML:
//!
//! ```yaml
//! crudspec:
//!   dialect: postgres
//!   keyset_mode: lexicographic
//!   limits: { default: 25, max: 500 }
//!   strict_where: true
//! ```

use crudspec_query::QueryLimits;
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::Dialect;
use crate::columns::DEFAULT_COMPUTED_PREFIX;
use crate::error::ConfigError;

pub const CONFIG_SECTION: &str = "crudspec";
pub const DEFAULT_CURSOR_ALIAS: &str = "cursor_select";

/// How the keyset tuple comparison is expanded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeysetMode {
    /// `(a < a') OR (a = a' AND b < b') OR ...`
    #[default]
    Lexicographic,
    /// `(a < a') OR (a < a' AND b < b') OR ...`; skips rows that tie on an
    /// earlier column. Kept for compatibility with existing cursors.
    StrictPrefix,
}

/// Page size defaults and cap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct LimitCfg {
    pub default: u64,
    pub max: u64,
}

impl Default for LimitCfg {
    fn default() -> Self {
        Self {
            default: 25,
            max: 1000,
        }
    }
}

impl LimitCfg {
    /// Requested limit, or the default, bounded to `1..=max`.
    #[must_use]
    pub fn clamp(&self, requested: Option<u64>) -> u64 {
        let mut limit = requested.unwrap_or(self.default);
        if limit == 0 {
            limit = 1;
        }
        if limit > self.max {
            limit = self.max;
        }
        limit
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct CompilerConfig {
    /// Names starting with this prefix are computed expressions.
    pub computed_prefix: String,
    /// Alias of the anchor row inside the cursor subquery.
    pub cursor_alias: String,
    pub keyset_mode: KeysetMode,
    pub dialect: Dialect,
    pub limits: LimitCfg,
    /// Reject WHERE conjuncts that cannot be qualified instead of passing them through.
    pub strict_where: bool,
    /// Accept computed expressions sent by clients.
    pub allow_request_expressions: bool,
    pub max_sort_fields: usize,
    pub max_filters: usize,
    pub max_where_length: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        let limits = QueryLimits::default();
        Self {
            computed_prefix: DEFAULT_COMPUTED_PREFIX.to_owned(),
            cursor_alias: DEFAULT_CURSOR_ALIAS.to_owned(),
            keyset_mode: KeysetMode::default(),
            dialect: Dialect::default(),
            limits: LimitCfg::default(),
            strict_where: false,
            allow_request_expressions: false,
            max_sort_fields: limits.max_sort_fields,
            max_filters: limits.max_filters,
            max_where_length: limits.max_where_length,
        }
    }
}

impl CompilerConfig {
    /// Request caps derived from this configuration.
    #[must_use]
    pub fn query_limits(&self) -> QueryLimits {
        QueryLimits::new()
            .with_max_limit(self.limits.max)
            .with_max_sort_fields(self.max_sort_fields)
            .with_max_filters(self.max_filters)
            .with_max_where_length(self.max_where_length)
    }

    /// # Errors
    /// Returns a [`ConfigError`] describing the first inconsistent setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.default > self.limits.max || self.limits.max == 0 {
            return Err(ConfigError::InvalidLimits {
                default: self.limits.default,
                max: self.limits.max,
            });
        }
        if self.computed_prefix.trim().is_empty() {
            return Err(ConfigError::EmptyComputedPrefix);
        }
        let alias = self.cursor_alias.as_str();
        let plain = alias.chars().next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && alias.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !plain {
            return Err(ConfigError::InvalidCursorAlias(alias.to_owned()));
        }
        Ok(())
    }

    /// Extract and validate the `crudspec` section.
    ///
    /// # Errors
    /// Returns [`ConfigError::Extract`] when the section is malformed, or a
    /// validation error.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let cfg = if figment.contains(CONFIG_SECTION) {
            figment
                .extract_inner::<Self>(CONFIG_SECTION)
                .map_err(Box::new)?
        } else {
            Self::default()
        };
        cfg.validate()?;
        Ok(cfg)
    }
}
