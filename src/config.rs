//! Configuration loading and management.
//!
//! Configuration is loaded from multiple sources with the following precedence
//! (highest to lowest):
//!
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. `--config <path>`, or `.sql-guard.toml` in current directory
//! 4. `~/.config/sql-guard/config.toml`
//! 5. Default values
//!
//! A config file replaces the one loaded before it as a whole; missing keys
//! take their default. Files ending in `.yaml`/`.yml` are read as YAML, all
//! others as TOML.
//!
//! # Configuration File Format
//!
//! ```toml
//! violation_strategy = "block"    # block, warn, log
//! parse_failure = "fail_open"     # fail_open, fail_closed
//!
//! [dedup]
//! cache_size = 1000
//! ttl_ms = 100
//!
//! [rewrite]
//! default_max_rows = 1000
//! enforce_max_limit = true
//!
//! [rules]
//! disabled = ["GUARD017"]
//!
//! [rules.severity]
//! GUARD004 = "high"
//!
//! [rules.blacklist_fields]
//! fields = ["deleted", "status", "tenant_*"]
//!
//! [rules.no_pagination]
//! whitelist_mapper_ids = ["*.getById", "*.count*"]
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `SQL_GUARD_STRATEGY` | Violation strategy (block, warn, log) |
//! | `SQL_GUARD_MAX_ROWS` | Rewriter row cap |
//! | `SQL_GUARD_ENFORCE_MAX_LIMIT` | Cap existing limits above the row cap |
//! | `SQL_GUARD_PARSE_FAILURE` | fail_open or fail_closed |
//! | `SQL_GUARD_DEDUP_ENABLED` | Toggle per-thread deduplication |

use std::{
    collections::HashMap,
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, PoisonError, RwLock}
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::{AppResult, GuardError, config_error, file_read_error},
    query::SqlDialect,
    rules::RiskLevel,
    strategy::ViolationStrategy
};

/// Local config file name
pub const LOCAL_CONFIG_FILE: &str = ".sql-guard.toml";

/// Set operations that may appear in `allowed_operations`
pub const VALID_SET_OPERATIONS: &[&str] = &[
    "UNION",
    "UNION_ALL",
    "MINUS",
    "MINUS_ALL",
    "EXCEPT",
    "EXCEPT_ALL",
    "INTERSECT",
    "INTERSECT_ALL"
];

const VALID_PROFILES: &[&str] = &["dev", "test", "prod"];

/// Engine configuration.
///
/// Treated as an immutable snapshot once published through a
/// [`ConfigHandle`]; changes are made by swapping in a new value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Master switch; a disabled guard passes everything
    pub enabled:                      bool,
    /// Deployment profile label (dev, test, prod)
    pub active_strategy:              String,
    pub violation_strategy:           ViolationStrategy,
    pub parse_failure:                ParseFailureMode,
    /// Record a CRITICAL violation when a checker panics instead of skipping it
    pub fail_closed_on_checker_error: bool,
    /// Parser dialect for validation
    pub dialect:                      SqlDialect,
    pub dedup:                        DedupConfig,
    pub rewrite:                      RewriteConfig,
    pub pagination:                   PaginationConfig,
    pub rules:                        RulesConfig
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled:                      true,
            active_strategy:              String::from("prod"),
            violation_strategy:           ViolationStrategy::default(),
            parse_failure:                ParseFailureMode::default(),
            fail_closed_on_checker_error: false,
            dialect:                      SqlDialect::default(),
            dedup:                        DedupConfig::default(),
            rewrite:                      RewriteConfig::default(),
            pagination:                   PaginationConfig::default(),
            rules:                        RulesConfig::default()
        }
    }
}

/// What a verdict looks like when the SQL cannot be parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseFailureMode {
    /// Pass with a warning; text-level checkers still run
    #[default]
    FailOpen,
    /// Fail with a CRITICAL violation
    FailClosed
}

impl std::str::FromStr for ParseFailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "fail_open" | "open" => Ok(Self::FailOpen),
            "fail_closed" | "closed" => Ok(Self::FailClosed),
            other => Err(format!("unknown parse failure mode '{}'", other))
        }
    }
}

/// Per-thread deduplication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub enabled:       bool,
    pub cache_size:    usize,
    pub ttl_ms:        u64,
    /// Clear the calling thread's dedup cache when a pipeline call returns
    pub clear_on_exit: bool
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled:       true,
            cache_size:    1000,
            ttl_ms:        100,
            clear_on_exit: false
        }
    }
}

/// Row limit rewriting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    pub enabled:           bool,
    pub default_max_rows:  u64,
    pub enforce_max_limit: bool,
    /// Dialect name used when no datasource probe is available
    pub dialect:           Option<String>
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            enabled:           true,
            default_max_rows:  1000,
            enforce_max_limit: false,
            dialect:           None
        }
    }
}

/// Pagination thresholds shared by the pagination checkers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub max_offset:                 u64,
    pub max_page_size:              u64,
    /// A physical pagination plugin turns caller hints into SQL limits
    pub physical_pagination_plugin: bool
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_offset:                 10_000,
            max_page_size:              1_000,
            physical_pagination_plugin: false
        }
    }
}

/// Settings common to every checker
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Toggle {
    pub enabled: bool,
    /// Overrides the checker's default risk
    pub risk:    Option<RiskLevel>
}

impl Default for Toggle {
    fn default() -> Self {
        Self {
            enabled: true,
            risk:    None
        }
    }
}

/// Checker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Disabled rule IDs
    pub disabled:           Vec<String>,
    /// Risk overrides (rule_id -> risk)
    pub severity:           HashMap<String, RiskLevel>,
    pub no_where_clause:    Toggle,
    pub dummy_condition:    DummyConditionConfig,
    pub blacklist_fields:   BlacklistFieldsConfig,
    pub whitelist_fields:   WhitelistFieldsConfig,
    pub pagination_abuse:   Toggle,
    pub no_pagination:      NoPaginationConfig,
    pub multi_statement:    Toggle,
    pub set_operation:      SetOperationConfig,
    pub sql_comment:        SqlCommentConfig,
    pub into_outfile:       Toggle,
    pub dangerous_function: DangerousFunctionConfig,
    pub ddl_operation:      DdlOperationConfig,
    pub call_statement:     Toggle,
    pub denied_table:       DeniedTableConfig,
    pub read_only_table:    ReadOnlyTableConfig,
    pub metadata_statement: MetadataStatementConfig,
    pub set_statement:      Toggle
}

impl RulesConfig {
    pub fn is_disabled(&self, rule_id: &str) -> bool {
        self.disabled.iter().any(|d| d.eq_ignore_ascii_case(rule_id))
    }

    pub fn severity_override(&self, rule_id: &str) -> Option<RiskLevel> {
        self.severity
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(rule_id))
            .map(|(_, risk)| *risk)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DummyConditionConfig {
    #[serde(flatten)]
    pub toggle:          Toggle,
    pub patterns:        Vec<String>,
    pub custom_patterns: Vec<String>
}

impl Default for DummyConditionConfig {
    fn default() -> Self {
        Self {
            toggle:          Toggle::default(),
            patterns:        ["1=1", "1 = 1", "'1'='1'", "true", "'a'='a'"]
                .map(String::from)
                .to_vec(),
            custom_patterns: Vec::new()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlacklistFieldsConfig {
    #[serde(flatten)]
    pub toggle: Toggle,
    /// Low-selectivity fields; a trailing `*` matches by prefix
    pub fields: Vec<String>
}

impl Default for BlacklistFieldsConfig {
    fn default() -> Self {
        Self {
            toggle: Toggle::default(),
            fields: [
                "deleted",
                "del_flag",
                "status",
                "is_deleted",
                "enabled",
                "type"
            ]
            .map(String::from)
            .to_vec()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitelistFieldsConfig {
    #[serde(flatten)]
    pub toggle:                     Toggle,
    /// Table -> fields of which at least one must appear in WHERE
    pub by_table:                   IndexMap<String, Vec<String>>,
    /// Required fields for tables missing from `by_table`
    pub fields:                     Vec<String>,
    pub enforce_for_unknown_tables: bool
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NoPaginationConfig {
    #[serde(flatten)]
    pub toggle:                  Toggle,
    pub enforce_for_all_queries: bool,
    /// Caller id globs (`*.getById`) exempt from the check
    pub whitelist_mapper_ids:    Vec<String>,
    /// Table globs exempt from the check
    pub whitelist_tables:        Vec<String>,
    /// Extra unique keys besides `id`
    pub unique_key_fields:       Vec<String>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetOperationConfig {
    #[serde(flatten)]
    pub toggle:             Toggle,
    pub allowed_operations: Vec<String>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SqlCommentConfig {
    #[serde(flatten)]
    pub toggle:              Toggle,
    pub allow_hint_comments: bool
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DangerousFunctionConfig {
    #[serde(flatten)]
    pub toggle:           Toggle,
    pub denied_functions: Vec<String>
}

impl Default for DangerousFunctionConfig {
    fn default() -> Self {
        Self {
            toggle:           Toggle::default(),
            denied_functions: [
                "load_file",
                "into_outfile",
                "into_dumpfile",
                "sys_exec",
                "sys_eval",
                "sleep",
                "benchmark",
                "pg_sleep",
                "waitfor",
                "xp_cmdshell",
                "dbms_pipe"
            ]
            .map(String::from)
            .to_vec()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DdlOperationConfig {
    #[serde(flatten)]
    pub toggle:             Toggle,
    /// Any of CREATE, ALTER, DROP, TRUNCATE
    pub allowed_operations: Vec<String>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeniedTableConfig {
    #[serde(flatten)]
    pub toggle:        Toggle,
    /// Table globs; `*` matches a run of non-underscore characters
    pub denied_tables: Vec<String>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadOnlyTableConfig {
    #[serde(flatten)]
    pub toggle:          Toggle,
    /// Exact names or `prefix*`
    pub readonly_tables: Vec<String>
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataStatementConfig {
    #[serde(flatten)]
    pub toggle:             Toggle,
    /// Any of SHOW, DESCRIBE, USE
    pub allowed_statements: Vec<String>
}

impl GuardConfig {
    /// Load configuration from files and environment
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file in current directory (.sql-guard.toml)
    /// 3. Config file in home directory (~/.config/sql-guard/config.toml)
    /// 4. Default values
    pub fn load() -> AppResult<Self> {
        Self::load_from(None)
    }

    /// Like [`GuardConfig::load`], reading `path` instead of the local file
    pub fn load_from(path: Option<&Path>) -> AppResult<Self> {
        let mut config = Self::default();

        // Try to load from home directory config
        if let Some(home) = env::var_os("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("sql-guard")
                .join("config.toml");

            if home_config.exists() {
                config = Self::from_file(&home_config)?;
            }
        }

        match path {
            Some(path) => config = Self::from_file(path)?,
            None => {
                let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
                if local_config.exists() {
                    config = Self::from_file(&local_config)?;
                }
            }
        }

        config.apply_env_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML or YAML file, picked by extension
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let content =
            fs::read_to_string(path).map_err(|e| file_read_error(&path.display().to_string(), e))?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
        let config = if is_yaml {
            Self::from_yaml_str(&content)?
        } else {
            Self::from_toml_str(&content)?
        };
        info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        toml::from_str(content).map_err(|e| config_error(format!("Invalid config file: {}", e)))
    }

    pub fn from_yaml_str(content: &str) -> AppResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| config_error(format!("Invalid config file: {}", e)))
    }

    /// Apply `SQL_GUARD_*` overrides read through `lookup`
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>
    ) -> AppResult<()> {
        if let Some(strategy) = lookup("SQL_GUARD_STRATEGY") {
            self.violation_strategy = strategy
                .parse()
                .map_err(|e: String| config_error(format!("SQL_GUARD_STRATEGY: {}", e)))?;
        }

        if let Some(max_rows) = lookup("SQL_GUARD_MAX_ROWS") {
            self.rewrite.default_max_rows = max_rows.trim().parse().map_err(|e| {
                config_error(format!("SQL_GUARD_MAX_ROWS: invalid number '{}': {}", max_rows, e))
            })?;
        }

        if let Some(enforce) = lookup("SQL_GUARD_ENFORCE_MAX_LIMIT") {
            self.rewrite.enforce_max_limit = parse_flag("SQL_GUARD_ENFORCE_MAX_LIMIT", &enforce)?;
        }

        if let Some(mode) = lookup("SQL_GUARD_PARSE_FAILURE") {
            self.parse_failure = mode
                .parse()
                .map_err(|e: String| config_error(format!("SQL_GUARD_PARSE_FAILURE: {}", e)))?;
        }

        if let Some(enabled) = lookup("SQL_GUARD_DEDUP_ENABLED") {
            self.dedup.enabled = parse_flag("SQL_GUARD_DEDUP_ENABLED", &enabled)?;
        }

        Ok(())
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> Result<(), GuardError> {
        if !VALID_PROFILES.contains(&self.active_strategy.as_str()) {
            return Err(GuardError::config(format!(
                "active_strategy must be one of [dev, test, prod], got: {}",
                self.active_strategy
            )));
        }
        if self.dedup.cache_size == 0 {
            return Err(GuardError::config("dedup.cache_size must be > 0"));
        }
        if self.dedup.ttl_ms == 0 {
            return Err(GuardError::config("dedup.ttl_ms must be > 0"));
        }
        if self.pagination.max_offset == 0 {
            return Err(GuardError::config("pagination.max_offset must be > 0"));
        }
        if self.pagination.max_page_size == 0 {
            return Err(GuardError::config("pagination.max_page_size must be > 0"));
        }
        if self.rewrite.default_max_rows == 0 {
            return Err(GuardError::config("rewrite.default_max_rows must be > 0"));
        }

        let dummy = &self.rules.dummy_condition;
        if dummy.toggle.enabled && dummy.patterns.is_empty() && dummy.custom_patterns.is_empty() {
            return Err(GuardError::config(
                "rules.dummy_condition.patterns or custom_patterns must not be empty when the rule is enabled"
            ));
        }

        for op in &self.rules.set_operation.allowed_operations {
            let normalized = op.trim().to_ascii_uppercase().replace(' ', "_");
            if !VALID_SET_OPERATIONS.contains(&normalized.as_str()) {
                return Err(GuardError::config(format!(
                    "rules.set_operation.allowed_operations: unknown operation '{}', expected one of {:?}",
                    op, VALID_SET_OPERATIONS
                )));
            }
        }

        Ok(())
    }
}

fn parse_flag(name: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(config_error(format!(
            "{}: expected a boolean, got '{}'",
            name, other
        )))
    }
}

/// Shared, hot-swappable configuration.
///
/// Readers take an `Arc` snapshot and keep using it for the whole call;
/// [`ConfigHandle::swap`] publishes a new snapshot only after it validates.
#[derive(Debug)]
pub struct ConfigHandle {
    current: RwLock<Arc<GuardConfig>>
}

impl ConfigHandle {
    pub fn new(config: GuardConfig) -> Result<Self, GuardError> {
        config.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(config))
        })
    }

    /// Current configuration snapshot
    pub fn snapshot(&self) -> Arc<GuardConfig> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the configuration, returning the previous snapshot.
    ///
    /// An invalid config is rejected and the current one stays in place.
    pub fn swap(&self, config: GuardConfig) -> Result<Arc<GuardConfig>, GuardError> {
        config.validate()?;
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = std::mem::replace(&mut *guard, Arc::new(config));
        info!(strategy = %guard.violation_strategy, "configuration swapped");
        Ok(previous)
    }

    /// Re-read a config file and swap it in
    pub fn reload_from(&self, path: &Path) -> AppResult<Arc<GuardConfig>> {
        let config = GuardConfig::from_file(path)?;
        Ok(self.swap(config)?)
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(GuardConfig::default()))
        }
    }
}
