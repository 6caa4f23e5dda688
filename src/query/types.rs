use std::fmt;

use serde::{Deserialize, Serialize};

use super::scan::leading_keyword;

/// Command kind of a statement as seen by the checker chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CommandKind {
    Select,
    Insert,
    Update,
    Delete,
    #[default]
    Unknown
}

impl CommandKind {
    /// Infer the command kind from the leading keyword of raw SQL
    pub fn infer(sql: &str) -> Self {
        match leading_keyword(sql).as_str() {
            "SELECT" | "WITH" => Self::Select,
            "INSERT" | "REPLACE" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            _ => Self::Unknown
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Self::Insert | Self::Update | Self::Delete)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Unknown => write!(f, "UNKNOWN")
        }
    }
}

/// Value of a LIMIT/OFFSET/TOP/FETCH operand
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LimitValue {
    /// Literal row count
    Literal(u64),
    /// Bind parameter (`?`, `$1`, `:name`, `#{}` placeholders)
    Placeholder(String),
    /// Anything else, kept as rendered SQL
    Expression(String)
}

impl LimitValue {
    pub fn literal(&self) -> Option<u64> {
        match self {
            Self::Literal(n) => Some(*n),
            _ => None
        }
    }

    pub fn is_dynamic(&self) -> bool {
        !matches!(self, Self::Literal(_))
    }
}

impl fmt::Display for LimitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(n) => write!(f, "{}", n),
            Self::Placeholder(p) | Self::Expression(p) => f.write_str(p)
        }
    }
}

/// Which SQL construct carries the row cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LimitSyntax {
    Limit,
    Top,
    Fetch,
    RowNum
}

/// Row limiting found on a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitInfo {
    pub syntax: LimitSyntax,
    pub limit:  Option<LimitValue>,
    pub offset: Option<LimitValue>
}

impl LimitInfo {
    pub fn limit_literal(&self) -> Option<u64> {
        self.limit.as_ref().and_then(LimitValue::literal)
    }

    pub fn offset_literal(&self) -> Option<u64> {
        self.offset.as_ref().and_then(LimitValue::literal)
    }
}
