//! Quote-aware lexical scan of raw SQL text.
//!
//! Runs without the parser, so it also works on text sqlparser rejects. One
//! pass yields:
//!
//! - `code`: the SQL with comments removed and string literal contents
//!   blanked (`'abc'` becomes `''`), suitable for keyword regexes
//! - `comments`: every comment found outside of quotes
//! - `statements`: top-level `;`-separated statements holding actual code
//!
//! All delimiters are ASCII, so scanning bytes never splits a UTF-8 sequence.
//!
//! Where a string literal ends depends on the dialect: MySQL treats `\'` as
//! an escaped quote, standard SQL ends the literal right there. Text that
//! hides a `;` or `--` behind that difference is only caught when it is
//! scanned with the rules the database will actually apply.

use serde::Serialize;

use super::SqlDialect;

/// How a backslash inside `'...'` is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    /// `\'` escapes the quote (MySQL family)
    Backslash,
    /// Only `''` escapes the quote; `E'...'` strings still honour backslashes
    Standard
}

impl QuoteStyle {
    /// Quoting rules to scan with for a dialect.
    ///
    /// The generic dialect does not know which database it talks to, so it
    /// gets both and checkers report what either scan finds.
    pub fn for_dialect(dialect: SqlDialect) -> &'static [QuoteStyle] {
        match dialect {
            SqlDialect::MySQL => &[QuoteStyle::Backslash],
            SqlDialect::PostgreSQL | SqlDialect::MsSql => &[QuoteStyle::Standard],
            _ => &[QuoteStyle::Backslash, QuoteStyle::Standard]
        }
    }
}

/// Comment flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CommentKind {
    /// `-- ...`
    Line,
    /// `/* ... */`
    Block,
    /// Optimizer hint `/*+ ... */`
    Hint,
    /// MySQL `# ...`
    Hash
}

impl std::fmt::Display for CommentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Line => write!(f, "line comment"),
            Self::Block => write!(f, "block comment"),
            Self::Hint => write!(f, "optimizer hint"),
            Self::Hash => write!(f, "hash comment")
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment<'a> {
    pub kind:   CommentKind,
    pub text:   &'a str,
    pub offset: usize
}

#[derive(Debug, Clone, Default)]
pub struct ScanResult<'a> {
    pub code:       String,
    pub comments:   Vec<Comment<'a>>,
    pub statements: Vec<&'a str>
}

impl ScanResult<'_> {
    /// More than one statement carries code
    pub fn is_stacked(&self) -> bool {
        self.statements.len() > 1
    }
}

/// Scan with MySQL quoting rules
pub fn scan(sql: &str) -> ScanResult<'_> {
    scan_with(sql, QuoteStyle::Backslash)
}

/// Scan with explicit quoting rules
pub fn scan_with(sql: &str, style: QuoteStyle) -> ScanResult<'_> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut result = ScanResult {
        code: String::with_capacity(len),
        ..Default::default()
    };
    let mut i = 0;
    let mut seg_start = 0;
    let mut stmt_start = 0;
    let mut has_code = false;

    while i < len {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => {
                let start = i;
                let backslash = quote == b'\''
                    && (style == QuoteStyle::Backslash || is_escape_string(bytes, i));
                i = skip_quoted(bytes, i, quote, backslash);
                has_code = true;
                if quote == b'\'' {
                    result.code.push_str(&sql[seg_start..start]);
                    result.code.push_str("''");
                    seg_start = i;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                let end = line_end(bytes, i);
                push_comment(&mut result, sql, CommentKind::Line, seg_start, i, end);
                seg_start = end;
                i = end;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                let end = match sql[i + 2..].find("*/") {
                    Some(pos) => i + 2 + pos + 2,
                    None => len
                };
                let kind = if bytes.get(i + 2) == Some(&b'+') {
                    CommentKind::Hint
                } else {
                    CommentKind::Block
                };
                push_comment(&mut result, sql, kind, seg_start, i, end);
                seg_start = end;
                i = end;
            }
            b'#' if bytes.get(i + 1) == Some(&b'{') => {
                // MyBatis placeholder, not a comment
                has_code = true;
                i = match sql[i..].find('}') {
                    Some(pos) => i + pos + 1,
                    None => len
                };
            }
            b'#' => {
                let end = line_end(bytes, i);
                push_comment(&mut result, sql, CommentKind::Hash, seg_start, i, end);
                seg_start = end;
                i = end;
            }
            b';' => {
                if has_code {
                    result.statements.push(sql[stmt_start..i].trim());
                }
                has_code = false;
                stmt_start = i + 1;
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                has_code = true;
                i += 1;
            }
        }
    }

    result.code.push_str(&sql[seg_start.min(len)..]);
    if has_code {
        result.statements.push(sql[stmt_start.min(len)..].trim());
    }
    result
}

/// Split raw SQL into top-level statements
pub fn split_statements(sql: &str) -> Vec<&str> {
    scan(sql).statements
}

/// First keyword of the SQL code, uppercased (`""` when there is none)
pub fn leading_keyword(sql: &str) -> String {
    let code = scan(sql).code;
    code.trim_start_matches(|c: char| c.is_whitespace() || c == '(' || c == '{')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_ascii_uppercase()
}

/// `E'...'` literal: the quote follows a lone `E` prefix
fn is_escape_string(bytes: &[u8], quote_at: usize) -> bool {
    let Some(prefix) = quote_at.checked_sub(1).map(|i| bytes[i]) else {
        return false;
    };
    let standalone = quote_at < 2 || {
        let before = bytes[quote_at - 2];
        !(before.is_ascii_alphanumeric() || before == b'_')
    };
    matches!(prefix, b'E' | b'e') && standalone
}

fn skip_quoted(bytes: &[u8], start: usize, quote: u8, backslash: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if backslash && b == b'\\' {
            i += 2;
            continue;
        }
        if b == quote {
            // Doubled quote is an escaped quote
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn line_end(bytes: &[u8], start: usize) -> usize {
    bytes[start..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |pos| start + pos)
}

fn push_comment<'a>(
    result: &mut ScanResult<'a>,
    sql: &'a str,
    kind: CommentKind,
    seg_start: usize,
    start: usize,
    end: usize
) {
    result.code.push_str(&sql[seg_start..start]);
    result.code.push(' ');
    result.comments.push(Comment {
        kind,
        text: &sql[start..end],
        offset: start
    });
}
