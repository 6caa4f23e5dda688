mod expr;
mod set_expr;
mod table;

use compact_str::CompactString;
pub use expr::{extract_columns_from_expr, function_name_parts};
use indexmap::IndexSet;
pub use set_expr::extract_from_statement;

/// Accumulators filled while walking a statement
pub struct ExtractionContext<'a> {
    pub tables:         &'a mut IndexSet<CompactString>,
    pub functions:      &'a mut IndexSet<CompactString>,
    pub set_operations: &'a mut Vec<CompactString>
}
