use compact_str::CompactString;
use indexmap::IndexSet;
use smallvec::SmallVec;
use sqlparser::ast::{
    Expr, Function, FunctionArg, FunctionArgExpr, FunctionArgumentClause, FunctionArguments,
    JsonPathElem, OrderByExpr, Query, WindowType
};

use super::{ExtractionContext, set_expr::extract_from_query};

/// Node directly below an expression
pub enum Child<'a> {
    Expr(&'a Expr),
    Query(&'a Query)
}

/// Direct children of an expression.
///
/// Every variant that can hold a nested expression or subquery is listed, so
/// a walker built on top of this never loses a branch of the tree.
pub fn expr_children(expr: &Expr) -> SmallVec<[Child<'_>; 4]> {
    let mut out: SmallVec<[Child<'_>; 4]> = SmallVec::new();
    match expr {
        Expr::CompoundFieldAccess {
            root,
            access_chain
        } => {
            out.push(Child::Expr(root));
            for access in access_chain {
                match access {
                    sqlparser::ast::AccessExpr::Dot(e) => out.push(Child::Expr(e)),
                    sqlparser::ast::AccessExpr::Subscript(subscript) => match subscript {
                        sqlparser::ast::Subscript::Index {
                            index
                        } => out.push(Child::Expr(index)),
                        sqlparser::ast::Subscript::Slice {
                            lower_bound,
                            upper_bound,
                            stride
                        } => out.extend(
                            [lower_bound, upper_bound, stride]
                                .into_iter()
                                .flatten()
                                .map(Child::Expr)
                        )
                    }
                }
            }
        }
        Expr::JsonAccess {
            value,
            path
        } => {
            out.push(Child::Expr(value));
            for elem in &path.path {
                if let JsonPathElem::Bracket {
                    key
                } = elem
                {
                    out.push(Child::Expr(key));
                }
            }
        }
        Expr::IsFalse(e)
        | Expr::IsNotFalse(e)
        | Expr::IsTrue(e)
        | Expr::IsNotTrue(e)
        | Expr::IsNull(e)
        | Expr::IsNotNull(e)
        | Expr::IsUnknown(e)
        | Expr::IsNotUnknown(e)
        | Expr::Nested(e)
        | Expr::OuterJoin(e)
        | Expr::Prior(e)
        | Expr::IsNormalized {
            expr: e, ..
        }
        | Expr::UnaryOp {
            expr: e, ..
        }
        | Expr::Cast {
            expr: e, ..
        }
        | Expr::Extract {
            expr: e, ..
        }
        | Expr::Ceil {
            expr: e, ..
        }
        | Expr::Floor {
            expr: e, ..
        }
        | Expr::Collate {
            expr: e, ..
        }
        | Expr::Prefixed {
            value: e, ..
        }
        | Expr::Named {
            expr: e, ..
        } => out.push(Child::Expr(e)),
        Expr::IsDistinctFrom(left, right)
        | Expr::IsNotDistinctFrom(left, right)
        | Expr::BinaryOp {
            left,
            right,
            ..
        }
        | Expr::AnyOp {
            left,
            right,
            ..
        }
        | Expr::AllOp {
            left,
            right,
            ..
        }
        | Expr::AtTimeZone {
            timestamp: left,
            time_zone: right
        }
        | Expr::Position {
            expr: left,
            r#in: right
        }
        | Expr::InUnnest {
            expr: left,
            array_expr: right,
            ..
        }
        | Expr::Like {
            expr: left,
            pattern: right,
            ..
        }
        | Expr::ILike {
            expr: left,
            pattern: right,
            ..
        }
        | Expr::SimilarTo {
            expr: left,
            pattern: right,
            ..
        }
        | Expr::RLike {
            expr: left,
            pattern: right,
            ..
        } => {
            out.push(Child::Expr(left));
            out.push(Child::Expr(right));
        }
        Expr::InList {
            expr,
            list,
            ..
        } => {
            out.push(Child::Expr(expr));
            out.extend(list.iter().map(Child::Expr));
        }
        Expr::InSubquery {
            expr,
            subquery,
            ..
        } => {
            out.push(Child::Expr(expr));
            out.push(Child::Query(subquery));
        }
        Expr::Between {
            expr,
            low,
            high,
            ..
        } => {
            out.push(Child::Expr(expr));
            out.push(Child::Expr(low));
            out.push(Child::Expr(high));
        }
        Expr::Convert {
            expr,
            styles,
            ..
        } => {
            out.push(Child::Expr(expr));
            out.extend(styles.iter().map(Child::Expr));
        }
        Expr::Substring {
            expr,
            substring_from,
            substring_for,
            ..
        } => {
            out.push(Child::Expr(expr));
            out.extend(
                [substring_from, substring_for]
                    .into_iter()
                    .flatten()
                    .map(|e| Child::Expr(e))
            );
        }
        Expr::Trim {
            expr,
            trim_what,
            trim_characters,
            ..
        } => {
            out.push(Child::Expr(expr));
            if let Some(what) = trim_what {
                out.push(Child::Expr(what));
            }
            if let Some(chars) = trim_characters {
                out.extend(chars.iter().map(Child::Expr));
            }
        }
        Expr::Overlay {
            expr,
            overlay_what,
            overlay_from,
            overlay_for
        } => {
            out.push(Child::Expr(expr));
            out.push(Child::Expr(overlay_what));
            out.push(Child::Expr(overlay_from));
            if let Some(e) = overlay_for {
                out.push(Child::Expr(e));
            }
        }
        Expr::Function(func) => function_children(func, &mut out),
        Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            if let Some(op) = operand {
                out.push(Child::Expr(op));
            }
            for case_when in conditions {
                out.push(Child::Expr(&case_when.condition));
                out.push(Child::Expr(&case_when.result));
            }
            if let Some(e) = else_result {
                out.push(Child::Expr(e));
            }
        }
        Expr::Exists {
            subquery, ..
        }
        | Expr::Subquery(subquery) => out.push(Child::Query(subquery)),
        Expr::GroupingSets(sets) | Expr::Cube(sets) | Expr::Rollup(sets) => {
            out.extend(sets.iter().flatten().map(Child::Expr));
        }
        Expr::Tuple(items)
        | Expr::Struct {
            values: items, ..
        } => out.extend(items.iter().map(Child::Expr)),
        Expr::Array(array) => out.extend(array.elem.iter().map(Child::Expr)),
        Expr::Dictionary(fields) => {
            out.extend(fields.iter().map(|field| Child::Expr(&field.value)));
        }
        Expr::Map(map) => {
            for entry in &map.entries {
                out.push(Child::Expr(&entry.key));
                out.push(Child::Expr(&entry.value));
            }
        }
        Expr::Interval(interval) => out.push(Child::Expr(&interval.value)),
        Expr::Lambda(lambda) => out.push(Child::Expr(&lambda.body)),
        Expr::MemberOf(member) => {
            out.push(Child::Expr(&member.value));
            out.push(Child::Expr(&member.array));
        }
        // leaves
        _ => {}
    }
    out
}

fn function_children<'a>(func: &'a Function, out: &mut SmallVec<[Child<'a>; 4]>) {
    for arguments in [&func.parameters, &func.args] {
        match arguments {
            FunctionArguments::None => {}
            FunctionArguments::Subquery(query) => out.push(Child::Query(query)),
            FunctionArguments::List(list) => {
                for arg in &list.args {
                    let arg_expr = match arg {
                        FunctionArg::Unnamed(arg_expr)
                        | FunctionArg::Named {
                            arg: arg_expr, ..
                        } => arg_expr,
                        FunctionArg::ExprNamed {
                            name,
                            arg: arg_expr,
                            ..
                        } => {
                            out.push(Child::Expr(name));
                            arg_expr
                        }
                    };
                    if let FunctionArgExpr::Expr(e) = arg_expr {
                        out.push(Child::Expr(e));
                    }
                }
                for clause in &list.clauses {
                    match clause {
                        FunctionArgumentClause::OrderBy(order_by) => {
                            push_order_by(order_by, out)
                        }
                        FunctionArgumentClause::Limit(e) => out.push(Child::Expr(e)),
                        _ => {}
                    }
                }
            }
        }
    }
    if let Some(filter) = &func.filter {
        out.push(Child::Expr(filter));
    }
    if let Some(WindowType::WindowSpec(spec)) = &func.over {
        out.extend(spec.partition_by.iter().map(Child::Expr));
        push_order_by(&spec.order_by, out);
    }
    push_order_by(&func.within_group, out);
}

fn push_order_by<'a>(order_by: &'a [OrderByExpr], out: &mut SmallVec<[Child<'a>; 4]>) {
    out.extend(order_by.iter().map(|item| Child::Expr(&item.expr)));
}

/// Collect lowercase column names referenced by an expression.
///
/// Qualified names keep only their last part (`u.status` -> `status`).
/// Columns inside subqueries are not part of the outer predicate and are
/// skipped.
///
/// # Arguments
///
/// * `expr` - Expression to scan, typically a WHERE predicate
/// * `columns` - Set the column names are added to
pub fn extract_columns_from_expr(expr: &Expr, columns: &mut IndexSet<CompactString>) {
    match expr {
        Expr::Identifier(ident) => {
            columns.insert(ident.value.to_lowercase().into());
        }
        Expr::CompoundIdentifier(idents) => {
            if let Some(col) = idents.last() {
                columns.insert(col.value.to_lowercase().into());
            }
        }
        // MATCH (title, body) AGAINST ('...')
        Expr::MatchAgainst {
            columns: matched, ..
        } => {
            for name in matched {
                if let Some(col) = name.0.last() {
                    columns.insert(col.to_string().to_lowercase().into());
                }
            }
        }
        _ => {
            for child in expr_children(expr) {
                if let Child::Expr(e) = child {
                    extract_columns_from_expr(e, columns);
                }
            }
        }
    }
}

/// Walk an expression for function calls and nested queries.
///
/// Unlike [`extract_columns_from_expr`] this descends into subqueries, so a
/// `SLEEP()` hidden in `WHERE id IN (SELECT ...)` is still found.
pub fn walk_expr(expr: &Expr, ctx: &mut ExtractionContext<'_>) {
    match expr {
        Expr::Function(func) => walk_function(func, ctx),
        _ => walk_children(expr_children(expr), ctx)
    }
}

/// Record a function call by name, then walk its arguments
pub fn walk_function(func: &Function, ctx: &mut ExtractionContext<'_>) {
    for part in function_name_parts(&func.name.to_string()) {
        ctx.functions.insert(part);
    }
    let mut children = SmallVec::new();
    function_children(func, &mut children);
    walk_children(children, ctx);
}

fn walk_children(children: SmallVec<[Child<'_>; 4]>, ctx: &mut ExtractionContext<'_>) {
    for child in children {
        match child {
            Child::Expr(e) => walk_expr(e, ctx),
            Child::Query(query) => extract_from_query(query, ctx)
        }
    }
}

/// Lowercase, undelimited parts of a function name.
///
/// `DBMS_PIPE.RECEIVE_MESSAGE` yields `dbms_pipe` and `receive_message`, so a
/// package name on the deny list matches every routine inside it.
pub fn function_name_parts(raw: &str) -> impl Iterator<Item = CompactString> + '_ {
    raw.split('.').map(|part| {
        part.trim_matches(|c| matches!(c, '`' | '"' | '[' | ']'))
            .to_lowercase()
            .into()
    })
}
