use sqlparser::ast::{
    Assignment, Distinct, FromTable, GroupByExpr, LimitClause, OnConflictAction, OnInsert,
    OrderByKind, Query, SelectItem, SelectItemQualifiedWildcardKind, SetExpr, SetQuantifier,
    Statement, TableObject, UpdateTableFromKind
};

use super::{
    ExtractionContext,
    expr::{walk_expr, walk_function},
    table::extract_from_table_with_joins
};
use crate::query::normalize_table_name;

/// Walk a whole SELECT/INSERT/UPDATE/DELETE statement; other kinds add nothing
pub fn extract_from_statement(statement: &Statement, ctx: &mut ExtractionContext<'_>) {
    match statement {
        Statement::Query(query) => extract_from_query(query, ctx),
        Statement::Insert(insert) => {
            match &insert.table {
                TableObject::TableName(name) => {
                    ctx.tables
                        .insert(normalize_table_name(&name.to_string()).into());
                }
                TableObject::TableFunction(function) => walk_function(function, ctx)
            }
            if let Some(source) = &insert.source {
                extract_from_query(source, ctx);
            }
            walk_assignments(&insert.assignments, ctx);
            match &insert.on {
                Some(OnInsert::DuplicateKeyUpdate(assignments)) => {
                    walk_assignments(assignments, ctx)
                }
                Some(OnInsert::OnConflict(conflict)) => {
                    if let OnConflictAction::DoUpdate(update) = &conflict.action {
                        walk_assignments(&update.assignments, ctx);
                        if let Some(selection) = &update.selection {
                            walk_expr(selection, ctx);
                        }
                    }
                }
                _ => {}
            }
            if let Some(returning) = &insert.returning {
                walk_select_items(returning, ctx);
            }
        }
        Statement::Update(update) => {
            extract_from_table_with_joins(&update.table, ctx);
            if let Some(
                UpdateTableFromKind::BeforeSet(tables) | UpdateTableFromKind::AfterSet(tables)
            ) = &update.from
            {
                for table in tables {
                    extract_from_table_with_joins(table, ctx);
                }
            }
            walk_assignments(&update.assignments, ctx);
            for expr in update.selection.iter().chain(&update.limit) {
                walk_expr(expr, ctx);
            }
            if let Some(returning) = &update.returning {
                walk_select_items(returning, ctx);
            }
        }
        Statement::Delete(delete) => {
            let (FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables)) =
                &delete.from;
            for table in tables.iter().chain(delete.using.iter().flatten()) {
                extract_from_table_with_joins(table, ctx);
            }
            for expr in delete.selection.iter().chain(&delete.limit) {
                walk_expr(expr, ctx);
            }
            for item in &delete.order_by {
                walk_expr(&item.expr, ctx);
            }
            if let Some(returning) = &delete.returning {
                walk_select_items(returning, ctx);
            }
        }
        _ => {}
    }
}

pub fn extract_from_query(query: &Query, ctx: &mut ExtractionContext<'_>) {
    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            extract_from_query(&cte.query, ctx);
        }
    }
    extract_from_set_expr(&query.body, ctx);
    if let Some(order_by) = &query.order_by
        && let OrderByKind::Expressions(exprs) = &order_by.kind
    {
        for expr in exprs {
            walk_expr(&expr.expr, ctx);
        }
    }
    match &query.limit_clause {
        Some(LimitClause::LimitOffset {
            limit,
            offset,
            limit_by
        }) => {
            for expr in limit
                .iter()
                .chain(offset.iter().map(|o| &o.value))
                .chain(limit_by)
            {
                walk_expr(expr, ctx);
            }
        }
        Some(LimitClause::OffsetCommaLimit {
            offset,
            limit
        }) => {
            walk_expr(offset, ctx);
            walk_expr(limit, ctx);
        }
        None => {}
    }
}

pub fn extract_from_set_expr(set_expr: &SetExpr, ctx: &mut ExtractionContext<'_>) {
    match set_expr {
        SetExpr::Select(select) => {
            if let Some(Distinct::On(exprs)) = &select.distinct {
                for expr in exprs {
                    walk_expr(expr, ctx);
                }
            }
            walk_select_items(&select.projection, ctx);
            for table in &select.from {
                extract_from_table_with_joins(table, ctx);
            }
            for view in &select.lateral_views {
                walk_expr(&view.lateral_view, ctx);
            }
            for expr in select
                .prewhere
                .iter()
                .chain(&select.selection)
                .chain(&select.having)
                .chain(&select.qualify)
                .chain(&select.cluster_by)
                .chain(&select.distribute_by)
            {
                walk_expr(expr, ctx);
            }
            if let GroupByExpr::Expressions(exprs, _) = &select.group_by {
                for expr in exprs {
                    walk_expr(expr, ctx);
                }
            }
            for item in &select.sort_by {
                walk_expr(&item.expr, ctx);
            }
            if let Some(connect_by) = &select.connect_by {
                walk_expr(&connect_by.condition, ctx);
                for expr in &connect_by.relationships {
                    walk_expr(expr, ctx);
                }
            }
        }
        SetExpr::SetOperation {
            op,
            set_quantifier,
            left,
            right
        } => {
            let name = if matches!(set_quantifier, SetQuantifier::All) {
                format!("{}_ALL", op)
            } else {
                op.to_string()
            };
            ctx.set_operations.push(name.to_uppercase().into());
            extract_from_set_expr(left, ctx);
            extract_from_set_expr(right, ctx);
        }
        SetExpr::Query(query) => extract_from_query(query, ctx),
        SetExpr::Values(values) => {
            for expr in values.rows.iter().flatten() {
                walk_expr(expr, ctx);
            }
        }
        SetExpr::Insert(statement) | SetExpr::Update(statement) | SetExpr::Delete(statement) => {
            extract_from_statement(statement, ctx)
        }
        SetExpr::Table(table) => {
            if let Some(name) = &table.table_name {
                ctx.tables.insert(normalize_table_name(name).into());
            }
        }
        _ => {}
    }
}

fn walk_select_items(items: &[SelectItem], ctx: &mut ExtractionContext<'_>) {
    for item in items {
        match item {
            SelectItem::UnnamedExpr(expr)
            | SelectItem::ExprWithAlias {
                expr, ..
            }
            | SelectItem::QualifiedWildcard(SelectItemQualifiedWildcardKind::Expr(expr), _) => {
                walk_expr(expr, ctx)
            }
            _ => {}
        }
    }
}

fn walk_assignments(assignments: &[Assignment], ctx: &mut ExtractionContext<'_>) {
    for assignment in assignments {
        walk_expr(&assignment.value, ctx);
    }
}

