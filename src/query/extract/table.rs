use sqlparser::ast::{FunctionArg, FunctionArgExpr, JoinConstraint, JoinOperator, TableFactor};

use super::{ExtractionContext, expr::walk_expr, function_name_parts, set_expr::extract_from_query};
use crate::query::normalize_table_name;

pub fn extract_from_table_with_joins(
    table: &sqlparser::ast::TableWithJoins,
    ctx: &mut ExtractionContext<'_>
) {
    extract_from_table_factor(&table.relation, ctx);
    for join in &table.joins {
        extract_from_table_factor(&join.relation, ctx);
        let constraint = match &join.join_operator {
            JoinOperator::Join(c)
            | JoinOperator::Inner(c)
            | JoinOperator::Left(c)
            | JoinOperator::LeftOuter(c)
            | JoinOperator::Right(c)
            | JoinOperator::RightOuter(c)
            | JoinOperator::FullOuter(c)
            | JoinOperator::CrossJoin(c)
            | JoinOperator::Semi(c)
            | JoinOperator::LeftSemi(c)
            | JoinOperator::RightSemi(c)
            | JoinOperator::Anti(c)
            | JoinOperator::LeftAnti(c)
            | JoinOperator::RightAnti(c)
            | JoinOperator::StraightJoin(c) => Some(c),
            JoinOperator::AsOf {
                match_condition,
                constraint
            } => {
                walk_expr(match_condition, ctx);
                Some(constraint)
            }
            _ => None
        };
        if let Some(JoinConstraint::On(expr)) = constraint {
            walk_expr(expr, ctx);
        }
    }
}

pub fn extract_from_table_factor(table_factor: &TableFactor, ctx: &mut ExtractionContext<'_>) {
    match table_factor {
        TableFactor::Table {
            name,
            args,
            with_hints,
            ..
        } => {
            ctx.tables
                .insert(normalize_table_name(&name.to_string()).into());
            if let Some(args) = args {
                walk_function_args(&args.args, ctx);
            }
            for hint in with_hints {
                walk_expr(hint, ctx);
            }
        }
        TableFactor::Derived {
            subquery, ..
        } => extract_from_query(subquery, ctx),
        TableFactor::TableFunction {
            expr, ..
        } => walk_expr(expr, ctx),
        TableFactor::Function {
            name,
            args,
            ..
        } => {
            for part in function_name_parts(&name.to_string()) {
                ctx.functions.insert(part);
            }
            walk_function_args(args, ctx);
        }
        TableFactor::UNNEST {
            array_exprs, ..
        } => {
            for expr in array_exprs {
                walk_expr(expr, ctx);
            }
        }
        TableFactor::JsonTable {
            json_expr, ..
        }
        | TableFactor::OpenJsonTable {
            json_expr, ..
        } => walk_expr(json_expr, ctx),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => extract_from_table_with_joins(table_with_joins, ctx),
        TableFactor::Pivot {
            table,
            aggregate_functions,
            value_column,
            default_on_null,
            ..
        } => {
            extract_from_table_factor(table, ctx);
            for function in aggregate_functions {
                walk_expr(&function.expr, ctx);
            }
            for expr in value_column.iter().chain(default_on_null) {
                walk_expr(expr, ctx);
            }
        }
        TableFactor::Unpivot {
            table,
            value,
            columns,
            ..
        } => {
            extract_from_table_factor(table, ctx);
            walk_expr(value, ctx);
            for column in columns {
                walk_expr(&column.expr, ctx);
            }
        }
        TableFactor::MatchRecognize {
            table,
            partition_by,
            order_by,
            ..
        } => {
            extract_from_table_factor(table, ctx);
            for expr in partition_by {
                walk_expr(expr, ctx);
            }
            for item in order_by {
                walk_expr(&item.expr, ctx);
            }
        }
        TableFactor::XmlTable {
            row_expression, ..
        } => walk_expr(row_expression, ctx),
        TableFactor::SemanticView {
            dimensions,
            metrics,
            facts,
            where_clause,
            ..
        } => {
            for expr in dimensions
                .iter()
                .chain(metrics)
                .chain(facts)
                .chain(where_clause)
            {
                walk_expr(expr, ctx);
            }
        }
    }
}

fn walk_function_args(args: &[FunctionArg], ctx: &mut ExtractionContext<'_>) {
    for arg in args {
        match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(expr))
            | FunctionArg::Named {
                arg: FunctionArgExpr::Expr(expr),
                ..
            } => walk_expr(expr, ctx),
            FunctionArg::ExprNamed {
                name,
                arg,
                ..
            } => {
                walk_expr(name, ctx);
                if let FunctionArgExpr::Expr(expr) = arg {
                    walk_expr(expr, ctx);
                }
            }
            _ => {}
        }
    }
}
