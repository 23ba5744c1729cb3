//! SQL compiler that converts a search query AST into a resource query using sea-query.

use crate::ast::{Condition, Query as AstQuery, Value as FilterValue};
use crate::config::SearchConfig;
use crate::token::PatternKind;
use sea_query::extension::postgres::PgBinOper;
use sea_query::{Asterisk, Expr, Iden, LikeExpr, PostgresQueryBuilder, SelectStatement, SimpleExpr, Value};
use serde::Serialize;
use thiserror::Error;

/// Table identifier for sea-query
#[derive(Debug, Clone)]
pub struct TableName(pub String);

impl Iden for TableName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    fn new(message: String) -> Self {
        Self { message }
    }
}

/// Represents an optimization applied during compilation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Optimization {
    /// `f:a OR f:b OR f:c` rewritten to `f IN (a, b, c)`
    OrToIn { field: String, value_count: usize },
    /// `NOT f:v` folded into the filter as `f <> v`
    NegationFolded { field: String },
}

/// Result of SQL compilation with optimization information
#[derive(Debug, Clone, Serialize)]
pub struct CompileResult {
    pub sql: String,
    pub optimizations: Vec<Optimization>,
}

/// SQL Compiler that converts search queries to SQL
pub struct SqlCompiler {
    config: SearchConfig,
}

impl Default for SqlCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlCompiler {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn with_config(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Compile a search query into SQL
    pub fn compile(&self, query: &AstQuery) -> Result<CompileResult, CompileError> {
        let mut optimizations = Vec::new();

        let mut select = SelectStatement::new();
        select.column(Asterisk);
        select.from(TableName(self.config.table.clone()));

        if let Some(condition) = &query.condition {
            let (expr, mut opts) = self.compile_condition(condition)?;
            optimizations.append(&mut opts);
            select.and_where(expr);
        }

        let sql = select.to_string(PostgresQueryBuilder);

        Ok(CompileResult { sql, optimizations })
    }

    /// Compile a single condition with optimizations
    fn compile_condition(&self, condition: &Condition) -> Result<(SimpleExpr, Vec<Optimization>), CompileError> {
        let mut optimizations = Vec::new();

        let expr = match condition {
            Condition::And(left, right) => {
                let (left_expr, mut left_opts) = self.compile_condition(left)?;
                let (right_expr, mut right_opts) = self.compile_condition(right)?;
                optimizations.append(&mut left_opts);
                optimizations.append(&mut right_opts);
                left_expr.and(right_expr)
            }
            Condition::Or(left, right) => {
                // Check for OR optimization opportunities
                if let Some((in_expr, opt)) = self.try_optimize_or_to_in(condition)? {
                    optimizations.push(opt);
                    in_expr
                } else {
                    let (left_expr, mut left_opts) = self.compile_condition(left)?;
                    let (right_expr, mut right_opts) = self.compile_condition(right)?;
                    optimizations.append(&mut left_opts);
                    optimizations.append(&mut right_opts);
                    left_expr.or(right_expr)
                }
            }
            Condition::Not(inner) => match inner.as_ref() {
                Condition::Filter { field, value, negated } => {
                    optimizations.push(Optimization::NegationFolded { field: field.clone() });
                    self.compile_filter(field, value.as_ref(), !negated)?
                }
                _ => {
                    let (inner_expr, mut inner_opts) = self.compile_condition(inner)?;
                    optimizations.append(&mut inner_opts);
                    inner_expr.not()
                }
            },
            Condition::Grouped(inner) => {
                let (inner_expr, mut inner_opts) = self.compile_condition(inner)?;
                optimizations.append(&mut inner_opts);
                inner_expr
            }
            Condition::Filter { field, value, negated } => {
                self.compile_filter(field, value.as_ref(), *negated)?
            }
            Condition::Pattern { value, kind } => self.compile_pattern(value, *kind)?,
        };

        Ok((expr, optimizations))
    }

    /// Resolve a filter field to its column
    fn column(&self, field: &str) -> Result<ColumnName, CompileError> {
        self.config
            .column_for(field)
            .map(ColumnName)
            .ok_or_else(|| CompileError::new(format!("Unknown filter field '{}'", field)))
    }

    /// Compile a `field:value` filter
    fn compile_filter(&self, field: &str, value: Option<&FilterValue>, negated: bool) -> Result<SimpleExpr, CompileError> {
        let col = Expr::col(self.column(field)?);

        let expr = match (value, negated) {
            (None, false) => col.is_not_null(),
            (None, true) => col.is_null(),
            (Some(FilterValue::Literal(v)), false) => col.eq(string_value(v)),
            (Some(FilterValue::Literal(v)), true) => col.ne(string_value(v)),
            (Some(FilterValue::Regexp(pattern)), negated) => {
                let expr = col.binary(PgBinOper::Regex, Expr::val(string_value(pattern)));
                if negated {
                    expr.not()
                } else {
                    expr
                }
            }
        };

        Ok(expr)
    }

    /// Compile a free-text pattern against the content column
    fn compile_pattern(&self, value: &str, kind: PatternKind) -> Result<SimpleExpr, CompileError> {
        if self.config.content_column.is_empty() {
            return Err(CompileError::new(format!(
                "Pattern '{}' needs a content column, but none is configured",
                value
            )));
        }

        let col = Expr::col(ColumnName(self.config.content_column.clone()));
        let expr = match kind {
            PatternKind::Regexp => col.binary(PgBinOper::Regex, Expr::val(string_value(value))),
            PatternKind::Literal | PatternKind::Structural => {
                col.like(LikeExpr::new(format!("%{}%", escape_like(value))).escape('\\'))
            }
        };

        Ok(expr)
    }

    /// Try to optimize OR conditions to IN clauses
    fn try_optimize_or_to_in(&self, condition: &Condition) -> Result<Option<(SimpleExpr, Optimization)>, CompileError> {
        let mut equalities = Vec::new();
        if !collect_equality_values(condition, &mut equalities) {
            return Ok(None);
        }

        let Some((field, _)) = equalities.first() else {
            return Ok(None);
        };
        let same_field = equalities
            .iter()
            .all(|(other, _)| other.eq_ignore_ascii_case(field));

        if !same_field || equalities.len() < self.config.max_or_conditions_for_in {
            return Ok(None);
        }

        let in_values: Vec<Value> = equalities.iter().map(|(_, v)| string_value(v)).collect();
        let in_expr = Expr::col(self.column(field)?).is_in(in_values);
        let optimization = Optimization::OrToIn {
            field: (*field).to_owned(),
            value_count: equalities.len(),
        };

        Ok(Some((in_expr, optimization)))
    }
}

/// Recursively collect `field = value` leaves of an OR chain.
///
/// Returns false as soon as a leaf is anything other than a plain equality filter.
fn collect_equality_values<'a>(condition: &'a Condition, values: &mut Vec<(&'a str, &'a str)>) -> bool {
    match condition {
        Condition::Filter {
            field,
            value: Some(FilterValue::Literal(value)),
            negated: false,
        } => {
            values.push((field.as_str(), value.as_str()));
            true
        }
        Condition::Or(left, right) => {
            collect_equality_values(left, values) && collect_equality_values(right, values)
        }
        Condition::Grouped(inner) => collect_equality_values(inner, values),
        _ => false,
    }
}

fn string_value(s: &str) -> Value {
    Value::String(Some(Box::new(s.to_string())))
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_search_query;
    use crate::token::SearchPatternType;

    fn compile(query: &str) -> CompileResult {
        compile_with(SqlCompiler::new(), query)
    }

    fn compile_with(compiler: SqlCompiler, query: &str) -> CompileResult {
        let ast = parse_search_query(query, false, Some(SearchPatternType::Standard)).unwrap();
        compiler.compile(&ast).unwrap()
    }

    #[test]
    fn test_empty_query_selects_everything() {
        let result = compile("");
        assert_eq!(result.sql, r#"SELECT * FROM "resources""#);
        assert!(result.optimizations.is_empty());
    }

    #[test]
    fn test_simple_filter_compilation() {
        let result = compile("kind:Pod");
        assert_eq!(result.sql, r#"SELECT * FROM "resources" WHERE "kind" = 'Pod'"#);
    }

    #[test]
    fn test_field_mapping_is_applied() {
        let result = compile("apiVersion:v1 Label:app");
        assert!(result.sql.contains(r#""api_version" = 'v1'"#));
        assert!(result.sql.contains(r#""label" = 'app'"#));
        assert!(result.sql.contains("AND"));
    }

    #[test]
    fn test_negated_and_empty_filters() {
        let result = compile("-namespace:kube-system");
        assert!(result.sql.contains(r#""namespace" <> 'kube-system'"#));

        let result = compile("namespace:");
        assert!(result.sql.contains(r#""namespace" IS NOT NULL"#));

        let result = compile("-namespace:");
        assert!(result.sql.contains(r#""namespace" IS NULL"#));
    }

    #[test]
    fn test_not_filter_is_folded() {
        let result = compile("NOT kind:Pod");
        assert!(result.sql.contains(r#""kind" <> 'Pod'"#));
        assert_eq!(
            result.optimizations,
            vec![Optimization::NegationFolded { field: "kind".to_string() }]
        );
    }

    #[test]
    fn test_regexp_filter() {
        let result = compile("name:/^nginx-.*/");
        assert!(result.sql.contains(r#""name" ~ '^nginx-.*'"#));
    }

    #[test]
    fn test_pattern_uses_content_column() {
        let result = compile("nginx_100%");
        assert!(result.sql.contains(r#""object" LIKE"#));
        assert!(result.sql.contains("nginx"));
        assert!(result.sql.contains("ESCAPE"));
        assert_eq!(escape_like("nginx_100%"), r"nginx\_100\%");
    }

    #[test]
    fn test_or_to_in_optimization() {
        let result = compile("kind:Pod OR kind:Service OR (kind:Deployment)");
        assert!(result.sql.contains(r#""kind" IN ('Pod', 'Service', 'Deployment')"#));
        assert_eq!(
            result.optimizations,
            vec![Optimization::OrToIn { field: "kind".to_string(), value_count: 3 }]
        );
    }

    #[test]
    fn test_or_to_in_records_field_as_written() {
        let result = compile("Kind:Pod OR kind:Service OR KIND:Job");
        assert!(result.sql.contains(r#""kind" IN ('Pod', 'Service', 'Job')"#));
        assert_eq!(
            result.optimizations,
            vec![Optimization::OrToIn { field: "Kind".to_string(), value_count: 3 }]
        );
    }

    #[test]
    fn test_or_across_fields_is_not_optimized() {
        let result = compile("kind:Pod OR name:Pod OR kind:Service");
        assert!(!result.sql.contains(" IN "));
        assert!(result.sql.contains("OR"));
        assert!(result.optimizations.is_empty());
    }

    #[test]
    fn test_or_below_threshold_is_not_optimized() {
        let result = compile("kind:Pod OR kind:Service");
        assert!(result.optimizations.is_empty());

        let config = SearchConfig {
            max_or_conditions_for_in: 2,
            ..SearchConfig::default()
        };
        let result = compile_with(SqlCompiler::with_config(config), "kind:Pod OR kind:Service");
        assert_eq!(result.optimizations.len(), 1);
    }

    #[test]
    fn test_strict_fields_reject_unknown_field() {
        let config = SearchConfig {
            strict_fields: true,
            ..SearchConfig::default()
        };
        let ast = parse_search_query("label:app", false, Some(SearchPatternType::Standard)).unwrap();
        let error = SqlCompiler::with_config(config).compile(&ast).unwrap_err();
        assert_eq!(error.message, "Unknown filter field 'label'");
    }

    #[test]
    fn test_missing_content_column() {
        let config = SearchConfig {
            content_column: String::new(),
            ..SearchConfig::default()
        };
        let ast = parse_search_query("nginx", false, Some(SearchPatternType::Standard)).unwrap();
        assert!(SqlCompiler::with_config(config).compile(&ast).is_err());
    }
}
