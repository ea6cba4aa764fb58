//! Query building: composes the final executable SQL from a stored base
//! query, a field projection, caller filters and a row limit.
//!
//! All rewriting is textual. The assembled query is always passed back
//! through the validator: with the full blacklist when caller-controlled
//! text (fields, filters) was interpolated, with the narrow rewrite list
//! when only the stored base was rewrapped.

use regex::Regex;
use std::sync::Arc;
use viewgate_commons::{FilterClause, GatewayError, Result};

use crate::validator::SqlValidator;

/// Swagger-style placeholder tokens that callers send when they mean "all
/// fields". Filtered out of the projection, case-insensitively.
const PLACEHOLDER_FIELDS: &[&str] = &["string", "additionalprop1", "additionalprop2", "additionalprop3"];

pub struct QueryBuilder {
    validator: Arc<SqlValidator>,
    default_limit: u32,
    trailing_limit: Regex,
    tail_clause: Regex,
    where_word: Regex,
}

impl QueryBuilder {
    pub fn new(validator: Arc<SqlValidator>, default_limit: u32) -> Result<Self> {
        let trailing_limit = Regex::new(r"(?i)\s+limit\s+\d+\s*$")
            .map_err(|e| GatewayError::internal(format!("limit pattern: {}", e)))?;
        let tail_clause = Regex::new(r"(?i)\b(order\s+by|group\s+by|having)\b")
            .map_err(|e| GatewayError::internal(format!("tail clause pattern: {}", e)))?;
        let where_word = Regex::new(r"(?i)\bwhere\b")
            .map_err(|e| GatewayError::internal(format!("where pattern: {}", e)))?;

        Ok(Self {
            validator,
            default_limit,
            trailing_limit,
            tail_clause,
            where_word,
        })
    }

    /// Compose the final executable SQL.
    ///
    /// Any trailing `LIMIT n` on the base is stripped before the effective
    /// limit is appended, so repeated rewrites never stack LIMIT clauses.
    pub fn build(
        &self,
        base_sql: &str,
        fields: &[String],
        limit: Option<u32>,
        filters: &[FilterClause],
    ) -> Result<String> {
        let projection = effective_projection(fields);
        let base = self
            .trailing_limit
            .replace(base_sql.trim(), "")
            .into_owned();

        let rendered = render_filters(filters);
        let mut assembled = if rendered.is_empty() {
            base
        } else {
            self.inject_filters(&base, &rendered)
        };

        if let Some(proj) = &projection {
            assembled = format!("select {} from ({})", proj.join(","), assembled);
        }

        let effective_limit = match limit {
            Some(n) if n > 0 => n,
            _ => self.default_limit,
        };
        assembled = format!("{} LIMIT {}", assembled, effective_limit);

        // caller text was interpolated -> full blacklist; pure rewrap of the
        // stored base -> narrow list
        if projection.is_some() || !rendered.is_empty() {
            self.validator.validate_untrusted(&assembled)?;
        } else {
            self.validator.validate_rewrite(&assembled)?;
        }

        Ok(assembled)
    }

    /// Insert rendered filter text before the earliest ORDER BY / GROUP BY /
    /// HAVING clause, introducing `WHERE 1=1` when the head has no WHERE yet.
    fn inject_filters(&self, base: &str, rendered: &str) -> String {
        let split = self
            .tail_clause
            .find(base)
            .map(|m| m.start())
            .unwrap_or(base.len());
        let (head, tail) = base.split_at(split);
        let head = head.trim_end();

        let mut out = if self.where_word.is_match(head) {
            format!("{}{}", head, rendered)
        } else {
            format!("{} WHERE 1=1{}", head, rendered)
        };
        if !tail.is_empty() {
            out.push(' ');
            out.push_str(tail.trim_end());
        }
        out
    }
}

/// Resolve the requested projection: `None` means `*`.
fn effective_projection(fields: &[String]) -> Option<Vec<String>> {
    let real: Vec<String> = fields
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty() && *f != "*")
        .filter(|f| {
            let lower = f.to_ascii_lowercase();
            !PLACEHOLDER_FIELDS.contains(&lower.as_str())
        })
        .map(str::to_string)
        .collect();

    if real.is_empty() {
        None
    } else {
        Some(real)
    }
}

/// Render filter clauses as ` {AND|OR} (<field> <condition> <values>)`.
/// Clauses with an empty field or condition are dropped silently.
fn render_filters(filters: &[FilterClause]) -> String {
    let mut out = String::new();
    for clause in filters.iter().filter(|c| c.is_renderable()) {
        let values = match clause.condition.trim().to_ascii_uppercase().as_str() {
            "BETWEEN" => clause.values.join(" AND "),
            "IN" => format!("({})", clause.values.join(", ")),
            _ => clause.values.join(","),
        };
        out.push_str(&format!(
            " {} ({} {} {})",
            clause.join.as_sql(),
            clause.field.trim(),
            clause.condition.trim(),
            values
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ValidatorConfig;
    use viewgate_commons::JoinOp;

    fn builder(default_limit: u32) -> QueryBuilder {
        let validator = Arc::new(SqlValidator::new(&ValidatorConfig::default()).unwrap());
        QueryBuilder::new(validator, default_limit).unwrap()
    }

    fn filter(field: &str, condition: &str, values: &[&str], join: JoinOp) -> FilterClause {
        FilterClause {
            field: field.to_string(),
            condition: condition.to_string(),
            values: values.iter().map(|v| v.to_string()).collect(),
            join,
        }
    }

    #[test]
    fn test_default_limit_applied() {
        let b = builder(150);
        let sql = b.build("SELECT * FROM t", &[], None, &[]).unwrap();
        assert_eq!(sql, "SELECT * FROM t LIMIT 150");
    }

    #[test]
    fn test_no_stacked_limit_on_rebuild() {
        let b = builder(150);
        let first = b.build("SELECT * FROM t", &[], None, &[]).unwrap();
        let second = b.build(&first, &[], None, &[]).unwrap();
        assert_eq!(second, "SELECT * FROM t LIMIT 150");
    }

    #[test]
    fn test_existing_limit_replaced() {
        let b = builder(150);
        let sql = b.build("SELECT * FROM t LIMIT 9999", &[], Some(10), &[]).unwrap();
        assert_eq!(sql, "SELECT * FROM t LIMIT 10");
    }

    #[test]
    fn test_zero_limit_falls_back_to_default() {
        let b = builder(150);
        let sql = b.build("SELECT * FROM t", &[], Some(0), &[]).unwrap();
        assert_eq!(sql, "SELECT * FROM t LIMIT 150");
    }

    #[test]
    fn test_projection_with_filter_wraps_subquery() {
        let b = builder(150);
        let fields = vec!["a".to_string(), "b".to_string()];
        let filters = vec![filter("c", "=", &["'x'"], JoinOp::And)];
        let sql = b
            .build("SELECT * FROM t", &fields, Some(10), &filters)
            .unwrap();
        assert_eq!(
            sql,
            "select a,b from (SELECT * FROM t WHERE 1=1 AND (c = 'x')) LIMIT 10"
        );
    }

    #[test]
    fn test_placeholder_fields_mean_select_star() {
        let b = builder(150);
        let fields = vec![
            "string".to_string(),
            "additionalProp1".to_string(),
            "ADDITIONALPROP2".to_string(),
        ];
        let sql = b.build("SELECT * FROM t", &fields, None, &[]).unwrap();
        assert_eq!(sql, "SELECT * FROM t LIMIT 150");
    }

    #[test]
    fn test_filter_appended_after_existing_where() {
        let b = builder(150);
        let filters = vec![filter("c", "=", &["'x'"], JoinOp::Or)];
        let sql = b
            .build("SELECT * FROM t WHERE a = 1", &[], Some(5), &filters)
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = 1 OR (c = 'x') LIMIT 5");
    }

    #[test]
    fn test_filter_inserted_before_order_by() {
        let b = builder(150);
        let filters = vec![filter("c", "=", &["'x'"], JoinOp::And)];
        let sql = b
            .build("SELECT * FROM t ORDER BY a", &[], Some(5), &filters)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE 1=1 AND (c = 'x') ORDER BY a LIMIT 5"
        );
    }

    #[test]
    fn test_filter_inserted_before_group_by() {
        let b = builder(150);
        let filters = vec![filter("c", ">", &["10"], JoinOp::And)];
        let sql = b
            .build("SELECT a, count(*) FROM t GROUP BY a", &[], Some(5), &filters)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT a, count(*) FROM t WHERE 1=1 AND (c > 10) GROUP BY a LIMIT 5"
        );
    }

    #[test]
    fn test_between_and_in_rendering() {
        let b = builder(150);
        let filters = vec![
            filter("y", "BETWEEN", &["2020", "2024"], JoinOp::And),
            filter("c", "IN", &["'a'", "'b'"], JoinOp::And),
        ];
        let sql = b.build("SELECT * FROM t", &[], Some(5), &filters).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE 1=1 AND (y BETWEEN 2020 AND 2024) AND (c IN ('a', 'b')) LIMIT 5"
        );
    }

    #[test]
    fn test_empty_clauses_dropped_silently() {
        let b = builder(150);
        let filters = vec![
            filter("", "=", &["'x'"], JoinOp::And),
            filter("c", "", &["'x'"], JoinOp::And),
            filter("d", "=", &["1"], JoinOp::And),
        ];
        let sql = b.build("SELECT * FROM t", &[], Some(5), &filters).unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE 1=1 AND (d = 1) LIMIT 5");
    }

    #[test]
    fn test_all_clauses_dropped_means_no_where() {
        let b = builder(150);
        let filters = vec![filter("", "", &[], JoinOp::And)];
        let sql = b.build("SELECT * FROM t", &[], None, &filters).unwrap();
        assert_eq!(sql, "SELECT * FROM t LIMIT 150");
    }

    #[test]
    fn test_hostile_filter_rejected() {
        let b = builder(150);
        let filters = vec![filter("c", "=", &["1; DROP TABLE t"], JoinOp::And)];
        let err = b
            .build("SELECT * FROM t", &[], Some(5), &filters)
            .unwrap_err();
        assert!(matches!(err, GatewayError::SqlRejected(_)));
    }

    #[test]
    fn test_hostile_projection_rejected() {
        let b = builder(150);
        let fields = vec!["a FROM x; DELETE FROM t".to_string()];
        let err = b.build("SELECT * FROM t", &fields, None, &[]).unwrap_err();
        assert!(matches!(err, GatewayError::SqlRejected(_)));
    }
}
