//! Parameter substitution for stored view SQL.
//!
//! Resolves `{name}` placeholders against the view's declared parameters and
//! the caller-supplied values, validating each value against its declared
//! type before interpolation. Numeric values are substituted bare, dates are
//! normalized to `'YYYY-MM-DD'`, everything else is single-quote-escaped.
//! The fully substituted query is re-validated with the full blacklist.

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use viewgate_commons::{GatewayError, ParameterType, Result, ViewParameter};

use crate::validator::SqlValidator;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

pub struct ParameterEngine {
    validator: Arc<SqlValidator>,
    placeholder: Regex,
}

impl ParameterEngine {
    pub fn new(validator: Arc<SqlValidator>) -> Result<Self> {
        let placeholder = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| GatewayError::internal(format!("placeholder pattern: {}", e)))?;
        Ok(Self {
            validator,
            placeholder,
        })
    }

    /// Substitute every `{name}` placeholder in `query`.
    ///
    /// Resolution order per placeholder: caller-provided value, then the
    /// declared default. A placeholder with no declared parameter of the
    /// same name fails, as does a declared parameter that resolves to no
    /// value at all (required or not; leaving the placeholder in place would
    /// emit SQL that can never execute).
    pub fn substitute(
        &self,
        query: &str,
        declared: &[ViewParameter],
        provided: &HashMap<String, String>,
    ) -> Result<String> {
        let mut names: Vec<String> = Vec::new();
        for capture in self.placeholder.captures_iter(query) {
            let name = capture[1].to_string();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        if names.is_empty() {
            return Ok(query.to_string());
        }

        let mut result = query.to_string();
        for name in &names {
            let param = declared.iter().find(|p| &p.name == name).ok_or_else(|| {
                GatewayError::parameter(format!("undefined parameter '{}'", name))
            })?;

            let raw = provided
                .get(name)
                .cloned()
                .or_else(|| param.default.clone())
                .ok_or_else(|| {
                    if param.required {
                        GatewayError::parameter(format!("missing required parameter '{}'", name))
                    } else {
                        GatewayError::parameter(format!("no value for parameter '{}'", name))
                    }
                })?;

            if let Some(allowed) = &param.allowed_values {
                if !allowed.iter().any(|a| a == &raw) {
                    return Err(GatewayError::parameter(format!(
                        "value for parameter '{}' is not in the allowed set",
                        name
                    )));
                }
            }

            let rendered = render_value(param, &raw)?;
            result = result.replace(&format!("{{{}}}", name), &rendered);
        }

        self.validator.validate_untrusted(&result)?;
        Ok(result)
    }
}

/// Validate `raw` against the declared type and render it for interpolation.
fn render_value(param: &ViewParameter, raw: &str) -> Result<String> {
    match param.parameter_type() {
        ParameterType::Int => raw
            .trim()
            .parse::<i64>()
            .map(|v| v.to_string())
            .map_err(|_| {
                GatewayError::parameter(format!(
                    "parameter '{}' must be an integer",
                    param.name
                ))
            }),
        ParameterType::Decimal => raw
            .trim()
            .parse::<BigDecimal>()
            .map(|v| v.to_string())
            .map_err(|_| {
                GatewayError::parameter(format!(
                    "parameter '{}' must be a decimal number",
                    param.name
                ))
            }),
        ParameterType::Date => parse_date(raw.trim())
            .map(|d| format!("'{}'", d.format("%Y-%m-%d")))
            .ok_or_else(|| {
                GatewayError::parameter(format!(
                    "parameter '{}' must be a calendar date",
                    param.name
                ))
            }),
        ParameterType::String | ParameterType::Other(_) => Ok(quote_string(raw)),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    // a quoted date value is still a date
    let raw = raw.trim_matches('\'');
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Single-quote-escape and wrap, unless the value already arrives wrapped.
/// Idempotent: substituting `'ES'` never yields `''ES''`.
fn quote_string(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        raw.to_string()
    } else {
        format!("'{}'", raw.replace('\'', "''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::ValidatorConfig;

    fn engine() -> ParameterEngine {
        let validator = Arc::new(SqlValidator::new(&ValidatorConfig::default()).unwrap());
        ParameterEngine::new(validator).unwrap()
    }

    fn param(name: &str, param_type: &str) -> ViewParameter {
        ViewParameter {
            name: name.to_string(),
            param_type: param_type.to_string(),
            required: false,
            default: None,
            allowed_values: None,
        }
    }

    fn values(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_string_substitution_quotes_and_escapes() {
        let e = engine();
        let declared = vec![param("country", "string")];
        let sql = e
            .substitute(
                "SELECT * FROM t WHERE c = {country}",
                &declared,
                &values(&[("country", "ES")]),
            )
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE c = 'ES'");

        let sql = e
            .substitute(
                "SELECT * FROM t WHERE c = {country}",
                &declared,
                &values(&[("country", "O'Brien")]),
            )
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE c = 'O''Brien'");
    }

    #[test]
    fn test_quoting_is_idempotent() {
        let e = engine();
        let declared = vec![param("country", "string")];
        let sql = e
            .substitute(
                "SELECT * FROM t WHERE c = {country}",
                &declared,
                &values(&[("country", "'ES'")]),
            )
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE c = 'ES'");
        assert!(!sql.contains("''ES''"));
    }

    #[test]
    fn test_int_substituted_bare() {
        let e = engine();
        let declared = vec![param("year", "int")];
        let sql = e
            .substitute(
                "SELECT * FROM t WHERE y = {year}",
                &declared,
                &values(&[("year", "2024")]),
            )
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE y = 2024");
    }

    #[test]
    fn test_int_rejects_non_numeric() {
        let e = engine();
        let declared = vec![param("year", "int")];
        let err = e
            .substitute(
                "SELECT * FROM t WHERE y = {year}",
                &declared,
                &values(&[("year", "20x4")]),
            )
            .unwrap_err();
        assert!(matches!(err, GatewayError::Parameter(_)));
    }

    #[test]
    fn test_decimal_validation() {
        let e = engine();
        let declared = vec![param("rate", "decimal")];
        let sql = e
            .substitute(
                "SELECT * FROM t WHERE r > {rate}",
                &declared,
                &values(&[("rate", "0.15")]),
            )
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE r > 0.15");

        assert!(e
            .substitute(
                "SELECT * FROM t WHERE r > {rate}",
                &declared,
                &values(&[("rate", "not-a-number")]),
            )
            .is_err());
    }

    #[test]
    fn test_date_normalized() {
        let e = engine();
        let declared = vec![param("since", "date")];
        let sql = e
            .substitute(
                "SELECT * FROM t WHERE d >= {since}",
                &declared,
                &values(&[("since", "2024/03/01")]),
            )
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE d >= '2024-03-01'");

        assert!(e
            .substitute(
                "SELECT * FROM t WHERE d >= {since}",
                &declared,
                &values(&[("since", "yesterday")]),
            )
            .is_err());
    }

    #[test]
    fn test_undefined_parameter_fails() {
        let e = engine();
        let err = e
            .substitute("SELECT * FROM t WHERE c = {ghost}", &[], &HashMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("undefined parameter 'ghost'"));
    }

    #[test]
    fn test_missing_required_parameter_fails() {
        let e = engine();
        let mut p = param("country", "string");
        p.required = true;
        let err = e
            .substitute(
                "SELECT * FROM t WHERE c = {country}",
                &[p],
                &HashMap::new(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("missing required parameter"));
    }

    #[test]
    fn test_optional_parameter_without_value_fails() {
        // deliberate divergence from the source system, which left the
        // placeholder literally in the SQL
        let e = engine();
        let err = e
            .substitute(
                "SELECT * FROM t WHERE c = {country}",
                &[param("country", "string")],
                &HashMap::new(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("no value for parameter"));
    }

    #[test]
    fn test_default_value_used() {
        let e = engine();
        let mut p = param("country", "string");
        p.default = Some("ES".to_string());
        let sql = e
            .substitute("SELECT * FROM t WHERE c = {country}", &[p], &HashMap::new())
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE c = 'ES'");
    }

    #[test]
    fn test_allowed_values_enforced() {
        let e = engine();
        let mut p = param("region", "string");
        p.allowed_values = Some(vec!["emea".to_string(), "apac".to_string()]);

        let sql = e
            .substitute(
                "SELECT * FROM t WHERE r = {region}",
                std::slice::from_ref(&p),
                &values(&[("region", "emea")]),
            )
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE r = 'emea'");

        assert!(e
            .substitute(
                "SELECT * FROM t WHERE r = {region}",
                std::slice::from_ref(&p),
                &values(&[("region", "mars")]),
            )
            .is_err());
    }

    #[test]
    fn test_repeated_placeholder_substituted_everywhere() {
        let e = engine();
        let declared = vec![param("y", "int")];
        let sql = e
            .substitute(
                "SELECT * FROM t WHERE a = {y} OR b = {y}",
                &declared,
                &values(&[("y", "7")]),
            )
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t WHERE a = 7 OR b = 7");
    }

    #[test]
    fn test_hostile_value_rejected_by_final_validation() {
        let e = engine();
        let declared = vec![param("c", "string")];
        // the quoted wrapper is supplied by the caller, so the embedded
        // quote breaks out of the literal and the final validation fires
        let err = e
            .substitute(
                "SELECT * FROM t WHERE c = {c}",
                &declared,
                &values(&[("c", "'x'; DROP TABLE t --'")]),
            )
            .unwrap_err();
        assert!(matches!(err, GatewayError::SqlRejected(_)));
    }

    #[test]
    fn test_no_placeholders_passthrough() {
        let e = engine();
        let sql = e
            .substitute("SELECT * FROM t", &[param("unused", "int")], &HashMap::new())
            .unwrap();
        assert_eq!(sql, "SELECT * FROM t");
    }
}
