//! SQL safety validation.
//!
//! A query is rejected when it contains non-ASCII characters, unmatched
//! string delimiters, or blacklisted keywords outside of string literals and
//! comments. Two blacklists exist: the full list for any text that carries
//! caller-controlled input, and a narrower list (without plain DML keywords)
//! for queries produced purely by rewrapping an already-validated stored
//! base query.

use regex::Regex;
use viewgate_commons::{GatewayError, Result};

const FULL_BLACKLIST: &str = r"(?i)\b(union|information_schema|insert|update|delete|truncate|drop|alter|describe|reconfigure|sysobjects|waitfor|xp_cmdshell)\b|;|--|/\*";

const REWRITE_BLACKLIST: &str = r"(?i)\b(union|information_schema|truncate|drop|alter|describe|reconfigure|sysobjects|waitfor|xp_cmdshell)\b|;|--|/\*";

/// Explicit validator configuration. Compiled once at construction; no
/// process-wide lazy statics.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Pattern matching characters that are rejected outright.
    pub non_ascii_pattern: String,

    /// When true, any comment occurrence is itself a rejection instead of
    /// being stripped.
    pub reject_comments: bool,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            non_ascii_pattern: r"[^\x00-\x7F]".to_string(),
            reject_comments: false,
        }
    }
}

/// Blacklist/delimiter validator for SQL text.
pub struct SqlValidator {
    non_ascii: Regex,
    full: Regex,
    rewrite: Regex,
    reject_comments: bool,
}

impl SqlValidator {
    pub fn new(config: &ValidatorConfig) -> Result<Self> {
        let non_ascii = Regex::new(&config.non_ascii_pattern)
            .map_err(|e| GatewayError::config(format!("invalid non-ASCII pattern: {}", e)))?;
        let full = Regex::new(FULL_BLACKLIST)
            .map_err(|e| GatewayError::config(format!("invalid blacklist pattern: {}", e)))?;
        let rewrite = Regex::new(REWRITE_BLACKLIST)
            .map_err(|e| GatewayError::config(format!("invalid blacklist pattern: {}", e)))?;

        Ok(Self {
            non_ascii,
            full,
            rewrite,
            reject_comments: config.reject_comments,
        })
    }

    /// Validate text that carries caller-controlled input (substituted
    /// parameters, injected filters, projections). Full blacklist.
    pub fn validate_untrusted(&self, sql: &str) -> Result<()> {
        self.check(sql, &self.full)
    }

    /// Validate a query produced purely by rewrapping an already-validated
    /// stored base query (limit stripping/appending). Narrow blacklist.
    pub fn validate_rewrite(&self, sql: &str) -> Result<()> {
        self.check(sql, &self.rewrite)
    }

    fn check(&self, sql: &str, blacklist: &Regex) -> Result<()> {
        if self.non_ascii.is_match(sql) {
            return Err(GatewayError::sql_rejected(
                "query contains characters outside the allowed set",
            ));
        }

        let stripped = self.strip_literals_and_comments(sql)?;

        let mut offending: Vec<String> = Vec::new();
        for m in blacklist.find_iter(&stripped) {
            let token = m.as_str().to_ascii_lowercase();
            if !offending.contains(&token) {
                offending.push(token);
            }
        }
        if !offending.is_empty() {
            return Err(GatewayError::sql_rejected(format!(
                "forbidden token(s): {}",
                offending.join(", ")
            )));
        }

        Ok(())
    }

    /// Remove quoted string literals and comment spans so the blacklist only
    /// sees executable text. An unterminated quote is a rejection; comments
    /// are stripped, or rejected when the configuration says so.
    fn strip_literals_and_comments(&self, sql: &str) -> Result<String> {
        let chars: Vec<char> = sql.chars().collect();
        let mut out = String::with_capacity(sql.len());
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            match c {
                '\'' | '"' => match chars[i + 1..].iter().position(|&x| x == c) {
                    Some(offset) => {
                        // literal content must not reach the blacklist
                        out.push(' ');
                        i += offset + 2;
                    }
                    None => {
                        return Err(GatewayError::sql_rejected(format!(
                            "unmatched {} delimiter",
                            if c == '\'' { "single-quote" } else { "double-quote" }
                        )));
                    }
                },
                '-' if chars.get(i + 1) == Some(&'-') => {
                    if self.reject_comments {
                        return Err(GatewayError::sql_rejected(
                            "comment markers are not allowed",
                        ));
                    }
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                }
                '/' if chars.get(i + 1) == Some(&'*') => {
                    if self.reject_comments {
                        return Err(GatewayError::sql_rejected(
                            "comment markers are not allowed",
                        ));
                    }
                    i += 2;
                    while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                        i += 1;
                    }
                    i = if i + 1 < chars.len() { i + 2 } else { chars.len() };
                    out.push(' ');
                }
                _ => {
                    out.push(c);
                    i += 1;
                }
            }
        }

        Ok(out)
    }
}
