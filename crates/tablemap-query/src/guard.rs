//! Advisory injection scoring for raw SQL.
//!
//! [`validate_sql`] classifies a raw SQL string by pattern matching. It is
//! defense in depth for the `_raw` entry points of the entity collection and
//! never replaces parameter binding.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Coarse likelihood that a SQL string carries an injection attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum RiskLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`validate_sql`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SqlValidation {
    pub risk_level: RiskLevel,
    pub warnings: Vec<String>,
}

impl SqlValidation {
    /// True unless the risk is High.
    pub fn is_valid(&self) -> bool {
        self.risk_level < RiskLevel::High
    }

    fn raise(&mut self, level: RiskLevel, warning: impl Into<String>) {
        self.risk_level = self.risk_level.max(level);
        self.warnings.push(warning.into());
    }
}

const DANGEROUS_KEYWORDS: &[&str] = &[
    "DROP", "DELETE", "TRUNCATE", "ALTER", "CREATE", "INSERT", "UPDATE", "EXEC", "EXECUTE",
    "MERGE", "GRANT", "REVOKE", "BULK", "BACKUP", "RESTORE", "SHUTDOWN",
];

/// Heuristic patterns (applied to uppercased SQL) and their warnings.
const HEURISTICS: &[(&str, &str)] = &[
    (r"--", "SQL line comment detected"),
    (r"/\*|\*/", "SQL block comment detected"),
    (r"\bUNION\s+(ALL\s+)?SELECT\b", "UNION SELECT detected"),
    (r"'\s*OR\s*'", "Tautology pattern detected"),
    (r"\bOR\s+1\s*=\s*1\b", "Tautology pattern detected"),
    (r"'\s*OR\s+\d", "Tautology pattern detected"),
    (r"'\s*(\+|\|\|)\s*'", "String concatenation detected"),
    (
        r"\b(CHAR|NCHAR|ASCII|CAST|CONVERT|SUBSTRING)\s*\(",
        "Encoding or conversion function detected",
    ),
    (r"\bWAITFOR\s+DELAY\b", "Timing function detected"),
    (r"\b(SLEEP|BENCHMARK)\s*\(", "Timing function detected"),
    (r"\b0X[0-9A-F]+", "Hex literal detected"),
];

struct Patterns {
    keywords: Regex,
    procedures: Regex,
    heuristics: Vec<(Regex, &'static str)>,
    sanitize_procedures: Regex,
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            tracing::warn!(pattern = pattern, error = %e, "Invalid guard pattern, skipping");
            None
        }
    }
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<Option<Patterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            let keywords = compile(&format!(r"\b({})\b", DANGEROUS_KEYWORDS.join("|")))?;
            let procedures = compile(r"\b(XP|SP)_\w+")?;
            let sanitize_procedures = compile(r"(?i)\b(xp|sp)_")?;
            let heuristics = HEURISTICS
                .iter()
                .filter_map(|(pattern, warning)| compile(pattern).map(|re| (re, *warning)))
                .collect();
            Some(Patterns {
                keywords,
                procedures,
                heuristics,
                sanitize_procedures,
            })
        })
        .as_ref()
}

/// Score a raw SQL string.
///
/// Dangerous keywords, stored-procedure prefixes and stacked statements are
/// High. Comment markers, tautologies, concatenation, encoding and timing
/// functions, hex literals and unbalanced quotes are at least Medium. A
/// balanced inline string literal with no other finding is Low.
pub fn validate_sql(sql: &str) -> SqlValidation {
    let mut result = SqlValidation::default();
    let upper = sql.to_uppercase();

    let Some(patterns) = patterns() else {
        result.raise(RiskLevel::High, "Injection patterns unavailable");
        return result;
    };

    let mut found: Vec<&str> = Vec::new();
    for m in patterns.keywords.find_iter(&upper) {
        if !found.contains(&m.as_str()) {
            found.push(m.as_str());
        }
    }
    for keyword in found {
        result.raise(
            RiskLevel::High,
            format!("Dangerous keyword detected: {}", keyword),
        );
    }

    if let Some(m) = patterns.procedures.find(&upper) {
        result.raise(
            RiskLevel::High,
            format!("Stored procedure call detected: {}", m.as_str()),
        );
    }

    let mut seen_warnings: Vec<&str> = Vec::new();
    for (regex, warning) in &patterns.heuristics {
        if regex.is_match(&upper) && !seen_warnings.contains(warning) {
            seen_warnings.push(*warning);
            result.raise(RiskLevel::Medium, *warning);
        }
    }

    let trimmed = sql.trim();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed);
    if body.contains(';') {
        result.raise(RiskLevel::High, "Multiple statements detected");
    }

    let quotes = sql.matches('\'').count();
    if quotes % 2 == 1 {
        result.raise(RiskLevel::Medium, "Unbalanced quotes detected");
    } else if quotes > 0 && result.risk_level == RiskLevel::None {
        result.raise(
            RiskLevel::Low,
            "Inline string literal detected; prefer bound parameters",
        );
    }

    result
}

/// Best-effort cleanup of a value destined for inline SQL.
///
/// Doubles single quotes and strips `;`, comment markers and `xp_` / `sp_`
/// prefixes. This is not a security boundary; bind parameters instead.
pub fn sanitize_input(input: &str) -> String {
    let mut out = input.replace(';', "");
    loop {
        let next = out.replace("--", "").replace("/*", "").replace("*/", "");
        if next == out {
            break;
        }
        out = next;
    }
    if let Some(patterns) = patterns() {
        loop {
            let next = patterns.sanitize_procedures.replace_all(&out, "").into_owned();
            if next == out {
                break;
            }
            out = next;
        }
    }
    out.replace('\'', "''")
}
