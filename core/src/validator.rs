//! Output validator: shapes free-form model text into a `CaseReport`.
//!
//! Accepted shapes, tried in order:
//!   1. A JSON object with `description`, `suspicion_score`, `narrative`.
//!   2. Header-delimited text (`CASE DESCRIPTION:`, `SUSPICION SCORE:`,
//!      `NARRATIVE:`), tolerant of markdown decoration and header variants.
//!
//! RULES:
//!   - No numeric score → `FormatError::MissingScore`. Never a default.
//!   - Empty description or narrative → `FormatError::EmptySection`.
//!   - Scores outside 0..=100 are clamped and a warning recorded.

use crate::{error::FormatError, report::CaseReport, warning::Warning};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Validated {
    pub report: CaseReport,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Description,
    Score,
    Narrative,
}

fn header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Optional markdown heading / bold markers, the header term, an
        // optional parenthetical like "(0-100)", then ':' or end of line.
        Regex::new(
            r"(?im)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*|__)?[ \t]*(case[ \t]+description|description|suspicion[ \t]+score|risk[ \t]+score|score|detailed[ \t]+narrative|narrative)[ \t]*(?:\([^)\n]*\))?[ \t]*(?:\*\*|__)?[ \t]*(?::|$)[ \t]*(?:\*\*|__)?",
        )
        .expect("header pattern compiles")
    })
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("number pattern compiles"))
}

fn inline_score_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)suspicion[ \t_]*score["']?[ \t]*[:=][ \t]*(-?\d+(?:\.\d+)?)"#)
            .expect("inline score pattern compiles")
    })
}

fn section_of(term: &str) -> Section {
    let t = term.to_ascii_lowercase();
    if t.contains("score") {
        Section::Score
    } else if t.contains("narrative") {
        Section::Narrative
    } else {
        Section::Description
    }
}

/// Strip control characters other than newline and tab.
fn clean(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Markdown emphasis left hanging around section bodies.
fn tidy(text: &str) -> String {
    text.trim()
        .trim_matches(|c| c == '*' || c == '_')
        .trim()
        .to_string()
}

struct Parts {
    description: Option<String>,
    score: Option<f64>,
    narrative: Option<String>,
}

fn parse_json(text: &str) -> Option<Parts> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&text[start..=end]).ok()?;
    let obj = value.as_object()?;

    let description = obj.get("description")?.as_str()?.to_string();
    let narrative = obj.get("narrative")?.as_str()?.to_string();
    let score = match obj.get("suspicion_score") {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => first_number(s),
        _ => None,
    };
    Some(Parts {
        description: Some(description),
        score,
        narrative: Some(narrative),
    })
}

fn first_number(text: &str) -> Option<f64> {
    number_pattern()
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

/// Only the first header of each section is a boundary. A later line that
/// looks like a header of a section already opened ("Risk score: elevated")
/// is body text of whatever section it sits in.
fn parse_headers(text: &str) -> Parts {
    let mut opened = Vec::with_capacity(3);
    let headers: Vec<(Section, usize, usize)> = header_pattern()
        .captures_iter(text)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let section = section_of(c.get(1)?.as_str());
            if opened.contains(&section) {
                return None;
            }
            opened.push(section);
            Some((section, whole.start(), whole.end()))
        })
        .collect();

    let mut parts = Parts {
        description: None,
        score: None,
        narrative: None,
    };
    for (i, (section, _, body_start)) in headers.iter().enumerate() {
        let body_end = headers.get(i + 1).map(|h| h.1).unwrap_or(text.len());
        let body = &text[*body_start..body_end];
        match section {
            Section::Description => parts.description = Some(tidy(body)),
            Section::Narrative => parts.narrative = Some(tidy(body)),
            Section::Score => parts.score = first_number(body),
        }
    }

    if parts.score.is_none() {
        parts.score = inline_score_pattern()
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok());
    }
    parts
}

/// Round, then clamp into 0..=100.
fn normalize_score(reported: f64, warnings: &mut Vec<Warning>) -> u8 {
    let rounded = reported.round().clamp(i64::MIN as f64, i64::MAX as f64) as i64;
    let clamped = rounded.clamp(0, 100) as u8;
    if rounded != i64::from(clamped) {
        warnings.push(Warning::ScoreClamped {
            reported: rounded,
            clamped,
        });
    }
    clamped
}

pub fn validate_response(raw: &str) -> Result<Validated, FormatError> {
    let text = clean(raw);
    let parts = parse_json(&text).unwrap_or_else(|| parse_headers(&text));

    let description = parts
        .description
        .filter(|d| !d.is_empty())
        .ok_or(FormatError::EmptySection {
            section: "CASE DESCRIPTION",
        })?;
    let narrative = parts
        .narrative
        .filter(|n| !n.is_empty())
        .ok_or(FormatError::EmptySection {
            section: "NARRATIVE",
        })?;
    let reported = parts.score.ok_or(FormatError::MissingScore)?;

    let mut warnings = Vec::new();
    let suspicion_score = normalize_score(reported, &mut warnings);

    Ok(Validated {
        report: CaseReport {
            description,
            suspicion_score,
            narrative,
        },
        warnings,
    })
}
