//! Parses free-form `WHEN ... DO ... RESULT ...` text into a validated
//! [`CaoTriple`].
//!
//! Accepts both the single-line form (`WHEN <c> DO <a> RESULT <r>`) and the
//! multi-line form where each marker heads a section spanning one or more
//! lines. Markers are matched case-insensitively as whole words.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::CaoTriple;

static WHEN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bwhen\b").expect("valid regex"));
static DO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bdo\b").expect("valid regex"));
static RESULT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bresult\b").expect("valid regex"));

/// Failure taxonomy for [`parse_cao`]. The first matching rule wins, checked
/// in the order the variants are declared here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("missing WHEN marker")]
    MissingCondition,
    #[error("missing DO marker")]
    MissingAction,
    #[error("missing RESULT marker")]
    MissingOutcome,
    #[error("WHEN section is empty")]
    EmptyCondition,
    #[error("DO section is empty")]
    EmptyAction,
    #[error("RESULT section is empty")]
    EmptyOutcome,
}

/// Parse free-form CAO text into a triple. See module docs for the accepted
/// grammar and [`ParseError`] for the failure taxonomy.
pub fn parse_cao(input: &str) -> Result<CaoTriple, ParseError> {
    if input.trim().is_empty() {
        return Err(ParseError::MissingCondition);
    }

    let when_match = WHEN_RE.find(input).ok_or(ParseError::MissingCondition)?;
    let do_match = DO_RE
        .find_at(input, when_match.end())
        .ok_or(ParseError::MissingAction)?;
    let result_match = RESULT_RE
        .find_at(input, do_match.end())
        .ok_or(ParseError::MissingOutcome)?;

    let condition = clean_section(&input[when_match.end()..do_match.start()]);
    let action = clean_section(&input[do_match.end()..result_match.start()]);
    let outcome = clean_section(&input[result_match.end()..]);

    if condition.is_empty() {
        return Err(ParseError::EmptyCondition);
    }
    if action.is_empty() {
        return Err(ParseError::EmptyAction);
    }
    if outcome.is_empty() {
        return Err(ParseError::EmptyOutcome);
    }

    Ok(CaoTriple {
        condition,
        action,
        outcome,
    })
}

/// Strips leading/trailing blank lines from a section, preserving blank lines
/// that sit between non-blank content lines, then trims the remaining text.
fn clean_section(raw: &str) -> String {
    let lines: Vec<&str> = raw.lines().map(|l| l.trim_end_matches('\r')).collect();

    let first_non_blank = lines.iter().position(|l| !l.trim().is_empty());
    let Some(start) = first_non_blank else {
        return String::new();
    };
    let last_non_blank = lines.iter().rposition(|l| !l.trim().is_empty()).unwrap_or(start);

    lines[start..=last_non_blank].join("\n").trim().to_string()
}
