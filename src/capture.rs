//! Failure-pattern capture analyzer.
//!
//! Matches failure output against a fixed library of regular expressions and
//! produces draft [`SuggestedLearning`]s for the caller to review. Nothing
//! here touches the store: suggestions cross the trust boundary only when the
//! caller confirms one via [`crate::facade::LearningMemory::add_learning`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::types::CaoTriple;

/// A draft learning proposed from failure text, awaiting user confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedLearning {
    pub draft: CaoTriple,
    pub confidence: f64,
    /// Stable identifier of the pattern family that produced this suggestion.
    pub source: &'static str,
    pub context: String,
}

struct PatternRule {
    source: &'static str,
    regex: LazyLock<Regex>,
    confidence: f64,
    build: fn(&regex::Captures<'_>, &str) -> CaoTriple,
}

macro_rules! rule {
    ($source:literal, $pattern:literal, $confidence:expr, $build:expr) => {
        PatternRule {
            source: $source,
            regex: LazyLock::new(|| Regex::new($pattern).expect("valid capture-analyzer regex")),
            confidence: $confidence,
            build: $build,
        }
    };
}

static UNDEFINED_SYMBOL: PatternRule = rule!(
    "undefined_symbol",
    r"(?i)(undefined (?:reference to|symbol)|cannot find (?:value|function|symbol)) `?([A-Za-z0-9_:.]+)`?",
    0.7,
    |caps, ctx| CaoTriple {
        condition: format!("Build fails with an undefined symbol: {}", caps.get(2).map_or("", |m| m.as_str())),
        action: "Define the missing symbol or import/link the module that provides it".to_string(),
        outcome: format!("Undefined symbol error resolved\n\n{ctx}"),
    }
);

static TYPE_MISMATCH: PatternRule = rule!(
    "type_mismatch",
    r"(?i)(mismatched types|expected [^,\n]+, found [^,\n]+|type mismatch)",
    0.65,
    |_caps, ctx| CaoTriple {
        condition: "Build fails with a type mismatch error".to_string(),
        action: "Align the argument/return type with what the compiler expects".to_string(),
        outcome: format!("Type mismatch resolved\n\n{ctx}"),
    }
);

static IMPORT_CYCLE: PatternRule = rule!(
    "import_cycle",
    r"(?i)(import cycle|cyclic (?:import|dependency)|circular (?:import|dependency))",
    0.75,
    |_caps, ctx| CaoTriple {
        condition: "Build fails because of an import/dependency cycle".to_string(),
        action: "Break the cycle by extracting the shared code into a separate module".to_string(),
        outcome: format!("Import cycle resolved\n\n{ctx}"),
    }
);

static TEST_FAILURE: PatternRule = rule!(
    "test_failure",
    r"---\s*FAIL:\s*(\S+)",
    0.6,
    |caps, ctx| CaoTriple {
        condition: format!("Test {} fails", caps.get(1).map_or("", |m| m.as_str())),
        action: "Inspect the failing assertion and fix the underlying behavior".to_string(),
        outcome: format!("Test passes\n\n{ctx}"),
    }
);

static PERMISSION_DENIED: PatternRule = rule!(
    "permission_denied",
    r"(?i)permission denied",
    0.55,
    |_caps, ctx| CaoTriple {
        condition: "Operation fails with permission denied".to_string(),
        action: "Adjust file/process permissions or run with the required privileges".to_string(),
        outcome: format!("Operation succeeds\n\n{ctx}"),
    }
);

static FILE_NOT_FOUND: PatternRule = rule!(
    "file_not_found",
    r#"(?i)(?:['"]?([^\s'":]+)['"]?\s*:\s*(?:no such file or directory|file not found)|(?:no such file or directory|file not found)[:\s]*['"]?([^\s'"]+)['"]?)"#,
    0.6,
    |caps, ctx| CaoTriple {
        condition: format!(
            "File not found: {}",
            caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str())
        ),
        action: "Create the missing file or fix the path that references it".to_string(),
        outcome: format!("File is found and the operation succeeds\n\n{ctx}"),
    }
);

static MERGE_CONFLICT: PatternRule = rule!(
    "merge_conflict",
    r"(?i)CONFLICT \([^)]*\):.*?in\s+(\S+)",
    0.7,
    |caps, ctx| CaoTriple {
        condition: format!("Merge conflict in {}", caps.get(1).map_or("", |m| m.as_str())),
        action: "Resolve the conflicting hunks and re-stage the file".to_string(),
        outcome: format!("Merge completes cleanly\n\n{ctx}"),
    }
);

static TIMEOUT: PatternRule = rule!(
    "timeout",
    r"(?i)(context deadline exceeded|operation timed out|timeout (?:expired|exceeded))",
    0.55,
    |_caps, ctx| CaoTriple {
        condition: "Operation times out before completing".to_string(),
        action: "Increase the timeout/deadline or reduce the work done per call".to_string(),
        outcome: format!("Operation completes within the deadline\n\n{ctx}"),
    }
);

fn pattern_library() -> [&'static PatternRule; 8] {
    [
        &UNDEFINED_SYMBOL,
        &TYPE_MISMATCH,
        &IMPORT_CYCLE,
        &TEST_FAILURE,
        &PERMISSION_DENIED,
        &FILE_NOT_FOUND,
        &MERGE_CONFLICT,
        &TIMEOUT,
    ]
}

/// Matches failure text against the pattern library. Multiple patterns may
/// match the same input; all matches are returned, in library order.
#[must_use]
pub fn analyze_failure(text: &str) -> Vec<SuggestedLearning> {
    pattern_library()
        .into_iter()
        .filter_map(|rule| {
            let caps = rule.regex.captures(text)?;
            Some(SuggestedLearning {
                draft: (rule.build)(&caps, text),
                confidence: rule.confidence,
                source: rule.source,
                context: text.to_string(),
            })
        })
        .collect()
}
