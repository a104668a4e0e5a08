//! Lexical intent classification.
//!
//! Each target owns a keyword family. A prompt is scanned against every
//! family independently; the set of matched families decides the intent.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Serialize, Serializer};
use switchboard_core::Target;

// =============================================================================
// Keyword families (compiled once, reused across calls)
// =============================================================================

struct Family {
    target: Target,
    keywords: Vec<(&'static str, Regex)>,
}

static FAMILIES: LazyLock<Vec<Family>> = LazyLock::new(|| {
    let mk = |target: Target, words: &[&'static str]| Family {
        target,
        keywords: words
            .iter()
            .map(|w| {
                let pattern = format!(r"(?i)\b{}", regex::escape(w));
                (*w, Regex::new(&pattern).expect("Invalid keyword regex"))
            })
            .collect(),
    };

    vec![
        mk(
            Target::Knowledge,
            &["explain", "what", "who", "rag", "knowledge", "policy", "guide"],
        ),
        mk(
            Target::Analytics,
            &["chart", "sql", "trend", "genie", "visual"],
        ),
        mk(
            Target::Tasks,
            &["jira", "task", "standup", "ticket", "email"],
        ),
    ]
});

// =============================================================================
// Intent
// =============================================================================

/// Classification outcome for one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    /// Exactly one family matched, or none did and the prompt defaulted to
    /// knowledge.
    Single(Target),
    /// Two or more families matched.
    Mixed,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Single(target) => target.as_str(),
            Intent::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Intent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Classification with the evidence behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub intent: Intent,
    /// Families that matched. Empty when the intent was defaulted.
    pub matched: BTreeSet<Target>,
    pub reasons: Vec<String>,
}

impl Classification {
    pub fn defaulted(&self) -> bool {
        self.matched.is_empty()
    }
}

/// Classify a prompt. Total: a prompt with no keyword is knowledge.
pub fn classify(prompt: &str) -> Intent {
    classify_detailed(prompt).intent
}

/// Classify a prompt and report which keyword matched each family.
///
/// Only the first matching keyword of a family is reported.
pub fn classify_detailed(prompt: &str) -> Classification {
    let mut matched = BTreeSet::new();
    let mut reasons = Vec::new();

    for family in FAMILIES.iter() {
        if let Some((word, _)) = family.keywords.iter().find(|(_, re)| re.is_match(prompt)) {
            matched.insert(family.target);
            reasons.push(format!("matched keyword '{}' for {}", word, family.target));
        }
    }

    let intent = match matched.len() {
        0 => {
            reasons.push("defaulted to knowledge intent".to_string());
            Intent::Single(Target::Knowledge)
        }
        1 => matched
            .iter()
            .next()
            .map(|t| Intent::Single(*t))
            .unwrap_or(Intent::Single(Target::Knowledge)),
        _ => Intent::Mixed,
    };

    Classification {
        intent,
        matched,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_keyword_defaults_to_knowledge() {
        for prompt in ["", "hello there", "summarize progress", "12345 !!"] {
            assert_eq!(classify(prompt), Intent::Single(Target::Knowledge), "{prompt}");
        }
        let c = classify_detailed("good morning");
        assert!(c.defaulted());
        assert_eq!(c.reasons, vec!["defaulted to knowledge intent"]);
    }

    #[test]
    fn test_single_family_matches() {
        assert_eq!(
            classify("Show me the revenue chart"),
            Intent::Single(Target::Analytics)
        );
        assert_eq!(
            classify("Open a JIRA ticket for the outage"),
            Intent::Single(Target::Tasks)
        );
        assert_eq!(
            classify("Explain the travel policy"),
            Intent::Single(Target::Knowledge)
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(classify("SQL please"), Intent::Single(Target::Analytics));
        assert_eq!(classify("StandUp notes"), Intent::Single(Target::Tasks));
    }

    #[test]
    fn test_keywords_match_at_word_start() {
        // Prefix matches count ("tasks", "charts", "trending").
        assert_eq!(classify("list my tasks"), Intent::Single(Target::Tasks));
        assert_eq!(classify("trending charts"), Intent::Single(Target::Analytics));
        // Mid-word occurrences do not ("multitask", "storage").
        assert_eq!(classify("multitasking"), Intent::Single(Target::Knowledge));
        assert!(classify_detailed("storage").defaulted());
    }

    #[test]
    fn test_two_families_is_mixed() {
        let c = classify_detailed("Create a Jira task and share the latest chart");
        assert_eq!(c.intent, Intent::Mixed);
        assert_eq!(
            c.matched.iter().copied().collect::<Vec<_>>(),
            vec![Target::Analytics, Target::Tasks]
        );
        assert!(c.reasons.iter().any(|r| r.contains("jira")));
    }

    #[test]
    fn test_three_families_is_mixed() {
        assert_eq!(
            classify("explain the sql behind the jira digest"),
            Intent::Mixed
        );
    }

    #[test]
    fn test_reason_reports_first_keyword_per_family() {
        let c = classify_detailed("email the task list");
        assert_eq!(c.reasons, vec!["matched keyword 'task' for tasks"]);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let prompt = "what is the ticket trend";
        assert_eq!(classify_detailed(prompt), classify_detailed(prompt));
    }

    #[test]
    fn test_intent_serializes_as_string() {
        assert_eq!(serde_json::to_value(Intent::Mixed).unwrap(), "mixed");
        assert_eq!(
            serde_json::to_value(Intent::Single(Target::Tasks)).unwrap(),
            "tasks"
        );
    }
}
