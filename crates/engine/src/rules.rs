//! The rule table: ordered literal, regex, and dispatch rules grouped
//! into named pipeline segments.

use crate::error::RewriteError;
use crate::handler::SubConverter;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// A named position in the pipeline. Rules run segment by segment:
/// everything in `Top`, then `Default`, then `Bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    Top,
    Default,
    Bottom,
}

impl Placeholder {
    pub const ALL: [Placeholder; 3] = [Placeholder::Top, Placeholder::Default, Placeholder::Bottom];

    pub fn label(self) -> &'static str {
        match self {
            Placeholder::Top => "top",
            Placeholder::Default => "default",
            Placeholder::Bottom => "bottom",
        }
    }
}

/// A single rewrite rule.
#[derive(Clone)]
pub enum Rule {
    /// Replaces every occurrence of `search` in one pass.
    Literal { search: String, replacement: String },
    /// Replaces every regex match; with `repeat`, reapplies until the
    /// buffer stops changing.
    Regex {
        regex: Regex,
        replacement: String,
        repeat: bool,
    },
    /// Walks matches left to right and hands each one to a sub-converter,
    /// which may rewrite an arbitrary span of the buffer or decline.
    Dispatch {
        regex: Regex,
        converter: Arc<dyn SubConverter>,
    },
}

impl Rule {
    pub fn literal(search: impl Into<String>, replacement: impl Into<String>) -> Self {
        Rule::Literal {
            search: search.into(),
            replacement: replacement.into(),
        }
    }

    pub fn regex(pattern: &str, replacement: impl Into<String>) -> Result<Self, RewriteError> {
        Ok(Rule::Regex {
            regex: compile(pattern)?,
            replacement: replacement.into(),
            repeat: false,
        })
    }

    pub fn regex_repeat(
        pattern: &str,
        replacement: impl Into<String>,
    ) -> Result<Self, RewriteError> {
        Ok(Rule::Regex {
            regex: compile(pattern)?,
            replacement: replacement.into(),
            repeat: true,
        })
    }

    pub fn dispatch(
        pattern: &str,
        converter: Arc<dyn SubConverter>,
    ) -> Result<Self, RewriteError> {
        Ok(Rule::Dispatch {
            regex: compile(pattern)?,
            converter,
        })
    }

    /// The identity of a rule for upsert purposes: its literal search
    /// text or its regex pattern.
    pub fn search_key(&self) -> &str {
        match self {
            Rule::Literal { search, .. } => search,
            Rule::Regex { regex, .. } => regex.as_str(),
            Rule::Dispatch { regex, .. } => regex.as_str(),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, RewriteError> {
    Regex::new(pattern).map_err(|source| RewriteError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Literal {
                search,
                replacement,
            } => f
                .debug_struct("Literal")
                .field("search", search)
                .field("replacement", replacement)
                .finish(),
            Rule::Regex {
                regex,
                replacement,
                repeat,
            } => f
                .debug_struct("Regex")
                .field("pattern", &regex.as_str())
                .field("replacement", replacement)
                .field("repeat", repeat)
                .finish(),
            Rule::Dispatch { regex, converter } => f
                .debug_struct("Dispatch")
                .field("pattern", &regex.as_str())
                .field("converter", &converter.name())
                .finish(),
        }
    }
}

/// An ordered rule table.
///
/// Rules are keyed by their search text: inserting a rule whose key is
/// already present replaces that rule in place, keeping its original
/// position and segment. New keys append to the end of the requested
/// segment.
#[derive(Debug, Clone)]
pub struct RuleSet {
    segments: [Vec<Rule>; 3],
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleSet {
    pub fn new() -> Self {
        Self {
            segments: [Vec::new(), Vec::new(), Vec::new()],
        }
    }

    fn segment_index(at: Placeholder) -> usize {
        match at {
            Placeholder::Top => 0,
            Placeholder::Default => 1,
            Placeholder::Bottom => 2,
        }
    }

    /// Inserts or replaces a rule. The replacement position of an
    /// existing key wins over the requested segment.
    pub fn insert(&mut self, at: Placeholder, rule: Rule) {
        for segment in &mut self.segments {
            if let Some(slot) = segment
                .iter_mut()
                .find(|existing| existing.search_key() == rule.search_key())
            {
                *slot = rule;
                return;
            }
        }
        self.segments[Self::segment_index(at)].push(rule);
    }

    pub fn extend(&mut self, rules: impl IntoIterator<Item = (Placeholder, Rule)>) {
        for (at, rule) in rules {
            self.insert(at, rule);
        }
    }

    /// The rules of one segment, in order.
    pub fn segment(&self, at: Placeholder) -> &[Rule] {
        &self.segments[Self::segment_index(at)]
    }

    /// All rules in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.segments.iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(rules: &RuleSet) -> Vec<&str> {
        rules.iter().map(Rule::search_key).collect()
    }

    #[test]
    fn test_iter_follows_segment_order() {
        let mut rules = RuleSet::new();
        rules.insert(Placeholder::Bottom, Rule::literal("late", ""));
        rules.insert(Placeholder::Top, Rule::literal("early", ""));
        rules.insert(Placeholder::Default, Rule::literal("middle", ""));

        assert_eq!(keys(&rules), vec!["early", "middle", "late"]);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut rules = RuleSet::new();
        rules.insert(Placeholder::Top, Rule::literal("a", "1"));
        rules.insert(Placeholder::Top, Rule::literal("b", "2"));

        // Same key, different segment: position is kept, payload swapped.
        rules.insert(Placeholder::Bottom, Rule::literal("a", "override"));

        assert_eq!(keys(&rules), vec!["a", "b"]);
        let Rule::Literal { replacement, .. } = &rules.segment(Placeholder::Top)[0] else {
            panic!("expected literal rule");
        };
        assert_eq!(replacement, "override");
    }

    #[test]
    fn test_regex_and_literal_keys_are_distinct_rules() {
        let mut rules = RuleSet::new();
        rules.insert(Placeholder::Top, Rule::literal("<br>", ""));
        rules.insert(
            Placeholder::Top,
            Rule::regex("<br>", "x").expect("pattern compiles"),
        );

        // Identical key text: the regex rule replaced the literal.
        assert_eq!(rules.len(), 1);
        assert!(matches!(rules.iter().next(), Some(Rule::Regex { .. })));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let err = Rule::regex("(unclosed", "").unwrap_err();
        assert!(err.to_string().contains("(unclosed"));
    }
}
