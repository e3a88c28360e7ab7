//! The rewrite driver: one pass over the rule table, left to right
//! through the buffer for dispatch rules, with locking in between.

use crate::error::RewriteError;
use crate::handler::{Edit, Invocation, SubConverter};
use crate::locks::{LockTable, splice};
use crate::rules::{Placeholder, Rule, RuleSet};
use log::{trace, warn};
use regex::Regex;
use retex_traits::Services;
use std::ops::Range;
use std::sync::Arc;

/// Per-run knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Trim surrounding whitespace from the input before the first rule.
    pub trim: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { trim: true }
    }
}

/// Passes a `repeat` regex rule can make before the engine gives up on
/// convergence.
const MAX_REGEX_PASSES: usize = 1000;

/// Steps one dispatch rule can take over one buffer. Generous; real
/// documents stay far below it, pathological converters cannot spin.
const MAX_DISPATCH_STEPS: usize = 65_536;

/// A single-use rewrite pass over one input.
///
/// `run` consumes the rewriter: the lock table and scan state belong to
/// exactly one input, so reuse is a type error rather than a runtime bug.
pub struct Rewriter<'r> {
    rules: &'r RuleSet,
    options: RunOptions,
}

impl<'r> Rewriter<'r> {
    pub fn new(rules: &'r RuleSet) -> Self {
        Self {
            rules,
            options: RunOptions::default(),
        }
    }

    pub fn with_options(rules: &'r RuleSet, options: RunOptions) -> Self {
        Self { rules, options }
    }

    /// Converts `input` by applying every rule once, in declaration
    /// order, then restoring all locked regions.
    pub fn run(self, input: &str, services: &mut Services<'_>) -> Result<String, RewriteError> {
        let mut buffer = retex_entities::to_numeric(input);
        if self.options.trim {
            let trimmed = buffer.trim();
            if trimmed.len() != buffer.len() {
                buffer = trimmed.to_string();
            }
        }

        let mut locks = LockTable::new();
        for at in Placeholder::ALL {
            let segment = self.rules.segment(at);
            if !segment.is_empty() {
                trace!("{} segment: {} rules", at.label(), segment.len());
            }
            for rule in segment {
                apply_rule(rule, &mut buffer, &mut locks, self.rules, self.options, services)?;
            }
        }
        locks.unlock_all(&mut buffer);
        Ok(buffer)
    }

    /// Converts raw bytes; the input must be UTF-8.
    pub fn run_bytes(
        self,
        input: &[u8],
        services: &mut Services<'_>,
    ) -> Result<String, RewriteError> {
        let text = std::str::from_utf8(input)?;
        self.run(text, services)
    }
}

fn apply_rule(
    rule: &Rule,
    buffer: &mut String,
    locks: &mut LockTable,
    rules: &RuleSet,
    options: RunOptions,
    services: &mut Services<'_>,
) -> Result<(), RewriteError> {
    match rule {
        Rule::Literal {
            search,
            replacement,
        } => {
            if buffer.contains(search.as_str()) {
                trace!("literal rule '{}' fired", search);
                *buffer = buffer.replace(search.as_str(), replacement);
            }
            Ok(())
        }
        Rule::Regex {
            regex,
            replacement,
            repeat,
        } => {
            apply_regex(regex, replacement, *repeat, buffer);
            Ok(())
        }
        Rule::Dispatch { regex, converter } => {
            run_dispatch(regex, converter, buffer, locks, rules, options, services)
        }
    }
}

fn apply_regex(regex: &Regex, replacement: &str, repeat: bool, buffer: &mut String) {
    if !repeat {
        if let std::borrow::Cow::Owned(next) = regex.replace_all(buffer, replacement) {
            trace!("regex rule '{}' fired", regex.as_str());
            *buffer = next;
        }
        return;
    }
    for pass in 0.. {
        if pass == MAX_REGEX_PASSES {
            warn!(
                "repeat rule '{}' did not converge after {} passes",
                regex.as_str(),
                MAX_REGEX_PASSES
            );
            break;
        }
        match regex.replace_all(buffer, replacement) {
            std::borrow::Cow::Borrowed(_) => break,
            std::borrow::Cow::Owned(next) => {
                if next == *buffer {
                    break;
                }
                *buffer = next;
            }
        }
    }
}

/// Walks the buffer left to right, handing each match to the converter.
///
/// A declined match advances the scan by one character, so the same spot
/// is never offered twice. An applied edit moves the scan to just past
/// the inserted text, so a converter's own output is never rescanned by
/// the rule that produced it.
fn run_dispatch(
    regex: &Regex,
    converter: &Arc<dyn SubConverter>,
    buffer: &mut String,
    locks: &mut LockTable,
    rules: &RuleSet,
    options: RunOptions,
    services: &mut Services<'_>,
) -> Result<(), RewriteError> {
    let mut cursor = 0usize;
    let mut steps = 0usize;
    while cursor <= buffer.len() {
        steps += 1;
        if steps > MAX_DISPATCH_STEPS {
            warn!(
                "dispatch rule '{}' exceeded {} steps; leaving the rest of the buffer as is",
                regex.as_str(),
                MAX_DISPATCH_STEPS
            );
            break;
        }

        let Some((match_start, match_end, groups)) = next_match(regex, buffer, cursor) else {
            break;
        };

        let edit = {
            let mut invocation = Invocation::new(
                buffer.as_str(),
                match_start,
                match_end,
                groups,
                rules,
                options,
                services,
                converter.name(),
            );
            converter
                .convert(&mut invocation)
                .map_err(|error| match error {
                    attributed @ RewriteError::Converter { .. } => attributed,
                    error => RewriteError::converter(converter.name(), error),
                })?;
            invocation.take_edit()
        };

        match edit {
            None => {
                trace!(
                    "converter '{}' declined match at byte {}",
                    converter.name(),
                    match_start
                );
                cursor = next_char_boundary(buffer, match_start);
            }
            Some(Edit { range, text, lock }) => {
                let start = range.start;
                if lock && !text.is_empty() {
                    let token = locks.splice_and_lock(buffer, range, &text);
                    cursor = start + token.len();
                } else {
                    splice(buffer, range, &text);
                    cursor = start + text.len();
                }
            }
        }
    }
    Ok(())
}

fn next_match(
    regex: &Regex,
    buffer: &str,
    cursor: usize,
) -> Option<(usize, usize, Vec<Option<Range<usize>>>)> {
    let captures = regex.captures_at(buffer, cursor)?;
    let whole = captures.get(0)?;
    let groups = (0..captures.len())
        .map(|index| captures.get(index).map(|g| g.start()..g.end()))
        .collect();
    Some((whole.start(), whole.end(), groups))
}

/// Position just after the character starting at `at`; one past the end
/// when `at` is already the end of the buffer.
fn next_char_boundary(buffer: &str, at: usize) -> usize {
    match buffer[at..].chars().next() {
        Some(c) => at + c.len_utf8(),
        None => buffer.len() + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RewriteError;
    use crate::handler::{Invocation, SubConverter};
    use crate::rules::Placeholder;
    use retex_traits::{ArtifactStore, PackageRegistry, Services, StaticContext};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn run(rules: &RuleSet, input: &str) -> String {
        let context = StaticContext::new();
        let mut packages = PackageRegistry::new();
        let mut files = ArtifactStore::new();
        let mut services = Services {
            context: &context,
            packages: &mut packages,
            files: &mut files,
        };
        Rewriter::new(rules)
            .run(input, &mut services)
            .expect("conversion succeeds")
    }

    #[test]
    fn test_rules_apply_in_declaration_order() {
        let mut rules = RuleSet::new();
        rules.insert(Placeholder::Top, Rule::literal("a", "b"));
        rules.insert(Placeholder::Default, Rule::literal("b", "c"));

        // The first rule's output is visible to the second.
        assert_eq!(run(&rules, "a"), "c");
    }

    #[test]
    fn test_later_segments_run_later() {
        let mut rules = RuleSet::new();
        rules.insert(Placeholder::Bottom, Rule::literal("b", "c"));
        rules.insert(Placeholder::Top, Rule::literal("a", "b"));

        // Segment order, not insertion order, decides.
        assert_eq!(run(&rules, "a"), "c");
    }

    #[test]
    fn test_literal_escaping_does_not_reprocess_its_own_output() {
        let mut rules = RuleSet::new();
        rules.insert(Placeholder::Default, Rule::literal("{", "\\{"));
        rules.insert(Placeholder::Default, Rule::literal("}", "\\}"));

        // The brace each replacement introduces is not matched again.
        assert_eq!(run(&rules, "{x}"), "\\{x\\}");
    }

    #[test]
    fn test_single_pass_regex_does_not_cascade() {
        let mut rules = RuleSet::new();
        rules.insert(
            Placeholder::Default,
            Rule::regex("aa", "a").expect("pattern compiles"),
        );

        // One pass over "aaaa" replaces disjoint pairs only.
        assert_eq!(run(&rules, "aaaa"), "aa");
    }

    #[test]
    fn test_repeat_regex_runs_to_fixed_point() {
        let mut rules = RuleSet::new();
        rules.insert(
            Placeholder::Default,
            Rule::regex_repeat("aa", "a").expect("pattern compiles"),
        );

        assert_eq!(run(&rules, "aaaaaaaa"), "a");
    }

    #[test]
    fn test_trim_option() {
        let rules = RuleSet::new();
        assert_eq!(run(&rules, "  padded  \n"), "padded");

        let context = StaticContext::new();
        let mut packages = PackageRegistry::new();
        let mut files = ArtifactStore::new();
        let mut services = Services {
            context: &context,
            packages: &mut packages,
            files: &mut files,
        };
        let kept = Rewriter::with_options(&rules, RunOptions { trim: false })
            .run("  padded  ", &mut services)
            .expect("conversion succeeds");
        assert_eq!(kept, "  padded  ");
    }

    #[test]
    fn test_named_entities_become_numeric_before_rules_run() {
        let mut rules = RuleSet::new();
        rules.insert(Placeholder::Top, Rule::literal("&#228;", "ae"));

        assert_eq!(run(&rules, "M&auml;rz"), "Maerz");
    }

    #[test]
    fn test_run_bytes_rejects_invalid_utf8() {
        let rules = RuleSet::new();
        let context = StaticContext::new();
        let mut packages = PackageRegistry::new();
        let mut files = ArtifactStore::new();
        let mut services = Services {
            context: &context,
            packages: &mut packages,
            files: &mut files,
        };
        let result = Rewriter::new(&rules).run_bytes(&[0x66, 0xFF, 0x66], &mut services);
        assert!(matches!(result, Err(RewriteError::Utf8Str(_))));
    }

    #[derive(Debug)]
    struct DeclineAll {
        offered: AtomicUsize,
    }

    impl SubConverter for DeclineAll {
        fn name(&self) -> &'static str {
            "decline-all"
        }
        fn convert(&self, _invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
            self.offered.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }
    }

    #[test]
    fn test_declined_matches_terminate_and_advance() {
        let converter = Arc::new(DeclineAll {
            offered: AtomicUsize::new(0),
        });
        let mut rules = RuleSet::new();
        rules.insert(
            Placeholder::Top,
            Rule::dispatch("a", converter.clone()).expect("pattern compiles"),
        );

        assert_eq!(run(&rules, "aaa"), "aaa");
        assert_eq!(converter.offered.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_declined_matches_advance_over_multibyte_text() {
        let converter = Arc::new(DeclineAll {
            offered: AtomicUsize::new(0),
        });
        let mut rules = RuleSet::new();
        rules.insert(
            Placeholder::Top,
            Rule::dispatch("[aä]", converter.clone()).expect("pattern compiles"),
        );

        assert_eq!(run(&rules, "äaä"), "äaä");
        assert_eq!(converter.offered.load(Ordering::Relaxed), 3);
    }

    #[derive(Debug)]
    struct FailOnMatch;

    impl SubConverter for FailOnMatch {
        fn name(&self) -> &'static str {
            "fail-on-match"
        }
        fn convert(&self, _invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
            Err(RewriteError::Markup("unusable fragment".to_string()))
        }
    }

    #[test]
    fn test_handler_failures_name_the_converter() {
        let mut rules = RuleSet::new();
        rules.insert(
            Placeholder::Top,
            Rule::dispatch("x", Arc::new(FailOnMatch)).expect("pattern compiles"),
        );
        let context = StaticContext::new();
        let mut packages = PackageRegistry::new();
        let mut files = ArtifactStore::new();
        let mut services = Services {
            context: &context,
            packages: &mut packages,
            files: &mut files,
        };

        let error = Rewriter::new(&rules)
            .run("a x b", &mut services)
            .expect_err("handler failure aborts the run");
        assert!(matches!(error, RewriteError::Converter { .. }));
        assert!(error.to_string().contains("fail-on-match"));
        assert!(error.to_string().contains("unusable fragment"));
    }

    #[derive(Debug)]
    struct DoubleX {
        fired: AtomicUsize,
    }

    impl SubConverter for DoubleX {
        fn name(&self) -> &'static str {
            "double-x"
        }
        fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
            self.fired.fetch_add(1, Ordering::Relaxed);
            // The replacement matches the rule pattern again.
            invocation.replace("xx");
            Ok(())
        }
    }

    #[test]
    fn test_scan_continues_after_the_effect_not_inside_it() {
        let converter = Arc::new(DoubleX {
            fired: AtomicUsize::new(0),
        });
        let mut rules = RuleSet::new();
        rules.insert(
            Placeholder::Top,
            Rule::dispatch("x", converter.clone()).expect("pattern compiles"),
        );

        // Each source "x" is rewritten exactly once; the emitted "xx" is
        // never offered back to the converter.
        assert_eq!(run(&rules, "x.x"), "xx.xx");
        assert_eq!(converter.fired.load(Ordering::Relaxed), 2);
    }

    #[derive(Debug)]
    struct SwapPackage;

    impl SubConverter for SwapPackage {
        fn name(&self) -> &'static str {
            "swap-package"
        }
        fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
            invocation.packages().remove_package("color");
            invocation.use_package("xcolor", &[], None)?;
            invocation.replace("");
            Ok(())
        }
    }

    #[test]
    fn test_converters_can_reshape_the_package_registry() {
        let mut rules = RuleSet::new();
        rules.insert(
            Placeholder::Top,
            Rule::dispatch("<plain/>", Arc::new(SwapPackage)).expect("pattern compiles"),
        );
        let context = StaticContext::new();
        let mut packages = PackageRegistry::new();
        packages.use_package("color", &[], None).expect("registers");
        let mut files = ArtifactStore::new();
        let mut services = Services {
            context: &context,
            packages: &mut packages,
            files: &mut files,
        };

        let latex = Rewriter::new(&rules)
            .run("a <plain/> b", &mut services)
            .expect("conversion succeeds");
        assert_eq!(latex, "a  b");
        let names: Vec<String> = packages.resolve().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["xcolor".to_string()]);
    }

    #[derive(Debug)]
    struct LockEmit;

    impl SubConverter for LockEmit {
        fn name(&self) -> &'static str {
            "lock-emit"
        }
        fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
            invocation.replace_and_lock("\\texttt{safe}");
            Ok(())
        }
    }

    #[test]
    fn test_locked_output_survives_later_rules() {
        let mut rules = RuleSet::new();
        rules.insert(
            Placeholder::Top,
            Rule::dispatch("<code/>", Arc::new(LockEmit)).expect("pattern compiles"),
        );
        // A later rule that would mangle the emitted LaTeX.
        rules.insert(Placeholder::Bottom, Rule::literal("safe", "MANGLED"));
        rules.insert(Placeholder::Bottom, Rule::literal("\\texttt", "BROKEN"));

        assert_eq!(run(&rules, "x <code/> y safe"), "x \\texttt{safe} y MANGLED");
    }

    #[derive(Debug)]
    struct WidenToParen;

    impl SubConverter for WidenToParen {
        fn name(&self) -> &'static str {
            "widen-to-paren"
        }
        fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
            // Extend the replaced span from the match to the closing ')'.
            let start = invocation.match_range().start;
            let Some(close) = invocation.buffer()[start..].find(')') else {
                return Ok(());
            };
            invocation.replace_span(start..start + close + 1, "[gone]");
            Ok(())
        }
    }

    #[test]
    fn test_span_replacement_covers_text_beyond_the_match() {
        let mut rules = RuleSet::new();
        rules.insert(
            Placeholder::Top,
            Rule::dispatch(r"\(", Arc::new(WidenToParen)).expect("pattern compiles"),
        );

        assert_eq!(run(&rules, "a (b c) d (e"), "a [gone] d (e");
    }

    #[derive(Debug)]
    struct RecurseInner;

    impl SubConverter for RecurseInner {
        fn name(&self) -> &'static str {
            "recurse-inner"
        }
        fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
            let inner = invocation
                .group(1)
                .map(str::to_string)
                .unwrap_or_default();
            let converted = invocation.convert_fragment(&inner)?;
            invocation.replace_and_lock(format!("[{}]", converted));
            Ok(())
        }
    }

    #[test]
    fn test_fragment_recursion_applies_the_full_table() {
        let mut rules = RuleSet::new();
        rules.insert(
            Placeholder::Top,
            Rule::dispatch(r"\{(\w+)\}", Arc::new(RecurseInner)).expect("pattern compiles"),
        );
        rules.insert(Placeholder::Default, Rule::literal("inner", "INNER"));

        // The nested run applies the Default rule to the fragment; the
        // lock keeps the outer Default pass away from the result.
        assert_eq!(run(&rules, "{inner} inner"), "[INNER] INNER");
    }
}
