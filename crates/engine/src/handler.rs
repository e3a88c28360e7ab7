//! The sub-converter contract: how dispatch rules hand matches to
//! domain-specific conversion code.

use crate::error::RewriteError;
use crate::rewriter::{Rewriter, RunOptions};
use crate::rules::RuleSet;
use log::warn;
use retex_traits::{ArtifactStore, ContextProvider, PackageRegistry, Services};
use std::fmt::Debug;
use std::ops::Range;

/// A pluggable converter invoked for each match of a dispatch rule.
///
/// Implementations inspect the match through the [`Invocation`] and either
/// queue exactly one edit (`replace*` methods) or return without queuing
/// one, which declines the match and moves the scan on by one character.
pub trait SubConverter: Send + Sync + Debug {
    /// Returns a short name for this converter (for logging and errors).
    fn name(&self) -> &'static str;

    /// Handles one match. Returning `Ok` without queuing an edit declines
    /// the match.
    fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError>;
}

/// The edit a sub-converter queued for the engine to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edit {
    pub range: Range<usize>,
    pub text: String,
    pub lock: bool,
}

/// One dispatch-rule match, presented to a sub-converter.
///
/// The buffer is read-only here; mutations go through the queued edit so
/// the engine can maintain its scan position and the lock table.
pub struct Invocation<'i, 's> {
    buffer: &'i str,
    match_start: usize,
    match_end: usize,
    groups: Vec<Option<Range<usize>>>,
    rules: &'i RuleSet,
    options: RunOptions,
    services: &'i mut Services<'s>,
    converter: &'static str,
    edit: Option<Edit>,
}

impl<'i, 's> Invocation<'i, 's> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        buffer: &'i str,
        match_start: usize,
        match_end: usize,
        groups: Vec<Option<Range<usize>>>,
        rules: &'i RuleSet,
        options: RunOptions,
        services: &'i mut Services<'s>,
        converter: &'static str,
    ) -> Self {
        Self {
            buffer,
            match_start,
            match_end,
            groups,
            rules,
            options,
            services,
            converter,
            edit: None,
        }
    }

    /// The whole working buffer.
    pub fn buffer(&self) -> &str {
        self.buffer
    }

    /// The matched text.
    pub fn matched(&self) -> &str {
        &self.buffer[self.match_start..self.match_end]
    }

    /// Byte range of the match within [`Self::buffer`].
    pub fn match_range(&self) -> Range<usize> {
        self.match_start..self.match_end
    }

    /// Text of a capture group, if it participated in the match.
    /// Group 0 is the whole match.
    pub fn group(&self, index: usize) -> Option<&str> {
        let range = self.groups.get(index)?.clone()?;
        Some(&self.buffer[range])
    }

    /// The document context for URL resolution and metadata lookups.
    pub fn context(&self) -> &dyn ContextProvider {
        self.services.context
    }

    /// The package registry for this conversion run.
    pub fn packages(&mut self) -> &mut PackageRegistry {
        self.services.packages
    }

    /// The auxiliary file sink for this conversion run.
    pub fn files(&mut self) -> &mut ArtifactStore {
        self.services.files
    }

    /// Registers a package requirement, for converters that emit markup
    /// depending on one.
    pub fn use_package(
        &mut self,
        name: &str,
        options: &[&str],
        insert_after: Option<&str>,
    ) -> Result<(), RewriteError> {
        self.services
            .packages
            .use_package(name, options, insert_after)?;
        Ok(())
    }

    /// Queues replacement of the matched text.
    pub fn replace(&mut self, text: impl Into<String>) {
        self.set_edit(self.match_range(), text.into(), false);
    }

    /// Queues replacement of the matched text, protecting the emitted
    /// text from every later rule.
    pub fn replace_and_lock(&mut self, text: impl Into<String>) {
        self.set_edit(self.match_range(), text.into(), true);
    }

    /// Queues replacement of an arbitrary span of the buffer. The span
    /// usually extends the match, e.g. to a balancing close tag.
    pub fn replace_span(&mut self, range: Range<usize>, text: impl Into<String>) {
        self.set_edit(range, text.into(), false);
    }

    /// Queues replacement of an arbitrary span of the buffer, protecting
    /// the emitted text from every later rule.
    pub fn replace_span_and_lock(&mut self, range: Range<usize>, text: impl Into<String>) {
        self.set_edit(range, text.into(), true);
    }

    /// Runs the full rule pipeline over a detached fragment of markup and
    /// returns the result. The surrounding buffer is untouched; the
    /// fragment shares this run's context, packages, and file sink.
    pub fn convert_fragment(&mut self, fragment: &str) -> Result<String, RewriteError> {
        let rules = self.rules;
        self.convert_fragment_with(fragment, rules)
    }

    /// Like [`Self::convert_fragment`], with a caller-supplied rule table.
    pub fn convert_fragment_with(
        &mut self,
        fragment: &str,
        rules: &RuleSet,
    ) -> Result<String, RewriteError> {
        let rewriter = Rewriter::with_options(rules, self.options);
        rewriter.run(fragment, &mut self.services.reborrow())
    }

    fn set_edit(&mut self, range: Range<usize>, text: String, lock: bool) {
        assert!(
            range.start <= range.end && range.end <= self.buffer.len(),
            "sub-converter '{}' queued an edit outside the buffer: {:?} in {} bytes",
            self.converter,
            range,
            self.buffer.len()
        );
        assert!(
            self.buffer.is_char_boundary(range.start) && self.buffer.is_char_boundary(range.end),
            "sub-converter '{}' queued an edit that splits a character: {:?}",
            self.converter,
            range
        );
        if self.edit.is_some() {
            warn!(
                "sub-converter '{}' queued more than one edit; keeping the last",
                self.converter
            );
        }
        self.edit = Some(Edit { range, text, lock });
    }

    pub(crate) fn take_edit(self) -> Option<Edit> {
        self.edit
    }
}
