//! Inline sub-converters: character escaping, numeric entities,
//! hyperlinks, footnotes, strikeout, bare URLs, preformatted blocks,
//! and the trailing-linebreak fixup.

use crate::dom::{balanced_span, strip_tags};
use log::debug;
use regex::Regex;
use retex_engine::{Invocation, RewriteError, SubConverter};
use retex_entities::{decode_numeric, decode_numeric_refs, numeric_ref_len};
use std::sync::LazyLock;

/// The LaTeX rendering of a reserved character, if `c` is one.
fn latex_escape(c: char) -> Option<&'static str> {
    Some(match c {
        '\\' => "\\textbackslash{}",
        '{' => "\\{",
        '}' => "\\}",
        '$' => "\\$",
        '&' => "\\&",
        '%' => "\\%",
        '#' => "\\#",
        '_' => "\\_",
        '~' => "\\textasciitilde{}",
        '^' => "\\textasciicircum{}",
        _ => return None,
    })
}

/// Escapes the ten LaTeX-reserved characters, one match at a time.
///
/// Declines on an `&` that opens a numeric character reference, and on
/// the `#` inside one, so deferred references reach the later rules
/// intact.
#[derive(Debug, Default)]
pub struct EscapeConverter;

impl SubConverter for EscapeConverter {
    fn name(&self) -> &'static str {
        "escape"
    }

    fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
        let start = invocation.match_range().start;
        let Some(c) = invocation.matched().chars().next() else {
            return Ok(());
        };
        match c {
            '&' if numeric_ref_len(&invocation.buffer()[start..]).is_some() => Ok(()),
            '#' if follows_ref_opener(invocation.buffer(), start) => Ok(()),
            c => {
                if let Some(escaped) = latex_escape(c) {
                    invocation.replace(escaped);
                }
                Ok(())
            }
        }
    }
}

fn follows_ref_opener(buffer: &str, start: usize) -> bool {
    buffer[..start].ends_with('&') && numeric_ref_len(&buffer[start - 1..]).is_some()
}

/// Decodes numeric character references into literal text.
///
/// The replacement is deliberately unlocked: decoded characters go
/// through the same escaping as ordinary text. The exceptions are
/// `<` and `>` (codepoints 60 and 62), which stay encoded so decoded
/// text can never form a counterfeit tag; the bottom rules render the
/// surviving references. References to LaTeX-reserved characters are
/// escaped here and locked; released raw, a decoded `&` could fuse
/// with the text after it into a reference that was never in the
/// source.
#[derive(Debug, Default)]
pub struct EntityConverter;

impl SubConverter for EntityConverter {
    fn name(&self) -> &'static str {
        "entity"
    }

    fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
        let Some(c) = decode_numeric(invocation.matched()) else {
            debug!(
                "leaving undecodable reference {} alone",
                invocation.matched()
            );
            return Ok(());
        };
        match c {
            '<' => invocation.replace("&#60;"),
            '>' => invocation.replace("&#62;"),
            c if c.is_control() && c != '\n' && c != '\t' => {
                debug!("dropping control character reference {}", invocation.matched());
                invocation.replace("");
            }
            c => match latex_escape(c) {
                Some(escaped) => invocation.replace_and_lock(escaped),
                None => invocation.replace(c.to_string()),
            },
        }
        Ok(())
    }
}

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("pattern compiles")
});

/// Converts anchors into `\href{url}{text}`.
///
/// Relative URLs resolve through the context provider. Anchors without
/// an `href` decline and fall through to the leftover rules.
#[derive(Debug, Default)]
pub struct HyperlinkConverter;

impl SubConverter for HyperlinkConverter {
    fn name(&self) -> &'static str {
        "hyperlink"
    }

    fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
        let start = invocation.match_range().start;
        let open_tag = invocation.matched().to_string();
        let href = HREF_RE
            .captures(&open_tag)
            .and_then(|captures| {
                captures
                    .get(1)
                    .or_else(|| captures.get(2))
                    .or_else(|| captures.get(3))
            })
            .map(|group| group.as_str().trim().to_string())
            .unwrap_or_default();
        if href.is_empty() {
            debug!("anchor without href, declining");
            return Ok(());
        }
        let Some((inner_end, outer_end)) = balanced_span(invocation.buffer(), start, "a") else {
            debug!("unbalanced <a>, declining");
            return Ok(());
        };
        let inner = invocation.buffer()[invocation.match_range().end..inner_end].to_string();
        let text = invocation.convert_fragment(&inner)?;
        let text = text.trim();
        let url = escape_url(&invocation.context().resolve_url(&decode_numeric_refs(&href)));
        invocation.use_package("hyperref", &[], None)?;
        let latex = if text.is_empty() {
            format!("\\url{{{url}}}")
        } else {
            format!("\\href{{{url}}}{{{text}}}")
        };
        invocation.replace_span_and_lock(start..outer_end, latex);
        Ok(())
    }
}

/// Escapes a URL for use inside `\href`/`\url`.
///
/// `%` and `#` carry meaning in LaTeX and are backslash-escaped; the
/// characters that would break the argument group are percent-encoded.
fn escape_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for c in url.chars() {
        match c {
            '%' => out.push_str("\\%"),
            '#' => out.push_str("\\#"),
            '{' => out.push_str("%7B"),
            '}' => out.push_str("%7D"),
            '\\' => out.push_str("%5C"),
            ' ' => out.push_str("%20"),
            c => out.push(c),
        }
    }
    out
}

/// Converts `<span class="footnote">` into `\footnote{…}`.
#[derive(Debug, Default)]
pub struct FootnoteConverter;

impl SubConverter for FootnoteConverter {
    fn name(&self) -> &'static str {
        "footnote"
    }

    fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
        let start = invocation.match_range().start;
        let Some((inner_end, outer_end)) = balanced_span(invocation.buffer(), start, "span")
        else {
            debug!("unbalanced footnote span, declining");
            return Ok(());
        };
        let inner = invocation.buffer()[invocation.match_range().end..inner_end].to_string();
        let text = invocation.convert_fragment(&inner)?;
        let text = text.trim();
        if text.is_empty() {
            invocation.replace_span(start..outer_end, "");
        } else {
            invocation.replace_span_and_lock(start..outer_end, format!("\\footnote{{{text}}}"));
        }
        Ok(())
    }
}

/// Converts `<s>`, `<del>`, and `<strike>` into `\sout{…}`.
#[derive(Debug, Default)]
pub struct StrikeoutConverter;

impl SubConverter for StrikeoutConverter {
    fn name(&self) -> &'static str {
        "strikeout"
    }

    fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
        let start = invocation.match_range().start;
        let Some(tag) = invocation.group(1).map(str::to_ascii_lowercase) else {
            return Ok(());
        };
        let Some((inner_end, outer_end)) = balanced_span(invocation.buffer(), start, &tag) else {
            debug!("unbalanced <{tag}>, declining");
            return Ok(());
        };
        let inner = invocation.buffer()[invocation.match_range().end..inner_end].to_string();
        let text = invocation.convert_fragment(&inner)?;
        let text = text.trim();
        if text.is_empty() {
            invocation.replace_span(start..outer_end, "");
            return Ok(());
        }
        invocation.use_package("ulem", &["normalem"], None)?;
        invocation.replace_span_and_lock(start..outer_end, format!("\\sout{{{text}}}"));
        Ok(())
    }
}

const URL_TRAILERS: [char; 10] = ['.', ',', ';', ':', '!', '?', ')', ']', '\'', '"'];

/// Wraps URLs appearing in plain text in `\url{…}`.
///
/// Trailing sentence punctuation is left outside the link.
#[derive(Debug, Default)]
pub struct BareUrlConverter;

impl SubConverter for BareUrlConverter {
    fn name(&self) -> &'static str {
        "bare-url"
    }

    fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
        let trimmed = invocation.matched().trim_end_matches(URL_TRAILERS).to_string();
        if trimmed.is_empty() {
            return Ok(());
        }
        let url = escape_url(&decode_numeric_refs(&trimmed));
        let range = invocation.match_range();
        invocation.use_package("hyperref", &[], None)?;
        invocation
            .replace_span_and_lock(range.start..range.start + trimmed.len(), format!("\\url{{{url}}}"));
        Ok(())
    }
}

/// Converts `<pre>` blocks into `verbatim` environments.
///
/// Inner tags are stripped and references decoded; the result is locked
/// so nothing downstream rewrites the verbatim text.
#[derive(Debug, Default)]
pub struct PreConverter;

impl SubConverter for PreConverter {
    fn name(&self) -> &'static str {
        "pre"
    }

    fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
        let start = invocation.match_range().start;
        let Some((inner_end, outer_end)) = balanced_span(invocation.buffer(), start, "pre")
        else {
            debug!("unbalanced <pre>, declining");
            return Ok(());
        };
        let inner = &invocation.buffer()[invocation.match_range().end..inner_end];
        let text = decode_numeric_refs(&strip_tags(inner));
        let text = text.trim_matches('\n').to_string();
        if text.is_empty() {
            invocation.replace_span(start..outer_end, "");
        } else {
            invocation.replace_span_and_lock(
                start..outer_end,
                format!("\\begin{{verbatim}}\n{text}\n\\end{{verbatim}}"),
            );
        }
        Ok(())
    }
}

/// Removes a `\\` line break left dangling before a paragraph break or
/// at the end of the output, where LaTeX rejects it.
#[derive(Debug, Default)]
pub struct NewlineFixupConverter;

impl SubConverter for NewlineFixupConverter {
    fn name(&self) -> &'static str {
        "newline-fixup"
    }

    fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
        let at_end = invocation.match_range().end == invocation.buffer().len();
        if at_end {
            invocation.replace("");
        } else {
            invocation.replace("\n\n");
        }
        Ok(())
    }
}
