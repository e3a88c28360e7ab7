//! List conversion: `ul`, `ol`, and `dl` into `itemize`, `enumerate`,
//! and `description` environments.
//!
//! Nested lists are carried through the parsed tree rather than left to
//! pipeline recursion so the nesting depth is known: LaTeX allows four
//! levels, and anything deeper renders flattened, without an
//! environment. Definition lists pair each `dt` with the following
//! `dd`; unpaired entries are dropped.

use crate::dom::{
    attr_ci, balanced_span, extend_over_siblings, inner_markup, tag_eq, with_fragment,
};
use log::{debug, warn};
use retex_engine::{Invocation, RewriteError, SubConverter};
use roxmltree::Node;

/// LaTeX refuses list nesting beyond this depth.
const MAX_DEPTH: usize = 4;

const ENUM_COUNTERS: [&str; 4] = ["enumi", "enumii", "enumiii", "enumiv"];

const LIST_TAGS: [&str; 3] = ["ul", "ol", "dl"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bullets,
    Numbers,
    Definitions,
}

impl Kind {
    fn from_tag(tag: &str) -> Option<Kind> {
        match tag.to_ascii_lowercase().as_str() {
            "ul" => Some(Kind::Bullets),
            "ol" => Some(Kind::Numbers),
            "dl" => Some(Kind::Definitions),
            _ => None,
        }
    }

    fn environment(self) -> &'static str {
        match self {
            Kind::Bullets => "itemize",
            Kind::Numbers => "enumerate",
            Kind::Definitions => "description",
        }
    }
}

struct RawList {
    kind: Kind,
    /// `start` attribute of an `ol`, when greater than one.
    start: Option<u32>,
    entries: Vec<Entry>,
}

enum Entry {
    Item(Vec<Piece>),
    Term(String),
    Definition(Vec<Piece>),
    /// A list element directly inside a list, with no `li` around it.
    Orphan(RawList),
    /// Any other direct content.
    Stray(String),
}

/// The content of one item, split so nested lists keep their depth.
enum Piece {
    Markup(String),
    Sublist(RawList),
}

/// Converts a run of adjacent list elements, consuming them in one
/// locked effect.
#[derive(Debug, Default)]
pub struct ListConverter;

impl SubConverter for ListConverter {
    fn name(&self) -> &'static str {
        "list"
    }

    fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
        let start = invocation.match_range().start;
        let Some(tag) = invocation.group(1).map(str::to_ascii_lowercase) else {
            return Ok(());
        };
        let Some((_, first_end)) = balanced_span(invocation.buffer(), start, &tag) else {
            debug!("unbalanced <{tag}>, leaving it to the leftover rules");
            return Ok(());
        };
        let end = extend_over_siblings(invocation.buffer(), first_end, &LIST_TAGS);
        let fragment = invocation.buffer()[start..end].to_string();

        let lists = with_fragment(&fragment, |root, source| {
            Ok(root
                .children()
                .filter(|n| n.is_element())
                .filter_map(|n| parse_list(n, source))
                .collect::<Vec<_>>())
        })?;

        let mut out = String::new();
        for list in &lists {
            render_list(list, 1, invocation, &mut out)?;
        }
        invocation.replace_span_and_lock(start..end, out.trim_end().to_string());
        Ok(())
    }
}

fn parse_list(node: Node<'_, '_>, source: &str) -> Option<RawList> {
    let kind = Kind::from_tag(node.tag_name().name())?;
    let start = attr_ci(node, "start")
        .and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|s| *s >= 1);
    let mut entries = Vec::new();
    for child in node.children() {
        if child.is_element() {
            if tag_eq(child, "li") {
                entries.push(Entry::Item(split_pieces(child, source)));
            } else if tag_eq(child, "dt") {
                entries.push(Entry::Term(inner_markup(child, source).to_string()));
            } else if tag_eq(child, "dd") {
                entries.push(Entry::Definition(split_pieces(child, source)));
            } else if let Some(sub) = parse_list(child, source) {
                entries.push(Entry::Orphan(sub));
            } else {
                entries.push(Entry::Stray(source[child.range()].to_string()));
            }
        } else if let Some(text) = child.text() {
            if !text.trim().is_empty() {
                entries.push(Entry::Stray(text.to_string()));
            }
        }
    }
    Some(RawList {
        kind,
        start,
        entries,
    })
}

/// Splits an item's children into markup runs and nested lists, keeping
/// document order.
fn split_pieces(item: Node<'_, '_>, source: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut run: Option<(usize, usize)> = None;
    for child in item.children() {
        if child.is_element() && LIST_TAGS.iter().any(|tag| tag_eq(child, tag)) {
            if let Some((from, to)) = run.take() {
                push_markup(&source[from..to], &mut pieces);
            }
            if let Some(sub) = parse_list(child, source) {
                pieces.push(Piece::Sublist(sub));
            }
        } else {
            let range = child.range();
            run = Some(match run {
                Some((from, _)) => (from, range.end),
                None => (range.start, range.end),
            });
        }
    }
    if let Some((from, to)) = run {
        push_markup(&source[from..to], &mut pieces);
    }
    pieces
}

fn push_markup(markup: &str, pieces: &mut Vec<Piece>) {
    if !markup.trim().is_empty() {
        pieces.push(Piece::Markup(markup.to_string()));
    }
}

fn render_list(
    list: &RawList,
    depth: usize,
    invocation: &mut Invocation<'_, '_>,
    out: &mut String,
) -> Result<(), RewriteError> {
    if list.entries.is_empty() {
        debug!("dropping empty list");
        return Ok(());
    }
    let framed = depth <= MAX_DEPTH;
    if framed {
        out.push_str("\\begin{");
        out.push_str(list.kind.environment());
        out.push_str("}\n");
        if list.kind == Kind::Numbers {
            if let Some(start) = list.start.filter(|s| *s > 1) {
                let counter = ENUM_COUNTERS[depth - 1];
                out.push_str(&format!("\\setcounter{{{counter}}}{{{}}}\n", start - 1));
            }
        }
    } else {
        warn!("list nested deeper than {MAX_DEPTH} levels, flattening");
    }
    match list.kind {
        Kind::Definitions => render_definition_entries(list, depth, framed, invocation, out)?,
        _ => render_item_entries(list, depth, framed, invocation, out)?,
    }
    if framed {
        out.push_str("\\end{");
        out.push_str(list.kind.environment());
        out.push_str("}\n");
    }
    Ok(())
}

fn render_item_entries(
    list: &RawList,
    depth: usize,
    framed: bool,
    invocation: &mut Invocation<'_, '_>,
    out: &mut String,
) -> Result<(), RewriteError> {
    let mut item_open = false;
    for entry in &list.entries {
        match entry {
            Entry::Item(pieces) | Entry::Definition(pieces) => {
                if framed {
                    out.push_str("\\item ");
                }
                render_pieces(pieces, depth, invocation, out)?;
                end_line(out);
                item_open = true;
            }
            Entry::Term(markup) => {
                // A dt outside dl renders as a plain item.
                if framed {
                    out.push_str("\\item ");
                }
                out.push_str(invocation.convert_fragment(markup)?.trim());
                end_line(out);
                item_open = true;
            }
            Entry::Orphan(sub) => {
                if framed && !item_open {
                    // An environment cannot open with a nested list.
                    out.push_str("\\item\n");
                    item_open = true;
                }
                render_list(sub, depth + 1, invocation, out)?;
            }
            Entry::Stray(markup) => {
                let text = invocation.convert_fragment(markup)?;
                let text = text.trim();
                if !text.is_empty() {
                    if framed && !item_open {
                        out.push_str("\\item ");
                        item_open = true;
                    }
                    out.push_str(text);
                    end_line(out);
                }
            }
        }
    }
    Ok(())
}

fn render_definition_entries(
    list: &RawList,
    depth: usize,
    framed: bool,
    invocation: &mut Invocation<'_, '_>,
    out: &mut String,
) -> Result<(), RewriteError> {
    let mut pending_term: Option<String> = None;
    let mut item_open = false;
    for entry in &list.entries {
        match entry {
            Entry::Term(markup) => {
                let term = invocation.convert_fragment(markup)?.trim().to_string();
                if let Some(dropped) = pending_term.replace(term) {
                    debug!("dropping term '{dropped}' without a definition");
                }
            }
            Entry::Definition(pieces) => match pending_term.take() {
                Some(term) => {
                    if framed {
                        out.push_str(&format!("\\item[{term}] "));
                    }
                    render_pieces(pieces, depth, invocation, out)?;
                    end_line(out);
                    item_open = true;
                }
                None => debug!("dropping definition without a preceding term"),
            },
            Entry::Item(pieces) => {
                // An li inside dl renders as an unlabeled item.
                if framed {
                    out.push_str("\\item ");
                }
                render_pieces(pieces, depth, invocation, out)?;
                end_line(out);
                item_open = true;
            }
            Entry::Orphan(sub) => {
                if framed && !item_open {
                    out.push_str("\\item\n");
                    item_open = true;
                }
                render_list(sub, depth + 1, invocation, out)?;
            }
            Entry::Stray(markup) => {
                let text = invocation.convert_fragment(markup)?;
                let text = text.trim();
                if !text.is_empty() {
                    if framed && !item_open {
                        out.push_str("\\item ");
                        item_open = true;
                    }
                    out.push_str(text);
                    end_line(out);
                }
            }
        }
    }
    if let Some(term) = pending_term {
        debug!("dropping trailing term '{term}' without a definition");
    }
    Ok(())
}

fn render_pieces(
    pieces: &[Piece],
    depth: usize,
    invocation: &mut Invocation<'_, '_>,
    out: &mut String,
) -> Result<(), RewriteError> {
    for piece in pieces {
        match piece {
            Piece::Markup(markup) => {
                let text = invocation.convert_fragment(markup)?;
                out.push_str(text.trim());
            }
            Piece::Sublist(sub) => {
                end_line(out);
                render_list(sub, depth + 1, invocation, out)?;
            }
        }
    }
    Ok(())
}

fn end_line(out: &mut String) {
    if !out.ends_with('\n') {
        out.push('\n');
    }
}
