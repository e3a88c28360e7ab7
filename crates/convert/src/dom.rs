//! Lenient fragment handling on top of a strict XML parser.
//!
//! Sub-converters cut raw markup straight out of the working buffer, and
//! real-world input is rarely well-formed. Parsing is therefore staged:
//! [`with_fragment`] tries the fragment as-is first, and on failure runs
//! it through [`normalize_fragment`], which repairs the common offences
//! (unclosed tags, bare attributes, stray ampersands, mismatched case)
//! before the one retry. Span arithmetic against the original buffer is
//! never affected by repairs; repaired text is only ever parsed, not
//! written back.

use crate::error::ConvertError;
use log::debug;
use retex_style::parsers::{css_property, parse_halign, parse_width, run_parser};
use retex_style::{HAlign, Width};
use roxmltree::Node;

/// Tags that never take content. They are emitted self-closed and never
/// appear on the repair stack.
const VOID_TAGS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

fn is_void(name: &str) -> bool {
    VOID_TAGS.contains(&name)
}

/// Finds the extent of the element whose opening tag starts at
/// `open_start`. Returns `(inner_end, outer_end)`: the offset of the
/// matching close tag and the offset just past it. For a self-closed
/// opening tag both offsets point past the tag.
///
/// The scan is case-insensitive and depth-aware but deliberately cheap:
/// it only tracks occurrences of `tag` itself, so foreign nesting inside
/// the element cannot throw it off. Returns `None` when the buffer ends
/// before the element closes.
pub fn balanced_span(buffer: &str, open_start: usize, tag: &str) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut at = open_start;
    while at < buffer.len() {
        let lt = at + buffer[at..].find('<')?;
        let tail = &buffer[lt..];
        if starts_close_tag(tail, tag) {
            let gt = lt + scan_tag_end(tail)?;
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some((lt, gt + 1));
            }
            at = gt + 1;
        } else if starts_open_tag(tail, tag) {
            let gt = lt + scan_tag_end(tail)?;
            if buffer[..gt].ends_with('/') {
                // Self-closed: no content, no depth change.
                if depth == 0 {
                    return Some((gt + 1, gt + 1));
                }
            } else {
                depth += 1;
            }
            at = gt + 1;
        } else {
            at = lt + 1;
        }
    }
    None
}

/// Extends `end` over any directly adjacent sibling elements named in
/// `tags`, separated only by whitespace. Used to consume a run of lists
/// in one dispatch effect.
pub fn extend_over_siblings(buffer: &str, mut end: usize, tags: &[&str]) -> usize {
    loop {
        let rest = &buffer[end..];
        let skipped = rest.len() - rest.trim_start().len();
        let at = end + skipped;
        let Some(tag) = tags.iter().find(|t| starts_open_tag(&buffer[at..], t)) else {
            return end;
        };
        match balanced_span(buffer, at, tag) {
            Some((_, outer_end)) => end = outer_end,
            None => return end,
        }
    }
}

fn starts_open_tag(tail: &str, tag: &str) -> bool {
    starts_tag(tail, tag, false)
}

fn starts_close_tag(tail: &str, tag: &str) -> bool {
    starts_tag(tail, tag, true)
}

fn starts_tag(tail: &str, tag: &str, closing: bool) -> bool {
    let Some(body) = (if closing {
        tail.strip_prefix("</")
    } else {
        tail.strip_prefix('<')
    }) else {
        return false;
    };
    let bytes = body.as_bytes();
    if bytes.len() < tag.len() || !bytes[..tag.len()].eq_ignore_ascii_case(tag.as_bytes()) {
        return false;
    }
    matches!(
        bytes.get(tag.len()),
        None | Some(b' ' | b'\t' | b'\n' | b'\r' | b'>' | b'/')
    )
}

/// Index of the `>` closing the tag that starts at the beginning of
/// `tag`, skipping over quoted attribute values.
fn scan_tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (index, byte) in tag.bytes().enumerate() {
        match quote {
            Some(q) if byte == q => quote = None,
            Some(_) => {}
            None => match byte {
                b'"' | b'\'' => quote = Some(byte),
                b'>' => return Some(index),
                _ => {}
            },
        }
    }
    None
}

/// Parses a markup fragment and hands the wrapper element plus the text
/// it was parsed from to `handle`. Tries the fragment verbatim first and
/// falls back to [`normalize_fragment`]; a parse failure after repair is
/// an error.
pub fn with_fragment<T>(
    fragment: &str,
    handle: impl FnOnce(Node<'_, '_>, &str) -> Result<T, ConvertError>,
) -> Result<T, ConvertError> {
    let wrapped = format!("<frag>{fragment}</frag>");
    match roxmltree::Document::parse(&wrapped) {
        Ok(doc) => handle(doc.root_element(), &wrapped),
        Err(error) => {
            debug!("strict fragment parse failed ({error}), retrying after repair");
            let repaired = format!("<frag>{}</frag>", normalize_fragment(fragment));
            let doc = roxmltree::Document::parse(&repaired)?;
            handle(doc.root_element(), &repaired)
        }
    }
}

/// The markup between a node's opening and closing tags, as a slice of
/// the source string the node was parsed from.
pub fn inner_markup<'a>(node: Node<'_, '_>, source: &'a str) -> &'a str {
    match (node.first_child(), node.last_child()) {
        (Some(first), Some(last)) => &source[first.range().start..last.range().end],
        _ => "",
    }
}

pub fn tag_eq(node: Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name().eq_ignore_ascii_case(name)
}

/// Case-insensitive attribute lookup.
pub fn attr_ci<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attributes()
        .find(|a| a.name().eq_ignore_ascii_case(name))
        .map(|a| a.value())
}

/// Whether the node's `class` attribute contains `name` as one of its
/// whitespace-separated entries.
pub fn has_class(node: Node<'_, '_>, name: &str) -> bool {
    attr_ci(node, "class").is_some_and(|classes| {
        classes
            .split_ascii_whitespace()
            .any(|class| class.eq_ignore_ascii_case(name))
    })
}

/// Width of a node, from its `style` CSS (which wins) or its `width`
/// attribute. Unparsable values are logged and ignored.
pub fn width_of(node: Node<'_, '_>) -> Option<Width> {
    attr_ci(node, "style")
        .and_then(|style| css_property(style, "width"))
        .and_then(lenient_width)
        .or_else(|| attr_ci(node, "width").and_then(lenient_width))
}

fn lenient_width(value: &str) -> Option<Width> {
    match run_parser(parse_width, value) {
        Ok(width) => Some(width),
        Err(error) => {
            debug!("ignoring unparsable width '{value}': {error}");
            None
        }
    }
}

/// Horizontal alignment of a node, from its `style` CSS (which wins) or
/// its `align` attribute.
pub fn align_of(node: Node<'_, '_>) -> Option<HAlign> {
    attr_ci(node, "style")
        .and_then(|style| css_property(style, "text-align"))
        .and_then(lenient_halign)
        .or_else(|| attr_ci(node, "align").and_then(lenient_halign))
}

fn lenient_halign(value: &str) -> Option<HAlign> {
    match parse_halign(value) {
        Ok(align) => Some(align),
        Err(error) => {
            debug!("ignoring unparsable alignment '{value}': {error}");
            None
        }
    }
}

/// Removes every tag from `markup`, keeping text content verbatim.
pub fn strip_tags(markup: &str) -> String {
    let mut out = String::with_capacity(markup.len());
    let mut rest = markup;
    loop {
        match rest.find('<') {
            None => {
                out.push_str(rest);
                return out;
            }
            Some(lt) => {
                out.push_str(&rest[..lt]);
                match scan_tag_end(&rest[lt..]) {
                    Some(gt) => rest = &rest[lt + gt + 1..],
                    None => {
                        // Dangling `<` with no tag end: keep as text.
                        out.push_str(&rest[lt..]);
                        return out;
                    }
                }
            }
        }
    }
}

/// Rewrites a markup fragment into well-formed XML.
///
/// Tag and attribute names are lowercased, void elements self-closed,
/// bare and unquoted attributes quoted, stray ampersands and orphan `<`
/// escaped to numeric references, unmatched close tags dropped, and
/// every still-open element closed at the end. Sibling-implied closes
/// (`li` after `li`, `td` after `td`, and so on) are inserted where HTML
/// would imply them. Comments, doctypes, and processing instructions
/// are removed; namespace-prefixed tags and attributes, which a strict
/// parser cannot resolve, are dropped outright.
pub fn normalize_fragment(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len() + 16);
    let mut stack: Vec<String> = Vec::new();
    let mut rest = fragment;

    while let Some(lt) = rest.find('<') {
        push_text(&rest[..lt], &mut out);
        let tail = &rest[lt..];

        if let Some(comment) = tail.strip_prefix("<!--") {
            // An unterminated comment swallows the remainder.
            rest = comment.find("-->").map_or("", |i| &comment[i + 3..]);
            continue;
        }
        if tail.starts_with("<![CDATA[") {
            match tail.find("]]>") {
                Some(i) => {
                    out.push_str(&tail[..i + 3]);
                    rest = &tail[i + 3..];
                }
                None => rest = "",
            }
            continue;
        }
        if tail.starts_with("<!") || tail.starts_with("<?") {
            rest = tail.find('>').map_or("", |i| &tail[i + 1..]);
            continue;
        }

        let closing = tail.starts_with("</");
        let name_from = if closing { 2 } else { 1 };
        let name_len = tail[name_from..]
            .bytes()
            .take_while(u8::is_ascii_alphanumeric)
            .count();
        let named = name_len > 0 && tail.as_bytes()[name_from].is_ascii_alphabetic();
        if !closing && !named {
            // `<` followed by anything but a tag name is text.
            out.push_str("&#60;");
            rest = &tail[1..];
            continue;
        }
        let Some(gt) = scan_tag_end(tail) else {
            out.push_str("&#60;");
            rest = &tail[1..];
            continue;
        };
        if !named || tail[name_from + name_len..].starts_with(':') {
            // Junk close tag or an undeclared namespace prefix.
            rest = &tail[gt + 1..];
            continue;
        }
        let name = tail[name_from..name_from + name_len].to_ascii_lowercase();

        if closing {
            if stack.iter().any(|open| *open == name) {
                while let Some(open) = stack.pop() {
                    emit_close(&open, &mut out);
                    if open == name {
                        break;
                    }
                }
            }
            // An unmatched close tag is dropped.
            rest = &tail[gt + 1..];
            continue;
        }

        let self_closing = tail[..gt].ends_with('/');
        let attrs_end = if self_closing { gt - 1 } else { gt };
        let raw_attrs = &tail[name_from + name_len..attrs_end];

        if is_void(&name) {
            out.push('<');
            out.push_str(&name);
            rebuild_attrs(raw_attrs, &mut out);
            out.push_str("/>");
        } else {
            while let Some(top) = stack.last() {
                if auto_closes(&name, top) {
                    emit_close(top, &mut out);
                    stack.pop();
                } else {
                    break;
                }
            }
            out.push('<');
            out.push_str(&name);
            rebuild_attrs(raw_attrs, &mut out);
            if self_closing {
                out.push_str("/>");
            } else {
                out.push('>');
                stack.push(name);
            }
        }
        rest = &tail[gt + 1..];
    }

    push_text(rest, &mut out);
    while let Some(open) = stack.pop() {
        emit_close(&open, &mut out);
    }
    out
}

fn emit_close(name: &str, out: &mut String) {
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Sibling rules HTML applies implicitly: opening `open` while `top` is
/// the innermost element closes `top` first.
fn auto_closes(open: &str, top: &str) -> bool {
    matches!(
        (open, top),
        ("li", "li")
            | ("td" | "th", "td" | "th")
            | ("tr", "td" | "th" | "tr")
            | ("dt" | "dd", "dt" | "dd")
            | ("p", "p")
    )
}

/// Length of a reference a strict XML parser accepts without an entity
/// declaration: numeric, or one of the five predefined names.
fn xml_ref_len(tail: &str) -> Option<usize> {
    if let Some(len) = retex_entities::numeric_ref_len(tail) {
        return Some(len);
    }
    ["amp;", "lt;", "gt;", "apos;", "quot;"]
        .iter()
        .find(|name| tail[1..].starts_with(*name))
        .map(|name| 1 + name.len())
}

/// Copies text, escaping every `&` that does not begin a reference a
/// strict parser accepts.
fn push_text(text: &str, out: &mut String) {
    let mut rest = text;
    while let Some(position) = rest.find('&') {
        out.push_str(&rest[..position]);
        let tail = &rest[position..];
        match xml_ref_len(tail) {
            Some(len) => {
                out.push_str(&tail[..len]);
                rest = &tail[len..];
            }
            None => {
                out.push_str("&#38;");
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
}

fn push_attr_value(value: &str, out: &mut String) {
    let mut rest = value;
    while let Some(position) = rest.find(['&', '<', '"']) {
        out.push_str(&rest[..position]);
        let tail = &rest[position..];
        match tail.as_bytes()[0] {
            b'&' => match xml_ref_len(tail) {
                Some(len) => {
                    out.push_str(&tail[..len]);
                    rest = &tail[len..];
                }
                None => {
                    out.push_str("&#38;");
                    rest = &tail[1..];
                }
            },
            b'<' => {
                out.push_str("&#60;");
                rest = &tail[1..];
            }
            _ => {
                out.push_str("&#34;");
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
}

/// Re-emits an attribute region with every attribute lowercased, quoted,
/// and deduplicated (first occurrence wins). Bare attributes become
/// `name=""`.
fn rebuild_attrs(raw: &str, out: &mut String) {
    let mut seen: Vec<String> = Vec::new();
    let mut rest = raw.trim_start();
    while !rest.is_empty() {
        let name_len = rest
            .bytes()
            .take_while(|b| !b.is_ascii_whitespace() && *b != b'=')
            .count();
        if name_len == 0 {
            // Leading `=` junk.
            rest = rest[1..].trim_start();
            continue;
        }
        let name = rest[..name_len].to_ascii_lowercase();
        rest = &rest[name_len..];

        let mut value = "";
        let trimmed = rest.trim_start();
        if let Some(after_eq) = trimmed.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            if let Some(quoted) = after_eq.strip_prefix('"') {
                match quoted.find('"') {
                    Some(i) => {
                        value = &quoted[..i];
                        rest = &quoted[i + 1..];
                    }
                    None => {
                        value = quoted;
                        rest = "";
                    }
                }
            } else if let Some(quoted) = after_eq.strip_prefix('\'') {
                match quoted.find('\'') {
                    Some(i) => {
                        value = &quoted[..i];
                        rest = &quoted[i + 1..];
                    }
                    None => {
                        value = quoted;
                        rest = "";
                    }
                }
            } else {
                let len = after_eq
                    .bytes()
                    .take_while(|b| !b.is_ascii_whitespace())
                    .count();
                value = &after_eq[..len];
                rest = &after_eq[len..];
            }
        } else {
            rest = trimmed;
        }
        rest = rest.trim_start();

        let valid = name.bytes().next().is_some_and(|b| b.is_ascii_alphabetic())
            && name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if !valid || name.contains(':') || name == "xmlns" || seen.contains(&name) {
            continue;
        }
        out.push(' ');
        out.push_str(&name);
        out.push_str("=\"");
        push_attr_value(value, out);
        out.push('"');
        seen.push(name);
    }
}
