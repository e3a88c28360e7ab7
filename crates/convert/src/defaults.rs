//! The built-in rule table.
//!
//! Rule order is the contract here. The top segment removes markup that
//! must never reach the generic rules (comments, structured blocks, and
//! entity references), the default segment carries the inline and block
//! tag rewrites around the character-escape pass, and the bottom
//! segment cleans up what is left: stray tags, deferred angle-bracket
//! references, typography, and whitespace.

use crate::inline::{
    BareUrlConverter, EntityConverter, EscapeConverter, FootnoteConverter, HyperlinkConverter,
    NewlineFixupConverter, PreConverter, StrikeoutConverter,
};
use crate::list::ListConverter;
use crate::table::TableConverter;
use retex_engine::{Placeholder, RewriteError, Rule, RuleSet};
use std::sync::Arc;

/// Tags whose empty pairs collapse to nothing. Spelled out per tag
/// because the pattern must repeat the tag name in the closing half.
const EMPTY_PAIR_TAGS: [&str; 34] = [
    "b",
    "strong",
    "i",
    "em",
    "u",
    "tt",
    "code",
    "sub",
    "sup",
    "q",
    "cite",
    "span",
    "font",
    "small",
    "big",
    "a",
    "p",
    "div",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "blockquote",
    "center",
    "li",
    "dt",
    "dd",
    "ul",
    "ol",
    "dl",
    "table",
    "pre",
];

/// Builds the default HTML-to-LaTeX rule table.
pub fn default_rules() -> Result<RuleSet, RewriteError> {
    let mut rules = RuleSet::new();

    // Top: structure-aware work, before any generic rewriting.
    rules.insert(Placeholder::Top, Rule::regex(r"(?s)<!--.*?-->", "")?);
    rules.insert(Placeholder::Top, Rule::regex(r"(?i)<!DOCTYPE[^>]*>", "")?);
    rules.insert(Placeholder::Top, Rule::regex(r"(?s)<\?.*?\?>", "")?);
    rules.insert(
        Placeholder::Top,
        Rule::dispatch(r"(?i)<pre\b[^>]*>", Arc::new(PreConverter))?,
    );
    rules.insert(
        Placeholder::Top,
        Rule::dispatch(r"(?i)<table\b[^>]*>", Arc::new(TableConverter))?,
    );
    rules.insert(
        Placeholder::Top,
        Rule::dispatch(r"(?i)<(ul|ol|dl)\b[^>]*>", Arc::new(ListConverter))?,
    );
    rules.insert(
        Placeholder::Top,
        Rule::dispatch(
            r#"(?i)<span\b[^>]*\bclass\s*=\s*("[^"]*footnote[^"]*"|'[^']*footnote[^']*')[^>]*>"#,
            Arc::new(FootnoteConverter),
        )?,
    );
    rules.insert(
        Placeholder::Top,
        Rule::dispatch(r"(?i)<a\b[^>]*>", Arc::new(HyperlinkConverter))?,
    );
    rules.insert(
        Placeholder::Top,
        Rule::dispatch(r"(?i)<(s|del|strike)\b[^>]*>", Arc::new(StrikeoutConverter))?,
    );
    rules.insert(
        Placeholder::Top,
        Rule::dispatch(
            r#"(?i)\b(?:https?|ftp)://[^\s<>"{}|\\^\[\]`]+"#,
            Arc::new(BareUrlConverter),
        )?,
    );
    rules.insert(
        Placeholder::Top,
        Rule::dispatch(r"&#(?:[0-9]+|[xX][0-9a-fA-F]+);", Arc::new(EntityConverter))?,
    );
    rules.insert(Placeholder::Top, Rule::regex_repeat(&empty_pair_pattern(), "")?);

    // Default: escaping first, then the tag rewrites around it.
    rules.insert(
        Placeholder::Default,
        Rule::dispatch(r"[\\{}$&%#_~^]", Arc::new(EscapeConverter))?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)<(?:b|strong)\b[^>]*>", "\\textbf{")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)</(?:b|strong)\s*>", "}")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)<(?:i|em|cite)\b[^>]*>", "\\textit{")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)</(?:i|em|cite)\s*>", "}")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)<u\b[^>]*>", "\\underline{")?,
    );
    rules.insert(Placeholder::Default, Rule::regex(r"(?i)</u\s*>", "}")?);
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)<(?:tt|code)\b[^>]*>", "\\texttt{")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)</(?:tt|code)\s*>", "}")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)<sub\b[^>]*>", "\\textsubscript{")?,
    );
    rules.insert(Placeholder::Default, Rule::regex(r"(?i)</sub\s*>", "}")?);
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)<sup\b[^>]*>", "\\textsuperscript{")?,
    );
    rules.insert(Placeholder::Default, Rule::regex(r"(?i)</sup\s*>", "}")?);
    rules.insert(Placeholder::Default, Rule::regex(r"(?i)<q\b[^>]*>", "``")?);
    rules.insert(Placeholder::Default, Rule::regex(r"(?i)</q\s*>", "''")?);
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?is)<h1\b[^>]*>(.*?)</h1\s*>", "\\section{${1}}\n")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?is)<h2\b[^>]*>(.*?)</h2\s*>", "\\subsection{${1}}\n")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?is)<h3\b[^>]*>(.*?)</h3\s*>", "\\subsubsection{${1}}\n")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?is)<h4\b[^>]*>(.*?)</h4\s*>", "\\paragraph{${1}}\n")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?is)<h[56]\b[^>]*>(.*?)</h[56]\s*>", "\\subparagraph{${1}}\n")?,
    );
    rules.insert(Placeholder::Default, Rule::regex(r"(?i)<p\b[^>]*>", "")?);
    rules.insert(Placeholder::Default, Rule::regex(r"(?i)</p\s*>", "\n\n")?);
    rules.insert(Placeholder::Default, Rule::regex(r"(?i)<div\b[^>]*>", "")?);
    rules.insert(Placeholder::Default, Rule::regex(r"(?i)</div\s*>", "\n")?);
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)<br\b[^>]*/?>", "\\\\\n")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(
            r"(?i)<hr\b[^>]*/?>",
            "\n\\noindent\\rule{\\linewidth}{0.4pt}\n",
        )?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)<blockquote\b[^>]*>", "\\begin{quote}\n")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)</blockquote\s*>", "\n\\end{quote}\n")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)<center\b[^>]*>", "\\begin{center}\n")?,
    );
    rules.insert(
        Placeholder::Default,
        Rule::regex(r"(?i)</center\s*>", "\n\\end{center}\n")?,
    );

    // Bottom: whatever survives is either noise or deferred work.
    rules.insert(Placeholder::Bottom, Rule::regex(r"(?s)</?[A-Za-z][^>]*>", "")?);
    rules.insert(Placeholder::Bottom, Rule::literal("&#60;", "\\textless{}"));
    rules.insert(Placeholder::Bottom, Rule::literal("&#62;", "\\textgreater{}"));
    rules.insert(Placeholder::Bottom, Rule::literal("<", "\\textless{}"));
    rules.insert(Placeholder::Bottom, Rule::literal(">", "\\textgreater{}"));
    rules.insert(
        Placeholder::Bottom,
        Rule::regex(r"&#([0-9]+|[xX][0-9a-fA-F]+);", "\\&\\#${1};")?,
    );
    rules.insert(Placeholder::Bottom, Rule::literal("\u{00a0}", "~"));
    rules.insert(Placeholder::Bottom, Rule::literal("\u{2013}", "--"));
    rules.insert(Placeholder::Bottom, Rule::literal("\u{2014}", "---"));
    rules.insert(Placeholder::Bottom, Rule::literal("\u{2018}", "`"));
    rules.insert(Placeholder::Bottom, Rule::literal("\u{2019}", "'"));
    rules.insert(Placeholder::Bottom, Rule::literal("\u{201c}", "``"));
    rules.insert(Placeholder::Bottom, Rule::literal("\u{201d}", "''"));
    rules.insert(Placeholder::Bottom, Rule::literal("\u{2026}", "\\ldots{}"));
    rules.insert(Placeholder::Bottom, Rule::literal("\u{00ad}", "\\-"));
    rules.insert(Placeholder::Bottom, Rule::literal("\u{200b}", ""));
    rules.insert(Placeholder::Bottom, Rule::regex(r"[ \t]+\n", "\n")?);
    rules.insert(Placeholder::Bottom, Rule::regex(r"\n{3,}", "\n\n")?);
    rules.insert(Placeholder::Bottom, Rule::regex(r"[ \t]{2,}", " ")?);
    rules.insert(
        Placeholder::Bottom,
        Rule::dispatch(
            r"\\\\[ \t]*\n[ \t]*\n|\\\\\s*\z",
            Arc::new(NewlineFixupConverter),
        )?,
    );
    rules.insert(Placeholder::Bottom, Rule::regex(r"\A\s+", "")?);
    rules.insert(Placeholder::Bottom, Rule::regex(r"\s+\z", "")?);

    Ok(rules)
}

fn empty_pair_pattern() -> String {
    let pairs: Vec<String> = EMPTY_PAIR_TAGS
        .iter()
        .map(|tag| format!(r"<{tag}\b[^>]*>\s*</{tag}\s*>"))
        .collect();
    format!("(?is){}", pairs.join("|"))
}
