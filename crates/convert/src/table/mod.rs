//! Table conversion: `<table>` grids into `tabular` environments.
//!
//! Conversion runs in three phases. The raw structure (rows, cells,
//! spans, column declarations, caption, border) is pulled out of the
//! parsed fragment first; every cell's markup is then converted through
//! the full rule pipeline; finally the cells are laid out onto a column
//! grid and rendered. Splitting it this way keeps the parse borrow-free
//! by the time cell conversion needs the invocation.

mod model;
mod render;

use crate::dom::{
    align_of, attr_ci, balanced_span, has_class, inner_markup, tag_eq, width_of, with_fragment,
};
use crate::error::ConvertError;
use log::{debug, warn};
use model::{Cell, ColumnDecl, MAX_SPAN, build_model};
use retex_engine::{Invocation, RewriteError, SubConverter};
use roxmltree::Node;

/// Converts `<table>` markup, registering the LaTeX packages the
/// emitted environment depends on. The whole element is consumed and
/// the output locked against later rules.
#[derive(Debug, Default)]
pub struct TableConverter;

impl SubConverter for TableConverter {
    fn name(&self) -> &'static str {
        "table"
    }

    fn convert(&self, invocation: &mut Invocation<'_, '_>) -> Result<(), RewriteError> {
        let start = invocation.match_range().start;
        let Some((_, outer_end)) = balanced_span(invocation.buffer(), start, "table") else {
            debug!("unbalanced <table>, leaving it to the leftover rules");
            return Ok(());
        };
        let fragment = invocation.buffer()[start..outer_end].to_string();
        let latex = convert_table(&fragment, invocation)?;
        invocation.replace_span_and_lock(start..outer_end, latex);
        Ok(())
    }
}

struct RawTable {
    border: bool,
    numbered: bool,
    columns: Vec<ColumnDecl>,
    rows: Vec<Vec<RawCell>>,
    caption: Option<RawCaption>,
}

struct RawCell {
    markup: String,
    row_span: u32,
    col_span: u32,
    width: Option<retex_style::Width>,
    align: Option<retex_style::HAlign>,
    header: bool,
}

struct RawCaption {
    markup: String,
    /// Whether the caption preceded every row in document order.
    top: bool,
}

fn convert_table(
    fragment: &str,
    invocation: &mut Invocation<'_, '_>,
) -> Result<String, RewriteError> {
    let raw = with_fragment(fragment, |root, source| {
        let table = root
            .children()
            .find(|n| tag_eq(*n, "table"))
            .ok_or_else(|| ConvertError::structure("dispatched fragment lacks a <table>"))?;
        Ok(parse_table(table, source))
    })?;

    if raw.rows.iter().all(Vec::is_empty) {
        debug!("table has no cells, dropping it");
        return Ok(String::new());
    }

    let mut row_cells = Vec::with_capacity(raw.rows.len());
    for raw_row in raw.rows {
        let mut cells = Vec::with_capacity(raw_row.len());
        for raw_cell in raw_row {
            let content = invocation.convert_fragment(&raw_cell.markup)?;
            cells.push(Cell {
                content: content.trim().to_string(),
                row_span: raw_cell.row_span,
                col_span: raw_cell.col_span,
                width: raw_cell.width,
                align: raw_cell.align,
                header: raw_cell.header,
                columns: Vec::new(),
            });
        }
        row_cells.push(cells);
    }

    let mut model = build_model(&raw.columns, row_cells);
    model.resolve_column_styles();

    invocation.use_package("array", &[], None)?;
    if model.cells().any(|cell| cell.row_span > 1) {
        invocation.use_package("multirow", &[], Some("array"))?;
    }

    let table = render::render(&model, raw.border).map_err(ConvertError::from)?;

    let Some(caption) = raw.caption else {
        return Ok(table);
    };
    let text = invocation.convert_fragment(&caption.markup)?.trim().to_string();
    if text.is_empty() {
        return Ok(table);
    }
    let line = if raw.numbered {
        invocation.use_package("caption", &[], None)?;
        format!("\\captionof{{table}}{{{text}}}")
    } else {
        text
    };
    Ok(if caption.top {
        format!("{line}\n{table}")
    } else {
        format!("{table}\n{line}")
    })
}

fn parse_table(table: Node<'_, '_>, source: &str) -> RawTable {
    let border = attr_ci(table, "border").is_some_and(|value| value.trim() != "0");
    let numbered = has_class(table, "numbered");
    let mut columns = Vec::new();
    let mut rows = Vec::new();
    let mut caption = None;
    let mut seen_rows = false;

    for child in table.children().filter(|n| n.is_element()) {
        if tag_eq(child, "caption") {
            if caption.is_none() {
                caption = Some(RawCaption {
                    markup: inner_markup(child, source).to_string(),
                    top: !seen_rows,
                });
            }
        } else if tag_eq(child, "colgroup") {
            parse_colgroup(child, &mut columns);
        } else if tag_eq(child, "col") {
            push_column_decls(child, &mut columns);
        } else if tag_eq(child, "tr") {
            seen_rows = true;
            rows.push(parse_row(child, source));
        } else if tag_eq(child, "thead") || tag_eq(child, "tbody") || tag_eq(child, "tfoot") {
            for tr in child.children().filter(|n| tag_eq(*n, "tr")) {
                seen_rows = true;
                rows.push(parse_row(tr, source));
            }
        } else {
            debug!(
                "ignoring <{}> directly inside <table>",
                child.tag_name().name()
            );
        }
    }
    RawTable {
        border,
        numbered,
        columns,
        rows,
        caption,
    }
}

/// A `colgroup` either carries `col` children or stands for its own run
/// of columns via its `span`.
fn parse_colgroup(colgroup: Node<'_, '_>, columns: &mut Vec<ColumnDecl>) {
    let cols: Vec<_> = colgroup
        .children()
        .filter(|n| tag_eq(*n, "col"))
        .collect();
    if cols.is_empty() {
        push_column_decls(colgroup, columns);
    } else {
        for col in cols {
            push_column_decls(col, columns);
        }
    }
}

fn push_column_decls(node: Node<'_, '_>, columns: &mut Vec<ColumnDecl>) {
    let decl = ColumnDecl {
        width: width_of(node),
        align: align_of(node),
    };
    for _ in 0..span_attr(node, "span") {
        columns.push(decl.clone());
    }
}

fn parse_row(tr: Node<'_, '_>, source: &str) -> Vec<RawCell> {
    tr.children()
        .filter(|n| n.is_element())
        .filter_map(|cell| {
            let header = tag_eq(cell, "th");
            if !header && !tag_eq(cell, "td") {
                debug!("ignoring <{}> inside <tr>", cell.tag_name().name());
                return None;
            }
            Some(RawCell {
                markup: inner_markup(cell, source).to_string(),
                row_span: span_attr(cell, "rowspan"),
                col_span: span_attr(cell, "colspan"),
                width: width_of(cell),
                align: align_of(cell),
                header,
            })
        })
        .collect()
}

fn span_attr(node: Node<'_, '_>, name: &str) -> u32 {
    let Some(value) = attr_ci(node, name) else {
        return 1;
    };
    match value.trim().parse::<u32>() {
        Ok(span) if span >= 1 => {
            if span > MAX_SPAN {
                warn!("clamping {name}={span} to {MAX_SPAN}");
                MAX_SPAN
            } else {
                span
            }
        }
        _ => {
            debug!("ignoring invalid {name} '{value}'");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use retex_engine::{Placeholder, Rewriter, Rule, RuleSet};
    use retex_traits::{ArtifactStore, PackageRegistry, Services, StaticContext};
    use std::sync::Arc;

    fn convert(input: &str) -> (String, Vec<String>) {
        let mut rules = RuleSet::new();
        rules.insert(
            Placeholder::Top,
            Rule::dispatch(r"(?i)<table\b[^>]*>", Arc::new(TableConverter))
                .expect("pattern compiles"),
        );
        let context = StaticContext::new();
        let mut packages = PackageRegistry::new();
        let mut files = ArtifactStore::new();
        let mut services = Services {
            context: &context,
            packages: &mut packages,
            files: &mut files,
        };
        let latex = Rewriter::new(&rules)
            .run(input, &mut services)
            .expect("conversion succeeds");
        let names = packages.resolve().into_iter().map(|p| p.name).collect();
        (latex, names)
    }

    #[test]
    fn test_simple_grid() {
        let (latex, packages) =
            convert("<table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table>");
        assert_eq!(
            latex,
            "\\begin{tabular}{ll}\na & b \\\\\nc & d \\\\\n\\end{tabular}"
        );
        assert_eq!(packages, vec!["array".to_string()]);
    }

    #[test]
    fn test_rowspan_registers_multirow_after_array() {
        let (latex, packages) = convert(
            "<table><tr><td rowspan=\"2\">tall</td><td>b</td></tr><tr><td>c</td></tr></table>",
        );
        assert!(latex.contains("\\multirow{2}{*}{tall}"));
        assert!(latex.contains("\n & c \\\\"));
        assert_eq!(packages, vec!["array".to_string(), "multirow".to_string()]);
    }

    #[test]
    fn test_border_rules_and_bold_headers() {
        let (latex, _) = convert("<table border=\"1\"><tr><th>h</th><td>x</td></tr></table>");
        assert_eq!(
            latex,
            "\\begin{tabular}{|l|l|}\n\\hline\n\\textbf{h} & x \\\\\n\\hline\n\\end{tabular}"
        );
    }

    #[test]
    fn test_border_zero_means_no_rules() {
        let (latex, _) = convert("<table border=\"0\"><tr><td>x</td></tr></table>");
        assert!(!latex.contains("\\hline"));
        assert!(latex.contains("{l}"));
    }

    #[test]
    fn test_numbered_caption_on_top() {
        let (latex, packages) = convert(
            "<table class=\"numbered\"><caption>Results</caption><tr><td>a</td></tr></table>",
        );
        assert!(latex.starts_with("\\captionof{table}{Results}\n\\begin{tabular}"));
        assert!(packages.contains(&"caption".to_string()));
    }

    #[test]
    fn test_plain_caption_after_rows_goes_below() {
        let (latex, packages) =
            convert("<table><tr><td>a</td></tr><caption>After</caption></table>");
        assert!(latex.ends_with("\\end{tabular}\nAfter"));
        assert!(!packages.contains(&"caption".to_string()));
    }

    #[test]
    fn test_colspan_over_declared_widths_harmonizes_units() {
        let (latex, _) = convert(
            "<table><colgroup><col width=\"2cm\"/><col width=\"15mm\"/></colgroup>\
             <tr><td colspan=\"2\">wide</td></tr>\
             <tr><td>a</td><td>b</td></tr></table>",
        );
        assert!(latex.contains("\\multicolumn{2}{p{35mm}}{wide}"));
        assert!(latex.contains("\\begin{tabular}{p{2cm}p{15mm}}"));
    }

    #[test]
    fn test_malformed_table_is_repaired() {
        let (latex, _) = convert("<table><tr><td>a<td>b</table>");
        assert!(latex.contains("a & b \\\\"));
    }

    #[test]
    fn test_table_without_cells_vanishes() {
        let (latex, _) = convert("before <table><tr></tr></table> after");
        assert_eq!(latex, "before  after");
    }

    #[test]
    fn test_nested_table_converts_inside_cell() {
        let (latex, _) = convert(
            "<table><tr><td><table><tr><td>in</td></tr></table></td></tr></table>",
        );
        assert_eq!(latex.matches("\\begin{tabular}").count(), 2);
        assert!(latex.contains("in \\\\"));
    }

    #[test]
    fn test_cell_alignment_becomes_column_alignment() {
        let (latex, _) = convert(
            "<table><tr><td align=\"center\">a</td><td align=\"right\">b</td></tr></table>",
        );
        assert!(latex.contains("\\begin{tabular}{cr}"));
    }
}
