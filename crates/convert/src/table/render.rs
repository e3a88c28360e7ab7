//! LaTeX emission for the laid-out table model.

use super::model::{Cell, Row, TableModel};
use itertools::Itertools;
use retex_style::{HAlign, Width, WidthError};

/// Renders the model as a `tabular` environment. With `border`, every
/// column and row is ruled.
pub(crate) fn render(model: &TableModel, border: bool) -> Result<String, WidthError> {
    let layout = column_layout(model, border);
    let mut lines = vec![format!("\\begin{{tabular}}{{{layout}}}")];
    if border {
        lines.push("\\hline".to_string());
    }
    for row in &model.rows {
        let body = render_row(model, row, border)?;
        lines.push(format!("{body} \\\\"));
        if border {
            lines.push("\\hline".to_string());
        }
    }
    lines.push("\\end{tabular}".to_string());
    Ok(lines.join("\n"))
}

fn column_layout(model: &TableModel, border: bool) -> String {
    let spec = model
        .columns
        .iter()
        .map(|column| spec_for(column.width.as_ref(), column.align.as_ref()))
        .join(if border { "|" } else { "" });
    if border { format!("|{spec}|") } else { spec }
}

/// One column descriptor. A width always forces a `p` column; alignment
/// inside it goes through the `array` package's `>{...}` hook.
fn spec_for(width: Option<&Width>, align: Option<&HAlign>) -> String {
    match (width, align) {
        (Some(width), align) => {
            let base = format!("p{{{width}}}");
            match align {
                Some(HAlign::Center) => format!(">{{\\centering\\arraybackslash}}{base}"),
                Some(HAlign::Right) => format!(">{{\\raggedleft\\arraybackslash}}{base}"),
                _ => base,
            }
        }
        (None, Some(HAlign::Center)) => "c".to_string(),
        (None, Some(HAlign::Right)) => "r".to_string(),
        (None, _) => "l".to_string(),
    }
}

fn render_row(model: &TableModel, row: &Row, border: bool) -> Result<String, WidthError> {
    let mut parts = Vec::with_capacity(row.slots.len());
    for (index, slot) in row.slots.iter().enumerate() {
        let cell = model.cell(slot.cell);
        let part = if slot.leading {
            leading_cell(model, cell, border, index == 0)?
        } else {
            continuation_cell(model, cell, border, index == 0)?
        };
        parts.push(part);
    }
    Ok(parts.join(" & "))
}

fn leading_cell(
    model: &TableModel,
    cell: &Cell,
    border: bool,
    first: bool,
) -> Result<String, WidthError> {
    let mut text = cell.content.clone();
    if cell.header && !text.is_empty() {
        text = format!("\\textbf{{{text}}}");
    }
    if cell.row_span > 1 {
        let width = cell_width(model, cell)?;
        let arg = width.map_or_else(|| "*".to_string(), |w| w.to_string());
        text = format!("\\multirow{{{}}}{{{arg}}}{{{text}}}", cell.row_span);
    }
    if cell.col_span > 1 {
        let spec = spanned_spec(model, cell, border, first)?;
        text = format!("\\multicolumn{{{}}}{{{spec}}}{{{text}}}", cell.col_span);
    }
    Ok(text)
}

/// Continuation slots of a row span render empty; a spanning one still
/// needs its `\multicolumn` so the column count stays right.
fn continuation_cell(
    model: &TableModel,
    cell: &Cell,
    border: bool,
    first: bool,
) -> Result<String, WidthError> {
    if cell.col_span > 1 {
        let spec = spanned_spec(model, cell, border, first)?;
        Ok(format!("\\multicolumn{{{}}}{{{spec}}}{{}}", cell.col_span))
    } else {
        Ok(String::new())
    }
}

fn spanned_spec(
    model: &TableModel,
    cell: &Cell,
    border: bool,
    first: bool,
) -> Result<String, WidthError> {
    let width = cell_width(model, cell)?;
    let align = cell.align.clone().or_else(|| {
        cell.columns
            .first()
            .and_then(|index| model.columns.get(*index))
            .and_then(|column| column.align.clone())
    });
    let mut spec = spec_for(width.as_ref(), align.as_ref());
    if border {
        spec.push('|');
        if first {
            spec.insert(0, '|');
        }
    }
    Ok(spec)
}

/// A spanning cell's effective width: its own, or the sum of the
/// columns it covers.
fn cell_width(model: &TableModel, cell: &Cell) -> Result<Option<Width>, WidthError> {
    match &cell.width {
        Some(width) => Ok(Some(width.clone())),
        None => model.sum_column_widths(&cell.columns),
    }
}
