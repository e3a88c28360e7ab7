//! The intermediate table model.
//!
//! Parsed cells are laid out onto a column grid before rendering. Cells
//! live in one arena; rows and columns refer to them by [`CellId`], so a
//! spanning cell appears in every row and column it covers without being
//! duplicated.

use log::warn;
use retex_style::{HAlign, Width, WidthError};
use std::collections::BTreeMap;

/// Spans beyond this are treated as markup damage and clamped.
pub(crate) const MAX_SPAN: u32 = 1000;

/// Grid placement beyond this many slots per row is abandoned.
const SLOT_GUARD: usize = 1000;

/// Index of a cell in the model's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellId(usize);

#[derive(Debug, Clone)]
pub(crate) struct Cell {
    /// Converted LaTeX content.
    pub content: String,
    pub row_span: u32,
    pub col_span: u32,
    pub width: Option<Width>,
    pub align: Option<HAlign>,
    pub header: bool,
    /// Grid columns this cell covers, filled in during placement.
    pub columns: Vec<usize>,
}

/// A column width or alignment declared up front via `colgroup`/`col`.
#[derive(Debug, Clone, Default)]
pub(crate) struct ColumnDecl {
    pub width: Option<Width>,
    pub align: Option<HAlign>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Column {
    pub width: Option<Width>,
    pub align: Option<HAlign>,
    /// Every cell that covers this column.
    pub cells: Vec<CellId>,
}

/// One grid position in a row. `leading` marks the row in which the
/// cell's content is actually emitted; continuation slots of a row span
/// render as filler.
#[derive(Debug, Clone)]
pub(crate) struct Slot {
    pub cell: CellId,
    pub leading: bool,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Row {
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct TableModel {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
    cells: Vec<Cell>,
}

/// A row span still claiming grid space in upcoming rows, keyed by its
/// anchor column.
struct PendingSpan {
    cell: CellId,
    col_span: usize,
    remaining: u32,
}

impl TableModel {
    pub fn cell(&self, id: CellId) -> &Cell {
        &self.cells[id.0]
    }

    pub fn cell_mut(&mut self, id: CellId) -> &mut Cell {
        &mut self.cells[id.0]
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn add_cell(&mut self, cell: Cell) -> CellId {
        self.cells.push(cell);
        CellId(self.cells.len() - 1)
    }

    fn ensure_columns(&mut self, count: usize) {
        while self.columns.len() < count {
            self.columns.push(Column::default());
        }
    }

    /// Columns without a declared width or alignment inherit them from
    /// the first single-column cell that carries one.
    pub fn resolve_column_styles(&mut self) {
        for index in 0..self.columns.len() {
            if self.columns[index].width.is_none() {
                let inferred = self.columns[index].cells.iter().find_map(|id| {
                    let cell = self.cell(*id);
                    if cell.col_span == 1 { cell.width.clone() } else { None }
                });
                self.columns[index].width = inferred;
            }
            if self.columns[index].align.is_none() {
                let inferred = self.columns[index].cells.iter().find_map(|id| {
                    let cell = self.cell(*id);
                    if cell.col_span == 1 { cell.align.clone() } else { None }
                });
                self.columns[index].align = inferred;
            }
        }
    }

    /// Total width of a set of columns. `None` as soon as any of them has
    /// no width; unit mismatches beyond the cm/mm harmonization are
    /// errors.
    pub fn sum_column_widths(&self, columns: &[usize]) -> Result<Option<Width>, WidthError> {
        let mut total: Option<Width> = None;
        for &index in columns {
            let Some(width) = self.columns.get(index).and_then(|c| c.width.clone()) else {
                return Ok(None);
            };
            total = Some(match total {
                Some(sum) => sum.checked_add(&width)?,
                None => width,
            });
        }
        Ok(total)
    }
}

/// Lays parsed rows out onto the column grid.
///
/// Walks each row left to right. A column still covered by an earlier
/// row span receives a continuation slot and the walk jumps past the
/// span; otherwise the next source cell is placed, claiming `col_span`
/// columns and, with `row_span > 1`, registering its claim on upcoming
/// rows. Rows short of cells simply end early; rows with too many cells
/// grow the grid.
pub(crate) fn build_model(decls: &[ColumnDecl], row_cells: Vec<Vec<Cell>>) -> TableModel {
    let mut model = TableModel::default();
    model.ensure_columns(decls.len());
    for (index, decl) in decls.iter().enumerate() {
        model.columns[index].width = decl.width.clone();
        model.columns[index].align = decl.align.clone();
    }

    let mut pending: BTreeMap<usize, PendingSpan> = BTreeMap::new();
    for cells in row_cells {
        let mut row = Row::default();
        let mut source = cells.into_iter();
        let mut next_cell = source.next();
        let mut column = 0usize;
        let mut steps = 0usize;
        loop {
            steps += 1;
            if steps > SLOT_GUARD {
                warn!("table row exceeds {SLOT_GUARD} grid slots, truncating");
                break;
            }

            // A span from an earlier row covering this column?
            let covering = pending
                .range(..=column)
                .next_back()
                .filter(|(anchor, span)| **anchor + span.col_span > column)
                .map(|(anchor, _)| *anchor);
            if let Some(anchor) = covering {
                let Some(span) = pending.get_mut(&anchor) else {
                    break;
                };
                span.remaining = span.remaining.saturating_sub(1);
                let (cell, covered, exhausted) = (span.cell, span.col_span, span.remaining == 0);
                if exhausted {
                    pending.remove(&anchor);
                }
                row.slots.push(Slot {
                    cell,
                    leading: false,
                });
                column = anchor + covered;
                continue;
            }

            match next_cell.take() {
                Some(cell) => {
                    let col_span = cell.col_span.max(1) as usize;
                    let row_span = cell.row_span.max(1);
                    let id = model.add_cell(cell);
                    model.ensure_columns(column + col_span);
                    for offset in 0..col_span {
                        model.columns[column + offset].cells.push(id);
                        model.cell_mut(id).columns.push(column + offset);
                    }
                    row.slots.push(Slot {
                        cell: id,
                        leading: true,
                    });
                    if row_span > 1 {
                        pending.insert(
                            column,
                            PendingSpan {
                                cell: id,
                                col_span,
                                remaining: row_span - 1,
                            },
                        );
                    }
                    column += col_span;
                    next_cell = source.next();
                }
                None => {
                    // Out of source cells: service any spans further
                    // right, then end the row.
                    match pending.range(column..).next().map(|(anchor, _)| *anchor) {
                        Some(anchor) => column = anchor,
                        None => break,
                    }
                }
            }
        }
        model.rows.push(row);
    }

    if !pending.is_empty() {
        warn!(
            "{} row span(s) extend past the last table row",
            pending.len()
        );
    }
    model
}
