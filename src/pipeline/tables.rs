//! Table reconstruction from positioned text runs.
//!
//! pdfium exposes text as runs with bounding boxes, not as tables. A table
//! is recovered geometrically:
//!
//! 1. Runs are grouped into **lines** by vertical overlap.
//! 2. Each line is split into **cells** wherever the horizontal gap between
//!    neighbouring runs exceeds [`TableDetection::cell_gap`].
//! 3. A **table** is a maximal block of at least `min_rows` consecutive
//!    lines that all have the same number (≥ `min_columns`) of cells, with
//!    every column start within `column_tolerance` of the block's first row.
//!
//! Prose lines rarely contain wide gaps, so they come out as single-cell
//! lines and never start a block.

use super::clean::clean_cell;
use super::Table;
use crate::config::TableDetection;

/// A run of text and its bounding box in PDF points (y grows upward).
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl TextRun {
    pub fn new(text: impl Into<String>, left: f32, bottom: f32, right: f32, top: f32) -> Self {
        Self {
            text: text.into(),
            left,
            right,
            top,
            bottom,
        }
    }

    fn height(&self) -> f32 {
        (self.top - self.bottom).max(0.0)
    }
}

#[derive(Debug)]
struct Line {
    top: f32,
    bottom: f32,
    runs: Vec<TextRun>,
}

impl Line {
    fn accepts(&self, run: &TextRun, min_overlap: f32) -> bool {
        let overlap = self.top.min(run.top) - self.bottom.max(run.bottom);
        let shorter = (self.top - self.bottom).min(run.height());
        if shorter <= 0.0 {
            // Degenerate boxes: fall back to identical baselines.
            return (self.bottom - run.bottom).abs() < f32::EPSILON;
        }
        overlap >= min_overlap * shorter
    }
}

#[derive(Debug)]
struct Cell {
    left: f32,
    text: String,
}

/// Detect tables among a page's text runs, top to bottom.
pub fn detect_tables(runs: &[TextRun], config: &TableDetection) -> Vec<Table> {
    let lines: Vec<Vec<Cell>> = group_lines(runs, config.line_overlap)
        .into_iter()
        .map(|line| split_cells(line, config.cell_gap))
        .collect();

    let mut tables = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let width = lines[i].len();
        if width < config.min_columns {
            i += 1;
            continue;
        }

        let mut end = i + 1;
        while end < lines.len() && aligned(&lines[i], &lines[end], config.column_tolerance) {
            end += 1;
        }

        if end - i >= config.min_rows {
            tables.push(
                lines[i..end]
                    .iter()
                    .map(|row| row.iter().map(|c| clean_cell(&c.text)).collect())
                    .collect(),
            );
            i = end;
        } else {
            i += 1;
        }
    }
    tables
}

/// Pad every row with `None` to the width of the widest row.
pub fn pad_ragged(table: &mut Table) {
    let width = table.iter().map(Vec::len).max().unwrap_or(0);
    for row in table.iter_mut() {
        row.resize(width, None);
    }
}

fn aligned(first: &[Cell], candidate: &[Cell], tolerance: f32) -> bool {
    first.len() == candidate.len()
        && first
            .iter()
            .zip(candidate)
            .all(|(a, b)| (a.left - b.left).abs() <= tolerance)
}

fn group_lines(runs: &[TextRun], min_overlap: f32) -> Vec<Vec<TextRun>> {
    let mut sorted: Vec<&TextRun> = runs.iter().filter(|r| !r.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| b.top.total_cmp(&a.top).then(a.left.total_cmp(&b.left)));

    let mut lines: Vec<Line> = Vec::new();
    for run in sorted {
        match lines.last_mut() {
            Some(line) if line.accepts(run, min_overlap) => {
                line.top = line.top.max(run.top);
                line.bottom = line.bottom.min(run.bottom);
                line.runs.push(run.clone());
            }
            _ => lines.push(Line {
                top: run.top,
                bottom: run.bottom,
                runs: vec![run.clone()],
            }),
        }
    }

    lines.into_iter().map(|l| l.runs).collect()
}

fn split_cells(mut runs: Vec<TextRun>, cell_gap: f32) -> Vec<Cell> {
    runs.sort_by(|a, b| a.left.total_cmp(&b.left));

    let mut cells: Vec<Cell> = Vec::new();
    let mut right_edge = f32::NEG_INFINITY;
    for run in runs {
        match cells.last_mut() {
            Some(cell) if run.left - right_edge <= cell_gap => {
                cell.text.push(' ');
                cell.text.push_str(&run.text);
            }
            _ => cells.push(Cell {
                left: run.left,
                text: run.text.clone(),
            }),
        }
        right_edge = right_edge.max(run.right);
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A run on the line whose baseline is `y`, 10pt tall.
    fn run(text: &str, left: f32, right: f32, y: f32) -> TextRun {
        TextRun::new(text, left, y, right, y + 10.0)
    }

    fn cell(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn finds_aligned_three_by_three_block_among_prose() {
        let runs = vec![
            run("This is an introductory paragraph of prose.", 50.0, 400.0, 700.0),
            run("Region", 50.0, 90.0, 680.0),
            run("Q1", 200.0, 215.0, 680.0),
            run("Q2", 300.0, 315.0, 680.0),
            run("North", 50.0, 85.0, 665.0),
            run("10", 201.0, 212.0, 665.0),
            run("12", 302.0, 313.0, 665.0),
            run("South", 51.0, 86.0, 650.0),
            run("7", 199.0, 205.0, 650.0),
            run("9", 300.0, 306.0, 650.0),
            run("A closing remark in prose.", 50.0, 300.0, 630.0),
        ];

        let tables = detect_tables(&runs, &TableDetection::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(
            tables[0],
            vec![
                vec![cell("Region"), cell("Q1"), cell("Q2")],
                vec![cell("North"), cell("10"), cell("12")],
                vec![cell("South"), cell("7"), cell("9")],
            ]
        );
    }

    #[test]
    fn words_close_together_stay_in_one_cell() {
        let runs = vec![
            run("Net", 50.0, 70.0, 500.0),
            run("income", 73.0, 110.0, 500.0),
            run("100", 250.0, 270.0, 500.0),
            run("Gross", 50.0, 80.0, 485.0),
            run("margin", 83.0, 120.0, 485.0),
            run("40", 251.0, 265.0, 485.0),
        ];
        let tables = detect_tables(&runs, &TableDetection::default());
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0][0], vec![cell("Net income"), cell("100")]);
        assert_eq!(tables[0][1], vec![cell("Gross margin"), cell("40")]);
    }

    #[test]
    fn prose_only_has_no_tables() {
        let runs = vec![
            run("First line of text.", 50.0, 300.0, 700.0),
            run("Second line of text.", 50.0, 310.0, 685.0),
        ];
        assert!(detect_tables(&runs, &TableDetection::default()).is_empty());
    }

    #[test]
    fn single_aligned_line_is_not_a_table() {
        let runs = vec![
            run("Name", 50.0, 80.0, 700.0),
            run("Value", 200.0, 230.0, 700.0),
            run("Body text after the header.", 50.0, 300.0, 685.0),
        ];
        assert!(detect_tables(&runs, &TableDetection::default()).is_empty());
    }

    #[test]
    fn misaligned_columns_break_the_block() {
        let runs = vec![
            run("a", 50.0, 60.0, 700.0),
            run("b", 200.0, 210.0, 700.0),
            run("c", 50.0, 60.0, 685.0),
            run("d", 260.0, 270.0, 685.0),
        ];
        assert!(detect_tables(&runs, &TableDetection::default()).is_empty());
    }

    #[test]
    fn pad_ragged_rows() {
        let mut t: Table = vec![vec![cell("a"), cell("b"), cell("c")], vec![cell("d")]];
        pad_ragged(&mut t);
        assert_eq!(t[1], vec![cell("d"), None, None]);
    }
}
