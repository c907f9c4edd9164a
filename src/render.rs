//! Terminal output for reconciled connection rows.
//!
//! Two formats: a bordered table for humans and a tab-separated form for
//! scripting. Colors only ever touch the rendered string, never the row
//! data, and column widths are always computed from the plain text.

use std::str::FromStr;
use thiserror::Error;

use crate::reconcile::{self, ReconciledRow};

const RED: &str = "\x1b[31;1m";
const GREEN: &str = "\x1b[32;1m";
const RESET: &str = "\x1b[0m";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("unsupported output format '{0}', expected 'table' or 'tsv'")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Tsv,
}

impl FromStr for OutputFormat {
    type Err = RenderError;

    fn from_str(value: &str) -> Result<Self, RenderError> {
        match value {
            "table" => Ok(OutputFormat::Table),
            "tsv" => Ok(OutputFormat::Tsv),
            other => Err(RenderError::UnknownFormat(other.to_string())),
        }
    }
}

/// One output cell: plain text plus an optional ANSI color applied only
/// when the cell is finally written.
struct Cell {
    text: String,
    color: Option<&'static str>,
}

impl Cell {
    fn plain(text: impl Into<String>) -> Self {
        Cell {
            text: text.into(),
            color: None,
        }
    }

    fn status(row: &ReconciledRow) -> Self {
        let color = if cfg!(windows) {
            None
        } else if row.connected {
            Some(GREEN)
        } else if row.status == "Disconnected" {
            Some(RED)
        } else {
            None
        };
        Cell {
            text: row.status.clone(),
            color,
        }
    }
}

/// Renders the rows in the requested format. The extended column set
/// (Connected for, Client IP, Server IP) appears iff at least one row is
/// currently connected.
pub fn render(rows: &[ReconciledRow], now: i64, format: OutputFormat) -> String {
    let extended = reconcile::any_connected(rows);
    let headers: &[&str] = if extended {
        &["ID", "Name", "Status", "Connected for", "Client IP", "Server IP"]
    } else {
        &["ID", "Name", "Status"]
    };

    let cells: Vec<Vec<Cell>> = rows
        .iter()
        .map(|row| {
            let mut line = vec![
                Cell::plain(row.id.to_string()),
                Cell::plain(row.name.clone()),
                Cell::status(row),
            ];
            if extended {
                let since = row
                    .timestamp
                    .map(|timestamp| reconcile::format_since(timestamp, now))
                    .unwrap_or_default();
                line.push(Cell::plain(since));
                line.push(Cell::plain(row.client_addr.clone()));
                line.push(Cell::plain(row.server_addr.clone()));
            }
            line
        })
        .collect();

    match format {
        OutputFormat::Table => render_table(headers, &cells),
        OutputFormat::Tsv => render_tsv(headers, &cells),
    }
}

fn render_table(headers: &[&str], rows: &[Vec<Cell>]) -> String {
    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(column, header)| {
            rows.iter()
                .map(|row| row[column].text.len())
                .chain(std::iter::once(header.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let separator = widths
        .iter()
        .map(|width| format!("+{}", "-".repeat(width + 2)))
        .collect::<String>()
        + "+\n";

    let mut out = separator.clone();
    for (column, header) in headers.iter().enumerate() {
        out.push_str(&format!("| {:<width$} ", header, width = widths[column]));
    }
    out.push_str("|\n");
    out.push_str(&separator);

    for row in rows {
        for (column, cell) in row.iter().enumerate() {
            let padding = " ".repeat(widths[column] - cell.text.len());
            match cell.color {
                Some(color) => {
                    out.push_str(&format!("| {color}{}{RESET}{padding} ", cell.text));
                }
                None => out.push_str(&format!("| {}{padding} ", cell.text)),
            }
        }
        out.push_str("|\n");
    }
    out.push_str(&separator);
    out
}

fn render_tsv(headers: &[&str], rows: &[Vec<Cell>]) -> String {
    let mut out = headers.join("\t");
    out.push('\n');
    for row in rows {
        let line: Vec<&str> = row.iter().map(|cell| cell.text.as_str()).collect();
        out.push_str(&line.join("\t"));
        out.push('\n');
    }
    out
}
