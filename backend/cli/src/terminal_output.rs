//! Terminal output utilities: notes, status badges, problem rendering, tables.

use studysnap_core::{ProblemItem, ProblemStatus};

// ---------------------------------------------------------------------------
// ANSI Color/Style helpers
// ---------------------------------------------------------------------------

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Check if the terminal supports color output.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM")
                .map(|t| t != "dumb")
                .unwrap_or(false))
}

/// Strip ANSI escape codes from a string.
pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // Skip until 'm'
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn paint(color: bool, style: &str, text: &str) -> String {
    if color {
        format!("{style}{text}{RESET}")
    } else {
        text.to_string()
    }
}

// ---------------------------------------------------------------------------
// Formatted notes
// ---------------------------------------------------------------------------

/// Print a formatted INFO note to stdout.
pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}ℹ{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

/// Print a formatted WARNING note.
pub fn note_warn(msg: &str) {
    if supports_color() {
        println!("{YELLOW}{BOLD}⚠{RESET} {msg}");
    } else {
        println!("WARN: {msg}");
    }
}

/// Print a formatted ERROR note. Goes to stderr.
pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}✗{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

/// Print a formatted SUCCESS note.
pub fn note_success(msg: &str) {
    if supports_color() {
        println!("{GREEN}{BOLD}✓{RESET} {msg}");
    } else {
        println!("OK: {msg}");
    }
}

// ---------------------------------------------------------------------------
// Problem rendering
// ---------------------------------------------------------------------------

/// Short colored label for a status.
pub fn status_badge(status: &ProblemStatus, color: bool) -> String {
    match status {
        ProblemStatus::Analyzing => paint(color, YELLOW, "analyzing"),
        ProblemStatus::Completed { .. } => paint(color, GREEN, "completed"),
        ProblemStatus::Error { .. } => paint(color, RED, "error"),
    }
}

/// One progress line, printed as an item reaches a terminal state.
pub fn progress_line(item: &ProblemItem, color: bool) -> String {
    let mark = match item.status {
        ProblemStatus::Completed { .. } => paint(color, GREEN, "✓"),
        ProblemStatus::Error { .. } => paint(color, RED, "✗"),
        ProblemStatus::Analyzing => paint(color, DIM, "…"),
    };
    format!(
        "{} {} {}",
        mark,
        item.image.file_name,
        status_badge(&item.status, color)
    )
}

/// Full block for one item: header line, then solution or error text.
pub fn render_problem(item: &ProblemItem, color: bool) -> String {
    let header = format!(
        "{} {} [{}]",
        paint(color, BOLD, &item.image.file_name),
        paint(color, DIM, item.subject.label()),
        status_badge(&item.status, color),
    );
    let body = match &item.status {
        ProblemStatus::Analyzing => paint(color, DIM, "Analyzing..."),
        ProblemStatus::Completed { solution } => solution.trim_end().to_string(),
        ProblemStatus::Error { message } => paint(color, RED, message),
    };
    let rule = "─".repeat(strip_ansi(&header).chars().count().min(72));
    format!("{header}\n{rule}\n{body}\n")
}

// ---------------------------------------------------------------------------
// Table rendering
// ---------------------------------------------------------------------------

/// Column alignment.
pub enum Align {
    Left,
    Right,
}

/// A table column definition.
pub struct Column {
    pub header: String,
    pub align: Align,
    pub max_width: Option<usize>,
}

impl Column {
    pub fn left(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            align: Align::Left,
            max_width: None,
        }
    }

    pub fn right(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            align: Align::Right,
            max_width: None,
        }
    }

    pub fn max_width(mut self, width: usize) -> Self {
        self.max_width = Some(width);
        self
    }
}

/// Render a table with given columns and rows.
pub fn render_table(columns: &[Column], rows: &[Vec<String>]) -> String {
    let num_cols = columns.len();
    let mut widths: Vec<usize> = columns
        .iter()
        .map(|c| strip_ansi(&c.header).chars().count())
        .collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(num_cols) {
            let w = strip_ansi(cell).chars().count();
            let w = columns[i].max_width.map_or(w, |max| w.min(max));
            widths[i] = widths[i].max(w);
        }
    }

    let mut out = String::new();

    let header_cells: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(i, col)| pad_cell(&col.header, widths[i], &col.align))
        .collect();
    out.push_str(&format!("  {}  \n", header_cells.join("  ")));

    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("  {}  \n", sep.join("  ")));

    for row in rows {
        let cells: Vec<String> = (0..num_cols)
            .map(|i| {
                let cell = row.get(i).map(String::as_str).unwrap_or("");
                let cell = truncate(cell, columns[i].max_width);
                pad_cell(&cell, widths[i], &columns[i].align)
            })
            .collect();
        out.push_str(&format!("  {}  \n", cells.join("  ")));
    }

    out
}

fn truncate(s: &str, max: Option<usize>) -> String {
    match max {
        Some(max) if strip_ansi(s).chars().count() > max && max > 1 => {
            let plain = strip_ansi(s);
            let kept: String = plain.chars().take(max - 1).collect();
            format!("{kept}…")
        }
        _ => s.to_string(),
    }
}

fn pad_cell(s: &str, width: usize, align: &Align) -> String {
    let visible_len = strip_ansi(s).chars().count();
    let pad = width.saturating_sub(visible_len);
    match align {
        Align::Left => format!("{s}{}", " ".repeat(pad)),
        Align::Right => format!("{}{s}", " ".repeat(pad)),
    }
}
