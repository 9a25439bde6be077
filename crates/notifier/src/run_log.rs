//! Per-run report written next to the staged notifications
//!
//! Every stage that prints tenant or user detail receives the same `RunLog`
//! explicitly.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Width of a single column
const COLUMN_WIDTH: usize = 40;

/// Columns per row
const COLUMNS: usize = 4;

const SEPARATOR: &str = " | ";

/// Human readable run report
pub struct RunLog<W: Write> {
    out: W,
}

impl RunLog<BufWriter<File>> {
    /// Create the log file, starting with the run timestamp
    pub fn create(path: &Path, started: &str) -> io::Result<Self> {
        let mut log = Self::new(BufWriter::new(File::create(path)?));
        log.line(started)?;
        Ok(log)
    }
}

impl RunLog<io::Sink> {
    /// A log that discards everything
    pub fn sink() -> Self {
        Self::new(io::sink())
    }
}

impl<W: Write> RunLog<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn line(&mut self, text: impl AsRef<str>) -> io::Result<()> {
        writeln!(self.out, "{}", text.as_ref())
    }

    pub fn blank(&mut self) -> io::Result<()> {
        self.line(" ")
    }

    /// A full-width rule made of `c`
    pub fn rule(&mut self, c: char) -> io::Result<()> {
        let width = COLUMNS * COLUMN_WIDTH + (COLUMNS - 1) * SEPARATOR.len();
        self.line(c.to_string().repeat(width))
    }

    /// A row of up to four fixed-width cells; longer cells are truncated
    pub fn row(&mut self, cells: &[&str]) -> io::Result<()> {
        let row = (0..COLUMNS)
            .map(|i| {
                let cell: String = cells
                    .get(i)
                    .copied()
                    .unwrap_or("")
                    .chars()
                    .take(COLUMN_WIDTH)
                    .collect();
                format!("{:<width$}", cell, width = COLUMN_WIDTH)
            })
            .collect::<Vec<_>>()
            .join(SEPARATOR);

        self.line(row.trim_end())
    }

    /// A two-cell heading between `=` rules
    pub fn heading(&mut self, left: &str, right: &str) -> io::Result<()> {
        self.rule('=')?;
        self.row(&[left, right])?;
        self.rule('=')
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
