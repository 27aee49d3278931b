//! Report sink and terminal styling.
//!
//! Reporting is presentation-only and kept behind [`ReportSink`] so the
//! migration core never touches stdout directly; tests capture lines in
//! memory instead.

use console::Style;

/// Destination for human-readable migration output.
pub trait ReportSink {
    fn line(&mut self, msg: &str);
}

/// Writes report lines to stdout.
#[derive(Debug, Default)]
pub struct ConsoleReport;

impl ReportSink for ConsoleReport {
    fn line(&mut self, msg: &str) {
        println!("{msg}");
    }
}

/// Captures report lines in memory. Used by tests and dry-run tooling.
#[derive(Debug, Default)]
pub struct BufferReport {
    pub lines: Vec<String>,
}

impl ReportSink for BufferReport {
    fn line(&mut self, msg: &str) {
        self.lines.push(msg.to_string());
    }
}

/// Style an old (pre-rename) identifier: red.
pub fn old(msg: &str) -> String {
    Style::new().red().apply_to(msg).to_string()
}

/// Style a new (post-rename) identifier: green.
pub fn new(msg: &str) -> String {
    Style::new().green().apply_to(msg).to_string()
}

/// Style a namespace: blue.
pub fn namespace(msg: &str) -> String {
    Style::new().blue().apply_to(msg).to_string()
}
