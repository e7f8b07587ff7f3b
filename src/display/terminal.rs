use std::io::Write;

use colored::{ColoredString, Colorize};

use super::{AlertElement, DashboardView};

/// Prints the dashboard as a stream of lines.
///
/// Every score update prints a fresh score line; every alert prints one
/// line (plus an indented detail line when present). Nothing is ever
/// cleared, so the terminal scrollback holds the accumulated alerts.
pub struct TerminalView<W: Write> {
    out: W,
    alerts_shown: usize,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            alerts_shown: 0,
        }
    }

    /// Number of alert lines printed so far.
    pub fn alerts_shown(&self) -> usize {
        self.alerts_shown
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}") {
            tracing::warn!(error = %e, "failed to write dashboard line");
        }
    }
}

impl<W: Write> DashboardView for TerminalView<W> {
    fn set_risk_score(&mut self, text: &str) {
        let line = format!("{} {}", "Risk score:".bold(), text.bold().cyan());
        self.write_line(&line);
    }

    fn append_alert(&mut self, alert: AlertElement) {
        self.alerts_shown += 1;
        let tag = level_color(alert.level(), &format!("[{}]", alert.level().to_uppercase()));
        let line = format!("  {} {}", tag, alert.text);
        self.write_line(&line);
        if let Some(detail) = &alert.detail {
            let line = format!("      {}", detail.dimmed());
            self.write_line(&line);
        }
    }
}

fn level_color(level: &str, text: &str) -> ColoredString {
    match level {
        "critical" | "high" => text.red().bold(),
        "medium" | "warning" => text.yellow(),
        _ => text.cyan(),
    }
}
