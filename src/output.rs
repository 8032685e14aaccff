use std::io::{self, Write};

use serde::Serialize;

use crate::pipeline::HarvestSummary;
use crate::store::AuditReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Plain,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &HarvestSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_audit(report: &AuditReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct PlainOutput;

impl PlainOutput {
    pub fn print_summary(summary: &HarvestSummary) -> io::Result<()> {
        let mut stdout = io::stdout();
        writeln!(stdout, "End of execution")?;
        writeln!(stdout, "{}", resume_line(summary))?;
        Ok(())
    }

    pub fn print_audit(report: &AuditReport) -> io::Result<()> {
        let mut stdout = io::stdout();
        writeln!(stdout, "Checked {} stored files", report.files)?;
        for path in &report.mismatched {
            writeln!(stdout, "mismatched content: {path}")?;
        }
        for path in &report.foreign {
            writeln!(stdout, "unexpected entry: {path}")?;
        }
        for group in &report.duplicates {
            let names = group.iter().map(|p| p.as_str()).collect::<Vec<_>>();
            writeln!(stdout, "duplicate content: {}", names.join(", "))?;
        }
        if report.is_clean() {
            writeln!(stdout, "Storage is consistent")?;
        }
        Ok(())
    }
}

pub fn resume_line(summary: &HarvestSummary) -> String {
    format!(
        "Resume: {} comic image files have been downloaded and saved in {}/",
        summary.downloaded,
        summary.directory.trim_end_matches('/')
    )
}
