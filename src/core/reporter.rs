//! Renders a [`ResultManager`] as tables, text, JSON or CSV.

use crate::core::result_manager::{ResultManager, StatusCounts};
use crate::domain::model::{TestResult, TestStatus};
use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

const CSV_HEADERS: [&str; 6] = [
    "Device",
    "Test Name",
    "Test Status",
    "Message(s)",
    "Test description",
    "Test category",
];

/// Plain text table; cells may span several lines.
struct Table {
    title: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(title: impl Into<String>, headers: &[&str]) -> Self {
        Self {
            title: title.into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn add_row(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                let longest = cell.lines().map(|l| l.chars().count()).max().unwrap_or(0);
                *width = (*width).max(longest);
            }
        }

        let separator = widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+");
        let separator = format!("+{}+\n", separator);

        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        out.push_str(&separator);
        out.push_str(&render_line(&self.headers, &widths));
        out.push_str(&separator);
        for row in &self.rows {
            out.push_str(&render_line(row, &widths));
        }
        out.push_str(&separator);
        out
    }
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    let lines: Vec<Vec<&str>> = cells.iter().map(|c| c.lines().collect()).collect();
    let height = lines.iter().map(Vec::len).max().unwrap_or(0).max(1);

    let mut out = String::new();
    for i in 0..height {
        out.push('|');
        for (cell, width) in lines.iter().zip(widths) {
            let text = cell.get(i).copied().unwrap_or("");
            let _ = write!(out, " {:<width$} |", text, width = width);
        }
        out.push('\n');
    }
    out
}

/// Every result, one row each.
pub fn report_all(manager: &ResultManager, title: &str) -> String {
    let mut table = Table::new(title, &CSV_HEADERS);
    for result in manager.results() {
        table.add_row(vec![
            result.name.clone(),
            result.test.clone(),
            result.result.to_string(),
            result.messages.join("\n"),
            result.description.clone(),
            result.categories.join(", "),
        ]);
    }
    table.render()
}

/// Entities on which a test failed or errored, by device or by test.
fn failed_entities(
    results: &[TestResult],
    key: impl Fn(&TestResult) -> &str,
    by: impl Fn(&TestResult) -> &str,
) -> BTreeMap<String, BTreeSet<String>> {
    let mut failed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for result in results {
        if matches!(result.result, TestStatus::Failure | TestStatus::Error) {
            failed
                .entry(key(result).to_string())
                .or_default()
                .insert(by(result).to_string());
        }
    }
    failed
}

fn summary_table(
    title: &str,
    first_header: &str,
    last_header: &str,
    summary: BTreeMap<String, StatusCounts>,
    failed: BTreeMap<String, BTreeSet<String>>,
) -> String {
    let mut table = Table::new(
        title,
        &[
            first_header,
            "# of success",
            "# of skipped",
            "# of failure",
            "# of errors",
            last_header,
        ],
    );
    for (name, counts) in summary {
        let failures = failed
            .get(&name)
            .map(|set| set.iter().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        table.add_row(vec![
            name,
            counts.success.to_string(),
            counts.skipped.to_string(),
            counts.failure.to_string(),
            counts.error.to_string(),
            failures,
        ]);
    }
    table.render()
}

pub fn report_summary_devices(manager: &ResultManager) -> String {
    summary_table(
        "Summary per device",
        "Device",
        "List of failed or error test cases",
        manager.summary_by_device(),
        failed_entities(manager.results(), |r| r.name.as_str(), |r| r.test.as_str()),
    )
}

pub fn report_summary_tests(manager: &ResultManager) -> String {
    summary_table(
        "Summary per test",
        "Test Case",
        "List of failed or error nodes",
        manager.summary_by_test(),
        failed_entities(manager.results(), |r| r.test.as_str(), |r| r.name.as_str()),
    )
}

/// One line per result: `<device> :: <test> :: <STATUS>(<messages>)`.
pub fn report_text(manager: &ResultManager) -> String {
    let mut out = String::new();
    for result in manager.results() {
        let messages = if result.messages.is_empty() {
            String::new()
        } else {
            format!("({})", result.messages.join(", "))
        };
        let _ = writeln!(
            out,
            "{} :: {} :: {}{}",
            result.name,
            result.test,
            result.result.to_string().to_uppercase(),
            messages
        );
    }
    out
}

pub fn report_json(manager: &ResultManager) -> Result<String> {
    manager.json()
}

pub fn to_csv(manager: &ResultManager) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADERS)?;
    for result in manager.results() {
        let status = result.result.to_string();
        let messages = result.messages.join("\n");
        let categories = result.categories.join(", ");
        writer.write_record([
            result.name.as_str(),
            result.test.as_str(),
            status.as_str(),
            messages.as_str(),
            result.description.as_str(),
            categories.as_str(),
        ])?;
    }
    let data = writer
        .into_inner()
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

pub async fn save_csv<S: Storage>(manager: &ResultManager, storage: &S, path: &str) -> Result<()> {
    storage.write_file(path, to_csv(manager)?.as_bytes()).await?;
    tracing::info!("CSV report saved to {}", path);
    Ok(())
}

pub async fn save_json<S: Storage>(manager: &ResultManager, storage: &S, path: &str) -> Result<()> {
    storage.write_file(path, manager.json()?.as_bytes()).await?;
    tracing::info!("JSON report saved to {}", path);
    Ok(())
}
