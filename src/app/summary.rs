//! Scan summary table
//!
//! One row per requested repository, rendered to stdout after all scans
//! settle. Logs go to stderr, so the table is the process's only stdout
//! output besides exported JSON paths.

use prettytable::{format, Cell, Row, Table};

use crate::core::styles::StyleRole;
use crate::scan::status::ScanStatus;
use crate::scan::types::ScanResult;

pub fn print_summary(results: &[ScanResult], use_color: bool) {
    print!("{}", render_summary(results, use_color));

    for result in results.iter().filter(|r| !r.success) {
        if let Some(error) = &result.error {
            println!(
                "  {} {}",
                StyleRole::Error.paint(&result.repository_name, use_color),
                error
            );
        }
    }

    let failed = results.iter().filter(|r| !r.success).count();
    if failed == 0 {
        println!("{} of {} scans succeeded", results.len(), results.len());
    } else {
        println!(
            "{} of {} scans succeeded, {} failed",
            results.len() - failed,
            results.len(),
            failed
        );
    }
}

fn render_summary(results: &[ScanResult], use_color: bool) -> String {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.set_titles(Row::new(vec![
        header_cell("Repository", use_color),
        header_cell("Commits", use_color),
        header_cell("Merge Requests", use_color),
        header_cell("Users", use_color),
        header_cell("Duration", use_color),
        header_cell("Status", use_color),
    ]));

    for result in results {
        table.add_row(Row::new(vec![
            Cell::new(&result.repository_name),
            number_cell(result.commits_found),
            number_cell(result.merge_requests_found),
            number_cell(result.users_found),
            Cell::new(&format_duration(result.duration)).style_spec("r"),
            status_cell(result.status, use_color),
        ]));
    }

    table.to_string()
}

fn header_cell(title: &str, use_color: bool) -> Cell {
    let cell = Cell::new(title);
    match StyleRole::Header.to_prettytable_spec().filter(|_| use_color) {
        Some(spec) => cell.style_spec(&format!("b{}", spec)),
        None => cell,
    }
}

fn number_cell(value: usize) -> Cell {
    Cell::new(&value.to_string()).style_spec("r")
}

fn status_cell(status: ScanStatus, use_color: bool) -> Cell {
    let role = match status {
        ScanStatus::Completed => StyleRole::Valid,
        ScanStatus::Cancelled => StyleRole::Header,
        _ => StyleRole::Invalid,
    };
    let cell = Cell::new(&status.to_string());
    match role.to_prettytable_spec().filter(|_| use_color) {
        Some(spec) => cell.style_spec(&spec),
        None => cell,
    }
}

fn format_duration(duration: std::time::Duration) -> String {
    let total_ms = duration.as_millis();
    if total_ms < 1000 {
        format!("{}ms", total_ms)
    } else if total_ms < 60_000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {:02}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(name: &str, status: ScanStatus, commits: usize) -> ScanResult {
        ScanResult {
            scan_id: "scan-0000000000000000-1717245000000".to_string(),
            repository_name: name.to_string(),
            repository_url: format!("https://github.com/acme/{}", name),
            status,
            started_at: 1_717_245_000_000,
            finished_at: 1_717_245_004_500,
            duration: Duration::from_millis(4500),
            commits_found: commits,
            merge_requests_found: 2,
            users_found: 3,
            success: status == ScanStatus::Completed,
            error: (status != ScanStatus::Completed).then(|| "scan failed".to_string()),
        }
    }

    #[test]
    fn test_summary_lists_every_repository() {
        let results = vec![
            result("widgets", ScanStatus::Completed, 42),
            result("gadgets", ScanStatus::Failed, 0),
        ];

        let rendered = render_summary(&results, false);
        assert!(rendered.contains("widgets"));
        assert!(rendered.contains("gadgets"));
        assert!(rendered.contains("42"));
        assert!(rendered.contains("completed"));
        assert!(rendered.contains("failed"));
    }

    #[test]
    fn test_cancelled_status_renders() {
        let results = vec![result("widgets", ScanStatus::Cancelled, 0)];
        let rendered = render_summary(&results, false);
        assert!(rendered.contains("cancelled"));
    }

    #[test]
    fn test_plain_output_has_no_ansi_codes() {
        let results = vec![result("widgets", ScanStatus::Completed, 1)];
        let rendered = render_summary(&results, false);
        assert!(!rendered.contains('\x1b'));
    }

    #[test]
    fn test_format_duration_scales() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(4500)), "4.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
    }
}
