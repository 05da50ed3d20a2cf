use std::fmt::Write as _;
use std::path::Path;

use ums_common::MigrationId;
use ums_db::{MigrationStatus, RunOutcome, StepEvent};

const WIDTH: usize = 70;

fn boxed(title: &str, rows: &[String]) -> String {
    let inner = WIDTH - 4;
    let dashes = WIDTH.saturating_sub(title.chars().count() + 7);
    let mut out = format!("╭─── {title} {}╮\n", "─".repeat(dashes));
    for row in rows {
        let chars: Vec<char> = row.chars().collect();
        // long rows wrap onto continuation lines
        let chunks: Vec<String> = if chars.is_empty() {
            vec![String::new()]
        } else {
            chars.chunks(inner).map(|c| c.iter().collect()).collect()
        };
        for chunk in chunks {
            let pad = inner - chunk.chars().count();
            let _ = writeln!(out, "│ {chunk}{} │", " ".repeat(pad));
        }
    }
    let _ = writeln!(out, "╰{}╯", "─".repeat(WIDTH - 2));
    out
}

pub fn render_run(outcome: &RunOutcome, db_path: &Path) -> String {
    let mut rows = vec![format!("Database    {}", db_path.display()), String::new()];
    for event in outcome.events() {
        let (mark, label) = match event {
            StepEvent::Applied(_) => ("✔", "applied"),
            StepEvent::NoOp(_) => ("·", "no-op"),
            StepEvent::Skipped(_) => (" ", "already applied"),
            StepEvent::Failed(_) => ("✘", "FAILED"),
        };
        rows.push(format!("{mark} {:<48}{label}", event.id().to_string()));
    }
    if outcome.events().is_empty() {
        rows.push("nothing to do".to_string());
    }
    rows.push(String::new());
    rows.push(format!(
        "{} applied, {} skipped",
        outcome.applied_count(),
        outcome.skipped_count()
    ));
    if let Some((id, cause)) = outcome.failure() {
        rows.push(format!("halted at {id}"));
        rows.push(cause.to_string());
    }

    let title = if outcome.is_success() {
        "Migrations complete"
    } else {
        "Migrations halted"
    };
    boxed(title, &rows)
}

pub fn render_status(statuses: &[MigrationStatus]) -> String {
    let rows: Vec<String> = statuses
        .iter()
        .map(|status| match status {
            MigrationStatus::Pending { id } => format!("  {:<44}pending", id.to_string()),
            MigrationStatus::Applied {
                id,
                applied_at,
                recorded_name,
            } => {
                let mut row = format!(
                    "✔ {:<44}{}",
                    id.to_string(),
                    applied_at.format("%Y-%m-%d %H:%M:%S")
                );
                if let Some(recorded) = recorded_name {
                    let _ = write!(row, " (recorded as {recorded})");
                }
                row
            }
            MigrationStatus::Unknown { id, applied_at } => format!(
                "? {:<44}{} not in catalog",
                id.to_string(),
                applied_at.format("%Y-%m-%d")
            ),
        })
        .collect();

    let pending = statuses.iter().filter(|s| s.is_pending()).count();
    boxed(&format!("Status · {pending} pending"), &rows)
}

pub fn render_plan(pending: &[MigrationId]) -> String {
    if pending.is_empty() {
        return "schema is up to date\n".to_string();
    }
    let mut out = format!("{} pending migration(s):\n", pending.len());
    for id in pending {
        let _ = writeln!(out, "  {id}");
    }
    out
}

pub fn render_verify(expected: &[String], missing: &[String]) -> String {
    let rows: Vec<String> = expected
        .iter()
        .map(|table| {
            if missing.contains(table) {
                format!("✘ {table}")
            } else {
                format!("✔ {table}")
            }
        })
        .collect();
    let title = if missing.is_empty() {
        "Verify · ok".to_string()
    } else {
        format!("Verify · {} missing", missing.len())
    };
    boxed(&title, &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ums_common::Error;

    #[test]
    fn boxed_rows_have_equal_width() {
        let out = boxed("Title", &["short".into(), "x".repeat(200)]);
        let widths: Vec<usize> = out.lines().map(|l| l.chars().count()).collect();
        assert!(widths.iter().all(|w| *w == WIDTH), "{widths:?}");
    }

    #[test]
    fn failed_run_shows_cause() {
        let id = MigrationId::new(12, "add_tournament_archive_fields");
        let outcome = RunOutcome::Failed {
            failed: id.clone(),
            cause: Error::MigrationApply {
                id: id.clone(),
                source: Box::new(Error::Database("disk I/O error".into())),
            },
            events: vec![StepEvent::Failed(id)],
        };

        let out = render_run(&outcome, Path::new("core.db"));
        assert!(out.contains("Migrations halted"));
        assert!(out.contains("012_add_tournament_archive_fields"));
        assert!(out.contains("disk I/O error"));
    }

    #[test]
    fn plan_lists_pending() {
        assert_eq!(render_plan(&[]), "schema is up to date\n");
        let out = render_plan(&[MigrationId::new(15, "add_tournament_code")]);
        assert!(out.contains("015_add_tournament_code"));
    }
}
