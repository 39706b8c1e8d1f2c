//! `studysnap solve`: submit photos from disk and print the worked solutions.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use studysnap_core::{ProblemId, ProblemItem, StatusCounts, Subject};
use studysnap_media::{IntakeMode, UploadedFile};
use studysnap_session::StudySession;

use crate::terminal_output::{
    note_info, note_success, note_warn, progress_line, render_problem, render_table,
    supports_color, Column,
};

pub struct SolveArgs {
    pub files: Vec<PathBuf>,
    pub subject: Subject,
    pub single: bool,
    pub json: bool,
}

pub async fn run(session: &StudySession, args: SolveArgs) -> Result<()> {
    let mode = if args.single {
        IntakeMode::Single
    } else {
        IntakeMode::Batch
    };

    let files = read_files(&args.files, mode).await?;
    if files.is_empty() {
        note_warn("None of the selected files could be read; nothing to solve.");
        return Ok(());
    }

    let ids = session.submit(files, mode, args.subject).await?;
    if ids.is_empty() {
        note_warn("None of the selected files is an image; nothing to solve.");
        return Ok(());
    }

    let color = supports_color() && !args.json;
    if !args.json {
        note_info(&format!(
            "Analyzing {} problem(s) as {}...",
            ids.len(),
            args.subject.label()
        ));
    }

    let items = follow_progress(session, &ids, args.json, color).await?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&items).context("Failed to serialize results")?
        );
        return Ok(());
    }

    println!();
    for item in &items {
        println!("{}", render_problem(item, color));
    }
    print_summary(&items);
    Ok(())
}

/// Load the selection from disk.
///
/// Single mode reads only the first path and fails if it cannot be read.
/// Batch mode skips unreadable paths (missing files, directories) with a
/// warning, the same way intake drops non-images.
async fn read_files(paths: &[PathBuf], mode: IntakeMode) -> Result<Vec<UploadedFile>> {
    let paths = match mode {
        IntakeMode::Single => &paths[..paths.len().min(1)],
        IntakeMode::Batch => paths,
    };

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match UploadedFile::from_path(path).await {
            Ok(file) => files.push(file),
            Err(e) if mode == IntakeMode::Batch => {
                warn!(path = %path.display(), error = %format!("{:#}", e), "Skipping unreadable file");
                note_warn(&format!("{:#}; skipping", e));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(files)
}

/// Print one line per item as it settles, in resolution order.
///
/// Returns this run's items in collection order (newest first).
async fn follow_progress(
    session: &StudySession,
    ids: &[ProblemId],
    quiet: bool,
    color: bool,
) -> Result<Vec<ProblemItem>> {
    let mut pending: HashSet<ProblemId> = ids.iter().copied().collect();
    let mut snapshots = session.watch();

    loop {
        let current: Vec<Arc<ProblemItem>> = snapshots
            .borrow_and_update()
            .iter()
            .filter(|item| ids.contains(&item.id))
            .cloned()
            .collect();

        for item in &current {
            if item.status.is_terminal() && pending.remove(&item.id) && !quiet {
                println!("{}", progress_line(item, color));
            }
        }

        if pending.is_empty() {
            return Ok(current.iter().map(|item| ProblemItem::clone(item)).collect());
        }
        debug!(pending = pending.len(), "Waiting for solve results");
        snapshots
            .changed()
            .await
            .context("Session stopped before all problems were solved")?;
    }
}

fn print_summary(items: &[ProblemItem]) {
    print!("{}", summary_table(items));

    let counts = StatusCounts::tally(items);
    if counts.error == 0 {
        note_success(&format!("Solved {} of {}", counts.completed, counts.total()));
    } else {
        note_warn(&format!(
            "Solved {} of {}; {} failed",
            counts.completed,
            counts.total(),
            counts.error
        ));
    }
}

fn summary_table(items: &[ProblemItem]) -> String {
    let rows: Vec<Vec<String>> = items
        .iter()
        .map(|item| {
            vec![
                item.image.file_name.clone(),
                item.subject.to_string(),
                format_size(item.image.size_bytes),
                item.status.label().to_string(),
                item.error_message().unwrap_or("").to_string(),
            ]
        })
        .collect();
    let columns = [
        Column::left("File").max_width(32),
        Column::left("Subject"),
        Column::right("Size"),
        Column::left("Status"),
        Column::left("Error").max_width(48),
    ];
    render_table(&columns, &rows)
}

fn format_size(bytes: usize) -> String {
    const KIB: f64 = 1024.0;
    let size = bytes as f64;
    if size < KIB {
        format!("{bytes} B")
    } else if size < KIB * KIB {
        format!("{:.1} KiB", size / KIB)
    } else {
        format!("{:.1} MiB", size / (KIB * KIB))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use chrono::Utc;
    use studysnap_core::{ImageReference, ProblemStatus};
    use studysnap_solver::{MockProvider, SolveResolver};

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("studysnap-solve-{}", ProblemId::new()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn session(response: &str) -> StudySession {
        let provider = MockProvider::new("mock").with_response(response);
        StudySession::start(SolveResolver::new(Arc::new(provider), "mock-model"))
    }

    fn args(files: Vec<PathBuf>, single: bool) -> SolveArgs {
        SolveArgs {
            files,
            subject: Subject::Math,
            single,
            json: true,
        }
    }

    fn item(name: &str, size_bytes: usize) -> ProblemItem {
        let mut item = ProblemItem::new(
            ImageReference {
                file_name: name.into(),
                mime_type: "image/png".into(),
                size_bytes,
                preview_uri: String::new(),
            },
            Subject::Math,
            Utc::now(),
        );
        item.status = ProblemStatus::Completed {
            solution: "ok".into(),
        };
        item
    }

    #[tokio::test]
    async fn test_batch_skips_unreadable_paths() {
        let dir = scratch_dir();
        let png = write(&dir, "a.png", b"png");
        let missing = dir.join("missing.png");
        let folder = dir.join("photos");
        std::fs::create_dir(&folder).unwrap();

        let files = read_files(&[png.clone(), missing.clone(), folder.clone()], IntakeMode::Batch)
            .await
            .unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, "a.png");

        let s = session("x = 4");
        run(&s, args(vec![png, missing, folder], false)).await.unwrap();
        let items = s.snapshot();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].image.file_name, "a.png");
        assert_eq!(items[0].solution_text(), "x = 4");

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_batch_with_nothing_readable_succeeds() {
        let dir = scratch_dir();
        let s = session("unused");
        run(&s, args(vec![dir.join("gone.png"), dir.clone()], false))
            .await
            .unwrap();
        assert!(s.snapshot().is_empty());

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_single_mode_fails_on_unreadable_path() {
        let dir = scratch_dir();
        let missing = dir.join("missing.png");
        let png = write(&dir, "b.png", b"png");

        let err = read_files(&[missing.clone(), png.clone()], IntakeMode::Single)
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("missing.png"));

        let s = session("unused");
        assert!(run(&s, args(vec![missing, png], true)).await.is_err());
        assert!(s.snapshot().is_empty());

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_sizes_are_human_readable() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn test_summary_right_aligns_sizes() {
        let table = summary_table(&[item("small.png", 512), item("IMG_0042.jpg", 3 * 1024 * 1024)]);
        let small = table.lines().find(|l| l.contains("small.png")).unwrap();
        assert!(small.contains("  512 B  completed"), "{table}");
        let large = table.lines().find(|l| l.contains("IMG_0042.jpg")).unwrap();
        assert!(large.contains("3.0 MiB  completed"), "{table}");
    }
}
