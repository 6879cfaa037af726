use std::{
    fmt,
    path::{Path, PathBuf},
};

use walkdir::WalkDir;

use crate::extract::VideoOutcome;

/// Matched case-insensitively against the file extension.
pub const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "avi", "mov", "mkv", "flv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Recognized,
    Unrecognized,
}

pub fn classify(path: &Path) -> Classification {
    let recognized = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|video| video.eq_ignore_ascii_case(ext))
        });

    if recognized {
        Classification::Recognized
    } else {
        Classification::Unrecognized
    }
}

/// All recognized videos under `root`, depth first with the entries of every directory
/// sorted by file name. Symlinked files are included, symlinked directories are not
/// entered. Entries that can't be read are logged and skipped.
pub fn find_videos(root: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                log::warn!("Skipping unreadable entry: {e}");
                None
            }
        })
        .map(walkdir::DirEntry::into_path)
        .filter(|path| path.is_file())
        .filter(|path| classify(path) == Classification::Recognized)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: usize,
    pub unopenable: usize,
    pub failed: usize,
    pub saved: u64,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.processed + self.unopenable + self.failed
    }

    fn record(&mut self, outcome: &VideoOutcome) {
        match outcome {
            VideoOutcome::Processed(summary) => {
                self.processed += 1;
                self.saved += summary.saved;
            }
            VideoOutcome::Unopenable(_) => self.unopenable += 1,
            VideoOutcome::Failed(_) => self.failed += 1,
        }
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} videos attempted: {} processed, {} could not be opened, {} failed, {} frames saved",
            self.attempted(),
            self.processed,
            self.unopenable,
            self.failed,
            self.saved
        )
    }
}

/// Calls `process` on every video under `root`, regardless of how the previous ones
/// went.
pub fn process_directory<F>(root: &Path, mut process: F) -> BatchReport
where
    F: FnMut(&Path) -> VideoOutcome,
{
    let mut report = BatchReport::default();
    for video in find_videos(root) {
        log::info!("Processing video: {}", video.display());
        let outcome = process(&video);
        report.record(&outcome);
    }
    report
}
