//! Upload batches.
//!
//! Files are uploaded strictly one at a time. [`UploadQueue`] is the ordered
//! task queue behind that: it hands out the next file only when nothing is
//! in flight, and tracks per-file outcomes so that progress only moves
//! forward and a failed file never stops the rest of the batch.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Extensions the backend accepts.
pub const ALLOWED_EXTENSIONS: [&str; 5] = [".pdf", ".docx", ".doc", ".xlsx", ".xls"];

/// A local file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub path: PathBuf,
}

impl UploadFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("not a file name: {}", path.display()))?;
        Ok(Self { filename, path })
    }

    /// Lowercased extension with its leading dot, or `""`.
    pub fn extension(&self) -> String {
        Path::new(&self.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default()
    }

    pub fn is_allowed(&self) -> bool {
        ALLOWED_EXTENSIONS.contains(&self.extension().as_str())
    }

    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_str() {
            ".pdf" => "application/pdf",
            ".docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            ".doc" => "application/msword",
            ".xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ".xls" => "application/vnd.ms-excel",
            _ => "application/octet-stream",
        }
    }
}

/// Expand the paths given on the command line into upload files.
///
/// Explicit file paths are kept as given, whatever their extension, so the
/// backend's rejection surfaces as a per-file failure. Directories are
/// walked recursively and only files with an allowed extension are picked
/// up, in sorted order.
pub fn collect_upload_files(paths: &[PathBuf]) -> Result<Vec<UploadFile>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(UploadFile::from_path(path)?);
        } else if path.is_dir() {
            let mut found: Vec<UploadFile> = Vec::new();
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let file = UploadFile::from_path(entry.path())?;
                if file.is_allowed() {
                    found.push(file);
                } else {
                    tracing::debug!("skipping {}: unsupported type", entry.path().display());
                }
            }
            files.extend(found);
        } else {
            bail!("No such file or directory: {}", path.display());
        }
    }
    Ok(files)
}

/// Outcome counters for a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Ordered upload queue with at most one file in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadQueue {
    files: Vec<UploadFile>,
    next: usize,
    in_flight: Option<usize>,
    succeeded: usize,
    failed: usize,
}

impl UploadQueue {
    pub fn new(files: Vec<UploadFile>) -> Self {
        Self {
            files,
            next: 0,
            in_flight: None,
            succeeded: 0,
            failed: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.files.len()
    }

    pub fn completed(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Percentage of files settled, never decreasing.
    pub fn percent(&self) -> u8 {
        if self.files.is_empty() {
            return 100;
        }
        ((self.completed() * 100) / self.files.len()) as u8
    }

    /// Start the next file. Returns its 1-based position and the file, or
    /// `None` if a file is already in flight or the queue is drained.
    pub fn start_next(&mut self) -> Option<(usize, UploadFile)> {
        if self.in_flight.is_some() || self.next >= self.files.len() {
            return None;
        }
        let idx = self.next;
        self.next += 1;
        self.in_flight = Some(idx);
        Some((idx + 1, self.files[idx].clone()))
    }

    /// Settle the in-flight file. Returns it, or `None` if nothing was in flight.
    pub fn settle(&mut self, success: bool) -> Option<&UploadFile> {
        let idx = self.in_flight.take()?;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.files.get(idx)
    }

    pub fn in_flight(&self) -> Option<(usize, &UploadFile)> {
        self.in_flight.map(|idx| (idx + 1, &self.files[idx]))
    }

    pub fn is_finished(&self) -> bool {
        self.in_flight.is_none() && self.next >= self.files.len()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            total: self.files.len(),
            succeeded: self.succeeded,
            failed: self.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn file(name: &str) -> UploadFile {
        UploadFile {
            filename: name.to_string(),
            path: PathBuf::from(name),
        }
    }

    #[test]
    fn queue_hands_out_one_at_a_time() {
        let mut q = UploadQueue::new(vec![file("a.pdf"), file("b.pdf"), file("c.pdf")]);
        let (idx, f) = q.start_next().unwrap();
        assert_eq!((idx, f.filename.as_str()), (1, "a.pdf"));
        assert!(q.start_next().is_none(), "second start while in flight");

        assert_eq!(q.settle(true).unwrap().filename, "a.pdf");
        assert_eq!(q.percent(), 33);
        assert!(q.settle(true).is_none(), "nothing left in flight");

        let (idx, _) = q.start_next().unwrap();
        assert_eq!(idx, 2);
        q.settle(false);
        assert_eq!(q.percent(), 66);

        let (idx, _) = q.start_next().unwrap();
        assert_eq!(idx, 3);
        assert!(!q.is_finished());
        q.settle(true);
        assert!(q.is_finished());
        assert_eq!(q.percent(), 100);
        assert_eq!(
            q.summary(),
            BatchSummary {
                total: 3,
                succeeded: 2,
                failed: 1
            }
        );
    }

    #[test]
    fn percent_is_monotonic() {
        let mut q = UploadQueue::new((0..7).map(|i| file(&format!("{i}.pdf"))).collect());
        let mut last = q.percent();
        while q.start_next().is_some() {
            q.settle(q.completed() % 2 == 0);
            assert!(q.percent() >= last);
            last = q.percent();
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn extension_and_mime() {
        let f = file("Report.PDF");
        assert_eq!(f.extension(), ".pdf");
        assert!(f.is_allowed());
        assert_eq!(f.mime_type(), "application/pdf");
        assert!(!file("notes.txt").is_allowed());
        assert_eq!(file("README").extension(), "");
    }

    #[test]
    fn collect_walks_directories_and_keeps_explicit_files() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("docs");
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("b.docx"), b"x").unwrap();
        fs::write(dir.join("a.pdf"), b"x").unwrap();
        fs::write(dir.join("skip.txt"), b"x").unwrap();
        fs::write(dir.join("sub/c.xlsx"), b"x").unwrap();
        let explicit = tmp.path().join("notes.txt");
        fs::write(&explicit, b"x").unwrap();

        let files = collect_upload_files(&[dir, explicit]).unwrap();
        let names: Vec<&str> = files.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.docx", "c.xlsx", "notes.txt"]);
    }

    #[test]
    fn collect_rejects_missing_path() {
        let tmp = TempDir::new().unwrap();
        assert!(collect_upload_files(&[tmp.path().join("nope.pdf")]).is_err());
    }
}
