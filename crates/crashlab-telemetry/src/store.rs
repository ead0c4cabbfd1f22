//! Local report storage
//!
//! Manages crash report files in `~/.local/share/crashlab/reports/`.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crashlab_core::domain::CrashlabError;

/// Entry in the local report store
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub id: String,
    pub report_type: String,
    pub date: String,
    pub size_bytes: u64,
    pub path: PathBuf,
}

impl ReportEntry {
    fn matches(&self, id: &str) -> bool {
        self.id == id
            || self
                .path
                .file_stem()
                .is_some_and(|stem| stem.to_string_lossy().contains(id))
    }
}

/// Manages the local directory of crash report files.
pub struct LocalReportStore {
    reports_dir: PathBuf,
}

impl LocalReportStore {
    /// Creates a new store pointing at `reports_dir`.
    pub fn new(reports_dir: PathBuf) -> Self {
        Self { reports_dir }
    }

    /// Returns the default reports directory.
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("crashlab")
            .join("reports")
    }

    /// The configured directory, or [`default_dir`](Self::default_dir).
    pub fn resolve_dir(configured: Option<&Path>) -> PathBuf {
        configured.map_or_else(Self::default_dir, Path::to_path_buf)
    }

    /// List all report files, newest first.
    ///
    /// A missing directory is an empty store. Files without a `.json`
    /// extension are skipped.
    pub fn list(&self) -> Result<Vec<ReportEntry>, CrashlabError> {
        let dir = match std::fs::read_dir(&self.reports_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for dirent in dir {
            let dirent = dirent?;
            let path = dirent.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let (report_type, date, id) = parse_report_filename(stem);
            entries.push(ReportEntry {
                id,
                report_type,
                date,
                size_bytes: dirent.metadata()?.len(),
                path,
            });
        }

        entries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        Ok(entries)
    }

    fn find(&self, id: &str) -> Result<Option<ReportEntry>, CrashlabError> {
        Ok(self.list()?.into_iter().find(|e| e.matches(id)))
    }

    /// Read a report by its ID (or any part of its file stem).
    pub fn read(&self, id: &str) -> Result<Option<Value>, CrashlabError> {
        let Some(entry) = self.find(id)? else {
            return Ok(None);
        };
        let raw = std::fs::read(&entry.path)?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    /// Delete a report by its ID. `false` when nothing matched.
    pub fn delete(&self, id: &str) -> Result<bool, CrashlabError> {
        let entry = self.find(id)?;
        if let Some(entry) = &entry {
            std::fs::remove_file(&entry.path)?;
        }
        Ok(entry.is_some())
    }

    /// Delete all reports; returns how many were removed.
    ///
    /// Files that vanish or refuse removal are skipped, not reported.
    pub fn delete_all(&self) -> Result<u32, CrashlabError> {
        let removed = self
            .list()?
            .iter()
            .filter(|entry| std::fs::remove_file(&entry.path).is_ok())
            .count();
        Ok(removed as u32)
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }
}

/// Splits `<type>-<date>-<id>` (e.g. `crash-20260207-a1b2c3d4`).
///
/// Stems that do not follow the pattern keep the whole stem as their id.
fn parse_report_filename(stem: &str) -> (String, String, String) {
    let mut parts = stem.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(kind), Some(date), Some(id)) => (kind.into(), date.into(), id.into()),
        (Some(kind), Some(date), None) => (kind.into(), date.into(), stem.into()),
        _ => ("unknown".into(), String::new(), stem.into()),
    }
}
