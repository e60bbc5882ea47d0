//! Writes file records into the conventional layout.
//!
//! Deployment is best effort: a record that cannot be placed or written
//! is skipped and reported, and the remaining records are still written.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::FileRecord;
use crate::deploy::layout::{self, DEFAULT_MANIFEST, MANIFEST_FILE};
use crate::{slog, slog_debug, slog_error, slog_warn, Error, Result};

/// What to do when two records resolve to the same target file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Every record is written in order; the last one wins.
    #[default]
    LastWriteWins,
    /// The first record is written; later ones are skipped with
    /// [`Error::DuplicatePath`].
    Reject,
}

/// A record that was not written, and why.
#[derive(Debug)]
pub struct SkippedRecord {
    pub path: String,
    pub error: Error,
}

/// Outcome of one deployment.
#[derive(Debug)]
pub struct DeployReport {
    pub root: PathBuf,
    /// Root-relative paths that were written.
    pub written: BTreeSet<PathBuf>,
    pub skipped: Vec<SkippedRecord>,
    /// Root-relative path of a manifest synthesized by this deployment.
    pub manifest: Option<PathBuf>,
}

impl DeployReport {
    fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            written: BTreeSet::new(),
            skipped: Vec::new(),
            manifest: None,
        }
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// True when nothing at all was written.
    pub fn is_total_failure(&self) -> bool {
        self.written.is_empty()
    }

    /// Turn a total failure into [`Error::NothingDeployed`].
    pub fn into_result(self) -> Result<Self> {
        if self.is_total_failure() {
            Err(Error::NothingDeployed { root: self.root })
        } else {
            Ok(self)
        }
    }
}

/// Deploys records beneath a root directory.
#[derive(Debug, Clone)]
pub struct Deployer {
    root: PathBuf,
    duplicates: DuplicatePolicy,
}

impl Deployer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            duplicates: DuplicatePolicy::default(),
        }
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    /// Write every record, skipping the ones that fail.
    ///
    /// Never returns an error; check [`DeployReport::is_total_failure`].
    pub fn deploy(&self, records: &[FileRecord]) -> DeployReport {
        slog!(
            "Deploying {} records to {}",
            records.len(),
            self.root.display()
        );
        let mut report = DeployReport::new(&self.root);
        let mut seen: HashSet<String> = HashSet::new();

        for record in records {
            match self.write_record(record, &seen) {
                Ok(target) => {
                    slog_debug!("Wrote {} -> {}", record.path, target);
                    report.written.insert(PathBuf::from(&target));
                    seen.insert(target);
                }
                Err(error) => {
                    slog_warn!("Skipped record {:?}: {}", record.path, error);
                    report.skipped.push(SkippedRecord {
                        path: record.path.clone(),
                        error,
                    });
                }
            }
        }

        if report.is_total_failure() {
            slog_error!("Deployment to {} produced no files", self.root.display());
            return report;
        }

        match self.ensure_manifest() {
            Ok(manifest) => report.manifest = manifest,
            Err(e) => slog_warn!("Could not write {}: {}", MANIFEST_FILE, e),
        }

        slog!(
            "Deployed {} files ({} skipped)",
            report.written.len(),
            report.skipped_count()
        );
        report
    }

    fn write_record(&self, record: &FileRecord, seen: &HashSet<String>) -> Result<String> {
        let target = layout::resolve(&record.path)?;
        if self.duplicates == DuplicatePolicy::Reject && seen.contains(&target) {
            return Err(Error::DuplicatePath(target));
        }

        let full = self.root.join(&target);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|source| Error::WriteFailed {
                path: full.clone(),
                source,
            })?;
        }
        fs::write(&full, record.content.trim())
            .map_err(|source| Error::WriteFailed { path: full, source })?;
        Ok(target)
    }

    /// Write the default manifest unless one already exists.
    fn ensure_manifest(&self) -> Result<Option<PathBuf>> {
        let path = self.root.join(MANIFEST_FILE);
        if path.exists() {
            return Ok(None);
        }
        fs::write(&path, DEFAULT_MANIFEST).map_err(|source| Error::WriteFailed {
            path: path.clone(),
            source,
        })?;
        slog_debug!("Synthesized {}", path.display());
        Ok(Some(PathBuf::from(MANIFEST_FILE)))
    }
}

/// Deploy with the default last-write-wins policy.
pub fn deploy(records: &[FileRecord], root: &Path) -> DeployReport {
    Deployer::new(root).deploy(records)
}
