//! Loading pipeline that enumerates a source directory, parses each file, and collects Roots
//! under the configured failure policy.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use super::schema::map_document;
use super::tree::parse_document;
use crate::config::{FailurePolicy, PipelineConfig};
use crate::isa::ast::Root;
use crate::isa::diagnostic::InstDiagnostic;
use crate::isa::error::InstError;
use crate::isa::validator::Validator;

/// A source file left out of the run under [`FailurePolicy::Skip`].
#[derive(Debug)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: InstError,
}

/// Outcome of loading a whole source directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Successfully loaded Roots in file-name order.
    pub roots: Vec<Root>,
    pub failures: Vec<LoadFailure>,
    pub warnings: Vec<InstDiagnostic>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct XmlLoader {
    config: PipelineConfig,
}

impl XmlLoader {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Regular files directly inside the source directory that carry the configured extension,
    /// sorted by file name.
    pub fn list_sources(&self) -> Result<Vec<PathBuf>, InstError> {
        let dir = &self.config.source_dir;
        let io_err = |source| InstError::Io {
            path: dir.clone(),
            source,
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if !path.is_file() {
                debug!("skipping non-file entry {}", path.display());
                continue;
            }
            if !self.config.accepts_extension(&path) {
                debug!(
                    "skipping {} (extension filter '{}')",
                    path.display(),
                    self.config.extension
                );
                continue;
            }
            files.push(path);
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        debug!("found {} source file(s) in {}", files.len(), dir.display());
        Ok(files)
    }

    /// Loads every source file in order, honouring the failure policy.
    pub fn load_all(&self) -> Result<LoadReport, InstError> {
        let mut report = LoadReport::default();
        for path in self.list_sources()? {
            match self.load_with_warnings(&path) {
                Ok((root, mut warnings)) => {
                    report.roots.push(root);
                    report.warnings.append(&mut warnings);
                }
                Err(err) => match self.config.failure_policy {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::Skip => {
                        warn!("excluding {} from the table", path.display());
                        report.failures.push(LoadFailure { path, error: err });
                    }
                },
            }
        }
        Ok(report)
    }

    /// Parses, maps and validates one file, logging a status line either way.
    pub fn load_file(&self, path: &Path) -> Result<Root, InstError> {
        self.load_with_warnings(path).map(|(root, _)| root)
    }

    /// Same as [`XmlLoader::load_file`] for in-memory content attributed to `path`.
    pub fn load_str(&self, path: &Path, src: &str) -> Result<Root, InstError> {
        self.finish(path, self.parse_str(path, src))
            .map(|(root, _)| root)
    }

    fn load_with_warnings(&self, path: &Path) -> Result<(Root, Vec<InstDiagnostic>), InstError> {
        let outcome = fs::read_to_string(path)
            .map_err(|err| InstError::parse(path, None, format!("cannot read file: {err}")))
            .and_then(|src| self.parse_str(path, &src));
        self.finish(path, outcome)
    }

    fn parse_str(&self, path: &Path, src: &str) -> Result<(Root, Vec<InstDiagnostic>), InstError> {
        let tree = parse_document(path, src)?;
        let root = map_document(path, &tree)?;
        let mut validator = Validator::new(self.config.word_widths.clone());
        validator.validate(&root)?;
        Ok((root, validator.take_warnings()))
    }

    fn finish(
        &self,
        path: &Path,
        outcome: Result<(Root, Vec<InstDiagnostic>), InstError>,
    ) -> Result<(Root, Vec<InstDiagnostic>), InstError> {
        match &outcome {
            Ok((root, warnings)) => {
                for diag in warnings {
                    warn!("{}", diag.format_human());
                }
                info!(
                    "parse {} successful ({} instruction(s))",
                    path.display(),
                    root.instructions.len()
                );
            }
            Err(err) => error!("parse {} failed: {err}", path.display()),
        }
        outcome
    }
}
