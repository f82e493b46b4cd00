//! Public entry point that runs the whole pipeline: enumerate, parse, aggregate, tabulate.

use std::path::PathBuf;

use log::info;

use super::diagnostic::InstDiagnostic;
use super::error::InstError;
use super::table::{TableGenerator, TableList};
use crate::config::PipelineConfig;
use crate::loader::xml::{LoadFailure, XmlLoader};

pub struct TableHandle {
    table: TableList,
    failures: Vec<LoadFailure>,
    warnings: Vec<InstDiagnostic>,
}

impl TableHandle {
    /// Loads every source file under `config.source_dir` and generates the table-list.
    ///
    /// Per-file failures follow `config.failure_policy`; table generation errors are always
    /// fatal and no table is returned.
    pub fn from_config(config: PipelineConfig) -> Result<Self, InstError> {
        config.validate()?;
        let generator = TableGenerator::new(config.word_widths.clone());
        let report = XmlLoader::new(config).load_all()?;
        let table = generator.generate(&report.roots)?;
        info!(
            "generated {} instruction(s) from {} file(s), {} excluded",
            table.len(),
            table.roots().len(),
            report.failures.len()
        );
        Ok(Self {
            table,
            failures: report.failures,
            warnings: report.warnings,
        })
    }

    /// [`TableHandle::from_config`] with default settings for `source_dir`.
    pub fn from_dir<P: Into<PathBuf>>(source_dir: P) -> Result<Self, InstError> {
        Self::from_config(PipelineConfig::new(source_dir))
    }

    pub fn table(&self) -> &TableList {
        &self.table
    }

    /// Files left out under the skip policy.
    pub fn failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    pub fn warnings(&self) -> &[InstDiagnostic] {
        &self.warnings
    }

    pub fn into_table(self) -> TableList {
        self.table
    }
}
