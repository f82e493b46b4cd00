//! Command-line driver: compiles a directory of XML instruction descriptions into an
//! instruction table and writes it as JSON, a C++ header, or a summary.
//!
//! Exit status is 0 on success, 1 on a fatal error, and 2 when the skip policy left at least
//! one source file out of an otherwise written table.

use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, ValueEnum};
use log::{error, info};

use insttab::isa::table::{emit, format};
use insttab::{FailurePolicy, InstError, PipelineConfig, TableHandle, TableList};

#[derive(Parser, Debug)]
#[command(
    name = "insttab",
    version,
    about = "Compile XML instruction descriptions into instruction tables"
)]
struct Cli {
    /// Directory of XML sources (overrides `source_dir` from the config file).
    source_dir: Option<PathBuf>,

    /// TOML pipeline configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// What to do when a source file fails to parse.
    #[arg(long, value_enum)]
    policy: Option<PolicyArg>,

    /// Source file extension; an empty string accepts every file.
    #[arg(long)]
    ext: Option<String>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,

    /// Output file; stdout when omitted.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Namespace for the C++ header.
    #[arg(long, default_value = "inst_table")]
    namespace: String,

    /// Print the SHA-256 fingerprint of the JSON table instead of the table.
    #[arg(long)]
    fingerprint: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    Abort,
    Skip,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Abort => FailurePolicy::Abort,
            PolicyArg::Skip => FailurePolicy::Skip,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Cpp,
    Summary,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            error!("{err}");
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32, InstError> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = cli.source_dir {
        config.source_dir = dir;
    }
    if let Some(policy) = cli.policy {
        config.failure_policy = policy.into();
    }
    if let Some(ext) = cli.ext {
        config.extension = ext.trim_start_matches('.').to_string();
    }

    let handle = TableHandle::from_config(config)?;
    let rendered = if cli.fingerprint {
        format!("{}\n", emit::fingerprint_hex(handle.table())?)
    } else {
        render(handle.table(), cli.format, &cli.namespace)?
    };

    match &cli.output {
        Some(path) => {
            fs::write(path, rendered).map_err(|source| InstError::Io {
                path: path.clone(),
                source,
            })?;
            info!("wrote {}", path.display());
        }
        None => print!("{rendered}"),
    }

    if handle.failures().is_empty() {
        Ok(0)
    } else {
        for failure in handle.failures() {
            error!("excluded {}: {}", failure.path.display(), failure.error);
        }
        Ok(2)
    }
}

fn render(table: &TableList, kind: OutputFormat, namespace: &str) -> Result<String, InstError> {
    match kind {
        OutputFormat::Json => emit::to_json(table).map(|mut json| {
            json.push('\n');
            json
        }),
        OutputFormat::Cpp => format::render_cpp_header(table, namespace),
        OutputFormat::Summary => Ok(format::render_summary(table)),
    }
}
