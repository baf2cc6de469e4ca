//! objcscrape: Objective-C framework headers → type-resolved declaration model.
//!
//! Compiles framework headers with clang (`-ast-dump=json`), extracts classes,
//! protocols, enums and structs from the declaration tree, and maps every
//! native type onto a statically-typed host language.
//!
//! # Quick start
//!
//! Generate the resolved model from a config (suitable for `build.rs`):
//!
//! ```no_run
//! use std::path::Path;
//!
//! // Reads objcscrape.toml, compiles headers, writes declarations.json.
//! objcscrape::run(Path::new("objcscrape.toml"), None).unwrap();
//! ```
//!
//! Or get the JSON bytes without writing to disk:
//!
//! ```no_run
//! use std::path::Path;
//!
//! let json = objcscrape::generate(Path::new("objcscrape.toml")).unwrap();
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

pub mod ast;
pub mod bind;
pub mod config;
pub mod conformance;
pub mod constants;
pub mod error;
pub mod extract;
pub mod host;
pub mod invoke;
pub mod model;
pub mod resolve;
pub mod scheduler;
pub mod source;
pub mod typetext;

use crate::bind::{ResolvedModel, bind, validate_references};
use crate::constants::TableResolver;
use crate::invoke::{ClangFrontend, Frontend};
use crate::model::{BatchTask, Coverage, Model};
use crate::resolve::ResolutionContext;
use crate::scheduler::{BatchOutcome, WorkerPool, run_batches};

/// Run the full pipeline: load config, compile headers, resolve types, and
/// write the resolved model as JSON.
///
/// `config_path` is the path to an `objcscrape.toml` file.
/// `output` optionally overrides the output file path from the config.
///
/// Returns the path the JSON file was written to.
pub fn run(config_path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let json = generate_from_config(&cfg, base_dir)?;

    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => base_dir.join(&cfg.output.file),
    };
    std::fs::write(&output_path, &json)
        .with_context(|| format!("writing output to {}", output_path.display()))?;

    info!(
        path = %output_path.display(),
        size = json.len(),
        "wrote resolved model"
    );

    Ok(output_path)
}

/// Parse an `objcscrape.toml` config file, run the pipeline, and return the
/// resolved model's JSON bytes without writing to disk.
pub fn generate(config_path: &Path) -> Result<Vec<u8>> {
    let cfg = config::load_config(config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    generate_from_config(&cfg, base_dir)
}

/// Generate JSON bytes from an already-loaded [`config::Config`].
///
/// `base_dir` is the directory relative to which header paths in the config
/// are resolved (typically the parent directory of the TOML file).
pub fn generate_from_config(cfg: &config::Config, base_dir: &Path) -> Result<Vec<u8>> {
    let include_paths = absolute_include_paths(cfg, base_dir);
    let frontend = Arc::new(ClangFrontend::new(&cfg.compiler, &include_paths));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting async runtime")?;
    let resolved = runtime.block_on(resolve_with_frontend(cfg, base_dir, frontend))?;

    let json = resolved.to_json().context("serializing resolved model")?;
    info!(size = json.len(), "generated resolved model");
    Ok(json)
}

/// The pipeline behind [`generate_from_config`], with the compiler frontend
/// supplied by the caller. Must run inside a tokio runtime.
pub async fn resolve_with_frontend(
    cfg: &config::Config,
    base_dir: &Path,
    frontend: Arc<dyn Frontend>,
) -> Result<ResolvedModel> {
    info!(frameworks = cfg.framework.len(), "loaded configuration");

    let include_paths = absolute_include_paths(cfg, base_dir);
    let tasks: Vec<BatchTask> = cfg
        .framework
        .iter()
        .map(|f| f.batch_task(base_dir, &include_paths, &cfg.compiler))
        .collect();

    let model = extract_model(frontend, tasks, cfg.compiler.worker_count()).await;

    // Conformance and resolution only start once every batch is merged.
    let ctx = ResolutionContext::from_model(&model, cfg.struct_fields.clone());
    let constants = TableResolver::new(cfg.string_constants.clone());
    let resolved = bind(&model, &ctx, &constants);

    validate_references(&resolved).context("validating cross-references")?;

    info!(
        classes = resolved.classes.len(),
        protocols = resolved.protocols.len(),
        integer_enums = resolved.integer_enums.len(),
        string_enums = resolved.string_enums.len(),
        structs = resolved.structs.len(),
        "resolved model"
    );
    Ok(resolved)
}

/// Run every batch through a worker pool and merge the results.
pub async fn extract_model(
    frontend: Arc<dyn Frontend>,
    tasks: Vec<BatchTask>,
    workers: usize,
) -> Model {
    let pool = WorkerPool::new(frontend, workers);
    let outcomes = run_batches(pool, tasks).await;
    merge_outcomes(outcomes)
}

/// Merge batch outcomes by name and record per-framework coverage. Failed
/// batches are logged and counted, never fatal.
pub fn merge_outcomes(outcomes: Vec<BatchOutcome>) -> Model {
    let mut model = Model::default();
    for outcome in outcomes {
        match outcome.result {
            Ok(result) => {
                let coverage = Coverage::from_result(&result);
                log_coverage(&coverage, result.used_fallback);
                model.coverage.push(coverage);
                model.absorb(result);
            }
            Err(e) => {
                warn!(
                    framework = %outcome.framework,
                    error = %e,
                    "batch failed; rerun this framework alone to reproduce"
                );
                model
                    .coverage
                    .push(Coverage::failed(&outcome.framework, &outcome.targets));
            }
        }
    }
    model.coverage.sort_by(|a, b| a.framework.cmp(&b.framework));
    model
}

fn log_coverage(c: &Coverage, used_fallback: bool) {
    let ratio = |(found, expected): (usize, usize)| format!("{found}/{expected}");
    info!(
        framework = %c.framework,
        classes = %ratio(c.classes),
        protocols = %ratio(c.protocols),
        integer_enums = %ratio(c.integer_enums),
        string_enums = %ratio(c.string_enums),
        used_fallback,
        "framework coverage"
    );
}

fn absolute_include_paths(cfg: &config::Config, base_dir: &Path) -> Vec<PathBuf> {
    cfg.include_paths
        .iter()
        .map(|p| {
            if p.is_absolute() {
                p.clone()
            } else {
                base_dir.join(p)
            }
        })
        .collect()
}
