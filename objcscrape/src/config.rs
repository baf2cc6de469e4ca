//! Configuration types for `objcscrape.toml`.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::model::{BatchTask, Targets};

/// Hard ceiling on concurrent compiler invocations.
pub const MAX_WORKERS: usize = 8;

/// Root configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    /// Additional directories to search when resolving header paths.  Each
    /// entry is tried in order after `base_dir` (the TOML file's parent
    /// directory).  Also injected as `-I` flags for clang.
    #[serde(default)]
    pub include_paths: Vec<PathBuf>,
    #[serde(default)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub framework: Vec<FrameworkConfig>,
    /// Struct name → ordered field names, used when the compiler only gives
    /// us positional fields.
    #[serde(default)]
    pub struct_fields: HashMap<String, Vec<String>>,
    /// Exported symbol → string value, consulted for string enum members.
    #[serde(default)]
    pub string_constants: HashMap<String, String>,
}

/// Output file settings.
#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    /// Resolved-model JSON path (e.g. `declarations.json`).
    #[serde(default = "default_output_file")]
    pub file: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: default_output_file(),
        }
    }
}

fn default_output_file() -> PathBuf {
    PathBuf::from("declarations.json")
}

/// How to run the compiler frontend.
#[derive(Debug, Deserialize)]
pub struct CompilerConfig {
    /// Compiler executable (default `clang`, looked up on `PATH`).
    #[serde(default = "default_compiler")]
    pub path: PathBuf,
    /// SDK root passed as `-isysroot`.
    #[serde(default)]
    pub sysroot: Option<PathBuf>,
    /// Target triple passed as `-target`.
    #[serde(default)]
    pub target: Option<String>,
    /// Extra arguments applied to **every** invocation.  Per-framework
    /// `clang_args` are appended after these.
    #[serde(default)]
    pub args: Vec<String>,
    /// Headers force-included in pre-include fallback mode unless a
    /// framework lists its own.
    #[serde(default)]
    pub pre_includes: Vec<PathBuf>,
    /// Optional worker cap.  Never exceeds [`MAX_WORKERS`].
    #[serde(default)]
    pub max_workers: Option<usize>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            path: default_compiler(),
            sysroot: None,
            target: None,
            args: Vec::new(),
            pre_includes: Vec::new(),
            max_workers: None,
        }
    }
}

fn default_compiler() -> PathBuf {
    PathBuf::from("clang")
}

impl CompilerConfig {
    /// Worker count: available parallelism, capped by the config and by
    /// [`MAX_WORKERS`].  Always at least one.
    pub fn worker_count(&self) -> usize {
        let available = std::thread::available_parallelism().map_or(1, |n| n.get());
        let cap = self.max_workers.unwrap_or(MAX_WORKERS).min(MAX_WORKERS);
        available.min(cap).max(1)
    }
}

/// A single framework: a set of headers compiled as one batch, and the
/// declaration names discovery found in them.
#[derive(Debug, Deserialize)]
pub struct FrameworkConfig {
    /// Logical framework name (e.g. `Foundation`).
    pub name: String,
    /// Headers to compile.
    pub headers: Vec<PathBuf>,
    /// Framework binary, used to look up exported string constants.
    #[serde(default)]
    pub binary: Option<PathBuf>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub integer_enums: Vec<String>,
    #[serde(default)]
    pub string_enums: Vec<String>,
    /// Overrides `[compiler] pre_includes` for this framework.
    #[serde(default)]
    pub pre_includes: Option<Vec<PathBuf>>,
    /// Extra clang arguments (e.g. `-DFOO`).
    #[serde(default)]
    pub clang_args: Vec<String>,
}

impl FrameworkConfig {
    /// Requested declaration names, de-duplicated.
    pub fn targets(&self) -> Targets {
        Targets {
            classes: self.classes.iter().cloned().collect(),
            protocols: self.protocols.iter().cloned().collect(),
            integer_enums: self.integer_enums.iter().cloned().collect(),
            string_enums: self.string_enums.iter().cloned().collect(),
        }
    }

    /// Build the worker-pool task for this framework, with every path
    /// resolved against `base_dir` and `include_paths`.
    pub fn batch_task(
        &self,
        base_dir: &Path,
        include_paths: &[PathBuf],
        compiler: &CompilerConfig,
    ) -> BatchTask {
        let resolve = |p: &PathBuf| resolve_header(p, base_dir, include_paths);
        let pre_includes = self
            .pre_includes
            .as_ref()
            .unwrap_or(&compiler.pre_includes)
            .iter()
            .map(resolve)
            .collect();
        BatchTask {
            framework: self.name.clone(),
            headers: self.headers.iter().map(resolve).collect(),
            targets: self.targets(),
            pre_includes,
            clang_args: self.clang_args.clone(),
            binary: self.binary.as_ref().map(|b| base_dir.join(b)),
        }
    }
}

/// Resolve a header path by searching `base_dir` first, then each
/// `include_paths` entry.  Absolute paths are returned as-is.  If the
/// file is not found anywhere, falls back to `base_dir.join(path)` so
/// that the caller gets a meaningful error from clang.
pub fn resolve_header(path: &Path, base_dir: &Path, include_paths: &[PathBuf]) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    let candidate = base_dir.join(path);
    if candidate.exists() {
        return candidate;
    }
    for inc in include_paths {
        let candidate = inc.join(path);
        if candidate.exists() {
            return candidate;
        }
    }
    base_dir.join(path)
}

/// Load and parse an `objcscrape.toml` configuration file.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let config: Config = toml::from_str(&content)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {}", path.display(), e))?;
    Ok(config)
}
