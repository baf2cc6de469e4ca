//! Compiler invoker: runs clang and hands back a filtered declaration tree.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::ast::DeclarationTree;
use crate::config::CompilerConfig;
use crate::error::InvokeError;
use crate::model::BatchTask;

/// Lines of compiler stderr kept in error reports.
const STDERR_TAIL_LINES: usize = 20;

/// How framework headers are brought into the compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// `-fmodules`: headers resolve their imports through module maps.
    Modules,
    /// Headers compiled textually after force-including the pre-include stack.
    PreInclude,
}

/// One compiler invocation.
#[derive(Debug, Clone)]
pub struct ParseRequest {
    pub framework: String,
    pub headers: Vec<PathBuf>,
    pub pre_includes: Vec<PathBuf>,
    pub mode: Mode,
    pub args: Vec<String>,
}

impl ParseRequest {
    pub fn new(task: &BatchTask, mode: Mode) -> Self {
        Self {
            framework: task.framework.clone(),
            headers: task.headers.clone(),
            pre_includes: match mode {
                Mode::Modules => Vec::new(),
                Mode::PreInclude => task.pre_includes.clone(),
            },
            mode,
            args: task.clang_args.clone(),
        }
    }
}

/// Anything that can turn headers into a declaration tree.
#[async_trait]
pub trait Frontend: Send + Sync {
    async fn parse(&self, request: &ParseRequest) -> Result<DeclarationTree, InvokeError>;
}

/// Production frontend: spawns `clang -Xclang -ast-dump=json`.
#[derive(Debug, Clone)]
pub struct ClangFrontend {
    program: PathBuf,
    sysroot: Option<PathBuf>,
    target: Option<String>,
    include_paths: Vec<PathBuf>,
    args: Vec<String>,
}

impl ClangFrontend {
    pub fn new(compiler: &CompilerConfig, include_paths: &[PathBuf]) -> Self {
        Self {
            program: compiler.path.clone(),
            sysroot: compiler.sysroot.clone(),
            target: compiler.target.clone(),
            include_paths: include_paths.to_vec(),
            args: compiler.args.clone(),
        }
    }

    /// Full argument list for compiling `unit` under `request`.
    pub fn command_args(&self, request: &ParseRequest, unit: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-x",
            "objective-c",
            "-fsyntax-only",
            "-Xclang",
            "-ast-dump=json",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();

        match request.mode {
            Mode::Modules => args.push("-fmodules".into()),
            Mode::PreInclude => {
                for p in &request.pre_includes {
                    args.push("-include".into());
                    args.push(p.into());
                }
            }
        }
        if let Some(sysroot) = &self.sysroot {
            args.push("-isysroot".into());
            args.push(sysroot.into());
        }
        if let Some(target) = &self.target {
            args.push("-target".into());
            args.push(target.into());
        }
        for inc in &self.include_paths {
            let mut flag = OsString::from("-I");
            flag.push(inc);
            args.push(flag);
        }
        args.extend(self.args.iter().map(OsString::from));
        args.extend(request.args.iter().map(OsString::from));
        args.push(unit.into());
        args
    }
}

/// Contents of a synthetic unit that imports every header in order.
pub fn synthetic_unit(headers: &[PathBuf]) -> String {
    let mut content = String::new();
    for h in headers {
        content.push_str(&format!("#import \"{}\"\n", h.display()));
    }
    content
}

#[async_trait]
impl Frontend for ClangFrontend {
    async fn parse(&self, request: &ParseRequest) -> Result<DeclarationTree, InvokeError> {
        // The temp file must outlive the compiler process.
        let mut wrapper = None;
        let unit = match request.headers.as_slice() {
            [single] => single.clone(),
            headers => {
                let mut file = tempfile::Builder::new()
                    .prefix(&format!("objcscrape_{}_", request.framework))
                    .suffix(".m")
                    .tempfile()?;
                file.write_all(synthetic_unit(headers).as_bytes())?;
                file.flush()?;
                let path = file.path().to_path_buf();
                wrapper = Some(file);
                path
            }
        };

        let args = self.command_args(request, &unit);
        debug!(
            framework = %request.framework,
            mode = ?request.mode,
            headers = request.headers.len(),
            "invoking compiler"
        );

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| InvokeError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;
        drop(wrapper);

        let status = output.status;
        let stderr = stderr_tail(&output.stderr);
        if output.stdout.is_empty() {
            return Err(InvokeError::Failed { status, stderr });
        }

        let stdout = output.stdout;
        let size = stdout.len();
        let parsed = tokio::task::spawn_blocking(move || DeclarationTree::from_json(&stdout))
            .await
            .map_err(|e| InvokeError::Interrupted(e.to_string()))?;

        match parsed {
            Ok(tree) => {
                if !status.success() {
                    warn!(
                        framework = %request.framework,
                        %status,
                        stderr = %stderr,
                        "compiler reported errors but produced a declaration tree"
                    );
                }
                debug!(framework = %request.framework, bytes = size, decls = tree.len(), "parsed declaration tree");
                Ok(tree)
            }
            Err(_) if !status.success() => Err(InvokeError::Failed { status, stderr }),
            Err(e) => Err(e.into()),
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
