// ABOUTME: Local tool executor confined to a single workspace root
// ABOUTME: File read/write/list and shell commands on behalf of approved remote tool calls

use crate::error::ToolError;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::process::Command as ProcessCommand;
use tracing::{debug, warn};

/// Wall-clock limit for `run_command`.
pub const COMMAND_TIMEOUT_SECS: u64 = 30;

/// Captured output of a finished command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// A served tool request, parsed from its wire name and arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalTool {
    ReadFile { file_path: String },
    ListFiles { dir_path: Option<String> },
    RunCommand { command: String, cwd: Option<String> },
    WriteFile { file_path: String, content: String },
}

impl LocalTool {
    /// Map a tool name and its argument object to a typed request.
    pub fn from_request(name: &str, args: &Map<String, Value>) -> Result<Self, ToolError> {
        let required = |key: &str| -> Result<String, ToolError> {
            args.get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| ToolError::InvalidArguments {
                    tool: name.to_string(),
                    message: format!("missing string argument '{key}'"),
                })
        };
        let optional = |key: &str| -> Option<String> {
            args.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match name {
            "read_file" => Ok(LocalTool::ReadFile {
                file_path: required("file_path")?,
            }),
            "list_files" => Ok(LocalTool::ListFiles {
                dir_path: optional("dir_path"),
            }),
            "run_command" => Ok(LocalTool::RunCommand {
                command: required("command")?,
                cwd: optional("cwd"),
            }),
            "write_file" => Ok(LocalTool::WriteFile {
                file_path: required("file_path")?,
                content: required("content")?,
            }),
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LocalTool::ReadFile { .. } => "read_file",
            LocalTool::ListFiles { .. } => "list_files",
            LocalTool::RunCommand { .. } => "run_command",
            LocalTool::WriteFile { .. } => "write_file",
        }
    }
}

/// Executes tool requests inside one workspace root.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    root: Option<PathBuf>,
    command_timeout_secs: u64,
}

impl ToolExecutor {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self {
            root,
            command_timeout_secs: COMMAND_TIMEOUT_SECS,
        }
    }

    pub fn with_command_timeout(mut self, secs: u64) -> Self {
        self.command_timeout_secs = secs;
        self
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    fn canonical_root(&self) -> Result<PathBuf, ToolError> {
        let root = self.root.as_ref().ok_or(ToolError::NoWorkspace)?;
        root.canonicalize().map_err(|e| ToolError::io(root, e))
    }

    /// Resolve `path` against the workspace root and enforce containment.
    ///
    /// Symlinks in the existing part of the path are followed before the
    /// check, so a link pointing out of the workspace is rejected too. A
    /// dangling link counts as existing and is rejected when it cannot be
    /// canonicalized.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, ToolError> {
        let root = self.canonical_root()?;
        let normalized = normalize_lexically(&root.join(path));

        // Canonicalize the deepest entry that exists, then re-append the rest.
        // Only names with no directory entry at all land in the tail.
        let mut existing = normalized.as_path();
        let mut tail: Vec<&std::ffi::OsStr> = Vec::new();
        while is_absent(existing) {
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    tail.push(name);
                    existing = parent;
                }
                _ => break,
            }
        }

        let mut resolved = match existing.canonicalize() {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(path = %path, error = %e, "Rejected unresolvable path");
                return Err(ToolError::OutsideWorkspace(path.to_string()));
            }
        };
        for name in tail.iter().rev() {
            resolved.push(name);
        }

        if !resolved.starts_with(&root) {
            warn!(path = %path, "Rejected path outside workspace");
            return Err(ToolError::OutsideWorkspace(path.to_string()));
        }
        Ok(resolved)
    }

    pub async fn read_file(&self, path: &str) -> Result<String, ToolError> {
        let resolved = self.resolve(path)?;
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::io(&resolved, e))?;
        debug!(path = %path, len = content.len(), "Read file");
        Ok(content)
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), ToolError> {
        let resolved = self.resolve(path)?;
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::io(parent, e))?;
        }
        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| ToolError::io(&resolved, e))?;
        debug!(path = %path, len = content.len(), "Wrote file");
        Ok(())
    }

    /// List a directory (the root when `dir` is `None`). Directories carry a
    /// trailing `/`; names are sorted.
    pub async fn list_files(&self, dir: Option<&str>) -> Result<Vec<String>, ToolError> {
        let resolved = self.resolve(dir.unwrap_or("."))?;
        let mut entries = tokio::fs::read_dir(&resolved)
            .await
            .map_err(|e| ToolError::io(&resolved, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ToolError::io(&resolved, e))?
        {
            let mut name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if is_dir {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Run a shell command in `cwd` (the root when `None`) under a hard timeout.
    pub async fn run_command(
        &self,
        command: &str,
        cwd: Option<&str>,
    ) -> Result<CommandOutput, ToolError> {
        let dir = self.resolve(cwd.unwrap_or("."))?;

        let mut cmd = shell_command(command);
        cmd.current_dir(&dir)
            .stdin(std::process::Stdio::null())
            .kill_on_drop(true);

        debug!(command = %command, cwd = %dir.display(), "Running command");

        let timeout = Duration::from_secs(self.command_timeout_secs);
        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ToolError::io(&dir, e)),
            Err(_) => {
                warn!(command = %command, timeout_secs = self.command_timeout_secs, "Command timed out");
                return Err(ToolError::Timeout(self.command_timeout_secs));
            }
        };

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code(),
        };

        if !output.status.success() {
            return Err(ToolError::CommandFailed {
                code: result.exit_code,
                stdout: result.stdout,
                stderr: result.stderr,
            });
        }
        Ok(result)
    }

    /// Execute a parsed tool request, producing the JSON result returned to the gateway.
    pub async fn execute(&self, tool: LocalTool) -> Result<Value, ToolError> {
        match tool {
            LocalTool::ReadFile { file_path } => {
                Ok(Value::String(self.read_file(&file_path).await?))
            }
            LocalTool::ListFiles { dir_path } => {
                Ok(json!(self.list_files(dir_path.as_deref()).await?))
            }
            LocalTool::RunCommand { command, cwd } => {
                let output = self.run_command(&command, cwd.as_deref()).await?;
                serde_json::to_value(output).map_err(|e| ToolError::InvalidArguments {
                    tool: "run_command".to_string(),
                    message: e.to_string(),
                })
            }
            LocalTool::WriteFile { file_path, content } => {
                self.write_file(&file_path, &content).await?;
                Ok(json!({"written": file_path, "bytes": content.len()}))
            }
        }
    }
}

#[cfg(windows)]
fn shell_command(command: &str) -> ProcessCommand {
    let mut cmd = ProcessCommand::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> ProcessCommand {
    let mut cmd = ProcessCommand::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

/// True when `path` has no directory entry. Unlike `Path::exists`, a dangling
/// symlink is an entry.
fn is_absent(path: &Path) -> bool {
    matches!(path.symlink_metadata(), Err(e) if e.kind() == std::io::ErrorKind::NotFound)
}

/// Collapse `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/ws/a/./b/../c")),
            PathBuf::from("/ws/a/c")
        );
        assert_eq!(
            normalize_lexically(Path::new("/ws/../../etc/passwd")),
            PathBuf::from("/etc/passwd")
        );
    }

    #[test]
    fn test_from_request_maps_names() {
        let mut args = Map::new();
        args.insert("file_path".into(), json!("src/lib.rs"));
        assert_eq!(
            LocalTool::from_request("read_file", &args).unwrap(),
            LocalTool::ReadFile {
                file_path: "src/lib.rs".into()
            }
        );

        let empty = Map::new();
        assert_eq!(
            LocalTool::from_request("list_files", &empty).unwrap(),
            LocalTool::ListFiles { dir_path: None }
        );
    }

    #[test]
    fn test_from_request_unknown_tool() {
        let result = LocalTool::from_request("delete_everything", &Map::new());
        assert!(matches!(result, Err(ToolError::UnknownTool(name)) if name == "delete_everything"));
    }

    #[test]
    fn test_from_request_missing_argument() {
        let result = LocalTool::from_request("write_file", &Map::new());
        assert!(matches!(result, Err(ToolError::InvalidArguments { .. })));
    }

    #[tokio::test]
    async fn test_no_workspace() {
        let executor = ToolExecutor::new(None);
        assert!(matches!(
            executor.read_file("a.txt").await,
            Err(ToolError::NoWorkspace)
        ));
        assert!(matches!(
            executor.run_command("echo hi", None).await,
            Err(ToolError::NoWorkspace)
        ));
    }
}
