//! File read/write/list tools scoped to a workspace root

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, truncate_output, Tool};
use crate::error::ToolError;

const MAX_READ_CHARS: usize = 100_000;

/// Resolve `requested` against `root`, refusing anything that lands outside it.
///
/// Normalisation is lexical so it also works for files that do not exist
/// yet (write targets).
pub fn resolve_path(root: &Path, requested: &str) -> Result<PathBuf, ToolError> {
    let root = absolute_root(root);
    let requested = Path::new(requested.trim());
    let joined = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        root.join(requested)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(ToolError::OutsideRoot(joined.display().to_string()));
                }
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }

    if !normalized.starts_with(&root) {
        return Err(ToolError::OutsideRoot(normalized.display().to_string()));
    }
    Ok(normalized)
}

/// Anchor a relative root (e.g. `.`) at the current directory
fn absolute_root(root: &Path) -> PathBuf {
    let anchored = if root.is_absolute() {
        root.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(root))
            .unwrap_or_else(|_| root.to_path_buf())
    };
    anchored
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Read a text file
pub struct ReadFile {
    root: PathBuf,
}

impl ReadFile {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a text file"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let path = resolve_path(&self.root, required_str(&args, "path")?)?;
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(truncate_output(&content, MAX_READ_CHARS))
    }
}

/// Create or overwrite a file
pub struct WriteFile {
    root: PathBuf,
}

impl WriteFile {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write text to a file, creating it and any parent directories"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "Full file contents"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let path = resolve_path(&self.root, required_str(&args, "path")?)?;
        let content = required_str(&args, "content")?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        Ok(format!("Wrote {} bytes to {}", content.len(), path.display()))
    }
}

/// List a directory's entries
pub struct ListDirectory {
    root: PathBuf,
}

impl ListDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ListDirectory {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and directories at a path; directories end with '/'"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: workspace root)"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let requested = args.get("path").and_then(Value::as_str).unwrap_or(".");
        let path = resolve_path(&self.root, requested)?;

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&path).await?;
        while let Some(entry) = dir.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(format!("{} is empty", path.display()));
        }
        Ok(entries.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let root = Path::new("/work");
        assert_eq!(resolve_path(root, "src/main.rs").unwrap(), PathBuf::from("/work/src/main.rs"));
        assert_eq!(resolve_path(root, "/work/a/../b").unwrap(), PathBuf::from("/work/b"));
        assert_eq!(resolve_path(root, ".").unwrap(), PathBuf::from("/work"));
    }

    #[test]
    fn test_resolve_refuses_escape() {
        let root = Path::new("/work");
        assert!(matches!(resolve_path(root, "../etc/passwd"), Err(ToolError::OutsideRoot(_))));
        assert!(matches!(resolve_path(root, "/etc/passwd"), Err(ToolError::OutsideRoot(_))));
        assert!(matches!(resolve_path(root, "/workshop/x"), Err(ToolError::OutsideRoot(_))));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let write = WriteFile::new(dir.path());
        let read = ReadFile::new(dir.path());

        let msg = write
            .execute(json!({"path": "nested/hello.txt", "content": "hello"}))
            .await
            .unwrap();
        assert!(msg.starts_with("Wrote 5 bytes"));

        let content = read.execute(json!({"path": "nested/hello.txt"})).await.unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn test_read_missing_file_is_error() {
        let dir = tempdir().unwrap();
        let result = ReadFile::new(dir.path()).execute(json!({"path": "nope.txt"})).await;
        assert!(matches!(result, Err(ToolError::Io(_))));
    }

    #[tokio::test]
    async fn test_list_directory_sorted_with_dir_suffix() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();

        let tool = ListDirectory::new(dir.path());
        let listing = tool.execute(json!({})).await.unwrap();
        assert_eq!(listing, "a.txt\nb.txt\nsrc/");
    }
}
