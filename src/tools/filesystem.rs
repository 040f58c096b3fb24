//! 沙箱文件系统工具
//!
//! 三个原语（读文件、列目录、写文件）都先经 Sandbox::resolve 校验，
//! 对应工具 get_file_content / get_files_info / write_file。

use std::path::Path;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::{ToolError, ToolOutcome};
use crate::tools::registry::parse_args;
use crate::tools::schema::parameters_schema_for;
use crate::tools::{Sandbox, Tool, ToolContext};

/// 读文件默认截断字符数
pub const DEFAULT_MAX_FILE_CHARS: usize = 10_000;

/// 目录项描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub file_size: u64,
    pub is_dir: bool,
}

impl std::fmt::Display for EntryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            " - {}: file_size={} bytes, is_dir={}",
            self.name, self.file_size, self.is_dir
        )
    }
}

/// 读取文件文本；超过 `max_chars` 个字符时截断并追加标记
pub fn read_file(sandbox: &Sandbox, file_path: &str, max_chars: usize) -> ToolOutcome {
    let full = sandbox.resolve(file_path, "read")?;
    if !full.is_file() || names_directory(file_path) {
        return Err(ToolError::not_found(format!(
            "File not found or is not a regular file: \"{file_path}\""
        )));
    }
    let content = std::fs::read_to_string(&full)
        .map_err(|e| ToolError::io(format!("Failed to read \"{file_path}\": {e}")))?;
    Ok(truncate_content(content, file_path, max_chars))
}

fn truncate_content(content: String, file_path: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((cut, _)) => format!(
            "{}[...File \"{}\" truncated at {} characters]",
            &content[..cut],
            file_path,
            max_chars
        ),
        None => content,
    }
}

/// 列出目录的直接子项，按名称排序。
/// 指向沙箱内的符号链接按目标报告大小与类型；指向沙箱外（或悬空）的只报告链接本身。
pub fn list_dir(sandbox: &Sandbox, directory: &str) -> Result<Vec<EntryInfo>, ToolError> {
    let full = sandbox.resolve(directory, "list")?;
    if !full.is_dir() {
        return Err(ToolError::not_found(format!(
            "\"{directory}\" is not a directory"
        )));
    }
    let read_dir = std::fs::read_dir(&full)
        .map_err(|e| ToolError::io(format!("Failed to list \"{directory}\": {e}")))?;

    let mut entries = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| ToolError::io(e.to_string()))?;
        let meta = entry_metadata(sandbox, &entry.path())
            .map_err(|e| ToolError::io(format!("Failed to stat entry: {e}")))?;
        entries.push(EntryInfo {
            name: entry.file_name().to_string_lossy().to_string(),
            file_size: meta.len(),
            is_dir: meta.is_dir(),
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn entry_metadata(sandbox: &Sandbox, path: &Path) -> std::io::Result<std::fs::Metadata> {
    let own = std::fs::symlink_metadata(path)?;
    if !own.file_type().is_symlink() {
        return Ok(own);
    }
    match sandbox.resolve(&path.to_string_lossy(), "list") {
        Ok(target) => std::fs::metadata(target).or(Ok(own)),
        Err(_) => Ok(own),
    }
}

/// 以路径分隔符结尾的请求只能指向目录
fn names_directory(path: &str) -> bool {
    path.chars().last().is_some_and(std::path::is_separator)
}

/// 创建或覆盖文件（自动创建沙箱内缺失的父目录），不保留旧内容
pub fn write_file(sandbox: &Sandbox, file_path: &str, content: &str) -> ToolOutcome {
    let full = sandbox.resolve(file_path, "write to")?;
    if full.is_dir() {
        return Err(ToolError::io(format!(
            "Cannot write to \"{file_path}\" as it is a directory"
        )));
    }
    if names_directory(file_path) {
        return Err(ToolError::io(format!(
            "Cannot write to \"{file_path}\" as it is not a directory"
        )));
    }
    ensure_parent_dir(&full)?;
    std::fs::write(&full, content)
        .map_err(|e| ToolError::io(format!("Failed to write \"{file_path}\": {e}")))?;
    Ok(format!(
        "Successfully wrote to \"{}\" ({} characters written)",
        file_path,
        content.chars().count()
    ))
}

fn ensure_parent_dir(path: &Path) -> Result<(), ToolError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ToolError::io(format!("Failed to create parent directory: {e}")))?;
    }
    Ok(())
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FilesInfoArgs {
    /// The directory to list files from, relative to the working directory. If not provided, lists files in the working directory itself.
    pub directory: Option<String>,
}

/// get_files_info：列目录
pub struct FilesInfoTool;

#[async_trait]
impl Tool for FilesInfoTool {
    fn name(&self) -> &str {
        "get_files_info"
    }

    fn description(&self) -> &str {
        "Lists files in the specified directory along with their sizes, constrained to the working directory."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema_for::<FilesInfoArgs>()
    }

    async fn execute(&self, ctx: &ToolContext<'_>, args: Value) -> ToolOutcome {
        let args: FilesInfoArgs = parse_args(self.name(), args)?;
        let directory = args.directory.as_deref().unwrap_or(".");
        tracing::debug!(directory = %directory, "get_files_info execute");
        let entries = list_dir(ctx.sandbox, directory)?;
        Ok(entries
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FileContentArgs {
    /// Path of the file to read, relative to the working directory.
    pub file_path: String,
}

/// get_file_content：读文件
pub struct FileContentTool {
    max_chars: usize,
}

impl FileContentTool {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }
}

impl Default for FileContentTool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_CHARS)
    }
}

#[async_trait]
impl Tool for FileContentTool {
    fn name(&self) -> &str {
        "get_file_content"
    }

    fn description(&self) -> &str {
        "Reads the contents of a file, constrained to the working directory. Long files are truncated."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema_for::<FileContentArgs>()
    }

    async fn execute(&self, ctx: &ToolContext<'_>, args: Value) -> ToolOutcome {
        let args: FileContentArgs = parse_args(self.name(), args)?;
        tracing::debug!(path = %args.file_path, "get_file_content execute");
        read_file(ctx.sandbox, &args.file_path, self.max_chars)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// Path of the file to create or overwrite, relative to the working directory.
    pub file_path: String,
    /// The full text content to write to the file.
    pub content: String,
}

/// write_file：创建或覆盖文件
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Writes content to a file, creating it (and missing parent directories) or overwriting it, constrained to the working directory."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema_for::<WriteFileArgs>()
    }

    async fn execute(&self, ctx: &ToolContext<'_>, args: Value) -> ToolOutcome {
        let args: WriteFileArgs = parse_args(self.name(), args)?;
        tracing::debug!(path = %args.file_path, bytes = args.content.len(), "write_file execute");
        write_file(ctx.sandbox, &args.file_path, &args.content)
    }
}
