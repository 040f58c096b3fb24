//! 沙箱路径解析
//!
//! Sandbox 绑定规范化后的工作目录；resolve 把调用方给的相对路径解析成绝对路径，
//! 结果必须落在根目录之下（按路径分量比较，禁止 ../ 与绝对路径逃逸、禁止经符号链接逃逸）。
//! 目标可以尚不存在（供 write_file 使用），此时只规范化已存在的最长前缀。

use std::ffi::OsString;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::core::ToolError;

/// 绑定工作目录的路径解析器；运行期间不可变
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// 根目录必须已存在，否则无法规范化
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 解析 `path`；`action` 只用于错误文案（read / list / write to / execute）
    pub fn resolve(&self, path: &str, action: &str) -> Result<PathBuf, ToolError> {
        let violation = || {
            ToolError::sandbox(format!(
                "Cannot {action} \"{path}\" as it is outside the permitted working directory"
            ))
        };

        // 绝对路径会整体替换 root，随后由前缀检查拒绝
        let joined = self.root.join(path);
        let normalized = normalize_lexically(&joined).ok_or_else(violation)?;
        let resolved = canonicalize_existing_prefix(&normalized).ok_or_else(violation)?;

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            tracing::warn!(path = %path, action = %action, "sandbox violation");
            Err(violation())
        }
    }
}

/// 去掉 `.`、折叠 `..`；`..` 越过文件系统根时返回 None
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Some(out)
}

/// 规范化已存在的最长前缀（解析符号链接），再拼回不存在的尾部。
/// 悬空符号链接无法规范化但会被 write 跟随，直接返回 None。
fn canonicalize_existing_prefix(path: &Path) -> Option<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut tail: Vec<OsString> = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(mut canonical) => {
                for part in tail.iter().rev() {
                    canonical.push(part);
                }
                return Some(canonical);
            }
            Err(_) => {
                if existing.symlink_metadata().is_ok() {
                    return None;
                }
                let name = existing.file_name()?.to_os_string();
                tail.push(name);
                existing = existing.parent()?.to_path_buf();
            }
        }
    }
}
