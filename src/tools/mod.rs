pub mod executor;
pub mod filesystem;
pub mod registry;
pub mod sandbox;
pub mod schema;
pub mod script;

pub use executor::ToolExecutor;
pub use filesystem::{FileContentTool, FilesInfoTool, WriteFileTool};
pub use registry::{Tool, ToolContext, ToolRegistry};
pub use sandbox::Sandbox;
pub use schema::ToolDescriptor;
pub use script::{RunScriptTool, ScriptRunner};

use crate::config::ToolsSection;

/// 内置工具目录：get_files_info / get_file_content / run_python_file / write_file
pub fn builtin_registry(cfg: &ToolsSection) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(FilesInfoTool);
    tools.register(FileContentTool::new(cfg.max_file_chars));
    tools.register(RunScriptTool::new(ScriptRunner::from_config(&cfg.exec)));
    tools.register(WriteFileTool);
    tools
}
