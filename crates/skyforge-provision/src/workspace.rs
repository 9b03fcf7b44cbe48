//! Per-resource working directories
//!
//! Each resource gets `<workspace_root>/<resource_id>`. Re-running a job for
//! the same resource reuses the directory and overwrites its contents.

use crate::error::{ProvisionError, Result};
use skyforge_core::OutputMap;
use std::path::{Path, PathBuf};
use tokio::fs;

pub const VARIABLES_FILE: &str = "terraform.tfvars.json";

/// Resolves module sources and lays out workspaces
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    module_root: PathBuf,
    workspace_root: PathBuf,
}

/// A populated workspace
#[derive(Debug, Clone)]
pub struct Workspace {
    pub resource_id: i64,
    pub dir: PathBuf,
}

impl Workspace {
    pub fn variables_file(&self) -> PathBuf {
        self.dir.join(VARIABLES_FILE)
    }
}

impl WorkspaceManager {
    pub fn new(module_root: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            module_root: module_root.into(),
            workspace_root: workspace_root.into(),
        }
    }

    pub fn module_root(&self) -> &Path {
        &self.module_root
    }

    pub fn workspace_dir(&self, resource_id: i64) -> PathBuf {
        self.workspace_root.join(resource_id.to_string())
    }

    /// Module source directory, or `ModuleNotFound` naming the searched path
    pub fn module_source(&self, module: &str) -> Result<PathBuf> {
        let candidate = self.module_root.join(module);
        let valid_name = !module.is_empty()
            && module
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        if valid_name && candidate.is_dir() {
            Ok(candidate)
        } else {
            Err(ProvisionError::ModuleNotFound {
                module: module.to_string(),
                searched: vec![candidate],
            })
        }
    }

    /// Create the workspace and copy the module template into it
    ///
    /// The module is resolved before anything touches the filesystem.
    pub async fn prepare(&self, resource_id: i64, module: &str) -> Result<Workspace> {
        let source = self.module_source(module)?;
        let dir = self.workspace_dir(resource_id);
        fs::create_dir_all(&dir).await?;

        let copied = copy_dir(&source, &dir).await?;
        tracing::debug!(
            resource_id,
            files = copied,
            "Copied module {} into {}",
            module,
            dir.display()
        );

        Ok(Workspace { resource_id, dir })
    }

    /// Write the translated variables next to the module
    pub async fn write_variables(
        &self,
        workspace: &Workspace,
        variables: &OutputMap,
    ) -> Result<PathBuf> {
        let path = workspace.variables_file();
        let content = serde_json::to_string_pretty(variables)?;
        fs::write(&path, content).await?;
        Ok(path)
    }
}

/// Recursive copy, overwriting existing files. Returns the number of files copied.
async fn copy_dir(source: &Path, target: &Path) -> Result<usize> {
    let mut copied = 0;
    let mut pending = vec![(source.to_path_buf(), target.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to).await?;
        let mut entries = fs::read_dir(&from).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            let dest = to.join(entry.file_name());
            if file_type.is_dir() {
                pending.push((entry.path(), dest));
            } else if file_type.is_file() {
                fs::copy(entry.path(), &dest).await?;
                copied += 1;
            }
        }
    }

    Ok(copied)
}
