//! MCP tool server (stdio transport)
//!
//! Every filesystem call runs on the blocking pool. Failures are returned as
//! tool results with `isError: true` and a JSON body, never as protocol errors.

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::*,
    tool, tool_handler, tool_router,
    transport::stdio,
    ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::config::{expand_tilde, Config};
use crate::error::KeeperError;
use crate::gatekeeper::{DeletionMode, DeletionRequest, DeletionResult, Gatekeeper};
use crate::path_checker::PathChecker;
use crate::scan::Scope;
use crate::{relocate, stats, timeline};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FileQueryParams {
    #[schemars(description = "Target directory, supports ~ (default: configured directory)")]
    pub directory: Option<String>,
    #[schemars(description = "File extension without dot, e.g. 'pdf'. Omit for all files")]
    pub extension: Option<String>,
    #[schemars(description = "Descend into subdirectories (default: false)")]
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DirectoryParams {
    #[schemars(description = "Target directory, supports ~ (default: configured directory)")]
    pub directory: Option<String>,
    #[schemars(description = "Descend into subdirectories (default: false)")]
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FormatSizeParams {
    #[schemars(description = "Size in bytes")]
    pub size_bytes: u64,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DirectorySizeParams {
    pub directory: Option<String>,
    #[schemars(description = "Result unit: 'auto', 'B', 'KB', 'MB', 'GB', 'TB' (default: auto)")]
    pub unit: Option<String>,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LargeFilesParams {
    pub directory: Option<String>,
    #[schemars(description = "Minimum size in MB (default: configured threshold, 100)")]
    pub min_size_mb: Option<f64>,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RecentFilesParams {
    pub directory: Option<String>,
    #[schemars(description = "Look back this many days (default: 7)")]
    pub days: Option<u32>,
    pub extension: Option<String>,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DateRangeParams {
    pub directory: Option<String>,
    #[schemars(description = "First day, YYYY-MM-DD (default: unbounded)")]
    pub start_date: Option<String>,
    #[schemars(description = "Last day, YYYY-MM-DD (default: today)")]
    pub end_date: Option<String>,
    pub extension: Option<String>,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TimelineParams {
    pub directory: Option<String>,
    #[schemars(description = "Look back this many days (default: 30)")]
    pub days: Option<u32>,
    #[schemars(description = "Grouping: 'day', 'week' or 'month' (default: day)")]
    pub group_by: Option<String>,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct FileInfoParams {
    #[schemars(description = "File or directory path")]
    pub file_path: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RenameParams {
    #[schemars(description = "Existing file or directory")]
    pub old_path: String,
    #[schemars(description = "New name only, no directory part")]
    pub new_name: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MoveParams {
    pub source_path: String,
    #[schemars(description = "Existing directory to move into")]
    pub target_directory: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteParams {
    #[schemars(description = "File or directory to delete")]
    pub file_path: String,
    #[schemars(description = "'permanent' erases, 'recoverable' moves to the trash")]
    pub mode: DeletionMode,
    #[schemars(description = "Must be true; nothing is deleted otherwise")]
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SafeDeleteParams {
    #[schemars(description = "File or directory to move to the trash")]
    pub file_path: String,
    #[schemars(description = "Must be true; nothing is moved otherwise")]
    #[serde(default)]
    pub confirmed: bool,
    #[schemars(description = "Copy the target to the backup directory first (default: false)")]
    #[serde(default)]
    pub backup: bool,
}

#[derive(Clone)]
pub struct FileKeeperServer {
    config: Arc<Config>,
    gatekeeper: Arc<Gatekeeper>,
    tool_router: ToolRouter<Self>,
}

impl FileKeeperServer {
    pub fn new(config: Config) -> Self {
        let gatekeeper = Gatekeeper::new(config.clone());
        Self::with_gatekeeper(config, gatekeeper)
    }

    pub fn with_gatekeeper(config: Config, gatekeeper: Gatekeeper) -> Self {
        Self {
            config: Arc::new(config),
            gatekeeper: Arc::new(gatekeeper),
            tool_router: Self::tool_router(),
        }
    }

    fn scope(&self, directory: Option<&str>, extension: Option<&str>, recursive: bool) -> Scope {
        Scope::new(self.config.directory_or_default(directory), recursive).with_extension(extension)
    }

    fn to_json<T: Serialize>(value: &T) -> Result<String, McpError> {
        serde_json::to_string_pretty(value)
            .map_err(|e| McpError::internal_error(e.to_string(), None))
    }

    fn failure(err: &KeeperError) -> Result<CallToolResult, McpError> {
        let body = json!({
            "success": false,
            "error_kind": err.kind(),
            "message": err.user_message(),
            "path": err.path().map(|p| p.display().to_string()),
        });
        Ok(CallToolResult::error(vec![Content::text(Self::to_json(&body)?)]))
    }

    /// Run `f` on the blocking pool and turn its outcome into a tool result
    async fn blocking<T, F>(f: F) -> Result<CallToolResult, McpError>
    where
        T: Serialize + Send + 'static,
        F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    {
        match tokio::task::spawn_blocking(f).await {
            Ok(Ok(value)) => Ok(CallToolResult::success(vec![Content::text(Self::to_json(
                &value,
            )?)])),
            Ok(Err(err)) => Self::failure(&err),
            Err(join) => Err(McpError::internal_error(join.to_string(), None)),
        }
    }

    async fn run_deletion(&self, request: DeletionRequest) -> Result<CallToolResult, McpError> {
        info!(path = %request.target_path, mode = %request.mode, confirmed = request.confirmed, "delete requested");
        let gatekeeper = Arc::clone(&self.gatekeeper);
        let result: DeletionResult = tokio::task::spawn_blocking(move || gatekeeper.execute(&request))
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;

        let body = vec![Content::text(Self::to_json(&result)?)];
        Ok(if result.success {
            CallToolResult::success(body)
        } else {
            CallToolResult::error(body)
        })
    }
}

#[tool_router]
impl FileKeeperServer {
    #[tool(description = "Count files in a directory, optionally filtered by extension. Returns: number")]
    async fn count_files(
        &self,
        Parameters(params): Parameters<FileQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = self.scope(
            params.directory.as_deref(),
            params.extension.as_deref(),
            params.recursive,
        );
        Self::blocking(move || Ok(stats::count_files(&scope))).await
    }

    #[tool(description = "List files (paths relative to the directory, sorted). Returns: [string]")]
    async fn list_files(
        &self,
        Parameters(params): Parameters<FileQueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = self.scope(
            params.directory.as_deref(),
            params.extension.as_deref(),
            params.recursive,
        );
        Self::blocking(move || Ok(stats::list_files(&scope))).await
    }

    #[tool(description = "Group files by lowercase extension ('no_extension' for none). Returns: {\".ext\": [absolute path]}")]
    async fn categorize_files_by_extension(
        &self,
        Parameters(params): Parameters<DirectoryParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = self.scope(params.directory.as_deref(), None, params.recursive);
        Self::blocking(move || Ok(stats::categorize_by_extension(&scope))).await
    }

    #[tool(description = "Format a byte count as a human readable size, e.g. '1.5 GB'")]
    async fn format_file_size(
        &self,
        Parameters(params): Parameters<FormatSizeParams>,
    ) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            stats::format_file_size(params.size_bytes),
        )]))
    }

    #[tool(description = "Total size, file count and average size of a directory. Returns: {total_size_bytes, total_files, average_size_bytes, formatted_total, formatted_average, unit}")]
    async fn get_directory_size(
        &self,
        Parameters(params): Parameters<DirectorySizeParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = self.scope(params.directory.as_deref(), None, params.recursive);
        let unit = params.unit.unwrap_or_default();
        Self::blocking(move || {
            let unit = unit.parse::<stats::SizeUnit>()?;
            Ok(stats::directory_size(&scope, unit))
        })
        .await
    }

    #[tool(description = "Find files at or above a size threshold, largest first")]
    async fn find_large_files(
        &self,
        Parameters(params): Parameters<LargeFilesParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = self.scope(params.directory.as_deref(), None, params.recursive);
        let min = params
            .min_size_mb
            .unwrap_or(self.config.large_file_threshold_mb);
        Self::blocking(move || stats::find_large_files(&scope, min)).await
    }

    #[tool(description = "Find directories that contain nothing. Returns: [path]")]
    async fn find_empty_folders(
        &self,
        Parameters(params): Parameters<DirectoryParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = self.scope(params.directory.as_deref(), None, params.recursive);
        Self::blocking(move || Ok(stats::find_empty_folders(&scope))).await
    }

    #[tool(description = "Find files with identical content (SHA-256). Returns: {hash: [path]}")]
    async fn find_duplicate_files(
        &self,
        Parameters(params): Parameters<DirectoryParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = self.scope(params.directory.as_deref(), None, params.recursive);
        Self::blocking(move || Ok(stats::find_duplicate_files(&scope))).await
    }

    #[tool(description = "Files modified in the last N days, newest first")]
    async fn get_recent_files(
        &self,
        Parameters(params): Parameters<RecentFilesParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = self.scope(
            params.directory.as_deref(),
            params.extension.as_deref(),
            params.recursive,
        );
        let days = params.days.unwrap_or(7);
        Self::blocking(move || Ok(timeline::recent_files(&scope, days))).await
    }

    #[tool(description = "Files modified between two dates (YYYY-MM-DD, inclusive). Returns: {files, total_count, total_size, ...}")]
    async fn get_files_by_date_range(
        &self,
        Parameters(params): Parameters<DateRangeParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = self.scope(
            params.directory.as_deref(),
            params.extension.as_deref(),
            params.recursive,
        );
        Self::blocking(move || {
            timeline::files_by_date_range(
                &scope,
                params.start_date.as_deref(),
                params.end_date.as_deref(),
            )
        })
        .await
    }

    #[tool(description = "Recent files grouped by day, week (Monday) or month. Returns: {timeline, summary}")]
    async fn get_file_timeline(
        &self,
        Parameters(params): Parameters<TimelineParams>,
    ) -> Result<CallToolResult, McpError> {
        let scope = self.scope(params.directory.as_deref(), None, params.recursive);
        let days = params.days.unwrap_or(30);
        let group_by = params.group_by.unwrap_or_default();
        Self::blocking(move || {
            let group_by = group_by.parse::<timeline::GroupBy>()?;
            Ok(timeline::file_timeline(&scope, days, group_by))
        })
        .await
    }

    #[tool(description = "Detailed metadata for one file or directory")]
    async fn get_file_info(
        &self,
        Parameters(params): Parameters<FileInfoParams>,
    ) -> Result<CallToolResult, McpError> {
        let path = expand_tilde(&params.file_path);
        Self::blocking(move || stats::file_info(&path)).await
    }

    #[tool(description = "Rename a file or directory in place. Returns: {success, source_path, target_path, type}")]
    async fn rename_file(
        &self,
        Parameters(params): Parameters<RenameParams>,
    ) -> Result<CallToolResult, McpError> {
        let config = Arc::clone(&self.config);
        Self::blocking(move || {
            let cwd = PathChecker::working_dir()?;
            relocate::rename_file(&cwd, &config, &params.old_path, &params.new_name)
        })
        .await
    }

    #[tool(description = "Move a file or directory into another directory. Returns: {success, source_path, target_path, type}")]
    async fn move_file(
        &self,
        Parameters(params): Parameters<MoveParams>,
    ) -> Result<CallToolResult, McpError> {
        let config = Arc::clone(&self.config);
        Self::blocking(move || {
            let cwd = PathChecker::working_dir()?;
            relocate::move_file(&cwd, &config, &params.source_path, &params.target_directory)
        })
        .await
    }

    #[tool(description = "Delete a file or directory. mode='permanent' erases (recursively), mode='recoverable' moves to the trash. Requires confirmed=true. Returns: {success, resolved_path, mode, error_kind, removed_entries, remaining_entries, trash_path, original_size, item_count, space_freed}")]
    async fn delete_file(
        &self,
        Parameters(params): Parameters<DeleteParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_deletion(DeletionRequest::new(
            params.file_path,
            params.mode,
            params.confirmed,
        ))
        .await
    }

    #[tool(description = "Move a file or directory to the trash so it can be restored. Requires confirmed=true. backup=true also copies it to the backup directory first. Fails with UnsupportedPlatformError instead of deleting permanently when no trash exists")]
    async fn safe_delete(
        &self,
        Parameters(params): Parameters<SafeDeleteParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run_deletion(
            DeletionRequest::new(params.file_path, DeletionMode::Recoverable, params.confirmed)
                .with_backup(params.backup),
        )
        .await
    }
}

#[tool_handler]
impl ServerHandler for FileKeeperServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Filesystem statistics and maintenance. Read-only tools (count_files, list_files, \
                 get_directory_size, find_large_files, get_recent_files...) never modify anything. \
                 delete_file and safe_delete require confirmed=true; prefer safe_delete, which moves \
                 to the trash."
                    .to_string(),
            ),
        }
    }
}

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let server = FileKeeperServer::new(config);
    info!(
        trash = server.gatekeeper.trash_backend().name(),
        default_directory = %server.config.default_directory,
        "filekeeper MCP server ready"
    );

    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!("serving error: {:?}", e);
    })?;
    service.waiting().await?;
    Ok(())
}
