use serde::{Deserialize, Serialize};

/// Values the host hands over when it loads the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeProviderRequest {
    pub base_path: String,
    #[serde(default)]
    pub daytona_download_url: String,
    #[serde(default)]
    pub daytona_version: String,
    #[serde(default)]
    pub server_url: String,
    #[serde(default)]
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default)]
    pub target_logs_dir: String,
    #[serde(default)]
    pub workspace_logs_dir: String,
    #[serde(default)]
    pub api_port: u32,
    #[serde(default)]
    pub server_port: u32,
}
