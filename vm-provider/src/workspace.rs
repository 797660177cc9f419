//! Request types exchanged with the host.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

/// A named set of target options. `options` is a JSON object encoded as a string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetConfig {
    pub name: String,
    #[serde(default)]
    pub options: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub target_config: TargetConfig,
}

/// One workspace, as the host describes it. Never modified by the provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub target_id: String,
    #[serde(default)]
    pub repository: Repository,
    #[serde(default)]
    pub env_vars: HashMap<String, String>,
    #[serde(default)]
    pub target: TargetDescriptor,
}

impl WorkspaceDescriptor {
    /// Deterministic container name, so a workspace never gets two containers.
    pub fn container_name(&self) -> String {
        format!("{}-{}", self.target_id, self.id)
    }

    /// Name used in operator messages.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRegistry {
    pub server: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRequest {
    pub workspace: WorkspaceDescriptor,
    #[serde(default)]
    pub container_registries: Vec<ContainerRegistry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub builder_image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TargetRequest {
    pub target: TargetDescriptor,
}
