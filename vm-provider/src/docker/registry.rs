//! Registry credential selection for image pulls.

use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use vm_core::error::Result;

use crate::workspace::ContainerRegistry;

const DOCKER_HUB: &str = "docker.io";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    pub server: String,
    pub username: String,
    pub password: String,
}

/// Registry host an image reference pulls from.
///
/// The first path segment is a registry only if it looks like a host
/// (`.` or `:` in it, or `localhost`); otherwise the image is on Docker Hub.
pub fn registry_host(image: &str) -> &str {
    match image.split_once('/') {
        Some((first, _))
            if first.contains('.') || first.contains(':') || first == "localhost" =>
        {
            first
        }
        _ => DOCKER_HUB,
    }
}

fn normalize_server(server: &str) -> &str {
    let server = server
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/');
    let server = server.split('/').next().unwrap_or(server);
    match server {
        "index.docker.io" | "registry-1.docker.io" => DOCKER_HUB,
        other => other,
    }
}

/// Credentials for the registry `image` comes from, if the host supplied any.
pub fn find_registry_for_image(registries: &[ContainerRegistry], image: &str) -> Option<RegistryAuth> {
    let host = registry_host(image);
    registries
        .iter()
        .find(|r| normalize_server(&r.server) == host && !r.username.is_empty())
        .map(|r| RegistryAuth {
            server: r.server.clone(),
            username: r.username.clone(),
            password: r.password.clone(),
        })
}

/// Write a Docker client `config.json` holding only `auth` into `dir`.
pub fn write_docker_config(dir: &Path, auth: &RegistryAuth) -> Result<()> {
    let token = STANDARD.encode(format!("{}:{}", auth.username, auth.password));
    let config = json!({
        "auths": {
            auth.server.clone(): { "auth": token }
        }
    });
    std::fs::write(dir.join("config.json"), serde_json::to_vec_pretty(&config)?)?;
    Ok(())
}
