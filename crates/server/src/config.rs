use std::{collections::HashMap, fs, path::PathBuf, sync::Arc};

use anyhow::{bail, Context};
use storage::{FsObjectStore, HttpObjectStore, ObjectStore};
use toml::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub storage_backend: String,
    pub bucket: String,
    pub object_store_root: String,
    pub object_store_endpoint: Option<String>,
    pub object_store_token: Option<String>,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            storage_backend: "fs".into(),
            bucket: "seating-preferences".into(),
            object_store_root: "./data/objects".into(),
            object_store_endpoint: None,
            object_store_token: None,
            max_body_bytes: 64 * 1024,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("server.toml") {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |name| std::env::var(name).ok());

    settings
}

pub(crate) fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let Ok(table) = toml::from_str::<HashMap<String, Value>>(raw) else {
        return;
    };
    // Scalars only; `max_body_bytes = 65536` and `max_body_bytes = "65536"` both work.
    let file_cfg: HashMap<String, String> = table
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::String(s) => Some((key, s)),
            Value::Integer(i) => Some((key, i.to_string())),
            _ => None,
        })
        .collect();
    if let Some(v) = file_cfg.get("bind_addr") {
        settings.server_bind = v.clone();
    }
    if let Some(v) = file_cfg.get("storage_backend") {
        settings.storage_backend = v.clone();
    }
    if let Some(v) = file_cfg.get("bucket") {
        settings.bucket = v.clone();
    }
    if let Some(v) = file_cfg.get("object_store_root") {
        settings.object_store_root = v.clone();
    }
    if let Some(v) = file_cfg.get("object_store_endpoint") {
        settings.object_store_endpoint = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("object_store_token") {
        settings.object_store_token = Some(v.clone());
    }
    if let Some(v) = file_cfg.get("max_body_bytes") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_body_bytes = parsed;
        }
    }
}

/// Later names win, so `APP__*` overrides the plain variable.
pub(crate) fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    let lookup = |names: &[&str]| names.iter().filter_map(|name| var(*name)).last();

    if let Some(v) = lookup(&["SERVER_BIND", "APP__BIND_ADDR"]) {
        settings.server_bind = v;
    }
    if let Some(v) = lookup(&["STORAGE_BACKEND", "APP__STORAGE_BACKEND"]) {
        settings.storage_backend = v;
    }
    if let Some(v) = lookup(&["S3_BUCKET_NAME", "APP__BUCKET"]) {
        settings.bucket = v;
    }
    if let Some(v) = lookup(&["OBJECT_STORE_ROOT", "APP__OBJECT_STORE_ROOT"]) {
        settings.object_store_root = v;
    }
    if let Some(v) = lookup(&["OBJECT_STORE_ENDPOINT", "APP__OBJECT_STORE_ENDPOINT"]) {
        settings.object_store_endpoint = Some(v);
    }
    if let Some(v) = lookup(&["OBJECT_STORE_TOKEN", "APP__OBJECT_STORE_TOKEN"]) {
        settings.object_store_token = Some(v);
    }
    if let Some(v) = lookup(&["APP__MAX_BODY_BYTES"]) {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_body_bytes = parsed;
        }
    }
}

pub fn build_object_store(settings: &Settings) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let bucket = settings.bucket.trim();
    if bucket.is_empty() {
        bail!("bucket name must not be empty");
    }

    match settings.storage_backend.trim().to_ascii_lowercase().as_str() {
        "fs" | "" => {
            let root = PathBuf::from(settings.object_store_root.trim()).join(bucket);
            fs::create_dir_all(&root).with_context(|| {
                format!("failed to create object store directory '{}'", root.display())
            })?;
            Ok(Arc::new(FsObjectStore::new(root)))
        }
        "http" => {
            let Some(endpoint) = settings.object_store_endpoint.as_deref() else {
                bail!("storage backend 'http' requires OBJECT_STORE_ENDPOINT");
            };
            let store = HttpObjectStore::new(
                endpoint,
                bucket,
                settings.object_store_token.clone(),
            )?;
            Ok(Arc::new(store))
        }
        other => bail!("unknown storage backend '{other}' (expected 'fs' or 'http')"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
