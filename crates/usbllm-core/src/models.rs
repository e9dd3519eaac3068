//! Model registry lookup and local model resolution.
//!
//! The registry is a `registry.json` file listing known `.gguf` files by id.
//! Resolution never fails: anything unreadable degrades to `missing` or
//! `none`, and the caller falls back to the stub generator.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LauncherConfig;

/// File name of the model registry inside a models directory.
pub const REGISTRY_FILE: &str = "registry.json";

/// One entry of `registry.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: String,
    /// File name only, relative to the models directory.
    pub file: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub ctx: Option<u64>,
    #[serde(default)]
    pub quant: Option<String>,
    #[serde(default)]
    pub size_mb: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryDocument {
    Bare(Vec<RegistryEntry>),
    Wrapped { models: Vec<RegistryEntry> },
}

/// Outcome of a local model lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    /// A model file was found on disk.
    Ok,
    /// A model was configured but its file is absent.
    Missing,
    /// No local model is configured.
    None,
}

/// Resolved local model with display metadata.
///
/// `abs_path` is launcher-internal and is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedModel {
    pub status: ModelStatus,
    #[serde(skip)]
    pub abs_path: Option<PathBuf>,
    pub id: Option<String>,
    pub basename: Option<String>,
    pub name: Option<String>,
    pub license: Option<String>,
    pub ctx: Option<u64>,
    pub quant: Option<String>,
}

impl ResolvedModel {
    pub const fn none() -> Self {
        Self {
            status: ModelStatus::None,
            abs_path: None,
            id: None,
            basename: None,
            name: None,
            license: None,
            ctx: None,
            quant: None,
        }
    }

    fn from_entry(status: ModelStatus, entry: Option<&RegistryEntry>) -> Self {
        Self {
            status,
            abs_path: None,
            id: entry.map(|e| e.id.clone()),
            basename: entry.map(|e| e.file.clone()),
            name: entry.and_then(|e| e.name.clone()),
            license: entry.and_then(|e| e.license.clone()),
            ctx: entry.and_then(|e| e.ctx),
            quant: entry.and_then(|e| e.quant.clone()),
        }
    }

    /// Path of a model file that exists, if any.
    pub fn usable_path(&self) -> Option<&Path> {
        match self.status {
            ModelStatus::Ok => self.abs_path.as_deref(),
            ModelStatus::Missing | ModelStatus::None => None,
        }
    }
}

/// Candidate registry locations for a models directory, in lookup order.
pub fn registry_candidates(models_dir: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![models_dir.join(REGISTRY_FILE)];
    if let Ok(cwd) = std::env::current_dir() {
        let fallback = cwd.join("models").join(REGISTRY_FILE);
        if !candidates.contains(&fallback) {
            candidates.push(fallback);
        }
    }
    candidates
}

/// Read the first parseable registry among `candidates`.
///
/// Returns an empty list when no candidate can be read.
pub fn load_registry(candidates: &[PathBuf]) -> Vec<RegistryEntry> {
    for path in candidates {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Registry not readable");
                continue;
            }
        };
        match serde_json::from_str::<RegistryDocument>(&raw) {
            Ok(RegistryDocument::Bare(models) | RegistryDocument::Wrapped { models }) => {
                debug!(path = %path.display(), entries = models.len(), "Loaded model registry");
                return models;
            }
            Err(e) => debug!(path = %path.display(), error = %e, "Registry is not valid JSON"),
        }
    }
    Vec::new()
}

/// Resolve the local model the configuration points at.
///
/// Precedence: explicit `model_file`, then `model_id` looked up in the
/// registry under `models_dir`, then nothing.
pub fn resolve_local_model(config: &LauncherConfig) -> ResolvedModel {
    let registry = load_registry(&registry_candidates(&config.models_dir));
    resolve_with_registry(config, &registry)
}

/// Resolution against an already loaded registry.
pub fn resolve_with_registry(config: &LauncherConfig, registry: &[RegistryEntry]) -> ResolvedModel {
    if let Some(model_file) = &config.model_file {
        let abs = absolutize(model_file);
        let basename = abs
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        let entry = basename.as_deref().and_then(|b| by_filename(registry, b));
        let status = if abs.is_file() {
            ModelStatus::Ok
        } else {
            ModelStatus::Missing
        };

        let mut resolved = ResolvedModel::from_entry(status, entry);
        resolved.basename = basename;
        if status == ModelStatus::Ok {
            resolved.abs_path = Some(abs);
        } else if resolved.id.is_none() {
            resolved.id.clone_from(&config.model_id);
        }
        return resolved;
    }

    if let Some(model_id) = &config.model_id {
        let Some(entry) = registry.iter().find(|e| &e.id == model_id) else {
            let mut resolved = ResolvedModel::from_entry(ModelStatus::Missing, None);
            resolved.id = Some(model_id.clone());
            return resolved;
        };

        let abs = absolutize(&config.models_dir.join(&entry.file));
        if abs.is_file() {
            let mut resolved = ResolvedModel::from_entry(ModelStatus::Ok, Some(entry));
            resolved.abs_path = Some(abs);
            return resolved;
        }
        return ResolvedModel::from_entry(ModelStatus::Missing, Some(entry));
    }

    ResolvedModel::none()
}

fn by_filename<'a>(registry: &'a [RegistryEntry], basename: &str) -> Option<&'a RegistryEntry> {
    let wanted = basename.to_lowercase();
    registry.iter().find(|e| e.file.to_lowercase() == wanted)
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(id: &str, file: &str) -> RegistryEntry {
        RegistryEntry {
            id: id.into(),
            file: file.into(),
            name: Some(format!("{id} model")),
            license: Some("MIT".into()),
            ctx: Some(4096),
            quant: Some("Q4_K_M".into()),
            size_mb: None,
        }
    }

    fn config_in(dir: &TempDir) -> LauncherConfig {
        LauncherConfig {
            models_dir: dir.path().to_path_buf(),
            ..LauncherConfig::default()
        }
    }

    #[test]
    fn nothing_configured_is_none() {
        let dir = TempDir::new().unwrap();
        let resolved = resolve_with_registry(&config_in(&dir), &[]);
        assert_eq!(resolved, ResolvedModel::none());
    }

    #[test]
    fn model_id_with_file_on_disk_is_ok() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("tiny.gguf"), b"GGUF").unwrap();
        let config = LauncherConfig {
            model_id: Some("tiny".into()),
            ..config_in(&dir)
        };

        let resolved = resolve_with_registry(&config, &[entry("tiny", "tiny.gguf")]);
        assert_eq!(resolved.status, ModelStatus::Ok);
        assert_eq!(resolved.usable_path(), Some(dir.path().join("tiny.gguf").as_path()));
        assert_eq!(resolved.quant.as_deref(), Some("Q4_K_M"));
    }

    #[test]
    fn unknown_model_id_is_missing() {
        let dir = TempDir::new().unwrap();
        let config = LauncherConfig {
            model_id: Some("ghost".into()),
            ..config_in(&dir)
        };

        let resolved = resolve_with_registry(&config, &[entry("tiny", "tiny.gguf")]);
        assert_eq!(resolved.status, ModelStatus::Missing);
        assert_eq!(resolved.id.as_deref(), Some("ghost"));
        assert!(resolved.usable_path().is_none());
    }

    #[test]
    fn explicit_file_matches_registry_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("TINY.gguf");
        std::fs::write(&file, b"GGUF").unwrap();
        let config = LauncherConfig {
            model_file: Some(file.clone()),
            ..config_in(&dir)
        };

        let resolved = resolve_with_registry(&config, &[entry("tiny", "tiny.gguf")]);
        assert_eq!(resolved.status, ModelStatus::Ok);
        assert_eq!(resolved.id.as_deref(), Some("tiny"));
        assert_eq!(resolved.basename.as_deref(), Some("TINY.gguf"));
        assert_eq!(resolved.abs_path, Some(file));
    }

    #[test]
    fn explicit_missing_file_keeps_configured_id() {
        let dir = TempDir::new().unwrap();
        let config = LauncherConfig {
            model_file: Some(dir.path().join("absent.gguf")),
            model_id: Some("fallback-id".into()),
            ..config_in(&dir)
        };

        let resolved = resolve_with_registry(&config, &[]);
        assert_eq!(resolved.status, ModelStatus::Missing);
        assert_eq!(resolved.id.as_deref(), Some("fallback-id"));
    }

    #[test]
    fn registry_accepts_bare_and_wrapped_documents() {
        let dir = TempDir::new().unwrap();
        let bare = dir.path().join("bare.json");
        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(&bare, r#"[{"id":"a","file":"a.gguf"}]"#).unwrap();
        std::fs::write(&wrapped, r#"{"models":[{"id":"b","file":"b.gguf","ctx":2048}]}"#)
            .unwrap();

        assert_eq!(load_registry(&[bare])[0].id, "a");
        let models = load_registry(&[dir.path().join("nope.json"), wrapped]);
        assert_eq!(models[0].ctx, Some(2048));
    }

    #[test]
    fn serialized_model_never_exposes_absolute_path() {
        let mut resolved = ResolvedModel::none();
        resolved.abs_path = Some(PathBuf::from("/secret/models/tiny.gguf"));
        let json = serde_json::to_string(&resolved).unwrap();
        assert!(!json.contains("/secret"));
        assert!(json.contains(r#""status":"none""#));
    }
}
