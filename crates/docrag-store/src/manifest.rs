//! Index manifest: the [`IndexSpec`] an index was created with, persisted as
//! JSON next to the index and checked on every open.

use chrono::{DateTime, Utc};
use docrag_core::{IndexSpec, StoreConfigError, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Contents of `<index>.manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexManifest {
    pub spec: IndexSpec,
    pub created_at: DateTime<Utc>,
    /// docrag version that created the index
    pub created_by: String,
}

/// Manifest path for an index stored under `dir`.
#[must_use]
pub fn manifest_path(dir: &Path, index_name: &str) -> PathBuf {
    dir.join(format!("{index_name}.manifest.json"))
}

/// Check a configured spec against the spec an index was created with.
pub fn verify(existing: &IndexSpec, configured: &IndexSpec) -> Result<(), StoreConfigError> {
    if existing.dimension != configured.dimension {
        return Err(StoreConfigError::DimensionMismatch {
            expected: existing.dimension,
            actual: configured.dimension,
        });
    }
    if existing.metric != configured.metric {
        return Err(StoreConfigError::MetricMismatch {
            expected: existing.metric,
            actual: configured.metric,
        });
    }
    if existing.model != configured.model {
        return Err(StoreConfigError::ModelMismatch {
            expected: existing.model.clone(),
            actual: configured.model.clone(),
        });
    }
    Ok(())
}

/// Reject specs no index can be created with.
pub fn validate(spec: &IndexSpec) -> Result<(), StoreConfigError> {
    if spec.name.trim().is_empty() {
        return Err(StoreConfigError::InvalidSpec("index name is empty".to_string()));
    }
    if spec
        .name
        .chars()
        .any(|c| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
    {
        return Err(StoreConfigError::InvalidSpec(format!(
            "index name '{}' may only contain ASCII letters, digits, '-' and '_'",
            spec.name
        )));
    }
    if spec.dimension == 0 {
        return Err(StoreConfigError::InvalidSpec(
            "dimension must be > 0".to_string(),
        ));
    }
    Ok(())
}

/// Read a manifest, if one exists.
pub async fn load(path: &Path) -> Result<Option<IndexManifest>, StoreError> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreConfigError::Manifest(format!("{}: {e}", path.display())).into()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::Init(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}

/// Write a manifest through a temporary file and rename.
pub async fn save(path: &Path, manifest: &IndexManifest) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| StoreError::Init(format!("failed to serialize manifest: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| StoreError::Init(format!("failed to write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::Init(format!("failed to write {}: {e}", path.display())))
}

/// Create the manifest if absent, otherwise verify it against `spec`.
///
/// Returns `true` when a new manifest was written.
pub async fn ensure(path: &Path, spec: &IndexSpec) -> Result<bool, StoreError> {
    validate(spec)?;
    if let Some(existing) = load(path).await? {
        verify(&existing.spec, spec)?;
        debug!("Index manifest {:?} matches configuration", path);
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::Init(format!("failed to create {}: {e}", parent.display())))?;
    }
    let manifest = IndexManifest {
        spec: spec.clone(),
        created_at: Utc::now(),
        created_by: format!("docrag {}", env!("CARGO_PKG_VERSION")),
    };
    save(path, &manifest).await?;
    info!(
        "Created index '{}' (dimension {}, metric {}, model {})",
        spec.name, spec.dimension, spec.metric, spec.model
    );
    Ok(true)
}
