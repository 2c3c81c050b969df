//! Checkpoint persistence
//!
//! Serializes the encoder/decoder parameter pair as a SafeTensors blob per
//! saved step, with a JSON manifest per run resolving the `best` alias and the
//! accumulated `step_<N>` records. Numeric round-trip is bit-for-bit: buffers
//! are cast to raw little-endian f32 bytes and back.
//!
//! Writes are atomic from the caller's perspective: blob and manifest are
//! staged to temporary files and renamed into place, and the manifest is only
//! rewritten after the blob rename succeeds, so a failed save leaves the
//! previous `best` alias resolvable.

use crate::params::ModelParams;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use ndarray::Array1;
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Per-run alias manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    run_id: String,
    best_step: Option<usize>,
    steps: Vec<usize>,
    updated_at: DateTime<Utc>,
}

/// Filesystem-backed artifact registry for one training run
pub struct CheckpointStore {
    root: PathBuf,
    run_id: String,
}

impl CheckpointStore {
    /// Create a store rooted at `root` for the given run identity
    pub fn new(root: impl Into<PathBuf>, run_id: impl Into<String>) -> Self {
        Self { root: root.into(), run_id: run_id.into() }
    }

    /// Run identity this store persists under
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn run_dir(&self) -> PathBuf {
        self.root.join(&self.run_id)
    }

    fn blob_path(&self, step: usize) -> PathBuf {
        self.run_dir().join(format!("step_{step}.safetensors"))
    }

    fn manifest_path(&self) -> PathBuf {
        self.run_dir().join("manifest.json")
    }

    /// Persist `params` for `step` and point the `best` alias at it.
    ///
    /// Step blobs accumulate; the alias is overwritten. Returns the blob path.
    pub fn save(&self, step: usize, params: &ModelParams) -> Result<PathBuf> {
        let run_dir = self.run_dir();
        std::fs::create_dir_all(&run_dir)?;

        let bytes = encode(params, &self.run_id, step)?;
        let blob_path = self.blob_path(step);
        write_atomic(&blob_path, &bytes)?;

        // Blob is in place; only now may the alias move.
        let mut manifest = self.read_manifest()?.unwrap_or(Manifest {
            run_id: self.run_id.clone(),
            best_step: None,
            steps: Vec::new(),
            updated_at: Utc::now(),
        });
        if !manifest.steps.contains(&step) {
            manifest.steps.push(step);
        }
        manifest.best_step = Some(step);
        manifest.updated_at = Utc::now();
        let manifest_bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| Error::Serialization(format!("manifest encoding failed: {e}")))?;
        write_atomic(&self.manifest_path(), &manifest_bytes)?;

        Ok(blob_path)
    }

    /// Step the `best` alias currently resolves to, if any save ever happened
    pub fn best_step(&self) -> Result<Option<usize>> {
        Ok(self.read_manifest()?.and_then(|m| m.best_step))
    }

    /// Load the parameters behind the `best` alias into `template`'s structure
    pub fn load_best(&self, template: &ModelParams) -> Result<ModelParams> {
        let step = self
            .best_step()?
            .ok_or_else(|| Error::NoCheckpoint(self.run_id.clone()))?;
        self.load_step(step, template)
    }

    /// Load the parameters persisted for a specific step
    pub fn load_step(&self, step: usize, template: &ModelParams) -> Result<ModelParams> {
        let path = self.blob_path(step);
        let bytes = std::fs::read(&path).map_err(|e| {
            Error::Persistence(format!("reading {} failed: {e}", path.display()))
        })?;
        decode(&bytes, template)
    }

    fn read_manifest(&self) -> Result<Option<Manifest>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path)?;
        let manifest = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Serialization(format!("manifest decoding failed: {e}")))?;
        Ok(Some(manifest))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)
        .map_err(|e| Error::Persistence(format!("writing {} failed: {e}", tmp.display())))?;
    std::fs::rename(&tmp, path)
        .map_err(|e| Error::Persistence(format!("renaming into {} failed: {e}", path.display())))?;
    Ok(())
}

fn encode(params: &ModelParams, run_id: &str, step: usize) -> Result<Vec<u8>> {
    let flat = params.flatten();
    let buffers: Vec<(String, Vec<u8>, Vec<usize>)> = flat
        .iter()
        .map(|(name, values)| {
            let contiguous: Vec<f32> = values.iter().copied().collect();
            (name.clone(), bytemuck::cast_slice(&contiguous).to_vec(), vec![values.len()])
        })
        .collect();

    let views: Result<Vec<(&str, TensorView<'_>)>> = buffers
        .iter()
        .map(|(name, bytes, shape)| {
            TensorView::new(Dtype::F32, shape.clone(), bytes)
                .map(|view| (name.as_str(), view))
                .map_err(|e| Error::Serialization(format!("tensor view for {name}: {e}")))
        })
        .collect();

    let mut metadata = HashMap::new();
    metadata.insert("run_id".to_string(), run_id.to_string());
    metadata.insert("step".to_string(), step.to_string());

    safetensors::serialize(views?, Some(metadata))
        .map_err(|e| Error::Serialization(format!("checkpoint encoding failed: {e}")))
}

fn decode(bytes: &[u8], template: &ModelParams) -> Result<ModelParams> {
    let tensors = SafeTensors::deserialize(bytes)
        .map_err(|e| Error::Serialization(format!("checkpoint decoding failed: {e}")))?;

    let mut entries = Vec::with_capacity(tensors.len());
    for (name, view) in tensors.tensors() {
        if view.dtype() != Dtype::F32 {
            return Err(Error::Serialization(format!(
                "tensor {name} has dtype {:?}, expected F32",
                view.dtype()
            )));
        }
        let values: &[f32] = bytemuck::cast_slice(view.data());
        entries.push((name.to_string(), Array1::from(values.to_vec())));
    }

    ModelParams::unflatten(entries, template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamTree;
    use ndarray::arr1;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn sample_pair() -> ModelParams {
        let mut encoder = ParamTree::new();
        encoder.insert("encode.weight", arr1(&[1.5, -2.25, 1e-10]));
        encoder.insert("encode.bias", arr1(&[0.0, -0.0]));
        let mut decoder = ParamTree::new();
        decoder.insert("decode.weight", arr1(&[f32::MIN_POSITIVE, 3.0e7]));
        ModelParams::new(encoder, decoder)
    }

    #[test]
    fn test_round_trip_is_bit_exact() {
        let tmp = TempDir::new().unwrap();
        let store = CheckpointStore::new(tmp.path(), "run-a");
        let params = sample_pair();

        store.save(7, &params).unwrap();
        let loaded = store.load_best(&params).unwrap();

        for ((_, orig), (_, restored)) in
            params.flatten().into_iter().zip(loaded.flatten().into_iter())
        {
            for (a, b) in orig.iter().zip(restored.iter()) {
                assert_eq!(a.to_bits(), b.to_bits());
            }
        }
    }

    #[test]
    fn test_best_alias_tracks_latest_save() {
        let tmp = TempDir::new().unwrap();
        let store = CheckpointStore::new(tmp.path(), "run-a");
        let params = sample_pair();

        assert_eq!(store.best_step().unwrap(), None);
        store.save(3, &params).unwrap();
        assert_eq!(store.best_step().unwrap(), Some(3));
        store.save(9, &params).unwrap();
        assert_eq!(store.best_step().unwrap(), Some(9));

        // Step records accumulate; earlier steps stay loadable.
        let restored = store.load_step(3, &params).unwrap();
        restored.check_same_structure(&params, "test").unwrap();
    }

    #[test]
    fn test_load_without_any_save_is_no_checkpoint() {
        let tmp = TempDir::new().unwrap();
        let store = CheckpointStore::new(tmp.path(), "run-empty");
        let err = store.load_best(&sample_pair()).unwrap_err();
        assert!(matches!(err, Error::NoCheckpoint(_)));
        assert!(err.to_string().contains("run-empty"));
    }

    #[test]
    fn test_load_rejects_template_mismatch() {
        let tmp = TempDir::new().unwrap();
        let store = CheckpointStore::new(tmp.path(), "run-a");
        let params = sample_pair();
        store.save(1, &params).unwrap();

        let mut other = ParamTree::new();
        other.insert("encode.weight", arr1(&[0.0]));
        let template = ModelParams::new(other, ParamTree::new());

        let err = store.load_best(&template).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_runs_are_isolated_by_identity() {
        let tmp = TempDir::new().unwrap();
        let params = sample_pair();
        CheckpointStore::new(tmp.path(), "run-a").save(5, &params).unwrap();

        let other = CheckpointStore::new(tmp.path(), "run-b");
        assert_eq!(other.best_step().unwrap(), None);
    }

    #[test]
    fn test_failed_save_surfaces_persistence_error() {
        let tmp = TempDir::new().unwrap();
        // Root path occupied by a regular file: the run directory can't exist.
        let blocked = tmp.path().join("blocked");
        std::fs::write(&blocked, b"x").unwrap();
        let store = CheckpointStore::new(&blocked, "run-a");
        assert!(store.save(1, &sample_pair()).is_err());
    }

    #[test]
    fn test_no_stray_temp_files_after_save() {
        let tmp = TempDir::new().unwrap();
        let store = CheckpointStore::new(tmp.path(), "run-a");
        store.save(2, &sample_pair()).unwrap();
        let stray = std::fs::read_dir(tmp.path().join("run-a"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .count();
        assert_eq!(stray, 0);
    }

    proptest! {
        #[test]
        fn prop_round_trip_arbitrary_buffers(
            encoder_values in proptest::collection::vec(-1e6_f32..1e6, 1..24),
            decoder_values in proptest::collection::vec(-1e6_f32..1e6, 1..24),
            step in 0usize..100_000,
        ) {
            let tmp = TempDir::new().unwrap();
            let store = CheckpointStore::new(tmp.path(), "prop-run");

            let mut encoder = ParamTree::new();
            encoder.insert("w", Array1::from(encoder_values));
            let mut decoder = ParamTree::new();
            decoder.insert("w", Array1::from(decoder_values));
            let params = ModelParams::new(encoder, decoder);

            store.save(step, &params).unwrap();
            let loaded = store.load_best(&params).unwrap();
            prop_assert_eq!(loaded, params);
        }
    }
}
