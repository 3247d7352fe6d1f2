use std::{collections::HashMap, fs, path::Path};

use safetensors::{
    SafeTensors,
    tensor::{Dtype, TensorView},
};

use crate::{
    MlErr, Result,
    arch::{KernelRegression, ModelConfig, layers::TensorSpec},
};

const CONFIG_KEY: &str = "config";

/// Identifies one trained model inside a grid search: the seed run, the architecture and the
/// kernel hyperparameters it was trained with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SnapshotId {
    pub seed: usize,
    pub arch: usize,
    pub hyper: usize,
}

impl SnapshotId {
    pub fn new(seed: usize, arch: usize, hyper: usize) -> Self {
        Self { seed, arch, hyper }
    }

    /// The snapshot's file name, unique for every combination of the three indices.
    pub fn file_name(&self) -> String {
        format!(
            "generator_time{:03}_layer{:03}_hyper{:03}.safetensors",
            self.seed, self.arch, self.hyper
        )
    }
}

/// Writes the parameters and buffers of `model` to `path` as named tensors, recording the model
/// configuration in the file's metadata.
///
/// The kernel matrix isn't stored, it's rebuilt from the configuration on load.
pub fn save(model: &KernelRegression, params: &[f32], path: &Path) -> Result<()> {
    if params.len() != model.size() {
        return Err(MlErr::SizeMismatch {
            what: "saved parameters",
            got: params.len(),
            expected: model.size(),
        });
    }

    let buffers = model.buffers();
    let mut tensors: Vec<(String, Vec<usize>, Vec<u8>)> = Vec::new();

    for (layout, values) in [
        (model.layout(), params),
        (model.buffer_layout(), buffers.as_slice()),
    ] {
        let mut rest = values;
        for (name, spec) in layout {
            let (head, tail) = rest.split_at(spec.len());
            let bytes: Vec<u8> = head.iter().flat_map(|v| v.to_le_bytes()).collect();
            tensors.push((name, spec.shape, bytes));
            rest = tail;
        }
    }

    let mut views = Vec::with_capacity(tensors.len());
    for (name, shape, bytes) in &tensors {
        views.push((name.as_str(), TensorView::new(Dtype::F32, shape.clone(), bytes)?));
    }

    let config = serde_json::to_string(model.config())
        .map_err(|e| MlErr::InvalidConfig(e.to_string()))?;
    let metadata = HashMap::from([(CONFIG_KEY.to_string(), config)]);

    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    safetensors::serialize_to_file(views, &Some(metadata), path)?;
    Ok(())
}

/// Rebuilds the model described by `config` and reads its parameters and buffers from `path`.
///
/// # Errors
/// `Io` if the file can't be read, `Snapshot` if it's malformed or lacks a tensor and
/// `SnapshotMismatch` if it was saved from a different configuration.
pub fn load(config: ModelConfig, path: &Path) -> Result<(KernelRegression, Vec<f32>)> {
    let bytes = fs::read(path)?;

    let (_, metadata) = SafeTensors::read_metadata(&bytes)?;
    let saved = metadata
        .metadata()
        .as_ref()
        .and_then(|m| m.get(CONFIG_KEY))
        .ok_or_else(|| MlErr::SnapshotMismatch("no configuration recorded".into()))?;

    let saved: ModelConfig =
        serde_json::from_str(saved).map_err(|e| MlErr::SnapshotMismatch(e.to_string()))?;

    if saved != config {
        return Err(MlErr::SnapshotMismatch(format!(
            "saved with {saved:?}, expected {config:?}"
        )));
    }

    let mut model = KernelRegression::new(config)?;
    let tensors = SafeTensors::deserialize(&bytes)?;

    let params = read_tensors(&tensors, model.layout())?;
    let buffers = read_tensors(&tensors, model.buffer_layout())?;
    model.set_buffers(&buffers)?;

    Ok((model, params))
}

fn read_tensors(tensors: &SafeTensors, layout: Vec<(String, TensorSpec)>) -> Result<Vec<f32>> {
    let mut values = Vec::with_capacity(layout.iter().map(|(_, spec)| spec.len()).sum());

    for (name, spec) in layout {
        let tensor = tensors.tensor(&name)?;

        if tensor.dtype() != Dtype::F32 || tensor.shape() != spec.shape.as_slice() {
            return Err(MlErr::SnapshotMismatch(format!(
                "tensor {name} is {:?} {:?}, expected F32 {:?}",
                tensor.dtype(),
                tensor.shape(),
                spec.shape
            )));
        }

        values.extend(
            tensor
                .data()
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
        );
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{Bandwidth, KernelHyperparameters};

    #[test]
    fn file_name_is_keyed_by_every_index() {
        assert_eq!(
            SnapshotId::new(2, 0, 13).file_name(),
            "generator_time002_layer000_hyper013.safetensors"
        );
    }

    #[test]
    fn tensors_are_stored_little_endian() {
        let config = ModelConfig::new(
            3,
            vec![2],
            KernelHyperparameters::new(1., Bandwidth::Scalar(0.1)),
            4,
            2,
        );
        let model = KernelRegression::new(config.clone()).unwrap();
        let params: Vec<f32> = (0..model.size()).map(|i| i as f32 * 0.25 - 1.).collect();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SnapshotId::new(0, 0, 0).file_name());
        save(&model, &params, &path).unwrap();

        let bytes = fs::read(&path).unwrap();
        let tensors = SafeTensors::deserialize(&bytes).unwrap();
        let expected: Vec<u8> = params[params.len() - 4..]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        assert_eq!(tensors.tensor("baseline").unwrap().data(), expected.as_slice());

        let (_, loaded) = load(config, &path).unwrap();
        assert_eq!(loaded, params);
    }
}
