use crate::error::Result;
use crate::nn::Module;
use crate::tensor::Tensor;
use bincode::{config, Decode, Encode};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Error, Read, Write};

pub type StateDict = BTreeMap<String, TensorData>;

// Serializable representation of tensor data
#[derive(Encode, Decode, Clone, Debug)]
pub struct TensorData {
    pub data: Vec<f32>,
    pub shape: Vec<usize>,
}

impl TensorData {
    pub fn from_tensor(t: &Tensor) -> Self {
        let borrowed = t.borrow();
        TensorData {
            data: borrowed.data.clone(),
            shape: borrowed.shape.clone(),
        }
    }

    pub fn to_tensor(&self, requires_grad: bool) -> Tensor {
        crate::tensor::RawTensor::new(self.data.clone(), &self.shape, requires_grad)
    }
}

/// Summary of differences between two state dicts.
///
/// `expected` is usually `model.state_dict()` for the current architecture,
/// `loaded` is what came off disk. Relevant here because a hyperparameter
/// change (filter counts, block counts) silently changes the architecture,
/// and this surfaces exactly which weights no longer line up.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StateDictDiff {
    /// Keys that exist in `expected` but are missing from `loaded`.
    pub missing_keys: Vec<String>,
    /// Keys that exist in `loaded` but not in `expected`.
    pub unexpected_keys: Vec<String>,
    /// Keys present in both, but with differing shapes:
    /// `(key, expected_shape, loaded_shape)`.
    pub shape_mismatches: Vec<(String, Vec<usize>, Vec<usize>)>,
}

impl StateDictDiff {
    pub fn is_empty(&self) -> bool {
        self.missing_keys.is_empty()
            && self.unexpected_keys.is_empty()
            && self.shape_mismatches.is_empty()
    }
}

/// Compute a diff between an "expected" and a "loaded" state dict.
///
/// Purely informational; nothing is mutated.
pub fn diff_state_dict(expected: &StateDict, loaded: &StateDict) -> StateDictDiff {
    let mut diff = StateDictDiff::default();

    for (key, expected_td) in expected.iter() {
        match loaded.get(key) {
            None => diff.missing_keys.push(key.clone()),
            Some(actual_td) => {
                if expected_td.shape != actual_td.shape {
                    diff.shape_mismatches.push((
                        key.clone(),
                        expected_td.shape.clone(),
                        actual_td.shape.clone(),
                    ));
                }
            }
        }
    }

    for key in loaded.keys() {
        if !expected.contains_key(key) {
            diff.unexpected_keys.push(key.clone());
        }
    }

    diff
}

/// Load a state dict and report which keys were missing/unexpected or mismatched.
pub fn load_state_dict_checked<M: Module + ?Sized>(
    module: &mut M,
    state: &StateDict,
) -> StateDictDiff {
    let expected = module.state_dict();
    let diff = diff_state_dict(&expected, state);
    module.load_state_dict(state);
    diff
}

pub fn save_state_dict(state: &StateDict, path: &str) -> Result<()> {
    let mut file = File::create(path)?;
    let encoded = bincode::encode_to_vec(state, config::standard()).map_err(Error::other)?;
    file.write_all(&encoded)?;
    Ok(())
}

pub fn load_state_dict(path: &str) -> Result<StateDict> {
    let mut file = File::open(path)?;
    let mut buffer = Vec::new();
    file.read_to_end(&mut buffer)?;
    let (state, _): (StateDict, _) =
        bincode::decode_from_slice(&buffer, config::standard()).map_err(Error::other)?;
    Ok(state)
}

#[cfg(test)]
mod io_tests {
    use super::*;
    use crate::nn::layers::{Activation, Linear, Sequential};
    use crate::nn::Module;

    fn small_mlp() -> Sequential {
        Sequential::builder()
            .add_named("fc1", Box::new(Linear::new(2, 3, true)))
            .add_unnamed(Box::new(Activation::Relu))
            .add_named("fc2", Box::new(Linear::new(3, 1, true)))
            .build()
    }

    #[test]
    fn test_save_load_round_trip() {
        let model = small_mlp();

        let path = std::env::temp_dir().join("hyperception_test_seq.bin");
        let path_str = path.to_str().unwrap();

        let state = model.state_dict();
        save_state_dict(&state, path_str).unwrap();

        let mut model2 = small_mlp();

        // Fresh init differs from the saved weights
        let p1 = model.parameters();
        let p2 = model2.parameters();
        assert_ne!(p1[0].borrow().data, p2[0].borrow().data);

        let loaded = load_state_dict(path_str).unwrap();
        model2.load_state_dict(&loaded);

        let p2 = model2.parameters();
        for (t1, t2) in p1.iter().zip(p2.iter()) {
            assert_eq!(t1.borrow().data, t2.borrow().data);
        }
    }

    #[test]
    fn test_load_missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("hyperception_no_such_checkpoint.bin");
        let err = load_state_dict(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, crate::error::HyperceptionError::Io(_)));
    }

    #[test]
    fn test_state_dict_diff_reports_mismatches() {
        let layer = Linear::new(2, 3, true);
        let expected = layer.state_dict();

        let mut loaded = expected.clone();
        loaded.remove("bias");
        loaded.insert(
            "extra".to_string(),
            TensorData {
                data: vec![0.0],
                shape: vec![1],
            },
        );
        if let Some(td) = loaded.get_mut("weight") {
            td.shape = vec![999];
        }

        let diff = diff_state_dict(&expected, &loaded);
        assert!(!diff.is_empty());
        assert!(diff.missing_keys.contains(&"bias".to_string()));
        assert!(diff.unexpected_keys.contains(&"extra".to_string()));
        assert!(diff
            .shape_mismatches
            .iter()
            .any(|(k, _exp, _act)| k == "weight"));
    }
}
