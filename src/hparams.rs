use crate::error::{HyperceptionError, Result};
use std::collections::BTreeMap;

/// A single hyperparameter value.
///
/// The search framework hands values over as loosely-typed entries; the typed
/// getters on [`Hparams`] do the narrowing at the point of use.
#[derive(Debug, Clone, PartialEq)]
pub enum Hparam {
    Int(usize),
    Float(f32),
    Str(String),
    Pair(usize, usize),
    Bool(bool),
}

impl From<usize> for Hparam {
    fn from(v: usize) -> Self {
        Hparam::Int(v)
    }
}

impl From<f32> for Hparam {
    fn from(v: f32) -> Self {
        Hparam::Float(v)
    }
}

impl From<&str> for Hparam {
    fn from(v: &str) -> Self {
        Hparam::Str(v.to_string())
    }
}

impl From<String> for Hparam {
    fn from(v: String) -> Self {
        Hparam::Str(v)
    }
}

impl From<(usize, usize)> for Hparam {
    fn from(v: (usize, usize)) -> Self {
        Hparam::Pair(v.0, v.1)
    }
}

impl From<bool> for Hparam {
    fn from(v: bool) -> Self {
        Hparam::Bool(v)
    }
}

/// A flat name -> value hyperparameter mapping.
///
/// Resolution order is "defaults first, then overrides": [`Hparams::merge`]
/// overwrites existing keys with the caller's entries. Unknown keys are kept
/// as-is and simply never read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Hparams {
    values: BTreeMap<String, Hparam>,
}

impl Hparams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Hparam>) {
        self.values.insert(key.into(), value.into());
    }

    /// Builder-style `set`
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Hparam>) -> Self {
        self.set(key, value);
        self
    }

    /// Overwrite entries with the caller-supplied overrides (override wins).
    pub fn merge(&mut self, overrides: &Hparams) {
        for (key, value) in &overrides.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: &str) -> Result<&Hparam> {
        self.values
            .get(key)
            .ok_or_else(|| HyperceptionError::MissingHparam(key.to_string()))
    }

    pub fn get_usize(&self, key: &str) -> Result<usize> {
        match self.get(key)? {
            Hparam::Int(v) => Ok(*v),
            _ => Err(HyperceptionError::HparamType {
                key: key.to_string(),
                expected: "integer",
            }),
        }
    }

    /// Float getter; integer values are widened.
    pub fn get_f32(&self, key: &str) -> Result<f32> {
        match self.get(key)? {
            Hparam::Float(v) => Ok(*v),
            Hparam::Int(v) => Ok(*v as f32),
            _ => Err(HyperceptionError::HparamType {
                key: key.to_string(),
                expected: "float",
            }),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<&str> {
        match self.get(key)? {
            Hparam::Str(v) => Ok(v.as_str()),
            _ => Err(HyperceptionError::HparamType {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get(key)? {
            Hparam::Bool(v) => Ok(*v),
            _ => Err(HyperceptionError::HparamType {
                key: key.to_string(),
                expected: "bool",
            }),
        }
    }

    /// Pair getter; a bare integer n is read as the square pair (n, n).
    pub fn get_pair(&self, key: &str) -> Result<(usize, usize)> {
        match self.get(key)? {
            Hparam::Pair(a, b) => Ok((*a, *b)),
            Hparam::Int(v) => Ok((*v, *v)),
            _ => Err(HyperceptionError::HparamType {
                key: key.to_string(),
                expected: "pair of integers",
            }),
        }
    }
}

/// Full default mapping for the hyperception architecture.
///
/// Covers every key the assembler and compiler consume, so a build with no
/// overrides always resolves. The initial stride adapts to the input: small
/// images (below 32px on the short side) keep full resolution in the stem.
pub fn default_hparams(input_shape: &[usize], _num_classes: usize) -> Hparams {
    let short_side = input_shape.iter().skip(1).copied().min().unwrap_or(0);
    let initial_strides = if short_side >= 32 { (2, 2) } else { (1, 1) };

    Hparams::new()
        .with("kernel_size", (3usize, 3usize))
        .with("initial_strides", initial_strides)
        .with("activation", "relu")
        .with("optimizer", "adam")
        .with("conv2d_num_filters", 64usize)
        .with("sep_num_filters", 256usize)
        .with("num_residual_blocks", 4usize)
        .with("dense_merge_type", "avg")
        .with("num_dense_layers", 1usize)
        .with("dropout_rate", 0.5f32)
        .with("dense_use_bn", true)
        .with("learning_rate", 1e-3f32)
        .with("momentum", 0.9f32)
        .with("learning_rate_decay", 1e-4f32)
}

/// Single known-good configuration, deliberately small.
///
/// Used by the "single" builder variant for quick smoke runs where the search
/// framework wants one concrete model rather than a search space.
pub fn default_fixed_hparams(input_shape: &[usize], num_classes: usize) -> Hparams {
    default_hparams(input_shape, num_classes)
        .with("conv2d_num_filters", 32usize)
        .with("sep_num_filters", 64usize)
        .with("num_residual_blocks", 2usize)
        .with("dropout_rate", 0.25f32)
}
