use crate::io::StateDict;
use crate::nn::Module;
use crate::tensor::Tensor;

/// One slot in a [`Sequential`]: a layer plus an optional stable name.
///
/// Named entries give the state dict human-readable keys and let callers
/// inspect the assembled topology (which merge layer was chosen, how many
/// residual blocks exist) without downcasting.
pub struct LayerEntry {
    pub(crate) name: Option<String>,
    pub(crate) layer: Box<dyn Module>,
}

pub struct Sequential {
    pub(crate) layers: Vec<LayerEntry>,
}

impl Sequential {
    /// Construct from unnamed layers; names fall back to numeric indices.
    pub fn new(layers: Vec<Box<dyn Module>>) -> Self {
        Sequential {
            layers: layers
                .into_iter()
                .map(|layer| LayerEntry { name: None, layer })
                .collect(),
        }
    }

    pub fn builder() -> SequentialBuilder {
        SequentialBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Names of all entries, in order (`None` for unnamed ones).
    pub fn layer_names(&self) -> Vec<Option<&str>> {
        self.layers
            .iter()
            .map(|entry| entry.name.as_deref())
            .collect()
    }

    pub fn contains_named(&self, name: &str) -> bool {
        self.layers
            .iter()
            .any(|entry| entry.name.as_deref() == Some(name))
    }

    fn entry_key(&self, i: usize) -> String {
        match &self.layers[i].name {
            Some(name) => name.clone(),
            None => i.to_string(),
        }
    }
}

impl Module for Sequential {
    fn forward(&self, x: &Tensor) -> Tensor {
        let mut current = x.clone();
        for entry in &self.layers {
            current = entry.layer.forward(&current);
        }
        current
    }

    fn parameters(&self) -> Vec<Tensor> {
        self.layers
            .iter()
            .flat_map(|entry| entry.layer.parameters())
            .collect()
    }

    fn state_dict(&self) -> StateDict {
        let mut state = StateDict::new();
        for i in 0..self.layers.len() {
            let prefix = self.entry_key(i);
            for (key, value) in self.layers[i].layer.state_dict() {
                state.insert(format!("{}.{}", prefix, key), value);
            }
        }
        state
    }

    fn load_state_dict(&mut self, state: &StateDict) {
        for i in 0..self.layers.len() {
            let prefix = format!("{}.", self.entry_key(i));
            // Filter keys for this layer
            let mut sub_state = StateDict::new();
            for (key, value) in state {
                if let Some(sub_key) = key.strip_prefix(&prefix) {
                    if !sub_key.is_empty() {
                        sub_state.insert(sub_key.to_string(), value.clone());
                    }
                }
            }
            if !sub_state.is_empty() {
                self.layers[i].layer.load_state_dict(&sub_state);
            }
        }
    }

    fn train(&mut self, mode: bool) {
        for entry in &mut self.layers {
            entry.layer.train(mode);
        }
    }
}

/// Accumulates [`LayerEntry`]s for a [`Sequential`].
///
/// The assembler uses named entries for every stage it emits ("conv1",
/// "residual_0", "classifier", ...); unnamed entries fall back to their index
/// in state-dict keys. An empty name counts as unnamed.
///
/// ```
/// use hyperception::nn::layers::{GlobalAvgPool2d, Linear, Sequential, Softmax};
///
/// let head = Sequential::builder()
///     .add_named("global_avg_pool", Box::new(GlobalAvgPool2d))
///     .add_named("classifier", Box::new(Linear::new(64, 10, true)))
///     .add_named("softmax", Box::new(Softmax))
///     .build();
/// assert!(head.contains_named("classifier"));
/// ```
pub struct SequentialBuilder {
    entries: Vec<LayerEntry>,
}

impl SequentialBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn add_unnamed(mut self, layer: Box<dyn Module>) -> Self {
        self.entries.push(LayerEntry { name: None, layer });
        self
    }

    #[must_use]
    pub fn add_named(mut self, name: impl Into<String>, layer: Box<dyn Module>) -> Self {
        let name = name.into();
        self.entries.push(LayerEntry {
            name: if name.is_empty() { None } else { Some(name) },
            layer,
        });
        self
    }

    #[must_use]
    pub fn build(self) -> Sequential {
        Sequential {
            layers: self.entries,
        }
    }
}

impl Default for SequentialBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::layers::{Activation, GlobalMaxPool2d, Linear};
    use crate::tensor::RawTensor;

    #[test]
    fn test_forward_chains_layers() {
        let model = Sequential::new(vec![
            Box::new(Linear::new(4, 3, true)),
            Box::new(Activation::Relu),
            Box::new(Linear::new(3, 2, true)),
        ]);
        let x = RawTensor::randn(&[5, 4]);
        let y = model.forward(&x);
        assert_eq!(y.borrow().shape, vec![5, 2]);
    }

    #[test]
    fn test_state_dict_uses_names_when_present() {
        let model = Sequential::builder()
            .add_named("fc", Box::new(Linear::new(2, 2, true)))
            .add_unnamed(Box::new(Activation::Relu))
            .build();
        let state = model.state_dict();
        assert!(state.contains_key("fc.weight"));
        assert!(state.contains_key("fc.bias"));
    }

    #[test]
    fn test_builder_stage_names_are_queryable_in_order() {
        // a miniature exit flow, named the way the assembler names stages
        let head = Sequential::builder()
            .add_named("global_max_pool", Box::new(GlobalMaxPool2d))
            .add_named("classifier", Box::new(Linear::new(8, 3, true)))
            .add_unnamed(Box::new(Activation::Relu))
            .build();

        assert_eq!(head.len(), 3);
        assert!(head.contains_named("global_max_pool"));
        assert!(head.contains_named("classifier"));
        assert!(!head.contains_named("dense_0"));
        assert_eq!(
            head.layer_names(),
            vec![Some("global_max_pool"), Some("classifier"), None]
        );
    }

    #[test]
    fn test_unnamed_entries_key_by_index() {
        let model = Sequential::builder()
            .add_unnamed(Box::new(Linear::new(2, 2, true)))
            .add_named("", Box::new(Linear::new(2, 2, true)))
            .build();
        // empty string counts as unnamed, so both fall back to indices
        let state = model.state_dict();
        assert!(state.contains_key("0.weight"));
        assert!(state.contains_key("1.weight"));
        assert_eq!(model.layer_names(), vec![None, None]);
    }
}
