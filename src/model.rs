use crate::error::{HyperceptionError, Result};
use crate::hparams::Hparams;
use crate::io::StateDict;
use crate::nn::layers::Sequential;
use crate::nn::metrics;
use crate::nn::optim::{Adam, Optimizer, RmsProp, Sgd};
use crate::nn::Module;
use crate::tensor::{RawTensor, Tensor};

/// Loss bound at compile time. Hyperception always trains with categorical
/// cross-entropy, but the binding is explicit so a compiled model can say so.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loss {
    CategoricalCrossentropy,
}

impl Loss {
    pub fn compute(&self, pred: &Tensor, target: &Tensor) -> Tensor {
        match self {
            Loss::CategoricalCrossentropy => RawTensor::categorical_crossentropy(pred, target),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Loss::CategoricalCrossentropy => "categorical_crossentropy",
        }
    }
}

/// Metric bound at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Accuracy,
}

impl Metric {
    pub fn compute(&self, pred: &Tensor, target: &Tensor) -> f32 {
        match self {
            Metric::Accuracy => metrics::accuracy(pred, target),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
        }
    }
}

/// Resolved optimizer choice with its sub-parameters.
///
/// Built from the `optimizer` hyperparameter string; each variant pulls
/// exactly the keys it needs. This is the module's one explicit error path:
/// an unrecognized name fails, naming the offending string.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizerConfig {
    Adam {
        learning_rate: f32,
    },
    Sgd {
        learning_rate: f32,
        momentum: f32,
        decay: f32,
    },
    RmsProp {
        learning_rate: f32,
        decay: f32,
    },
}

impl OptimizerConfig {
    pub fn from_hparams(hp: &Hparams) -> Result<Self> {
        match hp.get_str("optimizer")? {
            "adam" => Ok(OptimizerConfig::Adam {
                learning_rate: hp.get_f32("learning_rate")?,
            }),
            "sgd" => Ok(OptimizerConfig::Sgd {
                learning_rate: hp.get_f32("learning_rate")?,
                momentum: hp.get_f32("momentum")?,
                decay: hp.get_f32("learning_rate_decay")?,
            }),
            "rmsprop" => Ok(OptimizerConfig::RmsProp {
                learning_rate: hp.get_f32("learning_rate")?,
                decay: hp.get_f32("learning_rate_decay")?,
            }),
            other => Err(HyperceptionError::UnsupportedOptimizer(other.to_string())),
        }
    }

    /// Instantiate the optimizer over a parameter list.
    pub fn build(&self, params: Vec<Tensor>) -> Box<dyn Optimizer> {
        match *self {
            OptimizerConfig::Adam { learning_rate } => Box::new(Adam::new(params, learning_rate)),
            OptimizerConfig::Sgd {
                learning_rate,
                momentum,
                decay,
            } => Box::new(Sgd::new(params, learning_rate, momentum, decay)),
            OptimizerConfig::RmsProp {
                learning_rate,
                decay,
            } => Box::new(RmsProp::new(params, learning_rate, decay)),
        }
    }
}

struct Compiled {
    config: OptimizerConfig,
    optimizer: Box<dyn Optimizer>,
    loss: Loss,
    metric: Metric,
}

/// An assembled hyperception graph, optionally compiled for training.
///
/// `compile` binds the hyperparameter-selected optimizer together with the
/// fixed loss (categorical cross-entropy) and metric (accuracy).
pub struct Model {
    graph: Sequential,
    input_shape: Vec<usize>,
    num_classes: usize,
    compiled: Option<Compiled>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("input_shape", &self.input_shape)
            .field("num_classes", &self.num_classes)
            .field("compiled", &self.compiled.is_some())
            .finish_non_exhaustive()
    }
}

impl Model {
    pub(crate) fn new(graph: Sequential, input_shape: Vec<usize>, num_classes: usize) -> Self {
        Model {
            graph,
            input_shape,
            num_classes,
            compiled: None,
        }
    }

    /// Bind optimizer, loss, and metric per the resolved hyperparameters.
    pub fn compile(&mut self, hp: &Hparams) -> Result<()> {
        let config = OptimizerConfig::from_hparams(hp)?;
        let optimizer = config.build(self.graph.parameters());
        self.compiled = Some(Compiled {
            config,
            optimizer,
            loss: Loss::CategoricalCrossentropy,
            metric: Metric::Accuracy,
        });
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    pub fn optimizer_config(&self) -> Option<&OptimizerConfig> {
        self.compiled.as_ref().map(|c| &c.config)
    }

    pub fn optimizer_mut(&mut self) -> Option<&mut (dyn Optimizer + 'static)> {
        self.compiled.as_mut().map(move |c| c.optimizer.as_mut())
    }

    pub fn loss(&self) -> Option<Loss> {
        self.compiled.as_ref().map(|c| c.loss)
    }

    pub fn metric(&self) -> Option<Metric> {
        self.compiled.as_ref().map(|c| c.metric)
    }

    /// Per-sample input shape (channels, height, width).
    pub fn input_shape(&self) -> &[usize] {
        &self.input_shape
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn graph(&self) -> &Sequential {
        &self.graph
    }

    /// Names of the named stages in graph order.
    pub fn layer_names(&self) -> Vec<Option<&str>> {
        self.graph.layer_names()
    }

    pub fn forward(&self, x: &Tensor) -> Tensor {
        self.graph.forward(x)
    }

    pub fn parameters(&self) -> Vec<Tensor> {
        self.graph.parameters()
    }

    pub fn train(&mut self, mode: bool) {
        self.graph.train(mode);
    }

    pub fn eval(&mut self) {
        self.graph.eval();
    }

    pub fn state_dict(&self) -> StateDict {
        self.graph.state_dict()
    }

    pub fn load_state_dict(&mut self, state: &StateDict) {
        self.graph.load_state_dict(state);
    }

    /// One-line-per-stage description for logs and quick inspection.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "hyperception: input {:?}, {} classes, {} stages\n",
            self.input_shape,
            self.num_classes,
            self.graph.len()
        );
        for (i, name) in self.graph.layer_names().iter().enumerate() {
            out.push_str(&format!("  {:>2}: {}\n", i, name.unwrap_or("(unnamed)")));
        }
        if let Some(c) = &self.compiled {
            out.push_str(&format!(
                "  compiled: {:?}, loss={}, metric={}\n",
                c.config,
                c.loss.name(),
                c.metric.name()
            ));
        }
        out
    }
}
