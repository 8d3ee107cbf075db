//! End-to-end properties of the hyperception builder: shape round-trips,
//! override precedence, merge-layer selection, and optimizer binding.

use hyperception::{
    seed_rng, Hparams, Hyperception, Loss, Metric, Model, OptimizerConfig, RawTensor, TensorOps,
};

fn small(overrides: Hparams) -> Model {
    Hyperception::new(&[1, 8, 8], 3)
        .hparam("conv2d_num_filters", 4usize)
        .hparam("sep_num_filters", 4usize)
        .hparam("num_residual_blocks", 1usize)
        .hparams(overrides)
        .build()
        .expect("small model builds")
}

#[test]
fn default_build_succeeds_and_output_matches_class_count() {
    seed_rng(1);
    let mut model = small(Hparams::new());
    model.eval();

    let batch = 2;
    let x = RawTensor::randn(&[batch, 1, 8, 8]);
    let y = model.forward(&x);
    assert_eq!(y.shape(), vec![batch, 3]);

    // softmax output: every row is a probability distribution
    let data = y.borrow().data.clone();
    for r in 0..batch {
        let row = &data[r * 3..(r + 1) * 3];
        let sum: f32 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4, "row {} sums to {}", r, sum);
        assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }
}

#[test]
fn zero_residual_blocks_override_takes_precedence() {
    let model = small(Hparams::new().with("num_residual_blocks", 0usize));
    assert!(!model.graph().contains_named("residual_0"));
    // the downsampling exit block is always present
    assert!(model.graph().contains_named("residual_exit"));
}

#[test]
fn residual_block_count_matches_hparam() {
    let model = small(Hparams::new().with("num_residual_blocks", 3usize));
    for i in 0..3 {
        assert!(model.graph().contains_named(&format!("residual_{}", i)));
    }
    assert!(!model.graph().contains_named("residual_3"));
}

#[test]
fn dense_merge_type_selects_distinct_reduction_layers() {
    let flatten = small(Hparams::new().with("dense_merge_type", "flatten"));
    let avg = small(Hparams::new().with("dense_merge_type", "avg"));
    // anything outside {"flatten", "avg"} falls back to global max pooling
    let fallback = small(Hparams::new().with("dense_merge_type", "typo"));

    assert!(flatten.graph().contains_named("flatten"));
    assert!(!flatten.graph().contains_named("global_avg_pool"));

    assert!(avg.graph().contains_named("global_avg_pool"));
    assert!(!avg.graph().contains_named("flatten"));

    assert!(fallback.graph().contains_named("global_max_pool"));
    assert!(!fallback.graph().contains_named("flatten"));
    assert!(!fallback.graph().contains_named("global_avg_pool"));
}

#[test]
fn flatten_merge_still_forwards_to_class_count() {
    seed_rng(2);
    let mut model = small(Hparams::new().with("dense_merge_type", "flatten"));
    model.eval();
    let y = model.forward(&RawTensor::randn(&[1, 1, 8, 8]));
    assert_eq!(y.shape(), vec![1, 3]);
}

#[test]
fn adam_carries_exactly_the_given_learning_rate() {
    let model = small(
        Hparams::new()
            .with("optimizer", "adam")
            .with("learning_rate", 0.005f32),
    );
    assert_eq!(
        model.optimizer_config(),
        Some(&OptimizerConfig::Adam {
            learning_rate: 0.005
        })
    );
}

#[test]
fn sgd_requires_and_applies_momentum_and_decay() {
    let model = small(
        Hparams::new()
            .with("optimizer", "sgd")
            .with("learning_rate", 0.1f32)
            .with("momentum", 0.8f32)
            .with("learning_rate_decay", 1e-3f32),
    );
    assert_eq!(
        model.optimizer_config(),
        Some(&OptimizerConfig::Sgd {
            learning_rate: 0.1,
            momentum: 0.8,
            decay: 1e-3
        })
    );
}

#[test]
fn rmsprop_carries_learning_rate_and_decay() {
    let model = small(
        Hparams::new()
            .with("optimizer", "rmsprop")
            .with("learning_rate", 0.02f32)
            .with("learning_rate_decay", 1e-4f32),
    );
    assert_eq!(
        model.optimizer_config(),
        Some(&OptimizerConfig::RmsProp {
            learning_rate: 0.02,
            decay: 1e-4
        })
    );
}

#[test]
fn unsupported_optimizer_fails_naming_the_value() {
    let err = Hyperception::new(&[1, 8, 8], 3)
        .hparam("optimizer", "xyz")
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("xyz"), "got: {}", err);
}

#[test]
fn zero_dense_layers_goes_straight_to_classifier() {
    let model = small(Hparams::new().with("num_dense_layers", 0usize));
    assert!(!model.graph().contains_named("dense_0"));
    assert!(model.graph().contains_named("classifier"));

    // classifier and softmax close out the graph
    let names = model.layer_names();
    let n = names.len();
    assert_eq!(names[n - 2], Some("classifier"));
    assert_eq!(names[n - 1], Some("softmax"));
}

#[test]
fn compiled_model_binds_fixed_loss_and_metric() {
    let model = small(Hparams::new());
    assert_eq!(model.loss(), Some(Loss::CategoricalCrossentropy));
    assert_eq!(model.metric(), Some(Metric::Accuracy));
}

#[test]
fn loss_and_metric_run_against_model_output() {
    seed_rng(3);
    let mut model = small(Hparams::new());
    model.eval();

    let x = RawTensor::randn(&[4, 1, 8, 8]);
    let y = model.forward(&x);
    let targets = RawTensor::new(
        vec![
            1.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, //
            0.0, 0.0, 1.0, //
            1.0, 0.0, 0.0,
        ],
        &[4, 3],
        false,
    );

    let loss = model.loss().unwrap().compute(&y, &targets);
    assert!(loss.borrow().data[0] > 0.0);

    let acc = model.metric().unwrap().compute(&y, &targets);
    assert!((0.0..=1.0).contains(&acc));
}

#[test]
fn optimizer_step_updates_parameters_with_gradients() {
    seed_rng(4);
    let mut model = small(Hparams::new().with("optimizer", "adam"));

    // Plant a gradient on every parameter, as a training loop would
    for p in model.parameters() {
        let len = p.borrow().data.len();
        p.borrow_mut().grad = Some(vec![1.0; len]);
    }
    let before: Vec<f32> = model.parameters().iter().map(|p| p.borrow().data[0]).collect();

    model.optimizer_mut().unwrap().step();

    let after: Vec<f32> = model.parameters().iter().map(|p| p.borrow().data[0]).collect();
    assert!(before.iter().zip(&after).any(|(a, b)| a != b));

    model.optimizer_mut().unwrap().zero_grad();
    assert!(model.parameters().iter().all(|p| p.borrow().grad.is_none()));
}

#[test]
fn state_dict_round_trips_through_a_fresh_model() {
    seed_rng(5);
    let model = small(Hparams::new());
    let state = model.state_dict();

    seed_rng(99);
    let mut fresh = small(Hparams::new());
    fresh.load_state_dict(&state);

    for (pa, pb) in model.parameters().iter().zip(&fresh.parameters()) {
        assert_eq!(pa.borrow().data, pb.borrow().data);
    }
}
