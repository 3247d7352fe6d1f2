mod common;

use std::num::NonZeroUsize;

use machine_learning::training::TrainerBuilder;

#[test]
fn fifty_epochs_lower_the_loss() {
    let data = common::synthetic(10);
    let mut trainer = TrainerBuilder::new()
        .build(common::config(vec![8, 4], 4), &common::settings(50, 0))
        .unwrap();

    let initial = trainer.loss(&data).unwrap();
    let losses = trainer.train(&data).unwrap();
    let last = trainer.loss(&data).unwrap();

    assert_eq!(losses.len(), 50);
    assert!(last < initial, "initial {initial}, final {last}");
}

#[test]
fn same_seed_same_parameters() {
    let data = common::synthetic(10);
    let train = |seed| {
        let mut trainer = TrainerBuilder::new()
            .build(common::config(vec![8, 4], 4), &common::settings(5, seed))
            .unwrap();

        trainer.train(&data).unwrap();
        trainer.params().to_vec()
    };

    assert_eq!(train(1), train(1));
    assert_ne!(train(1), train(2));
}

#[test]
fn single_center_trains() {
    let data = common::synthetic(6);
    let mut config = common::config(vec![8], 1);
    config.batch_norm = true;

    let mut trainer = TrainerBuilder::new()
        .build(config, &common::settings(3, 0))
        .unwrap();
    trainer.train(&data).unwrap();

    let (mut model, params) = trainer.into_parts();
    let out = model.predict(&params, data.x()).unwrap();

    assert_eq!(out.dim(), (6, common::POINTS));
    assert!(out.iter().all(|v| v.is_finite()));
}

#[test]
fn single_row_remainder_keeps_batch_norm_variance() {
    let data = common::synthetic(10);
    let mut config = common::config(vec![6], 4);
    config.batch_norm = true;

    let mut settings = common::settings(100, 0);
    settings.batch_size = NonZeroUsize::new(3).unwrap();

    let mut trainer = TrainerBuilder::new().build(config, &settings).unwrap();
    trainer.train(&data).unwrap();

    let (mut model, params) = trainer.into_parts();
    let mut offset = 0;
    let mut running_var = Vec::new();
    let buffers = model.buffers();
    for (name, spec) in model.buffer_layout() {
        if name.ends_with("running_var") {
            running_var.extend_from_slice(&buffers[offset..offset + spec.len()]);
        }
        offset += spec.len();
    }

    assert_eq!(running_var.len(), 6);
    assert!(running_var.iter().all(|&v| v > 1e-4), "{running_var:?}");

    let out = model.predict(&params, data.x()).unwrap();
    assert!(out.iter().all(|v| v.is_finite() && v.abs() < 10.), "{out:?}");
}
