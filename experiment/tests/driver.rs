use std::{fs, path::Path};

use experiment::{
    ExperimentConfig, ExperimentErr,
    config::{BestCase, RunMode, Seeds},
};

const STRUCTURES: [&str; 12] = [
    "C", "CC", "CCC", "CCCC", "CCO", "CCN", "CO", "CN", "c1ccccc1", "CC(C)C", "CC=O", "C#N",
];

fn write_table(path: &Path) {
    let mut table = String::from("smiles,p0,p1,p2,p3,p4,p5,p6,p7\n");

    for (i, structure) in STRUCTURES.iter().enumerate() {
        let values: Vec<String> = (0..8)
            .map(|w| format!("{}", 10. + (i as f32 * 0.5 + w as f32 * 0.3).sin()))
            .collect();
        table.push_str(&format!("{structure},{}\n", values.join(",")));
    }
    table.push_str("C(,1,1,1,1,1,1,1,1\n");

    fs::write(path, table).unwrap();
}

fn config(root: &Path) -> ExperimentConfig {
    let input = root.join("toy.csv");
    write_table(&input);

    let json = format!(
        r#"{{
            "dataset": "toy",
            "input": {input:?},
            "output_dir": {output:?},
            "model_dir": {models:?},
            "encoder": {{"width": 64, "max_path": 3}},
            "test_frac": 0.25,
            "points": 8,
            "centers": 3,
            "architectures": [[8, 4], [6]],
            "kernels": [{{"height": 1.0, "bandwidth": 0.05}}],
            "seeds": 2,
            "epochs": 5,
            "batch_size": 4,
            "learning_rate": 0.01,
            "report_every": 0
        }}"#,
        input = input,
        output = root.join("out"),
        models = root.join("models"),
    );

    serde_json::from_str(&json).unwrap()
}

#[test]
fn grid_run_writes_snapshots_profiles_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let outcomes = experiment::run(config(root)).unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.result.is_ok()));

    for name in [
        "generator_time000_layer000_hyper000.safetensors",
        "generator_time001_layer000_hyper000.safetensors",
        "generator_time001_layer001_hyper000.safetensors",
    ] {
        assert!(root.join("models").join(name).exists(), "{name}");
    }

    let profiles = root.join("out").join("layer001_hyper000");
    let exp = fs::read_to_string(profiles.join("exp_profiles_toy.csv")).unwrap();
    let pred = fs::read_to_string(profiles.join("pred_profiles_toy.csv")).unwrap();

    // 12 valid rows, a quarter of them held out
    assert_eq!(exp.lines().count(), 1 + 3);
    assert_eq!(pred.lines().count(), 1 + 3);
    assert!(exp.starts_with("id,p0,p1"));

    let summary = fs::read_to_string(root.join("out").join("metrics_toy.csv")).unwrap();
    assert_eq!(summary.lines().count(), 1 + 2);
}

#[test]
fn evaluation_only_reproduces_the_metrics() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());

    let trained = experiment::run(config.clone()).unwrap();

    let mut evaluate = config;
    evaluate.mode = RunMode::Evaluate;
    let evaluated = experiment::run(evaluate).unwrap();

    for (a, b) in trained.iter().zip(&evaluated) {
        let (a, _) = a.result.as_ref().unwrap();
        let (b, _) = b.result.as_ref().unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn missing_snapshots_fail_only_their_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.mode = RunMode::Evaluate;
    config.model_dir = dir.path().join("nothing here");

    let outcomes = experiment::run(config).unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.result.is_err()));
}

#[test]
fn best_case_exports_to_the_output_root() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.best_case = Some(BestCase { arch: 1, hyper: 0 });
    config.seeds = Seeds::List(vec![42]);

    let outcomes = experiment::run(config).unwrap();

    assert_eq!(outcomes.len(), 1);
    assert!(dir.path().join("out").join("exp_profiles_toy.csv").exists());
    assert!(
        dir.path()
            .join("models")
            .join("generator_time000_layer001_hyper000.safetensors")
            .exists()
    );
}

#[test]
fn wrong_point_count_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.points = Some(9);

    assert!(matches!(experiment::run(config), Err(ExperimentErr::Config(_))));
}
