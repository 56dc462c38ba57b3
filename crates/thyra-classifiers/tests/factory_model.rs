use thyra_classifiers::config::{ModelConfig, ModelType};
use thyra_classifiers::math::Array2;
use thyra_classifiers::models::factory;
use thyra_classifiers::Label;

fn params() -> ModelConfig {
    ModelConfig {
        learning_rate: 0.1,
        model_type: ModelType::GBDT {
            max_depth: 3,
            num_boost_round: 3,
            debug: false,
            training_optimization_level: 2,
            loss_type: "LogLikelyhood".to_string(),
        },
    }
}

#[test]
fn test_factory_builds_and_predicts() {
    // tiny dataset
    let x = Array2::from_shape_vec(
        (6, 2),
        vec![
            1.0, 0.0, // malignant
            0.0, 1.0, // benign
            1.0, 0.1, // malignant
            0.0, 0.9, // benign
            1.1, 0.0, // malignant
            0.0, 1.2, // benign
        ],
    )
    .expect("failed to create feature matrix");

    let y: Vec<Label> = (0..6).map(|i| Label::from_class_index((i + 1) % 2)).collect();

    let mut model = factory::build_model(params());
    assert_eq!(model.name(), "gbdt");
    model.fit(&x, &y).unwrap();
    let probs = model.predict_proba(&x).unwrap();
    assert_eq!(probs.len(), x.nrows());

    let restored = factory::restore_model(params(), &model.to_json().unwrap()).unwrap();
    assert_eq!(restored.predict_proba(&x).unwrap(), probs);
}

#[test]
fn test_restore_rejects_garbage() {
    assert!(factory::restore_model(params(), "{not json").is_err());
}
