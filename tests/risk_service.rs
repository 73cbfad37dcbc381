use loan_default_pipeline::config::{AppConfig, ModelFormat, ModelSpec};
use loan_default_pipeline::consumer::{handle_request, Route};
use loan_default_pipeline::models::RiskModel;
use loan_default_pipeline::service::SyntheticPrediction;
use loan_default_pipeline::synthetic::{SyntheticConfig, SyntheticGenerator};
use loan_default_pipeline::types::{ApiResponse, LoanApplication, PredictionResult};
use loan_default_pipeline::{EnsemblePredictor, PipelineError, PreprocessingPipeline, RiskService};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

struct StubModel {
    name: &'static str,
    probability: f64,
    width: usize,
}

impl RiskModel for StubModel {
    fn name(&self) -> &str {
        self.name
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.width)
    }

    fn predict_probability(&self, _features: &[f32]) -> loan_default_pipeline::Result<f64> {
        Ok(self.probability)
    }
}

fn training_set() -> (Vec<LoanApplication>, Vec<u8>) {
    let generator = SyntheticGenerator::default();
    let records = generator
        .generate_labelled_with_rng(200, 0.3, &mut StdRng::seed_from_u64(5))
        .unwrap();
    let labels = records.iter().map(|r| u8::from(r.likely_default)).collect();
    let rows = records.into_iter().map(|r| r.application).collect();
    (rows, labels)
}

fn fitted_pipeline() -> PreprocessingPipeline {
    let (rows, labels) = training_set();
    let mut pipeline = PreprocessingPipeline::new();
    pipeline.fit(&rows, &labels).unwrap();
    pipeline
}

fn applicant() -> LoanApplication {
    LoanApplication {
        age: 25,
        income: 42_000.0,
        experience: 1.0,
        current_job_years: 1.0,
        current_house_years: 3.0,
        home_ownership: "rented".to_string(),
        car_ownership: "no".to_string(),
        profession: "Software_Developer".to_string(),
        state: "maharashtra".to_string(),
    }
}

fn stub_service(p1: f64, p2: f64, p3: f64) -> RiskService {
    let pipeline = fitted_pipeline();
    let width = pipeline.width().unwrap();
    let ensemble = EnsemblePredictor::new(
        Arc::new(StubModel { name: "forest", probability: p1, width }),
        Arc::new(StubModel { name: "xgboost", probability: p2, width }),
        Arc::new(StubModel { name: "network", probability: p3, width }),
    );
    RiskService::new(pipeline, ensemble, SyntheticGenerator::default()).unwrap()
}

fn write_network(path: &Path, width: usize, bias: f64) {
    let weights = vec![0.0; width];
    let network = serde_json::json!({
        "layers": [{
            "weights": [weights],
            "bias": [bias],
            "activation": "sigmoid"
        }]
    });
    fs::write(path, serde_json::to_vec(&network).unwrap()).unwrap();
}

#[test]
fn test_network_probability_is_headline_score() {
    let service = stub_service(0.9, 0.2, 0.73);
    let result = service.predict(&applicant()).unwrap();

    assert_eq!(result.default_probability, 0.73);
    assert_eq!(result.votes(), [1, 0, 1]);
    assert_eq!(result.ensemble_prediction, 1);
    assert_eq!(service.metrics().predictions.load(Ordering::Relaxed), 1);
}

#[test]
fn test_invalid_application_rejected_before_scoring() {
    let service = stub_service(0.9, 0.9, 0.9);
    let mut young = applicant();
    young.age = 16;

    let err = service.predict(&young).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidInput(_)));
    assert_eq!(service.metrics().predictions.load(Ordering::Relaxed), 0);
    assert_eq!(service.metrics().get_failures_by_kind()["invalid_input"], 1);
}

#[test]
fn test_unknown_category_keeps_layout() {
    let pipeline = fitted_pipeline();
    let known = pipeline.transform(&applicant()).unwrap();

    let mut unseen = applicant();
    unseen.profession = "Astronaut".to_string();
    let encoded = pipeline.transform(&unseen).unwrap();

    assert_eq!(encoded.len(), known.len());
    assert_eq!(encoded.len(), pipeline.width().unwrap());

    let service = stub_service(0.1, 0.1, 0.1);
    assert!(service.predict(&unseen).is_ok());
}

#[test]
fn test_shape_mismatch_refuses_to_serve() {
    let pipeline = fitted_pipeline();
    let width = pipeline.width().unwrap();
    let ensemble = EnsemblePredictor::new(
        Arc::new(StubModel { name: "forest", probability: 0.1, width }),
        Arc::new(StubModel { name: "xgboost", probability: 0.1, width }),
        Arc::new(StubModel { name: "network", probability: 0.1, width: width + 1 }),
    );

    match RiskService::new(pipeline, ensemble, SyntheticGenerator::default()) {
        Err(PipelineError::FeatureVectorShapeError { model, expected, actual }) => {
            assert_eq!(model, "network");
            assert_eq!(expected, width + 1);
            assert_eq!(actual, width);
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("service should not start"),
    }
}

#[test]
fn test_pipeline_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.json");

    let pipeline = fitted_pipeline();
    pipeline.save_to_path(&path).unwrap();
    let restored = PreprocessingPipeline::load_from_path(&path).unwrap();

    let (rows, _) = training_set();
    assert_eq!(
        pipeline.transform_batch(&rows).unwrap(),
        restored.transform_batch(&rows).unwrap()
    );
    assert_eq!(pipeline.feature_names().unwrap(), restored.feature_names().unwrap());
}

#[test]
fn test_load_service_from_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = fitted_pipeline();
    let width = pipeline.width().unwrap();
    let names = pipeline.feature_names().unwrap();

    let pipeline_path = dir.path().join("pipeline.json");
    pipeline.save_to_path(&pipeline_path).unwrap();

    let tree_path = dir.path().join("model1.json");
    let boosted_path = dir.path().join("model2.json");
    let network_path = dir.path().join("model3.json");
    write_network(&tree_path, width, 2.0);
    write_network(&boosted_path, width, -2.0);
    write_network(&network_path, width, 0.0);

    let importances_path = dir.path().join("model1_importances.json");
    let importances = vec![1.0 / width as f64; width];
    fs::write(&importances_path, serde_json::to_vec(&importances).unwrap()).unwrap();

    let mut config = AppConfig::default();
    config.models.pipeline_path = pipeline_path;
    config.models.feature_names_path = None;
    config.models.tree = ModelSpec::new(&tree_path);
    config.models.tree.importances_path = Some(importances_path);
    config.models.boosted = ModelSpec::new(&boosted_path);
    config.models.network = ModelSpec::new(&network_path);
    config.models.network.format = ModelFormat::DenseJson;

    let service = RiskService::load(&config).unwrap();
    let first = service.predict(&applicant()).unwrap();
    let second = service.predict(&applicant()).unwrap();

    assert_eq!(first, second);
    assert_eq!(first.votes(), [1, 0, 0]);
    assert_eq!(first.ensemble_prediction, 0);
    assert_eq!(first.default_probability, 0.5);

    let importance = first.feature_importance.unwrap();
    assert_eq!(importance.len(), width);
    assert!(names.iter().all(|name| importance.contains_key(name)));
}

#[test]
fn test_missing_feature_names_file_falls_back_to_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = fitted_pipeline();
    let width = pipeline.width().unwrap();

    let pipeline_path = dir.path().join("pipeline.json");
    pipeline.save_to_path(&pipeline_path).unwrap();
    let network_path = dir.path().join("model.json");
    write_network(&network_path, width, 0.0);
    let importances_path = dir.path().join("importances.json");
    fs::write(&importances_path, serde_json::to_vec(&vec![0.5; width]).unwrap()).unwrap();

    let mut config = AppConfig::default();
    config.models.pipeline_path = pipeline_path;
    config.models.feature_names_path = Some(dir.path().join("feature_names.json"));
    config.models.tree = ModelSpec::new(&network_path);
    config.models.tree.importances_path = Some(importances_path);
    config.models.boosted = ModelSpec::new(&network_path);
    config.models.network = ModelSpec::new(&network_path);

    let service = RiskService::load(&config).unwrap();
    assert_eq!(
        service.ensemble().feature_names().unwrap(),
        pipeline.feature_names().unwrap().as_slice()
    );

    let importance = service.predict(&applicant()).unwrap().feature_importance.unwrap();
    assert_eq!(importance.len(), width);
}

#[test]
fn test_missing_model_prevents_startup() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = fitted_pipeline();
    let pipeline_path = dir.path().join("pipeline.json");
    pipeline.save_to_path(&pipeline_path).unwrap();

    let network_path = dir.path().join("model3.json");
    write_network(&network_path, pipeline.width().unwrap(), 0.0);

    let mut config = AppConfig::default();
    config.models.pipeline_path = pipeline_path;
    config.models.feature_names_path = None;
    config.models.tree = ModelSpec::new(dir.path().join("model1.json"));
    config.models.boosted = ModelSpec::new(&network_path);
    config.models.network = ModelSpec::new(&network_path);

    let err = RiskService::load(&config).err().unwrap();
    let pipeline_err = err.downcast_ref::<PipelineError>().unwrap();
    assert_eq!(pipeline_err.kind(), "model_unavailable");
}

#[test]
fn test_predict_synthetic() {
    let pipeline = fitted_pipeline();
    let width = pipeline.width().unwrap();
    let ensemble = EnsemblePredictor::new(
        Arc::new(StubModel { name: "forest", probability: 0.6, width }),
        Arc::new(StubModel { name: "xgboost", probability: 0.6, width }),
        Arc::new(StubModel { name: "network", probability: 0.4, width }),
    );
    let generator = SyntheticGenerator::new(SyntheticConfig {
        seed: Some(9),
        ..Default::default()
    });
    let service = RiskService::new(pipeline, ensemble, generator).unwrap();

    let request = serde_json::from_str(r#"{"count": 10}"#).unwrap();
    let scored = service.predict_synthetic(&request).unwrap();

    assert_eq!(scored.len(), 10);
    assert!(scored.iter().all(|s| s.prediction.ensemble_prediction == 1));
    assert!(scored.iter().all(|s| s.prediction.default_probability == 0.4));
}

#[test]
fn test_legacy_generator_still_scores() {
    let pipeline = fitted_pipeline();
    let width = pipeline.width().unwrap();
    let ensemble = EnsemblePredictor::new(
        Arc::new(StubModel { name: "forest", probability: 0.1, width }),
        Arc::new(StubModel { name: "xgboost", probability: 0.1, width }),
        Arc::new(StubModel { name: "network", probability: 0.1, width }),
    );
    let generator = SyntheticGenerator::new(SyntheticConfig {
        legacy_home_ownership: true,
        seed: Some(4),
    });
    let service = RiskService::new(pipeline, ensemble, generator).unwrap();

    let request = serde_json::from_str(r#"{"count": 5, "default_ratio": 0.4}"#).unwrap();
    let scored = service.predict_synthetic(&request).unwrap();
    assert_eq!(scored.len(), 5);
}

#[test]
fn test_request_routing() {
    let service = stub_service(0.9, 0.9, 0.2);

    let payload = serde_json::to_vec(&applicant()).unwrap();
    let reply = handle_request(&service, Route::Predict, &payload).unwrap();
    let reply: ApiResponse<PredictionResult> = serde_json::from_slice(&reply).unwrap();
    assert!(reply.ok);
    assert_eq!(reply.data.unwrap().ensemble_prediction, 1);

    let reply = handle_request(&service, Route::Predict, b"{\"age\": 30}").unwrap();
    let reply: ApiResponse<PredictionResult> = serde_json::from_slice(&reply).unwrap();
    assert!(!reply.ok);
    assert_eq!(reply.error.unwrap().kind, "invalid_input");

    let reply = handle_request(&service, Route::GenerateSynthetic, b"{\"count\": 4}").unwrap();
    let reply: ApiResponse<Vec<LoanApplication>> = serde_json::from_slice(&reply).unwrap();
    assert_eq!(reply.data.unwrap().len(), 4);

    let reply = handle_request(&service, Route::PredictSynthetic, b"{\"count\": 0}").unwrap();
    let reply: ApiResponse<Vec<SyntheticPrediction>> = serde_json::from_slice(&reply).unwrap();
    assert!(!reply.ok);
    assert_eq!(reply.error.unwrap().kind, "invalid_input");
}
