//! End-to-end session tests over mock collaborators and a real SQLite
//! ledger in a temp directory.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Once};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tempfile::TempDir;

use prosepilot::adjustment::ParameterSet;
use prosepilot::api::{
    DetectorResult, GenerationRequest, Generator, ReadabilityCheck, ReadabilityReport,
    ScoreOracle, SentenceScore, SubjectiveEvaluator, SubjectiveReport,
};
use prosepilot::config::EngineConfig;
use prosepilot::error::{EngineError, Result, ServiceKind};
use prosepilot::learning::WeightLearner;
use prosepilot::session::{GenerationMode, SessionController, SessionRequest};
use prosepilot::store::{NewAttempt, OutcomeStore, SqliteOutcomeStore};

// ---------------------------------------------------------------------
// Mock collaborators
// ---------------------------------------------------------------------

/// Records every generation request and returns numbered drafts.
struct ScriptedGenerator {
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let mut requests = self.requests.lock();
        requests.push(request.clone());
        Ok(format!("draft number {}", requests.len()))
    }
}

/// Pops scripted detector results in order; repeats the last one when
/// the script runs dry.
struct ScriptedOracle {
    script: Mutex<VecDeque<DetectorResult>>,
    fallback: DetectorResult,
}

impl ScriptedOracle {
    fn new(results: Vec<DetectorResult>) -> Arc<Self> {
        let fallback = results.last().cloned().expect("script must not be empty");
        Arc::new(Self {
            script: Mutex::new(results.into()),
            fallback,
        })
    }
}

#[async_trait]
impl ScoreOracle for ScriptedOracle {
    async fn detect(&self, _text: &str) -> Result<DetectorResult> {
        Ok(self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Fails with an `ExternalService` error a fixed number of times before
/// delegating to the scripted result.
struct FlakyOracle {
    failures_left: AtomicU32,
    result: DetectorResult,
}

impl FlakyOracle {
    fn new(failures: u32, result: DetectorResult) -> Arc<Self> {
        Arc::new(Self {
            failures_left: AtomicU32::new(failures),
            result,
        })
    }
}

#[async_trait]
impl ScoreOracle for FlakyOracle {
    async fn detect(&self, _text: &str) -> Result<DetectorResult> {
        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(EngineError::service(
                ServiceKind::Detection,
                "connection reset",
            ));
        }
        Ok(self.result.clone())
    }
}

struct StaticSubjective(SubjectiveReport);

#[async_trait]
impl SubjectiveEvaluator for StaticSubjective {
    async fn evaluate(&self, _text: &str) -> Result<SubjectiveReport> {
        Ok(self.0.clone())
    }
}

struct StaticReadability(ReadabilityReport);

#[async_trait]
impl ReadabilityCheck for StaticReadability {
    async fn assess(&self, _text: &str) -> Result<ReadabilityReport> {
        Ok(self.0.clone())
    }
}

// ---------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------

fn detector(human: f64, ai: f64, sentences: &[f64]) -> DetectorResult {
    DetectorResult {
        ai_score: ai,
        human_score: human,
        sentence_scores: sentences
            .iter()
            .enumerate()
            .map(|(i, &score)| SentenceScore {
                text: format!("sentence {}", i),
                score,
            })
            .collect(),
    }
}

fn clean_subjective() -> SubjectiveReport {
    SubjectiveReport {
        realism_score: 8.0,
        ai_tendencies: BTreeSet::new(),
        voice_authenticity: 0.8,
        tonal_consistency: 0.8,
    }
}

fn passing_readability() -> ReadabilityReport {
    ReadabilityReport {
        score: 70.0,
        passed: true,
    }
}

/// Test config: no backoff sleeps, no stochastic exploration.
fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.retry.network_backoff_secs = 0;
    config.exploration.probability = 0.0;
    config
}

static TRACING: Once = Once::new();

/// Route engine logs through the test harness when RUST_LOG asks for them.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn temp_store() -> (TempDir, Arc<SqliteOutcomeStore>) {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let store = SqliteOutcomeStore::new(dir.path().join("outcomes.db")).unwrap();
    (dir, Arc::new(store))
}

fn controller(
    generator: Arc<ScriptedGenerator>,
    oracle: Arc<dyn ScoreOracle>,
    store: Arc<SqliteOutcomeStore>,
    config: EngineConfig,
) -> SessionController {
    SessionController::new(
        generator,
        oracle,
        Arc::new(StaticSubjective(clean_subjective())),
        Arc::new(StaticReadability(passing_readability())),
        store,
        config,
    )
}

fn request(mode: GenerationMode) -> SessionRequest {
    SessionRequest {
        subject: "walnut-desk".into(),
        component_type: "description".into(),
        prompt: "Describe the walnut desk.".into(),
        system_prompt: "You write naturally.".into(),
        mode,
    }
}

// ---------------------------------------------------------------------
// Session flow
// ---------------------------------------------------------------------

#[tokio::test]
async fn first_attempt_success_records_one_row() {
    let generator = ScriptedGenerator::new();
    let oracle = ScriptedOracle::new(vec![detector(90.0, 0.15, &[88.0, 92.0])]);
    let (_dir, store) = temp_store();
    let controller = controller(generator.clone(), oracle, store.clone(), test_config());

    let report = controller
        .run(&request(GenerationMode::FullValidation))
        .await
        .unwrap();

    assert_eq!(report.text, "draft number 1");
    assert_eq!(report.summary.attempts.len(), 1);
    assert_eq!(report.summary.fresh_regenerations, 0);
    assert!(report.summary.final_scores.readability_pass);

    let rows = store.query_global().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].success);
    assert_eq!(rows[0].attempt_number, 1);
    assert_eq!(rows[0].subjective_score, Some(8.0));
}

#[tokio::test]
async fn uniform_failure_consumes_fresh_regen_then_adjusts_temperature() {
    let generator = ScriptedGenerator::new();
    // Every draft is uniformly terrible until the last.
    let oracle = ScriptedOracle::new(vec![
        detector(8.0, 0.9, &[5.0, 8.0, 3.0, 10.0]),
        detector(8.0, 0.9, &[5.0, 8.0, 3.0, 10.0]),
        detector(90.0, 0.1, &[88.0, 92.0]),
    ]);
    let (_dir, store) = temp_store();
    let controller = controller(generator.clone(), oracle, store, test_config());

    let report = controller.run(&request(GenerationMode::Simple)).await.unwrap();
    assert_eq!(report.summary.attempts.len(), 3);
    assert_eq!(report.summary.fresh_regenerations, 1);

    let requests = generator.requests();
    let baseline = EngineConfig::default().generation.base_temperature;
    // Attempt 1: baseline. Attempt 2: fresh regeneration, baseline again
    // under a bumped seed. Attempt 3: the uniform fix strategy moved
    // temperature.
    assert_eq!(requests[0].seed_offset, 0);
    assert_eq!(requests[1].seed_offset, 1);
    assert!((requests[1].temperature - baseline).abs() < 1e-12);
    assert!((requests[2].temperature - baseline).abs() > 0.1);
}

#[tokio::test]
async fn exhaustion_returns_full_history() {
    let generator = ScriptedGenerator::new();
    let oracle = ScriptedOracle::new(vec![detector(30.0, 0.8, &[55.0, 20.0, 25.0])]);
    let (_dir, store) = temp_store();
    let mut config = test_config();
    config.retry.max_attempts = 3;
    let controller = controller(generator, oracle, store.clone(), config);

    let err = controller
        .run(&request(GenerationMode::FullValidation))
        .await
        .unwrap_err();

    match err {
        EngineError::QualityExhausted {
            attempts,
            last_scores,
            history,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(history.len(), 3);
            assert!((last_scores.human_score - 30.0).abs() < 1e-12);
        }
        other => panic!("expected QualityExhausted, got {:?}", other),
    }

    // Every scored attempt reached the ledger despite the failure.
    assert_eq!(store.query_global().await.unwrap().len(), 3);
}

#[tokio::test]
async fn stuck_trajectory_triggers_one_fresh_regeneration() {
    let generator = ScriptedGenerator::new();
    // Partial failures (one good sentence each) with non-improving
    // human scores: 50, 45, 40 trips the stuck window.
    let oracle = ScriptedOracle::new(vec![
        detector(50.0, 0.7, &[55.0, 20.0]),
        detector(45.0, 0.7, &[52.0, 18.0]),
        detector(40.0, 0.7, &[51.0, 15.0]),
        detector(35.0, 0.7, &[50.0, 12.0]),
        detector(30.0, 0.7, &[50.0, 10.0]),
    ]);
    let (_dir, store) = temp_store();
    let controller = controller(generator.clone(), oracle, store, test_config());

    let err = controller
        .run(&request(GenerationMode::Simple))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::QualityExhausted { .. }));

    let requests = generator.requests();
    assert_eq!(requests.len(), 5);
    // The fresh regeneration after attempt 3 resets parameters and bumps
    // the seed; it happens exactly once.
    let baseline = EngineConfig::default().generation.base_temperature;
    assert_eq!(requests[3].seed_offset, 1);
    assert!((requests[3].temperature - baseline).abs() < 1e-12);
    assert_eq!(requests[4].seed_offset, 1);
}

#[tokio::test]
async fn simple_mode_rows_never_qualify_for_learning() {
    let generator = ScriptedGenerator::new();
    let oracle = ScriptedOracle::new(vec![detector(90.0, 0.1, &[88.0, 92.0])]);
    let (_dir, store) = temp_store();
    let controller = controller(generator, oracle, store.clone(), test_config());

    controller.run(&request(GenerationMode::Simple)).await.unwrap();

    let rows = store.query_global().await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].subjective_score, None);
    assert_eq!(rows[0].readability_score, None);
    assert_eq!(store.count_qualifying().await.unwrap(), 0);
}

#[tokio::test]
async fn tendencies_adjust_parameters_and_leave_an_audit_row() {
    let generator = ScriptedGenerator::new();
    // Two partial failures, then an accepted draft.
    let oracle = ScriptedOracle::new(vec![
        detector(50.0, 0.7, &[55.0, 20.0]),
        detector(45.0, 0.7, &[52.0, 18.0]),
        detector(90.0, 0.1, &[88.0, 92.0]),
    ]);
    let (_dir, store) = temp_store();
    let tagged = SubjectiveReport {
        realism_score: 4.0,
        ai_tendencies: ["formulaic_phrasing", "stiff_register"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        voice_authenticity: 0.4,
        tonal_consistency: 0.5,
    };
    let controller = SessionController::new(
        generator.clone(),
        oracle,
        Arc::new(StaticSubjective(tagged)),
        Arc::new(StaticReadability(passing_readability())),
        store.clone(),
        test_config(),
    );

    let report = controller
        .run(&request(GenerationMode::FullValidation))
        .await
        .unwrap();
    assert_eq!(report.summary.attempts.len(), 3);

    let requests = generator.requests();
    let base = EngineConfig::default().generation.base_temperature;
    // Attempt 2: the partial-failure strategy moves no temperature, so
    // the realism delta for formulaic_phrasing (+0.10) passes through.
    assert!((requests[1].temperature - (base + 0.10)).abs() < 1e-9);
    // Attempt 3: failure proposes +0.05, realism +0.10 again; the
    // effective delta is 0.6 x realism + 0.4 x failure.
    let blended = 0.6 * 0.10 + 0.4 * 0.05;
    assert!((requests[2].temperature - (base + 0.10 + blended)).abs() < 1e-9);

    // Exactly one audit row at the terminal state, carrying the observed
    // tags and the eventual outcome.
    let conn = rusqlite::Connection::open(store.db_path()).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM tendency_events", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
    let (tendencies, success): (String, bool) = conn
        .query_row(
            "SELECT tendencies, success FROM tendency_events",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert!(tendencies.contains("formulaic_phrasing"));
    assert!(tendencies.contains("stiff_register"));
    assert!(success);
}

// ---------------------------------------------------------------------
// Service-failure boundary
// ---------------------------------------------------------------------

#[tokio::test]
async fn transient_detector_failures_are_retried() {
    let generator = ScriptedGenerator::new();
    let oracle = FlakyOracle::new(2, detector(90.0, 0.1, &[88.0, 92.0]));
    let (_dir, store) = temp_store();
    let controller = controller(generator, oracle, store.clone(), test_config());

    let report = controller.run(&request(GenerationMode::Simple)).await.unwrap();
    assert_eq!(report.summary.attempts.len(), 1);
    assert_eq!(store.query_global().await.unwrap().len(), 1);
}

#[tokio::test]
async fn exhausted_network_budget_aborts_without_ledger_rows() {
    let generator = ScriptedGenerator::new();
    let oracle = FlakyOracle::new(10, detector(90.0, 0.1, &[88.0, 92.0]));
    let (_dir, store) = temp_store();
    let mut config = test_config();
    config.retry.network_retries = 2;
    let controller = controller(generator, oracle, store.clone(), config);

    let err = controller
        .run(&request(GenerationMode::Simple))
        .await
        .unwrap_err();
    assert!(err.is_service_failure());
    assert!(store.query_global().await.unwrap().is_empty());
}

// ---------------------------------------------------------------------
// Weight-learning gate over a real ledger
// ---------------------------------------------------------------------

fn learning_row(i: usize) -> NewAttempt {
    // Outcome correlates with the detector score so the fit has signal.
    let winston = 30.0 + (i % 60) as f64;
    let success = winston >= 60.0;
    NewAttempt {
        subject: format!("subject-{}", i % 7),
        component_type: "description".into(),
        attempt_number: 1,
        parameters: ParameterSet::from_config(&EngineConfig::default().generation),
        generated_text: format!("draft {}", i),
        detector_score: winston,
        ai_score: 1.0 - winston / 100.0,
        subjective_score: Some(3.0 + (i % 7) as f64),
        readability_score: Some(50.0 + (i % 40) as f64),
        readability_pass: true,
        success,
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn learner_gate_opens_exactly_at_minimum_samples() {
    let (_dir, store) = temp_store();
    let learner = WeightLearner::new(EngineConfig::default().learning);
    let need = EngineConfig::default().learning.min_samples;

    for i in 0..need - 1 {
        store.append(learning_row(i)).await.unwrap();
    }
    let err = learner.optimal_weights(store.as_ref()).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::InsufficientLearningData { have, need: n } if have == need - 1 && n == need
    ));

    store.append(learning_row(need)).await.unwrap();
    let weights = learner.optimal_weights(store.as_ref()).await.unwrap();
    assert_eq!(weights.sample_count, need);
    assert!((weights.sum() - 1.0).abs() < 1e-9);
    assert!(weights.winston_weight >= 0.0);
    assert!(weights.subjective_weight >= 0.0);
    assert!(weights.readability_weight >= 0.0);
}

#[tokio::test]
async fn session_falls_back_to_default_weights_below_gate() {
    let generator = ScriptedGenerator::new();
    let oracle = ScriptedOracle::new(vec![detector(90.0, 0.1, &[88.0, 92.0])]);
    let (_dir, store) = temp_store();
    let config = test_config();
    let defaults = (
        config.learning.default_winston_weight,
        config.learning.default_subjective_weight,
        config.learning.default_readability_weight,
    );
    let controller = controller(generator, oracle, store, config);

    let report = controller
        .run(&request(GenerationMode::FullValidation))
        .await
        .unwrap();
    assert_eq!(report.weights.winston_weight, defaults.0);
    assert_eq!(report.weights.subjective_weight, defaults.1);
    assert_eq!(report.weights.readability_weight, defaults.2);
    assert_eq!(report.weights.sample_count, 0);
}

// ---------------------------------------------------------------------
// Curriculum over a real ledger
// ---------------------------------------------------------------------

#[tokio::test]
async fn curriculum_tightens_as_history_accumulates() {
    use prosepilot::curriculum::{CurriculumCalculator, CurriculumPhase};

    let (_dir, store) = temp_store();
    let calculator = CurriculumCalculator::new(EngineConfig::default().curriculum);

    let empty = calculator
        .threshold(store.as_ref(), "oak-chair", "description")
        .await
        .unwrap();
    assert_eq!(empty.phase, CurriculumPhase::Learning);

    for i in 0..20 {
        let mut row = learning_row(i);
        row.subject = "oak-chair".into();
        row.success = i % 2 == 0;
        store.append(row).await.unwrap();
    }

    let seasoned = calculator
        .threshold(store.as_ref(), "oak-chair", "description")
        .await
        .unwrap();
    assert_eq!(seasoned.phase, CurriculumPhase::Mature);
    assert!(seasoned.ai_threshold < empty.ai_threshold);
    assert!(seasoned.human_target > empty.human_target);
    // Other subjects are unaffected.
    let other = calculator
        .threshold(store.as_ref(), "pine-shelf", "description")
        .await
        .unwrap();
    assert_eq!(other.phase, CurriculumPhase::Learning);
}
