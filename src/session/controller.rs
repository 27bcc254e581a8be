use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adjustment::{
    Adjustment, AdjustmentSource, ExplorationStrategy, FixStrategyEngine, ParameterSet,
    RealismStrategy, merge_adjustments,
};
use crate::analysis::{FailureClassifier, FailureType};
use crate::api::{
    DetectorResult, GenerationRequest, Generator, ReadabilityCheck, ReadabilityReport,
    ScoreOracle, SubjectiveEvaluator, SubjectiveReport,
};
use crate::config::EngineConfig;
use crate::curriculum::CurriculumCalculator;
use crate::error::{EngineError, FinalScores, Result};
use crate::learning::{WeightLearner, WeightSet};
use crate::store::{NewAttempt, NewTendencyEvent, OutcomeStore};

use super::machine::SessionState;
use super::summary::{AttemptSummary, SessionReport, SessionSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Detector gate only; subjective and readability scores are not
    /// collected and the persisted rows never qualify for weight
    /// learning.
    Simple,
    /// All four collaborators consulted per attempt.
    FullValidation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub subject: String,
    pub component_type: String,
    pub prompt: String,
    pub system_prompt: String,
    pub mode: GenerationMode,
}

/// Drives one generation session: attempt, score, classify, adjust,
/// repeat under the configured budget. Owns no per-session state; every
/// `run` starts from the configured baseline.
pub struct SessionController {
    generator: Arc<dyn Generator>,
    oracle: Arc<dyn ScoreOracle>,
    subjective: Arc<dyn SubjectiveEvaluator>,
    readability: Arc<dyn ReadabilityCheck>,
    store: Arc<dyn OutcomeStore>,
    classifier: FailureClassifier,
    curriculum: CurriculumCalculator,
    learner: WeightLearner,
    config: EngineConfig,
}

impl SessionController {
    pub fn new(
        generator: Arc<dyn Generator>,
        oracle: Arc<dyn ScoreOracle>,
        subjective: Arc<dyn SubjectiveEvaluator>,
        readability: Arc<dyn ReadabilityCheck>,
        store: Arc<dyn OutcomeStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            generator,
            oracle,
            subjective,
            readability,
            classifier: FailureClassifier::new(config.classifier.clone()),
            curriculum: CurriculumCalculator::new(config.curriculum.clone()),
            learner: WeightLearner::new(config.learning.clone()),
            store,
            config,
        }
    }

    /// Run one session to a terminal state. Returns the accepted text on
    /// success; `QualityExhausted` with the full attempt history when the
    /// budget runs out without an accepted draft.
    pub async fn run(&self, request: &SessionRequest) -> Result<SessionReport> {
        let mut state = SessionState::Idle;
        state.transition_to(SessionState::Attempting)?;

        let weights = self.resolve_weights().await?;
        let thresholds = self
            .curriculum
            .threshold(
                self.store.as_ref(),
                &request.subject,
                &request.component_type,
            )
            .await?;
        info!(
            subject = %request.subject,
            component = %request.component_type,
            phase = %thresholds.phase,
            human_target = thresholds.human_target,
            ai_threshold = thresholds.ai_threshold,
            "Session started"
        );

        let baseline = ParameterSet::from_config(&self.config.generation);
        let mut params = baseline.clone();
        let mut fix_engine = FixStrategyEngine::new();
        let mut exploration = ExplorationStrategy::new(&self.config.exploration);
        let mut seed_offset: u64 = 0;
        let mut fresh_used = false;
        // Human-score trajectory since the last fresh regeneration.
        let mut trajectory: Vec<f64> = Vec::new();

        let mut attempts: Vec<AttemptSummary> = Vec::new();
        let mut score_history: Vec<FinalScores> = Vec::new();
        let mut applied_strategies: Vec<String> = Vec::new();
        let mut observed_tendencies: BTreeSet<String> = BTreeSet::new();
        let mut tendency_deltas = Adjustment::empty(AdjustmentSource::Realism);
        let mut fresh_regenerations = 0u32;

        let max_attempts = self.config.retry.max_attempts;
        for attempt in 1..=max_attempts {
            if state != SessionState::Attempting {
                state.transition_to(SessionState::Attempting)?;
            }

            let scored = self
                .score_one_attempt(request, &params, seed_offset)
                .await?;
            let detection = &scored.detection;

            let readability_pass = scored.readability.map(|r| r.passed).unwrap_or(true);
            let success = detection.human_score >= thresholds.human_target
                && detection.ai_score <= thresholds.ai_threshold
                && readability_pass;

            // Persist only after every score is in hand; a cancelled or
            // failed attempt writes nothing.
            self.store
                .append(NewAttempt {
                    subject: request.subject.clone(),
                    component_type: request.component_type.clone(),
                    attempt_number: attempt,
                    parameters: params.clone(),
                    generated_text: scored.text.clone(),
                    detector_score: detection.human_score,
                    ai_score: detection.ai_score,
                    subjective_score: scored.subjective.as_ref().map(|s| s.realism_score),
                    readability_score: scored.readability.map(|r| r.score),
                    readability_pass,
                    success,
                    created_at: Utc::now(),
                })
                .await?;

            score_history.push(FinalScores {
                human_score: detection.human_score,
                ai_score: detection.ai_score,
                readability_pass,
            });
            trajectory.push(detection.human_score);

            let combined_score =
                combined_score(&weights, detection, scored.subjective.as_ref(), scored.readability.as_ref());

            if let Some(report) = &scored.subjective {
                observed_tendencies.extend(report.ai_tendencies.iter().cloned());
            }

            if success {
                state.transition_to(SessionState::Succeeded)?;
                attempts.push(AttemptSummary {
                    attempt_number: attempt,
                    human_score: detection.human_score,
                    ai_score: detection.ai_score,
                    combined_score,
                    readability_pass,
                    failure_type: None,
                    applied_strategy: None,
                });
                self.record_tendencies(request, &observed_tendencies, &tendency_deltas, true)
                    .await?;
                info!(attempt, human_score = detection.human_score, "Session succeeded");
                return Ok(SessionReport {
                    text: scored.text,
                    summary: SessionSummary {
                        subject: request.subject.clone(),
                        component_type: request.component_type.clone(),
                        phase: thresholds.phase,
                        attempts,
                        final_scores: score_history.pop().unwrap_or(FinalScores {
                            human_score: detection.human_score,
                            ai_score: detection.ai_score,
                            readability_pass,
                        }),
                        applied_strategies,
                        fresh_regenerations,
                    },
                    weights,
                });
            }

            let analysis = self.classifier.classify(detection)?;
            debug!(
                attempt,
                failure_type = ?analysis.failure_type,
                retry_worth = analysis.retry_worth,
                "Attempt below threshold"
            );

            if attempt == max_attempts {
                attempts.push(AttemptSummary {
                    attempt_number: attempt,
                    human_score: detection.human_score,
                    ai_score: detection.ai_score,
                    combined_score,
                    readability_pass,
                    failure_type: Some(analysis.failure_type),
                    applied_strategy: None,
                });
                break;
            }

            let wants_fresh = !fresh_used
                && (!analysis.retry_worth
                    || is_stuck(&trajectory, self.config.retry.stuck_window));

            if wants_fresh {
                state.transition_to(SessionState::FreshRegenerating)?;
                params = baseline.clone();
                fix_engine.reset();
                trajectory.clear();
                seed_offset += 1;
                fresh_used = true;
                fresh_regenerations += 1;
                applied_strategies.push("fresh_regeneration".to_string());
                attempts.push(AttemptSummary {
                    attempt_number: attempt,
                    human_score: detection.human_score,
                    ai_score: detection.ai_score,
                    combined_score,
                    readability_pass,
                    failure_type: Some(analysis.failure_type),
                    applied_strategy: Some("fresh_regeneration".to_string()),
                });
                info!(attempt, "Fresh regeneration: trajectory reset");
                continue;
            }

            state.transition_to(SessionState::Retrying)?;
            let failure_adj = fix_engine.propose(analysis.failure_type, attempt);
            let strategy_id = strategy_label(&failure_adj, analysis.failure_type);

            let realism_adj = match &scored.subjective {
                Some(report) => RealismStrategy::propose(&report.ai_tendencies, &params)?,
                None => None,
            };
            if let Some(adj) = &realism_adj {
                accumulate(&mut tendency_deltas, adj);
            }
            let exploration_adj = exploration.maybe_explore(&params);

            let merged = merge_adjustments(Some(failure_adj), realism_adj, exploration_adj);
            params = params.apply(&merged);
            applied_strategies.push(strategy_id.clone());
            attempts.push(AttemptSummary {
                attempt_number: attempt,
                human_score: detection.human_score,
                ai_score: detection.ai_score,
                combined_score,
                readability_pass,
                failure_type: Some(analysis.failure_type),
                applied_strategy: Some(strategy_id),
            });
        }

        state.transition_to(SessionState::Exhausted)?;
        self.record_tendencies(request, &observed_tendencies, &tendency_deltas, false)
            .await?;
        let last_scores = score_history.last().cloned().unwrap_or(FinalScores {
            human_score: 0.0,
            ai_score: 1.0,
            readability_pass: false,
        });
        warn!(
            subject = %request.subject,
            attempts = max_attempts,
            last = %last_scores,
            "Session exhausted"
        );
        Err(EngineError::QualityExhausted {
            attempts: max_attempts,
            last_scores,
            history: score_history,
        })
    }

    /// Weight resolution with the one sanctioned fallback: below the
    /// learner's sample threshold the configured static defaults apply.
    /// Every other learner error propagates.
    async fn resolve_weights(&self) -> Result<WeightSet> {
        match self.learner.optimal_weights(self.store.as_ref()).await {
            Ok(weights) => Ok(weights),
            Err(EngineError::InsufficientLearningData { have, need }) => {
                debug!(have, need, "Using default weights");
                Ok(self.learner.default_weights())
            }
            Err(err) => Err(err),
        }
    }

    async fn score_one_attempt(
        &self,
        request: &SessionRequest,
        params: &ParameterSet,
        seed_offset: u64,
    ) -> Result<ScoredAttempt> {
        let generation = GenerationRequest::new(&request.prompt, &request.system_prompt)
            .with_parameters(params)
            .with_seed_offset(seed_offset);

        let text = self
            .with_service_retry(|| self.generator.generate(&generation))
            .await?;
        let detection = self
            .with_service_retry(|| self.oracle.detect(&text))
            .await?;
        detection.validate()?;
        if !detection.has_sentence_detail() {
            // Pattern-only detector output must never be recorded as
            // ground truth.
            return Err(EngineError::MalformedScore(
                "detector returned no sentence detail".into(),
            ));
        }

        let (subjective, readability) = match request.mode {
            GenerationMode::Simple => (None, None),
            GenerationMode::FullValidation => {
                let report = self
                    .with_service_retry(|| self.subjective.evaluate(&text))
                    .await?;
                let readability = self
                    .with_service_retry(|| self.readability.assess(&text))
                    .await?;
                (Some(report), Some(readability))
            }
        };

        Ok(ScoredAttempt {
            text,
            detection,
            subjective,
            readability,
        })
    }

    /// Retry transient service failures under the network budget. Any
    /// other error, and exhaustion of the budget, propagates and aborts
    /// the session without a ledger row.
    async fn with_service_retry<T, F, Fut>(&self, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err)
                    if err.is_service_failure()
                        && retries < self.config.retry.network_retries =>
                {
                    retries += 1;
                    warn!(%err, retries, "Service call failed, backing off");
                    tokio::time::sleep(Duration::from_secs(
                        self.config.retry.network_backoff_secs,
                    ))
                    .await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn record_tendencies(
        &self,
        request: &SessionRequest,
        tendencies: &BTreeSet<String>,
        deltas: &Adjustment,
        success: bool,
    ) -> Result<()> {
        if tendencies.is_empty() {
            return Ok(());
        }
        self.store
            .append_tendency_event(NewTendencyEvent {
                subject: request.subject.clone(),
                tendencies: tendencies.clone(),
                adjustments: deltas.clone(),
                success,
                created_at: Utc::now(),
            })
            .await?;
        Ok(())
    }
}

struct ScoredAttempt {
    text: String,
    detection: DetectorResult,
    subjective: Option<SubjectiveReport>,
    readability: Option<ReadabilityReport>,
}

fn combined_score(
    weights: &WeightSet,
    detection: &DetectorResult,
    subjective: Option<&SubjectiveReport>,
    readability: Option<&ReadabilityReport>,
) -> f64 {
    let mut score = weights.winston_weight * (detection.human_score / 100.0);
    if let Some(report) = subjective {
        score += weights.subjective_weight * report.normalized_realism();
    }
    if let Some(report) = readability {
        score += weights.readability_weight * report.normalized();
    }
    score
}

/// Fold one realism proposal into the session-wide tendency audit delta.
fn accumulate(total: &mut Adjustment, adjustment: &Adjustment) {
    if let Some(delta) = adjustment.temperature_delta {
        *total.temperature_delta.get_or_insert(0.0) += delta;
    }
    for (name, delta) in &adjustment.voice_deltas {
        *total.voice_deltas.entry(name.clone()).or_insert(0.0) += delta;
    }
    for (name, delta) in &adjustment.enrichment_deltas {
        *total.enrichment_deltas.entry(name.clone()).or_insert(0.0) += delta;
    }
}

fn strategy_label(adjustment: &Adjustment, failure_type: FailureType) -> String {
    match &adjustment.source {
        AdjustmentSource::FailureStrategy { id } => id.clone(),
        _ => format!("{:?}", failure_type).to_lowercase(),
    }
}

/// Stuck when the trailing `window` human scores never improve.
fn is_stuck(trajectory: &[f64], window: usize) -> bool {
    if trajectory.len() < window {
        return false;
    }
    let tail = &trajectory[trajectory.len() - window..];
    tail.windows(2).all(|pair| pair[1] <= pair[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stuck_requires_full_window() {
        assert!(!is_stuck(&[50.0, 45.0], 3));
        assert!(is_stuck(&[50.0, 45.0, 45.0], 3));
        assert!(is_stuck(&[50.0, 45.0, 40.0], 3));
    }

    #[test]
    fn test_improvement_breaks_stuck() {
        assert!(!is_stuck(&[50.0, 45.0, 46.0], 3));
        // Only the trailing window counts.
        assert!(is_stuck(&[30.0, 60.0, 55.0, 50.0], 3));
    }

    #[test]
    fn test_combined_score_skips_absent_components() {
        let weights = WeightSet {
            winston_weight: 0.5,
            subjective_weight: 0.3,
            readability_weight: 0.2,
            sample_count: 0,
            r_squared: 0.0,
        };
        let detection = DetectorResult {
            ai_score: 0.2,
            human_score: 80.0,
            sentence_scores: vec![],
        };
        let score = combined_score(&weights, &detection, None, None);
        assert!((score - 0.4).abs() < 1e-12);
    }
}
