// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Round Coordinator
//!
//! Application service that owns the live [`Round`] and the latest
//! [`GlobalModel`] behind one mutex. All request-time operations
//! (`start_round`, `submit`, `reset`, status queries) are synchronous and
//! short; the submission that completes quorum spawns the background
//! pipeline:
//!
//! ```text
//! aggregate (blocking pool) → commit GlobalModel → persist → distribute → COMPLETE
//! ```
//!
//! Each pipeline step re-checks its [`RoundTicket`] under the lock, so a
//! `reset()` or a new round at any point makes the remaining steps no-ops.
//! Persisting is serialized and skips models that a later round has already
//! replaced.

use chrono::Utc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::aggregator::aggregate;
use crate::application::distributor::Distributor;
use crate::domain::distribution::DeliveryReport;
use crate::domain::events::RoundEvent;
use crate::domain::model::GlobalModel;
use crate::domain::parameters::ParameterTree;
use crate::domain::repository::GlobalModelStore;
use crate::domain::round::{
    QuorumBatch, Round, RoundError, RoundId, RoundStatus, RoundTicket, SubmitReceipt,
};
use crate::infrastructure::event_bus::EventBus;

#[derive(Debug, Clone, Default)]
pub struct CoordinatorSettings {
    /// Go back to IDLE as soon as a round completes.
    pub auto_reset_on_complete: bool,
}

/// Inbound participant update.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub participant_id: String,
    pub callback_address: String,
    pub parameters: ParameterTree,
}

struct CoordinatorState {
    round: Round,
    global_model: Option<Arc<GlobalModel>>,
    last_report: Option<DeliveryReport>,
}

pub struct RoundCoordinator {
    state: Mutex<CoordinatorState>,
    distributor: Distributor,
    store: Arc<dyn GlobalModelStore>,
    events: EventBus,
    settings: CoordinatorSettings,
    aggregation_runs: AtomicU64,
    persist_lock: tokio::sync::Mutex<()>,
}

impl RoundCoordinator {
    pub fn new(
        distributor: Distributor,
        store: Arc<dyn GlobalModelStore>,
        events: EventBus,
        settings: CoordinatorSettings,
    ) -> Self {
        Self {
            state: Mutex::new(CoordinatorState {
                round: Round::new(),
                global_model: None,
                last_report: None,
            }),
            distributor,
            store,
            events,
            settings,
            aggregation_runs: AtomicU64::new(0),
            persist_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Seed the in-memory global model from the store (e.g. after a restart).
    pub async fn restore_global_model(&self) -> anyhow::Result<bool> {
        let Some(model) = self.store.load_latest().await? else {
            return Ok(false);
        };
        info!(round_id = %model.round_id, "Restored global model from store");
        let mut state = self.state.lock();
        if state.global_model.is_none() {
            state.global_model = Some(Arc::new(model));
        }
        Ok(true)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn status(&self) -> RoundStatus {
        self.state.lock().round.status()
    }

    pub fn participants(&self) -> Vec<String> {
        self.state.lock().round.participant_ids()
    }

    pub fn global_model(&self) -> Option<Arc<GlobalModel>> {
        self.state.lock().global_model.clone()
    }

    pub fn last_delivery_report(&self) -> Option<DeliveryReport> {
        self.state.lock().last_report.clone()
    }

    /// Number of aggregation passes started since process start.
    pub fn aggregation_runs(&self) -> u64 {
        self.aggregation_runs.load(Ordering::SeqCst)
    }

    pub fn start_round(&self, expected_count: i64) -> Result<RoundId, RoundError> {
        let mut state = self.state.lock();
        let round_id = state.round.start(expected_count)?;
        let expected = state.round.expected();

        info!(%round_id, expected, "Round started");
        metrics::counter!("fedaurora_rounds_started_total").increment(1);
        metrics::gauge!("fedaurora_round_received").set(0.0);
        self.events.publish(RoundEvent::RoundStarted {
            round_id,
            expected,
            started_at: Utc::now(),
        });
        Ok(round_id)
    }

    /// Stage a submission and, when it completes quorum, launch aggregation
    /// in the background. Must be called within a tokio runtime.
    pub fn submit(self: &Arc<Self>, request: SubmissionRequest) -> Result<SubmitReceipt, RoundError> {
        let receipt = {
            let mut state = self.state.lock();
            let result = state.round.submit(
                &request.participant_id,
                &request.callback_address,
                request.parameters,
                Utc::now(),
            );

            let receipt = match result {
                Ok(receipt) => receipt,
                Err(e) => {
                    debug!(participant = %request.participant_id, "Submission rejected: {}", e);
                    metrics::counter!("fedaurora_submissions_total", "outcome" => e.code())
                        .increment(1);
                    return Err(e);
                }
            };

            debug!(
                participant = %request.participant_id,
                received = receipt.received,
                expected = receipt.expected,
                replaced = receipt.replaced,
                "Submission accepted"
            );
            metrics::counter!("fedaurora_submissions_total", "outcome" => "accepted").increment(1);
            metrics::gauge!("fedaurora_round_received").set(receipt.received as f64);

            // published under the lock so observers see counts in order
            self.events.publish(RoundEvent::Progress {
                round_id: receipt.round_id,
                received: receipt.received,
                expected: receipt.expected,
            });
            receipt
        };

        if let Some(batch) = &receipt.quorum {
            info!(round_id = %batch.ticket.round_id, participants = batch.submissions.len(), "Quorum reached");
            tokio::spawn(Arc::clone(self).run_pipeline(batch.clone()));
        }

        Ok(receipt)
    }

    /// Any state → IDLE. Always succeeds.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let previous = state.round.state();
        state.round.reset();

        info!(%previous, "Round reset");
        metrics::gauge!("fedaurora_round_received").set(0.0);
        self.events.publish(RoundEvent::Reset { reset_at: Utc::now() });
    }

    async fn run_pipeline(self: Arc<Self>, batch: QuorumBatch) {
        let ticket = batch.ticket;
        let recipients = batch.recipients();
        let participants = batch.submissions.len();
        let trees: Vec<Arc<ParameterTree>> = batch
            .submissions
            .into_iter()
            .map(|submission| submission.parameters)
            .collect();

        self.aggregation_runs.fetch_add(1, Ordering::SeqCst);
        let outcome = tokio::task::spawn_blocking(move || {
            aggregate(trees.iter().map(Arc::as_ref))
        })
        .await;

        let parameters = match outcome {
            Ok(Ok(parameters)) => parameters,
            Ok(Err(e)) => return self.abort(&ticket, e.to_string()),
            Err(e) => return self.abort(&ticket, format!("aggregation task failed: {}", e)),
        };

        let model = Arc::new(GlobalModel::new(ticket.round_id, parameters, participants));
        {
            let mut state = self.state.lock();
            if !state.round.begin_distribution(&ticket) {
                debug!(round_id = %ticket.round_id, "Discarding aggregate of a round that was reset");
                return;
            }
            state.global_model = Some(Arc::clone(&model));

            info!(round_id = %ticket.round_id, participants, "Global model aggregated");
            metrics::counter!("fedaurora_aggregations_total", "outcome" => "success").increment(1);
            self.events.publish(RoundEvent::ModelAggregated {
                round_id: ticket.round_id,
                participants,
                aggregated_at: model.aggregated_at,
            });
        }

        self.persist(&model).await;

        let report = match self.distributor.distribute(&model, &recipients).await {
            Ok(report) => report,
            Err(e) => return self.abort(&ticket, e.to_string()),
        };

        let mut state = self.state.lock();
        if !state.round.complete(&ticket) {
            debug!(round_id = %ticket.round_id, "Round was reset during distribution");
            return;
        }

        for failure in &report.failed {
            self.events.publish(RoundEvent::DistributionFailed {
                round_id: ticket.round_id,
                participant_id: failure.participant_id.clone(),
                address: failure.address.clone(),
                reason: failure.reason.clone(),
            });
        }

        info!(
            round_id = %ticket.round_id,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "Round complete"
        );
        self.events.publish(RoundEvent::Complete {
            round_id: ticket.round_id,
            delivered: report.delivered.len(),
            failed: report.failed.len(),
            completed_at: Utc::now(),
        });
        state.last_report = Some(report);

        if self.settings.auto_reset_on_complete {
            state.round.reset();
            info!(round_id = %ticket.round_id, "Round auto-reset after completion");
            metrics::gauge!("fedaurora_round_received").set(0.0);
            self.events.publish(RoundEvent::Reset { reset_at: Utc::now() });
        }
    }

    /// Saves run one at a time, and a model already replaced in memory by a
    /// later round is never written over it.
    async fn persist(&self, model: &Arc<GlobalModel>) {
        let _guard = self.persist_lock.lock().await;
        let superseded = {
            let state = self.state.lock();
            state
                .global_model
                .as_ref()
                .is_none_or(|current| !Arc::ptr_eq(current, model))
        };
        if superseded {
            debug!(round_id = %model.round_id, "Skipping save of a superseded global model");
            return;
        }

        if let Err(e) = self.store.save(model).await {
            warn!(round_id = %model.round_id, "Failed to persist global model: {}", e);
        }
    }

    fn abort(&self, ticket: &RoundTicket, reason: String) {
        let mut state = self.state.lock();
        if !state.round.abort(ticket) {
            debug!(round_id = %ticket.round_id, "Ignoring failure of a round that was reset: {}", reason);
            return;
        }

        error!(round_id = %ticket.round_id, "Round aborted: {}", reason);
        metrics::counter!("fedaurora_aggregations_total", "outcome" => "failed").increment(1);
        metrics::gauge!("fedaurora_round_received").set(0.0);
        self.events.publish(RoundEvent::AggregationFailed {
            round_id: ticket.round_id,
            reason,
            failed_at: Utc::now(),
        });
    }
}
