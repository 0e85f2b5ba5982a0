use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::engine::assignment::create_assignment;
use crate::engine::materializer::{Materialized, materialize};
use crate::engine::selector::{LeastLoadedSelector, WorkerSelector};
use crate::error::AppError;
use crate::models::assignment::Assignment;
use crate::models::delivery::{Delivery, DeliveryStatus};
use crate::models::order::{Order, OrderId, PaymentStatus};
use crate::state::AppState;

const CLAIM_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentOutcome {
    Assigned,
    AlreadyAssigned,
    NoWorkerAvailable,
    AddressResolutionFailed,
}

impl FulfillmentOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentOutcome::Assigned => "assigned",
            FulfillmentOutcome::AlreadyAssigned => "already_assigned",
            FulfillmentOutcome::NoWorkerAvailable => "no_worker_available",
            FulfillmentOutcome::AddressResolutionFailed => "address_resolution_failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FulfillmentResult {
    pub delivery: Option<Delivery>,
    pub assignment: Option<Assignment>,
    pub outcome: FulfillmentOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

pub struct Orchestrator<S = LeastLoadedSelector> {
    selector: S,
}

impl Orchestrator<LeastLoadedSelector> {
    pub fn new() -> Self {
        Self {
            selector: LeastLoadedSelector,
        }
    }
}

impl Default for Orchestrator<LeastLoadedSelector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: WorkerSelector> Orchestrator<S> {
    pub fn with_selector(selector: S) -> Self {
        Self { selector }
    }

    pub fn fulfill(&self, state: &AppState, order_id: OrderId) -> Result<FulfillmentResult, AppError> {
        let started = Instant::now();
        let result = self.run(state, order_id);

        let outcome = match &result {
            Ok(result) => result.outcome.as_str(),
            Err(_) => "error",
        };
        state
            .metrics
            .fulfillments_total
            .with_label_values(&[outcome])
            .inc();
        state
            .metrics
            .fulfillment_latency_seconds
            .with_label_values(&[outcome])
            .observe(started.elapsed().as_secs_f64());

        match &result {
            Ok(_) => info!(order_id, outcome, "fulfillment finished"),
            Err(err) => error!(order_id, error = %err, "fulfillment failed"),
        }

        result
    }

    fn run(&self, state: &AppState, order_id: OrderId) -> Result<FulfillmentResult, AppError> {
        let order = paid_order(state, order_id)?;

        let delivery = match materialize(state, &order)? {
            Materialized::Ready(delivery) => delivery,
            Materialized::AddressUnresolved { reason } => {
                return Ok(FulfillmentResult {
                    delivery: None,
                    assignment: None,
                    outcome: FulfillmentOutcome::AddressResolutionFailed,
                    detail: Some(reason),
                });
            }
        };

        if let Some(existing) = live_assignment(state, order_id) {
            return Ok(already_assigned(state, delivery, existing));
        }

        match self.claim_worker(state, order_id) {
            Ok(Some(assignment)) => {
                let delivery = current_delivery(state, order_id).unwrap_or(delivery);
                Ok(FulfillmentResult {
                    delivery: Some(delivery),
                    assignment: Some(assignment),
                    outcome: FulfillmentOutcome::Assigned,
                    detail: None,
                })
            }
            Ok(None) => {
                let note = "no capacity: no delivery worker available";
                match mark_unassigned(state, order_id, DeliveryStatus::PendingAssignment, note)? {
                    Unassigned::Marked(delivery) => Ok(FulfillmentResult {
                        delivery: Some(delivery),
                        assignment: None,
                        outcome: FulfillmentOutcome::NoWorkerAvailable,
                        detail: Some(note.to_string()),
                    }),
                    Unassigned::AssignedMeanwhile(existing) => {
                        Ok(already_assigned(state, delivery, existing))
                    }
                }
            }
            Err(AppError::Conflict(_)) => match live_assignment(state, order_id) {
                Some(existing) => Ok(already_assigned(state, delivery, existing)),
                None => Err(AppError::Internal(format!(
                    "assignment for delivery {order_id} conflicted but cannot be found"
                ))),
            },
            Err(err) => {
                let note = format!("assignment error: {err}");
                if let Ok(Unassigned::AssignedMeanwhile(existing)) =
                    mark_unassigned(state, order_id, DeliveryStatus::AssignmentError, &note)
                {
                    warn!(
                        order_id,
                        assignment_id = %existing.id,
                        "assignment failed after a concurrent run succeeded"
                    );
                }
                Err(err)
            }
        }
    }

    fn claim_worker(
        &self,
        state: &AppState,
        order_id: OrderId,
    ) -> Result<Option<Assignment>, AppError> {
        let _claim = state.claim_lock.lock();
        for attempt in 1..=CLAIM_ATTEMPTS {
            let Some(worker) = self.selector.select_worker(state) else {
                return Ok(None);
            };

            match create_assignment(state, order_id, worker.id) {
                Ok(assignment) => return Ok(Some(assignment)),
                Err(AppError::WorkerUnavailable(worker_id)) => {
                    warn!(order_id, worker_id = %worker_id, attempt, "worker claimed concurrently");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(None)
    }
}

fn paid_order(state: &AppState, order_id: OrderId) -> Result<Order, AppError> {
    let order = state
        .orders
        .get(&order_id)
        .map(|order| order.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    let paid = state
        .payments
        .get(&order_id)
        .map(|payment| payment.status == PaymentStatus::Completed)
        .unwrap_or(false);
    if !paid {
        return Err(AppError::Precondition(format!(
            "order {order_id} has no completed payment"
        )));
    }

    Ok(order)
}

fn live_assignment(state: &AppState, order_id: OrderId) -> Option<Assignment> {
    state
        .assignments
        .get(&order_id)
        .map(|assignment| assignment.value().clone())
}

fn already_assigned(state: &AppState, fallback: Delivery, assignment: Assignment) -> FulfillmentResult {
    let delivery = state
        .deliveries
        .get(&assignment.delivery_id)
        .map(|delivery| delivery.value().clone())
        .unwrap_or(fallback);

    FulfillmentResult {
        delivery: Some(delivery),
        assignment: Some(assignment),
        outcome: FulfillmentOutcome::AlreadyAssigned,
        detail: None,
    }
}

fn current_delivery(state: &AppState, order_id: OrderId) -> Option<Delivery> {
    state
        .deliveries
        .get(&order_id)
        .map(|delivery| delivery.value().clone())
}

enum Unassigned {
    Marked(Delivery),
    AssignedMeanwhile(Assignment),
}

fn mark_unassigned(
    state: &AppState,
    order_id: OrderId,
    status: DeliveryStatus,
    note: &str,
) -> Result<Unassigned, AppError> {
    let mut delivery = state
        .deliveries
        .get_mut(&order_id)
        .ok_or_else(|| AppError::Internal(format!("delivery {order_id} disappeared")))?;

    if let Some(existing) = state.assignments.get(&order_id) {
        return Ok(Unassigned::AssignedMeanwhile(existing.value().clone()));
    }

    delivery.transition(status);
    delivery.add_note(note);
    Ok(Unassigned::Marked(delivery.clone()))
}
