use std::ops::DerefMut;

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::selector::active_assignment_counts;
use crate::error::AppError;
use crate::models::assignment::{Assignment, AssignmentStatus};
use crate::models::delivery::DeliveryStatus;
use crate::models::event::LifecycleEvent;
use crate::models::order::OrderId;
use crate::models::worker::{Availability, WorkerProfile};
use crate::state::AppState;

pub fn create_assignment(
    state: &AppState,
    delivery_id: OrderId,
    worker_id: Uuid,
) -> Result<Assignment, AppError> {
    let worker_is_eligible = state
        .users
        .get(&worker_id)
        .map(|user| user.is_active_worker())
        .unwrap_or(false);
    if !worker_is_eligible {
        return Err(AppError::Precondition(format!(
            "user {worker_id} is not an active delivery worker"
        )));
    }

    let assignment = {
        let _gate = state.pool_gate.read();
        let mut delivery = state.deliveries.get_mut(&delivery_id).ok_or_else(|| {
            AppError::Precondition(format!("delivery {delivery_id} does not exist"))
        })?;

        let slot = match state.assignments.entry(delivery_id) {
            Entry::Occupied(existing) => {
                return Err(AppError::Conflict(format!(
                    "delivery {delivery_id} is already assigned to worker {}",
                    existing.get().worker_id
                )));
            }
            Entry::Vacant(slot) => slot,
        };

        let mut profile = locked_profile(state, worker_id)?;
        if profile.availability != Availability::Available {
            return Err(AppError::WorkerUnavailable(worker_id));
        }

        let assignment = Assignment::new(delivery_id, worker_id);
        profile.availability = Availability::Busy;
        profile.updated_at = assignment.assigned_at;
        if delivery.status.awaits_assignment() {
            delivery.transition(DeliveryStatus::Processing);
        }
        slot.insert(assignment.clone());
        assignment
    };

    record_transition(state, "create");
    info!(
        order_id = delivery_id,
        worker_id = %worker_id,
        assignment_id = %assignment.id,
        "delivery assigned"
    );
    state.publish(LifecycleEvent::AssignmentCreated {
        assignment: assignment.clone(),
    });

    Ok(assignment)
}

pub fn start(state: &AppState, delivery_id: OrderId) -> Result<Assignment, AppError> {
    let assignment = {
        let mut delivery = state
            .deliveries
            .get_mut(&delivery_id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;
        let mut assignment = locked_assignment(state, delivery_id)?;

        if assignment.status != AssignmentStatus::Assigned {
            return Err(AppError::invalid_state(
                "assignment",
                "assigned",
                assignment.status,
            ));
        }

        assignment.status = AssignmentStatus::InProgress;
        assignment.started_at = Some(Utc::now());
        delivery.transition(DeliveryStatus::OutForDelivery);
        assignment.clone()
    };

    record_transition(state, "start");
    info!(order_id = delivery_id, worker_id = %assignment.worker_id, "assignment started");
    state.publish(LifecycleEvent::AssignmentStarted {
        assignment: assignment.clone(),
    });

    Ok(assignment)
}

pub fn complete(state: &AppState, delivery_id: OrderId) -> Result<Assignment, AppError> {
    let assignment = {
        let _gate = state.pool_gate.read();
        let mut delivery = state
            .deliveries
            .get_mut(&delivery_id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;
        let mut assignment = locked_assignment(state, delivery_id)?;

        if assignment.status != AssignmentStatus::InProgress {
            return Err(AppError::invalid_state(
                "assignment",
                "in_progress",
                assignment.status,
            ));
        }

        let mut profile = locked_profile(state, assignment.worker_id)?;

        let now = Utc::now();
        assignment.status = AssignmentStatus::Completed;
        assignment.completed_at = Some(now);
        delivery.transition(DeliveryStatus::Delivered);
        delivery.actual_arrival = Some(now);
        profile.availability = Availability::Available;
        profile.updated_at = now;
        assignment.clone()
    };

    record_transition(state, "complete");
    info!(order_id = delivery_id, worker_id = %assignment.worker_id, "assignment completed");
    state.publish(LifecycleEvent::AssignmentCompleted {
        assignment: assignment.clone(),
    });

    Ok(assignment)
}

pub fn cancel(state: &AppState, delivery_id: OrderId, reason: &str) -> Result<Assignment, AppError> {
    let assignment = {
        let _gate = state.pool_gate.read();
        let mut delivery = state
            .deliveries
            .get_mut(&delivery_id)
            .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} not found")))?;

        let occupied = match state.assignments.entry(delivery_id) {
            Entry::Occupied(occupied) => occupied,
            Entry::Vacant(_) => {
                return Err(AppError::NotFound(format!(
                    "delivery {delivery_id} has no assignment"
                )));
            }
        };

        let status = occupied.get().status;
        if !status.is_active() {
            return Err(AppError::invalid_state(
                "assignment",
                "assigned or in_progress",
                status,
            ));
        }

        let mut profile = locked_profile(state, occupied.get().worker_id)?;

        let now = Utc::now();
        let mut assignment = occupied.remove();
        assignment.status = AssignmentStatus::Cancelled;
        assignment.cancelled_at = Some(now);
        assignment.notes = reason.to_string();

        delivery.transition(DeliveryStatus::PendingAssignment);
        delivery.add_note(format!("assignment cancelled: {reason}"));
        profile.availability = Availability::Available;
        profile.updated_at = now;

        state
            .assignment_history
            .insert(assignment.id, assignment.clone());
        assignment
    };

    record_transition(state, "cancel");
    warn!(
        order_id = delivery_id,
        worker_id = %assignment.worker_id,
        reason,
        "assignment cancelled"
    );
    state.publish(LifecycleEvent::AssignmentCancelled {
        assignment: assignment.clone(),
    });

    Ok(assignment)
}

pub fn set_availability(
    state: &AppState,
    worker_id: Uuid,
    availability: Availability,
) -> Result<WorkerProfile, AppError> {
    if availability == Availability::Busy {
        return Err(AppError::BadRequest(
            "busy is derived from assignments and cannot be set directly".to_string(),
        ));
    }

    let _gate = state.pool_gate.read();
    let mut profile = state
        .worker_profiles
        .get_mut(&worker_id)
        .ok_or_else(|| AppError::NotFound(format!("worker {worker_id} not found")))?;

    if profile.availability == Availability::Busy {
        return Err(AppError::Conflict(format!(
            "worker {worker_id} has an active assignment"
        )));
    }

    profile.availability = availability;
    profile.updated_at = Utc::now();
    Ok(profile.clone())
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolReset {
    pub released: Vec<Uuid>,
    pub still_busy: usize,
}

// Workers with an active assignment stay busy.
pub fn reset_pool(state: &AppState) -> PoolReset {
    let result = {
        let _gate = state.pool_gate.write();
        let active = active_assignment_counts(state);
        let mut result = PoolReset::default();

        for mut profile in state.worker_profiles.iter_mut() {
            if profile.availability != Availability::Busy {
                continue;
            }
            if active.contains_key(&profile.worker_id) {
                result.still_busy += 1;
                continue;
            }

            profile.availability = Availability::Available;
            profile.updated_at = Utc::now();
            result.released.push(profile.worker_id);
        }

        result.released.sort();
        result
    };

    record_transition(state, "reset");
    warn!(
        released = result.released.len(),
        still_busy = result.still_busy,
        workers = ?result.released,
        "worker pool reset"
    );
    state.publish(LifecycleEvent::PoolReset {
        workers: result.released.clone(),
    });

    result
}

fn locked_assignment(
    state: &AppState,
    delivery_id: OrderId,
) -> Result<impl DerefMut<Target = Assignment> + '_, AppError> {
    state
        .assignments
        .get_mut(&delivery_id)
        .ok_or_else(|| AppError::NotFound(format!("delivery {delivery_id} has no assignment")))
}

fn locked_profile(
    state: &AppState,
    worker_id: Uuid,
) -> Result<impl DerefMut<Target = WorkerProfile> + '_, AppError> {
    state
        .worker_profiles
        .get_mut(&worker_id)
        .ok_or_else(|| AppError::NotFound(format!("worker profile {worker_id} not found")))
}

fn record_transition(state: &AppState, transition: &str) {
    state
        .metrics
        .assignment_transitions_total
        .with_label_values(&[transition])
        .inc();
}
