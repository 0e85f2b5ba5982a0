use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::worker::{Availability, Worker};
use crate::state::AppState;

// Selection only; the caller claims the worker.
pub trait WorkerSelector: Send + Sync {
    fn select_worker(&self, state: &AppState) -> Option<Worker>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LeastLoadedSelector;

impl WorkerSelector for LeastLoadedSelector {
    fn select_worker(&self, state: &AppState) -> Option<Worker> {
        let load = active_assignment_counts(state);

        let mut candidates: Vec<(usize, Worker)> = state
            .worker_profiles
            .iter()
            .filter(|entry| entry.availability == Availability::Available)
            .filter_map(|entry| {
                let profile = entry.value();
                let user = state.users.get(&profile.worker_id)?;
                if !user.is_active_worker() {
                    return None;
                }

                let worker = Worker {
                    id: user.id,
                    name: user.name.clone(),
                    phone: user.phone.clone(),
                    profile: profile.clone(),
                };
                Some((load.get(&worker.id).copied().unwrap_or(0), worker))
            })
            .collect();

        candidates.sort_by(|(a_load, a), (b_load, b)| {
            a_load
                .cmp(b_load)
                .then(a.profile.created_at.cmp(&b.profile.created_at))
                .then(a.id.cmp(&b.id))
        });

        candidates.into_iter().next().map(|(_, worker)| worker)
    }
}

pub fn active_assignment_counts(state: &AppState) -> HashMap<Uuid, usize> {
    let mut counts = HashMap::new();
    for entry in state.assignments.iter() {
        if entry.status.is_active() {
            *counts.entry(entry.worker_id).or_insert(0) += 1;
        }
    }
    counts
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerLoad {
    pub worker_id: Uuid,
    pub name: String,
    pub availability: Availability,
    pub active_assignments: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PoolLoad {
    pub available: usize,
    pub busy: usize,
    pub offline: usize,
    pub workers: Vec<WorkerLoad>,
}

pub fn pool_load(state: &AppState) -> PoolLoad {
    let counts = active_assignment_counts(state);
    let mut pool = PoolLoad::default();

    for entry in state.worker_profiles.iter() {
        let profile = entry.value();
        let name = state
            .users
            .get(&profile.worker_id)
            .map(|user| user.name.clone())
            .unwrap_or_default();

        match profile.availability {
            Availability::Available => pool.available += 1,
            Availability::Busy => pool.busy += 1,
            Availability::Offline => pool.offline += 1,
        }

        pool.workers.push(WorkerLoad {
            worker_id: profile.worker_id,
            name,
            availability: profile.availability,
            active_assignments: counts.get(&profile.worker_id).copied().unwrap_or(0),
        });
    }

    pool.workers.sort_by(|a, b| {
        b.active_assignments
            .cmp(&a.active_assignments)
            .then(a.worker_id.cmp(&b.worker_id))
    });
    pool
}
