use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::OrderId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
    Cancelled,
}

impl AssignmentStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, AssignmentStatus::Assigned | AssignmentStatus::InProgress)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub delivery_id: OrderId,
    pub worker_id: Uuid,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: String,
}

impl Assignment {
    pub fn new(delivery_id: OrderId, worker_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            delivery_id,
            worker_id,
            status: AssignmentStatus::Assigned,
            assigned_at: Utc::now(),
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            notes: String::new(),
        }
    }
}
