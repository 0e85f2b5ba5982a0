use serde::Serialize;
use uuid::Uuid;

use crate::models::assignment::Assignment;
use crate::models::customer::LoyaltyTier;
use crate::models::delivery::Delivery;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    DeliveryCreated { delivery: Delivery },
    AssignmentCreated { assignment: Assignment },
    AssignmentStarted { assignment: Assignment },
    AssignmentCompleted { assignment: Assignment },
    AssignmentCancelled { assignment: Assignment },
    LoyaltyUpdated { customer_id: Uuid, tier: LoyaltyTier },
    PoolReset { workers: Vec<Uuid> },
}
