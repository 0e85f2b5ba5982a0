use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::RecordStatus;
use crate::models::order::OrderId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub recipient_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub country_id: Uuid,
    pub state_id: Uuid,
    pub city_id: Uuid,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub status: RecordStatus,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTier {
    #[default]
    Standard,
    Silver,
    Gold,
    Platinum,
}

impl LoyaltyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoyaltyTier::Standard => "standard",
            LoyaltyTier::Silver => "silver",
            LoyaltyTier::Gold => "gold",
            LoyaltyTier::Platinum => "platinum",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerLoyalty {
    pub customer_id: Uuid,
    pub tier: LoyaltyTier,
    pub order_count: u32,
    pub total_spent_cents: u64,
    pub points: u64,
    pub last_order_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub credited_orders: HashSet<OrderId>,
}

impl CustomerLoyalty {
    pub fn new(customer_id: Uuid) -> Self {
        Self {
            customer_id,
            tier: LoyaltyTier::Standard,
            order_count: 0,
            total_spent_cents: 0,
            points: 0,
            last_order_at: None,
            credited_orders: HashSet::new(),
        }
    }
}
