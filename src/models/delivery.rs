use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::OrderId;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    Failed,
    Returned,
    PendingAssignment,
    AssignmentError,
}

impl DeliveryStatus {
    pub fn awaits_assignment(&self) -> bool {
        matches!(
            self,
            DeliveryStatus::Pending
                | DeliveryStatus::PendingAssignment
                | DeliveryStatus::AssignmentError
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AddressSource {
    Selected,
    CustomerDefault,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShippingAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub country_id: Uuid,
    pub state_id: Uuid,
    pub city_id: Uuid,
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub order_id: OrderId,
    pub recipient_name: String,
    pub recipient_phone: Option<String>,
    pub address: ShippingAddress,
    pub address_source: AddressSource,
    pub status: DeliveryStatus,
    pub estimated_arrival: DateTime<Utc>,
    pub actual_arrival: Option<DateTime<Utc>>,
    pub notes: String,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    pub fn add_note(&mut self, note: impl AsRef<str>) {
        if !self.notes.is_empty() {
            self.notes.push('\n');
        }
        self.notes.push_str(note.as_ref());
    }

    pub(crate) fn transition(&mut self, status: DeliveryStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
