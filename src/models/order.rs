use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::RecordStatus;

pub type OrderId = u64;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderMetadata {
    #[serde(default)]
    pub selected_address_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub quantity: u32,
    pub unit_price_cents: u64,
    pub line_total_cents: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: Uuid,
    pub items: Vec<OrderItem>,
    pub subtotal_cents: u64,
    pub discount_percent: u8,
    pub discount_cents: u64,
    pub total_cents: u64,
    pub currency: String,
    pub metadata: OrderMetadata,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some()
    }

    // None on overflow.
    pub(crate) fn totals_with_line(&self, line_total_cents: u64) -> Option<OrderTotals> {
        let subtotal_cents = self
            .items
            .iter()
            .try_fold(line_total_cents, |sum, item| sum.checked_add(item.line_total_cents))?;
        let discount_cents = subtotal_cents.checked_mul(u64::from(self.discount_percent))? / 100;
        Some(OrderTotals {
            subtotal_cents,
            discount_cents,
            total_cents: subtotal_cents - discount_cents,
        })
    }

    pub(crate) fn apply_totals(&mut self, totals: OrderTotals) {
        self.subtotal_cents = totals.subtotal_cents;
        self.discount_cents = totals.discount_cents;
        self.total_cents = totals.total_cents;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OrderTotals {
    pub subtotal_cents: u64,
    pub discount_cents: u64,
    pub total_cents: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub price_cents: u64,
    pub stock: u32,
    #[serde(default)]
    pub status: RecordStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: OrderId,
    pub amount_cents: u64,
    pub currency: String,
    pub provider_reference: String,
    pub status: PaymentStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentCompleted {
    pub order_id: OrderId,
    pub customer_id: Uuid,
    pub amount_cents: u64,
    pub completed_at: DateTime<Utc>,
}
