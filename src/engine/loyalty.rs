use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::customer::{CustomerLoyalty, LoyaltyTier};
use crate::models::event::LifecycleEvent;
use crate::models::order::PaymentCompleted;
use crate::state::AppState;

const CENTS_PER_UNIT: u64 = 100;

// (tier, min spend, min orders), highest first
const TIER_THRESHOLDS: [(LoyaltyTier, u64, u32); 3] = [
    (LoyaltyTier::Platinum, 1_000 * CENTS_PER_UNIT, 10),
    (LoyaltyTier::Gold, 500 * CENTS_PER_UNIT, 5),
    (LoyaltyTier::Silver, 200 * CENTS_PER_UNIT, 3),
];

pub fn tier_for(order_count: u32, total_spent_cents: u64) -> LoyaltyTier {
    TIER_THRESHOLDS
        .iter()
        .find(|(_, min_spent, min_orders)| {
            total_spent_cents >= *min_spent || order_count >= *min_orders
        })
        .map(|(tier, _, _)| *tier)
        .unwrap_or(LoyaltyTier::Standard)
}

#[derive(Debug, Clone, Serialize)]
pub struct LoyaltyUpdate {
    pub customer_id: Uuid,
    pub previous_tier: LoyaltyTier,
    pub tier: LoyaltyTier,
    pub order_count: u32,
    pub total_spent_cents: u64,
    pub points: u64,
    pub applied: bool,
}

pub fn on_payment_completed(
    state: &AppState,
    event: &PaymentCompleted,
) -> Result<LoyaltyUpdate, AppError> {
    let is_customer = state
        .users
        .get(&event.customer_id)
        .map(|user| user.status.is_active())
        .unwrap_or(false);
    if !is_customer {
        return Err(AppError::Precondition(format!(
            "customer {} is not an active user",
            event.customer_id
        )));
    }

    let update = {
        let mut loyalty = state
            .loyalty
            .entry(event.customer_id)
            .or_insert_with(|| CustomerLoyalty::new(event.customer_id));

        let previous_tier = loyalty.tier;
        let applied = loyalty.credited_orders.insert(event.order_id);
        if applied {
            loyalty.order_count = loyalty.order_count.saturating_add(1);
            loyalty.total_spent_cents = loyalty.total_spent_cents.saturating_add(event.amount_cents);
            loyalty.points = loyalty
                .points
                .saturating_add(event.amount_cents / CENTS_PER_UNIT);
            if loyalty.last_order_at.is_none_or(|last| last < event.completed_at) {
                loyalty.last_order_at = Some(event.completed_at);
            }
            loyalty.tier = tier_for(loyalty.order_count, loyalty.total_spent_cents);
        }

        LoyaltyUpdate {
            customer_id: event.customer_id,
            previous_tier,
            tier: loyalty.tier,
            order_count: loyalty.order_count,
            total_spent_cents: loyalty.total_spent_cents,
            points: loyalty.points,
            applied,
        }
    };

    if !update.applied {
        debug!(
            order_id = event.order_id,
            customer_id = %event.customer_id,
            "payment already credited to loyalty"
        );
        return Ok(update);
    }

    state
        .metrics
        .loyalty_updates_total
        .with_label_values(&[update.tier.as_str()])
        .inc();
    info!(
        order_id = event.order_id,
        customer_id = %event.customer_id,
        tier = update.tier.as_str(),
        order_count = update.order_count,
        "loyalty updated"
    );
    if update.tier != update.previous_tier {
        state.publish(LifecycleEvent::LoyaltyUpdated {
            customer_id: update.customer_id,
            tier: update.tier,
        });
    }

    Ok(update)
}
