use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::engine::loyalty::on_payment_completed;
use crate::engine::orchestrator::Orchestrator;
use crate::error::AppError;
use crate::models::order::PaymentCompleted;
use crate::state::AppState;

pub async fn publish_payment(state: &AppState, event: PaymentCompleted) -> Result<(), AppError> {
    state
        .payment_tx
        .send(event)
        .await
        .map_err(|err| AppError::Internal(format!("payment queue send failed: {err}")))?;

    state.metrics.payment_events_in_queue.inc();
    Ok(())
}

pub async fn run_fulfillment_engine(
    state: Arc<AppState>,
    mut payment_rx: mpsc::Receiver<PaymentCompleted>,
) {
    info!("fulfillment engine started");
    let orchestrator = Orchestrator::new();

    while let Some(event) = payment_rx.recv().await {
        state.metrics.payment_events_in_queue.dec();
        handle_payment_completed(&state, &orchestrator, &event);
    }

    warn!("fulfillment engine stopped: payment channel closed");
}

pub fn handle_payment_completed(
    state: &AppState,
    orchestrator: &Orchestrator,
    event: &PaymentCompleted,
) {
    if let Err(err) = on_payment_completed(state, event) {
        error!(
            order_id = event.order_id,
            customer_id = %event.customer_id,
            error = %err,
            "loyalty update failed"
        );
    }

    if let Err(err) = orchestrator.fulfill(state, event.order_id) {
        error!(order_id = event.order_id, error = %err, "automatic fulfillment failed");
    }
}

#[cfg(test)]
mod tests {
    use super::handle_payment_completed;
    use crate::engine::orchestrator::Orchestrator;
    use crate::models::delivery::DeliveryStatus;
    use crate::models::worker::Availability;
    use crate::test_support::{
        delivery_status, empty_state, insert_customer, insert_geography, insert_paid_order,
        insert_worker, payment_event,
    };

    #[test]
    fn loyalty_failure_does_not_block_fulfillment() {
        let state = empty_state();
        insert_geography(&state);
        let customer = insert_customer(&state, 1);
        insert_paid_order(&state, 9, customer);
        insert_worker(&state, 1, Availability::Available);
        let mut event = payment_event(9, customer, 12_500);
        event.customer_id = uuid::Uuid::from_u128(404);

        handle_payment_completed(&state, &Orchestrator::new(), &event);

        assert!(state.loyalty.is_empty());
        assert_eq!(delivery_status(&state, 9), DeliveryStatus::Processing);
    }

    #[test]
    fn fulfillment_failure_does_not_block_loyalty() {
        let state = empty_state();
        let customer = insert_customer(&state, 1);
        let event = payment_event(9, customer, 12_500);

        handle_payment_completed(&state, &Orchestrator::new(), &event);

        assert_eq!(state.loyalty.get(&customer).unwrap().order_count, 1);
        assert!(state.deliveries.is_empty());
    }
}
