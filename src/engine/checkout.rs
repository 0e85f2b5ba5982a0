use chrono::Utc;
use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::RecordStatus;
use crate::models::order::{
    Order, OrderId, OrderItem, OrderMetadata, Payment, PaymentCompleted, PaymentStatus,
};
use crate::models::user::Role;
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub currency: String,
    #[serde(default)]
    pub discount_percent: u8,
    #[serde(default)]
    pub metadata: OrderMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub event: PaymentCompleted,
    pub newly_completed: bool,
}

pub fn create_order(state: &AppState, request: NewOrder) -> Result<Order, AppError> {
    let is_customer = state
        .users
        .get(&request.customer_id)
        .map(|user| user.role == Role::Customer && user.status.is_active())
        .unwrap_or(false);
    if !is_customer {
        return Err(AppError::BadRequest(format!(
            "{} is not an active customer",
            request.customer_id
        )));
    }
    if request.discount_percent > 100 {
        return Err(AppError::BadRequest(
            "discount_percent must be within 0..=100".to_string(),
        ));
    }
    if request.currency.trim().is_empty() {
        return Err(AppError::BadRequest("currency cannot be empty".to_string()));
    }

    let order = Order {
        id: state.next_order_id(),
        customer_id: request.customer_id,
        items: Vec::new(),
        subtotal_cents: 0,
        discount_percent: request.discount_percent,
        discount_cents: 0,
        total_cents: 0,
        currency: request.currency.to_uppercase(),
        metadata: request.metadata,
        status: RecordStatus::Active,
        created_at: Utc::now(),
        paid_at: None,
    };

    state.orders.insert(order.id, order.clone());
    info!(order_id = order.id, customer_id = %order.customer_id, "order created");
    Ok(order)
}

pub fn add_item(
    state: &AppState,
    order_id: OrderId,
    product_id: Uuid,
    quantity: u32,
) -> Result<Order, AppError> {
    if quantity == 0 {
        return Err(AppError::BadRequest("quantity must be > 0".to_string()));
    }

    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
    if order.is_paid() {
        return Err(AppError::Conflict(format!(
            "order {order_id} is paid and can no longer change"
        )));
    }
    if !order.status.is_active() {
        return Err(AppError::Conflict(format!("order {order_id} is archived")));
    }

    let mut product = state
        .products
        .get_mut(&product_id)
        .ok_or_else(|| AppError::NotFound(format!("product {product_id} not found")))?;
    if !product.status.is_active() {
        return Err(AppError::BadRequest(format!(
            "product {product_id} is no longer sold"
        )));
    }
    if product.stock < quantity {
        return Err(AppError::OutOfStock {
            product_id,
            requested: quantity,
            available: product.stock,
        });
    }

    let unit_price_cents = product.price_cents;
    let line_total_cents = unit_price_cents
        .checked_mul(u64::from(quantity))
        .ok_or_else(|| AppError::BadRequest("line total overflows".to_string()))?;
    let totals = order
        .totals_with_line(line_total_cents)
        .ok_or_else(|| AppError::BadRequest("order total overflows".to_string()))?;

    product.stock -= quantity;
    drop(product);

    order.items.push(OrderItem {
        product_id,
        quantity,
        unit_price_cents,
        line_total_cents,
    });
    order.apply_totals(totals);

    Ok(order.clone())
}

// A repeat returns the original fact and changes nothing.
pub fn complete_payment(
    state: &AppState,
    order_id: OrderId,
    provider_reference: &str,
) -> Result<PaymentReceipt, AppError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    let slot = match state.payments.entry(order_id) {
        Entry::Occupied(existing) if existing.get().status == PaymentStatus::Completed => {
            let payment = existing.get().clone();
            let event = PaymentCompleted {
                order_id,
                customer_id: order.customer_id,
                amount_cents: payment.amount_cents,
                completed_at: payment.completed_at.unwrap_or(payment_time(&order)),
            };
            return Ok(PaymentReceipt {
                payment,
                event,
                newly_completed: false,
            });
        }
        slot => slot,
    };

    if !order.status.is_active() {
        return Err(AppError::Precondition(format!("order {order_id} is archived")));
    }
    if order.total_cents == 0 {
        return Err(AppError::Precondition(format!(
            "order {order_id} has nothing to pay for"
        )));
    }

    let now = Utc::now();
    let payment = Payment {
        id: Uuid::new_v4(),
        order_id,
        amount_cents: order.total_cents,
        currency: order.currency.clone(),
        provider_reference: provider_reference.to_string(),
        status: PaymentStatus::Completed,
        completed_at: Some(now),
    };
    order.paid_at = Some(now);
    slot.insert(payment.clone());

    info!(order_id, amount_cents = payment.amount_cents, "payment completed");
    Ok(PaymentReceipt {
        event: PaymentCompleted {
            order_id,
            customer_id: order.customer_id,
            amount_cents: payment.amount_cents,
            completed_at: now,
        },
        payment,
        newly_completed: true,
    })
}

fn payment_time(order: &Order) -> chrono::DateTime<Utc> {
    order.paid_at.unwrap_or(order.created_at)
}

pub fn archive_order(state: &AppState, order_id: OrderId) -> Result<Order, AppError> {
    let mut order = state
        .orders
        .get_mut(&order_id)
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    if order.status == RecordStatus::Archived {
        return Err(AppError::invalid_state("order", "active", order.status));
    }
    order.status = RecordStatus::Archived;
    Ok(order.clone())
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{NewOrder, add_item, archive_order, complete_payment, create_order};
    use crate::error::AppError;
    use crate::models::RecordStatus;
    use crate::models::order::{OrderMetadata, Product};
    use crate::state::AppState;
    use crate::test_support::{empty_state, insert_customer};

    fn insert_product(state: &AppState, stock: u32, price_cents: u64) -> Uuid {
        let id = Uuid::new_v4();
        state.products.insert(
            id,
            Product {
                id,
                name: "Coffee beans".to_string(),
                price_cents,
                stock,
                status: RecordStatus::Active,
            },
        );
        id
    }

    fn new_order(customer_id: Uuid, discount_percent: u8) -> NewOrder {
        NewOrder {
            customer_id,
            currency: "bob".to_string(),
            discount_percent,
            metadata: OrderMetadata::default(),
        }
    }

    #[test]
    fn items_decrement_stock_and_update_totals() {
        let state = empty_state();
        let customer = insert_customer(&state, 1);
        let product = insert_product(&state, 5, 1_000);
        let order = create_order(&state, new_order(customer, 10)).unwrap();
        assert_eq!(order.currency, "BOB");

        let order = add_item(&state, order.id, product, 3).unwrap();

        assert_eq!(order.subtotal_cents, 3_000);
        assert_eq!(order.discount_cents, 300);
        assert_eq!(order.total_cents, 2_700);
        assert_eq!(state.products.get(&product).unwrap().stock, 2);
    }

    #[test]
    fn insufficient_stock_changes_nothing() {
        let state = empty_state();
        let customer = insert_customer(&state, 1);
        let product = insert_product(&state, 2, 1_000);
        let order = create_order(&state, new_order(customer, 0)).unwrap();

        let err = add_item(&state, order.id, product, 3).unwrap_err();

        assert!(matches!(err, AppError::OutOfStock { available: 2, .. }));
        assert_eq!(state.products.get(&product).unwrap().stock, 2);
        assert!(state.orders.get(&order.id).unwrap().items.is_empty());
    }

    #[test]
    fn overflowing_line_total_keeps_stock() {
        let state = empty_state();
        let customer = insert_customer(&state, 1);
        let product = insert_product(&state, 10, u64::MAX / 2);
        let order = create_order(&state, new_order(customer, 0)).unwrap();

        let err = add_item(&state, order.id, product, 3).unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(state.products.get(&product).unwrap().stock, 10);
        let order = state.orders.get(&order.id).unwrap();
        assert!(order.items.is_empty());
        assert_eq!(order.total_cents, 0);
    }

    #[test]
    fn overflowing_subtotal_or_discount_keeps_stock() {
        let state = empty_state();
        let customer = insert_customer(&state, 1);
        let pricey = insert_product(&state, 10, u64::MAX / 2);
        let order = create_order(&state, new_order(customer, 0)).unwrap();
        add_item(&state, order.id, pricey, 1).unwrap();

        let err = add_item(&state, order.id, pricey, 2).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(state.products.get(&pricey).unwrap().stock, 9);
        assert_eq!(state.orders.get(&order.id).unwrap().items.len(), 1);

        let discounted = create_order(&state, new_order(customer, 50)).unwrap();
        let err = add_item(&state, discounted.id, pricey, 1).unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert_eq!(state.products.get(&pricey).unwrap().stock, 9);
    }

    #[test]
    fn only_customers_can_order() {
        let state = empty_state();
        let worker = crate::test_support::insert_worker(
            &state,
            1,
            crate::models::worker::Availability::Available,
        );
        assert!(create_order(&state, new_order(worker, 0)).is_err());
    }

    #[test]
    fn payment_completion_is_idempotent_and_freezes_the_order() {
        let state = empty_state();
        let customer = insert_customer(&state, 1);
        let product = insert_product(&state, 5, 1_000);
        let order = create_order(&state, new_order(customer, 0)).unwrap();
        add_item(&state, order.id, product, 1).unwrap();

        let first = complete_payment(&state, order.id, "gw-1").unwrap();
        let second = complete_payment(&state, order.id, "gw-1").unwrap();

        assert!(first.newly_completed);
        assert!(!second.newly_completed);
        assert_eq!(first.event, second.event);
        assert_eq!(first.event.amount_cents, 1_000);
        assert!(matches!(
            add_item(&state, order.id, product, 1),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn empty_order_cannot_be_paid() {
        let state = empty_state();
        let customer = insert_customer(&state, 1);
        let order = create_order(&state, new_order(customer, 0)).unwrap();

        assert!(matches!(
            complete_payment(&state, order.id, "gw-1"),
            Err(AppError::Precondition(_))
        ));
        assert!(state.payments.is_empty());
    }

    #[test]
    fn archiving_twice_is_rejected() {
        let state = empty_state();
        let customer = insert_customer(&state, 1);
        let order = create_order(&state, new_order(customer, 0)).unwrap();

        let archived = archive_order(&state, order.id).unwrap();
        assert_eq!(archived.status, RecordStatus::Archived);
        assert!(matches!(
            archive_order(&state, order.id),
            Err(AppError::InvalidState { .. })
        ));
    }
}
