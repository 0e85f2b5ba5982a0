use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::config::Config;
use crate::engine::selector::active_assignment_counts;
use crate::geo::{City, Country, Region};
use crate::models::RecordStatus;
use crate::models::customer::Address;
use crate::models::delivery::{AddressSource, Delivery, DeliveryStatus, ShippingAddress};
use crate::models::order::{
    Order, OrderId, OrderMetadata, Payment, PaymentCompleted, PaymentStatus,
};
use crate::models::user::{Role, User};
use crate::models::worker::{Availability, WorkerProfile};
use crate::state::AppState;

pub const COUNTRY: Uuid = Uuid::from_u128(0xC0);
pub const REGION: Uuid = Uuid::from_u128(0x5C);
pub const CITY: Uuid = Uuid::from_u128(0xC1);

pub fn empty_state() -> AppState {
    AppState::new(&Config::default()).0
}

pub fn insert_geography(state: &AppState) {
    state.countries.insert(
        COUNTRY,
        Country {
            id: COUNTRY,
            name: "Bolivia".to_string(),
            code: Some("BO".to_string()),
        },
    );
    state.regions.insert(
        REGION,
        Region {
            id: REGION,
            country_id: COUNTRY,
            name: "Santa Cruz".to_string(),
        },
    );
    state.cities.insert(
        CITY,
        City {
            id: CITY,
            state_id: REGION,
            name: "Santa Cruz de la Sierra".to_string(),
        },
    );
}

pub fn insert_customer(state: &AppState, seed: u128) -> Uuid {
    let id = Uuid::from_u128(seed);
    state.users.insert(
        id,
        User {
            id,
            name: format!("Customer {seed}"),
            phone: Some("+591 700 00000".to_string()),
            role: Role::Customer,
            status: RecordStatus::Active,
            created_at: Utc::now(),
        },
    );
    id
}

pub fn insert_address(state: &AppState, seed: u128, customer_id: Uuid, is_default: bool) -> Uuid {
    let id = Uuid::from_u128(seed);
    state.addresses.insert(
        id,
        Address {
            id,
            customer_id,
            recipient_name: format!("Recipient {seed}"),
            phone: None,
            line1: format!("Calle {seed}"),
            line2: None,
            country_id: COUNTRY,
            state_id: REGION,
            city_id: CITY,
            postal_code: None,
            is_default,
            status: RecordStatus::Active,
            created_at: Utc::now(),
        },
    );
    id
}

pub fn insert_paid_order(state: &AppState, order_id: OrderId, customer_id: Uuid) {
    insert_order(state, order_id, customer_id, OrderMetadata::default());
    let paid_at = Utc::now();
    if let Some(mut order) = state.orders.get_mut(&order_id) {
        order.paid_at = Some(paid_at);
    }
    state.payments.insert(
        order_id,
        Payment {
            id: Uuid::new_v4(),
            order_id,
            amount_cents: 12_500,
            currency: "BOB".to_string(),
            provider_reference: format!("test-{order_id}"),
            status: PaymentStatus::Completed,
            completed_at: Some(paid_at),
        },
    );
}

pub fn insert_order(
    state: &AppState,
    order_id: OrderId,
    customer_id: Uuid,
    metadata: OrderMetadata,
) {
    state.orders.insert(
        order_id,
        Order {
            id: order_id,
            customer_id,
            items: Vec::new(),
            subtotal_cents: 12_500,
            discount_percent: 0,
            discount_cents: 0,
            total_cents: 12_500,
            currency: "BOB".to_string(),
            metadata,
            status: RecordStatus::Active,
            created_at: Utc::now(),
            paid_at: None,
        },
    );
    state.reserve_order_ids_through(order_id);
}

pub fn payment_event(order_id: OrderId, customer_id: Uuid, amount_cents: u64) -> PaymentCompleted {
    PaymentCompleted {
        order_id,
        customer_id,
        amount_cents,
        completed_at: Utc::now(),
    }
}

pub fn insert_delivery(state: &AppState, order_id: OrderId) {
    state.deliveries.insert(
        order_id,
        Delivery {
            order_id,
            recipient_name: "Recipient".to_string(),
            recipient_phone: None,
            address: ShippingAddress {
                line1: "Calle 1".to_string(),
                line2: None,
                country_id: COUNTRY,
                state_id: REGION,
                city_id: CITY,
                postal_code: None,
            },
            address_source: AddressSource::CustomerDefault,
            status: DeliveryStatus::Pending,
            estimated_arrival: Utc::now() + Duration::days(3),
            actual_arrival: None,
            notes: String::new(),
            updated_at: Utc::now(),
        },
    );
}

pub fn insert_worker(state: &AppState, seed: u128, availability: Availability) -> Uuid {
    let id = Uuid::from_u128(0xA000 + seed);
    state.users.insert(
        id,
        User {
            id,
            name: format!("Worker {seed}"),
            phone: None,
            role: Role::DeliveryWorker,
            status: RecordStatus::Active,
            created_at: Utc::now(),
        },
    );
    state.worker_profiles.insert(
        id,
        WorkerProfile {
            worker_id: id,
            identification_number: format!("CI-{seed}"),
            availability,
            vehicle: None,
            created_at: Utc::now() - Duration::minutes(1_000 - seed as i64),
            updated_at: Utc::now(),
        },
    );
    id
}

pub fn availability(state: &AppState, worker_id: Uuid) -> Availability {
    state
        .worker_profiles
        .get(&worker_id)
        .map(|profile| profile.availability)
        .expect("worker profile exists")
}

pub fn delivery_status(state: &AppState, order_id: OrderId) -> DeliveryStatus {
    state
        .deliveries
        .get(&order_id)
        .map(|delivery| delivery.status)
        .expect("delivery exists")
}

pub fn assert_pool_consistent(state: &AppState) {
    let active = active_assignment_counts(state);
    for profile in state.worker_profiles.iter() {
        let count = active.get(&profile.worker_id).copied().unwrap_or(0);
        assert!(count <= 1, "worker {} holds {count} active assignments", profile.worker_id);
        assert_eq!(
            profile.availability == Availability::Busy,
            count == 1,
            "worker {} is {:?} with {count} active assignments",
            profile.worker_id,
            profile.availability
        );
    }
}
