use std::sync::{Arc, Barrier};

use chrono::Utc;
use fulfillment_dispatch::config::Config;
use fulfillment_dispatch::directory::{Seed, insert_worker_profile};
use fulfillment_dispatch::engine::assignment::reset_pool;
use fulfillment_dispatch::engine::checkout::{NewOrder, add_item, complete_payment, create_order};
use fulfillment_dispatch::engine::loyalty::on_payment_completed;
use fulfillment_dispatch::engine::orchestrator::{FulfillmentOutcome, Orchestrator};
use fulfillment_dispatch::engine::selector::active_assignment_counts;
use fulfillment_dispatch::error::AppError;
use fulfillment_dispatch::models::RecordStatus;
use fulfillment_dispatch::models::order::{OrderId, OrderMetadata, PaymentCompleted};
use fulfillment_dispatch::models::user::{Role, User};
use fulfillment_dispatch::models::worker::{Availability, WorkerProfile};
use fulfillment_dispatch::state::AppState;
use uuid::Uuid;

const CUSTOMER: Uuid = Uuid::from_u128(0xA1);
const PRODUCT: Uuid = Uuid::from_u128(0xB1);

const SEED: &str = r#"{
    "countries": [{ "id": "00000000-0000-0000-0000-0000000000c0", "name": "Bolivia" }],
    "states": [{ "id": "00000000-0000-0000-0000-00000000005c", "country_id": "00000000-0000-0000-0000-0000000000c0", "name": "Santa Cruz" }],
    "cities": [{ "id": "00000000-0000-0000-0000-0000000000c1", "state_id": "00000000-0000-0000-0000-00000000005c", "name": "Santa Cruz de la Sierra" }],
    "users": [{ "id": "00000000-0000-0000-0000-0000000000a1", "name": "Ana Suarez", "role": "customer" }],
    "products": [{ "id": "00000000-0000-0000-0000-0000000000b1", "name": "Cafe de los Yungas", "price_cents": 4000, "stock": 5 }]
}"#;

fn seeded_state() -> Arc<AppState> {
    let (state, _rx) = AppState::new(&Config::default());
    Seed::from_json(SEED).unwrap().apply(&state).unwrap();
    Arc::new(state)
}

fn add_workers(state: &AppState, count: usize) -> Vec<Uuid> {
    (0..count)
        .map(|n| {
            let id = Uuid::new_v4();
            state.users.insert(
                id,
                User {
                    id,
                    name: format!("Worker {n}"),
                    phone: None,
                    role: Role::DeliveryWorker,
                    status: RecordStatus::Active,
                    created_at: Utc::now(),
                },
            );
            insert_worker_profile(
                state,
                WorkerProfile {
                    worker_id: id,
                    identification_number: format!("CI-{n}"),
                    availability: Availability::Available,
                    vehicle: None,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                },
            )
            .unwrap();
            id
        })
        .collect()
}

fn new_order(state: &AppState) -> OrderId {
    create_order(
        state,
        NewOrder {
            customer_id: CUSTOMER,
            currency: "BOB".to_string(),
            discount_percent: 0,
            metadata: OrderMetadata::default(),
        },
    )
    .unwrap()
    .id
}

fn paid_orders(state: &AppState, count: usize) -> Vec<OrderId> {
    if let Some(mut product) = state.products.get_mut(&PRODUCT) {
        product.stock = count as u32;
    }
    (0..count)
        .map(|n| {
            let order_id = new_order(state);
            add_item(state, order_id, PRODUCT, 1).unwrap();
            complete_payment(state, order_id, &format!("gw-{n}")).unwrap();
            order_id
        })
        .collect()
}

fn assert_pool_consistent(state: &AppState) {
    let active = active_assignment_counts(state);
    for profile in state.worker_profiles.iter() {
        let count = active.get(&profile.worker_id).copied().unwrap_or(0);
        assert!(count <= 1, "worker {} double booked", profile.worker_id);
        assert_eq!(profile.availability == Availability::Busy, count == 1);
    }
}

/// Runs `work` once per input on blocking threads that start together.
async fn race<T, R, F>(inputs: Vec<T>, work: F) -> Vec<R>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> R + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(inputs.len()));
    let work = Arc::new(work);
    let handles: Vec<_> = inputs
        .into_iter()
        .map(|input| {
            let barrier = barrier.clone();
            let work = work.clone();
            tokio::task::spawn_blocking(move || {
                barrier.wait();
                work(input)
            })
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_fulfillments_never_double_book_workers() {
    let state = seeded_state();
    add_workers(&state, 3);
    let orders = paid_orders(&state, 8);

    let shared = state.clone();
    let outcomes = race(orders, move |order_id| {
        Orchestrator::new()
            .fulfill(&shared, order_id)
            .unwrap()
            .outcome
    })
    .await;

    let assigned = outcomes
        .iter()
        .filter(|outcome| **outcome == FulfillmentOutcome::Assigned)
        .count();
    let starved = outcomes
        .iter()
        .filter(|outcome| **outcome == FulfillmentOutcome::NoWorkerAvailable)
        .count();

    assert_eq!(assigned, 3);
    assert_eq!(starved, 5);
    assert_eq!(state.assignments.len(), 3);
    assert_pool_consistent(&state);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fulfillment_of_one_order_converges() {
    let state = seeded_state();
    add_workers(&state, 4);
    let order_id = paid_orders(&state, 1)[0];

    let shared = state.clone();
    let outcomes = race(vec![order_id; 6], move |order_id| {
        Orchestrator::new()
            .fulfill(&shared, order_id)
            .unwrap()
            .outcome
    })
    .await;

    let assigned = outcomes
        .iter()
        .filter(|outcome| **outcome == FulfillmentOutcome::Assigned)
        .count();
    assert_eq!(assigned, 1);
    assert!(
        outcomes
            .iter()
            .all(|outcome| matches!(
                outcome,
                FulfillmentOutcome::Assigned | FulfillmentOutcome::AlreadyAssigned
            ))
    );
    assert_eq!(state.deliveries.len(), 1);
    assert_eq!(state.assignments.len(), 1);
    assert_pool_consistent(&state);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_never_oversell() {
    let state = seeded_state();
    let orders: Vec<OrderId> = (0..12).map(|_| new_order(&state)).collect();

    let shared = state.clone();
    let results = race(orders, move |order_id| add_item(&shared, order_id, PRODUCT, 1)).await;

    let sold = results.iter().filter(|result| result.is_ok()).count();
    let refused = results
        .iter()
        .filter(|result| matches!(result, Err(AppError::OutOfStock { .. })))
        .count();

    assert_eq!(sold, 5);
    assert_eq!(refused, 7);
    assert_eq!(state.products.get(&PRODUCT).unwrap().stock, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_loyalty_updates_lose_nothing() {
    let state = seeded_state();
    let events: Vec<PaymentCompleted> = (1..=20)
        .flat_map(|order_id| {
            let event = PaymentCompleted {
                order_id,
                customer_id: CUSTOMER,
                amount_cents: 1_500,
                completed_at: Utc::now(),
            };
            [event.clone(), event]
        })
        .collect();

    let shared = state.clone();
    race(events, move |event| on_payment_completed(&shared, &event).unwrap()).await;

    let loyalty = state.loyalty.get(&CUSTOMER).unwrap();
    assert_eq!(loyalty.order_count, 20);
    assert_eq!(loyalty.total_spent_cents, 30_000);
    assert_eq!(loyalty.points, 300);
    assert_eq!(loyalty.tier.as_str(), "platinum");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pool_reset_during_fulfillment_keeps_pool_consistent() {
    let state = seeded_state();
    let workers = add_workers(&state, 4);
    let orders = paid_orders(&state, 4);

    // One worker is stuck busy with nothing assigned.
    if let Some(mut profile) = state.worker_profiles.get_mut(&workers[3]) {
        profile.availability = Availability::Busy;
    }

    let shared = state.clone();
    let mut jobs: Vec<Option<OrderId>> = orders.into_iter().map(Some).collect();
    jobs.push(None);
    race(jobs, move |job| match job {
        Some(order_id) => {
            Orchestrator::new().fulfill(&shared, order_id).unwrap();
        }
        None => {
            reset_pool(&shared);
        }
    })
    .await;

    assert_pool_consistent(&state);
    assert!(state.assignments.len() >= 3);
}
