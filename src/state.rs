use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::config::{Config, FulfillmentSettings};
use crate::geo::{City, Country, Region};
use crate::models::assignment::Assignment;
use crate::models::customer::{Address, CustomerLoyalty};
use crate::models::delivery::Delivery;
use crate::models::event::LifecycleEvent;
use crate::models::order::{Order, OrderId, Payment, PaymentCompleted, Product};
use crate::models::user::User;
use crate::models::worker::WorkerProfile;
use crate::observability::metrics::Metrics;

// Guards are never held across `.await`. Lock order: claim_lock, pool_gate,
// orders, products, payments, deliveries, assignments, worker_profiles,
// identification_numbers. Loyalty rows are locked alone.
pub struct AppState {
    pub settings: FulfillmentSettings,

    pub users: DashMap<Uuid, User>,
    pub addresses: DashMap<Uuid, Address>,
    pub countries: DashMap<Uuid, Country>,
    pub regions: DashMap<Uuid, Region>,
    pub cities: DashMap<Uuid, City>,
    pub products: DashMap<Uuid, Product>,

    pub orders: DashMap<OrderId, Order>,
    pub payments: DashMap<OrderId, Payment>,
    pub deliveries: DashMap<OrderId, Delivery>,
    // keyed by the delivery's order id
    pub assignments: DashMap<OrderId, Assignment>,
    pub assignment_history: DashMap<Uuid, Assignment>,
    pub worker_profiles: DashMap<Uuid, WorkerProfile>,
    pub identification_numbers: DashMap<String, Uuid>,
    pub loyalty: DashMap<Uuid, CustomerLoyalty>,

    pub claim_lock: Mutex<()>,
    pub pool_gate: RwLock<()>,
    next_order_id: AtomicU64,

    pub payment_tx: mpsc::Sender<PaymentCompleted>,
    pub events_tx: broadcast::Sender<LifecycleEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> (Self, mpsc::Receiver<PaymentCompleted>) {
        let (payment_tx, payment_rx) = mpsc::channel(config.payment_queue_size);
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        (
            Self {
                settings: config.fulfillment.clone(),
                users: DashMap::new(),
                addresses: DashMap::new(),
                countries: DashMap::new(),
                regions: DashMap::new(),
                cities: DashMap::new(),
                products: DashMap::new(),
                orders: DashMap::new(),
                payments: DashMap::new(),
                deliveries: DashMap::new(),
                assignments: DashMap::new(),
                assignment_history: DashMap::new(),
                worker_profiles: DashMap::new(),
                identification_numbers: DashMap::new(),
                loyalty: DashMap::new(),
                claim_lock: Mutex::new(()),
                pool_gate: RwLock::new(()),
                next_order_id: AtomicU64::new(1),
                payment_tx,
                events_tx,
                metrics: Metrics::new(),
            },
            payment_rx,
        )
    }

    pub fn next_order_id(&self) -> OrderId {
        self.next_order_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn reserve_order_ids_through(&self, id: OrderId) {
        self.next_order_id.fetch_max(id + 1, Ordering::Relaxed);
    }

    pub fn publish(&self, event: LifecycleEvent) {
        let _ = self.events_tx.send(event);
    }
}
