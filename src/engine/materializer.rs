use chrono::{Duration, Utc};
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::{default_location, validate_containment};
use crate::models::customer::Address;
use crate::models::delivery::{AddressSource, Delivery, DeliveryStatus, ShippingAddress};
use crate::models::event::LifecycleEvent;
use crate::models::order::Order;
use crate::state::AppState;

pub const CONFIRM_ADDRESS_NOTE: &str = "address must be confirmed with the customer";

#[derive(Debug, Clone)]
pub enum Materialized {
    Ready(Delivery),
    AddressUnresolved { reason: String },
}

struct ResolvedAddress {
    recipient_name: String,
    recipient_phone: Option<String>,
    address: ShippingAddress,
    source: AddressSource,
}

pub fn materialize(state: &AppState, order: &Order) -> Result<Materialized, AppError> {
    if let Some(existing) = state.deliveries.get(&order.id) {
        return Ok(Materialized::Ready(existing.clone()));
    }

    let resolved = match resolve_address(state, order)? {
        Some(resolved) => resolved,
        None => {
            let reason = format!(
                "order {} has no usable address and no default geography is configured",
                order.id
            );
            warn!(order_id = order.id, "delivery address could not be resolved");
            return Ok(Materialized::AddressUnresolved { reason });
        }
    };

    let now = Utc::now();
    let mut delivery = Delivery {
        order_id: order.id,
        recipient_name: resolved.recipient_name,
        recipient_phone: resolved.recipient_phone,
        address: resolved.address,
        address_source: resolved.source,
        status: DeliveryStatus::Pending,
        estimated_arrival: now + Duration::days(state.settings.lead_time_days),
        actual_arrival: None,
        notes: String::new(),
        updated_at: now,
    };
    if resolved.source == AddressSource::Fallback {
        delivery.add_note(CONFIRM_ADDRESS_NOTE);
    }

    let delivery = match state.deliveries.entry(order.id) {
        Entry::Occupied(existing) => {
            debug!(order_id = order.id, "delivery created concurrently; reusing it");
            return Ok(Materialized::Ready(existing.get().clone()));
        }
        Entry::Vacant(slot) => {
            slot.insert(delivery.clone());
            delivery
        }
    };

    info!(
        order_id = order.id,
        source = ?delivery.address_source,
        "delivery created"
    );
    state.publish(LifecycleEvent::DeliveryCreated {
        delivery: delivery.clone(),
    });

    Ok(Materialized::Ready(delivery))
}

fn resolve_address(state: &AppState, order: &Order) -> Result<Option<ResolvedAddress>, AppError> {
    if let Some(address) = selected_address(state, order) {
        return Ok(Some(from_address(&address, AddressSource::Selected)));
    }

    if let Some(address) = default_address(state, order.customer_id) {
        return Ok(Some(from_address(&address, AddressSource::CustomerDefault)));
    }

    let customer = state
        .users
        .get(&order.customer_id)
        .map(|user| user.value().clone())
        .ok_or_else(|| AppError::NotFound(format!("customer {} not found", order.customer_id)))?;

    let Some(location) = default_location(state, &state.settings) else {
        return Ok(None);
    };

    warn!(
        order_id = order.id,
        customer_id = %customer.id,
        "no address on file; using placeholder delivery address"
    );

    Ok(Some(ResolvedAddress {
        recipient_name: customer.name,
        recipient_phone: customer.phone,
        address: ShippingAddress {
            line1: state.settings.placeholder_street.clone(),
            line2: None,
            country_id: location.country_id,
            state_id: location.state_id,
            city_id: location.city_id,
            postal_code: None,
        },
        source: AddressSource::Fallback,
    }))
}

fn selected_address(state: &AppState, order: &Order) -> Option<Address> {
    let address_id = order.metadata.selected_address_id?;
    let address = state.addresses.get(&address_id).map(|entry| entry.value().clone());

    match address {
        Some(address) if usable(state, &address, order.customer_id) => Some(address),
        Some(_) => {
            warn!(
                order_id = order.id,
                address_id = %address_id,
                "selected address is not usable for this order"
            );
            None
        }
        None => {
            warn!(order_id = order.id, address_id = %address_id, "selected address not found");
            None
        }
    }
}

fn default_address(state: &AppState, customer_id: Uuid) -> Option<Address> {
    let mut defaults: Vec<Address> = state
        .addresses
        .iter()
        .filter(|entry| entry.is_default && entry.customer_id == customer_id)
        .map(|entry| entry.value().clone())
        .collect();
    defaults.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

    defaults
        .into_iter()
        .find(|address| usable(state, address, customer_id))
}

fn usable(state: &AppState, address: &Address, customer_id: Uuid) -> bool {
    address.customer_id == customer_id
        && address.status.is_active()
        && validate_containment(state, address.country_id, address.state_id, address.city_id)
            .is_ok()
}

fn from_address(address: &Address, source: AddressSource) -> ResolvedAddress {
    ResolvedAddress {
        recipient_name: address.recipient_name.clone(),
        recipient_phone: address.phone.clone(),
        address: ShippingAddress {
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            country_id: address.country_id,
            state_id: address.state_id,
            city_id: address.city_id,
            postal_code: address.postal_code.clone(),
        },
        source,
    }
}
