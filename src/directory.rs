use std::fs;

use dashmap::mapref::entry::Entry;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::geo::{City, Country, Region, validate_containment};
use crate::models::customer::Address;
use crate::models::order::Product;
use crate::models::user::{Role, User};
use crate::models::worker::{Availability, WorkerProfile};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub countries: Vec<Country>,
    #[serde(default)]
    pub states: Vec<Region>,
    #[serde(default)]
    pub cities: Vec<City>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub workers: Vec<WorkerProfile>,
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub countries: usize,
    pub states: usize,
    pub cities: usize,
    pub users: usize,
    pub addresses: usize,
    pub workers: usize,
    pub products: usize,
}

impl Seed {
    pub fn from_path(path: &str) -> Result<Self, AppError> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Internal(format!("failed to read seed {path}: {err}")))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw).map_err(|err| AppError::BadRequest(format!("invalid seed: {err}")))
    }

    pub fn apply(self, state: &AppState) -> Result<SeedSummary, AppError> {
        let mut summary = SeedSummary::default();

        for country in self.countries {
            state.countries.insert(country.id, country);
            summary.countries += 1;
        }

        for region in self.states {
            if !state.countries.contains_key(&region.country_id) {
                return Err(AppError::BadRequest(format!(
                    "state {} references unknown country {}",
                    region.name, region.country_id
                )));
            }
            state.regions.insert(region.id, region);
            summary.states += 1;
        }

        for city in self.cities {
            if !state.regions.contains_key(&city.state_id) {
                return Err(AppError::BadRequest(format!(
                    "city {} references unknown state {}",
                    city.name, city.state_id
                )));
            }
            state.cities.insert(city.id, city);
            summary.cities += 1;
        }

        for user in self.users {
            state.users.insert(user.id, user);
            summary.users += 1;
        }

        for address in self.addresses {
            insert_address(state, address)?;
            summary.addresses += 1;
        }

        for profile in self.workers {
            insert_worker_profile(state, profile)?;
            summary.workers += 1;
        }

        for product in self.products {
            state.products.insert(product.id, product);
            summary.products += 1;
        }

        info!(?summary, "directory seed applied");
        Ok(summary)
    }
}

pub fn insert_address(state: &AppState, address: Address) -> Result<(), AppError> {
    let owner_is_customer = state
        .users
        .get(&address.customer_id)
        .map(|user| user.role == Role::Customer)
        .unwrap_or(false);
    if !owner_is_customer {
        return Err(AppError::BadRequest(format!(
            "address {} belongs to unknown customer {}",
            address.id, address.customer_id
        )));
    }

    validate_containment(state, address.country_id, address.state_id, address.city_id)?;
    state.addresses.insert(address.id, address);
    Ok(())
}

pub fn insert_worker_profile(state: &AppState, profile: WorkerProfile) -> Result<(), AppError> {
    let is_worker = state
        .users
        .get(&profile.worker_id)
        .map(|user| user.role == Role::DeliveryWorker)
        .unwrap_or(false);
    if !is_worker {
        return Err(AppError::BadRequest(format!(
            "user {} is not a delivery worker",
            profile.worker_id
        )));
    }
    if profile.availability == Availability::Busy {
        return Err(AppError::BadRequest(format!(
            "worker {} cannot start busy without an assignment",
            profile.worker_id
        )));
    }
    if profile.identification_number.trim().is_empty() {
        return Err(AppError::BadRequest(
            "identification_number cannot be empty".to_string(),
        ));
    }

    let profile_slot = match state.worker_profiles.entry(profile.worker_id) {
        Entry::Occupied(_) => {
            return Err(AppError::Conflict(format!(
                "worker {} already has a profile",
                profile.worker_id
            )));
        }
        Entry::Vacant(slot) => slot,
    };

    match state
        .identification_numbers
        .entry(profile.identification_number.clone())
    {
        Entry::Occupied(existing) if *existing.get() != profile.worker_id => {
            return Err(AppError::Conflict(format!(
                "identification number {} already registered",
                profile.identification_number
            )));
        }
        Entry::Occupied(_) => {}
        Entry::Vacant(slot) => {
            slot.insert(profile.worker_id);
        }
    }

    profile_slot.insert(profile);
    Ok(())
}
