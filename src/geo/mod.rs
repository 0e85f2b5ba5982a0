use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::FulfillmentSettings;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Country {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: Uuid,
    pub country_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub id: Uuid,
    pub state_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub country_id: Uuid,
    pub state_id: Uuid,
    pub city_id: Uuid,
}

pub fn validate_containment(
    state: &AppState,
    country_id: Uuid,
    state_id: Uuid,
    city_id: Uuid,
) -> Result<Location, AppError> {
    if !state.countries.contains_key(&country_id) {
        return Err(AppError::NotFound(format!("country {country_id} not found")));
    }

    let region_country = state
        .regions
        .get(&state_id)
        .map(|region| region.country_id)
        .ok_or_else(|| AppError::NotFound(format!("state {state_id} not found")))?;
    if region_country != country_id {
        return Err(AppError::BadRequest(format!(
            "state {state_id} does not belong to country {country_id}"
        )));
    }

    let city_state = state
        .cities
        .get(&city_id)
        .map(|city| city.state_id)
        .ok_or_else(|| AppError::NotFound(format!("city {city_id} not found")))?;
    if city_state != state_id {
        return Err(AppError::BadRequest(format!(
            "city {city_id} does not belong to state {state_id}"
        )));
    }

    Ok(Location {
        country_id,
        state_id,
        city_id,
    })
}

pub fn default_location(state: &AppState, settings: &FulfillmentSettings) -> Option<Location> {
    configured_location(state, settings).or_else(|| first_complete_location(state))
}

fn configured_location(state: &AppState, settings: &FulfillmentSettings) -> Option<Location> {
    let country_id = state
        .countries
        .iter()
        .find(|entry| entry.name.eq_ignore_ascii_case(&settings.default_country))
        .map(|entry| entry.id)?;

    let state_id = state
        .regions
        .iter()
        .find(|entry| {
            entry.country_id == country_id
                && entry.name.eq_ignore_ascii_case(&settings.default_state)
        })
        .map(|entry| entry.id)?;

    let city_id = state
        .cities
        .iter()
        .find(|entry| {
            entry.state_id == state_id && entry.name.eq_ignore_ascii_case(&settings.default_city)
        })
        .map(|entry| entry.id)?;

    Some(Location {
        country_id,
        state_id,
        city_id,
    })
}

fn first_complete_location(state: &AppState) -> Option<Location> {
    let mut countries: Vec<Country> = state
        .countries
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    countries.sort_by(|a, b| a.name.cmp(&b.name));

    let mut regions: Vec<Region> = state
        .regions
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    regions.sort_by(|a, b| a.name.cmp(&b.name));

    let mut cities: Vec<City> = state
        .cities
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    cities.sort_by(|a, b| a.name.cmp(&b.name));

    countries.iter().find_map(|country| {
        regions
            .iter()
            .filter(|region| region.country_id == country.id)
            .find_map(|region| {
                cities
                    .iter()
                    .find(|city| city.state_id == region.id)
                    .map(|city| Location {
                        country_id: country.id,
                        state_id: region.id,
                        city_id: city.id,
                    })
            })
    })
}
