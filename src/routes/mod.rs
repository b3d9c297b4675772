use axum::Router;
use reqwest::Client;

use crate::guard::InFlight;
use crate::notes::NoteStore;
use crate::store::RestDbClient;
use crate::weather::WeatherClient;
use crate::Config;

mod apiaries;
mod health;
mod hives;
mod login;
mod notes;
mod sensors;

// ---

/// Shared state handed to every route.
#[derive(Debug, Clone)]
pub struct AppState {
    pub store: RestDbClient,
    pub weather: WeatherClient,
    pub notes: NoteStore,
    pub in_flight: InFlight,
}

impl AppState {
    /// Build the outbound clients from configuration; one HTTP client is shared.
    pub fn from_config(config: &Config, notes: NoteStore) -> reqwest::Result<Self> {
        // ---
        let http = Client::builder().timeout(config.http_timeout).build()?;

        Ok(AppState {
            store: RestDbClient::new(http.clone(), config.restdb_url.clone()),
            weather: WeatherClient::new(http, config.weather_url.clone()),
            notes,
            in_flight: InFlight::new(),
        })
    }
}

pub fn router(state: AppState) -> Router {
    // ---
    Router::new()
        .merge(login::router())
        .merge(apiaries::router())
        .merge(hives::router())
        .merge(sensors::router())
        .merge(notes::router())
        .merge(health::router())
        .with_state(state)
}
