//! Current weather at an apiary, from an Open-Meteo compatible API.
//!
//! A response without a current temperature is a failure for this call;
//! callers treat it as a partial failure and keep rendering everything else.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::Coordinates;

// ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Weather {
    pub temperature: f64,
    pub daily_min: Option<f64>,
    pub daily_max: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current: Option<CurrentBlock>,
    daily: Option<DailyBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
}

impl ForecastResponse {
    fn into_weather(self) -> Option<Weather> {
        // ---
        let temperature = self.current.and_then(|c| c.temperature_2m)?;
        let (daily_min, daily_max) = match self.daily {
            Some(d) => (
                d.temperature_2m_min.first().copied().flatten(),
                d.temperature_2m_max.first().copied().flatten(),
            ),
            None => (None, None),
        };
        Some(Weather {
            temperature,
            daily_min,
            daily_max,
        })
    }
}

#[derive(Debug, Clone)]
pub struct WeatherClient {
    http: Client,
    url: String,
}

impl WeatherClient {
    // ---
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        WeatherClient {
            http,
            url: url.into(),
        }
    }

    pub async fn current(&self, at: Coordinates) -> Result<Weather> {
        // ---
        let context = "weather";
        debug!("Fetching weather at {}, {}", at.lat, at.lon);

        let response = self
            .http
            .get(&self.url)
            .query(&[
                ("latitude", at.lat.to_string()),
                ("longitude", at.lon.to_string()),
                ("current", "temperature_2m".to_string()),
                ("daily", "temperature_2m_max,temperature_2m_min".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::fetch(context, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::FetchFailed {
                context: context.to_string(),
                status: Some(status.as_u16()),
                body,
            });
        }

        let forecast: ForecastResponse = response
            .json()
            .await
            .map_err(|e| AppError::fetch(context, e))?;

        forecast.into_weather().ok_or_else(|| AppError::FetchFailed {
            context: context.to_string(),
            status: Some(status.as_u16()),
            body: "response has no current temperature".to_string(),
        })
    }
}
