use crate::core::units::round_half_up;
use crate::monthly::{MonthlySeries, MONTHS};
use chrono::{Datelike, Utc};
use indexmap::IndexMap;
use itertools::Itertools;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure of a single provider call. These never reach engine callers; the
/// gateway logs them and moves on to the next fallback tier.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),
    #[error("http client could not be constructed: {0}")]
    Client(String),
    #[error("unexpected response status: {0}")]
    Status(StatusCode),
    #[error("response could not be interpreted: {0}")]
    Parse(String),
}

/// Source of a year of mean daily irradiance values, one per month, in
/// kWh/m²/day.
pub trait IrradianceProvider {
    fn monthly_irradiance(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<MonthlySeries<f64>, ProviderError>;
}

/// Source of a year of mean outdoor air temperatures, one per month, in °C.
pub trait TemperatureProvider {
    fn monthly_temperature(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<MonthlySeries<f64>, ProviderError>;
}

/// The POWER solar record begins in 1981.
const EARLIEST_POWER_YEAR: i32 = 1981;

/// How many recent complete years the time series request covers.
const POWER_YEARS_OF_HISTORY: i32 = 5;

/// Stand-in temperature for months the archive has no samples for, in °C.
pub(crate) const FALLBACK_MONTH_TEMPERATURE: f64 = 5.0;

/// NASA POWER monthly time series client. Asks for the last few complete
/// years of ALLSKY_SFC_SW_DWN and averages each calendar month across them.
#[derive(Debug)]
pub struct PowerTimeSeriesClient {
    client: Result<Client, String>,
    base_url: String,
}

impl PowerTimeSeriesClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, latitude: f64, longitude: f64, start_year: i32, end_year: i32) -> String {
        format!(
            "{}/temporal/monthly/point?parameters=ALLSKY_SFC_SW_DWN&community=RE&longitude={longitude:.6}&latitude={latitude:.6}&start={start_year}&end={end_year}&format=JSON",
            self.base_url
        )
    }
}

impl IrradianceProvider for PowerTimeSeriesClient {
    fn monthly_irradiance(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<MonthlySeries<f64>, ProviderError> {
        // the current year is incomplete, so end with the previous one
        let end_year = Utc::now().year() - 1;
        let start_year = (end_year - (POWER_YEARS_OF_HISTORY - 1)).max(EARLIEST_POWER_YEAR);
        let url = self.url_for(latitude, longitude, start_year, end_year);
        debug!(%url, "requesting irradiance time series");
        let response: PowerResponse = fetch_json(ready_client(&self.client)?, &url)?;
        temporal_series(&response.properties.parameter.irradiance)
    }
}

/// NASA POWER climatology client, the long-term average product used when the
/// time series endpoint is unavailable.
#[derive(Debug)]
pub struct PowerClimatologyClient {
    client: Result<Client, String>,
    base_url: String,
}

impl PowerClimatologyClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}/temporal/climatology/point?parameters=ALLSKY_SFC_SW_DWN&community=RE&longitude={longitude:.6}&latitude={latitude:.6}&format=JSON",
            self.base_url
        )
    }
}

impl IrradianceProvider for PowerClimatologyClient {
    fn monthly_irradiance(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<MonthlySeries<f64>, ProviderError> {
        let url = self.url_for(latitude, longitude);
        debug!(%url, "requesting irradiance climatology");
        let response: PowerResponse = fetch_json(ready_client(&self.client)?, &url)?;
        climatology_series(&response.properties.parameter.irradiance)
    }
}

/// Open-Meteo historical archive client. Fetches a recent complete year of
/// daily mean temperatures and averages them into calendar months.
#[derive(Debug)]
pub struct OpenMeteoArchiveClient {
    client: Result<Client, String>,
    base_url: String,
}

impl OpenMeteoArchiveClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: build_client(timeout),
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{}/v1/archive?latitude={latitude:.4}&longitude={longitude:.4}&start_date=2023-01-01&end_date=2023-12-31&daily=temperature_2m_mean&timezone=auto",
            self.base_url
        )
    }
}

impl TemperatureProvider for OpenMeteoArchiveClient {
    fn monthly_temperature(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<MonthlySeries<f64>, ProviderError> {
        let url = self.url_for(latitude, longitude);
        debug!(%url, "requesting archive temperatures");
        let response: ArchiveResponse = fetch_json(ready_client(&self.client)?, &url)?;
        Ok(monthly_temperature_means(
            &response.daily.temperature_mean,
        ))
    }
}

/// Building the blocking client can fail (TLS backend setup). The failure is
/// held and reported on every call, so lookups fail cleanly with their
/// timeout guarantee intact and the gateway cascade moves on.
fn build_client(timeout: Duration) -> Result<Client, String> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|error| error.to_string())
}

fn ready_client(client: &Result<Client, String>) -> Result<&Client, ProviderError> {
    client
        .as_ref()
        .map_err(|error| ProviderError::Client(error.clone()))
}

fn fetch_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T, ProviderError> {
    let response = client.get(url).send()?;
    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status(status));
    }
    response
        .json()
        .map_err(|error| ProviderError::Parse(error.to_string()))
}

#[derive(Debug, Deserialize)]
struct PowerResponse {
    properties: PowerProperties,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: PowerParameterBlock,
}

#[derive(Debug, Deserialize)]
struct PowerParameterBlock {
    #[serde(rename = "ALLSKY_SFC_SW_DWN")]
    irradiance: IndexMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    daily: ArchiveDaily,
}

#[derive(Debug, Deserialize)]
struct ArchiveDaily {
    /// One entry per day of the requested range; null where the archive has
    /// no sample.
    #[serde(rename = "temperature_2m_mean")]
    temperature_mean: Vec<Option<f64>>,
}

/// Average a "YYYYMM"-keyed value map into one mean per calendar month.
/// Negative values are the provider's missing-data fill and are dropped.
/// A month with no usable samples reports zero; a response with no usable
/// samples at all is treated as unparseable.
fn temporal_series(values: &IndexMap<String, f64>) -> Result<MonthlySeries<f64>, ProviderError> {
    let samples_by_month = values
        .iter()
        .filter(|(key, _)| key.len() == 6)
        .filter_map(|(key, value)| {
            let month = key.get(4..6)?.parse::<u32>().ok()?;
            (MONTHS.contains(&month) && *value >= 0.).then_some((month, *value))
        })
        .into_group_map();
    if samples_by_month.is_empty() {
        return Err(ProviderError::Parse(
            "time series response held no usable monthly values".into(),
        ));
    }
    Ok(MonthlySeries::from_fn(|month| {
        match samples_by_month.get(&month) {
            Some(samples) => round_half_up(samples.iter().sum::<f64>() / samples.len() as f64, 2),
            None => 0.,
        }
    }))
}

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

fn month_from_key(key: &str) -> Option<u32> {
    if let Ok(month) = key.parse::<u32>() {
        return MONTHS.contains(&month).then_some(month);
    }
    MONTH_ABBREVIATIONS
        .iter()
        .position(|abbreviation| key.eq_ignore_ascii_case(abbreviation))
        .map(|idx| idx as u32 + 1)
}

/// Read a climatology value map keyed either by month number or month name.
/// Annual aggregates ("13", "ANN") are ignored.
fn climatology_series(values: &IndexMap<String, f64>) -> Result<MonthlySeries<f64>, ProviderError> {
    let mut monthly = [None; 12];
    for (key, value) in values {
        if let Some(month) = month_from_key(key) {
            monthly[(month - 1) as usize] = Some(*value);
        }
    }
    if monthly.iter().all(Option::is_none) {
        return Err(ProviderError::Parse(
            "climatology response held no monthly values".into(),
        ));
    }
    Ok(MonthlySeries::from_fn(|month| {
        round_half_up(monthly[(month - 1) as usize].unwrap_or_default(), 2)
    }))
}

/// Cumulative day counts at each month end for the non-leap archive year.
const CUMULATIVE_DAYS: [u32; 12] = [31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365];

fn month_of_year_day(day_of_year: u32) -> u32 {
    CUMULATIVE_DAYS
        .iter()
        .position(|&cumulative| day_of_year <= cumulative)
        .map(|idx| idx as u32 + 1)
        .unwrap_or(12)
}

fn monthly_temperature_means(daily: &[Option<f64>]) -> MonthlySeries<f64> {
    let mut sums = [0.; 12];
    let mut counts = [0u32; 12];
    for (day_idx, temperature) in daily.iter().enumerate() {
        let Some(temperature) = temperature else {
            continue;
        };
        let month = month_of_year_day(day_idx as u32 + 1);
        sums[(month - 1) as usize] += *temperature;
        counts[(month - 1) as usize] += 1;
    }
    MonthlySeries::from_fn(|month| {
        let idx = (month - 1) as usize;
        if counts[idx] == 0 {
            FALLBACK_MONTH_TEMPERATURE
        } else {
            round_half_up(sums[idx] / counts[idx] as f64, 2)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn value_map(entries: &[(&str, f64)]) -> IndexMap<String, f64> {
        entries
            .iter()
            .map(|(key, value)| (key.to_string(), *value))
            .collect()
    }

    #[rstest]
    fn should_average_time_series_months_across_years() {
        let values = value_map(&[
            ("202201", 0.52),
            ("202301", 0.48),
            ("202202", -999.0),
            ("202302", 1.3),
            ("ANN", 3.2),
        ]);
        let series = temporal_series(&values).unwrap();
        assert_eq!(series.get(1), 0.5);
        // the fill value year is dropped, leaving a single sample
        assert_eq!(series.get(2), 1.3);
        assert_eq!(series.get(3), 0.);
    }

    #[rstest]
    fn should_reject_time_series_with_no_usable_values() {
        let values = value_map(&[("202201", -999.0), ("ANN", 3.2)]);
        assert!(temporal_series(&values).is_err());
        assert!(temporal_series(&IndexMap::new()).is_err());
    }

    #[rstest]
    fn should_read_numeric_climatology_keys_and_skip_annual() {
        let values = value_map(&[("1", 0.55), ("2", 1.21), ("13", 9.9)]);
        let series = climatology_series(&values).unwrap();
        assert_eq!(series.get(1), 0.55);
        assert_eq!(series.get(2), 1.21);
        assert_eq!(series.get(12), 0.);
    }

    #[rstest]
    fn should_read_month_name_climatology_keys() {
        let values = value_map(&[("JAN", 0.6), ("DEC", 0.4), ("ANN", 2.9)]);
        let series = climatology_series(&values).unwrap();
        assert_eq!(series.get(1), 0.6);
        assert_eq!(series.get(12), 0.4);
    }

    #[rstest]
    fn should_reject_climatology_with_no_monthly_keys() {
        assert!(climatology_series(&value_map(&[("ANN", 2.9)])).is_err());
    }

    #[rstest]
    #[case(1, 1)]
    #[case(31, 1)]
    #[case(32, 2)]
    #[case(59, 2)]
    #[case(60, 3)]
    #[case(365, 12)]
    fn should_map_year_days_onto_months(#[case] day: u32, #[case] month: u32) {
        assert_eq!(month_of_year_day(day), month);
    }

    #[rstest]
    fn should_average_daily_temperatures_into_months() {
        let mut daily: Vec<Option<f64>> = vec![Some(10.); 365];
        // February has no samples at all and January has one gap
        for day in daily.iter_mut().take(59).skip(31) {
            *day = None;
        }
        daily[4] = None;
        let series = monthly_temperature_means(&daily);
        assert_eq!(series.get(1), 10.);
        assert_eq!(series.get(2), FALLBACK_MONTH_TEMPERATURE);
        assert_eq!(series.get(3), 10.);
    }

    #[rstest]
    fn should_surface_client_construction_failure_per_call() {
        let failed: Result<Client, String> = Err("tls backend unavailable".into());
        let error = ready_client(&failed).unwrap_err();
        assert!(matches!(error, ProviderError::Client(_)));
        assert!(error.to_string().contains("tls backend unavailable"));
        assert!(ready_client(&build_client(Duration::from_secs(1))).is_ok());
    }

    #[rstest]
    fn should_build_power_time_series_url() {
        let client = PowerTimeSeriesClient::new("https://power.larc.nasa.gov/api", Duration::from_secs(10));
        assert_eq!(
            client.url_for(51.5074, -0.1278, 2020, 2024),
            "https://power.larc.nasa.gov/api/temporal/monthly/point?parameters=ALLSKY_SFC_SW_DWN&community=RE&longitude=-0.127800&latitude=51.507400&start=2020&end=2024&format=JSON"
        );
    }

    #[rstest]
    fn should_build_climatology_url() {
        let client = PowerClimatologyClient::new("https://power.larc.nasa.gov/api", Duration::from_secs(10));
        assert_eq!(
            client.url_for(51.5074, -0.1278),
            "https://power.larc.nasa.gov/api/temporal/climatology/point?parameters=ALLSKY_SFC_SW_DWN&community=RE&longitude=-0.127800&latitude=51.507400&format=JSON"
        );
    }

    #[rstest]
    fn should_build_archive_url() {
        let client = OpenMeteoArchiveClient::new("https://archive-api.open-meteo.com", Duration::from_secs(10));
        assert_eq!(
            client.url_for(51.5074, -0.1278),
            "https://archive-api.open-meteo.com/v1/archive?latitude=51.5074&longitude=-0.1278&start_date=2023-01-01&end_date=2023-12-31&daily=temperature_2m_mean&timezone=auto"
        );
    }
}
