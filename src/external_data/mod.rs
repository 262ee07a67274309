//! Gateway to external climate data with layered fallbacks.
//!
//! Irradiance resolution walks the tiers in order and takes the first hit:
//! fresh cache, live time series, live climatology, nearby cached
//! coordinates, then built-in typical UK values. Provider failures are
//! logged and absorbed, so the gateway itself never fails a calculation.

mod providers;
mod store;

pub use providers::{
    IrradianceProvider, OpenMeteoArchiveClient, PowerClimatologyClient, PowerTimeSeriesClient,
    ProviderError, TemperatureProvider,
};
pub use store::{CoordKey, IrradianceRecord, IrradianceStore};

use crate::monthly::MonthlySeries;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration as StdDuration;
use strum_macros::Display;
use tracing::{info, warn};

/// Typical UK mean daily irradiance by month in kWh/m²/day, the terminal
/// fallback when no better source is reachable.
const DEFAULT_MONTHLY_IRRADIANCE: [f64; 12] =
    [0.5, 1.2, 2.5, 4.0, 5.2, 5.8, 5.5, 4.8, 3.2, 1.8, 0.8, 0.4];

/// Typical UK mean outdoor air temperature by month in °C.
const DEFAULT_MONTHLY_TEMPERATURE: [f64; 12] =
    [4.0, 4.5, 7.0, 9.5, 13.0, 16.0, 18.0, 17.5, 15.0, 11.0, 7.5, 5.0];

/// The typical-UK irradiance profile.
pub fn default_irradiance() -> MonthlySeries<f64> {
    DEFAULT_MONTHLY_IRRADIANCE.into()
}

/// The typical-UK temperature profile.
pub fn default_temperature() -> MonthlySeries<f64> {
    DEFAULT_MONTHLY_TEMPERATURE.into()
}

/// Which tier a resolved irradiance series came from.
#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum IrradianceSource {
    Cache,
    Live,
    LiveFallback,
    NearbyCache,
    Default,
}

/// An irradiance series together with its provenance.
#[derive(Clone, Debug)]
pub struct IrradianceLookup {
    pub series: MonthlySeries<f64>,
    pub source: IrradianceSource,
}

/// The climate data the estimation calculators need. Implementations must
/// always produce a full year of values; absence of data is expressed through
/// the provenance tag, never through missing months.
pub trait ClimateDataSource {
    fn monthly_irradiance(
        &self,
        latitude: f64,
        longitude: f64,
        location: Option<&str>,
    ) -> IrradianceLookup;

    fn monthly_temperature(&self, latitude: f64, longitude: f64) -> MonthlySeries<f64>;
}

/// Gateway configuration, embeddable in a request document.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewayConfig {
    pub power_base_url: String,
    pub archive_base_url: String,
    pub timeout_secs: u64,
    /// Backing file for the irradiance cache; the cache stays in-memory when
    /// this is unset.
    pub cache_path: Option<PathBuf>,
    pub stale_after_days: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            power_base_url: "https://power.larc.nasa.gov/api".into(),
            archive_base_url: "https://archive-api.open-meteo.com".into(),
            timeout_secs: 10,
            cache_path: None,
            stale_after_days: 30,
        }
    }
}

enum TierOutcome {
    Hit(IrradianceLookup),
    TryNext,
}

/// The production climate data source: two irradiance providers, a
/// temperature provider and a persistent cache.
pub struct ExternalDataGateway<P, F, T> {
    time_series: P,
    climatology: F,
    temperature: T,
    store: IrradianceStore,
}

impl ExternalDataGateway<PowerTimeSeriesClient, PowerClimatologyClient, OpenMeteoArchiveClient> {
    pub fn from_config(config: &GatewayConfig) -> Self {
        let timeout = StdDuration::from_secs(config.timeout_secs);
        let stale_after = Duration::days(config.stale_after_days);
        let store = match &config.cache_path {
            Some(path) => IrradianceStore::open(path, stale_after),
            None => IrradianceStore::in_memory(stale_after),
        };
        Self::new(
            PowerTimeSeriesClient::new(config.power_base_url.clone(), timeout),
            PowerClimatologyClient::new(config.power_base_url.clone(), timeout),
            OpenMeteoArchiveClient::new(config.archive_base_url.clone(), timeout),
            store,
        )
    }
}

impl<P, F, T> ExternalDataGateway<P, F, T>
where
    P: IrradianceProvider,
    F: IrradianceProvider,
    T: TemperatureProvider,
{
    pub fn new(time_series: P, climatology: F, temperature: T, store: IrradianceStore) -> Self {
        Self {
            time_series,
            climatology,
            temperature,
            store,
        }
    }

    fn cache_tier(&self, key: CoordKey) -> TierOutcome {
        match self.store.fresh_series(key) {
            Some(series) => TierOutcome::Hit(IrradianceLookup {
                series,
                source: IrradianceSource::Cache,
            }),
            None => TierOutcome::TryNext,
        }
    }

    fn live_tier(
        &self,
        key: CoordKey,
        location: Option<&str>,
        provider: &impl IrradianceProvider,
        source: IrradianceSource,
    ) -> TierOutcome {
        match provider.monthly_irradiance(key.latitude(), key.longitude()) {
            Ok(series) => {
                self.store.replace_coordinate(
                    key,
                    IrradianceRecord::full_year(key, location, &series, Utc::now()),
                );
                TierOutcome::Hit(IrradianceLookup { series, source })
            }
            Err(error) => {
                warn!(%error, %source, "irradiance provider failed, trying next tier");
                TierOutcome::TryNext
            }
        }
    }

    fn nearby_tier(&self, latitude: f64, longitude: f64) -> TierOutcome {
        match self.store.nearby_series(latitude, longitude) {
            Some(partial) => {
                let defaults = default_irradiance();
                let series =
                    MonthlySeries::from_fn(|month| partial.get(month).unwrap_or(defaults.get(month)));
                TierOutcome::Hit(IrradianceLookup {
                    series,
                    source: IrradianceSource::NearbyCache,
                })
            }
            None => TierOutcome::TryNext,
        }
    }
}

impl<P, F, T> ClimateDataSource for ExternalDataGateway<P, F, T>
where
    P: IrradianceProvider,
    F: IrradianceProvider,
    T: TemperatureProvider,
{
    fn monthly_irradiance(
        &self,
        latitude: f64,
        longitude: f64,
        location: Option<&str>,
    ) -> IrradianceLookup {
        let key = CoordKey::new(latitude, longitude);
        if let TierOutcome::Hit(lookup) = self.cache_tier(key) {
            return lookup;
        }
        if let TierOutcome::Hit(lookup) =
            self.live_tier(key, location, &self.time_series, IrradianceSource::Live)
        {
            return lookup;
        }
        if let TierOutcome::Hit(lookup) = self.live_tier(
            key,
            location,
            &self.climatology,
            IrradianceSource::LiveFallback,
        ) {
            return lookup;
        }
        if let TierOutcome::Hit(lookup) = self.nearby_tier(latitude, longitude) {
            return lookup;
        }
        info!(
            latitude,
            longitude, "no irradiance source available, using default profile"
        );
        IrradianceLookup {
            series: default_irradiance(),
            source: IrradianceSource::Default,
        }
    }

    fn monthly_temperature(&self, latitude: f64, longitude: f64) -> MonthlySeries<f64> {
        match self.temperature.monthly_temperature(latitude, longitude) {
            Ok(series) => series,
            Err(error) => {
                warn!(%error, "temperature provider failed, using default profile");
                default_temperature()
            }
        }
    }
}

/// Fixed-value climate source for tests elsewhere in the crate.
#[cfg(test)]
pub(crate) struct FixedClimate {
    pub(crate) irradiance: MonthlySeries<f64>,
    pub(crate) source: IrradianceSource,
    pub(crate) temperature: MonthlySeries<f64>,
}

#[cfg(test)]
impl FixedClimate {
    pub(crate) fn uk_defaults() -> Self {
        Self {
            irradiance: default_irradiance(),
            source: IrradianceSource::Default,
            temperature: default_temperature(),
        }
    }

    pub(crate) fn uniform(irradiance: f64, temperature: f64) -> Self {
        Self {
            irradiance: MonthlySeries::uniform(irradiance),
            source: IrradianceSource::Live,
            temperature: MonthlySeries::uniform(temperature),
        }
    }
}

#[cfg(test)]
impl ClimateDataSource for FixedClimate {
    fn monthly_irradiance(
        &self,
        _latitude: f64,
        _longitude: f64,
        _location: Option<&str>,
    ) -> IrradianceLookup {
        IrradianceLookup {
            series: self.irradiance,
            source: self.source,
        }
    }

    fn monthly_temperature(&self, _latitude: f64, _longitude: f64) -> MonthlySeries<f64> {
        self.temperature
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::cell::Cell;

    struct FakeIrradiance {
        series: Option<MonthlySeries<f64>>,
        calls: Cell<u32>,
    }

    impl FakeIrradiance {
        fn up(value: f64) -> Self {
            Self {
                series: Some(MonthlySeries::uniform(value)),
                calls: Cell::new(0),
            }
        }

        fn down() -> Self {
            Self {
                series: None,
                calls: Cell::new(0),
            }
        }
    }

    impl IrradianceProvider for FakeIrradiance {
        fn monthly_irradiance(
            &self,
            _latitude: f64,
            _longitude: f64,
        ) -> Result<MonthlySeries<f64>, ProviderError> {
            self.calls.set(self.calls.get() + 1);
            self.series
                .ok_or_else(|| ProviderError::Parse("fake outage".into()))
        }
    }

    struct FakeTemperature {
        series: Option<MonthlySeries<f64>>,
    }

    impl TemperatureProvider for FakeTemperature {
        fn monthly_temperature(
            &self,
            _latitude: f64,
            _longitude: f64,
        ) -> Result<MonthlySeries<f64>, ProviderError> {
            self.series
                .ok_or_else(|| ProviderError::Parse("fake outage".into()))
        }
    }

    fn gateway(
        time_series: FakeIrradiance,
        climatology: FakeIrradiance,
        temperature: FakeTemperature,
    ) -> ExternalDataGateway<FakeIrradiance, FakeIrradiance, FakeTemperature> {
        ExternalDataGateway::new(
            time_series,
            climatology,
            temperature,
            IrradianceStore::in_memory(Duration::days(30)),
        )
    }

    fn seed(gateway: &ExternalDataGateway<FakeIrradiance, FakeIrradiance, FakeTemperature>, latitude: f64, longitude: f64, value: f64, age_days: i64) {
        let key = CoordKey::new(latitude, longitude);
        gateway.store.replace_coordinate(
            key,
            IrradianceRecord::full_year(
                key,
                None,
                &MonthlySeries::uniform(value),
                Utc::now() - Duration::days(age_days),
            ),
        );
    }

    #[rstest]
    fn should_prefer_fresh_cache_over_live_providers() {
        let gateway = gateway(FakeIrradiance::up(1.), FakeIrradiance::up(2.), FakeTemperature { series: None });
        seed(&gateway, 51.5, -0.12, 9., 1);

        let lookup = gateway.monthly_irradiance(51.5, -0.12, None);

        assert_eq!(lookup.source, IrradianceSource::Cache);
        assert_eq!(lookup.series.get(6), 9.);
        assert_eq!(gateway.time_series.calls.get(), 0);
    }

    #[rstest]
    fn should_fetch_live_series_and_refresh_cache() {
        let gateway = gateway(FakeIrradiance::up(2.), FakeIrradiance::up(3.), FakeTemperature { series: None });

        let lookup = gateway.monthly_irradiance(51.5, -0.12, Some("London"));

        assert_eq!(lookup.source, IrradianceSource::Live);
        assert_eq!(lookup.series.get(1), 2.);
        let cached = gateway
            .store
            .fresh_series(CoordKey::new(51.5, -0.12))
            .unwrap();
        assert_eq!(cached.get(1), 2.);
        assert_eq!(gateway.climatology.calls.get(), 0);
    }

    #[rstest]
    fn should_fall_back_to_climatology_when_time_series_fails() {
        let gateway = gateway(FakeIrradiance::down(), FakeIrradiance::up(3.), FakeTemperature { series: None });

        let lookup = gateway.monthly_irradiance(51.5, -0.12, None);

        assert_eq!(lookup.source, IrradianceSource::LiveFallback);
        assert_eq!(lookup.series.get(1), 3.);
        let cached = gateway
            .store
            .fresh_series(CoordKey::new(51.5, -0.12))
            .unwrap();
        assert_eq!(cached.get(12), 3.);
    }

    #[rstest]
    fn should_use_stale_nearby_cache_when_providers_fail() {
        let gateway = gateway(FakeIrradiance::down(), FakeIrradiance::down(), FakeTemperature { series: None });
        seed(&gateway, 51.52, -0.12, 6., 90);

        let lookup = gateway.monthly_irradiance(51.5, -0.12, None);

        assert_eq!(lookup.source, IrradianceSource::NearbyCache);
        assert_eq!(lookup.series.get(4), 6.);
    }

    #[rstest]
    fn should_fill_nearby_gaps_from_default_profile() {
        let gateway = gateway(FakeIrradiance::down(), FakeIrradiance::down(), FakeTemperature { series: None });
        let key = CoordKey::new(51.52, -0.12);
        let mut records = IrradianceRecord::full_year(
            key,
            None,
            &MonthlySeries::uniform(6.),
            Utc::now() - Duration::days(90),
        );
        records.retain(|record| record.month != 2);
        gateway.store.replace_coordinate(key, records);

        let lookup = gateway.monthly_irradiance(51.5, -0.12, None);

        assert_eq!(lookup.source, IrradianceSource::NearbyCache);
        assert_eq!(lookup.series.get(1), 6.);
        assert_eq!(lookup.series.get(2), default_irradiance().get(2));
    }

    #[rstest]
    fn should_use_default_profile_when_every_tier_misses() {
        let gateway = gateway(FakeIrradiance::down(), FakeIrradiance::down(), FakeTemperature { series: None });

        let lookup = gateway.monthly_irradiance(51.5, -0.12, None);

        assert_eq!(lookup.source, IrradianceSource::Default);
        assert_eq!(lookup.series.get(6), 5.8);
    }

    #[rstest]
    fn should_pass_through_live_temperatures() {
        let gateway = gateway(
            FakeIrradiance::down(),
            FakeIrradiance::down(),
            FakeTemperature {
                series: Some(MonthlySeries::uniform(11.)),
            },
        );
        assert_eq!(gateway.monthly_temperature(51.5, -0.12).get(3), 11.);
    }

    #[rstest]
    fn should_use_default_temperatures_when_archive_fails() {
        let gateway = gateway(FakeIrradiance::down(), FakeIrradiance::down(), FakeTemperature { series: None });
        let series = gateway.monthly_temperature(51.5, -0.12);
        assert_eq!(series.get(1), 4.0);
        assert_eq!(series.get(7), 18.0);
    }
}
