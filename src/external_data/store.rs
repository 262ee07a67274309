use crate::core::units::round_half_up;
use crate::monthly::{MonthlySeries, MONTHS};
use arc_swap::ArcSwap;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use smartstring::alias::String;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Coordinates are rounded to four decimal places (roughly 11 m) before they
/// are used as cache keys, so repeated requests for the same spot share one
/// entry.
const KEY_DECIMAL_PLACES: u32 = 4;

/// Maximum per-axis offset, in degrees, for a cached coordinate to count as
/// "nearby" another one.
pub(crate) const NEARBY_TOLERANCE_DEGREES: f64 = 0.1;

/// A coordinate pair rounded onto the cache key grid.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CoordKey {
    latitude: OrderedFloat<f64>,
    longitude: OrderedFloat<f64>,
}

impl CoordKey {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: OrderedFloat(round_half_up(latitude, KEY_DECIMAL_PLACES)),
            longitude: OrderedFloat(round_half_up(longitude, KEY_DECIMAL_PLACES)),
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude.0
    }

    pub fn longitude(&self) -> f64 {
        self.longitude.0
    }

    fn manhattan_distance_to(&self, other: &Self) -> f64 {
        (self.latitude.0 - other.latitude.0).abs() + (self.longitude.0 - other.longitude.0).abs()
    }
}

/// One month's mean daily irradiance at one coordinate, as held in the cache
/// and in its backing file.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct IrradianceRecord {
    pub latitude: f64,
    pub longitude: f64,
    /// Month number, 1-12.
    pub month: u32,
    /// Multi-year mean of daily irradiation for the month, in kWh/m²/day.
    pub irradiance: f64,
    #[serde(default)]
    pub location: Option<String>,
    pub last_fetched: DateTime<Utc>,
}

impl IrradianceRecord {
    /// Twelve records covering a full year at one coordinate.
    pub(crate) fn full_year(
        key: CoordKey,
        location: Option<&str>,
        series: &MonthlySeries<f64>,
        fetched_at: DateTime<Utc>,
    ) -> Vec<Self> {
        series
            .iter()
            .map(|(month, irradiance)| Self {
                latitude: key.latitude(),
                longitude: key.longitude(),
                month,
                irradiance,
                location: location.map(String::from),
                last_fetched: fetched_at,
            })
            .collect()
    }
}

type Snapshot = IndexMap<CoordKey, Arc<Vec<IrradianceRecord>>>;

/// Cache of fetched irradiance series, optionally persisted to a JSON file.
///
/// Readers take a lock-free snapshot of the whole map, while refreshes
/// serialize behind a mutex and swap in a rebuilt map, so no reader ever
/// observes a coordinate with only part of its year replaced.
#[derive(Debug)]
pub struct IrradianceStore {
    snapshot: ArcSwap<Snapshot>,
    refresh_lock: Mutex<()>,
    path: Option<PathBuf>,
    stale_after: Duration,
}

impl IrradianceStore {
    /// A store with no backing file; contents last only as long as the process.
    pub fn in_memory(stale_after: Duration) -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            refresh_lock: Mutex::new(()),
            path: None,
            stale_after,
        }
    }

    /// Open a store backed by a JSON file of records. A missing file starts
    /// the store empty, and so does an unreadable one, with a warning; cache
    /// trouble must never fail a calculation.
    pub fn open(path: impl Into<PathBuf>, stale_after: Duration) -> Self {
        let path = path.into();
        let records = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<IrradianceRecord>>(&bytes) {
                Ok(records) => records,
                Err(error) => {
                    warn!(%error, path = %path.display(), "irradiance cache file is unreadable, starting empty");
                    vec![]
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => vec![],
            Err(error) => {
                warn!(%error, path = %path.display(), "could not read irradiance cache file, starting empty");
                vec![]
            }
        };
        debug!(records = records.len(), "loaded irradiance cache");
        Self {
            snapshot: ArcSwap::from_pointee(group_by_coordinate(records)),
            refresh_lock: Mutex::new(()),
            path: Some(path),
            stale_after,
        }
    }

    /// The cached series for a coordinate, provided it covers all twelve
    /// months and none of it has gone stale.
    pub fn fresh_series(&self, key: CoordKey) -> Option<MonthlySeries<f64>> {
        let snapshot = self.snapshot.load();
        let records = snapshot.get(&key)?;
        let oldest_acceptable = Utc::now() - self.stale_after;
        if records
            .iter()
            .any(|record| record.last_fetched < oldest_acceptable)
        {
            debug!(
                latitude = key.latitude(),
                longitude = key.longitude(),
                "cached irradiance is stale"
            );
            return None;
        }
        complete_series(records)
    }

    /// Replace every record held for a coordinate with a freshly fetched year
    /// of data, persisting the store if it is file-backed.
    pub fn replace_coordinate(&self, key: CoordKey, records: Vec<IrradianceRecord>) {
        let _guard = self.refresh_lock.lock();
        let mut next = (*self.snapshot.load_full()).clone();
        next.insert(key, Arc::new(records));
        let next = Arc::new(next);
        self.snapshot.store(next.clone());
        self.persist(&next);
    }

    /// Month-by-month irradiance assembled from cached coordinates within
    /// tolerance of the target, nearest first by Manhattan distance.
    /// Freshness is not required here: stale data beats none. Returns None
    /// when nothing is in range, otherwise a per-month value that may still
    /// have gaps.
    pub fn nearby_series(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Option<MonthlySeries<Option<f64>>> {
        let target = CoordKey::new(latitude, longitude);
        let snapshot = self.snapshot.load();
        let mut candidates: Vec<(f64, &Arc<Vec<IrradianceRecord>>)> = snapshot
            .iter()
            .filter(|(key, _)| {
                (key.latitude() - target.latitude()).abs() < NEARBY_TOLERANCE_DEGREES
                    && (key.longitude() - target.longitude()).abs() < NEARBY_TOLERANCE_DEGREES
            })
            .map(|(key, records)| (key.manhattan_distance_to(&target), records))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        candidates.sort_by(|a, b| a.0.total_cmp(&b.0));
        Some(MonthlySeries::from_fn(|month| {
            candidates.iter().find_map(|(_, records)| {
                records
                    .iter()
                    .find(|record| record.month == month)
                    .map(|record| record.irradiance)
            })
        }))
    }

    fn persist(&self, snapshot: &Snapshot) {
        let Some(path) = &self.path else {
            return;
        };
        let records: Vec<&IrradianceRecord> = snapshot
            .values()
            .flat_map(|records| records.iter())
            .collect();
        let written = serde_json::to_vec_pretty(&records)
            .map_err(anyhow::Error::from)
            .and_then(|bytes| {
                // write whole then rename, so a crash cannot truncate the file
                let staging = path.with_extension("tmp");
                fs::write(&staging, bytes)?;
                fs::rename(&staging, path)?;
                Ok(())
            });
        if let Err(error) = written {
            warn!(%error, path = %path.display(), "could not persist irradiance cache");
        }
    }
}

fn group_by_coordinate(records: Vec<IrradianceRecord>) -> Snapshot {
    let mut grouped: IndexMap<CoordKey, Vec<IrradianceRecord>> = IndexMap::new();
    for record in records {
        grouped
            .entry(CoordKey::new(record.latitude, record.longitude))
            .or_default()
            .push(record);
    }
    grouped
        .into_iter()
        .map(|(key, records)| (key, Arc::new(records)))
        .collect()
}

fn complete_series(records: &[IrradianceRecord]) -> Option<MonthlySeries<f64>> {
    let mut values = [None; 12];
    for record in records {
        if MONTHS.contains(&record.month) {
            values[(record.month - 1) as usize] = Some(record.irradiance);
        }
    }
    if values.iter().all(Option::is_some) {
        Some(MonthlySeries::from_fn(|month| {
            values[(month - 1) as usize].unwrap_or_default()
        }))
    } else {
        None
    }
}
