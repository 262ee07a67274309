use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

/// Coefficient of performance assumed when no catalog entry is available.
pub const DEFAULT_HEAT_PUMP_COP: f64 = 3.0;

/// Source of heat pump performance data, keyed by catalog id.
pub trait HeatPumpLookup {
    fn cop(&self, id: u32) -> Option<f64>;
}

/// A heat pump catalog entry as supplied in the request document.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct HeatPumpRecord {
    pub name: String,
    pub cop: f64,
}

/// In-memory heat pump catalog. An empty catalog is valid and simply means
/// every referenced pump falls back to the default COP.
#[derive(Clone, Debug, Default)]
pub struct HeatPumpCatalog {
    entries: IndexMap<u32, HeatPumpRecord>,
}

impl HeatPumpCatalog {
    pub fn from_entries(entries: impl IntoIterator<Item = (u32, HeatPumpRecord)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl HeatPumpLookup for HeatPumpCatalog {
    fn cop(&self, id: u32) -> Option<f64> {
        self.entries.get(&id).map(|record| record.cop)
    }
}

/// Resolve the COP to apply for an optional heat pump reference. An
/// unspecified id or one the catalog does not know is not an error; the
/// default COP is used instead.
pub fn resolve_cop(heat_pumps: &impl HeatPumpLookup, heat_pump_id: Option<u32>) -> f64 {
    match heat_pump_id.and_then(|id| heat_pumps.cop(id)) {
        Some(cop) => cop,
        None => {
            if let Some(id) = heat_pump_id {
                debug!(id, "heat pump not found in catalog, using default COP");
            }
            DEFAULT_HEAT_PUMP_COP
        }
    }
}
