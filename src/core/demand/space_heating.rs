//! Space heating demand from building fabric and ventilation heat loss.
//!
//! Stage one derives a heat loss coefficient per unit floor area from the
//! dwelling's fabric categories. Stage two turns each month's indoor/outdoor
//! temperature difference into heat loss energy, net of a flat internal and
//! solar gains allowance.

use crate::core::demand::electricity_share;
use crate::core::equipment::{resolve_cop, HeatPumpLookup};
use crate::core::units::WATTS_PER_KILOWATT;
use crate::external_data::ClimateDataSource;
use crate::input::{
    BuildEra, DemandEstimateRequest, FloorInsulation, GlazingType, HouseShape, RoofInsulation,
    WallConstruction,
};
use crate::monthly::{hours_in_month, MonthlySeries, MONTHS_PER_YEAR};
use tracing::debug;

/// Assumed indoor set point, °C.
const INDOOR_TEMPERATURE: f64 = 20.0;

/// Assumed storey height, m.
const CEILING_HEIGHT: f64 = 2.4;

/// Heat carried away per air change: the volumetric heat capacity of air,
/// 0.33 Wh/(m³·K).
const AIR_HEAT_CAPACITY: f64 = 0.33;

/// Flat allowance for internal and solar gains, kWh per m² per year.
const ANNUAL_GAINS_ALLOWANCE: f64 = 15.0;

/// Envelope area per m² of floor attributed to each element.
const WALL_AREA_WEIGHT: f64 = 0.3;
const WINDOW_AREA_WEIGHT: f64 = 0.15;
const ROOF_AREA_WEIGHT: f64 = 0.2;
const FLOOR_AREA_WEIGHT: f64 = 0.2;

impl WallConstruction {
    pub(crate) const DEFAULT: Self = Self::CavityUninsulated;

    /// U-value, W/(m²·K).
    pub(crate) fn u_value(&self) -> f64 {
        match self {
            Self::Brick => 2.0,
            Self::CavityUninsulated => 1.5,
            Self::CavityInsulated => 0.5,
            Self::Stone => 1.7,
            Self::Modern => 0.3,
            Self::Other(_) => Self::DEFAULT.u_value(),
        }
    }
}

impl GlazingType {
    pub(crate) const DEFAULT: Self = Self::Double;

    /// U-value, W/(m²·K).
    pub(crate) fn u_value(&self) -> f64 {
        match self {
            Self::Single => 5.0,
            Self::Double => 2.8,
            Self::Triple => 1.0,
            Self::Other(_) => Self::DEFAULT.u_value(),
        }
    }
}

impl RoofInsulation {
    pub(crate) const DEFAULT: Self = Self::Uninsulated;

    /// U-value, W/(m²·K).
    pub(crate) fn u_value(&self) -> f64 {
        match self {
            Self::Insulated => 0.2,
            Self::Uninsulated => 0.6,
            Self::Other(_) => Self::DEFAULT.u_value(),
        }
    }
}

impl FloorInsulation {
    pub(crate) const DEFAULT: Self = Self::Uninsulated;

    /// U-value, W/(m²·K).
    pub(crate) fn u_value(&self) -> f64 {
        match self {
            Self::Insulated => 0.13,
            Self::Uninsulated => 0.6,
            Self::Modern => 0.18,
            Self::Other(_) => Self::DEFAULT.u_value(),
        }
    }
}

impl HouseShape {
    pub(crate) const DEFAULT: Self = Self::SemiDetached;

    /// Multiplier on the exposed envelope for the built form; shared walls
    /// shrink it.
    pub(crate) fn envelope_factor(&self) -> f64 {
        match self {
            Self::Detached => 1.0,
            Self::SemiDetached => 0.85,
            Self::EndTerraced => 0.8,
            Self::Terraced => 0.7,
            Self::Other(_) => Self::DEFAULT.envelope_factor(),
        }
    }
}

impl BuildEra {
    pub(crate) const DEFAULT: Self = Self::From1981To2002;

    /// Whole-house air changes per hour for the construction era.
    pub(crate) fn air_change_rate(&self) -> f64 {
        match self {
            Self::Before1930 => 0.9,
            Self::From1930To1980 => 0.7,
            Self::From1981To2002 => 0.55,
            Self::After2003 => 0.45,
            Self::Other(_) => Self::DEFAULT.air_change_rate(),
        }
    }
}

/// Whole-building heat loss coefficient per unit floor area, W/(m²·K).
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct HeatLossCoefficient(f64);

impl HeatLossCoefficient {
    /// Derive the coefficient from a request's fabric descriptors. Absent or
    /// unrecognised categories take the documented default values.
    pub fn from_fabric(request: &DemandEstimateRequest) -> Self {
        let wall = request
            .wall_type
            .as_ref()
            .unwrap_or(&WallConstruction::DEFAULT);
        let window = request.window_type.as_ref().unwrap_or(&GlazingType::DEFAULT);
        let roof = request
            .roof_insulation
            .as_ref()
            .unwrap_or(&RoofInsulation::DEFAULT);
        let floor = request
            .floor_insulation
            .as_ref()
            .unwrap_or(&FloorInsulation::DEFAULT);
        let shape = request.house_type.as_ref().unwrap_or(&HouseShape::DEFAULT);
        let era = request.build_year.as_ref().unwrap_or(&BuildEra::DEFAULT);

        let fabric = (wall.u_value() * WALL_AREA_WEIGHT
            + window.u_value() * WINDOW_AREA_WEIGHT
            + roof.u_value() * ROOF_AREA_WEIGHT
            + floor.u_value() * FLOOR_AREA_WEIGHT)
            * shape.envelope_factor();
        let ventilation = AIR_HEAT_CAPACITY * era.air_change_rate() * CEILING_HEIGHT;
        debug!(fabric, ventilation, "space heating loss coefficient");
        Self(fabric + ventilation)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Monthly space heating energy need in kWh (thermal) for the whole dwelling.
///
/// Months whose mean outdoor temperature reaches the set point need no
/// heating. A missing or non-positive floor area produces an all-zero series:
/// with no area there is nothing to scale, and that is not an input error.
pub fn monthly_thermal_demand(
    request: &DemandEstimateRequest,
    outdoor_temperatures: &MonthlySeries<f64>,
) -> MonthlySeries<f64> {
    let Some(floor_area) = request.house_area.filter(|area| *area > 0.) else {
        return MonthlySeries::zero();
    };
    let coefficient = HeatLossCoefficient::from_fabric(request);
    let monthly_gains = ANNUAL_GAINS_ALLOWANCE / f64::from(MONTHS_PER_YEAR);
    MonthlySeries::from_fn(|month| {
        let delta_t = INDOOR_TEMPERATURE - outdoor_temperatures.get(month);
        if delta_t <= 0. {
            return 0.;
        }
        let loss_per_area =
            coefficient.value() * delta_t * hours_in_month(month) / f64::from(WATTS_PER_KILOWATT);
        (loss_per_area - monthly_gains).max(0.) * floor_area
    })
}

/// Monthly electricity demand for space heating, in kWh.
pub fn monthly_electricity_demand(
    request: &DemandEstimateRequest,
    climate: &impl ClimateDataSource,
    latitude: f64,
    longitude: f64,
    heat_pumps: &impl HeatPumpLookup,
) -> MonthlySeries<f64> {
    let temperatures = climate.monthly_temperature(latitude, longitude);
    let thermal = monthly_thermal_demand(request, &temperatures);
    let cop = resolve_cop(heat_pumps, request.heat_pump_id);
    thermal.map(|kwh| electricity_share(kwh, request.heating_type.as_ref(), cop))
}

/// Annual space heating energy need in kWh (thermal), as consumed by the gas
/// orchestrator.
pub fn annual_thermal_demand(
    request: &DemandEstimateRequest,
    climate: &impl ClimateDataSource,
    latitude: f64,
    longitude: f64,
) -> f64 {
    let temperatures = climate.monthly_temperature(latitude, longitude);
    monthly_thermal_demand(request, &temperatures).annual_total()
}
