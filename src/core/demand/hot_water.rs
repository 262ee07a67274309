//! Hot water energy demand and the electricity drawn to meet it.

use crate::core::demand::electricity_share;
use crate::core::equipment::{resolve_cop, HeatPumpLookup};
use crate::input::SystemType;
use crate::monthly::MonthlySeries;
use tracing::debug;

/// Monthly share of the annual hot water demand, in percent. Hot water varies
/// far less over the year than heating; the winter lift reflects colder inlet
/// water and longer draw-offs.
pub(crate) const MONTHLY_PROPORTIONS: [f64; 12] = [
    9.4, 8.5, 9.1, 8.1, 8.2, 7.5, 7.3, 7.3, 7.8, 8.3, 8.4, 10.1,
];

/// Annual hot water energy need in kWh (thermal) for a household of the
/// given size.
pub fn annual_thermal_demand(occupants: i32) -> f64 {
    1250. + f64::from(occupants) + 600.
}

/// Monthly electricity demand for hot water, in kWh. The hot water system
/// type decides the carrier conversion; occupancy is validated by the
/// orchestrator before this is called.
pub fn monthly_electricity_demand(
    occupants: i32,
    hot_water_type: Option<&SystemType>,
    heat_pump_id: Option<u32>,
    heat_pumps: &impl HeatPumpLookup,
) -> MonthlySeries<f64> {
    let annual_thermal = annual_thermal_demand(occupants);
    let cop = resolve_cop(heat_pumps, heat_pump_id);
    debug!(occupants, annual_thermal, "hot water thermal demand");
    MonthlySeries::from_fn(|month| {
        let thermal = annual_thermal * MONTHLY_PROPORTIONS[(month - 1) as usize] / 100.;
        electricity_share(thermal, hot_water_type, cop)
    })
}
