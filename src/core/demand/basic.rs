//! Baseline electricity demand: lighting, appliances and everything else that
//! is neither space heating nor hot water.

use crate::errors::HdemError;
use crate::monthly::MONTHS_PER_YEAR;
use tracing::debug;

/// Annual baseline demand of a single-occupant household, in kWh.
const FIRST_OCCUPANT_ANNUAL_KWH: f64 = 1600.;

/// Additional annual demand for each further occupant, in kWh.
const EXTRA_OCCUPANT_ANNUAL_KWH: f64 = 700.;

/// Baseline electricity demand in kWh for any single month. The baseline is
/// deliberately flat: seasonal swing is carried by the heating components.
///
/// Arguments:
/// * `occupants` - number of residents in the household
pub fn monthly_demand(occupants: i32) -> Result<f64, HdemError> {
    if occupants <= 0 {
        return Err(HdemError::InvalidInput(
            "Number of occupants must be positive for baseline electricity demand".into(),
        ));
    }
    let annual =
        FIRST_OCCUPANT_ANNUAL_KWH + EXTRA_OCCUPANT_ANNUAL_KWH * f64::from(occupants - 1);
    let monthly = annual / f64::from(MONTHS_PER_YEAR);
    debug!(occupants, monthly, "baseline electricity demand");
    Ok(monthly)
}
