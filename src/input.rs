use crate::core::equipment::HeatPumpRecord;
use crate::external_data::GatewayConfig;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// Everything known about the household a demand or yield request concerns.
/// Every field is optional: each calculation strategy validates just the
/// fields it needs and documented defaults cover the rest.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DemandEstimateRequest {
    pub occupants: Option<i32>,
    pub heating_type: Option<SystemType>,
    pub hot_water_type: Option<SystemType>,
    /// Catalog id of the installed heat pump, where one is installed.
    pub heat_pump_id: Option<u32>,
    pub has_heat_pump: Option<bool>,
    /// Heated floor area in m².
    pub house_area: Option<f64>,
    pub build_year: Option<BuildEra>,
    pub wall_type: Option<WallConstruction>,
    pub window_type: Option<GlazingType>,
    pub roof_insulation: Option<RoofInsulation>,
    pub floor_insulation: Option<FloorInsulation>,
    pub house_type: Option<HouseShape>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Free-text label for the place, carried through to cached records.
    pub location: Option<String>,
}

/// Usage figures for a single fuel. The orchestrators pick their calculation
/// strategy from which of these fields are populated.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UsageData {
    /// Metered usage in kWh keyed by month number (1-12).
    pub monthly_usage: Option<IndexMap<u32, f64>>,
    /// Annual usage in kWh, to be spread over a seasonal profile.
    pub annual_usage: Option<f64>,
    pub needs_estimation: Option<bool>,
}

/// A full request document as read from a file or stdin: one household plus
/// optional per-fuel usage blocks and optional engine configuration.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestDocument {
    #[serde(flatten)]
    pub household: DemandEstimateRequest,
    pub electricity_usage: Option<UsageData>,
    pub gas_usage: Option<UsageData>,
    /// Heat pump catalog entries keyed by id, standing in for an external
    /// equipment database.
    pub heat_pumps: Option<IndexMap<u32, HeatPumpRecord>>,
    pub gateway: Option<GatewayConfig>,
}

/// The energy carrier and plant serving a heating or hot water load. Input
/// synonyms ("gas-boiler" for gas, "electricity" for electric) collapse onto
/// one variant each; anything unrecognised is retained verbatim in [`SystemType::Other`]
/// and treated as drawing no electricity.
#[derive(Clone, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "kebab-case")]
pub enum SystemType {
    #[strum(serialize = "gas-boiler", to_string = "gas")]
    Gas,
    #[strum(serialize = "electricity", to_string = "electric")]
    Electric,
    HeatPump,
    #[strum(default)]
    Other(String),
}

/// Wall construction category, as surveyed.
#[derive(Clone, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "kebab-case")]
pub enum WallConstruction {
    Brick,
    #[strum(serialize = "cavity", to_string = "cavity-uninsulated")]
    CavityUninsulated,
    CavityInsulated,
    Stone,
    Modern,
    #[strum(default)]
    Other(String),
}

#[derive(Clone, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "kebab-case")]
pub enum GlazingType {
    Single,
    Double,
    Triple,
    #[strum(default)]
    Other(String),
}

#[derive(Clone, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
pub enum RoofInsulation {
    #[strum(to_string = "yes")]
    Insulated,
    #[strum(to_string = "no")]
    Uninsulated,
    #[strum(default)]
    Other(String),
}

#[derive(Clone, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
pub enum FloorInsulation {
    #[strum(to_string = "yes")]
    Insulated,
    #[strum(to_string = "no")]
    Uninsulated,
    #[strum(to_string = "modern")]
    Modern,
    #[strum(default)]
    Other(String),
}

/// Built form of the dwelling, which scales the exposed envelope area.
#[derive(Clone, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "kebab-case")]
pub enum HouseShape {
    Detached,
    SemiDetached,
    EndTerraced,
    Terraced,
    #[strum(default)]
    Other(String),
}

/// Construction era band, standing in for the airtightness of the build.
#[derive(Clone, Debug, Deserialize, Display, EnumString, Eq, PartialEq, Serialize)]
#[serde(from = "String", into = "String")]
pub enum BuildEra {
    #[strum(to_string = "before-1930")]
    Before1930,
    #[strum(to_string = "1930-1980")]
    From1930To1980,
    #[strum(to_string = "1981-2002")]
    From1981To2002,
    #[strum(to_string = "after-2003")]
    After2003,
    #[strum(default)]
    Other(String),
}

macro_rules! string_bridged {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl From<String> for $ty {
                // cannot fail: unmatched strings land in the default variant
                fn from(value: String) -> Self {
                    value.parse().unwrap_or(Self::Other(value))
                }
            }

            impl From<$ty> for String {
                fn from(value: $ty) -> Self {
                    value.to_string()
                }
            }
        )+
    };
}

string_bridged!(
    SystemType,
    WallConstruction,
    GlazingType,
    RoofInsulation,
    FloorInsulation,
    HouseShape,
    BuildEra,
);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use serde_json::json;

    #[rstest]
    #[case("gas", SystemType::Gas)]
    #[case("gas-boiler", SystemType::Gas)]
    #[case("electric", SystemType::Electric)]
    #[case("electricity", SystemType::Electric)]
    #[case("heat-pump", SystemType::HeatPump)]
    #[case("district-heating", SystemType::Other("district-heating".into()))]
    fn should_collapse_system_type_synonyms(#[case] input: &str, #[case] expected: SystemType) {
        let parsed: SystemType = serde_json::from_value(json!(input)).unwrap();
        assert_eq!(parsed, expected);
    }

    #[rstest]
    fn should_serialize_canonical_system_names() {
        assert_eq!(serde_json::to_value(SystemType::Gas).unwrap(), json!("gas"));
        assert_eq!(
            serde_json::to_value(SystemType::Other("biomass".into())).unwrap(),
            json!("biomass")
        );
    }

    #[rstest]
    #[case("cavity", WallConstruction::CavityUninsulated)]
    #[case("cavity-uninsulated", WallConstruction::CavityUninsulated)]
    #[case("cob", WallConstruction::Other("cob".into()))]
    fn should_parse_wall_construction(#[case] input: &str, #[case] expected: WallConstruction) {
        let parsed: WallConstruction = serde_json::from_value(json!(input)).unwrap();
        assert_eq!(parsed, expected);
    }

    #[rstest]
    fn should_parse_build_era_bands() {
        let parsed: BuildEra = serde_json::from_value(json!("1930-1980")).unwrap();
        assert_eq!(parsed, BuildEra::From1930To1980);
        assert_eq!(parsed.to_string(), "1930-1980");
    }

    #[rstest]
    fn should_parse_full_request_document() {
        let document: RequestDocument = serde_json::from_value(json!({
            "occupants": 3,
            "heatingType": "gas-boiler",
            "hotWaterType": "electricity",
            "houseArea": 95.0,
            "buildYear": "after-2003",
            "wallType": "cavity",
            "houseType": "semi-detached",
            "latitude": 51.4545,
            "longitude": -2.5879,
            "location": "Bristol",
            "electricityUsage": {"needsEstimation": true},
            "gasUsage": {"monthlyUsage": {"1": 210.0, "2": 180.0}},
            "heatPumps": {"7": {"name": "Vaillant Arotherm", "cop": 3.8}}
        }))
        .unwrap();

        assert_eq!(document.household.occupants, Some(3));
        assert_eq!(document.household.heating_type, Some(SystemType::Gas));
        assert_eq!(document.household.hot_water_type, Some(SystemType::Electric));
        assert_eq!(
            document.household.wall_type,
            Some(WallConstruction::CavityUninsulated)
        );
        assert_eq!(document.household.location.as_deref(), Some("Bristol"));
        assert_eq!(
            document.electricity_usage.unwrap().needs_estimation,
            Some(true)
        );
        let gas = document.gas_usage.unwrap();
        assert_eq!(gas.monthly_usage.unwrap().get(&1), Some(&210.0));
        assert_eq!(document.heat_pumps.unwrap().get(&7).unwrap().cop, 3.8);
    }

    #[rstest]
    fn should_default_every_household_field_to_none() {
        let document: RequestDocument = serde_json::from_value(json!({})).unwrap();
        assert!(document.household.occupants.is_none());
        assert!(document.electricity_usage.is_none());
        assert!(document.gas_usage.is_none());
    }
}
