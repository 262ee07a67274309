pub mod core;
mod errors;
pub mod external_data;
pub mod input;
pub mod monthly;
pub mod output;

#[macro_use]
extern crate is_close;

pub use crate::errors::HdemError;

use crate::core::demand::electricity::ElectricityDemandOrchestrator;
use crate::core::demand::gas::GasDemandOrchestrator;
use crate::core::demand::DemandResult;
use crate::core::equipment::HeatPumpCatalog;
use crate::core::solar_yield::{LocationYieldCalculator, LocationYieldResult};
use crate::external_data::ExternalDataGateway;
use crate::input::RequestDocument;
use crate::output::Output;
use csv::WriterBuilder;
use serde::Serialize;
use std::io::Read;
use tracing::info;

/// Everything a single request document produced.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub electricity: Option<DemandResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas: Option<DemandResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solar_yield: Option<LocationYieldResult>,
}

/// Run every calculation a request document asks for: demand per fuel with a
/// usage block, plus solar yield when the household carries coordinates.
/// Results are written to the output as CSV and returned to the caller.
pub fn run_request(input: impl Read, output: impl Output) -> Result<RunResults, HdemError> {
    let document: RequestDocument = serde_json::from_reader(input)?;

    let gateway_config = document.gateway.clone().unwrap_or_default();
    let gateway = ExternalDataGateway::from_config(&gateway_config);
    let heat_pumps =
        HeatPumpCatalog::from_entries(document.heat_pumps.clone().unwrap_or_default());
    let household = &document.household;

    let electricity = document
        .electricity_usage
        .as_ref()
        .map(|usage| {
            ElectricityDemandOrchestrator::new(&gateway, &heat_pumps).calculate(usage, household)
        })
        .transpose()?;
    let gas = document
        .gas_usage
        .as_ref()
        .map(|usage| GasDemandOrchestrator::new(&gateway).calculate(usage, household))
        .transpose()?;
    let solar_yield = match (household.latitude, household.longitude) {
        (Some(latitude), Some(longitude)) => Some(LocationYieldCalculator::new(&gateway)
            .calculate(latitude, longitude, household.location.as_deref())),
        _ => None,
    };

    if electricity.is_none() && gas.is_none() && solar_yield.is_none() {
        return Err(HdemError::InvalidInput(
            "Request document holds no usage data and no coordinates, so there is nothing to \
             calculate"
                .into(),
        ));
    }

    if let Some(result) = &electricity {
        write_demand_output_file(&output, "electricity_demand", result)?;
    }
    if let Some(result) = &gas {
        write_demand_output_file(&output, "gas_demand", result)?;
    }
    if let Some(result) = &solar_yield {
        write_yield_output_file(&output, "solar_yield", result)?;
    }

    Ok(RunResults {
        electricity,
        gas,
        solar_yield,
    })
}

fn write_demand_output_file(
    output: &impl Output,
    results_key: &str,
    result: &DemandResult,
) -> anyhow::Result<()> {
    let Some(writer) = output.writer_for_results_key(results_key)? else {
        return Ok(());
    };
    info!("writing demand results out to {results_key}");
    let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);

    writer.write_record(["Month", "Demand"])?;
    writer.write_record(["[count]", "[kWh]"])?;
    for (month, demand) in result.monthly_demand.iter() {
        writer.write_record([month.to_string(), demand.to_string()])?;
    }
    writer.write_record(["annual".to_string(), result.annual_demand.to_string()])?;
    writer.write_record([
        "method".to_string(),
        result.calculation_method.to_string(),
    ])?;
    writer.write_record(["description".to_string(), result.description.clone()])?;
    writer.flush()?;

    Ok(())
}

fn write_yield_output_file(
    output: &impl Output,
    results_key: &str,
    result: &LocationYieldResult,
) -> anyhow::Result<()> {
    let Some(writer) = output.writer_for_results_key(results_key)? else {
        return Ok(());
    };
    info!("writing yield results out to {results_key}");
    let mut writer = WriterBuilder::new().flexible(true).from_writer(writer);

    writer.write_record(["Month", "Days", "Irradiance", "Yield"])?;
    writer.write_record(["[count]", "[days]", "[kWh/m^2/day]", "[kWh/kW]"])?;
    for (month, monthly_yield) in result.monthly_yield.iter() {
        writer.write_record([
            month.to_string(),
            result.days_in_month.get(month).to_string(),
            result.monthly_irradiance.get(month).to_string(),
            monthly_yield.to_string(),
        ])?;
    }
    writer.write_record([
        "average".to_string(),
        result.average_monthly_yield.to_string(),
    ])?;
    writer.write_record([
        "source".to_string(),
        result.irradiance_source.to_string(),
    ])?;
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::demand::CalculationMethod;
    use crate::external_data::IrradianceSource;
    use crate::output::SinkOutput;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    /// Keeps every written file in memory, keyed the way it would be named.
    #[derive(Debug, Default)]
    struct CaptureOutput {
        files: RefCell<IndexMap<String, Rc<RefCell<Vec<u8>>>>>,
    }

    impl CaptureOutput {
        fn file(&self, results_key: &str) -> String {
            String::from_utf8(self.files.borrow()[results_key].borrow().clone()).unwrap()
        }
    }

    struct CaptureWriter(Rc<RefCell<Vec<u8>>>);

    impl Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Output for &CaptureOutput {
        fn writer_for_results_key(&self, results_key: &str) -> anyhow::Result<Option<impl Write>> {
            let buffer = Rc::new(RefCell::new(Vec::new()));
            self.files
                .borrow_mut()
                .insert(results_key.to_string(), Rc::clone(&buffer));
            Ok(Some(CaptureWriter(buffer)))
        }
    }

    // Providers get an unroutable address so every lookup exhausts the live
    // tiers immediately and lands on the built-in profiles.
    fn document_with_offline_gateway(body: &str) -> String {
        format!(
            r#"{{
                "gateway": {{
                    "powerBaseUrl": "http://127.0.0.1:9",
                    "archiveBaseUrl": "http://127.0.0.1:9",
                    "timeoutSecs": 1
                }},
                {body}
            }}"#
        )
    }

    #[rstest]
    fn should_run_every_requested_calculation() {
        let document = document_with_offline_gateway(
            r#""occupants": 3,
            "heatingType": "gas",
            "hotWaterType": "gas-boiler",
            "latitude": 51.5074,
            "longitude": -0.1278,
            "location": "London",
            "electricityUsage": {"needsEstimation": true},
            "gasUsage": {"annualUsage": 12000.0}"#,
        );
        let output = CaptureOutput::default();

        let results = run_request(document.as_bytes(), &output).unwrap();

        let electricity = results.electricity.unwrap();
        assert_eq!(electricity.calculation_method, CalculationMethod::Estimated);
        assert_eq!(electricity.annual_demand, 3000.);
        assert_eq!(electricity.monthly_demand.get(7), 250.);

        let gas = results.gas.unwrap();
        assert_eq!(
            gas.calculation_method,
            CalculationMethod::UserAnnualDistributed
        );
        assert_eq!(gas.annual_demand, 12000.);

        let solar_yield = results.solar_yield.unwrap();
        assert_eq!(solar_yield.irradiance_source, IrradianceSource::Default);
        // January never has a leap day: 0.5 kWh/m²/day * 31 days * 0.8
        assert_eq!(solar_yield.monthly_yield.get(1), 12.4);

        let files = output.files.borrow();
        let written: Vec<&String> = files.keys().collect();
        assert_eq!(
            written,
            ["electricity_demand", "gas_demand", "solar_yield"]
        );
        drop(files);
        let electricity_csv = output.file("electricity_demand");
        assert!(electricity_csv.starts_with("Month,Demand\n[count],[kWh]\n1,250\n"));
        assert!(electricity_csv.contains("\nannual,3000\n"));
        assert!(electricity_csv.contains("\nmethod,estimated\n"));
        let yield_csv = output.file("solar_yield");
        assert!(yield_csv.starts_with("Month,Days,Irradiance,Yield\n"));
        assert!(yield_csv.contains("\n1,31,0.5,12.4\n"));
        assert!(yield_csv.contains("\nsource,default\n"));
    }

    #[rstest]
    fn should_skip_calculations_the_document_does_not_ask_for() {
        let document =
            document_with_offline_gateway(r#""gasUsage": {"monthlyUsage": {"1": 100.0}}"#);
        let output = CaptureOutput::default();

        let results = run_request(document.as_bytes(), &output).unwrap();

        assert!(results.electricity.is_none());
        assert!(results.solar_yield.is_none());
        assert_eq!(results.gas.unwrap().annual_demand, 100.);
        let files = output.files.borrow();
        let written: Vec<&String> = files.keys().collect();
        assert_eq!(written, ["gas_demand"]);
    }

    #[rstest]
    fn should_reject_document_with_nothing_to_calculate() {
        let error = run_request("{}".as_bytes(), SinkOutput).unwrap_err();
        assert!(matches!(error, HdemError::InvalidInput(_)));
    }

    #[rstest]
    fn should_reject_malformed_document() {
        let error = run_request("{not json".as_bytes(), SinkOutput).unwrap_err();
        assert!(matches!(error, HdemError::MalformedRequest(_)));
    }

    #[rstest]
    fn should_propagate_invalid_usage_block() {
        let document = document_with_offline_gateway(r#""electricityUsage": {}"#);
        let error = run_request(document.as_bytes(), SinkOutput).unwrap_err();
        assert!(error
            .to_string()
            .contains("No valid electricity demand input provided"));
    }

    #[rstest]
    fn should_calculate_without_writing_for_discarding_output() {
        let document = document_with_offline_gateway(r#""gasUsage": {"annualUsage": 500.0}"#);
        let results = run_request(document.as_bytes(), SinkOutput).unwrap();
        assert_eq!(results.gas.unwrap().annual_demand, 500.);
    }
}
