extern crate hdem;

use clap::Parser;
use hdem::output::FileOutput;
use hdem::run_request;
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct HdemArgs {
    /// JSON request document describing the household and its usage data
    input_file: String,
    /// Directory for the result CSVs, defaulting to the input's directory
    #[arg(long, short)]
    output_directory: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let args = HdemArgs::parse();

    let input_path = Path::new(&args.input_file);
    let input_stem = input_path
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("request");
    let output_directory = args
        .output_directory
        .unwrap_or_else(|| input_path.parent().unwrap_or(Path::new(".")).to_path_buf());

    let output = FileOutput::new(output_directory, format!("{input_stem}__{{}}.csv"))?;
    let results = run_request(BufReader::new(File::open(input_path)?), output)?;

    if let Some(result) = &results.electricity {
        info!(
            "electricity demand: {} kWh/year via {}",
            result.annual_demand, result.calculation_method
        );
    }
    if let Some(result) = &results.gas {
        info!(
            "gas demand: {} kWh/year via {}",
            result.annual_demand, result.calculation_method
        );
    }
    if let Some(result) = &results.solar_yield {
        info!(
            "solar yield: {} kWh per installed kW in an average month",
            result.average_monthly_yield
        );
    }

    Ok(())
}
