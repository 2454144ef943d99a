use clap::Parser;
use crc_survival::{
    header,
    hx::{self, HxSources},
    OutcomeSummary, Paths,
};
use qu::ick_use::*;
use std::path::PathBuf;

/// Build the West China Hospital survival datasets.
#[derive(Parser)]
struct Opt {
    /// Directory holding the patient records and covariate spreadsheet
    #[clap(long, default_value = "data/hx")]
    data_dir: PathBuf,
    /// Where to write the output files. Created if missing.
    #[clap(long, default_value = "results/01")]
    output_dir: PathBuf,
    /// Patient records CSV, relative to the data directory
    #[clap(long, default_value = hx::RECORDS_FILE)]
    records: String,
    /// Covariate spreadsheet, relative to the data directory
    #[clap(long, default_value = hx::WORKBOOK_FILE)]
    workbook: String,
}

#[qu::ick]
fn main(opt: Opt) -> Result {
    let paths = Paths::new(opt.data_dir, opt.output_dir);
    let sources = HxSources::load(&paths, &opt.records, &opt.workbook)?;
    let results = hx::run(&sources)?;
    let files = results.output_files()?;
    files.save(&paths.output_dir)?;
    for name in files.names() {
        event!(Level::INFO, "wrote \"{}\"", paths.output(name).display());
    }

    header("West China Hospital CRC cohort");
    println!("included patients: {}", results.survival.len());
    println!(
        "with a platelet count in the spreadsheet: {}",
        results.full.len()
    );
    for (outcome, axes) in results.axes() {
        OutcomeSummary::new(outcome, &axes).print();
    }
    Ok(())
}
