use clap::Parser;
use crc_survival::{
    header,
    ukb::{self, UkbSources},
    OutcomeSummary, Paths,
};
use qu::ick_use::*;
use std::path::PathBuf;

/// Build the UK Biobank survival datasets.
#[derive(Parser)]
struct Opt {
    /// Directory holding the UK Biobank extracts
    #[clap(long, default_value = "data/ukb")]
    data_dir: PathBuf,
    /// Where to write the output files. Created if missing.
    #[clap(long, default_value = "results/00")]
    output_dir: PathBuf,
}

#[qu::ick]
fn main(opt: Opt) -> Result {
    let paths = Paths::new(opt.data_dir, opt.output_dir);
    let sources = UkbSources::load(&paths)?;
    let results = ukb::run(&sources)?;
    let files = results.output_files()?;
    files.save(&paths.output_dir)?;
    for name in files.names() {
        event!(Level::INFO, "wrote \"{}\"", paths.output(name).display());
    }

    header("UK Biobank CRC cohort");
    println!("patients with a CRC diagnosis: {}", results.survival.len());
    println!(
        "with a platelet count, diagnosed after assessment: {}",
        results.all.len()
    );
    for (outcome, axes) in results.axes() {
        OutcomeSummary::new(outcome, &axes).print();
    }
    Ok(())
}
