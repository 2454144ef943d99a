//! Survival-analysis datasets for colorectal cancer (CRC) patients.
//!
//! Two cohorts are prepared: UK Biobank participants ([`ukb`]) and hospital patients from West
//! China Hospital ([`hx`]). For each patient we work out overall survival (OS), cancer-specific
//! survival (CSS) and, for the hospital cohort, disease-free survival (DFS), as an event flag and
//! a follow-up time in days. Each outcome is also labelled at 1, 3 and 5 years (see
//! [`horizon`]).
//!
//! No modelling happens here; the output CSV files are the input to the statistical analysis.
pub mod categories;
pub mod error;
pub mod horizon;
pub mod hx;
pub mod icd;
pub mod join;
pub mod outcome;
pub mod partial_date;
mod range;
pub mod ukb;
mod util;

pub use anyhow::{Context, Error};
use qu::ick_use::*;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
};

pub use crate::{
    error::PipelineError,
    horizon::{classify, Horizon, HorizonLabel, HorizonLabels, HORIZONS},
    outcome::{Outcome, OutcomeAxis, OutcomeSummary},
    range::{Range, RangeSet, RangeSetCountsWithMissing},
    util::header,
};

pub type Result<T = (), E = anyhow::Error> = std::result::Result<T, E>;
/// UK Biobank participant ID (`eid`).
pub type PatientId = u64;

/// Where a pipeline reads its extracts from and writes its results to.
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Paths {
    pub fn new(data_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Note: No protection from escaping the root directory.
    pub fn input(&self, name: impl AsRef<Path>) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Note: No protection from escaping the root directory.
    pub fn output(&self, name: impl AsRef<Path>) -> PathBuf {
        self.output_dir.join(name)
    }
}

/// Load data into memory from one of the original extracts.
pub fn load_orig<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let file = fs::File::open(path).with_context(|| format!("opening \"{}\"", path.display()))?;
    read_orig(file).with_context(|| format!("while loading \"{}\"", path.display()))
}

/// Parse a CSV extract.
///
/// Header names are lower-cased (the extracts aren't consistent about case) and all fields are
/// trimmed.
pub fn read_orig<T: DeserializeOwned>(reader: impl io::Read) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = reader
        .headers()?
        .iter()
        .map(str::to_lowercase)
        .collect::<csv::StringRecord>();
    reader.set_headers(headers);
    reader
        .into_deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(Into::into)
}

/// An output row type with a fixed, ordered list of columns.
///
/// The list must match the order the fields are serialized in. It is written as the header so
/// that files have a header even when no rows survive.
pub trait Columns {
    const COLUMNS: &'static [&'static str];
}

/// Serialize rows to CSV in memory.
pub fn to_csv<T: Serialize + Columns>(rows: &[T]) -> Result<Vec<u8>> {
    let mut out = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(vec![]);
    out.write_record(T::COLUMNS)?;
    for row in rows {
        out.serialize(row)?;
    }
    out.into_inner().map_err(|e| format_err!("{}", e.error()))
}

/// The files produced by one pipeline run.
///
/// Everything is serialized before anything is written, so a run that fails part way leaves the
/// output directory untouched.
#[derive(Debug, Default)]
pub struct OutputFiles {
    files: Vec<(&'static str, Vec<u8>)>,
}

impl OutputFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Serialize + Columns>(&mut self, name: &'static str, rows: &[T]) -> Result {
        let contents =
            to_csv(rows).with_context(|| format!("unable to serialize rows for \"{}\"", name))?;
        self.files.push((name, contents));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, contents)| contents.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.files.iter().map(|(name, _)| *name)
    }

    /// Write all files into `dir`, creating it if necessary.
    ///
    /// Every file is written beside its target first. Nothing is renamed into place until all of
    /// them have been written.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result {
        fn inner(this: &OutputFiles, dir: &Path) -> Result {
            let targets = this
                .files
                .iter()
                .map(|(name, _)| -> Result<PathBuf> {
                    let path = dir.join(name);
                    check_extension(&path, "csv")?;
                    Ok(path)
                })
                .collect::<Result<Vec<_>>>()?;
            fs::create_dir_all(dir).context("could not create output directory")?;

            let mut written = Vec::with_capacity(targets.len());
            for (path, (_, contents)) in targets.iter().zip(this.files.iter()) {
                let tmp = path.with_extension("csv.partial");
                if let Err(e) = fs::write(&tmp, contents) {
                    for tmp in written.iter() {
                        let _ = fs::remove_file(tmp);
                    }
                    return Err(e)
                        .with_context(|| format!("unable to write \"{}\"", tmp.display()));
                }
                written.push(tmp);
            }

            for (tmp, path) in written.iter().zip(targets.iter()) {
                if util::path_exists(path)? {
                    event!(
                        Level::WARN,
                        "overwriting existing file at \"{}\"",
                        path.display()
                    );
                }
                fs::rename(tmp, path)
                    .with_context(|| format!("unable to save data to \"{}\"", path.display()))?;
            }
            Ok(())
        }
        let dir = dir.as_ref();
        inner(self, dir).with_context(|| format!("while saving results to \"{}\"", dir.display()))
    }
}

pub fn check_extension(path: &Path, ext: &str) -> Result<()> {
    ensure!(
        matches!(path.extension(), Some(p) if p == ext),
        "filename should end with `.{}`",
        ext
    );
    Ok(())
}
