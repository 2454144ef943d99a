//! UK Biobank cohort.
//!
//! CRC diagnoses come from three places: the cancer registry and the ICD-9 and ICD-10 hospital
//! diagnosis tables. We take each participant's earliest CRC diagnosis from any of them as the
//! start of follow-up. Follow-up ends at death, or at the administrative censoring date for
//! participants with no death record.
//!
//! OS and CSS share both ends of the time axis; only the event differs.
use crate::{
    categories::{Ethnicity, Exposure, Sex, YesNo},
    horizon::{HorizonLabel, DAYS_PER_YEAR},
    icd::{is_crc_icd10_code, is_crc_icd9_code},
    join::{inner_join_one_to_one, left_join_one_to_one, Keyed},
    load_orig,
    outcome::{check_all, elapsed_days, Outcome, OutcomeAxis},
    util::{
        bool_01, optional_bool_01, optional_date, optional_date_prefix, optional_float,
        optional_int, optional_string, optional_whole_number, whole_number,
    },
    Columns, OutputFiles, PatientId, Paths, Result,
};
use chrono::NaiveDate;
use itertools::Itertools;
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    ops::Deref,
};

pub const REGISTRY_FILE: &str = "date_cancer_registry_update.csv";
pub const ICD9_FILE: &str = "diagnosis_ICD9.csv";
pub const ICD10_FILE: &str = "diagnosis_ICD10_update.csv";
pub const DEATH_FILE: &str = "date_death_update.csv";
pub const INITIAL_VISIT_FILE: &str = "ukb_initial_visit.csv";

pub const SURVIVAL_OUTPUT: &str = "ukb_survival_data.csv";
pub const ALL_OUTPUT: &str = "ukb_all_data.csv";
pub const DATA_OUTPUT: &str = "ukb_data.csv";

/// The platelet count must have been taken within this many days of the assessment centre
/// visit (and not before it).
pub const MAX_TEST_LAG_DAYS: i64 = 7;

/// Participants with no recorded death are censored here.
pub fn administrative_censoring_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap()
}

// Raw extracts

/// A row in the cancer registry.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryRaw {
    pub eid: PatientId,
    #[serde(deserialize_with = "optional_date")]
    pub date_of_cancer_diagnosis: Option<NaiveDate>,
    #[serde(deserialize_with = "optional_string")]
    pub type_of_cancer_icd9: Option<String>,
    #[serde(deserialize_with = "optional_string")]
    pub type_of_cancer_icd10: Option<String>,
}

/// A row in the ICD-9 hospital diagnosis table.
#[derive(Debug, Clone, Deserialize)]
pub struct Icd9Raw {
    pub eid: PatientId,
    #[serde(deserialize_with = "optional_string")]
    pub diagnoses_icd9: Option<String>,
    #[serde(deserialize_with = "optional_date")]
    pub date_icd9: Option<NaiveDate>,
}

/// A row in the ICD-10 hospital diagnosis table.
#[derive(Debug, Clone, Deserialize)]
pub struct Icd10Raw {
    pub eid: PatientId,
    #[serde(deserialize_with = "optional_string")]
    pub diagnosis_icd10: Option<String>,
    #[serde(deserialize_with = "optional_date")]
    pub date_icd10: Option<NaiveDate>,
}

/// A row in the death registry. There is one row per recorded cause of death, so participants
/// usually have several.
#[derive(Debug, Clone, Deserialize)]
pub struct DeathRaw {
    pub eid: PatientId,
    #[serde(deserialize_with = "optional_date")]
    pub date_death: Option<NaiveDate>,
    #[serde(deserialize_with = "optional_string")]
    pub icd10: Option<String>,
}

/// A row from the first assessment centre visit.
#[derive(Debug, Clone, Deserialize)]
pub struct InitialVisitRaw {
    pub eid: PatientId,
    #[serde(deserialize_with = "optional_float")]
    pub platelet_count: Option<f64>,
    #[serde(deserialize_with = "optional_date_prefix")]
    pub platelet_count_acquisition_time: Option<NaiveDate>,
    #[serde(deserialize_with = "optional_date")]
    pub date_of_attending_assessment_centre: Option<NaiveDate>,
    #[serde(deserialize_with = "optional_float")]
    pub age_when_attended_assessment_centre: Option<f64>,
    #[serde(deserialize_with = "optional_int")]
    pub sex: Option<i64>,
    #[serde(deserialize_with = "optional_int")]
    pub ethnic_background: Option<i64>,
    #[serde(deserialize_with = "optional_int")]
    pub smoking_status: Option<i64>,
    #[serde(deserialize_with = "optional_int")]
    pub alcohol_drinker_status: Option<i64>,
    #[serde(deserialize_with = "optional_float")]
    pub body_mass_index: Option<f64>,
}

/// All the UK Biobank extracts we use.
#[derive(Debug, Clone, Default)]
pub struct UkbSources {
    pub registry: Vec<RegistryRaw>,
    pub icd9: Vec<Icd9Raw>,
    pub icd10: Vec<Icd10Raw>,
    pub deaths: Vec<DeathRaw>,
    pub initial_visit: Vec<InitialVisitRaw>,
}

impl UkbSources {
    pub fn load(paths: &Paths) -> Result<Self> {
        let this = Self {
            registry: load_orig(paths.input(REGISTRY_FILE))?,
            icd9: load_orig(paths.input(ICD9_FILE))?,
            icd10: load_orig(paths.input(ICD10_FILE))?,
            deaths: load_orig(paths.input(DEATH_FILE))?,
            initial_visit: load_orig(paths.input(INITIAL_VISIT_FILE))?,
        };
        event!(
            Level::INFO,
            "loaded {} registry, {} ICD-9, {} ICD-10, {} death and {} assessment rows",
            this.registry.len(),
            this.icd9.len(),
            this.icd10.len(),
            this.deaths.len(),
            this.initial_visit.len()
        );
        Ok(this)
    }
}

// Diagnoses

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub enum DiagnosisSource {
    Registry,
    Icd9,
    Icd10,
}

impl fmt::Display for DiagnosisSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DiagnosisSource::Registry => f.write_str("cancer registry"),
            DiagnosisSource::Icd9 => f.write_str("ICD-9 diagnoses"),
            DiagnosisSource::Icd10 => f.write_str("ICD-10 diagnoses"),
        }
    }
}

/// A dated CRC diagnosis from one of the sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisEvent {
    pub patient_id: PatientId,
    pub code: String,
    pub date: NaiveDate,
    pub source: DiagnosisSource,
}

/// Every dated CRC diagnosis, in source order (registry, then ICD-9, then ICD-10).
pub struct Diagnoses {
    els: Vec<DiagnosisEvent>,
}

impl Diagnoses {
    pub fn from_sources(registry: &[RegistryRaw], icd9: &[Icd9Raw], icd10: &[Icd10Raw]) -> Self {
        let registry = registry.iter().filter_map(|row| {
            let date = row.date_of_cancer_diagnosis?;
            let crc = row.type_of_cancer_icd9.as_deref().map_or(false, is_crc_icd9_code)
                || row
                    .type_of_cancer_icd10
                    .as_deref()
                    .map_or(false, is_crc_icd10_code);
            if !crc {
                return None;
            }
            // prefer the ICD-10 code when the registry has both
            let code = row
                .type_of_cancer_icd10
                .clone()
                .or_else(|| row.type_of_cancer_icd9.clone())?;
            Some(DiagnosisEvent {
                patient_id: row.eid,
                code,
                date,
                source: DiagnosisSource::Registry,
            })
        });
        let icd9 = icd9.iter().filter_map(|row| {
            let code = row.diagnoses_icd9.as_ref()?;
            if !is_crc_icd9_code(code) {
                return None;
            }
            Some(DiagnosisEvent {
                patient_id: row.eid,
                code: code.clone(),
                date: row.date_icd9?,
                source: DiagnosisSource::Icd9,
            })
        });
        let icd10 = icd10.iter().filter_map(|row| {
            let code = row.diagnosis_icd10.as_ref()?;
            if !is_crc_icd10_code(code) {
                return None;
            }
            Some(DiagnosisEvent {
                patient_id: row.eid,
                code: code.clone(),
                date: row.date_icd10?,
                source: DiagnosisSource::Icd10,
            })
        });
        Diagnoses {
            els: registry.chain(icd9).chain(icd10).collect(),
        }
    }

    /// The first CRC diagnosis for each patient, ordered by patient ID.
    ///
    /// Ties on date go to the earlier source.
    pub fn earliest_per_patient(&self) -> Vec<DiagnosisEvent> {
        let mut els = self.els.clone();
        // stable, so equal (patient, date) pairs keep source order
        els.sort_by_key(|evt| (evt.patient_id, evt.date));
        els.dedup_by_key(|evt| evt.patient_id);
        els
    }
}

impl Deref for Diagnoses {
    type Target = [DiagnosisEvent];
    fn deref(&self) -> &Self::Target {
        &self.els
    }
}

// Deaths

/// What the death registry tells us about one CRC patient.
#[derive(Debug, Clone, PartialEq)]
pub struct DeathSummary {
    pub patient_id: PatientId,
    /// Any of the recorded causes is CRC.
    pub crc_death: bool,
    /// `None` if the registry gives more than one date of death. We don't know which is right,
    /// so we don't pick one.
    pub date_death: Option<NaiveDate>,
    /// All recorded causes, joined with '+'.
    pub icd10_death: String,
}

/// Collapse the death registry to one row per patient, for patients in `patients`.
///
/// Rows missing a date or a cause are ignored. Ordered by patient ID.
pub fn summarize_deaths(deaths: &[DeathRaw], patients: &BTreeSet<PatientId>) -> Vec<DeathSummary> {
    let mut by_patient: BTreeMap<PatientId, Vec<(NaiveDate, &str)>> = BTreeMap::new();
    for row in deaths {
        if !patients.contains(&row.eid) {
            continue;
        }
        let (Some(date), Some(cause)) = (row.date_death, row.icd10.as_deref()) else {
            continue;
        };
        by_patient.entry(row.eid).or_default().push((date, cause));
    }

    by_patient
        .into_iter()
        .map(|(patient_id, records)| {
            let dates = records.iter().map(|(date, _)| *date).collect::<BTreeSet<_>>();
            let date_death = if dates.len() == 1 {
                dates.into_iter().next()
            } else {
                event!(
                    Level::DEBUG,
                    "patient {} has {} different dates of death",
                    patient_id,
                    dates.len()
                );
                None
            };
            DeathSummary {
                patient_id,
                crc_death: records.iter().any(|(_, cause)| is_crc_icd10_code(cause)),
                date_death,
                icd10_death: records.iter().map(|(_, cause)| cause).join("+"),
            }
        })
        .collect()
}

// Survival

/// A row of `ukb_survival_data.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UkbSurvival {
    pub eid: PatientId,
    pub crc_diagnosis: String,
    pub date_crc_diagnosis: NaiveDate,
    #[serde(serialize_with = "optional_bool_01")]
    pub crc_death: Option<bool>,
    pub date_death: Option<NaiveDate>,
    pub icd10_death: Option<String>,
    pub date_last_fu: NaiveDate,
    #[serde(serialize_with = "bool_01")]
    pub os: bool,
    pub os_time: i64,
    #[serde(serialize_with = "bool_01")]
    pub css: bool,
    pub css_time: i64,
    pub os_1yr: HorizonLabel,
    pub os_3yr: HorizonLabel,
    pub os_5yr: HorizonLabel,
    pub css_1yr: HorizonLabel,
    pub css_3yr: HorizonLabel,
    pub css_5yr: HorizonLabel,
}

impl Columns for UkbSurvival {
    const COLUMNS: &'static [&'static str] = &[
        "eid",
        "crc_diagnosis",
        "date_crc_diagnosis",
        "crc_death",
        "date_death",
        "icd10_death",
        "date_last_fu",
        "os",
        "os_time",
        "css",
        "css_time",
        "os_1yr",
        "os_3yr",
        "os_5yr",
        "css_1yr",
        "css_3yr",
        "css_5yr",
    ];
}

impl UkbSurvival {
    pub fn derive(diagnosis: &DiagnosisEvent, death: Option<&DeathSummary>) -> Self {
        let date_death = death.and_then(|d| d.date_death);
        let date_last_fu = date_death.unwrap_or_else(administrative_censoring_date);
        let start = Some(diagnosis.date);
        let os = OutcomeAxis::new(
            Outcome::Os,
            start,
            Some(date_last_fu),
            Some(date_death.is_some()),
        );
        let css = OutcomeAxis::new(
            Outcome::Css,
            start,
            Some(date_last_fu),
            Some(death.map_or(false, |d| d.crc_death)),
        );
        let os_labels = os.labels();
        let css_labels = css.labels();
        let time = (date_last_fu - diagnosis.date).num_days();
        Self {
            eid: diagnosis.patient_id,
            crc_diagnosis: diagnosis.code.clone(),
            date_crc_diagnosis: diagnosis.date,
            crc_death: death.map(|d| d.crc_death),
            date_death,
            icd10_death: death.map(|d| d.icd10_death.clone()),
            date_last_fu,
            os: os.event == Some(true),
            os_time: time,
            css: css.event == Some(true),
            css_time: time,
            os_1yr: os_labels.yr1,
            os_3yr: os_labels.yr3,
            os_5yr: os_labels.yr5,
            css_1yr: css_labels.yr1,
            css_3yr: css_labels.yr3,
            css_5yr: css_labels.yr5,
        }
    }

    pub fn os_axis(&self) -> OutcomeAxis {
        OutcomeAxis::new(
            Outcome::Os,
            Some(self.date_crc_diagnosis),
            Some(self.date_last_fu),
            Some(self.os),
        )
    }

    pub fn css_axis(&self) -> OutcomeAxis {
        OutcomeAxis::new(
            Outcome::Css,
            Some(self.date_crc_diagnosis),
            Some(self.date_last_fu),
            Some(self.css),
        )
    }
}

/// Build the survival table: one row per CRC patient, ordered by ID.
///
/// Fails if any follow-up time is negative.
pub fn survival(sources: &UkbSources) -> Result<Vec<UkbSurvival>> {
    let diagnoses = Diagnoses::from_sources(&sources.registry, &sources.icd9, &sources.icd10);
    let first = diagnoses.earliest_per_patient();
    event!(
        Level::INFO,
        "{} dated CRC diagnoses for {} patients",
        diagnoses.len(),
        first.len()
    );

    let patients = first.iter().map(|d| d.patient_id).collect::<BTreeSet<_>>();
    let deaths = summarize_deaths(&sources.deaths, &patients);
    event!(Level::INFO, "{} CRC patients have a death record", deaths.len());

    let rows: Vec<UkbSurvival> = left_join_one_to_one(
        Keyed::new("CRC diagnoses", &first, |d: &DiagnosisEvent| d.patient_id),
        Keyed::new("deaths", &deaths, |d: &DeathSummary| d.patient_id),
    )?
    .into_iter()
    .map(|(diagnosis, death)| UkbSurvival::derive(diagnosis, death))
    .collect();

    let os = rows.iter().map(|r| (r.eid, r.os_axis())).collect::<Vec<_>>();
    check_all(os.iter().map(|(eid, axis)| (*eid, axis)))?;
    let css = rows.iter().map(|r| (r.eid, r.css_axis())).collect::<Vec<_>>();
    check_all(css.iter().map(|(eid, axis)| (*eid, axis)))?;
    Ok(rows)
}

// Assessment centre data

/// Covariates from the assessment centre visit, for patients in the survival table.
#[derive(Debug, Clone, PartialEq)]
pub struct UkbExtra {
    pub eid: PatientId,
    pub platelet_count: f64,
    pub platelet_count_acquisition_time: NaiveDate,
    pub date_of_attending_assessment_centre: NaiveDate,
    pub age_when_attended_assessment_centre: Option<f64>,
    pub sex: Option<Sex>,
    pub ethnic_background: Option<Ethnicity>,
    pub smoking_status: Option<Exposure>,
    pub alcohol_drinker_status: Option<Exposure>,
    pub body_mass_index: Option<f64>,
    pub plt_300: YesNo,
    pub plt_400: YesNo,
    pub test_lag_days: i64,
}

/// Keep visits for patients in `survival` that have a platelet count taken in the week after
/// the visit, and decode their categorical fields.
///
/// Fails on a categorical code we have no mapping for.
pub fn extra(visits: &[InitialVisitRaw], survival: &[UkbSurvival]) -> Result<Vec<UkbExtra>> {
    let patients = survival.iter().map(|s| s.eid).collect::<BTreeSet<_>>();
    let mut out = vec![];
    for visit in visits {
        if !patients.contains(&visit.eid) {
            continue;
        }
        let Some(platelet_count) = visit.platelet_count else {
            continue;
        };
        let (Some(acquired), Some(attended)) = (
            visit.platelet_count_acquisition_time,
            visit.date_of_attending_assessment_centre,
        ) else {
            continue;
        };
        let test_lag_days = (acquired - attended).num_days();
        if !(0..MAX_TEST_LAG_DAYS).contains(&test_lag_days) {
            continue;
        }
        out.push(UkbExtra {
            eid: visit.eid,
            platelet_count,
            platelet_count_acquisition_time: acquired,
            date_of_attending_assessment_centre: attended,
            age_when_attended_assessment_centre: visit.age_when_attended_assessment_centre,
            sex: Sex::from_ukb(visit.sex)?,
            ethnic_background: Ethnicity::from_ukb(visit.ethnic_background)?,
            smoking_status: Exposure::from_ukb("smoking_status", visit.smoking_status)?,
            alcohol_drinker_status: Exposure::from_ukb(
                "alcohol_drinker_status",
                visit.alcohol_drinker_status,
            )?,
            body_mass_index: visit.body_mass_index,
            plt_300: YesNo::above(platelet_count, 300.),
            plt_400: YesNo::above(platelet_count, 400.),
            test_lag_days,
        });
    }
    event!(
        Level::INFO,
        "{} of {} CRC patients have a usable platelet count",
        out.len(),
        patients.len()
    );
    Ok(out)
}

/// A row of `ukb_all_data.csv`: survival and covariates together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UkbAll {
    pub eid: PatientId,
    pub crc_diagnosis: String,
    pub date_crc_diagnosis: NaiveDate,
    #[serde(serialize_with = "optional_bool_01")]
    pub crc_death: Option<bool>,
    pub date_death: Option<NaiveDate>,
    pub icd10_death: Option<String>,
    pub date_last_fu: NaiveDate,
    #[serde(serialize_with = "bool_01")]
    pub os: bool,
    pub os_time: i64,
    #[serde(serialize_with = "bool_01")]
    pub css: bool,
    pub css_time: i64,
    pub os_1yr: HorizonLabel,
    pub os_3yr: HorizonLabel,
    pub os_5yr: HorizonLabel,
    pub css_1yr: HorizonLabel,
    pub css_3yr: HorizonLabel,
    pub css_5yr: HorizonLabel,
    #[serde(serialize_with = "whole_number")]
    pub platelet_count: f64,
    pub platelet_count_acquisition_time: NaiveDate,
    pub date_of_attending_assessment_centre: NaiveDate,
    #[serde(serialize_with = "optional_whole_number")]
    pub age_when_attended_assessment_centre: Option<f64>,
    pub sex: Option<Sex>,
    pub ethnic_background: Option<Ethnicity>,
    pub smoking_status: Option<Exposure>,
    pub alcohol_drinker_status: Option<Exposure>,
    pub body_mass_index: Option<f64>,
    pub plt_300: YesNo,
    pub plt_400: YesNo,
    pub test_lag_days: i64,
    /// Days from the assessment centre visit to CRC diagnosis.
    pub diagnostic_lag_time: i64,
    pub age_at_diagnosis: Option<f64>,
}

impl Columns for UkbAll {
    const COLUMNS: &'static [&'static str] = &[
        "eid",
        "crc_diagnosis",
        "date_crc_diagnosis",
        "crc_death",
        "date_death",
        "icd10_death",
        "date_last_fu",
        "os",
        "os_time",
        "css",
        "css_time",
        "os_1yr",
        "os_3yr",
        "os_5yr",
        "css_1yr",
        "css_3yr",
        "css_5yr",
        "platelet_count",
        "platelet_count_acquisition_time",
        "date_of_attending_assessment_centre",
        "age_when_attended_assessment_centre",
        "sex",
        "ethnic_background",
        "smoking_status",
        "alcohol_drinker_status",
        "body_mass_index",
        "plt_300",
        "plt_400",
        "test_lag_days",
        "diagnostic_lag_time",
        "age_at_diagnosis",
    ];
}

impl UkbAll {
    fn new(surv: &UkbSurvival, extra: &UkbExtra, diagnostic_lag_time: i64) -> Self {
        let age_at_diagnosis = extra
            .age_when_attended_assessment_centre
            .map(|age| age + diagnostic_lag_time as f64 / DAYS_PER_YEAR);
        Self {
            eid: surv.eid,
            crc_diagnosis: surv.crc_diagnosis.clone(),
            date_crc_diagnosis: surv.date_crc_diagnosis,
            crc_death: surv.crc_death,
            date_death: surv.date_death,
            icd10_death: surv.icd10_death.clone(),
            date_last_fu: surv.date_last_fu,
            os: surv.os,
            os_time: surv.os_time,
            css: surv.css,
            css_time: surv.css_time,
            os_1yr: surv.os_1yr,
            os_3yr: surv.os_3yr,
            os_5yr: surv.os_5yr,
            css_1yr: surv.css_1yr,
            css_3yr: surv.css_3yr,
            css_5yr: surv.css_5yr,
            platelet_count: extra.platelet_count,
            platelet_count_acquisition_time: extra.platelet_count_acquisition_time,
            date_of_attending_assessment_centre: extra.date_of_attending_assessment_centre,
            age_when_attended_assessment_centre: extra.age_when_attended_assessment_centre,
            sex: extra.sex,
            ethnic_background: extra.ethnic_background,
            smoking_status: extra.smoking_status,
            alcohol_drinker_status: extra.alcohol_drinker_status,
            body_mass_index: extra.body_mass_index,
            plt_300: extra.plt_300,
            plt_400: extra.plt_400,
            test_lag_days: extra.test_lag_days,
            diagnostic_lag_time,
            age_at_diagnosis,
        }
    }
}

/// Join survival to covariates, keeping patients diagnosed on or after their assessment centre
/// visit.
pub fn merge(survival: &[UkbSurvival], extra: &[UkbExtra]) -> Result<Vec<UkbAll>> {
    let joined = inner_join_one_to_one(
        Keyed::new("survival data", survival, |s: &UkbSurvival| s.eid),
        Keyed::new("assessment centre data", extra, |e: &UkbExtra| e.eid),
    )?;
    let rows: Vec<UkbAll> = joined
        .into_iter()
        .filter_map(|(surv, extra)| {
            let lag = elapsed_days(
                Some(extra.date_of_attending_assessment_centre),
                Some(surv.date_crc_diagnosis),
            )?;
            (lag >= 0).then(|| UkbAll::new(surv, extra, lag))
        })
        .collect();
    event!(
        Level::INFO,
        "{} patients diagnosed after their assessment centre visit",
        rows.len()
    );
    Ok(rows)
}

/// A row of `ukb_data.csv`, the columns used in the analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UkbData {
    pub eid: PatientId,
    pub age_at_diagnosis: Option<f64>,
    pub sex: Option<Sex>,
    pub body_mass_index: Option<f64>,
    pub ethnic_background: Option<Ethnicity>,
    pub smoking_status: Option<Exposure>,
    pub alcohol_drinker_status: Option<Exposure>,
    pub diagnostic_lag_time: i64,
    #[serde(serialize_with = "whole_number")]
    pub platelet_count: f64,
    pub plt_300: YesNo,
    pub plt_400: YesNo,
    #[serde(serialize_with = "bool_01")]
    pub os: bool,
    pub os_time: i64,
    pub os_1yr: HorizonLabel,
    pub os_3yr: HorizonLabel,
    pub os_5yr: HorizonLabel,
    #[serde(serialize_with = "bool_01")]
    pub css: bool,
    pub css_time: i64,
    pub css_1yr: HorizonLabel,
    pub css_3yr: HorizonLabel,
    pub css_5yr: HorizonLabel,
}

impl Columns for UkbData {
    const COLUMNS: &'static [&'static str] = &[
        "eid",
        "age_at_diagnosis",
        "sex",
        "body_mass_index",
        "ethnic_background",
        "smoking_status",
        "alcohol_drinker_status",
        "diagnostic_lag_time",
        "platelet_count",
        "plt_300",
        "plt_400",
        "os",
        "os_time",
        "os_1yr",
        "os_3yr",
        "os_5yr",
        "css",
        "css_time",
        "css_1yr",
        "css_3yr",
        "css_5yr",
    ];
}

impl From<&UkbAll> for UkbData {
    fn from(from: &UkbAll) -> Self {
        Self {
            eid: from.eid,
            age_at_diagnosis: from.age_at_diagnosis,
            sex: from.sex,
            body_mass_index: from.body_mass_index,
            ethnic_background: from.ethnic_background,
            smoking_status: from.smoking_status,
            alcohol_drinker_status: from.alcohol_drinker_status,
            diagnostic_lag_time: from.diagnostic_lag_time,
            platelet_count: from.platelet_count,
            plt_300: from.plt_300,
            plt_400: from.plt_400,
            os: from.os,
            os_time: from.os_time,
            os_1yr: from.os_1yr,
            os_3yr: from.os_3yr,
            os_5yr: from.os_5yr,
            css: from.css,
            css_time: from.css_time,
            css_1yr: from.css_1yr,
            css_3yr: from.css_3yr,
            css_5yr: from.css_5yr,
        }
    }
}

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct UkbResults {
    pub survival: Vec<UkbSurvival>,
    pub all: Vec<UkbAll>,
    pub data: Vec<UkbData>,
}

impl UkbResults {
    pub fn output_files(&self) -> Result<OutputFiles> {
        let mut files = OutputFiles::new();
        files.push(SURVIVAL_OUTPUT, &self.survival)?;
        files.push(ALL_OUTPUT, &self.all)?;
        files.push(DATA_OUTPUT, &self.data)?;
        Ok(files)
    }

    /// The OS and CSS axes of every patient in the survival table.
    pub fn axes(&self) -> [(Outcome, Vec<OutcomeAxis>); 2] {
        [
            (
                Outcome::Os,
                self.survival.iter().map(UkbSurvival::os_axis).collect(),
            ),
            (
                Outcome::Css,
                self.survival.iter().map(UkbSurvival::css_axis).collect(),
            ),
        ]
    }
}

/// Run the whole UK Biobank pipeline in memory.
pub fn run(sources: &UkbSources) -> Result<UkbResults> {
    let survival = survival(sources)?;
    let extra = extra(&sources.initial_visit, &survival)?;
    let all = merge(&survival, &extra)?;
    let data = all.iter().map(UkbData::from).collect();
    Ok(UkbResults {
        survival,
        all,
        data,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{error::PipelineError, read_orig};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sources() -> UkbSources {
        UkbSources {
            registry: read_orig(
                "eid,date_of_cancer_diagnosis,type_of_cancer_icd9,type_of_cancer_icd10\n\
                 1,2019-05-01,,C180\n\
                 2,2020-01-01,,C187\n\
                 3,2015-03-03,,C50\n\
                 4,,,C20\n\
                 5,2010-06-01,1534,\n"
                    .as_bytes(),
            )
            .unwrap(),
            icd9: read_orig("eid,diagnoses_icd9,date_icd9\n5,1530,2012-01-01\n6,1530,NA\n".as_bytes())
                .unwrap(),
            icd10: read_orig(
                "eid,diagnosis_icd10,date_icd10\n1,C189,2018-11-20\n1,C20,\n4,C21,2021-02-01\n"
                    .as_bytes(),
            )
            .unwrap(),
            deaths: read_orig(
                "eid,date_death,icd10\n\
                 2,2021-01-01,C187\n\
                 2,2021-01-01,I10\n\
                 4,2022-01-01,I21\n\
                 4,2022-02-01,C20\n\
                 5,2011-01-01,I10\n\
                 3,2016-01-01,C50\n"
                    .as_bytes(),
            )
            .unwrap(),
            initial_visit: read_orig(
                "eid,platelet_count,platelet_count_acquisition_time,date_of_attending_assessment_centre,\
                 age_when_attended_assessment_centre,sex,ethnic_background,smoking_status,\
                 alcohol_drinker_status,body_mass_index\n\
                 1,250,2010-01-02T10:00:00,2010-01-01,60,0,1001,1,0,24.5\n\
                 2,410,2010-01-01T00:00:00,2010-01-01,55,1,-1,2,2,\n\
                 4,NA,2010-01-01T00:00:00,2010-01-01,50,1,1,0,0,30\n\
                 5,320,2010-01-09T00:00:00,2010-01-01,70,1,1,0,0,30\n"
                    .as_bytes(),
            )
            .unwrap(),
        }
    }

    #[test]
    fn earliest_diagnosis_wins() {
        let s = sources();
        let diagnoses = Diagnoses::from_sources(&s.registry, &s.icd9, &s.icd10);
        // the null-dated and non-CRC rows are gone
        assert_eq!(diagnoses.len(), 6);
        let first = diagnoses.earliest_per_patient();
        let ids = first.iter().map(|d| d.patient_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 4, 5]);
        assert_eq!(first[0].date, date(2018, 11, 20));
        assert_eq!(first[0].code, "C189");
        assert_eq!(first[0].source, DiagnosisSource::Icd10);
        assert_eq!(first[3].date, date(2010, 6, 1));
        assert_eq!(first[3].code, "1534");
    }

    #[test]
    fn same_day_ties_keep_source_order() {
        let registry = read_orig::<RegistryRaw>(
            "eid,date_of_cancer_diagnosis,type_of_cancer_icd9,type_of_cancer_icd10\n\
             7,2019-01-01,,C18\n"
                .as_bytes(),
        )
        .unwrap();
        let icd10 =
            read_orig::<Icd10Raw>("eid,diagnosis_icd10,date_icd10\n7,C20,2019-01-01\n".as_bytes())
                .unwrap();
        let first = Diagnoses::from_sources(&registry, &[], &icd10).earliest_per_patient();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].source, DiagnosisSource::Registry);
    }

    #[test]
    fn registry_prefers_icd10_code() {
        let registry = read_orig::<RegistryRaw>(
            "eid,date_of_cancer_diagnosis,type_of_cancer_icd9,type_of_cancer_icd10\n\
             8,2019-01-01,1539,C189\n"
                .as_bytes(),
        )
        .unwrap();
        let first = Diagnoses::from_sources(&registry, &[], &[]).earliest_per_patient();
        assert_eq!(first[0].code, "C189");
    }

    #[test]
    fn conflicting_death_dates_are_unknown() {
        let s = sources();
        let patients = BTreeSet::from([1, 2, 4, 5]);
        let deaths = summarize_deaths(&s.deaths, &patients);
        // patient 3 isn't a CRC patient
        assert_eq!(deaths.len(), 3);

        assert_eq!(deaths[0].patient_id, 2);
        assert!(deaths[0].crc_death);
        assert_eq!(deaths[0].date_death, Some(date(2021, 1, 1)));
        assert_eq!(deaths[0].icd10_death, "C187+I10");

        assert_eq!(deaths[1].patient_id, 4);
        assert!(deaths[1].crc_death);
        assert_eq!(deaths[1].date_death, None);

        assert_eq!(deaths[2].patient_id, 5);
        assert!(!deaths[2].crc_death);
    }

    #[test]
    fn survival_rows() {
        let rows = survival(&sources()).unwrap();
        assert_eq!(rows.len(), 4);

        // alive: censored at 2023-01-01
        let alive = &rows[0];
        assert_eq!(alive.eid, 1);
        assert!(!alive.os);
        assert_eq!(alive.crc_death, None);
        assert_eq!(alive.date_last_fu, administrative_censoring_date());
        assert_eq!(alive.os_time, (date(2023, 1, 1) - date(2018, 11, 20)).num_days());
        assert_eq!(alive.os_time, alive.css_time);
        assert_eq!(alive.os_1yr, HorizonLabel::Censored);
        assert_eq!(alive.os_5yr, HorizonLabel::Missing);

        // died of CRC 366 days after diagnosis
        let died = &rows[1];
        assert!(died.os);
        assert!(died.css);
        assert_eq!(died.os_time, 366);
        assert_eq!(died.os_1yr, HorizonLabel::Censored);
        assert_eq!(died.os_3yr, HorizonLabel::Event);
        assert_eq!(died.css_5yr, HorizonLabel::Event);

        // two death dates: treated as alive for OS, but the cause is still CRC
        let ambiguous = &rows[2];
        assert_eq!(ambiguous.date_death, None);
        assert!(!ambiguous.os);
        assert!(ambiguous.css);
        assert_eq!(ambiguous.date_last_fu, administrative_censoring_date());
    }

    #[test]
    fn death_before_diagnosis_aborts() {
        let mut s = sources();
        // patient 5 now has a single death date, before the 2010-06-01 diagnosis
        s.deaths.retain(|d| d.eid == 5);
        s.deaths[0].date_death = Some(date(2009, 1, 1));
        let err = survival(&s).unwrap_err();
        match err.downcast_ref::<PipelineError>() {
            Some(PipelineError::NegativeTime { outcome, patient, .. }) => {
                assert_eq!(*outcome, Outcome::Os);
                assert_eq!(patient, "5");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn platelet_window() {
        let s = sources();
        let surv = survival(&s).unwrap();
        let extra = extra(&s.initial_visit, &surv).unwrap();
        // 4 has no count, 5 was tested 8 days late
        let ids = extra.iter().map(|e| e.eid).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(extra[0].test_lag_days, 1);
        assert_eq!(extra[0].sex, Some(Sex::Female));
        assert_eq!(extra[0].smoking_status, Some(Exposure::Ever));
        assert_eq!(extra[0].plt_300, YesNo::No);
        assert_eq!(extra[1].ethnic_background, None);
        assert_eq!(extra[1].plt_300, YesNo::Yes);
        assert_eq!(extra[1].plt_400, YesNo::Yes);
    }

    #[test]
    fn unmapped_codes_abort() {
        let mut s = sources();
        s.initial_visit[0].sex = Some(9);
        let surv = survival(&s).unwrap();
        let err = extra(&s.initial_visit, &surv).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnmappedValue { column: "sex", value: 9 })
        ));
    }

    #[test]
    fn unmapped_codes_in_dropped_rows_are_ignored() {
        let mut s = sources();
        // patient 4 is dropped for having no platelet count
        s.initial_visit[2].ethnic_background = Some(12345);
        let surv = survival(&s).unwrap();
        assert!(extra(&s.initial_visit, &surv).is_ok());
    }

    #[test]
    fn merged_rows() {
        let results = run(&sources()).unwrap();
        assert_eq!(results.survival.len(), 4);
        assert_eq!(results.all.len(), 2);
        let first = &results.all[0];
        assert_eq!(first.eid, 1);
        assert_eq!(first.diagnostic_lag_time, (date(2018, 11, 20) - date(2010, 1, 1)).num_days());
        let age = first.age_at_diagnosis.unwrap();
        assert!((age - (60. + first.diagnostic_lag_time as f64 / 365.25)).abs() < 1e-9);
        assert_eq!(results.data[1].eid, 2);
    }

    #[test]
    fn diagnosis_before_visit_is_dropped() {
        let mut s = sources();
        s.initial_visit[0].date_of_attending_assessment_centre = Some(date(2019, 1, 1));
        s.initial_visit[0].platelet_count_acquisition_time = Some(date(2019, 1, 1));
        let results = run(&s).unwrap();
        let ids = results.all.iter().map(|r| r.eid).collect::<Vec<_>>();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn duplicate_visits_abort() {
        let mut s = sources();
        let dup = s.initial_visit[0].clone();
        s.initial_visit.push(dup);
        let err = run(&s).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn column_lists_match_serialization() {
        fn header_of<T: Serialize>(row: &T) -> String {
            let mut out = csv::Writer::from_writer(vec![]);
            out.serialize(row).unwrap();
            let text = String::from_utf8(out.into_inner().unwrap()).unwrap();
            text.lines().next().unwrap().to_owned()
        }
        let results = run(&sources()).unwrap();
        assert_eq!(
            header_of(&results.survival[0]),
            UkbSurvival::COLUMNS.join(",")
        );
        assert_eq!(header_of(&results.all[0]), UkbAll::COLUMNS.join(","));
        assert_eq!(header_of(&results.data[0]), UkbData::COLUMNS.join(","));
    }

    #[test]
    fn survival_csv() {
        let results = run(&sources()).unwrap();
        let files = results.output_files().unwrap();
        let text = String::from_utf8(files.get(SURVIVAL_OUTPUT).unwrap().to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), UkbSurvival::COLUMNS.join(","));
        assert_eq!(
            lines.nth(1).unwrap(),
            "2,C187,2020-01-01,1,2021-01-01,C187+I10,2021-01-01,1,366,1,366,0,1,1,0,1,1"
        );
    }
}
