//! West China Hospital cohort.
//!
//! Patient records come from a hand-maintained CSV export. Dates in it are free text (see
//! [`partial_date`](crate::partial_date)), and the event flags were filled in by clinicians, so
//! we trust them as given. Covariates live in a separate spreadsheet keyed by hospital register
//! number.
//!
//! Three outcomes are derived. OS and CSS are measured from surgery, or from diagnosis for
//! patients who had no surgery. DFS only makes sense after surgery, so it is measured from the
//! surgery date and is missing for everyone else.
use crate::{
    categories::{Exposure, Sex, YesNo},
    horizon::{HorizonLabel, HorizonLabels},
    join::{inner_join_one_to_one, Keyed},
    load_orig,
    outcome::{check_all, Outcome, OutcomeAxis},
    partial_date::reconstruct_opt,
    util::{
        optional_bool_01, optional_flag, optional_float, optional_int, optional_string,
        optional_whole_number,
    },
    Columns, OutputFiles, Paths, Result,
};
use calamine::{DataType, Reader, Xlsx};
use chrono::NaiveDate;
use qu::ick_use::*;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, path::Path};

pub const RECORDS_FILE: &str = "raw_data_with_comments_241121.csv";
pub const WORKBOOK_FILE: &str = "a名单总表20241121.xlsx";

pub const SURVIVAL_OUTPUT: &str = "hx_survival_data.csv";
pub const FULL_OUTPUT: &str = "hx_full_data.csv";
pub const DATA_OUTPUT: &str = "hx_data.csv";

/// Row of the worksheet holding the column names. Row 0 is a title.
pub const WORKBOOK_HEADER_ROW: u32 = 1;

/// Spreadsheet columns we use, and what we call them.
pub const WORKBOOK_COLUMNS: [(&str, &str); 7] = [
    ("登记号", "register"),
    ("身高/cm", "height_cm"),
    ("体重/kg", "weight_kg"),
    ("抽烟", "smoking"),
    ("喝酒", "alcohol"),
    ("新辅助治疗", "neo_adjuvant_therapy"),
    ("血小板", "platelet_count"),
];

/// A row of the patient records export.
#[derive(Debug, Clone, Deserialize)]
pub struct HxRecordRaw {
    #[serde(deserialize_with = "optional_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "optional_string")]
    pub register: Option<String>,
    #[serde(deserialize_with = "optional_int")]
    pub inclusion: Option<i64>,
    #[serde(deserialize_with = "optional_float")]
    pub age: Option<f64>,
    #[serde(deserialize_with = "optional_int")]
    pub sex: Option<i64>,
    #[serde(deserialize_with = "optional_string")]
    pub p_stage: Option<String>,
    #[serde(deserialize_with = "optional_string")]
    pub c_stage: Option<String>,
    #[serde(deserialize_with = "optional_string")]
    pub surgery_date: Option<String>,
    #[serde(deserialize_with = "optional_string")]
    pub diagnosis_date_for_nonsurgery: Option<String>,
    #[serde(deserialize_with = "optional_string")]
    pub last_fu_date: Option<String>,
    #[serde(deserialize_with = "optional_string")]
    pub death_date: Option<String>,
    #[serde(deserialize_with = "optional_string")]
    pub local_recurrence_date: Option<String>,
    #[serde(deserialize_with = "optional_string")]
    pub metastasis_date: Option<String>,
    #[serde(deserialize_with = "optional_string")]
    pub last_radio_date: Option<String>,
    #[serde(deserialize_with = "optional_flag")]
    pub death: Option<bool>,
    #[serde(deserialize_with = "optional_flag")]
    pub death_by_crc: Option<bool>,
    #[serde(deserialize_with = "optional_flag")]
    pub local_recurrence: Option<bool>,
    #[serde(deserialize_with = "optional_flag")]
    pub metastasis: Option<bool>,
}

impl HxRecordRaw {
    pub fn is_included(&self) -> bool {
        self.inclusion == Some(1)
    }
}

/// The record dates, after reconstruction.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct HxDates {
    pub surgery: Option<NaiveDate>,
    pub nonsurgery_diagnosis: Option<NaiveDate>,
    pub last_fu: Option<NaiveDate>,
    pub death: Option<NaiveDate>,
    pub local_recurrence: Option<NaiveDate>,
    pub metastasis: Option<NaiveDate>,
    pub last_radio: Option<NaiveDate>,
}

impl HxDates {
    pub fn from_raw(raw: &HxRecordRaw) -> Self {
        Self {
            surgery: reconstruct_opt(raw.surgery_date.as_deref()),
            nonsurgery_diagnosis: reconstruct_opt(raw.diagnosis_date_for_nonsurgery.as_deref()),
            last_fu: reconstruct_opt(raw.last_fu_date.as_deref()),
            death: reconstruct_opt(raw.death_date.as_deref()),
            local_recurrence: reconstruct_opt(raw.local_recurrence_date.as_deref()),
            metastasis: reconstruct_opt(raw.metastasis_date.as_deref()),
            last_radio: reconstruct_opt(raw.last_radio_date.as_deref()),
        }
    }

    /// Start of follow-up for OS and CSS.
    pub fn start_os_css(&self) -> Option<NaiveDate> {
        self.surgery.or(self.nonsurgery_diagnosis)
    }
}

fn latest(dates: impl IntoIterator<Item = Option<NaiveDate>>) -> Option<NaiveDate> {
    dates.into_iter().flatten().max()
}

fn earliest(dates: impl IntoIterator<Item = Option<NaiveDate>>) -> Option<NaiveDate> {
    dates.into_iter().flatten().min()
}

/// The DFS event: CRC death, local recurrence or metastasis after surgery.
///
/// `None` without surgery. Otherwise any positive flag is an event, and all three must be known
/// negative for a non-event.
///
/// `had_surgery` means a surgery date was recorded at all, even one too vague to reconstruct.
/// Such patients still get a flag, but no DFS time.
pub fn dfs_event(
    had_surgery: bool,
    death_by_crc: Option<bool>,
    local_recurrence: Option<bool>,
    metastasis: Option<bool>,
) -> Option<bool> {
    if !had_surgery {
        return None;
    }
    let flags = [death_by_crc, local_recurrence, metastasis];
    if flags.contains(&Some(true)) {
        Some(true)
    } else if flags.iter().all(|flag| *flag == Some(false)) {
        Some(false)
    } else {
        None
    }
}

/// OS ends at death, or at the last contact of any kind.
pub fn os_axis(dates: &HxDates, death: Option<bool>) -> OutcomeAxis {
    let end = match death {
        Some(true) => dates.death,
        Some(false) => latest([dates.last_fu, dates.last_radio]),
        None => None,
    };
    OutcomeAxis::new(Outcome::Os, dates.start_os_css(), end, death)
}

/// CSS ends at CRC death. Other deaths censor, so the death date counts as a last contact.
pub fn css_axis(dates: &HxDates, death_by_crc: Option<bool>) -> OutcomeAxis {
    let end = match death_by_crc {
        Some(true) => dates.death,
        Some(false) => latest([dates.last_fu, dates.last_radio, dates.death]),
        None => None,
    };
    OutcomeAxis::new(Outcome::Css, dates.start_os_css(), end, death_by_crc)
}

/// DFS ends at the first qualifying event. Non-events are censored at the last radiology test;
/// phone follow-up can't detect recurrence, so the last follow-up date doesn't count.
pub fn dfs_axis(dates: &HxDates, dfs: Option<bool>) -> OutcomeAxis {
    let end = match dfs {
        Some(true) => earliest([dates.death, dates.local_recurrence, dates.metastasis]),
        Some(false) => dates.last_radio,
        None => None,
    };
    OutcomeAxis::new(Outcome::Dfs, dates.surgery, end, dfs)
}

/// A row of `hx_survival_data.csv`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HxSurvival {
    pub id: Option<String>,
    pub register: Option<String>,
    pub inclusion: Option<i64>,
    #[serde(serialize_with = "optional_whole_number")]
    pub age: Option<f64>,
    pub sex: Option<Sex>,
    pub p_stage: Option<String>,
    pub c_stage: Option<String>,
    pub stage: Option<String>,
    pub surgery_date: Option<NaiveDate>,
    pub diagnosis_date_for_nonsurgery: Option<NaiveDate>,
    pub last_fu_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub local_recurrence_date: Option<NaiveDate>,
    pub metastasis_date: Option<NaiveDate>,
    pub last_radio_date: Option<NaiveDate>,
    #[serde(serialize_with = "optional_bool_01")]
    pub death: Option<bool>,
    #[serde(serialize_with = "optional_bool_01")]
    pub death_by_crc: Option<bool>,
    #[serde(serialize_with = "optional_bool_01")]
    pub local_recurrence: Option<bool>,
    #[serde(serialize_with = "optional_bool_01")]
    pub metastasis: Option<bool>,
    #[serde(serialize_with = "optional_bool_01")]
    pub os: Option<bool>,
    #[serde(serialize_with = "optional_bool_01")]
    pub css: Option<bool>,
    #[serde(serialize_with = "optional_bool_01")]
    pub dfs: Option<bool>,
    pub start_fu_date_os_css: Option<NaiveDate>,
    pub end_fu_date_os: Option<NaiveDate>,
    pub end_fu_date_css: Option<NaiveDate>,
    pub end_fu_date_dfs: Option<NaiveDate>,
    pub os_time: Option<i64>,
    pub css_time: Option<i64>,
    pub dfs_time: Option<i64>,
    pub os_1yr: HorizonLabel,
    pub os_3yr: HorizonLabel,
    pub os_5yr: HorizonLabel,
    pub css_1yr: HorizonLabel,
    pub css_3yr: HorizonLabel,
    pub css_5yr: HorizonLabel,
    pub dfs_1yr: HorizonLabel,
    pub dfs_3yr: HorizonLabel,
    pub dfs_5yr: HorizonLabel,
}

impl Columns for HxSurvival {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "register",
        "inclusion",
        "age",
        "sex",
        "p_stage",
        "c_stage",
        "stage",
        "surgery_date",
        "diagnosis_date_for_nonsurgery",
        "last_fu_date",
        "death_date",
        "local_recurrence_date",
        "metastasis_date",
        "last_radio_date",
        "death",
        "death_by_crc",
        "local_recurrence",
        "metastasis",
        "os",
        "css",
        "dfs",
        "start_fu_date_os_css",
        "end_fu_date_os",
        "end_fu_date_css",
        "end_fu_date_dfs",
        "os_time",
        "css_time",
        "dfs_time",
        "os_1yr",
        "os_3yr",
        "os_5yr",
        "css_1yr",
        "css_3yr",
        "css_5yr",
        "dfs_1yr",
        "dfs_3yr",
        "dfs_5yr",
    ];
}

impl HxSurvival {
    pub fn derive(raw: &HxRecordRaw) -> Self {
        let dates = HxDates::from_raw(raw);
        let dfs = dfs_event(
            raw.surgery_date.is_some(),
            raw.death_by_crc,
            raw.local_recurrence,
            raw.metastasis,
        );
        let os = os_axis(&dates, raw.death);
        let css = css_axis(&dates, raw.death_by_crc);
        let dfs = dfs_axis(&dates, dfs);
        let (os_labels, css_labels, dfs_labels) = (os.labels(), css.labels(), dfs.labels());
        Self {
            id: raw.id.clone(),
            register: raw.register.clone(),
            inclusion: raw.inclusion,
            age: raw.age,
            sex: Sex::from_hx(raw.sex),
            p_stage: raw.p_stage.clone(),
            c_stage: raw.c_stage.clone(),
            stage: raw.p_stage.clone().or_else(|| raw.c_stage.clone()),
            surgery_date: dates.surgery,
            diagnosis_date_for_nonsurgery: dates.nonsurgery_diagnosis,
            last_fu_date: dates.last_fu,
            death_date: dates.death,
            local_recurrence_date: dates.local_recurrence,
            metastasis_date: dates.metastasis,
            last_radio_date: dates.last_radio,
            death: raw.death,
            death_by_crc: raw.death_by_crc,
            local_recurrence: raw.local_recurrence,
            metastasis: raw.metastasis,
            os: os.event,
            css: css.event,
            dfs: dfs.event,
            start_fu_date_os_css: dates.start_os_css(),
            end_fu_date_os: os.end,
            end_fu_date_css: css.end,
            end_fu_date_dfs: dfs.end,
            os_time: os.time,
            css_time: css.time,
            dfs_time: dfs.time,
            os_1yr: os_labels.yr1,
            os_3yr: os_labels.yr3,
            os_5yr: os_labels.yr5,
            css_1yr: css_labels.yr1,
            css_3yr: css_labels.yr3,
            css_5yr: css_labels.yr5,
            dfs_1yr: dfs_labels.yr1,
            dfs_3yr: dfs_labels.yr3,
            dfs_5yr: dfs_labels.yr5,
        }
    }

    /// How to refer to this patient in messages.
    pub fn patient(&self) -> String {
        match (&self.id, &self.register) {
            (Some(id), _) => format!("id {}", id),
            (None, Some(register)) => format!("register {}", register),
            (None, None) => "unidentified".to_owned(),
        }
    }

    pub fn os_axis(&self) -> OutcomeAxis {
        OutcomeAxis {
            outcome: Outcome::Os,
            start: self.start_fu_date_os_css,
            end: self.end_fu_date_os,
            event: self.os,
            time: self.os_time,
        }
    }

    pub fn css_axis(&self) -> OutcomeAxis {
        OutcomeAxis {
            outcome: Outcome::Css,
            start: self.start_fu_date_os_css,
            end: self.end_fu_date_css,
            event: self.css,
            time: self.css_time,
        }
    }

    pub fn dfs_axis(&self) -> OutcomeAxis {
        OutcomeAxis {
            outcome: Outcome::Dfs,
            start: self.surgery_date,
            end: self.end_fu_date_dfs,
            event: self.dfs,
            time: self.dfs_time,
        }
    }

    pub fn dfs_labels(&self) -> HorizonLabels {
        HorizonLabels {
            yr1: self.dfs_1yr,
            yr3: self.dfs_3yr,
            yr5: self.dfs_5yr,
        }
    }
}

/// Build the survival table from the included records, in source order.
///
/// Fails if any follow-up time is negative.
pub fn survival(records: &[HxRecordRaw]) -> Result<Vec<HxSurvival>> {
    let rows: Vec<HxSurvival> = records
        .iter()
        .filter(|r| r.is_included())
        .map(HxSurvival::derive)
        .collect();
    event!(
        Level::INFO,
        "{} of {} records are included CRC patients",
        rows.len(),
        records.len()
    );

    for axis in [
        HxSurvival::os_axis as fn(&HxSurvival) -> OutcomeAxis,
        HxSurvival::css_axis,
        HxSurvival::dfs_axis,
    ] {
        let axes = rows.iter().map(|r| (r.patient(), axis(r))).collect::<Vec<_>>();
        check_all(axes.iter().map(|(patient, axis)| (patient, axis)))?;
    }
    Ok(rows)
}

// Spreadsheet

/// A data row of the covariate spreadsheet, as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkbookRow {
    pub register: Option<String>,
    pub height_cm: Option<String>,
    pub weight_kg: Option<String>,
    pub smoking: Option<String>,
    pub alcohol: Option<String>,
    pub neo_adjuvant_therapy: Option<String>,
    pub platelet_count: Option<String>,
}

impl WorkbookRow {
    fn from_cells(mut cells: impl Iterator<Item = Option<String>>) -> Self {
        let mut next = || cells.next().flatten();
        Self {
            register: next(),
            height_cm: next(),
            weight_kg: next(),
            smoking: next(),
            alcohol: next(),
            neo_adjuvant_therapy: next(),
            platelet_count: next(),
        }
    }

    fn is_empty(&self) -> bool {
        *self == WorkbookRow::default()
    }
}

/// Cell contents as trimmed text. Blank cells and the literal `na` are `None`.
fn cell_text(cell: &DataType) -> Option<String> {
    let text = match cell {
        DataType::Empty => return None,
        DataType::String(s) => s.trim().to_owned(),
        other => other.to_string(),
    };
    if text.is_empty() || text == "na" {
        None
    } else {
        Some(text)
    }
}

/// Read the covariate columns out of the first worksheet.
pub fn read_sheet(sheet: &calamine::Range<DataType>) -> Result<Vec<WorkbookRow>> {
    let first_row = sheet.start().map(|(row, _)| row).unwrap_or(0);
    ensure!(
        first_row <= WORKBOOK_HEADER_ROW,
        "worksheet starts at row {}, after the header row",
        first_row
    );
    let mut rows = sheet.rows().skip((WORKBOOK_HEADER_ROW - first_row) as usize);
    let header = rows
        .next()
        .context("worksheet has no header row")?
        .iter()
        .map(cell_text)
        .collect::<Vec<_>>();
    let positions = WORKBOOK_COLUMNS
        .iter()
        .map(|(name, _)| {
            header
                .iter()
                .position(|cell| cell.as_deref() == Some(*name))
                .with_context(|| format!("worksheet has no column \"{}\"", name))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(rows
        .map(|row| {
            WorkbookRow::from_cells(
                positions
                    .iter()
                    .map(|pos| row.get(*pos).and_then(cell_text)),
            )
        })
        .filter(|row| !row.is_empty())
        .collect())
}

pub fn load_workbook(path: impl AsRef<Path>) -> Result<Vec<WorkbookRow>> {
    let path = path.as_ref();
    let inner = || -> Result<Vec<WorkbookRow>> {
        let mut workbook: Xlsx<_> = calamine::open_workbook(path)?;
        let sheet = workbook
            .worksheet_range_at(0)
            .context("workbook has no worksheets")??;
        read_sheet(&sheet)
    };
    inner().with_context(|| format!("while loading \"{}\"", path.display()))
}

/// Covariates for one patient in the survival table.
#[derive(Debug, Clone, PartialEq)]
pub struct HxExtra {
    pub register: String,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub smoking: Option<Exposure>,
    pub alcohol: Option<Exposure>,
    pub neo_adjuvant_therapy: Option<YesNo>,
    pub platelet_count: f64,
    pub body_mass_index: Option<f64>,
    pub plt_300: YesNo,
    pub plt_400: YesNo,
}

fn parse_number(column: &str, register: &str, text: Option<&str>) -> Result<Option<f64>> {
    text.map(|text| {
        text.parse::<f64>().with_context(|| {
            format!(
                "`{}` for register {} is not a number: \"{}\"",
                column, register, text
            )
        })
    })
    .transpose()
}

/// Body mass index from weight in kg and height in cm.
pub fn body_mass_index(weight_kg: Option<f64>, height_cm: Option<f64>) -> Option<f64> {
    let height_m = height_cm? / 100.;
    Some(weight_kg? / (height_m * height_m))
}

/// Keep spreadsheet rows for patients in `survival` that have a platelet count, and decode them.
pub fn extra(rows: &[WorkbookRow], survival: &[HxSurvival]) -> Result<Vec<HxExtra>> {
    let registers = survival
        .iter()
        .filter_map(|s| s.register.as_deref())
        .collect::<BTreeSet<_>>();
    let mut out = vec![];
    for row in rows {
        let Some(register) = row.register.as_deref() else {
            continue;
        };
        if !registers.contains(register) {
            continue;
        }
        let Some(platelet_count) =
            parse_number("platelet_count", register, row.platelet_count.as_deref())?
        else {
            continue;
        };
        let height_cm = parse_number("height_cm", register, row.height_cm.as_deref())?;
        let weight_kg = parse_number("weight_kg", register, row.weight_kg.as_deref())?;
        out.push(HxExtra {
            register: register.to_owned(),
            height_cm,
            weight_kg,
            smoking: Exposure::from_hx(row.smoking.as_deref()),
            alcohol: Exposure::from_hx(row.alcohol.as_deref()),
            neo_adjuvant_therapy: YesNo::from_hx(row.neo_adjuvant_therapy.as_deref()),
            platelet_count,
            body_mass_index: body_mass_index(weight_kg, height_cm),
            plt_300: YesNo::above(platelet_count, 300.),
            plt_400: YesNo::above(platelet_count, 400.),
        });
    }
    event!(
        Level::INFO,
        "{} of {} spreadsheet rows match a patient and have a platelet count",
        out.len(),
        rows.len()
    );
    Ok(out)
}

/// A row of `hx_full_data.csv`: survival and covariates together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HxFull {
    pub id: Option<String>,
    pub register: Option<String>,
    pub inclusion: Option<i64>,
    #[serde(serialize_with = "optional_whole_number")]
    pub age: Option<f64>,
    pub sex: Option<Sex>,
    pub p_stage: Option<String>,
    pub c_stage: Option<String>,
    pub stage: Option<String>,
    pub surgery_date: Option<NaiveDate>,
    pub diagnosis_date_for_nonsurgery: Option<NaiveDate>,
    pub last_fu_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub local_recurrence_date: Option<NaiveDate>,
    pub metastasis_date: Option<NaiveDate>,
    pub last_radio_date: Option<NaiveDate>,
    #[serde(serialize_with = "optional_bool_01")]
    pub death: Option<bool>,
    #[serde(serialize_with = "optional_bool_01")]
    pub death_by_crc: Option<bool>,
    #[serde(serialize_with = "optional_bool_01")]
    pub local_recurrence: Option<bool>,
    #[serde(serialize_with = "optional_bool_01")]
    pub metastasis: Option<bool>,
    #[serde(serialize_with = "optional_bool_01")]
    pub os: Option<bool>,
    #[serde(serialize_with = "optional_bool_01")]
    pub css: Option<bool>,
    #[serde(serialize_with = "optional_bool_01")]
    pub dfs: Option<bool>,
    pub start_fu_date_os_css: Option<NaiveDate>,
    pub end_fu_date_os: Option<NaiveDate>,
    pub end_fu_date_css: Option<NaiveDate>,
    pub end_fu_date_dfs: Option<NaiveDate>,
    pub os_time: Option<i64>,
    pub css_time: Option<i64>,
    pub dfs_time: Option<i64>,
    pub os_1yr: HorizonLabel,
    pub os_3yr: HorizonLabel,
    pub os_5yr: HorizonLabel,
    pub css_1yr: HorizonLabel,
    pub css_3yr: HorizonLabel,
    pub css_5yr: HorizonLabel,
    pub dfs_1yr: HorizonLabel,
    pub dfs_3yr: HorizonLabel,
    pub dfs_5yr: HorizonLabel,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub smoking: Option<Exposure>,
    pub alcohol: Option<Exposure>,
    pub neo_adjuvant_therapy: Option<YesNo>,
    pub platelet_count: f64,
    pub body_mass_index: Option<f64>,
    pub plt_300: YesNo,
    pub plt_400: YesNo,
}

impl Columns for HxFull {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "register",
        "inclusion",
        "age",
        "sex",
        "p_stage",
        "c_stage",
        "stage",
        "surgery_date",
        "diagnosis_date_for_nonsurgery",
        "last_fu_date",
        "death_date",
        "local_recurrence_date",
        "metastasis_date",
        "last_radio_date",
        "death",
        "death_by_crc",
        "local_recurrence",
        "metastasis",
        "os",
        "css",
        "dfs",
        "start_fu_date_os_css",
        "end_fu_date_os",
        "end_fu_date_css",
        "end_fu_date_dfs",
        "os_time",
        "css_time",
        "dfs_time",
        "os_1yr",
        "os_3yr",
        "os_5yr",
        "css_1yr",
        "css_3yr",
        "css_5yr",
        "dfs_1yr",
        "dfs_3yr",
        "dfs_5yr",
        "height_cm",
        "weight_kg",
        "smoking",
        "alcohol",
        "neo_adjuvant_therapy",
        "platelet_count",
        "body_mass_index",
        "plt_300",
        "plt_400",
    ];
}

impl HxFull {
    fn new(surv: &HxSurvival, extra: &HxExtra) -> Self {
        let surv = surv.clone();
        Self {
            id: surv.id,
            register: surv.register,
            inclusion: surv.inclusion,
            age: surv.age,
            sex: surv.sex,
            p_stage: surv.p_stage,
            c_stage: surv.c_stage,
            stage: surv.stage,
            surgery_date: surv.surgery_date,
            diagnosis_date_for_nonsurgery: surv.diagnosis_date_for_nonsurgery,
            last_fu_date: surv.last_fu_date,
            death_date: surv.death_date,
            local_recurrence_date: surv.local_recurrence_date,
            metastasis_date: surv.metastasis_date,
            last_radio_date: surv.last_radio_date,
            death: surv.death,
            death_by_crc: surv.death_by_crc,
            local_recurrence: surv.local_recurrence,
            metastasis: surv.metastasis,
            os: surv.os,
            css: surv.css,
            dfs: surv.dfs,
            start_fu_date_os_css: surv.start_fu_date_os_css,
            end_fu_date_os: surv.end_fu_date_os,
            end_fu_date_css: surv.end_fu_date_css,
            end_fu_date_dfs: surv.end_fu_date_dfs,
            os_time: surv.os_time,
            css_time: surv.css_time,
            dfs_time: surv.dfs_time,
            os_1yr: surv.os_1yr,
            os_3yr: surv.os_3yr,
            os_5yr: surv.os_5yr,
            css_1yr: surv.css_1yr,
            css_3yr: surv.css_3yr,
            css_5yr: surv.css_5yr,
            dfs_1yr: surv.dfs_1yr,
            dfs_3yr: surv.dfs_3yr,
            dfs_5yr: surv.dfs_5yr,
            height_cm: extra.height_cm,
            weight_kg: extra.weight_kg,
            smoking: extra.smoking,
            alcohol: extra.alcohol,
            neo_adjuvant_therapy: extra.neo_adjuvant_therapy,
            platelet_count: extra.platelet_count,
            body_mass_index: extra.body_mass_index,
            plt_300: extra.plt_300,
            plt_400: extra.plt_400,
        }
    }
}

/// Join survival to covariates on register number.
///
/// Patients without a register number can't match anything and are left out.
pub fn merge(survival: &[HxSurvival], extra: &[HxExtra]) -> Result<Vec<HxFull>> {
    let registered = survival
        .iter()
        .filter(|s| s.register.is_some())
        .collect::<Vec<_>>();
    let rows: Vec<HxFull> = inner_join_one_to_one(
        Keyed::new("survival data", &registered, |s: &&HxSurvival| {
            s.register.clone().unwrap_or_default()
        }),
        Keyed::new("spreadsheet", extra, |e: &HxExtra| e.register.clone()),
    )?
    .into_iter()
    .map(|(surv, extra)| HxFull::new(surv, extra))
    .collect();
    event!(Level::INFO, "{} patients have covariates", rows.len());
    Ok(rows)
}

/// A row of `hx_data.csv`, the columns used in the analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HxData {
    pub id: Option<String>,
    pub register: Option<String>,
    #[serde(serialize_with = "optional_whole_number")]
    pub age: Option<f64>,
    pub sex: Option<Sex>,
    pub body_mass_index: Option<f64>,
    pub smoking: Option<Exposure>,
    pub alcohol: Option<Exposure>,
    pub stage: Option<String>,
    pub neo_adjuvant_therapy: Option<YesNo>,
    pub platelet_count: f64,
    pub plt_300: YesNo,
    pub plt_400: YesNo,
    #[serde(serialize_with = "optional_bool_01")]
    pub os: Option<bool>,
    pub os_time: Option<i64>,
    pub os_1yr: HorizonLabel,
    pub os_3yr: HorizonLabel,
    pub os_5yr: HorizonLabel,
    #[serde(serialize_with = "optional_bool_01")]
    pub css: Option<bool>,
    pub css_time: Option<i64>,
    pub css_1yr: HorizonLabel,
    pub css_3yr: HorizonLabel,
    pub css_5yr: HorizonLabel,
    #[serde(serialize_with = "optional_bool_01")]
    pub dfs: Option<bool>,
    pub dfs_time: Option<i64>,
    pub dfs_1yr: HorizonLabel,
    pub dfs_3yr: HorizonLabel,
    pub dfs_5yr: HorizonLabel,
}

impl Columns for HxData {
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "register",
        "age",
        "sex",
        "body_mass_index",
        "smoking",
        "alcohol",
        "stage",
        "neo_adjuvant_therapy",
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
        "dfs",
        "dfs_time",
        "dfs_1yr",
        "dfs_3yr",
        "dfs_5yr",
    ];
}

impl From<&HxFull> for HxData {
    fn from(from: &HxFull) -> Self {
        Self {
            id: from.id.clone(),
            register: from.register.clone(),
            age: from.age,
            sex: from.sex,
            body_mass_index: from.body_mass_index,
            smoking: from.smoking,
            alcohol: from.alcohol,
            stage: from.stage.clone(),
            neo_adjuvant_therapy: from.neo_adjuvant_therapy,
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
            dfs: from.dfs,
            dfs_time: from.dfs_time,
            dfs_1yr: from.dfs_1yr,
            dfs_3yr: from.dfs_3yr,
            dfs_5yr: from.dfs_5yr,
        }
    }
}

/// The hospital inputs.
#[derive(Debug, Clone, Default)]
pub struct HxSources {
    pub records: Vec<HxRecordRaw>,
    pub workbook: Vec<WorkbookRow>,
}

impl HxSources {
    pub fn load(paths: &Paths, records: &str, workbook: &str) -> Result<Self> {
        let this = Self {
            records: load_orig(paths.input(records))?,
            workbook: load_workbook(paths.input(workbook))?,
        };
        event!(
            Level::INFO,
            "loaded {} patient records and {} spreadsheet rows",
            this.records.len(),
            this.workbook.len()
        );
        Ok(this)
    }
}

/// Everything one run produces.
#[derive(Debug, Clone)]
pub struct HxResults {
    pub survival: Vec<HxSurvival>,
    pub full: Vec<HxFull>,
    pub data: Vec<HxData>,
}

impl HxResults {
    pub fn output_files(&self) -> Result<OutputFiles> {
        let mut files = OutputFiles::new();
        files.push(SURVIVAL_OUTPUT, &self.survival)?;
        files.push(FULL_OUTPUT, &self.full)?;
        files.push(DATA_OUTPUT, &self.data)?;
        Ok(files)
    }

    /// The OS, CSS and DFS axes of every patient in the survival table.
    pub fn axes(&self) -> [(Outcome, Vec<OutcomeAxis>); 3] {
        [
            (
                Outcome::Os,
                self.survival.iter().map(HxSurvival::os_axis).collect(),
            ),
            (
                Outcome::Css,
                self.survival.iter().map(HxSurvival::css_axis).collect(),
            ),
            (
                Outcome::Dfs,
                self.survival.iter().map(HxSurvival::dfs_axis).collect(),
            ),
        ]
    }
}

/// Run the whole hospital pipeline in memory.
pub fn run(sources: &HxSources) -> Result<HxResults> {
    let survival = survival(&sources.records)?;
    let extra = extra(&sources.workbook, &survival)?;
    let full = merge(&survival, &extra)?;
    let data = full.iter().map(HxData::from).collect();
    Ok(HxResults {
        survival,
        full,
        data,
    })
}
