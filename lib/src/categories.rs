//! Categorical covariates.
//!
//! Each source codes these differently, so every category is an enum with one mapping function
//! per source. UK Biobank mappings are strict: a code we haven't seen is an error, because it
//! means the data dictionary changed under us. The hospital spreadsheet is free text typed by
//! hand, so anything we don't recognise there is treated as missing.
use crate::error::PipelineError;
use serde::Serialize;
use std::fmt;

/// Ordering is arbitrary.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Hash, Ord, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Female,
    Male,
}

impl Sex {
    /// UK Biobank field 31: 0 = female, 1 = male.
    pub fn from_ukb(code: Option<i64>) -> Result<Option<Self>, PipelineError> {
        match code {
            None => Ok(None),
            Some(0) => Ok(Some(Sex::Female)),
            Some(1) => Ok(Some(Sex::Male)),
            Some(value) => Err(PipelineError::UnmappedValue {
                column: "sex",
                value,
            }),
        }
    }

    /// Hospital records: 1 = male, 2 = female.
    pub fn from_hx(code: Option<i64>) -> Option<Self> {
        match code? {
            1 => Some(Sex::Male),
            2 => Some(Sex::Female),
            _ => None,
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Sex::Male => f.write_str("male"),
            Sex::Female => f.write_str("female"),
        }
    }
}

/// Top-level ethnic group.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Hash, Ord, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum Ethnicity {
    White,
    Mixed,
    Asian,
    Black,
    Other,
}

impl Ethnicity {
    /// UK Biobank field 21000 (data-coding 1001). "Prefer not to answer" (-3) and "Do not know"
    /// (-1) are missing. Chinese (5) is grouped with Asian.
    pub fn from_ukb(code: Option<i64>) -> Result<Option<Self>, PipelineError> {
        use Ethnicity::*;
        let Some(code) = code else { return Ok(None) };
        Ok(match code {
            -3 | -1 => None,
            1 | 1001 | 1002 | 1003 => Some(White),
            2 | 2001 | 2002 | 2003 | 2004 => Some(Mixed),
            3 | 5 | 3001 | 3002 | 3003 | 3004 => Some(Asian),
            4 | 4001 | 4002 | 4003 => Some(Black),
            6 => Some(Other),
            value => {
                return Err(PipelineError::UnmappedValue {
                    column: "ethnic_background",
                    value,
                })
            }
        })
    }
}

impl fmt::Display for Ethnicity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use Ethnicity::*;
        f.write_str(match self {
            White => "white",
            Mixed => "mixed",
            Asian => "asian",
            Black => "black",
            Other => "other",
        })
    }
}

/// Smoking or drinking history.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Hash, Ord, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum Exposure {
    Never,
    Ever,
}

impl Exposure {
    /// UK Biobank fields 20116/20117: -3 = prefer not to answer, 0 = never, 1 = previous,
    /// 2 = current.
    pub fn from_ukb(column: &'static str, code: Option<i64>) -> Result<Option<Self>, PipelineError> {
        match code {
            None | Some(-3) => Ok(None),
            Some(0) => Ok(Some(Exposure::Never)),
            Some(1 | 2) => Ok(Some(Exposure::Ever)),
            Some(value) => Err(PipelineError::UnmappedValue { column, value }),
        }
    }

    /// Hospital spreadsheet answers: 否/无 (no/none) and 是 (yes). `否·` is a typo that occurs in
    /// the data.
    pub fn from_hx(text: Option<&str>) -> Option<Self> {
        match text? {
            "否" | "无" | "否·" => Some(Exposure::Never),
            "是" => Some(Exposure::Ever),
            _ => None,
        }
    }
}

impl fmt::Display for Exposure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Exposure::Never => f.write_str("never"),
            Exposure::Ever => f.write_str("ever"),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Hash, Ord, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum YesNo {
    No,
    Yes,
}

impl YesNo {
    pub fn from_hx(text: Option<&str>) -> Option<Self> {
        match text? {
            "否" => Some(YesNo::No),
            "是" => Some(YesNo::Yes),
            _ => None,
        }
    }

    /// `Yes` if `value` is strictly greater than `threshold`.
    pub fn above(value: f64, threshold: f64) -> Self {
        if value > threshold {
            YesNo::Yes
        } else {
            YesNo::No
        }
    }
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            YesNo::No => f.write_str("no"),
            YesNo::Yes => f.write_str("yes"),
        }
    }
}
