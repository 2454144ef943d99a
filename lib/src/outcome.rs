//! Survival outcomes and their time axes.
use crate::{
    error::PipelineError,
    horizon::{Horizon, HorizonLabel, HorizonLabels, HORIZONS},
    range::{RangeSet, RangeSetCountsWithMissing},
    util::header,
};
use chrono::NaiveDate;
use std::{collections::BTreeMap, fmt};
use term_data_table::{Cell, Row, Table};

/// Which survival outcome an axis measures.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Outcome {
    /// Overall survival: death from any cause.
    Os,
    /// Cancer-specific survival: death from colorectal cancer.
    Css,
    /// Disease-free survival: death from CRC, local recurrence or metastasis, from surgery.
    Dfs,
}

impl Outcome {
    /// The column prefix used in output files.
    pub fn code(self) -> &'static str {
        match self {
            Outcome::Os => "os",
            Outcome::Css => "css",
            Outcome::Dfs => "dfs",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Outcome::Os => f.write_str("OS"),
            Outcome::Css => f.write_str("CSS"),
            Outcome::Dfs => f.write_str("DFS"),
        }
    }
}

/// One outcome for one patient.
///
/// `event` is `None` when we don't have enough evidence to say either way. `time` is `None` when
/// either end of the axis is unknown.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OutcomeAxis {
    pub outcome: Outcome,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub event: Option<bool>,
    pub time: Option<i64>,
}

impl OutcomeAxis {
    pub fn new(
        outcome: Outcome,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        event: Option<bool>,
    ) -> Self {
        Self {
            outcome,
            start,
            end,
            event,
            time: elapsed_days(start, end),
        }
    }

    pub fn labels(&self) -> HorizonLabels {
        HorizonLabels::classify(self.event, self.time)
    }

    /// Fails if the end of follow-up is before the start. Never corrected: it means the source
    /// data is wrong.
    pub fn check(&self, patient: impl fmt::Display) -> Result<(), PipelineError> {
        match self.time {
            Some(days) if days < 0 => Err(PipelineError::NegativeTime {
                outcome: self.outcome,
                patient: patient.to_string(),
                days,
            }),
            _ => Ok(()),
        }
    }
}

/// Whole days from `start` to `end`, or `None` if either is missing.
pub fn elapsed_days(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<i64> {
    Some((end? - start?).num_days())
}

/// Check every axis of a cohort, failing on the first negative time.
pub fn check_all<'a, P: fmt::Display + 'a>(
    axes: impl IntoIterator<Item = (P, &'a OutcomeAxis)>,
) -> Result<(), PipelineError> {
    for (patient, axis) in axes {
        axis.check(patient)?;
    }
    Ok(())
}

/// Counts describing one outcome across a cohort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeSummary {
    pub outcome: Outcome,
    pub patients: usize,
    pub events: usize,
    pub non_events: usize,
    /// Patients whose event flag is unknown.
    pub unknown: usize,
    /// Label counts at each horizon, in [`HORIZONS`] order.
    pub labels: Vec<(Horizon, BTreeMap<HorizonLabel, usize>)>,
    times: Vec<Option<i64>>,
}

impl OutcomeSummary {
    pub fn new(outcome: Outcome, axes: &[OutcomeAxis]) -> Self {
        let count = |event| axes.iter().filter(|a| a.event == event).count();
        let labels = HORIZONS
            .iter()
            .map(|horizon| {
                let mut counts = BTreeMap::new();
                for axis in axes {
                    *counts.entry(axis.labels().get(*horizon)).or_insert(0) += 1;
                }
                (*horizon, counts)
            })
            .collect();
        Self {
            outcome,
            patients: axes.len(),
            events: count(Some(true)),
            non_events: count(Some(false)),
            unknown: count(None),
            labels,
            times: axes.iter().map(|a| a.time).collect(),
        }
    }

    /// Follow-up time bucketed in years.
    pub fn follow_up(&self) -> RangeSetCountsWithMissing<f64> {
        RangeSet::follow_up_years().bucket_days(self.times.iter().copied())
    }

    pub fn print(&self) {
        fn pct(count: usize, total: usize) -> String {
            if total == 0 {
                "-".to_owned()
            } else {
                format!("{:.1}%", count as f64 / total as f64 * 100.)
            }
        }

        header(&format!("{} ({})", self.outcome, self.outcome.code()));
        println!("events: {} ({})", self.events, pct(self.events, self.patients));
        println!("no event: {}", self.non_events);
        println!("unknown: {}", self.unknown);

        let mut table = Table::new().with_row(
            Row::new()
                .with_cell(Cell::from("Horizon"))
                .with_cell(Cell::from("Event"))
                .with_cell(Cell::from("Censored"))
                .with_cell(Cell::from("Missing")),
        );
        for (horizon, counts) in self.labels.iter() {
            let get = |label| counts.get(&label).copied().unwrap_or(0).to_string();
            table.add_row(
                Row::new()
                    .with_cell(Cell::from(horizon.to_string()))
                    .with_cell(Cell::from(get(HorizonLabel::Event)))
                    .with_cell(Cell::from(get(HorizonLabel::Censored)))
                    .with_cell(Cell::from(get(HorizonLabel::Missing))),
            );
        }
        println!("{}", table);

        let mut table = Table::new().with_row(
            Row::new()
                .with_cell(Cell::from("Follow-up (years)"))
                .with_cell(Cell::from("Count"))
                .with_cell(Cell::from("Percentage")),
        );
        for (label, count) in self.follow_up().for_display() {
            table.add_row(
                Row::new()
                    .with_cell(Cell::from(label))
                    .with_cell(Cell::from(count.to_string()))
                    .with_cell(Cell::from(pct(count, self.patients))),
            );
        }
        println!("{}", table);
    }
}
