//! Fixed-horizon survival labels.
//!
//! A survival outcome is recorded as an event flag plus a time to event (or to censoring) in
//! days. Downstream models often want a binary "did it happen within N years" target instead, so
//! each outcome is discretised at 1, 3 and 5 years.
//!
//! The rules, in priority order:
//!
//! 1. event and time <= horizon → [`HorizonLabel::Event`]
//! 2. event and time > horizon → [`HorizonLabel::Censored`]
//! 3. no event and time > horizon → [`HorizonLabel::Censored`]
//! 4. anything else → [`HorizonLabel::Missing`]
//!
//! Case 4 includes a patient with no event who was followed for less than the horizon. We can't
//! tell whether they would have had the event before the horizon, so we don't guess.
use serde::{Serialize, Serializer};
use std::fmt;

/// Length of a year in days, averaged over leap years.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// The horizons every outcome is labelled at.
pub const HORIZONS: [Horizon; 3] = [Horizon::One, Horizon::Three, Horizon::Five];

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Horizon {
    One,
    Three,
    Five,
}

impl Horizon {
    pub fn years(self) -> u8 {
        match self {
            Horizon::One => 1,
            Horizon::Three => 3,
            Horizon::Five => 5,
        }
    }

    /// The cutoff in days. Not rounded: 1 year is 365.25 days, so day 365 is inside and day 366
    /// is outside.
    pub fn days(self) -> f64 {
        f64::from(self.years()) * DAYS_PER_YEAR
    }
}

impl fmt::Display for Horizon {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}yr", self.years())
    }
}

/// The status of one outcome at one horizon.
///
/// Serializes as `1`, `0` or an empty field, which is how the downstream tools expect it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum HorizonLabel {
    Event,
    Censored,
    Missing,
}

impl HorizonLabel {
    pub fn as_flag(self) -> Option<u8> {
        match self {
            HorizonLabel::Event => Some(1),
            HorizonLabel::Censored => Some(0),
            HorizonLabel::Missing => None,
        }
    }
}

impl fmt::Display for HorizonLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HorizonLabel::Event => f.write_str("event"),
            HorizonLabel::Censored => f.write_str("censored"),
            HorizonLabel::Missing => f.write_str("missing"),
        }
    }
}

impl Serialize for HorizonLabel {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self.as_flag() {
            Some(flag) => s.serialize_u8(flag),
            None => s.serialize_none(),
        }
    }
}

/// Label an outcome at a single horizon.
pub fn classify(event: Option<bool>, elapsed_days: Option<i64>, horizon: Horizon) -> HorizonLabel {
    let (Some(event), Some(elapsed)) = (event, elapsed_days) else {
        return HorizonLabel::Missing;
    };
    let within = (elapsed as f64) <= horizon.days();
    match (event, within) {
        (true, true) => HorizonLabel::Event,
        (true, false) => HorizonLabel::Censored,
        (false, false) => HorizonLabel::Censored,
        (false, true) => HorizonLabel::Missing,
    }
}

/// An outcome labelled at every horizon in [`HORIZONS`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HorizonLabels {
    pub yr1: HorizonLabel,
    pub yr3: HorizonLabel,
    pub yr5: HorizonLabel,
}

impl HorizonLabels {
    pub fn classify(event: Option<bool>, elapsed_days: Option<i64>) -> Self {
        Self {
            yr1: classify(event, elapsed_days, Horizon::One),
            yr3: classify(event, elapsed_days, Horizon::Three),
            yr5: classify(event, elapsed_days, Horizon::Five),
        }
    }

    pub fn get(&self, horizon: Horizon) -> HorizonLabel {
        match horizon {
            Horizon::One => self.yr1,
            Horizon::Three => self.yr3,
            Horizon::Five => self.yr5,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{classify, Horizon, HorizonLabel, HorizonLabels, HORIZONS};

    #[test]
    fn event_within_and_beyond_horizon() {
        assert_eq!(classify(Some(true), Some(365), Horizon::One), HorizonLabel::Event);
        assert_eq!(
            classify(Some(true), Some(366), Horizon::One),
            HorizonLabel::Censored
        );
        assert_eq!(classify(Some(true), Some(366), Horizon::Three), HorizonLabel::Event);
        assert_eq!(classify(Some(true), Some(0), Horizon::Five), HorizonLabel::Event);
    }

    #[test]
    fn survivors() {
        assert_eq!(
            classify(Some(false), Some(1096), Horizon::Three),
            HorizonLabel::Censored
        );
        // followed up for less than the horizon without an event
        assert_eq!(
            classify(Some(false), Some(1095), Horizon::Three),
            HorizonLabel::Missing
        );
        assert_eq!(
            classify(Some(false), Some(200), Horizon::One),
            HorizonLabel::Missing
        );
    }

    #[test]
    fn nulls_are_missing() {
        for horizon in HORIZONS {
            assert_eq!(classify(None, Some(10_000), horizon), HorizonLabel::Missing);
            assert_eq!(classify(Some(true), None, horizon), HorizonLabel::Missing);
            assert_eq!(classify(Some(false), None, horizon), HorizonLabel::Missing);
            assert_eq!(classify(None, None, horizon), HorizonLabel::Missing);
        }
    }

    #[test]
    fn boundary_is_inclusive() {
        // 5 * 365.25 = 1826.25
        assert_eq!(classify(Some(true), Some(1826), Horizon::Five), HorizonLabel::Event);
        assert_eq!(
            classify(Some(true), Some(1827), Horizon::Five),
            HorizonLabel::Censored
        );
        assert_eq!(
            classify(Some(false), Some(1827), Horizon::Five),
            HorizonLabel::Censored
        );
        assert_eq!(
            classify(Some(false), Some(1826), Horizon::Five),
            HorizonLabel::Missing
        );
    }

    #[test]
    fn early_events_stay_events() {
        for days in [0, 100, 365] {
            let labels = HorizonLabels::classify(Some(true), Some(days));
            for horizon in HORIZONS {
                assert_eq!(labels.get(horizon), HorizonLabel::Event);
            }
        }
    }

    #[test]
    fn flags() {
        assert_eq!(HorizonLabel::Event.as_flag(), Some(1));
        assert_eq!(HorizonLabel::Censored.as_flag(), Some(0));
        assert_eq!(HorizonLabel::Missing.as_flag(), None);
        assert_eq!(Horizon::Three.to_string(), "3yr");
    }
}
