use crate::horizon::DAYS_PER_YEAR;
use itertools::{EitherOrBoth, Itertools};
use std::{borrow::Borrow, fmt};

/// Range where lower bound is inclusive, upper bound is exclusive or unbounded.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Range<T>(T, Option<T>);

impl<T> Range<T>
where
    T: PartialOrd,
{
    pub fn new(from: T, to: Option<T>) -> Self {
        if let Some(ref to) = to {
            if from >= *to {
                panic!("ranges must go from low to high")
            }
        }
        Range(from, to)
    }

    pub fn contains(&self, val: &T) -> bool {
        if let Some(end) = &self.1 {
            val >= &self.0 && val < end
        } else {
            val >= &self.0
        }
    }
}

impl<T> fmt::Display for Range<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(end) = &self.1 {
            write!(f, "{} - {}", self.0, end)
        } else {
            write!(f, "{}+", self.0)
        }
    }
}

#[derive(Clone, Debug)]
pub struct RangeSet<T> {
    ranges: Vec<Range<T>>,
}

impl<T> RangeSet<T> {
    pub fn new(ranges: Vec<Range<T>>) -> Self {
        Self { ranges }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Range<T>> + '_ {
        self.ranges.iter()
    }
}

impl RangeSet<f64> {
    /// Follow-up time in years, split at the label horizons.
    pub fn follow_up_years() -> Self {
        RangeSet::new(vec![
            Range::new(0., Some(1.)),
            Range::new(1., Some(3.)),
            Range::new(3., Some(5.)),
            Range::new(5., None),
        ])
    }

    /// Bucket times given in days.
    pub fn bucket_days(
        self,
        days: impl Iterator<Item = Option<i64>>,
    ) -> RangeSetCountsWithMissing<f64> {
        self.bucket_values_with_missing(days.map(|d| d.map(|d| d as f64 / DAYS_PER_YEAR)))
    }
}

impl<T> RangeSet<T>
where
    T: PartialOrd,
{
    pub fn bucket_values_with_missing<I, B>(self, values: I) -> RangeSetCountsWithMissing<T>
    where
        I: Iterator<Item = Option<B>>,
        B: Borrow<T>,
    {
        let mut buckets = vec![0usize; self.ranges.len() + 1];
        let last = self.ranges.len();
        for value in values {
            if let Some(value) = value {
                for (idx, bucket) in self.ranges.iter().enumerate() {
                    if bucket.contains(value.borrow()) {
                        buckets[idx] += 1;
                    }
                }
            } else {
                buckets[last] += 1;
            }
        }
        RangeSetCountsWithMissing {
            set: self,
            counts: buckets,
        }
    }
}

/// A range set with values bucketed, and bucket sizes recorded. The last bucket counts missing
/// values.
pub struct RangeSetCountsWithMissing<T> {
    set: RangeSet<T>,
    counts: Vec<usize>,
}

impl<T> RangeSetCountsWithMissing<T> {
    pub fn iter(&self) -> impl Iterator<Item = (Option<&Range<T>>, usize)> {
        self.set
            .iter()
            .zip_longest(self.counts.iter().copied())
            .map(|el| match el {
                EitherOrBoth::Left(_) => unreachable!(),
                EitherOrBoth::Right(count) => (None, count),
                EitherOrBoth::Both(range, count) => (Some(range), count),
            })
    }
}

impl<T> RangeSetCountsWithMissing<T>
where
    T: fmt::Display,
{
    pub fn for_display(&self) -> impl Iterator<Item = (String, usize)> + '_ {
        self.iter().map(|(range, count)| {
            let label = match range {
                Some(range) => range.to_string(),
                None => "missing data".to_owned(),
            };
            (label, count)
        })
    }
}
