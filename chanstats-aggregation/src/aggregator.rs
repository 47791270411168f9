//! State machines turning cumulative values into per-period values
//!
//! The measurement registry hands over cumulative totals every export period. Each aggregator
//! remembers the totals it has already reported, is *touched* when a new total arrives, and on
//! [`Aggregate::consume`] reports what changed since the last consumption.

use chanstats_core::{Aggregation, RawValue, StatKind, StatValue};

/// A per-statistic aggregator
///
/// `insert` is idempotent against cumulative totals: inserting the value that is already stored
/// does not touch the aggregator. Values of the wrong [`RawValue`] variant are ignored.
pub trait Aggregate {
    /// Store a new cumulative value
    fn insert(&mut self, value: RawValue);

    /// Whether a changed value was inserted since the last [`Aggregate::consume`]
    fn is_touched(&self) -> bool;

    /// Report the per-period value and clear the touched flag
    fn consume(&mut self) -> StatValue;
}

/// Reports the increment of a monotonic integer counter.
///
/// A counter that went backwards (e.g. after a reset upstream) reports zero, never a negative
/// increment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountDelta {
    touched: bool,
    prev: u64,
    last: u64,
}

impl Aggregate for CountDelta {
    fn insert(&mut self, value: RawValue) {
        if let RawValue::Count(count) = value {
            if count != self.last {
                self.last = count;
                self.touched = true;
            }
        }
    }

    fn is_touched(&self) -> bool {
        self.touched
    }

    fn consume(&mut self) -> StatValue {
        let delta = self.last.saturating_sub(self.prev);
        self.prev = self.last;
        self.touched = false;
        StatValue::Int(delta)
    }
}

/// Reports the increment of a monotonic floating-point sum. Negative increments report zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SumDelta {
    touched: bool,
    prev: f64,
    last: f64,
}

impl Aggregate for SumDelta {
    fn insert(&mut self, value: RawValue) {
        if let RawValue::Sum(sum) = value {
            if sum != self.last {
                self.last = sum;
                self.touched = true;
            }
        }
    }

    fn is_touched(&self) -> bool {
        self.touched
    }

    fn consume(&mut self) -> StatValue {
        let delta = self.last - self.prev;
        self.prev = self.last;
        self.touched = false;
        StatValue::Float(if delta > 0.0 { delta } else { 0.0 })
    }
}

/// Reports the latest value of a gauge. The value is kept across consumptions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LastValue {
    touched: bool,
    last: f64,
}

impl Aggregate for LastValue {
    fn insert(&mut self, value: RawValue) {
        if let RawValue::LastValue(last) = value {
            if last != self.last {
                self.last = last;
                self.touched = true;
            }
        }
    }

    fn is_touched(&self) -> bool {
        self.touched
    }

    fn consume(&mut self) -> StatValue {
        self.touched = false;
        StatValue::Float(self.last)
    }
}

/// Reports the mean of the samples added since the last consumption, from a cumulative
/// `(count, sum)` pair.
///
/// This is a running mean per period, not a distribution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeanOfRatio {
    touched: bool,
    prev_count: u64,
    prev_sum: f64,
    last_count: u64,
    last_sum: f64,
}

impl Aggregate for MeanOfRatio {
    fn insert(&mut self, value: RawValue) {
        if let RawValue::Mean { count, sum } = value {
            if count != self.last_count {
                self.last_count = count;
                self.touched = true;
            }
            if sum != self.last_sum {
                self.last_sum = sum;
                self.touched = true;
            }
        }
    }

    fn is_touched(&self) -> bool {
        self.touched
    }

    fn consume(&mut self) -> StatValue {
        let count = self.last_count.saturating_sub(self.prev_count);
        let sum = self.last_sum - self.prev_sum;
        self.prev_count = self.last_count;
        self.prev_sum = self.last_sum;
        self.touched = false;
        if count > 0 {
            StatValue::Float(sum / count as f64)
        } else {
            StatValue::Float(0.0)
        }
    }
}

/// The closed set of aggregator variants
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregator {
    /// See [`CountDelta`]
    Count(CountDelta),
    /// See [`SumDelta`]
    Sum(SumDelta),
    /// See [`LastValue`]
    LastValue(LastValue),
    /// See [`MeanOfRatio`]
    Mean(MeanOfRatio),
}

impl Aggregator {
    /// Create the aggregator bound to a statistic
    pub fn for_stat(stat: StatKind) -> Self {
        match stat.aggregation() {
            Aggregation::Count => Aggregator::Count(CountDelta::default()),
            Aggregation::Sum => Aggregator::Sum(SumDelta::default()),
            Aggregation::LastValue => Aggregator::LastValue(LastValue::default()),
            Aggregation::Mean => Aggregator::Mean(MeanOfRatio::default()),
        }
    }
}

impl Aggregate for Aggregator {
    fn insert(&mut self, value: RawValue) {
        match self {
            Aggregator::Count(a) => a.insert(value),
            Aggregator::Sum(a) => a.insert(value),
            Aggregator::LastValue(a) => a.insert(value),
            Aggregator::Mean(a) => a.insert(value),
        }
    }

    fn is_touched(&self) -> bool {
        match self {
            Aggregator::Count(a) => a.is_touched(),
            Aggregator::Sum(a) => a.is_touched(),
            Aggregator::LastValue(a) => a.is_touched(),
            Aggregator::Mean(a) => a.is_touched(),
        }
    }

    fn consume(&mut self) -> StatValue {
        match self {
            Aggregator::Count(a) => a.consume(),
            Aggregator::Sum(a) => a.consume(),
            Aggregator::LastValue(a) => a.consume(),
            Aggregator::Mean(a) => a.consume(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;
    use rstest::rstest;

    #[rstest]
    #[case(&[1, 3, 3, 10])]
    #[case(&[5, 2, 7])]
    #[case(&[0, 0, 4])]
    fn count_delta_reports_clamped_increments(#[case] totals: &[u64]) {
        let mut agg = CountDelta::default();
        let mut previous = 0u64;
        for &total in totals {
            let changed = total != agg.last;
            agg.insert(RawValue::Count(total));
            check!(agg.is_touched() == changed);
            if agg.is_touched() {
                check!(agg.consume() == StatValue::Int(total.saturating_sub(previous)));
            }
            previous = total;
        }
    }

    #[test]
    fn count_delta_is_idempotent() {
        let mut agg = CountDelta::default();
        agg.insert(RawValue::Count(4));
        check!(agg.consume() == StatValue::Int(4));
        agg.insert(RawValue::Count(4));
        check!(!agg.is_touched());
    }

    #[test]
    fn count_delta_reset_reports_zero_then_resumes() {
        let mut agg = CountDelta::default();
        agg.insert(RawValue::Count(10));
        agg.consume();
        agg.insert(RawValue::Count(2));
        check!(agg.consume() == StatValue::Int(0));
        agg.insert(RawValue::Count(5));
        check!(agg.consume() == StatValue::Int(3));
    }

    #[test]
    fn sum_delta() {
        let mut agg = SumDelta::default();
        agg.insert(RawValue::Sum(50.0));
        check!(agg.consume() == StatValue::Float(50.0));
        agg.insert(RawValue::Sum(200.0));
        check!(agg.consume() == StatValue::Float(150.0));
        agg.insert(RawValue::Sum(100.0));
        check!(agg.consume() == StatValue::Float(0.0));
    }

    #[test]
    fn last_value_keeps_value() {
        let mut agg = LastValue::default();
        agg.insert(RawValue::LastValue(8000.0));
        check!(agg.consume() == StatValue::Float(8000.0));
        check!(!agg.is_touched());
        check!(agg.consume() == StatValue::Float(8000.0));
        agg.insert(RawValue::LastValue(8000.0));
        check!(!agg.is_touched());
    }

    #[test]
    fn mean_of_ratio() {
        let mut agg = MeanOfRatio::default();
        agg.insert(RawValue::Mean { count: 2, sum: 5.0 });
        check!(agg.consume() == StatValue::Float(2.5));
        agg.insert(RawValue::Mean {
            count: 5,
            sum: 11.0,
        });
        check!(agg.consume() == StatValue::Float(2.0));
    }

    #[test]
    fn mean_of_ratio_without_new_samples_is_zero() {
        let mut agg = MeanOfRatio::default();
        agg.insert(RawValue::Mean { count: 2, sum: 5.0 });
        agg.consume();
        agg.insert(RawValue::Mean { count: 2, sum: 7.0 });
        check!(agg.is_touched());
        check!(agg.consume() == StatValue::Float(0.0));
    }

    #[test]
    fn mismatched_values_are_ignored() {
        let mut count = Aggregator::for_stat(StatKind::Errors);
        count.insert(RawValue::Sum(3.0));
        count.insert(RawValue::Mean { count: 1, sum: 1.0 });
        check!(!count.is_touched());

        let mut mean = Aggregator::for_stat(StatKind::Latency);
        mean.insert(RawValue::Count(3));
        check!(!mean.is_touched());
        mean.insert(RawValue::Mean { count: 1, sum: 4.0 });
        check!(mean.consume() == StatValue::Float(4.0));
    }

    #[test]
    fn for_stat_binds_variants() {
        check!(matches!(
            Aggregator::for_stat(StatKind::MsgCount),
            Aggregator::Sum(_)
        ));
        check!(matches!(
            Aggregator::for_stat(StatKind::CacheHits),
            Aggregator::Count(_)
        ));
        check!(matches!(
            Aggregator::for_stat(StatKind::LastUpdate),
            Aggregator::LastValue(_)
        ));
        check!(matches!(
            Aggregator::for_stat(StatKind::Latency),
            Aggregator::Mean(_)
        ));
    }
}
