//! Weekly interval aggregation.
//!
//! Timestamps are mapped to 1-based week indices relative to a fixed
//! [`Epoch`]: week 1 is the seven days starting at the epoch, and anything
//! earlier maps to 0 or below. Events are filtered by a [`DateRange`] before
//! their interval is computed, then folded either by counting
//! ([`IntervalCounter`]) or as a running total ([`cumulative_series`]).

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const SECONDS_PER_WEEK: i64 = 7 * 24 * 60 * 60;

/// Epoch year of the published star-history datasets.
pub const STAR_EPOCH_YEAR: i32 = 2016;
/// Epoch year of the published commit-history datasets.
pub const COMMIT_EPOCH_YEAR: i32 = 2017;

/// The instant week 1 starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(DateTime<Utc>);

impl Epoch {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(start)
    }

    /// Midnight UTC on January 1st of `year`.
    pub fn start_of_year(year: i32) -> Option<Self> {
        Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single().map(Self)
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn week_index(&self, ts: DateTime<Utc>) -> i64 {
        week_index(ts, *self)
    }
}

impl Default for Epoch {
    /// 2016-01-01T00:00:00Z.
    fn default() -> Self {
        Self(DateTime::<Utc>::from_timestamp(1_451_606_400, 0).unwrap_or_default())
    }
}

/// `floor((ts - epoch) / 1 week) + 1`.
pub fn week_index(ts: DateTime<Utc>, epoch: Epoch) -> i64 {
    let delta = ts - epoch.0;
    let mut seconds = delta.num_seconds();
    if delta.subsec_nanos() < 0 {
        seconds -= 1;
    }
    seconds.div_euclid(SECONDS_PER_WEEK) + 1
}

/// An inclusive time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DateRange {
    /// `start..=end`; the bounds are swapped if given in reverse.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// January 1st of `first` through the last instant of December 31st of
    /// `last`.
    pub fn years(first: i32, last: i32) -> Option<Self> {
        let start = Epoch::start_of_year(first)?.instant();
        let end = Epoch::start_of_year(last.checked_add(1)?)?.instant() - TimeDelta::nanoseconds(1);
        Some(Self::new(start, end))
    }

    pub fn unbounded() -> Self {
        Self {
            start: DateTime::<Utc>::MIN_UTC,
            end: DateTime::<Utc>::MAX_UTC,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }

    pub fn since(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn until(&self) -> DateTime<Utc> {
        self.end
    }
}

/// One aggregated bucket for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRecord {
    pub repo_id: i64,
    pub interval: i64,
    pub count: u64,
}

/// Count mode: number of events per populated interval.
#[derive(Debug, Clone)]
pub struct IntervalCounter {
    repo_id: i64,
    epoch: Epoch,
    range: DateRange,
    counts: BTreeMap<i64, u64>,
}

impl IntervalCounter {
    pub fn new(repo_id: i64, epoch: Epoch, range: DateRange) -> Self {
        Self {
            repo_id,
            epoch,
            range,
            counts: BTreeMap::new(),
        }
    }

    /// Count `ts` if it falls inside the range. Returns whether it counted.
    pub fn add(&mut self, ts: DateTime<Utc>) -> bool {
        if !self.range.contains(ts) {
            return false;
        }
        *self.counts.entry(week_index(ts, self.epoch)).or_insert(0) += 1;
        true
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// One record per populated interval, in interval order.
    pub fn into_records(self) -> Vec<IntervalRecord> {
        let repo_id = self.repo_id;
        self.counts
            .into_iter()
            .map(|(interval, count)| IntervalRecord {
                repo_id,
                interval,
                count,
            })
            .collect()
    }
}

impl Extend<DateTime<Utc>> for IntervalCounter {
    fn extend<T: IntoIterator<Item = DateTime<Utc>>>(&mut self, iter: T) {
        for ts in iter {
            self.add(ts);
        }
    }
}

/// Cumulative mode: running totals at each interval boundary.
///
/// In-range events are sorted ascending. Whenever an event lands in a new
/// interval, the total accumulated so far is emitted for the previous one;
/// the final interval is flushed at the end. Intervals without events are not
/// back-filled.
pub fn cumulative_series<I>(
    repo_id: i64,
    events: I,
    epoch: Epoch,
    range: DateRange,
) -> Vec<IntervalRecord>
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut events: Vec<_> = events.into_iter().filter(|ts| range.contains(*ts)).collect();
    events.sort_unstable();

    let mut records = Vec::new();
    let mut current: Option<i64> = None;
    let mut total: u64 = 0;

    for ts in events {
        let interval = week_index(ts, epoch);
        match current {
            Some(prev) if prev != interval => {
                records.push(IntervalRecord {
                    repo_id,
                    interval: prev,
                    count: total,
                });
                current = Some(interval);
            }
            None => current = Some(interval),
            Some(_) => {}
        }
        total += 1;
    }

    if let Some(prev) = current {
        records.push(IntervalRecord {
            repo_id,
            interval: prev,
            count: total,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn epoch_2016() -> Epoch {
        Epoch::start_of_year(2016).expect("epoch")
    }

    #[test]
    fn default_epoch_is_2016() {
        assert_eq!(Epoch::default(), epoch_2016());
        assert_eq!(
            Epoch::start_of_year(COMMIT_EPOCH_YEAR)
                .expect("epoch")
                .instant(),
            at(2017, 1, 1, 0)
        );
    }

    #[test]
    fn week_index_boundaries() {
        let epoch = epoch_2016();
        let start = epoch.instant();
        assert_eq!(week_index(start, epoch), 1);
        assert_eq!(week_index(start + TimeDelta::hours(167), epoch), 1);
        assert_eq!(week_index(start + TimeDelta::hours(168), epoch), 2);
        assert_eq!(week_index(start - TimeDelta::nanoseconds(1), epoch), 0);
        assert_eq!(week_index(start - TimeDelta::hours(168), epoch), 0);
        assert_eq!(
            week_index(start - TimeDelta::hours(168) - TimeDelta::seconds(1), epoch),
            -1
        );
    }

    #[test]
    fn years_range_is_inclusive() {
        let range = DateRange::years(2016, 2019).expect("range");
        assert!(range.contains(at(2016, 1, 1, 0)));
        assert!(range.contains(Utc.with_ymd_and_hms(2019, 12, 31, 23, 59, 59).unwrap()));
        assert!(!range.contains(at(2020, 1, 1, 0)));
        assert!(!range.contains(at(2015, 12, 31, 23)));
    }

    #[test]
    fn counter_drops_out_of_range_events_before_bucketing() {
        let mut counter =
            IntervalCounter::new(7, epoch_2016(), DateRange::years(2016, 2016).expect("range"));
        assert!(counter.add(at(2016, 1, 1, 0)));
        assert!(counter.add(at(2016, 1, 2, 0)));
        assert!(counter.add(at(2016, 1, 20, 0)));
        assert!(!counter.add(at(2015, 12, 31, 0)));
        assert!(!counter.add(at(2017, 1, 1, 0)));

        assert_eq!(counter.total(), 3);
        assert_eq!(
            counter.into_records(),
            vec![
                IntervalRecord {
                    repo_id: 7,
                    interval: 1,
                    count: 2
                },
                IntervalRecord {
                    repo_id: 7,
                    interval: 3,
                    count: 1
                },
            ]
        );
    }

    #[test]
    fn cumulative_series_emits_on_boundaries_and_flushes_last() {
        // Unsorted input: weeks 3, 1, 1, 5.
        let events = vec![
            at(2016, 1, 16, 0),
            at(2016, 1, 1, 0),
            at(2016, 1, 3, 0),
            at(2016, 1, 30, 0),
        ];
        let series = cumulative_series(
            1,
            events,
            epoch_2016(),
            DateRange::years(2016, 2019).expect("range"),
        );
        let pairs: Vec<(i64, u64)> = series.iter().map(|r| (r.interval, r.count)).collect();
        assert_eq!(pairs, vec![(1, 2), (3, 3), (5, 4)]);
    }

    #[test]
    fn cumulative_series_of_nothing_is_empty() {
        let series = cumulative_series(
            1,
            vec![at(2014, 5, 1, 0)],
            epoch_2016(),
            DateRange::years(2016, 2019).expect("range"),
        );
        assert!(series.is_empty());
    }

    fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
        // 2014-01-01 .. 2022-01-01
        (1_388_534_400i64..1_640_995_200i64)
            .prop_map(|s| DateTime::<Utc>::from_timestamp(s, 0).expect("in range"))
    }

    proptest! {
        #[test]
        fn week_index_is_monotonic(a in arb_timestamp(), b in arb_timestamp()) {
            let epoch = epoch_2016();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(week_index(lo, epoch) <= week_index(hi, epoch));
        }

        #[test]
        fn cumulative_deltas_sum_to_event_count(
            events in prop::collection::vec(arb_timestamp(), 0..200)
        ) {
            let range = DateRange::years(2016, 2019).expect("range");
            let expected = events.iter().filter(|ts| range.contains(**ts)).count() as u64;
            let series = cumulative_series(1, events, epoch_2016(), range);

            let mut previous = 0u64;
            let mut sum = 0u64;
            for record in &series {
                prop_assert!(record.count > previous);
                sum += record.count - previous;
                previous = record.count;
            }
            prop_assert_eq!(sum, expected);
            prop_assert!(series.windows(2).all(|w| w[0].interval < w[1].interval));
        }

        #[test]
        fn counts_partition_events(
            events in prop::collection::vec(arb_timestamp(), 0..200)
        ) {
            let range = DateRange::years(2016, 2019).expect("range");
            let expected = events.iter().filter(|ts| range.contains(**ts)).count() as u64;
            let mut counter = IntervalCounter::new(1, epoch_2016(), range);
            counter.extend(events);
            let records = counter.into_records();
            prop_assert_eq!(records.iter().map(|r| r.count).sum::<u64>(), expected);
            prop_assert!(records.iter().all(|r| r.count > 0));
        }
    }
}
