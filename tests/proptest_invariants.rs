//! Property-based tests for barometer invariants.
//!
//! These tests use proptest to verify that key invariants hold
//! across randomly generated scenarios.

use chrono::NaiveDate;
use proptest::prelude::*;
use volbarometer::stats::{ewm_mean, halflife_alpha, percentile_rank};
use volbarometer::{
    BarometerConfig, Feature, OverflowPolicy, Series, TimePoint, VolLevel, VolatilityLevels,
    join_outer,
};

/// A column of ratios with roughly one value in five missing.
fn column_strategy() -> impl Strategy<Value = Vec<Option<f64>>> {
    prop::collection::vec(
        prop_oneof![4 => (0.1f64..5.0).prop_map(Some), 1 => Just(None)],
        0..200,
    )
}

fn halflife_strategy() -> impl Strategy<Value = f64> {
    0.5f64..30.0
}

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Days::new(i as u64)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // ========================================================================
    // PERCENTILE RANK
    // ========================================================================

    /// Every rank lies in [0, 1] and is present exactly where input is present
    #[test]
    fn ranks_in_unit_interval(col in column_strategy()) {
        let present = col.iter().filter(|v| v.is_some()).count();
        let ranks = percentile_rank(&col);
        prop_assert_eq!(ranks.len(), col.len());

        for (v, r) in col.iter().zip(&ranks) {
            if present >= 2 {
                prop_assert_eq!(v.is_some(), r.is_some());
            } else {
                prop_assert!(r.is_none());
            }
            if let Some(r) = r {
                prop_assert!((0.0..=1.0).contains(r), "rank {} out of range", r);
            }
        }
    }

    /// A unique largest value always ranks 1.0
    #[test]
    fn max_ranks_one(col in column_strategy()) {
        let present: Vec<f64> = col.iter().flatten().copied().collect();
        prop_assume!(present.len() >= 2);
        let max = present.iter().copied().fold(f64::MIN, f64::max);
        prop_assume!(present.iter().filter(|v| **v == max).count() == 1);
        let ranks = percentile_rank(&col);
        for (v, r) in col.iter().zip(&ranks) {
            if *v == Some(max) {
                prop_assert_eq!(*r, Some(1.0));
            }
        }
    }

    /// Ranking preserves order
    #[test]
    fn ranks_monotone(col in column_strategy()) {
        let ranks = percentile_rank(&col);
        for (i, a) in col.iter().enumerate() {
            for (j, b) in col.iter().enumerate() {
                if let (Some(a), Some(b), Some(ra), Some(rb)) = (a, b, ranks[i], ranks[j]) {
                    if a < b {
                        prop_assert!(ra < rb);
                    }
                }
            }
        }
    }

    // ========================================================================
    // EXPONENTIAL SMOOTHING
    // ========================================================================

    /// Appending rows never changes earlier smoothed values
    #[test]
    fn ewm_is_causal(col in column_strategy(), extra in column_strategy(), h in halflife_strategy()) {
        let base = ewm_mean(&col, h);
        let mut longer = col.clone();
        longer.extend(extra);
        let extended = ewm_mean(&longer, h);
        prop_assert_eq!(&extended[..col.len()], &base[..]);
    }

    /// Without gaps the last value equals the closed-form weighted mean
    #[test]
    fn ewm_last_matches_closed_form(
        xs in prop::collection::vec(0.0f64..1.0, 1..120),
        h in halflife_strategy(),
    ) {
        let out = ewm_mean(&xs.iter().copied().map(Some).collect::<Vec<_>>(), h);
        let decay = 1.0 - halflife_alpha(h);
        let (mut num, mut den) = (0.0, 0.0);
        for (k, x) in xs.iter().rev().enumerate() {
            let w = decay.powi(k as i32);
            num += w * x;
            den += w;
        }
        let last = out.last().copied().flatten().unwrap();
        prop_assert!((last - num / den).abs() < 1e-9, "{} vs {}", last, num / den);
    }

    /// Smoothed values stay within the range of the inputs
    #[test]
    fn ewm_bounded(col in column_strategy(), h in halflife_strategy()) {
        let present: Vec<f64> = col.iter().flatten().copied().collect();
        prop_assume!(!present.is_empty());
        let lo = present.iter().copied().fold(f64::MAX, f64::min);
        let hi = present.iter().copied().fold(f64::MIN, f64::max);
        for v in ewm_mean(&col, h).into_iter().flatten() {
            prop_assert!(v >= lo - 1e-9 && v <= hi + 1e-9);
        }
    }

    // ========================================================================
    // PIPELINE + CLASSIFIER
    // ========================================================================

    /// A full barometer run yields a value in (0, 1]
    #[test]
    fn barometer_in_unit_interval(
        pairs in prop::collection::vec((8.0f64..80.0, 8.0f64..80.0), 3..150),
    ) {
        let a = Series::new("a", pairs.iter().enumerate().map(|(i, p)| TimePoint::new(day(i), p.0)).collect()).unwrap();
        let b = Series::new("b", pairs.iter().enumerate().map(|(i, p)| TimePoint::new(day(i), p.1)).collect()).unwrap();
        let table = join_outer(&[a, b]).unwrap();
        let config = BarometerConfig {
            features: vec![Feature::new("a", "b", 2.0), Feature::new("b", "a", 1.0)],
            halflife: 3.0,
        };
        let reading = volbarometer::barometer::compute(&table, &config).unwrap();
        prop_assert!(reading.value > 0.0 && reading.value <= 1.0);
        prop_assert_eq!(reading.rows, pairs.len());
    }

    /// A classified level's threshold is above the value and the previous one is not
    #[test]
    fn classifier_picks_first_level_above(value in -10.0f64..99.999) {
        let levels = VolatilityLevels::standard();
        let level = levels.classify(value).unwrap();
        prop_assert!(value < level.threshold);
        let idx = levels.levels().iter().position(|l| l == level).unwrap();
        if idx > 0 {
            prop_assert!(value >= levels.levels()[idx - 1].threshold);
        }
    }

    /// Values at or above the top threshold never classify silently
    #[test]
    fn classifier_overflow(value in 100.0f64..1e6) {
        let levels = VolatilityLevels::standard();
        prop_assert!(levels.classify(value).is_err());
        let clamped = levels.clone().with_overflow(OverflowPolicy::ClampToHighest);
        prop_assert_eq!(clamped.classify(value).unwrap(), &VolLevel::new("extreme", 100.0));
    }
}
