//! Synthetic 48-hour price history around a target departure.
//!
//! Every history point is the oracle's raw price for that timestamp scaled by
//! a near-departure ramp, an off-peak discount and a small jitter. The final
//! point is always the oracle's unadjusted price for the target itself.

use crate::domain::features::FeatureTemplate;
use crate::domain::series::{PricePoint, TimeSeries};
use crate::oracle::{OracleFailure, PredictionError, PredictionStage, PriceOracle};
use chrono::{Duration, NaiveDateTime, Timelike};

pub mod noise;

pub use noise::{FixedNoise, NoiseSource, UniformNoise};

pub const HISTORY_POINTS: usize = 17;
pub const HISTORY_STEP_HOURS: i64 = 3;
pub const LOOKBACK_HOURS: f64 = 48.0;

const MAX_STEEP_UPLIFT: f64 = 0.2;
const OFFPEAK_DISCOUNT: f64 = 0.96;
const OFFPEAK_LAST_HOUR: u32 = 6;

/// `HISTORY_POINTS` timestamps spaced `HISTORY_STEP_HOURS` apart, ending at `target`.
///
/// `None` when the start of the window is not representable.
pub fn history_timestamps(target: NaiveDateTime) -> Option<Vec<NaiveDateTime>> {
    let step = Duration::hours(HISTORY_STEP_HOURS);
    let mut out = Vec::with_capacity(HISTORY_POINTS);
    for i in (0..HISTORY_POINTS).rev() {
        out.push(target.checked_sub_signed(step * i as i32)?);
    }
    Some(out)
}

/// `1 + (1 - h/48)^2 * 0.2`, with `h` clamped to `[0, 48]`.
pub fn steep_factor(hours_before: f64) -> f64 {
    let h = hours_before.clamp(0.0, LOOKBACK_HOURS);
    let closeness = 1.0 - h / LOOKBACK_HOURS;
    1.0 + closeness * closeness * MAX_STEEP_UPLIFT
}

/// 0.96 for hours 00..=06, 1.0 otherwise.
pub fn offpeak_factor(ts: NaiveDateTime) -> f64 {
    if ts.hour() <= OFFPEAK_LAST_HOUR {
        OFFPEAK_DISCOUNT
    } else {
        1.0
    }
}

fn hours_between(later: NaiveDateTime, earlier: NaiveDateTime) -> f64 {
    (later - earlier).num_seconds() as f64 / 3600.0
}

fn predict_at(
    oracle: &dyn PriceOracle,
    template: &FeatureTemplate,
    ts: NaiveDateTime,
    stage: PredictionStage,
) -> Result<f64, PredictionError> {
    let mut record = template.to_record();
    oracle.schema().timestamp_layout.apply(&mut record, ts);
    oracle
        .predict(&record)
        .map_err(|cause| PredictionError::new(stage, ts, cause))
}

/// Oracle price for the template at exactly `target`.
pub fn estimate(
    oracle: &dyn PriceOracle,
    template: &FeatureTemplate,
    target: NaiveDateTime,
) -> Result<f64, PredictionError> {
    predict_at(oracle, template, target, PredictionStage::Estimate)
}

/// Builds the 17-point history ending at `target`. Any oracle failure aborts
/// the whole series.
pub fn synthesize(
    oracle: &dyn PriceOracle,
    template: &FeatureTemplate,
    target: NaiveDateTime,
    noise: &mut dyn NoiseSource,
) -> Result<TimeSeries, PredictionError> {
    let timestamps = history_timestamps(target).ok_or_else(|| {
        PredictionError::new(
            PredictionStage::History,
            target,
            OracleFailure::InvalidValue {
                feature: "timestamp".to_string(),
                detail: "48-hour lookback window is out of range".to_string(),
            },
        )
    })?;

    let mut points = Vec::with_capacity(timestamps.len());
    let mut raw_at_target = None;

    for ts in timestamps {
        let raw = predict_at(oracle, template, ts, PredictionStage::History)?;
        if ts == target {
            raw_at_target = Some(raw);
        }

        let hours_before = hours_between(target, ts);
        let adjusted = raw * steep_factor(hours_before) * offpeak_factor(ts) * noise.sample();
        points.push(PricePoint {
            timestamp: ts,
            price: adjusted,
        });
    }

    if let (Some(raw), Some(last)) = (raw_at_target, points.last_mut()) {
        last.price = raw;
    }

    tracing::debug!(
        oracle = oracle.name(),
        %target,
        points = points.len(),
        "synthesized price history"
    );

    Ok(TimeSeries::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::{FeatureRecord, FeatureValue};
    use crate::oracle::schema::FeatureSchema;
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::json;
    use std::sync::Mutex;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    /// Price = 1000 + minutes-of-day, so every timestamp yields a distinct value.
    struct ClockOracle {
        schema: FeatureSchema,
        fail_at: Option<NaiveTime>,
        calls: Mutex<Vec<NaiveDateTime>>,
    }

    impl ClockOracle {
        fn new(fail_at: Option<NaiveTime>) -> Self {
            let schema = serde_json::from_value(json!({
                "timestamp_layout": {"kind": "split"},
                "features": [
                    {"name": "Source", "kind": "categorical", "categories": ["Bengaluru"]},
                    {"name": "Time_Stamp_Date", "kind": "date"},
                    {"name": "Time_Stamp_Time", "kind": "time"}
                ]
            }))
            .unwrap();
            Self {
                schema,
                fail_at,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl PriceOracle for ClockOracle {
        fn name(&self) -> &str {
            "clock"
        }

        fn schema(&self) -> &FeatureSchema {
            &self.schema
        }

        fn predict(&self, record: &FeatureRecord) -> Result<f64, OracleFailure> {
            self.schema.encode(record)?;
            let (Some(FeatureValue::Date(d)), Some(FeatureValue::Time(t))) =
                (record.get("Time_Stamp_Date"), record.get("Time_Stamp_Time"))
            else {
                return Err(OracleFailure::Model("no timestamp".into()));
            };
            if Some(*t) == self.fail_at {
                return Err(OracleFailure::Model("boom".into()));
            }
            self.calls.lock().unwrap().push(d.and_time(*t));
            Ok(1000.0 + (t.hour() * 60 + t.minute()) as f64)
        }
    }

    fn template() -> FeatureTemplate {
        FeatureTemplate::new().with("Source", "Bengaluru")
    }

    struct CountingNoise(usize);

    impl NoiseSource for CountingNoise {
        fn sample(&mut self) -> f64 {
            self.0 += 1;
            1.01
        }
    }

    #[test]
    fn timestamps_span_48_hours_in_3_hour_steps() {
        let target = at(2024, 6, 1, 18, 0);
        let ts = history_timestamps(target).unwrap();
        assert_eq!(ts.len(), 17);
        assert_eq!(ts[0], at(2024, 5, 30, 18, 0));
        assert_eq!(ts[16], target);
        for w in ts.windows(2) {
            assert_eq!(w[1] - w[0], Duration::hours(3));
        }
    }

    #[test]
    fn steep_factor_endpoints_and_clamping() {
        assert_eq!(steep_factor(0.0), 1.2);
        assert_eq!(steep_factor(48.0), 1.0);
        assert_eq!(steep_factor(24.0), 1.05);
        assert_eq!(steep_factor(-5.0), 1.2);
        assert_eq!(steep_factor(100.0), 1.0);
    }

    #[test]
    fn offpeak_covers_midnight_to_six_inclusive() {
        for h in 0..24 {
            let expected = if h <= 6 { 0.96 } else { 1.0 };
            assert_eq!(offpeak_factor(at(2024, 6, 1, h, 59)), expected, "hour {h}");
        }
    }

    #[test]
    fn fixed_noise_gives_exact_adjustment() {
        let oracle = ClockOracle::new(None);
        let target = at(2024, 6, 1, 18, 0);
        let series = synthesize(&oracle, &template(), target, &mut FixedNoise(1.0)).unwrap();

        assert_eq!(series.len(), HISTORY_POINTS);
        for p in &series.points()[..HISTORY_POINTS - 1] {
            let raw = 1000.0 + (p.timestamp.hour() * 60) as f64;
            let hours_before = (target - p.timestamp).num_hours() as f64;
            let expected = raw * steep_factor(hours_before) * offpeak_factor(p.timestamp);
            assert_eq!(p.price, expected, "at {}", p.timestamp);
        }
    }

    #[test]
    fn last_point_is_the_raw_prediction() {
        let oracle = ClockOracle::new(None);
        let target = at(2024, 6, 1, 18, 0);
        let raw = estimate(&oracle, &template(), target).unwrap();
        let series = synthesize(&oracle, &template(), target, &mut FixedNoise(1.01)).unwrap();

        let last = series.last().unwrap();
        assert_eq!(last.timestamp, target);
        assert_eq!(last.price.to_bits(), raw.to_bits());
        assert_eq!(series.first().unwrap().timestamp, at(2024, 5, 30, 18, 0));
    }

    #[test]
    fn samples_noise_once_per_point_and_calls_oracle_in_order() {
        let oracle = ClockOracle::new(None);
        let target = at(2024, 6, 1, 2, 30);
        let mut noise = CountingNoise(0);
        synthesize(&oracle, &template(), target, &mut noise).unwrap();

        assert_eq!(noise.0, HISTORY_POINTS);
        let calls = oracle.calls.lock().unwrap();
        assert_eq!(*calls, history_timestamps(target).unwrap());
    }

    #[test]
    fn oracle_failure_aborts_with_failing_timestamp() {
        let oracle = ClockOracle::new(Some(NaiveTime::from_hms_opt(9, 0, 0).unwrap()));
        let target = at(2024, 6, 1, 18, 0);
        let err = synthesize(&oracle, &template(), target, &mut FixedNoise(1.0)).unwrap_err();

        assert_eq!(err.stage, PredictionStage::History);
        // First 09:00 in the window is on 2024-05-31.
        assert_eq!(err.timestamp, at(2024, 5, 31, 9, 0));
        assert_eq!(err.cause, OracleFailure::Model("boom".into()));
    }

    #[test]
    fn estimate_failure_reports_estimate_stage() {
        let oracle = ClockOracle::new(None);
        let bad = FeatureTemplate::new().with("Source", "Paris");
        let target = at(2024, 6, 1, 18, 0);
        let err = estimate(&oracle, &bad, target).unwrap_err();
        assert_eq!(err.stage, PredictionStage::Estimate);
        assert_eq!(err.timestamp, target);
        assert!(matches!(err.cause, OracleFailure::UnknownCategory { .. }));
    }

    #[test]
    fn unrepresentable_window_is_rejected() {
        let oracle = ClockOracle::new(None);
        let target = NaiveDateTime::MIN;
        let err = synthesize(&oracle, &template(), target, &mut FixedNoise(1.0)).unwrap_err();
        assert!(matches!(err.cause, OracleFailure::InvalidValue { .. }));
    }
}
