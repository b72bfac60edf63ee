use crate::domain::features::{FeatureRecord, FeatureValue};
use crate::oracle::error::OracleFailure;
use anyhow::{bail, ensure};
use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Categorical { categories: Vec<String> },
    Numeric,
    Date,
    Time,
    Duration,
}

impl FieldKind {
    fn expects(&self) -> &'static str {
        match self {
            FieldKind::Categorical { .. } => "a category",
            FieldKind::Numeric => "a number",
            FieldKind::Date => "a date",
            FieldKind::Time => "a time of day",
            FieldKind::Duration => "a duration",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureField {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

/// Where the oracle expects the timestamp of a record to live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimestampLayout {
    Split {
        #[serde(default = "default_date_field")]
        date_field: String,
        #[serde(default = "default_time_field")]
        time_field: String,
    },
    Components {
        #[serde(default = "default_day")]
        day: String,
        #[serde(default = "default_month")]
        month: String,
        #[serde(default = "default_year")]
        year: String,
        #[serde(default = "default_hour")]
        hour: String,
        #[serde(default = "default_minute")]
        minute: String,
    },
}

fn default_date_field() -> String {
    "Time_Stamp_Date".to_string()
}
fn default_time_field() -> String {
    "Time_Stamp_Time".to_string()
}
fn default_day() -> String {
    "Day".to_string()
}
fn default_month() -> String {
    "Month".to_string()
}
fn default_year() -> String {
    "Year".to_string()
}
fn default_hour() -> String {
    "Hour".to_string()
}
fn default_minute() -> String {
    "Minute".to_string()
}

impl Default for TimestampLayout {
    fn default() -> Self {
        TimestampLayout::Split {
            date_field: default_date_field(),
            time_field: default_time_field(),
        }
    }
}

impl TimestampLayout {
    pub fn field_names(&self) -> Vec<&str> {
        match self {
            TimestampLayout::Split {
                date_field,
                time_field,
            } => vec![date_field.as_str(), time_field.as_str()],
            TimestampLayout::Components {
                day,
                month,
                year,
                hour,
                minute,
            } => vec![
                day.as_str(),
                month.as_str(),
                year.as_str(),
                hour.as_str(),
                minute.as_str(),
            ],
        }
    }

    /// Writes `ts` into `record`, replacing any previous timestamp fields.
    pub fn apply(&self, record: &mut FeatureRecord, ts: NaiveDateTime) {
        match self {
            TimestampLayout::Split {
                date_field,
                time_field,
            } => {
                record.insert(date_field.clone(), FeatureValue::Date(ts.date()));
                record.insert(time_field.clone(), FeatureValue::Time(ts.time()));
            }
            TimestampLayout::Components {
                day,
                month,
                year,
                hour,
                minute,
            } => {
                record.insert(day.clone(), FeatureValue::Number(ts.day() as f64));
                record.insert(month.clone(), FeatureValue::Number(ts.month() as f64));
                record.insert(year.clone(), FeatureValue::Number(ts.year() as f64));
                record.insert(hour.clone(), FeatureValue::Number(ts.hour() as f64));
                record.insert(minute.clone(), FeatureValue::Number(ts.minute() as f64));
            }
        }
    }

    fn accepts(&self, name: &str, kind: &FieldKind) -> bool {
        match self {
            TimestampLayout::Split {
                date_field,
                time_field,
            } => {
                (name == date_field.as_str() && *kind == FieldKind::Date)
                    || (name == time_field.as_str() && *kind == FieldKind::Time)
            }
            TimestampLayout::Components { .. } => *kind == FieldKind::Numeric,
        }
    }
}

/// Named, typed inputs the oracle requires, in model column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    #[serde(default)]
    pub timestamp_layout: TimestampLayout,
    pub features: Vec<FeatureField>,
}

impl FeatureSchema {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.features.is_empty(), "feature schema must be non-empty");

        let mut seen = BTreeSet::new();
        for field in &self.features {
            ensure!(!field.name.trim().is_empty(), "feature name must be non-empty");
            ensure!(
                seen.insert(field.name.as_str()),
                "duplicate feature '{}'",
                field.name
            );
            if let FieldKind::Categorical { categories } = &field.kind {
                ensure!(
                    !categories.is_empty(),
                    "categorical feature '{}' has no categories",
                    field.name
                );
            }
        }

        for name in self.timestamp_layout.field_names() {
            let Some(field) = self.field(name) else {
                bail!("timestamp field '{name}' is not declared in the feature schema");
            };
            ensure!(
                self.timestamp_layout.accepts(name, &field.kind),
                "timestamp field '{name}' has incompatible kind {:?}",
                field.kind
            );
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FeatureField> {
        self.features.iter().find(|f| f.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    /// Checks `record` against the schema and turns it into the model's
    /// numeric input row.
    pub fn encode(&self, record: &FeatureRecord) -> Result<Vec<f64>, OracleFailure> {
        if let Some(extra) = record.keys().find(|k| self.field(k).is_none()) {
            return Err(OracleFailure::UnexpectedFeature(extra.clone()));
        }

        let mut row = Vec::with_capacity(self.features.len());
        for field in &self.features {
            let value = record
                .get(&field.name)
                .ok_or_else(|| OracleFailure::MissingFeature(field.name.clone()))?;
            row.push(encode_value(field, value)?);
        }
        Ok(row)
    }
}

fn encode_value(field: &FeatureField, value: &FeatureValue) -> Result<f64, OracleFailure> {
    let mismatch = || OracleFailure::TypeMismatch {
        feature: field.name.clone(),
        expected: field.kind.expects(),
        found: value.type_name(),
    };
    let invalid = |detail: String| OracleFailure::InvalidValue {
        feature: field.name.clone(),
        detail,
    };

    match (&field.kind, value) {
        (FieldKind::Categorical { categories }, FeatureValue::Text(s)) => categories
            .iter()
            .position(|c| c == s)
            .map(|i| i as f64)
            .ok_or_else(|| OracleFailure::UnknownCategory {
                feature: field.name.clone(),
                value: s.clone(),
            }),
        (FieldKind::Numeric, FeatureValue::Number(v)) => {
            if v.is_finite() {
                Ok(*v)
            } else {
                Err(invalid(format!("non-finite number {v}")))
            }
        }
        (FieldKind::Date, FeatureValue::Date(d)) => Ok(d.num_days_from_ce() as f64),
        (FieldKind::Date, FeatureValue::Text(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(|d| d.num_days_from_ce() as f64)
            .map_err(|_| invalid(format!("'{s}' is not a YYYY-MM-DD date"))),
        (FieldKind::Time, FeatureValue::Time(t)) => Ok(minutes_of_day(*t)),
        (FieldKind::Time, FeatureValue::Text(s)) => parse_clock(s)
            .map(minutes_of_day)
            .ok_or_else(|| invalid(format!("'{s}' is not an HH:MM time"))),
        (FieldKind::Duration, FeatureValue::Text(s)) => parse_duration_minutes(s)
            .ok_or_else(|| invalid(format!("'{s}' is not a duration like '2h 55m'"))),
        (FieldKind::Duration, FeatureValue::Number(m)) if m.is_finite() && *m >= 0.0 => Ok(*m),
        _ => Err(mismatch()),
    }
}

fn minutes_of_day(t: NaiveTime) -> f64 {
    (t.hour() * 60 + t.minute()) as f64
}

pub fn parse_clock(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// Parses durations such as `"2h 55m"`, `"2h55m"`, `"45m"` or `"3h"` into minutes.
pub fn parse_duration_minutes(s: &str) -> Option<f64> {
    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut saw_unit = false;

    for c in s.trim().chars() {
        match c {
            '0'..='9' => digits.push(c),
            'h' | 'H' | 'm' | 'M' => {
                let n: u64 = digits.parse().ok()?;
                digits.clear();
                let minutes = if c.eq_ignore_ascii_case(&'h') {
                    n.checked_mul(60)?
                } else {
                    n
                };
                total = total.checked_add(minutes)?;
                saw_unit = true;
            }
            c if c.is_whitespace() && digits.is_empty() => {}
            _ => return None,
        }
    }

    if !digits.is_empty() || !saw_unit {
        return None;
    }
    Some(total as f64)
}
