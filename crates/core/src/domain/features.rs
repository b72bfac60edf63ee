use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Date(NaiveDate),
    Time(NaiveTime),
    Text(String),
}

impl FeatureValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FeatureValue::Number(_) => "number",
            FeatureValue::Date(_) => "date",
            FeatureValue::Time(_) => "time",
            FeatureValue::Text(_) => "text",
        }
    }
}

impl From<&str> for FeatureValue {
    fn from(s: &str) -> Self {
        FeatureValue::Text(s.to_string())
    }
}

impl From<String> for FeatureValue {
    fn from(s: String) -> Self {
        FeatureValue::Text(s)
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

/// Complete record handed to the oracle: trip fields plus timestamp fields.
pub type FeatureRecord = BTreeMap<String, FeatureValue>;

/// Trip fields without the timestamp. Built once per request and cloned for
/// every timestamp the oracle is asked about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTemplate {
    values: BTreeMap<String, FeatureValue>,
}

impl FeatureTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<FeatureValue>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_record(&self) -> FeatureRecord {
        self.values.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_builder_overwrites_same_key() {
        let t = FeatureTemplate::new()
            .with("Airline", "IndiGo")
            .with("Airline", "Vistara");
        assert_eq!(t.len(), 1);
        assert_eq!(t.get("Airline"), Some(&FeatureValue::from("Vistara")));
    }

    #[test]
    fn record_is_an_independent_copy() {
        let t = FeatureTemplate::new().with("Source", "Bengaluru");
        let mut record = t.to_record();
        record.insert("Source".to_string(), "Mumbai".into());
        assert_eq!(t.get("Source"), Some(&FeatureValue::from("Bengaluru")));
    }
}
