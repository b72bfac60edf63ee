//! Tree-ensemble price model persisted as JSON.
//!
//! The artifact carries its own feature schema, so the columns it was trained
//! on are an explicit contract instead of something callers have to guess.

use crate::domain::features::FeatureRecord;
use crate::oracle::error::OracleFailure;
use crate::oracle::schema::FeatureSchema;
use crate::oracle::PriceOracle;
use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestArtifact {
    pub name: String,
    #[serde(flatten)]
    pub schema: FeatureSchema,
    pub trees: Vec<TreeArtifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeArtifact {
    pub nodes: Vec<NodeArtifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NodeArtifact {
    Split {
        feature: String,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf(f64),
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    // Children always sit after their parent, so the walk terminates.
    fn evaluate(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ForestModel {
    name: String,
    schema: FeatureSchema,
    trees: Vec<Tree>,
}

impl ForestModel {
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read model file {}", path.display()))?;
        let model = Self::from_json_str(&text)
            .with_context(|| format!("invalid model file {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            model = %model.name,
            trees = model.trees.len(),
            features = model.schema.features.len(),
            "loaded price model"
        );
        Ok(model)
    }

    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        let artifact = serde_json::from_str::<ForestArtifact>(text)
            .context("model JSON does not match the forest artifact schema")?;
        Self::from_artifact(artifact)
    }

    pub fn from_artifact(artifact: ForestArtifact) -> anyhow::Result<Self> {
        artifact.schema.validate()?;
        ensure!(!artifact.trees.is_empty(), "forest must contain at least one tree");

        let mut trees = Vec::with_capacity(artifact.trees.len());
        for (tree_idx, tree) in artifact.trees.into_iter().enumerate() {
            trees.push(
                compile_tree(&artifact.schema, tree)
                    .with_context(|| format!("invalid tree #{tree_idx}"))?,
            );
        }

        Ok(Self {
            name: artifact.name,
            schema: artifact.schema,
            trees,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

fn compile_tree(schema: &FeatureSchema, tree: TreeArtifact) -> anyhow::Result<Tree> {
    ensure!(!tree.nodes.is_empty(), "tree must contain at least one node");
    let len = tree.nodes.len();

    let mut nodes = Vec::with_capacity(len);
    for (idx, node) in tree.nodes.into_iter().enumerate() {
        let compiled = match node {
            NodeArtifact::Leaf { value } => {
                ensure!(value.is_finite(), "node {idx}: leaf value must be finite");
                Node::Leaf(value)
            }
            NodeArtifact::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let feature_idx = schema
                    .index_of(&feature)
                    .with_context(|| format!("node {idx}: unknown feature '{feature}'"))?;
                ensure!(
                    threshold.is_finite(),
                    "node {idx}: threshold must be finite"
                );
                for child in [left, right] {
                    ensure!(
                        child > idx && child < len,
                        "node {idx}: child index {child} must point forward and be < {len}"
                    );
                }
                Node::Split {
                    feature: feature_idx,
                    threshold,
                    left,
                    right,
                }
            }
        };
        nodes.push(compiled);
    }
    Ok(Tree { nodes })
}

impl PriceOracle for ForestModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    fn predict(&self, record: &FeatureRecord) -> Result<f64, OracleFailure> {
        let row = self.schema.encode(record)?;
        let sum: f64 = self.trees.iter().map(|t| t.evaluate(&row)).sum();
        let price = sum / self.trees.len() as f64;
        if !price.is_finite() {
            return Err(OracleFailure::Model(format!(
                "non-finite prediction {price}"
            )));
        }
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::features::FeatureValue;
    use serde_json::json;

    fn artifact_json() -> serde_json::Value {
        json!({
            "name": "test-forest",
            "timestamp_layout": {"kind": "split"},
            "features": [
                {"name": "Total_Stops", "kind": "categorical", "categories": ["non stop", "1 stop"]},
                {"name": "Time_Stamp_Date", "kind": "date"},
                {"name": "Time_Stamp_Time", "kind": "time"}
            ],
            "trees": [
                {"nodes": [
                    {"feature": "Total_Stops", "threshold": 0.5, "left": 1, "right": 2},
                    {"value": 4000.0},
                    {"value": 6000.0}
                ]},
                {"nodes": [
                    {"feature": "Time_Stamp_Time", "threshold": 720.0, "left": 1, "right": 2},
                    {"value": 5000.0},
                    {"value": 7000.0}
                ]}
            ]
        })
    }

    fn record(stops: &str, hour: u32) -> FeatureRecord {
        let mut r = FeatureRecord::new();
        r.insert("Total_Stops".into(), stops.into());
        r.insert(
            "Time_Stamp_Date".into(),
            FeatureValue::Date(chrono::NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()),
        );
        r.insert(
            "Time_Stamp_Time".into(),
            FeatureValue::Time(chrono::NaiveTime::from_hms_opt(hour, 0, 0).unwrap()),
        );
        r
    }

    #[test]
    fn predicts_mean_of_trees() {
        let model = ForestModel::from_json_str(&artifact_json().to_string()).unwrap();
        assert_eq!(model.tree_count(), 2);
        assert_eq!(model.name(), "test-forest");
        // non stop -> 4000, 10:00 -> 5000
        assert_eq!(model.predict(&record("non stop", 10)).unwrap(), 4500.0);
        // 1 stop -> 6000, 18:00 -> 7000
        assert_eq!(model.predict(&record("1 stop", 18)).unwrap(), 6500.0);
    }

    #[test]
    fn threshold_is_inclusive_on_the_left() {
        let model = ForestModel::from_json_str(&artifact_json().to_string()).unwrap();
        // 12:00 == 720 minutes goes left.
        assert_eq!(model.predict(&record("non stop", 12)).unwrap(), 4500.0);
    }

    #[test]
    fn unsupported_category_is_a_failure() {
        let model = ForestModel::from_json_str(&artifact_json().to_string()).unwrap();
        let err = model.predict(&record("3 stops", 10)).unwrap_err();
        assert!(matches!(err, OracleFailure::UnknownCategory { .. }));
    }

    #[test]
    fn rejects_backward_child_index() {
        let mut v = artifact_json();
        v["trees"][0]["nodes"][0]["left"] = json!(0);
        assert!(ForestModel::from_json_str(&v.to_string()).is_err());
    }

    #[test]
    fn rejects_out_of_bounds_child_index() {
        let mut v = artifact_json();
        v["trees"][0]["nodes"][0]["right"] = json!(9);
        assert!(ForestModel::from_json_str(&v.to_string()).is_err());
    }

    #[test]
    fn rejects_split_on_undeclared_feature() {
        let mut v = artifact_json();
        v["trees"][1]["nodes"][0]["feature"] = json!("Airline");
        let err = ForestModel::from_json_str(&v.to_string()).unwrap_err();
        assert!(format!("{err:#}").contains("unknown feature 'Airline'"));
    }

    #[test]
    fn rejects_empty_forest() {
        let mut v = artifact_json();
        v["trees"] = json!([]);
        assert!(ForestModel::from_json_str(&v.to_string()).is_err());
    }

    #[test]
    fn predicts_with_component_timestamps() {
        let model = ForestModel::from_json_str(
            &json!({
                "name": "components-forest",
                "timestamp_layout": {"kind": "components"},
                "features": [
                    {"name": "Day", "kind": "numeric"},
                    {"name": "Month", "kind": "numeric"},
                    {"name": "Year", "kind": "numeric"},
                    {"name": "Hour", "kind": "numeric"},
                    {"name": "Minute", "kind": "numeric"}
                ],
                "trees": [{"nodes": [
                    {"feature": "Hour", "threshold": 6.0, "left": 1, "right": 2},
                    {"value": 3000.0},
                    {"value": 5000.0}
                ]}]
            })
            .to_string(),
        )
        .unwrap();

        let at = |hour: u32| {
            let ts = chrono::NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(hour, 30, 0)
                .unwrap();
            let mut r = FeatureRecord::new();
            model.schema().timestamp_layout.apply(&mut r, ts);
            r
        };
        assert_eq!(model.predict(&at(6)).unwrap(), 3000.0);
        assert_eq!(model.predict(&at(7)).unwrap(), 5000.0);
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, artifact_json().to_string()).unwrap();
        let model = ForestModel::load(&path).unwrap();
        assert_eq!(model.tree_count(), 2);

        assert!(ForestModel::load(dir.path().join("missing.json")).is_err());
    }
}
