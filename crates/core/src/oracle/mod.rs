use crate::domain::features::FeatureRecord;

pub mod error;
pub mod forest;
pub mod schema;

pub use error::{OracleFailure, PredictionError, PredictionStage};
pub use schema::{FeatureSchema, TimestampLayout};

/// A pre-trained price model, consumed strictly as record -> price.
pub trait PriceOracle: Send + Sync {
    fn name(&self) -> &str;

    fn schema(&self) -> &FeatureSchema;

    fn predict(&self, record: &FeatureRecord) -> Result<f64, OracleFailure>;
}
