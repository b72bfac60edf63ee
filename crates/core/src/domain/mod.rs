pub mod features;
pub mod series;
