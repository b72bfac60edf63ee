use crate::domain::features::FeatureTemplate;
use crate::domain::series::TimeSeries;
use crate::oracle::{PredictionError, PredictionStage, PriceOracle};
use crate::trend::{self, UniformNoise};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rand::Rng;
use serde::Deserialize;
use std::fmt;

pub mod auxiliary;

pub use auxiliary::AuxiliaryFeatures;

pub const DEFAULT_SOURCE: &str = "Bengaluru";
pub const DEFAULT_DESTINATION: &str = "New Delhi";

/// Raw form submission. Every field may be absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TripForm {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestError {
    Validation(String),
    Parse(String),
    Prediction(PredictionError),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestError::Validation(msg) => write!(f, "{msg}"),
            RequestError::Parse(detail) => write!(f, "Invalid date/time format: {detail}"),
            RequestError::Prediction(err) => match err.stage {
                PredictionStage::Estimate => write!(f, "Prediction error: {err}"),
                PredictionStage::History => {
                    write!(f, "Prediction error during history generation: {err}")
                }
            },
        }
    }
}

impl std::error::Error for RequestError {}

impl From<PredictionError> for RequestError {
    fn from(err: PredictionError) -> Self {
        RequestError::Prediction(err)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TripRequest {
    pub source: String,
    pub destination: String,
    /// Date and time as submitted, echoed back in the headline.
    pub date_text: String,
    pub time_text: String,
    pub target: NaiveDateTime,
}

fn non_blank(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

impl TripRequest {
    pub fn from_form(form: &TripForm) -> Result<Self, RequestError> {
        let (Some(date_text), Some(time_text)) = (
            non_blank(form.date.as_deref()),
            non_blank(form.time.as_deref()),
        ) else {
            return Err(RequestError::Validation(
                "Please provide both date and time.".to_string(),
            ));
        };

        let date = NaiveDate::parse_from_str(date_text, "%Y-%m-%d").map_err(|e| {
            RequestError::Parse(format!(
                "'{date_text}' is not a valid date (expected YYYY-MM-DD): {e}"
            ))
        })?;
        let time = NaiveTime::parse_from_str(time_text, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(time_text, "%H:%M:%S"))
            .map_err(|e| {
                RequestError::Parse(format!(
                    "'{time_text}' is not a valid time (expected HH:MM, 24-hour): {e}"
                ))
            })?;

        let target = date.and_time(time);
        if trend::history_timestamps(target).is_none() {
            return Err(RequestError::Parse(format!(
                "'{date_text} {time_text}' is outside the supported date range"
            )));
        }

        Ok(Self {
            source: non_blank(form.source.as_deref())
                .unwrap_or(DEFAULT_SOURCE)
                .to_string(),
            destination: non_blank(form.destination.as_deref())
                .unwrap_or(DEFAULT_DESTINATION)
                .to_string(),
            date_text: date_text.to_string(),
            time_text: time_text.to_string(),
            target,
        })
    }

    /// Trip fields for the oracle, without the timestamp.
    pub fn template(&self, aux: &AuxiliaryFeatures) -> FeatureTemplate {
        FeatureTemplate::new()
            .with("Airline", auxiliary::AIRLINE)
            .with("Source", self.source.as_str())
            .with("Destination", self.destination.as_str())
            .with("Route", auxiliary::route(&self.source, &self.destination))
            .with("Dep_Time", self.target.format("%H:%M").to_string())
            .with("Arrival_Time", aux.arrival_time.as_str())
            .with("Duration", aux.duration)
            .with("Total_Stops", aux.total_stops)
            .with("Flight_no", aux.flight_no)
    }
}

#[derive(Debug, Clone)]
pub struct Quote {
    pub request: TripRequest,
    pub template: FeatureTemplate,
    pub price: f64,
    pub history: Option<TimeSeries>,
}

impl Quote {
    pub fn headline(&self) -> String {
        format!(
            "The estimated price for {} at {} is ₹{:.2}",
            self.request.date_text, self.request.time_text, self.price
        )
    }
}

/// Prices one trip: a single estimate and, when asked, the 48-hour history.
/// Auxiliary fields are sampled once and shared by both.
pub fn quote<R: Rng>(
    oracle: &dyn PriceOracle,
    request: TripRequest,
    rng: &mut R,
    with_history: bool,
) -> Result<Quote, RequestError> {
    let aux = AuxiliaryFeatures::sample(rng);
    let template = request.template(&aux);

    let price = trend::estimate(oracle, &template, request.target)?;

    let history = if with_history {
        let mut noise = UniformNoise::new(&mut *rng);
        Some(trend::synthesize(
            oracle,
            &template,
            request.target,
            &mut noise,
        )?)
    } else {
        None
    };

    tracing::info!(
        source = %request.source,
        destination = %request.destination,
        target = %request.target,
        price,
        with_history,
        "quoted trip"
    );

    Ok(Quote {
        request,
        template,
        price,
        history,
    })
}
