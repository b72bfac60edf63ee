use rand::Rng;

pub const AIRLINE: &str = "IndiGo";
pub const DURATION_OPTIONS: [&str; 3] = ["2h 55m", "2h 50m", "5h 35m"];
pub const STOPS_OPTIONS: [&str; 2] = ["non stop", "1 stop"];
pub const FLIGHT_NUMBERS: [&str; 4] = ["6E 6813", "6E 6283", "6E 6021", "6E 6401"];

const CITY_CODES: &[(&str, &str)] = &[
    ("bengaluru", "BLR"),
    ("bangalore", "BLR"),
    ("new delhi", "DEL"),
    ("delhi", "DEL"),
    ("mumbai", "BOM"),
    ("chennai", "MAA"),
    ("kolkata", "CCU"),
    ("hyderabad", "HYD"),
    ("cochin", "COK"),
    ("kochi", "COK"),
];

/// Trip fields the form does not ask for. Sampled once per request so the
/// headline estimate and every history point share them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryFeatures {
    pub arrival_time: String,
    pub duration: &'static str,
    pub total_stops: &'static str,
    pub flight_no: &'static str,
}

impl AuxiliaryFeatures {
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        let hour: u32 = rng.gen_range(0..24);
        let minute: u32 = rng.gen_range(0..60);
        Self {
            arrival_time: format!("{hour:02}:{minute:02}"),
            duration: pick(rng, &DURATION_OPTIONS),
            total_stops: pick(rng, &STOPS_OPTIONS),
            flight_no: pick(rng, &FLIGHT_NUMBERS),
        }
    }
}

fn pick<R: Rng>(rng: &mut R, options: &[&'static str]) -> &'static str {
    options[rng.gen_range(0..options.len())]
}

pub fn city_code(city: &str) -> String {
    let key = city.trim().to_lowercase();
    if let Some((_, code)) = CITY_CODES.iter().find(|(name, _)| *name == key) {
        return (*code).to_string();
    }
    key.chars()
        .filter(|c| c.is_alphabetic())
        .take(3)
        .collect::<String>()
        .to_uppercase()
}

pub fn route(source: &str, destination: &str) -> String {
    format!("{} → {}", city_code(source), city_code(destination))
}
