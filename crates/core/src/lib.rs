pub mod chart;
pub mod domain;
pub mod oracle;
pub mod trend;
pub mod trip;

pub mod config {
    use anyhow::Context;
    use std::str::FromStr;

    pub const DEFAULT_MODEL_PATH: &str = "models/price_forest.json";
    pub const DEFAULT_STATIC_DIR: &str = "static";
    pub const DEFAULT_PORT: u16 = 3000;
    pub const DEFAULT_CHART_KEEP: usize = 50;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub model_path: String,
        pub static_dir: String,
        pub port: u16,
        pub chart_keep: usize,
        pub render_chart: bool,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let get = |key: &str| {
                lookup(key)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            };

            let chart_keep = parse_or("CHART_KEEP", get("CHART_KEEP"), DEFAULT_CHART_KEEP)?;
            anyhow::ensure!(chart_keep >= 1, "CHART_KEEP must be at least 1 (got {chart_keep})");

            Ok(Self {
                model_path: get("MODEL_PATH").unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string()),
                static_dir: get("STATIC_DIR").unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string()),
                port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
                chart_keep,
                render_chart: match get("RENDER_CHART") {
                    Some(v) => parse_bool(&v)
                        .with_context(|| format!("RENDER_CHART must be a boolean (got {v})"))?,
                    None => true,
                },
                sentry_dsn: get("SENTRY_DSN"),
            })
        }
    }

    fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match raw {
            Some(v) => v
                .parse::<T>()
                .with_context(|| format!("invalid {key} value: {v}")),
            None => Ok(default),
        }
    }

    fn parse_bool(v: &str) -> Option<bool> {
        match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use std::collections::HashMap;

        fn settings(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
            let map: HashMap<String, String> = pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            Settings::from_lookup(|k| map.get(k).cloned())
        }

        #[test]
        fn defaults_when_unset() {
            let s = settings(&[]).unwrap();
            assert_eq!(s.model_path, DEFAULT_MODEL_PATH);
            assert_eq!(s.static_dir, DEFAULT_STATIC_DIR);
            assert_eq!(s.port, 3000);
            assert_eq!(s.chart_keep, 50);
            assert!(s.render_chart);
            assert!(s.sentry_dsn.is_none());
        }

        #[test]
        fn reads_overrides_and_treats_blank_as_unset() {
            let s = settings(&[
                ("MODEL_PATH", "/srv/model.json"),
                ("PORT", "8080"),
                ("RENDER_CHART", "off"),
                ("SENTRY_DSN", "  "),
            ])
            .unwrap();
            assert_eq!(s.model_path, "/srv/model.json");
            assert_eq!(s.port, 8080);
            assert!(!s.render_chart);
            assert!(s.sentry_dsn.is_none());
        }

        #[test]
        fn rejects_invalid_numbers() {
            assert!(settings(&[("PORT", "eighty")]).is_err());
            assert!(settings(&[("CHART_KEEP", "-1")]).is_err());
            assert!(settings(&[("CHART_KEEP", "0")]).is_err());
            assert!(settings(&[("RENDER_CHART", "maybe")]).is_err());
        }
    }
}
