use anyhow::Context;
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fare_core::oracle::forest::ForestModel;
use fare_core::trip::{self, TripForm, TripRequest};

#[derive(Debug, Parser)]
#[command(name = "fare_cli")]
struct Args {
    /// Departure date (YYYY-MM-DD).
    #[arg(long)]
    date: String,

    /// Departure time (HH:MM, 24-hour).
    #[arg(long)]
    time: String,

    #[arg(long)]
    source: Option<String>,

    #[arg(long)]
    destination: Option<String>,

    /// Model artifact. Defaults to MODEL_PATH.
    #[arg(long)]
    model: Option<PathBuf>,

    /// Write the 48-hour trend chart (SVG) to this path.
    #[arg(long)]
    chart_out: Option<PathBuf>,

    /// Only compute the single-point estimate.
    #[arg(long)]
    no_history: bool,

    /// Print the quote and history as JSON.
    #[arg(long)]
    json: bool,

    /// Seed for the auxiliary-feature and noise sampling.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = fare_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    anyhow::ensure!(
        !(args.no_history && args.chart_out.is_some()),
        "--chart-out needs the history; drop --no-history"
    );

    let model_path = args
        .model
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.model_path));
    let model = ForestModel::load(&model_path).inspect_err(|e| {
        sentry_anyhow::capture_anyhow(e);
    })?;

    let form = TripForm {
        source: args.source.clone(),
        destination: args.destination.clone(),
        date: Some(args.date.clone()),
        time: Some(args.time.clone()),
    };
    let request = TripRequest::from_form(&form)?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let quote = trip::quote(&model, request, &mut rng, !args.no_history)?;

    if let (Some(path), Some(history)) = (&args.chart_out, &quote.history) {
        let svg = fare_core::chart::render_trend_svg(history)?;
        std::fs::write(path, svg)
            .with_context(|| format!("failed to write chart {}", path.display()))?;
        tracing::info!(path = %path.display(), "wrote trend chart");
    }

    if args.json {
        let out = serde_json::json!({
            "headline": quote.headline(),
            "price": quote.price,
            "target": quote.request.target,
            "history": quote.history,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", quote.headline());
        if let Some(history) = &quote.history {
            for point in history.iter() {
                println!(
                    "{}  ₹{:.2}",
                    point.timestamp.format("%Y-%m-%d %H:%M"),
                    point.price
                );
            }
        }
    }

    Ok(())
}

fn init_sentry(settings: &fare_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
