use axum::{extract::State, response::Html, routing::get, Form, Router};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fare_core::chart::ChartStore;
use fare_core::oracle::forest::ForestModel;
use fare_core::oracle::PriceOracle;
use fare_core::trip::TripForm;

mod page;
mod submit;

const STATIC_ROUTE: &str = "/static";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = fare_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let oracle: Option<Arc<dyn PriceOracle>> = match ForestModel::load(&settings.model_path) {
        Ok(model) => Some(Arc::new(model) as Arc<dyn PriceOracle>),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "price model load failed; starting API in degraded mode");
            None
        }
    };

    let charts = ChartStore::open(&settings.static_dir, STATIC_ROUTE)?;

    let state = AppState {
        oracle,
        charts,
        chart_keep: settings.chart_keep,
        render_chart: settings.render_chart,
    };

    let app = Router::new()
        .route("/", get(home).post(submit_form))
        .route("/healthz", get(healthz))
        .nest_service(STATIC_ROUTE, ServeDir::new(&settings.static_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    oracle: Option<Arc<dyn PriceOracle>>,
    charts: ChartStore,
    chart_keep: usize,
    render_chart: bool,
}

async fn home() -> Html<String> {
    Html(page::render(&page::PageView::default()))
}

async fn submit_form(State(state): State<AppState>, Form(form): Form<TripForm>) -> Html<String> {
    let view = tokio::task::spawn_blocking(move || {
        let mut rng = StdRng::from_entropy();
        submit::handle(&state, &form, &mut rng)
    })
    .await;

    match view {
        Ok(view) => Html(page::render(&view)),
        Err(e) => {
            let err = anyhow::Error::new(e);
            sentry_anyhow::capture_anyhow(&err);
            tracing::error!(error = %err, "prediction task failed");
            Html(page::render(&page::PageView::failure(
                &TripForm::default(),
                "Something went wrong while estimating the price.".to_string(),
            )))
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
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
