use crate::page::PageView;
use crate::AppState;
use fare_core::chart::{self, StoredChart};
use fare_core::domain::series::TimeSeries;
use fare_core::trip::{self, TripForm, TripRequest};
use rand::Rng;

pub const MODEL_UNAVAILABLE: &str = "The price model is not available right now. Please try again later.";

/// Runs one form submission end to end. Blocking: call off the async runtime.
pub fn handle<R: Rng>(state: &AppState, form: &TripForm, rng: &mut R) -> PageView {
    let request = match TripRequest::from_form(form) {
        Ok(request) => request,
        Err(err) => {
            tracing::info!(error = %err, "rejected trip form");
            return PageView::failure(form, err.to_string());
        }
    };

    let Some(oracle) = &state.oracle else {
        return PageView::failure(form, MODEL_UNAVAILABLE.to_string());
    };

    let quote = match trip::quote(oracle.as_ref(), request, rng, state.render_chart) {
        Ok(quote) => quote,
        Err(err) => {
            tracing::warn!(error = %err, "trip quote failed");
            return PageView::failure(form, err.to_string());
        }
    };

    let chart_url = quote
        .history
        .as_ref()
        .and_then(|history| match store_chart(state, history) {
            Ok(stored) => Some(stored.url),
            Err(err) => {
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "chart generation failed");
                None
            }
        });

    PageView::success(form, quote.headline(), chart_url)
}

fn store_chart(state: &AppState, history: &TimeSeries) -> anyhow::Result<StoredChart> {
    let svg = chart::render_trend_svg(history)?;

    // Make room first so the chart saved below is never a prune candidate.
    match state.charts.prune(state.chart_keep.saturating_sub(1)) {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "pruned old charts"),
        Err(err) => tracing::warn!(error = %err, "chart pruning failed"),
    }
    state.charts.save(&svg)
}
