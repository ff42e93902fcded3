use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::AppState;
use crate::error::AppError;
use crate::pipeline::format::{percent_change, usd};
use crate::tracker::Published;

use super::artifacts::current;

/// Helper to render templates into axum responses
fn render_template<T: Template>(status: StatusCode, template: &T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            tracing::error!("Template render error: {}", e);
            AppError::Render(format!("template: {e}")).into_response()
        }
    }
}

pub struct CoinView {
    pub name: String,
    pub symbol: String,
    pub price: String,
    pub market_cap: String,
    pub change: String,
    pub change_class: &'static str,
    pub volume: String,
}

pub struct SummaryView {
    pub avg_price: String,
    pub total_market_cap: String,
    pub total_volume: String,
    pub coins_up: usize,
    pub coins_down: usize,
}

/// GET /dashboard
#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardPage {
    pub last_updated: String,
    pub refresh_secs: u64,
    pub summary: SummaryView,
    pub coins: Vec<CoinView>,
}

#[derive(Template)]
#[template(path = "loading.html")]
pub struct LoadingPage {
    pub retry_secs: u64,
}

impl DashboardPage {
    pub fn from_published(published: &Published, refresh_secs: u64) -> Self {
        let stats = &published.stats;
        Self {
            last_updated: published
                .generated_at
                .format("%Y-%m-%d %H:%M UTC")
                .to_string(),
            refresh_secs,
            summary: SummaryView {
                avg_price: usd(stats.overview.avg_price),
                total_market_cap: usd(stats.overview.total_market_cap),
                total_volume: usd(stats.overview.total_volume_24h),
                coins_up: stats.health.positive_performers,
                coins_down: stats.health.negative_performers,
            },
            coins: published
                .rows
                .iter()
                .map(|r| CoinView {
                    name: r.name.clone(),
                    symbol: r.symbol.clone(),
                    price: usd(r.price),
                    market_cap: usd(r.market_cap),
                    change: percent_change(r.change_24h),
                    change_class: if r.change_24h > 0.0 {
                        "positive"
                    } else {
                        "negative"
                    },
                    volume: usd(r.volume_24h),
                })
                .collect(),
        }
    }
}

pub async fn dashboard(State(state): State<AppState>) -> Response {
    let refresh_secs = state.config.refresh_interval.as_secs();

    match current(&state.tracker).await {
        Ok(published) => render_template(
            StatusCode::OK,
            &DashboardPage::from_published(&published, refresh_secs),
        ),
        Err(AppError::NotReady) => {
            render_template(StatusCode::SERVICE_UNAVAILABLE, &LoadingPage { retry_secs: 5 })
        }
        Err(e) => e.into_response(),
    }
}
