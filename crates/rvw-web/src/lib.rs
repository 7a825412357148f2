//! Axum JSON API over a [`ReviewSession`] for the guest review dashboard.

use std::path::Path;
use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rvw_adapters::{service_from_config, ServiceConfig};
use rvw_core::{round2, CategoryRating, CategorySelector, Review, ReviewId, ReviewStatus};
use rvw_engine::{
    apply_filters, available_channels, channel_distribution, listing_insight, public_listing,
    rating_trend, tenant_trend, ChannelDistributionRow, ChannelFilter, CountPeriod,
    DashboardOptions, FilterOptions, Granularity, ListingInsight, OptionParseError,
    PublicFilterOptions, RatingPeriod, RatingThreshold, ReviewSession, SortOrder, TimeRange,
    ToggleError, ToggleOutcome, TrendOptions, TrendWindow,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "rvw-web";

const GUEST_PLACEHOLDER: &str = "Guest";
const LISTING_PLACEHOLDER: &str = "Listing";
const TEXT_PLACEHOLDER: &str = "No review text.";

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<ReviewSession>,
    pub options: DashboardOptions,
}

impl AppState {
    pub fn new(session: Arc<ReviewSession>, options: DashboardOptions) -> Self {
        Self { session, options }
    }
}

/// One review as the dashboard renders it: placeholders filled in, average precomputed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewView {
    pub id: ReviewId,
    pub guest_name: String,
    pub listing_name: String,
    pub channel: Option<String>,
    pub submitted_at: Option<String>,
    pub status: ReviewStatus,
    pub categories: Vec<CategoryRating>,
    pub text: String,
    pub average_rating: f64,
}

impl From<&Review> for ReviewView {
    fn from(review: &Review) -> Self {
        Self {
            id: review.id.clone(),
            guest_name: display_or(review.guest_name.as_deref(), GUEST_PLACEHOLDER),
            listing_name: display_or(review.listing_name.as_deref(), LISTING_PLACEHOLDER),
            channel: review.channel.clone(),
            submitted_at: review.submitted_at.clone(),
            status: review.status,
            categories: review.categories.clone(),
            text: display_or(review.text.as_deref(), TEXT_PLACEHOLDER),
            average_rating: round2(review.average_rating()),
        }
    }
}

fn display_or(value: Option<&str>, placeholder: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(placeholder)
        .to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewList {
    pub count: usize,
    pub reviews: Vec<ReviewView>,
}

impl ReviewList {
    pub fn from_refs(reviews: Vec<&Review>) -> Self {
        Self {
            count: reviews.len(),
            reviews: reviews.into_iter().map(ReviewView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct OptionsResponse {
    #[serde(flatten)]
    presets: DashboardOptions,
    channels: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ReviewsQuery {
    category: Option<String>,
    threshold: Option<String>,
    channel: Option<String>,
    range: Option<String>,
    sort: Option<String>,
    unpublished: Option<bool>,
}

impl ReviewsQuery {
    fn to_options(&self) -> Result<FilterOptions, OptionParseError> {
        Ok(FilterOptions {
            channel: parse_or_default::<ChannelFilter>(self.channel.as_deref())
                .unwrap_or_default(),
            only_unpublished: self.unpublished.unwrap_or(false),
            time_range: parse_or_default::<TimeRange>(self.range.as_deref())?,
            rating_threshold: parse_or_default::<RatingThreshold>(self.threshold.as_deref())?,
            sort: parse_or_default::<SortOrder>(self.sort.as_deref())?,
            category: parse_or_default::<CategorySelector>(self.category.as_deref())
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize, Default)]
struct PublicQuery {
    threshold: Option<String>,
    sort: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct TrendQuery {
    window: Option<String>,
    group: Option<String>,
}

impl TrendQuery {
    fn to_options(&self) -> Result<TrendOptions, OptionParseError> {
        Ok(TrendOptions {
            window: parse_or_default::<TrendWindow>(self.window.as_deref())?,
            granularity: self
                .group
                .as_deref()
                .map(Granularity::parse_or_default)
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize, Default)]
struct ToggleQuery {
    #[serde(default)]
    confirm: bool,
}

fn parse_or_default<T>(raw: Option<&str>) -> Result<T, T::Err>
where
    T: std::str::FromStr + Default,
{
    match raw.filter(|v| !v.is_empty()) {
        Some(value) => value.parse(),
        None => Ok(T::default()),
    }
}

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
}

impl From<OptionParseError> for ApiError {
    fn from(err: OptionParseError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<ToggleError> for ApiError {
    fn from(err: ToggleError) -> Self {
        match err {
            ToggleError::NotFound(_) => Self::NotFound(err.to_string()),
            ToggleError::InFlight(_) => Self::Conflict(err.to_string()),
            ToggleError::Remote { .. } => Self::BadGateway(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m),
            Self::Conflict(m) => (StatusCode::CONFLICT, m),
            Self::BadGateway(m) => (StatusCode::BAD_GATEWAY, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/reviews", get(reviews_handler))
        .route("/api/reviews/refresh", post(refresh_handler))
        .route("/api/reviews/{id}/toggle", post(toggle_handler))
        .route("/api/public/reviews", get(public_reviews_handler))
        .route("/api/trends/ratings", get(rating_trend_handler))
        .route("/api/trends/tenants", get(tenant_trend_handler))
        .route("/api/channels", get(channels_handler))
        .route("/api/channels/distribution", get(channel_distribution_handler))
        .route("/api/listings/{name}/insight", get(listing_insight_handler))
        .route("/api/options", get(options_handler))
        .with_state(Arc::new(state))
}

/// Build a session over the configured review service, load the first batch of reviews,
/// and serve on `RVW_WEB_PORT` (default 8000).
pub async fn serve_from_config(config: &ServiceConfig) -> anyhow::Result<()> {
    let port: u16 = std::env::var("RVW_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let service = service_from_config(config)?;
    let session = Arc::new(ReviewSession::new(service));
    if let Err(err) = session.refresh().await {
        warn!(error = %err, "initial review load failed; serving an empty collection");
    }
    let options = DashboardOptions::from_workspace_root(Path::new("."))?;
    serve(AppState::new(session, options), port).await
}

pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, source = state.session.service_name(), "review dashboard listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn reviews_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ReviewsQuery>,
) -> Result<Json<ReviewList>, ApiError> {
    let options = query.to_options()?;
    let reviews = state.session.snapshot().await;
    Ok(Json(ReviewList::from_refs(apply_filters(
        &reviews,
        &options,
        Utc::now(),
    ))))
}

async fn public_reviews_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PublicQuery>,
) -> Result<Json<ReviewList>, ApiError> {
    let options = PublicFilterOptions {
        rating_threshold: parse_or_default(query.threshold.as_deref())?,
        sort: parse_or_default(query.sort.as_deref())?,
    };
    let reviews = state.session.snapshot().await;
    Ok(Json(ReviewList::from_refs(public_listing(&reviews, &options))))
}

async fn rating_trend_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<Vec<RatingPeriod>>, ApiError> {
    let options = query.to_options()?;
    let reviews = state.session.snapshot().await;
    Ok(Json(rating_trend(&reviews, &options, Utc::now())))
}

async fn tenant_trend_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<Vec<CountPeriod>>, ApiError> {
    let options = query.to_options()?;
    let reviews = state.session.snapshot().await;
    Ok(Json(tenant_trend(&reviews, &options, Utc::now())))
}

async fn channels_handler(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    let reviews = state.session.snapshot().await;
    Json(available_channels(&reviews))
}

async fn channel_distribution_handler(
    State(state): State<Arc<AppState>>,
) -> Json<Vec<ChannelDistributionRow>> {
    let reviews = state.session.snapshot().await;
    Json(channel_distribution(&reviews))
}

async fn listing_insight_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(name): AxumPath<String>,
) -> Json<ListingInsight> {
    let reviews = state.session.snapshot().await;
    Json(listing_insight(&reviews, Some(name.as_str())))
}

async fn toggle_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<ToggleQuery>,
) -> Result<Json<ToggleOutcome>, ApiError> {
    let confirm = query.confirm;
    let outcome = state
        .session
        .toggle(&ReviewId::new(id), |_| confirm)
        .await?;
    Ok(Json(outcome))
}

async fn refresh_handler(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    match state.session.refresh().await {
        Ok(count) => Ok(Json(serde_json::json!({ "count": count }))),
        Err(err) => Err(ApiError::BadGateway(format!(
            "failed to load reviews: {err}; keeping the current collection"
        ))),
    }
}

async fn options_handler(State(state): State<Arc<AppState>>) -> Json<OptionsResponse> {
    let reviews = state.session.snapshot().await;
    Json(OptionsResponse {
        presets: state.options.clone(),
        channels: available_channels(&reviews),
    })
}
