//! Review source contracts, raw-record normalization, and the Hostaway + fixture services.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rvw_core::{CategoryRating, RawRating, Review, ReviewId, ReviewStatus};
use rvw_http::{FetchError, HttpClientConfig, JsonApi};
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

pub const CRATE_NAME: &str = "rvw-adapters";

pub const REVIEWS_PATH: &str = "/api/reviews/hostaway";

const ID_FIELDS: &[&str] = &["id", "reviewId", "review_id", "ID"];
const GUEST_NAME_FIELDS: &[&str] = &["guestName", "guest_name", "GuestName"];
const LISTING_NAME_FIELDS: &[&str] = &["listingName", "listing_name", "ListingName"];
const CHANNEL_FIELDS: &[&str] = &["channel", "Channel"];
const SUBMITTED_AT_FIELDS: &[&str] = &["submittedAt", "submitted_at", "SubmittedAt"];
const STATUS_FIELDS: &[&str] = &["status", "Status"];
const CATEGORY_LIST_FIELDS: &[&str] = &["categories", "reviewCategory", "review_category"];
const TEXT_FIELDS: &[&str] = &[
    "publicReview",
    "public_review",
    "reviewText",
    "review_text",
    "review",
];
const CATEGORY_NAME_FIELDS: &[&str] = &["category", "Category"];
const CATEGORY_RATING_FIELDS: &[&str] = &["rating", "Rating"];

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Remote source of truth for reviews and their publish status.
#[async_trait]
pub trait ReviewService: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch_reviews(&self) -> Result<Vec<Review>, AdapterError>;

    async fn update_status(&self, id: &ReviewId, status: ReviewStatus) -> Result<(), AdapterError>;
}

#[derive(Debug, Serialize)]
struct StatusUpdate {
    status: ReviewStatus,
}

/// Hostaway-backed review API.
#[derive(Debug, Clone)]
pub struct HostawayReviewService {
    api: JsonApi,
}

impl HostawayReviewService {
    pub fn new(api: JsonApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ReviewService for HostawayReviewService {
    fn name(&self) -> &'static str {
        "hostaway"
    }

    async fn fetch_reviews(&self) -> Result<Vec<Review>, AdapterError> {
        let payload = self.api.get_json(REVIEWS_PATH).await?;
        Ok(normalize_payload(payload))
    }

    async fn update_status(&self, id: &ReviewId, status: ReviewStatus) -> Result<(), AdapterError> {
        self.api
            .patch_json(&review_segments(id), &StatusUpdate { status })
            .await?;
        Ok(())
    }
}

/// Path segments of one review resource; the id is encoded as a single segment.
fn review_segments(id: &ReviewId) -> Vec<&str> {
    REVIEWS_PATH
        .split('/')
        .filter(|segment| !segment.is_empty())
        .chain(std::iter::once(id.as_str()))
        .collect()
}

/// Offline service over a JSON payload on disk; status updates stay in memory.
#[derive(Debug)]
pub struct FixtureReviewService {
    path: PathBuf,
    reviews: Mutex<Vec<Review>>,
}

impl FixtureReviewService {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reviews = load_fixture_reviews(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            reviews: Mutex::new(reviews),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReviewService for FixtureReviewService {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn fetch_reviews(&self) -> Result<Vec<Review>, AdapterError> {
        Ok(self.reviews.lock().await.clone())
    }

    async fn update_status(&self, id: &ReviewId, status: ReviewStatus) -> Result<(), AdapterError> {
        let mut reviews = self.reviews.lock().await;
        let review = reviews
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| AdapterError::Message(format!("review {id} not found in fixture")))?;
        review.status = status;
        Ok(())
    }
}

pub fn load_fixture_reviews(path: impl AsRef<Path>) -> Result<Vec<Review>> {
    let path = path.as_ref();
    let data = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let payload: JsonValue =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", path.display()))?;
    Ok(normalize_payload(payload))
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub fixture_path: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("REVIEWS_API_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3001".to_string()),
            http_timeout_secs: std::env::var("RVW_HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            user_agent: std::env::var("RVW_USER_AGENT")
                .unwrap_or_else(|_| "rvw-dashboard/0.1".to_string()),
            fixture_path: std::env::var("RVW_FIXTURE_PATH").ok().map(PathBuf::from),
        }
    }
}

pub fn service_from_config(config: &ServiceConfig) -> Result<Arc<dyn ReviewService>> {
    if let Some(path) = &config.fixture_path {
        let service = FixtureReviewService::load(path)
            .with_context(|| format!("loading review fixture {}", path.display()))?;
        return Ok(Arc::new(service));
    }
    let api = JsonApi::new(HttpClientConfig {
        base_url: config.base_url.clone(),
        timeout: Duration::from_secs(config.http_timeout_secs),
        user_agent: Some(config.user_agent.clone()),
        ..Default::default()
    })?;
    Ok(Arc::new(HostawayReviewService::new(api)))
}

/// Accept either a bare array of records or an object carrying them under `result`.
pub fn unwrap_payload(payload: JsonValue) -> Vec<JsonValue> {
    match payload {
        JsonValue::Array(records) => records,
        JsonValue::Object(mut map) => match map.remove("result") {
            Some(JsonValue::Array(records)) => records,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

pub fn normalize_payload(payload: JsonValue) -> Vec<Review> {
    unwrap_payload(payload).iter().map(normalize_record).collect()
}

/// Map one raw record of unknown shape onto the canonical review. Never fails.
pub fn normalize_record(raw: &JsonValue) -> Review {
    let id = first_scalar_text(raw, ID_FIELDS)
        .map(ReviewId::new)
        .unwrap_or_else(|| synthetic_id(raw));

    Review {
        id,
        guest_name: first_text(raw, GUEST_NAME_FIELDS),
        listing_name: first_text(raw, LISTING_NAME_FIELDS),
        channel: first_text(raw, CHANNEL_FIELDS),
        submitted_at: first_text(raw, SUBMITTED_AT_FIELDS),
        status: ReviewStatus::from_raw(first_text(raw, STATUS_FIELDS).as_deref()),
        categories: first_non_empty_array(raw, CATEGORY_LIST_FIELDS)
            .map(|entries| entries.iter().map(normalize_category).collect())
            .unwrap_or_default(),
        text: first_text(raw, TEXT_FIELDS),
    }
}

fn normalize_category(entry: &JsonValue) -> CategoryRating {
    CategoryRating {
        category: first_text(entry, CATEGORY_NAME_FIELDS).unwrap_or_default(),
        rating: CATEGORY_RATING_FIELDS
            .iter()
            .find_map(|field| entry.get(*field))
            .cloned()
            .map(RawRating::new)
            .unwrap_or_default(),
    }
}

fn synthetic_id(raw: &JsonValue) -> ReviewId {
    let id = Uuid::new_v5(&Uuid::NAMESPACE_OID, raw.to_string().as_bytes());
    debug!(%id, "review record without id; derived one from its content");
    ReviewId::new(id.to_string())
}

fn first_text(value: &JsonValue, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        value
            .get(*field)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(ToString::to_string)
    })
}

fn first_scalar_text(value: &JsonValue, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match value.get(*field)? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn first_non_empty_array<'a>(value: &'a JsonValue, fields: &[&str]) -> Option<&'a Vec<JsonValue>> {
    fields.iter().find_map(|field| {
        value
            .get(*field)
            .and_then(JsonValue::as_array)
            .filter(|arr| !arr.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn workspace_root() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../..")
            .canonicalize()
            .expect("workspace root")
    }

    fn sample_dir() -> PathBuf {
        workspace_root().join("fixtures/hostaway/sample")
    }

    #[test]
    fn golden_json_snapshot_test_hostaway_sample() {
        let reviews = load_fixture_reviews(sample_dir().join("reviews.json")).unwrap();
        let actual = serde_json::to_value(&reviews).unwrap();
        let expected: JsonValue =
            serde_json::from_str(&fs::read_to_string(sample_dir().join("snapshot.json")).unwrap()).unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn bare_array_and_result_envelope_are_both_accepted() {
        let record = json!({"id": 1, "status": "published"});
        assert_eq!(unwrap_payload(json!([record.clone()])).len(), 1);
        assert_eq!(unwrap_payload(json!({"status": "success", "result": [record]})).len(), 1);
        assert!(unwrap_payload(json!({"status": "success"})).is_empty());
        assert!(unwrap_payload(json!("nope")).is_empty());
    }

    #[test]
    fn first_non_empty_category_source_wins() {
        let review = normalize_record(&json!({
            "id": 3,
            "categories": [],
            "reviewCategory": [{"category": "accuracy", "rating": 8}]
        }));
        assert_eq!(review.categories.len(), 1);
        assert_eq!(review.categories[0].category, "accuracy");
        assert_eq!(review.categories[0].rating.coerce(), 8.0);

        let review = normalize_record(&json!({
            "id": 4,
            "categories": [{"category": "cleanliness", "rating": 5}],
            "reviewCategory": [{"category": "accuracy", "rating": 8}]
        }));
        assert_eq!(review.categories[0].category, "cleanliness");
    }

    #[test]
    fn ratings_are_kept_raw_and_coerced_on_read() {
        let review = normalize_record(&json!({
            "id": 5,
            "categories": [{"category": "accuracy", "rating": "9"}, {"category": "cleanliness"}]
        }));
        assert_eq!(review.categories[0].rating.raw(), &json!("9"));
        assert_eq!(review.categories[1].rating.raw(), &JsonValue::Null);
        assert_eq!(review.average_rating(), 4.5);
    }

    #[test]
    fn shapeless_records_degrade_to_empty_values() {
        let review = normalize_record(&json!({"unexpected": true}));
        assert!(review.guest_name.is_none());
        assert!(review.listing_name.is_none());
        assert!(review.categories.is_empty());
        assert!(review.text.is_none());
        assert_eq!(review.status, ReviewStatus::Unpublished);
        assert!(!review.id.as_str().is_empty());

        let again = normalize_record(&json!({"unexpected": true}));
        assert_eq!(review.id, again.id);

        let not_an_object = normalize_record(&json!(42));
        assert!(not_an_object.categories.is_empty());
    }

    #[test]
    fn text_takes_first_non_empty_candidate() {
        let review = normalize_record(&json!({
            "id": 6,
            "publicReview": "  ",
            "reviewText": "",
            "review": "Lovely stay"
        }));
        assert_eq!(review.text.as_deref(), Some("Lovely stay"));
    }

    #[tokio::test]
    async fn fixture_service_applies_status_updates_in_memory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("reviews.json");
        fs::write(
            &path,
            json!([{"id": 10, "status": "unpublished"}, {"id": 11, "status": "published"}]).to_string(),
        )
        .unwrap();

        let service = FixtureReviewService::load(&path).unwrap();
        service
            .update_status(&ReviewId::new("10"), ReviewStatus::Published)
            .await
            .unwrap();
        let reviews = service.fetch_reviews().await.unwrap();
        assert!(reviews.iter().all(|r| r.is_published()));

        let err = service
            .update_status(&ReviewId::new("missing"), ReviewStatus::Published)
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Message(_)));
    }

    #[test]
    fn review_ids_stay_one_path_segment() {
        let id = ReviewId::new("bk/99?x#y");
        assert_eq!(review_segments(&id), vec!["api", "reviews", "hostaway", "bk/99?x#y"]);

        let api = JsonApi::new(HttpClientConfig::default()).unwrap();
        assert_eq!(
            api.url_for_segments(&review_segments(&id)),
            "http://localhost:3001/api/reviews/hostaway/bk%2F99%3Fx%23y"
        );
    }

    #[test]
    fn fixture_path_in_config_selects_offline_service() {
        let config = ServiceConfig {
            base_url: "http://localhost:3001".into(),
            http_timeout_secs: 5,
            user_agent: "rvw-test".into(),
            fixture_path: Some(sample_dir().join("reviews.json")),
        };
        let service = service_from_config(&config).unwrap();
        assert_eq!(service.name(), "fixture");

        let remote = service_from_config(&ServiceConfig {
            fixture_path: None,
            ..config
        })
        .unwrap();
        assert_eq!(remote.name(), "hostaway");
    }
}
