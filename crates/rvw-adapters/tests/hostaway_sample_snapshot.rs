use rvw_adapters::{FixtureReviewService, ReviewService};
use rvw_core::{ReviewId, ReviewStatus};

fn sample_dir() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/hostaway/sample")
}

#[test]
fn hostaway_sample_fixtures_exist() {
    assert!(sample_dir().join("reviews.json").exists());
    assert!(sample_dir().join("snapshot.json").exists());
}

#[tokio::test]
async fn fixture_service_serves_the_sample_and_applies_status_updates() {
    let service = FixtureReviewService::load(sample_dir().join("reviews.json")).unwrap();
    assert_eq!(service.name(), "fixture");

    let reviews = service.fetch_reviews().await.unwrap();
    assert_eq!(reviews.len(), 5);
    assert!(reviews.iter().all(|r| !r.id.as_str().is_empty()));

    service
        .update_status(&ReviewId::new("7454"), ReviewStatus::Published)
        .await
        .unwrap();
    let after = service.fetch_reviews().await.unwrap();
    let updated = after.iter().find(|r| r.id.as_str() == "7454").unwrap();
    assert!(updated.is_published());
}
