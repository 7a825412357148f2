//! Session-owned review collection and the optimistic publish toggle.

use std::collections::HashMap;
use std::sync::Arc;

use rvw_adapters::{AdapterError, ReviewService};
use rvw_core::{Review, ReviewId, ReviewStatus};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Latest state of a status change per review id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleTransition {
    Pending,
    Confirmed,
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ToggleOutcome {
    /// Unpublishing was not confirmed; nothing changed and nothing was sent.
    Declined { id: ReviewId },
    Applied { id: ReviewId, status: ReviewStatus },
}

#[derive(Debug, Error)]
pub enum ToggleError {
    #[error("review {0} not found")]
    NotFound(ReviewId),
    #[error("a status change for review {0} is already in flight")]
    InFlight(ReviewId),
    #[error("failed to update review {id} on the review service; status reverted to {restored}")]
    Remote {
        id: ReviewId,
        restored: ReviewStatus,
        #[source]
        source: AdapterError,
    },
}

pub struct ReviewSession {
    service: Arc<dyn ReviewService>,
    reviews: RwLock<Vec<Review>>,
    transitions: Mutex<HashMap<ReviewId, ToggleTransition>>,
}

impl ReviewSession {
    pub fn new(service: Arc<dyn ReviewService>) -> Self {
        Self::with_reviews(service, Vec::new())
    }

    pub fn with_reviews(service: Arc<dyn ReviewService>, reviews: Vec<Review>) -> Self {
        Self {
            service,
            reviews: RwLock::new(reviews),
            transitions: Mutex::new(HashMap::new()),
        }
    }

    pub fn service_name(&self) -> &'static str {
        self.service.name()
    }

    /// Replace the collection with a fresh fetch. On failure the current collection stays.
    pub async fn refresh(&self) -> Result<usize, AdapterError> {
        match self.service.fetch_reviews().await {
            Ok(fresh) => {
                let count = fresh.len();
                *self.reviews.write().await = fresh;
                info!(service = self.service.name(), count, "review collection refreshed");
                Ok(count)
            }
            Err(err) => {
                warn!(service = self.service.name(), error = %err, "failed to load reviews; keeping current collection");
                Err(err)
            }
        }
    }

    /// Copy of the current collection for pure recomputation.
    pub async fn snapshot(&self) -> Vec<Review> {
        self.reviews.read().await.clone()
    }

    pub async fn review(&self, id: &ReviewId) -> Option<Review> {
        self.reviews.read().await.iter().find(|r| &r.id == id).cloned()
    }

    pub async fn transition(&self, id: &ReviewId) -> Option<ToggleTransition> {
        self.transitions.lock().await.get(id).copied()
    }

    /// Flip a review between published and unpublished.
    ///
    /// The per-id slot is claimed before the review is read, so at most one toggle per id is
    /// in flight; a second attempt is rejected with [`ToggleError::InFlight`]. Unpublishing asks
    /// `confirm_unpublish` first, while the collection is locked. The new status is applied
    /// locally before the service is called and reverted if the call fails.
    pub async fn toggle<F>(&self, id: &ReviewId, confirm_unpublish: F) -> Result<ToggleOutcome, ToggleError>
    where
        F: FnOnce(&Review) -> bool,
    {
        let previous = {
            let mut transitions = self.transitions.lock().await;
            if transitions.get(id) == Some(&ToggleTransition::Pending) {
                return Err(ToggleError::InFlight(id.clone()));
            }
            transitions.insert(id.clone(), ToggleTransition::Pending)
        };

        let (prior, target) = match self.begin_flip(id, confirm_unpublish).await {
            Flip::Started { prior, target } => (prior, target),
            Flip::Declined => {
                self.release_slot(id, previous).await;
                return Ok(ToggleOutcome::Declined { id: id.clone() });
            }
            Flip::Missing => {
                self.release_slot(id, previous).await;
                return Err(ToggleError::NotFound(id.clone()));
            }
        };

        match self.service.update_status(id, target).await {
            Ok(()) => {
                self.transitions
                    .lock()
                    .await
                    .insert(id.clone(), ToggleTransition::Confirmed);
                Ok(ToggleOutcome::Applied {
                    id: id.clone(),
                    status: target,
                })
            }
            Err(source) => {
                self.restore_status(id, prior, target).await;
                self.transitions
                    .lock()
                    .await
                    .insert(id.clone(), ToggleTransition::RolledBack);
                warn!(review_id = %id, error = %source, "status update failed; rolled back to {prior}");
                Err(ToggleError::Remote {
                    id: id.clone(),
                    restored: prior,
                    source,
                })
            }
        }
    }

    /// Read the current status, confirm if unpublishing, and apply the opposite status, all
    /// under one write lock.
    async fn begin_flip<F>(&self, id: &ReviewId, confirm_unpublish: F) -> Flip
    where
        F: FnOnce(&Review) -> bool,
    {
        let mut reviews = self.reviews.write().await;
        let Some(review) = reviews.iter_mut().find(|r| &r.id == id) else {
            return Flip::Missing;
        };
        if review.is_published() && !confirm_unpublish(review) {
            return Flip::Declined;
        }
        let prior = review.status;
        let target = prior.toggled();
        review.status = target;
        Flip::Started { prior, target }
    }

    /// Put `prior` back unless something other than this toggle changed the status since.
    async fn restore_status(&self, id: &ReviewId, prior: ReviewStatus, applied: ReviewStatus) {
        let mut reviews = self.reviews.write().await;
        if let Some(review) = reviews.iter_mut().find(|r| &r.id == id) {
            if review.status == applied {
                review.status = prior;
            }
        }
    }

    async fn release_slot(&self, id: &ReviewId, previous: Option<ToggleTransition>) {
        let mut transitions = self.transitions.lock().await;
        match previous {
            Some(transition) => transitions.insert(id.clone(), transition),
            None => transitions.remove(id),
        };
    }
}

enum Flip {
    Started {
        prior: ReviewStatus,
        target: ReviewStatus,
    },
    Declined,
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::public_listing;
    use crate::options::PublicFilterOptions;
    use crate::test_support::{published, review};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct FakeService {
        reviews: Vec<Review>,
        fail_updates: AtomicBool,
        fail_fetch: AtomicBool,
        update_calls: AtomicUsize,
        entered: Option<Arc<Notify>>,
        release: Option<Arc<Notify>>,
    }

    #[async_trait]
    impl ReviewService for FakeService {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn fetch_reviews(&self) -> Result<Vec<Review>, AdapterError> {
            if self.fail_fetch.load(Ordering::SeqCst) {
                return Err(AdapterError::Message("service unavailable".into()));
            }
            Ok(self.reviews.clone())
        }

        async fn update_status(&self, _id: &ReviewId, _status: ReviewStatus) -> Result<(), AdapterError> {
            self.update_calls.fetch_add(1, Ordering::SeqCst);
            if let (Some(entered), Some(release)) = (&self.entered, &self.release) {
                entered.notify_one();
                release.notified().await;
            }
            if self.fail_updates.load(Ordering::SeqCst) {
                return Err(AdapterError::Message("boom".into()));
            }
            Ok(())
        }
    }

    fn seeded() -> Vec<Review> {
        vec![
            published(review("pub", "2024-06-01", &[("cleanliness", 9.0)])),
            review("draft", "2024-06-02", &[("cleanliness", 8.0)]),
        ]
    }

    fn session_with(service: FakeService) -> (Arc<FakeService>, ReviewSession) {
        let service = Arc::new(service);
        let session = ReviewSession::with_reviews(service.clone(), seeded());
        (service, session)
    }

    #[tokio::test]
    async fn declined_unpublish_changes_nothing() {
        let (service, session) = session_with(FakeService::default());
        let before = session.snapshot().await;

        let outcome = session.toggle(&ReviewId::new("pub"), |_| false).await.unwrap();

        assert_eq!(outcome, ToggleOutcome::Declined { id: ReviewId::new("pub") });
        assert_eq!(session.snapshot().await, before);
        assert_eq!(service.update_calls.load(Ordering::SeqCst), 0);
        assert_eq!(session.transition(&ReviewId::new("pub")).await, None);
    }

    #[tokio::test]
    async fn confirmed_unpublish_is_applied() {
        let (service, session) = session_with(FakeService::default());
        let outcome = session.toggle(&ReviewId::new("pub"), |_| true).await.unwrap();
        assert_eq!(
            outcome,
            ToggleOutcome::Applied {
                id: ReviewId::new("pub"),
                status: ReviewStatus::Unpublished
            }
        );
        let review = session.review(&ReviewId::new("pub")).await.unwrap();
        assert_eq!(review.status, ReviewStatus::Unpublished);
        assert_eq!(service.update_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            session.transition(&ReviewId::new("pub")).await,
            Some(ToggleTransition::Confirmed)
        );
    }

    #[tokio::test]
    async fn publishing_does_not_ask_for_confirmation() {
        let (_service, session) = session_with(FakeService::default());
        let outcome = session
            .toggle(&ReviewId::new("draft"), |_| panic!("publishing must not prompt"))
            .await
            .unwrap();
        assert!(matches!(outcome, ToggleOutcome::Applied { status: ReviewStatus::Published, .. }));
    }

    #[tokio::test]
    async fn remote_failure_rolls_back_status() {
        let service = FakeService::default();
        service.fail_updates.store(true, Ordering::SeqCst);
        let (_service, session) = session_with(service);
        let before_public = public_listing(&session.snapshot().await, &PublicFilterOptions::default())
            .into_iter()
            .map(|r| r.id.clone())
            .collect::<Vec<_>>();

        let err = session.toggle(&ReviewId::new("draft"), |_| true).await.unwrap_err();

        assert!(matches!(
            err,
            ToggleError::Remote { restored: ReviewStatus::Unpublished, .. }
        ));
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot[1].status, ReviewStatus::Unpublished);
        let after_public = public_listing(&snapshot, &PublicFilterOptions::default())
            .into_iter()
            .map(|r| r.id.clone())
            .collect::<Vec<_>>();
        assert_eq!(before_public, after_public);
        assert_eq!(
            session.transition(&ReviewId::new("draft")).await,
            Some(ToggleTransition::RolledBack)
        );
    }

    #[tokio::test]
    async fn optimistic_status_is_visible_while_pending_and_second_toggle_is_rejected() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let (_service, session) = session_with(FakeService {
            entered: Some(entered.clone()),
            release: Some(release.clone()),
            ..Default::default()
        });
        let session = Arc::new(session);

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.toggle(&ReviewId::new("draft"), |_| true).await }
        });
        entered.notified().await;

        let pending = session.review(&ReviewId::new("draft")).await.unwrap();
        assert_eq!(pending.status, ReviewStatus::Published);
        assert_eq!(
            session.transition(&ReviewId::new("draft")).await,
            Some(ToggleTransition::Pending)
        );

        let second = session.toggle(&ReviewId::new("draft"), |_| true).await;
        assert!(matches!(second, Err(ToggleError::InFlight(_))));

        release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, ToggleOutcome::Applied { status: ReviewStatus::Published, .. }));
    }

    #[tokio::test]
    async fn toggle_reads_status_only_after_claiming_the_slot() {
        let (service, session) = session_with(FakeService::default());
        let session = Arc::new(session);
        let asked = Arc::new(AtomicBool::new(false));

        let held = session.transitions.lock().await;
        let waiting = tokio::spawn({
            let session = session.clone();
            let asked = asked.clone();
            async move {
                session
                    .toggle(&ReviewId::new("draft"), move |_| {
                        asked.store(true, Ordering::SeqCst);
                        true
                    })
                    .await
            }
        });
        tokio::task::yield_now().await;

        // Another toggle published "draft" and finished while the first one waited.
        session.reviews.write().await[1].status = ReviewStatus::Published;
        let mut held = held;
        held.insert(ReviewId::new("draft"), ToggleTransition::Confirmed);
        drop(held);

        let outcome = waiting.await.unwrap().unwrap();
        assert_eq!(
            outcome,
            ToggleOutcome::Applied {
                id: ReviewId::new("draft"),
                status: ReviewStatus::Unpublished
            }
        );
        assert!(asked.load(Ordering::SeqCst));
        let review = session.review(&ReviewId::new("draft")).await.unwrap();
        assert_eq!(review.status, ReviewStatus::Unpublished);
        assert_eq!(service.update_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn declined_or_missing_toggle_releases_the_slot() {
        let (_service, session) = session_with(FakeService::default());
        let pub_id = ReviewId::new("pub");

        session.toggle(&pub_id, |_| false).await.unwrap();
        assert_eq!(session.transition(&pub_id).await, None);
        session.toggle(&pub_id, |_| true).await.unwrap();
        assert_eq!(session.transition(&pub_id).await, Some(ToggleTransition::Confirmed));
        session.toggle(&pub_id, |_| false).await.unwrap();
        let declined = session.toggle(&pub_id, |_| false).await.unwrap();
        assert_eq!(declined, ToggleOutcome::Declined { id: pub_id.clone() });
        assert_eq!(session.transition(&pub_id).await, Some(ToggleTransition::Confirmed));

        let ghost = ReviewId::new("ghost");
        assert!(session.toggle(&ghost, |_| true).await.is_err());
        assert_eq!(session.transition(&ghost).await, None);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let (_service, session) = session_with(FakeService::default());
        let err = session.toggle(&ReviewId::new("ghost"), |_| true).await.unwrap_err();
        assert!(matches!(err, ToggleError::NotFound(_)));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_the_current_collection() {
        let service = FakeService {
            reviews: vec![review("fresh", "2024-07-01", &[])],
            ..Default::default()
        };
        let (service, session) = session_with(service);

        service.fail_fetch.store(true, Ordering::SeqCst);
        assert!(session.refresh().await.is_err());
        assert_eq!(session.snapshot().await.len(), 2);

        service.fail_fetch.store(false, Ordering::SeqCst);
        assert_eq!(session.refresh().await.unwrap(), 1);
        assert_eq!(session.snapshot().await[0].id.as_str(), "fresh");
    }
}
