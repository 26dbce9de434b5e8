#![forbid(unsafe_code)]

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::service::WorktreeService;
use crate::core::worktree::Worktree;

/// A finished listing, tagged with the request that produced it.
#[derive(Debug)]
pub struct RefreshOutcome {
    pub generation: u64,
    pub worktrees: Vec<Worktree>,
}

/// Runs worktree listings off the event loop.
///
/// Every request gets the next generation number and aborts the listing still
/// in flight, if any. Outcomes come back over the channel returned by
/// [`Refresher::new`]; only the one matching [`Refresher::latest`] is accepted,
/// so a slow listing can never overwrite a newer one.
#[derive(Debug)]
pub struct Refresher {
    service: Arc<WorktreeService>,
    tx: mpsc::UnboundedSender<RefreshOutcome>,
    latest: u64,
    inflight: Option<JoinHandle<()>>,
}

impl Refresher {
    #[must_use]
    pub fn new(service: Arc<WorktreeService>) -> (Self, mpsc::UnboundedReceiver<RefreshOutcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                service,
                tx,
                latest: 0,
                inflight: None,
            },
            rx,
        )
    }

    /// Starts a new listing and returns its generation.
    pub fn request(&mut self) -> u64 {
        if let Some(prev) = self.inflight.take()
            && !prev.is_finished()
        {
            log::debug!("cancelling refresh generation {}", self.latest);
            prev.abort();
        }

        self.latest += 1;
        let generation = self.latest;
        let service = Arc::clone(&self.service);
        let tx = self.tx.clone();
        self.inflight = Some(tokio::spawn(async move {
            let worktrees = service.list_worktrees().await;
            // The receiver is gone only when the app is shutting down.
            let _ = tx.send(RefreshOutcome {
                generation,
                worktrees,
            });
        }));
        generation
    }

    /// Returns the worktrees if `outcome` answers the latest request.
    #[must_use]
    pub fn accept(&self, outcome: RefreshOutcome) -> Option<Vec<Worktree>> {
        if outcome.generation == self.latest {
            Some(outcome.worktrees)
        } else {
            log::debug!(
                "dropping stale refresh generation {} (latest {})",
                outcome.generation,
                self.latest
            );
            None
        }
    }

    #[must_use]
    pub fn latest(&self) -> u64 {
        self.latest
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inflight.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for Refresher {
    fn drop(&mut self) {
        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    fn service_outside_repo() -> (tempfile::TempDir, Arc<WorktreeService>) {
        let td = tempfile::tempdir().expect("tempdir");
        let svc = WorktreeService::with_default_timeout(td.path().to_path_buf());
        (td, Arc::new(svc))
    }

    #[test]
    fn only_the_latest_generation_is_accepted() {
        let (_td, svc) = service_outside_repo();
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let _guard = rt.enter();

        let (mut refresher, _rx) = Refresher::new(svc);
        assert_eq!(refresher.request(), 1);
        assert_eq!(refresher.request(), 2);
        assert_eq!(refresher.latest(), 2);

        let stale = RefreshOutcome {
            generation: 1,
            worktrees: vec![Worktree {
                path: "/old".to_owned(),
                ..Worktree::default()
            }],
        };
        assert!(refresher.accept(stale).is_none());

        let fresh = RefreshOutcome {
            generation: 2,
            worktrees: vec![Worktree {
                path: "/new".to_owned(),
                ..Worktree::default()
            }],
        };
        let accepted = refresher.accept(fresh).expect("latest accepted");
        assert_eq!(accepted[0].path, "/new");
    }

    #[tokio::test]
    async fn outcome_arrives_over_channel() {
        let (_td, svc) = service_outside_repo();
        let (mut refresher, mut rx) = Refresher::new(svc);

        let generation = refresher.request();
        let outcome = rx.recv().await.expect("outcome");
        assert_eq!(outcome.generation, generation);
        let worktrees = refresher.accept(outcome).expect("accepted");
        assert!(worktrees.is_empty());
    }

    /// A service whose git takes a second to answer with an empty listing.
    #[cfg(unix)]
    fn slow_service() -> (tempfile::TempDir, Arc<WorktreeService>) {
        use crate::core::git::{self, Git};

        let td = tempfile::tempdir().expect("tempdir");
        let fake = git::testing::fake_git(td.path(), "sleep 1");
        let git = Git::new(td.path().to_path_buf()).with_command(fake);
        let svc = WorktreeService::from_git(td.path().to_path_buf(), Some(git), git::DEFAULT_TIMEOUT);
        (td, Arc::new(svc))
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn superseded_request_is_cancelled() {
        let (_td, svc) = slow_service();
        let (mut refresher, mut rx) = Refresher::new(svc);

        refresher.request();
        let second = refresher.request();
        assert!(refresher.is_pending());

        let outcome = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("outcome in time")
            .expect("outcome");
        assert_eq!(outcome.generation, second);
        assert!(refresher.accept(outcome).is_some());

        // The first listing was aborted, so nothing else ever arrives.
        let late = tokio::time::timeout(Duration::from_millis(1500), rx.recv()).await;
        assert!(late.is_err(), "unexpected outcome: {late:?}");
        assert!(!refresher.is_pending());
    }
}
