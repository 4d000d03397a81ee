// src/pipeline/scheduler.rs

//! Periodic driver for novel checks.
//!
//! Each tick re-reads the tracked set from the store, checks every novel
//! with bounded concurrency and delivers events as soon as their novel's
//! check finishes. Ticks are single-flight: a tick that would overlap a
//! running one is skipped.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::check::{CheckOutcome, CheckReport, NovelChecker};
use crate::error::Result;
use crate::models::{NovelId, SchedulerConfig, UserId};
use crate::notify::{DeliveryReport, Notifier};
use crate::storage::NovelStore;

/// Lookups of a novel's subscribers before its event is given up.
const SUBSCRIBER_LOOKUP_ATTEMPTS: usize = 2;

/// What one tick did.
#[derive(Debug, Clone)]
pub struct TickSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub seeded: usize,
    pub unchanged: usize,
    pub updated: usize,
    pub regressed: usize,
    pub reset: usize,
    pub untracked: usize,
    pub failed: usize,
    pub notifications_delivered: usize,
    pub notifications_failed: usize,
    /// Novels that produced an event but had no subscribers left to receive it
    pub orphaned: Vec<NovelId>,
    /// Novels whose event was dropped because subscribers could not be loaded
    pub undelivered: Vec<NovelId>,
    /// `(novel, error)` for every failed check
    pub failures: Vec<(NovelId, String)>,
}

impl TickSummary {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            total: 0,
            seeded: 0,
            unchanged: 0,
            updated: 0,
            regressed: 0,
            reset: 0,
            untracked: 0,
            failed: 0,
            notifications_delivered: 0,
            notifications_failed: 0,
            orphaned: Vec::new(),
            undelivered: Vec::new(),
            failures: Vec::new(),
        }
    }

    fn record(&mut self, run: &NovelRun) {
        let id = &run.report.novel_id;
        self.total += 1;
        match &run.report.outcome {
            CheckOutcome::Seeded => self.seeded += 1,
            CheckOutcome::Unchanged { .. } => self.unchanged += 1,
            CheckOutcome::Updated => self.updated += 1,
            CheckOutcome::Regressed => self.regressed += 1,
            CheckOutcome::Reset => self.reset += 1,
            CheckOutcome::Untracked => self.untracked += 1,
            CheckOutcome::Failed { error, .. } => {
                self.failed += 1;
                self.failures.push((id.clone(), error.clone()));
            }
        }
        self.notifications_delivered += run.delivery.delivered();
        self.notifications_failed += run.delivery.failed;
        match run.dispatch {
            Dispatch::Orphaned => self.orphaned.push(id.clone()),
            Dispatch::Undelivered => self.undelivered.push(id.clone()),
            Dispatch::NoEvent | Dispatch::Sent => {}
        }
    }
}

/// What became of a novel's event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    NoEvent,
    Sent,
    /// Nobody was subscribed any more
    Orphaned,
    /// Subscribers could not be loaded
    Undelivered,
}

/// One novel's check together with its delivery.
#[derive(Debug, Clone)]
pub struct NovelRun {
    pub report: CheckReport,
    pub delivery: DeliveryReport,
    pub dispatch: Dispatch,
}

pub struct Scheduler {
    checker: Arc<NovelChecker>,
    store: Arc<dyn NovelStore>,
    notifier: Arc<dyn Notifier>,
    config: SchedulerConfig,
    tick_lock: Mutex<()>,
}

impl Scheduler {
    pub fn new(
        checker: Arc<NovelChecker>,
        store: Arc<dyn NovelStore>,
        notifier: Arc<dyn Notifier>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            checker,
            store,
            notifier,
            config,
            tick_lock: Mutex::new(()),
        }
    }

    /// Run one tick, or return `None` if another tick is still in flight.
    pub async fn try_tick(&self) -> Result<Option<TickSummary>> {
        let Ok(_guard) = self.tick_lock.try_lock() else {
            log::warn!("Previous tick still running, skipping this one");
            return Ok(None);
        };
        self.tick().await.map(Some)
    }

    async fn tick(&self) -> Result<TickSummary> {
        let started = Instant::now();
        let mut summary = TickSummary::new(Utc::now());

        let tracked = self.store.list_tracked_novel_ids().await?;
        log::info!(
            "Checking {} novels ({} at a time)",
            tracked.len(),
            self.config.max_concurrent
        );

        let mut results = stream::iter(tracked)
            .map(|id| async move {
                let run = self.check_novel(&id).await;
                let delay = self.config.request_delay();
                if !delay.is_zero() {
                    time::sleep(delay).await;
                }
                run
            })
            .buffer_unordered(self.config.max_concurrent.max(1));

        while let Some(run) = results.next().await {
            summary.record(&run);
        }

        summary.finished_at = Utc::now();
        log::info!(
            "Tick done in {:?}: {} checked, {} updated, {} seeded, {} failed, {} sent",
            started.elapsed(),
            summary.total,
            summary.updated,
            summary.seeded,
            summary.failed,
            summary.notifications_delivered
        );
        Ok(summary)
    }

    /// Check one novel and hand its event to the notifier right away, so a
    /// slow delivery never holds back other novels' results.
    pub async fn check_novel(&self, id: &NovelId) -> NovelRun {
        let report = self.checker.check(id).await;
        let Some(event) = report.event.clone() else {
            return NovelRun {
                report,
                delivery: DeliveryReport::default(),
                dispatch: Dispatch::NoEvent,
            };
        };

        let (delivery, dispatch) = match self.subscribers(id).await {
            Ok(subscribers) if subscribers.is_empty() => {
                log::info!("[{}] update found but nobody is subscribed", id);
                (DeliveryReport::default(), Dispatch::Orphaned)
            }
            Ok(subscribers) => {
                let delivery = self.notifier.deliver(&event, &subscribers).await;
                let chapter = &event.new_chapter;
                for user in &delivery.delivered_to {
                    if let Err(e) = self.store.record_delivery(user, id, chapter).await {
                        log::warn!("[{}] could not record delivery to {}: {}", id, user, e);
                    }
                }
                (delivery, Dispatch::Sent)
            }
            Err(e) => {
                log::error!(
                    "[{}] could not load subscribers, '{}' was not delivered: {}",
                    id,
                    event.new_chapter.label(),
                    e
                );
                (DeliveryReport::default(), Dispatch::Undelivered)
            }
        };

        NovelRun {
            report,
            delivery,
            dispatch,
        }
    }

    async fn subscribers(&self, id: &NovelId) -> Result<BTreeSet<UserId>> {
        let mut attempt = 1;
        loop {
            match self.store.list_subscribers(id).await {
                Ok(subscribers) => return Ok(subscribers),
                Err(e) if attempt < SUBSCRIBER_LOOKUP_ATTEMPTS => {
                    log::warn!("[{}] subscriber lookup failed, retrying: {}", id, e);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Tick on the configured interval until `shutdown` resolves.
    ///
    /// A tick in progress when `shutdown` fires is abandoned; per-novel
    /// records already written stay written.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let period = self.config.check_interval();
        let mut interval = if self.config.check_on_start {
            time::interval(period)
        } else {
            time::interval_at(Instant::now() + period, period)
        };
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        log::info!("Scheduler started, checking every {:?}", period);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    tokio::select! {
                        _ = &mut shutdown => break,
                        result = self.try_tick() => {
                            if let Err(e) = result {
                                log::error!("Tick failed: {}", e);
                            }
                        }
                    }
                }
            }
        }

        log::info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{CatalogSelectors, UpdateEvent};
    use crate::pipeline::check::tests::{BASE, FlakyStore, StubFetcher, novel, page};
    use crate::services::{CatalogParser, Fetcher};
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: StdMutex<Vec<(UserId, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, user: &UserId, event: &UpdateEvent) -> Result<()> {
            if user == "broken" {
                return Err(AppError::validation("chat not found"));
            }
            self.sent
                .lock()
                .unwrap()
                .push((user.clone(), event.new_chapter.title.clone()));
            Ok(())
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            check_interval_secs: 3600,
            max_concurrent: 2,
            request_delay_ms: 0,
            check_on_start: true,
        }
    }

    fn scheduler(
        fetcher: Arc<dyn Fetcher>,
        store: Arc<dyn NovelStore>,
        notifier: Arc<RecordingNotifier>,
    ) -> Scheduler {
        let parser = CatalogParser::new(&CatalogSelectors::default()).unwrap();
        let checker = Arc::new(NovelChecker::new(fetcher, store.clone(), parser, BASE));
        Scheduler::new(checker, store, notifier, config())
    }

    #[tokio::test]
    async fn test_failure_is_isolated_and_events_delivered() {
        let (good, bad) = (novel("1"), novel("2"));
        let fetcher = Arc::new(StubFetcher::default());
        let store = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(RecordingNotifier::default());

        for user in ["alice", "broken"] {
            store.add_subscription(&user.into(), &good).await.unwrap();
        }
        store.add_subscription(&"bob".into(), &bad).await.unwrap();

        fetcher.push(&good, Ok(page(&good, &[(1, false)])));
        fetcher.push(&bad, Ok(page(&bad, &[(1, false)])));
        fetcher.push(&good, Ok(page(&good, &[(1, false), (2, false)])));
        fetcher.push(&bad, Err("503 Service Unavailable".into()));

        let scheduler = scheduler(fetcher, store.clone(), notifier.clone());

        let first = scheduler.try_tick().await.unwrap().unwrap();
        assert_eq!((first.total, first.seeded, first.failed), (2, 2, 0));

        let second = scheduler.try_tick().await.unwrap().unwrap();
        assert_eq!(second.total, 2);
        assert_eq!(second.updated, 1);
        assert_eq!(second.failed, 1);
        assert_eq!(second.failures[0].0, bad);
        assert_eq!(second.notifications_delivered, 1);
        assert_eq!(second.notifications_failed, 1);

        let sent = notifier.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![("alice".to_string(), "Ch2".to_string())]);

        let bad_state = store.get_novel_state(&bad).await.unwrap().unwrap();
        assert_eq!(bad_state.consecutive_failures, 1);
        assert_eq!(bad_state.last_effective_chapter.unwrap().title, "Ch1");

        // Only successful sends are remembered per subscriber
        let alice = store.get_subscription(&"alice".into(), &good).await.unwrap();
        assert_eq!(alice.unwrap().last_notified.unwrap().title, "Ch2");
        let broken = store.get_subscription(&"broken".into(), &good).await.unwrap();
        assert!(broken.unwrap().last_notified.is_none());
    }

    #[tokio::test]
    async fn test_untracked_novels_are_not_checked() {
        let id = novel("5");
        let store = Arc::new(MemoryStorage::new());
        store.add_subscription(&"alice".into(), &id).await.unwrap();
        store.remove_subscription(&"alice".into(), &id).await.unwrap();

        let scheduler = scheduler(
            Arc::new(StubFetcher::default()),
            store,
            Arc::new(RecordingNotifier::default()),
        );
        let summary = scheduler.try_tick().await.unwrap().unwrap();
        assert_eq!(summary.total, 0);
    }

    #[tokio::test]
    async fn test_subscriber_lookup_failure_is_reported() {
        let id = novel("1");
        let fetcher = Arc::new(StubFetcher::default());
        let store = Arc::new(FlakyStore::default());
        let notifier = Arc::new(RecordingNotifier::default());
        store.inner.add_subscription(&"alice".into(), &id).await.unwrap();
        fetcher.push(&id, Ok(page(&id, &[(1, false)])));
        fetcher.push(&id, Ok(page(&id, &[(1, false), (2, false)])));

        let scheduler = scheduler(fetcher, store.clone(), notifier.clone());
        scheduler.try_tick().await.unwrap().unwrap();

        store.fail_subscribers.store(true, Ordering::SeqCst);
        let summary = scheduler.try_tick().await.unwrap().unwrap();

        assert_eq!(summary.updated, 1);
        assert_eq!(summary.undelivered, vec![id.clone()]);
        assert!(summary.orphaned.is_empty());
        assert_eq!(summary.notifications_delivered, 0);
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_novel_delivers_single_update() {
        let id = novel("3");
        let fetcher = Arc::new(StubFetcher::default());
        let store = Arc::new(MemoryStorage::new());
        let notifier = Arc::new(RecordingNotifier::default());
        store.add_subscription(&"alice".into(), &id).await.unwrap();
        fetcher.push(&id, Ok(page(&id, &[(1, false)])));
        fetcher.push(&id, Ok(page(&id, &[(1, false), (2, false)])));

        let scheduler = scheduler(fetcher, store, notifier.clone());
        assert_eq!(scheduler.check_novel(&id).await.dispatch, Dispatch::NoEvent);

        let run = scheduler.check_novel(&id).await;
        assert_eq!(run.report.outcome, CheckOutcome::Updated);
        assert_eq!(run.dispatch, Dispatch::Sent);
        assert_eq!(run.delivery.delivered_to, ["alice"]);
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    /// Blocks every fetch until released.
    struct GateFetcher {
        gate: tokio::sync::Notify,
    }

    #[async_trait]
    impl Fetcher for GateFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.gate.notified().await;
            Err(AppError::fetch(url, "released"))
        }
    }

    #[tokio::test]
    async fn test_overlapping_tick_is_skipped() {
        let id = novel("1");
        let store = Arc::new(MemoryStorage::new());
        store.add_subscription(&"alice".into(), &id).await.unwrap();
        let fetcher = Arc::new(GateFetcher {
            gate: tokio::sync::Notify::new(),
        });

        let scheduler = Arc::new(scheduler(
            fetcher.clone(),
            store,
            Arc::new(RecordingNotifier::default()),
        ));

        let running = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.try_tick().await }
        });

        // Let the first tick reach the fetch
        while scheduler.tick_lock.try_lock().is_ok() {
            tokio::task::yield_now().await;
        }

        assert!(scheduler.try_tick().await.unwrap().is_none());

        fetcher.gate.notify_one();
        let summary = running.await.unwrap().unwrap().unwrap();
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let id = novel("1");
        let fetcher = Arc::new(StubFetcher::default());
        let store = Arc::new(MemoryStorage::new());
        store.add_subscription(&"alice".into(), &id).await.unwrap();
        fetcher.push(&id, Ok(page(&id, &[(1, false)])));

        let scheduler = scheduler(fetcher, store.clone(), Arc::new(RecordingNotifier::default()));
        tokio::time::timeout(
            Duration::from_secs(5),
            scheduler.run(tokio::time::sleep(Duration::from_millis(200))),
        )
        .await
        .unwrap();

        let state = store.get_novel_state(&id).await.unwrap().unwrap();
        assert!(!state.is_unseeded());
    }
}
