use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use chrono::{DateTime, NaiveDate, Utc};
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::SessionError,
    events::{Notice, TimerBoard, TimerView},
    models::Session,
    service::{GoalDirectory, SessionService},
    settings::EngineSettings,
    sync::reconciler::sync_loop,
};

use super::{
    clock::Clock,
    store::{SessionStore, TrackedSession},
};

// Set to true to enable driver logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const NOTICE_CAPACITY: usize = 64;

#[derive(Default)]
struct Drivers {
    ticker: Option<JoinHandle<()>>,
    sync: Option<JoinHandle<()>>,
    sync_cancel: Option<CancellationToken>,
}

impl Drivers {
    fn stop_all(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
        if let Some(token) = self.sync_cancel.take() {
            token.cancel();
        }
        // The sync task may be the caller; it exits on its own once cancelled.
        self.sync.take();
    }
}

struct Inner {
    store: Mutex<SessionStore>,
    drivers: Mutex<Drivers>,
    service: Arc<dyn SessionService>,
    goals: Option<Arc<dyn GoalDirectory>>,
    clock: Arc<dyn Clock>,
    board_tx: watch::Sender<TimerBoard>,
    notice_tx: broadcast::Sender<Notice>,
    tick_interval: Duration,
    sync_interval: Duration,
    shut_down: AtomicBool,
}

/// Owns the tracked sessions and the two periodic drivers: the 1 Hz tick
/// that republishes elapsed time and the slower reconciliation fetch.
///
/// Both drivers are re-armed whenever the set of tracked sessions (or their
/// status) changes and are torn down once nothing is live. Instances are
/// independent; nothing here is global.
#[derive(Clone)]
pub struct TimerController {
    inner: Arc<Inner>,
}

/// Non-owning handle held by the driver tasks.
#[derive(Clone)]
pub(crate) struct ControllerHandle {
    inner: Weak<Inner>,
}

impl ControllerHandle {
    pub(crate) fn upgrade(&self) -> Option<TimerController> {
        self.inner.upgrade().map(|inner| TimerController { inner })
    }
}

impl TimerController {
    pub fn new(
        service: Arc<dyn SessionService>,
        clock: Arc<dyn Clock>,
        settings: &EngineSettings,
    ) -> Self {
        Self::build(service, None, clock, settings)
    }

    /// Like [`TimerController::new`], but sessions adopted from the server
    /// get their target duration looked up in `goals`.
    pub fn with_goals(
        service: Arc<dyn SessionService>,
        goals: Arc<dyn GoalDirectory>,
        clock: Arc<dyn Clock>,
        settings: &EngineSettings,
    ) -> Self {
        Self::build(service, Some(goals), clock, settings)
    }

    fn build(
        service: Arc<dyn SessionService>,
        goals: Option<Arc<dyn GoalDirectory>>,
        clock: Arc<dyn Clock>,
        settings: &EngineSettings,
    ) -> Self {
        let (board_tx, _) = watch::channel(TimerBoard::new());
        let (notice_tx, _) = broadcast::channel(NOTICE_CAPACITY);

        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(SessionStore::new()),
                drivers: Mutex::new(Drivers::default()),
                service,
                goals,
                clock,
                board_tx,
                notice_tx,
                tick_interval: settings.tick_interval(),
                sync_interval: settings.sync_interval(),
                shut_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn service(&self) -> Arc<dyn SessionService> {
        Arc::clone(&self.inner.service)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.inner.clock.today()
    }

    pub fn subscribe(&self) -> watch::Receiver<TimerBoard> {
        self.inner.board_tx.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.inner.notice_tx.subscribe()
    }

    pub(crate) fn notify(&self, notice: Notice) {
        // No subscribers is fine; notices are best effort.
        let _ = self.inner.notice_tx.send(notice);
    }

    pub(crate) fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub async fn board(&self) -> TimerBoard {
        self.inner.store.lock().await.board()
    }

    pub async fn view(&self, user_id: &str) -> Option<TimerView> {
        self.inner
            .store
            .lock()
            .await
            .get(user_id)
            .map(TrackedSession::view)
    }

    /// Seed local state from the server's cleanup sweep. Failure leaves the
    /// controller empty but usable; reconciliation picks up from there.
    pub async fn init(&self) -> Result<u32, SessionError> {
        let report = match self.inner.service.check_and_cleanup().await {
            Ok(report) => report,
            Err(err) => {
                log_warn!("startup cleanup failed, starting with no tracked sessions: {err}");
                return Err(err.into());
            }
        };

        log_info!(
            "cleanup closed {} stale session(s); {} session(s) today",
            report.cleaned_up,
            report.sessions.len()
        );

        let applied = self.apply_authoritative(report.sessions).await;
        self.resolve_targets().await;
        applied?;
        Ok(report.cleaned_up)
    }

    /// Track `session` for its user, replacing whatever was tracked before.
    pub async fn register_session(&self, session: Session, target_seconds: Option<u64>) -> TimerView {
        self.update(|store, now| {
            let tracked = TrackedSession::from_record(session, target_seconds, now);
            let view = tracked.view();
            store.track(tracked);
            view
        })
        .await
    }

    /// Stop tracking `user_id` locally and drop its derived value. The server
    /// is not told.
    pub async fn unregister_session(&self, user_id: &str) -> Option<TimerView> {
        self.update(|store, _| store.untrack(user_id).map(|tracked| tracked.view()))
            .await
    }

    /// Apply server records directly, as a reconciliation or a push transport
    /// would deliver them.
    pub async fn apply_authoritative(&self, records: Vec<Session>) -> Result<(), SessionError> {
        self.update(|store, now| {
            let mut outcome = Ok(());
            for record in records {
                if let Err(err) = store.apply_record(record, now) {
                    log_warn!("{err}");
                    outcome = Err(err);
                }
            }
            outcome
        })
        .await
    }

    /// Look up the target duration of tracked sessions that arrived from the
    /// server without one. Lookup failures leave the target unknown.
    pub(crate) async fn resolve_targets(&self) {
        let Some(goals) = self.inner.goals.clone() else {
            return;
        };
        let missing = self.read(|store| store.missing_targets()).await;

        for (user_id, goal_id, sub_task_id) in missing {
            match goals.fetch_goal(&goal_id).await {
                Ok(goal) => {
                    let target = goal.target_seconds(sub_task_id.as_deref());
                    self.update(|store, _| store.set_target(&user_id, &goal_id, target))
                        .await;
                }
                Err(err) => {
                    log_warn!("no target for {user_id}: goal {goal_id} lookup failed: {err}");
                }
            }
        }
    }

    /// Tear down both drivers. Tracked state stays readable.
    pub async fn shutdown(&self) {
        self.inner.shut_down.store(true, Ordering::SeqCst);
        self.inner.drivers.lock().await.stop_all();
        log_info!("timer drivers shut down");
    }

    pub async fn is_ticking(&self) -> bool {
        self.inner
            .drivers
            .lock()
            .await
            .ticker
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub async fn is_syncing(&self) -> bool {
        self.inner
            .drivers
            .lock()
            .await
            .sync
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub(crate) async fn read<R>(&self, f: impl FnOnce(&SessionStore) -> R) -> R {
        let store = self.inner.store.lock().await;
        f(&store)
    }

    /// Run one synchronous mutation against the store, publish the board and
    /// re-arm the drivers if the tracked set changed.
    pub(crate) async fn update<R>(&self, f: impl FnOnce(&mut SessionStore, DateTime<Utc>) -> R) -> R {
        let (result, board, changed) = {
            let mut store = self.inner.store.lock().await;
            let before = store.signature();
            let result = f(&mut store, self.inner.clock.now());
            let changed = before != store.signature();
            (result, store.board(), changed)
        };

        self.inner.board_tx.send_replace(board);
        if changed {
            self.rearm().await;
        }
        result
    }

    /// Restart the drivers for whatever the store holds now. The store is read
    /// under the drivers lock so racing re-arms settle on the latest state.
    async fn rearm(&self) {
        if self.inner.shut_down.load(Ordering::SeqCst) {
            return;
        }

        let mut drivers = self.inner.drivers.lock().await;
        let (running, live) = {
            let store = self.inner.store.lock().await;
            (store.has_running(), store.has_live())
        };
        drivers.stop_all();

        if running {
            drivers.ticker = Some(self.spawn_ticker());
        }
        if live {
            let token = CancellationToken::new();
            drivers.sync = Some(tokio::spawn(sync_loop(
                self.handle(),
                Instant::now() + self.inner.sync_interval,
                self.inner.sync_interval,
                token.clone(),
            )));
            drivers.sync_cancel = Some(token);
        }

        log_debug!("drivers re-armed (ticking: {running}, syncing: {live})");
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let handle = self.handle();
        let tick_interval = self.inner.tick_interval;

        tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                let Some(controller) = handle.upgrade() else {
                    break;
                };
                let inner = &controller.inner;

                let board = {
                    let mut store = inner.store.lock().await;
                    let clamped = store.tick(inner.clock.now());
                    for user in clamped {
                        log_warn!("elapsed time for {user} went negative; clamped to zero");
                    }
                    if !store.has_running() {
                        break;
                    }
                    store.board()
                };

                inner.board_tx.send_replace(board);
            }

            log_debug!("tick driver stopped");
        })
    }
}
