use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
    error::SessionError,
    events::{TimerBoard, TimerView},
    models::{Goal, GoalId, Session, SessionQuery, SessionStatus, UserId},
};

use super::{
    clock::{sample, ClockSnapshot, Sample},
    state::{SessionAction, SessionPhase},
};

/// Local projection of one user's session.
///
/// `record` is the last server copy (or the optimistic seed before the
/// server answered a start). Local pause/resume never touch its timestamps;
/// the time they imply is carried in the provisional fields until the next
/// authoritative record replaces them.
#[derive(Debug, Clone)]
pub struct TrackedSession {
    pub record: Session,
    pub status: SessionStatus,
    pub target_seconds: Option<u64>,
    pub elapsed_seconds: u64,
    pub confirmed: bool,
    lap_offset_seconds: u64,
    pending_lap: Option<u64>,
    provisional_pause: Option<DateTime<Utc>>,
    provisional_paused_seconds: u64,
    /// Set once a local resume has credited the server's open pause.
    server_pause_credited: bool,
}

impl TrackedSession {
    pub fn from_record(record: Session, target_seconds: Option<u64>, now: DateTime<Utc>) -> Self {
        let mut tracked = Self {
            status: record.status,
            record,
            target_seconds,
            elapsed_seconds: 0,
            confirmed: true,
            lap_offset_seconds: 0,
            pending_lap: None,
            provisional_pause: None,
            provisional_paused_seconds: 0,
            server_pause_credited: false,
        };
        tracked.resample(now);
        tracked
    }

    /// Seed for a start the server has not confirmed yet.
    pub fn optimistic_start(
        user_id: &str,
        goal: &Goal,
        sub_task_id: Option<String>,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        let target = goal.target_seconds(sub_task_id.as_deref());
        let record = Session {
            id: None,
            user_id: user_id.to_string(),
            goal_id: goal.id.clone(),
            date,
            sub_task_id,
            started_at: now,
            paused_at: None,
            total_paused_seconds: 0,
            status: SessionStatus::InProgress,
        };
        let mut tracked = Self::from_record(record, Some(target), now);
        tracked.confirmed = false;
        tracked
    }

    pub fn phase(&self) -> SessionPhase {
        self.status.into()
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            started_at: self.record.started_at,
            paused_at: self.provisional_pause.or(self.record.paused_at),
            total_paused_seconds: self
                .record
                .total_paused_seconds
                .saturating_add(self.provisional_paused_seconds),
            status: self.status,
        }
    }

    pub fn resample(&mut self, now: DateTime<Utc>) -> Sample {
        let result = sample(&self.snapshot(), now);
        self.elapsed_seconds = result.elapsed_seconds;
        result
    }

    pub fn display_seconds(&self) -> u64 {
        let lap = self.pending_lap.unwrap_or(self.lap_offset_seconds);
        self.elapsed_seconds.saturating_sub(lap)
    }

    /// Elapsed value at which the current sub-task lap would start.
    pub fn pending_lap(&self) -> Option<u64> {
        self.pending_lap
    }

    /// Keep a lap reset once the server accepted the sub-task completion.
    pub fn commit_lap(&mut self, lap_seconds: u64) {
        self.lap_offset_seconds = lap_seconds;
        self.pending_lap = None;
    }

    /// Reflect a user action locally before the server has seen it.
    pub fn apply_local(&mut self, action: SessionAction, now: DateTime<Utc>) {
        match action {
            SessionAction::Pause => {
                self.resample(now);
                self.provisional_pause = Some(now);
                self.status = SessionStatus::Paused;
            }
            SessionAction::Resume => {
                let paused_since = match self.provisional_pause.take() {
                    Some(at) => Some(at),
                    None if self.record.status == SessionStatus::Paused
                        && !self.server_pause_credited =>
                    {
                        self.server_pause_credited = true;
                        self.record.paused_at
                    }
                    None => None,
                };
                if let Some(paused_since) = paused_since {
                    let paused = (now - paused_since).num_seconds().max(0) as u64;
                    self.provisional_paused_seconds =
                        self.provisional_paused_seconds.saturating_add(paused);
                }
                self.status = SessionStatus::InProgress;
                self.resample(now);
            }
            SessionAction::Stop => {
                self.resample(now);
                self.status = SessionStatus::Done;
            }
            SessionAction::CompleteSubTask => {
                self.resample(now);
                self.pending_lap = Some(self.elapsed_seconds);
            }
            SessionAction::Start => {}
        }
        self.confirmed = false;
    }

    /// Replace local state with a server record for the same session.
    pub fn apply_authoritative(&mut self, record: Session, now: DateTime<Utc>) -> Sample {
        if self.record.id.is_some() && self.record.id != record.id {
            self.lap_offset_seconds = 0;
        }
        self.status = record.status;
        self.record = record;
        self.pending_lap = None;
        self.provisional_pause = None;
        self.provisional_paused_seconds = 0;
        self.server_pause_credited = false;
        self.confirmed = true;
        self.resample(now)
    }

    pub fn view(&self) -> TimerView {
        let elapsed = self.display_seconds();
        let remaining = self.target_seconds.map(|target| target.saturating_sub(elapsed));
        TimerView {
            session_id: self.record.id.clone(),
            goal_id: self.record.goal_id.clone(),
            sub_task_id: self.record.sub_task_id.clone(),
            status: self.status,
            elapsed_seconds: elapsed,
            target_seconds: self.target_seconds,
            remaining_seconds: remaining,
            target_reached: remaining == Some(0),
            confirmed: self.confirmed,
        }
    }
}

/// A session that left the tracked set for the day.
#[derive(Debug, Clone)]
pub struct FinishedSession {
    pub record: Session,
    pub status: SessionStatus,
    /// False when only the local view has closed it.
    pub confirmed: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub updated: Vec<UserId>,
    pub restored: Vec<UserId>,
    pub finished: Vec<UserId>,
    pub dropped: Vec<UserId>,
    pub clamped: Vec<UserId>,
}

impl ReconcileReport {
    pub fn changed_anything(&self) -> bool {
        !(self.updated.is_empty()
            && self.restored.is_empty()
            && self.finished.is_empty()
            && self.dropped.is_empty())
    }
}

/// A user's session for one goal on one day.
pub type SlotKey = (UserId, GoalId, NaiveDate);

fn slot_key(record: &Session) -> SlotKey {
    (record.user_id.clone(), record.goal_id.clone(), record.date)
}

/// Tracked sessions keyed by user, plus what closed for each (user, goal,
/// day). Plain data; the controller owns the lock around it.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<UserId, TrackedSession>,
    finished: HashMap<SlotKey, FinishedSession>,
    targets: HashMap<SlotKey, u64>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, user_id: &str) -> Option<&TrackedSession> {
        self.sessions.get(user_id)
    }

    pub fn get_mut(&mut self, user_id: &str) -> Option<&mut TrackedSession> {
        self.sessions.get_mut(user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn has_running(&self) -> bool {
        self.sessions
            .values()
            .any(|tracked| tracked.status == SessionStatus::InProgress)
    }

    pub fn has_live(&self) -> bool {
        self.sessions.values().any(|tracked| tracked.status.is_live())
    }

    /// Tracked users and their statuses; a change means the drivers re-arm.
    pub fn signature(&self) -> BTreeSet<(UserId, SessionStatus)> {
        self.sessions
            .iter()
            .map(|(user, tracked)| (user.clone(), tracked.status))
            .collect()
    }

    /// Phase of `user_id`'s session when acting on whatever they are timing.
    /// With nothing tracked, the latest session closed on `today` decides.
    pub fn phase_of(&self, user_id: &str, today: NaiveDate) -> SessionPhase {
        if let Some(tracked) = self.sessions.get(user_id) {
            return tracked.phase();
        }
        self.finished
            .values()
            .filter(|done| done.record.user_id == user_id && done.record.date == today)
            .max_by_key(|done| done.record.started_at)
            .map_or(SessionPhase::Idle, |done| done.status.into())
    }

    /// Phase of `user_id`'s session for a particular goal on `date`.
    pub fn phase_for_goal(&self, user_id: &str, goal_id: &GoalId, date: NaiveDate) -> SessionPhase {
        if let Some(tracked) = self.sessions.get(user_id) {
            return tracked.phase();
        }
        let key = (user_id.to_string(), goal_id.clone(), date);
        self.finished
            .get(&key)
            .map_or(SessionPhase::Idle, |done| done.status.into())
    }

    /// Start tracking a session. A missing target is filled from an earlier
    /// tracking of the same slot.
    pub fn track(&mut self, mut tracked: TrackedSession) {
        let key = slot_key(&tracked.record);
        match tracked.target_seconds {
            Some(target) => {
                self.targets.insert(key, target);
            }
            None => tracked.target_seconds = self.targets.get(&key).copied(),
        }
        self.sessions.insert(tracked.record.user_id.clone(), tracked);
    }

    pub fn untrack(&mut self, user_id: &str) -> Option<TrackedSession> {
        self.sessions.remove(user_id)
    }

    /// Move a tracked session into the finished set.
    pub fn close(&mut self, user_id: &str, confirmed: bool) -> Option<FinishedSession> {
        let tracked = self.sessions.remove(user_id)?;
        let finished = FinishedSession {
            status: tracked.status,
            record: tracked.record,
            confirmed,
        };
        self.finished.insert(slot_key(&finished.record), finished.clone());
        Some(finished)
    }

    /// Tracked sessions whose target duration is still unknown, as
    /// `(user, goal, sub-task)`.
    pub fn missing_targets(&self) -> Vec<(UserId, GoalId, Option<String>)> {
        self.sessions
            .values()
            .filter(|tracked| tracked.target_seconds.is_none())
            .map(|tracked| {
                (
                    tracked.record.user_id.clone(),
                    tracked.record.goal_id.clone(),
                    tracked.record.sub_task_id.clone(),
                )
            })
            .collect()
    }

    pub fn set_target(&mut self, user_id: &str, goal_id: &str, target_seconds: u64) {
        if let Some(tracked) = self.sessions.get_mut(user_id) {
            if tracked.record.goal_id == goal_id {
                tracked.target_seconds = Some(target_seconds);
                self.targets.insert(slot_key(&tracked.record), target_seconds);
            }
        }
    }

    /// Re-sample every running session. Paused ones keep their frozen value.
    /// Returns users whose value had to be clamped.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<UserId> {
        self.sessions
            .iter_mut()
            .filter(|(_, tracked)| tracked.status == SessionStatus::InProgress)
            .filter_map(|(user, tracked)| tracked.resample(now).clamped.then(|| user.clone()))
            .collect()
    }

    pub fn board(&self) -> TimerBoard {
        self.sessions
            .iter()
            .map(|(user, tracked)| (user.clone(), tracked.view()))
            .collect()
    }

    /// Query covering every day the local view cares about, or `None` when
    /// there is nothing to reconcile.
    pub fn reconcile_query(&self) -> Option<SessionQuery> {
        let records = self
            .sessions
            .values()
            .map(|tracked| &tracked.record)
            .chain(
                self.finished
                    .values()
                    .filter(|done| !done.confirmed)
                    .map(|done| &done.record),
            );

        let mut users = BTreeSet::new();
        let mut range: Option<(NaiveDate, NaiveDate)> = None;
        for record in records {
            users.insert(record.user_id.clone());
            range = Some(match range {
                None => (record.date, record.date),
                Some((lo, hi)) => (lo.min(record.date), hi.max(record.date)),
            });
        }

        let (lo, hi) = range?;
        let mut query = SessionQuery::date_range(lo, hi);
        if users.len() == 1 {
            query.user_id = users.into_iter().next();
        }
        Some(query)
    }

    /// Apply one authoritative record. Live records for untracked slots are
    /// adopted; terminal ones close the local entry or mark the slot closed.
    pub fn apply_record(&mut self, record: Session, now: DateTime<Utc>) -> Result<(), SessionError> {
        let user = record.user_id.clone();
        match self.sessions.get_mut(&user) {
            Some(tracked) if tracked.record.same_slot(&record) => {
                let result = tracked.apply_authoritative(record, now);
                if tracked.status.is_terminal() {
                    self.close(&user, true);
                }
                if result.clamped {
                    return Err(SessionError::InconsistentState {
                        user_id: user,
                        reason: "negative elapsed time clamped to zero".into(),
                    });
                }
            }
            _ if record.status.is_terminal() => {
                self.finished.insert(
                    slot_key(&record),
                    FinishedSession {
                        status: record.status,
                        record,
                        confirmed: true,
                    },
                );
            }
            _ => {
                self.finished.remove(&slot_key(&record));
                self.track(TrackedSession::from_record(record, None, now));
            }
        }
        Ok(())
    }

    /// Overwrite the local projection with a full authoritative listing.
    ///
    /// Tracked sessions missing from the listing are dropped. Locally closed
    /// sessions that the server still reports live are restored when their
    /// user is not timing anything else.
    pub fn reconcile(&mut self, records: &[Session], now: DateTime<Utc>) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let users: Vec<UserId> = self.sessions.keys().cloned().collect();
        for user in users {
            let Some(tracked) = self.sessions.get_mut(&user) else {
                continue;
            };
            let found = find_match(records, &tracked.record);
            match found {
                Some(record) => {
                    let result = tracked.apply_authoritative(record.clone(), now);
                    if result.clamped {
                        report.clamped.push(user.clone());
                    }
                    if tracked.status.is_terminal() {
                        self.close(&user, true);
                        report.finished.push(user);
                    } else {
                        report.updated.push(user);
                    }
                }
                None => {
                    self.sessions.remove(&user);
                    report.dropped.push(user);
                }
            }
        }

        let pending: Vec<SlotKey> = self
            .finished
            .iter()
            .filter(|(_, done)| !done.confirmed)
            .map(|(key, _)| key.clone())
            .collect();
        for key in pending {
            let user_busy = self.sessions.contains_key(&key.0);
            let Some(done) = self.finished.get_mut(&key) else {
                continue;
            };
            match find_match(records, &done.record) {
                Some(record) if record.status.is_live() => {
                    if user_busy {
                        continue;
                    }
                    self.finished.remove(&key);
                    self.track(TrackedSession::from_record(record.clone(), None, now));
                    report.restored.push(key.0);
                }
                Some(record) => {
                    done.status = record.status;
                    done.record = record.clone();
                    done.confirmed = true;
                }
                None => {
                    done.confirmed = true;
                }
            }
        }

        report
    }
}

fn find_match<'a>(records: &'a [Session], local: &Session) -> Option<&'a Session> {
    if local.id.is_some() {
        if let Some(exact) = records.iter().find(|record| record.id == local.id) {
            return Some(exact);
        }
    }
    records
        .iter()
        .filter(|record| {
            record.user_id == local.user_id
                && record.goal_id == local.goal_id
                && record.date == local.date
        })
        .max_by_key(|record| (record.status.is_live(), record.started_at))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn record(user: &str, status: SessionStatus) -> Session {
        Session {
            id: Some(format!("s-{user}")),
            user_id: user.into(),
            goal_id: "g-1".into(),
            date: day(),
            sub_task_id: None,
            started_at: t0(),
            paused_at: None,
            total_paused_seconds: 0,
            status,
        }
    }

    fn goal() -> Goal {
        Goal {
            id: "g-1".into(),
            user_id: "u-1".into(),
            daily_duration_seconds: 600,
            sub_tasks: Vec::new(),
        }
    }

    #[test]
    fn local_pause_freezes_and_resume_continues() {
        let mut tracked = TrackedSession::from_record(
            record("u-1", SessionStatus::InProgress),
            Some(600),
            t0(),
        );

        tracked.apply_local(SessionAction::Pause, t0() + Duration::seconds(60));
        assert_eq!(tracked.elapsed_seconds, 60);
        tracked.resample(t0() + Duration::seconds(500));
        assert_eq!(tracked.elapsed_seconds, 60);

        tracked.apply_local(SessionAction::Resume, t0() + Duration::seconds(100));
        assert_eq!(tracked.elapsed_seconds, 60);
        tracked.resample(t0() + Duration::seconds(130));
        assert_eq!(tracked.elapsed_seconds, 90);
        assert!(!tracked.confirmed);
    }

    #[test]
    fn authoritative_record_replaces_provisional_accounting() {
        let mut tracked = TrackedSession::from_record(
            record("u-1", SessionStatus::InProgress),
            None,
            t0(),
        );
        tracked.apply_local(SessionAction::Pause, t0() + Duration::seconds(60));
        tracked.apply_local(SessionAction::Resume, t0() + Duration::seconds(80));

        let server = Session {
            total_paused_seconds: 20,
            ..record("u-1", SessionStatus::InProgress)
        };
        tracked.apply_authoritative(server, t0() + Duration::seconds(100));
        assert_eq!(tracked.elapsed_seconds, 80);
        assert!(tracked.confirmed);
    }

    #[test]
    fn resume_of_server_paused_session_credits_pause_time() {
        let paused = Session {
            paused_at: Some(t0() + Duration::seconds(30)),
            ..record("u-1", SessionStatus::Paused)
        };
        let mut tracked = TrackedSession::from_record(paused, None, t0() + Duration::seconds(40));
        assert_eq!(tracked.elapsed_seconds, 30);

        tracked.apply_local(SessionAction::Resume, t0() + Duration::seconds(90));
        assert_eq!(tracked.elapsed_seconds, 30);
        tracked.resample(t0() + Duration::seconds(95));
        assert_eq!(tracked.elapsed_seconds, 35);
    }

    #[test]
    fn complete_sub_task_resets_display_only() {
        let mut tracked = TrackedSession::from_record(
            record("u-1", SessionStatus::InProgress),
            Some(300),
            t0(),
        );
        tracked.apply_local(SessionAction::CompleteSubTask, t0() + Duration::seconds(200));
        assert_eq!(tracked.display_seconds(), 0);
        assert_eq!(tracked.elapsed_seconds, 200);

        let lap = tracked.pending_lap().expect("pending lap");
        tracked.commit_lap(lap);
        tracked.apply_authoritative(
            record("u-1", SessionStatus::InProgress),
            t0() + Duration::seconds(230),
        );
        assert_eq!(tracked.display_seconds(), 30);
        assert_eq!(tracked.view().remaining_seconds, Some(270));
    }

    #[test]
    fn unconfirmed_lap_is_discarded_by_authoritative_record() {
        let mut tracked = TrackedSession::from_record(
            record("u-1", SessionStatus::InProgress),
            None,
            t0(),
        );
        tracked.apply_local(SessionAction::CompleteSubTask, t0() + Duration::seconds(120));
        assert_eq!(tracked.display_seconds(), 0);

        tracked.apply_authoritative(
            record("u-1", SessionStatus::InProgress),
            t0() + Duration::seconds(130),
        );
        assert_eq!(tracked.display_seconds(), 130);
    }

    #[test]
    fn tick_skips_paused_sessions() {
        let mut store = SessionStore::new();
        store.track(TrackedSession::from_record(
            record("u-1", SessionStatus::InProgress),
            None,
            t0(),
        ));
        let paused = Session {
            paused_at: Some(t0() + Duration::seconds(10)),
            ..record("u-2", SessionStatus::Paused)
        };
        store.track(TrackedSession::from_record(paused, None, t0() + Duration::seconds(10)));

        store.tick(t0() + Duration::seconds(50));
        let board = store.board();
        assert_eq!(board["u-1"].elapsed_seconds, 50);
        assert_eq!(board["u-2"].elapsed_seconds, 10);
        assert!(store.has_running());
    }

    #[test]
    fn phase_reflects_finished_sessions_for_the_day() {
        let mut store = SessionStore::new();
        store.track(TrackedSession::optimistic_start("u-1", &goal(), None, day(), t0()));
        assert_eq!(store.phase_of("u-1", day()), SessionPhase::InProgress);

        store.get_mut("u-1").unwrap().apply_local(SessionAction::Stop, t0());
        store.close("u-1", false);
        assert_eq!(store.phase_of("u-1", day()), SessionPhase::Done);
        assert_eq!(store.phase_for_goal("u-1", &"g-1".to_string(), day()), SessionPhase::Done);
        assert_eq!(store.phase_for_goal("u-1", &"g-2".to_string(), day()), SessionPhase::Idle);
        assert_eq!(
            store.phase_of("u-1", day().succ_opt().unwrap()),
            SessionPhase::Idle
        );
    }

    #[test]
    fn reconcile_overwrites_drops_and_restores() {
        let mut store = SessionStore::new();
        store.track(TrackedSession::from_record(
            record("u-1", SessionStatus::InProgress),
            None,
            t0(),
        ));
        store.track(TrackedSession::optimistic_start("u-2", &goal(), None, day(), t0()));
        store.track(TrackedSession::from_record(
            record("u-3", SessionStatus::InProgress),
            None,
            t0(),
        ));
        store.get_mut("u-3").unwrap().apply_local(SessionAction::Stop, t0());
        store.close("u-3", false);

        let server = vec![
            Session {
                paused_at: Some(t0() + Duration::seconds(40)),
                ..record("u-1", SessionStatus::Paused)
            },
            record("u-3", SessionStatus::InProgress),
        ];
        let report = store.reconcile(&server, t0() + Duration::seconds(100));

        assert_eq!(report.updated, vec!["u-1".to_string()]);
        assert_eq!(report.dropped, vec!["u-2".to_string()]);
        assert_eq!(report.restored, vec!["u-3".to_string()]);
        let board = store.board();
        assert_eq!(board["u-1"].status, SessionStatus::Paused);
        assert_eq!(board["u-1"].elapsed_seconds, 40);
        assert_eq!(board["u-3"].status, SessionStatus::InProgress);
        assert!(!board.contains_key("u-2"));
    }

    #[test]
    fn reconcile_closes_sessions_missed_on_the_server() {
        let mut store = SessionStore::new();
        store.track(TrackedSession::from_record(
            record("u-1", SessionStatus::InProgress),
            None,
            t0(),
        ));

        let report = store.reconcile(&[record("u-1", SessionStatus::Missed)], t0());
        assert_eq!(report.finished, vec!["u-1".to_string()]);
        assert!(store.is_empty());
        assert_eq!(store.phase_of("u-1", day()), SessionPhase::Missed);
    }

    #[test]
    fn optimistic_start_matches_server_record_by_slot() {
        let mut store = SessionStore::new();
        store.track(TrackedSession::optimistic_start("u-1", &goal(), None, day(), t0()));

        let server = Session {
            started_at: t0() + Duration::seconds(1),
            ..record("u-1", SessionStatus::InProgress)
        };
        store
            .apply_record(server, t0() + Duration::seconds(31))
            .expect("apply record");

        let view = &store.board()["u-1"];
        assert_eq!(view.session_id.as_deref(), Some("s-u-1"));
        assert_eq!(view.elapsed_seconds, 30);
        assert_eq!(view.target_seconds, Some(600));
        assert!(view.confirmed);
    }

    #[test]
    fn reconcile_query_spans_tracked_dates() {
        let mut store = SessionStore::new();
        assert!(store.reconcile_query().is_none());

        store.track(TrackedSession::from_record(
            record("u-1", SessionStatus::InProgress),
            None,
            t0(),
        ));
        let query = store.reconcile_query().expect("query");
        assert_eq!(query.date, Some(day()));
        assert_eq!(query.user_id.as_deref(), Some("u-1"));

        let yesterday = Session {
            date: day().pred_opt().unwrap(),
            ..record("u-2", SessionStatus::Paused)
        };
        store.track(TrackedSession::from_record(yesterday, None, t0()));
        let query = store.reconcile_query().expect("query");
        assert_eq!(query.start_date, day().pred_opt());
        assert_eq!(query.end_date, Some(day()));
        assert!(query.user_id.is_none());
    }

    #[test]
    fn unconfirmed_resume_pause_resume_keeps_counting_from_the_pause() {
        let paused = Session {
            paused_at: Some(t0() + Duration::seconds(30)),
            ..record("u-1", SessionStatus::Paused)
        };
        let mut tracked = TrackedSession::from_record(paused, None, t0() + Duration::seconds(40));

        tracked.apply_local(SessionAction::Resume, t0() + Duration::seconds(90));
        tracked.apply_local(SessionAction::Pause, t0() + Duration::seconds(120));
        assert_eq!(tracked.elapsed_seconds, 60);
        tracked.resample(t0() + Duration::seconds(140));
        assert_eq!(tracked.elapsed_seconds, 60);

        tracked.apply_local(SessionAction::Resume, t0() + Duration::seconds(150));
        assert_eq!(tracked.elapsed_seconds, 60);
        tracked.resample(t0() + Duration::seconds(200));
        assert_eq!(tracked.elapsed_seconds, 110);
    }

    #[test]
    fn finished_goals_stay_closed_after_other_goals_run() {
        let other = Goal {
            id: "g-2".into(),
            ..goal()
        };
        let mut store = SessionStore::new();

        store.track(TrackedSession::optimistic_start("u-1", &goal(), None, day(), t0()));
        store.get_mut("u-1").unwrap().apply_local(SessionAction::Stop, t0());
        store.close("u-1", true);

        store.track(TrackedSession::optimistic_start("u-1", &other, None, day(), t0()));
        assert_eq!(store.phase_of("u-1", day()), SessionPhase::InProgress);
        store.get_mut("u-1").unwrap().apply_local(SessionAction::Stop, t0());
        store.close("u-1", true);

        let first = "g-1".to_string();
        let second = "g-2".to_string();
        assert_eq!(store.phase_for_goal("u-1", &first, day()), SessionPhase::Done);
        assert_eq!(store.phase_for_goal("u-1", &second, day()), SessionPhase::Done);
        assert_eq!(
            store.phase_for_goal("u-1", &first, day().succ_opt().unwrap()),
            SessionPhase::Idle
        );
    }

    #[test]
    fn terminal_records_close_their_own_slot_only() {
        let mut store = SessionStore::new();
        store.track(TrackedSession::from_record(
            record("u-1", SessionStatus::InProgress),
            None,
            t0(),
        ));
        let elsewhere = Session {
            id: Some("s-other".into()),
            goal_id: "g-2".into(),
            ..record("u-1", SessionStatus::Done)
        };
        store.apply_record(elsewhere, t0()).expect("apply record");

        assert_eq!(store.phase_of("u-1", day()), SessionPhase::InProgress);
        assert_eq!(
            store.phase_for_goal("u-1", &"g-2".to_string(), day()),
            SessionPhase::InProgress
        );
        store.untrack("u-1");
        assert_eq!(
            store.phase_for_goal("u-1", &"g-2".to_string(), day()),
            SessionPhase::Done
        );
        assert_eq!(
            store.phase_for_goal("u-1", &"g-1".to_string(), day()),
            SessionPhase::Idle
        );
    }

    #[test]
    fn target_survives_dropping_and_readopting_the_slot() {
        let mut store = SessionStore::new();
        store.track(TrackedSession::optimistic_start("u-1", &goal(), None, day(), t0()));

        let report = store.reconcile(&[], t0() + Duration::seconds(5));
        assert_eq!(report.dropped, vec!["u-1".to_string()]);

        store
            .apply_record(record("u-1", SessionStatus::InProgress), t0() + Duration::seconds(10))
            .expect("apply record");
        let view = &store.board()["u-1"];
        assert_eq!(view.target_seconds, Some(600));
        assert_eq!(view.remaining_seconds, Some(590));
        assert!(store.missing_targets().is_empty());
    }

    #[test]
    fn missing_targets_can_be_filled_in() {
        let mut store = SessionStore::new();
        store.track(TrackedSession::from_record(
            record("u-1", SessionStatus::InProgress),
            None,
            t0(),
        ));
        assert_eq!(
            store.missing_targets(),
            vec![("u-1".to_string(), "g-1".to_string(), None)]
        );

        store.set_target("u-1", "g-9", 100);
        assert_eq!(store.missing_targets().len(), 1);
        store.set_target("u-1", "g-1", 1200);
        assert!(store.missing_targets().is_empty());
        assert_eq!(store.board()["u-1"].target_seconds, Some(1200));
    }
}
