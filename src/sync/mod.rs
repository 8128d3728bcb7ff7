//! Phase synchronization.
//!
//! A [`PhaseSync`] keeps one page's view of a room consistent with the
//! server. It runs two background tasks:
//! - the poll task fetches game state on a fixed interval (and immediately on
//!   a `room:state` push), reconciles it into a [`SyncView`] and redirects
//!   when the server's phase belongs to another page
//! - the tick task recomputes the countdown once a second, so it moves
//!   smoothly between network round-trips
//!
//! Stopping (or dropping) the [`PhaseSyncHandle`] aborts both tasks.

mod clock;
mod route;

pub use clock::{seconds_left, Clock, ClockOffset, SystemClock};
pub use route::{Navigator, RedirectMap, Redirector, Route};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::{ApiError, GameApi};
use crate::config::{clamp_poll_interval, DEFAULT_POLL_INTERVAL};
use crate::protocol::{GameSnapshot, RoomStatePush};
use crate::types::*;

/// Countdown refresh rate
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Parameters of one page's sync
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub code: RoomCode,
    /// Page currently shown
    pub page: Route,
    /// Player this client plays as, if known
    pub player: Option<PlayerName>,
    pub poll_interval: Duration,
    pub redirects: RedirectMap,
}

impl SyncOptions {
    pub fn new(code: impl Into<RoomCode>, page: Route) -> Self {
        Self {
            code: code.into(),
            page,
            player: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            redirects: RedirectMap::default(),
        }
    }

    #[must_use]
    pub fn with_player(mut self, player: impl Into<PlayerName>) -> Self {
        self.player = Some(player.into());
        self
    }

    /// Clamped to the 1–4 second range pages poll at
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = clamp_poll_interval(interval);
        self
    }

    #[must_use]
    pub fn with_redirects(mut self, redirects: RedirectMap) -> Self {
        self.redirects = redirects;
        self
    }
}

/// Local view of the room, derived from the latest successful poll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncView {
    pub phase: Option<GamePhase>,
    pub round: u32,
    /// Page the sync considers current (changes on redirect)
    pub page: Option<Route>,
    pub expires_at: Option<EpochMillis>,
    pub seconds_left: Option<u32>,
    pub clock_offset: ClockOffset,
    pub ask: Option<String>,
    pub my_must_haves: Vec<String>,
    pub my_surprise: Option<String>,
    pub scores: HashMap<PlayerName, i64>,
    pub ready: HashMap<PlayerName, bool>,
    pub winners: Vec<PlayerName>,
    pub judge: Option<PlayerName>,
    pub presenter: Option<PlayerName>,
    pub players: Vec<Player>,
    pub host: Option<PlayerName>,
    pub pitches: Vec<Pitch>,
    /// Set once the server reported the room as gone
    pub room_missing: bool,
    /// Successful polls so far
    pub polls: u64,
}

impl SyncView {
    fn apply_game(&mut self, game: &GameSnapshot, player: Option<&str>, local_now: EpochMillis) {
        self.clock_offset.observe(game.server_now, local_now);
        self.phase = Some(game.phase);
        self.round = game.round;
        self.expires_at = game.expires_at();
        self.seconds_left = self
            .expires_at
            .map(|expires| seconds_left(expires, local_now, self.clock_offset));
        self.ask = game.ask.clone();
        self.scores = game.player_scores.clone();
        self.ready = game.ready_by_player.clone();
        self.winners = game.winners();
        self.judge = game.judge.clone();
        self.presenter = game.presenter.clone();
        if let Some(name) = player {
            self.my_must_haves = game.must_haves_for(name);
            self.my_surprise = game.surprise_for(name);
        }
        self.room_missing = false;
        self.polls += 1;
    }
}

/// Entry point for starting a page's phase sync
pub struct PhaseSync;

impl PhaseSync {
    /// Start polling. The first fetch happens immediately.
    ///
    /// `pushes`, when given, is a stream of `room:state` events; each one
    /// triggers an extra fetch.
    pub fn spawn(
        api: Arc<dyn GameApi>,
        navigator: Arc<dyn Navigator>,
        clock: Arc<dyn Clock>,
        options: SyncOptions,
        pushes: Option<mpsc::Receiver<RoomStatePush>>,
    ) -> PhaseSyncHandle {
        let initial = SyncView {
            page: Some(options.page),
            ..Default::default()
        };
        let (tx, rx) = watch::channel(initial);
        let view = Arc::new(tx);

        let poller = Poller {
            api,
            navigator,
            clock: clock.clone(),
            redirector: Mutex::new(Redirector::new(options.page, options.redirects.clone())),
            view: view.clone(),
            options,
        };

        tracing::info!(
            "Starting phase sync for room {} on {}",
            poller.options.code,
            poller.options.page
        );

        let poll_task = tokio::spawn(poll_loop(poller, pushes));
        let tick_task = tokio::spawn(tick_loop(view, clock));

        PhaseSyncHandle {
            view: rx,
            poll_task: Some(poll_task),
            tick_task: Some(tick_task),
        }
    }
}

/// Owner of a running sync. Dropping it stops the sync.
pub struct PhaseSyncHandle {
    view: watch::Receiver<SyncView>,
    poll_task: Option<JoinHandle<()>>,
    tick_task: Option<JoinHandle<()>>,
}

impl PhaseSyncHandle {
    /// Latest view
    pub fn view(&self) -> SyncView {
        self.view.borrow().clone()
    }

    /// Receiver notified on every view change
    pub fn subscribe(&self) -> watch::Receiver<SyncView> {
        self.view.clone()
    }

    /// Stop both tasks and wait until they are gone.
    ///
    /// Once this returns no further fetches, navigations or view updates
    /// happen.
    pub async fn stop(mut self) {
        for task in [self.poll_task.take(), self.tick_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
            let _ = task.await;
        }
        tracing::debug!("Phase sync stopped");
    }
}

impl Drop for PhaseSyncHandle {
    fn drop(&mut self) {
        for task in [self.poll_task.take(), self.tick_task.take()]
            .into_iter()
            .flatten()
        {
            task.abort();
        }
    }
}

struct Poller {
    api: Arc<dyn GameApi>,
    navigator: Arc<dyn Navigator>,
    clock: Arc<dyn Clock>,
    redirector: Mutex<Redirector>,
    view: Arc<watch::Sender<SyncView>>,
    options: SyncOptions,
}

impl Poller {
    /// One fetch-and-reconcile pass. Failures are logged and dropped; the
    /// next tick tries again.
    async fn poll_once(&self) {
        let code = &self.options.code;

        let game = match self.api.game(code).await {
            Ok(game) => game,
            Err(ApiError::RoomNotFound) => {
                tracing::warn!("Room {} no longer exists", code);
                self.view.send_modify(|view| view.room_missing = true);
                self.navigate(|redirector| redirector.redirect_to(Route::Home, code));
                return;
            }
            Err(e) => {
                tracing::debug!("Game poll for {} failed: {}", code, e);
                return;
            }
        };

        // Roster and pitches are best-effort; a failure keeps the old values
        let room = match self.api.room(code).await {
            Ok(room) => Some(room),
            Err(e) => {
                tracing::debug!("Room poll for {} failed: {}", code, e);
                None
            }
        };

        let current_page = self.current_page();
        let pitches = if current_page.shows_pitches() {
            match self.api.pitches(code).await {
                Ok(pitches) => Some(pitches),
                Err(e) => {
                    tracing::debug!("Pitch poll for {} failed: {}", code, e);
                    None
                }
            }
        } else {
            None
        };

        let local_now = self.clock.now_ms();
        let player = self.options.player.as_deref();
        self.view.send_modify(|view| {
            view.apply_game(&game, player, local_now);
            if let Some(room) = room {
                view.players = room.players;
                view.host = room.host;
            }
            if let Some(pitches) = pitches {
                view.pitches = pitches;
            }
        });

        self.navigate(|redirector| redirector.reconcile(game.phase, code));
    }

    fn current_page(&self) -> Route {
        self.redirector
            .lock()
            .map(|r| r.current())
            .unwrap_or(self.options.page)
    }

    fn navigate(&self, decide: impl FnOnce(&mut Redirector) -> Option<String>) {
        let target = match self.redirector.lock() {
            Ok(mut redirector) => {
                let target = decide(&mut redirector);
                target.map(|path| (path, redirector.current()))
            }
            Err(_) => None,
        };

        if let Some((path, page)) = target {
            tracing::info!("Phase moved on, redirecting to {}", path);
            self.view.send_modify(|view| view.page = Some(page));
            self.navigator.replace(&path);
        }
    }
}

async fn next_push(pushes: &mut Option<mpsc::Receiver<RoomStatePush>>) -> Option<RoomStatePush> {
    match pushes {
        Some(rx) => rx.recv().await,
        // No push channel: wait forever
        None => std::future::pending().await,
    }
}

enum Wake {
    Tick,
    Push,
    PushClosed,
}

async fn poll_loop(poller: Poller, mut pushes: Option<mpsc::Receiver<RoomStatePush>>) {
    let mut interval = tokio::time::interval(poller.options.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let wake = tokio::select! {
            _ = interval.tick() => Wake::Tick,
            push = next_push(&mut pushes) => match push {
                Some(push) => {
                    tracing::debug!("room:state push for {} ({:?})", push.code, push.phase);
                    Wake::Push
                }
                None => Wake::PushClosed,
            },
        };

        match wake {
            Wake::Tick => {}
            // A burst of pushes costs a single refetch
            Wake::Push => {
                if let Some(rx) = pushes.as_mut() {
                    let mut skipped = 0;
                    while rx.try_recv().is_ok() {
                        skipped += 1;
                    }
                    if skipped > 0 {
                        tracing::debug!("Coalesced {} queued pushes", skipped);
                    }
                }
            }
            Wake::PushClosed => {
                tracing::debug!("Push channel closed, polling only");
                pushes = None;
                continue;
            }
        }

        // Fetches are awaited in sequence, so polls never overlap
        poller.poll_once().await;
    }
}

async fn tick_loop(view: Arc<watch::Sender<SyncView>>, clock: Arc<dyn Clock>) {
    let mut interval = tokio::time::interval(TICK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let now = clock.now_ms();
        view.send_if_modified(|view| {
            let next = view
                .expires_at
                .map(|expires| seconds_left(expires, now, view.clock_offset));
            if next != view.seconds_left {
                view.seconds_left = next;
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ActionResponse, CreateRoomRequest, RoomAction, RoomInfo};
    use crate::api::ApiResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BASE_MS: EpochMillis = 1_700_000_000_000;

    /// Wall clock that follows tokio's (pausable) clock
    struct TokioClock {
        start: tokio::time::Instant,
    }

    impl TokioClock {
        fn new() -> Self {
            Self {
                start: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for TokioClock {
        fn now_ms(&self) -> EpochMillis {
            BASE_MS + self.start.elapsed().as_millis() as i64
        }
    }

    struct FakeApi {
        game: Mutex<ApiResult<GameSnapshot>>,
        game_calls: AtomicUsize,
        pitch_calls: AtomicUsize,
    }

    impl FakeApi {
        fn with_game(json: serde_json::Value) -> Arc<Self> {
            Arc::new(Self {
                game: Mutex::new(Ok(serde_json::from_value(json).unwrap())),
                game_calls: AtomicUsize::new(0),
                pitch_calls: AtomicUsize::new(0),
            })
        }

        fn set_game(&self, result: ApiResult<GameSnapshot>) {
            *self.game.lock().unwrap() = result;
        }

        fn calls(&self) -> usize {
            self.game_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GameApi for FakeApi {
        async fn room(&self, code: &str) -> ApiResult<RoomInfo> {
            Ok(RoomInfo {
                code: code.to_string(),
                players: vec![Player {
                    name: "Alice".to_string(),
                    is_host: true,
                    mascot: Some(MascotSpecies::Shark),
                }],
                capacity: Some(8),
                host: Some("Alice".to_string()),
            })
        }

        async fn game(&self, _code: &str) -> ApiResult<GameSnapshot> {
            self.game_calls.fetch_add(1, Ordering::SeqCst);
            match &*self.game.lock().unwrap() {
                Ok(game) => Ok(game.clone()),
                Err(ApiError::RoomNotFound) => Err(ApiError::RoomNotFound),
                Err(e) => Err(ApiError::Request(e.to_string())),
            }
        }

        async fn pitches(&self, _code: &str) -> ApiResult<Vec<Pitch>> {
            self.pitch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![])
        }

        async fn create_room(&self, _request: CreateRoomRequest) -> ApiResult<ActionResponse> {
            unimplemented!()
        }

        async fn act(&self, _code: &str, _action: RoomAction) -> ApiResult<ActionResponse> {
            unimplemented!()
        }
    }

    #[derive(Default)]
    struct RecordingNavigator {
        paths: Mutex<Vec<String>>,
    }

    impl RecordingNavigator {
        fn paths(&self) -> Vec<String> {
            self.paths.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn replace(&self, path: &str) {
            self.paths.lock().unwrap().push(path.to_string());
        }
    }

    fn start(
        api: Arc<FakeApi>,
        nav: Arc<RecordingNavigator>,
        page: Route,
    ) -> PhaseSyncHandle {
        let options = SyncOptions::new("ABCD", page)
            .with_player("alice")
            .with_poll_interval(Duration::from_secs(1));
        PhaseSync::spawn(api, nav, Arc::new(TokioClock::new()), options, None)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_is_immediate() {
        let api = FakeApi::with_game(serde_json::json!({
            "phase": "deal",
            "round": 2,
            "mustHavesByPlayer": {"Alice": ["a goat"]},
            "playerScores": {"Alice": 300}
        }));
        let nav = Arc::new(RecordingNavigator::default());
        let handle = start(api.clone(), nav.clone(), Route::Deal);

        tokio::time::sleep(Duration::from_millis(10)).await;

        let view = handle.view();
        assert_eq!(api.calls(), 1);
        assert_eq!(view.phase, Some(GamePhase::Deal));
        assert_eq!(view.round, 2);
        assert_eq!(view.my_must_haves, vec!["a goat".to_string()]);
        assert_eq!(view.scores.get("Alice"), Some(&300));
        assert_eq!(view.players.len(), 1);
        assert!(nav.paths().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_divergence_redirects_exactly_once() {
        let api = FakeApi::with_game(serde_json::json!({"phase": "pitch"}));
        let nav = Arc::new(RecordingNavigator::default());
        let handle = start(api.clone(), nav.clone(), Route::Deal);

        tokio::time::sleep(Duration::from_millis(5500)).await;

        assert!(api.calls() >= 5);
        assert_eq!(nav.paths(), vec!["/pitch/ABCD".to_string()]);
        assert_eq!(handle.view().page, Some(Route::Pitch));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_ticks_between_polls() {
        // No serverNow, so the offset stays at zero
        let api = FakeApi::with_game(serde_json::json!({
            "phase": "pitch",
            "pitchEndsAt": BASE_MS + 10_000
        }));
        let nav = Arc::new(RecordingNavigator::default());
        // Slowest poll rate, so most updates come from the tick task
        let options = SyncOptions::new("ABCD", Route::Pitch)
            .with_poll_interval(Duration::from_secs(4));
        let handle = PhaseSync::spawn(
            api.clone(),
            nav.clone(),
            Arc::new(TokioClock::new()),
            options,
            None,
        );

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(handle.view().seconds_left, Some(10));

        let mut previous = 10;
        for _ in 0..12 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            let left = handle.view().seconds_left.unwrap();
            assert!(left <= previous);
            previous = left;
        }
        assert_eq!(previous, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_offset_applied() {
        // Server is 2s ahead: 10s on its clock leaves 8s on ours
        let api = FakeApi::with_game(serde_json::json!({
            "phase": "deal",
            "serverNow": BASE_MS + 2000,
            "dealEndsAt": BASE_MS + 12_000
        }));
        let nav = Arc::new(RecordingNavigator::default());
        let handle = start(api, nav, Route::Deal);

        tokio::time::sleep(Duration::from_millis(1)).await;
        let view = handle.view();
        assert_eq!(view.clock_offset, ClockOffset(2000));
        assert_eq!(view.seconds_left, Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_is_retried() {
        let api = FakeApi::with_game(serde_json::json!({"phase": "lobby"}));
        api.set_game(Err(ApiError::Request("connection refused".to_string())));
        let nav = Arc::new(RecordingNavigator::default());
        let handle = start(api.clone(), nav.clone(), Route::Lobby);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(handle.view().polls, 0);

        api.set_game(Ok(serde_json::from_value(serde_json::json!({"phase": "deal"})).unwrap()));
        tokio::time::sleep(Duration::from_secs(1)).await;

        let view = handle.view();
        assert_eq!(view.polls, 1);
        assert_eq!(view.phase, Some(GamePhase::Deal));
        assert_eq!(nav.paths(), vec!["/deal/ABCD".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_room_not_found_goes_home() {
        let api = FakeApi::with_game(serde_json::json!({"phase": "lobby"}));
        api.set_game(Err(ApiError::RoomNotFound));
        let nav = Arc::new(RecordingNavigator::default());
        let handle = start(api, nav.clone(), Route::Lobby);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert!(handle.view().room_missing);
        assert_eq!(nav.paths(), vec!["/".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pitches_only_fetched_on_pitch_pages() {
        let api = FakeApi::with_game(serde_json::json!({"phase": "deal"}));
        let nav = Arc::new(RecordingNavigator::default());
        let _handle = start(api.clone(), nav, Route::Deal);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(api.pitch_calls.load(Ordering::SeqCst), 0);

        let api = FakeApi::with_game(serde_json::json!({"phase": "reveal"}));
        let nav = Arc::new(RecordingNavigator::default());
        let _handle = start(api.clone(), nav, Route::Reveal);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.pitch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_triggers_extra_fetch() {
        let api = FakeApi::with_game(serde_json::json!({"phase": "lobby"}));
        let nav = Arc::new(RecordingNavigator::default());
        let (tx, rx) = mpsc::channel(8);
        let options = SyncOptions::new("ABCD", Route::Lobby)
            .with_poll_interval(Duration::from_secs(4));
        let _handle = PhaseSync::spawn(
            api.clone(),
            nav,
            Arc::new(TokioClock::new()),
            options,
            Some(rx),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.calls(), 1);

        tx.send(RoomStatePush {
            code: "ABCD".to_string(),
            phase: Some(GamePhase::Deal),
            round: Some(1),
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.calls(), 2);

        // Closing the push channel falls back to plain polling
        drop(tx);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(api.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_burst_coalesced() {
        let api = FakeApi::with_game(serde_json::json!({"phase": "lobby"}));
        let nav = Arc::new(RecordingNavigator::default());
        let (tx, rx) = mpsc::channel(16);
        let options = SyncOptions::new("ABCD", Route::Lobby)
            .with_poll_interval(Duration::from_secs(4));
        let _handle = PhaseSync::spawn(
            api.clone(),
            nav,
            Arc::new(TokioClock::new()),
            options,
            Some(rx),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.calls(), 1);

        for round in 0..10 {
            tx.try_send(RoomStatePush {
                code: "ABCD".to_string(),
                phase: Some(GamePhase::Lobby),
                round: Some(round),
            })
            .unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extreme_timestamps_keep_sync_alive() {
        let api = FakeApi::with_game(serde_json::json!({
            "phase": "deal",
            "serverNow": i64::MAX,
            "dealEndsAt": i64::MIN
        }));
        let nav = Arc::new(RecordingNavigator::default());
        let handle = start(api.clone(), nav, Route::Deal);

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let view = handle.view();
        assert!(api.calls() >= 4);
        assert_eq!(view.polls as usize, api.calls());
        assert_eq!(view.seconds_left, Some(0));

        // Still reconciling after the bad values
        api.set_game(Ok(serde_json::from_value(serde_json::json!({
            "phase": "deal",
            "dealEndsAt": i64::MAX
        }))
        .unwrap()));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.view().expires_at, Some(i64::MAX));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_silences_everything() {
        let api = FakeApi::with_game(serde_json::json!({
            "phase": "deal",
            "serverNow": BASE_MS,
            "dealEndsAt": BASE_MS + 30_000
        }));
        let nav = Arc::new(RecordingNavigator::default());
        let handle = start(api.clone(), nav.clone(), Route::Deal);
        let mut updates = handle.subscribe();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let calls_before = api.calls();
        assert!(calls_before >= 2);

        handle.stop().await;

        // Server moves on; nobody is listening anymore
        api.set_game(Ok(serde_json::from_value(serde_json::json!({"phase": "pitch"})).unwrap()));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(api.calls(), calls_before);
        assert!(nav.paths().is_empty());
        // Both senders are gone with the tasks
        assert!(updates.has_changed().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_polling() {
        let api = FakeApi::with_game(serde_json::json!({"phase": "lobby"}));
        let nav = Arc::new(RecordingNavigator::default());
        let handle = start(api.clone(), nav, Route::Lobby);

        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(handle);
        let calls = api.calls();

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(api.calls(), calls);
    }
}
