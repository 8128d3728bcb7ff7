use crate::types::GamePhase;
use std::collections::HashMap;
use std::fmt;

/// Client-side pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Join,
    Lobby,
    Deal,
    Pitch,
    Reveal,
    Vote,
    Results,
    FinalRound,
}

impl Route {
    pub fn segment(&self) -> &'static str {
        match self {
            Route::Home => "",
            Route::Join => "join",
            Route::Lobby => "lobby",
            Route::Deal => "deal",
            Route::Pitch => "pitch",
            Route::Reveal => "reveal",
            Route::Vote => "vote",
            Route::Results => "results",
            Route::FinalRound => "final-round",
        }
    }

    /// Pages that take a room code
    pub fn is_room_page(&self) -> bool {
        !matches!(self, Route::Home | Route::Join)
    }

    /// Pages that show the pitch list
    pub fn shows_pitches(&self) -> bool {
        matches!(
            self,
            Route::Reveal | Route::Vote | Route::Results | Route::FinalRound
        )
    }

    /// Path of this page, scoped to `code` where the page takes one
    pub fn path(&self, code: Option<&str>) -> String {
        match (self, code) {
            (Route::Home, _) => "/".to_string(),
            (route, Some(code)) if route.is_room_page() => {
                format!("/{}/{}", route.segment(), code)
            }
            (route, _) => format!("/{}", route.segment()),
        }
    }

    /// Resolve a path to a page and optional room code.
    ///
    /// `/lobby` without a code and anything unrecognized resolve to home.
    pub fn parse(path: &str) -> (Route, Option<String>) {
        let mut parts = path.trim().trim_matches('/').split('/');
        let segment = parts.next().unwrap_or_default();
        let code = parts.next().filter(|c| !c.is_empty()).map(str::to_string);
        if parts.next().is_some() {
            return (Route::Home, None);
        }

        let route = match segment {
            "" => Route::Home,
            "join" => Route::Join,
            "lobby" => Route::Lobby,
            "deal" => Route::Deal,
            "pitch" => Route::Pitch,
            "reveal" => Route::Reveal,
            "vote" => Route::Vote,
            "results" => Route::Results,
            "final-round" => Route::FinalRound,
            _ => return (Route::Home, None),
        };

        match (route, code) {
            (Route::Home | Route::Join, Some(_)) => (Route::Home, None),
            (Route::Lobby, None) => (Route::Home, None),
            (route, code) => (route, code),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path(None))
    }
}

/// Which page owns each server phase
#[derive(Debug, Clone)]
pub struct RedirectMap {
    routes: HashMap<GamePhase, Route>,
}

impl Default for RedirectMap {
    fn default() -> Self {
        let routes = [
            (GamePhase::Lobby, Route::Lobby),
            (GamePhase::Deal, Route::Deal),
            (GamePhase::Pitch, Route::Pitch),
            (GamePhase::Reveal, Route::Reveal),
            (GamePhase::Vote, Route::Vote),
            (GamePhase::Results, Route::Results),
            (GamePhase::FinalRound, Route::FinalRound),
        ]
        .into_iter()
        .collect();
        Self { routes }
    }
}

impl RedirectMap {
    /// Override the page for a phase (e.g. serve `vote` from the results page)
    #[must_use]
    pub fn with(mut self, phase: GamePhase, route: Route) -> Self {
        self.routes.insert(phase, route);
        self
    }

    pub fn route_for(&self, phase: GamePhase) -> Option<Route> {
        self.routes.get(&phase).copied()
    }
}

/// Receives page changes. Implementations replace history, not push.
pub trait Navigator: Send + Sync {
    fn replace(&self, path: &str);
}

/// Tracks the page being shown and decides when a phase calls for a redirect
#[derive(Debug, Clone)]
pub struct Redirector {
    current: Route,
    redirects: RedirectMap,
}

impl Redirector {
    pub fn new(current: Route, redirects: RedirectMap) -> Self {
        Self { current, redirects }
    }

    pub fn current(&self) -> Route {
        self.current
    }

    /// Path to navigate to, or `None` when the page already matches.
    ///
    /// After a redirect the target becomes the current page, so repeating the
    /// same phase yields nothing.
    pub fn reconcile(&mut self, phase: GamePhase, code: &str) -> Option<String> {
        let target = self.redirects.route_for(phase)?;
        self.redirect_to(target, code)
    }

    /// Unconditional page change (e.g. home when the room disappeared)
    pub fn redirect_to(&mut self, target: Route, code: &str) -> Option<String> {
        if target == self.current {
            return None;
        }
        self.current = target;
        Some(target.path(Some(code)))
    }
}
