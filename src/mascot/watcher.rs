use std::collections::{HashMap, HashSet};

use super::{MascotEvent, TriggerRegistry};
use crate::sync::SyncView;
use crate::types::{same_player, GamePhase, PlayerName};

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Turns changes between successive [`SyncView`]s into mascot events.
///
/// Only transitions fire; feeding the same view twice fires nothing.
#[derive(Debug, Default)]
pub struct StatusWatcher {
    ready: HashMap<String, bool>,
    winners: Vec<String>,
    judge: Option<String>,
    presenter: Option<String>,
    phase: Option<GamePhase>,
}

impl StatusWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare `view` with the last one seen, trigger the resulting events and
    /// return them in the order they fired.
    pub fn observe(
        &mut self,
        view: &SyncView,
        registry: &TriggerRegistry,
    ) -> Vec<(PlayerName, MascotEvent)> {
        let mut fired = Vec::new();
        let mut fire = |name: &str, event: MascotEvent| {
            registry.trigger(name, event, None);
            fired.push((name.to_string(), event));
        };

        // Ready flags: false -> true selects, true -> false deselects
        let mut names: Vec<_> = view.ready.iter().collect();
        names.sort();
        for (name, &ready) in names {
            let was_ready = self.ready.insert(key(name), ready).unwrap_or(false);
            match (was_ready, ready) {
                (false, true) => fire(name, MascotEvent::Select),
                (true, false) => fire(name, MascotEvent::Deselect),
                _ => {}
            }
        }
        let present: HashSet<String> = view.ready.keys().map(|n| key(n)).collect();
        self.ready.retain(|name, _| present.contains(name));

        // Judge role moved
        let judge = view.judge.as_deref().map(key);
        if judge != self.judge {
            if let Some(previous) = self.judge.take() {
                fire(&previous, MascotEvent::Idle);
            }
            if let Some(name) = view.judge.as_deref() {
                fire(name, MascotEvent::Judge);
            }
            self.judge = judge;
        }

        // Presenter during reveal
        let presenter = view.presenter.as_deref().map(key);
        if presenter != self.presenter {
            if let Some(previous) = self.presenter.take() {
                fire(&previous, MascotEvent::Idle);
            }
            if let Some(name) = view.presenter.as_deref() {
                fire(name, MascotEvent::Present);
            }
            self.presenter = presenter;
        }

        // Entering the final round
        if view.phase == Some(GamePhase::FinalRound) && self.phase != Some(GamePhase::FinalRound) {
            for player in &view.players {
                fire(&player.name, MascotEvent::EnterFinal);
            }
        }
        self.phase = view.phase;

        // Winners announced: everyone else on the scoreboard loses
        let winners: Vec<String> = view.winners.iter().map(|w| key(w)).collect();
        if !winners.is_empty() && winners != self.winners {
            for winner in &view.winners {
                fire(winner, MascotEvent::Win);
            }
            let mut losers: Vec<&String> = view
                .scores
                .keys()
                .filter(|name| !view.winners.iter().any(|w| same_player(w, name)))
                .collect();
            losers.sort();
            for loser in losers {
                fire(loser, MascotEvent::Lose);
            }
        }
        self.winners = winners;

        fired
    }
}
