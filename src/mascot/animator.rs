use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::Instant;

use super::table::{bundle_for, AnimationBundle};
use crate::types::MascotSpecies;

/// Something that happened to a player, as far as their mascot cares
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum MascotEvent {
    Select,
    Deselect,
    Win,
    Lose,
    LoseMoney,
    Pitch,
    Present,
    EnterFinal,
    Judge,
    Idle,
}

impl MascotEvent {
    pub const ALL: [MascotEvent; 10] = [
        MascotEvent::Select,
        MascotEvent::Deselect,
        MascotEvent::Win,
        MascotEvent::Lose,
        MascotEvent::LoseMoney,
        MascotEvent::Pitch,
        MascotEvent::Present,
        MascotEvent::EnterFinal,
        MascotEvent::Judge,
        MascotEvent::Idle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MascotEvent::Select => "select",
            MascotEvent::Deselect => "deselect",
            MascotEvent::Win => "win",
            MascotEvent::Lose => "lose",
            MascotEvent::LoseMoney => "lose-money",
            MascotEvent::Pitch => "pitch",
            MascotEvent::Present => "present",
            MascotEvent::EnterFinal => "enter-final",
            MascotEvent::Judge => "judge",
            MascotEvent::Idle => "idle",
        }
    }

    /// State the mascot enters on this event
    pub fn state(&self) -> AnimationState {
        match self {
            MascotEvent::Select => AnimationState::Selected,
            MascotEvent::Deselect => AnimationState::Deselected,
            MascotEvent::Win => AnimationState::Winner,
            MascotEvent::Lose | MascotEvent::LoseMoney => AnimationState::Loser,
            MascotEvent::Pitch | MascotEvent::Present => AnimationState::Pitching,
            MascotEvent::EnterFinal => AnimationState::FinalRound,
            MascotEvent::Judge => AnimationState::Judging,
            MascotEvent::Idle => AnimationState::Idle,
        }
    }

    /// How long the state holds before resetting to idle
    pub fn default_hold(&self) -> Hold {
        match self {
            MascotEvent::Select => Hold::For(Duration::from_millis(600)),
            MascotEvent::Deselect => Hold::For(Duration::from_millis(300)),
            MascotEvent::Win => Hold::For(Duration::from_millis(1000)),
            MascotEvent::Lose | MascotEvent::LoseMoney => Hold::For(Duration::from_millis(800)),
            MascotEvent::EnterFinal => Hold::For(Duration::from_millis(1000)),
            MascotEvent::Pitch | MascotEvent::Present | MascotEvent::Judge | MascotEvent::Idle => {
                Hold::Indefinite
            }
        }
    }
}

impl fmt::Display for MascotEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MascotEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown mascot event: {}", s))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AnimationState {
    Idle,
    Selected,
    Deselected,
    Pitching,
    Winner,
    Loser,
    FinalRound,
    Judging,
}

/// How long a triggered state lasts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hold {
    For(Duration),
    /// Until the next trigger
    Indefinite,
}

/// What a renderer should show right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationFrame {
    pub state: AnimationState,
    pub event: MascotEvent,
    pub bundle: AnimationBundle,
}

impl AnimationFrame {
    fn idle(species: MascotSpecies) -> Self {
        Self {
            state: AnimationState::Idle,
            event: MascotEvent::Idle,
            bundle: bundle_for(species, MascotEvent::Idle),
        }
    }

    pub fn classes(&self) -> Vec<&'static str> {
        self.bundle.classes()
    }
}

/// One mascot's animation state machine.
///
/// The active frame and its reset deadline are replaced together on every
/// trigger, so superseding a pending reset is a single assignment.
#[derive(Debug, Clone)]
pub struct Animator {
    species: MascotSpecies,
    frame: AnimationFrame,
    deadline: Option<Instant>,
}

impl Animator {
    pub fn new(species: MascotSpecies) -> Self {
        Self {
            species,
            frame: AnimationFrame::idle(species),
            deadline: None,
        }
    }

    pub fn species(&self) -> MascotSpecies {
        self.species
    }

    /// Apply `event` at `now`. Returns the reset deadline, if any.
    pub fn trigger(&mut self, event: MascotEvent, now: Instant, hold: Option<Hold>) -> Option<Instant> {
        let hold = hold.unwrap_or_else(|| event.default_hold());
        self.frame = AnimationFrame {
            state: event.state(),
            event,
            bundle: bundle_for(self.species, event),
        };
        self.deadline = match hold {
            Hold::For(duration) => Some(now + duration),
            Hold::Indefinite => None,
        };
        self.deadline
    }

    /// Frame as of `now`, treating an expired hold as idle
    pub fn frame_at(&self, now: Instant) -> AnimationFrame {
        match self.deadline {
            Some(deadline) if now >= deadline => AnimationFrame::idle(self.species),
            _ => self.frame,
        }
    }

    /// Commit an expired hold. Returns whether the mascot went back to idle.
    pub fn settle(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.frame = AnimationFrame::idle(self.species);
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names_round_trip() {
        for event in MascotEvent::ALL {
            assert_eq!(event.as_str().parse::<MascotEvent>().unwrap(), event);
        }
        assert!("dance".parse::<MascotEvent>().is_err());

        let event: MascotEvent = serde_json::from_str("\"lose-money\"").unwrap();
        assert_eq!(event, MascotEvent::LoseMoney);
    }

    #[test]
    fn test_hold_durations() {
        let ms = |event: MascotEvent| match event.default_hold() {
            Hold::For(d) => Some(d.as_millis()),
            Hold::Indefinite => None,
        };
        assert_eq!(ms(MascotEvent::Select), Some(600));
        assert_eq!(ms(MascotEvent::Deselect), Some(300));
        assert_eq!(ms(MascotEvent::Win), Some(1000));
        assert_eq!(ms(MascotEvent::Lose), Some(800));
        assert_eq!(ms(MascotEvent::LoseMoney), Some(800));
        assert_eq!(ms(MascotEvent::EnterFinal), Some(1000));
        assert_eq!(ms(MascotEvent::Pitch), None);
        assert_eq!(ms(MascotEvent::Present), None);
        assert_eq!(ms(MascotEvent::Judge), None);
        assert_eq!(ms(MascotEvent::Idle), None);
    }

    #[test]
    fn test_starts_idle() {
        let animator = Animator::new(MascotSpecies::Penguin);
        let frame = animator.frame_at(Instant::now());
        assert_eq!(frame.state, AnimationState::Idle);
        assert!(animator.deadline().is_none());
    }

    #[test]
    fn test_hold_then_reset() {
        let mut animator = Animator::new(MascotSpecies::Walrus);
        let t0 = Instant::now();

        let deadline = animator.trigger(MascotEvent::Win, t0, None).unwrap();
        assert_eq!(deadline, t0 + Duration::from_millis(1000));
        assert_eq!(
            animator.frame_at(t0 + Duration::from_millis(999)).state,
            AnimationState::Winner
        );
        assert_eq!(animator.frame_at(deadline).state, AnimationState::Idle);

        assert!(!animator.settle(t0 + Duration::from_millis(500)));
        assert!(animator.settle(deadline));
        assert!(animator.deadline().is_none());
    }

    #[test]
    fn test_last_trigger_wins() {
        let mut animator = Animator::new(MascotSpecies::Shark);
        let t0 = Instant::now();

        animator.trigger(MascotEvent::Select, t0, None);
        let t1 = t0 + Duration::from_millis(400);
        animator.trigger(MascotEvent::Lose, t1, None);

        // The select reset time has passed, but lose holds until t1 + 800ms
        let select_deadline = t0 + Duration::from_millis(600);
        assert!(!animator.settle(select_deadline));
        let frame = animator.frame_at(select_deadline);
        assert_eq!(frame.state, AnimationState::Loser);
        assert_eq!(frame.bundle, bundle_for(MascotSpecies::Shark, MascotEvent::Lose));

        assert!(animator.settle(t1 + Duration::from_millis(800)));
    }

    #[test]
    fn test_indefinite_hold_clears_pending_reset() {
        let mut animator = Animator::new(MascotSpecies::Unicorn);
        let t0 = Instant::now();

        animator.trigger(MascotEvent::Select, t0, None);
        assert!(animator.trigger(MascotEvent::Judge, t0, None).is_none());

        let later = t0 + Duration::from_secs(60);
        assert_eq!(animator.frame_at(later).state, AnimationState::Judging);
        assert!(!animator.settle(later));
    }

    #[test]
    fn test_hold_override() {
        let mut animator = Animator::new(MascotSpecies::Penguin);
        let t0 = Instant::now();

        let deadline = animator
            .trigger(MascotEvent::Pitch, t0, Some(Hold::For(Duration::from_millis(50))))
            .unwrap();
        assert_eq!(deadline, t0 + Duration::from_millis(50));

        assert!(animator
            .trigger(MascotEvent::Win, t0, Some(Hold::Indefinite))
            .is_none());
    }
}
