//! Per-species animation lookup.
//!
//! Every event has a default bundle; species only list the events they
//! animate differently.

use super::animator::MascotEvent;
use crate::types::MascotSpecies;

/// Classes a renderer applies for one event: a primary class plus extras
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationBundle {
    pub primary: &'static str,
    pub secondary: &'static [&'static str],
}

impl AnimationBundle {
    const fn new(primary: &'static str, secondary: &'static [&'static str]) -> Self {
        Self { primary, secondary }
    }

    pub fn classes(&self) -> Vec<&'static str> {
        std::iter::once(self.primary)
            .chain(self.secondary.iter().copied())
            .collect()
    }
}

type EventTable = &'static [(MascotEvent, AnimationBundle)];

const PENGUIN: EventTable = &[
    (MascotEvent::Win, AnimationBundle::new("mascot-waddle-spin", &["mascot-confetti"])),
    (MascotEvent::Judge, AnimationBundle::new("mascot-monocle", &["mascot-tap-foot"])),
];

const WALRUS: EventTable = &[
    (MascotEvent::Win, AnimationBundle::new("mascot-belly-flop", &["mascot-splash"])),
    (MascotEvent::Judge, AnimationBundle::new("mascot-tusk-stroke", &[])),
    (MascotEvent::LoseMoney, AnimationBundle::new("mascot-wallet-drop", &["mascot-coins"])),
];

const SHARK: EventTable = &[
    (MascotEvent::Select, AnimationBundle::new("mascot-fin-circle", &[])),
    (MascotEvent::Win, AnimationBundle::new("mascot-chomp", &["mascot-bubbles"])),
    (MascotEvent::Lose, AnimationBundle::new("mascot-sink", &["mascot-bubbles"])),
    (MascotEvent::Pitch, AnimationBundle::new("mascot-swim-talk", &[])),
];

const UNICORN: EventTable = &[
    (MascotEvent::Win, AnimationBundle::new("mascot-rainbow-rear", &["mascot-sparkle", "mascot-glow"])),
    (MascotEvent::Lose, AnimationBundle::new("mascot-horn-droop", &[])),
    (MascotEvent::EnterFinal, AnimationBundle::new("mascot-gallop", &["mascot-sparkle"])),
];

const OCTOPUS: EventTable = &[
    (MascotEvent::Select, AnimationBundle::new("mascot-tentacle-wave", &[])),
    (MascotEvent::Lose, AnimationBundle::new("mascot-ink", &["mascot-shrink"])),
];

const LLAMA: EventTable = &[
    (MascotEvent::Win, AnimationBundle::new("mascot-prance", &["mascot-confetti"])),
    (MascotEvent::Lose, AnimationBundle::new("mascot-spit", &[])),
];

fn species_table(species: MascotSpecies) -> EventTable {
    match species {
        MascotSpecies::Penguin => PENGUIN,
        MascotSpecies::Walrus => WALRUS,
        MascotSpecies::Shark => SHARK,
        MascotSpecies::Unicorn => UNICORN,
        MascotSpecies::Octopus => OCTOPUS,
        MascotSpecies::Llama => LLAMA,
        MascotSpecies::Other => &[],
    }
}

fn default_bundle(event: MascotEvent) -> AnimationBundle {
    match event {
        MascotEvent::Select => AnimationBundle::new("mascot-hop", &["mascot-highlight"]),
        MascotEvent::Deselect => AnimationBundle::new("mascot-shrug", &[]),
        MascotEvent::Win => AnimationBundle::new("mascot-celebrate", &["mascot-confetti"]),
        MascotEvent::Lose => AnimationBundle::new("mascot-slump", &[]),
        MascotEvent::LoseMoney => AnimationBundle::new("mascot-slump", &["mascot-coins"]),
        MascotEvent::Pitch => AnimationBundle::new("mascot-talk", &[]),
        MascotEvent::Present => AnimationBundle::new("mascot-present", &["mascot-spotlight"]),
        MascotEvent::EnterFinal => AnimationBundle::new("mascot-drumroll", &["mascot-glow"]),
        MascotEvent::Judge => AnimationBundle::new("mascot-judge", &["mascot-gavel"]),
        MascotEvent::Idle => AnimationBundle::new("mascot-idle", &[]),
    }
}

/// Bundle for `event` on `species`, falling back to the default table
pub fn bundle_for(species: MascotSpecies, event: MascotEvent) -> AnimationBundle {
    species_table(species)
        .iter()
        .find(|(e, _)| *e == event)
        .map(|(_, bundle)| *bundle)
        .unwrap_or_else(|| default_bundle(event))
}
