use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque ID types for readability
pub type RoomCode = String;
pub type PlayerName = String;
pub type PitchId = String;

/// Milliseconds since the Unix epoch, as sent by the game server
pub type EpochMillis = i64;

/// Server-authoritative stage of a round
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum GamePhase {
    Lobby,
    Deal,
    Pitch,
    Reveal,
    Vote,
    Results,
    FinalRound,
    /// Any phase this client does not know about. Never redirected.
    #[serde(other)]
    Unknown,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Lobby => "lobby",
            GamePhase::Deal => "deal",
            GamePhase::Pitch => "pitch",
            GamePhase::Reveal => "reveal",
            GamePhase::Vote => "vote",
            GamePhase::Results => "results",
            GamePhase::FinalRound => "final-round",
            GamePhase::Unknown => "unknown",
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of mascot species a player can pick
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MascotSpecies {
    Penguin,
    Walrus,
    Shark,
    Unicorn,
    Octopus,
    Llama,
    /// Unrecognized mascot id; animates with the default table
    #[serde(other)]
    Other,
}

impl MascotSpecies {
    /// Every selectable species, in display order
    pub const ALL: [MascotSpecies; 6] = [
        MascotSpecies::Penguin,
        MascotSpecies::Walrus,
        MascotSpecies::Shark,
        MascotSpecies::Unicorn,
        MascotSpecies::Octopus,
        MascotSpecies::Llama,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MascotSpecies::Penguin => "penguin",
            MascotSpecies::Walrus => "walrus",
            MascotSpecies::Shark => "shark",
            MascotSpecies::Unicorn => "unicorn",
            MascotSpecies::Octopus => "octopus",
            MascotSpecies::Llama => "llama",
            MascotSpecies::Other => "other",
        }
    }

    /// Parse a mascot id; unknown ids map to `Other`
    pub fn from_id(id: &str) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|s| s.as_str().eq_ignore_ascii_case(id.trim()))
            .unwrap_or(MascotSpecies::Other)
    }
}

impl fmt::Display for MascotSpecies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Player names are unique per room, ignoring case
pub fn same_player(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub name: PlayerName,
    #[serde(default)]
    pub is_host: bool,
    #[serde(default)]
    pub mascot: Option<MascotSpecies>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pitch {
    pub id: PitchId,
    pub player: PlayerName,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub voice: Option<String>,
    /// `data:image/png;base64,...` URL of the player's sketch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sketch_data: Option<String>,
    #[serde(default)]
    pub used_must_haves: Vec<String>,
    #[serde(default)]
    pub ai_generated: bool,
    #[serde(default = "default_true")]
    pub is_valid: bool,
    #[serde(default)]
    pub disqualified: bool,
    #[serde(default)]
    pub viewed: bool,
}

fn default_true() -> bool {
    true
}

impl Pitch {
    /// Whether the pitch still counts for judging
    pub fn is_eligible(&self) -> bool {
        self.is_valid && !self.disqualified
    }

    /// Decode the sketch data URL into raw image bytes
    pub fn sketch_bytes(&self) -> Option<Vec<u8>> {
        let data = self.sketch_data.as_deref()?;
        let (header, payload) = data.split_once(',')?;
        if !header.starts_with("data:") || !header.ends_with(";base64") {
            return None;
        }
        STANDARD.decode(payload.trim()).ok()
    }
}

/// Status sent with a pitch submission
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PitchStatus {
    Drafting,
    Ready,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_wire_names() {
        let phase: GamePhase = serde_json::from_str("\"final-round\"").unwrap();
        assert_eq!(phase, GamePhase::FinalRound);
        assert_eq!(serde_json::to_string(&GamePhase::Deal).unwrap(), "\"deal\"");

        // Unknown phases must not fail decoding
        let phase: GamePhase = serde_json::from_str("\"intermission\"").unwrap();
        assert_eq!(phase, GamePhase::Unknown);
    }

    #[test]
    fn test_mascot_from_id() {
        assert_eq!(MascotSpecies::from_id("Shark"), MascotSpecies::Shark);
        assert_eq!(MascotSpecies::from_id(" unicorn "), MascotSpecies::Unicorn);
        assert_eq!(MascotSpecies::from_id("dragon"), MascotSpecies::Other);

        let species: MascotSpecies = serde_json::from_str("\"dragon\"").unwrap();
        assert_eq!(species, MascotSpecies::Other);
    }

    #[test]
    fn test_same_player_ignores_case() {
        assert!(same_player("Alice", "alice"));
        assert!(same_player("BOB ", "bob"));
        assert!(!same_player("Alice", "Alicia"));
    }

    #[test]
    fn test_pitch_defaults() {
        let pitch: Pitch =
            serde_json::from_str(r#"{"id":"p1","player":"Alice","title":"Uber for ducks"}"#)
                .unwrap();
        assert!(pitch.is_valid);
        assert!(!pitch.disqualified);
        assert!(pitch.is_eligible());
        assert!(pitch.used_must_haves.is_empty());
    }

    #[test]
    fn test_disqualified_pitch_is_not_eligible() {
        let pitch: Pitch = serde_json::from_str(
            r#"{"id":"p1","player":"Alice","disqualified":true,"aiGenerated":true}"#,
        )
        .unwrap();
        assert!(pitch.ai_generated);
        assert!(!pitch.is_eligible());
    }

    #[test]
    fn test_sketch_bytes() {
        let mut pitch: Pitch = serde_json::from_str(r#"{"id":"p1","player":"Alice"}"#).unwrap();
        assert!(pitch.sketch_bytes().is_none());

        pitch.sketch_data = Some("data:image/png;base64,aGVsbG8=".to_string());
        assert_eq!(pitch.sketch_bytes(), Some(b"hello".to_vec()));

        pitch.sketch_data = Some("not a data url".to_string());
        assert!(pitch.sketch_bytes().is_none());
    }
}
