use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `GET /api/room/:code`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    #[serde(default)]
    pub code: RoomCode,
    #[serde(default)]
    pub players: Vec<Player>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub host: Option<PlayerName>,
}

impl RoomInfo {
    pub fn find_player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| same_player(&p.name, name))
    }

    pub fn is_full(&self) -> bool {
        self.capacity
            .map(|cap| self.players.len() >= cap as usize)
            .unwrap_or(false)
    }
}

/// `GET /api/room/:code/game`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub phase: GamePhase,
    #[serde(default)]
    pub round: u32,
    /// Server wall clock at response time, used for clock-offset correction
    #[serde(default)]
    pub server_now: Option<EpochMillis>,
    #[serde(default)]
    pub deal_ends_at: Option<EpochMillis>,
    #[serde(default)]
    pub pitch_ends_at: Option<EpochMillis>,
    #[serde(default)]
    pub reveal_ends_at: Option<EpochMillis>,
    #[serde(default)]
    pub vote_ends_at: Option<EpochMillis>,
    #[serde(default)]
    pub final_round_ends_at: Option<EpochMillis>,
    /// Generic expiry for phases without a dedicated field
    #[serde(default)]
    pub phase_expires_at: Option<EpochMillis>,
    #[serde(default)]
    pub ask: Option<String>,
    #[serde(default)]
    pub must_haves_by_player: HashMap<PlayerName, Vec<String>>,
    #[serde(default)]
    pub surprise_by_player: HashMap<PlayerName, String>,
    #[serde(default)]
    pub player_scores: HashMap<PlayerName, i64>,
    #[serde(default)]
    pub ready_by_player: HashMap<PlayerName, bool>,
    #[serde(default)]
    pub game_winner: Option<PlayerName>,
    #[serde(default)]
    pub game_winners: Vec<PlayerName>,
    /// Current judge (the "penguin" or "walrus")
    #[serde(default)]
    pub judge: Option<PlayerName>,
    /// Player currently presenting during reveal
    #[serde(default)]
    pub presenter: Option<PlayerName>,
}

impl GameSnapshot {
    /// Expiry of the timer owned by the current phase
    pub fn expires_at(&self) -> Option<EpochMillis> {
        let specific = match self.phase {
            GamePhase::Deal => self.deal_ends_at,
            GamePhase::Pitch => self.pitch_ends_at,
            GamePhase::Reveal => self.reveal_ends_at,
            GamePhase::Vote => self.vote_ends_at,
            GamePhase::FinalRound => self.final_round_ends_at,
            _ => None,
        };
        specific.or(self.phase_expires_at)
    }

    /// Winners, preferring the list form over the single-winner field
    pub fn winners(&self) -> Vec<PlayerName> {
        if !self.game_winners.is_empty() {
            self.game_winners.clone()
        } else {
            self.game_winner.iter().cloned().collect()
        }
    }

    /// Look up a per-player map entry ignoring name case
    fn lookup<'a, T>(map: &'a HashMap<PlayerName, T>, name: &str) -> Option<&'a T> {
        map.get(name)
            .or_else(|| map.iter().find(|(k, _)| same_player(k, name)).map(|(_, v)| v))
    }

    pub fn must_haves_for(&self, name: &str) -> Vec<String> {
        Self::lookup(&self.must_haves_by_player, name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn surprise_for(&self, name: &str) -> Option<String> {
        Self::lookup(&self.surprise_by_player, name).cloned()
    }
}

/// `GET /api/room/:code/pitches`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PitchList {
    #[serde(default)]
    pub pitches: Vec<Pitch>,
}

/// Envelope every POST endpoint answers with
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub ok: bool,
    #[serde(default)]
    pub message: Option<String>,
    /// Room code, present on room creation
    #[serde(default)]
    pub code: Option<RoomCode>,
    /// Generated pitch, present on AI pitch generation
    #[serde(default)]
    pub pitch: Option<Pitch>,
}

/// `POST /api/rooms`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub name: PlayerName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mascot: Option<MascotSpecies>,
}

/// A player-submitted pitch, before the server assigns it an id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchDraft {
    pub title: String,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sketch_data: Option<String>,
    pub used_must_haves: Vec<String>,
}

/// Explicit player actions against a room, one per POST endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RoomAction {
    Join {
        name: PlayerName,
        #[serde(skip_serializing_if = "Option::is_none")]
        mascot: Option<MascotSpecies>,
    },
    Leave {
        name: PlayerName,
    },
    SelectAsk {
        name: PlayerName,
        ask: String,
    },
    SubmitPitch {
        name: PlayerName,
        #[serde(rename = "pitch")]
        draft: PitchDraft,
        status: PitchStatus,
    },
    GeneratePitch {
        name: PlayerName,
    },
    PitchViewed {
        name: PlayerName,
        #[serde(rename = "pitchId")]
        pitch_id: PitchId,
    },
    Challenge {
        name: PlayerName,
        #[serde(rename = "pitchId")]
        pitch_id: PitchId,
    },
    Judge {
        name: PlayerName,
        #[serde(rename = "winnerPitchId")]
        winner_pitch_id: PitchId,
    },
    Advance {
        name: PlayerName,
    },
    Ready {
        name: PlayerName,
        ready: bool,
    },
    SelectMascot {
        name: PlayerName,
        mascot: MascotSpecies,
    },
    ToggleVoice {
        name: PlayerName,
        enabled: bool,
    },
}

impl RoomAction {
    /// Endpoint segment under `/api/room/:code/`
    pub fn endpoint(&self) -> &'static str {
        match self {
            RoomAction::Join { .. } => "join",
            RoomAction::Leave { .. } => "leave",
            RoomAction::SelectAsk { .. } => "select-ask",
            RoomAction::SubmitPitch { .. } => "pitch",
            RoomAction::GeneratePitch { .. } => "generate-pitch",
            RoomAction::PitchViewed { .. } => "pitch-viewed",
            RoomAction::Challenge { .. } => "challenge",
            RoomAction::Judge { .. } => "judge",
            RoomAction::Advance { .. } => "advance",
            RoomAction::Ready { .. } => "ready",
            RoomAction::SelectMascot { .. } => "mascot",
            RoomAction::ToggleVoice { .. } => "voice",
        }
    }
}

/// Payload of a `room:state` push
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatePush {
    pub code: RoomCode,
    #[serde(default)]
    pub phase: Option<GamePhase>,
    #[serde(default)]
    pub round: Option<u32>,
}

/// Frames on the room socket channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum SocketFrame {
    #[serde(rename = "room:join")]
    Join { code: RoomCode, name: PlayerName },
    #[serde(rename = "room:state")]
    State(RoomStatePush),
    #[serde(rename = "room:leave")]
    Leave { code: RoomCode, name: PlayerName },
}
