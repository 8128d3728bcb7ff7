//! Explicit player actions.
//!
//! A [`Session`] wraps the game API and the local store: it runs the advisory
//! client-side checks before a request is sent, remembers rooms on join and
//! forgets them on leave or when the server no longer knows the room.

use std::sync::{Arc, Mutex};

use crate::api::{ApiError, ApiResult, GameApi};
use crate::protocol::{ActionResponse, CreateRoomRequest, PitchDraft, RoomAction};
use crate::store::LocalStore;
use crate::types::*;

/// A mascot choice as the selection UI should present it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MascotOption {
    pub species: MascotSpecies,
    pub taken_by: Option<PlayerName>,
    /// Taken by someone other than `me`
    pub disabled: bool,
}

/// Selectable state of every mascot, given the room roster.
///
/// Exclusivity is enforced by the server; this only mirrors it.
pub fn mascot_options(roster: &[Player], me: Option<&str>) -> Vec<MascotOption> {
    MascotSpecies::ALL
        .iter()
        .map(|&species| {
            let taken_by = roster
                .iter()
                .find(|p| p.mascot == Some(species))
                .map(|p| p.name.clone());
            let disabled = match (&taken_by, me) {
                (Some(holder), Some(me)) => !same_player(holder, me),
                (Some(_), None) => true,
                (None, _) => false,
            };
            MascotOption {
                species,
                taken_by,
                disabled,
            }
        })
        .collect()
}

pub struct Session {
    api: Arc<dyn GameApi>,
    store: Mutex<LocalStore>,
}

impl Session {
    pub fn new(api: Arc<dyn GameApi>, store: LocalStore) -> Self {
        Self {
            api,
            store: Mutex::new(store),
        }
    }

    pub fn api(&self) -> Arc<dyn GameApi> {
        self.api.clone()
    }

    /// Run `f` against the store. Persistence problems are logged, not
    /// surfaced: local state is a convenience.
    fn with_store<T>(&self, f: impl FnOnce(&mut LocalStore) -> T) -> Option<T> {
        match self.store.lock() {
            Ok(mut store) => Some(f(&mut store)),
            Err(_) => {
                tracing::warn!("Local store lock poisoned");
                None
            }
        }
    }

    /// Name this client plays as in `code`
    pub fn player_for(&self, code: &str) -> Option<PlayerName> {
        self.with_store(|store| store.player_for(code).map(str::to_string))
            .flatten()
    }

    pub fn last_room(&self) -> Option<RoomCode> {
        self.with_store(|store| store.last_room().map(str::to_string))
            .flatten()
    }

    pub fn sfx_enabled(&self) -> bool {
        self.with_store(|store| store.sfx_enabled()).unwrap_or(true)
    }

    pub fn set_sfx_enabled(&self, enabled: bool) {
        if let Some(Err(e)) = self.with_store(|store| store.set_sfx_enabled(enabled)) {
            tracing::warn!("Failed to save sound preference: {}", e);
        }
    }

    fn remember(&self, code: &str, name: &str) {
        if let Some(Err(e)) = self.with_store(|store| store.remember_room(code, name)) {
            tracing::warn!("Failed to remember room {}: {}", code, e);
        }
    }

    fn forget(&self, code: &str) {
        tracing::info!("Forgetting local state for room {}", code);
        if let Some(Err(e)) = self.with_store(|store| store.forget_room(code)) {
            tracing::warn!("Failed to forget room {}: {}", code, e);
        }
    }

    /// Send an action; a vanished room also clears its local state
    async fn act(&self, code: &str, action: RoomAction) -> ApiResult<ActionResponse> {
        tracing::debug!("{} -> room {}", action.endpoint(), code);
        let result = self.api.act(code, action).await;
        if let Err(ApiError::RoomNotFound) = &result {
            self.forget(code);
        }
        result
    }

    /// Create a room and join it as host. Returns the room code.
    pub async fn create_room(
        &self,
        name: &str,
        mascot: Option<MascotSpecies>,
    ) -> ApiResult<RoomCode> {
        let name = validate_name(name)?;
        let response = self
            .api
            .create_room(CreateRoomRequest {
                name: name.clone(),
                mascot,
            })
            .await?;
        let code = response
            .code
            .ok_or_else(|| ApiError::Decode("Room created without a code".to_string()))?;

        tracing::info!("Created room {} as {}", code, name);
        self.remember(&code, &name);
        Ok(code)
    }

    pub async fn join(
        &self,
        code: &str,
        name: &str,
        mascot: Option<MascotSpecies>,
    ) -> ApiResult<()> {
        let name = validate_name(name)?;
        let code = code.trim().to_uppercase();
        if code.is_empty() {
            return Err(ApiError::Validation("Enter a room code".to_string()));
        }

        self.act(
            &code,
            RoomAction::Join {
                name: name.clone(),
                mascot,
            },
        )
        .await?;

        tracing::info!("Joined room {} as {}", code, name);
        self.remember(&code, &name);
        Ok(())
    }

    pub async fn leave(&self, code: &str, name: &str) -> ApiResult<()> {
        let result = self
            .act(
                code,
                RoomAction::Leave {
                    name: name.to_string(),
                },
            )
            .await;
        // Leaving always drops local state, even if the server call failed
        self.forget(code);
        result.map(|_| ())
    }

    pub async fn select_ask(&self, code: &str, name: &str, ask: &str) -> ApiResult<()> {
        self.act(
            code,
            RoomAction::SelectAsk {
                name: name.to_string(),
                ask: ask.to_string(),
            },
        )
        .await
        .map(|_| ())
    }

    /// Save a draft or mark the pitch ready.
    ///
    /// Marking ready needs at least one must-have; nothing is sent otherwise.
    pub async fn submit_pitch(
        &self,
        code: &str,
        name: &str,
        draft: PitchDraft,
        status: PitchStatus,
    ) -> ApiResult<()> {
        if status == PitchStatus::Ready && draft.used_must_haves.is_empty() {
            return Err(ApiError::Validation(
                "Select at least one must-have before marking ready".to_string(),
            ));
        }

        self.act(
            code,
            RoomAction::SubmitPitch {
                name: name.to_string(),
                draft,
                status,
            },
        )
        .await
        .map(|_| ())
    }

    /// Ask the server to write a pitch. Each player gets one per room.
    ///
    /// The lock is claimed before the request and released if it fails, so
    /// concurrent calls cannot both get through.
    pub async fn generate_ai_pitch(&self, code: &str, name: &str) -> ApiResult<Option<Pitch>> {
        let claimed = self.with_store(|store| {
            if store.ai_locked(code, name) {
                return Ok(false);
            }
            store.lock_ai(code, name).map(|_| true)
        });
        match claimed {
            Some(Ok(false)) => {
                return Err(ApiError::Validation(
                    "AI pitch already used in this room".to_string(),
                ));
            }
            Some(Err(e)) => tracing::warn!("Failed to persist AI lock: {}", e),
            Some(Ok(true)) | None => {}
        }

        let result = self
            .act(
                code,
                RoomAction::GeneratePitch {
                    name: name.to_string(),
                },
            )
            .await;

        match result {
            Ok(response) => Ok(response.pitch),
            Err(e) => {
                if let Some(Err(store_err)) = self.with_store(|store| store.unlock_ai(code, name)) {
                    tracing::warn!("Failed to release AI lock: {}", store_err);
                }
                Err(e)
            }
        }
    }

    pub async fn mark_pitch_viewed(&self, code: &str, name: &str, pitch_id: &str) -> ApiResult<()> {
        self.act(
            code,
            RoomAction::PitchViewed {
                name: name.to_string(),
                pitch_id: pitch_id.to_string(),
            },
        )
        .await
        .map(|_| ())
    }

    /// Accuse `pitch` of being AI-generated. Returns the server's verdict
    /// message, if any.
    pub async fn challenge(&self, code: &str, name: &str, pitch: &Pitch) -> ApiResult<Option<String>> {
        if same_player(&pitch.player, name) {
            return Err(ApiError::Validation(
                "You cannot challenge your own pitch".to_string(),
            ));
        }

        let response = self
            .act(
                code,
                RoomAction::Challenge {
                    name: name.to_string(),
                    pitch_id: pitch.id.clone(),
                },
            )
            .await?;
        Ok(response.message)
    }

    pub async fn judge(&self, code: &str, name: &str, winner: &Pitch) -> ApiResult<()> {
        if !winner.is_eligible() {
            return Err(ApiError::Validation(
                "That pitch was disqualified".to_string(),
            ));
        }

        self.act(
            code,
            RoomAction::Judge {
                name: name.to_string(),
                winner_pitch_id: winner.id.clone(),
            },
        )
        .await
        .map(|_| ())
    }

    pub async fn advance_round(&self, code: &str, name: &str) -> ApiResult<()> {
        self.act(
            code,
            RoomAction::Advance {
                name: name.to_string(),
            },
        )
        .await
        .map(|_| ())
    }

    pub async fn set_ready(&self, code: &str, name: &str, ready: bool) -> ApiResult<()> {
        self.act(
            code,
            RoomAction::Ready {
                name: name.to_string(),
                ready,
            },
        )
        .await
        .map(|_| ())
    }

    /// Pick a mascot, refusing one the roster shows as taken by someone else
    pub async fn select_mascot(
        &self,
        code: &str,
        name: &str,
        mascot: MascotSpecies,
        roster: &[Player],
    ) -> ApiResult<()> {
        let taken = mascot_options(roster, Some(name))
            .into_iter()
            .any(|option| option.species == mascot && option.disabled);
        if taken {
            return Err(ApiError::Validation(format!(
                "The {} is already taken",
                mascot
            )));
        }

        self.act(
            code,
            RoomAction::SelectMascot {
                name: name.to_string(),
                mascot,
            },
        )
        .await
        .map(|_| ())
    }

    pub async fn toggle_voice(&self, code: &str, name: &str, enabled: bool) -> ApiResult<()> {
        self.act(
            code,
            RoomAction::ToggleVoice {
                name: name.to_string(),
                enabled,
            },
        )
        .await
        .map(|_| ())
    }
}

fn validate_name(name: &str) -> ApiResult<PlayerName> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Enter a name".to_string()));
    }
    Ok(name.to_string())
}
