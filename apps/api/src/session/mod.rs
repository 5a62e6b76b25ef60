//! Per-browser session state: flash messages and the last adaptation result.
//!
//! The session id lives in a signed cookie; the data lives in a `SessionStore`.

pub mod cookie;
pub mod store;

use std::convert::Infallible;

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderName},
    response::AppendHeaders,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotate::AdaptedResume;
use crate::errors::AppError;
use crate::state::AppState;

pub use store::{FsSessionStore, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Error,
}

impl FlashLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub flashes: Vec<Flash>,
    #[serde(default)]
    pub last_adaptation: Option<AdaptedResume>,
}

/// Extractor yielding the caller's session, or a fresh one when the cookie is
/// missing, forged, or points at an expired session.
#[derive(Debug)]
pub struct Session {
    id: String,
    data: SessionData,
}

impl Session {
    fn fresh() -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            data: SessionData::default(),
        }
    }

    pub fn flash(&mut self, level: FlashLevel, message: impl Into<String>) {
        self.data.flashes.push(Flash {
            level,
            message: message.into(),
        });
    }

    /// Drains pending flashes; they are shown once.
    pub fn take_flashes(&mut self) -> Vec<Flash> {
        std::mem::take(&mut self.data.flashes)
    }

    pub fn set_last_adaptation(&mut self, adapted: AdaptedResume) {
        self.data.last_adaptation = Some(adapted);
    }

    pub fn last_adaptation(&self) -> Option<&AdaptedResume> {
        self.data.last_adaptation.as_ref()
    }

    /// Persists the session and returns the `Set-Cookie` header to attach to the response.
    pub async fn commit(
        &self,
        state: &AppState,
    ) -> Result<AppendHeaders<[(HeaderName, String); 1]>, AppError> {
        state.sessions.save(&self.id, &self.data).await?;
        let cookie = cookie::set_cookie_header(
            &state.config.secret_key,
            &self.id,
            state.config.session_lifetime_secs,
        );
        Ok(AppendHeaders([(header::SET_COOKIE, cookie)]))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(cookie::find_in_header)
            .and_then(|value| cookie::verify(&state.config.secret_key, value));

        if let Some(id) = id {
            match state.sessions.load(&id).await {
                Ok(Some(data)) => return Ok(Self { id, data }),
                Ok(None) => {}
                Err(e) => tracing::warn!("Failed to load session: {e:#}"),
            }
        }

        Ok(Self::fresh())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flashes_are_drained_once() {
        let mut session = Session::fresh();
        session.flash(FlashLevel::Error, "Aucun fichier sélectionné");
        session.flash(FlashLevel::Error, "Veuillez entrer une description de poste");
        let flashes = session.take_flashes();
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].level, FlashLevel::Error);
        assert!(session.take_flashes().is_empty());
    }

    #[test]
    fn test_fresh_ids_are_hex_and_unique() {
        let a = Session::fresh();
        let b = Session::fresh();
        assert_eq!(a.id.len(), 32);
        assert!(a.id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_session_data_tolerates_missing_fields() {
        let data: SessionData = serde_json::from_str("{}").unwrap();
        assert_eq!(data, SessionData::default());
    }
}
