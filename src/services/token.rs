//! Token rotation
//!
//! Every QR render issues a fresh random token and overwrites the one stored
//! on the record. Tokens are short-lived attendance markers, not credentials:
//! they come from the thread-local RNG and are never checked for uniqueness.

use anyhow::{Context, Result};
use rand::Rng;
use std::sync::Arc;

use crate::db::repositories::{ClassTokenRepository, SessionRepository};
use crate::models::ClassToken;
use crate::services::clock::Clock;

/// Length of every issued token
pub const TOKEN_LENGTH: usize = 16;

/// Random string over `[A-Za-z0-9]` of [`TOKEN_LENGTH`] characters
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// What a QR code is issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QrSubject {
    /// Stored session with its own window
    Session { id: String },
    /// Class whose window is `duration_minutes` from issue time
    Class { id: String, duration_minutes: i64 },
}

impl QrSubject {
    pub fn id(&self) -> &str {
        match self {
            Self::Session { id } | Self::Class { id, .. } => id,
        }
    }
}

/// Issues tokens and writes them to the backing record
pub struct TokenRotator {
    sessions: Arc<dyn SessionRepository>,
    class_tokens: Arc<dyn ClassTokenRepository>,
    clock: Arc<dyn Clock>,
}

impl TokenRotator {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        class_tokens: Arc<dyn ClassTokenRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            sessions,
            class_tokens,
            clock,
        }
    }

    /// Replace the subject's token and return the new one.
    ///
    /// Storage errors are returned as-is; retrying is left to the caller.
    pub async fn rotate(&self, subject: &QrSubject) -> Result<String> {
        let token = generate_token();
        let now = self.clock.now();

        match subject {
            QrSubject::Session { id } => {
                let stored = self
                    .sessions
                    .store_token(id, &token, now)
                    .await
                    .with_context(|| format!("Failed to rotate token for session {}", id))?;
                if !stored {
                    anyhow::bail!("Session {} disappeared before its token was stored", id);
                }
            }
            QrSubject::Class {
                id,
                duration_minutes,
            } => {
                let record = ClassToken::issue(id.clone(), token.clone(), *duration_minutes, now);
                self.class_tokens
                    .upsert(&record)
                    .await
                    .with_context(|| format!("Failed to rotate token for class {}", id))?;
            }
        }

        tracing::debug!(subject = subject.id(), "Rotated attendance token");
        Ok(token)
    }
}
