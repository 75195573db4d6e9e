use parley_db::queries;
use parley_types::models::ConversationKind;
use rusqlite::Connection;

use crate::error::{CoreError, CoreResult};

/// A target the caller wants to act on. Every resource resolves to an
/// owning conversation: a message through its `conversation_id`, a group
/// to itself (and the id must actually denote a group).
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Conversation(&'a str),
    Message(&'a str),
    Group(&'a str),
}

/// The single authorization policy: participation in the owning
/// conversation grants read/send/react/forward rights; authorship is
/// checked separately where required (delete). There is no admin tier.
///
/// All checks run on the caller's transaction connection so that the
/// check and the subsequent mutation commit atomically.
pub struct AuthorizationGuard;

impl AuthorizationGuard {
    /// Resolve the session token and require participation in the
    /// resource's owning conversation. Returns the acting user's id.
    pub fn authorize(conn: &Connection, token: &str, resource: Resource<'_>) -> CoreResult<String> {
        let user_id = Self::resolve_token(conn, token)?;
        let conversation_id = Self::owning_conversation(conn, resource)?;
        Self::require_member(conn, &conversation_id, &user_id)?;
        Ok(user_id)
    }

    pub fn resolve_token(conn: &Connection, token: &str) -> CoreResult<String> {
        if token.is_empty() {
            return Err(CoreError::Unauthorized("missing session token".into()));
        }
        queries::session_user(conn, token)?
            .ok_or_else(|| CoreError::Unauthorized("unknown session token".into()))
    }

    pub fn require_member(
        conn: &Connection,
        conversation_id: &str,
        user_id: &str,
    ) -> CoreResult<()> {
        if queries::is_member(conn, conversation_id, user_id)? {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "user {user_id} is not a participant of conversation {conversation_id}"
            )))
        }
    }

    fn owning_conversation(conn: &Connection, resource: Resource<'_>) -> CoreResult<String> {
        match resource {
            Resource::Conversation(id) => queries::get_conversation(conn, id)?
                .map(|conv| conv.id)
                .ok_or_else(|| CoreError::NotFound(format!("conversation {id} not found"))),
            Resource::Message(id) => queries::get_message(conn, id)?
                .map(|msg| msg.conversation_id)
                .ok_or_else(|| CoreError::NotFound(format!("message {id} not found"))),
            Resource::Group(id) => {
                let conv = queries::get_conversation(conn, id)?
                    .ok_or_else(|| CoreError::NotFound(format!("group {id} not found")))?;
                if conv.kind != ConversationKind::Group {
                    return Err(CoreError::NotFound(format!("group {id} not found")));
                }
                Ok(conv.id)
            }
        }
    }
}
