use std::sync::Arc;

use chrono::Utc;
use parley_db::{Database, queries};
use tracing::info;
use uuid::Uuid;

use crate::authz::{AuthorizationGuard, Resource};
use crate::error::{CoreError, CoreResult};

/// Owns message records and their lifecycle. Every operation bundles its
/// authorization checks and writes into one transaction; forward touches
/// two conversations and checks them in a fixed order (source first), so
/// a failure on the destination side leaves no partial message behind.
#[derive(Clone)]
pub struct MessageLedger {
    db: Arc<Database>,
}

impl MessageLedger {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a message to a conversation.
    pub fn send(&self, token: &str, conversation_id: &str, content: &str) -> CoreResult<String> {
        if content.is_empty() {
            return Err(CoreError::Validation(
                "message content must not be empty".into(),
            ));
        }

        self.db.transaction(|tx| {
            let author = AuthorizationGuard::resolve_token(tx, token)?;
            let conv = queries::get_conversation(tx, conversation_id)?.ok_or_else(|| {
                CoreError::NotFound(format!("conversation {conversation_id} not found"))
            })?;
            // Terminal state answers Gone even for ex-members, so the
            // check precedes the participation test.
            if !conv.active {
                return Err(CoreError::Gone(format!(
                    "conversation {conversation_id} is no longer active"
                )));
            }
            AuthorizationGuard::require_member(tx, conversation_id, &author)?;

            let id = Uuid::new_v4().to_string();
            let now = Utc::now().to_rfc3339();
            let seq = queries::next_seq(tx, conversation_id)?;
            queries::insert_message(tx, &id, conversation_id, seq, &author, content, None, &now)?;
            queries::touch_activity(tx, conversation_id, &now)?;
            Ok(id)
        })
    }

    /// Copy a message into another conversation. The acting user must be
    /// a participant of both the source and the destination; the original
    /// message is untouched and the copy records where it came from.
    pub fn forward(
        &self,
        token: &str,
        message_id: &str,
        to_conversation_id: &str,
    ) -> CoreResult<String> {
        self.db.transaction(|tx| {
            // Source side first.
            let actor = AuthorizationGuard::authorize(tx, token, Resource::Message(message_id))?;
            let source = queries::get_message(tx, message_id)?
                .ok_or_else(|| CoreError::NotFound(format!("message {message_id} not found")))?;
            if source.deleted {
                return Err(CoreError::NotFound(format!(
                    "message {message_id} has been deleted"
                )));
            }

            // Then the destination.
            let dest = queries::get_conversation(tx, to_conversation_id)?.ok_or_else(|| {
                CoreError::NotFound(format!("conversation {to_conversation_id} not found"))
            })?;
            if !dest.active {
                return Err(CoreError::Gone(format!(
                    "conversation {to_conversation_id} is no longer active"
                )));
            }
            AuthorizationGuard::require_member(tx, &dest.id, &actor)?;

            let id = Uuid::new_v4().to_string();
            let now = Utc::now().to_rfc3339();
            let seq = queries::next_seq(tx, &dest.id)?;
            queries::insert_message(
                tx,
                &id,
                &dest.id,
                seq,
                &actor,
                &source.content,
                Some(message_id),
                &now,
            )?;
            queries::touch_activity(tx, &dest.id, &now)?;
            Ok(id)
        })
    }

    /// Tombstone a message: content is cleared, the record keeps its id,
    /// position and reactions. Author-only; repeating the delete is a
    /// no-op success.
    pub fn delete(&self, token: &str, message_id: &str) -> CoreResult<()> {
        self.db.transaction(|tx| {
            let actor = AuthorizationGuard::authorize(tx, token, Resource::Message(message_id))?;
            let message = queries::get_message(tx, message_id)?
                .ok_or_else(|| CoreError::NotFound(format!("message {message_id} not found")))?;

            if message.author_id != actor {
                return Err(CoreError::Forbidden(format!(
                    "only the author may delete message {message_id}"
                )));
            }
            if message.deleted {
                return Ok(());
            }

            queries::tombstone_message(tx, message_id)?;
            info!("message {message_id} tombstoned by {actor}");
            Ok(())
        })
    }

    /// React to a message. A user's second reaction replaces the first;
    /// legality is judged at react time (participation now, not at send
    /// time).
    pub fn react(&self, token: &str, message_id: &str, emoji: &str) -> CoreResult<()> {
        if emoji.is_empty() {
            return Err(CoreError::Validation("reaction must not be empty".into()));
        }

        self.db.transaction(|tx| {
            let actor = AuthorizationGuard::authorize(tx, token, Resource::Message(message_id))?;
            let message = queries::get_message(tx, message_id)?
                .ok_or_else(|| CoreError::NotFound(format!("message {message_id} not found")))?;
            if message.deleted {
                return Err(CoreError::NotFound(format!(
                    "message {message_id} has been deleted"
                )));
            }

            let now = Utc::now().to_rfc3339();
            queries::upsert_reaction(tx, message_id, &actor, emoji, &now)?;
            Ok(())
        })
    }

    /// Remove the caller's reaction. Absence is a no-op success.
    pub fn unreact(&self, token: &str, message_id: &str) -> CoreResult<()> {
        self.db.transaction(|tx| {
            let actor = AuthorizationGuard::authorize(tx, token, Resource::Message(message_id))?;
            queries::delete_reaction(tx, message_id, &actor)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::core;

    #[test]
    fn send_appends_in_order() {
        let core = core();
        let (a, b, conv) = core.direct_pair();

        core.ledger.send(&a.token, &conv, "one").unwrap();
        core.ledger.send(&b.token, &conv, "two").unwrap();
        core.ledger.send(&a.token, &conv, "three").unwrap();

        let detail = core.registry.get(&a.token, &conv).unwrap();
        let contents: Vec<_> = detail.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[test]
    fn send_rejects_empty_content() {
        let core = core();
        let (a, _b, conv) = core.direct_pair();
        assert!(matches!(
            core.ledger.send(&a.token, &conv, ""),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn send_requires_participation() {
        let core = core();
        let (_a, _b, conv) = core.direct_pair();
        let outsider = core.login("x1", "Xenia");

        assert!(matches!(
            core.ledger.send(&outsider.token, &conv, "let me in"),
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            core.ledger.send("bogus-token", &conv, "hello"),
            Err(CoreError::Unauthorized(_))
        ));
    }

    #[test]
    fn forward_copies_and_links_back() {
        let core = core();
        let a = core.login("a1", "Alice");
        core.login("b1", "Bobby");
        let direct = core.registry.create_direct(&a.token, "b1").unwrap();
        let group = core
            .registry
            .create_group(&a.token, "plans", &["b1".to_string()])
            .unwrap();

        let original = core.ledger.send(&a.token, &direct, "hi").unwrap();
        let copy = core.ledger.forward(&a.token, &original, &group).unwrap();
        assert_ne!(original, copy);

        // the copy lands in the destination and points back at the source
        let group_detail = core.registry.get(&a.token, &group).unwrap();
        let copied = &group_detail.messages[0];
        assert_eq!(copied.id, copy);
        assert_eq!(copied.content, "hi");
        assert_eq!(copied.forwarded_from.as_deref(), Some(original.as_str()));

        // the source conversation is untouched
        let direct_detail = core.registry.get(&a.token, &direct).unwrap();
        assert_eq!(direct_detail.messages.len(), 1);
        assert_eq!(direct_detail.messages[0].id, original);
        assert!(direct_detail.messages[0].forwarded_from.is_none());
    }

    #[test]
    fn forward_needs_membership_on_both_sides() {
        let core = core();
        let a = core.login("a1", "Alice");
        let b = core.login("b1", "Bobby");
        let direct = core.registry.create_direct(&a.token, "b1").unwrap();
        // Bobby is not in this group
        let group = core.registry.create_group(&a.token, "private", &[]).unwrap();

        let message = core.ledger.send(&b.token, &direct, "psst").unwrap();
        assert!(matches!(
            core.ledger.forward(&b.token, &message, &group),
            Err(CoreError::Forbidden(_))
        ));

        // and no partial copy may exist after the failure
        let detail = core.registry.get(&a.token, &group).unwrap();
        assert!(detail.messages.is_empty());
    }

    #[test]
    fn forward_rejects_tombstones() {
        let core = core();
        let (a, _b, conv) = core.direct_pair();

        let message = core.ledger.send(&a.token, &conv, "fleeting").unwrap();
        core.ledger.delete(&a.token, &message).unwrap();

        assert!(matches!(
            core.ledger.forward(&a.token, &message, &conv),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn forward_to_missing_destination_leaves_no_trace() {
        let core = core();
        let (a, _b, conv) = core.direct_pair();
        let message = core.ledger.send(&a.token, &conv, "hi").unwrap();

        assert!(matches!(
            core.ledger.forward(&a.token, &message, "no-such-conversation"),
            Err(CoreError::NotFound(_))
        ));
        let detail = core.registry.get(&a.token, &conv).unwrap();
        assert_eq!(detail.messages.len(), 1);
    }

    #[test]
    fn delete_is_author_only() {
        let core = core();
        let (a, b, conv) = core.direct_pair();
        let message = core.ledger.send(&a.token, &conv, "mine").unwrap();

        assert!(matches!(
            core.ledger.delete(&b.token, &message),
            Err(CoreError::Forbidden(_))
        ));
        core.ledger.delete(&a.token, &message).unwrap();
    }

    #[test]
    fn delete_is_idempotent_and_preserves_reactions() {
        let core = core();
        let (a, b, conv) = core.direct_pair();
        let message = core.ledger.send(&a.token, &conv, "soon gone").unwrap();
        core.ledger.react(&b.token, &message, "👍").unwrap();

        core.ledger.delete(&a.token, &message).unwrap();
        core.ledger.delete(&a.token, &message).unwrap();

        let detail = core.registry.get(&a.token, &conv).unwrap();
        let tombstone = &detail.messages[0];
        assert!(tombstone.deleted);
        assert_eq!(tombstone.content, "");
        assert_eq!(tombstone.id, message);
        // reaction metadata survives the tombstone
        assert_eq!(tombstone.reactions.len(), 1);
        assert_eq!(tombstone.reactions[0].value, "👍");
    }

    #[test]
    fn react_replaces_prior_reaction() {
        let core = core();
        let (a, b, conv) = core.direct_pair();
        let message = core.ledger.send(&a.token, &conv, "rate me").unwrap();

        core.ledger.react(&b.token, &message, "👍").unwrap();
        core.ledger.react(&b.token, &message, "❤️").unwrap();

        let detail = core.registry.get(&a.token, &conv).unwrap();
        let reactions = &detail.messages[0].reactions;
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].user_id, "b1");
        assert_eq!(reactions[0].value, "❤️");
    }

    #[test]
    fn react_requires_participation_at_react_time() {
        let core = core();
        let a = core.login("a1", "Alice");
        let b = core.login("b1", "Bobby");
        let outsider = core.login("x1", "Xenia");
        let group = core
            .registry
            .create_group(&a.token, "plans", &["b1".to_string()])
            .unwrap();
        let message = core.ledger.send(&a.token, &group, "vote").unwrap();

        assert!(matches!(
            core.ledger.react(&outsider.token, &message, "👍"),
            Err(CoreError::Forbidden(_))
        ));

        // a reaction made while a member is not revoked by leaving
        core.ledger.react(&b.token, &message, "👍").unwrap();
        core.registry.leave(&b.token, &group).unwrap();
        let detail = core.registry.get(&a.token, &group).unwrap();
        assert_eq!(detail.messages[0].reactions.len(), 1);
    }

    #[test]
    fn react_rejects_tombstones() {
        let core = core();
        let (a, b, conv) = core.direct_pair();
        let message = core.ledger.send(&a.token, &conv, "gone soon").unwrap();
        core.ledger.delete(&a.token, &message).unwrap();

        assert!(matches!(
            core.ledger.react(&b.token, &message, "👍"),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn unreact_absorbs_absence() {
        let core = core();
        let (a, b, conv) = core.direct_pair();
        let message = core.ledger.send(&a.token, &conv, "meh").unwrap();

        // nothing to remove, still success
        core.ledger.unreact(&b.token, &message).unwrap();

        core.ledger.react(&b.token, &message, "👍").unwrap();
        core.ledger.unreact(&b.token, &message).unwrap();

        let detail = core.registry.get(&a.token, &conv).unwrap();
        assert!(detail.messages[0].reactions.is_empty());
    }
}
