use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parley_db::models::{ConversationRow, MessageRow, UserRow};
use parley_db::{Database, queries};
use parley_types::models::{
    ConversationDetail, ConversationKind, ConversationSummary, MessagePreview, MessageView,
    UserProfile,
};
use rusqlite::Connection;
use tracing::{info, warn};
use uuid::Uuid;

use crate::authz::{AuthorizationGuard, Resource};
use crate::error::{CoreError, CoreResult};
use crate::media;
use crate::photos::PhotoStore;
use crate::reactions::ReactionSet;

/// Owns conversation and group-membership state.
#[derive(Clone)]
pub struct ConversationRegistry {
    db: Arc<Database>,
    photos: Arc<dyn PhotoStore>,
}

impl ConversationRegistry {
    pub fn new(db: Arc<Database>, photos: Arc<dyn PhotoStore>) -> Self {
        Self { db, photos }
    }

    /// Get or create the direct conversation between the caller and
    /// `peer_id`. Idempotent per unordered pair.
    pub fn create_direct(&self, token: &str, peer_id: &str) -> CoreResult<String> {
        if peer_id.is_empty() {
            return Err(CoreError::Validation("peer id must not be empty".into()));
        }

        self.db.transaction(|tx| {
            let actor = AuthorizationGuard::resolve_token(tx, token)?;
            if actor == peer_id {
                return Err(CoreError::Validation(
                    "cannot open a direct conversation with yourself".into(),
                ));
            }
            if queries::get_user(tx, peer_id)?.is_none() {
                return Err(CoreError::NotFound(format!("user {peer_id} not found")));
            }

            let key = direct_key(&actor, peer_id);
            if let Some(existing) = queries::find_direct(tx, &key)? {
                return Ok(existing);
            }

            let id = Uuid::new_v4().to_string();
            let now = Utc::now().to_rfc3339();
            queries::insert_conversation(tx, &id, ConversationKind::Direct, None, Some(&key), &now)?;
            queries::add_member(tx, &id, &actor, &now)?;
            queries::add_member(tx, &id, peer_id, &now)?;
            info!("created direct conversation {id} between {actor} and {peer_id}");
            Ok(id)
        })
    }

    /// Create a group conversation. The caller is always a member,
    /// whether or not they appear in `member_ids`.
    pub fn create_group(&self, token: &str, name: &str, member_ids: &[String]) -> CoreResult<String> {
        if name.trim().is_empty() {
            return Err(CoreError::Validation("group name must not be empty".into()));
        }

        self.db.transaction(|tx| {
            let actor = AuthorizationGuard::resolve_token(tx, token)?;
            for member in member_ids {
                if queries::get_user(tx, member)?.is_none() {
                    return Err(CoreError::NotFound(format!("user {member} not found")));
                }
            }

            let id = Uuid::new_v4().to_string();
            let now = Utc::now().to_rfc3339();
            queries::insert_conversation(tx, &id, ConversationKind::Group, Some(name), None, &now)?;
            queries::add_member(tx, &id, &actor, &now)?;
            for member in member_ids {
                queries::add_member(tx, &id, member, &now)?;
            }
            info!("created group {id} ({name:?})");
            Ok(id)
        })
    }

    /// Add a user to a group. Re-adding a present member is a no-op
    /// success.
    pub fn add_member(&self, token: &str, group_id: &str, new_user_id: &str) -> CoreResult<()> {
        if new_user_id.is_empty() {
            return Err(CoreError::Validation("user id must not be empty".into()));
        }

        self.db.transaction(|tx| {
            AuthorizationGuard::authorize(tx, token, Resource::Group(group_id))?;
            let conv = require_conversation(tx, group_id)?;
            if !conv.active {
                return Err(CoreError::Gone(format!("group {group_id} is no longer active")));
            }
            if queries::get_user(tx, new_user_id)?.is_none() {
                return Err(CoreError::NotFound(format!("user {new_user_id} not found")));
            }

            let now = Utc::now().to_rfc3339();
            let added = queries::add_member(tx, group_id, new_user_id, &now)?;
            if added == 0 {
                info!("user {new_user_id} already in group {group_id}, absorbing re-add");
            }
            Ok(())
        })
    }

    /// Leave a group. Removing the last member moves the group to its
    /// inactive terminal state: it keeps its history but accepts no
    /// further messages.
    pub fn leave(&self, token: &str, group_id: &str) -> CoreResult<()> {
        self.db.transaction(|tx| {
            let actor = AuthorizationGuard::authorize(tx, token, Resource::Group(group_id))?;

            let removed = queries::remove_member(tx, group_id, &actor)?;
            if removed == 0 {
                return Err(CoreError::NotFound(format!(
                    "user {actor} is not a member of group {group_id}"
                )));
            }

            if queries::member_count(tx, group_id)? == 0 {
                queries::set_inactive(tx, group_id)?;
                info!("group {group_id} has no members left, marked inactive");
            }
            Ok(())
        })
    }

    pub fn rename_group(&self, token: &str, group_id: &str, new_name: &str) -> CoreResult<()> {
        if new_name.trim().is_empty() {
            return Err(CoreError::Validation("group name must not be empty".into()));
        }

        self.db.transaction(|tx| {
            AuthorizationGuard::authorize(tx, token, Resource::Group(group_id))?;
            queries::update_group_name(tx, group_id, new_name)?;
            Ok(())
        })
    }

    pub fn set_group_photo(
        &self,
        token: &str,
        group_id: &str,
        filename: &str,
        bytes: &[u8],
    ) -> CoreResult<String> {
        let ext = media::validate_photo(filename, bytes)?;

        self.db.transaction(|tx| {
            AuthorizationGuard::authorize(tx, token, Resource::Group(group_id))?;
            let reference = self.photos.store(group_id, &ext, bytes)?;
            queries::update_group_photo(tx, group_id, &reference)?;
            Ok(reference)
        })
    }

    /// The caller's conversations, most recently active first (ties break
    /// on conversation id).
    pub fn list_for(&self, token: &str) -> CoreResult<Vec<ConversationSummary>> {
        self.db.with_conn(|conn| {
            let user_id = AuthorizationGuard::resolve_token(conn, token)?;
            let rows = queries::conversations_for(conn, &user_id)?;

            let mut summaries = Vec::with_capacity(rows.len());
            for conv in rows {
                let title = conversation_title(conn, &conv, &user_id)?;
                let last_message = queries::last_message_in(conn, &conv.id)?.map(|msg| {
                    MessagePreview {
                        id: msg.id,
                        author_id: msg.author_id,
                        content: msg.content,
                        created_at: parse_ts(&msg.created_at),
                    }
                });
                summaries.push(ConversationSummary {
                    id: conv.id,
                    kind: conv.kind,
                    title,
                    photo: conv.photo,
                    last_activity: parse_ts(&conv.last_activity),
                    last_message,
                });
            }
            Ok(summaries)
        })
    }

    /// A conversation with its full ordered message sequence, reactions
    /// attached. Caller must be a participant.
    pub fn get(&self, token: &str, conversation_id: &str) -> CoreResult<ConversationDetail> {
        self.db.with_conn(|conn| {
            let user_id =
                AuthorizationGuard::authorize(conn, token, Resource::Conversation(conversation_id))?;
            let conv = require_conversation(conn, conversation_id)?;
            let title = conversation_title(conn, &conv, &user_id)?;

            let members = queries::members_of(conn, conversation_id)?
                .into_iter()
                .map(user_profile)
                .collect();

            let rows = queries::messages_in(conn, conversation_id)?;
            let message_ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
            let reaction_rows = queries::reactions_for_messages(conn, &message_ids)?;

            // Group reactions by message, then hydrate one ReactionSet per
            // message for the view.
            let mut by_message: HashMap<String, Vec<_>> = HashMap::new();
            for row in reaction_rows {
                by_message.entry(row.message_id.clone()).or_default().push(row);
            }

            let messages = rows
                .into_iter()
                .map(|row| {
                    let set = by_message
                        .get(&row.id)
                        .map(|rows| ReactionSet::from_rows(rows.iter()))
                        .unwrap_or_default();
                    message_view(row, &set)
                })
                .collect();

            Ok(ConversationDetail {
                id: conv.id,
                kind: conv.kind,
                title,
                photo: conv.photo,
                active: conv.active,
                members,
                messages,
            })
        })
    }
}

/// Canonical unordered-pair key for a direct conversation.
fn direct_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}:{b}")
    } else {
        format!("{b}:{a}")
    }
}

fn require_conversation(conn: &Connection, id: &str) -> CoreResult<ConversationRow> {
    queries::get_conversation(conn, id)?
        .ok_or_else(|| CoreError::NotFound(format!("conversation {id} not found")))
}

/// Groups are titled by their name; a direct conversation is titled with
/// the other participant's display name.
fn conversation_title(
    conn: &Connection,
    conv: &ConversationRow,
    user_id: &str,
) -> CoreResult<String> {
    match conv.kind {
        ConversationKind::Group => Ok(conv.name.clone().unwrap_or_else(|| "unknown".to_string())),
        ConversationKind::Direct => Ok(queries::direct_peer(conn, &conv.id, user_id)?
            .map(|peer| peer.name)
            .unwrap_or_else(|| "unknown".to_string())),
    }
}

fn user_profile(row: UserRow) -> UserProfile {
    UserProfile {
        id: row.id,
        name: row.name,
        photo: row.photo,
    }
}

pub(crate) fn message_view(row: MessageRow, reactions: &ReactionSet) -> MessageView {
    let created_at = parse_ts(&row.created_at);
    MessageView {
        id: row.id,
        conversation_id: row.conversation_id,
        author_id: row.author_id,
        author_name: row.author_name,
        content: row.content,
        forwarded_from: row.forwarded_from,
        deleted: row.deleted,
        created_at,
        reactions: reactions.to_views(),
    }
}

pub(crate) fn parse_ts(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>().unwrap_or_else(|e| {
        warn!("corrupt timestamp {raw:?}: {e}");
        DateTime::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::core;

    #[test]
    fn direct_creation_is_idempotent_across_order() {
        let core = core();
        let a = core.login("a1", "Alice");
        let b = core.login("b1", "Bobby");

        let first = core.registry.create_direct(&a.token, "b1").unwrap();
        let second = core.registry.create_direct(&b.token, "a1").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn direct_with_self_is_rejected() {
        let core = core();
        let a = core.login("a1", "Alice");
        assert!(matches!(
            core.registry.create_direct(&a.token, "a1"),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn direct_with_unknown_peer_is_not_found() {
        let core = core();
        let a = core.login("a1", "Alice");
        assert!(matches!(
            core.registry.create_direct(&a.token, "ghost"),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn group_always_includes_creator() {
        let core = core();
        let a = core.login("a1", "Alice");
        core.login("b1", "Bobby");

        let group = core
            .registry
            .create_group(&a.token, "plans", &["b1".to_string()])
            .unwrap();

        let detail = core.registry.get(&a.token, &group).unwrap();
        let ids: Vec<_> = detail.members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "b1"]);
        assert_eq!(detail.title, "plans");
    }

    #[test]
    fn readding_a_member_is_a_noop() {
        let core = core();
        let a = core.login("a1", "Alice");
        core.login("b1", "Bobby");

        let group = core
            .registry
            .create_group(&a.token, "plans", &["b1".to_string()])
            .unwrap();

        core.registry.add_member(&a.token, &group, "b1").unwrap();
        let detail = core.registry.get(&a.token, &group).unwrap();
        assert_eq!(detail.members.len(), 2);
    }

    #[test]
    fn outsiders_cannot_touch_a_group() {
        let core = core();
        let a = core.login("a1", "Alice");
        let outsider = core.login("x1", "Xenia");
        core.login("b1", "Bobby");

        let group = core
            .registry
            .create_group(&a.token, "plans", &[])
            .unwrap();

        assert!(matches!(
            core.registry.add_member(&outsider.token, &group, "b1"),
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            core.registry.rename_group(&outsider.token, &group, "mine now"),
            Err(CoreError::Forbidden(_))
        ));
        assert!(matches!(
            core.registry.get(&outsider.token, &group),
            Err(CoreError::Forbidden(_))
        ));
    }

    #[test]
    fn group_operations_reject_direct_conversations() {
        let core = core();
        let (a, _b, direct) = core.direct_pair();

        assert!(matches!(
            core.registry.rename_group(&a.token, &direct, "nope"),
            Err(CoreError::NotFound(_))
        ));
        assert!(matches!(
            core.registry.leave(&a.token, &direct),
            Err(CoreError::NotFound(_))
        ));
    }

    #[test]
    fn last_leave_marks_group_inactive() {
        let core = core();
        let a = core.login("a1", "Alice");
        let b = core.login("b1", "Bobby");

        let group = core
            .registry
            .create_group(&a.token, "plans", &["b1".to_string()])
            .unwrap();

        core.registry.leave(&b.token, &group).unwrap();
        // Alice remains, group still accepts messages
        core.ledger.send(&a.token, &group, "still here").unwrap();

        core.registry.leave(&a.token, &group).unwrap();
        assert!(matches!(
            core.ledger.send(&a.token, &group, "anyone?"),
            Err(CoreError::Gone(_))
        ));
    }

    #[test]
    fn list_orders_by_recent_activity() {
        let core = core();
        let a = core.login("a1", "Alice");
        core.login("b1", "Bobby");
        core.login("c1", "Carol");

        let with_b = core.registry.create_direct(&a.token, "b1").unwrap();
        let with_c = core.registry.create_direct(&a.token, "c1").unwrap();

        core.ledger.send(&a.token, &with_b, "ping").unwrap();

        let summaries = core.registry.list_for(&a.token).unwrap();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].id, with_b);
        assert_eq!(summaries[1].id, with_c);
        // direct conversations are titled with the peer's name
        assert_eq!(summaries[0].title, "Bobby");
        assert_eq!(
            summaries[0].last_message.as_ref().map(|m| m.content.as_str()),
            Some("ping")
        );
    }

    #[test]
    fn group_photo_follows_media_rules() {
        let core = core();
        let a = core.login("a1", "Alice");
        let group = core.registry.create_group(&a.token, "plans", &[]).unwrap();

        let reference = core
            .registry
            .set_group_photo(&a.token, &group, "cover.jpeg", b"jpeg-bytes")
            .unwrap();
        assert_eq!(reference, format!("{group}.jpeg"));

        assert!(matches!(
            core.registry.set_group_photo(&a.token, &group, "cover.bmp", b"x"),
            Err(CoreError::UnsupportedMedia(_))
        ));
    }
}
