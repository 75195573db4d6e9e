use anyhow::Result;
use parley_types::models::ConversationKind;
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{ConversationRow, MessageRow, ReactionRow, UserRow};

// All query functions take a plain `&Connection` so the core can run
// several of them inside a single transaction (a `&Transaction` derefs
// to `&Connection`).

// -- Users --

pub fn insert_user(conn: &Connection, id: &str, name: &str, now: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, created_at) VALUES (?1, ?2, ?3)",
        params![id, name, now],
    )?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, name, photo, created_at FROM users WHERE id = ?1")?;
    let row = stmt
        .query_row([id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                photo: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;
    Ok(row)
}

pub fn update_user_name(conn: &Connection, id: &str, name: &str) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE users SET name = ?2 WHERE id = ?1",
        params![id, name],
    )?;
    Ok(changed)
}

pub fn update_user_photo(conn: &Connection, id: &str, photo: &str) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE users SET photo = ?2 WHERE id = ?1",
        params![id, photo],
    )?;
    Ok(changed)
}

// -- Sessions --

pub fn insert_session(conn: &Connection, token: &str, user_id: &str, now: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at) VALUES (?1, ?2, ?3)",
        params![token, user_id, now],
    )?;
    Ok(())
}

pub fn session_user(conn: &Connection, token: &str) -> Result<Option<String>> {
    let user_id = conn
        .query_row(
            "SELECT user_id FROM sessions WHERE token = ?1",
            [token],
            |row| row.get(0),
        )
        .optional()?;
    Ok(user_id)
}

// -- Conversations --

const CONVERSATION_COLUMNS: &str =
    "id, kind, name, photo, direct_key, active, last_activity, created_at";

fn map_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationRow> {
    let kind_raw: String = row.get(1)?;
    let kind = ConversationKind::from_db(&kind_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown conversation kind {kind_raw:?}").into(),
        )
    })?;
    Ok(ConversationRow {
        id: row.get(0)?,
        kind,
        name: row.get(2)?,
        photo: row.get(3)?,
        direct_key: row.get(4)?,
        active: row.get(5)?,
        last_activity: row.get(6)?,
        created_at: row.get(7)?,
    })
}

pub fn insert_conversation(
    conn: &Connection,
    id: &str,
    kind: ConversationKind,
    name: Option<&str>,
    direct_key: Option<&str>,
    now: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO conversations (id, kind, name, direct_key, last_activity, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, kind.as_str(), name, direct_key, now],
    )?;
    Ok(())
}

pub fn get_conversation(conn: &Connection, id: &str) -> Result<Option<ConversationRow>> {
    let sql = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id], map_conversation).optional()?;
    Ok(row)
}

pub fn find_direct(conn: &Connection, direct_key: &str) -> Result<Option<String>> {
    let id = conn
        .query_row(
            "SELECT id FROM conversations WHERE direct_key = ?1",
            [direct_key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Conversations the user participates in, most recently active first.
/// Ties break on conversation id for a deterministic order.
pub fn conversations_for(conn: &Connection, user_id: &str) -> Result<Vec<ConversationRow>> {
    let sql = format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations c
         JOIN members m ON m.conversation_id = c.id
         WHERE m.user_id = ?1
         ORDER BY c.last_activity DESC, c.id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([user_id], map_conversation)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_group_name(conn: &Connection, id: &str, name: &str) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE conversations SET name = ?2 WHERE id = ?1",
        params![id, name],
    )?;
    Ok(changed)
}

pub fn update_group_photo(conn: &Connection, id: &str, photo: &str) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE conversations SET photo = ?2 WHERE id = ?1",
        params![id, photo],
    )?;
    Ok(changed)
}

pub fn set_inactive(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("UPDATE conversations SET active = 0 WHERE id = ?1", [id])?;
    Ok(())
}

pub fn touch_activity(conn: &Connection, id: &str, now: &str) -> Result<()> {
    conn.execute(
        "UPDATE conversations SET last_activity = ?2 WHERE id = ?1",
        params![id, now],
    )?;
    Ok(())
}

// -- Members --

/// Returns 0 when the user is already a member (re-adding is absorbed).
pub fn add_member(
    conn: &Connection,
    conversation_id: &str,
    user_id: &str,
    now: &str,
) -> Result<usize> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO members (conversation_id, user_id, joined_at)
         VALUES (?1, ?2, ?3)",
        params![conversation_id, user_id, now],
    )?;
    Ok(changed)
}

pub fn remove_member(conn: &Connection, conversation_id: &str, user_id: &str) -> Result<usize> {
    let changed = conn.execute(
        "DELETE FROM members WHERE conversation_id = ?1 AND user_id = ?2",
        params![conversation_id, user_id],
    )?;
    Ok(changed)
}

pub fn is_member(conn: &Connection, conversation_id: &str, user_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM members WHERE conversation_id = ?1 AND user_id = ?2",
            params![conversation_id, user_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn members_of(conn: &Connection, conversation_id: &str) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.photo, u.created_at
         FROM members m
         JOIN users u ON u.id = m.user_id
         WHERE m.conversation_id = ?1
         ORDER BY u.id",
    )?;
    let rows = stmt
        .query_map([conversation_id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                photo: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn member_count(conn: &Connection, conversation_id: &str) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM members WHERE conversation_id = ?1",
        [conversation_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// The other participant of a direct conversation.
pub fn direct_peer(
    conn: &Connection,
    conversation_id: &str,
    user_id: &str,
) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.photo, u.created_at
         FROM members m
         JOIN users u ON u.id = m.user_id
         WHERE m.conversation_id = ?1 AND m.user_id != ?2
         LIMIT 1",
    )?;
    let row = stmt
        .query_row(params![conversation_id, user_id], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                name: row.get(1)?,
                photo: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;
    Ok(row)
}

// -- Messages --

const MESSAGE_COLUMNS: &str = "m.id, m.conversation_id, m.seq, m.author_id, u.name,
         m.content, m.forwarded_from, m.deleted, m.created_at";

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        seq: row.get(2)?,
        author_id: row.get(3)?,
        author_name: row
            .get::<_, Option<String>>(4)?
            .unwrap_or_else(|| "unknown".to_string()),
        content: row.get(5)?,
        forwarded_from: row.get(6)?,
        deleted: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub fn next_seq(conn: &Connection, conversation_id: &str) -> Result<i64> {
    let seq = conn.query_row(
        "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE conversation_id = ?1",
        [conversation_id],
        |row| row.get(0),
    )?;
    Ok(seq)
}

#[allow(clippy::too_many_arguments)]
pub fn insert_message(
    conn: &Connection,
    id: &str,
    conversation_id: &str,
    seq: i64,
    author_id: &str,
    content: &str,
    forwarded_from: Option<&str>,
    now: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO messages (id, conversation_id, seq, author_id, content, forwarded_from, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, conversation_id, seq, author_id, content, forwarded_from, now],
    )?;
    Ok(())
}

pub fn get_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS}
         FROM messages m
         LEFT JOIN users u ON m.author_id = u.id
         WHERE m.id = ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([id], map_message).optional()?;
    Ok(row)
}

/// Tombstone a message: keep the row (and its ordering position and
/// reactions), clear the content.
pub fn tombstone_message(conn: &Connection, id: &str) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE messages SET deleted = 1, content = '' WHERE id = ?1",
        [id],
    )?;
    Ok(changed)
}

/// Full ordered message sequence of a conversation (insertion order).
pub fn messages_in(conn: &Connection, conversation_id: &str) -> Result<Vec<MessageRow>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS}
         FROM messages m
         LEFT JOIN users u ON m.author_id = u.id
         WHERE m.conversation_id = ?1
         ORDER BY m.seq ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([conversation_id], map_message)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn last_message_in(conn: &Connection, conversation_id: &str) -> Result<Option<MessageRow>> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS}
         FROM messages m
         LEFT JOIN users u ON m.author_id = u.id
         WHERE m.conversation_id = ?1
         ORDER BY m.seq DESC
         LIMIT 1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([conversation_id], map_message).optional()?;
    Ok(row)
}

// -- Reactions --

/// One reaction per (message, user): a second reaction from the same user
/// replaces the first.
pub fn upsert_reaction(
    conn: &Connection,
    message_id: &str,
    user_id: &str,
    emoji: &str,
    now: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO reactions (message_id, user_id, emoji, created_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (message_id, user_id) DO UPDATE SET emoji = ?3, created_at = ?4",
        params![message_id, user_id, emoji, now],
    )?;
    Ok(())
}

pub fn delete_reaction(conn: &Connection, message_id: &str, user_id: &str) -> Result<usize> {
    let changed = conn.execute(
        "DELETE FROM reactions WHERE message_id = ?1 AND user_id = ?2",
        params![message_id, user_id],
    )?;
    Ok(changed)
}

/// Batch-fetch reactions for a set of message IDs.
pub fn reactions_for_messages(
    conn: &Connection,
    message_ids: &[String],
) -> Result<Vec<ReactionRow>> {
    if message_ids.is_empty() {
        return Ok(vec![]);
    }

    let placeholders: Vec<String> = (1..=message_ids.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "SELECT message_id, user_id, emoji, created_at FROM reactions WHERE message_id IN ({})",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let params: Vec<&dyn rusqlite::types::ToSql> = message_ids
        .iter()
        .map(|id| id as &dyn rusqlite::types::ToSql)
        .collect();

    let rows = stmt
        .query_map(params.as_slice(), |row| {
            Ok(ReactionRow {
                message_id: row.get(0)?,
                user_id: row.get(1)?,
                emoji: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
