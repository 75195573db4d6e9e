//! Database row types — these map directly to SQLite rows.
//! Distinct from the parley-types API models to keep the DB layer
//! independent of response shapes.

use parley_types::models::ConversationKind;

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub photo: Option<String>,
    pub created_at: String,
}

pub struct ConversationRow {
    pub id: String,
    pub kind: ConversationKind,
    pub name: Option<String>,
    pub photo: Option<String>,
    pub direct_key: Option<String>,
    pub active: bool,
    pub last_activity: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub seq: i64,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    pub forwarded_from: Option<String>,
    pub deleted: bool,
    pub created_at: String,
}

pub struct ReactionRow {
    pub message_id: String,
    pub user_id: String,
    pub emoji: String,
    pub created_at: String,
}
