use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Group,
}

impl ConversationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(Self::Direct),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub photo: Option<String>,
}

/// One reaction as exposed to clients. A message carries at most one
/// reaction per user; `value` is the emoji (or reaction type) string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionView {
    pub user_id: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub conversation_id: String,
    pub author_id: String,
    pub author_name: String,
    /// Empty for tombstoned messages.
    pub content: String,
    pub forwarded_from: Option<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub reactions: Vec<ReactionView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub kind: ConversationKind,
    /// Group name for groups, the peer's display name for directs.
    pub title: String,
    pub photo: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub last_message: Option<MessagePreview>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    pub id: String,
    pub kind: ConversationKind,
    pub title: String,
    pub photo: Option<String>,
    pub active: bool,
    pub members: Vec<UserProfile>,
    pub messages: Vec<MessageView>,
}
