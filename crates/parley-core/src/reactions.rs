use std::collections::BTreeMap;

use parley_db::models::ReactionRow;
use parley_types::models::ReactionView;

/// Per-message reaction state: at most one reaction per user. Setting a
/// second value for the same user replaces the first. The `reactions`
/// table's `(message_id, user_id)` primary key plus upsert is the
/// persisted mirror of the same rule.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReactionSet {
    by_user: BTreeMap<String, String>,
}

impl ReactionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hydrate from persisted rows belonging to one message.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a ReactionRow>) -> Self {
        let mut set = Self::new();
        for row in rows {
            set.set(&row.user_id, &row.emoji);
        }
        set
    }

    /// Record `value` as `user_id`'s reaction, replacing any prior one.
    pub fn set(&mut self, user_id: &str, value: &str) {
        self.by_user.insert(user_id.to_string(), value.to_string());
    }

    /// Remove `user_id`'s reaction. Returns whether one was present.
    pub fn clear(&mut self, user_id: &str) -> bool {
        self.by_user.remove(user_id).is_some()
    }

    pub fn get(&self, user_id: &str) -> Option<&str> {
        self.by_user.get(user_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_user.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_user.is_empty()
    }

    /// All (user, value) pairs. No cross-user ordering is promised to
    /// callers; iteration happens to be keyed by user id.
    pub fn values(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_user
            .iter()
            .map(|(user, value)| (user.as_str(), value.as_str()))
    }

    pub fn to_views(&self) -> Vec<ReactionView> {
        self.values()
            .map(|(user_id, value)| ReactionView {
                user_id: user_id.to_string(),
                value: value.to_string(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_prior_reaction() {
        let mut set = ReactionSet::new();
        set.set("u1", "👍");
        set.set("u1", "❤️");

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("u1"), Some("❤️"));
    }

    #[test]
    fn clear_reports_presence() {
        let mut set = ReactionSet::new();
        set.set("u1", "👍");

        assert!(set.clear("u1"));
        assert!(!set.clear("u1"));
        assert!(set.is_empty());
    }

    #[test]
    fn tracks_one_entry_per_user() {
        let mut set = ReactionSet::new();
        set.set("u1", "👍");
        set.set("u2", "🎉");
        set.set("u1", "👀");

        let values: Vec<_> = set.values().collect();
        assert_eq!(values, vec![("u1", "👀"), ("u2", "🎉")]);
    }

    #[test]
    fn hydrates_from_rows() {
        let rows = vec![
            ReactionRow {
                message_id: "m1".into(),
                user_id: "u1".into(),
                emoji: "👍".into(),
                created_at: "2026-01-01T00:00:00+00:00".into(),
            },
            ReactionRow {
                message_id: "m1".into(),
                user_id: "u2".into(),
                emoji: "🎉".into(),
                created_at: "2026-01-01T00:00:01+00:00".into(),
            },
        ];

        let set = ReactionSet::from_rows(&rows);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("u2"), Some("🎉"));
    }
}
