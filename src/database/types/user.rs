use serde::{Deserialize, Serialize};

/// Row of the `users` table. Created by the bot on `/start`, read-only here.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserRecord {
    pub id: i64,
    pub telegram_id: i64,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub total_message_count: Option<i64>,
    #[serde(default)]
    pub daily_message_count: Option<i64>,
}

impl UserRecord {
    pub fn total_messages(&self) -> i64 {
        self.total_message_count.unwrap_or(0)
    }

    pub fn daily_messages(&self) -> i64 {
        self.daily_message_count.unwrap_or(0)
    }
}
