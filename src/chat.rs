//! # Chat History Module
//!
//! ## Purpose
//! Append-only persistent log of the question/answer exchange. Messages get
//! atomically assigned, strictly increasing ids so concurrent appends never
//! collide, and iteration order matches append order.
//!
//! ## Input/Output Specification
//! - **Input**: Role and message content
//! - **Output**: Ordered `ChatMessage` history
//! - **Persistence**: Stored in a sled tree under big-endian id keys

use crate::errors::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const HISTORY_TREE: &str = "chat_history";

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    /// Parse a role from its wire representation
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One logged message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Persistent chat history store
pub struct ChatHistoryStore {
    db: sled::Db,
    tree: sled::Tree,
}

impl ChatHistoryStore {
    /// Open the history tree inside an existing sled database
    pub fn open(db: &sled::Db) -> Result<Self> {
        let tree = db.open_tree(HISTORY_TREE)?;
        Ok(Self {
            db: db.clone(),
            tree,
        })
    }

    /// Append one message and return it with its assigned id.
    ///
    /// Id assignment goes through the sled id generator, so two concurrent
    /// appends always receive distinct ids.
    pub fn append(&self, role: ChatRole, content: &str) -> Result<ChatMessage> {
        let id = self.db.generate_id()?;
        let message = ChatMessage {
            id,
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
        };

        let encoded = bincode::serialize(&message)?;
        // Big-endian keys keep sled iteration in id order
        self.tree.insert(id.to_be_bytes(), encoded)?;
        Ok(message)
    }

    /// All messages in append order
    pub fn list(&self) -> Result<Vec<ChatMessage>> {
        let mut messages = Vec::new();
        for entry in self.tree.iter() {
            let (_, value) = entry?;
            messages.push(bincode::deserialize(&value)?);
        }
        Ok(messages)
    }

    /// Number of stored messages
    pub fn len(&self) -> Result<usize> {
        Ok(self.tree.len())
    }

    /// Whether the history is empty
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.tree.is_empty())
    }
}
