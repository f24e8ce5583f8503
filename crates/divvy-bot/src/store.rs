//! Subscriber persistence.
//!
//! One record per chat, kept as a JSON map under the app home. The store
//! is small and rewritten whole on every mutation; callers serialize
//! access (the bot keeps it behind a lock).

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::paths;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Subscriber {
    /// Linked dashboard account (YubiKey public ID), when logged in.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Whether the chat receives digest broadcasts.
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug)]
pub(crate) struct SubscriberStore {
    path: PathBuf,
}

impl SubscriberStore {
    pub(crate) fn open_default() -> Self {
        Self::at(paths::subscribers_path())
    }

    pub(crate) fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn get(&self, chat_id: i64) -> Result<Option<Subscriber>> {
        Ok(self.load()?.remove(&chat_id))
    }

    /// Flips the digest subscription, creating the record when absent.
    /// A linked account survives unsubscribing.
    pub(crate) fn set_active(&self, chat_id: i64, active: bool) -> Result<()> {
        let mut subscribers = self.load()?;
        subscribers.entry(chat_id).or_default().active = active;
        self.save(&subscribers)
    }

    /// Links the chat to a dashboard account and (re)activates it.
    pub(crate) fn link_user(&self, chat_id: i64, user_id: &str) -> Result<()> {
        let mut subscribers = self.load()?;
        let subscriber = subscribers.entry(chat_id).or_default();
        subscriber.user_id = Some(user_id.to_string());
        subscriber.active = true;
        self.save(&subscribers)
    }

    /// Removes the chat's record entirely. Returns whether one existed.
    pub(crate) fn unlink_user(&self, chat_id: i64) -> Result<bool> {
        let mut subscribers = self.load()?;
        let existed = subscribers.remove(&chat_id).is_some();
        if existed {
            self.save(&subscribers)?;
        }
        Ok(existed)
    }

    /// Active subscribers with a linked dashboard account, for broadcasts.
    pub(crate) fn active_subscribers(&self) -> Result<Vec<(i64, Subscriber)>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|(_, subscriber)| subscriber.active && subscriber.user_id.is_some())
            .collect())
    }

    fn load(&self) -> Result<BTreeMap<i64, Subscriber>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    fn save(&self, subscribers: &BTreeMap<i64, Subscriber>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents =
            serde_json::to_string_pretty(subscribers).context("Failed to encode subscribers")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriberStore;

    fn temp_store() -> (tempfile::TempDir, SubscriberStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = SubscriberStore::at(dir.path().join("subscribers.json"));
        (dir, store)
    }

    #[test]
    fn subscribe_then_unsubscribe_round_trips() {
        let (_dir, store) = temp_store();

        store.set_active(100, true).expect("subscribe");
        let subscriber = store.get(100).expect("get").expect("present");
        assert!(subscriber.active);
        assert!(subscriber.user_id.is_none());

        store.set_active(100, false).expect("unsubscribe");
        assert!(!store.get(100).expect("get").expect("present").active);
    }

    #[test]
    fn linking_activates_and_survives_relink() {
        let (_dir, store) = temp_store();

        store.link_user(7, "cccccccccccb").expect("link");
        let subscriber = store.get(7).expect("get").expect("present");
        assert_eq!(subscriber.user_id.as_deref(), Some("cccccccccccb"));
        assert!(subscriber.active);

        store.link_user(7, "cccccccccccd").expect("relink");
        let subscriber = store.get(7).expect("get").expect("present");
        assert_eq!(subscriber.user_id.as_deref(), Some("cccccccccccd"));
    }

    #[test]
    fn unlink_reports_whether_a_record_existed() {
        let (_dir, store) = temp_store();

        assert!(!store.unlink_user(1).expect("unlink missing"));
        store.link_user(1, "cccccccccccb").expect("link");
        assert!(store.unlink_user(1).expect("unlink"));
        assert!(store.get(1).expect("get").is_none());
    }

    #[test]
    fn broadcasts_only_reach_active_linked_chats() {
        let (_dir, store) = temp_store();

        store.link_user(1, "cccccccccccb").expect("link");
        store.link_user(2, "cccccccccccd").expect("link");
        store.set_active(2, false).expect("deactivate");
        store.set_active(3, true).expect("subscribe only");

        let active = store.active_subscribers().expect("list");
        let chat_ids: Vec<i64> = active.iter().map(|(chat_id, _)| *chat_id).collect();
        assert_eq!(chat_ids, vec![1]);
    }

    #[test]
    fn store_survives_reopening() {
        let (dir, store) = temp_store();
        store.link_user(42, "cccccccccccb").expect("link");
        drop(store);

        let reopened = SubscriberStore::at(dir.path().join("subscribers.json"));
        let subscriber = reopened.get(42).expect("get").expect("present");
        assert_eq!(subscriber.user_id.as_deref(), Some("cccccccccccb"));
    }
}
