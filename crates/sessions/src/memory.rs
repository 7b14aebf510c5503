//! In-process session backend.
//!
//! One mutex-guarded map of thread entries. Expiry is lazy: an entry past
//! its deadline is dropped on the next access, and a sweep runs whenever
//! the map grows past a watermark.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use wf_domain::chat::Message;
use wf_domain::config::SessionConfig;
use wf_domain::slots::SlotMap;
use wf_domain::Result;

use crate::SessionBackend;

/// Sweep expired threads once the map holds this many entries.
const SWEEP_WATERMARK: usize = 1_024;

struct ThreadEntry {
    /// Oldest-first. The remote backend stores newest-first; this one
    /// keeps natural order and pays the trim on append instead.
    msgs: Vec<Message>,
    slots: SlotMap,
    kv: HashMap<String, Value>,
    expires_at: Instant,
}

impl ThreadEntry {
    fn new(ttl: Duration) -> Self {
        Self {
            msgs: Vec::new(),
            slots: SlotMap::new(),
            kv: HashMap::new(),
            expires_at: Instant::now() + ttl,
        }
    }
}

pub struct MemorySessionStore {
    threads: Mutex<HashMap<String, ThreadEntry>>,
    ttl: Duration,
}

impl MemorySessionStore {
    pub fn new(cfg: &SessionConfig) -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
            ttl: Duration::from_secs(cfg.ttl_sec),
        }
    }

    /// Run `f` against the (possibly fresh) entry for `thread_id`,
    /// refreshing its TTL. One lock hold per operation keeps each call
    /// atomic.
    fn with_entry<T>(&self, thread_id: &str, f: impl FnOnce(&mut ThreadEntry) -> T) -> T {
        let mut threads = self.threads.lock();

        if threads.len() >= SWEEP_WATERMARK {
            let now = Instant::now();
            threads.retain(|_, e| e.expires_at > now);
        }

        let entry = threads
            .entry(thread_id.to_owned())
            .or_insert_with(|| ThreadEntry::new(self.ttl));
        if entry.expires_at <= Instant::now() {
            *entry = ThreadEntry::new(self.ttl);
        }
        entry.expires_at = Instant::now() + self.ttl;
        f(entry)
    }
}

#[async_trait]
impl SessionBackend for MemorySessionStore {
    async fn get_msgs(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Message>> {
        Ok(self.with_entry(thread_id, |e| {
            let msgs = &e.msgs;
            match limit {
                Some(n) if n < msgs.len() => msgs[msgs.len() - n..].to_vec(),
                _ => msgs.clone(),
            }
        }))
    }

    async fn append_msg(&self, thread_id: &str, msg: Message, cap: usize) -> Result<()> {
        self.with_entry(thread_id, |e| {
            e.msgs.push(msg);
            if e.msgs.len() > cap {
                let excess = e.msgs.len() - cap;
                e.msgs.drain(..excess);
            }
        });
        Ok(())
    }

    async fn get_slots(&self, thread_id: &str) -> Result<SlotMap> {
        Ok(self.with_entry(thread_id, |e| e.slots.clone()))
    }

    async fn set_slots(&self, thread_id: &str, put: SlotMap, del: &[String]) -> Result<()> {
        self.with_entry(thread_id, |e| {
            for key in del {
                e.slots.remove(key);
            }
            for (k, v) in put {
                if !v.is_empty() {
                    e.slots.insert(k, v);
                }
            }
        });
        Ok(())
    }

    async fn get_json(&self, kind: &str, thread_id: &str) -> Result<Option<Value>> {
        Ok(self.with_entry(thread_id, |e| e.kv.get(kind).cloned()))
    }

    async fn set_json(&self, kind: &str, thread_id: &str, value: Value) -> Result<()> {
        self.with_entry(thread_id, |e| {
            e.kv.insert(kind.to_owned(), value);
        });
        Ok(())
    }

    async fn expire(&self, thread_id: &str, ttl: Duration) -> Result<()> {
        let mut threads = self.threads.lock();
        if let Some(entry) = threads.get_mut(thread_id) {
            entry.expires_at = Instant::now() + ttl;
        }
        Ok(())
    }

    async fn clear(&self, thread_id: &str) -> Result<()> {
        self.threads.lock().remove(thread_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemorySessionStore {
        MemorySessionStore::new(&SessionConfig::default())
    }

    #[tokio::test]
    async fn append_then_get_is_oldest_first() {
        let s = store();
        s.append_msg("t1", Message::user("one"), 16).await.unwrap();
        s.append_msg("t1", Message::assistant("two"), 16).await.unwrap();
        s.append_msg("t1", Message::user("three"), 16).await.unwrap();

        let msgs = s.get_msgs("t1", None).await.unwrap();
        let contents: Vec<_> = msgs.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "two", "three"]);
    }

    #[tokio::test]
    async fn cap_drops_exactly_the_oldest() {
        let s = store();
        for i in 0..17 {
            s.append_msg("t1", Message::user(format!("m{i}")), 16).await.unwrap();
        }
        let msgs = s.get_msgs("t1", None).await.unwrap();
        assert_eq!(msgs.len(), 16);
        assert_eq!(msgs[0].content, "m1");
        assert_eq!(msgs[15].content, "m16");
    }

    #[tokio::test]
    async fn get_msgs_limit_returns_newest() {
        let s = store();
        for i in 0..5 {
            s.append_msg("t1", Message::user(format!("m{i}")), 16).await.unwrap();
        }
        let msgs = s.get_msgs("t1", Some(2)).await.unwrap();
        let contents: Vec<_> = msgs.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m3", "m4"]);
    }

    #[tokio::test]
    async fn slots_roundtrip_and_delete() {
        let s = store();
        let mut put = SlotMap::new();
        put.insert("city".into(), "Rome".into());
        put.insert("month".into(), "June".into());
        s.set_slots("t1", put, &[]).await.unwrap();

        s.set_slots("t1", SlotMap::new(), &["month".into()]).await.unwrap();
        let slots = s.get_slots("t1").await.unwrap();
        assert_eq!(slots.get("city").map(String::as_str), Some("Rome"));
        assert!(!slots.contains_key("month"));
    }

    #[tokio::test]
    async fn empty_slot_values_are_never_stored() {
        let s = store();
        let mut put = SlotMap::new();
        put.insert("city".into(), "".into());
        s.set_slots("t1", put, &[]).await.unwrap();
        assert!(s.get_slots("t1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn json_blobs_by_kind() {
        let s = store();
        s.set_json("prefs", "t1", serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(
            s.get_json("prefs", "t1").await.unwrap(),
            Some(serde_json::json!({"a": 1}))
        );
        assert_eq!(s.get_json("other", "t1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let s = store();
        s.append_msg("t1", Message::user("hello"), 16).await.unwrap();
        s.clear("t1").await.unwrap();
        assert!(s.get_msgs("t1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expired_entry_resets_on_access() {
        let cfg = SessionConfig {
            ttl_sec: 0,
            ..SessionConfig::default()
        };
        let s = MemorySessionStore::new(&cfg);
        s.append_msg("t1", Message::user("hello"), 16).await.unwrap();
        // TTL of zero: the entry is already expired by the next access.
        assert!(s.get_msgs("t1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn threads_are_isolated() {
        let s = store();
        s.append_msg("t1", Message::user("one"), 16).await.unwrap();
        assert!(s.get_msgs("t2", None).await.unwrap().is_empty());
    }
}
