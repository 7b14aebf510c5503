//! Remote KV session backend.
//!
//! Speaks a plain HTTP KV contract:
//!
//! - `GET    /kv/{key}?ttl_sec=N` → `200` with the JSON value (the read
//!   refreshes the key's TTL server-side), `404` when absent,
//! - `PUT    /kv/{key}?ttl_sec=N` with a JSON body → `204`,
//! - `DELETE /kv/{key}` → `204`.
//!
//! Key layout per thread `T`:
//!
//! - `chat:T:msgs`      — JSON array of messages, **newest-first** (this
//!   client reverses on read),
//! - `chat:T:slots`     — JSON object of slot-key → string,
//! - `chat:T:kv:<kind>` — arbitrary JSON blob.
//!
//! Read-modify-write operations (append, slot merge) are atomic per call
//! from the turn's point of view: the driver serializes turns per thread,
//! so no two writers race on the same key set.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use wf_domain::chat::Message;
use wf_domain::config::SessionConfig;
use wf_domain::slots::SlotMap;
use wf_domain::{Error, Result};

use crate::SessionBackend;

pub struct RemoteSessionStore {
    http: reqwest::Client,
    base_url: String,
    ttl_sec: u64,
}

impl RemoteSessionStore {
    pub fn new(base_url: &str, cfg: &SessionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(format!("building KV client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            ttl_sec: cfg.ttl_sec,
        })
    }

    fn url(&self, key: &str) -> String {
        format!("{}/kv/{}", self.base_url, key)
    }

    fn msgs_key(thread_id: &str) -> String {
        format!("chat:{thread_id}:msgs")
    }
    fn slots_key(thread_id: &str) -> String {
        format!("chat:{thread_id}:slots")
    }
    fn blob_key(thread_id: &str, kind: &str) -> String {
        format!("chat:{thread_id}:kv:{kind}")
    }

    async fn kv_get(&self, key: &str) -> Result<Option<Value>> {
        let resp = self
            .http
            .get(self.url(key))
            .query(&[("ttl_sec", self.ttl_sec)])
            .send()
            .await
            .map_err(map_reqwest)?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => {
                let v = resp.json().await.map_err(map_reqwest)?;
                Ok(Some(v))
            }
            s => Err(Error::Session(format!("KV GET {key} returned {s}"))),
        }
    }

    async fn kv_put(&self, key: &str, value: &Value, ttl_sec: u64) -> Result<()> {
        let resp = self
            .http
            .put(self.url(key))
            .query(&[("ttl_sec", ttl_sec)])
            .json(value)
            .send()
            .await
            .map_err(map_reqwest)?;
        if !resp.status().is_success() {
            return Err(Error::Session(format!(
                "KV PUT {key} returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn kv_delete(&self, key: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(key))
            .send()
            .await
            .map_err(map_reqwest)?;
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            return Err(Error::Session(format!(
                "KV DELETE {key} returned {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

fn map_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("session KV: {e}"))
    } else {
        Error::Session(e.to_string())
    }
}

#[async_trait]
impl SessionBackend for RemoteSessionStore {
    async fn get_msgs(&self, thread_id: &str, limit: Option<usize>) -> Result<Vec<Message>> {
        let raw = self.kv_get(&Self::msgs_key(thread_id)).await?;
        let mut msgs: Vec<Message> = match raw {
            Some(v) => serde_json::from_value(v)?,
            None => return Ok(Vec::new()),
        };
        // Stored newest-first; callers get oldest-first.
        msgs.reverse();
        if let Some(n) = limit {
            if n < msgs.len() {
                msgs.drain(..msgs.len() - n);
            }
        }
        Ok(msgs)
    }

    async fn append_msg(&self, thread_id: &str, msg: Message, cap: usize) -> Result<()> {
        let key = Self::msgs_key(thread_id);
        let mut msgs: Vec<Message> = match self.kv_get(&key).await? {
            Some(v) => serde_json::from_value(v)?,
            None => Vec::new(),
        };
        // Newest-first: push to the front, truncate the tail.
        msgs.insert(0, msg);
        msgs.truncate(cap);
        self.kv_put(&key, &serde_json::to_value(&msgs)?, self.ttl_sec)
            .await
    }

    async fn get_slots(&self, thread_id: &str) -> Result<SlotMap> {
        match self.kv_get(&Self::slots_key(thread_id)).await? {
            Some(v) => Ok(serde_json::from_value(v)?),
            None => Ok(SlotMap::new()),
        }
    }

    async fn set_slots(&self, thread_id: &str, put: SlotMap, del: &[String]) -> Result<()> {
        let key = Self::slots_key(thread_id);
        let mut slots = self.get_slots(thread_id).await?;
        for k in del {
            slots.remove(k);
        }
        for (k, v) in put {
            if !v.is_empty() {
                slots.insert(k, v);
            }
        }
        self.kv_put(&key, &serde_json::to_value(&slots)?, self.ttl_sec)
            .await
    }

    async fn get_json(&self, kind: &str, thread_id: &str) -> Result<Option<Value>> {
        self.kv_get(&Self::blob_key(thread_id, kind)).await
    }

    async fn set_json(&self, kind: &str, thread_id: &str, value: Value) -> Result<()> {
        self.kv_put(&Self::blob_key(thread_id, kind), &value, self.ttl_sec)
            .await
    }

    async fn expire(&self, thread_id: &str, ttl: Duration) -> Result<()> {
        // Touch every key the thread owns; a read with ttl_sec refreshes.
        let ttl_sec = ttl.as_secs();
        for key in [Self::msgs_key(thread_id), Self::slots_key(thread_id)] {
            let resp = self
                .http
                .get(self.url(&key))
                .query(&[("ttl_sec", ttl_sec)])
                .send()
                .await
                .map_err(map_reqwest)?;
            if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
                return Err(Error::Session(format!(
                    "KV touch {key} returned {}",
                    resp.status()
                )));
            }
        }
        Ok(())
    }

    async fn clear(&self, thread_id: &str) -> Result<()> {
        self.kv_delete(&Self::msgs_key(thread_id)).await?;
        self.kv_delete(&Self::slots_key(thread_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(RemoteSessionStore::msgs_key("t1"), "chat:t1:msgs");
        assert_eq!(RemoteSessionStore::slots_key("t1"), "chat:t1:slots");
        assert_eq!(RemoteSessionStore::blob_key("t1", "prefs"), "chat:t1:kv:prefs");
    }
}
