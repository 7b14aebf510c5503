//! Shared outbound HTTP stack for the tool catalog.
//!
//! Every network tool goes through here so pacing, retry, deadlines, and
//! cancellation behave the same way everywhere:
//!
//! - the per-family limiter spaces call starts,
//! - idempotent GETs retry with exponential backoff; POSTs never do,
//! - each attempt is bounded by the caller's deadline,
//! - the turn's cancellation signal aborts waits and in-flight requests.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use wf_domain::{Error, Result};

use crate::{Family, RateLimiter, RetryPolicy, ToolCtx};

pub struct OutboundHttp {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl OutboundHttp {
    pub fn new(cfg: &wf_domain::config::ToolsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("wayfarer/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Http(format!("building outbound client: {e}")))?;
        Ok(Self {
            client,
            limiter: Arc::new(RateLimiter::new(Duration::from_millis(cfg.min_spacing_ms))),
            retry: RetryPolicy::default(),
        })
    }

    /// GET returning JSON, with pacing and transient-failure retry.
    pub async fn get_json(
        &self,
        family: Family,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
        ctx: &ToolCtx,
    ) -> Result<Value> {
        self.retry
            .run(|| self.request_json(reqwest::Method::GET, family, url, query, headers, None, ctx))
            .await
    }

    /// POST returning JSON. Not retried: the catalog treats every POST as
    /// potentially non-idempotent.
    pub async fn post_json(
        &self,
        family: Family,
        url: &str,
        body: &Value,
        headers: &[(&str, String)],
        ctx: &ToolCtx,
    ) -> Result<Value> {
        self.request_json(reqwest::Method::POST, family, url, &[], headers, Some(body), ctx)
            .await
    }

    /// POST with a form body (token endpoints). Not retried.
    pub async fn post_form(
        &self,
        family: Family,
        url: &str,
        form: &[(&str, String)],
        ctx: &ToolCtx,
    ) -> Result<Value> {
        self.limiter.acquire(family).await;

        let fut = self
            .client
            .post(url)
            .timeout(ctx.deadline)
            .form(form)
            .send();
        let resp = self.race_signal(fut, ctx).await??;
        Self::json_body(resp).await
    }

    async fn request_json(
        &self,
        method: reqwest::Method,
        family: Family,
        url: &str,
        query: &[(&str, String)],
        headers: &[(&str, String)],
        body: Option<&Value>,
        ctx: &ToolCtx,
    ) -> Result<Value> {
        self.limiter.acquire(family).await;

        let mut rb = self.client.request(method, url).timeout(ctx.deadline);
        if !query.is_empty() {
            rb = rb.query(query);
        }
        for (k, v) in headers {
            rb = rb.header(*k, v);
        }
        if let Some(b) = body {
            rb = rb.json(b);
        }

        let resp = self.race_signal(rb.send(), ctx).await??;
        Self::json_body(resp).await
    }

    /// Race an in-flight request against the turn's cancellation signal.
    async fn race_signal<F>(&self, fut: F, ctx: &ToolCtx) -> Result<Result<reqwest::Response>>
    where
        F: std::future::Future<Output = reqwest::Result<reqwest::Response>>,
    {
        tokio::select! {
            _ = ctx.signal.cancelled() => Err(Error::Cancelled("turn deadline".into())),
            resp = fut => Ok(resp.map_err(map_reqwest)),
        }
    }

    async fn json_body(resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                message,
            });
        }
        resp.json()
            .await
            .map_err(|e| Error::Http(format!("unparseable JSON body: {e}")))
    }
}

fn map_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
