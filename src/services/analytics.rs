//! Site analytics, kept in the local store only.
//!
//! Page views and custom events are bounded logs; the oldest entries are
//! dropped once a log reaches `MAX_LOG_ENTRIES`. Sessions are a table keyed by
//! session id.

use super::{AppContext, ServiceResult};
use crate::storage::local::CacheKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

pub const MAX_LOG_ENTRIES: usize = 1000;
const TOP_PAGES: usize = 5;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PageView {
    pub path: String,
    pub session_id: String,
    pub referrer: Option<String>,
    pub viewed_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AnalyticsEvent {
    pub name: String,
    pub session_id: String,
    #[serde(default)]
    pub properties: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Session {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub page_views: u32,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct PageCount {
    pub path: String,
    pub views: usize,
}

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct AnalyticsSummary {
    pub page_views: usize,
    pub events: usize,
    pub sessions: usize,
    pub top_pages: Vec<PageCount>,
}

#[derive(Clone)]
pub struct Analytics {
    ctx: Arc<AppContext>,
}

impl Analytics {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    pub async fn track_page_view(
        &self,
        session_id: &str,
        path: &str,
        referrer: Option<&str>,
    ) -> ServiceResult<()> {
        let view = PageView {
            path: path.to_string(),
            session_id: session_id.to_string(),
            referrer: referrer.map(str::to_string),
            viewed_at: Utc::now(),
        };
        self.ctx
            .local
            .update(CacheKey::PageViews, |log: &mut Vec<PageView>| {
                push_bounded(log, view)
            })
            .await?;
        self.touch(session_id, true).await
    }

    pub async fn track_event(
        &self,
        session_id: &str,
        name: &str,
        properties: serde_json::Value,
    ) -> ServiceResult<()> {
        let event = AnalyticsEvent {
            name: name.to_string(),
            session_id: session_id.to_string(),
            properties,
            occurred_at: Utc::now(),
        };
        debug!(name, session_id, "tracked event");
        self.ctx
            .local
            .update(CacheKey::AnalyticsEvents, |log: &mut Vec<AnalyticsEvent>| {
                push_bounded(log, event)
            })
            .await?;
        Ok(())
    }

    /// Start the session if new, otherwise bump its last-seen time.
    pub async fn touch_session(&self, session_id: &str) -> ServiceResult<()> {
        self.touch(session_id, false).await
    }

    async fn touch(&self, session_id: &str, page_view: bool) -> ServiceResult<()> {
        let now = Utc::now();
        self.ctx
            .local
            .update(CacheKey::AnalyticsSessions, |sessions: &mut Vec<Session>| {
                match sessions.iter_mut().find(|s| s.id == session_id) {
                    Some(session) => {
                        session.last_seen = now;
                        session.page_views += u32::from(page_view);
                    }
                    None => sessions.push(Session {
                        id: session_id.to_string(),
                        started_at: now,
                        last_seen: now,
                        page_views: u32::from(page_view),
                    }),
                }
            })
            .await?;
        Ok(())
    }

    pub async fn summary(&self) -> AnalyticsSummary {
        let local = &self.ctx.local;
        let views: Vec<PageView> = local.get_all(CacheKey::PageViews).await;
        let events: Vec<AnalyticsEvent> = local.get_all(CacheKey::AnalyticsEvents).await;
        let sessions: Vec<Session> = local.get_all(CacheKey::AnalyticsSessions).await;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for view in &views {
            *counts.entry(view.path.as_str()).or_default() += 1;
        }
        let mut top_pages: Vec<PageCount> = counts
            .into_iter()
            .map(|(path, views)| PageCount {
                path: path.to_string(),
                views,
            })
            .collect();
        top_pages.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.path.cmp(&b.path)));
        top_pages.truncate(TOP_PAGES);

        AnalyticsSummary {
            page_views: views.len(),
            events: events.len(),
            sessions: sessions.len(),
            top_pages,
        }
    }
}

fn push_bounded<T>(log: &mut Vec<T>, entry: T) {
    log.push(entry);
    if log.len() > MAX_LOG_ENTRIES {
        let excess = log.len() - MAX_LOG_ENTRIES;
        log.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support;
    use serde_json::json;

    #[tokio::test]
    async fn page_views_feed_sessions_and_summary() {
        let (ctx, _dir) = test_support::local_context().await;
        let analytics = Analytics::new(ctx);
        analytics.track_page_view("s1", "/", None).await.unwrap();
        analytics.track_page_view("s1", "/rsvp", Some("/")).await.unwrap();
        analytics.track_page_view("s2", "/rsvp", None).await.unwrap();
        analytics
            .track_event("s2", "rsvp_submitted", json!({ "attending": true }))
            .await
            .unwrap();
        analytics.touch_session("s3").await.unwrap();

        let summary = analytics.summary().await;
        assert_eq!(summary.page_views, 3);
        assert_eq!(summary.events, 1);
        assert_eq!(summary.sessions, 3);
        assert_eq!(
            summary.top_pages[0],
            PageCount {
                path: "/rsvp".into(),
                views: 2
            }
        );
    }

    #[test]
    fn logs_are_bounded() {
        let mut log: Vec<usize> = (0..MAX_LOG_ENTRIES).collect();
        push_bounded(&mut log, MAX_LOG_ENTRIES);
        assert_eq!(log.len(), MAX_LOG_ENTRIES);
        assert_eq!(log[0], 1);
        assert_eq!(log.last(), Some(&MAX_LOG_ENTRIES));
    }
}
