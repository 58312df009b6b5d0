//! Realtime subscription to the current room, with per-room dedup and a staleness window.
//!
//! At most one room is subscribed at a time. Subscribing always tears the previous
//! subscription down first, so nothing from the old room can be attributed to the new one.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, trace, warn};

use crate::logutil::escape_log;
use crate::metrics::{self, DropReason};
use crate::services::{RealtimeService, RoomFeed, RoomMessage, ServiceResult};

#[derive(Debug)]
pub struct RoomChannelManager {
    tolerance: chrono::Duration,
    feed: Option<RoomFeed>,
    current_room: Option<String>,
    seen: HashMap<String, HashSet<String>>,
    entered_at: HashMap<String, DateTime<Utc>>,
}

impl RoomChannelManager {
    pub fn new(tolerance: Duration) -> Self {
        Self {
            tolerance: chrono::Duration::from_std(tolerance)
                .unwrap_or_else(|_| chrono::Duration::seconds(10)),
            feed: None,
            current_room: None,
            seen: HashMap::new(),
            entered_at: HashMap::new(),
        }
    }

    pub fn current_room(&self) -> Option<&str> {
        self.current_room.as_deref()
    }

    pub fn is_subscribed(&self) -> bool {
        self.current_room.is_some()
    }

    pub fn entry_time(&self, room_id: &str) -> Option<DateTime<Utc>> {
        self.entered_at.get(room_id).copied()
    }

    /// Close the current subscription, if any. Safe to call repeatedly.
    /// Returns whether something was actually torn down.
    pub fn unsubscribe(&mut self) -> bool {
        self.feed = None;
        match self.current_room.take() {
            Some(room) => {
                self.entered_at.remove(&room);
                self.seen.remove(&room);
                debug!(target: "mudlink::channel", "unsubscribed from room {}", escape_log(&room));
                true
            }
            None => false,
        }
    }

    /// Tear down any existing subscription, then open one for `room_id`.
    pub async fn subscribe(
        &mut self,
        realtime: &dyn RealtimeService,
        room_id: &str,
    ) -> ServiceResult<()> {
        self.unsubscribe();
        let entered_at = Utc::now();
        let feed = realtime.subscribe_room(room_id).await?;
        self.attach(feed, entered_at);
        Ok(())
    }

    /// Install an already-open feed as the current subscription.
    pub fn attach(&mut self, feed: RoomFeed, entered_at: DateTime<Utc>) {
        self.unsubscribe();
        let room = feed.room_id.clone();
        self.entered_at.insert(room.clone(), entered_at);
        self.seen.insert(room.clone(), HashSet::new());
        debug!(target: "mudlink::channel", "subscribed to room {} at {}", escape_log(&room), entered_at.to_rfc3339());
        self.current_room = Some(room);
        self.feed = Some(feed);
    }

    /// Decide whether an inbound message should be rendered, recording its id if so.
    pub fn admit(&mut self, msg: &RoomMessage, viewer_id: Option<&str>) -> Result<(), DropReason> {
        let verdict = self.check(msg, viewer_id);
        match verdict {
            Ok(()) => trace!(target: "mudlink::channel", "admitted message {}", escape_log(&msg.id)),
            Err(reason) => {
                metrics::record_drop(reason);
                trace!(target: "mudlink::channel", "dropped message {} ({:?})", escape_log(&msg.id), reason);
            }
        }
        verdict
    }

    fn check(&mut self, msg: &RoomMessage, viewer_id: Option<&str>) -> Result<(), DropReason> {
        if self.current_room.as_deref() != Some(msg.room_id.as_str()) {
            return Err(DropReason::ForeignRoom);
        }
        if let Some(entered) = self.entered_at.get(&msg.room_id) {
            if msg.created_at < *entered - self.tolerance {
                return Err(DropReason::Stale);
            }
        }
        if let Some(target) = msg.target_character_id.as_deref() {
            if viewer_id != Some(target) {
                return Err(DropReason::Private);
            }
        }
        let seen = self.seen.entry(msg.room_id.clone()).or_default();
        if !seen.insert(msg.id.clone()) {
            return Err(DropReason::Duplicate);
        }
        Ok(())
    }

    /// Wait for the next message on the current feed. Pends forever when nothing is
    /// subscribed; returns `None` once if the transport closes underneath us.
    pub async fn next_message(&mut self) -> Option<RoomMessage> {
        match self.feed.as_mut() {
            Some(feed) => {
                let msg = feed.recv().await;
                if msg.is_none() {
                    warn!(target: "mudlink::channel", "room feed for {} closed by the server", feed.room_id);
                    self.feed = None;
                }
                msg
            }
            None => std::future::pending().await,
        }
    }
}
