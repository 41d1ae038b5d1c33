use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use vodlink_core::{ChannelEvent, ChannelEventType};

/// One continuous Live -> Offline broadcast window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSession {
    pub live: ChannelEvent,
    pub offline: ChannelEvent,
}

impl StreamSession {
    pub fn started_at(&self) -> DateTime<Utc> {
        self.live.timestamp
    }

    pub fn ended_at(&self) -> DateTime<Utc> {
        self.offline.timestamp
    }

    pub fn duration(&self) -> Duration {
        self.offline.timestamp - self.live.timestamp
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration().num_milliseconds() as f64 / 1000.0
    }
}

/// Broadcast sessions reconstructed from a channel's event log
#[derive(Debug, Clone, Default)]
pub struct StreamSessionIndex {
    sessions: Vec<StreamSession>,
    dropped_live_events: usize,
}

impl StreamSessionIndex {
    /// Build the index from events in ascending timestamp order.
    ///
    /// A Live event opens a session and replaces any session still open; the
    /// replaced Live event is dropped. The next Offline event closes the open
    /// session. Offline events with no open session and `Other` events are
    /// ignored.
    pub fn from_events<'a, I>(events: I) -> Self
    where
        I: IntoIterator<Item = &'a ChannelEvent>,
    {
        let mut sessions = Vec::new();
        let mut dropped_live_events = 0;
        let mut current_live: Option<&ChannelEvent> = None;

        for event in events {
            match event.event_type {
                ChannelEventType::Live => {
                    if let Some(open) = current_live.replace(event) {
                        dropped_live_events += 1;
                        debug!("Dropping unterminated live event at {}", open.timestamp);
                    }
                }
                ChannelEventType::Offline => {
                    if let Some(live) = current_live.take() {
                        sessions.push(StreamSession {
                            live: live.clone(),
                            offline: event.clone(),
                        });
                    }
                }
                ChannelEventType::Other => {}
            }
        }

        if let Some(open) = current_live {
            debug!("Live event at {} has no offline event yet", open.timestamp);
        }

        Self {
            sessions,
            dropped_live_events,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StreamSession> {
        self.sessions.iter()
    }

    pub fn sessions(&self) -> &[StreamSession] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Live events discarded because another Live event replaced them
    pub fn dropped_live_events(&self) -> usize {
        self.dropped_live_events
    }
}

impl<'a> IntoIterator for &'a StreamSessionIndex {
    type Item = &'a StreamSession;
    type IntoIter = std::slice::Iter<'a, StreamSession>;

    fn into_iter(self) -> Self::IntoIter {
        self.sessions.iter()
    }
}
