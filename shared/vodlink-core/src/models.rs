//! Channel, video and event records supplied by the ingestion side

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identifier of a channel
    ChannelId
);
id_type!(
    /// Identifier of a video
    VideoId
);
id_type!(
    /// Identifier of a timestamp mapping
    MappingId
);

/// Hosting platform of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[serde(alias = "YouTube")]
    Youtube,
    #[serde(alias = "Twitch")]
    Twitch,
    #[default]
    #[serde(other)]
    Other,
}

/// A channel, optionally pointing at the channel that actually streamed live
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Channel {
    pub id: ChannelId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub platform: Platform,

    /// Authoritative source of live-session timing for this channel
    #[serde(default)]
    pub source_channel_id: Option<ChannelId>,
}

impl Channel {
    pub fn new(id: ChannelId, name: impl Into<String>, platform: Platform) -> Self {
        Self {
            id,
            name: name.into(),
            platform,
            source_channel_id: None,
        }
    }

    pub fn with_source_channel(mut self, source: ChannelId) -> Self {
        self.source_channel_id = Some(source);
        self
    }

    /// Channel whose live/offline events describe this channel's broadcasts
    pub fn event_channel_id(&self) -> ChannelId {
        self.source_channel_id.unwrap_or(self.id)
    }
}

/// A recording on a channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub id: VideoId,

    pub channel_id: ChannelId,

    #[serde(default)]
    pub title: String,

    /// Duration in seconds
    pub duration: f64,

    /// Upload time reported by the platform
    #[serde(default)]
    pub uploaded: Option<DateTime<Utc>>,

    /// Broadcast start derived from the channel's live sessions
    #[serde(default)]
    pub estimated_upload_time: Option<DateTime<Utc>>,

    /// Platform-side identifier used to build playable URLs
    #[serde(default)]
    pub platform_ref: String,
}

impl Video {
    pub fn new(id: VideoId, channel_id: ChannelId, title: impl Into<String>, duration: f64) -> Self {
        Self {
            id,
            channel_id,
            title: title.into(),
            duration,
            uploaded: None,
            estimated_upload_time: None,
            platform_ref: String::new(),
        }
    }

    pub fn with_uploaded(mut self, uploaded: DateTime<Utc>) -> Self {
        self.uploaded = Some(uploaded);
        self
    }

    pub fn with_estimated_upload_time(mut self, estimated: DateTime<Utc>) -> Self {
        self.estimated_upload_time = Some(estimated);
        self
    }

    pub fn with_platform_ref(mut self, platform_ref: impl Into<String>) -> Self {
        self.platform_ref = platform_ref.into();
        self
    }

    /// Get formatted duration string
    pub fn duration_formatted(&self) -> String {
        format_seconds(self.duration)
    }
}

/// Render seconds as `HH:MM:SS`, or `MM:SS` below one hour
pub fn format_seconds(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let hours = (seconds / 3600.0) as u32;
    let minutes = ((seconds % 3600.0) / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Kind of channel event recorded by the chat/event ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelEventType {
    #[serde(alias = "Live", alias = "LIVE")]
    Live,
    #[serde(alias = "Offline", alias = "OFFLINE")]
    Offline,
    #[serde(other)]
    Other,
}

/// A timestamped channel event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelEvent {
    pub channel_id: ChannelId,
    pub timestamp: DateTime<Utc>,
    pub event_type: ChannelEventType,
}

impl ChannelEvent {
    pub fn new(channel_id: ChannelId, timestamp: DateTime<Utc>, event_type: ChannelEventType) -> Self {
        Self {
            channel_id,
            timestamp,
            event_type,
        }
    }

    pub fn live(channel_id: ChannelId, timestamp: DateTime<Utc>) -> Self {
        Self::new(channel_id, timestamp, ChannelEventType::Live)
    }

    pub fn offline(channel_id: ChannelId, timestamp: DateTime<Utc>) -> Self {
        Self::new(channel_id, timestamp, ChannelEventType::Offline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_formatting() {
        let short = Video::new(VideoId(1), ChannelId(1), "short", 125.0);
        assert_eq!(short.duration_formatted(), "02:05");

        let long = Video::new(VideoId(2), ChannelId(1), "long", 3.0 * 3600.0 + 61.0);
        assert_eq!(long.duration_formatted(), "03:01:01");
    }

    #[test]
    fn test_event_channel_prefers_source() {
        let own = Channel::new(ChannelId(1), "streamer", Platform::Twitch);
        assert_eq!(own.event_channel_id(), ChannelId(1));

        let reupload = Channel::new(ChannelId(2), "vods", Platform::Youtube).with_source_channel(ChannelId(1));
        assert_eq!(reupload.event_channel_id(), ChannelId(1));
    }

    #[test]
    fn test_unknown_event_type_is_other() {
        let json = r#"{"channel_id": 3, "timestamp": "2025-01-24T18:00:00Z", "event_type": "Raid"}"#;
        let event: ChannelEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.event_type, ChannelEventType::Other);

        for name in ["live", "Live"] {
            let json = format!(r#"{{"channel_id": 3, "timestamp": "2025-01-24T18:00:00Z", "event_type": "{}"}}"#, name);
            let event: ChannelEvent = serde_json::from_str(&json).unwrap();
            assert_eq!(event.event_type, ChannelEventType::Live);
        }
    }

    #[test]
    fn test_instants_normalize_to_utc() {
        let json = r#"{"id": 1, "channel_id": 1, "duration": 10.0, "uploaded": "2025-01-24T20:00:00+02:00"}"#;
        let video: Video = serde_json::from_str(json).unwrap();
        assert_eq!(video.uploaded.unwrap().to_rfc3339(), "2025-01-24T18:00:00+00:00");
    }

    #[test]
    fn test_offsetless_instant_rejected() {
        let json = r#"{"id": 1, "channel_id": 1, "duration": 10.0, "uploaded": "2025-01-24T20:00:00"}"#;
        assert!(serde_json::from_str::<Video>(json).is_err());
    }
}
