//! VOD Link Core - Shared data model, catalog and timestamp mapping algebra

pub mod models;
pub mod mapping;
pub mod catalog;

pub use models::{Channel, ChannelEvent, ChannelEventType, ChannelId, MappingId, Platform, Video, VideoId};
pub use mapping::{Cut, Segment, TimestampMapping};
pub use catalog::{Catalog, CommitSummary, UnitOfWork};

/// Result type for VOD linking operations
pub type Result<T> = std::result::Result<T, VodLinkError>;

/// Error types for VOD linking operations
#[derive(thiserror::Error, Debug)]
pub enum VodLinkError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown channel: {0}")]
    UnknownChannel(ChannelId),

    #[error("Unknown video: {0}")]
    UnknownVideo(VideoId),

    #[error("Unknown mapping: {0}")]
    UnknownMapping(MappingId),

    #[error("Channel {0} has no source channel configured")]
    NoSourceChannel(ChannelId),

    #[error("Invalid mapping: {0}")]
    InvalidMapping(String),

    #[error("Invalid cut: {0}")]
    InvalidCut(String),

    #[error("Invalid duration for video {video}: {duration}")]
    InvalidDuration { video: VideoId, duration: f64 },
}
