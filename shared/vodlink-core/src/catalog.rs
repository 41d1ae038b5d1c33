//! Read snapshot of channels, videos, events and mappings, plus the unit of
//! work that stages mutations against it

use crate::mapping::TimestampMapping;
use crate::models::{Channel, ChannelEvent, ChannelEventType, ChannelId, MappingId, Video, VideoId};
use crate::{Result, VodLinkError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Caller-supplied snapshot that every run reads from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "CatalogRecord")]
pub struct Catalog {
    channels: Vec<Channel>,
    videos: Vec<Video>,
    /// Sorted ascending by timestamp
    events: Vec<ChannelEvent>,
    mappings: Vec<TimestampMapping>,
}

#[derive(Deserialize)]
struct CatalogRecord {
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    videos: Vec<Video>,
    #[serde(default)]
    events: Vec<ChannelEvent>,
    #[serde(default)]
    mappings: Vec<TimestampMapping>,
}

impl From<CatalogRecord> for Catalog {
    fn from(record: CatalogRecord) -> Self {
        Catalog::new(record.channels, record.videos, record.events, record.mappings)
    }
}

impl Catalog {
    pub fn new(
        channels: Vec<Channel>,
        videos: Vec<Video>,
        mut events: Vec<ChannelEvent>,
        mappings: Vec<TimestampMapping>,
    ) -> Self {
        events.sort_by_key(|e| e.timestamp);
        Self {
            channels,
            videos,
            events,
            mappings,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let catalog: Catalog = serde_json::from_str(json)?;
        debug!(
            "Loaded catalog: {} channels, {} videos, {} events, {} mappings",
            catalog.channels.len(),
            catalog.videos.len(),
            catalog.events.len(),
            catalog.mappings.len()
        );
        Ok(catalog)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn insert_channel(&mut self, channel: Channel) {
        self.channels.push(channel);
    }

    pub fn insert_video(&mut self, video: Video) {
        self.videos.push(video);
    }

    pub fn insert_event(&mut self, event: ChannelEvent) {
        let idx = self.events.partition_point(|e| e.timestamp <= event.timestamp);
        self.events.insert(idx, event);
    }

    pub fn insert_mapping(&mut self, mapping: TimestampMapping) {
        self.mappings.push(mapping);
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn videos(&self) -> &[Video] {
        &self.videos
    }

    pub fn video(&self, id: VideoId) -> Option<&Video> {
        self.videos.iter().find(|v| v.id == id)
    }

    pub fn videos_for_channel(&self, channel_id: ChannelId) -> impl Iterator<Item = &Video> {
        self.videos.iter().filter(move |v| v.channel_id == channel_id)
    }

    /// Live and Offline events of a channel in ascending timestamp order
    pub fn live_offline_events(&self, channel_id: ChannelId) -> impl Iterator<Item = &ChannelEvent> {
        self.events.iter().filter(move |e| {
            e.channel_id == channel_id && matches!(e.event_type, ChannelEventType::Live | ChannelEventType::Offline)
        })
    }

    pub fn mappings(&self) -> &[TimestampMapping] {
        &self.mappings
    }

    pub fn mapping(&self, id: MappingId) -> Option<&TimestampMapping> {
        self.mappings.iter().find(|m| m.id() == id)
    }

    pub fn mapping_mut(&mut self, id: MappingId) -> Option<&mut TimestampMapping> {
        self.mappings.iter_mut().find(|m| m.id() == id)
    }

    /// First active mapping between two videos, in either direction
    pub fn find_active_mapping(&self, a: VideoId, b: VideoId) -> Option<&TimestampMapping> {
        self.mappings.iter().find(|m| m.is_active() && m.connects(a, b))
    }

    pub fn has_active_mapping(&self, target: VideoId) -> bool {
        self.mappings
            .iter()
            .any(|m| m.is_active() && m.target_video_id() == target)
    }

    pub fn next_mapping_id(&self) -> MappingId {
        let max = self.mappings.iter().map(|m| m.id().0).max().unwrap_or(0);
        MappingId(max + 1)
    }

    /// Start staging mutations against this snapshot
    pub fn unit_of_work(&mut self) -> UnitOfWork<'_> {
        UnitOfWork {
            catalog: self,
            estimates: BTreeMap::new(),
            mappings: Vec::new(),
        }
    }
}

/// Counts of changes applied by [`UnitOfWork::commit`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub estimates_applied: usize,
    pub mappings_added: usize,
}

/// Staged mutations over a [`Catalog`].
///
/// Staged changes are visible to every read made through the unit of work,
/// so later checks in the same run observe earlier changes. Nothing reaches
/// the catalog until [`commit`](UnitOfWork::commit); dropping the unit of work
/// discards everything staged.
#[derive(Debug)]
pub struct UnitOfWork<'a> {
    catalog: &'a mut Catalog,
    estimates: BTreeMap<VideoId, DateTime<Utc>>,
    mappings: Vec<TimestampMapping>,
}

impl<'a> UnitOfWork<'a> {
    /// Committed state, without staged changes
    pub fn catalog(&self) -> &Catalog {
        &*self.catalog
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.catalog.channel(id)
    }

    pub fn video(&self, id: VideoId) -> Option<Video> {
        self.catalog.video(id).map(|v| self.overlay(v))
    }

    /// Videos of a channel as seen through the staged changes
    pub fn videos_for_channel(&self, channel_id: ChannelId) -> Vec<Video> {
        self.catalog
            .videos_for_channel(channel_id)
            .map(|v| self.overlay(v))
            .collect()
    }

    pub fn live_offline_events(&self, channel_id: ChannelId) -> impl Iterator<Item = &ChannelEvent> {
        self.catalog.live_offline_events(channel_id)
    }

    fn overlay(&self, video: &Video) -> Video {
        let mut video = video.clone();
        if video.estimated_upload_time.is_none() {
            if let Some(estimate) = self.estimates.get(&video.id) {
                video.estimated_upload_time = Some(*estimate);
            }
        }
        video
    }

    /// Set a video's estimated upload time if it has none yet.
    ///
    /// Returns `false` when the video already carries an estimate.
    pub fn stage_estimated_upload_time(&mut self, video_id: VideoId, estimate: DateTime<Utc>) -> Result<bool> {
        let video = self
            .catalog
            .video(video_id)
            .ok_or(VodLinkError::UnknownVideo(video_id))?;

        if video.estimated_upload_time.is_some() || self.estimates.contains_key(&video_id) {
            return Ok(false);
        }
        self.estimates.insert(video_id, estimate);
        Ok(true)
    }

    pub fn has_active_mapping(&self, target: VideoId) -> bool {
        self.catalog.has_active_mapping(target)
            || self
                .mappings
                .iter()
                .any(|m| m.is_active() && m.target_video_id() == target)
    }

    pub fn next_mapping_id(&self) -> MappingId {
        MappingId(self.catalog.next_mapping_id().0 + self.mappings.len() as i64)
    }

    /// Stage a new mapping. A target may hold only one active mapping.
    pub fn stage_mapping(&mut self, mapping: TimestampMapping) -> Result<MappingId> {
        for video_id in [mapping.source_video_id(), mapping.target_video_id()] {
            if self.catalog.video(video_id).is_none() {
                return Err(VodLinkError::UnknownVideo(video_id));
            }
        }
        if mapping.is_active() && self.has_active_mapping(mapping.target_video_id()) {
            return Err(VodLinkError::InvalidMapping(format!(
                "video {} is already the target of an active mapping",
                mapping.target_video_id()
            )));
        }
        let id = mapping.id();
        if self.catalog.mapping(id).is_some() || self.mappings.iter().any(|m| m.id() == id) {
            return Err(VodLinkError::InvalidMapping(format!("mapping id {} is already taken", id)));
        }

        self.mappings.push(mapping);
        Ok(id)
    }

    pub fn staged_mappings(&self) -> &[TimestampMapping] {
        &self.mappings
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.estimates.is_empty() || !self.mappings.is_empty()
    }

    /// Apply every staged change to the catalog
    pub fn commit(mut self) -> CommitSummary {
        let estimates = std::mem::take(&mut self.estimates);
        let mappings = std::mem::take(&mut self.mappings);

        let mut summary = CommitSummary::default();
        for (video_id, estimate) in estimates {
            if let Some(video) = self.catalog.videos.iter_mut().find(|v| v.id == video_id) {
                if video.estimated_upload_time.is_none() {
                    video.estimated_upload_time = Some(estimate);
                    summary.estimates_applied += 1;
                }
            }
        }
        summary.mappings_added = mappings.len();
        self.catalog.mappings.extend(mappings);

        info!(
            "💾 Committed {} upload time estimates and {} mappings",
            summary.estimates_applied, summary.mappings_added
        );
        summary
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if self.has_pending_changes() {
            debug!(
                "Rolling back {} staged estimates and {} staged mappings",
                self.estimates.len(),
                self.mappings.len()
            );
        }
    }
}
