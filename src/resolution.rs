//! Timestamp resolution across linked videos, and playable URL building

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use vodlink_core::{Catalog, Platform, Result, Video, VideoId, VodLinkError};

/// How a resolved timestamp was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    /// Anchor and desired video are the same
    SameVideo,
    /// Translated through an active mapping
    Translated,
    /// No active mapping links the two videos; anchor returned unchanged
    NoMapping,
    /// A mapping exists but the instant is not present in the desired video;
    /// anchor returned unchanged
    Unmappable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTimestamp {
    pub video_id: VideoId,
    pub timestamp: f64,
    pub url: Option<String>,
    pub outcome: ResolutionOutcome,
}

impl ResolvedTimestamp {
    /// Whether the result points at the desired video
    pub fn is_translated(&self) -> bool {
        matches!(self.outcome, ResolutionOutcome::SameVideo | ResolutionOutcome::Translated)
    }
}

/// Read-only facade that moves a timestamp from one video to a linked one
pub struct TimestampResolver<'a> {
    catalog: &'a Catalog,
}

impl<'a> TimestampResolver<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Express `timestamp` on `anchor_video` as a timestamp on `desired_video`.
    ///
    /// Falls back to the anchor video and its own timestamp when no active
    /// mapping connects the two, or when the instant was cut from the
    /// desired video. Unknown video ids are errors.
    pub fn resolve(&self, anchor_video: VideoId, timestamp: f64, desired_video: VideoId) -> Result<ResolvedTimestamp> {
        let anchor = self.require_video(anchor_video)?;
        let desired = self.require_video(desired_video)?;

        if anchor.id == desired.id {
            return Ok(self.resolved(anchor, timestamp, ResolutionOutcome::SameVideo));
        }

        let Some(mapping) = self.catalog.find_active_mapping(anchor.id, desired.id) else {
            debug!("No active mapping between videos {} and {}", anchor.id, desired.id);
            return Ok(self.resolved(anchor, timestamp, ResolutionOutcome::NoMapping));
        };

        let translated = if mapping.source_video_id() == anchor.id {
            mapping.translate_source_to_target(timestamp)
        } else {
            mapping.translate_target_to_source(timestamp)
        };

        Ok(match translated {
            Some(t) => {
                debug!(
                    "Translated {}@{:.1}s -> {}@{:.1}s via mapping {}",
                    anchor.id,
                    timestamp,
                    desired.id,
                    t,
                    mapping.id()
                );
                self.resolved(desired, t, ResolutionOutcome::Translated)
            }
            None => {
                debug!(
                    "{}@{:.1}s has no counterpart in video {} (mapping {})",
                    anchor.id,
                    timestamp,
                    desired.id,
                    mapping.id()
                );
                self.resolved(anchor, timestamp, ResolutionOutcome::Unmappable)
            }
        })
    }

    /// Playable URL for a video at an offset, if its platform supports one
    pub fn url_for(&self, video: &Video, seconds_offset: f64) -> Option<String> {
        let platform = self.catalog.channel(video.channel_id).map(|c| c.platform)?;
        video_url_with_timestamp(platform, video, seconds_offset)
    }

    fn resolved(&self, video: &Video, timestamp: f64, outcome: ResolutionOutcome) -> ResolvedTimestamp {
        ResolvedTimestamp {
            video_id: video.id,
            timestamp,
            url: self.url_for(video, timestamp),
            outcome,
        }
    }

    fn require_video(&self, id: VideoId) -> Result<&'a Video> {
        self.catalog.video(id).ok_or(VodLinkError::UnknownVideo(id))
    }
}

/// Base watch URL of a video on its platform
pub fn video_url(platform: Platform, video: &Video) -> Option<Url> {
    if video.platform_ref.is_empty() {
        debug!("Video {} has no platform reference", video.id);
        return None;
    }

    match platform {
        Platform::Youtube => {
            let mut url = Url::parse("https://www.youtube.com/watch").ok()?;
            url.query_pairs_mut().append_pair("v", &video.platform_ref);
            Some(url)
        }
        Platform::Twitch => {
            let mut url = Url::parse("https://www.twitch.tv/videos/").ok()?;
            url.path_segments_mut().ok()?.pop_if_empty().push(&video.platform_ref);
            Some(url)
        }
        Platform::Other => {
            debug!("Could not generate url for video {} on an unknown platform", video.id);
            None
        }
    }
}

/// Watch URL positioned at `seconds_offset`, clamped into the video's length.
///
/// YouTube takes whole seconds (`&t=123s`); Twitch takes `01h02m03s`, with
/// the hours dropped below one hour.
pub fn video_url_with_timestamp(platform: Platform, video: &Video, seconds_offset: f64) -> Option<String> {
    let mut url = video_url(platform, video)?;
    let duration = if video.duration.is_finite() { video.duration.max(0.0) } else { 0.0 };
    let offset = if seconds_offset.is_finite() { seconds_offset.clamp(0.0, duration) } else { 0.0 };
    let whole = offset as u64;

    match platform {
        Platform::Youtube => {
            url.query_pairs_mut().append_pair("t", &format!("{}s", whole));
        }
        Platform::Twitch => {
            let (hours, minutes, seconds) = (whole / 3600, (whole % 3600) / 60, whole % 60);
            let stamp = if hours > 0 {
                format!("{:02}h{:02}m{:02}s", hours, minutes, seconds)
            } else {
                format!("{:02}m{:02}s", minutes, seconds)
            };
            url.query_pairs_mut().append_pair("t", &stamp);
        }
        Platform::Other => {}
    }

    Some(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vodlink_core::{Channel, ChannelId, MappingId, TimestampMapping};

    fn catalog() -> Catalog {
        let mut mapping =
            TimestampMapping::new(MappingId(1), VideoId(1), VideoId(2), (0.0, 100.0), (0.0, 90.0)).unwrap();
        mapping.add_cut(20.0, 10.0).unwrap();

        Catalog::new(
            vec![
                Channel::new(ChannelId(1), "streamer", Platform::Twitch),
                Channel::new(ChannelId(2), "vods", Platform::Youtube).with_source_channel(ChannelId(1)),
                Channel::new(ChannelId(3), "mirror", Platform::Other),
            ],
            vec![
                Video::new(VideoId(1), ChannelId(1), "broadcast", 100.0).with_platform_ref("2301"),
                Video::new(VideoId(2), ChannelId(2), "reupload", 90.0).with_platform_ref("dQw4w9WgXcQ"),
                Video::new(VideoId(3), ChannelId(2), "unrelated", 500.0).with_platform_ref("abc"),
                Video::new(VideoId(4), ChannelId(3), "mirror", 100.0).with_platform_ref("m1"),
            ],
            Vec::new(),
            vec![mapping],
        )
    }

    #[test]
    fn test_translate_source_to_target() {
        let catalog = catalog();
        let resolved = TimestampResolver::new(&catalog).resolve(VideoId(1), 50.0, VideoId(2)).unwrap();

        assert_eq!(resolved.outcome, ResolutionOutcome::Translated);
        assert_eq!(resolved.video_id, VideoId(2));
        assert_eq!(resolved.timestamp, 40.0);
        assert_eq!(resolved.url.as_deref(), Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=40s"));
    }

    #[test]
    fn test_translate_target_to_source() {
        let catalog = catalog();
        let resolved = TimestampResolver::new(&catalog).resolve(VideoId(2), 40.0, VideoId(1)).unwrap();

        assert_eq!(resolved.outcome, ResolutionOutcome::Translated);
        assert_eq!(resolved.timestamp, 50.0);
        assert_eq!(resolved.url.as_deref(), Some("https://www.twitch.tv/videos/2301?t=00m50s"));
    }

    #[test]
    fn test_cut_instant_falls_back_to_anchor() {
        let catalog = catalog();
        let resolved = TimestampResolver::new(&catalog).resolve(VideoId(1), 25.0, VideoId(2)).unwrap();

        assert_eq!(resolved.outcome, ResolutionOutcome::Unmappable);
        assert_eq!(resolved.video_id, VideoId(1));
        assert_eq!(resolved.timestamp, 25.0);
        assert!(!resolved.is_translated());
    }

    #[test]
    fn test_no_mapping_falls_back_to_anchor() {
        let catalog = catalog();
        let resolver = TimestampResolver::new(&catalog);

        let resolved = resolver.resolve(VideoId(3), 12.0, VideoId(1)).unwrap();
        assert_eq!(resolved.outcome, ResolutionOutcome::NoMapping);
        assert_eq!(resolved.video_id, VideoId(3));

        let same = resolver.resolve(VideoId(3), 12.0, VideoId(3)).unwrap();
        assert_eq!(same.outcome, ResolutionOutcome::SameVideo);
        assert!(same.is_translated());
    }

    #[test]
    fn test_inactive_mapping_ignored() {
        let mut catalog = catalog();
        catalog.mapping_mut(MappingId(1)).unwrap().set_active(false);

        let resolved = TimestampResolver::new(&catalog).resolve(VideoId(1), 50.0, VideoId(2)).unwrap();
        assert_eq!(resolved.outcome, ResolutionOutcome::NoMapping);
    }

    #[test]
    fn test_unknown_video_is_an_error() {
        let catalog = catalog();
        assert!(matches!(
            TimestampResolver::new(&catalog).resolve(VideoId(99), 0.0, VideoId(1)),
            Err(VodLinkError::UnknownVideo(VideoId(99)))
        ));
    }

    #[test]
    fn test_twitch_url_formats() {
        let video = Video::new(VideoId(1), ChannelId(1), "long", 10_000.0).with_platform_ref("42");

        assert_eq!(
            video_url_with_timestamp(Platform::Twitch, &video, 3723.9).as_deref(),
            Some("https://www.twitch.tv/videos/42?t=01h02m03s")
        );
        assert_eq!(
            video_url_with_timestamp(Platform::Twitch, &video, 59.0).as_deref(),
            Some("https://www.twitch.tv/videos/42?t=00m59s")
        );
    }

    #[test]
    fn test_offset_clamped_to_duration() {
        let video = Video::new(VideoId(1), ChannelId(1), "short", 90.0).with_platform_ref("xyz");

        assert_eq!(
            video_url_with_timestamp(Platform::Youtube, &video, 500.0).as_deref(),
            Some("https://www.youtube.com/watch?v=xyz&t=90s")
        );
        assert_eq!(
            video_url_with_timestamp(Platform::Youtube, &video, -5.0).as_deref(),
            Some("https://www.youtube.com/watch?v=xyz&t=0s")
        );
    }

    #[test]
    fn test_unsupported_platform_has_no_url() {
        let catalog = catalog();
        let mirror = catalog.video(VideoId(4)).unwrap();
        assert_eq!(TimestampResolver::new(&catalog).url_for(mirror, 10.0), None);

        let no_ref = Video::new(VideoId(5), ChannelId(1), "x", 10.0);
        assert_eq!(video_url(Platform::Twitch, &no_ref), None);
    }
}
