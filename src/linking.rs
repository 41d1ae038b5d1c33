use crate::config::{EstimationConfig, LinkingConfig};
use crate::estimation::{EstimationReport, UploadTimeEstimator, VideoFailure};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};
use vodlink_core::{ChannelId, MappingId, Result, TimestampMapping, UnitOfWork, Video, VideoId, VodLinkError};

/// How many criteria a candidate pair must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Duration match or date match
    Lenient,
    /// Duration match and date match
    Strict,
}

impl LinkMode {
    fn accepts(self, duration_match: bool, date_match: bool) -> bool {
        match self {
            LinkMode::Lenient => duration_match || date_match,
            LinkMode::Strict => duration_match && date_match,
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkMode::Lenient => write!(f, "lenient"),
            LinkMode::Strict => write!(f, "strict"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedPair {
    pub source: VideoId,
    pub target: VideoId,
    pub mapping_id: MappingId,
}

/// Outcome of one linking run over a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkReport {
    pub mode: LinkMode,
    pub linked_count: usize,
    pub links: Vec<LinkedPair>,
    pub failures: Vec<VideoFailure>,
    /// Upload time backfill performed before matching
    pub estimation: EstimationReport,
}

impl LinkReport {
    pub fn linked_targets(&self) -> impl Iterator<Item = VideoId> + '_ {
        self.links.iter().map(|l| l.target)
    }
}

/// Links re-uploaded videos on a channel to the broadcasts of its source channel
pub struct VideoLinker {
    config: LinkingConfig,
    estimator: UploadTimeEstimator,
}

impl VideoLinker {
    pub fn new(config: LinkingConfig, estimation: EstimationConfig) -> Self {
        Self {
            config,
            estimator: UploadTimeEstimator::new(estimation),
        }
    }

    pub fn config(&self) -> &LinkingConfig {
        &self.config
    }

    /// Link every unlinked target that matches a source video on duration or date
    pub fn look_for_linked_videos(&self, uow: &mut UnitOfWork<'_>, channel_id: ChannelId) -> Result<LinkReport> {
        self.link_channel(uow, channel_id, LinkMode::Lenient)
    }

    /// Link only targets that match a source video on both duration and date
    pub fn bulk_auto_link_videos(&self, uow: &mut UnitOfWork<'_>, channel_id: ChannelId) -> Result<LinkReport> {
        self.link_channel(uow, channel_id, LinkMode::Strict)
    }

    /// Backfill upload estimates on `channel_id`, then pair its videos with
    /// those of its source channel.
    ///
    /// New mappings are staged on `uow` as they are created, so a target
    /// linked earlier in the run is skipped by every later source video.
    pub fn link_channel(&self, uow: &mut UnitOfWork<'_>, channel_id: ChannelId, mode: LinkMode) -> Result<LinkReport> {
        let channel = uow
            .channel(channel_id)
            .ok_or(VodLinkError::UnknownChannel(channel_id))?;
        let source_channel_id = channel
            .source_channel_id
            .ok_or(VodLinkError::NoSourceChannel(channel_id))?;
        if uow.channel(source_channel_id).is_none() {
            return Err(VodLinkError::UnknownChannel(source_channel_id));
        }

        info!(
            "🔗 Looking for {} links on channel {} against source channel {}",
            mode, channel_id, source_channel_id
        );

        let estimation = self.estimator.estimate_for_channel(uow, channel_id)?;

        let mut failures = Vec::new();
        let sources = usable_videos(uow.videos_for_channel(source_channel_id), &mut failures);
        let targets = usable_videos(uow.videos_for_channel(channel_id), &mut failures);

        let mut links = Vec::new();
        for source in &sources {
            for target in &targets {
                if uow.has_active_mapping(target.id) {
                    continue;
                }

                let duration_match = self.duration_match(source, target);
                let date_match = self.date_match(source, target);
                if !mode.accepts(duration_match, date_match) {
                    continue;
                }

                match self.link_pair(uow, source, target) {
                    Ok(mapping_id) => {
                        info!(
                            "✅ Linked source {} -> target {} (mapping {}, duration_match={}, date_match={})",
                            source.id, target.id, mapping_id, duration_match, date_match
                        );
                        links.push(LinkedPair {
                            source: source.id,
                            target: target.id,
                            mapping_id,
                        });
                    }
                    Err(e) => {
                        warn!("Failed to link source {} -> target {}: {}", source.id, target.id, e);
                        failures.push(VideoFailure {
                            video_id: target.id,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            "Linked {} videos on channel {} ({} mode, {} failures)",
            links.len(),
            channel_id,
            mode,
            failures.len()
        );

        Ok(LinkReport {
            mode,
            linked_count: links.len(),
            links,
            failures,
            estimation,
        })
    }

    fn link_pair(&self, uow: &mut UnitOfWork<'_>, source: &Video, target: &Video) -> Result<MappingId> {
        let mapping = TimestampMapping::full_length(uow.next_mapping_id(), source, target)?;
        uow.stage_mapping(mapping)
    }

    /// Target is long enough and within `margin_sec` of the source duration
    pub fn duration_match(&self, source: &Video, target: &Video) -> bool {
        target.duration > self.config.min_duration
            && (target.duration - source.duration).abs() <= self.config.margin_sec
    }

    /// Target's estimated upload is within `date_margin_hours` of the source upload
    pub fn date_match(&self, source: &Video, target: &Video) -> bool {
        match (target.estimated_upload_time, source.uploaded) {
            (Some(estimated), Some(uploaded)) => {
                let hours_apart = (estimated - uploaded).num_seconds().abs() as f64 / 3600.0;
                hours_apart <= self.config.date_margin_hours
            }
            _ => false,
        }
    }
}

fn usable_videos(videos: Vec<Video>, failures: &mut Vec<VideoFailure>) -> Vec<Video> {
    videos
        .into_iter()
        .filter(|video| {
            if video.duration.is_finite() && video.duration >= 0.0 {
                return true;
            }
            debug!("Skipping video {} with duration {}", video.id, video.duration);
            failures.push(VideoFailure {
                video_id: video.id,
                reason: VodLinkError::InvalidDuration {
                    video: video.id,
                    duration: video.duration,
                }
                .to_string(),
            });
            false
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::BTreeSet;
    use vodlink_core::{Catalog, Channel, ChannelEvent, Platform};

    const STREAMER: ChannelId = ChannelId(1);
    const REUPLOADS: ChannelId = ChannelId(2);

    fn at(month: u32, day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, month, day, hour, 0, 0).unwrap()
    }

    fn fixture(extra_videos: Vec<Video>) -> Catalog {
        let mut sources = vec![
            Video::new(VideoId(1), STREAMER, "tombs", 7200.0).with_uploaded(at(1, 24, 18)),
            Video::new(VideoId(2), STREAMER, "amogus", 5400.0).with_uploaded(at(1, 27, 17)),
            Video::new(VideoId(3), STREAMER, "short", 200.0).with_uploaded(at(3, 1, 12)),
        ];
        sources.extend(extra_videos);

        let targets = vec![
            // Estimated from the title, matches source 1 on both criteria
            Video::new(VideoId(10), REUPLOADS, "2025.01.24 Tombs of the Kings", 7201.0),
            // No title date, duration match with source 2 only
            Video::new(VideoId(11), REUPLOADS, "untitled upload", 5400.0),
            // Highlight reel: date match with source 2 only
            Video::new(VideoId(12), REUPLOADS, "2025.01.27 highlights", 600.0),
            // Too short to match on duration
            Video::new(VideoId(13), REUPLOADS, "clip", 200.0),
        ];

        let events = vec![
            ChannelEvent::live(STREAMER, at(1, 24, 18)),
            ChannelEvent::offline(STREAMER, at(1, 24, 18) + Duration::seconds(7200)),
            ChannelEvent::live(STREAMER, at(1, 27, 17)),
            ChannelEvent::offline(STREAMER, at(1, 27, 17) + Duration::seconds(5400)),
        ];

        Catalog::new(
            vec![
                Channel::new(STREAMER, "streamer", Platform::Twitch),
                Channel::new(REUPLOADS, "vods", Platform::Youtube).with_source_channel(STREAMER),
            ],
            [sources, targets].concat(),
            events,
            Vec::new(),
        )
    }

    fn linker() -> VideoLinker {
        VideoLinker::new(LinkingConfig::default(), EstimationConfig::default())
    }

    fn targets(report: &LinkReport) -> BTreeSet<VideoId> {
        report.linked_targets().collect()
    }

    #[test]
    fn test_lenient_links_either_criterion() {
        let mut catalog = fixture(Vec::new());
        let mut uow = catalog.unit_of_work();

        let report = linker().look_for_linked_videos(&mut uow, REUPLOADS).unwrap();
        assert_eq!(report.linked_count, 3);
        assert_eq!(report.estimation.updated_count, 2);
        assert_eq!(
            report.links,
            vec![
                LinkedPair { source: VideoId(1), target: VideoId(10), mapping_id: MappingId(1) },
                LinkedPair { source: VideoId(2), target: VideoId(11), mapping_id: MappingId(2) },
                LinkedPair { source: VideoId(2), target: VideoId(12), mapping_id: MappingId(3) },
            ]
        );

        let mapping = &uow.staged_mappings()[0];
        assert_eq!(mapping.source_range(), (0.0, 7200.0));
        assert_eq!(mapping.target_range(), (0.0, 7201.0));
        assert_eq!(mapping.time_offset(), 0.0);
        assert!(mapping.cuts().is_empty());
    }

    #[test]
    fn test_strict_requires_both_criteria() {
        let mut catalog = fixture(Vec::new());
        let mut uow = catalog.unit_of_work();

        let report = linker().bulk_auto_link_videos(&mut uow, REUPLOADS).unwrap();
        assert_eq!(report.mode, LinkMode::Strict);
        assert_eq!(targets(&report), BTreeSet::from([VideoId(10)]));
    }

    #[test]
    fn test_strict_targets_subset_of_lenient() {
        let catalogs = [
            fixture(Vec::new()),
            // Twin of source 1 competing for the same targets
            fixture(vec![Video::new(VideoId(4), STREAMER, "tombs rerun", 7200.0).with_uploaded(at(1, 24, 20))]),
            // Undated target and an undated source
            fixture(vec![
                Video::new(VideoId(5), STREAMER, "no upload time", 5400.0),
                Video::new(VideoId(14), REUPLOADS, "full stream", 7199.0),
            ]),
        ];
        let configs = [
            LinkingConfig::default(),
            LinkingConfig {
                margin_sec: 0.0,
                min_duration: 0.0,
                date_margin_hours: 1.0,
            },
            LinkingConfig {
                margin_sec: 500.0,
                min_duration: 0.0,
                date_margin_hours: 200.0,
            },
            LinkingConfig {
                margin_sec: 2.0,
                min_duration: 6000.0,
                date_margin_hours: 48.0,
            },
        ];

        for catalog in &catalogs {
            for config in &configs {
                let linker = VideoLinker::new(config.clone(), EstimationConfig::default());
                let mut lenient_catalog = catalog.clone();
                let mut strict_catalog = catalog.clone();

                let lenient = linker
                    .look_for_linked_videos(&mut lenient_catalog.unit_of_work(), REUPLOADS)
                    .unwrap();
                let strict = linker
                    .bulk_auto_link_videos(&mut strict_catalog.unit_of_work(), REUPLOADS)
                    .unwrap();

                assert!(
                    targets(&strict).is_subset(&targets(&lenient)),
                    "strict linked more than lenient with {:?}",
                    config
                );
            }
        }
    }

    #[test]
    fn test_target_never_linked_twice() {
        // A second source with the same duration and upload day as source 1
        let twin = Video::new(VideoId(4), STREAMER, "tombs rerun", 7200.0).with_uploaded(at(1, 24, 20));
        let mut catalog = fixture(vec![twin]);

        let mut uow = catalog.unit_of_work();
        let report = linker().look_for_linked_videos(&mut uow, REUPLOADS).unwrap();
        let linked: Vec<VideoId> = report.linked_targets().collect();
        assert_eq!(linked.len(), targets(&report).len());
        assert!(report.links.contains(&LinkedPair {
            source: VideoId(1),
            target: VideoId(10),
            mapping_id: MappingId(1),
        }));
        uow.commit();

        let mut uow = catalog.unit_of_work();
        let again = linker().look_for_linked_videos(&mut uow, REUPLOADS).unwrap();
        assert_eq!(again.linked_count, 0);
        assert_eq!(again.estimation.updated_count, 0);
    }

    #[test]
    fn test_missing_source_channel_is_fatal() {
        let mut catalog = fixture(Vec::new());
        let mut uow = catalog.unit_of_work();

        assert!(matches!(
            linker().look_for_linked_videos(&mut uow, STREAMER),
            Err(VodLinkError::NoSourceChannel(STREAMER))
        ));
        assert!(!uow.has_pending_changes());
    }

    #[test]
    fn test_invalid_duration_recorded_not_fatal() {
        let broken = Video::new(VideoId(5), STREAMER, "broken", f64::INFINITY);
        let mut catalog = fixture(vec![broken]);
        let mut uow = catalog.unit_of_work();

        let report = linker().look_for_linked_videos(&mut uow, REUPLOADS).unwrap();
        assert_eq!(report.linked_count, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].video_id, VideoId(5));
    }

    #[test]
    fn test_match_predicates() {
        let linker = linker();
        let source = Video::new(VideoId(1), STREAMER, "s", 1000.0).with_uploaded(at(1, 1, 0));
        let close = Video::new(VideoId(2), REUPLOADS, "t", 1002.0).with_estimated_upload_time(at(1, 3, 0));
        let far = Video::new(VideoId(3), REUPLOADS, "t", 1002.5).with_estimated_upload_time(at(1, 3, 1));

        assert!(linker.duration_match(&source, &close));
        assert!(linker.date_match(&source, &close));
        assert!(!linker.duration_match(&source, &far));
        assert!(!linker.date_match(&source, &far));

        let undated = Video::new(VideoId(4), REUPLOADS, "t", 1000.0);
        assert!(!linker.date_match(&source, &undated));
    }
}
