use crate::config::EstimationConfig;
use crate::sessions::{StreamSession, StreamSessionIndex};
use crate::title_date::{date_to_instant, TitleDateParser};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vodlink_core::{ChannelId, Result, UnitOfWork, Video, VideoId, VodLinkError};

/// Added to the duration score of sessions outside the duration margin, so a
/// date-only match can still win when no session has a close duration
const DURATION_MISS_PENALTY: f64 = 1000.0;

/// Weight of the date score; date proximity dominates, duration breaks ties
const DATE_SCORE_WEIGHT: f64 = 100.0;

/// A record that could not be processed during a batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoFailure {
    pub video_id: VideoId,
    pub reason: String,
}

/// Outcome of one estimation run over a channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EstimationReport {
    pub updated_count: usize,
    pub total_processed: usize,
    pub skipped_no_date: usize,
    pub unmatched: usize,
    pub failures: Vec<VideoFailure>,
}

/// Best-scoring session for one video
#[derive(Debug, Clone, Copy)]
pub struct SessionMatch<'a> {
    pub session: &'a StreamSession,
    pub date_score: f64,
    pub duration_score: f64,
    pub combined_score: f64,
}

enum VideoEstimate<'a> {
    NoTitleDate,
    NoSession(NaiveDate),
    Matched(NaiveDate, SessionMatch<'a>),
}

/// Backfills `estimated_upload_time` by matching title dates and durations
/// against the broadcast sessions of the channel (or of its source channel)
pub struct UploadTimeEstimator {
    config: EstimationConfig,
    parser: TitleDateParser,
}

impl UploadTimeEstimator {
    pub fn new(config: EstimationConfig) -> Self {
        Self {
            config,
            parser: TitleDateParser::new(),
        }
    }

    pub fn config(&self) -> &EstimationConfig {
        &self.config
    }

    /// Estimate upload times for every video of `channel_id` that has none.
    ///
    /// Videos that already carry an estimate are not candidates, so running
    /// this twice changes nothing the second time. A failure on one video is
    /// logged and recorded; it never aborts the batch.
    pub fn estimate_for_channel(&self, uow: &mut UnitOfWork<'_>, channel_id: ChannelId) -> Result<EstimationReport> {
        let channel = uow
            .channel(channel_id)
            .ok_or(VodLinkError::UnknownChannel(channel_id))?;
        let event_channel_id = channel.event_channel_id();

        info!(
            "🔍 Estimating upload times for channel {} using live events of channel {}",
            channel_id, event_channel_id
        );

        let videos: Vec<Video> = uow
            .videos_for_channel(channel_id)
            .into_iter()
            .filter(|v| v.estimated_upload_time.is_none())
            .collect();

        let mut report = EstimationReport {
            total_processed: videos.len(),
            ..Default::default()
        };
        if videos.is_empty() {
            info!("No videos without an estimated upload time on channel {}", channel_id);
            return Ok(report);
        }

        let index = StreamSessionIndex::from_events(uow.live_offline_events(event_channel_id));
        info!(
            "📺 Found {} stream sessions for {} candidate videos",
            index.len(),
            videos.len()
        );

        for video in &videos {
            let estimate = match self.estimate_video(video, &index) {
                Ok(estimate) => estimate,
                Err(e) => {
                    warn!("Failed to estimate upload time for video {}: {}", video.id, e);
                    report.failures.push(VideoFailure {
                        video_id: video.id,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match estimate {
                VideoEstimate::NoTitleDate => {
                    debug!("No date in title of video {}", video.id);
                    report.skipped_no_date += 1;
                }
                VideoEstimate::NoSession(title_date) => {
                    debug!(
                        "No stream session within {}h of {} for video {}",
                        self.config.date_margin_hours, title_date, video.id
                    );
                    report.unmatched += 1;
                }
                VideoEstimate::Matched(title_date, found) => {
                    let started = found.session.started_at();
                    match uow.stage_estimated_upload_time(video.id, started) {
                        Ok(_) => {
                            report.updated_count += 1;
                            info!(
                                video_id = %video.id,
                                title_date = %title_date,
                                video_duration = video.duration,
                                stream_duration = found.session.duration_seconds(),
                                "✅ Estimated upload time {} for '{}'",
                                started,
                                preview(&video.title)
                            );
                        }
                        Err(e) => {
                            warn!("Failed to stage upload time for video {}: {}", video.id, e);
                            report.failures.push(VideoFailure {
                                video_id: video.id,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        info!(
            "Estimated {} of {} videos on channel {} ({} without title date, {} unmatched, {} failed)",
            report.updated_count,
            report.total_processed,
            channel_id,
            report.skipped_no_date,
            report.unmatched,
            report.failures.len()
        );
        Ok(report)
    }

    fn estimate_video<'s>(&self, video: &Video, index: &'s StreamSessionIndex) -> Result<VideoEstimate<'s>> {
        let Some(title_date) = self.parser.extract_date(&video.title) else {
            return Ok(VideoEstimate::NoTitleDate);
        };

        if !video.duration.is_finite() || video.duration < 0.0 {
            return Err(VodLinkError::InvalidDuration {
                video: video.id,
                duration: video.duration,
            });
        }

        Ok(match self.find_matching_session(title_date, video.duration, index) {
            Some(found) => VideoEstimate::Matched(title_date, found),
            None => VideoEstimate::NoSession(title_date),
        })
    }

    /// Pick the session with the lowest combined score within the date margin.
    ///
    /// `date_score` is 0 when the session started on the title's calendar day
    /// and the distance in hours otherwise. `duration_score` is the absolute
    /// duration difference, plus a fixed penalty when it exceeds the margin.
    /// Ties keep the earliest session.
    pub fn find_matching_session<'s>(
        &self,
        title_date: NaiveDate,
        video_duration: f64,
        index: &'s StreamSessionIndex,
    ) -> Option<SessionMatch<'s>> {
        let title_instant = date_to_instant(title_date);
        let mut best: Option<SessionMatch<'s>> = None;

        for session in index {
            let hours_apart = (title_instant - session.started_at()).num_seconds().abs() as f64 / 3600.0;
            if hours_apart > self.config.date_margin_hours {
                continue;
            }

            let date_score = if session.started_at().date_naive() == title_date {
                0.0
            } else {
                hours_apart
            };

            let duration_diff = (video_duration - session.duration_seconds()).abs();
            let duration_score = if duration_diff <= self.config.duration_margin_seconds {
                duration_diff
            } else {
                DURATION_MISS_PENALTY + duration_diff
            };

            let combined_score = date_score * DATE_SCORE_WEIGHT + duration_score;
            if best.map_or(true, |b| combined_score < b.combined_score) {
                debug!(
                    "Better match at {}: date_score={:.1}h, duration_score={:.1}s, combined={:.1}",
                    session.started_at(),
                    date_score,
                    duration_score,
                    combined_score
                );
                best = Some(SessionMatch {
                    session,
                    date_score,
                    duration_score,
                    combined_score,
                });
            }
        }

        best
    }
}

fn preview(title: &str) -> String {
    title.chars().take(50).collect()
}
