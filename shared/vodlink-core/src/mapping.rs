//! Timestamp mapping between a source recording and an alternate recording
//!
//! A mapping stores the raw editing description (time ranges, offset and the
//! list of cuts removed from the target) and derives from it one canonical
//! table of [`Segment`]s: every contiguous stretch of source time that
//! survives in the target, together with where it lands on the target axis.
//! Both translation directions search that single table, so they are exact
//! inverses of each other on the mapped image.
//!
//! Cut intervals are half-open on the source axis: `[start, start + duration)`.
//! The instant a cut ends is the first source instant shown again in the
//! target, so it maps to the same target instant as the cut's start.

use crate::models::{MappingId, Video, VideoId};
use crate::{Result, VodLinkError};
use serde::{Deserialize, Serialize};

/// Default tolerance used when matching a cut to remove
pub const DEFAULT_CUT_TOLERANCE: f64 = 1.0;

/// An interval present in the source recording but removed from the target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cut {
    /// Start of the removed interval, in seconds on the source video's axis
    pub start: f64,
    /// Length of the removed interval in seconds
    pub duration: f64,
}

impl Cut {
    pub fn new(start: f64, duration: f64) -> Self {
        Self { start, duration }
    }

    /// End of the removed interval (exclusive)
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A contiguous piece of source time and its position in the target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub source_start: f64,
    pub source_end: f64,
    pub target_start: f64,
}

impl Segment {
    pub fn len(&self) -> f64 {
        self.source_end - self.source_start
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0.0
    }

    pub fn target_end(&self) -> f64 {
        self.target_start + self.len()
    }

    /// Half-open unless `closed`, which only the segment ending at an uncut
    /// `source_end` is.
    fn contains_source(&self, t: f64, closed: bool) -> bool {
        t >= self.source_start && (t < self.source_end || (closed && t <= self.source_end))
    }

    fn contains_target(&self, t: f64, closed: bool) -> bool {
        let end = self.target_end();
        t >= self.target_start && (t < end || (closed && t <= end))
    }
}

/// Translation between the time axes of one source/target video pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MappingRecord", into = "MappingRecord")]
pub struct TimestampMapping {
    id: MappingId,
    source_video_id: VideoId,
    target_video_id: VideoId,
    source_start_time: f64,
    source_end_time: f64,
    target_start_time: f64,
    target_end_time: f64,
    /// Target video starts this many seconds after the source
    time_offset: f64,
    /// Kept sorted ascending by `start`
    cuts: Vec<Cut>,
    active: bool,
    segments: Vec<Segment>,
    /// False when a cut covers `source_end_time`
    end_mapped: bool,
}

impl TimestampMapping {
    /// Create an active mapping with no offset and no cuts
    pub fn new(
        id: MappingId,
        source_video_id: VideoId,
        target_video_id: VideoId,
        source_range: (f64, f64),
        target_range: (f64, f64),
    ) -> Result<Self> {
        Self::from_parts(MappingRecord {
            id,
            source_video_id,
            target_video_id,
            source_start_time: source_range.0,
            source_end_time: source_range.1,
            target_start_time: target_range.0,
            target_end_time: target_range.1,
            time_offset: 0.0,
            cuts: Vec::new(),
            active: true,
        })
    }

    /// Mapping covering both videos end to end, as created by the linker
    pub fn full_length(id: MappingId, source: &Video, target: &Video) -> Result<Self> {
        for video in [source, target] {
            if !video.duration.is_finite() || video.duration < 0.0 {
                return Err(VodLinkError::InvalidDuration {
                    video: video.id,
                    duration: video.duration,
                });
            }
        }
        Self::new(id, source.id, target.id, (0.0, source.duration), (0.0, target.duration))
    }

    fn from_parts(record: MappingRecord) -> Result<Self> {
        if record.source_video_id == record.target_video_id {
            return Err(VodLinkError::InvalidMapping(format!(
                "source and target are both video {}",
                record.source_video_id
            )));
        }

        let bounds = [
            record.source_start_time,
            record.source_end_time,
            record.target_start_time,
            record.target_end_time,
            record.time_offset,
        ];
        if bounds.iter().any(|v| !v.is_finite()) {
            return Err(VodLinkError::InvalidMapping("time ranges and offset must be finite".to_string()));
        }
        if record.source_end_time < record.source_start_time {
            return Err(VodLinkError::InvalidMapping(format!(
                "source range [{}, {}] is inverted",
                record.source_start_time, record.source_end_time
            )));
        }
        if record.target_end_time < record.target_start_time {
            return Err(VodLinkError::InvalidMapping(format!(
                "target range [{}, {}] is inverted",
                record.target_start_time, record.target_end_time
            )));
        }
        for cut in &record.cuts {
            validate_cut(cut)?;
        }

        let mut mapping = Self {
            id: record.id,
            source_video_id: record.source_video_id,
            target_video_id: record.target_video_id,
            source_start_time: record.source_start_time,
            source_end_time: record.source_end_time,
            target_start_time: record.target_start_time,
            target_end_time: record.target_end_time,
            time_offset: record.time_offset,
            cuts: record.cuts,
            active: record.active,
            segments: Vec::new(),
            end_mapped: true,
        };
        mapping.sort_cuts();
        mapping.rebuild_segments();
        Ok(mapping)
    }

    pub fn id(&self) -> MappingId {
        self.id
    }

    pub fn source_video_id(&self) -> VideoId {
        self.source_video_id
    }

    pub fn target_video_id(&self) -> VideoId {
        self.target_video_id
    }

    pub fn source_range(&self) -> (f64, f64) {
        (self.source_start_time, self.source_end_time)
    }

    pub fn target_range(&self) -> (f64, f64) {
        (self.target_start_time, self.target_end_time)
    }

    pub fn time_offset(&self) -> f64 {
        self.time_offset
    }

    pub fn cuts(&self) -> &[Cut] {
        &self.cuts
    }

    /// Canonical piecewise mapping derived from ranges, offset and cuts
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Whether this mapping links `a` and `b`, in either direction
    pub fn connects(&self, a: VideoId, b: VideoId) -> bool {
        (self.source_video_id == a && self.target_video_id == b)
            || (self.source_video_id == b && self.target_video_id == a)
    }

    /// Translate a timestamp from the source video to the target video.
    ///
    /// Returns `None` when the instant lies outside the source range, inside a
    /// cut, or lands outside the target range.
    pub fn translate_source_to_target(&self, source_timestamp: f64) -> Option<f64> {
        if !(self.source_start_time..=self.source_end_time).contains(&source_timestamp) {
            return None;
        }

        let idx = self
            .segments
            .partition_point(|s| s.source_start <= source_timestamp)
            .checked_sub(1)?;
        let segment = &self.segments[idx];
        if !segment.contains_source(source_timestamp, self.closes_segment(idx)) {
            // Inside a cut: the instant does not exist in the target
            return None;
        }

        let target = segment.target_start + (source_timestamp - segment.source_start);
        if !(self.target_start_time..=self.target_end_time).contains(&target) {
            return None;
        }
        Some(target.max(0.0))
    }

    /// Translate a timestamp from the target video back to the source video.
    ///
    /// Returns `None` when the instant lies outside the target range or is not
    /// covered by any surviving piece of the source.
    pub fn translate_target_to_source(&self, target_timestamp: f64) -> Option<f64> {
        if !(self.target_start_time..=self.target_end_time).contains(&target_timestamp) {
            return None;
        }

        let idx = self
            .segments
            .partition_point(|s| s.target_start <= target_timestamp)
            .checked_sub(1)?;
        let segment = &self.segments[idx];
        if !segment.contains_target(target_timestamp, self.closes_segment(idx)) {
            return None;
        }

        let source = segment.source_start + (target_timestamp - segment.target_start);
        if !(self.source_start_time..=self.source_end_time).contains(&source) {
            return None;
        }
        Some(source)
    }

    /// Manually adjust the time offset between source and target videos
    pub fn adjust_time_offset(&mut self, new_offset: f64) -> Result<()> {
        if !new_offset.is_finite() {
            return Err(VodLinkError::InvalidMapping(format!("offset {} is not finite", new_offset)));
        }
        self.time_offset = new_offset;
        self.rebuild_segments();
        Ok(())
    }

    /// Record a removed interval. Overlapping cuts are accepted; the removed
    /// time is their union.
    pub fn add_cut(&mut self, start: f64, duration: f64) -> Result<()> {
        let cut = Cut::new(start, duration);
        validate_cut(&cut)?;
        self.cuts.push(cut);
        self.sort_cuts();
        self.rebuild_segments();
        Ok(())
    }

    /// Remove the first cut whose start and duration both match within `tolerance`
    pub fn remove_cut(&mut self, start: f64, duration: f64, tolerance: f64) -> bool {
        let found = self
            .cuts
            .iter()
            .position(|c| (c.start - start).abs() <= tolerance && (c.duration - duration).abs() <= tolerance);

        match found {
            Some(idx) => {
                self.cuts.remove(idx);
                self.rebuild_segments();
                true
            }
            None => false,
        }
    }

    /// Sum of all recorded cut durations
    pub fn get_total_cut_duration(&self) -> f64 {
        self.cuts.iter().map(|c| c.duration).sum()
    }

    /// Source time actually missing from the target (union of cuts within the source range)
    pub fn removed_duration(&self) -> f64 {
        let kept: f64 = self.segments.iter().map(Segment::len).sum();
        (self.source_end_time - self.source_start_time) - kept
    }

    fn closes_segment(&self, idx: usize) -> bool {
        self.end_mapped && idx + 1 == self.segments.len()
    }

    fn sort_cuts(&mut self) {
        self.cuts.sort_by(|a, b| a.start.total_cmp(&b.start));
    }

    fn rebuild_segments(&mut self) {
        let (lo, hi) = (self.source_start_time, self.source_end_time);

        // Merge cuts clipped to the source range into disjoint removed spans
        let mut removed: Vec<(f64, f64)> = Vec::with_capacity(self.cuts.len());
        for cut in &self.cuts {
            let start = cut.start.max(lo);
            let end = cut.end().min(hi);
            if end <= start {
                continue;
            }
            match removed.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => removed.push((start, end)),
            }
        }

        let mut segments = Vec::with_capacity(removed.len() + 1);
        let mut cursor = lo;
        let mut target_cursor = self.target_start_time - self.time_offset;
        for (start, end) in removed {
            if start > cursor {
                let segment = Segment {
                    source_start: cursor,
                    source_end: start,
                    target_start: target_cursor,
                };
                target_cursor = segment.target_end();
                segments.push(segment);
            }
            cursor = end;
        }
        // A cut running through `hi` removes it even though its span was clipped
        let end_mapped = !self.cuts.iter().any(|c| c.start <= hi && c.end() > hi);
        if cursor < hi || (cursor == hi && end_mapped) {
            segments.push(Segment {
                source_start: cursor,
                source_end: hi,
                target_start: target_cursor,
            });
        }

        self.segments = segments;
        self.end_mapped = end_mapped;
    }
}

fn validate_cut(cut: &Cut) -> Result<()> {
    if !cut.start.is_finite() {
        return Err(VodLinkError::InvalidCut(format!("start {} is not finite", cut.start)));
    }
    if !cut.duration.is_finite() || cut.duration < 0.0 {
        return Err(VodLinkError::InvalidCut(format!(
            "duration {} must be a non-negative number",
            cut.duration
        )));
    }
    Ok(())
}

/// Stored form of a mapping, without the derived segment table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingRecord {
    id: MappingId,
    source_video_id: VideoId,
    target_video_id: VideoId,
    #[serde(default)]
    source_start_time: f64,
    source_end_time: f64,
    #[serde(default)]
    target_start_time: f64,
    target_end_time: f64,
    #[serde(default)]
    time_offset: f64,
    #[serde(default)]
    cuts: Vec<Cut>,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

impl TryFrom<MappingRecord> for TimestampMapping {
    type Error = VodLinkError;

    fn try_from(record: MappingRecord) -> Result<Self> {
        Self::from_parts(record)
    }
}

impl From<TimestampMapping> for MappingRecord {
    fn from(mapping: TimestampMapping) -> Self {
        Self {
            id: mapping.id,
            source_video_id: mapping.source_video_id,
            target_video_id: mapping.target_video_id,
            source_start_time: mapping.source_start_time,
            source_end_time: mapping.source_end_time,
            target_start_time: mapping.target_start_time,
            target_end_time: mapping.target_end_time,
            time_offset: mapping.time_offset,
            cuts: mapping.cuts,
            active: mapping.active,
        }
    }
}
