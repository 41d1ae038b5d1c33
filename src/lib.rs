//! VOD Linker
//!
//! Links re-uploaded stream VODs to the broadcasts they came from, estimates
//! when a re-upload was originally streamed, and translates timestamps
//! between linked recordings.

pub mod config;
pub mod title_date;
pub mod sessions;
pub mod estimation;
pub mod linking;
pub mod resolution;
pub mod snapshot;

// Re-export main types for easy access
pub use crate::config::{Config, ConfigBuilder, EstimationConfig, LinkingConfig, LoggingConfig};
pub use crate::title_date::{extract_date_from_title, TitleDateParser};
pub use crate::sessions::{StreamSession, StreamSessionIndex};
pub use crate::estimation::{EstimationReport, UploadTimeEstimator, VideoFailure};
pub use crate::linking::{LinkMode, LinkReport, LinkedPair, VideoLinker};
pub use crate::resolution::{video_url, video_url_with_timestamp, ResolutionOutcome, ResolvedTimestamp, TimestampResolver};
pub use crate::snapshot::{load_catalog, save_catalog};

pub use vodlink_core::{Catalog, TimestampMapping, UnitOfWork, VodLinkError};
