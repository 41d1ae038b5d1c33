use vodlink_core::{Catalog, ChannelId, MappingId, TimestampMapping, Video, VideoId, VodLinkError};

const SNAPSHOT: &str = r#"{
    "channels": [
        {"id": 1, "name": "streamer", "platform": "twitch"},
        {"id": 2, "name": "vods", "platform": "YouTube", "source_channel_id": 1}
    ],
    "videos": [
        {"id": 1, "channel_id": 1, "title": "broadcast", "duration": 3600.0},
        {"id": 2, "channel_id": 2, "title": "edited", "duration": 3300.0},
        {"id": 3, "channel_id": 2, "title": "mirror", "duration": 3600.0}
    ],
    "events": [
        {"channel_id": 1, "timestamp": "2025-01-24T20:00:00Z", "event_type": "offline"},
        {"channel_id": 1, "timestamp": "2025-01-24T19:00:00+01:00", "event_type": "live"}
    ],
    "mappings": [
        {"id": 4, "source_video_id": 1, "target_video_id": 2,
         "source_end_time": 3600.0, "target_end_time": 3300.0,
         "cuts": [{"start": 1800.0, "duration": 120.0}, {"start": 600.0, "duration": 180.0}]},
        {"id": 5, "source_video_id": 1, "target_video_id": 3,
         "source_end_time": 3600.0, "target_end_time": 3600.0, "active": false}
    ]
}"#;

#[test]
fn test_snapshot_ingestion() {
    let catalog = Catalog::from_json_str(SNAPSHOT).unwrap();

    assert_eq!(catalog.channels().len(), 2);
    assert_eq!(catalog.channel(ChannelId(2)).unwrap().event_channel_id(), ChannelId(1));
    assert_eq!(catalog.videos_for_channel(ChannelId(2)).count(), 2);

    // 19:00+01:00 is 18:00 UTC, which sorts before the 20:00 offline event
    let events: Vec<String> = catalog
        .live_offline_events(ChannelId(1))
        .map(|e| e.timestamp.to_rfc3339())
        .collect();
    assert_eq!(events, vec!["2025-01-24T18:00:00+00:00", "2025-01-24T20:00:00+00:00"]);

    let edited = catalog.mapping(MappingId(4)).unwrap();
    assert_eq!(edited.cuts()[0].start, 600.0);
    assert_eq!(edited.get_total_cut_duration(), 300.0);
}

#[test]
fn test_inactive_mapping_not_found() {
    let catalog = Catalog::from_json_str(SNAPSHOT).unwrap();

    assert!(catalog.find_active_mapping(VideoId(2), VideoId(1)).is_some());
    assert!(catalog.find_active_mapping(VideoId(1), VideoId(3)).is_none());
    assert!(!catalog.has_active_mapping(VideoId(3)));
    assert_eq!(catalog.next_mapping_id(), MappingId(6));
}

#[test]
fn test_replacement_mapping_for_inactive_target() {
    let mut catalog = Catalog::from_json_str(SNAPSHOT).unwrap();
    let source = catalog.video(VideoId(1)).unwrap().clone();
    let target = catalog.video(VideoId(3)).unwrap().clone();

    let mut uow = catalog.unit_of_work();
    let mapping = TimestampMapping::full_length(uow.next_mapping_id(), &source, &target).unwrap();
    assert_eq!(uow.stage_mapping(mapping).unwrap(), MappingId(6));
    let summary = uow.commit();

    assert_eq!(summary.mappings_added, 1);
    assert_eq!(catalog.mappings().len(), 3);
    assert!(catalog.has_active_mapping(VideoId(3)));
}

#[test]
fn test_translation_through_snapshot_mapping() {
    let catalog = Catalog::from_json_str(SNAPSHOT).unwrap();
    let mapping = catalog.mapping(MappingId(4)).unwrap();

    assert_eq!(mapping.translate_source_to_target(500.0), Some(500.0));
    assert_eq!(mapping.translate_source_to_target(700.0), None);
    assert_eq!(mapping.translate_source_to_target(1000.0), Some(820.0));
    assert_eq!(mapping.translate_source_to_target(1850.0), None);
    assert_eq!(mapping.translate_source_to_target(3600.0), Some(3300.0));

    for t in [0.0, 599.0, 780.0, 1799.5, 1920.0, 3600.0] {
        let target = mapping.translate_source_to_target(t).unwrap();
        assert_eq!(mapping.translate_target_to_source(target), Some(t));
    }
}

#[test]
fn test_json_round_trip_preserves_catalog() {
    let catalog = Catalog::from_json_str(SNAPSHOT).unwrap();
    let encoded = catalog.to_json_pretty().unwrap();
    let decoded = Catalog::from_json_str(&encoded).unwrap();
    assert_eq!(decoded, catalog);
}

#[test]
fn test_invalid_mapping_rejected_at_ingestion() {
    let json = r#"{"mappings": [{"id": 1, "source_video_id": 1, "target_video_id": 2,
        "source_end_time": 10.0, "target_end_time": 10.0, "cuts": [{"start": 1.0, "duration": -5.0}]}]}"#;
    assert!(Catalog::from_json_str(json).is_err());
}

#[test]
fn test_full_length_rejects_bad_duration() {
    let source = Video::new(VideoId(1), ChannelId(1), "a", 100.0);
    let target = Video::new(VideoId(2), ChannelId(2), "b", f64::NAN);

    assert!(matches!(
        TimestampMapping::full_length(MappingId(1), &source, &target),
        Err(VodLinkError::InvalidDuration { video: VideoId(2), .. })
    ));
}
