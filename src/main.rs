use anyhow::{anyhow, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vod_linker::{load_catalog, save_catalog, Config, LinkMode, LoggingConfig, TimestampResolver, UploadTimeEstimator, VideoLinker};
use vodlink_core::mapping::DEFAULT_CUT_TOLERANCE;
use vodlink_core::{ChannelId, MappingId, VideoId, VodLinkError};

fn cli() -> Command {
    let channel = Arg::new("channel")
        .short('c')
        .long("channel")
        .value_name("ID")
        .help("Channel id")
        .value_parser(value_parser!(i64))
        .required(true);
    let mapping = Arg::new("mapping")
        .short('m')
        .long("mapping")
        .value_name("ID")
        .help("Mapping id")
        .value_parser(value_parser!(i64))
        .required(true);
    let seconds = |name: &'static str, help: &'static str| {
        Arg::new(name)
            .long(name)
            .value_name("SECONDS")
            .help(help)
            .value_parser(value_parser!(f64))
            .allow_negative_numbers(true)
    };

    Command::new("VOD Linker")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Link stream re-uploads to their broadcasts and translate timestamps between them")
        .arg(
            Arg::new("snapshot")
                .short('s')
                .long("snapshot")
                .value_name("FILE")
                .help("JSON catalog snapshot to operate on")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Configuration file (defaults to vod-linker.toml lookup)")
                .value_parser(value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .help("Run without writing changes back to the snapshot")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("estimate")
                .about("Estimate upload times from titles and live sessions")
                .arg(channel.clone()),
        )
        .subcommand(
            Command::new("link")
                .about("Link a channel's videos to its source channel's videos")
                .arg(channel)
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .help("Require both a duration and a date match")
                        .action(ArgAction::SetTrue),
                )
                .arg(seconds("margin-sec", "Allowed duration difference"))
                .arg(seconds("min-duration", "Minimum target duration for a duration match"))
                .arg(
                    Arg::new("date-margin-hours")
                        .long("date-margin-hours")
                        .value_name("HOURS")
                        .help("Allowed distance between estimated and reported upload time")
                        .value_parser(value_parser!(f64)),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Express a timestamp on one video as a timestamp on a linked video")
                .arg(
                    Arg::new("video")
                        .long("video")
                        .value_name("ID")
                        .help("Anchor video id")
                        .value_parser(value_parser!(i64))
                        .required(true),
                )
                .arg(seconds("at", "Timestamp on the anchor video").required(true))
                .arg(
                    Arg::new("target")
                        .long("target")
                        .value_name("ID")
                        .help("Desired video id")
                        .value_parser(value_parser!(i64))
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("translate")
                .about("Translate a timestamp through one mapping")
                .arg(mapping.clone())
                .arg(seconds("at", "Timestamp to translate").required(true))
                .arg(
                    Arg::new("reverse")
                        .long("reverse")
                        .help("Translate from target to source")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("add-cut")
                .about("Record an interval removed from a mapping's target")
                .arg(mapping.clone())
                .arg(seconds("start", "Cut start on the source video").required(true))
                .arg(seconds("duration", "Cut length").required(true)),
        )
        .subcommand(
            Command::new("remove-cut")
                .about("Remove a recorded cut")
                .arg(mapping)
                .arg(seconds("start", "Cut start on the source video").required(true))
                .arg(seconds("duration", "Cut length").required(true))
                .arg(seconds("tolerance", "Matching tolerance").default_value("1.0")),
        )
}

fn required<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, name: &str) -> Result<T> {
    matches
        .get_one::<T>(name)
        .cloned()
        .ok_or_else(|| anyhow!("Missing required argument --{}", name))
}

fn init_logging(config: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { config.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("vod_linker={0},vodlink_core={0},warn", level)));

    if config.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let snapshot_path: PathBuf = required(&matches, "snapshot")?;
    let dry_run = matches.get_flag("dry-run");
    let verbose = matches.get_flag("verbose");

    let config_result = match matches.get_one::<PathBuf>("config") {
        Some(path) => Config::from_file(path),
        None => Config::load(),
    };
    let (config, load_error) = match config_result {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    init_logging(&config.logging, verbose);
    if let Some(e) = load_error {
        warn!("Failed to load config, using defaults: {:#}", e);
    }
    config.validate()?;

    info!("🚀 VOD Linker starting...");
    info!("📁 Snapshot: {}", snapshot_path.display());
    if verbose {
        info!("{}", config.summary());
    }

    let mut catalog = load_catalog(&snapshot_path).await?;

    let (subcommand, args) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("No command given"))?;

    let modified = match subcommand {
        "estimate" => {
            let channel = ChannelId(required(args, "channel")?);
            let estimator = UploadTimeEstimator::new(config.estimation.clone());

            let mut uow = catalog.unit_of_work();
            let report = estimator.estimate_for_channel(&mut uow, channel)?;
            print_json(&report)?;

            let changed = uow.has_pending_changes();
            if changed && !dry_run {
                uow.commit();
            }
            changed
        }
        "link" => {
            let channel = ChannelId(required(args, "channel")?);
            let mut linking = config.linking.clone();
            if let Some(margin) = args.get_one::<f64>("margin-sec") {
                linking.margin_sec = *margin;
            }
            if let Some(min_duration) = args.get_one::<f64>("min-duration") {
                linking.min_duration = *min_duration;
            }
            if let Some(hours) = args.get_one::<f64>("date-margin-hours") {
                linking.date_margin_hours = *hours;
            }
            let mode = if args.get_flag("strict") { LinkMode::Strict } else { LinkMode::Lenient };
            let linker = VideoLinker::new(linking, config.estimation.clone());

            let mut uow = catalog.unit_of_work();
            let report = linker.link_channel(&mut uow, channel, mode)?;
            print_json(&report)?;

            let changed = uow.has_pending_changes();
            if changed && !dry_run {
                uow.commit();
            }
            changed
        }
        "resolve" => {
            let anchor = VideoId(required(args, "video")?);
            let at: f64 = required(args, "at")?;
            let target = VideoId(required(args, "target")?);

            let resolved = TimestampResolver::new(&catalog).resolve(anchor, at, target)?;
            print_json(&resolved)?;
            false
        }
        "translate" => {
            let id = MappingId(required(args, "mapping")?);
            let at: f64 = required(args, "at")?;
            let mapping = catalog.mapping(id).ok_or(VodLinkError::UnknownMapping(id))?;

            let translated = if args.get_flag("reverse") {
                mapping.translate_target_to_source(at)
            } else {
                mapping.translate_source_to_target(at)
            };
            match translated {
                Some(t) => println!("{}", t),
                None => println!("unmappable"),
            }
            false
        }
        "add-cut" => {
            let id = MappingId(required(args, "mapping")?);
            let start: f64 = required(args, "start")?;
            let duration: f64 = required(args, "duration")?;
            let mapping = catalog.mapping_mut(id).ok_or(VodLinkError::UnknownMapping(id))?;

            mapping.add_cut(start, duration)?;
            info!(
                "✂️ Added cut at {}s ({}s) to mapping {}, {} cuts total",
                start,
                duration,
                id,
                mapping.cuts().len()
            );
            true
        }
        "remove-cut" => {
            let id = MappingId(required(args, "mapping")?);
            let start: f64 = required(args, "start")?;
            let duration: f64 = required(args, "duration")?;
            let tolerance = args
                .get_one::<f64>("tolerance")
                .copied()
                .unwrap_or(DEFAULT_CUT_TOLERANCE);
            let mapping = catalog.mapping_mut(id).ok_or(VodLinkError::UnknownMapping(id))?;

            let removed = mapping.remove_cut(start, duration, tolerance);
            if removed {
                info!("Removed cut at {}s from mapping {}", start, id);
            } else {
                warn!("No cut at {}s ({}s) on mapping {}", start, duration, id);
            }
            removed
        }
        other => return Err(anyhow!("Unknown command: {}", other)),
    };

    if modified && dry_run {
        info!("🧪 Dry run: snapshot left unchanged");
    } else if modified {
        save_catalog(&catalog, &snapshot_path)
            .await
            .with_context(|| format!("Failed to save snapshot {}", snapshot_path.display()))?;
        info!("💾 Snapshot saved to {}", snapshot_path.display());
    }

    Ok(())
}
