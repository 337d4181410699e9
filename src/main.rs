use anyhow::{anyhow, Result};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jimeng_video_node::{
    compute_dimensions, AspectRatio, Config, DurationTier, FrameImage, GenerationRequest,
    HostContext, JimengVideoNode, Model, Resolution,
};

fn cli() -> Command {
    Command::new("Jimeng Video")
        .version(env!("CARGO_PKG_VERSION"))
        .author("TigreRoll")
        .about("Text/image to video generation through the Jimeng API")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("generate")
                .about("Generate a video and download it")
                .arg(Arg::new("prompt").short('p').long("prompt").value_name("TEXT").required(true))
                .arg(
                    Arg::new("model")
                        .short('m')
                        .long("model")
                        .value_parser(Model::ALL.map(|m| m.label()))
                        .default_value(Model::default().label()),
                )
                .arg(
                    Arg::new("aspect-ratio")
                        .short('a')
                        .long("aspect-ratio")
                        .value_parser(AspectRatio::ALL.map(|r| r.label()))
                        .default_value(AspectRatio::default().label()),
                )
                .arg(
                    Arg::new("resolution")
                        .short('r')
                        .long("resolution")
                        .value_parser(Resolution::ALL.map(|r| r.label()))
                        .default_value(Resolution::default().label()),
                )
                .arg(
                    Arg::new("duration")
                        .short('d')
                        .long("duration")
                        .value_parser(DurationTier::ALL.map(|d| d.label()))
                        .default_value(DurationTier::default().label()),
                )
                .arg(Arg::new("first-frame").long("first-frame").value_name("IMAGE"))
                .arg(Arg::new("end-frame").long("end-frame").value_name("IMAGE"))
                .arg(Arg::new("api-url").long("api-url").value_name("URL"))
                .arg(Arg::new("session").short('s').long("session").value_name("SESSION"))
                .arg(
                    Arg::new("output-dir")
                        .short('o')
                        .long("output-dir")
                        .value_name("DIR")
                        .help("Output directory for downloaded videos"),
                ),
        )
        .subcommand(
            Command::new("dimensions")
                .about("Print the pixel size for a ratio and resolution")
                .arg(Arg::new("aspect-ratio").required(true))
                .arg(Arg::new("resolution").default_value("720p")),
        )
        .subcommand(Command::new("describe").about("Print the node definition as JSON"))
}

fn load_config(matches: &ArgMatches) -> Config {
    match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(&PathBuf::from(path)).unwrap_or_else(|e| {
            eprintln!("Failed to load config {}, using defaults: {}", path, e);
            Config::from_env()
        }),
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    }
}

fn frame_arg(matches: &ArgMatches, name: &str) -> Result<Option<FrameImage>> {
    matches
        .get_one::<String>(name)
        .map(|path| {
            FrameImage::from_path(&PathBuf::from(path))
                .map_err(|e| anyhow!("Cannot load {} {}: {}", name, path, e))
        })
        .transpose()
}

fn label<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches.get_one::<String>(name).map(String::as_str).unwrap_or_default()
}

async fn generate(mut config: Config, matches: &ArgMatches) -> Result<()> {
    if let Some(dir) = matches.get_one::<String>("output-dir") {
        config.output.output_dir = PathBuf::from(dir);
    }

    let mut request = GenerationRequest::new(label(matches, "prompt"))
        .with_model(label(matches, "model").parse()?)
        .with_aspect_ratio(label(matches, "aspect-ratio").parse()?)
        .with_resolution(label(matches, "resolution").parse()?)
        .with_duration(label(matches, "duration").parse()?);

    if let Some(frame) = frame_arg(matches, "first-frame")? {
        request = request.with_first_frame(frame);
    }
    if let Some(frame) = frame_arg(matches, "end-frame")? {
        request = request.with_end_frame(frame);
    }
    if let Some(url) = matches.get_one::<String>("api-url") {
        request = request.with_api_url(url.clone());
    }
    if let Some(session) = matches.get_one::<String>("session") {
        request = request.with_manual_session(session.clone());
    }

    let host = HostContext::from_config(&config);
    let node = JimengVideoNode::new(config, host)?;
    let result = node.orchestrate(&request).await;

    println!("{}", result.info);
    if !result.is_success() {
        return Err(anyhow!("Video generation failed"));
    }

    if let Some(path) = result.video.path() {
        info!("📂 Path: {}", path.display());
    }
    println!("{}", result.video_url);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config = load_config(&matches);

    let filter = if matches.get_flag("verbose") {
        EnvFilter::new("jimeng_video_node=debug,jimeng_video=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = config.validate() {
        warn!("Configuration is invalid: {}", e);
    }

    match matches.subcommand() {
        Some(("generate", sub)) => generate(config, sub).await,
        Some(("dimensions", sub)) => {
            let ratio = AspectRatio::from_label(label(sub, "aspect-ratio"));
            let resolution = Resolution::from_label(label(sub, "resolution"));
            println!("{}", compute_dimensions(ratio, resolution));
            Ok(())
        }
        Some(("describe", _)) => {
            let host = HostContext::from_config(&config);
            let node = JimengVideoNode::new(config, host)?;
            println!("{}", serde_json::to_string_pretty(&node.definition())?);
            Ok(())
        }
        _ => Err(anyhow!("Unknown command")),
    }
}
