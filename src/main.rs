mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use reelstitch::assembly::FfmpegAssembler;
use reelstitch::config;
use reelstitch::history::{HistoryStore, SqliteHistory};
use reelstitch::ids::RequesterId;
use reelstitch::pipeline::MergePipeline;
use reelstitch::progress::{LogSink, ThrottledSink};
use reelstitch::session::CollectProgress;
use reelstitch::transport::{LocalTransport, ScanDirection, StaticSettings};
use reelstitch::trigger::MergeTrigger;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "reelstitch=trace,reelstitch_av=debug".to_string()
        } else {
            "reelstitch=info,reelstitch_av=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Merge {
            inputs,
            output,
            dest,
        } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(merge_files(&inputs, &output, &dest, cli.config.as_deref()))
        }
        Commands::Probe { file, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&file, json, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::History { requester, limit } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(show_history(requester, limit, cli.config.as_deref()))
        }
        Commands::Version => {
            println!("reelstitch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn merge_files(
    inputs: &[PathBuf],
    output: &str,
    dest: &Path,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    for input in inputs {
        if !input.exists() {
            anyhow::bail!("Input file does not exist: {:?}", input);
        }
    }

    let trigger = MergeTrigger::new(inputs.len(), output, ScanDirection::Forward)?;
    tracing::info!(
        "Merging {} segments into {}",
        inputs.len(),
        trigger.output_name
    );

    let transport = Arc::new(LocalTransport::new(
        std::env::current_dir()?,
        dest.to_path_buf(),
    ));
    let settings = Arc::new(StaticSettings::default());
    let assembler = Arc::new(FfmpegAssembler::from_config(
        &config.tools,
        &config.assembly,
    )?);
    let history = Arc::new(SqliteHistory::open(&config.history.db_path)?);
    let sink = Arc::new(ThrottledSink::new(Arc::new(LogSink), &config.progress));

    let pipeline = MergePipeline::new(
        &config,
        transport.clone(),
        settings,
        assembler,
        history,
        sink,
    );

    // The one-shot CLI is its own requester; the segments are already known,
    // so this is an accumulation-mode merge fed all at once.
    let requester = RequesterId(0);
    pipeline.begin_collect(requester, &trigger)?;

    let mut ready = false;
    for input in inputs {
        let locator = transport.locator_for(input);
        ready = matches!(
            pipeline.add_segment(requester, locator)?,
            CollectProgress::Ready
        );
    }
    debug_assert!(ready);

    let receipt = pipeline.run_ready(requester).await?;
    println!("Delivered via {} channel: {}", receipt.channel, receipt.reference);
    Ok(())
}

async fn probe_file(file: &Path, json: bool, config_path: Option<&Path>) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let config = config::load_config_or_default(config_path)?;
    let ffprobe =
        reelstitch_av::get_tool_path("ffprobe", config.tools.ffprobe_path.as_deref())?;
    let probe = reelstitch_av::probe_input(&ffprobe, file).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "path": probe.path,
                "container": probe.container,
                "duration_secs": probe.duration.map(|d| d.as_secs_f64()),
                "video_codec": probe.video_codec,
                "width": probe.width,
                "height": probe.height,
                "audio_codec": probe.audio_codec,
            })
        );
    } else {
        println!("File: {}", probe.path.display());
        println!("Container: {}", probe.container);
        if let Some(duration) = probe.duration {
            let secs = duration.as_secs();
            println!(
                "Duration: {:02}:{:02}:{:02}",
                secs / 3600,
                (secs / 60) % 60,
                secs % 60
            );
        }
        if let Some(ref codec) = probe.video_codec {
            print!("Video: {}", codec);
            if let (Some(w), Some(h)) = (probe.width, probe.height) {
                print!(" {}x{}", w, h);
            }
            println!();
        }
        if let Some(ref codec) = probe.audio_codec {
            println!("Audio: {}", codec);
        }
    }

    Ok(())
}

fn check_tools() -> Result<()> {
    println!("Checking external tools...\n");

    let tools = reelstitch_av::check_tools();
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Install them to enable assembly.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Work dir: {}", config.storage.work_dir.display());
            println!(
                "  Ceilings: direct {} / relay {} bytes",
                config.delivery.direct_ceiling_bytes, config.delivery.relay_ceiling_bytes
            );
            println!("  Assembly mode: {:?}", config.assembly.mode);
            println!("  Relay transport: {}", config.relay.enabled);
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Work dir: {}", config.storage.work_dir.display());
        }
    }

    Ok(())
}

async fn show_history(requester: i64, limit: usize, config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let history = SqliteHistory::open(&config.history.db_path)?;

    let entries = history.recent(RequesterId(requester), limit).await?;
    if entries.is_empty() {
        println!("No merges recorded for requester {}", requester);
        return Ok(());
    }

    for entry in entries {
        println!(
            "{}  {}  {} segments, {} bytes",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.output_name,
            entry.segment_count,
            entry.size_bytes
        );
    }

    Ok(())
}
