//! padkit - replay canvas snapshots through a headless pad painter.
//!
//! Snapshots are read as JSON files, applied in order to one canvas and the
//! resulting painter tree, pad options and outbound messages are printed.

mod headless;
mod logger;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use headless::{format_tree, HeadlessDispatcher, HeadlessHost, Outbox};
use logger::{log_section, parse_level, PadkitLogger};
use pad_model::{parse_division, PadAttributes, PadOptions};
use pad_painter::{OptionsScope, PadConfig, PadPainter, PaintContext};
use protocol::{decode_web_colors, ImageFormat, Outbound, SnapshotEntry};
use regex::Regex;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "padkit")]
#[command(about = "Replay and inspect canvas snapshots")]
struct Cli {
    /// Log level, overrides PADKIT_LOG
    #[arg(short, long)]
    log: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply snapshot files in order to one canvas and print the result
    Replay {
        /// Snapshot JSON files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Canvas width reported by the host
        #[arg(long, default_value_t = 800.0)]
        width: f32,

        /// Canvas height reported by the host
        #[arg(long, default_value_t = 600.0)]
        height: f32,

        /// Headless rendering without buttons or resize notifications
        #[arg(long)]
        batch: bool,

        /// Treat the canvas as connected and print outbound messages
        #[arg(long)]
        online: bool,

        /// Only list objects whose class or name match
        #[arg(long)]
        filter: Option<String>,

        /// Print the pad options reported to the server
        #[arg(long)]
        options: bool,

        /// Resize the canvas after the replay, e.g. 1024x768
        #[arg(long)]
        resize: Option<String>,

        /// Export the canvas after the replay
        #[arg(long, value_enum)]
        save: Option<SaveFormat>,
    },

    /// Decode a draw option string and print the resulting pad attributes
    Options {
        option: String,

        /// Apply to a canvas instead of a sub-pad
        #[arg(long)]
        canvas: bool,
    },

    /// Print the sub-pads created by a division such as 2x3
    Divide {
        division: String,

        #[arg(long, default_value = "c1")]
        name: String,
    },

    /// Decode a web colors descriptor
    Colors { oper: String },

    /// Decode an outbound message
    Message { message: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum SaveFormat {
    Png,
    Svg,
    Jpeg,
    Webp,
    Pdf,
    Json,
}

impl From<SaveFormat> for ImageFormat {
    fn from(format: SaveFormat) -> Self {
        match format {
            SaveFormat::Png => ImageFormat::Png,
            SaveFormat::Svg => ImageFormat::Svg,
            SaveFormat::Jpeg => ImageFormat::Jpeg,
            SaveFormat::Webp => ImageFormat::Webp,
            SaveFormat::Pdf => ImageFormat::Pdf,
            SaveFormat::Json => ImageFormat::Json,
        }
    }
}

struct ReplayArgs {
    files: Vec<PathBuf>,
    width: f32,
    height: f32,
    batch: bool,
    online: bool,
    filter: Option<Regex>,
    options: bool,
    resize: Option<(f32, f32)>,
    save: Option<ImageFormat>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log.or_else(|| std::env::var("PADKIT_LOG").ok()) {
        Some(name) => parse_level(&name)?,
        None => log::LevelFilter::Info,
    };
    if let Err(err) = PadkitLogger::init(level) {
        eprintln!("Logging to file disabled: {:#}", err);
    }

    match cli.command {
        Commands::Replay {
            files,
            width,
            height,
            batch,
            online,
            filter,
            options,
            resize,
            save,
        } => {
            let filter = filter
                .map(|pattern| Regex::new(&pattern))
                .transpose()
                .context("Invalid --filter pattern")?;
            let resize = resize.map(|size| parse_size(&size)).transpose()?;
            replay(ReplayArgs {
                files,
                width,
                height,
                batch,
                online,
                filter,
                options,
                resize,
                save: save.map(ImageFormat::from),
            })
        }
        Commands::Options { option, canvas } => print_options(&option, canvas),
        Commands::Divide { division, name } => print_division(&division, &name),
        Commands::Colors { oper } => print_colors(&oper),
        Commands::Message { message } => {
            let decoded = Outbound::decode(&message).context("Failed to decode message")?;
            println!("{:#?}", decoded);
            Ok(())
        }
    }
}

fn parse_size(text: &str) -> Result<(f32, f32)> {
    let (w, h) = text
        .split_once(['x', 'X'])
        .with_context(|| format!("Expected WIDTHxHEIGHT, got '{}'", text))?;
    let w = w.trim().parse::<f32>().with_context(|| format!("Invalid width in '{}'", text))?;
    let h = h.trim().parse::<f32>().with_context(|| format!("Invalid height in '{}'", text))?;
    Ok((w, h))
}

fn replay(args: ReplayArgs) -> Result<()> {
    let config = PadConfig {
        batch: args.batch,
        resize_delay: Duration::from_millis(10),
        ..PadConfig::default()
    };
    let ctx = PaintContext::new(config, Rc::new(HeadlessDispatcher));
    let host = HeadlessHost::new(args.width, args.height);
    let canvas = PadPainter::canvas(ctx.clone(), PadAttributes::canvas("c1", 0, 0), host.clone());
    let outbox = Outbox::new();
    if args.online {
        canvas.set_transport(Some(outbox.clone()));
    }
    let executor = ctx.executor().clone();

    for path in &args.files {
        log_section(&format!("Replay {}", path.display()));
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
        let snap = SnapshotEntry::from_json(&json)
            .with_context(|| format!("Failed to parse snapshot: {}", path.display()))?;
        smol::block_on(executor.run(canvas.apply_snapshot(snap)))
            .with_context(|| format!("Failed to apply snapshot: {}", path.display()))?;
    }

    if let Some((width, height)) = args.resize {
        log_section("Resize");
        let size = glam::Vec2::new(width, height);
        smol::block_on(executor.run(async {
            canvas.check_resize(Some(size), false).await;
            smol::Timer::after(Duration::from_millis(50)).await;
        }));
    }

    if let Some(format) = args.save {
        let request = canvas.save_as(format, true, None);
        log::info!("Save requested: {}", request.filename);
    }

    print!("{}", format_tree(&canvas, args.filter.as_ref()));

    if args.options {
        let options = canvas.get_web_pad_options(OptionsScope::Full);
        println!("{}", serde_json::to_string_pretty(&options)?);
    }

    for request in host.exports() {
        println!("export {} ({})", request.filename, request.format);
    }
    for message in outbox.take() {
        println!("{}", message);
    }
    Ok(())
}

fn print_options(option: &str, is_canvas: bool) -> Result<()> {
    let options = PadOptions::decode(option);
    let mut attributes = if is_canvas {
        PadAttributes::canvas("c1", 0, 0)
    } else {
        PadAttributes::new("c1_1")
    };
    options.apply(&mut attributes, is_canvas);
    println!("{:#?}", options);
    println!("{}", serde_json::to_string_pretty(&attributes)?);
    Ok(())
}

fn print_division(division: &str, name: &str) -> Result<()> {
    let (nx, ny) = parse_division(division)?;
    let parent = PadAttributes::new(name);
    let pads = parent.divide(nx, ny, 0.01);
    if pads.is_empty() {
        println!("{} is not divided", name);
    }
    for pad in pads {
        let ndc = pad.ndc();
        println!(
            "{} xlow={:.3} ylow={:.3} xup={:.3} yup={:.3}",
            pad.name,
            ndc.xlow,
            ndc.ylow,
            ndc.xup(),
            ndc.yup()
        );
    }
    Ok(())
}

fn print_colors(oper: &str) -> Result<()> {
    for entry in decode_web_colors(oper)? {
        let [r, g, b] = entry.rgb;
        match entry.alpha {
            Some(alpha) => println!("{:5} rgba({}, {}, {}, {})", entry.index, r, g, b, alpha),
            None => println!("{:5} rgb({}, {}, {})", entry.index, r, g, b),
        }
    }
    Ok(())
}
