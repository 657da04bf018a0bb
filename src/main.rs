use clap::{Parser, Subcommand};
use gallery_media::assets::AssetManager;
use gallery_media::imaging::{Operation, OperationParams, RustBackend};
use gallery_media::ingest::{Ingestor, UploadedFile, mime_for_extension};
use gallery_media::storage::{AssetLayout, LocalFs};
use gallery_media::video::KeyframeExtractor;
use gallery_media::{config, output};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once; called a single time at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "gallery-media")]
#[command(about = "Media ingestion and transform pipeline for a photo and video gallery")]
#[command(long_about = "\
Media ingestion and transform pipeline for a photo and video gallery

Every asset is stored three times under the asset root:

  media/
  ├── gallery-media.toml     # Config (optional)
  ├── original/              # Working copies, edited by 'manipulate'
  ├── pristine/              # Untouched uploads, used by 'revert'
  └── thumb/                 # Thumbnails, regenerated after every edit

Video thumbnails need ffmpeg; without it videos are stored with no thumbnail.

Set RUST_LOG=debug for detailed logs.
Run 'gallery-media gen-config' to generate a documented gallery-media.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Asset root holding original/, pristine/ and thumb/
    #[arg(long, default_value = "media", global = true)]
    root: PathBuf,

    /// Directory containing gallery-media.toml (defaults to the asset root)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Numeric parameters for `manipulate`; which are required depends on the
/// operation.
#[derive(clap::Args, Clone)]
struct OperationArgs {
    #[arg(long)]
    width: Option<i64>,
    #[arg(long)]
    height: Option<i64>,
    /// Crop origin (defaults to centered)
    #[arg(long, allow_negative_numbers = true)]
    x: Option<i64>,
    #[arg(long, allow_negative_numbers = true)]
    y: Option<i64>,
    /// Resize to exactly width x height, ignoring aspect ratio
    #[arg(long)]
    stretch: bool,
    /// Rotation, counter-clockwise
    #[arg(long, allow_negative_numbers = true)]
    degrees: Option<f64>,
    /// Brightness (-255..255) or contrast (-100..100)
    #[arg(long, allow_negative_numbers = true)]
    level: Option<i32>,
    #[arg(long)]
    red: Option<i32>,
    #[arg(long)]
    green: Option<i32>,
    #[arg(long)]
    blue: Option<i32>,
    /// Overlay opacity in percent
    #[arg(long)]
    opacity: Option<f64>,
}

impl From<OperationArgs> for OperationParams {
    fn from(args: OperationArgs) -> Self {
        OperationParams {
            width: args.width,
            height: args.height,
            x: args.x,
            y: args.y,
            maintain_aspect: Some(!args.stretch),
            degrees: args.degrees,
            level: args.level,
            red: args.red,
            green: args.green,
            blue: args.blue,
            opacity: args.opacity,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Store an upload: working copy, pristine backup and thumbnail
    Ingest {
        file: PathBuf,
        /// Declared MIME type (guessed from the extension when omitted)
        #[arg(long)]
        mime: Option<String>,
        /// Name to record as the uploader's file name
        #[arg(long)]
        name: Option<String>,
    },
    /// Apply one operation to an asset's working copy
    Manipulate {
        filename: String,
        /// resize, crop, thumbnail, rotate, flip_horizontal, flip_vertical,
        /// grayscale, brightness, contrast, sharpen, color_overlay
        operation: String,
        #[command(flatten)]
        params: OperationArgs,
    },
    /// Restore an asset's working copy from its pristine backup
    Revert { filename: String },
    /// Remove all copies of an asset
    Delete { filename: String },
    /// Regenerate every image thumbnail from its working copy
    RebuildThumbs,
    /// Print duration and size of a video
    Probe { video: PathBuf },
    /// Extract one frame of a video as an image
    VideoThumb {
        video: PathBuf,
        output: PathBuf,
        /// Seconds into the video (defaults to config)
        #[arg(long)]
        at: Option<f64>,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
    },
    /// Print a stock gallery-media.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let media_config = match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(ExitCode::SUCCESS);
        }
        _ => config::load_config(cli.config_dir.as_deref().unwrap_or(cli.root.as_path()))?,
    };
    let layout = AssetLayout::new(&cli.root);
    let backend = RustBackend::new();
    let fs = LocalFs;

    match cli.command {
        Command::Ingest { file, mime, name } => {
            let upload = read_upload(&file, mime, name)?;
            let ingestor = Ingestor::new(&backend, &fs, &layout, &media_config);
            if upload.is_video() {
                let extractor = KeyframeExtractor::system(media_config.video.ffmpeg_path.clone());
                match ingestor.ingest_video(&upload, &extractor) {
                    Ok(video) => output::print_video_ingest_output(&video),
                    Err(errors) => {
                        output::print_upload_errors(&errors);
                        return Ok(ExitCode::FAILURE);
                    }
                }
            } else {
                match ingestor.ingest(&upload) {
                    Ok(meta) => output::print_ingest_output(&meta),
                    Err(errors) => {
                        output::print_upload_errors(&errors);
                        return Ok(ExitCode::FAILURE);
                    }
                }
            }
        }
        Command::Manipulate {
            filename,
            operation,
            params,
        } => {
            let operation = Operation::from_request(&operation, &params.into())?;
            let manager = AssetManager::new(&backend, &fs, &layout, &media_config);
            let result = manager.manipulate(&filename, &operation)?;
            output::print_manipulate_output(&result);
        }
        Command::Revert { filename } => {
            let manager = AssetManager::new(&backend, &fs, &layout, &media_config);
            let dims = manager.revert(&filename)?;
            output::print_revert_output(&filename, dims.as_ref());
        }
        Command::Delete { filename } => {
            let manager = AssetManager::new(&backend, &fs, &layout, &media_config);
            let report = manager.delete(&filename);
            output::print_delete_output(&report);
            if !report.success() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::RebuildThumbs => {
            init_thread_pool(&media_config.processing);
            let manager = AssetManager::new(&backend, &fs, &layout, &media_config);
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_rebuild_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let summary = manager.rebuild_thumbnails(Some(tx));
            printer.join().map_err(|_| "output thread panicked")?;
            output::print_rebuild_summary(&summary);
            if summary.failed > 0 {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Probe { video } => {
            let extractor = KeyframeExtractor::system(media_config.video.ffmpeg_path.clone());
            let probe = extractor.probe(&video);
            output::print_probe(&video, extractor.is_available(), &probe);
        }
        Command::VideoThumb {
            video,
            output: out,
            at,
            width,
            height,
        } => {
            let settings = &media_config.video;
            let extractor = KeyframeExtractor::system(settings.ffmpeg_path.clone());
            let ok = extractor.extract_thumbnail(
                &video,
                &out,
                at.unwrap_or(settings.thumbnail_at),
                width.unwrap_or(settings.thumbnail_width),
                height.or(settings.thumbnail_height),
            );
            if !ok {
                eprintln!("No keyframe extracted from {}", video.display());
                return Ok(ExitCode::FAILURE);
            }
            println!("{} \u{2192} {}", video.display(), out.display());
        }
        // Printed before the config is loaded.
        Command::GenConfig => {}
    }

    Ok(ExitCode::SUCCESS)
}

/// Read a file from disk as an upload, declaring its MIME type from
/// `--mime`, then the extension.
fn read_upload(
    file: &Path,
    mime: Option<String>,
    name: Option<String>,
) -> Result<UploadedFile, std::io::Error> {
    let bytes = std::fs::read(file)?;
    let original_name = name.unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    let extension = file
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime = mime.unwrap_or_else(|| {
        mime_for_extension(&extension)
            .unwrap_or("application/octet-stream")
            .to_string()
    });
    Ok(UploadedFile::new(original_name, mime, bytes))
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores: config can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
