use clap::{Parser, Subcommand};
use cropkeep::cache::ImageCache;
use cropkeep::crop::{CropSession, Gesture};
use cropkeep::imaging::{self, ImageBackend, RustBackend};
use cropkeep::store::{LocalStore, ObjectStore};
use cropkeep::types::{Offset, Size};
use cropkeep::upload::UploadPipeline;
use cropkeep::{config, output};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cropkeep")]
#[command(about = "Crop, shrink, cache and upload photo pairs")]
#[command(long_about = "\
Crop, shrink, cache and upload photo pairs

A photo is kept twice: the original and a framed crop of it. Both are
downscaled to the configured width, encoded as JPEG and stored side by side
under one identifier:

  {base}/{uuid}_original.jpg
  {base}/{uuid}_cropped.jpg

The crop command replays a pinch/pan session headlessly: the image is fitted
to cover a fixed-aspect frame inside --container, zoomed by --zoom, moved by
--pan, then clamped so the frame never shows anything outside the image.

Run 'cropkeep gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml
    #[arg(long, default_value = ".", global = true)]
    config_dir: PathBuf,

    /// Disk cache directory (overrides config)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crop an image through a headless gesture session
    Crop {
        input: PathBuf,
        output: PathBuf,
        /// Container size in points, as WIDTHxHEIGHT
        #[arg(long, value_parser = parse_size, default_value = "400x800")]
        container: Size,
        /// Pinch magnification applied after the initial fit
        #[arg(long)]
        zoom: Option<f64>,
        /// Pan translation in points, as DX,DY
        #[arg(long, value_parser = parse_offset, allow_hyphen_values = true)]
        pan: Option<Offset>,
    },
    /// Normalize, downscale and encode one image the way uploads are
    Prepare { input: PathBuf, output: PathBuf },
    /// Upload an original/cropped pair to a local object store
    Upload {
        original: PathBuf,
        cropped: PathBuf,
        /// Storage directory prefix for both variants
        #[arg(long, default_value = "")]
        base_path: String,
        /// Root directory of the local object store
        #[arg(long, default_value = "store")]
        store_dir: PathBuf,
        /// Prefix of the download URLs handed out
        #[arg(long, default_value = "file://store")]
        base_url: String,
    },
    /// Delete stored objects by their download URLs
    Delete {
        urls: Vec<String>,
        #[arg(long, default_value = "store")]
        store_dir: PathBuf,
        #[arg(long, default_value = "file://store")]
        base_url: String,
    },
    /// Inspect and manage the image cache
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Decode an image file and store it under KEY
    Put { key: String, file: PathBuf },
    /// Write the image cached under KEY to OUTPUT as JPEG
    Get { key: String, output: PathBuf },
    /// Drop KEY from both tiers
    Remove { key: String },
    /// Drop every entry from both tiers
    Clear,
    /// Print cache residency and disk usage
    Stats,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config_dir)?;
    init_thread_pool(&config.processing);
    let params = config.upload.params();
    let backend = RustBackend::new();

    match cli.command {
        Command::Crop {
            input,
            output: dest,
            container,
            zoom,
            pan,
        } => {
            let bitmap = backend.decode(&std::fs::read(&input)?)?;
            let mut session = CropSession::new(config.crop.layout());
            session.present(bitmap, container)?;
            if let Some(factor) = zoom {
                session.gesture_update(Gesture::Magnify(factor))?;
            }
            if let Some(delta) = pan {
                session.gesture_update(Gesture::Pan(delta))?;
            }
            session.end_gesture()?;
            let committed = session.commit()?;
            let bytes = imaging::compress(&committed.bitmap, params.quality)?;
            std::fs::write(&dest, &bytes)?;
            output::print_crop_result(
                &input,
                &dest,
                &committed.rect,
                committed.bitmap.upright_dimensions(),
                bytes.len(),
            );
        }
        Command::Prepare {
            input,
            output: dest,
        } => {
            let bitmap = backend.decode(&std::fs::read(&input)?)?;
            let prepared = imaging::process_for_upload(&bitmap, params.max_width);
            let bytes = imaging::compress(&prepared, params.quality)?;
            std::fs::write(&dest, &bytes)?;
            output::print_prepare_result(
                &input,
                &dest,
                bitmap.upright_dimensions(),
                prepared.upright_dimensions(),
                bytes.len(),
            );
        }
        Command::Upload {
            original,
            cropped,
            base_path,
            store_dir,
            base_url,
        } => {
            let original = backend.decode(&std::fs::read(&original)?)?;
            let cropped = backend.decode(&std::fs::read(&cropped)?)?;
            let store = LocalStore::new(store_dir, base_url).await?;
            let pipeline =
                UploadPipeline::with_backend(Arc::new(store), Arc::new(backend), params);
            let pair = pipeline.upload_pair(original, cropped, &base_path).await?;
            output::print_variant_pair(&pair)?;
        }
        Command::Delete {
            urls,
            store_dir,
            base_url,
        } => {
            let store = LocalStore::new(store_dir, base_url).await?;
            for url in &urls {
                store.delete_by_url(url).await?;
                println!("deleted {}", url);
            }
        }
        Command::Cache(command) => {
            let dir = cli
                .cache_dir
                .or_else(|| config.cache.resolve_directory())
                .ok_or("no cache directory: pass --cache-dir or set cache.directory")?;
            let limits = config.cache.limits();
            let cache = ImageCache::open(dir, limits)?;
            run_cache_command(&cache, command, &backend, limits.quality)?;
            cache.flush();
        }
        // Printed before config loading.
        Command::GenConfig => {}
    }

    Ok(())
}

fn run_cache_command(
    cache: &ImageCache,
    command: CacheCommand,
    backend: &RustBackend,
    quality: imaging::Quality,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        CacheCommand::Put { key, file } => {
            let bitmap = backend.decode(&std::fs::read(&file)?)?;
            let dims = bitmap.upright_dimensions();
            cache.put(&key, bitmap);
            println!("{} ← {} ({}x{})", key, file.display(), dims.0, dims.1);
        }
        CacheCommand::Get { key, output: dest } => match cache.get(&key) {
            Some(bitmap) => {
                let bytes = imaging::compress(&bitmap, quality)?;
                std::fs::write(&dest, bytes)?;
                output::print_cache_lookup(&key, Some((bitmap.upright_dimensions(), dest.as_path())));
            }
            None => output::print_cache_lookup(&key, None),
        },
        CacheCommand::Remove { key } => {
            cache.remove(&key);
            println!("removed {}", key);
        }
        CacheCommand::Clear => {
            cache.clear();
            println!("cleared {}", cache.directory().display());
        }
        CacheCommand::Stats => {
            output::print_cache_stats(cache.directory(), &cache.stats(), &cache.disk_usage());
        }
    }
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

/// Parse `WIDTHxHEIGHT` into a container size.
fn parse_size(s: &str) -> Result<Size, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let width: f64 = w.trim().parse().map_err(|e| format!("bad width '{w}': {e}"))?;
    let height: f64 = h.trim().parse().map_err(|e| format!("bad height '{h}': {e}"))?;
    Ok(Size::new(width, height))
}

/// Parse `DX,DY` into a pan offset.
fn parse_offset(s: &str) -> Result<Offset, String> {
    let (dx, dy) = s
        .split_once(',')
        .ok_or_else(|| format!("expected DX,DY, got '{s}'"))?;
    let dx: f64 = dx.trim().parse().map_err(|e| format!("bad dx '{dx}': {e}"))?;
    let dy: f64 = dy.trim().parse().map_err(|e| format!("bad dy '{dy}': {e}"))?;
    Ok(Offset::new(dx, dy))
}
