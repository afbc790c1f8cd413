use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use qrscan_core::{
    BindingFactory, DeviceDirectory, DirectoryPlatform, ImageFile, RqrrBinding, ScanEvent,
    ScanObserver, ScanRegion, ScanSession, SessionConfig, TracingObserver, pick_default,
};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "QR code scanner for images and file-backed cameras", long_about = None)]
struct Args {
    /// Path to a TOML session config
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Decode attempts per second in camera mode
    #[arg(long)]
    fps: Option<u32>,

    /// Scan box edge in pixels
    #[arg(long)]
    scan_edge: Option<u32>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode QR codes from still images
    Image {
        /// Image files to scan
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Stream a camera directory and print every new code
    Watch {
        /// Directory with one sub-directory per camera
        #[arg(long)]
        camera_root: Option<PathBuf>,

        /// Camera to use instead of the default pick
        #[arg(long)]
        device: Option<String>,

        /// Stop after this many seconds (default: until Ctrl-C)
        #[arg(long)]
        duration: Option<u64>,
    },
    /// List cameras under a camera directory
    Devices {
        /// Directory with one sub-directory per camera
        #[arg(long)]
        camera_root: Option<PathBuf>,
    },
}

/// Prints decoded payloads to stdout, everything else goes to tracing.
struct PrintObserver;

impl ScanObserver for PrintObserver {
    fn on_event(&self, event: &ScanEvent) {
        if let ScanEvent::Decoded(result) = event {
            println!("{}", result.text);
        }
        TracingObserver.on_event(event);
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    if let Err(e) = run(args).await {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let base = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    let region = args.scan_edge.map(|edge| ScanRegion {
        width: edge,
        height: edge,
    });

    match args.command {
        Command::Image { files } => {
            let config = base.merge(args.fps, region, None, None);
            scan_images(config, files).await
        }
        Command::Watch {
            camera_root,
            device,
            duration,
        } => {
            let config = base.merge(args.fps, region, camera_root, None);
            watch(config, device, duration.map(Duration::from_secs)).await
        }
        Command::Devices { camera_root } => {
            let config = base.merge(args.fps, region, camera_root, None);
            list_devices(config).await
        }
    }
}

fn camera_root(config: &SessionConfig) -> Result<PathBuf> {
    match &config.camera_root {
        Some(root) => Ok(root.clone()),
        None => bail!("no camera root given (use --camera-root or camera_root in the config)"),
    }
}

fn rqrr_factory(root: PathBuf) -> BindingFactory<RqrrBinding> {
    Box::new(move || Ok(RqrrBinding::new(root.clone())))
}

async fn scan_images(config: SessionConfig, files: Vec<PathBuf>) -> Result<()> {
    // Image mode never touches a camera, the root only has to exist for
    // camera mode.
    let root = config.camera_root.clone().unwrap_or_else(|| PathBuf::from("."));
    let session = ScanSession::with_observer(
        config,
        DirectoryPlatform::new(&root),
        rqrr_factory(root),
        Arc::new(PrintObserver),
    );

    let mut unreadable = 0;
    let mut undecoded = 0;
    for path in &files {
        let file = match ImageFile::load(path) {
            Ok(file) => file,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not read image");
                unreadable += 1;
                continue;
            }
        };
        if session.scan_image(Some(file)).await.is_err() {
            undecoded += 1;
        }
    }
    session.teardown().await;

    image_summary(unreadable, undecoded, files.len())
}

fn image_summary(unreadable: usize, undecoded: usize, total: usize) -> Result<()> {
    match (unreadable, undecoded) {
        (0, 0) => Ok(()),
        (0, n) => bail!("{n} of {total} image(s) could not be decoded"),
        (n, 0) => bail!("{n} of {total} image(s) could not be read"),
        (r, n) => bail!(
            "{r} of {total} image(s) could not be read, {n} could not be decoded"
        ),
    }
}

async fn watch(
    config: SessionConfig,
    device: Option<String>,
    duration: Option<Duration>,
) -> Result<()> {
    let root = camera_root(&config)?;
    let session = ScanSession::with_observer(
        config,
        DirectoryPlatform::new(&root),
        rqrr_factory(root),
        Arc::new(PrintObserver),
    );

    let snapshot = session.initialize().await;
    if let Some(err) = session.error() {
        session.teardown().await;
        bail!("{}", err.message);
    }
    info!(status = %snapshot.status, "Session initialized");

    if let Some(device_id) = device {
        session
            .select_device(&device_id)
            .await
            .with_context(|| format!("failed to start camera {device_id}"))?;
    }

    match duration {
        Some(duration) => tokio::time::sleep(duration).await,
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for Ctrl-C")?;
        }
    }

    info!("Stopping...");
    session.teardown().await;
    Ok(())
}

async fn list_devices(config: SessionConfig) -> Result<()> {
    let root = camera_root(&config)?;
    let directory = DeviceDirectory::new(DirectoryPlatform::new(root));
    directory.request_permission().await?;
    let devices = directory.list_cameras().await?;
    let default = pick_default(&devices).map(|d| d.id.clone());

    for (index, device) in devices.iter().enumerate() {
        let marker = if Some(&device.id) == default.as_ref() {
            "*"
        } else {
            " "
        };
        println!("{marker} {:<16} {}", device.id, device.display_label(index));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_summary_separates_unreadable_files() {
        assert!(image_summary(0, 0, 3).is_ok());
        assert_eq!(
            image_summary(0, 2, 3).unwrap_err().to_string(),
            "2 of 3 image(s) could not be decoded"
        );
        assert_eq!(
            image_summary(1, 0, 3).unwrap_err().to_string(),
            "1 of 3 image(s) could not be read"
        );
        assert_eq!(
            image_summary(1, 1, 3).unwrap_err().to_string(),
            "1 of 3 image(s) could not be read, 1 could not be decoded"
        );
    }
}
