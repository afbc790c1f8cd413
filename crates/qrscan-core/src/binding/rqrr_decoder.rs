//! rqrr-based decoder binding.
//!
//! Camera mode streams frames from a virtual camera: a directory of still
//! images under the camera root, one directory per device. Frames are
//! replayed in name order at the configured rate, cropped to the centred
//! scan region, converted to grayscale and handed to `rqrr`.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use image::{DynamicImage, GrayImage};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::traits::{BindingError, CameraConfig, DecodeHandler, DecoderBinding, ImageFile};
use crate::config::ScanRegion;

/// Supported frame file extensions.
pub const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

const NOT_FOUND: &str = "No QR code found in frame";

/// Check if a file extension is a supported frame format
pub fn is_frame_extension(ext: &str) -> bool {
    FRAME_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Live camera stream.
struct FrameStream {
    device_id: String,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Decoder binding backed by `rqrr`.
pub struct RqrrBinding {
    camera_root: PathBuf,
    stream: Mutex<Option<FrameStream>>,
}

impl RqrrBinding {
    pub fn new(camera_root: impl Into<PathBuf>) -> Self {
        Self {
            camera_root: camera_root.into(),
            stream: Mutex::new(None),
        }
    }

    fn stream(&self) -> MutexGuard<'_, Option<FrameStream>> {
        self.stream.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Device currently streaming, if any.
    pub fn active_device(&self) -> Option<String> {
        self.stream().as_ref().map(|s| s.device_id.clone())
    }
}

impl DecoderBinding for RqrrBinding {
    #[instrument(skip(self, handler), fields(root = %self.camera_root.display()))]
    async fn bind(
        &self,
        device_id: &str,
        config: &CameraConfig,
        handler: Arc<dyn DecodeHandler>,
    ) -> Result<(), BindingError> {
        if self.stream().is_some() {
            return Err(BindingError::AlreadyBound);
        }

        let device_dir = self.camera_root.join(device_id);
        let frames = tokio::task::spawn_blocking(move || list_frames(&device_dir))
            .await
            .map_err(|e| BindingError::StartFailed(e.to_string()))??;

        if frames.is_empty() {
            return Err(BindingError::StartFailed(format!(
                "camera {device_id} produced no frames"
            )));
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_frame_loop(frames, *config, handler, cancel.clone()));

        let mut stream = self.stream();
        if stream.is_some() {
            // Lost a race with another bind; tear down what we just started.
            cancel.cancel();
            return Err(BindingError::AlreadyBound);
        }
        *stream = Some(FrameStream {
            device_id: device_id.to_string(),
            cancel,
            task,
        });

        info!(device = %device_id, fps = config.fps, "Camera stream started");
        Ok(())
    }

    #[instrument(skip(self, file), fields(file = %file.name, len = file.bytes.len()))]
    async fn bind_to_image(&self, file: &ImageFile) -> Result<Option<String>, BindingError> {
        if self.stream().is_some() {
            return Err(BindingError::AlreadyBound);
        }

        let bytes = file.bytes.clone();
        let decoded = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes).map(|img| decode_image(&img, None))
        })
        .await
        .map_err(|e| BindingError::DecodeFailed(e.to_string()))?
        .map_err(|e| BindingError::DecodeFailed(e.to_string()))?;

        debug!(found = decoded.is_some(), "Image decode complete");
        Ok(decoded)
    }

    async fn release(&self) -> Result<(), BindingError> {
        let stream = self.stream().take();
        let Some(stream) = stream else {
            return Ok(());
        };

        stream.cancel.cancel();
        let result = stream.task.await;
        info!(device = %stream.device_id, "Camera stream released");

        result.map_err(|e| BindingError::ReleaseFailed(e.to_string()))
    }
}

impl Drop for RqrrBinding {
    fn drop(&mut self) {
        if let Some(stream) = self.stream().take() {
            warn!(device = %stream.device_id, "Binding dropped while streaming");
            stream.cancel.cancel();
        }
    }
}

/// List the frame files of a virtual camera, in name order.
fn list_frames(device_dir: &Path) -> Result<Vec<PathBuf>, BindingError> {
    if !device_dir.is_dir() {
        return Err(BindingError::DeviceNotFound(device_dir.display().to_string()));
    }

    let mut frames = Vec::new();
    for entry in std::fs::read_dir(device_dir)? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(is_frame_extension);
        if path.is_file() && is_frame {
            frames.push(path);
        }
    }
    frames.sort();
    Ok(frames)
}

async fn run_frame_loop(
    frames: Vec<PathBuf>,
    config: CameraConfig,
    handler: Arc<dyn DecodeHandler>,
    cancel: CancellationToken,
) {
    let period = Duration::from_secs_f64(1.0 / f64::from(config.fps.max(1)));
    let mut ticker = tokio::time::interval(period);
    let mut index = 0usize;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let path = frames[index % frames.len()].clone();
        index = index.wrapping_add(1);
        let region = config.scan_region;

        let outcome = tokio::task::spawn_blocking(move || {
            image::open(&path)
                .map(|img| decode_image(&img, region))
                .map_err(|e| format!("{}: {}", path.display(), e))
        })
        .await;

        // A frame finishing after release must not reach the handler.
        if cancel.is_cancelled() {
            break;
        }

        match outcome {
            Ok(Ok(Some(text))) => handler.on_decode(&text),
            Ok(Ok(None)) => handler.on_miss(NOT_FOUND),
            Ok(Err(message)) => handler.on_miss(&message),
            Err(e) => warn!(error = %e, "Frame decode task failed"),
        }
    }

    trace!("Frame loop stopped");
}

/// Decode the first QR code found in `img`, limited to `region`.
pub fn decode_image(img: &DynamicImage, region: Option<ScanRegion>) -> Option<String> {
    let img = match region {
        Some(region) => crop_to_region(img, region),
        None => img.clone(),
    };
    decode_luma(&img.to_luma8())
}

/// Crop to a box of the region's size centred in the image.
///
/// The box is clamped to the image bounds.
pub fn crop_to_region(img: &DynamicImage, region: ScanRegion) -> DynamicImage {
    let width = region.width.min(img.width());
    let height = region.height.min(img.height());
    let x = (img.width() - width) / 2;
    let y = (img.height() - height) / 2;
    img.crop_imm(x, y, width, height)
}

fn decode_luma(luma: &GrayImage) -> Option<String> {
    let mut prepared = ::rqrr::PreparedImage::prepare_from_greyscale(
        luma.width() as usize,
        luma.height() as usize,
        |x, y| luma.get_pixel(x as u32, y as u32)[0],
    );

    prepared
        .detect_grids()
        .into_iter()
        .find_map(|grid| match grid.decode() {
            Ok((_meta, content)) => Some(content),
            Err(e) => {
                trace!(error = ?e, "Grid found but failed to decode");
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{on_canvas, png_bytes, qr_image};
    use image::{ImageFormat, Luma, Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingHandler {
        decodes: AtomicUsize,
        misses: AtomicUsize,
    }

    impl DecodeHandler for CountingHandler {
        fn on_decode(&self, _text: &str) {
            self.decodes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_miss(&self, _message: &str) {
            self.misses.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn temp_root() -> PathBuf {
        let root = std::env::temp_dir().join(format!("qrscan-rqrr-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    fn blank_png() -> Vec<u8> {
        let img = RgbImage::from_pixel(64, 64, Rgb([255, 255, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_frame_extensions() {
        assert!(is_frame_extension("png"));
        assert!(is_frame_extension("JPG"));
        assert!(!is_frame_extension("mp4"));
        assert!(!is_frame_extension("txt"));
    }

    #[test]
    fn test_crop_to_region_centres_box() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(400, 300, Luma([0])));
        let cropped = crop_to_region(
            &img,
            ScanRegion {
                width: 250,
                height: 250,
            },
        );
        assert_eq!((cropped.width(), cropped.height()), (250, 250));
    }

    #[test]
    fn test_crop_to_region_clamps_to_image() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(100, 80, Luma([0])));
        let cropped = crop_to_region(
            &img,
            ScanRegion {
                width: 250,
                height: 250,
            },
        );
        assert_eq!((cropped.width(), cropped.height()), (100, 80));
    }

    #[test]
    fn test_blank_image_has_no_code() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, Rgb([255, 255, 255])));
        assert_eq!(decode_image(&img, None), None);
    }

    #[test]
    fn test_decodes_code_inside_scan_region() {
        let img = on_canvas(&qr_image("inside the box"), 600, 600, 213, 213);
        let region = Some(ScanRegion {
            width: 250,
            height: 250,
        });
        assert_eq!(
            decode_image(&DynamicImage::ImageLuma8(img), region).as_deref(),
            Some("inside the box")
        );
    }

    #[test]
    fn test_code_outside_scan_region_is_ignored() {
        let img = DynamicImage::ImageLuma8(on_canvas(&qr_image("corner"), 800, 800, 0, 0));
        let region = Some(ScanRegion {
            width: 250,
            height: 250,
        });
        assert_eq!(decode_image(&img, region), None);
        assert_eq!(decode_image(&img, None).as_deref(), Some("corner"));
    }

    #[tokio::test]
    async fn test_image_mode_decodes_qr() {
        let binding = RqrrBinding::new(temp_root());
        let file = ImageFile::new("code.png", png_bytes(qr_image("https://example.com/a")));
        assert_eq!(
            binding.bind_to_image(&file).await.unwrap().as_deref(),
            Some("https://example.com/a")
        );
        assert_eq!(binding.active_device(), None);
    }

    #[tokio::test]
    async fn test_camera_stream_decodes_frames() {
        let root = temp_root();
        let device = root.join("cam0");
        std::fs::create_dir_all(&device).unwrap();
        std::fs::write(device.join("0001.png"), png_bytes(qr_image("frame code"))).unwrap();
        std::fs::write(device.join("0002.png"), blank_png()).unwrap();

        #[derive(Default)]
        struct TextHandler(Mutex<Vec<String>>);

        impl DecodeHandler for TextHandler {
            fn on_decode(&self, text: &str) {
                self.0.lock().unwrap().push(text.to_string());
            }

            fn on_miss(&self, _message: &str) {}
        }

        let binding = RqrrBinding::new(&root);
        let handler = Arc::new(TextHandler::default());
        let config = CameraConfig {
            fps: 50,
            scan_region: Some(ScanRegion::default()),
        };

        binding.bind("cam0", &config, handler.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        binding.release().await.unwrap();

        let texts = handler.0.lock().unwrap().clone();
        assert!(!texts.is_empty());
        assert!(texts.iter().all(|t| t == "frame code"));
    }

    #[tokio::test]
    async fn test_image_mode_blank_returns_none() {
        let binding = RqrrBinding::new(temp_root());
        let file = ImageFile::new("blank.png", blank_png());
        assert_eq!(binding.bind_to_image(&file).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_image_mode_rejects_garbage() {
        let binding = RqrrBinding::new(temp_root());
        let file = ImageFile::new("junk.png", b"not an image".to_vec());
        assert!(matches!(
            binding.bind_to_image(&file).await,
            Err(BindingError::DecodeFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_bind_unknown_device() {
        let binding = RqrrBinding::new(temp_root());
        let handler = Arc::new(CountingHandler::default());
        let config = CameraConfig {
            fps: 10,
            scan_region: None,
        };
        assert!(matches!(
            binding.bind("missing", &config, handler).await,
            Err(BindingError::DeviceNotFound(_))
        ));
        assert_eq!(binding.active_device(), None);
    }

    #[tokio::test]
    async fn test_camera_stream_stops_on_release() {
        let root = temp_root();
        let device = root.join("cam0");
        std::fs::create_dir_all(&device).unwrap();
        std::fs::write(device.join("0001.png"), blank_png()).unwrap();

        let binding = RqrrBinding::new(&root);
        let handler = Arc::new(CountingHandler::default());
        let config = CameraConfig {
            fps: 50,
            scan_region: Some(ScanRegion {
                width: 32,
                height: 32,
            }),
        };

        binding.bind("cam0", &config, handler.clone()).await.unwrap();
        assert_eq!(binding.active_device().as_deref(), Some("cam0"));
        assert!(matches!(
            binding.bind("cam0", &config, handler.clone()).await,
            Err(BindingError::AlreadyBound)
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        binding.release().await.unwrap();

        let misses = handler.misses.load(Ordering::SeqCst);
        assert!(misses > 0);
        assert_eq!(handler.decodes.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handler.misses.load(Ordering::SeqCst), misses);

        // Release is idempotent and the binding can be reused.
        binding.release().await.unwrap();
        binding.bind("cam0", &config, handler).await.unwrap();
        binding.release().await.unwrap();
    }
}
