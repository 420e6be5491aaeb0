// loader.rs - 后台解码全景图，并适配 GPU 纹理尺寸

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread;

use image::io::Reader as ImageReader;
use image::{GenericImage, GenericImageView, Rgba, RgbaImage};

use crate::error::ViewerError;

pub struct LoadedPanorama {
    pub path: PathBuf,
    pub image: RgbaImage,
}

pub type LoadResult = Result<LoadedPanorama, ViewerError>;

/// 在后台线程解码全景图，结果通过 [`ImageLoader::poll`] 取回。
/// 只有最近一次请求的结果会被交出，较早请求的结果晚到时直接丢弃。
pub struct ImageLoader {
    tx: Sender<(u64, LoadResult)>,
    rx: Receiver<(u64, LoadResult)>,
    latest: u64,
}

impl ImageLoader {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx, latest: 0 }
    }

    pub fn request(&mut self, path: PathBuf) {
        self.latest += 1;
        let seq = self.latest;
        let tx = self.tx.clone();
        thread::spawn(move || {
            log::info!("loading panorama {} in background (request {seq})", path.display());

            let result = decode_panorama(&path).map(|image| LoadedPanorama { path, image });
            if tx.send((seq, result)).is_err() {
                // 主循环已退出
                log::debug!("panorama finished after the viewer shut down");
            }
        });
    }

    pub fn poll(&self) -> Option<LoadResult> {
        while let Ok((seq, result)) = self.rx.try_recv() {
            if seq == self.latest {
                return Some(result);
            }
            log::debug!("dropping stale panorama result (request {seq}, latest {})", self.latest);
        }
        None
    }
}

impl Default for ImageLoader {
    fn default() -> Self {
        Self::new()
    }
}

pub fn decode_panorama(path: &Path) -> Result<RgbaImage, ViewerError> {
    let file = File::open(path).map_err(|source| ViewerError::ImageOpen {
        path: path.to_path_buf(),
        source,
    })?;

    let mut reader = ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .map_err(|source| ViewerError::ImageOpen {
            path: path.to_path_buf(),
            source,
        })?;
    reader.no_limits();

    let image = reader.decode()?;
    let (w, h) = image.dimensions();
    log::info!("decoded {} ({w}x{h})", path.display());
    Ok(image.to_rgba8())
}

/// 先缩小到 `max_dimension` 以内；若高度不足同宽 2:1 等距柱状图，则在上方补黑
pub fn fit_to_equirect(img: RgbaImage, max_dimension: u32) -> RgbaImage {
    let (src_w, src_h) = img.dimensions();

    let img = if src_w > max_dimension || src_h > max_dimension {
        let scale = (max_dimension as f32 / src_w.max(src_h) as f32).min(1.0);
        let new_w = ((src_w as f32 * scale) as u32).max(1);
        let new_h = ((src_h as f32 * scale) as u32).max(1);
        log::warn!(
            "panorama {src_w}x{src_h} exceeds GPU limit {max_dimension}, scaling to {new_w}x{new_h}"
        );
        image::imageops::resize(&img, new_w, new_h, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    // 原图贴到底部，上方补黑
    let (src_w, src_h) = img.dimensions();
    let target_h = src_w / 2;
    if target_h > 0 && src_h < target_h {
        let mut canvas = RgbaImage::from_pixel(src_w, target_h, Rgba([0, 0, 0, 255]));
        let y_offset = target_h - src_h;
        if canvas.copy_from(&img, 0, y_offset).is_err() {
            return img;
        }
        canvas
    } else {
        img
    }
}
