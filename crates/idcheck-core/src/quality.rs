//! Grayscale image statistics: brightness, contrast and Laplacian blur score.

use std::path::Path;

use image::GrayImage;
use thiserror::Error;

use crate::types::QualityMetrics;

#[derive(Error, Debug)]
pub enum QualityError {
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("image has no pixels")]
    Empty,
}

/// Decode an image file. The format is sniffed from the file contents since
/// upload names carry no reliable extension.
pub fn open_image(path: &Path) -> Result<image::DynamicImage, QualityError> {
    let decode_err = |source| QualityError::Decode {
        path: path.display().to_string(),
        source,
    };
    image::ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?
        .decode()
        .map_err(decode_err)
}

/// Decode an image file and convert it to 8-bit grayscale.
pub fn open_gray(path: &Path) -> Result<GrayImage, QualityError> {
    let gray = open_image(path)?.to_luma8();
    if gray.width() == 0 || gray.height() == 0 {
        return Err(QualityError::Empty);
    }
    Ok(gray)
}

/// Decode `path` and compute its brightness and contrast.
pub fn analyze_file(path: &Path) -> Result<QualityMetrics, QualityError> {
    let gray = open_gray(path)?;
    Ok(lighting(&gray))
}

/// Mean and population standard deviation of pixel intensity.
pub fn lighting(gray: &GrayImage) -> QualityMetrics {
    let count = (gray.width() as u64) * (gray.height() as u64);
    if count == 0 {
        return QualityMetrics {
            brightness: 0.0,
            contrast: 0.0,
        };
    }

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for p in gray.pixels() {
        let v = p.0[0] as f64;
        sum += v;
        sum_sq += v * v;
    }

    let mean = sum / count as f64;
    let variance = (sum_sq / count as f64 - mean * mean).max(0.0);

    QualityMetrics {
        brightness: mean,
        contrast: variance.sqrt(),
    }
}

/// Variance of the 3x3 Laplacian `[0,1,0; 1,-4,1; 0,1,0]` over the image
/// interior. Higher is sharper.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = (gray.width(), gray.height());
    if w < 3 || h < 3 {
        return 0.0;
    }

    let px = |x: u32, y: u32| gray.get_pixel(x, y).0[0] as f64;

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut count = 0u64;

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = px(x, y - 1) + px(x, y + 1) + px(x - 1, y) + px(x + 1, y) - 4.0 * px(x, y);
            sum += lap;
            sum_sq += lap * lap;
            count += 1;
        }
    }

    let mean = sum / count as f64;
    (sum_sq / count as f64 - mean * mean).max(0.0)
}
