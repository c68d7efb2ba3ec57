use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::RgbaImage;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::CarouselError;
use crate::events::PreparedImageCpu;

// Decodes an image to RGBA8 and applies EXIF orientation if available.
// Missing or unreadable metadata keeps the stored orientation.
fn decode_rgba8_apply_exif(path: &Path) -> Result<RgbaImage, CarouselError> {
    let open_err = |source| CarouselError::Open {
        path: path.to_path_buf(),
        source,
    };
    let img = image::ImageReader::open(path)
        .map_err(open_err)?
        .with_guessed_format()
        .map_err(open_err)?
        .decode()
        .map_err(|source| CarouselError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
    let img = img.to_rgba8();

    let orientation = read_orientation(path).unwrap_or(1);
    Ok(match orientation {
        2 => image::imageops::flip_horizontal(&img),
        3 => image::imageops::rotate180(&img),
        4 => image::imageops::flip_vertical(&img),
        // transpose
        5 => image::imageops::flip_horizontal(&image::imageops::rotate90(&img)),
        6 => image::imageops::rotate90(&img),
        // transverse
        7 => image::imageops::flip_horizontal(&image::imageops::rotate270(&img)),
        8 => image::imageops::rotate270(&img),
        _ => img,
    })
}

fn read_orientation(path: &Path) -> Option<u16> {
    let file = File::open(path).ok()?;
    let mut buf = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut buf).ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let o = u16::try_from(field.value.get_uint(0)?).ok()?;
    debug!("exif orientation {} for {}", o, path.display());
    Some(o)
}

/// Largest size with the same aspect that fits in `max_dim` on both axes.
fn fit_within(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    if width <= max_dim && height <= max_dim {
        return (width, height);
    }
    let scale = max_dim as f64 / width.max(height) as f64;
    let w = ((width as f64 * scale).round() as u32).clamp(1, max_dim);
    let h = ((height as f64 * scale).round() as u32).clamp(1, max_dim);
    (w, h)
}

fn resize_rgba(
    path: &Path,
    source: &RgbaImage,
    target_w: u32,
    target_h: u32,
) -> Result<RgbaImage, CarouselError> {
    let fail = |reason: String| CarouselError::Resize {
        path: path.to_path_buf(),
        reason,
    };
    let src_view = fir::images::ImageRef::new(
        source.width(),
        source.height(),
        source.as_raw(),
        fir::PixelType::U8x4,
    )
    .map_err(|e| fail(e.to_string()))?;
    let mut dst_image = fir::images::Image::new(target_w, target_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Convolution(fir::FilterType::CatmullRom));
    fir::Resizer::new()
        .resize(&src_view, &mut dst_image, Some(&options))
        .map_err(|e| fail(e.to_string()))?;
    RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| fail("resized buffer has the wrong length".to_owned()))
}

/// Decodes one image, downscaling it when it exceeds `max_dim`.
pub fn prepare_image(path: &Path, max_dim: u32) -> Result<PreparedImageCpu, CarouselError> {
    let mut rgba = decode_rgba8_apply_exif(path)?;
    let (width, height) = rgba.dimensions();
    let (fit_w, fit_h) = fit_within(width, height, max_dim);
    if (fit_w, fit_h) != (width, height) {
        debug!(
            "downscaling {} from {}x{} to {}x{}",
            path.display(),
            width,
            height,
            fit_w,
            fit_h
        );
        rgba = resize_rgba(path, &rgba, fit_w, fit_h)?;
    }
    let (width, height) = rgba.dimensions();
    Ok(PreparedImageCpu {
        path: path.to_path_buf(),
        width,
        height,
        pixels: rgba.into_raw(),
    })
}

/// Decodes every path on the blocking pool, at most `max_in_flight` at once.
///
/// Results come back in request order. The first failure aborts the rest.
pub async fn load_all(
    paths: &[PathBuf],
    max_in_flight: usize,
    max_dim: u32,
) -> Result<Vec<PreparedImageCpu>> {
    let max_in_flight = max_in_flight.max(1);
    let mut slots: Vec<Option<PreparedImageCpu>> = vec![None; paths.len()];
    let mut tasks: JoinSet<(usize, Result<PreparedImageCpu, CarouselError>)> = JoinSet::new();
    let mut queue = paths.iter().cloned().enumerate();

    loop {
        while tasks.len() < max_in_flight {
            let Some((index, path)) = queue.next() else {
                break;
            };
            tasks.spawn_blocking(move || (index, prepare_image(&path, max_dim)));
        }
        let Some(joined) = tasks.join_next().await else {
            break;
        };
        let (index, result) = joined.context("image decode task failed")?;
        match result {
            Ok(prepared) => {
                debug!(
                    "loaded (rgba8): {} {}x{}",
                    prepared.path.display(),
                    prepared.width,
                    prepared.height
                );
                slots[index] = Some(prepared);
            }
            Err(err) => {
                tasks.abort_all();
                return Err(err.into());
            }
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.with_context(|| format!("image {} was never decoded", paths[index].display()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    // JPEG 2x1 with EXIF orientation 6 (rotate 90 CW), base64 encoded
    const ORIENT6_JPEG: &str = concat!(
        "/9j/4AAQSkZJRgABAQAAAQABAAD/4QAiRXhpZgAATU0AKgAAAAgAAQESAAMAAAABAAYAAAAAAAD/2wBDAAgGBgcGBQgHBwcJCQgKDBQNDAsLDBkSEw8UHRofHh0aHBwgJC4nICIsIxwcKDcpLDAxNDQ0Hyc5PTgyPC4zNDL/",
        "2wBDAQkJCQwLDBgNDRgyIRwhMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjIyMjL/wAARCAABAAIDASIAAhEBAxEB/8QAHwAAAQUBAQEBAQEAAAAAAAAAAAECAwQFBgcICQoL/8QAtRAAAgEDAwIEAwUFBAQAAAF9AQIDAAQRBRIhMUEGE1FhByJxFDKBkaEII0KxwRVS0fAkM2JyggkKFhcYGRolJicoKSo0NTY3ODk6Q0RFRkdISUpTVFVWV1hZWmNkZWZnaGlqc3R1dnd4eXqDhIWGh4iJipKTlJWWl5iZmqKjpKWmp6ipqrKztLW2t7i5usLDxMXGx8jJytLT1NXW19jZ2uHi4+Tl5ufo6erx8vP09fb3+Pn6/8QAHwEAAwEBAQEBAQEBAQAAAAAAAAECAwQFBgcICQoL/8QAtREAAgECBAQDBAcFBAQAAQJ3AAECAxEEBSExBhJBUQdhcRMiMoEIFEKRobHBCSMzUvAVYnLRChYkNOEl8RcYGRomJygpKjU2Nzg5OkNERUZHSElKU1RVVldYWVpjZGVmZ2hpanN0dXZ3eHl6goOEhYaHiImKkpOUlZaXmJmaoqOkpaanqKmqsrO0tba3uLm6wsPExcbHyMnK0tPU1dbX2Nna4uPk5ebn6Onq8vP09fb3+Pn6/9oADAMBAAIRAxEAPwDi6KKK+ZP3E//Z"
    );

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(w, h, image::Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn applies_orientation_six() {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(ORIENT6_JPEG)
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orient6.jpg");
        std::fs::write(&path, &bytes).unwrap();
        let img = decode_rgba8_apply_exif(&path).unwrap();
        assert_eq!(img.dimensions(), (1, 2));
    }

    #[test]
    fn fit_keeps_aspect() {
        assert_eq!(fit_within(100, 50, 200), (100, 50));
        assert_eq!(fit_within(4000, 2000, 1000), (1000, 500));
        assert_eq!(fit_within(10, 5000, 1000), (2, 1000));
    }

    #[test]
    fn oversized_images_are_downscaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "wide.png", 64, 16);
        let prepared = prepare_image(&path, 32).unwrap();
        assert_eq!((prepared.width, prepared.height), (32, 8));
        assert_eq!(prepared.pixels.len(), 32 * 8 * 4);
    }

    #[tokio::test]
    async fn load_all_keeps_request_order() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<PathBuf> = (1..=5)
            .map(|i| write_png(dir.path(), &format!("{i}.png"), i, 1))
            .collect();
        let images = load_all(&paths, 2, 4096).await.unwrap();
        let widths: Vec<u32> = images.iter().map(|img| img.width).collect();
        assert_eq!(widths, vec![1, 2, 3, 4, 5]);
        assert_eq!(images[2].path, paths[2]);
    }

    #[tokio::test]
    async fn load_all_fails_on_first_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_png(dir.path(), "good.png", 2, 2);
        let bad = dir.path().join("broken.png");
        std::fs::write(&bad, b"not an image").unwrap();
        let missing = dir.path().join("missing.png");

        let err = load_all(&[good.clone(), bad], 1, 4096).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CarouselError>(),
            Some(CarouselError::Decode { .. })
        ));
        let err = load_all(&[good, missing], 4, 4096).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CarouselError>(),
            Some(CarouselError::Open { .. })
        ));
    }
}
