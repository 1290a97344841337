//! Test fixtures: encoded images generated with the `image` crate and
//! canned detector output.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use visiongate_core::{BoundingBox, Detection};

fn encode(img: RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, format)
        .expect("Failed to encode fixture");
    buf.into_inner()
}

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

/// Smooth gradient JPEG; small on disk.
pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(gradient(width, height), ImageFormat::Jpeg)
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    encode(gradient(width, height), ImageFormat::Png)
}

/// Noisy JPEG of a few tens of KiB, deterministic across runs.
pub fn noisy_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut state: u32 = 0x1234_5678;
    let img = RgbImage::from_fn(width, height, |_, _| {
        // xorshift32
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    });
    encode(img, ImageFormat::Jpeg)
}

/// Starts with the JPEG signature but is not a decodable JPEG.
pub fn truncated_jpeg() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

pub fn class_names() -> Vec<String> {
    ["person", "bicycle", "car", "dog", "cat"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn detection(class_name: &str, class_id: u32, confidence: f64) -> Detection {
    Detection {
        class_name: class_name.to_string(),
        class_id,
        confidence,
        bbox: BoundingBox {
            x1: 4.0,
            y1: 4.0,
            x2: 40.0,
            y2: 36.0,
        },
    }
}

/// Raw model output spanning the default confidence threshold.
pub fn sample_detections() -> Vec<Detection> {
    vec![
        detection("dog", 3, 0.91),
        detection("person", 0, 0.62),
        detection("cat", 4, 0.30),
        detection("car", 2, 0.12),
    ]
}
