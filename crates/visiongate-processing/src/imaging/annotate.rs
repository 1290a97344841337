//! Bounding box rendering for the annotated detection endpoint
//!
//! Each detection gets a class-coloured box and a filled banner reading
//! `"<class> <confidence>"`, drawn above the box when there is room and just
//! inside its top edge otherwise.

use ab_glyph::{FontRef, InvalidFont, PxScale};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use visiongate_core::{BoundingBox, Detection};

use super::decoder::DecodedImage;

pub const ANNOTATION_JPEG_QUALITY: u8 = 95;

const BOX_THICKNESS: i32 = 3;
const LABEL_SCALE: f32 = 16.0;
const LABEL_PADDING: u32 = 2;
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// DejaVu Sans, see `assets/DejaVuSans-LICENSE`.
static LABEL_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

#[derive(Debug, thiserror::Error)]
pub enum AnnotateError {
    #[error("label font could not be loaded: {0}")]
    Font(#[from] InvalidFont),

    #[error("JPEG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

const PALETTE: [[u8; 3]; 10] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
    [0, 194, 255],
    [132, 56, 255],
];

fn class_color(class_id: u32) -> Rgb<u8> {
    Rgb(PALETTE[class_id as usize % PALETTE.len()])
}

/// Clamp a box to the image and convert it to whole pixels.
fn pixel_rect(bbox: &BoundingBox, width: u32, height: u32) -> Option<Rect> {
    let max_x = width.saturating_sub(1) as f64;
    let max_y = height.saturating_sub(1) as f64;
    let x1 = bbox.x1.clamp(0.0, max_x).floor() as i32;
    let y1 = bbox.y1.clamp(0.0, max_y).floor() as i32;
    let x2 = bbox.x2.clamp(0.0, max_x).ceil() as i32;
    let y2 = bbox.y2.clamp(0.0, max_y).ceil() as i32;
    let w = (x2 - x1 + 1).max(0) as u32;
    let h = (y2 - y1 + 1).max(0) as u32;
    if w == 0 || h == 0 {
        return None;
    }
    Some(Rect::at(x1, y1).of_size(w, h))
}

fn label_font() -> Result<FontRef<'static>, InvalidFont> {
    FontRef::try_from_slice(LABEL_FONT)
}

fn label_text(detection: &Detection) -> String {
    format!("{} {:.2}", detection.class_name, detection.confidence)
}

/// Banner holding the label text for a box.
fn label_banner(font: &FontRef<'_>, rect: &Rect, text: &str) -> Rect {
    let (text_width, _) = text_size(PxScale::from(LABEL_SCALE), font, text);
    let banner_width = text_width + 2 * LABEL_PADDING;
    let banner_height = LABEL_SCALE.ceil() as u32 + 2 * LABEL_PADDING;
    let top = if rect.top() >= banner_height as i32 {
        rect.top() - banner_height as i32
    } else {
        rect.top()
    };
    Rect::at(rect.left(), top).of_size(banner_width, banner_height)
}

/// Draw one labelled box per detection and encode the result as JPEG.
pub fn annotate_jpeg(
    image: &DecodedImage,
    detections: &[Detection],
) -> Result<Vec<u8>, AnnotateError> {
    let font = label_font()?;
    let mut canvas: RgbImage = image.pixels.to_rgb8();
    let (width, height) = canvas.dimensions();

    for detection in detections {
        let Some(rect) = pixel_rect(&detection.bbox, width, height) else {
            continue;
        };
        let color = class_color(detection.class_id);

        for inset in 0..BOX_THICKNESS {
            let w = rect.width() as i32 - 2 * inset;
            let h = rect.height() as i32 - 2 * inset;
            if w <= 0 || h <= 0 {
                break;
            }
            draw_hollow_rect_mut(
                &mut canvas,
                Rect::at(rect.left() + inset, rect.top() + inset).of_size(w as u32, h as u32),
                color,
            );
        }

        let text = label_text(detection);
        let banner = label_banner(&font, &rect, &text);
        draw_filled_rect_mut(&mut canvas, banner, color);
        draw_text_mut(
            &mut canvas,
            LABEL_TEXT_COLOR,
            banner.left() + LABEL_PADDING as i32,
            banner.top() + LABEL_PADDING as i32,
            PxScale::from(LABEL_SCALE),
            &font,
            &text,
        );
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, ANNOTATION_JPEG_QUALITY).encode_image(&canvas)?;
    Ok(out)
}
