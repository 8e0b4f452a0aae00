//! Stroke rasterisation: [`SceneDocument`] → fixed-size PNG.
//!
//! ## Why PNG?
//! Lossless compression preserves stroke crispness. JPEG artefacts on thin
//! pen lines confuse vision models and degrade recognition accuracy.
//!
//! ## Coordinate system
//! Stroke points use a center-origin X axis: x = 0 is the middle of the
//! page. Every point is shifted by `+PAGE_WIDTH / 2` before drawing, so a
//! source x of 0 lands on column 702 of the 1404-wide canvas.

use crate::pipeline::decode::{SceneDocument, Stroke};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point as PixelPoint;
use std::io::Cursor;
use tracing::debug;

/// Page raster dimensions in pixels.
pub const PAGE_WIDTH: u32 = 1404;
pub const PAGE_HEIGHT: u32 = 1872;

/// Center-origin X shift applied to every stroke point.
pub const X_OFFSET: f32 = PAGE_WIDTH as f32 / 2.0;

/// Render threshold: a stroke needs at least two points to be drawn.
/// Deliberately distinct from
/// [`crate::pipeline::decode::STROKE_DETECT_MIN_POINTS`] (one point is
/// enough to *detect* handwriting); do not unify the two.
pub const STROKE_RENDER_MIN_POINTS: usize = 2;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GRAY: Rgb<u8> = Rgb([0x80, 0x80, 0x80]);

/// Resolve a brush palette index to a canvas colour.
///
/// The device palette has three entries; anything newer firmware may emit
/// falls back to black so the stroke stays visible.
pub fn brush_color(index: u32) -> Rgb<u8> {
    match index {
        0 => BLACK,
        1 => GRAY,
        2 => WHITE,
        _ => BLACK,
    }
}

/// Pen width in pixels for a brush thickness scale: `max(1, round(t))`.
pub fn stroke_width(thickness: f64) -> u32 {
    (thickness.round() as i64).max(1) as u32
}

/// Render the document's strokes to PNG bytes.
///
/// The output always begins with the standard PNG signature. Encoding a
/// fixed-size RGB canvas is not expected to fail on valid decoded input;
/// the error branch exists so a defect surfaces as a page failure instead
/// of a panic.
pub fn render(doc: &SceneDocument) -> Result<Vec<u8>, image::ImageError> {
    let canvas = render_canvas(doc);
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(canvas).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    debug!("Rendered {} strokes → {} PNG bytes", doc.strokes().count(), buf.len());
    Ok(buf)
}

/// Draw the document's strokes onto a blank white canvas.
///
/// Strokes draw in document order, so later strokes paint over earlier
/// ones — this is how a white "eraser" stroke works.
pub fn render_canvas(doc: &SceneDocument) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(PAGE_WIDTH, PAGE_HEIGHT, WHITE);
    for stroke in doc.strokes() {
        if stroke.points.len() < STROKE_RENDER_MIN_POINTS {
            continue;
        }
        draw_stroke(&mut canvas, stroke);
    }
    canvas
}

fn draw_stroke(canvas: &mut RgbImage, stroke: &Stroke) {
    let color = brush_color(stroke.color);
    let width = stroke_width(stroke.thickness);

    let points: Vec<(f32, f32)> = stroke
        .points
        .iter()
        .map(|p| (p.x + X_OFFSET, p.y))
        .collect();

    for pair in points.windows(2) {
        draw_segment(canvas, pair[0], pair[1], color, width);
    }

    // Round joins at interior vertices smooth the polyline; a two-point
    // stroke is a single straight segment and needs none.
    if points.len() > 2 && width > 1 {
        let radius = (width / 2) as i32;
        for &(x, y) in &points[1..points.len() - 1] {
            draw_filled_circle_mut(canvas, (x.round() as i32, y.round() as i32), radius, color);
        }
    }
}

/// Draw one segment at the given pen width.
fn draw_segment(canvas: &mut RgbImage, a: (f32, f32), b: (f32, f32), color: Rgb<u8>, width: u32) {
    if width <= 1 {
        draw_line_segment_mut(canvas, a, b, color);
        return;
    }

    let (dx, dy) = (b.0 - a.0, b.1 - a.1);
    let len = (dx * dx + dy * dy).sqrt();
    let half = width as f32 / 2.0;

    if len < f32::EPSILON {
        // Degenerate segment: draw a dot of the pen's diameter.
        draw_filled_circle_mut(
            canvas,
            (a.0.round() as i32, a.1.round() as i32),
            half as i32,
            color,
        );
        return;
    }

    // Thick segment as a quad extruded along the segment normal.
    let (nx, ny) = (-dy / len * half, dx / len * half);
    let quad = [
        PixelPoint::new((a.0 + nx).round() as i32, (a.1 + ny).round() as i32),
        PixelPoint::new((b.0 + nx).round() as i32, (b.1 + ny).round() as i32),
        PixelPoint::new((b.0 - nx).round() as i32, (b.1 - ny).round() as i32),
        PixelPoint::new((a.0 - nx).round() as i32, (a.1 - ny).round() as i32),
    ];
    if quad[0] != quad[3] || quad[1] != quad[2] {
        draw_polygon_mut(canvas, &quad, color);
    } else {
        draw_line_segment_mut(canvas, a, b, color);
    }
}
