//! Image annotation.
//!
//! A [`Canvas`] wraps an RGBA bitmap and accepts pointer input the way a
//! drawing widget would: `press`, `drag`, `release`. Two tools exist. The
//! pen draws round-capped segments between successive pointer positions.
//! The arrow previews while dragging and is committed on release. Every
//! release pushes an undo state.

use std::str::FromStr;

use image::{Pixel, Rgba, RgbaImage};
use tracing::trace;

use crate::config::PEN_WIDTH_RANGE;
use crate::error::{Error, Result};
use crate::images::encode_png;

/// Maximum number of undo states, including the original image.
pub const MAX_HISTORY: usize = 50;

/// Arrows shorter than this (in pixels) are not drawn.
pub const MIN_ARROW_LENGTH: f32 = 5.0;

/// Upper bound for the arrow head size in pixels.
const MAX_ARROW_HEAD: f32 = 15.0;

/// Arrow head size as a fraction of the arrow length.
const ARROW_HEAD_RATIO: f32 = 0.3;

/// Half-angle between the shaft and each side of the arrow head.
const ARROW_HEAD_ANGLE: f32 = std::f32::consts::PI / 6.0;

/// Drawing tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Freehand strokes.
    #[default]
    Pen,
    /// Straight arrows.
    Arrow,
}

/// A position on the canvas in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal position.
    pub x: f32,
    /// Vertical position.
    pub y: f32,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn distance_to(self, other: Self) -> f32 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

impl FromStr for Point {
    type Err = String;

    /// Parse `X,Y`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("expected X,Y but got '{s}'"))?;
        let x = x
            .trim()
            .parse()
            .map_err(|_| format!("invalid x coordinate in '{s}'"))?;
        let y = y
            .trim()
            .parse()
            .map_err(|_| format!("invalid y coordinate in '{s}'"))?;
        Ok(Self { x, y })
    }
}

/// Parse any CSS color into an RGBA pixel.
///
/// # Errors
///
/// Returns [`Error::InvalidColor`] if the string is not a color.
pub fn parse_color(value: &str) -> Result<Rgba<u8>> {
    let color = csscolorparser::parse(value).map_err(|_| Error::InvalidColor {
        value: value.to_string(),
    })?;
    Ok(Rgba(color.to_rgba8()))
}

/// An annotatable image with undo history.
#[derive(Debug, Clone)]
pub struct Canvas {
    image: RgbaImage,
    preview: Option<RgbaImage>,
    history: Vec<RgbaImage>,
    history_index: usize,
    tool: Tool,
    color: Rgba<u8>,
    width: u32,
    drawing: bool,
    last_point: Option<Point>,
    arrow_start: Option<Point>,
}

impl Canvas {
    /// Start annotating `image`, which becomes undo state 0.
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self {
            history: vec![image.clone()],
            image,
            preview: None,
            history_index: 0,
            tool: Tool::Pen,
            color: Rgba([255, 0, 0, 255]),
            width: 3,
            drawing: false,
            last_point: None,
            arrow_start: None,
        }
    }

    /// The active tool.
    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    /// Switch tools.
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    /// The pen color.
    #[must_use]
    pub fn color(&self) -> Rgba<u8> {
        self.color
    }

    /// Change the pen color.
    pub fn set_color(&mut self, color: Rgba<u8>) {
        self.color = color;
    }

    /// The pen width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Change the pen width, clamped to the supported range.
    pub fn set_width(&mut self, width: u32) {
        self.width = width.clamp(*PEN_WIDTH_RANGE.start(), *PEN_WIDTH_RANGE.end());
    }

    /// Begin a stroke or arrow at `point`.
    pub fn press(&mut self, point: Point) {
        self.drawing = true;
        self.last_point = Some(point);
        if self.tool == Tool::Arrow {
            self.arrow_start = Some(point);
        }
    }

    /// Move the pointer while pressed.
    pub fn drag(&mut self, point: Point) {
        if !self.drawing {
            return;
        }
        match self.tool {
            Tool::Pen => {
                if let Some(last) = self.last_point {
                    draw_line(&mut self.image, last, point, self.width, self.color);
                }
                self.last_point = Some(point);
            }
            Tool::Arrow => {
                if let Some(start) = self.arrow_start {
                    let mut preview = self.image.clone();
                    draw_arrow(&mut preview, start, point, self.width, self.color);
                    self.preview = Some(preview);
                }
            }
        }
    }

    /// Release the pointer, committing the action as a new undo state.
    pub fn release(&mut self, point: Point) {
        if !self.drawing {
            return;
        }
        self.drawing = false;
        if self.tool == Tool::Arrow {
            if let Some(start) = self.arrow_start.take() {
                draw_arrow(&mut self.image, start, point, self.width, self.color);
            }
            self.preview = None;
        }
        self.last_point = None;
        self.push_history();
    }

    /// Draw a complete pen stroke through `points`.
    pub fn draw_stroke(&mut self, points: &[Point]) {
        let Some((&first, rest)) = points.split_first() else {
            return;
        };
        let previous = self.tool;
        self.tool = Tool::Pen;
        self.press(first);
        for &point in rest {
            self.drag(point);
        }
        self.release(points[points.len() - 1]);
        self.tool = previous;
    }

    /// Draw a complete arrow from `start` to `end`.
    pub fn draw_arrow(&mut self, start: Point, end: Point) {
        let previous = self.tool;
        self.tool = Tool::Arrow;
        self.press(start);
        self.drag(end);
        self.release(end);
        self.tool = previous;
    }

    /// What should be displayed: the in-progress arrow if any, otherwise
    /// the committed image.
    #[must_use]
    pub fn preview(&self) -> &RgbaImage {
        self.preview.as_ref().unwrap_or(&self.image)
    }

    /// Step back one state. Returns `false` at the original image.
    pub fn undo(&mut self) -> bool {
        if self.history_index == 0 {
            return false;
        }
        self.history_index -= 1;
        self.image = self.history[self.history_index].clone();
        true
    }

    /// Step forward one state. Returns `false` at the newest state.
    pub fn redo(&mut self) -> bool {
        if self.history_index + 1 >= self.history.len() {
            return false;
        }
        self.history_index += 1;
        self.image = self.history[self.history_index].clone();
        true
    }

    /// Check if [`Canvas::undo`] would do anything.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history_index > 0
    }

    /// Check if [`Canvas::redo`] would do anything.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history_index + 1 < self.history.len()
    }

    /// Number of stored undo states.
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// The committed image.
    #[must_use]
    pub fn result(&self) -> &RgbaImage {
        &self.image
    }

    /// Consume the canvas, returning the committed image.
    #[must_use]
    pub fn into_result(self) -> RgbaImage {
        self.image
    }

    /// Encode the committed image as PNG.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        encode_png(&self.image)
    }

    fn push_history(&mut self) {
        self.history.truncate(self.history_index + 1);
        self.history.push(self.image.clone());
        self.history_index = self.history.len() - 1;

        if self.history.len() > MAX_HISTORY {
            self.history.remove(0);
            self.history_index -= 1;
        }
        trace!(
            states = self.history.len(),
            index = self.history_index,
            "Pushed undo state"
        );
    }
}

/// Draw a round-capped line of the given width.
fn draw_line(image: &mut RgbaImage, a: Point, b: Point, width: u32, color: Rgba<u8>) {
    #[allow(clippy::cast_precision_loss)]
    let radius = (width as f32 / 2.0).max(0.5);

    for_each_pixel_in(image, bounds(&[a, b], radius), color, |x, y| {
        distance_to_segment(Point::new(x, y), a, b) <= radius
    });
}

/// Draw an arrow: a shaft from `start` to `end` with a filled head at `end`.
///
/// Arrows shorter than [`MIN_ARROW_LENGTH`] leave the image untouched.
fn draw_arrow(image: &mut RgbaImage, start: Point, end: Point, width: u32, color: Rgba<u8>) {
    let length = start.distance_to(end);
    if length < MIN_ARROW_LENGTH {
        return;
    }

    draw_line(image, start, end, width, color);

    let head = MAX_ARROW_HEAD.min(length * ARROW_HEAD_RATIO);
    let angle = (end.y - start.y).atan2(end.x - start.x);
    let left = Point::new(
        end.x - head * (angle - ARROW_HEAD_ANGLE).cos(),
        end.y - head * (angle - ARROW_HEAD_ANGLE).sin(),
    );
    let right = Point::new(
        end.x - head * (angle + ARROW_HEAD_ANGLE).cos(),
        end.y - head * (angle + ARROW_HEAD_ANGLE).sin(),
    );

    fill_triangle(image, end, left, right, color);
    // Outline the head with the pen, as a painter would
    draw_line(image, end, left, width, color);
    draw_line(image, left, right, width, color);
    draw_line(image, right, end, width, color);
}

/// Fill the triangle `a`, `b`, `c` (edges included).
fn fill_triangle(image: &mut RgbaImage, a: Point, b: Point, c: Point, color: Rgba<u8>) {
    let area = edge(a, b, c);
    if area.abs() < f32::EPSILON {
        return;
    }

    for_each_pixel_in(image, bounds(&[a, b, c], 0.0), color, |x, y| {
        let p = Point::new(x, y);
        let w0 = edge(b, c, p);
        let w1 = edge(c, a, p);
        let w2 = edge(a, b, p);
        if area > 0.0 {
            w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0
        } else {
            w0 <= 0.0 && w1 <= 0.0 && w2 <= 0.0
        }
    });
}

/// Twice the signed area of the triangle `a`, `b`, `p`.
fn edge(a: Point, b: Point, p: Point) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

fn distance_to_segment(p: Point, a: Point, b: Point) -> f32 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq <= f32::EPSILON {
        return p.distance_to(a);
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    p.distance_to(Point::new(a.x + t * dx, a.y + t * dy))
}

/// Inclusive pixel bounds `(x0, y0, x1, y1)` of `points` grown by `pad`.
fn bounds(points: &[Point], pad: f32) -> (f32, f32, f32, f32) {
    points.iter().fold(
        (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        |(x0, y0, x1, y1), p| {
            (
                x0.min(p.x - pad),
                y0.min(p.y - pad),
                x1.max(p.x + pad),
                y1.max(p.y + pad),
            )
        },
    )
}

/// Blend `color` into every pixel of `area` for which `inside` holds.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn for_each_pixel_in(
    image: &mut RgbaImage,
    area: (f32, f32, f32, f32),
    color: Rgba<u8>,
    inside: impl Fn(f32, f32) -> bool,
) {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let (x0, y0, x1, y1) = area;
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    if x1 < 0.0 || y1 < 0.0 || x0 > max_x || y0 > max_y {
        return;
    }

    let x_start = x0.floor().clamp(0.0, max_x) as u32;
    let x_end = x1.ceil().clamp(0.0, max_x) as u32;
    let y_start = y0.floor().clamp(0.0, max_y) as u32;
    let y_end = y1.ceil().clamp(0.0, max_y) as u32;

    for y in y_start..=y_end {
        for x in x_start..=x_end {
            if inside(x as f32, y as f32) {
                image.get_pixel_mut(x, y).blend(&color);
            }
        }
    }
}
