use std::io::Cursor;

use anyhow::Result;
use image::{imageops::FilterType, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_polygon_mut, Blend};
use imageproc::point::Point;

use super::ChartFont;

pub const CHART_SIZE: u32 = 400;
const SUPERSAMPLE: u32 = 4;

const BACKGROUND: Rgba<u8> = Rgba([26, 26, 26, 255]);
const BOUNDARY_OUTLINE: Rgba<u8> = Rgba([74, 74, 74, 255]);
const VALUE_FILL: Rgba<u8> = Rgba([255, 165, 0, 64]);
const VALUE_OUTLINE: Rgba<u8> = Rgba([255, 165, 0, 255]);
const LABEL_COLOR: Rgba<u8> = Rgba([200, 200, 200, 255]);

const LINE_WIDTH: f64 = 2.0;
const DOT_RADIUS: f64 = 4.0;
const INNER_RADIUS_RATIO: f64 = 0.4;
const ROTATION_DEG: f64 = 10.0;
const SKEW_X_DEG: f64 = -10.0;
const SCALE: (f64, f64) = (0.9, 0.7);

const AXES: usize = 5;
const AXIS_LABELS: [char; AXES] = ['A', 'B', 'C', 'D', 'E'];
const LABEL_HEIGHT: f64 = 14.0;
const LABEL_OFFSET: f64 = 1.15;
const LEGEND_HEIGHT: f64 = 12.0;
const LEGEND_LINE: f64 = 16.0;
const LEGEND_MARGIN: f64 = 10.0;

type ChartPoint = (f64, f64);

/// Five-axis radar chart drawn as a skewed star.
///
/// Geometry is computed at the nominal size; drawing happens on a canvas
/// `SUPERSAMPLE` times larger which is then downsampled with Lanczos3.
pub struct StarChart<'a> {
    size: u32,
    font: &'a ChartFont,
}

impl<'a> StarChart<'a> {
    pub fn new(font: &'a ChartFont) -> Self {
        Self::with_size(CHART_SIZE, font)
    }

    pub fn with_size(size: u32, font: &'a ChartFont) -> Self {
        Self { size, font }
    }

    pub fn center(&self) -> f64 {
        f64::from(self.size) / 2.0
    }

    pub fn max_radius(&self) -> f64 {
        f64::from(self.size) * 0.35
    }

    pub fn min_radius(&self) -> f64 {
        f64::from(self.size) * 0.15
    }

    /// Grows with the mean value; `None` when there is nothing to chart.
    pub fn base_radius(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let average = values.iter().sum::<f64>() / values.len() as f64;
        Some(self.min_radius() + (self.max_radius() - self.min_radius()) * average * 0.5)
    }

    /// Alternating outer/inner vertices of a regular star, untransformed.
    pub fn star_points(&self, radius: f64) -> Vec<ChartPoint> {
        let inner_radius = radius * INNER_RADIUS_RATIO;
        (0..AXES)
            .flat_map(|i| {
                [
                    self.polar(radius, outer_angle(i)),
                    self.polar(inner_radius, outer_angle(i) + 36f64.to_radians()),
                ]
            })
            .collect()
    }

    /// Alternating outer/inner vertices of the value star, untransformed.
    /// One outer vertex per value, so fewer than five values give a partial star.
    pub fn value_points(&self, values: &[f64]) -> Vec<ChartPoint> {
        let Some(base_radius) = self.base_radius(values) else {
            return Vec::new();
        };
        let inner_radius = base_radius * INNER_RADIUS_RATIO;
        let max_radius = self.max_radius();

        values.iter()
            .take(AXES)
            .enumerate()
            .flat_map(|(i, value)| {
                let radius = base_radius + (max_radius - base_radius) * value;
                [
                    self.polar(radius, outer_angle(i)),
                    self.polar(inner_radius, outer_angle(i) + 36f64.to_radians()),
                ]
            })
            .collect()
    }

    /// Rotate, shear along x, then scale, all about the image center.
    pub fn apply_transform(&self, points: &[ChartPoint]) -> Vec<ChartPoint> {
        let center = self.center();
        let (sin, cos) = ROTATION_DEG.to_radians().sin_cos();
        let skew = SKEW_X_DEG.to_radians().tan();

        points.iter()
            .map(|&(x, y)| {
                let (x, y) = (x - center, y - center);
                let (x, y) = (x * cos - y * sin, x * sin + y * cos);
                let x = x + y * skew;
                (x * SCALE.0 + center, y * SCALE.1 + center)
            })
            .collect()
    }

    /// Renders `(label, value)` pairs, values in 0.0..=1.0, into PNG bytes.
    pub fn render(&self, attributes: &[(String, f64)]) -> Result<Vec<u8>> {
        let attributes: Vec<(&str, f64)> = attributes.iter()
            .take(AXES)
            .map(|(name, value)| (name.as_str(), value.clamp(0.0, 1.0)))
            .collect();
        let values: Vec<f64> = attributes.iter().map(|(_, v)| *v).collect();

        let boundary = self.apply_transform(&self.star_points(self.max_radius()));
        let value_star = self.apply_transform(&self.value_points(&values));

        let ss = f64::from(SUPERSAMPLE);
        let scaled = |points: &[ChartPoint]| -> Vec<ChartPoint> {
            points.iter().map(|&(x, y)| (x * ss, y * ss)).collect()
        };

        let canvas_size = self.size * SUPERSAMPLE;
        let mut canvas = Blend(RgbaImage::from_pixel(canvas_size, canvas_size, BACKGROUND));

        draw_closed_outline(&mut canvas, &scaled(&boundary), LINE_WIDTH * ss, BOUNDARY_OUTLINE);

        if !value_star.is_empty() {
            let value_star = scaled(&value_star);
            if value_star.len() >= 3 {
                fill_polygon(&mut canvas, &value_star, VALUE_FILL);
            }
            draw_closed_outline(&mut canvas, &value_star, LINE_WIDTH * ss, VALUE_OUTLINE);
            for &(x, y) in value_star.iter().step_by(2) {
                draw_filled_circle_mut(&mut canvas, round_point(x, y), (DOT_RADIUS * ss).round() as i32, VALUE_OUTLINE);
            }
        }

        self.draw_axis_labels(&mut canvas, &boundary, ss);
        self.draw_legend(&mut canvas, &attributes, ss);

        let image = image::imageops::resize(&canvas.0, self.size, self.size, FilterType::Lanczos3);
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn polar(&self, radius: f64, angle: f64) -> ChartPoint {
        (self.center() + radius * angle.cos(), self.center() + radius * angle.sin())
    }

    fn draw_axis_labels(&self, canvas: &mut Blend<RgbaImage>, boundary: &[ChartPoint], ss: f64) {
        let center = self.center();
        let height = (LABEL_HEIGHT * ss).round() as u32;

        for (letter, &(x, y)) in AXIS_LABELS.iter().zip(boundary.iter().step_by(2)) {
            let text = letter.to_string();
            let (w, h) = self.font.measure(&text, height);
            let lx = (center + (x - center) * LABEL_OFFSET) * ss - f64::from(w) / 2.0;
            let ly = (center + (y - center) * LABEL_OFFSET) * ss - f64::from(h) / 2.0;
            self.font.draw(canvas, LABEL_COLOR, lx.round() as i32, ly.round() as i32, height, &text);
        }
    }

    /// `A: Strength 3` lines in the bottom-left corner; scores are on the 0..=5 scale.
    fn draw_legend(&self, canvas: &mut Blend<RgbaImage>, attributes: &[(&str, f64)], ss: f64) {
        let height = (LEGEND_HEIGHT * ss).round() as u32;
        let top = f64::from(self.size) - LEGEND_MARGIN - LEGEND_LINE * attributes.len() as f64;

        for (i, (&(name, value), &letter)) in attributes.iter().zip(AXIS_LABELS.iter()).enumerate() {
            let line = legend_line(letter, name, value);
            let y = (top + LEGEND_LINE * i as f64) * ss;
            self.font.draw(canvas, LABEL_COLOR, (LEGEND_MARGIN * ss).round() as i32, y.round() as i32, height, &line);
        }
    }
}

/// Legend entry for one axis; `value` is shown back on the 0..=5 scale.
fn legend_line(letter: char, name: &str, value: f64) -> String {
    format!("{}: {} {}", letter, name, (value * 5.0).round() as i64)
}

fn outer_angle(i: usize) -> f64 {
    (-90.0 + i as f64 * 72.0).to_radians()
}

fn round_point(x: f64, y: f64) -> (i32, i32) {
    (x.round() as i32, y.round() as i32)
}

fn to_polygon(points: &[ChartPoint]) -> Vec<Point<i32>> {
    let mut polygon: Vec<Point<i32>> = points.iter()
        .map(|&(x, y)| {
            let (x, y) = round_point(x, y);
            Point::new(x, y)
        })
        .collect();
    polygon.dedup();
    // imageproc rejects polygons that repeat the first point at the end
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }
    polygon
}

fn fill_polygon(canvas: &mut Blend<RgbaImage>, points: &[ChartPoint], color: Rgba<u8>) {
    let polygon = to_polygon(points);
    if polygon.len() >= 3 {
        draw_polygon_mut(canvas, &polygon, color);
    }
}

/// Each edge becomes a quad `width` wide; round caps hide the seams.
fn draw_closed_outline(canvas: &mut Blend<RgbaImage>, points: &[ChartPoint], width: f64, color: Rgba<u8>) {
    let half = width / 2.0;
    for (i, &(ax, ay)) in points.iter().enumerate() {
        let (bx, by) = points[(i + 1) % points.len()];
        let (dx, dy) = (bx - ax, by - ay);
        let length = (dx * dx + dy * dy).sqrt();
        if length > f64::EPSILON {
            let (nx, ny) = (-dy / length * half, dx / length * half);
            fill_polygon(canvas, &[
                (ax + nx, ay + ny),
                (bx + nx, by + ny),
                (bx - nx, by - ny),
                (ax - nx, ay - ny),
            ], color);
        }
        draw_filled_circle_mut(canvas, round_point(ax, ay), half.round() as i32, color);
    }
}
