//! Per-frame renderer: ages the previous frame, rotates the canvas, lifts
//! points near clusters and draws them in two colour batches.

use iced::Color;

use crate::clusters::{Cluster, ClusterSimulator};
use crate::error::FrameError;
use crate::parameters::Parameters;
use crate::raster::Surface;
use crate::spiral::{Point, Viewport};

/// Half-width of the square in which a cluster lifts points.
pub const CLUSTER_RADIUS: f64 = 200.0;
/// Extra size of a point sitting right under a cluster.
pub const SIZE_BOOST: f64 = 1.0;
/// Upward offset of a point sitting right under a cluster.
pub const LIFT_HEIGHT: f64 = 10.0;
/// Opacity of the black veil painted over the previous frame.
pub const TRAIL_ALPHA: f32 = 0.25;
/// Radians of rotation per frame per unit of `rotationSpeed`.
pub const ROTATION_STEP: f64 = 0.01;

/// Sets up to this size are drawn whole every frame.
pub const FULL_BATCH_LIMIT: usize = 10_000;
pub const MEDIUM_BATCH_LIMIT: usize = 50_000;
pub const MEDIUM_BATCH: usize = 2_000;
pub const LARGE_BATCH: usize = 5_000;

pub fn normal_color() -> Color {
    Color::from_rgb8(0x00, 0x99, 0x00)
}

pub fn prime_color() -> Color {
    Color::from_rgb8(0x00, 0xff, 0x00)
}

/// Number of points drawn this frame for a set of `len` points.
pub fn batch_size(len: usize, instant_render: bool) -> usize {
    if instant_render || len <= FULL_BATCH_LIMIT {
        len
    } else if len <= MEDIUM_BATCH_LIMIT {
        MEDIUM_BATCH
    } else {
        LARGE_BATCH
    }
}

/// Strongest square falloff among the clusters around `(x, y)`, in `[0, 1]`.
/// Clusters do not stack.
pub fn lift_factor(x: f64, y: f64, clusters: &[Cluster]) -> f64 {
    clusters.iter().fold(0.0, |factor: f64, cluster| {
        let dx = (x - cluster.x).abs();
        let dy = (y - cluster.y).abs();
        if dx < CLUSTER_RADIUS && dy < CLUSTER_RADIUS {
            let falloff = (1.0 - dx / CLUSTER_RADIUS).min(1.0 - dy / CLUSTER_RADIUS);
            factor.max(falloff)
        } else {
            factor
        }
    })
}

#[derive(Clone, Copy, Debug)]
struct Sprite {
    x: f64,
    y: f64,
    size: f64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub drawn: usize,
    pub primes: usize,
    pub rotation: f64,
}

#[derive(Debug, Default)]
pub struct Compositor {
    rotation: f64,
    cursor: usize,
    normal: Vec<Sprite>,
    prime: Vec<Sprite>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated canvas rotation in radians.
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    /// Renders one frame onto `surface`.
    ///
    /// Fails without touching anything when the surface is out of step with
    /// the viewport, e.g. while a resize is being applied; the caller simply
    /// tries again next frame.
    pub fn render_frame<S: Surface>(
        &mut self,
        surface: &mut S,
        viewport: Viewport,
        points: &[Point],
        simulator: &mut ClusterSimulator,
        parameters: &Parameters,
    ) -> Result<FrameStats, FrameError> {
        let (width, height) = surface.size();
        if width == 0 || height == 0 {
            return Err(FrameError::EmptySurface);
        }
        if (width, height) != (viewport.width, viewport.height) {
            return Err(FrameError::SizeMismatch {
                surface: (width, height),
                viewport: (viewport.width, viewport.height),
            });
        }

        if parameters.show_clusters() {
            simulator.advance();
        }
        if parameters.show_rotation() {
            self.rotation += parameters.rotation_speed() * ROTATION_STEP;
        }

        surface.fill_rect(
            0.0,
            0.0,
            width as f64,
            height as f64,
            Color::from_rgba(0.0, 0.0, 0.0, TRAIL_ALPHA),
        );

        surface.save();
        if parameters.show_rotation() {
            let (cx, cy) = viewport.center();
            surface.rotate_about(cx, cy, self.rotation);
        }

        self.collect(points, simulator.clusters(), parameters);
        let use_squares = parameters.use_squares();
        for sprite in self.normal.iter() {
            draw(surface, sprite, use_squares, normal_color());
        }
        for sprite in self.prime.iter() {
            draw(surface, sprite, use_squares, prime_color());
        }

        surface.restore();

        Ok(FrameStats {
            drawn: self.normal.len() + self.prime.len(),
            primes: self.prime.len(),
            rotation: self.rotation,
        })
    }

    /// Sorts this frame's batch into the two colour buckets. Consecutive
    /// frames walk the set cyclically when the batch is smaller than it.
    fn collect(&mut self, points: &[Point], clusters: &[Cluster], parameters: &Parameters) {
        self.normal.clear();
        self.prime.clear();
        if points.is_empty() {
            self.cursor = 0;
            return;
        }

        let len = points.len();
        let batch = batch_size(len, parameters.instant_render());
        let start = self.cursor % len;
        let highlight = parameters.show_primes();
        let lifting = parameters.show_clusters();

        for i in 0..batch {
            let point = &points[(start + i) % len];
            if !point.x.is_finite() || !point.y.is_finite() {
                continue;
            }

            let factor = if lifting {
                lift_factor(point.x, point.y, clusters)
            } else {
                0.0
            };
            let is_highlighted = highlight && point.is_prime;
            let base = if is_highlighted {
                parameters.dot_size() * parameters.prime_size()
            } else {
                parameters.dot_size()
            };
            let sprite = Sprite {
                x: point.x,
                y: point.y - factor * LIFT_HEIGHT,
                size: base + factor * SIZE_BOOST,
            };

            if is_highlighted {
                self.prime.push(sprite);
            } else {
                self.normal.push(sprite);
            }
        }

        self.cursor = (start + batch) % len;
    }
}

fn draw<S: Surface>(surface: &mut S, sprite: &Sprite, use_squares: bool, color: Color) {
    if use_squares {
        let half = sprite.size / 2.0;
        surface.fill_rect(sprite.x - half, sprite.y - half, sprite.size, sprite.size, color);
    } else {
        surface.fill_circle(sprite.x, sprite.y, sprite.size / 2.0, color);
    }
}
