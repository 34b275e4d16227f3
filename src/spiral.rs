//! Maps integer indices onto the Sacks spiral and culls them against the
//! viewport, either in one go or chunk by chunk across idle slots.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::Diagnostic;
use crate::parameters::Parameters;
use crate::primes::PrimeOracle;
use crate::schedule::GenerationToken;

/// Hard cap on the index domain, whatever `maxN` asks for.
pub const MAX_POINTS: u32 = 2_000_000;

/// Indices handled per idle slot in incremental mode.
pub const CHUNK_SIZE: u32 = 1000;

/// How often the budget clock is consulted inside a chunk.
const BUDGET_CHECK_INTERVAL: u32 = 64;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub n: u32,
    pub is_prime: bool,
}

/// Published point sequence. Replaced wholesale on every new pass; chunks of
/// the running pass are appended copy-on-write so readers holding a clone keep
/// a stable slice.
pub type Points = Arc<Vec<Point>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> (f64, f64) {
        (self.width as f64 / 2.0, self.height as f64 / 2.0)
    }

    pub fn diagonal(&self) -> f64 {
        (self.width as f64).hypot(self.height as f64)
    }

    /// Slack around the viewport rect inside which points are kept. Half the
    /// diagonal when the canvas rotates, so corners never clip.
    pub fn cull_margin(&self, rotating: bool) -> f64 {
        if rotating {
            self.diagonal() / 2.0
        } else {
            0.0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Applies the hard cap; the flag tells whether it kicked in.
pub fn effective_max_n(requested: u32) -> (u32, bool) {
    if requested > MAX_POINTS {
        (MAX_POINTS, true)
    } else {
        (requested, false)
    }
}

/// Everything one pass needs, frozen when the pass starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Layout {
    scale: f64,
    spiral_coeff: f64,
    center: (f64, f64),
    width: f64,
    height: f64,
    margin: f64,
}

impl Layout {
    pub fn new(parameters: &Parameters, viewport: Viewport) -> Self {
        Self {
            scale: parameters.scale(),
            spiral_coeff: parameters.spiral_coeff(),
            center: viewport.center(),
            width: viewport.width as f64,
            height: viewport.height as f64,
            margin: viewport.cull_margin(parameters.show_rotation()),
        }
    }

    pub fn position(&self, n: u32) -> (f64, f64) {
        let root = (n as f64).sqrt();
        let r = root * self.scale;
        let theta = self.spiral_coeff * std::f64::consts::PI * root;
        (self.center.0 + r * theta.cos(), self.center.1 + r * theta.sin())
    }

    pub fn is_visible(&self, x: f64, y: f64) -> bool {
        x >= -self.margin
            && x <= self.width + self.margin
            && y >= -self.margin
            && y <= self.height + self.margin
    }

    pub fn point(&self, n: u32, oracle: &mut PrimeOracle) -> Option<Point> {
        let (x, y) = self.position(n);
        if !self.is_visible(x, y) {
            return None;
        }
        Some(Point {
            x,
            y,
            n,
            is_prime: oracle.is_prime(n),
        })
    }
}

/// Runs the whole domain synchronously.
pub fn generate(
    parameters: &Parameters,
    viewport: Viewport,
    oracle: &mut PrimeOracle,
) -> Vec<Point> {
    let layout = Layout::new(parameters, viewport);
    let (end, _) = effective_max_n(parameters.max_n());
    (1..=end).filter_map(|n| layout.point(n, oracle)).collect()
}

#[derive(Debug)]
pub struct Started {
    /// `None` when the pass already ran to completion.
    pub token: Option<GenerationToken>,
    pub diagnostic: Option<Diagnostic>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkStatus {
    /// More chunks remain; schedule another idle slot.
    Pending,
    Finished,
    /// The token belongs to a cancelled or superseded pass. Nothing appended.
    Stale,
}

#[derive(Debug)]
struct Pass {
    token: GenerationToken,
    layout: Layout,
    next_n: u32,
    end_n: u32,
}

/// Single writer of the published point sequence.
#[derive(Debug)]
pub struct SpiralGenerator {
    oracle: PrimeOracle,
    points: Points,
    pass: Option<Pass>,
    passes: u64,
}

impl Default for SpiralGenerator {
    fn default() -> Self {
        Self {
            oracle: PrimeOracle::new(),
            points: Arc::new(Vec::new()),
            pass: None,
            passes: 0,
        }
    }
}

impl SpiralGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently published sequence, possibly mid-generation.
    pub fn points(&self) -> Points {
        self.points.clone()
    }

    pub fn is_generating(&self) -> bool {
        self.pass.is_some()
    }

    /// Cancels the running pass, if any, and replaces the published sequence.
    /// With `instant_render` the new pass completes before returning;
    /// otherwise the caller drives it with [`SpiralGenerator::run_chunk`].
    pub fn generate(&mut self, parameters: &Parameters, viewport: Viewport) -> Started {
        self.cancel();
        self.passes += 1;

        let (end_n, capped) = effective_max_n(parameters.max_n());
        let diagnostic = if capped {
            warn!(
                requested = parameters.max_n(),
                applied = end_n,
                "capped point calculation for performance"
            );
            Some(Diagnostic::PointsCapped {
                requested: parameters.max_n(),
                applied: end_n,
            })
        } else {
            None
        };

        if parameters.instant_render() {
            let started = Instant::now();
            let points = generate(parameters, viewport, &mut self.oracle);
            debug!(
                pass = self.passes,
                points = points.len(),
                elapsed = ?started.elapsed(),
                "generated points synchronously"
            );
            self.points = Arc::new(points);
            return Started {
                token: None,
                diagnostic,
            };
        }

        let token = GenerationToken::new(self.passes);
        self.points = Arc::new(Vec::new());
        self.pass = Some(Pass {
            token: token.clone(),
            layout: Layout::new(parameters, viewport),
            next_n: 1,
            end_n,
        });
        debug!(pass = self.passes, end_n, "scheduled incremental generation");

        Started {
            token: Some(token),
            diagnostic,
        }
    }

    /// Processes up to [`CHUNK_SIZE`] indices of the pass `token` names,
    /// yielding early once `budget` is spent.
    pub fn run_chunk(&mut self, token: &GenerationToken, budget: Duration) -> ChunkStatus {
        let Self {
            oracle,
            points,
            pass,
            ..
        } = self;

        let current = match pass {
            Some(current) if current.token == *token && !token.is_cancelled() => current,
            _ => {
                debug!(pass = token.pass(), "dropped chunk of a stale pass");
                return ChunkStatus::Stale;
            }
        };

        let started = Instant::now();
        let chunk_end = current
            .end_n
            .min(current.next_n.saturating_add(CHUNK_SIZE - 1));
        let mut fresh = Vec::new();
        let mut processed = 0;

        while current.next_n <= chunk_end {
            if let Some(point) = current.layout.point(current.next_n, oracle) {
                fresh.push(point);
            }
            current.next_n += 1;
            processed += 1;
            if processed % BUDGET_CHECK_INTERVAL == 0 && started.elapsed() >= budget {
                debug!(pass = token.pass(), processed, "idle budget spent, yielding");
                break;
            }
        }

        if !fresh.is_empty() {
            Arc::make_mut(points).extend(fresh);
        }

        if current.next_n > current.end_n {
            debug!(
                pass = token.pass(),
                points = points.len(),
                "incremental generation finished"
            );
            *pass = None;
            ChunkStatus::Finished
        } else {
            ChunkStatus::Pending
        }
    }

    /// Cancels the running pass. A no-op when nothing is running.
    pub fn cancel(&mut self) {
        if let Some(pass) = self.pass.take() {
            debug!(pass = pass.token.pass(), "cancelled incremental generation");
            pass.token.cancel();
        }
    }
}
