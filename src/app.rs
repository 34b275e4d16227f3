//! Window-independent application state.
//!
//! [`Controller`] owns the generator, simulator, compositor and raster, applies
//! user input to the [`Parameters`], and reports back through [`Effects`] which
//! asynchronous work the shell has to schedule: persisting fields, driving an
//! incremental generation pass, or waiting out a debounce.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::animation::SpiralAnimator;
use crate::clusters::ClusterSimulator;
use crate::compositor::{Compositor, FrameStats};
use crate::error::{Diagnostic, FrameError};
use crate::parameters::{Change, Field, Parameters, Recompute, Zoom};
use crate::raster::Raster;
use crate::schedule::{Debouncer, GenerationToken, Ticket, IDLE_BUDGET};
use crate::spiral::{ChunkStatus, SpiralGenerator, Viewport};

/// Width of the control column beside the spiral.
pub const SIDEBAR_WIDTH: u32 = 300;

/// Drawable area left for the spiral in a window of the given size.
pub fn stage_viewport(width: u32, height: u32) -> Viewport {
    Viewport::new(width.saturating_sub(SIDEBAR_WIDTH), height)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shortcut {
    Toggle(Field),
    TogglePlay,
}

pub fn shortcut(c: char) -> Option<Shortcut> {
    let field = match c.to_ascii_lowercase() {
        ' ' => return Some(Shortcut::TogglePlay),
        'p' => Field::ShowPrimes,
        'a' => Field::ShowClusters,
        'r' => Field::ShowRotation,
        'c' => Field::UseSquares,
        'i' => Field::InstantRender,
        'm' => Field::AnimateSpiralCoeff,
        _ => return None,
    };
    Some(Shortcut::Toggle(field))
}

/// Scrolling down (negative delta) zooms in.
pub fn wheel_zoom(delta_y: f32) -> Option<Zoom> {
    if delta_y < 0.0 {
        Some(Zoom::In)
    } else if delta_y > 0.0 {
        Some(Zoom::Out)
    } else {
        None
    }
}

/// Work an update leaves for the shell.
#[derive(Debug, Default)]
pub struct Effects {
    /// Fields whose new value should be written to the store.
    pub persist: Vec<Field>,
    /// Incremental pass to drive through idle slots.
    pub generation: Option<GenerationToken>,
    /// Recomputation to run once the ticket settles.
    pub debounce: Option<(Recompute, Ticket)>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Effects {
    pub fn is_empty(&self) -> bool {
        self.persist.is_empty()
            && self.generation.is_none()
            && self.debounce.is_none()
            && self.diagnostics.is_empty()
    }
}

#[derive(Debug)]
pub struct Controller {
    parameters: Parameters,
    viewport: Viewport,
    generator: SpiralGenerator,
    simulator: ClusterSimulator,
    compositor: Compositor,
    raster: Raster,
    animator: SpiralAnimator,
    points_debounce: Debouncer,
    clusters_debounce: Debouncer,
    is_playing: bool,
    last_frame: FrameStats,
    last_frame_duration: Duration,
}

impl Controller {
    pub fn new(viewport: Viewport) -> Self {
        Self::with_simulator(viewport, ClusterSimulator::new())
    }

    pub fn with_simulator(viewport: Viewport, simulator: ClusterSimulator) -> Self {
        Self {
            parameters: Parameters::default(),
            viewport,
            generator: SpiralGenerator::new(),
            simulator,
            compositor: Compositor::new(),
            raster: Raster::new(viewport.width, viewport.height),
            animator: SpiralAnimator::new(),
            points_debounce: Debouncer::new(),
            clusters_debounce: Debouncer::new(),
            is_playing: true,
            last_frame: FrameStats::default(),
            last_frame_duration: Duration::default(),
        }
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn generator(&self) -> &SpiralGenerator {
        &self.generator
    }

    pub fn simulator(&self) -> &ClusterSimulator {
        &self.simulator
    }

    pub fn raster(&self) -> &Raster {
        &self.raster
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn last_frame(&self) -> FrameStats {
        self.last_frame
    }

    pub fn last_frame_duration(&self) -> Duration {
        self.last_frame_duration
    }

    pub fn toggle_play(&mut self) {
        self.is_playing = !self.is_playing;
    }

    /// Adopts freshly loaded parameters and rebuilds everything from them.
    pub fn load(&mut self, parameters: Parameters) -> Effects {
        info!(
            max_n = parameters.max_n(),
            clusters = parameters.cluster_count(),
            "parameters loaded"
        );
        self.parameters = parameters;

        let mut effects = Effects::default();
        self.reseed(&mut effects);
        self.regenerate(&mut effects);
        effects
    }

    /// Runs one setter. In instant-render mode the recomputation happens now,
    /// otherwise it waits for [`Controller::settle`].
    pub fn change(&mut self, edit: impl FnOnce(&mut Parameters) -> Change) -> Effects {
        let change = edit(&mut self.parameters);

        let mut effects = Effects {
            persist: change.fields,
            diagnostics: change.diagnostic.into_iter().collect(),
            ..Effects::default()
        };
        match change.recompute {
            Some(kind) if self.parameters.instant_render() => {
                self.recompute(kind, &mut effects);
            }
            Some(kind) => {
                let ticket = self.debouncer(kind).schedule();
                effects.debounce = Some((kind, ticket));
            }
            None => {}
        }
        effects
    }

    pub fn zoom(&mut self, zoom: Zoom) -> Effects {
        self.change(|parameters| parameters.zoom(zoom))
    }

    pub fn toggle(&mut self, field: Field) -> Effects {
        self.change(|parameters| parameters.toggle(field))
    }

    /// A debounce delay ran out. Only the latest ticket recomputes.
    pub fn settle(&mut self, kind: Recompute, ticket: Ticket) -> Effects {
        let mut effects = Effects::default();
        if self.debouncer(kind).fire(ticket) {
            self.recompute(kind, &mut effects);
        }
        effects
    }

    /// New drawable size: reseeds clusters, regenerates points and starts the
    /// raster over. A no-op when nothing changed.
    pub fn resize(&mut self, viewport: Viewport) -> Effects {
        let mut effects = Effects::default();
        if viewport == self.viewport {
            return effects;
        }

        debug!(
            width = viewport.width,
            height = viewport.height,
            "viewport resized"
        );
        self.viewport = viewport;
        self.raster.resize(viewport.width, viewport.height);
        self.reseed(&mut effects);
        self.regenerate(&mut effects);
        effects
    }

    /// One coefficient animation tick; regenerates without debouncing.
    pub fn animate(&mut self) -> Effects {
        let change = self.animator.step(&mut self.parameters);

        let mut effects = Effects {
            persist: change.fields,
            diagnostics: change.diagnostic.into_iter().collect(),
            ..Effects::default()
        };
        self.regenerate(&mut effects);
        effects
    }

    /// Hands the token back while its pass still has work left.
    pub fn run_chunk(&mut self, token: GenerationToken) -> Option<GenerationToken> {
        match self.generator.run_chunk(&token, IDLE_BUDGET) {
            ChunkStatus::Pending => Some(token),
            ChunkStatus::Finished | ChunkStatus::Stale => None,
        }
    }

    pub fn render(&mut self) -> Result<FrameStats, FrameError> {
        let start = Instant::now();
        let points = self.generator.points();

        let result = self.compositor.render_frame(
            &mut self.raster,
            self.viewport,
            &points,
            &mut self.simulator,
            &self.parameters,
        );
        if let Ok(stats) = &result {
            self.last_frame = *stats;
        }
        self.last_frame_duration = start.elapsed();
        result
    }

    fn debouncer(&mut self, kind: Recompute) -> &mut Debouncer {
        match kind {
            Recompute::Points => &mut self.points_debounce,
            Recompute::Clusters => &mut self.clusters_debounce,
        }
    }

    fn recompute(&mut self, kind: Recompute, effects: &mut Effects) {
        match kind {
            Recompute::Points => self.regenerate(effects),
            Recompute::Clusters => self.reseed(effects),
        }
    }

    fn regenerate(&mut self, effects: &mut Effects) {
        self.points_debounce.cancel();

        let started = self.generator.generate(&self.parameters, self.viewport);
        effects.diagnostics.extend(started.diagnostic);
        effects.generation = started.token;
    }

    fn reseed(&mut self, effects: &mut Effects) {
        self.clusters_debounce.cancel();

        let count = self.parameters.cluster_count();
        effects
            .diagnostics
            .extend(self.simulator.init(count, self.viewport));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primes::PrimeOracle;
    use crate::spiral;

    fn loaded(width: u32, height: u32) -> Controller {
        let mut controller =
            Controller::with_simulator(Viewport::new(width, height), ClusterSimulator::seeded(1));
        let effects = controller.load(Parameters::default());
        finish(&mut controller, effects.generation);
        controller
    }

    fn finish(controller: &mut Controller, mut token: Option<GenerationToken>) {
        while let Some(pending) = token {
            token = controller.run_chunk(pending);
        }
    }

    fn lit_pixels(raster: &Raster) -> usize {
        raster
            .bgra()
            .chunks_exact(4)
            .filter(|pixel| pixel[..3].iter().any(|&channel| channel != 0))
            .count()
    }

    #[test]
    fn load_seeds_clusters_and_starts_generation() {
        let mut controller =
            Controller::with_simulator(Viewport::new(400, 300), ClusterSimulator::seeded(2));
        let effects = controller.load(Parameters::default());
        assert!(effects.generation.is_some());
        assert!(effects.debounce.is_none());
        assert_eq!(controller.simulator().clusters().len(), 100);

        finish(&mut controller, effects.generation);
        assert!(!controller.generator().is_generating());
        assert_eq!(
            *controller.generator().points(),
            spiral::generate(
                controller.parameters(),
                controller.viewport(),
                &mut PrimeOracle::new()
            )
        );
    }

    #[test]
    fn changes_are_debounced_until_the_latest_ticket_settles() {
        let mut controller = loaded(400, 300);

        let first = controller.change(|parameters| parameters.set_scale(10.0));
        assert_eq!(first.persist, vec![Field::Scale]);
        assert!(first.generation.is_none());
        let (kind, stale) = first.debounce.expect("debounced");
        assert_eq!(kind, Recompute::Points);

        let second = controller.change(|parameters| parameters.set_scale(12.0));
        let (_, latest) = second.debounce.expect("debounced");

        assert!(controller.settle(Recompute::Points, stale).is_empty());
        let fired = controller.settle(Recompute::Points, latest);
        assert!(fired.generation.is_some());
        assert!(controller.settle(Recompute::Points, latest).is_empty());
    }

    #[test]
    fn cluster_count_reseeds_once_settled() {
        let mut controller = loaded(400, 300);

        let effects = controller.change(|parameters| parameters.set_cluster_count(7));
        let (kind, ticket) = effects.debounce.expect("debounced");
        assert_eq!(kind, Recompute::Clusters);
        assert_eq!(controller.simulator().clusters().len(), 100);

        controller.settle(kind, ticket);
        assert_eq!(controller.simulator().clusters().len(), 7);
    }

    #[test]
    fn instant_render_recomputes_on_every_change() {
        let mut controller = loaded(400, 300);
        let effects = controller.toggle(Field::InstantRender);
        assert_eq!(effects.persist, vec![Field::InstantRender]);
        assert!(effects.debounce.is_none());

        let effects = controller.change(|parameters| parameters.set_scale(10.0));
        assert!(effects.debounce.is_none());
        assert!(effects.generation.is_none());
        assert!(!controller.generator().is_generating());
        assert_eq!(
            *controller.generator().points(),
            spiral::generate(
                controller.parameters(),
                controller.viewport(),
                &mut PrimeOracle::new()
            )
        );

        let effects = controller.change(|parameters| parameters.set_cluster_count(7));
        assert!(effects.debounce.is_none());
        assert_eq!(controller.simulator().clusters().len(), 7);
    }

    #[test]
    fn changes_without_dependent_work_only_persist() {
        let mut controller = loaded(400, 300);
        let effects = controller.change(|parameters| parameters.set_dot_size(3.0));
        assert_eq!(effects.persist, vec![Field::DotSize]);
        assert!(effects.debounce.is_none());
        assert!(effects.generation.is_none());
    }

    #[test]
    fn rejected_input_surfaces_a_diagnostic() {
        let mut controller = loaded(400, 300);
        let effects = controller.change(|parameters| parameters.set_scale(f64::NAN));
        assert!(effects.persist.is_empty());
        assert_eq!(
            effects.diagnostics,
            vec![Diagnostic::InvalidInput {
                field: Field::Scale
            }]
        );
    }

    #[test]
    fn resize_reseeds_regenerates_and_clears_the_raster() {
        let mut controller = loaded(400, 300);
        controller.render().expect("frame");
        assert!(lit_pixels(controller.raster()) > 0);

        let pending = controller.change(|parameters| parameters.set_scale(10.0));
        let (_, ticket) = pending.debounce.expect("debounced");

        let viewport = Viewport::new(300, 200);
        let effects = controller.resize(viewport);
        assert!(effects.generation.is_some());
        assert_eq!(controller.viewport(), viewport);
        assert_eq!(
            (controller.raster().width(), controller.raster().height()),
            (300, 200)
        );
        assert_eq!(lit_pixels(controller.raster()), 0);
        assert_eq!(controller.simulator().clusters().len(), 100);
        assert!(controller.simulator().clusters().iter().all(|c| {
            c.x <= 300.0 && c.y <= 200.0 && c.target_x <= 300.0 && c.target_y <= 200.0
        }));

        // the resize already regenerated with the pending scale
        assert!(controller.settle(Recompute::Points, ticket).is_empty());

        finish(&mut controller, effects.generation);
        assert_eq!(
            *controller.generator().points(),
            spiral::generate(controller.parameters(), viewport, &mut PrimeOracle::new())
        );
        assert!(controller.render().is_ok());
    }

    #[test]
    fn resize_to_the_same_size_does_nothing() {
        let mut controller = loaded(400, 300);
        assert!(controller.resize(Viewport::new(400, 300)).is_empty());
    }

    #[test]
    fn superseded_passes_stop_scheduling() {
        let mut controller =
            Controller::with_simulator(Viewport::new(400, 300), ClusterSimulator::seeded(3));
        let old = controller
            .load(Parameters::default())
            .generation
            .expect("pass");
        let new = controller
            .load(Parameters::default())
            .generation
            .expect("pass");
        assert_eq!(controller.run_chunk(old), None);
        assert!(controller.run_chunk(new).is_some());
    }

    #[test]
    fn animation_ticks_regenerate_immediately() {
        let mut controller = loaded(400, 300);
        let effects = controller.animate();
        assert_eq!(effects.persist, vec![Field::SpiralCoeff]);
        assert!(effects.generation.is_some());
        assert!(effects.debounce.is_none());
        assert!((controller.parameters().spiral_coeff() - 2.1).abs() < 1e-12);
    }

    #[test]
    fn empty_stage_skips_frames() {
        let mut controller = loaded(400, 300);
        controller.render().expect("frame");
        let stats = controller.last_frame();

        controller.resize(stage_viewport(SIDEBAR_WIDTH, 600));
        assert_eq!(controller.render(), Err(FrameError::EmptySurface));
        assert_eq!(controller.last_frame(), stats);
    }

    #[test]
    fn play_toggles() {
        let mut controller = loaded(100, 100);
        assert!(controller.is_playing());
        controller.toggle_play();
        assert!(!controller.is_playing());
    }

    #[test]
    fn stage_excludes_the_sidebar() {
        assert_eq!(stage_viewport(1280, 800), Viewport::new(980, 800));
        assert_eq!(stage_viewport(200, 100), Viewport::new(0, 100));
    }

    #[test]
    fn keys_map_to_toggles() {
        let expected = [
            ('p', Field::ShowPrimes),
            ('a', Field::ShowClusters),
            ('r', Field::ShowRotation),
            ('c', Field::UseSquares),
            ('i', Field::InstantRender),
            ('m', Field::AnimateSpiralCoeff),
        ];
        for &(key, field) in expected.iter() {
            assert_eq!(shortcut(key), Some(Shortcut::Toggle(field)));
            assert_eq!(
                shortcut(key.to_ascii_uppercase()),
                Some(Shortcut::Toggle(field))
            );
        }
        assert_eq!(shortcut(' '), Some(Shortcut::TogglePlay));
        assert_eq!(shortcut('x'), None);
        assert_eq!(shortcut('1'), None);
    }

    #[test]
    fn scrolling_down_zooms_in() {
        assert_eq!(wheel_zoom(-1.0), Some(Zoom::In));
        assert_eq!(wheel_zoom(-0.25), Some(Zoom::In));
        assert_eq!(wheel_zoom(3.0), Some(Zoom::Out));
        assert_eq!(wheel_zoom(0.0), None);

        let mut controller = loaded(400, 300);
        let effects = controller.zoom(Zoom::In);
        assert_eq!(effects.persist, vec![Field::Scale]);
        assert!((controller.parameters().scale() - 5.25).abs() < 1e-12);
    }
}
