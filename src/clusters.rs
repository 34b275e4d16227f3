use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::warn;

use crate::error::Diagnostic;
use crate::spiral::Viewport;

/// Hard cap on active clusters, whatever `clusterCount` asks for.
pub const MAX_CLUSTERS: u32 = 1000;

pub const MIN_SPEED: f64 = 2.0;
pub const MAX_SPEED: f64 = 3.0;

/// A moving attractor that lifts nearby points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cluster {
    pub x: f64,
    pub y: f64,
    pub target_x: f64,
    pub target_y: f64,
    /// Pixels per tick.
    pub speed: f64,
}

/// Owns the cluster set. Reseeded, never patched, on resize or count change.
#[derive(Debug)]
pub struct ClusterSimulator {
    clusters: Vec<Cluster>,
    viewport: Viewport,
    rng: StdRng,
}

impl ClusterSimulator {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    /// Resumes from an explicit cluster set instead of seeding a random one.
    pub fn from_clusters(viewport: Viewport, clusters: Vec<Cluster>, seed: u64) -> Self {
        Self {
            clusters,
            viewport,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            clusters: Vec::new(),
            viewport: Viewport::default(),
            rng,
        }
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn init(&mut self, count: u32, viewport: Viewport) -> Option<Diagnostic> {
        self.viewport = viewport;
        let applied = count.min(MAX_CLUSTERS);

        let rng = &mut self.rng;
        self.clusters = (0..applied)
            .map(|_| {
                let (x, y) = random_position(&mut *rng, viewport);
                let (target_x, target_y) = random_position(&mut *rng, viewport);
                Cluster {
                    x,
                    y,
                    target_x,
                    target_y,
                    speed: MIN_SPEED + rng.gen::<f64>() * (MAX_SPEED - MIN_SPEED),
                }
            })
            .collect();

        if count > applied {
            warn!(requested = count, applied, "capped cluster count for performance");
            Some(Diagnostic::ClustersCapped {
                requested: count,
                applied,
            })
        } else {
            None
        }
    }

    /// One tick. A cluster closer to its target than its speed picks a new
    /// target and stays put this tick; everyone else steps straight toward
    /// theirs.
    pub fn advance(&mut self) {
        let width = self.viewport.width as f64;
        let height = self.viewport.height as f64;
        let rng = &mut self.rng;
        let viewport = self.viewport;

        for cluster in self.clusters.iter_mut() {
            let dx = cluster.target_x - cluster.x;
            let dy = cluster.target_y - cluster.y;
            let distance = dx.hypot(dy);
            if distance < cluster.speed {
                let (target_x, target_y) = random_position(&mut *rng, viewport);
                cluster.target_x = target_x;
                cluster.target_y = target_y;
            } else {
                cluster.x = (cluster.x + dx / distance * cluster.speed).max(0.0).min(width);
                cluster.y = (cluster.y + dy / distance * cluster.speed).max(0.0).min(height);
            }
        }
    }
}

impl Default for ClusterSimulator {
    fn default() -> Self {
        Self::new()
    }
}

fn random_position<R: Rng + ?Sized>(rng: &mut R, viewport: Viewport) -> (f64, f64) {
    (
        rng.gen::<f64>() * viewport.width as f64,
        rng.gen::<f64>() * viewport.height as f64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn within(cluster: &Cluster, viewport: Viewport) -> bool {
        let (w, h) = (viewport.width as f64, viewport.height as f64);
        (0.0..=w).contains(&cluster.x)
            && (0.0..=h).contains(&cluster.y)
            && (0.0..=w).contains(&cluster.target_x)
            && (0.0..=h).contains(&cluster.target_y)
    }

    #[test]
    fn init_seeds_inside_the_viewport() {
        let viewport = Viewport::new(800, 600);
        let mut simulator = ClusterSimulator::seeded(7);
        assert_eq!(simulator.init(250, viewport), None);
        assert_eq!(simulator.clusters().len(), 250);
        for cluster in simulator.clusters() {
            assert!(within(cluster, viewport));
            assert!(cluster.speed >= MIN_SPEED && cluster.speed < MAX_SPEED);
        }
    }

    #[test]
    fn count_is_capped() {
        let mut simulator = ClusterSimulator::seeded(1);
        let diagnostic = simulator.init(5000, Viewport::new(100, 100));
        assert_eq!(simulator.clusters().len(), 1000);
        assert_eq!(
            diagnostic,
            Some(Diagnostic::ClustersCapped {
                requested: 5000,
                applied: 1000
            })
        );
    }

    #[test]
    fn reseeding_replaces_the_set() {
        let mut simulator = ClusterSimulator::seeded(2);
        simulator.init(10, Viewport::new(100, 100));
        simulator.init(3, Viewport::new(50, 40));
        assert_eq!(simulator.clusters().len(), 3);
        assert!(simulator
            .clusters()
            .iter()
            .all(|c| within(c, Viewport::new(50, 40))));
    }

    #[test]
    fn clusters_step_toward_their_target() {
        let mut simulator = ClusterSimulator::seeded(3);
        simulator.init(0, Viewport::new(100, 100));
        simulator.clusters.push(Cluster {
            x: 10.0,
            y: 10.0,
            target_x: 40.0,
            target_y: 50.0,
            speed: 2.5,
        });
        simulator.advance();
        let cluster = simulator.clusters()[0];
        assert!((cluster.x - 11.5).abs() < 1e-9);
        assert!((cluster.y - 12.0).abs() < 1e-9);
        assert_eq!((cluster.target_x, cluster.target_y), (40.0, 50.0));
    }

    #[test]
    fn arrival_retargets_without_moving() {
        let viewport = Viewport::new(300, 200);
        let mut simulator = ClusterSimulator::seeded(4);
        simulator.init(0, viewport);
        simulator.clusters.push(Cluster {
            x: 100.0,
            y: 100.0,
            target_x: 101.0,
            target_y: 100.5,
            speed: 2.0,
        });
        simulator.advance();
        let cluster = simulator.clusters()[0];
        assert_eq!((cluster.x, cluster.y), (100.0, 100.0));
        assert!(within(&cluster, viewport));
        assert_ne!((cluster.target_x, cluster.target_y), (101.0, 100.5));
    }

    #[test]
    fn long_runs_stay_in_bounds() {
        let viewport = Viewport::new(320, 240);
        let mut simulator = ClusterSimulator::seeded(5);
        simulator.init(50, viewport);
        for _ in 0..2000 {
            simulator.advance();
            assert!(simulator.clusters().iter().all(|c| within(c, viewport)));
        }
    }

    #[test]
    fn same_seed_same_motion() {
        let viewport = Viewport::new(640, 480);
        let mut a = ClusterSimulator::seeded(9);
        let mut b = ClusterSimulator::seeded(9);
        a.init(20, viewport);
        b.init(20, viewport);
        for _ in 0..100 {
            a.advance();
            b.advance();
        }
        assert_eq!(a.clusters(), b.clusters());
    }
}
