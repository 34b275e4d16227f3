use std::sync::Arc;
use std::time::Duration;

use sacks::clusters::ClusterSimulator;
use sacks::compositor::Compositor;
use sacks::parameters::{Field, Parameters, Recompute};
use sacks::primes::PrimeOracle;
use sacks::raster::Raster;
use sacks::spiral::{self, ChunkStatus, SpiralGenerator, Viewport};
use sacks::store::{JsonFileStore, KeyValueStore, MemoryStore};

const FOREVER: Duration = Duration::from_secs(3600);

fn drive(generator: &mut SpiralGenerator, parameters: &Parameters, viewport: Viewport) {
    let started = generator.generate(parameters, viewport);
    let token = started.token.expect("incremental pass");
    loop {
        match generator.run_chunk(&token, FOREVER) {
            ChunkStatus::Pending => continue,
            ChunkStatus::Finished => break,
            ChunkStatus::Stale => panic!("pass went stale"),
        }
    }
}

fn lit_pixels(raster: &Raster) -> usize {
    raster
        .bgra()
        .chunks_exact(4)
        .filter(|pixel| pixel[0] != 0 || pixel[1] != 0 || pixel[2] != 0)
        .count()
}

#[test]
fn incremental_points_render_onto_the_raster() {
    let viewport = Viewport::new(640, 480);
    let parameters = Parameters::default();

    let mut generator = SpiralGenerator::new();
    drive(&mut generator, &parameters, viewport);
    let points = generator.points();
    assert!(!generator.is_generating());
    assert_eq!(
        *points,
        spiral::generate(&parameters, viewport, &mut PrimeOracle::new())
    );

    let mut simulator = ClusterSimulator::seeded(11);
    simulator.init(parameters.cluster_count(), viewport);

    let mut raster = Raster::new(viewport.width, viewport.height);
    let mut compositor = Compositor::new();
    let stats = compositor
        .render_frame(&mut raster, viewport, &points, &mut simulator, &parameters)
        .expect("frame");

    assert_eq!(stats.drawn, points.len());
    assert!(stats.primes > 0 && stats.primes < stats.drawn);
    assert!(lit_pixels(&raster) > 0);
}

#[test]
fn trail_fades_out_once_the_points_are_gone() {
    let viewport = Viewport::new(200, 200);
    let mut parameters = Parameters::default();
    parameters.toggle(Field::ShowRotation);

    let mut oracle = PrimeOracle::new();
    let points = spiral::generate(&parameters, viewport, &mut oracle);
    let mut simulator = ClusterSimulator::seeded(3);
    simulator.init(5, viewport);

    let mut raster = Raster::new(viewport.width, viewport.height);
    let mut compositor = Compositor::new();
    compositor
        .render_frame(&mut raster, viewport, &points, &mut simulator, &parameters)
        .expect("frame");
    let lit = lit_pixels(&raster);
    assert!(lit > 0);

    compositor
        .render_frame(&mut raster, viewport, &[], &mut simulator, &parameters)
        .expect("frame");
    assert!(lit_pixels(&raster) <= lit);

    for _ in 0..64 {
        compositor
            .render_frame(&mut raster, viewport, &[], &mut simulator, &parameters)
            .expect("frame");
    }
    assert_eq!(lit_pixels(&raster), 0);
}

#[test]
fn a_new_pass_supersedes_the_running_one() {
    let viewport = Viewport::new(800, 600);
    let mut first = Parameters::default();
    first.set_max_n(50_000);
    let mut second = Parameters::default();
    second.set_scale(3.0);

    let mut generator = SpiralGenerator::new();
    let old = generator.generate(&first, viewport).token.expect("pass");
    assert_eq!(generator.run_chunk(&old, FOREVER), ChunkStatus::Pending);

    drive(&mut generator, &second, viewport);
    assert!(old.is_cancelled());
    assert_eq!(generator.run_chunk(&old, FOREVER), ChunkStatus::Stale);
    assert_eq!(
        *generator.points(),
        spiral::generate(&second, viewport, &mut PrimeOracle::new())
    );
}

#[test]
fn resizing_invalidates_the_frame_until_the_surface_follows() {
    let parameters = Parameters::default();
    let mut simulator = ClusterSimulator::seeded(5);
    let mut raster = Raster::new(320, 240);
    let mut compositor = Compositor::new();

    let resized = Viewport::new(400, 300);
    simulator.init(parameters.cluster_count(), resized);
    assert!(compositor
        .render_frame(&mut raster, resized, &[], &mut simulator, &parameters)
        .is_err());

    raster.resize(resized.width, resized.height);
    assert!(compositor
        .render_frame(&mut raster, resized, &[], &mut simulator, &parameters)
        .is_ok());
}

#[tokio::test]
async fn changes_survive_a_reload() {
    let store = Arc::new(MemoryStore::new());

    let mut parameters = Parameters::default();
    let mut changes = vec![
        parameters.set_scale(12.5),
        parameters.set_cluster_count(40),
        parameters.toggle(Field::UseSquares),
    ];
    assert_eq!(changes[1].recompute, Some(Recompute::Clusters));

    for change in changes.drain(..) {
        for field in change.fields {
            store
                .put(field.key(), parameters.value(field))
                .await
                .expect("put");
        }
    }

    let reloaded = Parameters::load(store).await;
    assert_eq!(reloaded, parameters);
}

#[tokio::test]
async fn json_file_store_backs_parameters() {
    let dir = std::env::temp_dir().join(format!("sacks-pipeline-{}", std::process::id()));
    let path = dir.join("nested").join("parameters.json");
    let store = Arc::new(JsonFileStore::new(&path));

    let mut parameters = Parameters::default();
    parameters.set_spiral_coeff(3.5);
    store
        .put(Field::SpiralCoeff.key(), parameters.value(Field::SpiralCoeff))
        .await
        .expect("put");

    let reopened: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::new(&path));
    let reloaded = Parameters::load(reopened).await;
    assert_eq!(reloaded.spiral_coeff(), 3.5);
    assert_eq!(reloaded.scale(), Parameters::default().scale());

    let _ = std::fs::remove_dir_all(&dir);
}
