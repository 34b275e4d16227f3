//! Animated Sacks prime spiral.
//!
//! Integers are laid out on a spiral (`r = √n · scale`, `θ = coeff · π · √n`),
//! culled against the viewport and drawn every frame over a fading copy of the
//! previous one, with moving clusters lifting nearby points.
//!
//! The pieces are independent of any windowing toolkit:
//!
//! - [`primes::PrimeOracle`] memoizes primality.
//! - [`spiral::SpiralGenerator`] publishes the point set, synchronously or in
//!   cancellable chunks.
//! - [`clusters::ClusterSimulator`] moves the attractors.
//! - [`compositor::Compositor`] renders a frame onto any [`raster::Surface`].
//! - [`parameters::Parameters`] holds the validated tunables, persisted through
//!   a [`store::KeyValueStore`].
//! - [`app::Controller`] ties them together behind whatever window drives it.

pub mod animation;
pub mod app;
pub mod clusters;
pub mod compositor;
pub mod error;
pub mod parameters;
pub mod primes;
pub mod raster;
pub mod schedule;
pub mod spiral;
pub mod store;
