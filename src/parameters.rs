use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::Diagnostic;
use crate::store::KeyValueStore;

pub const SCALE_RANGE: (f64, f64) = (2.0, 200.0);
pub const SPIRAL_COEFF_RANGE: (f64, f64) = (0.0, 2000.0);
pub const ROTATION_SPEED_RANGE: (f64, f64) = (0.1, 10.0);
pub const DOT_SIZE_RANGE: (f64, f64) = (0.1, 20.0);
pub const PRIME_SIZE_RANGE: (f64, f64) = (0.1, 10.0);
pub const ANIMATION_SPEED_RANGE: (u64, u64) = (10, 2000);
pub const ANIMATION_INCREMENT_RANGE: (f64, f64) = (0.01, 10.0);
pub const ANIMATION_MIN_RANGE: (f64, f64) = (0.1, 1000.0);
pub const ANIMATION_MAX_RANGE: (f64, f64) = (10.0, 2000.0);

/// Gap kept between the animation bounds when one is pushed past the other.
const ANIMATION_BOUNDS_GAP: f64 = 10.0;

/// Multiplicative step for one scroll-to-zoom notch.
pub const ZOOM_STEP: f64 = 1.05;

/// Every independently persisted tunable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Scale,
    MaxN,
    SpiralCoeff,
    RotationSpeed,
    DotSize,
    PrimeSize,
    ClusterCount,
    ShowPrimes,
    ShowClusters,
    ShowRotation,
    UseSquares,
    InstantRender,
    AnimateSpiralCoeff,
    SpiralAnimationSpeed,
    SpiralAnimationIncrement,
    SpiralAnimationMin,
    SpiralAnimationMax,
}

impl Field {
    pub const ALL: [Field; 17] = [
        Field::Scale,
        Field::MaxN,
        Field::SpiralCoeff,
        Field::RotationSpeed,
        Field::DotSize,
        Field::PrimeSize,
        Field::ClusterCount,
        Field::ShowPrimes,
        Field::ShowClusters,
        Field::ShowRotation,
        Field::UseSquares,
        Field::InstantRender,
        Field::AnimateSpiralCoeff,
        Field::SpiralAnimationSpeed,
        Field::SpiralAnimationIncrement,
        Field::SpiralAnimationMin,
        Field::SpiralAnimationMax,
    ];

    /// Key under which the field is persisted.
    pub fn key(self) -> &'static str {
        match self {
            Field::Scale => "scale",
            Field::MaxN => "maxN",
            Field::SpiralCoeff => "spiralCoeff",
            Field::RotationSpeed => "rotationSpeed",
            Field::DotSize => "dotSize",
            Field::PrimeSize => "primeSize",
            Field::ClusterCount => "clusterCount",
            Field::ShowPrimes => "showPrimes",
            Field::ShowClusters => "showClusters",
            Field::ShowRotation => "showRotation",
            Field::UseSquares => "useSquares",
            Field::InstantRender => "instantRender",
            Field::AnimateSpiralCoeff => "animateSpiralCoeff",
            Field::SpiralAnimationSpeed => "spiralAnimationSpeed",
            Field::SpiralAnimationIncrement => "spiralAnimationIncrement",
            Field::SpiralAnimationMin => "spiralAnimationMin",
            Field::SpiralAnimationMax => "spiralAnimationMax",
        }
    }
}

/// Work a change makes necessary beyond the next frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recompute {
    Points,
    Clusters,
}

/// Outcome of a setter: which fields now hold new values, what must be
/// recomputed, and an advisory if the input was rejected.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Change {
    pub fields: Vec<Field>,
    pub recompute: Option<Recompute>,
    pub diagnostic: Option<Diagnostic>,
}

impl Change {
    fn of(field: Field, recompute: Option<Recompute>) -> Self {
        Self {
            fields: vec![field],
            recompute,
            diagnostic: None,
        }
    }

    fn rejected(field: Field) -> Self {
        Self {
            diagnostic: Some(Diagnostic::InvalidInput { field }),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Zoom {
    In,
    Out,
}

/// The tunable state read by the generator and the compositor. Mutated only
/// through the validated setters below.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameters {
    scale: f64,
    max_n: u32,
    spiral_coeff: f64,
    rotation_speed: f64,
    dot_size: f64,
    prime_size: f64,
    cluster_count: u32,
    show_primes: bool,
    show_clusters: bool,
    show_rotation: bool,
    use_squares: bool,
    instant_render: bool,
    animate_spiral_coeff: bool,
    spiral_animation_speed: u64,
    spiral_animation_increment: f64,
    spiral_animation_min: f64,
    spiral_animation_max: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            scale: 5.0,
            max_n: 5000,
            spiral_coeff: 2.0,
            rotation_speed: 0.1,
            dot_size: 0.1,
            prime_size: 10.0,
            cluster_count: 100,
            show_primes: true,
            show_clusters: true,
            show_rotation: true,
            use_squares: true,
            instant_render: false,
            animate_spiral_coeff: false,
            spiral_animation_speed: 100,
            spiral_animation_increment: 0.1,
            spiral_animation_min: 1.0,
            spiral_animation_max: 500.0,
        }
    }
}

impl Parameters {
    /// Reads every field from `store`. Missing keys keep their default,
    /// unreadable or invalid values fall back to the default with a warning.
    pub async fn load(store: Arc<dyn KeyValueStore>) -> Parameters {
        let mut parameters = Parameters::default();
        for field in Field::ALL.iter().copied() {
            match store.get(field.key()).await {
                Ok(Some(value)) => {
                    parameters.restore(field, &value);
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(key = field.key(), %error, "failed to read persisted value");
                }
            }
        }

        let mut change = Change::default();
        parameters.confine_spiral_coeff(&mut change);
        if !change.is_empty() {
            debug!(
                spiral_coeff = parameters.spiral_coeff,
                "moved persisted coefficient into the animation bounds"
            );
        }
        parameters
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn max_n(&self) -> u32 {
        self.max_n
    }

    pub fn spiral_coeff(&self) -> f64 {
        self.spiral_coeff
    }

    pub fn rotation_speed(&self) -> f64 {
        self.rotation_speed
    }

    pub fn dot_size(&self) -> f64 {
        self.dot_size
    }

    pub fn prime_size(&self) -> f64 {
        self.prime_size
    }

    pub fn cluster_count(&self) -> u32 {
        self.cluster_count
    }

    pub fn show_primes(&self) -> bool {
        self.show_primes
    }

    pub fn show_clusters(&self) -> bool {
        self.show_clusters
    }

    pub fn show_rotation(&self) -> bool {
        self.show_rotation
    }

    pub fn use_squares(&self) -> bool {
        self.use_squares
    }

    pub fn instant_render(&self) -> bool {
        self.instant_render
    }

    pub fn animate_spiral_coeff(&self) -> bool {
        self.animate_spiral_coeff
    }

    pub fn spiral_animation_interval(&self) -> Duration {
        Duration::from_millis(self.spiral_animation_speed)
    }

    pub fn spiral_animation_increment(&self) -> f64 {
        self.spiral_animation_increment
    }

    pub fn spiral_animation_min(&self) -> f64 {
        self.spiral_animation_min
    }

    pub fn spiral_animation_max(&self) -> f64 {
        self.spiral_animation_max
    }

    pub fn set_scale(&mut self, value: f64) -> Change {
        assign(
            &mut self.scale,
            value,
            SCALE_RANGE,
            Field::Scale,
            Some(Recompute::Points),
        )
    }

    /// One scroll notch of zoom.
    pub fn zoom(&mut self, zoom: Zoom) -> Change {
        let scale = match zoom {
            Zoom::In => self.scale * ZOOM_STEP,
            Zoom::Out => self.scale / ZOOM_STEP,
        };
        self.set_scale(scale)
    }

    /// Stores the requested bound as is; the generator applies its own cap.
    pub fn set_max_n(&mut self, value: i64) -> Change {
        let value = clamp_count(value, 1);
        if value == self.max_n {
            return Change::default();
        }
        self.max_n = value;
        Change::of(Field::MaxN, Some(Recompute::Points))
    }

    pub fn set_spiral_coeff(&mut self, value: f64) -> Change {
        assign(
            &mut self.spiral_coeff,
            value,
            SPIRAL_COEFF_RANGE,
            Field::SpiralCoeff,
            Some(Recompute::Points),
        )
    }

    pub fn set_rotation_speed(&mut self, value: f64) -> Change {
        assign(
            &mut self.rotation_speed,
            value,
            ROTATION_SPEED_RANGE,
            Field::RotationSpeed,
            None,
        )
    }

    pub fn set_dot_size(&mut self, value: f64) -> Change {
        assign(&mut self.dot_size, value, DOT_SIZE_RANGE, Field::DotSize, None)
    }

    pub fn set_prime_size(&mut self, value: f64) -> Change {
        assign(
            &mut self.prime_size,
            value,
            PRIME_SIZE_RANGE,
            Field::PrimeSize,
            None,
        )
    }

    /// Stores the requested count as is; the simulator applies its own cap.
    pub fn set_cluster_count(&mut self, value: i64) -> Change {
        let value = clamp_count(value, 0);
        if value == self.cluster_count {
            return Change::default();
        }
        self.cluster_count = value;
        Change::of(Field::ClusterCount, Some(Recompute::Clusters))
    }

    pub fn set_spiral_animation_speed(&mut self, millis: i64) -> Change {
        let (min, max) = ANIMATION_SPEED_RANGE;
        let value = millis.max(min as i64).min(max as i64) as u64;
        if value == self.spiral_animation_speed {
            return Change::default();
        }
        self.spiral_animation_speed = value;
        Change::of(Field::SpiralAnimationSpeed, None)
    }

    pub fn set_spiral_animation_increment(&mut self, value: f64) -> Change {
        assign(
            &mut self.spiral_animation_increment,
            value,
            ANIMATION_INCREMENT_RANGE,
            Field::SpiralAnimationIncrement,
            None,
        )
    }

    /// Pushes the upper bound up when the lower bound reaches it.
    pub fn set_spiral_animation_min(&mut self, value: f64) -> Change {
        let mut change = assign(
            &mut self.spiral_animation_min,
            value,
            ANIMATION_MIN_RANGE,
            Field::SpiralAnimationMin,
            None,
        );
        if self.spiral_animation_min >= self.spiral_animation_max {
            self.spiral_animation_max = self.spiral_animation_min + ANIMATION_BOUNDS_GAP;
            change.fields.push(Field::SpiralAnimationMax);
        }
        if !change.is_empty() {
            self.confine_spiral_coeff(&mut change);
        }
        change
    }

    /// Pulls the lower bound down when the upper bound reaches it.
    pub fn set_spiral_animation_max(&mut self, value: f64) -> Change {
        let mut change = assign(
            &mut self.spiral_animation_max,
            value,
            ANIMATION_MAX_RANGE,
            Field::SpiralAnimationMax,
            None,
        );
        if self.spiral_animation_max <= self.spiral_animation_min {
            self.spiral_animation_min = (self.spiral_animation_max - ANIMATION_BOUNDS_GAP)
                .max(ANIMATION_MIN_RANGE.0);
            change.fields.push(Field::SpiralAnimationMin);
        }
        if !change.is_empty() {
            self.confine_spiral_coeff(&mut change);
        }
        change
    }

    /// Pulls the coefficient into the animation bounds.
    fn confine_spiral_coeff(&mut self, change: &mut Change) {
        let confined = self
            .spiral_coeff
            .max(self.spiral_animation_min)
            .min(self.spiral_animation_max);
        if confined != self.spiral_coeff {
            self.spiral_coeff = confined;
            change.fields.push(Field::SpiralCoeff);
            change.recompute = Some(Recompute::Points);
        }
    }

    pub fn toggle(&mut self, field: Field) -> Change {
        match self.flag(field) {
            Some(current) => self.set_flag(field, !current),
            None => Change::default(),
        }
    }

    fn flag(&self, field: Field) -> Option<bool> {
        match field {
            Field::ShowPrimes => Some(self.show_primes),
            Field::ShowClusters => Some(self.show_clusters),
            Field::ShowRotation => Some(self.show_rotation),
            Field::UseSquares => Some(self.use_squares),
            Field::InstantRender => Some(self.instant_render),
            Field::AnimateSpiralCoeff => Some(self.animate_spiral_coeff),
            _ => None,
        }
    }

    fn set_flag(&mut self, field: Field, value: bool) -> Change {
        let slot = match field {
            Field::ShowPrimes => &mut self.show_primes,
            Field::ShowClusters => &mut self.show_clusters,
            Field::ShowRotation => &mut self.show_rotation,
            Field::UseSquares => &mut self.use_squares,
            Field::InstantRender => &mut self.instant_render,
            Field::AnimateSpiralCoeff => &mut self.animate_spiral_coeff,
            _ => return Change::default(),
        };
        if *slot == value {
            return Change::default();
        }
        *slot = value;
        // the culling margin depends on whether the canvas rotates
        let recompute = if field == Field::ShowRotation {
            Some(Recompute::Points)
        } else {
            None
        };
        Change::of(field, recompute)
    }

    /// Current value of `field` in its persisted form.
    pub fn value(&self, field: Field) -> Value {
        match field {
            Field::Scale => json!(self.scale),
            Field::MaxN => json!(self.max_n),
            Field::SpiralCoeff => json!(self.spiral_coeff),
            Field::RotationSpeed => json!(self.rotation_speed),
            Field::DotSize => json!(self.dot_size),
            Field::PrimeSize => json!(self.prime_size),
            Field::ClusterCount => json!(self.cluster_count),
            Field::ShowPrimes => json!(self.show_primes),
            Field::ShowClusters => json!(self.show_clusters),
            Field::ShowRotation => json!(self.show_rotation),
            Field::UseSquares => json!(self.use_squares),
            Field::InstantRender => json!(self.instant_render),
            Field::AnimateSpiralCoeff => json!(self.animate_spiral_coeff),
            Field::SpiralAnimationSpeed => json!(self.spiral_animation_speed),
            Field::SpiralAnimationIncrement => json!(self.spiral_animation_increment),
            Field::SpiralAnimationMin => json!(self.spiral_animation_min),
            Field::SpiralAnimationMax => json!(self.spiral_animation_max),
        }
    }

    /// Applies a persisted value through the same validation as the setters.
    /// Anything unusable resets the field to its default.
    pub fn restore(&mut self, field: Field, value: &Value) -> Change {
        let change = match field {
            Field::Scale => number(value).map(|v| self.set_scale(v)),
            Field::MaxN => number(value).map(|v| self.set_max_n(v as i64)),
            Field::SpiralCoeff => number(value)
                .filter(|v| *v > 0.0)
                .map(|v| self.set_spiral_coeff(v)),
            Field::RotationSpeed => number(value).map(|v| self.set_rotation_speed(v)),
            Field::DotSize => number(value).map(|v| self.set_dot_size(v)),
            Field::PrimeSize => number(value).map(|v| self.set_prime_size(v)),
            Field::ClusterCount => number(value).map(|v| self.set_cluster_count(v as i64)),
            Field::SpiralAnimationSpeed => {
                number(value).map(|v| self.set_spiral_animation_speed(v as i64))
            }
            Field::SpiralAnimationIncrement => {
                number(value).map(|v| self.set_spiral_animation_increment(v))
            }
            Field::SpiralAnimationMin => number(value).map(|v| self.set_spiral_animation_min(v)),
            Field::SpiralAnimationMax => number(value).map(|v| self.set_spiral_animation_max(v)),
            Field::ShowPrimes
            | Field::ShowClusters
            | Field::ShowRotation
            | Field::UseSquares
            | Field::InstantRender
            | Field::AnimateSpiralCoeff => value.as_bool().map(|v| self.set_flag(field, v)),
        };
        match change {
            Some(change) if change.diagnostic.is_none() => change,
            _ => {
                warn!(key = field.key(), %value, "invalid persisted value, using default");
                self.reset(field);
                Change {
                    fields: vec![field],
                    ..Change::rejected(field)
                }
            }
        }
    }

    fn reset(&mut self, field: Field) {
        let defaults = Parameters::default();
        match field {
            Field::Scale => self.scale = defaults.scale,
            Field::MaxN => self.max_n = defaults.max_n,
            Field::SpiralCoeff => self.spiral_coeff = defaults.spiral_coeff,
            Field::RotationSpeed => self.rotation_speed = defaults.rotation_speed,
            Field::DotSize => self.dot_size = defaults.dot_size,
            Field::PrimeSize => self.prime_size = defaults.prime_size,
            Field::ClusterCount => self.cluster_count = defaults.cluster_count,
            Field::ShowPrimes => self.show_primes = defaults.show_primes,
            Field::ShowClusters => self.show_clusters = defaults.show_clusters,
            Field::ShowRotation => self.show_rotation = defaults.show_rotation,
            Field::UseSquares => self.use_squares = defaults.use_squares,
            Field::InstantRender => self.instant_render = defaults.instant_render,
            Field::AnimateSpiralCoeff => self.animate_spiral_coeff = defaults.animate_spiral_coeff,
            Field::SpiralAnimationSpeed => {
                self.spiral_animation_speed = defaults.spiral_animation_speed
            }
            Field::SpiralAnimationIncrement => {
                self.spiral_animation_increment = defaults.spiral_animation_increment
            }
            Field::SpiralAnimationMin => {
                self.spiral_animation_min = defaults.spiral_animation_min
            }
            Field::SpiralAnimationMax => {
                self.spiral_animation_max = defaults.spiral_animation_max
            }
        }
    }
}

fn assign(
    slot: &mut f64,
    value: f64,
    (min, max): (f64, f64),
    field: Field,
    recompute: Option<Recompute>,
) -> Change {
    if !value.is_finite() {
        warn!(key = field.key(), value, "rejected non-finite value");
        return Change::rejected(field);
    }
    let clamped = value.max(min).min(max);
    if clamped != value {
        debug!(key = field.key(), value, clamped, "clamped out-of-range value");
    }
    if *slot == clamped {
        return Change::default();
    }
    *slot = clamped;
    Change::of(field, recompute)
}

fn clamp_count(value: i64, min: u32) -> u32 {
    value.max(min as i64).min(u32::MAX as i64) as u32
}

/// Accepts numbers and numeric strings; rejects anything non-finite.
fn number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}
