//! Pluggable physics integration.

use core::fmt::Debug;

use situated_types::{Dimension, MobileEntity, Transform};

/// Integrates the already clamped transform of a body into the transform
/// actually applied, e.g. to add gravity, drag, or collision response.
///
/// Invoked during Solving, after motion limits were enforced, once per
/// action. A place owns at most one engine.
pub trait DynamicsEngine<D: Dimension>: Send + Debug {
    /// Transform to apply to `body` for a step of `dt` seconds.
    fn integrate(&mut self, body: &MobileEntity<D>, clamped: Transform<D>, dt: f64) -> Transform<D>;
}
