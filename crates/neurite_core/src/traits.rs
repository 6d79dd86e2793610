use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

use crate::state::StateRef;

/// A trait for types that can be used as scalars by the integration engine.
/// Must support basic arithmetic, debug printing, and conversion from f64.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// Per-stage integration environment.
///
/// Replaces a process-wide environment: the stepper constructs one of these
/// for every stage, carrying the stage's offset time and the step size.
#[derive(Debug, Clone, Copy)]
pub struct StepEnv<T: Scalar> {
    /// Simulated time at which the current evaluation takes place.
    pub t: T,
    /// Step size of the enclosing integration step.
    pub dt: T,
}

impl<T: Scalar> StepEnv<T> {
    pub fn new(t: T, dt: T) -> Self {
        Self { t, dt }
    }
}

/// Capability contract for anything the engine can integrate.
///
/// An implementor owns a set of differential states and knows how to compute
/// their instantaneous derivatives. The three hooks receive the same typed
/// inputs; `pre_integral` and `post_integral` run once per step, while
/// `compute_derivative` runs once per Runge-Kutta stage.
pub trait DiffEqModule<T: Scalar> {
    /// External per-step inputs (e.g. stimulus current) forwarded verbatim
    /// to every hook.
    type Inputs;

    /// Invoked once before any stage of a step.
    fn pre_integral(&mut self, _env: &StepEnv<T>, _inputs: &Self::Inputs) {}

    /// Writes the instantaneous derivative of every owned differential
    /// state. Must not mutate anything else.
    fn compute_derivative(&mut self, env: &StepEnv<T>, inputs: &Self::Inputs);

    /// Invoked once after the final blend of a step.
    fn post_integral(&mut self, _env: &StepEnv<T>, _inputs: &Self::Inputs) {}

    /// Enumerates every owned state, differential or not, in a fixed order.
    ///
    /// This is how the engine discovers the dynamic set of states that
    /// participate in integration; the order must be identical on every
    /// invocation within one step.
    fn visit_states(&mut self, f: &mut dyn FnMut(StateRef<'_, T>));
}
