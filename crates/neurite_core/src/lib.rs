//! The `neurite_core` crate is a biophysical simulation engine for
//! conductance-based neuron models built from Hodgkin-Huxley-style ion
//! channel dynamics.
//!
//! Key components:
//! - **Traits**: `Scalar` (numeric type abstraction), `DiffEqModule` (the
//!   capability contract for anything with a derivative), `StepEnv` (the
//!   per-stage time/step-size environment).
//! - **State**: `DiffEqState`, a named differential state with a transient
//!   per-stage derivative slot, over scalar, vector or nested values.
//! - **Stepper**: a tableau-driven explicit Runge-Kutta engine
//!   (`general_rk_step`) with a catalogue of named schemes from Euler
//!   through fourth-order Ralston.
//! - **Neuron layer**: single-compartment conductance-based neurons,
//!   classic 1952 squid-axon channels, and a fixed-step simulation runner.

pub mod channels;
pub mod error;
pub mod neuron;
pub mod simulate;
pub mod state;
pub mod stepper;
pub mod tableau;
pub mod traits;
