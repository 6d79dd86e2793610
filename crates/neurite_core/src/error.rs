use thiserror::Error;

/// Failures raised by the integration engine.
///
/// All of these are fatal: a step either completes fully or aborts without
/// committing a partial update. None of them are retriable, since repeating
/// a numerically defined step cannot change its outcome.
#[derive(Debug, Error)]
pub enum IntegrationError {
    /// The Butcher tableau violates the shape invariants of an explicit
    /// Runge-Kutta method.
    #[error("malformed Butcher tableau: {reason}")]
    MalformedTableau { reason: String },

    /// The number of blending coefficients does not match the number of
    /// accumulated stage derivatives.
    #[error(
        "state `{state}`: {coefficients} blending coefficients for {derivatives} stage derivatives"
    )]
    CoefficientMismatch {
        state: String,
        coefficients: usize,
        derivatives: usize,
    },

    /// A differential state reachable from the target was not assigned a
    /// derivative during a stage evaluation. The model definition is
    /// incomplete.
    #[error("differential state `{state}` was not assigned a derivative during stage {stage}")]
    MissingDerivative { state: String, stage: usize },

    /// A non-differential state was written while evaluating derivatives.
    /// Derivative computation must be side-effect-free except through
    /// differential states.
    #[error(
        "state `{state}` is not a differential state but was written during derivative evaluation"
    )]
    NonDifferentialWrite { state: String },

    /// The set of states enumerated by the target changed between stages of
    /// a single step.
    #[error("state set changed during step at stage {stage}: {detail}")]
    StateSetChanged { stage: usize, detail: String },

    /// A derivative's structure does not match the structure of the value it
    /// would be blended into.
    #[error("shape mismatch while blending state `{state}`")]
    ShapeMismatch { state: String },
}
