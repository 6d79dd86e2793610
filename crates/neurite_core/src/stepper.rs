use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IntegrationError;
use crate::state::{DiffEqState, StateRef, Value};
use crate::tableau::ButcherTableau;
use crate::traits::{DiffEqModule, Scalar, StepEnv};

/// Stage-update primitive: writes `y0 + dt * sum(coeffs[i] * ks[i])` into
/// the state's value in place.
///
/// `y0` is the state's pre-step snapshot, not its current working value, so
/// repeated stage updates never compound. Fails if the coefficient count
/// does not match the derivative count, or if any derivative's structure
/// disagrees with `y0`.
pub fn rk_update<T: Scalar>(
    state: &mut DiffEqState<T>,
    y0: &Value<T>,
    coeffs: &[f64],
    ks: &[&Value<T>],
    dt: T,
) -> Result<(), IntegrationError> {
    if coeffs.len() != ks.len() {
        return Err(IntegrationError::CoefficientMismatch {
            state: state.name().to_string(),
            coefficients: coeffs.len(),
            derivatives: ks.len(),
        });
    }
    let next = y0
        .blend(dt, coeffs, ks)
        .ok_or_else(|| IntegrationError::ShapeMismatch {
            state: state.name().to_string(),
        })?;
    state.set_value(next);
    Ok(())
}

fn stage_env<T: Scalar>(t: T, dt: T, c: f64) -> StepEnv<T> {
    let c = T::from_f64(c).unwrap();
    StepEnv::new(t + c * dt, dt)
}

fn clear_marks<T, M>(target: &mut M)
where
    T: Scalar,
    M: DiffEqModule<T> + ?Sized,
{
    target.visit_states(&mut |st| match st {
        StateRef::DiffEq(s) => s.clear_derivative(),
        StateRef::Aux(s) => s.clear_written(),
    });
}

/// Gathers each tracked state's derivative after a stage evaluation,
/// verifying that the enumeration still matches the stage-0 integration set.
fn collect_derivatives<T, M>(
    target: &mut M,
    stage: usize,
    names: &[String],
) -> Result<Vec<Value<T>>, IntegrationError>
where
    T: Scalar,
    M: DiffEqModule<T> + ?Sized,
{
    let mut ks = Vec::with_capacity(names.len());
    let mut idx = 0usize;
    let mut fault: Option<IntegrationError> = None;
    target.visit_states(&mut |st| {
        if fault.is_some() {
            return;
        }
        match st {
            StateRef::DiffEq(s) => {
                if idx >= names.len() || s.name() != names[idx] {
                    fault = Some(IntegrationError::StateSetChanged {
                        stage,
                        detail: format!("unexpected differential state `{}`", s.name()),
                    });
                    return;
                }
                match s.take_derivative() {
                    Some(k) => ks.push(k),
                    None => {
                        fault = Some(IntegrationError::MissingDerivative {
                            state: s.name().to_string(),
                            stage,
                        });
                    }
                }
                idx += 1;
            }
            StateRef::Aux(s) => {
                if s.written() {
                    fault = Some(IntegrationError::NonDifferentialWrite {
                        state: s.name().to_string(),
                    });
                }
            }
        }
    });
    if let Some(err) = fault {
        return Err(err);
    }
    if idx != names.len() {
        return Err(IntegrationError::StateSetChanged {
            stage,
            detail: format!(
                "expected {} differential states, found {}",
                names.len(),
                idx
            ),
        });
    }
    Ok(ks)
}

/// Blends every tracked state's value from its pre-step snapshot against the
/// accumulated stage derivatives.
fn blend_states<T, M>(
    target: &mut M,
    stage: usize,
    coeffs: &[f64],
    names: &[String],
    y0: &[Value<T>],
    ks: &[Vec<Value<T>>],
    dt: T,
) -> Result<(), IntegrationError>
where
    T: Scalar,
    M: DiffEqModule<T> + ?Sized,
{
    let mut idx = 0usize;
    let mut fault: Option<IntegrationError> = None;
    target.visit_states(&mut |st| {
        if fault.is_some() {
            return;
        }
        if let StateRef::DiffEq(s) = st {
            if idx >= names.len() || s.name() != names[idx] {
                fault = Some(IntegrationError::StateSetChanged {
                    stage,
                    detail: format!("unexpected differential state `{}`", s.name()),
                });
                return;
            }
            let column: Vec<&Value<T>> = ks.iter().map(|stage_ks| &stage_ks[idx]).collect();
            if let Err(err) = rk_update(s, &y0[idx], coeffs, &column, dt) {
                fault = Some(err);
            }
            idx += 1;
        }
    });
    if let Some(err) = fault {
        return Err(err);
    }
    if idx != names.len() {
        return Err(IntegrationError::StateSetChanged {
            stage,
            detail: format!(
                "expected {} differential states, found {}",
                names.len(),
                idx
            ),
        });
    }
    Ok(())
}

/// Best-effort rollback to the pre-step snapshot on a mid-step failure, so a
/// failed step never leaves a committed value partially overwritten.
fn restore<T, M>(target: &mut M, names: &[String], y0: &[Value<T>])
where
    T: Scalar,
    M: DiffEqModule<T> + ?Sized,
{
    let mut idx = 0usize;
    target.visit_states(&mut |st| {
        if let StateRef::DiffEq(s) = st {
            if idx < names.len() && s.name() == names[idx] {
                s.set_value(y0[idx].clone());
            }
            idx += 1;
        }
    });
}

/// Advances `target` by one explicit Runge-Kutta step of the given tableau.
///
/// Stage 0 evaluates derivatives at the step's start time and discovers the
/// integration set: every differential state the target enumerates must have
/// been written, and no auxiliary state may have been. Later stages blend a
/// working value from the pre-step snapshot with row `a[i]`, re-evaluate,
/// and record new derivatives; the final blend with `b` is the only
/// authoritative commit. `pre_integral` and `post_integral` run exactly once
/// per step, around the stages.
pub fn general_rk_step<T, M>(
    tableau: &ButcherTableau,
    target: &mut M,
    t: T,
    dt: T,
    inputs: &M::Inputs,
) -> Result<(), IntegrationError>
where
    T: Scalar,
    M: DiffEqModule<T> + ?Sized,
{
    // Structural errors abort before any derivative evaluation.
    tableau.validate()?;

    let env = stage_env(t, dt, tableau.c[0]);
    target.pre_integral(&env, inputs);

    // Stage 0: evaluate and partition the touched states.
    clear_marks(target);
    target.compute_derivative(&env, inputs);

    let mut names: Vec<String> = Vec::new();
    let mut y0: Vec<Value<T>> = Vec::new();
    let mut k0: Vec<Value<T>> = Vec::new();
    let mut fault: Option<IntegrationError> = None;
    target.visit_states(&mut |st| {
        if fault.is_some() {
            return;
        }
        match st {
            StateRef::DiffEq(s) => match s.take_derivative() {
                Some(k) => {
                    names.push(s.name().to_string());
                    y0.push(s.value().clone());
                    k0.push(k);
                }
                None => {
                    fault = Some(IntegrationError::MissingDerivative {
                        state: s.name().to_string(),
                        stage: 0,
                    });
                }
            },
            StateRef::Aux(s) => {
                if s.written() {
                    fault = Some(IntegrationError::NonDifferentialWrite {
                        state: s.name().to_string(),
                    });
                }
            }
        }
    });
    if let Some(err) = fault {
        return Err(err);
    }

    let mut ks: Vec<Vec<Value<T>>> = vec![k0];

    // Intermediate stages.
    for stage in 1..tableau.stages() {
        if let Err(err) = blend_states(target, stage, &tableau.a[stage], &names, &y0, &ks, dt) {
            restore(target, &names, &y0);
            return Err(err);
        }
        clear_marks(target);
        let env = stage_env(t, dt, tableau.c[stage]);
        target.compute_derivative(&env, inputs);
        match collect_derivatives(target, stage, &names) {
            Ok(k) => ks.push(k),
            Err(err) => {
                restore(target, &names, &y0);
                return Err(err);
            }
        }
    }

    // Final blend from the pre-step snapshot: the committed result.
    let final_stage = tableau.stages();
    if let Err(err) = blend_states(target, final_stage, &tableau.b, &names, &y0, &ks, dt) {
        restore(target, &names, &y0);
        return Err(err);
    }

    target.post_integral(&StepEnv::new(t + dt, dt), inputs);
    Ok(())
}

/// One explicit Euler step (order 1).
pub fn euler_step<T: Scalar, M: DiffEqModule<T> + ?Sized>(
    target: &mut M,
    t: T,
    dt: T,
    inputs: &M::Inputs,
) -> Result<(), IntegrationError> {
    general_rk_step(&ButcherTableau::euler(), target, t, dt, inputs)
}

/// One explicit midpoint step (order 2).
pub fn midpoint_step<T: Scalar, M: DiffEqModule<T> + ?Sized>(
    target: &mut M,
    t: T,
    dt: T,
    inputs: &M::Inputs,
) -> Result<(), IntegrationError> {
    general_rk_step(&ButcherTableau::midpoint(), target, t, dt, inputs)
}

/// One classic second-order Runge-Kutta step.
pub fn rk2_step<T: Scalar, M: DiffEqModule<T> + ?Sized>(
    target: &mut M,
    t: T,
    dt: T,
    inputs: &M::Inputs,
) -> Result<(), IntegrationError> {
    general_rk_step(&ButcherTableau::rk2(), target, t, dt, inputs)
}

/// One Heun step (order 2).
pub fn heun2_step<T: Scalar, M: DiffEqModule<T> + ?Sized>(
    target: &mut M,
    t: T,
    dt: T,
    inputs: &M::Inputs,
) -> Result<(), IntegrationError> {
    general_rk_step(&ButcherTableau::heun2(), target, t, dt, inputs)
}

/// One Ralston step (order 2).
pub fn ralston2_step<T: Scalar, M: DiffEqModule<T> + ?Sized>(
    target: &mut M,
    t: T,
    dt: T,
    inputs: &M::Inputs,
) -> Result<(), IntegrationError> {
    general_rk_step(&ButcherTableau::ralston2(), target, t, dt, inputs)
}

/// One Kutta third-order step.
pub fn rk3_step<T: Scalar, M: DiffEqModule<T> + ?Sized>(
    target: &mut M,
    t: T,
    dt: T,
    inputs: &M::Inputs,
) -> Result<(), IntegrationError> {
    general_rk_step(&ButcherTableau::rk3(), target, t, dt, inputs)
}

/// One Heun third-order step.
pub fn heun3_step<T: Scalar, M: DiffEqModule<T> + ?Sized>(
    target: &mut M,
    t: T,
    dt: T,
    inputs: &M::Inputs,
) -> Result<(), IntegrationError> {
    general_rk_step(&ButcherTableau::heun3(), target, t, dt, inputs)
}

/// One third-order strong-stability-preserving step.
pub fn ssprk3_step<T: Scalar, M: DiffEqModule<T> + ?Sized>(
    target: &mut M,
    t: T,
    dt: T,
    inputs: &M::Inputs,
) -> Result<(), IntegrationError> {
    general_rk_step(&ButcherTableau::ssprk3(), target, t, dt, inputs)
}

/// One Ralston third-order step.
pub fn ralston3_step<T: Scalar, M: DiffEqModule<T> + ?Sized>(
    target: &mut M,
    t: T,
    dt: T,
    inputs: &M::Inputs,
) -> Result<(), IntegrationError> {
    general_rk_step(&ButcherTableau::ralston3(), target, t, dt, inputs)
}

/// One classic fourth-order Runge-Kutta step.
pub fn rk4_step<T: Scalar, M: DiffEqModule<T> + ?Sized>(
    target: &mut M,
    t: T,
    dt: T,
    inputs: &M::Inputs,
) -> Result<(), IntegrationError> {
    general_rk_step(&ButcherTableau::rk4(), target, t, dt, inputs)
}

/// One Ralston fourth-order step.
pub fn ralston4_step<T: Scalar, M: DiffEqModule<T> + ?Sized>(
    target: &mut M,
    t: T,
    dt: T,
    inputs: &M::Inputs,
) -> Result<(), IntegrationError> {
    general_rk_step(&ButcherTableau::ralston4(), target, t, dt, inputs)
}

/// Named selection of a catalogue tableau. All schemes share the stepping
/// algorithm; only the coefficients differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    Euler,
    Midpoint,
    Rk2,
    Heun2,
    Ralston2,
    Rk3,
    Heun3,
    Ssprk3,
    Ralston3,
    Rk4,
    Ralston4,
}

impl Solver {
    pub fn tableau(&self) -> ButcherTableau {
        match self {
            Solver::Euler => ButcherTableau::euler(),
            Solver::Midpoint => ButcherTableau::midpoint(),
            Solver::Rk2 => ButcherTableau::rk2(),
            Solver::Heun2 => ButcherTableau::heun2(),
            Solver::Ralston2 => ButcherTableau::ralston2(),
            Solver::Rk3 => ButcherTableau::rk3(),
            Solver::Heun3 => ButcherTableau::heun3(),
            Solver::Ssprk3 => ButcherTableau::ssprk3(),
            Solver::Ralston3 => ButcherTableau::ralston3(),
            Solver::Rk4 => ButcherTableau::rk4(),
            Solver::Ralston4 => ButcherTableau::ralston4(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Solver::Euler => "euler",
            Solver::Midpoint => "midpoint",
            Solver::Rk2 => "rk2",
            Solver::Heun2 => "heun2",
            Solver::Ralston2 => "ralston2",
            Solver::Rk3 => "rk3",
            Solver::Heun3 => "heun3",
            Solver::Ssprk3 => "ssprk3",
            Solver::Ralston3 => "ralston3",
            Solver::Rk4 => "rk4",
            Solver::Ralston4 => "ralston4",
        }
    }

    /// Every catalogue entry, in definition order.
    pub fn all() -> [Solver; 11] {
        [
            Solver::Euler,
            Solver::Midpoint,
            Solver::Rk2,
            Solver::Heun2,
            Solver::Ralston2,
            Solver::Rk3,
            Solver::Heun3,
            Solver::Ssprk3,
            Solver::Ralston3,
            Solver::Rk4,
            Solver::Ralston4,
        ]
    }

    pub fn step<T, M>(
        &self,
        target: &mut M,
        t: T,
        dt: T,
        inputs: &M::Inputs,
    ) -> Result<(), IntegrationError>
    where
        T: Scalar,
        M: DiffEqModule<T> + ?Sized,
    {
        general_rk_step(&self.tableau(), target, t, dt, inputs)
    }
}

impl FromStr for Solver {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Solver::all()
            .into_iter()
            .find(|solver| solver.name() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown solver `{s}`"))
    }
}
