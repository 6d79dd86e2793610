use nalgebra::DVector;

use crate::state::{DiffEqState, StateRef, Value};

/// Capability contract for an ion channel attached to a neuron.
///
/// A channel contributes a transmembrane current as a function of the
/// membrane potential and may own gating variables with their own dynamics.
/// The three hook methods mirror the integration hooks of the owning neuron
/// and are driven by it; `visit_states` exposes the channel's gating states
/// to the stepper through the parent.
///
/// Units follow the usual conductance-based conventions: potentials in mV,
/// conductance densities in mS/cm^2, currents in uA/cm^2, time in ms.
pub trait IonChannel {
    fn pre_integral(&mut self, _v: &DVector<f64>) {}

    /// Writes the derivative of every gating variable, given the membrane
    /// potential of each compartment.
    fn compute_derivative(&mut self, _v: &DVector<f64>) {}

    fn post_integral(&mut self, _v: &DVector<f64>) {}

    /// Transmembrane current density per compartment, with the sign
    /// convention `I = g * (E - V)` (depolarizing currents positive).
    fn current(&self, v: &DVector<f64>) -> DVector<f64>;

    /// Initializes gating variables from the membrane potential.
    fn init_state(&mut self, _v: &DVector<f64>) {}

    /// Resets gating variables to their voltage-dependent steady state.
    fn reset_state(&mut self, _v: &DVector<f64>) {}

    /// Enumerates the channel's differential states for the stepper.
    fn visit_states(&mut self, _f: &mut dyn FnMut(StateRef<'_, f64>)) {}
}

fn gate(st: &DiffEqState<f64>) -> &DVector<f64> {
    match st.value() {
        Value::Vector(v) => v,
        other => panic!("gating variable `{}` must be vector-valued, got {other:?}", st.name()),
    }
}

/// First-order gating kinetics `dx/dt = phi * (alpha(V)(1 - x) - beta(V)x)`.
fn gate_derivative(
    v: &DVector<f64>,
    x: &DVector<f64>,
    phi: f64,
    alpha: impl Fn(f64) -> f64,
    beta: impl Fn(f64) -> f64,
) -> DVector<f64> {
    v.zip_map(x, |v, x| phi * (alpha(v) * (1.0 - x) - beta(v) * x))
}

/// Voltage-dependent steady state `alpha / (alpha + beta)`.
fn gate_steady_state(
    v: &DVector<f64>,
    alpha: impl Fn(f64) -> f64,
    beta: impl Fn(f64) -> f64,
) -> DVector<f64> {
    v.map(|v| {
        let a = alpha(v);
        let b = beta(v);
        a / (a + b)
    })
}

/// Ohmic leakage current, no gating dynamics.
#[derive(Debug, Clone)]
pub struct LeakChannel {
    /// Maximal conductance density (mS/cm^2).
    pub g_max: f64,
    /// Reversal potential (mV).
    pub e_rev: f64,
}

impl LeakChannel {
    pub fn new(g_max: f64, e_rev: f64) -> Self {
        Self { g_max, e_rev }
    }
}

impl IonChannel for LeakChannel {
    fn current(&self, v: &DVector<f64>) -> DVector<f64> {
        v.map(|v| self.g_max * (self.e_rev - v))
    }
}

/// Transient sodium current of the Hodgkin-Huxley 1952 squid-axon model,
/// `I_Na = g_max * m^3 * h * (E - V)` with the original rate functions
/// shifted by `v_sh`.
#[derive(Debug, Clone)]
pub struct SodiumChannelHH1952 {
    pub g_max: f64,
    pub e_rev: f64,
    pub v_sh: f64,
    /// Temperature factor applied to both gating rates.
    pub phi: f64,
    m: DiffEqState<f64>,
    h: DiffEqState<f64>,
}

impl SodiumChannelHH1952 {
    pub fn new(size: usize) -> Self {
        Self {
            g_max: 120.0,
            e_rev: 50.0,
            v_sh: -45.0,
            phi: 1.0,
            m: DiffEqState::new("INa/m", Value::Vector(DVector::zeros(size))),
            h: DiffEqState::new("INa/h", Value::Vector(DVector::zeros(size))),
        }
    }

    fn alpha_m(v_sh: f64) -> impl Fn(f64) -> f64 {
        move |v| {
            let x = v - v_sh - 5.0;
            0.1 * x / (1.0 - (-x / 10.0).exp())
        }
    }

    fn beta_m(v_sh: f64) -> impl Fn(f64) -> f64 {
        move |v| 4.0 * (-(v - v_sh + 20.0) / 18.0).exp()
    }

    fn alpha_h(v_sh: f64) -> impl Fn(f64) -> f64 {
        move |v| 0.07 * (-(v - v_sh + 20.0) / 20.0).exp()
    }

    fn beta_h(v_sh: f64) -> impl Fn(f64) -> f64 {
        move |v| 1.0 / (1.0 + (-(v - v_sh - 10.0) / 10.0).exp())
    }
}

impl IonChannel for SodiumChannelHH1952 {
    fn compute_derivative(&mut self, v: &DVector<f64>) {
        let dm = gate_derivative(
            v,
            gate(&self.m),
            self.phi,
            Self::alpha_m(self.v_sh),
            Self::beta_m(self.v_sh),
        );
        let dh = gate_derivative(
            v,
            gate(&self.h),
            self.phi,
            Self::alpha_h(self.v_sh),
            Self::beta_h(self.v_sh),
        );
        self.m.set_derivative(Value::Vector(dm));
        self.h.set_derivative(Value::Vector(dh));
    }

    fn current(&self, v: &DVector<f64>) -> DVector<f64> {
        let m = gate(&self.m);
        let h = gate(&self.h);
        DVector::from_iterator(
            v.len(),
            v.iter()
                .zip(m.iter().zip(h.iter()))
                .map(|(v, (m, h))| self.g_max * m.powi(3) * h * (self.e_rev - v)),
        )
    }

    fn init_state(&mut self, v: &DVector<f64>) {
        self.reset_state(v);
    }

    fn reset_state(&mut self, v: &DVector<f64>) {
        let m = gate_steady_state(v, Self::alpha_m(self.v_sh), Self::beta_m(self.v_sh));
        let h = gate_steady_state(v, Self::alpha_h(self.v_sh), Self::beta_h(self.v_sh));
        self.m.set_value(Value::Vector(m));
        self.h.set_value(Value::Vector(h));
    }

    fn visit_states(&mut self, f: &mut dyn FnMut(StateRef<'_, f64>)) {
        f(StateRef::DiffEq(&mut self.m));
        f(StateRef::DiffEq(&mut self.h));
    }
}

/// Delayed-rectifier potassium current of the Hodgkin-Huxley 1952 model,
/// `I_K = g_max * n^4 * (E - V)`.
#[derive(Debug, Clone)]
pub struct PotassiumChannelHH1952 {
    pub g_max: f64,
    pub e_rev: f64,
    pub v_sh: f64,
    pub phi: f64,
    n: DiffEqState<f64>,
}

impl PotassiumChannelHH1952 {
    pub fn new(size: usize) -> Self {
        Self {
            g_max: 36.0,
            e_rev: -77.0,
            v_sh: -45.0,
            phi: 1.0,
            n: DiffEqState::new("IK/n", Value::Vector(DVector::zeros(size))),
        }
    }

    fn alpha_n(v_sh: f64) -> impl Fn(f64) -> f64 {
        move |v| {
            let x = v - v_sh + 10.0;
            0.01 * x / (1.0 - (-x / 10.0).exp())
        }
    }

    fn beta_n(v_sh: f64) -> impl Fn(f64) -> f64 {
        move |v| 0.125 * (-(v - v_sh + 20.0) / 80.0).exp()
    }
}

impl IonChannel for PotassiumChannelHH1952 {
    fn compute_derivative(&mut self, v: &DVector<f64>) {
        let dn = gate_derivative(
            v,
            gate(&self.n),
            self.phi,
            Self::alpha_n(self.v_sh),
            Self::beta_n(self.v_sh),
        );
        self.n.set_derivative(Value::Vector(dn));
    }

    fn current(&self, v: &DVector<f64>) -> DVector<f64> {
        let n = gate(&self.n);
        DVector::from_iterator(
            v.len(),
            v.iter()
                .zip(n.iter())
                .map(|(v, n)| self.g_max * n.powi(4) * (self.e_rev - v)),
        )
    }

    fn init_state(&mut self, v: &DVector<f64>) {
        self.reset_state(v);
    }

    fn reset_state(&mut self, v: &DVector<f64>) {
        let n = gate_steady_state(v, Self::alpha_n(self.v_sh), Self::beta_n(self.v_sh));
        self.n.set_value(Value::Vector(n));
    }

    fn visit_states(&mut self, f: &mut dyn FnMut(StateRef<'_, f64>)) {
        f(StateRef::DiffEq(&mut self.n));
    }
}

#[cfg(test)]
mod tests {
    use super::{
        gate, IonChannel, LeakChannel, PotassiumChannelHH1952, SodiumChannelHH1952,
    };
    use nalgebra::DVector;

    #[test]
    fn leak_current_pulls_towards_reversal_potential() {
        let leak = LeakChannel::new(0.3, -54.387);
        let v = DVector::from_vec(vec![-70.0, -54.387, 0.0]);
        let i = leak.current(&v);
        assert!(i[0] > 0.0);
        assert!(i[1].abs() < 1e-12);
        assert!(i[2] < 0.0);
    }

    #[test]
    fn gating_variables_initialize_at_steady_state() {
        // At the steady state alpha(1 - x) = beta * x, so the derivative is
        // exactly zero and the channel is at rest.
        let v = DVector::from_element(2, -65.0);
        let mut na = SodiumChannelHH1952::new(2);
        let mut k = PotassiumChannelHH1952::new(2);
        na.init_state(&v);
        k.init_state(&v);

        na.compute_derivative(&v);
        k.compute_derivative(&v);
        let dm = na.m.derivative().unwrap();
        let dn = k.n.derivative().unwrap();
        match (dm, dn) {
            (
                crate::state::Value::Vector(dm),
                crate::state::Value::Vector(dn),
            ) => {
                assert!(dm.iter().all(|d| d.abs() < 1e-12));
                assert!(dn.iter().all(|d| d.abs() < 1e-12));
            }
            other => panic!("expected vector derivatives, got {other:?}"),
        }
    }

    #[test]
    fn hh1952_gates_match_published_resting_values() {
        // Classic squid-axon values at V = -65 mV: m ~ 0.053, h ~ 0.60,
        // n ~ 0.318.
        let v = DVector::from_element(1, -65.0);
        let mut na = SodiumChannelHH1952::new(1);
        let mut k = PotassiumChannelHH1952::new(1);
        na.init_state(&v);
        k.init_state(&v);

        assert!((gate(&na.m)[0] - 0.0529).abs() < 1e-3);
        assert!((gate(&na.h)[0] - 0.5961).abs() < 1e-3);
        assert!((gate(&k.n)[0] - 0.3177).abs() < 1e-3);
    }

    #[test]
    fn sodium_current_is_depolarizing_below_reversal() {
        let v = DVector::from_element(1, -65.0);
        let mut na = SodiumChannelHH1952::new(1);
        na.init_state(&v);
        let i = na.current(&v);
        assert!(i[0] > 0.0);
    }
}
