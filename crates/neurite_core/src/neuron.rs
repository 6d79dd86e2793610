use nalgebra::DVector;

use crate::channels::IonChannel;
use crate::error::IntegrationError;
use crate::state::{DiffEqState, StateRef, Value};
use crate::stepper::Solver;
use crate::traits::{DiffEqModule, StepEnv};

/// A population of single-compartment conductance-based neurons.
///
/// The membrane obeys `C_m dV/dt = sum_j g_j (E_j - V) + I_ext`, with each
/// attached channel contributing its own conductance and gating dynamics.
/// The membrane potential and every gating variable are differential states
/// advanced together by one stepper call per time step.
pub struct SingleCompartment {
    size: usize,
    /// Membrane capacitance (uF/cm^2).
    pub c_m: f64,
    /// Spike threshold (mV).
    pub v_th: f64,
    v_init: f64,
    v: DiffEqState<f64>,
    channels: Vec<(String, Box<dyn IonChannel>)>,
}

impl SingleCompartment {
    pub fn new(size: usize) -> Self {
        let v_init = -65.0;
        Self {
            size,
            c_m: 1.0,
            v_th: 0.0,
            v_init,
            v: DiffEqState::new("V", Value::Vector(DVector::from_element(size, v_init))),
            channels: Vec::new(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Attaches a named ion channel. Channel order fixes the state
    /// enumeration order seen by the stepper.
    pub fn add_channel(&mut self, name: impl Into<String>, channel: Box<dyn IonChannel>) {
        self.channels.push((name.into(), channel));
    }

    /// Initializes every channel's gating variables from the current
    /// membrane potential. Call once after all channels are attached.
    pub fn init_state(&mut self) {
        let v = self.membrane().clone();
        for (_, channel) in &mut self.channels {
            channel.init_state(&v);
        }
    }

    /// Resets the membrane to its initial potential and every gating
    /// variable to its steady state.
    pub fn reset_state(&mut self) {
        self.v
            .set_value(Value::Vector(DVector::from_element(self.size, self.v_init)));
        let v = self.membrane().clone();
        for (_, channel) in &mut self.channels {
            channel.reset_state(&v);
        }
    }

    /// Current membrane potential per neuron (mV).
    pub fn voltage(&self) -> &DVector<f64> {
        self.membrane()
    }

    fn membrane(&self) -> &DVector<f64> {
        match self.v.value() {
            Value::Vector(v) => v,
            other => unreachable!("membrane potential must be vector-valued, got {other:?}"),
        }
    }

    /// Advances the population by one step of size `dt` under the external
    /// current density `i_ext` (uA/cm^2), returning which neurons crossed
    /// the spike threshold from below during the step.
    pub fn update(
        &mut self,
        solver: Solver,
        t: f64,
        dt: f64,
        i_ext: f64,
    ) -> Result<Vec<bool>, IntegrationError> {
        let last_v = self.membrane().clone();
        solver.step(self, t, dt, &i_ext)?;
        Ok(self.spikes(&last_v))
    }

    fn spikes(&self, last_v: &DVector<f64>) -> Vec<bool> {
        self.membrane()
            .iter()
            .zip(last_v.iter())
            .map(|(next, last)| *last < self.v_th && *next >= self.v_th)
            .collect()
    }
}

impl DiffEqModule<f64> for SingleCompartment {
    type Inputs = f64;

    fn pre_integral(&mut self, _env: &StepEnv<f64>, _i_ext: &f64) {
        let v = self.membrane().clone();
        for (_, channel) in &mut self.channels {
            channel.pre_integral(&v);
        }
    }

    fn compute_derivative(&mut self, _env: &StepEnv<f64>, i_ext: &f64) {
        let v = self.membrane().clone();

        // Total current: external input plus every channel's contribution.
        let mut total = DVector::from_element(self.size, *i_ext);
        for (_, channel) in &self.channels {
            total += channel.current(&v);
        }
        self.v.set_derivative(Value::Vector(total / self.c_m));

        // Gating dynamics.
        for (_, channel) in &mut self.channels {
            channel.compute_derivative(&v);
        }
    }

    fn post_integral(&mut self, _env: &StepEnv<f64>, _i_ext: &f64) {
        let v = self.membrane().clone();
        for (_, channel) in &mut self.channels {
            channel.post_integral(&v);
        }
    }

    fn visit_states(&mut self, f: &mut dyn FnMut(StateRef<'_, f64>)) {
        f(StateRef::DiffEq(&mut self.v));
        for (_, channel) in &mut self.channels {
            channel.visit_states(f);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SingleCompartment;
    use crate::channels::{LeakChannel, PotassiumChannelHH1952, SodiumChannelHH1952};
    use crate::stepper::Solver;

    fn hh_neuron(size: usize) -> SingleCompartment {
        let mut neuron = SingleCompartment::new(size);
        neuron.add_channel("INa", Box::new(SodiumChannelHH1952::new(size)));
        neuron.add_channel("IK", Box::new(PotassiumChannelHH1952::new(size)));
        neuron.add_channel("IL", Box::new(LeakChannel::new(0.3, -54.387)));
        neuron.init_state();
        neuron
    }

    #[test]
    fn resting_neuron_stays_quiescent() {
        // With E_L = -54.387 mV the classic model rests at -65 mV; without
        // stimulation the membrane must not drift or fire.
        let mut neuron = hh_neuron(2);
        let dt = 0.01;
        for i in 0..1000 {
            let spikes = neuron.update(Solver::Rk4, i as f64 * dt, dt, 0.0).unwrap();
            assert!(spikes.iter().all(|s| !s));
        }
        for v in neuron.voltage().iter() {
            assert!((v + 65.0).abs() < 1.0, "membrane drifted to {v}");
        }
    }

    #[test]
    fn stimulated_neuron_fires() {
        let mut neuron = hh_neuron(1);
        let dt = 0.01;
        let mut total_spikes = 0usize;
        for i in 0..2000 {
            let spikes = neuron
                .update(Solver::Rk4, i as f64 * dt, dt, 10.0)
                .unwrap();
            total_spikes += spikes.iter().filter(|s| **s).count();
        }
        assert!(total_spikes >= 1, "expected at least one spike in 20 ms");
        for v in neuron.voltage().iter() {
            assert!((-100.0..60.0).contains(v), "membrane diverged to {v}");
        }
    }

    #[test]
    fn euler_and_rk4_agree_at_small_steps() {
        let dt = 0.001;
        let mut euler = hh_neuron(1);
        let mut rk4 = hh_neuron(1);
        for i in 0..1000 {
            euler.update(Solver::Euler, i as f64 * dt, dt, 5.0).unwrap();
            rk4.update(Solver::Rk4, i as f64 * dt, dt, 5.0).unwrap();
        }
        let dv = (euler.voltage()[0] - rk4.voltage()[0]).abs();
        assert!(dv < 0.5, "Euler and RK4 diverged by {dv} mV");
    }

    #[test]
    fn reset_state_restores_the_initial_potential() {
        let mut neuron = hh_neuron(1);
        let dt = 0.01;
        for i in 0..500 {
            neuron.update(Solver::Rk2, i as f64 * dt, dt, 10.0).unwrap();
        }
        neuron.reset_state();
        assert_eq!(neuron.voltage()[0], -65.0);
    }
}
