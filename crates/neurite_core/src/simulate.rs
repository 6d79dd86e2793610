use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::neuron::SingleCompartment;
use crate::stepper::Solver;

/// A square current pulse (uA/cm^2), active on `[onset, offset)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Stimulus {
    pub onset: f64,
    pub offset: f64,
    pub amplitude: f64,
}

impl Stimulus {
    /// A stimulus active for the whole run.
    pub fn constant(amplitude: f64) -> Self {
        Self {
            onset: 0.0,
            offset: f64::INFINITY,
            amplitude,
        }
    }

    pub fn pulse(onset: f64, offset: f64, amplitude: f64) -> Self {
        Self {
            onset,
            offset,
            amplitude,
        }
    }

    fn at(&self, t: f64) -> f64 {
        if t >= self.onset && t < self.offset {
            self.amplitude
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub solver: Solver,
    /// Step size (ms).
    pub dt: f64,
    pub steps: usize,
    pub stimulus: Stimulus,
}

/// Per-step record of a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRecord {
    /// Time at the end of each step (ms).
    pub times: Vec<f64>,
    /// Membrane potential of every neuron after each step (mV).
    pub voltages: Vec<Vec<f64>>,
    /// Threshold crossings during each step.
    pub spikes: Vec<Vec<bool>>,
}

impl SimulationRecord {
    /// Total spike count across all neurons and steps.
    pub fn spike_count(&self) -> usize {
        self.spikes
            .iter()
            .map(|step| step.iter().filter(|s| **s).count())
            .sum()
    }
}

/// Drives the fixed-step integration loop over a time horizon.
pub fn run(neuron: &mut SingleCompartment, config: &SimulationConfig) -> Result<SimulationRecord> {
    if config.dt <= 0.0 {
        bail!("dt must be positive, got {}.", config.dt);
    }
    if config.steps == 0 {
        bail!("Simulation must run for at least one step.");
    }

    let mut record = SimulationRecord {
        times: Vec::with_capacity(config.steps),
        voltages: Vec::with_capacity(config.steps),
        spikes: Vec::with_capacity(config.steps),
    };

    for step in 0..config.steps {
        let t = step as f64 * config.dt;
        let spikes = neuron
            .update(config.solver, t, config.dt, config.stimulus.at(t))
            .with_context(|| format!("integration failed at t = {t} ms"))?;
        record.times.push(t + config.dt);
        record.voltages.push(neuron.voltage().iter().copied().collect());
        record.spikes.push(spikes);
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::{run, SimulationConfig, SimulationRecord, Stimulus};
    use crate::channels::{LeakChannel, PotassiumChannelHH1952, SodiumChannelHH1952};
    use crate::neuron::SingleCompartment;
    use crate::stepper::Solver;

    fn hh_neuron() -> SingleCompartment {
        let mut neuron = SingleCompartment::new(1);
        neuron.add_channel("INa", Box::new(SodiumChannelHH1952::new(1)));
        neuron.add_channel("IK", Box::new(PotassiumChannelHH1952::new(1)));
        neuron.add_channel("IL", Box::new(LeakChannel::new(0.3, -54.387)));
        neuron.init_state();
        neuron
    }

    #[test]
    fn rejects_invalid_configuration() {
        let mut neuron = hh_neuron();
        let bad_dt = SimulationConfig {
            solver: Solver::Rk4,
            dt: 0.0,
            steps: 10,
            stimulus: Stimulus::constant(0.0),
        };
        assert!(run(&mut neuron, &bad_dt).is_err());

        let no_steps = SimulationConfig {
            solver: Solver::Rk4,
            dt: 0.01,
            steps: 0,
            stimulus: Stimulus::constant(0.0),
        };
        assert!(run(&mut neuron, &no_steps).is_err());
    }

    #[test]
    fn record_has_one_entry_per_step() {
        let mut neuron = hh_neuron();
        let config = SimulationConfig {
            solver: Solver::Rk2,
            dt: 0.01,
            steps: 100,
            stimulus: Stimulus::constant(0.0),
        };
        let record: SimulationRecord = run(&mut neuron, &config).unwrap();
        assert_eq!(record.times.len(), 100);
        assert_eq!(record.voltages.len(), 100);
        assert_eq!(record.spikes.len(), 100);
        assert!((record.times[99] - 1.0).abs() < 1e-9);
        assert_eq!(record.voltages[0].len(), 1);
    }

    #[test]
    fn pulse_stimulus_triggers_spikes_only_after_onset() {
        let mut neuron = hh_neuron();
        let config = SimulationConfig {
            solver: Solver::Rk4,
            dt: 0.01,
            steps: 3000,
            stimulus: Stimulus::pulse(10.0, 30.0, 10.0),
        };
        let record = run(&mut neuron, &config).unwrap();
        assert!(record.spike_count() >= 1);
        // No spikes before the pulse starts at t = 10 ms.
        let pre_onset = &record.spikes[..999];
        assert!(pre_onset.iter().all(|step| step.iter().all(|s| !s)));
    }
}
