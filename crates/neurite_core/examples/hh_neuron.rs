//! The classic Hodgkin-Huxley 1952 squid-axon neuron under a constant
//! current stimulus, integrated with the second-order Runge-Kutta scheme.

use anyhow::Result;

use neurite_core::channels::{LeakChannel, PotassiumChannelHH1952, SodiumChannelHH1952};
use neurite_core::neuron::SingleCompartment;
use neurite_core::simulate::{run, SimulationConfig, Stimulus};
use neurite_core::stepper::Solver;

fn main() -> Result<()> {
    let size = 1;
    let mut neuron = SingleCompartment::new(size);
    neuron.add_channel("INa", Box::new(SodiumChannelHH1952::new(size)));
    neuron.add_channel("IK", Box::new(PotassiumChannelHH1952::new(size)));
    neuron.add_channel("IL", Box::new(LeakChannel::new(0.3, -54.387)));
    neuron.init_state();

    let config = SimulationConfig {
        solver: Solver::Rk2,
        dt: 0.01,
        steps: 10_000,
        stimulus: Stimulus::constant(10.0),
    };
    let record = run(&mut neuron, &config)?;

    let v_max = record
        .voltages
        .iter()
        .map(|step| step[0])
        .fold(f64::NEG_INFINITY, f64::max);
    println!(
        "simulated {} ms: {} spikes, peak membrane potential {:.2} mV",
        config.steps as f64 * config.dt,
        record.spike_count(),
        v_max
    );

    for (t, step) in record.times.iter().zip(&record.spikes) {
        if step[0] {
            println!("spike at t = {t:.2} ms");
        }
    }

    Ok(())
}
