//! Placeholder plant and control laws.
//!
//! Just enough first-order dynamics to make the loop produce a readable
//! trace. Every body keeps its own state and reads only what its position in
//! the schedule allows: `read` for values ordered before it by a rendezvous
//! or written earlier on the same lane, `read_previous` for everything else.

use lockstep_engine::{Signal, TaskContext, TaskId, TaskRegistry};

/// Base period in seconds.
const DT: f64 = 0.005;

const VA_TRIM: f64 = 230.0;
const THRUST_TRIM: f64 = 0.5;
const DRAG: f64 = 0.01;
const THRUST_ACCEL: f64 = DRAG * VA_TRIM / THRUST_TRIM;
const GRAVITY: f64 = 9.81;

const TAU_ENGINE: f64 = 0.5;
const TAU_ELEVATOR: f64 = 0.03;
const TAU_VZ: f64 = 2.0;
const CLIMB_GAIN: f64 = 500.0;

const K_H: f64 = 0.05;
const VZ_LIMIT: f64 = 10.0;
const K_VZ: f64 = 0.01;
const DELTA_E_LIMIT: f64 = 0.3;
const K_VA: f64 = 0.05;

/// Smoothing factor of the 100 Hz filters.
const FILTER_ALPHA: f64 = 0.3;

#[derive(Debug, Clone, Copy)]
struct Plant {
    va: f64,
    vz: f64,
    h: f64,
}

/// One-pole low-pass, seeded by its first sample.
#[derive(Debug, Default)]
struct LowPass {
    state: Option<f64>,
}

impl LowPass {
    fn update(&mut self, sample: f64) -> f64 {
        let next = match self.state {
            Some(prev) => prev + FILTER_ALPHA * (sample - prev),
            None => sample,
        };
        self.state = Some(next);
        next
    }
}

fn lag(current: f64, target: f64, tau: f64) -> f64 {
    current + DT / tau * (target - current)
}

fn filter(registry: &mut TaskRegistry, task: TaskId, raw: Signal, filtered: Signal) {
    let mut lp = LowPass::default();
    registry.register(task, move |ctx: &TaskContext<'_>| {
        ctx.write(filtered, lp.update(ctx.read(raw)));
    });
}

/// Registers a body for every task identifier.
pub fn registry(initial_altitude: f64) -> TaskRegistry {
    let mut registry = TaskRegistry::new();

    let mut thrust = THRUST_TRIM;
    registry.register(TaskId::Engine, move |ctx| {
        thrust = lag(thrust, ctx.read_previous(Signal::ThrottleDemand), TAU_ENGINE);
        ctx.write(Signal::Thrust, thrust);
    });

    let mut delta_e = 0.0;
    registry.register(TaskId::Elevator, move |ctx| {
        delta_e = lag(
            delta_e,
            ctx.read_previous(Signal::ElevatorDemand),
            TAU_ELEVATOR,
        );
        ctx.write(Signal::DeltaE, delta_e);
    });

    let mut plant = Plant {
        va: VA_TRIM,
        vz: 0.0,
        h: initial_altitude,
    };
    registry.register(TaskId::AircraftDynamics, move |ctx| {
        let thrust = ctx.read(Signal::Thrust);
        let delta_e = ctx.read(Signal::DeltaE);

        let va_dot = THRUST_ACCEL * thrust - DRAG * plant.va - GRAVITY * plant.vz / plant.va;
        let vz = lag(plant.vz, CLIMB_GAIN * delta_e, TAU_VZ);
        let az = (vz - plant.vz) / DT;

        plant.va = (plant.va + DT * va_dot).max(1.0);
        plant.vz = vz;
        plant.h += DT * vz;

        ctx.write(Signal::Va, plant.va);
        ctx.write(Signal::Vz, plant.vz);
        ctx.write(Signal::Az, az);
        ctx.write(Signal::Q, az / plant.va);
        ctx.write(Signal::H, plant.h);
    });

    filter(&mut registry, TaskId::HFilter, Signal::H, Signal::HFiltered);
    filter(&mut registry, TaskId::AzFilter, Signal::Az, Signal::AzFiltered);
    filter(&mut registry, TaskId::VzFilter, Signal::Vz, Signal::VzFiltered);
    filter(&mut registry, TaskId::QFilter, Signal::Q, Signal::QFiltered);
    filter(&mut registry, TaskId::VaFilter, Signal::Va, Signal::VaFiltered);

    registry
        .register(TaskId::HCommand, |ctx| {
            ctx.write(Signal::HCommand, ctx.command());
        })
        .register(TaskId::VaCommand, |ctx| {
            ctx.write(Signal::VaCommand, VA_TRIM);
        })
        .register(TaskId::AltitudeHold, |ctx| {
            let error = ctx.read(Signal::HCommand) - ctx.read(Signal::HFiltered);
            ctx.write(Signal::VzCommand, (K_H * error).clamp(-VZ_LIMIT, VZ_LIMIT));
        })
        .register(TaskId::VzControl, |ctx| {
            let error = ctx.read(Signal::VzCommand) - ctx.read(Signal::VzFiltered);
            ctx.write(
                Signal::DeltaEC,
                (K_VZ * error).clamp(-DELTA_E_LIMIT, DELTA_E_LIMIT),
            );
        })
        .register(TaskId::VaControl, |ctx| {
            // The 100 Hz speed estimate has no period before tick 0.
            let va = match ctx.tick() {
                0 => ctx.read(Signal::VaCommand),
                _ => ctx.read_previous(Signal::VaFiltered),
            };
            let error = ctx.read(Signal::VaCommand) - va;
            ctx.write(Signal::DeltaThC, (THRUST_TRIM + K_VA * error).clamp(0.0, 1.0));
        })
        .register(TaskId::ThrottleFinalizer, |ctx| {
            ctx.write(Signal::ThrottleDemand, ctx.read(Signal::DeltaThC));
        })
        .register(TaskId::ElevatorFinalizer, |ctx| {
            ctx.write(Signal::ElevatorDemand, ctx.read(Signal::DeltaEC));
        });

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_every_task() {
        assert!(registry(11_000.0).missing().is_empty());
    }

    #[test]
    fn low_pass_starts_at_first_sample() {
        let mut lp = LowPass::default();
        assert_eq!(lp.update(10.0), 10.0);
        let next = lp.update(20.0);
        assert!(next > 10.0 && next < 20.0);
    }
}
