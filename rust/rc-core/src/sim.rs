//! Stochastic race simulator and the stepping interface the planner consumes.
//!
//! This module is the single place that mutates `RaceState` via rules.

use crate::action::Action;
use crate::problem::{ProblemSpec, BREAKDOWN_IDX, MIN_MOVE, NUM_OUTCOMES, SLIP_IDX};
use crate::state::{RaceState, TirePressure};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_core::SeedableRng;
use std::sync::Arc;

/// Environment stepper: positioned at a state, advanced one action at a time.
pub trait Stepper {
    /// Reposition at `state` with `step` steps already elapsed.
    fn reset(&mut self, state: &RaceState, step: u32);
    /// Apply `action` and return the resulting state.
    fn step(&mut self, action: &Action) -> RaceState;
    /// Steps elapsed so far, including the ones charged by the last `step`.
    fn steps(&self) -> u32;
}

/// Reference transition model backed by a seeded ChaCha8 stream.
pub struct RaceSimulator {
    spec: Arc<ProblemSpec>,
    rng: ChaCha8Rng,
    state: RaceState,
    steps: u32,
}

impl RaceSimulator {
    /// New simulator at the problem's start state, step 0.
    pub fn new(spec: Arc<ProblemSpec>, seed: u64) -> Self {
        let state = spec.start_state();
        Self {
            spec,
            rng: ChaCha8Rng::seed_from_u64(seed),
            state,
            steps: 0,
        }
    }

    pub fn state(&self) -> &RaceState {
        &self.state
    }

    pub fn spec(&self) -> &ProblemSpec {
        &self.spec
    }

    fn drive(&mut self) {
        let spec = &self.spec;
        let s = &mut self.state;

        let per_cell = spec
            .car(&s.car)
            .zip(spec.terrain_at(s.pos))
            .and_then(|(car, terrain)| car.fuel_per_cell.get(&terrain.name).copied())
            .unwrap_or(0);
        let needed = per_cell * s.pressure.fuel_factor();
        if s.fuel < needed {
            // Out of fuel: the car sits still for the step.
            self.steps += 1;
            return;
        }

        let dist = outcome_distribution(spec, s);
        let idx = sample_index(&dist, &mut self.rng);
        match idx {
            SLIP_IDX => self.steps += spec.slip_recovery_time,
            BREAKDOWN_IDX => self.steps += spec.repair_time,
            k => {
                s.fuel -= needed;
                s.pos = (s.pos + MIN_MOVE + k as i32).clamp(1, spec.n);
                self.steps += 1;
            }
        }
    }

    fn change_car(&mut self, car: &str) {
        self.state.car = car.to_string();
        self.state.fuel = self.spec.fuel.max_fuel;
        self.state.pressure = TirePressure::Hundred;
    }

    fn change_tire(&mut self, tire: crate::state::Tire) {
        self.state.tire = tire;
        self.state.pressure = TirePressure::Hundred;
    }

    fn add_fuel(&mut self, amount: u32) {
        self.state.fuel = self.state.fuel.saturating_add(amount).min(self.spec.fuel.max_fuel);
    }
}

impl Stepper for RaceSimulator {
    fn reset(&mut self, state: &RaceState, step: u32) {
        self.state = state.clone();
        self.steps = step;
    }

    fn step(&mut self, action: &Action) -> RaceState {
        match action {
            Action::Move => {
                self.drive();
                return self.state.clone();
            }
            Action::ChangeCar(car) => self.change_car(car),
            Action::ChangeDriver(driver) => self.state.driver = driver.clone(),
            Action::ChangeTire(tire) => self.change_tire(*tire),
            Action::AddFuel(amount) => self.add_fuel(*amount),
            Action::ChangePressure(p) => self.state.pressure = *p,
            Action::ChangeCarAndDriver(car, driver) => {
                self.change_car(car);
                self.state.driver = driver.clone();
            }
            Action::ChangeTireFuelPressure(tire, amount, p) => {
                self.change_tire(*tire);
                self.add_fuel(*amount);
                self.state.pressure = *p;
            }
        }
        self.steps += 1;
        self.state.clone()
    }

    fn steps(&self) -> u32 {
        self.steps
    }
}

/// Outcome distribution for a move from `state`.
///
/// Normalised product of the car, driver and tire distributions; the slip entry is then
/// scaled by terrain and pressure and the vector renormalised. Falls back to the mean of
/// the three distributions when their product vanishes everywhere.
pub fn outcome_distribution(spec: &ProblemSpec, state: &RaceState) -> [f64; NUM_OUTCOMES] {
    let mut out = [1.0f64; NUM_OUTCOMES];
    let parts: [Option<&[f64]>; 3] = [
        spec.car(&state.car).map(|c| c.move_probability.as_slice()),
        spec.driver(&state.driver).map(|d| d.move_probability.as_slice()),
        spec.tire(state.tire).map(|t| t.move_probability.as_slice()),
    ];
    for p in parts.iter().flatten() {
        for (o, &x) in out.iter_mut().zip(p.iter()) {
            *o *= x;
        }
    }

    if !normalise(&mut out) {
        out = [0.0; NUM_OUTCOMES];
        for p in parts.iter().flatten() {
            for (o, &x) in out.iter_mut().zip(p.iter()) {
                *o += x;
            }
        }
        if !normalise(&mut out) {
            // Nothing usable: stand still.
            out = [0.0; NUM_OUTCOMES];
            out[(-MIN_MOVE) as usize] = 1.0;
            return out;
        }
    }

    let terrain_factor = spec.terrain_at(state.pos).map_or(1.0, |t| t.slip_factor);
    out[SLIP_IDX] *= terrain_factor * state.pressure.slip_factor();
    normalise(&mut out);
    out
}

fn normalise(p: &mut [f64; NUM_OUTCOMES]) -> bool {
    let sum: f64 = p.iter().sum();
    if !(sum.is_finite() && sum > 0.0) {
        return false;
    }
    for v in p.iter_mut() {
        *v /= sum;
    }
    true
}

fn sample_index(dist: &[f64; NUM_OUTCOMES], rng: &mut impl Rng) -> usize {
    let u: f64 = rng.gen();
    let mut acc = 0.0;
    let mut last_nonzero = 0;
    for (i, &p) in dist.iter().enumerate() {
        if p > 0.0 {
            last_nonzero = i;
        }
        acc += p;
        if u < acc {
            return i;
        }
    }
    // Rounding left `u` past the cumulative sum.
    last_nonzero
}
