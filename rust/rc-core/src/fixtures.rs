//! Small in-memory problems for tests and benches (feature `fixtures`).

use crate::problem::{
    CarSpec, DriverSpec, FuelRules, ProblemSpec, TerrainSpec, TireSpec, NUM_OUTCOMES,
};
use crate::state::Tire;
use std::collections::BTreeMap;

/// Every move advances exactly one cell.
pub const ALWAYS_ONE: [f64; NUM_OUTCOMES] =
    [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];

/// Mostly forward, with some backward moves, slips and breakdowns.
pub const NOISY: [f64; NUM_OUTCOMES] =
    [0.02, 0.02, 0.03, 0.05, 0.08, 0.2, 0.25, 0.15, 0.08, 0.02, 0.06, 0.04];

/// Single-terrain track of length `n` where every catalog entry shares `dist`.
pub fn problem(
    level: u8,
    n: i32,
    max_t: u32,
    cars: &[&str],
    drivers: &[&str],
    tires: &[Tire],
    dist: [f64; NUM_OUTCOMES],
) -> ProblemSpec {
    let fuel_per_cell: BTreeMap<String, u32> = [("asphalt".to_string(), 1)].into_iter().collect();
    ProblemSpec {
        level,
        max_t,
        n,
        slip_recovery_time: 2,
        repair_time: 3,
        terrains: vec![TerrainSpec {
            name: "asphalt".to_string(),
            slip_factor: 1.0,
        }],
        track: vec!["asphalt".to_string(); n.max(0) as usize],
        cars: cars
            .iter()
            .map(|&name| CarSpec {
                name: name.to_string(),
                move_probability: dist.to_vec(),
                fuel_per_cell: fuel_per_cell.clone(),
            })
            .collect(),
        drivers: drivers
            .iter()
            .map(|&name| DriverSpec {
                name: name.to_string(),
                move_probability: dist.to_vec(),
            })
            .collect(),
        tires: tires
            .iter()
            .map(|&model| TireSpec {
                model,
                move_probability: dist.to_vec(),
            })
            .collect(),
        fuel: FuelRules::default(),
    }
}

/// Level-1 two-car/two-driver/one-tire problem on a 10-cell track.
pub fn alpha_beta() -> ProblemSpec {
    problem(
        1,
        10,
        30,
        &["Alpha", "Beta"],
        &["Xen", "Yor"],
        &[Tire::AllTerrain],
        ALWAYS_ONE,
    )
}
