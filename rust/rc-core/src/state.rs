//! Race state definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tire models. Catalog order comes from the problem file, not from this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tire {
    AllTerrain,
    Mud,
    LowProfile,
    Performance,
}

impl Tire {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tire::AllTerrain => "all-terrain",
            Tire::Mud => "mud",
            Tire::LowProfile => "low-profile",
            Tire::Performance => "performance",
        }
    }
}

impl fmt::Display for Tire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tire pressure levels.
///
/// Enumeration order (`ALL`) is the order the legal-action generator emits
/// pressure changes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum TirePressure {
    #[serde(rename = "50%")]
    Fifty,
    #[serde(rename = "75%")]
    SeventyFive,
    #[serde(rename = "100%")]
    Hundred,
}

impl TirePressure {
    pub const ALL: [TirePressure; 3] = [
        TirePressure::Fifty,
        TirePressure::SeventyFive,
        TirePressure::Hundred,
    ];

    /// Multiplier applied to the slip probability.
    pub fn slip_factor(&self) -> f64 {
        match self {
            TirePressure::Fifty => 2.0,
            TirePressure::SeventyFive => 1.5,
            TirePressure::Hundred => 1.0,
        }
    }

    /// Multiplier applied to per-cell fuel usage.
    pub fn fuel_factor(&self) -> u32 {
        match self {
            TirePressure::Fifty => 3,
            TirePressure::SeventyFive => 2,
            TirePressure::Hundred => 1,
        }
    }
}

impl fmt::Display for TirePressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TirePressure::Fifty => "50%",
            TirePressure::SeventyFive => "75%",
            TirePressure::Hundred => "100%",
        };
        f.write_str(s)
    }
}

/// Snapshot of the car on the track.
///
/// Equality is structural over every field; the planner relies on it to match
/// simulated outcomes against the real one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct RaceState {
    /// Track cell, 1-based. The goal is cell `n` of the problem.
    pub pos: i32,
    pub car: String,
    pub driver: String,
    pub tire: Tire,
    pub fuel: u32,
    pub pressure: TirePressure,
}

impl fmt::Display for RaceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pos={} car={} driver={} tire={} fuel={} pressure={}",
            self.pos, self.car, self.driver, self.tire, self.fuel, self.pressure
        )
    }
}
