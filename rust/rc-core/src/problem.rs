//! Problem definition: track, catalogs, step limits and level.
//!
//! A problem file is YAML. It is validated on load so the planner and simulator can rely
//! on catalogs being non-empty, names resolving and distributions being well formed.

use crate::state::{RaceState, Tire, TirePressure};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Number of move outcomes: moves -4..=5, slip, breakdown.
pub const NUM_OUTCOMES: usize = 12;
/// Move distance of outcome index 0.
pub const MIN_MOVE: i32 = -4;
/// Outcome index of a slip.
pub const SLIP_IDX: usize = 10;
/// Outcome index of a breakdown.
pub const BREAKDOWN_IDX: usize = 11;

/// Highest level; the legal-action generator gates families on levels 2, 4 and 5.
pub const MAX_LEVEL: u8 = 5;

#[derive(Error, Debug)]
pub enum ProblemError {
    #[error("Failed to read problem file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid problem: {msg}")]
    Invalid { msg: String },
}

fn invalid(msg: impl Into<String>) -> ProblemError {
    ProblemError::Invalid { msg: msg.into() }
}

/// Terrain type referenced by name from `track` and from cars' fuel tables.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TerrainSpec {
    pub name: String,
    /// Multiplier applied to the slip probability on this terrain.
    #[serde(default = "default_slip_factor")]
    pub slip_factor: f64,
}

fn default_slip_factor() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CarSpec {
    pub name: String,
    pub move_probability: Vec<f64>,
    /// Fuel used per move, keyed by terrain name.
    pub fuel_per_cell: std::collections::BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverSpec {
    pub name: String,
    pub move_probability: Vec<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TireSpec {
    pub model: Tire,
    pub move_probability: Vec<f64>,
}

/// Fuel thresholds used by the legal-action generator and the simulator.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct FuelRules {
    /// Tank capacity; a new car starts full.
    #[serde(default = "default_max_fuel")]
    pub max_fuel: u32,
    /// Refuelling is offered only below this level.
    #[serde(default = "default_refuel_below")]
    pub refuel_below: u32,
    /// Units added by one refuel action.
    #[serde(default = "default_refuel_amount")]
    pub refuel_amount: u32,
}

fn default_max_fuel() -> u32 {
    50
}

fn default_refuel_below() -> u32 {
    20
}

fn default_refuel_amount() -> u32 {
    10
}

impl Default for FuelRules {
    fn default() -> Self {
        Self {
            max_fuel: default_max_fuel(),
            refuel_below: default_refuel_below(),
            refuel_amount: default_refuel_amount(),
        }
    }
}

/// Root problem structure.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProblemSpec {
    /// Unlocked capability tier, 1..=5.
    pub level: u8,
    /// Step budget for one episode.
    pub max_t: u32,
    /// Goal cell; also the track length.
    pub n: i32,
    #[serde(default = "default_slip_recovery_time")]
    pub slip_recovery_time: u32,
    #[serde(default = "default_repair_time")]
    pub repair_time: u32,
    pub terrains: Vec<TerrainSpec>,
    /// Terrain name of each cell, cell 1 first.
    pub track: Vec<String>,
    pub cars: Vec<CarSpec>,
    pub drivers: Vec<DriverSpec>,
    pub tires: Vec<TireSpec>,
    #[serde(default)]
    pub fuel: FuelRules,
}

fn default_slip_recovery_time() -> u32 {
    2
}

fn default_repair_time() -> u32 {
    3
}

impl ProblemSpec {
    /// Load and validate a problem from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ProblemError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Parse and validate a problem from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ProblemError> {
        let spec: ProblemSpec = serde_yaml::from_str(yaml)?;
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), ProblemError> {
        if self.level == 0 || self.level > MAX_LEVEL {
            return Err(invalid(format!("level must be in 1..={MAX_LEVEL}")));
        }
        if self.n < 1 {
            return Err(invalid("n must be >= 1"));
        }
        if self.max_t == 0 {
            return Err(invalid("max_t must be > 0"));
        }
        if self.track.len() != self.n as usize {
            return Err(invalid(format!(
                "track has {} cells, expected n={}",
                self.track.len(),
                self.n
            )));
        }
        if self.terrains.is_empty() {
            return Err(invalid("terrains must not be empty"));
        }
        for t in &self.terrains {
            if !(t.slip_factor.is_finite() && t.slip_factor >= 0.0) {
                return Err(invalid(format!(
                    "terrain {}: slip_factor must be finite and >= 0",
                    t.name
                )));
            }
        }
        for cell in &self.track {
            if self.terrain(cell).is_none() {
                return Err(invalid(format!("track references unknown terrain {cell}")));
            }
        }
        if self.cars.is_empty() || self.drivers.is_empty() || self.tires.is_empty() {
            return Err(invalid("car, driver and tire catalogs must not be empty"));
        }
        ensure_unique(self.cars.iter().map(|c| c.name.as_str()), "car")?;
        ensure_unique(self.drivers.iter().map(|d| d.name.as_str()), "driver")?;
        ensure_unique(self.tires.iter().map(|t| t.model.as_str()), "tire")?;
        for c in &self.cars {
            check_distribution(&c.move_probability, &format!("car {}", c.name))?;
            for t in &self.terrains {
                if !c.fuel_per_cell.contains_key(&t.name) {
                    return Err(invalid(format!(
                        "car {} has no fuel_per_cell entry for terrain {}",
                        c.name, t.name
                    )));
                }
            }
        }
        for d in &self.drivers {
            check_distribution(&d.move_probability, &format!("driver {}", d.name))?;
        }
        for t in &self.tires {
            check_distribution(&t.move_probability, &format!("tire {}", t.model))?;
        }
        if self.fuel.max_fuel == 0 {
            return Err(invalid("fuel.max_fuel must be > 0"));
        }
        if self.fuel.refuel_amount == 0 || self.fuel.refuel_amount > self.fuel.max_fuel {
            return Err(invalid("fuel.refuel_amount must be in 1..=max_fuel"));
        }
        if self.fuel.refuel_below > self.fuel.max_fuel {
            return Err(invalid("fuel.refuel_below must be <= max_fuel"));
        }
        Ok(())
    }

    /// Car catalog in problem order.
    pub fn car_order(&self) -> impl Iterator<Item = &str> + '_ {
        self.cars.iter().map(|c| c.name.as_str())
    }

    /// Driver catalog in problem order.
    pub fn driver_order(&self) -> impl Iterator<Item = &str> + '_ {
        self.drivers.iter().map(|d| d.name.as_str())
    }

    /// Tire catalog in problem order.
    pub fn tire_order(&self) -> impl Iterator<Item = Tire> + '_ {
        self.tires.iter().map(|t| t.model)
    }

    pub fn car(&self, name: &str) -> Option<&CarSpec> {
        self.cars.iter().find(|c| c.name == name)
    }

    pub fn driver(&self, name: &str) -> Option<&DriverSpec> {
        self.drivers.iter().find(|d| d.name == name)
    }

    pub fn tire(&self, model: Tire) -> Option<&TireSpec> {
        self.tires.iter().find(|t| t.model == model)
    }

    pub fn terrain(&self, name: &str) -> Option<&TerrainSpec> {
        self.terrains.iter().find(|t| t.name == name)
    }

    /// Terrain of a 1-based cell. Positions outside the track are clamped.
    pub fn terrain_at(&self, pos: i32) -> Option<&TerrainSpec> {
        let idx = (pos.clamp(1, self.n) - 1) as usize;
        self.track.get(idx).and_then(|name| self.terrain(name))
    }

    /// Start of every episode: cell 1, first catalog entries, full tank, 100% pressure.
    pub fn start_state(&self) -> RaceState {
        RaceState {
            pos: 1,
            car: self.cars.first().map(|c| c.name.clone()).unwrap_or_default(),
            driver: self
                .drivers
                .first()
                .map(|d| d.name.clone())
                .unwrap_or_default(),
            tire: self.tires.first().map_or(Tire::AllTerrain, |t| t.model),
            fuel: self.fuel.max_fuel,
            pressure: TirePressure::Hundred,
        }
    }

    /// True when an episode cannot continue from `(state, step)`.
    pub fn is_terminal(&self, state: &RaceState, step: u32) -> bool {
        step >= self.max_t || state.pos == self.n
    }
}

fn ensure_unique<'a>(names: impl Iterator<Item = &'a str>, what: &str) -> Result<(), ProblemError> {
    let mut seen = std::collections::BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(invalid(format!("duplicate {what} {name}")));
        }
    }
    Ok(())
}

fn check_distribution(p: &[f64], what: &str) -> Result<(), ProblemError> {
    if p.len() != NUM_OUTCOMES {
        return Err(invalid(format!(
            "{what}: move_probability needs {NUM_OUTCOMES} entries, got {}",
            p.len()
        )));
    }
    if p.iter().any(|&x| !(x.is_finite() && x >= 0.0)) {
        return Err(invalid(format!(
            "{what}: probabilities must be finite and >= 0"
        )));
    }
    let sum: f64 = p.iter().sum();
    if (sum - 1.0).abs() > 1e-6 {
        return Err(invalid(format!("{what}: probabilities sum to {sum}, not 1")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"
level: 2
max_t: 12
n: 5
terrains:
  - name: asphalt
  - name: mud
    slip_factor: 2.0
track: [asphalt, asphalt, mud, asphalt, asphalt]
cars:
  - name: fast
    move_probability: [0.0, 0.0, 0.0, 0.0, 0.1, 0.2, 0.3, 0.2, 0.1, 0.0, 0.05, 0.05]
    fuel_per_cell: { asphalt: 2, mud: 4 }
drivers:
  - name: ace
    move_probability: [0.0, 0.0, 0.0, 0.0, 0.1, 0.2, 0.3, 0.2, 0.1, 0.0, 0.05, 0.05]
tires:
  - model: all-terrain
    move_probability: [0.0, 0.0, 0.0, 0.0, 0.1, 0.2, 0.3, 0.2, 0.1, 0.0, 0.05, 0.05]
"#;

    #[test]
    fn parses_and_applies_defaults() {
        let spec = ProblemSpec::from_yaml(SMALL).expect("valid problem");
        assert_eq!(spec.level, 2);
        assert_eq!(spec.slip_recovery_time, 2);
        assert_eq!(spec.repair_time, 3);
        assert_eq!(spec.fuel.max_fuel, 50);
        assert_eq!(spec.fuel.refuel_below, 20);
        assert_eq!(spec.fuel.refuel_amount, 10);
        assert_eq!(spec.terrain("asphalt").unwrap().slip_factor, 1.0);
        assert_eq!(spec.terrain_at(3).unwrap().name, "mud");
        // Clamped to the track.
        assert_eq!(spec.terrain_at(0).unwrap().name, "asphalt");
        assert_eq!(spec.terrain_at(99).unwrap().name, "asphalt");
    }

    #[test]
    fn start_state_uses_first_catalog_entries() {
        let spec = ProblemSpec::from_yaml(SMALL).unwrap();
        let s = spec.start_state();
        assert_eq!(s.pos, 1);
        assert_eq!(s.car, "fast");
        assert_eq!(s.driver, "ace");
        assert_eq!(s.tire, Tire::AllTerrain);
        assert_eq!(s.fuel, 50);
        assert_eq!(s.pressure, TirePressure::Hundred);
    }

    #[test]
    fn terminal_at_goal_or_out_of_steps() {
        let spec = ProblemSpec::from_yaml(SMALL).unwrap();
        let mut s = spec.start_state();
        assert!(!spec.is_terminal(&s, 0));
        assert!(spec.is_terminal(&s, 12));
        s.pos = 5;
        assert!(spec.is_terminal(&s, 0));
    }

    #[test]
    fn rejects_track_length_mismatch() {
        let yaml = SMALL.replace("n: 5", "n: 6");
        let err = ProblemSpec::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, ProblemError::Invalid { .. }), "{err}");
    }

    #[test]
    fn rejects_bad_distribution() {
        let yaml = SMALL.replacen("0.3, 0.2, 0.1, 0.0, 0.05, 0.05]", "0.3, 0.2, 0.1, 0.0, 0.05]", 1);
        let err = ProblemSpec::from_yaml(&yaml).unwrap_err().to_string();
        assert!(err.contains("12 entries"), "{err}");
    }

    #[test]
    fn rejects_unknown_terrain_and_level() {
        let yaml = SMALL.replace("track: [asphalt, asphalt, mud", "track: [asphalt, asphalt, ice");
        assert!(ProblemSpec::from_yaml(&yaml).is_err());

        let yaml = SMALL.replace("level: 2", "level: 6");
        assert!(ProblemSpec::from_yaml(&yaml).is_err());
    }

    #[test]
    fn rejects_duplicate_catalog_entries() {
        let yaml = SMALL.replace(
            "tires:\n  - model: all-terrain",
            "tires:\n  - model: mud\n    move_probability: [0.0, 0.0, 0.0, 0.0, 0.1, 0.2, 0.3, 0.2, 0.1, 0.0, 0.05, 0.05]\n  - model: mud",
        );
        let err = ProblemSpec::from_yaml(&yaml).unwrap_err().to_string();
        assert!(err.contains("duplicate tire"), "{err}");
    }

    #[test]
    fn rejects_fuel_rules_outside_tank() {
        for fuel in [
            "fuel: { refuel_amount: 4294967295 }",
            "fuel: { refuel_amount: 0 }",
            "fuel: { max_fuel: 30, refuel_amount: 31 }",
            "fuel: { max_fuel: 30, refuel_below: 40 }",
        ] {
            let yaml = format!("{SMALL}{fuel}\n");
            let msg = ProblemSpec::from_yaml(&yaml).unwrap_err().to_string();
            assert!(msg.contains("fuel."), "{fuel}: {msg}");
        }
        let yaml = format!("{SMALL}fuel: {{ max_fuel: 30, refuel_below: 30, refuel_amount: 30 }}\n");
        assert!(ProblemSpec::from_yaml(&yaml).is_ok());
    }

    #[test]
    fn invalid_yaml_fails() {
        assert!(matches!(
            ProblemSpec::from_yaml("this is not: valid: yaml: {{{}}}"),
            Err(ProblemError::Yaml(_))
        ));
    }
}
