//! Action space definition.
//!
//! Eight action families (A1..A8). Levels unlock the later families; see
//! [`crate::legal`] for which ones are offered in a given state.

use crate::state::{Tire, TirePressure};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Concrete action, including its payload.
///
/// Two actions are the same action iff they compare equal, so `Action` itself is the
/// key of a state's action children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Action {
    /// A1: drive forward one stochastic move.
    Move,
    /// A2
    ChangeCar(String),
    /// A3
    ChangeDriver(String),
    /// A4
    ChangeTire(Tire),
    /// A5: add this many units of fuel.
    AddFuel(u32),
    /// A6
    ChangePressure(TirePressure),
    /// A7
    ChangeCarAndDriver(String, String),
    /// A8: tire, fuel amount, pressure.
    ChangeTireFuelPressure(Tire, u32, TirePressure),
}

/// Action family tag, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub enum ActionKind {
    Move,
    ChangeCar,
    ChangeDriver,
    ChangeTire,
    AddFuel,
    ChangePressure,
    ChangeCarAndDriver,
    ChangeTireFuelPressure,
}

impl ActionKind {
    /// Short code used in logs (`A1`..`A8`).
    pub fn code(&self) -> &'static str {
        match self {
            ActionKind::Move => "A1",
            ActionKind::ChangeCar => "A2",
            ActionKind::ChangeDriver => "A3",
            ActionKind::ChangeTire => "A4",
            ActionKind::AddFuel => "A5",
            ActionKind::ChangePressure => "A6",
            ActionKind::ChangeCarAndDriver => "A7",
            ActionKind::ChangeTireFuelPressure => "A8",
        }
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Move => ActionKind::Move,
            Action::ChangeCar(_) => ActionKind::ChangeCar,
            Action::ChangeDriver(_) => ActionKind::ChangeDriver,
            Action::ChangeTire(_) => ActionKind::ChangeTire,
            Action::AddFuel(_) => ActionKind::AddFuel,
            Action::ChangePressure(_) => ActionKind::ChangePressure,
            Action::ChangeCarAndDriver(_, _) => ActionKind::ChangeCarAndDriver,
            Action::ChangeTireFuelPressure(_, _, _) => ActionKind::ChangeTireFuelPressure,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, Action::Move)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.kind().code();
        match self {
            Action::Move => f.write_str(code),
            Action::ChangeCar(c) => write!(f, "{code}:{c}"),
            Action::ChangeDriver(d) => write!(f, "{code}:{d}"),
            Action::ChangeTire(t) => write!(f, "{code}:{t}"),
            Action::AddFuel(x) => write!(f, "{code}:{x}"),
            Action::ChangePressure(p) => write!(f, "{code}:{p}"),
            Action::ChangeCarAndDriver(c, d) => write!(f, "{code}:{c}:{d}"),
            Action::ChangeTireFuelPressure(t, x, p) => write!(f, "{code}:{t}:{x}:{p}"),
        }
    }
}
