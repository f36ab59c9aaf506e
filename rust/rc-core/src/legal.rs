//! Legal action generation.
//!
//! Families, in emission order:
//! - A1 `Move`: always
//! - A2/A3/A4 single-dimension switches: one per catalog entry other than the current one
//! - level >= 2: A5 refuel (only below the refuel threshold), A6 pressure changes
//! - level >= 4: A7 car+driver pairs where both differ from the current pair
//! - level >= 5: A8 tire+fuel+pressure where tire and pressure both differ
//!
//! The order is deterministic; the planner's tie-break and the tests depend on it.

use crate::action::Action;
use crate::problem::ProblemSpec;
use crate::state::{RaceState, TirePressure};

pub fn legal_actions(spec: &ProblemSpec, state: &RaceState) -> Vec<Action> {
    let mut out = vec![Action::Move];

    out.extend(
        spec.car_order()
            .filter(|&c| c != state.car)
            .map(|c| Action::ChangeCar(c.to_string())),
    );
    out.extend(
        spec.driver_order()
            .filter(|&d| d != state.driver)
            .map(|d| Action::ChangeDriver(d.to_string())),
    );
    out.extend(
        spec.tire_order()
            .filter(|&t| t != state.tire)
            .map(Action::ChangeTire),
    );

    if spec.level >= 2 {
        if state.fuel < spec.fuel.refuel_below {
            out.push(Action::AddFuel(spec.fuel.refuel_amount));
        }
        out.extend(
            TirePressure::ALL
                .into_iter()
                .filter(|&p| p != state.pressure)
                .map(Action::ChangePressure),
        );
    }

    if spec.level >= 4 {
        for car in spec.car_order().filter(|&c| c != state.car) {
            for driver in spec.driver_order().filter(|&d| d != state.driver) {
                out.push(Action::ChangeCarAndDriver(
                    car.to_string(),
                    driver.to_string(),
                ));
            }
        }
    }

    if spec.level >= 5 {
        let fuel = spec.fuel.refuel_amount.min(spec.fuel.max_fuel);
        for tire in spec.tire_order().filter(|&t| t != state.tire) {
            for pressure in TirePressure::ALL
                .into_iter()
                .filter(|&p| p != state.pressure)
            {
                out.push(Action::ChangeTireFuelPressure(tire, fuel, pressure));
            }
        }
    }

    out
}
