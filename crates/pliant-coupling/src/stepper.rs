//! Discrete-time stepping loop.

use pliant_types::{PliantError, PliantResult};

/// Anything that owns a simulation clock and can advance it.
pub trait TimeStepper {
    /// Current simulation time (seconds).
    fn time(&self) -> f64;

    /// Advances by `dt`. On error the stepper must be left at its
    /// previous time.
    fn advance(&mut self, dt: f64) -> PliantResult<()>;
}

/// Takes fixed steps of `dt` until `end_time` is reached and returns the
/// number of steps taken. The last step is not shortened; a remainder
/// below half a step is dropped.
///
/// # Errors
/// `InvalidConfig` for a non-positive `dt`, or the first error the
/// stepper reports.
pub fn run_until<S: TimeStepper + ?Sized>(
    stepper: &mut S,
    dt: f64,
    end_time: f64,
) -> PliantResult<u64> {
    if !(dt > 0.0 && dt.is_finite()) {
        return Err(PliantError::InvalidConfig(format!(
            "time step must be positive, got {dt}"
        )));
    }
    let mut steps = 0;
    while stepper.time() + 0.5 * dt < end_time {
        stepper.advance(dt)?;
        steps += 1;
    }
    Ok(steps)
}
