//! X position to lens focus conversion with redundant write suppression

use crate::camera::FocusDevice;
use crate::error::Result;

/// Calibration constants of `focus = a / (x + b) + c`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocusFormula {
    /// Numerator
    pub a: f64,
    /// Offset added to the X coordinate
    pub b: f64,
    /// Constant focus offset
    pub c: f64,
}

impl FocusFormula {
    /// Create a formula from its three calibration constants
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self { a, b, c }
    }

    /// Focus value for X coordinate `x`, truncated toward zero.
    ///
    /// `None` when `x` is unknown or the result is not a representable integer.
    pub fn compute(&self, x: Option<f64>) -> Option<i32> {
        let focus = (self.a / (x? + self.b) + self.c).trunc();
        if focus.is_finite() && focus >= f64::from(i32::MIN) && focus <= f64::from(i32::MAX) {
            Some(focus as i32)
        } else {
            None
        }
    }
}

impl std::fmt::Display for FocusFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "f = {}/(x{:+}){:+}", self.a, self.b, self.c)
    }
}

/// What [`FocusController::update`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusUpdate {
    /// Position unknown, nothing written
    Unknown,
    /// Focus equals the last applied value, nothing written
    Unchanged(i32),
    /// New focus value written to the device
    Applied(i32),
}

/// Drives a focus device from X positions
pub struct FocusController<D> {
    formula: FocusFormula,
    device: D,
    last_applied: Option<i32>,
}

impl<D: FocusDevice> FocusController<D> {
    /// Wrap `device`, which must already be in manual focus mode
    pub fn new(formula: FocusFormula, device: D) -> Self {
        Self {
            formula,
            device,
            last_applied: None,
        }
    }

    /// Last value successfully written to the device
    pub fn last_applied(&self) -> Option<i32> {
        self.last_applied
    }

    /// Borrow the underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Compute focus for `x` and write it if it differs from the last write
    pub fn update(&mut self, x: Option<f64>) -> Result<FocusUpdate> {
        let Some(focus) = self.formula.compute(x) else {
            return Ok(FocusUpdate::Unknown);
        };
        if self.last_applied == Some(focus) {
            return Ok(FocusUpdate::Unchanged(focus));
        }

        self.device.set_focus(focus)?;
        self.last_applied = Some(focus);
        Ok(FocusUpdate::Applied(focus))
    }
}
