use serde::{Deserialize, Serialize};

use crate::error::IntegrationError;

/// The Butcher tableau of an explicit Runge-Kutta method.
///
/// `a` holds one coefficient row per stage; row `i` weights the previously
/// computed stage derivatives when forming the input of stage `i`, so row 0
/// is empty and row `i` has exactly `i` entries. `b` holds the final
/// blending weights and `c` the fractional time offset of each stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButcherTableau {
    pub a: Vec<Vec<f64>>,
    pub b: Vec<f64>,
    pub c: Vec<f64>,
}

impl ButcherTableau {
    /// Builds a tableau, rejecting shape violations up front.
    pub fn new(a: Vec<Vec<f64>>, b: Vec<f64>, c: Vec<f64>) -> Result<Self, IntegrationError> {
        let tableau = Self { a, b, c };
        tableau.validate()?;
        Ok(tableau)
    }

    /// Checks the structural invariants of an explicit method. The stepper
    /// runs this before any derivative evaluation.
    pub fn validate(&self) -> Result<(), IntegrationError> {
        if self.a.is_empty() {
            return Err(IntegrationError::MalformedTableau {
                reason: "tableau must have at least one stage".to_string(),
            });
        }
        if self.a.len() != self.b.len() || self.a.len() != self.c.len() {
            return Err(IntegrationError::MalformedTableau {
                reason: format!(
                    "A, B and C must have equal length (got {}, {} and {})",
                    self.a.len(),
                    self.b.len(),
                    self.c.len()
                ),
            });
        }
        for (i, row) in self.a.iter().enumerate() {
            if row.len() != i {
                return Err(IntegrationError::MalformedTableau {
                    reason: format!(
                        "row {} of A must have {} coefficients, got {}",
                        i,
                        i,
                        row.len()
                    ),
                });
            }
        }
        Ok(())
    }

    /// Number of derivative evaluations per step.
    pub fn stages(&self) -> usize {
        self.b.len()
    }

    /// Explicit Euler, order 1.
    pub fn euler() -> Self {
        Self {
            a: vec![vec![]],
            b: vec![1.0],
            c: vec![0.0],
        }
    }

    /// Explicit midpoint method, order 2.
    pub fn midpoint() -> Self {
        Self {
            a: vec![vec![], vec![0.5]],
            b: vec![0.0, 1.0],
            c: vec![0.0, 0.5],
        }
    }

    /// Classic second-order Runge-Kutta.
    pub fn rk2() -> Self {
        Self {
            a: vec![vec![], vec![2.0 / 3.0]],
            b: vec![0.25, 0.75],
            c: vec![0.0, 2.0 / 3.0],
        }
    }

    /// Heun's method, order 2.
    pub fn heun2() -> Self {
        Self {
            a: vec![vec![], vec![1.0]],
            b: vec![0.5, 0.5],
            c: vec![0.0, 1.0],
        }
    }

    /// Ralston's method, order 2.
    pub fn ralston2() -> Self {
        Self {
            a: vec![vec![], vec![2.0 / 3.0]],
            b: vec![0.25, 0.75],
            c: vec![0.0, 2.0 / 3.0],
        }
    }

    /// Kutta's third-order method.
    pub fn rk3() -> Self {
        Self {
            a: vec![vec![], vec![0.5], vec![-1.0, 2.0]],
            b: vec![1.0 / 6.0, 2.0 / 3.0, 1.0 / 6.0],
            c: vec![0.0, 0.5, 1.0],
        }
    }

    /// Heun's third-order method.
    pub fn heun3() -> Self {
        Self {
            a: vec![vec![], vec![1.0 / 3.0], vec![0.0, 2.0 / 3.0]],
            b: vec![0.25, 0.0, 0.75],
            c: vec![0.0, 1.0 / 3.0, 2.0 / 3.0],
        }
    }

    /// Third-order strong-stability-preserving Runge-Kutta.
    pub fn ssprk3() -> Self {
        Self {
            a: vec![vec![], vec![1.0], vec![0.25, 0.25]],
            b: vec![1.0 / 6.0, 1.0 / 6.0, 2.0 / 3.0],
            c: vec![0.0, 1.0, 0.5],
        }
    }

    /// Ralston's third-order method.
    pub fn ralston3() -> Self {
        Self {
            a: vec![vec![], vec![0.5], vec![0.0, 0.75]],
            b: vec![2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0],
            c: vec![0.0, 0.5, 0.75],
        }
    }

    /// Classic fourth-order Runge-Kutta.
    pub fn rk4() -> Self {
        Self {
            a: vec![vec![], vec![0.5], vec![0.0, 0.5], vec![0.0, 0.0, 1.0]],
            b: vec![1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
            c: vec![0.0, 0.5, 0.5, 1.0],
        }
    }

    /// Ralston's fourth-order method (minimal truncation error).
    pub fn ralston4() -> Self {
        Self {
            a: vec![
                vec![],
                vec![0.4],
                vec![0.29697761, 0.15875964],
                vec![0.21810040, -3.05096516, 3.83286476],
            ],
            b: vec![0.17476028, -0.55148066, 1.20553560, 0.17118478],
            c: vec![0.0, 0.4, 0.45573725, 1.0],
        }
    }
}
