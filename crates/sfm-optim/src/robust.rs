use crate::ir::RobustLoss;

impl RobustLoss {
    /// Loss for a Cauchy kernel of the given width; `width <= 0` means plain
    /// squared error.
    pub fn from_width(width: f64) -> Self {
        if width > 0.0 {
            RobustLoss::Cauchy { scale: width }
        } else {
            RobustLoss::None
        }
    }

    /// Return the robust loss `rho(r^2)` and the IRLS weight `w(r)` for a squared residual.
    ///
    /// Weights are the derivative `rho'(r^2)`, so a residual block contributes
    /// `w * r^T J` to the gradient. `None` yields `(r^2, 1)`.
    pub fn rho_and_weight(self, r2: f64) -> (f64, f64) {
        match self {
            RobustLoss::None => (r2, 1.0),
            RobustLoss::Cauchy { scale } => {
                // rho = c^2 * log(1 + r^2 / c^2)
                let c2 = scale * scale;
                let t = r2 / c2;
                (c2 * (1.0 + t).ln(), 1.0 / (1.0 + t))
            }
        }
    }
}
