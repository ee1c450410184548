//! The gradient-operator boundary and a finite-difference backend.

use crate::element::Element;
use crate::error::{Error, Result};

/// Computes the gradient of a scalar function of a flat vector at a point.
///
/// Implementations may call `f` any number of times; the returned vector must have
/// the same length as `at`.
pub trait GradientOperator<T> {
    fn gradient(&self, f: &mut dyn FnMut(&[T]) -> Result<T>, at: &[T]) -> Result<Vec<T>>;
}

impl<T, O: GradientOperator<T> + ?Sized> GradientOperator<T> for &O {
    fn gradient(&self, f: &mut dyn FnMut(&[T]) -> Result<T>, at: &[T]) -> Result<Vec<T>> {
        (**self).gradient(f, at)
    }
}

/// Turns a scalar function into a function from points to gradients.
///
/// The returned closure checks that the operator kept the point's length.
pub fn gradient_of<T, O, F>(op: O, mut f: F) -> impl FnMut(&[T]) -> Result<Vec<T>>
where
    O: GradientOperator<T>,
    F: FnMut(&[T]) -> Result<T>,
{
    move |at: &[T]| {
        let grad = op.gradient(&mut f, at)?;
        if grad.len() != at.len() {
            return Err(Error::GradientLength {
                expected: at.len(),
                actual: grad.len(),
            });
        }
        Ok(grad)
    }
}

/// Central finite differences, `(f(w + h e_i) - f(w - h e_i)) / 2h`.
///
/// Exact up to rounding for quadratics. Costs two evaluations per coordinate.
///
/// ```
/// use ravel::{CentralDifference, GradientOperator};
///
/// let mut f = |w: &[f64]| -> ravel::Result<f64> { Ok(w[0] * w[0] + 3.0 * w[1]) };
/// let grad = CentralDifference::default().gradient(&mut f, &[2.0, -1.0]).unwrap();
/// assert!((grad[0] - 4.0).abs() < 1e-6);
/// assert!((grad[1] - 3.0).abs() < 1e-6);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CentralDifference<T> {
    pub step: T,
}

impl<T: Element> CentralDifference<T> {
    pub fn new(step: T) -> Result<Self> {
        if !(step.is_finite() && step > T::zero()) {
            return Err(Error::config(format!(
                "finite-difference step must be finite and positive, got {step:?}"
            )));
        }
        Ok(Self { step })
    }
}

impl<T: Element> Default for CentralDifference<T> {
    fn default() -> Self {
        Self {
            step: T::default_step(),
        }
    }
}

impl<T: Element> GradientOperator<T> for CentralDifference<T> {
    fn gradient(&self, f: &mut dyn FnMut(&[T]) -> Result<T>, at: &[T]) -> Result<Vec<T>> {
        let two_h = self.step + self.step;
        let mut probe = at.to_vec();
        let mut grad = Vec::with_capacity(at.len());

        for i in 0..at.len() {
            probe[i] = at[i] + self.step;
            let forward = f(&probe)?;
            probe[i] = at[i] - self.step;
            let backward = f(&probe)?;
            probe[i] = at[i];

            grad.push((forward - backward) / two_h);
        }
        Ok(grad)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    struct Truncating;

    impl GradientOperator<f64> for Truncating {
        fn gradient(&self, _: &mut dyn FnMut(&[f64]) -> Result<f64>, at: &[f64]) -> Result<Vec<f64>> {
            Ok(vec![0.0; at.len().saturating_sub(1)])
        }
    }

    #[test]
    fn central_difference_matches_analytic_gradient() {
        let f = |w: &[f64]| Ok(w[0].sin() * w[1] + w[2].exp());
        let at = [0.3, -1.2, 0.5];

        let mut grad_fn = gradient_of(CentralDifference::default(), f);
        let grad = grad_fn(&at).unwrap();

        assert_relative_eq!(grad[0], at[0].cos() * at[1], epsilon = 1e-8);
        assert_relative_eq!(grad[1], at[0].sin(), epsilon = 1e-8);
        assert_relative_eq!(grad[2], at[2].exp(), epsilon = 1e-8);
    }

    #[test]
    fn objective_failures_propagate() {
        let f = |w: &[f64]| {
            if w[0] > 1.0 {
                Err(Error::Objective("out of domain".into()))
            } else {
                Ok(w[0])
            }
        };
        let mut grad_fn = gradient_of(CentralDifference::default(), f);
        assert!(grad_fn(&[0.0]).is_ok());
        assert!(matches!(grad_fn(&[1.0]), Err(Error::Objective(_))));
    }

    #[test]
    fn wrong_gradient_length_is_reported() {
        let mut grad_fn = gradient_of(Truncating, |w: &[f64]| Ok(w.iter().sum()));
        assert!(matches!(
            grad_fn(&[1.0, 2.0]),
            Err(Error::GradientLength { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn rejects_degenerate_steps() {
        assert!(CentralDifference::new(1e-4).is_ok());
        assert!(CentralDifference::new(0.0f64).is_err());
        assert!(CentralDifference::new(f32::NAN).is_err());
    }
}
