use tracing::{debug, trace};

use crate::config::DescentConfig;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::gradient::GradientOperator;

/// Points visited by [`gradient_descent`] and the cost at each of them.
///
/// Both vectors start with the initial point and have `max_its + 1` entries.
#[derive(Clone, Debug, PartialEq)]
pub struct History<T = f64> {
    pub weights: Vec<Vec<T>>,
    pub costs: Vec<T>,
}

impl<T: Element> History<T> {
    /// Index and cost of the cheapest visited point. Ties go to the earliest and NaN
    /// costs are never chosen; `None` if every cost is NaN.
    pub fn best(&self) -> Option<(usize, T)> {
        self.costs
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, cost)| !cost.is_nan())
            .fold(None, |best, (i, cost)| match best {
                Some((_, lowest)) if cost >= lowest => best,
                _ => Some((i, cost)),
            })
    }
}

/// Runs `w ← w - alpha * ∇g(w)` for exactly `config.max_its` updates.
///
/// There is no convergence test and no step adaptation. Any failure of `g` or of the
/// gradient operator stops the loop and is returned as is.
pub fn gradient_descent<T, G, O>(mut g: G, op: &O, w0: Vec<T>, config: &DescentConfig<T>) -> Result<History<T>>
where
    T: Element,
    G: FnMut(&[T]) -> Result<T>,
    O: GradientOperator<T> + ?Sized,
{
    config.validate()?;
    debug!(len = w0.len(), max_its = config.max_its, alpha = ?config.alpha, "starting gradient descent");

    let mut weights = Vec::with_capacity(config.max_its + 1);
    let mut costs = Vec::with_capacity(config.max_its + 1);

    let mut w = w0;
    costs.push(g(&w)?);

    for iteration in 1..=config.max_its {
        let grad = op.gradient(&mut g, &w)?;
        if grad.len() != w.len() {
            return Err(Error::GradientLength {
                expected: w.len(),
                actual: grad.len(),
            });
        }

        let next: Vec<T> = w.iter().zip(&grad).map(|(&x, &dx)| x - config.alpha * dx).collect();
        weights.push(std::mem::replace(&mut w, next));

        let cost = g(&w)?;
        trace!(iteration, cost = ?cost, "descent step");
        costs.push(cost);
    }
    weights.push(w);

    debug!(final_cost = ?costs.last(), "finished gradient descent");
    Ok(History { weights, costs })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::gradient::CentralDifference;

    fn bowl(w: &[f64]) -> Result<f64> {
        Ok(w.iter().map(|x| x * x).sum())
    }

    #[test]
    fn zero_iterations_record_only_the_start() {
        let config = DescentConfig { alpha: 0.5, max_its: 0 };
        let history = gradient_descent(bowl, &CentralDifference::default(), vec![1.0, 2.0], &config).unwrap();
        assert_eq!(history.weights, [vec![1.0, 2.0]]);
        assert_eq!(history.costs, [5.0]);
    }

    #[test]
    fn steps_shrink_a_quadratic_bowl() {
        let config = DescentConfig { alpha: 0.25, max_its: 3 };
        let history = gradient_descent(bowl, &CentralDifference::default(), vec![4.0], &config).unwrap();

        // w ← w - 0.25 * 2w halves w each step.
        let expected = [4.0, 2.0, 1.0, 0.5];
        for (w, e) in history.weights.iter().zip(expected) {
            assert_relative_eq!(w[0], e, epsilon = 1e-8);
        }
        assert_eq!(history.best().map(|(i, _)| i), Some(3));
    }

    #[test]
    fn invalid_step_length_fails_before_evaluating() {
        let mut calls = 0;
        let g = |w: &[f64]| {
            calls += 1;
            bowl(w)
        };
        let config = DescentConfig { alpha: -1.0, max_its: 5 };
        let result = gradient_descent(g, &CentralDifference::default(), vec![1.0], &config);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert_eq!(calls, 0);
    }

    #[test]
    fn failing_objective_stops_the_loop() {
        let g = |w: &[f64]| {
            if w[0] < 0.5 {
                Err(Error::Objective("left the domain".into()))
            } else {
                bowl(w)
            }
        };
        let config = DescentConfig { alpha: 0.25, max_its: 10 };
        let result = gradient_descent(g, &CentralDifference::default(), vec![2.0], &config);
        assert!(matches!(result, Err(Error::Objective(_))));
    }

    #[test]
    fn best_prefers_the_earliest_tie() {
        let history = History {
            weights: vec![vec![0.0]; 3],
            costs: vec![2.0, 1.0, 1.0],
        };
        assert_eq!(history.best(), Some((1, 1.0)));
    }

    #[test]
    fn best_skips_diverged_costs() {
        let history = History {
            weights: vec![vec![0.0]; 3],
            costs: vec![1.0, 0.5, f64::NAN],
        };
        assert_eq!(history.best(), Some((1, 0.5)));

        let history = History {
            weights: vec![vec![0.0]; 3],
            costs: vec![f64::NAN, 2.0, f64::NAN],
        };
        assert_eq!(history.best(), Some((1, 2.0)));

        let all_nan = History {
            weights: vec![vec![0.0]],
            costs: vec![f64::NAN],
        };
        assert_eq!(all_nan.best(), None);
    }
}
