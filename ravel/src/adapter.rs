//! Wrapping structured objectives as functions of one flat vector.

use ndarray::{ArrayBase, Data, Dimension};
use tracing::debug;

use crate::codec::{Reinject, Unflatten, Unravel, flatten_tree_with, flatten_with};
use crate::config::FlattenOptions;
use crate::element::Element;
use crate::error::{BoxError, Error, Result};
use crate::gradient::GradientOperator;
use crate::structure::Structure;
use crate::Ravel;

/// Output of an objective that should be a single number.
///
/// Anything holding exactly one element counts as a scalar. A `Result` is unwrapped
/// first and its error becomes [`Error::Objective`].
pub trait IntoScalar<T> {
    fn into_scalar(self) -> Result<T>;
}

impl IntoScalar<f32> for f32 {
    fn into_scalar(self) -> Result<f32> {
        Ok(self)
    }
}

impl IntoScalar<f64> for f64 {
    fn into_scalar(self) -> Result<f64> {
        Ok(self)
    }
}

fn single<T: Copy>(len: usize, mut values: impl Iterator<Item = T>) -> Result<T> {
    match (len, values.next()) {
        (1, Some(value)) => Ok(value),
        _ => Err(Error::NonScalarOutput { elements: len }),
    }
}

impl<T, S, D> IntoScalar<T> for ArrayBase<S, D>
where
    T: Element,
    S: Data<Elem = T>,
    D: Dimension,
{
    fn into_scalar(self) -> Result<T> {
        single(self.len(), self.iter().copied())
    }
}

impl<T: Element> IntoScalar<T> for Vec<T> {
    fn into_scalar(self) -> Result<T> {
        single(self.len(), self.into_iter())
    }
}

impl<T: Element> IntoScalar<T> for Structure<T> {
    fn into_scalar(self) -> Result<T> {
        single(self.size(), self.leaves().flat_map(|leaf| leaf.iter().copied()))
    }
}

impl<T, O, E> IntoScalar<T> for std::result::Result<O, E>
where
    O: IntoScalar<T>,
    E: Into<BoxError>,
{
    fn into_scalar(self) -> Result<T> {
        match self {
            Ok(output) => output.into_scalar(),
            Err(err) => Err(Error::Objective(err.into())),
        }
    }
}

/// `g(w) = f(unflatten(w))`: an objective over a structure, seen as a function of the
/// flat vector.
///
/// `g` keeps no state between calls, so an optimizer or a gradient operator may call
/// it as often as it likes.
pub struct FlatFunction<U, F> {
    unravel: U,
    f: F,
}

impl<U, F, O> FlatFunction<U, F>
where
    U: Unravel,
    U::Scalar: Element,
    F: Fn(&U::Output) -> O,
    O: IntoScalar<U::Scalar>,
{
    /// Evaluates `g` at `w`.
    pub fn call(&self, w: &[U::Scalar]) -> Result<U::Scalar> {
        let input = self.unravel.unflatten(w)?;
        (self.f)(&input).into_scalar()
    }

    /// Gradient of `g` at `w`, pulled back into the original shape.
    ///
    /// Unflattening only permutes and reshapes, so each leaf of the result holds the
    /// partial derivatives of `f` with respect to the matching input leaf.
    pub fn gradient<G>(&self, op: &G, w: &[U::Scalar]) -> Result<U::Output>
    where
        G: GradientOperator<U::Scalar> + ?Sized,
    {
        let mut g = |w: &[U::Scalar]| self.call(w);
        let grad = op.gradient(&mut g, w)?;
        if grad.len() != w.len() {
            return Err(Error::GradientLength {
                expected: w.len(),
                actual: grad.len(),
            });
        }
        self.unravel.unflatten(&grad)
    }

    /// The unflatten function `g` was built on.
    pub fn unravel(&self) -> &U {
        &self.unravel
    }
}

fn build<U, F, O>(unravel: U, f: F, w0: &[U::Scalar]) -> Result<FlatFunction<U, F>>
where
    U: Unravel,
    U::Scalar: Element,
    F: Fn(&U::Output) -> O,
    O: IntoScalar<U::Scalar>,
{
    let g = FlatFunction { unravel, f };
    // Surfaces non-scalar objectives here rather than deep inside an optimizer.
    let initial = g.call(w0)?;
    debug!(len = w0.len(), initial = ?initial, "wrapped objective");
    Ok(g)
}

/// Wraps `f` so it takes the flattened form of `example`.
///
/// Returns `g`, the unflatten function, and `w0`, the flattened `example`;
/// `g(w0) == f(example)`. `f` is evaluated once at `w0` to check that it returns a
/// scalar.
///
/// ```
/// use ravel::{Structure, flatten_function};
///
/// let example = Structure::mapping([("x", Structure::vector(vec![1.0, 2.0])), ("s", Structure::scalar(3.0))]);
/// let f = |p: &Structure| {
///     let x = p.get("x").unwrap().as_leaf().unwrap();
///     let s = p.get("s").unwrap().as_leaf().unwrap().sum();
///     s * x.iter().map(|v| v * v).sum::<f64>()
/// };
/// let (g, unflatten, w0) = flatten_function(f, &example).unwrap();
/// assert_eq!(w0, [1.0, 2.0, 3.0]);
/// assert_eq!(g.call(&w0).unwrap(), 15.0);
/// assert_eq!(unflatten.unflatten(&w0).unwrap(), example);
/// ```
pub fn flatten_function<T, F, O>(f: F, example: &Structure<T>) -> Result<(FlatFunction<Unflatten<T>, F>, Unflatten<T>, Vec<T>)>
where
    T: Element,
    F: Fn(&Structure<T>) -> O,
    O: IntoScalar<T>,
{
    flatten_function_with(f, example, &FlattenOptions::default())
}

/// [`flatten_function`] with explicit options, e.g. read once with
/// [`FlattenOptions::from_env`].
pub fn flatten_function_with<T, F, O>(
    f: F,
    example: &Structure<T>,
    options: &FlattenOptions,
) -> Result<(FlatFunction<Unflatten<T>, F>, Unflatten<T>, Vec<T>)>
where
    T: Element,
    F: Fn(&Structure<T>) -> O,
    O: IntoScalar<T>,
{
    let (w0, unflatten) = flatten_with(example, options)?;
    let g = build(unflatten.clone(), f, &w0)?;
    Ok((g, unflatten, w0))
}

/// [`flatten_function`] for typed trees.
pub fn flatten_tree_function<T, M, F, O>(f: F, example: &M) -> Result<(FlatFunction<Reinject<M>, F>, Reinject<M>, Vec<T>)>
where
    T: Element,
    M: Ravel<Arg = T> + Clone,
    F: Fn(&M) -> O,
    O: IntoScalar<T>,
{
    flatten_tree_function_with(f, example, &FlattenOptions::default())
}

pub fn flatten_tree_function_with<T, M, F, O>(
    f: F,
    example: &M,
    options: &FlattenOptions,
) -> Result<(FlatFunction<Reinject<M>, F>, Reinject<M>, Vec<T>)>
where
    T: Element,
    M: Ravel<Arg = T> + Clone,
    F: Fn(&M) -> O,
    O: IntoScalar<T>,
{
    let (w0, reinject) = flatten_tree_with(example, options)?;
    let g = build(reinject.clone(), f, &w0)?;
    Ok((g, reinject, w0))
}
