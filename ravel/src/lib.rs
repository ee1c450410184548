//! Flatten nested numeric structures into one vector, and back.
//!
//! Generic optimizers want a function of a single flat vector. Real objectives take
//! scalars, vectors and matrices nested in lists and named groups. `ravel` bridges the
//! two: it flattens a structure into a contiguous vector, hands back a function that
//! rebuilds the structure from any vector of the same length, and wraps an objective
//! so that gradients computed on the flat vector land back on the right leaf, in the
//! right shape.
//!
//! # Getting Started
//!
//! ```
//! use ndarray::{arr0, arr1, arr2};
//! use ravel::{CentralDifference, DescentConfig, Structure, flatten_function, gradient_descent};
//!
//! // A scalar, a 2-vector and a 2x2 matrix.
//! let params = Structure::sequence([
//!     Structure::leaf(arr0(0.3).into_dyn()),
//!     Structure::leaf(arr1(&[-0.1, 0.2]).into_dyn()),
//!     Structure::leaf(arr2(&[[0.05, -0.2], [0.1, 0.0]]).into_dyn()),
//! ]);
//!
//! // f(a, b, C) = (a + sum(b) + sum(C))^2
//! let objective = |s: &Structure<f64>| {
//!     let total: f64 = s.leaves().map(|leaf| leaf.sum()).sum();
//!     total * total
//! };
//!
//! let (g, unflatten, w0) = flatten_function(objective, &params).unwrap();
//! assert_eq!(w0, [0.3, -0.1, 0.2, 0.05, -0.2, 0.1, 0.0]);
//! assert_eq!(g.call(&w0).unwrap(), objective(&params));
//!
//! let config = DescentConfig { alpha: 0.1, max_its: 10 };
//! let history = gradient_descent(|w| g.call(w), &CentralDifference::default(), w0, &config).unwrap();
//! assert_eq!(history.costs.len(), 11);
//!
//! // Inspect the optimized point in its original shape.
//! let best = unflatten.unflatten(history.weights.last().unwrap()).unwrap();
//! assert_eq!(best.leaves().map(|leaf| leaf.shape().to_vec()).collect::<Vec<_>>(), [vec![], vec![2], vec![2, 2]]);
//! ```
//!
//! # Typed trees
//!
//! Plain Rust types take part through the [`Ravel`] trait, which can be derived for
//! structs generic over their leaf type:
//!
//! ```
//! use ravel::{Ravel, flatten_tree};
//!
//! #[derive(Ravel, Clone, Debug, PartialEq)]
//! struct Line<P> {
//!     slope: P,
//!     intercept: P,
//!     #[ravel(skip)]
//!     label: &'static str,
//! }
//!
//! let line = Line { slope: 2.0, intercept: -1.0, label: "fit" };
//! let (w, reinject) = flatten_tree(&line).unwrap();
//! assert_eq!(w, [2.0, -1.0]);
//!
//! let moved = reinject.unflatten(&[0.5, 0.25]).unwrap();
//! assert_eq!(moved, Line { slope: 0.5, intercept: 0.25, label: "fit" });
//! ```
//!
//! # Layout contract
//!
//! Leaves are visited depth-first. Sequences are visited in order and mappings in
//! insertion order; each leaf contributes its elements in row-major order. This layout
//! is part of the public contract: changing the order of keys changes the vector.

// Lets `#[derive(Ravel)]` resolve `::ravel` inside this crate's own tests.
extern crate self as ravel;

pub use ravel_derive::Ravel;

mod adapter;
mod codec;
mod config;
mod descent;
mod element;
mod error;
mod gradient;
mod impls;
mod json;
mod path;
mod signature;
mod structure;

pub use adapter::{
    FlatFunction, IntoScalar, flatten_function, flatten_function_with, flatten_tree_function,
    flatten_tree_function_with,
};
pub use codec::{
    Reinject, Unflatten, Unravel, flatten, flatten_json, flatten_tree, flatten_tree_with,
    flatten_with,
};
pub use config::{DescentConfig, EmptyPolicy, FlattenOptions};
pub use descent::{History, gradient_descent};
pub use element::{DType, Element};
pub use error::{BoxError, Error, Result};
pub use gradient::{CentralDifference, GradientOperator, gradient_of};
pub use path::{Path, PathSegment};
pub use signature::{LeafSpec, ShapeSignature};
pub use structure::Structure;

/// Types whose numeric leaves can be visited and rebuilt in a fixed order.
///
/// `Ravel` descends through containers down to individual scalars and applies a
/// closure to each one. The traversal order is the flat-vector layout: the first
/// scalar visited is element `0` of the flattened vector.
///
/// ```text
/// (f64, [f64; 2], Vec<Option<f64>>)      a nested tree of scalars
///            ↓
///     closure(f64) -> bool               applied to every scalar, in order
///            ↓
/// (bool, [bool; 2], Vec<Option<bool>>)   same shape, new scalar type
/// ```
///
/// # Implementing
///
/// * **Scalars** (`f32`, `f64`, or a user type registered with [`impl_leaf!`]):
///   `Arg = Self`, `Mapped<U> = U`, and each method calls the closure once.
/// * **Containers** (`Vec<T>`, `[T; N]`, `ndarray::Array<T, D>`, [`Structure<T>`], ...):
///   `Arg = T::Arg`, `Mapped<U>` keeps the container and maps its content, and each
///   method recurses into the children in a deterministic order.
/// * **Structs**: `#[derive(Ravel)]` on a struct generic over its leaf type. Fields
///   are traversed in declaration order; `#[ravel(skip)]` excludes one.
pub trait Ravel: Sized {
    /// The scalar reached at the bottom of the tree.
    type Arg;

    /// The same tree with every scalar replaced by a `U`.
    type Mapped<U>;

    /// Rebuilds the tree, transforming each scalar. Stops at the first `Err`.
    ///
    /// ```
    /// # use ravel::Ravel;
    /// let halve = |x: f64| if x.is_finite() { Ok(x / 2.0) } else { Err("non-finite") };
    ///
    /// assert_eq!(Ravel::try_map((4.0, [2.0, 1.0]), halve), Ok((2.0, [1.0, 0.5])));
    /// assert!(Ravel::try_map((4.0, [f64::NAN, 1.0]), halve).is_err());
    /// ```
    fn try_map<U, F, E>(slf: Self, f: F) -> std::result::Result<Self::Mapped<U>, E>
    where
        F: FnMut(Self::Arg) -> std::result::Result<U, E>;

    /// Visits each scalar by shared reference. Stops at the first `Err`.
    ///
    /// ```
    /// # use ravel::Ravel;
    /// let weights = vec![[0.5, 1.0], [f64::INFINITY, 0.0]];
    /// let finite = Ravel::try_visit(&weights, |x: &f64| x.is_finite().then_some(()).ok_or(*x));
    /// assert_eq!(finite, Err(f64::INFINITY));
    /// ```
    fn try_visit<F, E>(slf: &Self, f: F) -> std::result::Result<(), E>
    where
        F: FnMut(&Self::Arg) -> std::result::Result<(), E>;

    /// Visits each scalar by mutable reference. Stops at the first `Err`; changes made
    /// before it are kept.
    fn try_visit_mut<F, E>(slf: &mut Self, f: F) -> std::result::Result<(), E>
    where
        F: FnMut(&mut Self::Arg) -> std::result::Result<(), E>;

    /// Infallible [`Ravel::try_map`].
    ///
    /// ```
    /// # use ravel::Ravel;
    /// assert_eq!(Ravel::map((1.5, vec![-2.0]), |x: f64| x > 0.0), (true, vec![false]));
    /// ```
    fn map<U, F>(slf: Self, mut f: F) -> Self::Mapped<U>
    where
        F: FnMut(Self::Arg) -> U,
    {
        match Self::try_map(slf, |x| Ok::<_, std::convert::Infallible>(f(x))) {
            Ok(mapped) => mapped,
            Err(never) => match never {},
        }
    }

    /// Infallible [`Ravel::try_visit`].
    ///
    /// ```
    /// # use ravel::Ravel;
    /// let mut seen = vec![];
    /// Ravel::visit(&(1.0, [2.0, 3.0]), |x: &f64| seen.push(*x));
    /// assert_eq!(seen, [1.0, 2.0, 3.0]);
    /// ```
    fn visit<F>(slf: &Self, mut f: F)
    where
        F: FnMut(&Self::Arg),
    {
        _ = Self::try_visit(slf, |x| {
            f(x);
            Ok::<(), std::convert::Infallible>(())
        })
    }

    /// Infallible [`Ravel::try_visit_mut`].
    fn visit_mut<F>(slf: &mut Self, mut f: F)
    where
        F: FnMut(&mut Self::Arg),
    {
        _ = Self::try_visit_mut(slf, |x| {
            f(x);
            Ok::<(), std::convert::Infallible>(())
        })
    }
}

/// Number of scalars in a tree, i.e. the length of its flat vector.
pub fn count<M: Ravel>(tree: &M) -> usize {
    let mut n = 0;
    M::visit(tree, |_| n += 1);
    n
}

/// Copies every scalar of a tree into a new vector, in traversal order.
pub fn extract<M>(tree: &M) -> Vec<M::Arg>
where
    M: Ravel<Arg: Clone>,
{
    let mut flat = Vec::with_capacity(count(tree));
    M::visit(tree, |x| flat.push(x.clone()));
    flat
}

/// Overwrites the scalars of a tree in place from a flat slice.
///
/// The slice must hold exactly one value per scalar; on a length mismatch the tree is
/// left untouched.
///
/// ```
/// let mut tree = (0.0, [0.0, 0.0]);
/// ravel::inject_from_slice(&mut tree, &[1.0, 2.0, 3.0]).unwrap();
/// assert_eq!(tree, (1.0, [2.0, 3.0]));
///
/// assert!(ravel::inject_from_slice(&mut tree, &[1.0]).is_err());
/// assert_eq!(tree, (1.0, [2.0, 3.0]));
/// ```
pub fn inject_from_slice<M>(tree: &mut M, params: &[M::Arg]) -> Result<()>
where
    M: Ravel<Arg: Copy>,
{
    let expected = count(tree);
    if params.len() != expected {
        return Err(Error::LengthMismatch {
            expected,
            actual: params.len(),
        });
    }

    let mut source = params.iter();
    M::visit_mut(tree, |dst| {
        if let Some(value) = source.next() {
            *dst = *value;
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{arr0, arr1, arr2};

    type Nested = Vec<[Vec<(Vec<Box<(f64, [f64; 3])>>, f64)>; 2]>;

    fn nested() -> Nested {
        let rows = vec![
            Box::new((4., [-1., -2., -4.])),
            Box::new((5., [9., 9., 6.])),
            Box::new((6., [0., 1., 0.])),
        ];
        let inner = (rows, 2.5);
        vec![[vec![inner.clone()], vec![inner]]]
    }

    #[test]
    fn extract_follows_declaration_order() {
        let half = [
            4., -1., -2., -4., //
            5., 9., 9., 6., //
            6., 0., 1., 0., //
            2.5,
        ];
        let flat = extract(&nested());
        assert_eq!(flat.len(), 2 * half.len());
        assert_eq!(flat[..13], half);
        assert_eq!(flat[13..], half);
    }

    #[test]
    fn inject_then_extract_is_identity() {
        let mut tree = nested();
        let arange: Vec<f64> = (0..count(&tree)).map(|i| i as f64).collect();

        inject_from_slice(&mut tree, &arange).unwrap();
        assert_eq!(extract(&tree), arange);
    }

    #[test]
    fn inject_rejects_short_and_long_slices() {
        let mut tree = nested();
        let n = count(&tree);

        for len in [n - 1, n + 1] {
            let err = inject_from_slice(&mut tree, &vec![0.0; len]).unwrap_err();
            assert!(matches!(err, Error::LengthMismatch { expected, actual } if expected == n && actual == len));
        }
        assert_eq!(tree, nested());
    }

    // Enums have no derive; this one is implemented by hand.
    #[derive(Debug, PartialEq)]
    enum Knot<T> {
        Fixed(T),
        Free(T, T),
    }

    impl<T: Ravel> Ravel for Knot<T> {
        type Arg = T::Arg;
        type Mapped<U> = Knot<T::Mapped<U>>;

        fn try_map<U, F, E>(slf: Self, mut f: F) -> std::result::Result<Self::Mapped<U>, E>
        where
            F: FnMut(Self::Arg) -> std::result::Result<U, E>,
        {
            Ok(match slf {
                Knot::Fixed(x) => Knot::Fixed(T::try_map(x, &mut f)?),
                Knot::Free(a, b) => Knot::Free(T::try_map(a, &mut f)?, T::try_map(b, &mut f)?),
            })
        }

        fn try_visit<F, E>(slf: &Self, mut f: F) -> std::result::Result<(), E>
        where
            F: FnMut(&Self::Arg) -> std::result::Result<(), E>,
        {
            match slf {
                Knot::Fixed(x) => T::try_visit(x, &mut f),
                Knot::Free(a, b) => {
                    T::try_visit(a, &mut f)?;
                    T::try_visit(b, &mut f)
                }
            }
        }

        fn try_visit_mut<F, E>(slf: &mut Self, mut f: F) -> std::result::Result<(), E>
        where
            F: FnMut(&mut Self::Arg) -> std::result::Result<(), E>,
        {
            match slf {
                Knot::Fixed(x) => T::try_visit_mut(x, &mut f),
                Knot::Free(a, b) => {
                    T::try_visit_mut(a, &mut f)?;
                    T::try_visit_mut(b, &mut f)
                }
            }
        }
    }

    #[test]
    fn hand_written_impls_compose_with_containers() {
        let mut knots = vec![Knot::Fixed(1.0), Knot::Free(2.0, 3.0)];
        assert_eq!(count(&knots), 3);
        assert_eq!(extract(&knots), [1.0, 2.0, 3.0]);

        inject_from_slice(&mut knots, &[4.0, 5.0, 6.0]).unwrap();
        assert_eq!(knots, [Knot::Fixed(4.0), Knot::Free(5.0, 6.0)]);

        let stopped = Ravel::try_visit(&knots, |&x: &f64| if x > 4.5 { Err(x) } else { Ok(()) });
        assert_eq!(stopped, Err(5.0));

        let above = Ravel::map(knots, |x: f64| x > 4.5);
        assert_eq!(above, [Knot::Fixed(false), Knot::Free(true, true)]);
    }

    fn scenario() -> Structure<f64> {
        Structure::sequence([
            Structure::leaf(arr0(0.25).into_dyn()),
            Structure::leaf(arr1(&[-0.5, 0.125]).into_dyn()),
            Structure::leaf(arr2(&[[0.3, -0.1], [0.05, 0.2]]).into_dyn()),
        ])
    }

    fn squared_total(s: &Structure<f64>) -> f64 {
        let total: f64 = s.leaves().map(|leaf| leaf.sum()).sum();
        total * total
    }

    #[test]
    fn end_to_end_descent_on_mixed_shapes() {
        let mut rng = fastrand::Rng::with_seed(17);
        let start = Ravel::map(scenario(), |_| rng.f64() - 0.5);

        let (g, unflatten, w0) = flatten_function(squared_total, &start).unwrap();
        assert_eq!(w0.len(), 7);
        assert_eq!(w0, extract(&start));
        assert_eq!(g.call(&w0).unwrap(), squared_total(&start));

        let config = DescentConfig { alpha: 0.1, max_its: 10 };
        let history = gradient_descent(|w| g.call(w), &CentralDifference::default(), w0.clone(), &config).unwrap();

        assert_eq!(history.weights.len(), 11);
        assert_eq!(history.costs.len(), 11);
        assert_eq!(history.weights[0], w0);
        assert!(history.costs.windows(2).all(|pair| pair[1] <= pair[0]), "{:?}", history.costs);

        // Each step maps the running total s to s * (1 - 0.1 * 7 * 2).
        let s0: f64 = w0.iter().sum();
        let expected = s0 * (-0.4f64).powi(10);
        let last = unflatten.unflatten(&history.weights[10]).unwrap();
        let s10: f64 = last.leaves().map(|leaf| leaf.sum()).sum();
        assert_relative_eq!(s10, expected, epsilon = 1e-9);
    }

    #[test]
    fn end_to_end_layout_is_scalar_vector_matrix() {
        let (w, _) = flatten(&scenario()).unwrap();
        assert_eq!(w, [0.25, -0.5, 0.125, 0.3, -0.1, 0.05, 0.2]);
    }
}
