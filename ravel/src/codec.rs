//! Flattening structures into vectors and rebuilding them.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::debug;

use crate::config::{EmptyPolicy, FlattenOptions};
use crate::element::Element;
use crate::error::{Error, Result};
use crate::signature::ShapeSignature;
use crate::structure::Structure;
use crate::{Ravel, count, extract, inject_from_slice};

/// A function from flat vectors back to the shape they were flattened from.
pub trait Unravel {
    type Scalar;
    type Output;

    /// Length every accepted flat vector must have.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn unflatten(&self, flat: &[Self::Scalar]) -> Result<Self::Output>;
}

/// Rebuilds [`Structure`]s from flat vectors, following the [`ShapeSignature`] recorded
/// by one [`flatten`] call.
///
/// Clones share the signature.
pub struct Unflatten<T> {
    signature: Arc<ShapeSignature>,
    _element: PhantomData<fn() -> T>,
}

impl<T: Element> Unflatten<T> {
    fn new(signature: ShapeSignature) -> Self {
        Self {
            signature: Arc::new(signature),
            _element: PhantomData,
        }
    }

    /// Slices `flat` at the recorded offsets and reshapes each piece. The result owns
    /// fresh arrays.
    pub fn unflatten(&self, flat: &[T]) -> Result<Structure<T>> {
        self.signature.rebuild(flat)
    }

    pub fn signature(&self) -> &ShapeSignature {
        &self.signature
    }

    pub fn len(&self) -> usize {
        self.signature.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signature.is_empty()
    }
}

impl<T: Element> Unravel for Unflatten<T> {
    type Scalar = T;
    type Output = Structure<T>;

    fn len(&self) -> usize {
        self.signature.len()
    }

    fn unflatten(&self, flat: &[T]) -> Result<Structure<T>> {
        Unflatten::unflatten(self, flat)
    }
}

impl<T> Clone for Unflatten<T> {
    fn clone(&self) -> Self {
        Self {
            signature: Arc::clone(&self.signature),
            _element: PhantomData,
        }
    }
}

impl<T> PartialEq for Unflatten<T> {
    fn eq(&self, other: &Self) -> bool {
        self.signature == other.signature
    }
}

impl<T> fmt::Debug for Unflatten<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unflatten").field("signature", &self.signature).finish()
    }
}

/// Flattens a structure with the default [`FlattenOptions`].
///
/// ```
/// use ravel::{Structure, flatten};
///
/// let s = Structure::mapping([
///     ("b", Structure::vector(vec![1.0, 2.0])),
///     ("a", Structure::scalar(3.0)),
/// ]);
/// let (w, unflatten) = flatten(&s).unwrap();
/// assert_eq!(w, [1.0, 2.0, 3.0]); // insertion order, not key order
/// assert_eq!(unflatten.unflatten(&w).unwrap(), s);
/// ```
pub fn flatten<T: Element>(structure: &Structure<T>) -> Result<(Vec<T>, Unflatten<T>)> {
    flatten_with(structure, &FlattenOptions::default())
}

/// Flattens a structure into its leaves' elements, depth-first and row-major, and
/// returns the matching unflatten function.
pub fn flatten_with<T: Element>(
    structure: &Structure<T>,
    options: &FlattenOptions,
) -> Result<(Vec<T>, Unflatten<T>)> {
    let signature = ShapeSignature::record(structure);
    if signature.leaves().is_empty() && options.empty == EmptyPolicy::Reject {
        return Err(Error::EmptyStructure);
    }

    let flat = extract(structure);
    debug_assert_eq!(flat.len(), signature.len());
    debug!(
        leaves = signature.leaves().len(),
        len = flat.len(),
        dtype = %T::DTYPE,
        "flattened structure"
    );

    Ok((flat, Unflatten::new(signature)))
}

/// Builds a structure from JSON and flattens it.
///
/// See [`Structure::from_json`] for how JSON maps onto leaves and containers.
///
/// ```
/// use ravel::{Error, flatten_json};
/// use serde_json::json;
///
/// let (w, _) = flatten_json(&json!({"a": 1.5, "b": [[1, 2], [3, 4]]})).unwrap();
/// assert_eq!(w, [1.5, 1.0, 2.0, 3.0, 4.0]);
///
/// let err = flatten_json(&json!({"a": [1.0, "x"]})).unwrap_err();
/// assert!(matches!(err, Error::UnsupportedLeafType { found: "string", .. }));
/// ```
pub fn flatten_json(value: &serde_json::Value) -> Result<(Vec<f64>, Unflatten<f64>)> {
    flatten(&Structure::from_json(value)?)
}

/// Rebuilds a typed tree by injecting flat values into a copy of a template.
pub struct Reinject<M> {
    template: Arc<M>,
    len: usize,
}

impl<M> Reinject<M>
where
    M: Ravel<Arg: Copy> + Clone,
{
    pub fn unflatten(&self, flat: &[M::Arg]) -> Result<M> {
        if flat.len() != self.len {
            return Err(Error::LengthMismatch {
                expected: self.len,
                actual: flat.len(),
            });
        }
        let mut tree = M::clone(&self.template);
        inject_from_slice(&mut tree, flat)?;
        Ok(tree)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<M> Unravel for Reinject<M>
where
    M: Ravel<Arg: Copy> + Clone,
{
    type Scalar = M::Arg;
    type Output = M;

    fn len(&self) -> usize {
        self.len
    }

    fn unflatten(&self, flat: &[M::Arg]) -> Result<M> {
        Reinject::unflatten(self, flat)
    }
}

impl<M> Clone for Reinject<M> {
    fn clone(&self) -> Self {
        Self {
            template: Arc::clone(&self.template),
            len: self.len,
        }
    }
}

impl<M: fmt::Debug> fmt::Debug for Reinject<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reinject")
            .field("template", &self.template)
            .field("len", &self.len)
            .finish()
    }
}

/// Flattens any [`Ravel`] tree with the default options.
pub fn flatten_tree<M>(tree: &M) -> Result<(Vec<M::Arg>, Reinject<M>)>
where
    M: Ravel<Arg: Copy> + Clone,
{
    flatten_tree_with(tree, &FlattenOptions::default())
}

/// Flattens any [`Ravel`] tree. The tree itself, cloned once, serves as its shape
/// signature. A typed tree counts as empty when it holds no scalars.
pub fn flatten_tree_with<M>(tree: &M, options: &FlattenOptions) -> Result<(Vec<M::Arg>, Reinject<M>)>
where
    M: Ravel<Arg: Copy> + Clone,
{
    let len = count(tree);
    if len == 0 && options.empty == EmptyPolicy::Reject {
        return Err(Error::EmptyStructure);
    }

    let flat = extract(tree);
    debug!(len, "flattened typed tree");

    let reinject = Reinject {
        template: Arc::new(tree.clone()),
        len,
    };
    Ok((flat, reinject))
}
