use ndarray::{Array1, ArrayD, IxDyn, arr0};

use crate::error::{Error, Result};
use crate::path::Path;
use crate::Ravel;

/// A nested composition of numeric arrays.
///
/// Scalars are 0-d leaves and vectors are 1-d leaves. Mapping entries keep their
/// insertion order, which is also the order they take in the flat vector.
#[derive(Clone, Debug, PartialEq)]
pub enum Structure<T = f64> {
    Leaf(ArrayD<T>),
    Sequence(Vec<Structure<T>>),
    Mapping(Vec<(String, Structure<T>)>),
}

impl<T> Structure<T> {
    pub fn leaf(array: ArrayD<T>) -> Self {
        Structure::Leaf(array)
    }

    /// A 0-d leaf.
    pub fn scalar(value: T) -> Self {
        Structure::Leaf(arr0(value).into_dyn())
    }

    /// A 1-d leaf.
    pub fn vector(values: Vec<T>) -> Self {
        Structure::Leaf(Array1::from(values).into_dyn())
    }

    /// A leaf of the given shape, filled row-major from `data`.
    ///
    /// ```
    /// use ravel::Structure;
    ///
    /// let m = Structure::from_shape_vec(&[2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
    /// assert_eq!(m.as_leaf().unwrap()[[1, 0]], 3.0);
    /// assert!(Structure::from_shape_vec(&[3], vec![1.0]).is_err());
    /// ```
    pub fn from_shape_vec(shape: &[usize], data: Vec<T>) -> Result<Self> {
        let elements = data.len();
        ArrayD::from_shape_vec(IxDyn(shape), data)
            .map(Structure::Leaf)
            .map_err(|_| Error::InvalidShape {
                path: Path::root(),
                shape: shape.to_vec(),
                elements,
            })
    }

    pub fn sequence(items: impl IntoIterator<Item = Structure<T>>) -> Self {
        Structure::Sequence(items.into_iter().collect())
    }

    pub fn mapping<K: Into<String>>(entries: impl IntoIterator<Item = (K, Structure<T>)>) -> Self {
        Structure::Mapping(entries.into_iter().map(|(key, value)| (key.into(), value)).collect())
    }

    pub fn as_leaf(&self) -> Option<&ArrayD<T>> {
        match self {
            Structure::Leaf(array) => Some(array),
            _ => None,
        }
    }

    /// Looks up a mapping entry. Returns the first match if a key repeats.
    pub fn get(&self, key: &str) -> Option<&Structure<T>> {
        match self {
            Structure::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Looks up a sequence item.
    pub fn item(&self, index: usize) -> Option<&Structure<T>> {
        match self {
            Structure::Sequence(items) => items.get(index),
            _ => None,
        }
    }

    /// Leaves in flattening order.
    pub fn leaves(&self) -> Leaves<'_, T> {
        Leaves { stack: vec![self] }
    }

    pub fn leaf_count(&self) -> usize {
        self.leaves().count()
    }

    /// Total number of scalars over all leaves.
    pub fn size(&self) -> usize {
        self.leaves().map(|leaf| leaf.len()).sum()
    }
}

/// Depth-first iterator over the leaves of a [`Structure`].
pub struct Leaves<'a, T> {
    stack: Vec<&'a Structure<T>>,
}

impl<'a, T> Iterator for Leaves<'a, T> {
    type Item = &'a ArrayD<T>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            match node {
                Structure::Leaf(array) => return Some(array),
                Structure::Sequence(items) => self.stack.extend(items.iter().rev()),
                Structure::Mapping(entries) => self.stack.extend(entries.iter().rev().map(|(_, v)| v)),
            }
        }
        None
    }
}

impl<T: Ravel> Ravel for Structure<T> {
    type Arg = T::Arg;
    type Mapped<U> = Structure<T::Mapped<U>>;

    fn try_map<U, F, E>(slf: Self, mut f: F) -> std::result::Result<Self::Mapped<U>, E>
    where
        F: FnMut(Self::Arg) -> std::result::Result<U, E>,
    {
        map_node(slf, &mut f)
    }

    fn try_visit<F, E>(slf: &Self, mut f: F) -> std::result::Result<(), E>
    where
        F: FnMut(&Self::Arg) -> std::result::Result<(), E>,
    {
        visit_node(slf, &mut f)
    }

    fn try_visit_mut<F, E>(slf: &mut Self, mut f: F) -> std::result::Result<(), E>
    where
        F: FnMut(&mut Self::Arg) -> std::result::Result<(), E>,
    {
        visit_node_mut(slf, &mut f)
    }
}

// Every level of the recursion shares one closure type `F`.

fn map_node<T, U, F, E>(node: Structure<T>, f: &mut F) -> std::result::Result<Structure<T::Mapped<U>>, E>
where
    T: Ravel,
    F: FnMut(T::Arg) -> std::result::Result<U, E>,
{
    Ok(match node {
        Structure::Leaf(array) => Structure::Leaf(Ravel::try_map(array, &mut *f)?),
        Structure::Sequence(items) => Structure::Sequence(
            items
                .into_iter()
                .map(|item| map_node(item, &mut *f))
                .collect::<std::result::Result<_, E>>()?,
        ),
        Structure::Mapping(entries) => Structure::Mapping(
            entries
                .into_iter()
                .map(|(key, item)| map_node(item, &mut *f).map(|mapped| (key, mapped)))
                .collect::<std::result::Result<_, E>>()?,
        ),
    })
}

fn visit_node<T, F, E>(node: &Structure<T>, f: &mut F) -> std::result::Result<(), E>
where
    T: Ravel,
    F: FnMut(&T::Arg) -> std::result::Result<(), E>,
{
    match node {
        Structure::Leaf(array) => Ravel::try_visit(array, &mut *f),
        Structure::Sequence(items) => items.iter().try_for_each(|item| visit_node(item, &mut *f)),
        Structure::Mapping(entries) => entries.iter().try_for_each(|(_, item)| visit_node(item, &mut *f)),
    }
}

fn visit_node_mut<T, F, E>(node: &mut Structure<T>, f: &mut F) -> std::result::Result<(), E>
where
    T: Ravel,
    F: FnMut(&mut T::Arg) -> std::result::Result<(), E>,
{
    match node {
        Structure::Leaf(array) => Ravel::try_visit_mut(array, &mut *f),
        Structure::Sequence(items) => items.iter_mut().try_for_each(|item| visit_node_mut(item, &mut *f)),
        Structure::Mapping(entries) => entries
            .iter_mut()
            .try_for_each(|(_, item)| visit_node_mut(item, &mut *f)),
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, arr2};

    use super::*;
    use crate::{count, extract};

    fn sample() -> Structure {
        Structure::mapping([
            ("w", Structure::leaf(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn())),
            (
                "layers",
                Structure::sequence([Structure::scalar(5.0), Structure::vector(vec![6.0, 7.0])]),
            ),
            ("b", Structure::leaf(arr1(&[8.0]).into_dyn())),
        ])
    }

    #[test]
    fn leaves_follow_insertion_order() {
        let s = sample();
        let shapes: Vec<_> = s.leaves().map(|leaf| leaf.shape().to_vec()).collect();
        assert_eq!(shapes, [vec![2, 2], vec![], vec![2], vec![1]]);
        assert_eq!(s.leaf_count(), 4);
        assert_eq!(s.size(), 8);
    }

    #[test]
    fn ravel_traversal_agrees_with_leaves() {
        let s = sample();
        let expected: Vec<f64> = s.leaves().flat_map(|leaf| leaf.iter().copied()).collect();
        assert_eq!(extract(&s), expected);
        assert_eq!(count(&s), s.size());
    }

    #[test]
    fn map_keeps_nesting_and_keys() {
        let negated = Ravel::map(sample(), |x: f64| -x);
        assert_eq!(negated.get("layers").and_then(|l| l.item(1)), Some(&Structure::vector(vec![-6.0, -7.0])));
        assert_eq!(negated.get("b"), Some(&Structure::leaf(arr1(&[-8.0]).into_dyn())));
        assert!(negated.get("missing").is_none());
    }

    #[test]
    fn empty_containers_have_no_leaves() {
        let s: Structure = Structure::sequence([Structure::Mapping(vec![]), Structure::sequence([])]);
        assert_eq!(s.leaf_count(), 0);
        assert_eq!(s.size(), 0);
    }
}
