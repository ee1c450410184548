//! Shape signatures: everything needed to invert one `flatten` call.

use ndarray::{ArrayD, IxDyn};

use crate::element::{DType, Element};
use crate::error::{Error, Result};
use crate::path::{Path, PathSegment};
use crate::structure::Structure;

/// Metadata recorded for one leaf during flattening.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafSpec {
    pub path: Path,
    pub shape: Vec<usize>,
    pub dtype: DType,
    /// Number of elements, the product of `shape`.
    pub len: usize,
    /// Position of the leaf's first element in the flat vector.
    pub offset: usize,
}

impl LeafSpec {
    /// Range of the flat vector occupied by this leaf.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Nesting of a structure with the leaves taken out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Skeleton {
    Leaf,
    Sequence(Vec<Skeleton>),
    Mapping(Vec<(String, Skeleton)>),
}

/// Ordered leaf metadata plus nesting, produced once per flatten call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeSignature {
    leaves: Vec<LeafSpec>,
    skeleton: Skeleton,
    len: usize,
}

impl ShapeSignature {
    /// Records the signature of `structure` in a single depth-first pass.
    pub(crate) fn record<T: Element>(structure: &Structure<T>) -> Self {
        let mut recorder = Recorder {
            leaves: Vec::new(),
            path: Path::root(),
            offset: 0,
        };
        let skeleton = recorder.visit(structure, T::DTYPE);
        Self {
            leaves: recorder.leaves,
            skeleton,
            len: recorder.offset,
        }
    }

    /// Leaf metadata in flattening order.
    pub fn leaves(&self) -> &[LeafSpec] {
        &self.leaves
    }

    /// Length of the flat vector.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rebuilds a structure from `flat`, which must match [`ShapeSignature::len`].
    pub(crate) fn rebuild<T: Clone>(&self, flat: &[T]) -> Result<Structure<T>> {
        if flat.len() != self.len {
            return Err(Error::LengthMismatch {
                expected: self.len,
                actual: flat.len(),
            });
        }
        let mut specs = self.leaves.iter();
        rebuild_node(&self.skeleton, &mut specs, flat)
    }
}

struct Recorder {
    leaves: Vec<LeafSpec>,
    path: Path,
    offset: usize,
}

impl Recorder {
    fn visit<T>(&mut self, node: &Structure<T>, dtype: DType) -> Skeleton {
        match node {
            Structure::Leaf(array) => {
                let len = array.len();
                self.leaves.push(LeafSpec {
                    path: self.path.clone(),
                    shape: array.shape().to_vec(),
                    dtype,
                    len,
                    offset: self.offset,
                });
                self.offset += len;
                Skeleton::Leaf
            }
            Structure::Sequence(items) => {
                let mut children = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    self.path.push(PathSegment::Index(index));
                    children.push(self.visit(item, dtype));
                    self.path.pop();
                }
                Skeleton::Sequence(children)
            }
            Structure::Mapping(entries) => {
                let mut children = Vec::with_capacity(entries.len());
                for (key, item) in entries {
                    self.path.push(PathSegment::Key(key.clone()));
                    children.push((key.clone(), self.visit(item, dtype)));
                    self.path.pop();
                }
                Skeleton::Mapping(children)
            }
        }
    }
}

fn rebuild_node<'a, T: Clone>(
    node: &Skeleton,
    specs: &mut impl Iterator<Item = &'a LeafSpec>,
    flat: &[T],
) -> Result<Structure<T>> {
    Ok(match node {
        Skeleton::Leaf => {
            // Skeleton leaves and leaf records come from the same pass.
            let Some(spec) = specs.next() else {
                unreachable!("one leaf spec per skeleton leaf");
            };
            let data = flat[spec.range()].to_vec();
            let array = ArrayD::from_shape_vec(IxDyn(&spec.shape), data).map_err(|_| Error::InvalidShape {
                path: spec.path.clone(),
                shape: spec.shape.clone(),
                elements: spec.len,
            })?;
            Structure::Leaf(array)
        }
        Skeleton::Sequence(children) => Structure::Sequence(
            children
                .iter()
                .map(|child| rebuild_node(child, specs, flat))
                .collect::<Result<_>>()?,
        ),
        Skeleton::Mapping(children) => Structure::Mapping(
            children
                .iter()
                .map(|(key, child)| Ok((key.clone(), rebuild_node(child, specs, flat)?)))
                .collect::<Result<_>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, arr2};

    use super::*;

    #[test]
    fn offsets_are_running_sums() {
        let s = Structure::mapping([
            ("a", Structure::scalar(1.0)),
            ("empty", Structure::leaf(Array::<f64, _>::zeros(IxDyn(&[0, 3])))),
            ("m", Structure::leaf(arr2(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]).into_dyn())),
        ]);
        let sig = ShapeSignature::record(&s);

        let offsets: Vec<_> = sig.leaves().iter().map(|spec| (spec.offset, spec.len)).collect();
        assert_eq!(offsets, [(0, 1), (1, 0), (1, 6)]);
        assert_eq!(sig.len(), 7);
        assert_eq!(sig.leaves()[2].path.to_string(), r#"["m"]"#);
        assert_eq!(sig.leaves()[1].shape, [0, 3]);
        assert!(sig.leaves().iter().all(|spec| spec.dtype == DType::F64));
    }

    #[test]
    fn nested_paths_name_every_level() {
        let s = Structure::sequence([Structure::mapping([("w", Structure::sequence([Structure::scalar(1.0f32)]))])]);
        let sig = ShapeSignature::record(&s);
        assert_eq!(sig.leaves()[0].path.to_string(), r#"[0]["w"][0]"#);
        assert_eq!(sig.leaves()[0].dtype, DType::F32);
    }
}
