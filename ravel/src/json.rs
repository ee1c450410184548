//! JSON interchange for [`Structure`].
//!
//! Serialization writes leaves as nested arrays (scalars as bare numbers), sequences
//! as arrays and mappings as objects in insertion order. Reading JSON back has to
//! guess where leaves are, so two shapes do not survive the trip:
//!
//! * a sequence of equally shaped leaves comes back as one stacked leaf;
//! * a zero-size leaf is written as `[]` (or `[[], []]`, ...), which reads back as an
//!   empty sequence (or a sequence of them). A structure whose only leaves are
//!   zero-size therefore reads back with no leaves at all.

use ndarray::ArrayViewD;
use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::path::{Path, PathSegment};
use crate::structure::Structure;

impl Structure<f64> {
    /// Builds a structure from a JSON value.
    ///
    /// * a number is a 0-d leaf;
    /// * an array whose items are all numbers, or all rectangular numeric arrays of one
    ///   common shape, is a single leaf of the stacked shape;
    /// * any other array is a sequence, and an object is a mapping in document order;
    /// * strings, booleans and `null` are not numeric and fail with
    ///   [`Error::UnsupportedLeafType`].
    ///
    /// ```
    /// use ravel::Structure;
    /// use serde_json::json;
    ///
    /// let s = Structure::from_json(&json!({"w": [[1, 2], [3, 4]], "b": [0.5, [1, 2]]})).unwrap();
    /// assert_eq!(s.get("w").unwrap().as_leaf().unwrap().shape(), [2, 2]);
    /// assert_eq!(s.get("b").unwrap().leaf_count(), 2);
    /// ```
    pub fn from_json(value: &Value) -> Result<Self> {
        let mut path = Path::root();
        from_value(value, &mut path)
    }
}

fn from_value(value: &Value, path: &mut Path) -> Result<Structure<f64>> {
    match value {
        Value::Number(number) => number
            .as_f64()
            .map(Structure::scalar)
            .ok_or_else(|| unsupported(path, "non-finite number")),
        Value::Array(items) => {
            if let Some((shape, data)) = dense(items) {
                return Structure::from_shape_vec(&shape, data).map_err(|err| match err {
                    Error::InvalidShape { shape, elements, .. } => Error::InvalidShape {
                        path: path.clone(),
                        shape,
                        elements,
                    },
                    other => other,
                });
            }
            let mut children = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                path.push(PathSegment::Index(index));
                let child = from_value(item, path);
                path.pop();
                children.push(child?);
            }
            Ok(Structure::Sequence(children))
        }
        Value::Object(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, item) in map {
                path.push(PathSegment::Key(key.clone()));
                let child = from_value(item, path);
                path.pop();
                entries.push((key.clone(), child?));
            }
            Ok(Structure::Mapping(entries))
        }
        Value::String(_) => Err(unsupported(path, "string")),
        Value::Bool(_) => Err(unsupported(path, "bool")),
        Value::Null => Err(unsupported(path, "null")),
    }
}

fn unsupported(path: &Path, found: &'static str) -> Error {
    Error::UnsupportedLeafType {
        path: path.clone(),
        found,
    }
}

/// Shape and row-major data of a non-empty rectangular numeric array, if `items` is one.
fn dense(items: &[Value]) -> Option<(Vec<usize>, Vec<f64>)> {
    let mut inner: Option<Vec<usize>> = None;
    let mut data = Vec::new();

    for item in items {
        let (shape, values) = match item {
            Value::Number(number) => (Vec::new(), vec![number.as_f64()?]),
            Value::Array(nested) => dense(nested)?,
            _ => return None,
        };
        let expected = inner.get_or_insert_with(|| shape.clone());
        if *expected != shape {
            return None;
        }
        data.extend(values);
    }

    let mut shape = vec![items.len()];
    shape.extend(inner?);
    Some((shape, data))
}

impl<T: Serialize> Serialize for Structure<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Structure::Leaf(array) => Nested(array.view()).serialize(serializer),
            Structure::Sequence(items) => serializer.collect_seq(items),
            Structure::Mapping(entries) => serializer.collect_map(entries.iter().map(|(k, v)| (k, v))),
        }
    }
}

impl<'de> Deserialize<'de> for Structure<f64> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Structure::from_json(&value).map_err(de::Error::custom)
    }
}

struct Nested<'a, T>(ArrayViewD<'a, T>);

impl<T: Serialize> Serialize for Nested<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if self.0.ndim() == 0 {
            return match self.0.iter().next() {
                Some(value) => value.serialize(serializer),
                None => serializer.serialize_unit(),
            };
        }
        let mut seq = serializer.serialize_seq(Some(self.0.shape()[0]))?;
        for row in self.0.outer_iter() {
            seq.serialize_element(&Nested(row))?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::arr2;
    use serde_json::json;

    use super::*;

    #[test]
    fn rectangular_arrays_become_leaves() {
        let s = Structure::from_json(&json!([[[1, 2, 3], [4, 5, 6]]])).unwrap();
        let leaf = s.as_leaf().unwrap();
        assert_eq!(leaf.shape(), [1, 2, 3]);
        assert_eq!(leaf.iter().copied().collect::<Vec<_>>(), [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn ragged_arrays_become_sequences() {
        let s = Structure::from_json(&json!([[1, 2], [3]])).unwrap();
        assert_eq!(s, Structure::sequence([Structure::vector(vec![1.0, 2.0]), Structure::vector(vec![3.0])]));

        let empty = Structure::from_json(&json!([])).unwrap();
        assert_eq!(empty, Structure::Sequence(vec![]));
    }

    #[test]
    fn non_numeric_leaves_report_their_path() {
        let err = Structure::from_json(&json!({"layers": [{"w": 1.0}, {"w": null}]})).unwrap_err();
        match err {
            Error::UnsupportedLeafType { path, found } => {
                assert_eq!(path.to_string(), r#"["layers"][1]["w"]"#);
                assert_eq!(found, "null");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = Structure::from_json(&json!(true)).unwrap_err();
        assert_eq!(err.to_string(), "unsupported leaf at <root>: expected a numeric array, found bool");
    }

    #[test]
    fn zero_size_leaves_read_back_as_empty_sequences() {
        let s = Structure::mapping([
            ("bias", Structure::vector(Vec::<f64>::new())),
            ("w", Structure::scalar(2.0)),
        ]);
        let text = serde_json::to_string(&s).unwrap();
        assert_eq!(text, r#"{"bias":[],"w":2.0}"#);

        let back: Structure = serde_json::from_str(&text).unwrap();
        assert_eq!(back.get("bias"), Some(&Structure::Sequence(vec![])));
        assert_eq!(back.leaf_count(), 1);

        let only_empty: Structure = serde_json::from_str("[]").unwrap();
        assert!(matches!(crate::flatten(&only_empty), Err(Error::EmptyStructure)));
    }

    #[test]
    fn serializes_in_insertion_order() {
        let s = Structure::mapping([
            ("z", Structure::scalar(1.0)),
            ("a", Structure::leaf(arr2(&[[1.0, 2.0], [3.0, 4.0]]).into_dyn())),
        ]);
        let text = serde_json::to_string(&s).unwrap();
        assert_eq!(text, r#"{"z":1.0,"a":[[1.0,2.0],[3.0,4.0]]}"#);

        let back: Structure = serde_json::from_str(&text).unwrap();
        assert_eq!(back, s);
    }
}
