use std::fmt;

use num_traits::Float;
use serde::{Deserialize, Serialize};

/// Element type of a leaf, recorded in the shape signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F32,
    F64,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DType::F32 => "f32",
            DType::F64 => "f64",
        })
    }
}

/// Floating-point scalar that can live in a flat vector.
pub trait Element:
    Float + fmt::Debug + Default + Send + Sync + 'static + crate::Ravel<Arg = Self>
{
    const DTYPE: DType;

    /// Finite-difference step that balances truncation and rounding error.
    fn default_step() -> Self;
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    fn default_step() -> Self {
        1e-3
    }
}

impl Element for f64 {
    const DTYPE: DType = DType::F64;

    fn default_step() -> Self {
        1e-6
    }
}
