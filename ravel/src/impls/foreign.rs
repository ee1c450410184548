use ndarray::{Array, Dimension};

use crate::Ravel;

// Elements are visited in logical (row-major) order regardless of memory layout,
// and mapped arrays are always rebuilt in standard layout.
impl<T, D> Ravel for Array<T, D>
where
    T: Ravel,
    D: Dimension,
{
    type Arg = T::Arg;
    type Mapped<U> = Array<T::Mapped<U>, D>;

    fn try_map<U, F, E>(slf: Self, mut f: F) -> Result<Self::Mapped<U>, E>
    where
        F: FnMut(Self::Arg) -> Result<U, E>,
    {
        let dim = slf.raw_dim();
        let data = slf
            .into_iter()
            .map(|item| T::try_map(item, &mut f))
            .collect::<Result<Vec<_>, E>>()?;

        Ok(Array::from_shape_vec(dim, data).expect("mapping preserves the element count"))
    }

    fn try_visit<F, E>(slf: &Self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&Self::Arg) -> Result<(), E>,
    {
        slf.iter().try_for_each(|item| T::try_visit(item, &mut f))
    }

    fn try_visit_mut<F, E>(slf: &mut Self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&mut Self::Arg) -> Result<(), E>,
    {
        slf.iter_mut().try_for_each(|item| T::try_visit_mut(item, &mut f))
    }
}
