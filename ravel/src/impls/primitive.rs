/// Registers types as scalar leaves of [`Ravel`](crate::Ravel) trees.
///
/// A leaf type is visited exactly once and mapped to whatever the closure returns,
/// so it can be the source or the target of a [`Ravel::map`](crate::Ravel::map).
///
/// ```
/// use ravel::Ravel;
///
/// #[derive(Clone, Copy, Debug, PartialEq)]
/// struct Dual {
///     re: f64,
///     eps: f64,
/// }
/// ravel::impl_leaf!(Dual);
///
/// let seeded = Ravel::map([1.0, 2.0], |re| Dual { re, eps: 0.0 });
/// let primal = Ravel::map(seeded, |d: Dual| d.re);
/// assert_eq!(primal, [1.0, 2.0]);
/// ```
#[macro_export]
macro_rules! impl_leaf {
    ( $( $t:ty ),* $(,)? ) => {
        $(
            impl $crate::Ravel for $t {
                type Arg = Self;
                type Mapped<U> = U;

                #[inline]
                fn try_map<U, F, E>(slf: Self, mut f: F) -> ::core::result::Result<U, E>
                where
                    F: FnMut(Self) -> ::core::result::Result<U, E>,
                {
                    f(slf)
                }

                #[inline]
                fn try_visit<F, E>(slf: &Self, mut f: F) -> ::core::result::Result<(), E>
                where
                    F: FnMut(&Self) -> ::core::result::Result<(), E>,
                {
                    f(slf)
                }

                #[inline]
                fn try_visit_mut<F, E>(slf: &mut Self, mut f: F) -> ::core::result::Result<(), E>
                where
                    F: FnMut(&mut Self) -> ::core::result::Result<(), E>,
                {
                    f(slf)
                }
            }
        )*
    };
}

impl_leaf!(f32, f64);
