use std::collections::BTreeMap;

use crate::Ravel;

/// Implements `Ravel` for a single-parameter container by spelling out its three
/// traversals; `map` and the infallible visitors come from the trait defaults.
macro_rules! impl_container {
    (
        $( [$($generics:tt)*] $src:ty => $dst:ty {
            map($slf:ident, $f:ident) => $try_map:expr;
            visit($vslf:ident, $vf:ident) => $try_visit:expr;
            visit_mut($mslf:ident, $mf:ident) => $try_visit_mut:expr;
        } )*
    ) => {$(
        impl<$($generics)*> Ravel for $src {
            type Arg = T::Arg;
            type Mapped<U> = $dst;

            #[inline]
            fn try_map<U, F, E>($slf: Self, mut $f: F) -> Result<Self::Mapped<U>, E>
            where
                F: FnMut(Self::Arg) -> Result<U, E>,
            {
                $try_map
            }

            #[inline]
            fn try_visit<F, E>($vslf: &Self, mut $vf: F) -> Result<(), E>
            where
                F: FnMut(&Self::Arg) -> Result<(), E>,
            {
                $try_visit
            }

            #[inline]
            fn try_visit_mut<F, E>($mslf: &mut Self, mut $mf: F) -> Result<(), E>
            where
                F: FnMut(&mut Self::Arg) -> Result<(), E>,
            {
                $try_visit_mut
            }
        }
    )*};
}

impl_container! {
    [T: Ravel] Option<T> => Option<T::Mapped<U>> {
        map(slf, f) => slf.map(|item| T::try_map(item, &mut f)).transpose();
        visit(slf, f) => slf.as_ref().map_or(Ok(()), |item| T::try_visit(item, &mut f));
        visit_mut(slf, f) => slf.as_mut().map_or(Ok(()), |item| T::try_visit_mut(item, &mut f));
    }

    [T: Ravel] Box<T> => Box<T::Mapped<U>> {
        map(slf, f) => T::try_map(*slf, &mut f).map(Box::new);
        visit(slf, f) => T::try_visit(&**slf, &mut f);
        visit_mut(slf, f) => T::try_visit_mut(&mut **slf, &mut f);
    }

    [T: Ravel] Vec<T> => Vec<T::Mapped<U>> {
        map(slf, f) => slf.into_iter().map(|item| T::try_map(item, &mut f)).collect();
        visit(slf, f) => slf.iter().try_for_each(|item| T::try_visit(item, &mut f));
        visit_mut(slf, f) => slf.iter_mut().try_for_each(|item| T::try_visit_mut(item, &mut f));
    }

    [T: Ravel, const N: usize] [T; N] => [T::Mapped<U>; N] {
        map(slf, f) => {
            let mut items = slf.into_iter();
            array_init::try_array_init(|_| match items.next() {
                Some(item) => T::try_map(item, &mut f),
                None => unreachable!("array iterator yields exactly N items"),
            })
        };
        visit(slf, f) => slf.iter().try_for_each(|item| T::try_visit(item, &mut f));
        visit_mut(slf, f) => slf.iter_mut().try_for_each(|item| T::try_visit_mut(item, &mut f));
    }

    // Ordered by key, so the layout does not depend on insertion history.
    [K: Ord, T: Ravel] BTreeMap<K, T> => BTreeMap<K, T::Mapped<U>> {
        map(slf, f) => slf
            .into_iter()
            .map(|(key, item)| T::try_map(item, &mut f).map(|mapped| (key, mapped)))
            .collect();
        visit(slf, f) => slf.values().try_for_each(|item| T::try_visit(item, &mut f));
        visit_mut(slf, f) => slf.values_mut().try_for_each(|item| T::try_visit_mut(item, &mut f));
    }
}

macro_rules! impl_tuple {
    ($first:ident $(, $rest:ident)*) => {
        #[allow(non_snake_case)]
        impl<$first, $($rest),*> Ravel for ($first, $($rest,)*)
        where
            $first: Ravel,
            $( $rest: Ravel<Arg = $first::Arg>, )*
        {
            type Arg = $first::Arg;
            type Mapped<U> = ($first::Mapped<U>, $( $rest::Mapped<U>, )*);

            #[inline]
            fn try_map<U, F, E>(slf: Self, mut f: F) -> Result<Self::Mapped<U>, E>
            where
                F: FnMut(Self::Arg) -> Result<U, E>,
            {
                let ($first, $( $rest, )*) = slf;
                Ok((
                    Ravel::try_map($first, &mut f)?,
                    $( Ravel::try_map($rest, &mut f)?, )*
                ))
            }

            #[inline]
            fn try_visit<F, E>(slf: &Self, mut f: F) -> Result<(), E>
            where
                F: FnMut(&Self::Arg) -> Result<(), E>,
            {
                let ($first, $( $rest, )*) = slf;
                Ravel::try_visit($first, &mut f)?;
                $( Ravel::try_visit($rest, &mut f)?; )*
                Ok(())
            }

            #[inline]
            fn try_visit_mut<F, E>(slf: &mut Self, mut f: F) -> Result<(), E>
            where
                F: FnMut(&mut Self::Arg) -> Result<(), E>,
            {
                let ($first, $( $rest, )*) = slf;
                Ravel::try_visit_mut($first, &mut f)?;
                $( Ravel::try_visit_mut($rest, &mut f)?; )*
                Ok(())
            }
        }
    };
}

impl_tuple!(A, B);
impl_tuple!(A, B, C);
impl_tuple!(A, B, C, D);
