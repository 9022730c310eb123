use core::cmp::Ordering;

/// A total order over values of type `T`.
///
/// The tree consults its comparator for every ordering decision and never
/// inspects stored values otherwise. The comparator must be consistent for the
/// lifetime of the tree: antisymmetric, transitive, and stable across calls. An
/// inconsistent comparator does not cause undefined behavior, but the tree may
/// panic or return unspecified results. If an update panics because the
/// comparator contradicted itself, the node being moved (and, for an
/// [`AvlSet`](crate::AvlSet), its value) is leaked.
///
/// Any `Fn(&T, &T) -> Ordering` is a comparator:
///
/// ```
/// use cordyceps_avl::AvlSet;
///
/// let mut set = AvlSet::with_comparator(|a: &u32, b: &u32| b.cmp(a));
/// set.insert(1).unwrap();
/// set.insert(2).unwrap();
/// assert_eq!(set.first(), Some(&2));
/// ```
pub trait Compare<T: ?Sized> {
    /// Compares `a` with `b`.
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

impl<T, F> Compare<T> for F
where
    T: ?Sized,
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

/// Orders values by their [`Ord`] implementation.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Natural;

impl<T: Ord + ?Sized> Compare<T> for Natural {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn by_len(a: &str, b: &str) -> Ordering {
        a.len().cmp(&b.len())
    }

    #[test]
    fn natural_matches_ord() {
        assert_eq!(Natural.compare(&1, &2), Ordering::Less);
        assert_eq!(Natural.compare("b", "a"), Ordering::Greater);
        assert_eq!(Natural.compare(&7u8, &7u8), Ordering::Equal);
    }

    #[test]
    fn functions_and_closures_compare() {
        assert_eq!(Compare::<str>::compare(&by_len, "aaa", "b"), Ordering::Greater);

        let reverse = |a: &i32, b: &i32| b.cmp(a);
        assert_eq!(reverse.compare(&1, &2), Ordering::Greater);
    }
}
