use alloc::{alloc::alloc, boxed::Box};
use core::{alloc::Layout, fmt, marker::PhantomPinned, mem, ptr::NonNull};

use cordyceps::Linked;

use crate::{
    AvlTree, Compare, DeleteError, InsertError, Links, Natural, Search, TreeNode, UpdateError,
};

/// An ordered set based on an [AVL tree].
///
/// Values are ordered by the comparator `C`, which defaults to the values' [`Ord`]
/// implementation. Each value is stored in its own heap-allocated node.
///
/// ```
/// use cordyceps_avl::{AvlSet, DeleteError};
///
/// let mut set = AvlSet::new();
/// for value in [5, 3, 8, 1, 4, 7, 9] {
///     set.insert(value).unwrap();
/// }
///
/// assert_eq!(set.delete(&3), Ok(3));
/// assert_eq!(set.delete(&3), Err(DeleteError::NotFound));
/// assert_eq!(set.iter().copied().collect::<Vec<_>>(), [1, 4, 5, 7, 8, 9]);
/// ```
///
/// [AVL tree]: https://en.wikipedia.org/wiki/AVL_tree
pub struct AvlSet<V, C = Natural> {
    tree: AvlTree<SetNode<V>, C>,
}

struct SetNode<V> {
    links: Links<SetNode<V>>,
    value: V,
    _unpin: PhantomPinned,
}

impl<V> SetNode<V> {
    // Allocates a detached node holding `value`.
    fn try_new(value: V) -> Result<NonNull<Self>, InsertError> {
        // `SetNode` always embeds `Links`, so its layout is never zero-sized.
        let layout = Layout::new::<Self>();
        let ptr = unsafe { alloc(layout) }.cast::<Self>();

        let Some(ptr) = NonNull::new(ptr) else {
            log::debug!("failed to allocate {} bytes for a tree node", layout.size());
            return Err(InsertError::AllocationFailure);
        };

        unsafe {
            ptr.as_ptr().write(SetNode {
                links: Links::new(),
                value,
                _unpin: PhantomPinned,
            });
        }

        Ok(ptr)
    }
}

unsafe impl<V> Linked<Links<SetNode<V>>> for SetNode<V> {
    type Handle = Box<Self>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        Box::leak(r).into()
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        // SAFETY: nodes are allocated either by `Box` or with `Box`'s layout in `try_new`.
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<SetNode<V>>> {
        let ptr = ptr.as_ptr();
        unsafe { NonNull::new_unchecked(core::ptr::addr_of_mut!((*ptr).links)) }
    }
}

impl<V> TreeNode<Links<SetNode<V>>> for SetNode<V> {
    type Value = V;

    fn value(&self) -> &Self::Value {
        &self.value
    }
}

impl<V: Ord> AvlSet<V, Natural> {
    /// Creates a new, empty `AvlSet` ordered by [`Ord`].
    pub const fn new() -> Self {
        Self {
            tree: AvlTree::new(),
        }
    }
}

impl<V, C> AvlSet<V, C> {
    /// Creates a new, empty `AvlSet` ordered by `cmp`.
    pub const fn with_comparator(cmp: C) -> Self {
        Self {
            tree: AvlTree::with_comparator(cmp),
        }
    }

    /// Returns `true` if the set contains no elements.
    pub const fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Returns the number of elements in the set.
    pub const fn len(&self) -> usize {
        self.tree.len()
    }

    /// Returns the height of the underlying tree.
    pub fn height(&self) -> usize {
        self.tree.height()
    }

    /// Returns a reference to the comparator that orders the set.
    pub fn comparator(&self) -> &C {
        self.tree.comparator()
    }

    /// Returns the minimum value in the set.
    #[inline]
    pub fn first(&self) -> Option<&V> {
        self.tree.first().map(|node| &node.get_ref().value)
    }

    /// Removes and returns the minimum value in the set.
    #[inline]
    pub fn pop_first(&mut self) -> Option<V> {
        self.tree.pop_first().map(|node| {
            let SetNode { value, .. } = *node;
            value
        })
    }

    /// Returns the maximum value in the set.
    #[inline]
    pub fn last(&self) -> Option<&V> {
        self.tree.last().map(|node| &node.get_ref().value)
    }

    /// Removes and returns the maximum value in the set.
    #[inline]
    pub fn pop_last(&mut self) -> Option<V> {
        self.tree.pop_last().map(|node| {
            let SetNode { value, .. } = *node;
            value
        })
    }

    /// Returns an iterator over the values of the set, in ascending order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &V> + ExactSizeIterator + '_ {
        self.tree.iter().map(|node| &node.value)
    }

    /// Clears the set, removing all elements.
    #[inline]
    pub fn clear(&mut self) {
        self.tree.clear();
    }
}

impl<V, C: Compare<V>> AvlSet<V, C> {
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        self.tree.assert_invariants();
    }

    /// Returns `true` if the set contains a value equal to `value`.
    #[inline]
    pub fn contains(&self, value: &V) -> bool {
        self.tree.contains(value)
    }

    /// Returns a reference to the stored value equal to `value`.
    #[inline]
    pub fn find(&self, value: &V) -> Option<&V> {
        self.tree.find(value).map(|node| &node.get_ref().value)
    }

    /// Inserts `value` into the set.
    ///
    /// # Errors
    ///
    /// - [`InsertError::DuplicateValue`] if the set already contains an equal value.
    /// - [`InsertError::AllocationFailure`] if no memory could be allocated for the new node.
    ///
    /// On error the set is left unchanged and `value` is dropped.
    pub fn insert(&mut self, value: V) -> Result<(), InsertError> {
        let slot = match self.tree.search(&value) {
            Search::Found(_) => {
                log::debug!("insert rejected: duplicate value");
                return Err(InsertError::DuplicateValue);
            }
            Search::Vacant(slot) => slot,
        };

        let node = SetNode::try_new(value)?;

        // SAFETY: `slot` was found for the node's value, and the tree has not changed since.
        unsafe { self.tree.link_at(node, slot) };

        Ok(())
    }

    /// Replaces the value equal to `old` with `new`, moving it to its new position if necessary.
    ///
    /// Returns the replaced value. The existing node is reused, so this never allocates.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::NotFound`] if the set contains no value equal to `old`.
    /// - [`UpdateError::DuplicateValue`] if the set contains a value equal to `new` other than the
    ///   one being replaced.
    ///
    /// On error the set is left unchanged and `new` is dropped.
    pub fn update(&mut self, old: &V, new: V) -> Result<V, UpdateError> {
        let (node, in_place) = self.tree.locate_update(old, &new)?;

        unsafe {
            if in_place {
                // `new` sorts between the same neighbors as the value it replaces.
                return Ok(mem::replace(&mut (*node.as_ptr()).value, new));
            }

            let mut node = self.tree.remove_at(node);
            let old_value = mem::replace(&mut node.value, new);
            self.tree.relink(SetNode::into_ptr(node));

            Ok(old_value)
        }
    }

    /// Removes the value equal to `value` from the set and returns it.
    ///
    /// # Errors
    ///
    /// [`DeleteError::NotFound`] if the set contains no value equal to `value`; the set is left
    /// unchanged.
    pub fn delete(&mut self, value: &V) -> Result<V, DeleteError> {
        let node = self.tree.remove(value).ok_or(DeleteError::NotFound)?;
        let SetNode { value, .. } = *node;
        Ok(value)
    }
}

impl<V, C: Default> Default for AvlSet<V, C> {
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<V: fmt::Debug, C> fmt::Debug for AvlSet<V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
