//! An intrusive AVL tree ordered by a caller-supplied comparator, and an owning
//! ordered set built on top of it.
#![no_std]

// Conventions used in comments:
// - The height `h(x)` of a node `x` is the number of nodes on the longest path from `x` down to a
//   leaf, inclusive. Leaves have height 1; a missing child has height 0.
// - The balance `b(x)` of a node `x` is `h(left(x)) - h(right(x))`.
// - `x` is left-heavy if `b(x) > 0` and right-heavy if `b(x) < 0`.
//
// The invariants of the tree are:
// 1. In-order traversal yields values in strictly increasing order per the comparator.
// 2. For every node `x`, `b(x) ∈ {-1, 0, 1}`.
// 3. Every non-root node is exactly one child of its parent.
// 4. Every cached height is exact.
//
// Insertion and removal each change the height of at most one subtree on the path to the root by
// one, which can push the balance of an ancestor to ±2. Rotating at such an ancestor `z` with
// heavy child `y` restores (2) locally:
//
// - If `y` leans the same way as `z` (or is balanced, which only happens after removal), a single
//   rotation lifts `y` above `z`.
// - If `y` leans the other way, its inner child `x` is lifted above both by a double rotation.

#[cfg(feature = "alloc")]
extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

use core::{
    cell::UnsafeCell, cmp::Ordering, fmt, marker::PhantomPinned, mem, ops::Not, pin::Pin,
    ptr::NonNull,
};

use cordyceps::Linked;

mod compare;
#[cfg(feature = "std")]
mod debug;
mod error;
mod iter;
#[cfg(feature = "alloc")]
mod set;

#[cfg(all(feature = "std", any(test, feature = "model")))]
pub mod model;

#[cfg(all(test, feature = "std"))]
mod tests;

pub use compare::{Compare, Natural};
pub use error::{DeleteError, InsertError, UpdateError};
pub use iter::Iter;
#[cfg(feature = "alloc")]
pub use set::AvlSet;

/// A node which can be linked into an [`AvlTree`].
pub trait TreeNode<L>: Linked<L> {
    /// The type of value the tree is ordered by.
    type Value: ?Sized;

    /// Returns the value stored in this node.
    ///
    /// The result of comparing this value against other values must not change while the node is
    /// linked into a tree.
    fn value(&self) -> &Self::Value;
}

/// An intrusive AVL tree.
///
/// Nodes are allocated by the caller and embed a [`Links`] block; the tree takes ownership of a
/// node's [`Linked::Handle`] while the node is linked, and gives it back when the node is removed.
/// Values are ordered by the comparator `C`, which defaults to the values' [`Ord`] implementation.
///
/// Every operation other than [`clear`](Self::clear) completes in _O(log(n))_ time.
pub struct AvlTree<T, C = Natural>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    root: Link<T>,
    len: usize,
    cmp: C,
}

/// Links to other nodes in an [`AvlTree`].
///
/// Every node type must embed exactly one `Links` for each tree it can be linked into.
pub struct Links<T: ?Sized> {
    inner: UnsafeCell<LinksInner<T>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Dir {
    Left = 0,
    Right = 1,
}

impl Not for Dir {
    type Output = Dir;

    fn not(self) -> Self::Output {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

#[repr(C)]
struct LinksInner<T: ?Sized> {
    parent: Link<T>,
    children: [Link<T>; 2],
    height: u8,
    _unpin: PhantomPinned,
}

pub(crate) type Link<T> = Option<NonNull<T>>;

/// The result of searching a tree for a value.
pub(crate) enum Search<T: ?Sized> {
    /// A node holding an equal value.
    Found(NonNull<T>),
    /// The vacant slot where the value would be linked.
    Vacant(Slot<T>),
}

pub(crate) enum Slot<T: ?Sized> {
    Root,
    Child { parent: NonNull<T>, dir: Dir },
}

impl<T> AvlTree<T, Natural>
where
    T: TreeNode<Links<T>> + ?Sized,
    T::Value: Ord,
{
    /// Returns a new empty tree ordered by [`Ord`].
    pub const fn new() -> AvlTree<T, Natural> {
        AvlTree::with_comparator(Natural)
    }
}

impl<T, C> AvlTree<T, C>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Returns a new empty tree ordered by `cmp`.
    pub const fn with_comparator(cmp: C) -> AvlTree<T, C> {
        AvlTree {
            root: None,
            len: 0,
            cmp,
        }
    }

    /// Returns `true` if the tree contains no elements.
    pub const fn is_empty(&self) -> bool {
        let empty = self.len() == 0;

        if cfg!(debug_assertions) {
            // Can't use assert_eq!() in const fn.
            assert!(empty == self.root.is_none());
        }

        empty
    }

    /// Returns the number of elements in the tree.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the height of the tree.
    ///
    /// An empty tree has height 0 and a tree with a single element has height 1.
    pub fn height(&self) -> usize {
        height(self.root).into()
    }

    /// Returns a reference to the comparator that orders the tree.
    pub fn comparator(&self) -> &C {
        &self.cmp
    }

    /// Returns the minimum element of the tree.
    pub fn first(&self) -> Option<Pin<&T>> {
        let root = self.root?;

        unsafe {
            let first = extreme(root, Dir::Left);
            Some(Pin::new_unchecked(first.as_ref()))
        }
    }

    /// Returns the maximum element of the tree.
    pub fn last(&self) -> Option<Pin<&T>> {
        let root = self.root?;

        unsafe {
            let last = extreme(root, Dir::Right);
            Some(Pin::new_unchecked(last.as_ref()))
        }
    }

    /// Removes and returns the minimum element of the tree.
    pub fn pop_first(&mut self) -> Option<T::Handle> {
        let root = self.root?;

        unsafe {
            let first = extreme(root, Dir::Left);
            Some(self.remove_at(first))
        }
    }

    /// Removes and returns the maximum element of the tree.
    pub fn pop_last(&mut self) -> Option<T::Handle> {
        let root = self.root?;

        unsafe {
            let last = extreme(root, Dir::Right);
            Some(self.remove_at(last))
        }
    }

    /// Returns an iterator over the elements of the tree, in ascending order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter::new(self)
    }

    /// Removes an arbitrary node from the tree.
    ///
    /// # Safety
    ///
    /// It is the caller's responsibility to ensure that `node` is an element of `self`, and not any
    /// other tree.
    pub unsafe fn remove_at(&mut self, node: NonNull<T>) -> T::Handle {
        // There are three possible cases:
        //
        // 1. `node` is a leaf. It is detached from its parent.
        //
        // 2. `node` has one child. The child is elevated into `node`'s place.
        //
        // 3. `node` has two children. `node`'s successor[^1] is detached from its own position,
        //    where its right child (if any) is elevated to replace it, and then assumes `node`'s
        //    place. The successor by definition has no left child, so detaching it is an instance
        //    of case 1 or 2.
        //
        // In every case, the lowest node whose subtree changed shape is the first node that may be
        // out of balance, and rebalancing proceeds from there to the root.
        //
        // [^1]: The successor of a node `a` is the least node in `a`'s right subtree.

        unsafe {
            let parent = self.links(node).parent();
            let left = self.links(node).left();
            let right = self.links(node).right();

            let rebalance_from = match (left, right) {
                (Some(left), Some(right)) => {
                    let (successor, successor_parent) = self.min_in_subtree(right);

                    let lowest_changed = match successor_parent {
                        Some(successor_parent) => {
                            // Elevate the successor's right child to replace it.
                            let successor_right = self.links(successor).right();
                            self.replace_child(successor_parent, successor, successor_right);
                            self.maybe_set_parent(successor_right, Some(successor_parent));
                            self.links_mut(successor).set_right(Some(right));
                            self.links_mut(right).set_parent(Some(successor));
                            successor_parent
                        }

                        // The successor is `right` itself and keeps its right subtree.
                        None => successor,
                    };

                    self.replace_child_or_set_root(parent, node, Some(successor));
                    self.links_mut(successor).set_parent(parent);
                    self.links_mut(successor).set_left(Some(left));
                    self.links_mut(left).set_parent(Some(successor));

                    Some(lowest_changed)
                }

                (Some(child), None) | (None, Some(child)) => {
                    self.replace_child_or_set_root(parent, node, Some(child));
                    self.links_mut(child).set_parent(parent);
                    parent
                }

                (None, None) => {
                    self.replace_child_or_set_root(parent, node, None);
                    parent
                }
            };

            self.links_mut(node).clear();
            self.len -= 1;

            self.rebalance_from(rebalance_from);

            T::from_ptr(node)
        }
    }

    /// Clears the tree, removing all elements.
    ///
    /// Nodes are dropped in ascending order. This operation completes in _O(n)_ time.
    pub fn clear(&mut self) {
        let mut opt_cur = self.root;

        while let Some(cur) = opt_cur {
            unsafe {
                // Descend to the minimum node.
                let (cur, parent) = self.min_in_subtree(cur);
                let parent = parent.or_else(|| self.links(cur).parent());

                let right = self.links(cur).right();

                // Elevate the node's right child (which may be None). Heights are left stale, as
                // every remaining node is about to be dropped.
                self.replace_child_or_set_root(parent, cur, right);
                self.maybe_set_parent(right, parent);

                // Drop the node.
                self.links_mut(cur).clear();
                drop(T::from_ptr(cur));
                self.len -= 1;

                // If the node had no right child, climb to the parent. If the node had no parent,
                // the tree is empty.
                opt_cur = right.or(parent);
            }
        }

        debug_assert!(self.root.is_none());
        debug_assert_eq!(self.len(), 0);
    }

    // Links a detached node into the vacant `slot` and restores balance.
    //
    // # Safety
    //
    // The caller must ensure that `slot` was produced by `search` for `node`'s value, and that the
    // tree has not been modified since.
    pub(crate) unsafe fn link_at(&mut self, node: NonNull<T>, slot: Slot<T>) {
        unsafe {
            let links = self.links_mut(node);
            links.set_left(None);
            links.set_right(None);
            links.set_height(1);

            match slot {
                Slot::Root => {
                    debug_assert!(self.root.is_none());
                    links.set_parent(None);
                    self.root = Some(node);
                }

                Slot::Child { parent, dir } => {
                    debug_assert!(self.links(parent).child(dir).is_none());
                    links.set_parent(Some(parent));
                    self.links_mut(parent).set_child(dir, Some(node));
                }
            }

            self.len += 1;

            let parent = self.links(node).parent();
            self.rebalance_from(parent);
        }
    }

    // Replaces the linked node `old` with the detached node `new`, which takes over `old`'s
    // position and height. Returns the handle to `old`.
    //
    // # Safety
    //
    // The caller must ensure that `old` is an element of `self`, and that `new`'s value compares
    // strictly between the values of `old`'s predecessor and successor.
    pub(crate) unsafe fn replace_at(&mut self, old: NonNull<T>, new: NonNull<T>) -> T::Handle {
        unsafe {
            // Read the old node's links.
            let old_links = self.links(old);
            let height = old_links.height();
            let parent = old_links.parent();
            let left = old_links.left();
            let right = old_links.right();

            // Link the new node into the tree.
            self.replace_child_or_set_root(parent, old, Some(new));
            self.maybe_set_parent(left, Some(new));
            self.maybe_set_parent(right, Some(new));

            let new_links = self.links_mut(new);
            new_links.set_parent(parent);
            new_links.set_left(left);
            new_links.set_right(right);
            new_links.set_height(height);

            // Deinit the old node's links.
            self.links_mut(old).clear();

            T::from_ptr(old)
        }
    }

    pub(crate) fn first_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { extreme(root, Dir::Left) })
    }

    pub(crate) fn last_raw(&self) -> Link<T> {
        self.root.map(|root| unsafe { extreme(root, Dir::Right) })
    }

    // Rebalancing ============================================================

    // Walks from `opt_node` to the root, recomputing heights and rotating at every node whose
    // balance is ±2.
    fn rebalance_from(&mut self, mut opt_node: Link<T>) {
        while let Some(node) = opt_node {
            unsafe {
                self.update_height(node);

                let subtree_root = match self.balance(node) {
                    2 => self.rotate_heavy(node, Dir::Left),
                    -2 => self.rotate_heavy(node, Dir::Right),
                    b => {
                        debug_assert!((-1..=1).contains(&b), "balance {b} out of range");
                        node
                    }
                };

                opt_node = self.links(subtree_root).parent();
            }
        }
    }

    // Restores the balance of `z`, whose `heavy` subtree is two levels taller than the other.
    //
    // Returns the new root of the subtree formerly rooted at `z`.
    unsafe fn rotate_heavy(&mut self, z: NonNull<T>, heavy: Dir) -> NonNull<T> {
        unsafe {
            let y = self
                .links(z)
                .child(heavy)
                .expect("heavy side of an unbalanced node must be present");

            // Positive if `y` leans the same way as `z`.
            let lean = match heavy {
                Dir::Left => self.balance(y),
                Dir::Right => -self.balance(y),
            };

            if lean >= 0 {
                // Left-left or right-right.
                log::trace!("single rotation toward {:?}", !heavy);

                self.rotate_at(z, y);
                self.update_height(z);
                self.update_height(y);
                y
            } else {
                // Left-right or right-left.
                log::trace!("double rotation toward {:?}", !heavy);

                let x = self
                    .links(y)
                    .child(!heavy)
                    .expect("inner grandchild of a double rotation must be present");

                self.rotate_twice_at(z, y, x);
                self.update_height(z);
                self.update_height(y);
                self.update_height(x);
                x
            }
        }
    }

    // Performs a rotation, moving `up` up and its parent `down` down.
    //
    // The heights of affected nodes are not updated.
    fn rotate_at(&mut self, down: NonNull<T>, up: NonNull<T>) {
        unsafe {
            // - `down` becomes the `dir` child of `up`.
            // - `across` goes from the `dir` child of `up` to the `!dir` child of `down`.
            let dir = if self.links(down).right() == Some(up) {
                Dir::Left
            } else {
                Dir::Right
            };

            debug_assert_ne!(self.root, Some(up), "cannot rotate the root upward");

            let across = self.links(up).child(dir);
            self.links_mut(down).set_child(!dir, across);
            self.maybe_set_parent(across, Some(down));

            self.links_mut(up).set_child(dir, Some(down));
            let parent = self.links_mut(down).set_parent(Some(up));
            self.links_mut(up).set_parent(parent);

            self.replace_child_or_set_root(parent, down, Some(up));
        }
    }

    // Performs a double rotation lifting `up` above both its parent `down_first` and its
    // grandparent `down_second`.
    //
    // The heights of affected nodes are not updated.
    fn rotate_twice_at(&mut self, down_second: NonNull<T>, down_first: NonNull<T>, up: NonNull<T>) {
        unsafe {
            let dir = if self.links(down_first).right() == Some(up) {
                Dir::Right
            } else {
                Dir::Left
            };

            let across_first = self.links(up).child(!dir);
            let across_second = self.links(up).child(dir);

            self.maybe_set_parent(across_first, Some(down_first));

            self.links_mut(down_first).set_child(dir, across_first);
            self.links_mut(down_first).set_parent(Some(up));

            self.maybe_set_parent(across_second, Some(down_second));

            self.links_mut(down_second).set_child(!dir, across_second);
            let parent = self.links_mut(down_second).set_parent(Some(up));

            self.links_mut(up).set_parent(parent);
            self.links_mut(up).set_child(!dir, Some(down_first));
            self.links_mut(up).set_child(dir, Some(down_second));

            self.replace_child_or_set_root(parent, down_second, Some(up));
        }
    }

    // Support methods ========================================================

    #[inline]
    unsafe fn links<'a>(&self, node: NonNull<T>) -> &'a Links<T> {
        unsafe { T::links(node).as_ref() }
    }

    #[inline]
    unsafe fn links_mut<'a>(&mut self, node: NonNull<T>) -> &'a mut Links<T> {
        unsafe { T::links(node).as_mut() }
    }

    unsafe fn maybe_set_parent(&mut self, opt_node: Link<T>, parent: Link<T>) {
        let Some(node) = opt_node else {
            return;
        };

        unsafe { self.links_mut(node).set_parent(parent) };
    }

    #[inline]
    unsafe fn replace_child_or_set_root(
        &mut self,
        parent: Link<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        match parent {
            Some(parent) => unsafe { self.replace_child(parent, old_child, new_child) },
            None => self.root = new_child,
        }
    }

    // Replaces the child pointer of `parent` pointing at `old_child` with `new_child`.
    //
    // `new_child`'s parent pointer is not updated.
    //
    // # Safety
    //
    // The caller must ensure that the following conditions hold:
    // - `old_child` is a child node of `parent`.
    // - `new_child` is not a child node of `parent`.
    unsafe fn replace_child(
        &mut self,
        parent: NonNull<T>,
        old_child: NonNull<T>,
        new_child: Link<T>,
    ) {
        unsafe {
            let dir = self.which_child(parent, old_child);

            debug_assert_eq!(
                self.links(parent).child(dir),
                Some(old_child),
                "`old_child` must be a child of `parent`"
            );
            debug_assert!(
                new_child.is_none() || self.links(parent).child(!dir) != new_child,
                "`new_child` must not be a child of `parent`"
            );

            self.links_mut(parent).set_child(dir, new_child);
        }
    }

    // Returns the minimum node in the subtree.
    //
    // If the subtree root is not the minimum, also returns the minimum node's parent.
    #[inline]
    unsafe fn min_in_subtree(&self, root: NonNull<T>) -> (NonNull<T>, Option<NonNull<T>>) {
        let mut parent = None;
        let mut cur = root;

        while let Some(left) = unsafe { self.links(cur).left() } {
            parent = Some(cur);
            cur = left;
        }

        (cur, parent)
    }

    #[inline]
    unsafe fn update_height(&mut self, node: NonNull<T>) {
        unsafe {
            let links = self.links_mut(node);
            let tallest = height(links.left()).max(height(links.right()));
            links.set_height(tallest + 1);
        }
    }

    #[inline]
    unsafe fn balance(&self, node: NonNull<T>) -> i8 {
        unsafe {
            let links = self.links(node);
            // Heights are bounded by ~1.44·log2(usize::MAX), well within `i8`.
            height(links.left()) as i8 - height(links.right()) as i8
        }
    }

    unsafe fn which_child(&self, parent: NonNull<T>, child: NonNull<T>) -> Dir {
        if unsafe { self.links(parent).left() } == Some(child) {
            Dir::Left
        } else {
            Dir::Right
        }
    }
}

impl<T, C> AvlTree<T, C>
where
    T: TreeNode<Links<T>> + ?Sized,
    C: Compare<T::Value>,
{
    #[doc(hidden)]
    pub fn assert_invariants(&self) {
        let Some(root) = self.root else {
            assert_eq!(self.len, 0, "empty tree must have length 0");
            return;
        };

        unsafe {
            assert_eq!(self.links(root).parent(), None, "root must not have a parent");

            let (count, _) = self.assert_invariants_at(root, [None, None]);
            assert_eq!(count, self.len, "length must equal the number of linked nodes");
        }
    }

    // Returns the number of nodes in the subtree and its height.
    //
    // `bounds` holds the nearest ancestors the subtree lies to the right and to the left of,
    // respectively; every value in the subtree must sort strictly between them.
    unsafe fn assert_invariants_at(&self, node: NonNull<T>, bounds: [Link<T>; 2]) -> (usize, u8) {
        unsafe {
            let value = node.as_ref().value();

            // Ensure this node is ordered correctly relative to its ancestors.
            if let Some(lower) = bounds[Dir::Left as usize] {
                let ord = self.cmp.compare(lower.as_ref().value(), value);
                assert_eq!(ord, Ordering::Less, "value out of order with lower bound");
            }
            if let Some(upper) = bounds[Dir::Right as usize] {
                let ord = self.cmp.compare(upper.as_ref().value(), value);
                assert_eq!(ord, Ordering::Greater, "value out of order with upper bound");
            }

            let mut count = 1;
            let mut heights = [0; 2];

            for dir in [Dir::Left, Dir::Right] {
                let Some(child) = self.links(node).child(dir) else {
                    continue;
                };

                // Ensure child's parent link points to this node.
                let parent = self
                    .links(child)
                    .parent()
                    .expect("child parent pointer not set");
                assert_eq!(node, parent);

                // This node bounds the child's subtree on the side opposite `dir`.
                let mut child_bounds = bounds;
                child_bounds[!dir as usize] = Some(node);

                let (child_count, child_height) = self.assert_invariants_at(child, child_bounds);
                count += child_count;
                heights[dir as usize] = child_height;
            }

            // Ensure the subtree is balanced and its cached height is exact.
            let [left, right] = heights;
            assert!(left.abs_diff(right) <= 1, "unbalanced node: {left} vs {right}");

            let height = left.max(right) + 1;
            assert_eq!(self.links(node).height(), height, "stale height");

            (count, height)
        }
    }

    /// Returns `true` if the tree contains an element equal to `value`.
    #[inline]
    pub fn contains(&self, value: &T::Value) -> bool {
        self.find_raw(value).is_some()
    }

    /// Returns a reference to the node whose value is equal to `value`.
    pub fn find(&self, value: &T::Value) -> Option<Pin<&T>> {
        let ptr = self.find_raw(value)?;
        unsafe { Some(Pin::new_unchecked(ptr.as_ref())) }
    }

    pub(crate) fn find_raw(&self, value: &T::Value) -> Link<T> {
        match self.search(value) {
            Search::Found(node) => Some(node),
            Search::Vacant(_) => None,
        }
    }

    // Descends the tree, looking for `value` or the slot where it belongs.
    pub(crate) fn search(&self, value: &T::Value) -> Search<T> {
        let Some(mut cur) = self.root else {
            return Search::Vacant(Slot::Root);
        };

        loop {
            let dir = match self.cmp.compare(value, unsafe { cur.as_ref().value() }) {
                Ordering::Less => Dir::Left,
                Ordering::Equal => return Search::Found(cur),
                Ordering::Greater => Dir::Right,
            };

            match unsafe { self.links(cur).child(dir) } {
                Some(child) => cur = child,
                None => return Search::Vacant(Slot::Child { parent: cur, dir }),
            }
        }
    }

    /// Inserts an item into the tree.
    ///
    /// If the tree already contains an element whose value is equal to the item's value, the tree
    /// is left unchanged and the item is returned.
    pub fn insert(&mut self, item: T::Handle) -> Result<(), T::Handle> {
        let ptr = T::into_ptr(item);

        match self.search(unsafe { ptr.as_ref().value() }) {
            Search::Found(_) => {
                log::debug!("insert rejected: duplicate value");
                Err(unsafe { T::from_ptr(ptr) })
            }

            Search::Vacant(slot) => {
                unsafe { self.link_at(ptr, slot) };
                Ok(())
            }
        }
    }

    /// Removes the element equal to `value` from the tree.
    pub fn remove(&mut self, value: &T::Value) -> Option<T::Handle> {
        let node = self.find_raw(value)?;
        unsafe { Some(self.remove_at(node)) }
    }

    /// Replaces the element equal to `old` with `item`, returning the replaced element.
    ///
    /// If `item`'s value belongs in the same position as `old`, `item` takes over its links
    /// directly. Otherwise the old element is removed and `item` is inserted, rebalancing the tree
    /// after each step.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::NotFound`] if no element is equal to `old`.
    /// - [`UpdateError::DuplicateValue`] if an element other than the one equal to `old` is equal
    ///   to `item`'s value.
    ///
    /// On error the tree is left unchanged and `item` is returned alongside the error.
    pub fn update(
        &mut self,
        old: &T::Value,
        item: T::Handle,
    ) -> Result<T::Handle, (UpdateError, T::Handle)> {
        let ptr = T::into_ptr(item);

        let (node, in_place) = match self.locate_update(old, unsafe { ptr.as_ref().value() }) {
            Ok(found) => found,
            Err(error) => return Err((error, unsafe { T::from_ptr(ptr) })),
        };

        unsafe {
            if in_place {
                return Ok(self.replace_at(node, ptr));
            }

            let old_item = self.remove_at(node);
            self.relink(ptr);
            Ok(old_item)
        }
    }

    // Finds the node to update from `old` to `new`, and whether `new` can be stored in that node
    // without moving it.
    pub(crate) fn locate_update(
        &self,
        old: &T::Value,
        new: &T::Value,
    ) -> Result<(NonNull<T>, bool), UpdateError> {
        let node = self.find_raw(old).ok_or(UpdateError::NotFound)?;

        match self.find_raw(new) {
            Some(other) if !core::ptr::addr_eq(other.as_ptr(), node.as_ptr()) => {
                log::debug!("update rejected: duplicate value");
                return Err(UpdateError::DuplicateValue);
            }
            _ => (),
        }

        let in_place = unsafe { self.fits_at(node, new) };
        if !in_place {
            log::debug!("update moves value; reinserting");
        }

        Ok((node, in_place))
    }

    // Returns `true` if `value` sorts strictly between `node`'s in-order neighbors.
    unsafe fn fits_at(&self, node: NonNull<T>, value: &T::Value) -> bool {
        unsafe {
            let after_prev = neighbor(node, Dir::Left)
                .map(|prev| self.cmp.compare(prev.as_ref().value(), value) == Ordering::Less)
                .unwrap_or(true);

            let before_next = neighbor(node, Dir::Right)
                .map(|next| self.cmp.compare(next.as_ref().value(), value) == Ordering::Greater)
                .unwrap_or(true);

            after_prev && before_next
        }
    }

    // Links a detached node whose value is known to be absent from the tree.
    pub(crate) unsafe fn relink(&mut self, node: NonNull<T>) {
        match self.search(unsafe { node.as_ref().value() }) {
            Search::Vacant(slot) => unsafe { self.link_at(node, slot) },
            Search::Found(_) => {
                unreachable!("value was checked to be absent; the comparator is inconsistent")
            }
        }
    }
}

impl<T, C> Default for AvlTree<T, C>
where
    T: TreeNode<Links<T>> + ?Sized,
    C: Default,
{
    fn default() -> Self {
        AvlTree::with_comparator(C::default())
    }
}

impl<T, C> Drop for AvlTree<T, C>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    fn drop(&mut self) {
        self.clear();
    }
}

impl<T, C> fmt::Debug for AvlTree<T, C>
where
    T: TreeNode<Links<T>> + fmt::Debug + ?Sized,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

// SAFETY: the tree only reaches its nodes through links it exclusively manages, so it may be sent
// or shared exactly when its nodes and comparator may be.
unsafe impl<T, C> Send for AvlTree<T, C>
where
    T: TreeNode<Links<T>> + Send + ?Sized,
    C: Send,
{
}

unsafe impl<T, C> Sync for AvlTree<T, C>
where
    T: TreeNode<Links<T>> + Sync + ?Sized,
    C: Sync,
{
}

// Returns the extreme node of the subtree rooted at `root` in direction `dir`.
#[inline]
unsafe fn extreme<T: ?Sized + Linked<Links<T>>>(root: NonNull<T>, dir: Dir) -> NonNull<T> {
    let mut cur = root;

    while let Some(next) = unsafe { T::links(cur).as_ref().child(dir) } {
        cur = next;
    }

    cur
}

// Returns the in-order neighbor of `node` in direction `dir`.
pub(crate) unsafe fn neighbor<T>(node: NonNull<T>, dir: Dir) -> Link<T>
where
    T: Linked<Links<T>> + ?Sized,
{
    unsafe {
        if let Some(child) = T::links(node).as_ref().child(dir) {
            return Some(extreme(child, !dir));
        }

        // Ascend until `cur` is a `!dir` child; its parent is the neighbor.
        let mut cur = node;
        while let Some(parent) = T::links(cur).as_ref().parent() {
            if T::links(parent).as_ref().child(!dir) == Some(cur) {
                return Some(parent);
            }

            cur = parent;
        }

        None
    }
}

#[inline]
fn height<T: ?Sized + Linked<Links<T>>>(node: Link<T>) -> u8 {
    node.map(|n| unsafe { T::links(n).as_ref().height() })
        .unwrap_or(0)
}

impl<T: ?Sized> Links<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: UnsafeCell::new(LinksInner {
                parent: None,
                children: [None; 2],
                height: 0,
                _unpin: PhantomPinned,
            }),
        }
    }

    /// Returns `true` if this node is currently linked into a tree.
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.height() != 0
    }

    #[inline]
    fn height(&self) -> u8 {
        unsafe { (*self.inner.get()).height }
    }

    #[inline]
    fn parent(&self) -> Link<T> {
        unsafe { (*self.inner.get()).parent }
    }

    #[inline]
    fn child(&self, dir: Dir) -> Link<T> {
        unsafe { (*self.inner.get()).children[dir as usize] }
    }

    #[inline]
    fn left(&self) -> Link<T> {
        self.child(Dir::Left)
    }

    #[inline]
    fn right(&self) -> Link<T> {
        self.child(Dir::Right)
    }

    #[inline]
    fn set_parent(&mut self, parent: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().parent, parent)
    }

    #[inline]
    fn set_child(&mut self, dir: Dir, child: Link<T>) -> Link<T> {
        mem::replace(&mut self.inner.get_mut().children[dir as usize], child)
    }

    #[inline]
    fn set_left(&mut self, left: Link<T>) -> Link<T> {
        self.set_child(Dir::Left, left)
    }

    #[inline]
    fn set_right(&mut self, right: Link<T>) -> Link<T> {
        self.set_child(Dir::Right, right)
    }

    #[inline]
    fn set_height(&mut self, height: u8) {
        self.inner.get_mut().height = height;
    }

    #[inline]
    fn clear(&mut self) {
        let inner = self.inner.get_mut();
        inner.parent = None;
        inner.children = [None; 2];
        inner.height = 0;
    }
}

impl<T: ?Sized> Default for Links<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for Links<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Links")
            .field("parent", &self.parent())
            .field("left", &self.left())
            .field("right", &self.right())
            .field("height", &self.height())
            .finish()
    }
}

// SAFETY: links are only read or written through the tree that owns the node.
unsafe impl<T: Send + ?Sized> Send for Links<T> {}
unsafe impl<T: Sync + ?Sized> Sync for Links<T> {}
