use core::{iter::FusedIterator, marker::PhantomData};

use crate::{neighbor, AvlTree, Dir, Link, Links, TreeNode};

/// An in-order iterator over the elements of an [`AvlTree`].
///
/// Created by [`AvlTree::iter`].
pub struct Iter<'tree, T: TreeNode<Links<T>> + ?Sized> {
    front: Link<T>,
    back: Link<T>,

    len: usize,
    _tree: PhantomData<&'tree T>,
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iter<'tree, T> {
    pub(crate) fn new<C>(tree: &'tree AvlTree<T, C>) -> Self {
        Iter {
            front: tree.first_raw(),
            back: tree.last_raw(),

            len: tree.len(),
            _tree: PhantomData,
        }
    }

    // Yields the node under the cursor at `which` and moves that cursor one step in `dir`.
    fn step(&mut self, which: Dir) -> Option<&'tree T> {
        // The front and back cursors cross once `len` reaches zero.
        if self.len == 0 {
            return None;
        }

        let (cursor, dir) = match which {
            Dir::Left => (&mut self.front, Dir::Right),
            Dir::Right => (&mut self.back, Dir::Left),
        };

        let cur = (*cursor)?;
        *cursor = unsafe { neighbor(cur, dir) };
        self.len -= 1;

        Some(unsafe { cur.as_ref() })
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> Iterator for Iter<'tree, T> {
    type Item = &'tree T;

    fn next(&mut self) -> Option<Self::Item> {
        self.step(Dir::Left)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.len, Some(self.len))
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> DoubleEndedIterator for Iter<'tree, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.step(Dir::Right)
    }
}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> ExactSizeIterator for Iter<'tree, T> {}

impl<'tree, T: TreeNode<Links<T>> + ?Sized> FusedIterator for Iter<'tree, T> {}

impl<'tree, T: TreeNode<Links<T>> + ?Sized, C> IntoIterator for &'tree AvlTree<T, C> {
    type Item = &'tree T;
    type IntoIter = Iter<'tree, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
