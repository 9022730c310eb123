use thiserror::Error;

/// The error returned by [`AvlSet::insert`](crate::AvlSet::insert).
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum InsertError {
    /// A value comparing equal to the inserted value is already in the tree.
    #[error("an equal value is already in the tree")]
    DuplicateValue,

    /// Storage for the new node could not be allocated.
    #[error("failed to allocate a tree node")]
    AllocationFailure,
}

/// The error returned by [`AvlTree::update`](crate::AvlTree::update) and
/// [`AvlSet::update`](crate::AvlSet::update).
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum UpdateError {
    /// No value in the tree compares equal to the value being replaced.
    #[error("the value to update is not in the tree")]
    NotFound,

    /// Another node already holds a value comparing equal to the replacement.
    #[error("the replacement value is already in the tree")]
    DuplicateValue,
}

/// The error returned by [`AvlSet::delete`](crate::AvlSet::delete).
#[derive(Debug, Error, Copy, Clone, PartialEq, Eq)]
pub enum DeleteError {
    /// No value in the tree compares equal to the value being deleted.
    #[error("the value to delete is not in the tree")]
    NotFound,
}
