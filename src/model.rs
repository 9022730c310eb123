//! Model-based equivalence checks against [`BTreeSet`].
//!
//! Every operation is applied to an [`AvlSet`], to an intrusive [`AvlTree`], and to a `BTreeSet`,
//! and the results are compared. Invariants are checked after every operation.
extern crate std;

use std::{collections::BTreeSet, prelude::v1::*, ptr::NonNull};

use arbitrary::Arbitrary;
use cordyceps::Linked;
use proptest::strategy::{Just, Strategy};

use crate::{AvlSet, AvlTree, DeleteError, InsertError, Links, TreeNode, UpdateError};

#[derive(Debug)]
#[repr(C)]
pub struct TestNode {
    pub links: Links<TestNode>,
    pub key: u32,
}

impl TestNode {
    pub fn new(key: u32) -> Box<TestNode> {
        Box::new(TestNode {
            links: Links::new(),
            key,
        })
    }
}

unsafe impl Linked<Links<TestNode>> for TestNode {
    type Handle = Box<TestNode>;

    fn into_ptr(r: Self::Handle) -> NonNull<Self> {
        NonNull::from(Box::leak(r))
    }

    unsafe fn from_ptr(ptr: NonNull<Self>) -> Self::Handle {
        unsafe { Box::from_raw(ptr.as_ptr()) }
    }

    unsafe fn links(ptr: NonNull<Self>) -> NonNull<Links<TestNode>> {
        // SAFETY: Self is #[repr(C)] and `links` is first field
        ptr.cast()
    }
}

impl TreeNode<Links<TestNode>> for TestNode {
    type Value = u32;

    fn value(&self) -> &Self::Value {
        &self.key
    }
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum ItemValue {
    Index(usize),
    Random(u32),
}

proptest::prop_compose! {
    fn index_strategy()(
        index in 0usize..1000,
    ) -> ItemValue {
        ItemValue::Index(index)
    }
}

proptest::prop_compose! {
    fn random_strategy()(
        random in 0u32..1000,
    ) -> ItemValue {
        ItemValue::Random(random)
    }
}

fn value_strategy() -> impl Strategy<Value = ItemValue> {
    proptest::prop_oneof![index_strategy(), random_strategy()]
}

#[derive(Copy, Clone, Debug, Arbitrary)]
pub enum Op {
    Insert(ItemValue),
    Find(ItemValue),
    Update(ItemValue, ItemValue),
    Delete(ItemValue),
    First,
    PopFirst,
    Last,
    PopLast,
}

impl Op {
    fn finalize(self, sorted: &[u32]) -> FinalOp {
        // `Index` values pick an existing element, so that finds, updates and deletes hit.
        fn get_value(v: &[u32], i: ItemValue) -> u32 {
            match i {
                ItemValue::Index(idx) => match v.len() {
                    0 => idx as u32,
                    len => v[idx % len],
                },
                ItemValue::Random(v) => v,
            }
        }

        match self {
            Op::Insert(item) => FinalOp::Insert(get_value(sorted, item)),
            Op::Find(item) => FinalOp::Find(get_value(sorted, item)),
            Op::Update(old, new) => FinalOp::Update(get_value(sorted, old), get_value(sorted, new)),
            Op::Delete(item) => FinalOp::Delete(get_value(sorted, item)),
            Op::First => FinalOp::First,
            Op::PopFirst => FinalOp::PopFirst,
            Op::Last => FinalOp::Last,
            Op::PopLast => FinalOp::PopLast,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum FinalOp {
    Insert(u32),
    Find(u32),
    Update(u32, u32),
    Delete(u32),
    First,
    PopFirst,
    Last,
    PopLast,
}

pub fn op_strategy() -> impl Strategy<Value = Op> {
    proptest::prop_oneof![
        value_strategy().prop_map(Op::Insert),
        value_strategy().prop_map(Op::Find),
        (value_strategy(), value_strategy()).prop_map(|(old, new)| Op::Update(old, new)),
        value_strategy().prop_map(Op::Delete),
        Just(Op::First),
        Just(Op::PopFirst),
        Just(Op::Last),
        Just(Op::PopLast),
    ]
}

fn btree_update(btree: &mut BTreeSet<u32>, old: u32, new: u32) -> Result<u32, UpdateError> {
    if !btree.contains(&old) {
        return Err(UpdateError::NotFound);
    }

    if old != new && btree.contains(&new) {
        return Err(UpdateError::DuplicateValue);
    }

    btree.remove(&old);
    btree.insert(new);
    Ok(old)
}

pub fn run_btree_equivalence(ops: Vec<Op>) {
    let mut sorted_values = Vec::with_capacity(ops.len());
    let mut btree = BTreeSet::new();
    let mut set: AvlSet<u32> = AvlSet::new();
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    #[inline]
    #[allow(clippy::boxed_local)]
    fn node_key(node: Box<TestNode>) -> u32 {
        node.key
    }

    for (op_id, op) in ops.into_iter().enumerate() {
        let final_op = op.finalize(&sorted_values);

        match final_op {
            FinalOp::Insert(value) => {
                let from_btree = if btree.insert(value) {
                    Ok(())
                } else {
                    Err(InsertError::DuplicateValue)
                };
                let from_set = set.insert(value);
                let from_tree = tree
                    .insert(TestNode::new(value))
                    .map_err(|_| InsertError::DuplicateValue);

                assert_eq!(from_btree, from_set, "FinalOp #{op_id}: {final_op:?}");
                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Find(value) => {
                let from_btree = btree.get(&value);
                let from_set = set.find(&value);
                let from_tree = tree.find(&value).map(|node| &node.get_ref().key);

                assert_eq!(from_btree, from_set, "FinalOp #{op_id}: {final_op:?}");
                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Update(old, new) => {
                let from_btree = btree_update(&mut btree, old, new);
                let from_set = set.update(&old, new);
                let from_tree = tree
                    .update(&old, TestNode::new(new))
                    .map(node_key)
                    .map_err(|(error, _)| error);

                assert_eq!(from_btree, from_set, "FinalOp #{op_id}: {final_op:?}");
                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Delete(value) => {
                let from_btree = btree.remove(&value).then_some(value).ok_or(DeleteError::NotFound);
                let from_set = set.delete(&value);
                let from_tree = tree.remove(&value).map(node_key).ok_or(DeleteError::NotFound);

                assert_eq!(from_btree, from_set, "FinalOp #{op_id}: {final_op:?}");
                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::First => {
                let from_btree = btree.first();
                let from_set = set.first();
                let from_tree = tree.first().map(|node| &node.get_ref().key);

                assert_eq!(from_btree, from_set, "FinalOp #{op_id}: {final_op:?}");
                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopFirst => {
                let from_btree = btree.pop_first();
                let from_set = set.pop_first();
                let from_tree = tree.pop_first().map(node_key);

                assert_eq!(from_btree, from_set, "FinalOp #{op_id}: {final_op:?}");
                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::Last => {
                let from_btree = btree.last();
                let from_set = set.last();
                let from_tree = tree.last().map(|node| &node.get_ref().key);

                assert_eq!(from_btree, from_set, "FinalOp #{op_id}: {final_op:?}");
                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }

            FinalOp::PopLast => {
                let from_btree = btree.pop_last();
                let from_set = set.pop_last();
                let from_tree = tree.pop_last().map(node_key);

                assert_eq!(from_btree, from_set, "FinalOp #{op_id}: {final_op:?}");
                assert_eq!(from_btree, from_tree, "FinalOp #{op_id}: {final_op:?}");
            }
        }

        sorted_values.clear();
        sorted_values.extend(btree.iter().copied());

        set.assert_invariants();
        tree.assert_invariants();
        assert_eq!(btree.len(), set.len());
        assert_eq!(btree.len(), tree.len());
        assert!(btree.iter().eq(set.iter()));
        assert!(btree.iter().eq(tree.iter().map(|node| &node.key)));
    }
}
