extern crate std;

use std::{cell::Cell, format, ops::Range, prelude::v1::*, rc::Rc, string::String};

use proptest::prelude::*;

use crate::model::{self, TestNode};

use super::*;

fn keys<C>(tree: &AvlTree<TestNode, C>) -> Vec<u32> {
    tree.iter().map(|node| node.key).collect()
}

fn values<V: Clone, C>(set: &AvlSet<V, C>) -> Vec<V> {
    set.iter().cloned().collect()
}

// The largest height an AVL tree with `n` nodes can have: the sparsest tree of height `h` has
// `N(h) = N(h - 1) + N(h - 2) + 1` nodes.
fn max_height(n: usize) -> usize {
    let (mut sparsest, mut prev, mut h) = (1, 0, 1);

    while sparsest + prev + 1 <= n {
        (sparsest, prev) = (sparsest + prev + 1, sparsest);
        h += 1;
    }

    h
}

fn child_key(tree: &AvlTree<TestNode>, node: NonNull<TestNode>, dir: Dir) -> Option<u32> {
    unsafe { tree.links(node).child(dir).map(|c| c.as_ref().key) }
}

fn insert_find_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key)).expect("duplicate key");
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.find_raw(key).expect("item not found");
        assert_eq!(unsafe { node.as_ref().value() }, key);
    }

    assert!(tree.height() <= max_height(keys.len()));
}

#[test]
fn zero_elems_find() {
    insert_find_all(&[]);
}

#[test]
fn single_elem_find() {
    insert_find_all(&[0]);
}

#[test]
fn two_elems_find() {
    insert_find_all(&[0, 1]);
    insert_find_all(&[1, 0]);
}

#[test]
fn three_elems_find() {
    insert_find_all(&[0, 1, 2]);
    insert_find_all(&[0, 2, 1]);
    insert_find_all(&[1, 0, 2]);
    insert_find_all(&[1, 2, 0]);
    insert_find_all(&[2, 0, 1]);
    insert_find_all(&[2, 1, 0]);
}

#[test]
fn four_elems_find() {
    insert_find_all(&[0, 1, 2, 3]);
    insert_find_all(&[0, 1, 3, 2]);
    insert_find_all(&[0, 2, 1, 3]);
    insert_find_all(&[0, 2, 3, 1]);
    insert_find_all(&[0, 3, 1, 2]);
    insert_find_all(&[0, 3, 2, 1]);

    insert_find_all(&[1, 0, 2, 3]);
    insert_find_all(&[1, 0, 3, 2]);
    insert_find_all(&[1, 2, 0, 3]);
    insert_find_all(&[1, 2, 3, 0]);
    insert_find_all(&[1, 3, 0, 2]);
    insert_find_all(&[1, 3, 2, 0]);

    insert_find_all(&[2, 0, 1, 3]);
    insert_find_all(&[2, 0, 3, 1]);
    insert_find_all(&[2, 1, 0, 3]);
    insert_find_all(&[2, 1, 3, 0]);
    insert_find_all(&[2, 3, 0, 1]);
    insert_find_all(&[2, 3, 1, 0]);

    insert_find_all(&[3, 0, 1, 2]);
    insert_find_all(&[3, 0, 2, 1]);
    insert_find_all(&[3, 1, 0, 2]);
    insert_find_all(&[3, 1, 2, 0]);
    insert_find_all(&[3, 2, 0, 1]);
    insert_find_all(&[3, 2, 1, 0]);
}

fn insert_remove_all(keys: &[u32]) {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for &key in keys {
        tree.insert(TestNode::new(key)).expect("duplicate key");
        tree.assert_invariants();
    }

    for key in keys {
        let node = tree.find_raw(key).expect("item not found");
        let removed = unsafe { tree.remove_at(node) };
        assert_eq!(removed.key, *key);
        assert!(!removed.links.is_linked());
        tree.assert_invariants();
    }

    assert!(tree.is_empty());

    for &key in keys {
        tree.insert(TestNode::new(key)).expect("duplicate key");
        tree.assert_invariants();
    }

    for key in keys.iter().rev() {
        let node = tree.find_raw(key).expect("item not found");
        unsafe { tree.remove_at(node) };
        tree.assert_invariants();
    }

    assert!(tree.is_empty());
}

#[test]
fn remove_one() {
    insert_remove_all(&[0]);
}

#[test]
fn remove_two() {
    insert_remove_all(&[0, 1]);
    insert_remove_all(&[1, 0]);
}

#[test]
fn remove_three() {
    insert_remove_all(&[0, 1, 2]);
    insert_remove_all(&[0, 2, 1]);
    insert_remove_all(&[1, 0, 2]);
    insert_remove_all(&[1, 2, 0]);
    insert_remove_all(&[2, 0, 1]);
    insert_remove_all(&[2, 1, 0]);
}

// Calls `f` with every permutation of `keys`.
fn for_each_permutation(keys: &mut Vec<u32>, k: usize, f: &mut impl FnMut(&[u32])) {
    if k <= 1 {
        f(keys);
        return;
    }

    // Heap's algorithm.
    for i in 0..k - 1 {
        for_each_permutation(keys, k - 1, f);
        let swap = if k % 2 == 0 { i } else { 0 };
        keys.swap(swap, k - 1);
    }

    for_each_permutation(keys, k - 1, f);
}

#[test]
fn remove_all_permutations_of_six() {
    let mut keys: Vec<u32> = (0..6).collect();
    let mut count = 0;

    for_each_permutation(&mut keys, 6, &mut |perm: &[u32]| {
        insert_remove_all(perm);
        count += 1;
    });

    assert_eq!(count, 720);
}

#[test]
fn ascending_insert_rotates_left() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    for key in [1, 2, 3] {
        tree.insert(TestNode::new(key)).unwrap();
    }

    let root = tree.root.unwrap();
    assert_eq!(unsafe { root.as_ref().key }, 2);
    assert_eq!(child_key(&tree, root, Dir::Left), Some(1));
    assert_eq!(child_key(&tree, root, Dir::Right), Some(3));
    assert_eq!(tree.height(), 2);
    tree.assert_invariants();
}

#[test]
fn double_rotations() {
    // Left-right.
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [3, 1, 2] {
        tree.insert(TestNode::new(key)).unwrap();
    }

    let root = tree.root.unwrap();
    assert_eq!(unsafe { root.as_ref().key }, 2);
    assert_eq!(child_key(&tree, root, Dir::Left), Some(1));
    assert_eq!(child_key(&tree, root, Dir::Right), Some(3));

    // Right-left.
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [1, 3, 2] {
        tree.insert(TestNode::new(key)).unwrap();
    }

    let root = tree.root.unwrap();
    assert_eq!(unsafe { root.as_ref().key }, 2);
    assert_eq!(child_key(&tree, root, Dir::Left), Some(1));
    assert_eq!(child_key(&tree, root, Dir::Right), Some(3));
}

#[test]
fn remove_rebalances_every_ancestor() {
    // Build the sparsest tree of height 5 (12 nodes), in which removing the shallowest leaf forces
    // a rotation at more than one level.
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [8, 5, 11, 3, 7, 10, 12, 2, 4, 6, 9, 1] {
        tree.insert(TestNode::new(key)).unwrap();
        tree.assert_invariants();
    }
    assert_eq!(tree.height(), 5);

    let removed = tree.remove(&12).unwrap();
    assert_eq!(removed.key, 12);
    tree.assert_invariants();
    assert_eq!(tree.height(), 4);
    assert_eq!(keys(&tree), [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
}

#[test]
fn intrusive_duplicate_insert_returns_item() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    tree.insert(TestNode::new(7)).unwrap();

    let rejected = tree.insert(TestNode::new(7)).unwrap_err();
    assert_eq!(rejected.key, 7);
    assert!(!rejected.links.is_linked());
    assert_eq!(tree.len(), 1);
    tree.assert_invariants();
}

#[test]
fn intrusive_update_in_place_keeps_shape() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [10, 20, 30] {
        tree.insert(TestNode::new(key)).unwrap();
    }

    let old = tree.update(&20, TestNode::new(25)).unwrap();
    assert_eq!(old.key, 20);
    assert!(!old.links.is_linked());

    let root = tree.root.unwrap();
    assert_eq!(unsafe { root.as_ref().key }, 25);
    assert_eq!(child_key(&tree, root, Dir::Left), Some(10));
    assert_eq!(child_key(&tree, root, Dir::Right), Some(30));
    tree.assert_invariants();
}

#[test]
fn intrusive_update_moves_node() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [10, 20, 30] {
        tree.insert(TestNode::new(key)).unwrap();
    }

    let old = tree.update(&20, TestNode::new(35)).unwrap();
    assert_eq!(old.key, 20);
    assert_eq!(keys(&tree), [10, 30, 35]);
    tree.assert_invariants();

    let (error, item) = tree.update(&10, TestNode::new(30)).unwrap_err();
    assert_eq!(error, UpdateError::DuplicateValue);
    assert_eq!(item.key, 30);

    let (error, item) = tree.update(&11, TestNode::new(12)).unwrap_err();
    assert_eq!(error, UpdateError::NotFound);
    assert_eq!(item.key, 12);

    assert_eq!(keys(&tree), [10, 30, 35]);
    tree.assert_invariants();
}

#[test]
fn intrusive_update_to_equal_value_is_not_a_duplicate() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();
    for key in [10, 20, 30] {
        tree.insert(TestNode::new(key)).unwrap();
    }

    // The only node equal to the new value is the one being replaced.
    let old = tree.update(&20, TestNode::new(20)).unwrap();
    assert_eq!(old.key, 20);
    assert!(!old.links.is_linked());
    assert_eq!(keys(&tree), [10, 20, 30]);
    tree.assert_invariants();
}

#[test]
#[cfg_attr(miri, ignore)]
#[should_panic(expected = "comparator is inconsistent")]
fn inconsistent_comparator_panics_on_relink() {
    // 100 compares equal to everything, but every other pair is ordered naturally.
    let mut set = AvlSet::with_comparator(|a: &u32, b: &u32| {
        if *a == 100 || *b == 100 {
            core::cmp::Ordering::Equal
        } else {
            a.cmp(b)
        }
    });

    for value in [1, 2, 3] {
        set.insert(value).unwrap();
    }

    // 100 matches the root (2) and nothing else on the way there, does not fit between 1 and 3,
    // and then matches the new root during reinsertion.
    let _ = set.update(&2, 100);
}

#[test]
fn round_trip() {
    let mut set = AvlSet::new();
    for value in [5, 3, 8, 1, 4, 7, 9] {
        set.insert(value).unwrap();
        set.assert_invariants();
    }

    for value in [3, 8] {
        assert_eq!(set.delete(&value), Ok(value));
        set.assert_invariants();
    }

    assert_eq!(values(&set), [1, 4, 5, 7, 9]);
    assert_eq!(set.len(), 5);
}

#[test]
fn ascending_run_stays_balanced() {
    let mut set = AvlSet::new();
    for value in 1..=1000u32 {
        set.insert(value).unwrap();
    }

    set.assert_invariants();
    assert_eq!(set.len(), 1000);
    // 2^9 < 1000 < 2^10.
    assert!(set.height() >= 10);
    assert!(set.height() <= max_height(1000));
    assert_eq!(max_height(1000), 14);
}

#[test]
fn descending_and_zigzag_runs_stay_balanced() {
    let mut descending = AvlSet::new();
    for value in (1..=1000u32).rev() {
        descending.insert(value).unwrap();
    }
    descending.assert_invariants();
    assert!(descending.height() <= max_height(1000));

    let mut zigzag = AvlSet::new();
    for i in 0..500u32 {
        zigzag.insert(i).unwrap();
        zigzag.insert(999 - i).unwrap();
    }
    zigzag.assert_invariants();
    assert!(zigzag.height() <= max_height(1000));
    assert!(zigzag.iter().copied().eq(0..1000));
}

#[test]
fn search_correctness() {
    let mut set = AvlSet::new();
    for value in (0..200u32).map(|v| v * 2) {
        set.insert(value).unwrap();
    }

    for value in (0..100u32).map(|v| v * 4) {
        set.delete(&value).unwrap();
    }
    set.assert_invariants();

    for value in 0..400u32 {
        let present = value % 4 == 2;
        assert_eq!(set.contains(&value), present, "{value}");
        assert_eq!(set.find(&value).copied(), present.then_some(value), "{value}");
    }
}

#[test]
fn update_repositions_value() {
    let mut set = AvlSet::new();
    for value in [1, 2, 3, 4, 5] {
        set.insert(value).unwrap();
    }

    assert_eq!(set.update(&1, 10), Ok(1));
    assert_eq!(values(&set), [2, 3, 4, 5, 10]);
    assert_eq!(set.len(), 5);
    set.assert_invariants();

    // Same position, and the same value.
    assert_eq!(set.update(&4, 4), Ok(4));
    assert_eq!(values(&set), [2, 3, 4, 5, 10]);
    set.assert_invariants();
}

#[test]
fn failed_operations_are_no_ops() {
    let mut set = AvlSet::new();
    for value in [5, 3, 8, 1, 4, 7, 9] {
        set.insert(value).unwrap();
    }

    let before = values(&set);
    let height = set.height();

    assert_eq!(set.insert(4), Err(InsertError::DuplicateValue));
    assert_eq!(set.update(&6, 2), Err(UpdateError::NotFound));
    assert_eq!(set.update(&3, 8), Err(UpdateError::DuplicateValue));
    assert_eq!(set.delete(&6), Err(DeleteError::NotFound));

    assert_eq!(values(&set), before);
    assert_eq!(set.len(), before.len());
    assert_eq!(set.height(), height);
    set.assert_invariants();
}

#[test]
fn empty_set() {
    let mut set: AvlSet<u32> = AvlSet::default();

    assert!(set.is_empty());
    assert_eq!(set.height(), 0);
    assert_eq!(set.first(), None);
    assert_eq!(set.last(), None);
    assert_eq!(set.pop_first(), None);
    assert_eq!(set.pop_last(), None);
    assert_eq!(set.find(&1), None);
    assert_eq!(set.update(&1, 2), Err(UpdateError::NotFound));
    assert_eq!(set.delete(&1), Err(DeleteError::NotFound));
    set.assert_invariants();

    set.insert(1).unwrap();
    assert_eq!(set.height(), 1);
    assert_eq!(set.delete(&1), Ok(1));
    assert!(set.is_empty());
    set.assert_invariants();
}

#[test]
fn custom_comparator() {
    let mut set = AvlSet::with_comparator(|a: &u32, b: &u32| b.cmp(a));
    for value in [5, 3, 8, 1, 4] {
        set.insert(value).unwrap();
    }
    set.assert_invariants();

    assert_eq!(values(&set), [8, 5, 4, 3, 1]);
    assert_eq!(set.first(), Some(&8));
    assert_eq!(set.last(), Some(&1));

    assert_eq!(set.update(&8, 2), Ok(8));
    assert_eq!(values(&set), [5, 4, 3, 2, 1]);
    set.assert_invariants();
}

#[test]
fn comparator_defines_equality() {
    fn by_len(a: &String, b: &String) -> core::cmp::Ordering {
        a.len().cmp(&b.len())
    }

    let mut set = AvlSet::with_comparator(by_len);
    set.insert(String::from("ccc")).unwrap();
    set.insert(String::from("a")).unwrap();

    assert_eq!(
        set.insert(String::from("b")),
        Err(InsertError::DuplicateValue)
    );
    assert_eq!(set.find(&String::from("z")).map(String::as_str), Some("a"));

    // Equal under the comparator, so the value is replaced in place.
    assert_eq!(set.update(&String::from("x"), String::from("y")).as_deref(), Ok("a"));
    assert_eq!(values(&set), ["y", "ccc"]);
    set.assert_invariants();
}

#[test]
fn iter_both_ends() {
    let mut set = AvlSet::new();
    for value in [4, 2, 6, 1, 3, 5, 7] {
        set.insert(value).unwrap();
    }

    assert!(set.iter().rev().copied().eq((1..=7).rev()));

    let mut iter = set.iter();
    assert_eq!(iter.len(), 7);
    assert_eq!(iter.next(), Some(&1));
    assert_eq!(iter.next_back(), Some(&7));
    assert_eq!(iter.next(), Some(&2));
    assert_eq!(iter.next_back(), Some(&6));
    assert_eq!(iter.len(), 3);
    assert_eq!(iter.by_ref().collect::<Vec<_>>(), [&3, &4, &5]);
    assert_eq!(iter.next(), None);
    assert_eq!(iter.next_back(), None);
}

#[test]
fn pop_first_and_last() {
    let mut set = AvlSet::new();
    for value in 0..64u32 {
        set.insert(value).unwrap();
    }

    for i in 0..32 {
        assert_eq!(set.pop_first(), Some(i));
        assert_eq!(set.pop_last(), Some(63 - i));
        set.assert_invariants();
    }

    assert!(set.is_empty());
}

#[derive(Debug)]
struct Tracked {
    key: u32,
    drops: Rc<Cell<usize>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

fn by_key(a: &Tracked, b: &Tracked) -> core::cmp::Ordering {
    a.key.cmp(&b.key)
}

#[test]
fn clear_and_drop_release_values() {
    let drops = Rc::new(Cell::new(0));
    let tracked = |key| Tracked {
        key,
        drops: drops.clone(),
    };

    let mut set = AvlSet::with_comparator(by_key);
    for key in 0..10 {
        set.insert(tracked(key)).unwrap();
    }

    let removed = set.delete(&tracked(3)).unwrap();
    // The probe value was dropped; the removed value is owned by the caller.
    assert_eq!(drops.get(), 1);
    assert_eq!(removed.key, 3);

    set.clear();
    assert!(set.is_empty());
    assert_eq!(drops.get(), 10);

    for key in 0..5 {
        set.insert(tracked(key)).unwrap();
    }
    drop(set);
    assert_eq!(drops.get(), 15);

    drop(removed);
    assert_eq!(drops.get(), 16);
}

#[test]
fn dotgraph() {
    let mut tree: AvlTree<TestNode> = AvlTree::new();

    let mut empty = String::new();
    tree.dotgraph("t", |key| *key, &mut empty).unwrap();
    assert_eq!(empty, "digraph \"graph-t\" {}");

    for key in [1, 2, 3] {
        tree.insert(TestNode::new(key)).unwrap();
    }

    let mut out = String::new();
    tree.dotgraph("t", |key| *key, &mut out).unwrap();

    assert!(out.starts_with("digraph \"graph-t\" {"));
    assert!(out.contains("\"grapht-2\" [label=\"2:2\"];"), "{out}");
    assert!(out.contains("\"grapht-1\" [label=\"1:1\"];"), "{out}");
    assert!(out.contains("\"grapht-2\" -> \"grapht-3\";"), "{out}");
    assert!(out.ends_with(" }\n}"));
}

#[test]
fn debug_formatting() {
    let mut set = AvlSet::new();
    for value in [2, 1, 3] {
        set.insert(value).unwrap();
    }

    assert_eq!(format!("{set:?}"), "{1, 2, 3}");
}

#[test]
fn send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<AvlSet<u32>>();
    assert_send_sync::<AvlTree<TestNode>>();
}

#[cfg(miri)]
const FUZZ_RANGE: Range<usize> = 0..10;

#[cfg(not(miri))]
const FUZZ_RANGE: Range<usize> = 0..1000;

proptest::proptest! {
    #![proptest_config(ProptestConfig {
        max_shrink_iters: 65536,
        .. ProptestConfig::default()
    })]

    #[test]
    fn btree_equivalence(ops in proptest::collection::vec(model::op_strategy(), FUZZ_RANGE)) {
        model::run_btree_equivalence(ops);
    }
}
