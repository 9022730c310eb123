use cordyceps_avl::{AvlSet, DeleteError, InsertError, UpdateError};

fn print(set: &AvlSet<u32>) {
    println!(
        "{:?} (len {}, height {})",
        set.iter().collect::<Vec<_>>(),
        set.len(),
        set.height()
    );
}

fn main() {
    let mut set = AvlSet::new();

    for value in [5, 3, 8, 1, 4, 7, 9] {
        set.insert(value).unwrap();
        set.assert_invariants();
        print(&set);
    }

    assert_eq!(set.insert(4), Err(InsertError::DuplicateValue));

    for value in [3, 8] {
        set.delete(&value).unwrap();
        set.assert_invariants();
        print(&set);
    }

    assert_eq!(set.delete(&3), Err(DeleteError::NotFound));

    let old = set.update(&1, 10).unwrap();
    assert_eq!(old, 1);
    set.assert_invariants();
    print(&set);

    assert_eq!(set.update(&4, 10), Err(UpdateError::DuplicateValue));

    let min = set.pop_first().unwrap();
    assert_eq!(min, 4);
    set.assert_invariants();
    print(&set);

    drop(set);
}
