extern crate std;

use core::ptr::NonNull;
use std::{collections::VecDeque, fmt, prelude::v1::*};

use crate::{AvlTree, Dir, Links, TreeNode};

impl<T, C> AvlTree<T, C>
where
    T: TreeNode<Links<T>> + ?Sized,
{
    /// Writes a [Graphviz] `digraph` of the tree to `w`.
    ///
    /// Each node is labelled `value:height`, where `value` is rendered by `label`. Missing children
    /// are drawn as points so that left and right children stay distinguishable. Labels double as
    /// node identifiers, so they must be unique within the tree.
    ///
    /// [Graphviz]: https://graphviz.org/
    pub fn dotgraph<W, F, D>(&self, name: &str, mut label: F, mut w: W) -> fmt::Result
    where
        W: fmt::Write,
        F: FnMut(&T::Value) -> D,
        D: fmt::Display,
    {
        let root = match self.root {
            Some(r) => r,
            None => return write!(w, "digraph \"graph-{name}\" {{}}"),
        };

        enum Item<T: ?Sized> {
            Node(NonNull<T>),
            Missing(u32),
        }

        let mut queue = VecDeque::new();
        queue.push_back(Item::Node(root));

        write!(
            w,
            "digraph \"graph-{name}\" {{\n subgraph \"subgraph-{name}\" {{"
        )?;

        let mut missing = 0;
        let mut links = String::new();

        while !queue.is_empty() {
            use fmt::Write;

            write!(w, "{{rank=same; ")?;

            for _ in 0..queue.len() {
                let node = match queue.pop_front() {
                    Some(Item::Node(node)) => node,
                    Some(Item::Missing(id)) => {
                        write!(w, "\"graph{name}-missing{id}\" [shape=point]; ")?;
                        continue;
                    }
                    None => break,
                };

                let key = unsafe { label(node.as_ref().value()) };
                let height = unsafe { self.links(node).height() };
                write!(w, "\"graph{name}-{key}\" [label=\"{key}:{height}\"]; ")?;

                for dir in [Dir::Left, Dir::Right] {
                    match unsafe { self.links(node).child(dir) } {
                        Some(child) => {
                            let child_key = unsafe { label(child.as_ref().value()) };

                            queue.push_back(Item::Node(child));
                            writeln!(
                                links,
                                "\"graph{name}-{key}\" -> \"graph{name}-{child_key}\";"
                            )?;
                        }

                        None => {
                            queue.push_back(Item::Missing(missing));
                            writeln!(
                                links,
                                "\"graph{name}-{key}\" -> \"graph{name}-missing{missing}\";"
                            )?;
                            missing += 1;
                        }
                    }
                }
            }

            writeln!(w, "}}")?;

            // Stop once a level consists only of missing children.
            if queue.iter().all(|item| matches!(item, Item::Missing(_))) {
                write!(w, "{{rank=same; ")?;
                for item in queue.drain(..) {
                    if let Item::Missing(id) = item {
                        write!(w, "\"graph{name}-missing{id}\" [shape=point]; ")?;
                    }
                }
                writeln!(w, "}}")?;
            }
        }

        w.write_str(&links)?;

        w.write_str(" }\n}")
    }
}
