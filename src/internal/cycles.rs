//! Static cycle classification over a layer's generators.
//!
//! The runtime chain only sees cycles entered by a single request. Two
//! requests entering the same cycle from opposite ends would each hold one
//! slot lock and wait on the other, so cyclic generators are found once at
//! construction and rejected before any lock is taken.

use ahash::AHashSet;

use crate::key::TypeKey;

/// Marks every node that lies on a cycle of the graph given by `edges`.
///
/// Nodes are `0..count`; `edges(i)` lists the successors of `i`.
pub(crate) fn cyclic_nodes<F>(count: usize, edges: F) -> Vec<bool>
where
    F: Fn(usize) -> Vec<usize>,
{
    let adjacency: Vec<Vec<usize>> = (0..count).map(&edges).collect();
    let mut tarjan = Tarjan {
        adjacency: &adjacency,
        index: vec![None; count],
        low: vec![0; count],
        on_stack: vec![false; count],
        stack: Vec::new(),
        next: 0,
        cyclic: vec![false; count],
    };
    for node in 0..count {
        if tarjan.index[node].is_none() {
            tarjan.visit(node);
        }
    }
    tarjan.cyclic
}

struct Tarjan<'a> {
    adjacency: &'a [Vec<usize>],
    index: Vec<Option<usize>>,
    low: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next: usize,
    cyclic: Vec<bool>,
}

impl Tarjan<'_> {
    fn visit(&mut self, node: usize) {
        self.index[node] = Some(self.next);
        self.low[node] = self.next;
        self.next += 1;
        self.stack.push(node);
        self.on_stack[node] = true;

        let adjacency = self.adjacency;
        for &succ in &adjacency[node] {
            match self.index[succ] {
                None => {
                    self.visit(succ);
                    self.low[node] = self.low[node].min(self.low[succ]);
                }
                Some(succ_index) if self.on_stack[succ] => {
                    self.low[node] = self.low[node].min(succ_index);
                }
                Some(_) => {}
            }
        }

        if Some(self.low[node]) == self.index[node] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack[member] = false;
                component.push(member);
                if member == node {
                    break;
                }
            }
            let self_loop = adjacency[node].contains(&node);
            if component.len() > 1 || self_loop {
                for member in component {
                    self.cyclic[member] = true;
                }
            }
        }
    }
}

/// Finds a dependency path from `start` back to a slot for which `closes`
/// holds, e.g. `[Widget, Doodad, Widget]`.
///
/// `deps(key)` lists the generator-backed local slots `key`'s generator
/// depends on.
pub(crate) fn find_path<F, G>(start: TypeKey, deps: F, closes: G) -> Vec<TypeKey>
where
    F: Fn(TypeKey) -> Vec<TypeKey>,
    G: Fn(TypeKey) -> bool,
{
    let mut visited = AHashSet::new();
    let mut path = vec![start];
    if search(start, &deps, &closes, &mut visited, &mut path) {
        path
    } else {
        vec![start, start]
    }
}

fn search<F, G>(
    key: TypeKey,
    deps: &F,
    closes: &G,
    visited: &mut AHashSet<TypeKey>,
    path: &mut Vec<TypeKey>,
) -> bool
where
    F: Fn(TypeKey) -> Vec<TypeKey>,
    G: Fn(TypeKey) -> bool,
{
    if !visited.insert(key) {
        return false;
    }
    for next in deps(key) {
        path.push(next);
        if closes(next) || search(next, deps, closes, visited, path) {
            return true;
        }
        path.pop();
    }
    false
}
