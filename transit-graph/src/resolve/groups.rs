//! Identity-group bookkeeping for the resolver.

/// Disjoint-set forest over group indices.
///
/// The root of a set is always its smallest member, so the group created
/// first absorbs later ones regardless of the order unions happen in.
#[derive(Debug, Default)]
pub(super) struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    /// Add a new singleton set and return its index.
    pub(super) fn push(&mut self) -> usize {
        let idx = self.parent.len();
        self.parent.push(idx);
        idx
    }

    pub(super) fn len(&self) -> usize {
        self.parent.len()
    }

    pub(super) fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            // Path halving
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets containing `a` and `b`, returning the new root.
    pub(super) fn union(&mut self, a: usize, b: usize) -> usize {
        let (ra, rb) = (self.find(a), self.find(b));
        let (root, child) = if ra <= rb { (ra, rb) } else { (rb, ra) };
        self.parent[child] = root;
        root
    }
}
