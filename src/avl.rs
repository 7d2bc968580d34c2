use std::{
    cmp::{self, Ordering},
    mem,
};

use rand::Rng;

use crate::depth::Depth;
use crate::error::Error;
use crate::record::Key;

/// Index of a node slot within the [`Avl`] arena.
type NodeId = usize;

/// Height of an absent sub-tree, a leaf node has height 0.
const EMPTY_HEIGHT: i32 = -1;

/// Avl manage a single instance of in-memory index using
/// [AVL][avl] tree.
///
/// Nodes live in an arena of slots and link to their children by slot
/// index, every node is owned by exactly one parent, or by the index
/// in case of root. Slots vacated by delete are recycled via a free-list.
///
/// [avl]: https://en.wikipedia.org/wiki/AVL_tree
#[derive(Clone)]
pub struct Avl<V>
where
    V: Clone,
{
    name: String,
    root: Option<NodeId>,
    nodes: Vec<Option<Node<V>>>,
    free: Vec<NodeId>, // vacated slots in `nodes`.
    n_count: usize,    // number of entries in the tree.
}

/// Different ways to construct a new Avl instance.
impl<V> Avl<V>
where
    V: Clone,
{
    /// Create an empty instance of Avl, identified by `name`.
    /// Applications can choose unique names.
    pub fn new<S>(name: S) -> Avl<V>
    where
        S: AsRef<str>,
    {
        Avl {
            name: name.as_ref().to_string(),
            root: Default::default(),
            nodes: Default::default(),
            free: Default::default(),
            n_count: Default::default(),
        }
    }

    /// Create an empty instance of Avl with room for `capacity` entries
    /// before the arena has to grow.
    pub fn with_capacity<S>(name: S, capacity: usize) -> Result<Avl<V>, Error>
    where
        S: AsRef<str>,
    {
        let mut avl = Avl::new(name);
        avl.nodes.try_reserve_exact(capacity)?;
        avl.free.try_reserve_exact(capacity)?;
        Ok(avl)
    }

    /// Create a new instance of Avl tree and load it with entries
    /// from `iter`. Iterator should return (key, value) tuples, on
    /// duplicate keys the first value wins, refer to [`Avl::insert`].
    pub fn load_from<S, I>(name: S, iter: I) -> Result<Avl<V>, Error>
    where
        S: AsRef<str>,
        I: Iterator<Item = (Key, V)>,
    {
        let mut avl = Avl::new(name);
        for (key, value) in iter {
            avl.insert(key, value)?;
        }
        tracing::trace!(name = %avl.name, entries = avl.n_count, "loaded");
        Ok(avl)
    }
}

/// Maintenance API.
impl<V> Avl<V>
where
    V: Clone,
{
    /// Identify this instance. Applications can choose unique names while
    /// creating Avl instances.
    #[inline]
    pub fn id(&self) -> String {
        self.name.clone()
    }

    /// Return number of entries in this instance.
    #[inline]
    pub fn len(&self) -> usize {
        self.n_count
    }

    /// Check whether this index is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Return quickly with basic statisics, only entries(), node_size()
    /// and height() are valid with this statisics.
    pub fn stats(&self) -> Stats {
        let mut stats = Stats::new(self.n_count, mem::size_of::<Option<Node<V>>>());
        stats.set_height(self.height(self.root));
        stats
    }
}

type Removed<V> = (Option<NodeId>, Option<V>);

/// Write operations on Avl instance.
impl<V> Avl<V>
where
    V: Clone,
{
    /// Insert a new {key, value} entry into the index.
    ///
    /// If key is already present the index is left untouched, the
    /// existing value is retained and the new value is dropped. This is
    /// not treated as an error, use [`Avl::find`] to detect it.
    ///
    /// Only failure is when the arena cannot grow for the new node, in
    /// which case the index is left as it was before the call.
    pub fn insert(&mut self, key: Key, value: V) -> Result<(), Error> {
        let (root, inserted) = self.do_insert(self.root, key, value)?;
        self.root = Some(root);
        if inserted {
            self.n_count += 1;
        }
        Ok(())
    }

    /// Delete key from this instance and return its value. If key is
    /// not present, then delete is effectively a no-op.
    pub fn remove(&mut self, key: Key) -> Option<V> {
        let (root, old_value) = self.do_remove(self.root, key);
        self.root = root;
        if old_value.is_some() {
            self.n_count -= 1;
        }
        old_value
    }

    /// Release all entries, in post-order, and return the arena memory
    /// back to the allocator. Index can be reused after clear.
    pub fn clear(&mut self) {
        let mut released = 0;
        let mut stack: Vec<(NodeId, bool)> = self.root.iter().map(|id| (*id, false)).collect();
        while let Some((id, visited)) = stack.pop() {
            if visited {
                self.nodes[id] = None;
                released += 1;
                continue;
            }
            let node = self.node(id);
            stack.push((id, true));
            if let Some(right) = node.right {
                stack.push((right, false));
            }
            if let Some(left) = node.left {
                stack.push((left, false));
            }
        }
        debug_assert_eq!(released, self.n_count);
        tracing::trace!(name = %self.name, released, "cleared");

        self.root = None;
        self.nodes = Vec::new();
        self.free = Vec::new();
        self.n_count = 0;
    }

    /// Validate AVL tree with following rules:
    ///
    /// * Make sure keys are in sorted order, every key in left sub-tree
    ///   is less than node's key and every key in right sub-tree is
    ///   greater than node's key.
    /// * Height of left and right sub-tree, for every node, shall not
    ///   differ by more than one. Heights are computed afresh, and the
    ///   cached height in every node shall match the computed height.
    /// * Number of nodes reachable from root shall match len().
    ///
    /// Additionally return full statistics on the tree. Refer to [`Stats`]
    /// for more information.
    pub fn validate(&self) -> Result<Stats, Error> {
        let mut stats = Stats::new(self.n_count, mem::size_of::<Option<Node<V>>>());
        stats.set_depths(Depth::new());
        let mut count = 0;
        let height = self.validate_tree(self.root, (None, None), 0, &mut count, &mut stats)?;
        if count != self.n_count {
            let (expected, actual) = (self.n_count, count);
            return Err(Error::CountMismatch { expected, actual });
        }
        stats.set_height(height);
        Ok(stats)
    }
}

/// Read operations on Avl instance.
impl<V> Avl<V>
where
    V: Clone,
{
    /// Get the value for key.
    pub fn find(&self, key: Key) -> Option<V> {
        let mut node = self.root;
        while let Some(id) = node {
            let nref = self.node(id);
            node = match nref.key.cmp(&key) {
                Ordering::Less => nref.right,
                Ordering::Greater => nref.left,
                Ordering::Equal => return Some(nref.value.clone()),
            };
        }
        None
    }

    /// Return the entry with smallest key.
    pub fn find_min(&self) -> Option<(Key, V)> {
        let nref = self.node(self.min_node(self.root)?);
        Some((nref.key, nref.value.clone()))
    }

    /// Return the entry with largest key.
    pub fn find_max(&self) -> Option<(Key, V)> {
        let nref = self.node(self.max_node(self.root)?);
        Some((nref.key, nref.value.clone()))
    }

    /// Return a random entry from this index.
    pub fn random<R: Rng>(&self, rng: &mut R) -> Option<(Key, V)> {
        let mut nref = self.node(self.root?);

        let mut at_depth = rng.gen::<u8>() % 40;
        loop {
            let next = match rng.gen::<u8>() % 2 {
                0 => nref.left,
                1 => nref.right,
                _ => unreachable!(),
            };
            match next {
                Some(id) if at_depth > 0 => {
                    at_depth -= 1;
                    nref = self.node(id);
                }
                _ => break Some((nref.key, nref.value.clone())),
            }
        }
    }
}

impl<V> Avl<V>
where
    V: Clone,
{
    fn do_insert(
        &mut self,
        node: Option<NodeId>,
        key: Key,
        value: V,
    ) -> Result<(NodeId, bool), Error> {
        let id = match node {
            Some(id) => id,
            None => return Ok((self.alloc(key, value)?, true)),
        };

        let (id, inserted) = match self.node(id).key.cmp(&key) {
            Ordering::Greater => {
                let left = self.node(id).left;
                let (left, inserted) = self.do_insert(left, key, value)?;
                self.node_mut(id).left = Some(left);
                let id = if self.balance(id) == 2 {
                    if key < self.node(left).key {
                        self.rotate_right(id)
                    } else {
                        self.rotate_left_right(id)
                    }
                } else {
                    id
                };
                (id, inserted)
            }
            Ordering::Less => {
                let right = self.node(id).right;
                let (right, inserted) = self.do_insert(right, key, value)?;
                self.node_mut(id).right = Some(right);
                let id = if self.balance(id) == -2 {
                    if key > self.node(right).key {
                        self.rotate_left(id)
                    } else {
                        self.rotate_right_left(id)
                    }
                } else {
                    id
                };
                (id, inserted)
            }
            // key already indexed, retain the old value.
            Ordering::Equal => (id, false),
        };
        self.update_height(id);
        Ok((id, inserted))
    }

    fn do_remove(&mut self, node: Option<NodeId>, key: Key) -> Removed<V> {
        let id = match node {
            None => return (None, None),
            Some(id) => id,
        };

        let nref = self.node(id);
        let (left, right) = (nref.left, nref.right);
        let old_value = match nref.key.cmp(&key) {
            Ordering::Greater => {
                let (left, old_value) = self.do_remove(left, key);
                self.node_mut(id).left = left;
                old_value
            }
            Ordering::Less => {
                let (right, old_value) = self.do_remove(right, key);
                self.node_mut(id).right = right;
                old_value
            }
            Ordering::Equal if left.is_some() && right.is_some() => {
                // pull the in-order successor's entry up into this node,
                // and physically remove the successor from right sub-tree.
                let succ_key = match self.min_node(right) {
                    Some(succ) => self.node(succ).key,
                    None => unreachable!(),
                };
                let (right, succ_value) = self.do_remove(right, succ_key);
                let succ_value = match succ_value {
                    Some(value) => value,
                    None => panic!("do_remove(): lost successor, call the programmer"),
                };
                let node = self.node_mut(id);
                node.right = right;
                node.key = succ_key;
                Some(mem::replace(&mut node.value, succ_value))
            }
            Ordering::Equal => {
                let child = left.or(right);
                return (child, Some(self.release(id)));
            }
        };
        (Some(self.rebalance(id)), old_value)
    }

    // After delete, sub-tree under `id` can be short by one on either
    // side, restore height and balance and return the new sub-tree root.
    // Unlike insert, single rotation is preferred when the taller child
    // is itself balanced.
    fn rebalance(&mut self, id: NodeId) -> NodeId {
        self.update_height(id);
        let (left, right) = (self.node(id).left, self.node(id).right);
        match self.balance(id) {
            2 => {
                let (ll, lr) = self.child_heights(left);
                if ll >= lr {
                    self.rotate_right(id)
                } else {
                    self.rotate_left_right(id)
                }
            }
            -2 => {
                let (rl, rr) = self.child_heights(right);
                if rr >= rl {
                    self.rotate_left(id)
                } else {
                    self.rotate_right_left(id)
                }
            }
            _ => id,
        }
    }

    fn validate_tree(
        &self,
        node: Option<NodeId>,
        (low, high): (Option<Key>, Option<Key>),
        depth: usize,
        count: &mut usize,
        stats: &mut Stats,
    ) -> Result<i32, Error> {
        let id = match node {
            None => {
                if let Some(depths) = stats.depths.as_mut() {
                    depths.sample(depth);
                }
                return Ok(EMPTY_HEIGHT);
            }
            Some(id) => id,
        };
        *count += 1;

        // every key in a sub-tree shall fall within (low, high) set by
        // its ancestors.
        let node = self.node(id);
        match (low, high) {
            (Some(low), _) if node.key <= low => return Err(Error::SortError(node.key, low)),
            (_, Some(high)) if node.key >= high => return Err(Error::SortError(node.key, high)),
            _ => (),
        }

        let bounds = (low, Some(node.key));
        let left = self.validate_tree(node.left, bounds, depth + 1, count, stats)?;
        let bounds = (Some(node.key), high);
        let right = self.validate_tree(node.right, bounds, depth + 1, count, stats)?;
        if (left - right).abs() > 1 {
            return Err(Error::Unbalanced {
                key: node.key,
                left,
                right,
            });
        }
        let actual = cmp::max(left, right) + 1;
        if node.height != actual {
            return Err(Error::HeightMismatch {
                key: node.key,
                cached: node.height,
                actual,
            });
        }
        Ok(actual)
    }

    fn min_node(&self, node: Option<NodeId>) -> Option<NodeId> {
        let mut id = node?;
        while let Some(left) = self.node(id).left {
            id = left;
        }
        Some(id)
    }

    fn max_node(&self, node: Option<NodeId>) -> Option<NodeId> {
        let mut id = node?;
        while let Some(right) = self.node(id).right {
            id = right;
        }
        Some(id)
    }

    //--------- rotation routines ----------------

    //              (i)                       (i)
    //               |                         |
    //              node                       x
    //              /  \                      / \
    //             /    \                    /   \
    //            /      \                  /     \
    //          left      x              node      xr
    //                   / \             /  \
    //                 xl   xr        left   xl
    //
    fn rotate_left(&mut self, id: NodeId) -> NodeId {
        let x = match self.node(id).right {
            Some(x) => x,
            None => panic!("rotate_left(): missing right child, call the programmer"),
        };
        let xl = self.node(x).left;
        self.node_mut(id).right = xl;
        self.node_mut(x).left = Some(id);
        self.update_height(id);
        self.update_height(x);
        x
    }

    //              (i)                       (i)
    //               |                         |
    //              node                       x
    //              /  \                      / \
    //             /    \                    /   \
    //            /      \                  /     \
    //           x      right             xl      node
    //          / \                               / \
    //        xl   xr                           xr  right
    //
    fn rotate_right(&mut self, id: NodeId) -> NodeId {
        let x = match self.node(id).left {
            Some(x) => x,
            None => panic!("rotate_right(): missing left child, call the programmer"),
        };
        let xr = self.node(x).right;
        self.node_mut(id).left = xr;
        self.node_mut(x).right = Some(id);
        self.update_height(id);
        self.update_height(x);
        x
    }

    // left child is right-heavy, rotate it left and then rotate node right.
    fn rotate_left_right(&mut self, id: NodeId) -> NodeId {
        let left = self.node(id).left;
        if let Some(left) = left {
            let left = self.rotate_left(left);
            self.node_mut(id).left = Some(left);
        }
        self.rotate_right(id)
    }

    // right child is left-heavy, rotate it right and then rotate node left.
    fn rotate_right_left(&mut self, id: NodeId) -> NodeId {
        let right = self.node(id).right;
        if let Some(right) = right {
            let right = self.rotate_right(right);
            self.node_mut(id).right = Some(right);
        }
        self.rotate_left(id)
    }

    //--------- node bookkeeping ----------------

    #[inline]
    fn height(&self, node: Option<NodeId>) -> i32 {
        node.map_or(EMPTY_HEIGHT, |id| self.node(id).height)
    }

    // heights of (left, right) sub-trees under `node`.
    fn child_heights(&self, node: Option<NodeId>) -> (i32, i32) {
        match node {
            Some(id) => {
                let nref = self.node(id);
                (self.height(nref.left), self.height(nref.right))
            }
            None => (EMPTY_HEIGHT, EMPTY_HEIGHT),
        }
    }

    #[inline]
    fn balance(&self, id: NodeId) -> i32 {
        let node = self.node(id);
        self.height(node.left) - self.height(node.right)
    }

    #[inline]
    fn update_height(&mut self, id: NodeId) {
        let node = self.node(id);
        let height = cmp::max(self.height(node.left), self.height(node.right)) + 1;
        self.node_mut(id).height = height;
    }

    #[inline]
    fn node(&self, id: NodeId) -> &Node<V> {
        match &self.nodes[id] {
            Some(node) => node,
            None => panic!("node(): vacant slot {}, call the programmer", id),
        }
    }

    #[inline]
    fn node_mut(&mut self, id: NodeId) -> &mut Node<V> {
        match &mut self.nodes[id] {
            Some(node) => node,
            None => panic!("node_mut(): vacant slot {}, call the programmer", id),
        }
    }

    // CREATE operation, pick a vacated slot or grow the arena.
    fn alloc(&mut self, key: Key, value: V) -> Result<NodeId, Error> {
        let node = Node::new(key, value);
        if let Some(id) = self.free.pop() {
            self.nodes[id] = Some(node);
            return Ok(id);
        }

        // free-list shall always have room for every slot, so that
        // release() never allocates.
        let res = match self.nodes.try_reserve(1) {
            Ok(()) => {
                let additional = (self.nodes.len() + 1).saturating_sub(self.free.len());
                self.free.try_reserve(additional)
            }
            err => err,
        };
        if let Err(err) = res {
            tracing::debug!(name = %self.name, entries = self.n_count, "alloc failed: {}", err);
            return Err(err.into());
        }
        self.nodes.push(Some(node));
        Ok(self.nodes.len() - 1)
    }

    // DELETE operation, vacate the slot and return the node's value.
    fn release(&mut self, id: NodeId) -> V {
        match self.nodes[id].take() {
            Some(node) => {
                self.free.push(id);
                node.value
            }
            None => panic!("release(): vacant slot {}, call the programmer", id),
        }
    }
}

#[cfg(test)]
impl<V> Avl<V>
where
    V: Clone,
{
    /// In-order walk over all entries, for tests.
    pub(crate) fn to_vec(&self) -> Vec<(Key, V)> {
        let mut acc = vec![];
        let (mut stack, mut node) = (vec![], self.root);
        loop {
            while let Some(id) = node {
                stack.push(id);
                node = self.node(id).left;
            }
            match stack.pop() {
                Some(id) => {
                    let nref = self.node(id);
                    acc.push((nref.key, nref.value.clone()));
                    node = nref.right;
                }
                None => break acc,
            }
        }
    }

    /// Number of allocated slots, live and vacant, for tests.
    pub(crate) fn slots(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn root_key(&self) -> Option<Key> {
        self.root.map(|id| self.node(id).key)
    }
}

/// Node corresponds to a single entry in Avl instance.
#[derive(Clone)]
struct Node<V>
where
    V: Clone,
{
    key: Key,
    value: V,
    height: i32,           // cached height of sub-tree rooted here.
    left: Option<NodeId>,  // store: left child
    right: Option<NodeId>, // store: right child
}

impl<V> Node<V>
where
    V: Clone,
{
    fn new(key: Key, value: V) -> Node<V> {
        Node {
            key,
            value,
            height: 0,
            left: None,
            right: None,
        }
    }
}

/// Statistics on [`Avl`] tree. Serves two purpose:
///
/// * To get partial but quick statistics via [`Avl::stats`] method.
/// * To get full statisics via [`Avl::validate`] method.
#[derive(Default, Debug)]
pub struct Stats {
    entries: usize, // number of entries in the tree.
    node_size: usize,
    height: i32,
    depths: Option<Depth>,
}

impl Stats {
    fn new(entries: usize, node_size: usize) -> Stats {
        Stats {
            entries,
            node_size,
            height: EMPTY_HEIGHT,
            depths: Default::default(),
        }
    }

    #[inline]
    fn set_height(&mut self, height: i32) {
        self.height = height
    }

    #[inline]
    fn set_depths(&mut self, depths: Depth) {
        self.depths = Some(depths)
    }

    /// Return number entries in [`Avl`] instance.
    #[inline]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Return node-size, including over-head for `Avl<V>`. Although
    /// the node overhead is constant, the node size varies based on
    /// value type. EG:
    ///
    /// ```
    /// use avl_index::{Avl, Record};
    /// let avl: Avl<Record> = Avl::new("myinstance");
    ///
    /// assert!(avl.stats().node_size() > std::mem::size_of::<Record>());
    /// ```
    #[inline]
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Return height of the tree, `-1` for an empty tree and `0` for a
    /// tree with single entry.
    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    /// Return [`Depth`] statistics, only available from
    /// [`Avl::validate`] on a non-empty tree.
    pub fn depths(&self) -> Option<Depth> {
        match &self.depths {
            Some(depths) if depths.samples() > 0 && self.entries > 0 => Some(depths.clone()),
            _ => None,
        }
    }
}
