//! Traversal cursor: where the engine is in the schema tree.
//!
//! The cursor is a bounded stack of collection levels. Level 0 is the group,
//! every further level is a list nested inside the element of the level
//! below. Each level carries the ephemeral bookkeeping of its collection
//! walk (lock state, instance count, dictionary keys, instance and element
//! positions).

use heapless::Vec as BoundedVec;

use super::RCI_LIST_MAX_DEPTH;
use super::schema::{Collection, CollectionDef, GroupType, Schema};
use super::value::ElementValue;

/// Group level plus nested lists.
pub const MAX_LEVELS: usize = RCI_LIST_MAX_DEPTH + 1;

/// Address of one instance in a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instance {
    /// 1-based array index.
    Index(u32),
    /// Dictionary key.
    Key(String),
}

impl Instance {
    /// Dictionary key, if this instance is addressed by key.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Key(key) => Some(key),
            Self::Index(_) => None,
        }
    }
}

/// Whether instances or elements come from the request or from the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Walk {
    Requested,
    All,
}

/// Compare-to suppression state of a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    No,
    /// The start callback reported a match; its end callback still fires.
    Own,
    /// Inside a skipped level; no callbacks at all.
    Inherited,
}

#[derive(Debug, Clone)]
pub struct Level {
    /// Group id at depth 0, list element id above.
    pub(crate) id: u32,
    pub(crate) collection: Collection,

    // ---- collection walk
    pub(crate) instance_walk: Walk,
    pub(crate) instances_seen: bool,
    pub(crate) next_instance: u32,
    pub(crate) count: u32,
    pub(crate) keys: Vec<String>,
    pub(crate) locked: bool,
    /// COUNT received in a set request, applied after locking.
    pub(crate) requested_count: Option<u32>,
    pub(crate) instance: Option<Instance>,

    // ---- element walk within the current instance
    pub(crate) element_walk: Walk,
    pub(crate) items_seen: bool,
    pub(crate) next_element: u32,
    pub(crate) element: Option<u32>,

    pub(crate) skip: Skip,
    /// Start callback completed; end callback owed.
    pub(crate) started: bool,
    /// Id written to the response; terminator owed.
    pub(crate) emitted: bool,
}

impl Level {
    pub(crate) fn new(id: u32, collection: Collection, walk: Walk) -> Self {
        Self {
            id,
            collection,
            instance_walk: walk,
            instances_seen: false,
            next_instance: 0,
            count: 0,
            keys: Vec::new(),
            locked: false,
            requested_count: None,
            instance: None,
            element_walk: walk,
            items_seen: false,
            next_element: 0,
            element: None,
            skip: Skip::No,
            started: false,
            emitted: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Instance count known for this walk.
    pub fn count(&self) -> u32 {
        self.count
    }

    pub(crate) fn skipping(&self) -> bool {
        self.skip != Skip::No
    }
}

/// Read-only view of the cursor handed to callbacks.
#[derive(Debug, Clone, Copy)]
pub struct Path<'a> {
    levels: &'a [Level],
}

impl<'a> Path<'a> {
    pub fn group_id(&self) -> u32 {
        self.levels.first().map_or(0, |l| l.id)
    }

    pub fn group_instance(&self) -> Option<&'a Instance> {
        self.levels.first().and_then(|l| l.instance.as_ref())
    }

    /// Number of nested lists entered.
    pub fn list_depth(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// `(list id, list instance)` at nesting `depth` (1-based).
    pub fn list(&self, depth: usize) -> Option<(u32, Option<&'a Instance>)> {
        if depth == 0 {
            return None;
        }
        self.levels.get(depth).map(|l| (l.id, l.instance.as_ref()))
    }

    /// The innermost collection.
    pub fn current(&self) -> Option<&'a Level> {
        self.levels.last()
    }
}

/// Collection a session still holds locked, reported on cancel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedCollection {
    pub group_type: GroupType,
    /// Group id followed by the list ids down to the locked level.
    pub path: BoundedVec<u32, MAX_LEVELS>,
}

#[derive(Debug)]
pub struct TraversalCursor {
    pub(crate) group_type: GroupType,
    /// Walking every group of `group_type`.
    pub(crate) all_groups: bool,
    pub(crate) groups_seen: bool,
    pub(crate) next_group: u32,
    pub(crate) levels: BoundedVec<Level, MAX_LEVELS>,
    /// Decoded value of the element being set.
    pub(crate) value: Option<ElementValue>,
    /// Instance named by REMOVE or about to be created.
    pub(crate) pending_instance: Option<Instance>,
    pub(crate) pending_count: u32,
}

impl TraversalCursor {
    pub fn new() -> Self {
        Self {
            group_type: GroupType::Setting,
            all_groups: false,
            groups_seen: false,
            next_group: 0,
            levels: BoundedVec::new(),
            value: None,
            pending_instance: None,
            pending_count: 0,
        }
    }

    /// Forget the previous command's position.
    pub fn reset(&mut self, group_type: GroupType) {
        self.group_type = group_type;
        self.all_groups = false;
        self.groups_seen = false;
        self.next_group = 0;
        self.levels.clear();
        self.value = None;
        self.pending_instance = None;
        self.pending_count = 0;
    }

    pub fn path(&self) -> Path<'_> {
        Path { levels: &self.levels }
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn top(&self) -> Option<&Level> {
        self.levels.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut Level> {
        self.levels.last_mut()
    }

    pub(crate) fn push(&mut self, level: Level) -> bool {
        self.levels.push(level).is_ok()
    }

    pub(crate) fn pop(&mut self) -> Option<Level> {
        self.levels.pop()
    }

    /// The level below the top skips, so the top inherits it.
    pub(crate) fn parent_skipping(&self) -> bool {
        let n = self.levels.len();
        n >= 2 && self.levels[n - 2].skipping()
    }

    /// Schema definition of the collection at `depth` (0 = group).
    pub fn def_at<'s>(&self, schema: &'s Schema, depth: usize) -> Option<CollectionDef<'s>> {
        let ids: BoundedVec<u32, MAX_LEVELS> = self.levels.iter().take(depth + 1).map(|l| l.id).collect();
        if ids.len() != depth + 1 {
            return None;
        }
        schema.collection(self.group_type, &ids)
    }

    /// Schema definition of the innermost collection.
    pub fn top_def<'s>(&self, schema: &'s Schema) -> Option<CollectionDef<'s>> {
        self.def_at(schema, self.levels.len().checked_sub(1)?)
    }

    /// Every collection currently holding a lock, outermost first.
    pub fn locked_collections(&self) -> Vec<LockedCollection> {
        let mut locked = Vec::new();
        let mut path = BoundedVec::new();
        for level in &self.levels {
            // capacity equals the level stack
            let _ = path.push(level.id);
            if level.locked {
                locked.push(LockedCollection {
                    group_type: self.group_type,
                    path: path.clone(),
                });
            }
        }
        locked
    }
}

impl Default for TraversalCursor {
    fn default() -> Self {
        Self::new()
    }
}
