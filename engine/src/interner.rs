//! Task identity and key interning.
//!
//! Tasks live in an arena; `TaskId` is their stable index. External task keys
//! (names, uids from an import) are interned to ids once so every later lookup
//! is an integer hash.

use rustc_hash::FxHashMap;
use std::fmt;

/// Stable arena index of a task (u32 for compact storage and fast hashing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u32);

impl TaskId {
    /// Id of the synthetic hierarchy root every top-level task hangs from.
    pub const ROOT: TaskId = TaskId(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Interner that maps task keys to arena ids.
#[derive(Debug, Clone)]
pub struct TaskKeyInterner {
    to_id: FxHashMap<String, TaskId>,
    from_id: Vec<Option<String>>,
}

impl TaskKeyInterner {
    /// Create a new interner with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            to_id: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            from_id: Vec::with_capacity(capacity),
        }
    }

    /// Bind `key` to `id`. Returns false if the key is already taken.
    pub fn bind(&mut self, key: &str, id: TaskId) -> bool {
        if self.to_id.contains_key(key) {
            return false;
        }
        if self.from_id.len() <= id.index() {
            self.from_id.resize(id.index() + 1, None);
        }
        self.from_id[id.index()] = Some(key.to_string());
        self.to_id.insert(key.to_string(), id);
        true
    }

    /// Forget the key bound to `id`, if any.
    pub fn unbind(&mut self, id: TaskId) {
        if let Some(slot) = self.from_id.get_mut(id.index()) {
            if let Some(key) = slot.take() {
                self.to_id.remove(&key);
            }
        }
    }

    /// Get the id bound to a key, if it exists.
    #[inline]
    pub fn get(&self, key: &str) -> Option<TaskId> {
        self.to_id.get(key).copied()
    }

    /// Get the key bound to an id.
    #[inline]
    pub fn resolve(&self, id: TaskId) -> Option<&str> {
        self.from_id.get(id.index()).and_then(|s| s.as_deref())
    }

    /// Number of bound keys.
    pub fn len(&self) -> usize {
        self.to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_id.is_empty()
    }
}

impl Default for TaskKeyInterner {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}
