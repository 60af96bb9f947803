use std::{any::Any, fmt, sync::Arc};

use crate::domain::{Domain, PackId, PackView, Value, Values};

/// String-keyed container of opaque values passed into and out of a task.
///
/// A pack stores nothing itself: its contents live inside a lock domain and
/// every operation takes that domain's lock. Packs made by an executor share
/// the executor's lock, so [`TaskExecutor::lock`](crate::TaskExecutor::lock)
/// can read a handler state and pack contents together. [`Pack::new`] creates
/// a pack under a private lock; submitting it to an executor copies its entries
/// into a pack under the executor's lock.
///
/// Cloning a `Pack` yields another reference to the same contents. Use
/// [`Pack::copy`] for an independent pack.
#[derive(Clone)]
pub struct Pack {
    inner: Arc<PackInner>,
}

struct PackInner {
    id: PackId,
    domain: Arc<Domain>,
}

impl Drop for PackInner {
    fn drop(&mut self) {
        self.domain.bury_pack(self.id);
    }
}

impl Pack {
    /// An empty pack with its own lock.
    pub fn new() -> Self {
        Self::in_domain(&Domain::new(), Values::new())
    }

    pub(crate) fn in_domain(domain: &Arc<Domain>, values: Values) -> Self {
        let id = domain.alloc_pack(values);
        Self {
            inner: Arc::new(PackInner {
                id,
                domain: Arc::clone(domain),
            }),
        }
    }

    /// This pack if it already lives in `domain`, otherwise a copy placed there.
    pub(crate) fn rehome(&self, domain: &Arc<Domain>) -> Pack {
        if Arc::ptr_eq(&self.inner.domain, domain) {
            self.clone()
        } else {
            self.copy_into(domain)
        }
    }

    /// Independent pack in `domain` holding the current entries.
    pub(crate) fn copy_into(&self, domain: &Arc<Domain>) -> Pack {
        Pack::in_domain(domain, self.snapshot())
    }

    pub(crate) fn id(&self) -> PackId {
        self.inner.id
    }

    pub(crate) fn domain(&self) -> &Arc<Domain> {
        &self.inner.domain
    }

    fn with<R>(&self, f: impl FnOnce(&mut PackView<'_>) -> R) -> R {
        let mut core = self.inner.domain.lock();
        let values = core.packs.entry(self.inner.id).or_default();
        f(&mut PackView { values })
    }

    fn snapshot(&self) -> Values {
        self.with(|view| view.values.clone())
    }

    /// Independent pack under the same lock with the current entries.
    ///
    /// Values themselves are shared, the mapping is not.
    pub fn copy(&self) -> Pack {
        self.copy_into(&self.inner.domain)
    }

    /// Whether both packs are guarded by the same lock.
    pub fn same_lock(&self, other: &Pack) -> bool {
        Arc::ptr_eq(&self.inner.domain, &other.inner.domain)
    }

    pub fn len(&self) -> usize {
        self.with(|view| view.len())
    }

    pub fn is_empty(&self) -> bool {
        self.with(|view| view.is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.with(|view| view.contains_key(key))
    }

    /// `None` if the key is absent or holds a value of another type.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.with(|view| view.get(key))
    }

    pub fn get_cloned<T: Any + Send + Sync + Clone>(&self, key: &str) -> Option<T> {
        self.get::<T>(key).map(|v| v.as_ref().clone())
    }

    pub fn get_or<T: Any + Send + Sync + Clone>(&self, key: &str, default: T) -> T {
        self.with(|view| view.get_or(key, default))
    }

    pub fn put<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> &Self {
        let old = self.with(|view| view.put(key, value));
        drop(old);
        self
    }

    /// Stores `value`, or `default` when `value` is `None`.
    pub fn put_or<T: Any + Send + Sync>(
        &self,
        key: impl Into<String>,
        value: Option<T>,
        default: T,
    ) -> &Self {
        self.put(key, value.unwrap_or(default))
    }

    pub fn put_if<T: Any + Send + Sync>(
        &self,
        condition: bool,
        key: impl Into<String>,
        value: T,
    ) -> &Self {
        if condition {
            self.put(key, value);
        }
        self
    }

    /// Copies every entry of `other` into this pack.
    pub fn put_all(&self, other: &Pack) -> &Self {
        let entries = other.snapshot();
        let replaced: Vec<Value> = self.with(|view| {
            entries
                .into_iter()
                .filter_map(|(k, v)| view.values.insert(k, v))
                .collect()
        });
        drop(replaced);
        self
    }

    pub fn remove(&self, key: &str) -> &Self {
        let old = self.with(|view| view.take(key));
        drop(old);
        self
    }

    pub fn clear(&self) -> &Self {
        let old = self.with(|view| std::mem::take(view.values));
        drop(old);
        self
    }

    /// Snapshot of the keys at call time.
    pub fn keys(&self) -> Vec<String> {
        self.with(|view| view.keys())
    }

    /// Iterates a snapshot of the keys; [`KeyCursor::remove`] deletes the
    /// current key from the pack.
    pub fn cursor(&self) -> KeyCursor<'_> {
        KeyCursor {
            pack: self,
            keys: self.keys().into_iter(),
            current: None,
        }
    }
}

impl Default for Pack {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Pack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pack").field("id", &self.inner.id).finish()
    }
}

pub struct KeyCursor<'p> {
    pack: &'p Pack,
    keys: std::vec::IntoIter<String>,
    current: Option<String>,
}

impl KeyCursor<'_> {
    /// Removes the key last returned by `next`.
    ///
    /// Returns `false` if there is no such key or it was already removed
    /// through this cursor.
    pub fn remove(&mut self) -> bool {
        match self.current.take() {
            Some(key) => {
                self.pack.remove(&key);
                true
            }
            None => false,
        }
    }
}

impl Iterator for KeyCursor<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.current = self.keys.next();
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn setup_pack() -> Pack {
        let pack = Pack::new();
        pack.put("name", "job".to_string()).put("count", 3_u32);
        pack
    }

    #[test]
    fn put_then_get() {
        let pack = setup_pack();
        assert_eq!(pack.get_cloned::<String>("name").as_deref(), Some("job"));
        assert_eq!(*pack.get::<u32>("count").unwrap(), 3);
        assert_eq!(pack.len(), 2);
    }

    #[test]
    fn wrong_type_reads_as_absent() {
        let pack = setup_pack();
        assert!(pack.get::<i64>("count").is_none());
        assert!(pack.contains_key("count"));
    }

    #[test]
    fn get_or_falls_back() {
        let pack = setup_pack();
        assert_eq!(pack.get_or("missing", 7_u32), 7);
        assert_eq!(pack.get_or("count", 7_u32), 3);
    }

    #[test]
    fn put_if_and_put_or() {
        let pack = Pack::new();
        pack.put_if(false, "a", 1_i32).put_if(true, "b", 2_i32);
        pack.put_or("c", None, 9_i32).put_or("d", Some(4_i32), 9);

        assert!(!pack.contains_key("a"));
        assert_eq!(pack.get_cloned::<i32>("b"), Some(2));
        assert_eq!(pack.get_cloned::<i32>("c"), Some(9));
        assert_eq!(pack.get_cloned::<i32>("d"), Some(4));
    }

    #[test]
    fn remove_and_clear() {
        let pack = setup_pack();
        pack.remove("name");
        assert!(!pack.contains_key("name"));
        assert_eq!(pack.len(), 1);

        pack.clear();
        assert!(pack.is_empty());
    }

    #[test]
    fn clone_shares_contents() {
        let pack = setup_pack();
        let alias = pack.clone();
        alias.put("extra", true);
        assert!(pack.contains_key("extra"));
    }

    #[test]
    fn copy_is_independent_after_copying() {
        let source = setup_pack();
        let copy = source.copy();
        assert!(copy.same_lock(&source));

        copy.put("only-copy", 1_u8);
        source.remove("name");

        assert!(!source.contains_key("only-copy"));
        assert!(copy.contains_key("name"));
    }

    #[test]
    fn copied_values_are_shared_shallowly() {
        let source = Pack::new();
        source.put("log", Mutex::new(Vec::<String>::new()));
        let copy = source.copy();

        copy.get::<Mutex<Vec<String>>>("log")
            .unwrap()
            .lock()
            .unwrap()
            .push("x".into());

        let log = source.get::<Mutex<Vec<String>>>("log").unwrap();
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn rehome_copies_into_foreign_domain() {
        let source = setup_pack();
        let target = Domain::new();
        let moved = source.rehome(&target);

        assert!(!moved.same_lock(&source));
        assert_eq!(moved.get_cloned::<u32>("count"), Some(3));

        moved.put("count", 4_u32);
        assert_eq!(source.get_cloned::<u32>("count"), Some(3));
    }

    #[test]
    fn rehome_into_own_domain_keeps_identity() {
        let source = setup_pack();
        let same = source.rehome(source.domain());
        same.put("seen", true);
        assert!(source.contains_key("seen"));
    }

    #[test]
    fn put_all_overrides() {
        let base = setup_pack();
        let other = Pack::new();
        other.put("count", 10_u32).put("flag", true);

        base.put_all(&other);
        assert_eq!(base.get_cloned::<u32>("count"), Some(10));
        assert_eq!(base.len(), 3);
    }

    #[test]
    fn cursor_removes_current_key() {
        let pack = setup_pack();
        let mut cursor = pack.cursor();
        assert!(!cursor.remove());

        while let Some(key) = cursor.next() {
            if key == "name" {
                assert!(cursor.remove());
                assert!(!cursor.remove());
            }
        }

        assert_eq!(pack.keys(), vec!["count".to_string()]);
    }

    #[test]
    fn dropped_pack_releases_its_slot() {
        let domain = Domain::new();
        let pack = Pack::in_domain(&domain, Values::new());
        let alias = pack.clone();
        drop(pack);
        assert_eq!(domain.lock().packs.len(), 1);

        drop(alias);
        assert!(domain.lock().packs.is_empty());
    }
}
