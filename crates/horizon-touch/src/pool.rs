//! A growable object pool.
//!
//! The pool pre-creates its items and recycles them through a free list.
//! [`ObjectPool::get`] never fails: when the free list is empty a new item is
//! created, since refusing a contact is worse than one extra allocation.

use std::fmt;

type Factory<T> = Box<dyn Fn() -> T + Send + Sync>;
type Hook<T> = Box<dyn Fn(&mut T) + Send + Sync>;

/// Item counts reported by a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Items created by the pool so far.
    pub all: usize,
    /// Items currently handed out.
    pub active: usize,
    /// Items waiting in the free list.
    pub inactive: usize,
}

/// A pool of reusable values.
pub struct ObjectPool<T> {
    free: Vec<T>,
    created: usize,
    factory: Factory<T>,
    on_get: Option<Hook<T>>,
    on_release: Option<Hook<T>>,
}

impl<T> ObjectPool<T> {
    /// Create a pool holding `capacity` ready items.
    pub fn new<F>(capacity: usize, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let free = (0..capacity).map(|_| factory()).collect();
        Self {
            free,
            created: capacity,
            factory: Box::new(factory),
            on_get: None,
            on_release: None,
        }
    }

    /// Run `hook` on every item as it is handed out.
    pub fn with_on_get<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.on_get = Some(Box::new(hook));
        self
    }

    /// Run `hook` on every item as it is returned.
    pub fn with_on_release<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Take an item, creating one if the free list is empty.
    pub fn get(&mut self) -> T {
        let mut item = match self.free.pop() {
            Some(item) => item,
            None => {
                self.created += 1;
                (self.factory)()
            }
        };
        if let Some(hook) = &self.on_get {
            hook(&mut item);
        }
        item
    }

    /// Return an item to the free list.
    pub fn release(&mut self, mut item: T) {
        if let Some(hook) = &self.on_release {
            hook(&mut item);
        }
        self.free.push(item);
        // Items created elsewhere still count once they are pooled.
        self.created = self.created.max(self.free.len());
    }

    /// Number of items the pool has created.
    pub fn count_all(&self) -> usize {
        self.created
    }

    /// Number of items currently handed out.
    pub fn count_active(&self) -> usize {
        self.created - self.free.len()
    }

    /// Number of items in the free list.
    pub fn count_inactive(&self) -> usize {
        self.free.len()
    }

    /// All three counts at once.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            all: self.count_all(),
            active: self.count_active(),
            inactive: self.count_inactive(),
        }
    }
}

impl<T> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("all", &self.count_all())
            .field("inactive", &self.count_inactive())
            .finish()
    }
}
