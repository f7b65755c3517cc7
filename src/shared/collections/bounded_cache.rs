/// 有界缓存（FIFO淘汰）
///
/// 固定容量的键值表，满了之后淘汰最早插入的条目：
/// - O(1) 查询与插入
/// - 容量为0时不保存任何条目
/// - 非线程安全，调用方负责加锁，并且只在查询/插入期间持有锁

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

pub struct BoundedCache<K, V> {
    entries: HashMap<K, V>,
    /// 插入顺序，队首最旧
    order: VecDeque<K>,
    capacity: usize,
}

impl<K: Eq + Hash + Clone, V: Clone> BoundedCache<K, V> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).cloned()
    }

    /// 插入条目；键已存在时只更新值，不改变淘汰顺序
    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        if let Some(existing) = self.entries.get_mut(&key) {
            *existing = value;
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
