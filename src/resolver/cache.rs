//! TTL 缓存（带负缓存和并发请求合并）
//!
//! - 成功结果保留 `ttl`，失败结果保留 `negative_ttl`
//! - 同一个 key 的并发 miss 只会触发一次 fetch，其余调用方等待同一个 `Shared` future
//! - 过期只看插入时间，不做后台刷新
//! - `invalidate` / `clear` 推进代计数器，之前发起的 fetch 完成后不再写回

use crate::common::RouterResult;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// A cached fetch outcome. `Err` entries are negative cache hits.
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub inserted_at: Instant,
    pub value: RouterResult<V>,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, ttl: Duration, negative_ttl: Duration) -> bool {
        let ttl = if self.value.is_ok() { ttl } else { negative_ttl };
        self.inserted_at.elapsed() < ttl
    }
}

type SharedFetch<V> = Shared<BoxFuture<'static, RouterResult<V>>>;

struct Inner<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    in_flight: DashMap<K, (u64, SharedFetch<V>)>,
    generation: AtomicU64,
    ttl: Duration,
    negative_ttl: Duration,
}

pub struct TtlCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, negative_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                in_flight: DashMap::new(),
                generation: AtomicU64::new(0),
                ttl,
                negative_ttl,
            }),
        }
    }

    /// Fresh entry for `key`, if any. Expired entries are dropped on the way.
    pub fn get(&self, key: &K) -> Option<RouterResult<V>> {
        let fresh = {
            let entry = self.inner.entries.get(key)?;
            if entry.is_fresh(self.inner.ttl, self.inner.negative_ttl) {
                Some(entry.value.clone())
            } else {
                None
            }
        };
        if fresh.is_none() {
            self.inner.entries.remove(key);
        }
        fresh
    }

    pub fn insert(&self, key: K, value: RouterResult<V>) {
        self.inner.entries.insert(key, CacheEntry { inserted_at: Instant::now(), value });
    }

    /// Drop `key`. A fetch already in flight still answers its callers but is not cached.
    pub fn invalidate(&self, key: &K) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.in_flight.remove(key);
        self.inner.entries.remove(key);
    }

    pub fn clear(&self) {
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.inner.in_flight.clear();
        self.inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Return the cached outcome or run `fetch` once, sharing it with concurrent callers.
    ///
    /// The outcome (success or failure) is cached even if every caller is dropped
    /// before the fetch completes, as long as some caller is still polling it.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> RouterResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RouterResult<V>> + Send + 'static,
    {
        if let Some(hit) = self.get(&key) {
            return hit;
        }

        let shared = match self.inner.in_flight.entry(key.clone()) {
            Entry::Occupied(pending) => pending.get().1.clone(),
            Entry::Vacant(slot) => {
                // 完成的 fetch 先写 entries 再移除 in_flight，这里再查一次
                if let Some(hit) = self.get(&key) {
                    return hit;
                }
                let inner = self.inner.clone();
                let generation = inner.generation.load(Ordering::Acquire);
                let fut = fetch();
                let shared = async move {
                    let result = fut.await;
                    if inner.generation.load(Ordering::Acquire) == generation {
                        inner
                            .entries
                            .insert(key.clone(), CacheEntry { inserted_at: Instant::now(), value: result.clone() });
                    }
                    inner.in_flight.remove_if(&key, |_, (g, _)| *g == generation);
                    result
                }
                .boxed()
                .shared();
                slot.insert((generation, shared.clone()));
                shared
            }
        };
        shared.await
    }
}
