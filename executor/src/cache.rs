use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use lru::LruCache;
use once_cell::sync::Lazy;
use tracing::debug;

use common::datasource::QueryResult;

/// One cached result set plus the tables it was computed from; any write
/// to one of those tables purges the entry.
#[derive(Clone)]
struct CachedQuery {
    result: Arc<QueryResult>,
    tables: Vec<String>,
    expires_at: Instant,
}

/// Lock-striped LRU + TTL cache keyed by query fingerprint.
pub struct QueryCache {
    shards: Vec<Mutex<LruCache<String, CachedQuery>>>,
    ttl: Duration,
}

const SHARDS: usize = 16;

impl QueryCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let per_shard = (capacity / SHARDS).max(1);
        let shards = (0..SHARDS)
            .map(|_| {
                Mutex::new(LruCache::new(
                    NonZeroUsize::new(per_shard).unwrap_or(NonZeroUsize::new(1).unwrap()),
                ))
            })
            .collect();
        QueryCache { shards, ttl }
    }

    /// Cache key: current database + whitespace-normalized statement text.
    pub fn fingerprint(database: &str, sql: &str) -> String {
        let normalized: Vec<&str> = sql.split_whitespace().collect();
        format!("{}\u{1f}{}", database, normalized.join(" ").to_ascii_lowercase())
    }

    fn shard(&self, key: &str) -> &Mutex<LruCache<String, CachedQuery>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARDS]
    }

    pub fn get(&self, key: &str) -> Option<Arc<QueryResult>> {
        let mut shard = self.shard(key).lock().unwrap();
        match shard.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.result.clone()),
            Some(_) => {
                shard.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, result: Arc<QueryResult>, tables: Vec<String>) {
        let entry = CachedQuery {
            result,
            tables,
            expires_at: Instant::now() + self.ttl,
        };
        self.shard(&key).lock().unwrap().put(key, entry);
    }

    /// A write to `table` drops every entry that read it.
    pub fn invalidate_table(&self, table: &str) {
        for shard in &self.shards {
            let mut shard = shard.lock().unwrap();
            let doomed: Vec<String> = shard
                .iter()
                .filter(|(_, entry)| entry.tables.iter().any(|t| t == table))
                .map(|(k, _)| k.clone())
                .collect();
            for key in doomed {
                shard.pop(&key);
            }
        }
        debug!("query cache invalidated for table '{}'", table);
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().unwrap().clear();
        }
    }
}

static GLOBAL: Lazy<RwLock<Option<Arc<QueryCache>>>> = Lazy::new(|| RwLock::new(None));

/// Install the process-wide cache. Subsequent init calls replace it.
pub fn init(capacity: usize, ttl: Duration) {
    *GLOBAL.write().unwrap() = Some(Arc::new(QueryCache::new(capacity, ttl)));
}

pub fn shutdown() {
    *GLOBAL.write().unwrap() = None;
}

pub fn global() -> Option<Arc<QueryCache>> {
    GLOBAL.read().unwrap().clone()
}

#[cfg(test)]
mod test {
    use super::*;

    fn result() -> Arc<QueryResult> {
        Arc::new(QueryResult::empty(vec!["a".into()]))
    }

    #[test]
    fn hit_until_ttl_expires() {
        let cache = QueryCache::new(8, Duration::from_millis(30));
        let key = QueryCache::fingerprint("main", "SELECT  1");
        cache.put(key.clone(), result(), vec![]);
        assert!(cache.get(&key).is_some());
        std::thread::sleep(Duration::from_millis(50));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn fingerprint_normalizes_whitespace() {
        assert_eq!(
            QueryCache::fingerprint("main", "SELECT   1"),
            QueryCache::fingerprint("main", "select 1")
        );
        assert_ne!(
            QueryCache::fingerprint("main", "SELECT 1"),
            QueryCache::fingerprint("other", "SELECT 1")
        );
    }

    #[test]
    fn table_write_invalidates() {
        let cache = QueryCache::new(8, Duration::from_secs(60));
        let users = QueryCache::fingerprint("main", "select * from users");
        let orders = QueryCache::fingerprint("main", "select * from orders");
        cache.put(users.clone(), result(), vec!["users".into()]);
        cache.put(orders.clone(), result(), vec!["orders".into()]);
        cache.invalidate_table("users");
        assert!(cache.get(&users).is_none());
        assert!(cache.get(&orders).is_some());
    }
}
