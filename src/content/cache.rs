use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ContentError, ContentProvider, Lang, Verse, VerseDetails, VerseRange};

struct Entry<T> {
    value: T,
    stored_at: Instant,
}

struct Table<K, V> {
    entries: RwLock<HashMap<K, Entry<V>>>,
}

impl<K: Eq + Hash, V: Clone> Table<K, V> {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn get(&self, key: &K, ttl: Option<Duration>) -> Option<V> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        match ttl {
            Some(ttl) if entry.stored_at.elapsed() >= ttl => None,
            _ => Some(entry.value.clone()),
        }
    }

    async fn put(&self, key: K, value: V) {
        self.entries.write().await.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Verse lookups keyed by id, range and (id, lang). Without a TTL entries
/// live for the life of the process; corpus text never changes.
pub struct VerseCache {
    ttl: Option<Duration>,
    verses: Table<u32, Verse>,
    ranges: Table<VerseRange, Vec<Verse>>,
    details: Table<(u32, Lang), VerseDetails>,
}

impl VerseCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            verses: Table::new(),
            ranges: Table::new(),
            details: Table::new(),
        }
    }

    pub async fn cached_verses(&self) -> usize {
        self.verses.len().await
    }
}

/// A [`ContentProvider`] that answers from a [`VerseCache`] before asking the
/// wrapped provider. Range results also fill the per-verse table.
pub struct CachedContent<P> {
    inner: P,
    cache: VerseCache,
}

impl<P: ContentProvider> CachedContent<P> {
    pub fn new(inner: P, cache: VerseCache) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &VerseCache {
        &self.cache
    }
}

#[async_trait]
impl<P: ContentProvider> ContentProvider for CachedContent<P> {
    async fn verse(&self, id: u32) -> Result<Verse, ContentError> {
        if let Some(verse) = self.cache.verses.get(&id, self.cache.ttl).await {
            return Ok(verse);
        }
        let verse = self.inner.verse(id).await?;
        self.cache.verses.put(id, verse.clone()).await;
        Ok(verse)
    }

    async fn verses_in(&self, range: VerseRange) -> Result<Vec<Verse>, ContentError> {
        if let Some(verses) = self.cache.ranges.get(&range, self.cache.ttl).await {
            return Ok(verses);
        }
        let verses = self.inner.verses_in(range).await?;
        for verse in &verses {
            self.cache.verses.put(verse.id, verse.clone()).await;
        }
        self.cache.ranges.put(range, verses.clone()).await;
        tracing::debug!(?range, verses = verses.len(), "cached verse range");
        Ok(verses)
    }

    async fn verse_details(&self, id: u32, lang: Lang) -> Result<VerseDetails, ContentError> {
        if let Some(details) = self.cache.details.get(&(id, lang), self.cache.ttl).await {
            return Ok(details);
        }
        let details = self.inner.verse_details(id, lang).await?;
        self.cache.details.put((id, lang), details.clone()).await;
        Ok(details)
    }

    fn total_verses(&self) -> u32 {
        self.inner.total_verses()
    }
}
