use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use color_eyre::{
    eyre::{bail, WrapErr},
    Result,
};

use super::{ContentError, ContentProvider, Lang, Verse, VerseDetails, VerseRange};

/// In-memory corpus, loaded once from a JSON array of [`Verse`] objects.
#[derive(Clone, Debug, Default)]
pub struct StaticCorpus {
    verses: BTreeMap<u32, Verse>,
}

impl StaticCorpus {
    pub fn new(verses: impl IntoIterator<Item = Verse>) -> Self {
        Self {
            verses: verses.into_iter().map(|v| (v.id, v)).collect(),
        }
    }

    /// Loads a corpus file. Ids must run from 1 without gaps, since random
    /// picks draw from `1..=total_verses()`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("could not read corpus file {}", path.display()))?;
        let verses: Vec<Verse> = serde_json::from_str(&raw)
            .wrap_err_with(|| format!("could not parse corpus file {}", path.display()))?;

        let corpus = Self::new(verses);
        corpus
            .check_contiguous()
            .wrap_err_with(|| format!("unusable corpus file {}", path.display()))?;

        tracing::info!(path = %path.display(), verses = corpus.len(), "loaded static corpus");
        Ok(corpus)
    }

    fn check_contiguous(&self) -> Result<()> {
        if self.verses.is_empty() {
            bail!("corpus has no verses");
        }
        for (expected, &id) in (1u32..).zip(self.verses.keys()) {
            if id != expected {
                bail!(
                    "verse ids must run 1..={} without gaps, found {id} where {expected} was expected",
                    self.len()
                );
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.verses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verses.is_empty()
    }
}

#[async_trait]
impl ContentProvider for StaticCorpus {
    async fn verse(&self, id: u32) -> Result<Verse, ContentError> {
        self.verses
            .get(&id)
            .cloned()
            .ok_or(ContentError::UnknownVerse(id))
    }

    async fn verses_in(&self, range: VerseRange) -> Result<Vec<Verse>, ContentError> {
        Ok(self
            .verses
            .values()
            .filter(|v| match range {
                VerseRange::Juz(juz) => v.juz == juz,
                VerseRange::Surah(surah) => v.surah_id == surah,
            })
            .cloned()
            .collect())
    }

    async fn verse_details(&self, id: u32, _lang: Lang) -> Result<VerseDetails, ContentError> {
        if self.verses.contains_key(&id) {
            Ok(VerseDetails::default())
        } else {
            Err(ContentError::UnknownVerse(id))
        }
    }

    fn total_verses(&self) -> u32 {
        self.verses.keys().next_back().copied().unwrap_or(0)
    }
}

/// Builds a consecutive corpus from surah lengths; every juz holds two
/// surahs. Verse text is `"s{surah}:{index}"`.
#[cfg(test)]
pub(crate) fn synthetic(surah_lengths: &[u16]) -> StaticCorpus {
    let mut verses = Vec::new();
    let mut id = 0u32;
    for (i, &len) in surah_lengths.iter().enumerate() {
        let surah_id = i as u16 + 1;
        for index in 1..=len {
            id += 1;
            verses.push(Verse {
                id,
                text: format!("s{surah_id}:{index}"),
                surah_id,
                surah_name: format!("surah {surah_id}"),
                surah_english_name: format!("Surah {surah_id}"),
                index_in_surah: index,
                surah_length: len,
                juz: (i / 2) as u8 + 1,
            });
        }
    }
    StaticCorpus::new(verses)
}
