//! Verse content: the provider abstraction the question generator and the
//! scoring engine read from, plus the implementations.
//!
//! - [`AlQuranClient`] talks to the public alquran.cloud API.
//! - [`StaticCorpus`] serves a JSON file (offline use and tests).
//! - [`CachedContent`] wraps either one with an explicit [`VerseCache`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod alquran;
mod cache;
pub(crate) mod corpus;

pub use alquran::{AlQuranClient, TOTAL_AYAHS};
pub use cache::{CachedContent, VerseCache};
pub use corpus::StaticCorpus;

pub const JUZ_COUNT: u8 = 30;
pub const SURAH_COUNT: u16 = 114;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verse {
    /// Global sequential number, 1-based.
    pub id: u32,
    pub text: String,
    pub surah_id: u16,
    pub surah_name: String,
    pub surah_english_name: String,
    /// Position within the surah, 1-based.
    pub index_in_surah: u16,
    pub surah_length: u16,
    pub juz: u8,
}

impl Verse {
    pub fn is_last_in_surah(&self) -> bool {
        self.index_in_surah >= self.surah_length
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerseRange {
    Juz(u8),
    Surah(u16),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Id,
    En,
}

impl Lang {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("en") => Lang::En,
            _ => Lang::Id,
        }
    }

    pub fn translation_edition(self) -> &'static str {
        match self {
            Lang::Id => "id.indonesian",
            Lang::En => "en.sahih",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerseDetails {
    pub audio: Option<String>,
    pub translation: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("content provider unavailable: {0}")]
    Unavailable(String),
    #[error("verse {0} does not exist")]
    UnknownVerse(u32),
    #[error("unexpected content provider payload: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn verse(&self, id: u32) -> Result<Verse, ContentError>;

    /// All verses of one juz or surah, in canonical order.
    async fn verses_in(&self, range: VerseRange) -> Result<Vec<Verse>, ContentError>;

    async fn verse_details(&self, id: u32, lang: Lang) -> Result<VerseDetails, ContentError>;

    fn total_verses(&self) -> u32;
}
