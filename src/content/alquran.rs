use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, instrument, warn};

use super::{ContentError, ContentProvider, Lang, Verse, VerseDetails, VerseRange};

pub const TOTAL_AYAHS: u32 = 6236;

const TEXT_EDITION: &str = "quran-uthmani";
const AUDIO_EDITION: &str = "ar.alafasy";
const APP_USER_AGENT: &str = concat!("sambung-ayat/", env!("CARGO_PKG_VERSION"));

/// Client for `api.alquran.cloud`. Every request gets the configured timeout
/// and exactly one retry.
#[derive(Clone)]
pub struct AlQuranClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct Envelope {
    code: u16,
    status: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSurah {
    number: u16,
    name: String,
    english_name: String,
    number_of_ayahs: u16,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiAyah {
    number: u32,
    text: String,
    #[serde(default)]
    surah: Option<ApiSurah>,
    number_in_surah: u16,
    juz: u8,
}

#[derive(Deserialize)]
struct ApiJuz {
    ayahs: Vec<ApiAyah>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiSurahWithAyahs {
    #[serde(flatten)]
    surah: ApiSurah,
    ayahs: Vec<ApiAyah>,
}

#[derive(Deserialize)]
struct ApiEdition {
    identifier: String,
}

#[derive(Deserialize)]
struct ApiEditionAyah {
    text: String,
    #[serde(default)]
    audio: Option<String>,
    edition: ApiEdition,
}

impl ApiAyah {
    fn into_verse(self, surah: &ApiSurah) -> Verse {
        Verse {
            id: self.number,
            text: self.text,
            surah_id: surah.number,
            surah_name: surah.name.clone(),
            surah_english_name: surah.english_name.clone(),
            index_in_surah: self.number_in_surah,
            surah_length: surah.number_of_ayahs,
            juz: self.juz,
        }
    }

    fn into_verse_with_own_surah(mut self) -> Result<Verse, ContentError> {
        let surah = self
            .surah
            .take()
            .ok_or_else(|| ContentError::Malformed(format!("ayah {} has no surah", self.number)))?;
        Ok(self.into_verse(&surah))
    }
}

impl AlQuranClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> color_eyre::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ContentError> {
        let url = format!("{}/{}", self.base_url, path);
        match self.fetch(&url).await {
            Err(ContentError::Unavailable(reason)) => {
                warn!(%url, %reason, "content request failed, retrying once");
                self.fetch(&url).await
            }
            other => other,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, url: &str) -> Result<T, ContentError> {
        let started = std::time::Instant::now();
        let response = self
            .client
            .get(url)
            .header(USER_AGENT, APP_USER_AGENT)
            .send()
            .await
            .map_err(|e| ContentError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentError::Unavailable(format!("HTTP {status}")));
        }

        let envelope: Envelope = response
            .json()
            .await
            .map_err(|e| ContentError::Malformed(e.to_string()))?;

        if envelope.code != 200 {
            return Err(ContentError::Unavailable(format!(
                "api answered {} {}",
                envelope.code, envelope.status
            )));
        }

        debug!(%url, elapsed_ms = started.elapsed().as_millis() as u64, "content request finished");
        serde_json::from_value(envelope.data).map_err(|e| ContentError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ContentProvider for AlQuranClient {
    #[instrument(level = "debug", skip(self))]
    async fn verse(&self, id: u32) -> Result<Verse, ContentError> {
        if id == 0 || id > TOTAL_AYAHS {
            return Err(ContentError::UnknownVerse(id));
        }
        let ayah: ApiAyah = self.get(&format!("ayah/{id}/{TEXT_EDITION}")).await?;
        ayah.into_verse_with_own_surah()
    }

    #[instrument(level = "debug", skip(self))]
    async fn verses_in(&self, range: VerseRange) -> Result<Vec<Verse>, ContentError> {
        match range {
            VerseRange::Juz(juz) => {
                let data: ApiJuz = self.get(&format!("juz/{juz}/{TEXT_EDITION}")).await?;
                data.ayahs
                    .into_iter()
                    .map(ApiAyah::into_verse_with_own_surah)
                    .collect()
            }
            VerseRange::Surah(surah) => {
                let data: ApiSurahWithAyahs =
                    self.get(&format!("surah/{surah}/{TEXT_EDITION}")).await?;
                let surah = data.surah;
                Ok(data
                    .ayahs
                    .into_iter()
                    .map(|ayah| ayah.into_verse(&surah))
                    .collect())
            }
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn verse_details(&self, id: u32, lang: Lang) -> Result<VerseDetails, ContentError> {
        let translation_edition = lang.translation_edition();
        let editions: Vec<ApiEditionAyah> = self
            .get(&format!("ayah/{id}/editions/{AUDIO_EDITION},{translation_edition}"))
            .await?;

        let mut details = VerseDetails::default();
        for item in editions {
            if item.edition.identifier == AUDIO_EDITION {
                details.audio = item.audio.filter(|a| !a.is_empty());
            } else if item.edition.identifier == translation_edition {
                details.translation = Some(item.text).filter(|t| !t.is_empty());
            }
        }
        Ok(details)
    }

    fn total_verses(&self) -> u32 {
        TOTAL_AYAHS
    }
}
