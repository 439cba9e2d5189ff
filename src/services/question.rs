use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument, warn};

use super::filter::VerseFilter;
use crate::content::{ContentError, ContentProvider, Verse};

pub const OPTION_COUNT: usize = 4;
const MAX_DISTRACTOR_ATTEMPTS: usize = 50;
const MAX_START_ATTEMPTS: usize = 50;

/// A question before it is split into the public payload and the ledger row.
#[derive(Clone, Debug)]
pub struct GeneratedQuestion {
    pub current: Verse,
    /// Shuffled; exactly [`OPTION_COUNT`] entries, one of them the correct one.
    pub options: Vec<Verse>,
    pub correct_ayah_id: u32,
    /// True when the filter matched no usable start verse and an unfiltered
    /// pick was used instead.
    pub fell_back: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error("only {found} of {OPTION_COUNT} options could be assembled")]
    InsufficientOptions { found: usize },
    #[error("no verse with a following verse was found")]
    NoStartingVerse,
}

#[derive(Clone)]
pub struct QuestionGenerator {
    content: Arc<dyn ContentProvider>,
}

impl QuestionGenerator {
    pub fn new(content: Arc<dyn ContentProvider>) -> Self {
        Self { content }
    }

    pub async fn generate(&self, filter: &VerseFilter) -> Result<GeneratedQuestion, GenerateError> {
        let mut rng = StdRng::from_entropy();
        self.generate_with(filter, &mut rng).await
    }

    #[instrument(level = "debug", skip(self, rng))]
    pub async fn generate_with(
        &self,
        filter: &VerseFilter,
        rng: &mut StdRng,
    ) -> Result<GeneratedQuestion, GenerateError> {
        let total = self.content.total_verses();
        let pool = self.load_pool(filter).await?;

        let starts: Vec<&Verse> = pool.iter().filter(|v| has_next(v, total)).collect();
        let (current, fell_back) = match starts.choose(rng) {
            Some(verse) => ((*verse).clone(), false),
            None => {
                if !filter.is_empty() {
                    warn!(?filter, pool = pool.len(), "filter matched no start verse, picking unfiltered");
                }
                (self.random_start(rng, total).await?, !filter.is_empty())
            }
        };

        let correct = self.content.verse(current.id + 1).await?;

        let mut used: HashSet<u32> = HashSet::from([current.id, correct.id]);
        let mut options = vec![correct.clone()];

        // Same-pool distractors first, then uniform draws over the corpus
        let mut pool_order: Vec<&Verse> = pool.iter().collect();
        pool_order.shuffle(rng);
        let mut pool_order = pool_order.into_iter();

        let mut attempts = 0;
        while options.len() < OPTION_COUNT && attempts < MAX_DISTRACTOR_ATTEMPTS {
            attempts += 1;

            let candidate = match pool_order.next() {
                Some(verse) => verse.clone(),
                None => {
                    let id = rng.gen_range(1..=total);
                    if used.contains(&id) {
                        continue;
                    }
                    self.content.verse(id).await?
                }
            };

            if used.contains(&candidate.id) || candidate.text == correct.text {
                continue;
            }

            used.insert(candidate.id);
            options.push(candidate);
        }

        if options.len() < OPTION_COUNT {
            return Err(GenerateError::InsufficientOptions {
                found: options.len(),
            });
        }

        options.shuffle(rng);

        debug!(current = current.id, attempts, fell_back, "question generated");
        Ok(GeneratedQuestion {
            current,
            options,
            correct_ayah_id: correct.id,
            fell_back,
        })
    }

    async fn load_pool(&self, filter: &VerseFilter) -> Result<Vec<Verse>, ContentError> {
        let mut pool = Vec::new();
        for range in filter.ranges() {
            let verses = self.content.verses_in(range).await?;
            pool.extend(verses.into_iter().filter(|v| filter.matches(v)));
        }
        Ok(pool)
    }

    async fn random_start(&self, rng: &mut StdRng, total: u32) -> Result<Verse, GenerateError> {
        if total < 2 {
            return Err(GenerateError::NoStartingVerse);
        }
        for _ in 0..MAX_START_ATTEMPTS {
            // The corpus's final verse is excluded by the range itself
            let verse = self.content.verse(rng.gen_range(1..total)).await?;
            if has_next(&verse, total) {
                return Ok(verse);
            }
        }
        Err(GenerateError::NoStartingVerse)
    }
}

/// A verse can start a question only if the verse after it belongs to the
/// same surah.
fn has_next(verse: &Verse, total: u32) -> bool {
    verse.id < total && !verse.is_last_in_surah()
}
