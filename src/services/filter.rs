use std::collections::BTreeSet;

use crate::content::{Verse, VerseRange, JUZ_COUNT, SURAH_COUNT};

/// Juz / surah restriction on which verses a question may start from.
/// An empty set means "no restriction" on that axis.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VerseFilter {
    pub juz: BTreeSet<u8>,
    pub surahs: BTreeSet<u16>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("invalid juz '{0}', must be between 1 and 30")]
    InvalidJuz(String),
    #[error("invalid surah '{0}', must be between 1 and 114")]
    InvalidSurah(String),
}

impl VerseFilter {
    /// Parses `juz=1,5` and `surah=2,10-12` style query values.
    pub fn parse(juz: Option<&str>, surah: Option<&str>) -> Result<Self, FilterError> {
        let mut filter = VerseFilter::default();

        for token in tokens(juz) {
            let n = token
                .parse::<u8>()
                .ok()
                .filter(|n| (1..=JUZ_COUNT).contains(n))
                .ok_or_else(|| FilterError::InvalidJuz(token.to_string()))?;
            filter.juz.insert(n);
        }

        for token in tokens(surah) {
            let invalid = || FilterError::InvalidSurah(token.to_string());
            let (start, end) = match token.split_once('-') {
                Some((a, b)) => (parse_surah(a).ok_or_else(invalid)?, parse_surah(b).ok_or_else(invalid)?),
                None => {
                    let n = parse_surah(token).ok_or_else(invalid)?;
                    (n, n)
                }
            };
            if start > end {
                return Err(invalid());
            }
            filter.surahs.extend(start..=end);
        }

        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.juz.is_empty() && self.surahs.is_empty()
    }

    /// The provider ranges whose union covers every verse this filter can
    /// match. Juz win when both axes are set; surahs then narrow the result.
    pub fn ranges(&self) -> Vec<VerseRange> {
        if !self.juz.is_empty() {
            self.juz.iter().copied().map(VerseRange::Juz).collect()
        } else {
            self.surahs.iter().copied().map(VerseRange::Surah).collect()
        }
    }

    pub fn matches(&self, verse: &Verse) -> bool {
        (self.juz.is_empty() || self.juz.contains(&verse.juz))
            && (self.surahs.is_empty() || self.surahs.contains(&verse.surah_id))
    }
}

fn tokens(value: Option<&str>) -> impl Iterator<Item = &str> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_surah(value: &str) -> Option<u16> {
    value
        .trim()
        .parse::<u16>()
        .ok()
        .filter(|n| (1..=SURAH_COUNT).contains(n))
}
