//! Suspicious keyword scan over retrieved chunk text

use claimguard_common::models::RetrievedChunk;
use claimguard_common::ScoringSettings;

/// Case-insensitive substring scanner over a fixed vocabulary
#[derive(Debug, Clone)]
pub struct KeywordScanner {
    keywords: Vec<String>,
}

impl KeywordScanner {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    pub fn from_settings(settings: &ScoringSettings) -> Self {
        Self::new(&settings.suspicious_keywords)
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Number of vocabulary keywords contained in `text`
    ///
    /// A keyword counts once per text however often it repeats.
    pub fn count_in_text(&self, text: &str) -> usize {
        let lowered = text.to_lowercase();
        self.keywords
            .iter()
            .filter(|keyword| lowered.contains(keyword.as_str()))
            .count()
    }

    /// Total (chunk, keyword) containment pairs across `chunks`
    pub fn count_matches(&self, chunks: &[RetrievedChunk]) -> usize {
        chunks.iter().map(|c| self.count_in_text(&c.text)).sum()
    }
}

impl Default for KeywordScanner {
    fn default() -> Self {
        Self::from_settings(&ScoringSettings::default())
    }
}
