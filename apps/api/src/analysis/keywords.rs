//! Keyword extraction: turns a job description into a categorised keyword map.
//!
//! Algorithm:
//! 1. Lowercase, tokenize on word boundaries (≥ 3 word characters), drop stopwords.
//! 2. `general`: tokens seen at least twice.
//! 3. One category per labelled section found (skills, responsibilities, education,
//!    experience), holding every filtered token of the section body with its count.
//! 4. `specific-terms`: tokens longer than 7 characters missing from `general`, weight 1.
//! 5. `cv-terms`: résumé vocabulary present in the posting, weight 2.
//!
//! Output uses ordered maps only, so the same text always yields the same map.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analysis::sections::extract_section;
use crate::analysis::terms::{
    is_stopword, CV_IMPORTANT_TERMS, EDUCATION_MARKERS, EXPERIENCE_MARKERS,
    RESPONSIBILITIES_MARKERS, SKILLS_MARKERS,
};

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w{3,}\b").expect("word pattern is valid"));

const GENERAL_MIN_FREQUENCY: u32 = 2;
const SPECIFIC_TERM_MIN_CHARS: usize = 8;
const SPECIFIC_TERM_WEIGHT: u32 = 1;
const CV_TERM_WEIGHT: u32 = 2;

/// Named bucket inside a [`KeywordMap`]. Declaration order is serialisation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeywordCategory {
    General,
    Skills,
    Responsibilities,
    Education,
    Experience,
    SpecificTerms,
    CvTerms,
}

impl KeywordCategory {
    /// Section categories with the synonyms used to find them.
    pub const SECTIONS: [(KeywordCategory, &'static [&'static str]); 4] = [
        (KeywordCategory::Skills, SKILLS_MARKERS),
        (KeywordCategory::Responsibilities, RESPONSIBILITIES_MARKERS),
        (KeywordCategory::Education, EDUCATION_MARKERS),
        (KeywordCategory::Experience, EXPERIENCE_MARKERS),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            KeywordCategory::General => "general",
            KeywordCategory::Skills => "skills",
            KeywordCategory::Responsibilities => "responsibilities",
            KeywordCategory::Education => "education",
            KeywordCategory::Experience => "experience",
            KeywordCategory::SpecificTerms => "specific-terms",
            KeywordCategory::CvTerms => "cv-terms",
        }
    }
}

/// Category → (lowercase token → weight). A token may sit in several categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordMap(BTreeMap<KeywordCategory, BTreeMap<String, u32>>);

impl KeywordMap {
    pub fn insert(&mut self, category: KeywordCategory, words: BTreeMap<String, u32>) {
        self.0.insert(category, words);
    }

    pub fn categories(&self) -> impl Iterator<Item = (&KeywordCategory, &BTreeMap<String, u32>)> {
        self.0.iter()
    }

    /// Sum of entries across every category (duplicates counted per category).
    pub fn total_entries(&self) -> usize {
        self.0.values().map(BTreeMap::len).sum()
    }

    /// Union of every category's tokens, sorted lexicographically.
    pub fn flatten(&self) -> BTreeSet<String> {
        self.0
            .values()
            .flat_map(|words| words.keys().cloned())
            .collect()
    }
}

#[cfg(test)]
impl KeywordMap {
    pub fn get(&self, category: KeywordCategory) -> Option<&BTreeMap<String, u32>> {
        self.0.get(&category)
    }

    pub fn weight(&self, category: KeywordCategory, token: &str) -> Option<u32> {
        self.get(category).and_then(|words| words.get(token).copied())
    }
}

/// Lowercases, tokenizes and drops stopwords, keeping token order.
pub fn filtered_tokens(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|word| !is_stopword(word))
        .map(str::to_string)
        .collect()
}

fn count_tokens(tokens: &[String]) -> BTreeMap<String, u32> {
    let mut counts = BTreeMap::new();
    for token in tokens {
        *counts.entry(token.clone()).or_insert(0) += 1;
    }
    counts
}

/// Extracts the categorised keyword map of a job description.
pub fn extract_keywords(job_description: &str) -> KeywordMap {
    tracing::info!("Extracting keywords from job description");

    let text = job_description.to_lowercase();
    let tokens = filtered_tokens(&text);
    let counts = count_tokens(&tokens);

    let mut keywords = KeywordMap::default();

    let general: BTreeMap<String, u32> = counts
        .iter()
        .filter(|&(_, &count)| count >= GENERAL_MIN_FREQUENCY)
        .map(|(word, &count)| (word.clone(), count))
        .collect();

    for (category, markers) in KeywordCategory::SECTIONS {
        let body = extract_section(&text, markers);
        if !body.is_empty() {
            keywords.insert(category, count_tokens(&filtered_tokens(&body)));
        }
    }

    let specific: BTreeMap<String, u32> = tokens
        .iter()
        .filter(|word| word.chars().count() >= SPECIFIC_TERM_MIN_CHARS)
        .filter(|word| !general.contains_key(word.as_str()))
        .map(|word| (word.clone(), SPECIFIC_TERM_WEIGHT))
        .collect();

    let cv_terms: BTreeMap<String, u32> = CV_IMPORTANT_TERMS
        .iter()
        .filter(|term| counts.contains_key(**term))
        .map(|term| (term.to_string(), CV_TERM_WEIGHT))
        .collect();

    keywords.insert(KeywordCategory::General, general);
    keywords.insert(KeywordCategory::SpecificTerms, specific);
    keywords.insert(KeywordCategory::CvTerms, cv_terms);

    tracing::info!(
        "Keyword extraction finished: {} keywords found",
        keywords.total_entries()
    );
    keywords
}
