//! Static word tables used by keyword extraction.
//!
//! Job postings are expected in French, so both tables are French.

/// Function words dropped before counting.
pub const STOPWORDS: &[&str] = &[
    "le", "la", "les", "un", "une", "des", "et", "ou", "de", "du", "au", "aux", "ce", "cette",
    "ces", "mon", "ton", "son", "notre", "votre", "leur", "pour", "par", "sur", "sous", "dans",
    "avec", "sans", "en", "à", "qui", "que", "quoi", "dont", "où", "comment", "pourquoi",
    "quand", "est", "sont", "sera", "seront", "été", "avoir", "être", "faire", "plus", "moins",
    "très", "si", "tout", "tous", "toute", "toutes", "autre", "autres", "même", "aussi",
    "alors", "donc", "car", "mais", "ni", "ne", "pas",
];

/// Résumé vocabulary that always earns a fixed boost when present in a posting.
///
/// Multi-word entries never match a single token; they are kept so the list
/// reads the way recruiters write it.
pub const CV_IMPORTANT_TERMS: &[&str] = &[
    "expérience",
    "compétence",
    "formation",
    "diplôme",
    "certification",
    "projet",
    "responsabilité",
    "gestion",
    "développement",
    "analyse",
    "conception",
    "mise en œuvre",
    "coordination",
    "direction",
    "management",
    "leadership",
    "stratégie",
    "objectif",
    "résultat",
    "performance",
];

/// Synonyms locating the skills block, tried in order.
pub const SKILLS_MARKERS: &[&str] = &["compétences", "qualifications", "profil", "requis"];

/// Synonyms locating the responsibilities block.
pub const RESPONSIBILITIES_MARKERS: &[&str] = &["responsabilités", "missions", "tâches", "rôle"];

/// Synonyms locating the education block.
pub const EDUCATION_MARKERS: &[&str] = &["formation", "diplôme", "études", "éducation"];

/// Synonyms locating the experience block.
pub const EXPERIENCE_MARKERS: &[&str] = &["expérience", "parcours", "antécédents"];

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(&word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_function_words_are_stopwords() {
        for word in ["les", "avec", "pour", "dans", "être"] {
            assert!(is_stopword(word), "{word} should be a stopword");
        }
    }

    #[test]
    fn test_domain_words_are_not_stopwords() {
        assert!(!is_stopword("python"));
        assert!(!is_stopword("expérience"));
    }

    #[test]
    fn test_cv_terms_are_lowercase() {
        for term in CV_IMPORTANT_TERMS {
            assert_eq!(*term, term.to_lowercase());
        }
    }
}
