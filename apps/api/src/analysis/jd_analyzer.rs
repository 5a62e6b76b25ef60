//! JD Analyzer: structured summary of a job description: keywords plus
//! technical skills, required experience, education level and contract type.
//!
//! Each field comes from an independent regex search over the raw text; a field
//! that is not found is left empty rather than reported as an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analysis::keywords::{extract_keywords, KeywordMap};

static TECH_SKILLS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)compétences\s+techniques.*?:(.*?)(?:\n\n|\z)")
        .expect("technical skills pattern is valid")
});

static SKILL_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,;•]").expect("skill separator pattern is valid"));

static EXPERIENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(\d+)[+]?\s+ans?\s+d['’]expérience").expect("experience pattern is valid")
});

static EDUCATION_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(bac\s*[+]\s*\d+)",
        r"(?i)(master|licence|doctorat)",
        r"(?i)(diplôme\s+d['’]ingénieur)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("education pattern is valid"))
    .collect()
});

static CONTRACT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(cdi|cdd|stage|alternance|freelance|intérim)\b")
        .expect("contract pattern is valid")
});

/// Contract kinds recognised in French postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractType {
    #[serde(rename = "CDI")]
    Cdi,
    #[serde(rename = "CDD")]
    Cdd,
    #[serde(rename = "STAGE")]
    Stage,
    #[serde(rename = "ALTERNANCE")]
    Alternance,
    #[serde(rename = "FREELANCE")]
    Freelance,
    #[serde(rename = "INTÉRIM")]
    Interim,
}

impl ContractType {
    pub fn parse(word: &str) -> Option<Self> {
        match word.to_uppercase().as_str() {
            "CDI" => Some(Self::Cdi),
            "CDD" => Some(Self::Cdd),
            "STAGE" => Some(Self::Stage),
            "ALTERNANCE" => Some(Self::Alternance),
            "FREELANCE" => Some(Self::Freelance),
            "INTÉRIM" => Some(Self::Interim),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cdi => "CDI",
            Self::Cdd => "CDD",
            Self::Stage => "STAGE",
            Self::Alternance => "ALTERNANCE",
            Self::Freelance => "FREELANCE",
            Self::Interim => "INTÉRIM",
        }
    }
}

/// Full structured output of job description analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAnalysis {
    pub keywords: KeywordMap,
    pub technical_skills: Vec<String>,
    /// Leading digit group of "N ans d'expérience", as written.
    pub experience_years: Option<String>,
    pub education: Option<String>,
    pub contract_type: Option<ContractType>,
}

/// Analyzes a job description. Never fails; missing fields stay empty.
pub fn analyze_job_description(job_description: &str) -> JobAnalysis {
    tracing::info!("Analyzing job description");

    let analysis = JobAnalysis {
        keywords: extract_keywords(job_description),
        technical_skills: extract_technical_skills(job_description),
        experience_years: extract_experience_years(job_description),
        education: extract_education(job_description),
        contract_type: extract_contract_type(job_description),
    };

    tracing::info!(
        skills = analysis.technical_skills.len(),
        experience = ?analysis.experience_years,
        education = ?analysis.education,
        contract = analysis.contract_type.map(|c| c.as_str()),
        "Job description analysis finished"
    );
    analysis
}

fn extract_technical_skills(text: &str) -> Vec<String> {
    let Some(body) = TECH_SKILLS_RE.captures(text).and_then(|caps| caps.get(1)) else {
        return Vec::new();
    };
    SKILL_SEPARATOR_RE
        .split(body.as_str())
        .map(str::trim)
        .filter(|skill| !skill.is_empty())
        .map(str::to_string)
        .collect()
}

fn extract_experience_years(text: &str) -> Option<String> {
    EXPERIENCE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_education(text: &str) -> Option<String> {
    EDUCATION_RES.iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

fn extract_contract_type(text: &str) -> Option<ContractType> {
    CONTRACT_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| ContractType::parse(m.as_str()))
}
