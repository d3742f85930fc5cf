//! Search text and keyword construction from a clinical query.

use super::types::SearchRequest;
use crate::models::ClinicalQuery;

/// Shortest token kept as a condition keyword.
const MIN_KEYWORD_LEN: usize = 3;

pub fn age_group(age_years: u32) -> &'static str {
    match age_years {
        0..=1 => "infant",
        2..=11 => "child",
        12..=17 => "adolescent",
        18..=64 => "adult",
        _ => "elderly",
    }
}

/// Complaint, symptom names, then age group and sex when known.
pub fn build_search_text(query: &ClinicalQuery) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(query.symptoms.len() + 3);
    parts.push(query.chief_complaint.trim());
    parts.extend(query.symptoms.iter().map(|s| s.name.trim()));

    if let Some(demographics) = &query.demographics {
        if let Some(age) = demographics.age_years {
            parts.push(age_group(age));
        }
        if let Some(sex) = demographics.sex {
            parts.push(sex.as_str());
        }
    }

    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercased alphanumeric tokens from complaint and symptom names,
/// deduplicated in first-seen order.
pub fn condition_keywords(query: &ClinicalQuery) -> Vec<String> {
    let sources = std::iter::once(query.chief_complaint.as_str())
        .chain(query.symptoms.iter().map(|s| s.name.as_str()));

    let mut keywords: Vec<String> = Vec::new();
    for text in sources {
        for token in text.split(|c: char| !c.is_alphanumeric()) {
            if token.chars().count() < MIN_KEYWORD_LEN {
                continue;
            }
            let token = token.to_lowercase();
            if !keywords.contains(&token) {
                keywords.push(token);
            }
        }
    }
    keywords
}

impl SearchRequest {
    pub fn from_query(query: &ClinicalQuery, max_results: usize, top_k: usize) -> Self {
        Self {
            text: build_search_text(query),
            condition_keywords: condition_keywords(query),
            max_results,
            top_k,
        }
    }
}
