//! Clinical practice guideline catalog, matched on condition keywords.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use super::types::GuidelineBackend;
use super::RetrievalError;
use crate::models::{Evidence, EvidenceMetadata, SourceKind};

/// Relevance for a guideline hit on a single trigger keyword.
const SINGLE_MATCH_RELEVANCE: f64 = 0.85;
/// Relevance once two or more trigger keywords match.
const MULTI_MATCH_RELEVANCE: f64 = 0.95;

#[derive(Debug, Clone, PartialEq)]
pub struct GuidelineEntry {
    pub code: String,
    pub title: String,
    pub issuer: String,
    pub year: i32,
    pub url: String,
    pub summary: String,
    pub triggers: Vec<String>,
}

impl GuidelineEntry {
    fn matches(&self, keywords: &[String]) -> usize {
        self.triggers
            .iter()
            .filter(|t| keywords.iter().any(|k| k == *t))
            .count()
    }

    fn to_evidence(&self, relevance: f64) -> Evidence {
        Evidence::new(
            SourceKind::Guideline,
            format!("guideline:{}", self.code),
            format!("{} ({} {}): {}", self.title, self.issuer, self.year, self.summary),
            relevance,
        )
        .with_metadata(EvidenceMetadata {
            title: Some(self.title.clone()),
            publication_year: Some(self.year),
            guideline_code: Some(self.code.clone()),
            issuer: Some(self.issuer.clone()),
            url: Some(self.url.clone()),
            ..Default::default()
        })
    }
}

/// In-memory guideline catalog. Lookups are synchronous and deterministic.
#[derive(Debug, Clone)]
pub struct GuidelineCatalog {
    entries: Vec<GuidelineEntry>,
}

impl GuidelineCatalog {
    pub fn new(entries: Vec<GuidelineEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries matching any keyword, strongest match first, catalog order
    /// breaking ties.
    pub fn lookup(&self, keywords: &[String]) -> Vec<Evidence> {
        let mut hits: Vec<(usize, &GuidelineEntry)> = self
            .entries
            .iter()
            .map(|e| (e.matches(keywords), e))
            .filter(|(n, _)| *n > 0)
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0));

        hits.into_iter()
            .map(|(n, entry)| {
                let relevance = if n >= 2 {
                    MULTI_MATCH_RELEVANCE
                } else {
                    SINGLE_MATCH_RELEVANCE
                };
                entry.to_evidence(relevance)
            })
            .collect()
    }

    /// Catalog of common presentations seen in primary and emergency care.
    pub fn standard() -> Self {
        fn entry(
            code: &str,
            title: &str,
            issuer: &str,
            year: i32,
            url: &str,
            summary: &str,
            triggers: &[&str],
        ) -> GuidelineEntry {
            GuidelineEntry {
                code: code.into(),
                title: title.into(),
                issuer: issuer.into(),
                year,
                url: url.into(),
                summary: summary.into(),
                triggers: triggers.iter().map(|t| t.to_string()).collect(),
            }
        }

        Self::new(vec![
            entry(
                "cap-idsa-ats",
                "Community-Acquired Pneumonia in Adults",
                "IDSA/ATS",
                2019,
                "https://www.thoracic.org/statements/resources/mtpi/cap.pdf",
                "Diagnosis and empiric treatment of community-acquired pneumonia; chest radiograph to confirm, severity scoring to guide site of care.",
                &["cough", "fever", "sputum", "dyspnea", "breath", "pneumonia"],
            ),
            entry(
                "acs-acc-aha",
                "Acute Coronary Syndromes",
                "ACC/AHA",
                2025,
                "https://www.acc.org/guidelines",
                "Immediate ECG and serial high-sensitivity troponin for suspected ACS; risk stratification guides invasive strategy.",
                &["chest", "palpitations", "diaphoresis", "angina", "breath"],
            ),
            entry(
                "sepsis-ssc",
                "Surviving Sepsis Campaign: Management of Sepsis and Septic Shock",
                "SCCM/ESICM",
                2021,
                "https://www.sccm.org/survivingsepsiscampaign/guidelines",
                "Screen with qSOFA and lactate; cultures and broad-spectrum antibiotics within one hour when sepsis is likely.",
                &["fever", "hypotension", "confusion", "tachycardia", "rigors", "chills", "sepsis"],
            ),
            entry(
                "uti-idsa",
                "Uncomplicated Cystitis and Pyelonephritis in Women",
                "IDSA",
                2011,
                "https://www.idsociety.org/practice-guideline/uncomplicated-cystitis-and-pyelonephritis-uti-in-women/",
                "Urinalysis and culture when pyelonephritis is suspected; short-course first-line agents for cystitis.",
                &["dysuria", "urinary", "frequency", "urgency", "flank", "hematuria"],
            ),
            entry(
                "influenza-idsa",
                "Seasonal Influenza: Diagnosis and Treatment",
                "IDSA",
                2018,
                "https://www.idsociety.org/practice-guideline/influenza/",
                "Test with molecular assays during influenza season; start antivirals early in high-risk or hospitalised patients.",
                &["fever", "cough", "myalgia", "influenza", "flu", "chills", "sore", "throat"],
            ),
            entry(
                "pe-esc",
                "Acute Pulmonary Embolism",
                "ESC",
                2019,
                "https://www.escardio.org/Guidelines/Clinical-Practice-Guidelines/Acute-Pulmonary-Embolism-Diagnosis-and-Management-of",
                "Clinical probability scoring with D-dimer to rule out; CT pulmonary angiography to confirm.",
                &["dyspnea", "breath", "chest", "hemoptysis", "tachycardia", "leg", "swelling"],
            ),
            entry(
                "migraine-ahs",
                "Acute Treatment of Migraine",
                "AHS",
                2021,
                "https://americanheadachesociety.org/resources/guidelines",
                "Exclude red-flag secondary headache; triptans or NSAIDs for acute attacks.",
                &["headache", "photophobia", "aura", "migraine", "nausea"],
            ),
            entry(
                "appendicitis-wses",
                "Diagnosis and Treatment of Acute Appendicitis",
                "WSES",
                2020,
                "https://wjes.biomedcentral.com/articles/10.1186/s13017-020-00306-3",
                "Alvarado or AIR score for risk; ultrasound first, CT when equivocal; early surgical review.",
                &["abdominal", "abdomen", "rlq", "appendicitis", "vomiting", "anorexia"],
            ),
        ])
    }
}

impl GuidelineBackend for GuidelineCatalog {
    fn search<'a>(
        &'a self,
        condition_keywords: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Evidence>, RetrievalError>> {
        async move { Ok(self.lookup(condition_keywords)) }.boxed()
    }
}
