//! PubMed literature adapter over the NCBI E-utilities JSON API.
//!
//! Two round trips: `esearch` for ranked PMIDs restricted to reviews,
//! meta-analyses and trials, then `esummary` for titles and journals.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;

use super::types::LiteratureBackend;
use super::RetrievalError;
use crate::models::{Evidence, EvidenceMetadata, SourceKind};

/// Publication types admitted from PubMed.
const PUBLICATION_TYPE_FILTER: &str =
    "(systematic review[pt] OR meta-analysis[pt] OR clinical trial[pt])";

/// Relevance of the top-ranked article; later ranks decay from here.
const TOP_RANK_RELEVANCE: f64 = 0.9;
const RANK_DECAY: f64 = 0.05;
const RANK_RELEVANCE_FLOOR: f64 = 0.5;

pub struct PubMedClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl PubMedClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RetrievalError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RetrievalError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    async fn get_json(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<Value, RetrievalError> {
        let url = format!("{}/{endpoint}", self.base_url);
        let mut request = self.client.get(&url).query(params);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api_key", key)]);
        }

        let response = request.send().await.map_err(map_transport_error)?;

        // Error bodies and request URLs can echo the search term, so only
        // the status and error kind leave this function.
        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Upstream {
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| RetrievalError::ResponseParsing(e.without_url().to_string()))
    }

    async fn search_articles(
        &self,
        text: &str,
        max_results: usize,
    ) -> Result<Vec<Evidence>, RetrievalError> {
        let term = format!("{text} AND {PUBLICATION_TYPE_FILTER}");
        let search = self
            .get_json(
                "esearch.fcgi",
                &[
                    ("db", "pubmed".into()),
                    ("term", term),
                    ("retmode", "json".into()),
                    ("retmax", max_results.to_string()),
                    ("sort", "relevance".into()),
                ],
            )
            .await?;

        let pmids = parse_esearch(&search)?;
        if pmids.is_empty() {
            return Ok(Vec::new());
        }

        let summary = self
            .get_json(
                "esummary.fcgi",
                &[
                    ("db", "pubmed".into()),
                    ("id", pmids.join(",")),
                    ("retmode", "json".into()),
                ],
            )
            .await?;

        Ok(parse_esummary(&summary, &pmids))
    }
}

impl LiteratureBackend for PubMedClient {
    fn search<'a>(
        &'a self,
        text: &'a str,
        max_results: usize,
    ) -> BoxFuture<'a, Result<Vec<Evidence>, RetrievalError>> {
        self.search_articles(text, max_results).boxed()
    }
}

fn map_transport_error(e: reqwest::Error) -> RetrievalError {
    if e.is_timeout() {
        RetrievalError::HttpClient("PubMed request timed out".into())
    } else if e.is_connect() {
        RetrievalError::HttpClient("PubMed is unreachable".into())
    } else {
        RetrievalError::HttpClient(e.without_url().to_string())
    }
}

/// Relevance assigned to the article at zero-based `rank`.
pub fn rank_relevance(rank: usize) -> f64 {
    (TOP_RANK_RELEVANCE - RANK_DECAY * rank as f64).max(RANK_RELEVANCE_FLOOR)
}

/// Stable evidence id for a PubMed article, shared with the vector corpus.
pub fn pubmed_evidence_id(pmid: &str) -> String {
    format!("pmid:{pmid}")
}

fn parse_esearch(body: &Value) -> Result<Vec<String>, RetrievalError> {
    let ids = body
        .get("esearchresult")
        .and_then(|r| r.get("idlist"))
        .and_then(Value::as_array)
        .ok_or_else(|| RetrievalError::ResponseParsing("esearch: missing idlist".into()))?;

    Ok(ids
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}

/// Build evidence in esearch rank order. PMIDs without a summary are skipped.
fn parse_esummary(body: &Value, pmids: &[String]) -> Vec<Evidence> {
    let Some(result) = body.get("result") else {
        return Vec::new();
    };

    pmids
        .iter()
        .enumerate()
        .filter_map(|(rank, pmid)| {
            let entry = result.get(pmid.as_str())?;
            let title = entry.get("title").and_then(Value::as_str)?.trim().to_string();
            if title.is_empty() {
                return None;
            }
            let journal = entry
                .get("fulljournalname")
                .or_else(|| entry.get("source"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let publication_year = entry
                .get("pubdate")
                .and_then(Value::as_str)
                .and_then(|d| d.get(..4))
                .and_then(|y| y.parse::<i32>().ok());

            let snippet = match &journal {
                Some(j) => format!("{title} ({j})"),
                None => title.clone(),
            };

            Some(
                Evidence::new(
                    SourceKind::Literature,
                    pubmed_evidence_id(pmid),
                    snippet,
                    rank_relevance(rank),
                )
                .with_metadata(EvidenceMetadata {
                    title: Some(title),
                    publication_year,
                    journal,
                    url: Some(format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/")),
                    ..Default::default()
                }),
            )
        })
        .collect()
}
