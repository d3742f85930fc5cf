//! Scripted sources and providers shared by pipeline tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;

use super::audit::{AuditRecord, AuditSink};
use super::retrieval::{
    EvidenceAdapter, GuidelineBackend, LiteratureBackend, RetrievalError, VectorBackend,
};
use super::synthesis::{ProviderError, ReasoningProvider, StructuredPrompt};
use crate::models::{Evidence, SourceKind};

/// What a scripted source does when searched.
#[derive(Debug, Clone)]
pub enum Script {
    Return(Vec<Evidence>),
    Fail(String),
    /// Never resolves.
    Hang,
    Delay(Duration, Vec<Evidence>),
}

pub struct ScriptedSource {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn run(&self) -> BoxFuture<'_, Result<Vec<Evidence>, RetrievalError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        async move {
            match &self.script {
                Script::Return(evidence) => Ok(evidence.clone()),
                Script::Fail(reason) => Err(RetrievalError::HttpClient(reason.clone())),
                Script::Hang => futures_util::future::pending().await,
                Script::Delay(delay, evidence) => {
                    tokio::time::sleep(*delay).await;
                    Ok(evidence.clone())
                }
            }
        }
        .boxed()
    }
}

impl LiteratureBackend for ScriptedSource {
    fn search<'a>(
        &'a self,
        _text: &'a str,
        _max_results: usize,
    ) -> BoxFuture<'a, Result<Vec<Evidence>, RetrievalError>> {
        self.run()
    }
}

impl VectorBackend for ScriptedSource {
    fn search<'a>(
        &'a self,
        _embedding_query: &'a str,
        _k: usize,
    ) -> BoxFuture<'a, Result<Vec<Evidence>, RetrievalError>> {
        self.run()
    }
}

impl GuidelineBackend for ScriptedSource {
    fn search<'a>(
        &'a self,
        _condition_keywords: &'a [String],
    ) -> BoxFuture<'a, Result<Vec<Evidence>, RetrievalError>> {
        self.run()
    }
}

/// Adapter of `kind` backed by `script`, plus a handle to count calls.
pub fn scripted_adapter(kind: SourceKind, script: Script) -> (EvidenceAdapter, Arc<ScriptedSource>) {
    let source = Arc::new(ScriptedSource {
        script,
        calls: AtomicUsize::new(0),
    });
    let adapter = match kind {
        SourceKind::Literature => EvidenceAdapter::Literature(source.clone()),
        SourceKind::Vector => EvidenceAdapter::Vector(source.clone()),
        SourceKind::Guideline => EvidenceAdapter::Guideline(source.clone()),
    };
    (adapter, source)
}

/// Reply of a scripted provider for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Error(ProviderError),
    /// Never resolves; flags the provider as dropped when cancelled.
    Hang,
}

/// Provider answering from a queue; the last reply repeats once drained.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    last: Mutex<Option<Reply>>,
    prompts: Mutex<Vec<StructuredPrompt>>,
    dropped: Arc<AtomicBool>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            prompts: Mutex::new(Vec::new()),
            dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| Reply::Text(t.into())).collect())
    }

    pub fn prompts(&self) -> Vec<StructuredPrompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn was_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }

    fn next_reply(&self) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        let mut last = self.last.lock().unwrap();
        match replies.pop_front() {
            Some(reply) => {
                *last = Some(reply.clone());
                reply
            }
            None => last.clone().unwrap_or_else(|| {
                Reply::Error(ProviderError::HttpClient("no reply scripted".into()))
            }),
        }
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

impl ReasoningProvider for ScriptedProvider {
    fn complete<'a>(
        &'a self,
        prompt: &'a StructuredPrompt,
        _schema: &'a Value,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let reply = self.next_reply();
        let dropped = self.dropped.clone();
        async move {
            match reply {
                Reply::Text(text) => Ok(text),
                Reply::Error(e) => Err(e),
                Reply::Hang => {
                    let _flag = DropFlag(dropped);
                    futures_util::future::pending().await
                }
            }
        }
        .boxed()
    }
}

/// Audit sink that keeps every record in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAuditSink {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn emit(&self, record: AuditRecord) {
        self.records.lock().unwrap().push(record);
    }
}
