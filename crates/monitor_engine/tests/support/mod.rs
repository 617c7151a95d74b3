#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use futures_util::StreamExt;
use monitor_core::{CrawlConfig, ExtractedRecord, FlowRecord, PageRecord};
use monitor_engine::{
    ChannelError, ControlApi, ControlError, ControlFailure, CrawlSessionSnapshot, DownloadedFile,
    EventSource, ExportRequest, ExportedFiles, FrameStream, SessionId,
};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};

pub type FrameSender = mpsc::UnboundedSender<Result<String, ChannelError>>;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(monitor_logging::initialize_for_tests);
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

pub fn frame(kind: &str, data: serde_json::Value) -> Result<String, ChannelError> {
    Ok(json!({"type": kind, "sessionId": 1, "data": data}).to_string())
}

enum Script {
    Stream(mpsc::UnboundedReceiver<Result<String, ChannelError>>),
    Fail(ChannelError),
}

/// Event source replaying queued subscriptions. With nothing queued, `subscribe` never resolves.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<VecDeque<Script>>,
    subscriptions: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_stream(&self) -> FrameSender {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts.lock().unwrap().push_back(Script::Stream(rx));
        tx
    }

    pub fn push_failure(&self, err: ChannelError) {
        self.scripts.lock().unwrap().push_back(Script::Fail(err));
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl EventSource for ScriptedSource {
    async fn subscribe(&self, _session_id: &SessionId) -> Result<FrameStream, ChannelError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let next = self.scripts.lock().unwrap().pop_front();
        match next {
            Some(Script::Stream(rx)) => Ok(futures_util::stream::unfold(rx, |mut rx| async move {
                let item = rx.recv().await?;
                Some((item, rx))
            })
            .boxed()),
            Some(Script::Fail(err)) => Err(err),
            None => std::future::pending().await,
        }
    }
}

/// In-memory crawler. Calls can be held open or made to fail by name.
#[derive(Default)]
pub struct FakeControl {
    next_session: Mutex<u64>,
    calls: Mutex<Vec<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
    gates: Mutex<HashMap<&'static str, oneshot::Receiver<()>>>,
    pub pages: Mutex<Vec<PageRecord>>,
    pub flows: Mutex<Vec<FlowRecord>>,
    pub extracted: Mutex<Vec<ExtractedRecord>>,
}

impl FakeControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Holds the next call to `name` until the returned sender fires or is dropped.
    pub fn hold(&self, name: &'static str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().unwrap().insert(name, rx);
        tx
    }

    pub fn fail(&self, name: &'static str) {
        self.failing.lock().unwrap().insert(name);
    }

    pub fn calls_to(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| **call == name)
            .count()
    }

    async fn call(&self, name: &'static str) -> Result<(), ControlError> {
        self.calls.lock().unwrap().push(name);
        let gate = self.gates.lock().unwrap().remove(name);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if self.failing.lock().unwrap().contains(name) {
            return Err(ControlError {
                kind: ControlFailure::HttpStatus(500),
                message: format!("{name} rejected"),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ControlApi for FakeControl {
    async fn start(&self, _config: &CrawlConfig) -> Result<CrawlSessionSnapshot, ControlError> {
        self.call("start").await?;
        let id = {
            let mut next = self.next_session.lock().unwrap();
            *next += 1;
            *next
        };
        Ok(CrawlSessionSnapshot {
            session_id: Some(SessionId::new(id.to_string())),
            status: Some("RUNNING".to_string()),
            ..CrawlSessionSnapshot::default()
        })
    }

    async fn pause(&self, _session_id: &SessionId) -> Result<(), ControlError> {
        self.call("pause").await
    }

    async fn resume(&self, _session_id: &SessionId) -> Result<(), ControlError> {
        self.call("resume").await
    }

    async fn stop(&self, _session_id: &SessionId) -> Result<(), ControlError> {
        self.call("stop").await
    }

    async fn status(&self, session_id: &SessionId) -> Result<CrawlSessionSnapshot, ControlError> {
        self.call("status").await?;
        Ok(CrawlSessionSnapshot {
            session_id: Some(session_id.clone()),
            status: Some("RUNNING".to_string()),
            total_pages: Some(self.pages.lock().unwrap().len() as u64),
            ..CrawlSessionSnapshot::default()
        })
    }

    async fn pages(&self, _session_id: &SessionId) -> Result<Vec<PageRecord>, ControlError> {
        self.call("pages").await?;
        Ok(self.pages.lock().unwrap().clone())
    }

    async fn flows(&self, _session_id: &SessionId) -> Result<Vec<FlowRecord>, ControlError> {
        self.call("flows").await?;
        Ok(self.flows.lock().unwrap().clone())
    }

    async fn extracted_data(
        &self,
        _session_id: &SessionId,
    ) -> Result<Vec<ExtractedRecord>, ControlError> {
        self.call("extracted").await?;
        Ok(self.extracted.lock().unwrap().clone())
    }

    async fn downloads(&self, _session_id: &SessionId) -> Result<Vec<DownloadedFile>, ControlError> {
        self.call("downloads").await?;
        Ok(Vec::new())
    }

    async fn export(
        &self,
        session_id: &SessionId,
        request: &ExportRequest,
    ) -> Result<ExportedFiles, ControlError> {
        self.call("export").await?;
        Ok(request
            .formats
            .iter()
            .map(|format| {
                let name = format!("{format:?}").to_uppercase();
                let path = format!("/exports/{session_id}.{}", name.to_lowercase());
                (name, path)
            })
            .collect())
    }
}
