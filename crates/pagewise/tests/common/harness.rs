//! Scripted inference client and a service harness around it.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;

use pagewise::config::Config;
use pagewise::error::InferenceError;
use pagewise::{
    AnalysisKind, AnalysisService, ChunkPayload, Finding, InMemoryOwnerStore, InferenceClient,
    InferenceOutput, JobId, OwnerId, OwnerStore, SubmitRequest, SyntheticUsageRecorder,
};

/// What the client does for one call.
#[derive(Clone)]
pub enum Reply {
    Findings(Vec<Finding>),
    RateLimited,
    Fatal(String),
    Panic,
    /// Waits for the gate to open, then returns no findings.
    Gate(Arc<Notify>),
}

/// One observed call.
#[derive(Debug, Clone)]
pub struct Call {
    pub kind: AnalysisKind,
    pub model: String,
    pub text: String,
    pub at: Instant,
}

/// Replays scripted replies in order. Unscripted calls return one finding
/// named after the call number.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, reply: Reply) {
        self.script.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    async fn call(
        &self,
        kind: AnalysisKind,
        payload: &ChunkPayload,
        model: &str,
    ) -> Result<InferenceOutput, InferenceError> {
        let text = match payload {
            ChunkPayload::Text(text) => text.clone(),
            ChunkPayload::Image(image) => format!("<image page {}>", image.page),
        };
        let number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call {
                kind,
                model: model.to_string(),
                text,
                at: Instant::now(),
            });
            calls.len()
        };

        let reply = self.script.lock().unwrap().pop_front();
        match reply {
            None => Ok(InferenceOutput::new(vec![super::finding(
                kind,
                &format!("call-{}", number),
            )])),
            Some(Reply::Findings(findings)) => Ok(InferenceOutput::new(findings)),
            Some(Reply::RateLimited) => Err(InferenceError::from_status(
                429,
                Some("RESOURCE_EXHAUSTED"),
                "Quota exceeded".to_string(),
            )),
            Some(Reply::Fatal(message)) => Err(InferenceError::Api {
                status: 500,
                message,
            }),
            Some(Reply::Panic) => panic!("scripted panic"),
            Some(Reply::Gate(gate)) => {
                gate.notified().await;
                Ok(InferenceOutput::default())
            }
        }
    }
}

pub const OWNER: &str = "alice";

pub struct TestHarness {
    pub service: AnalysisService,
    pub client: Arc<ScriptedClient>,
    pub owners: Arc<dyn OwnerStore>,
}

impl TestHarness {
    pub fn new(config: Config, client: ScriptedClient) -> Self {
        Self::with_owner_store(config, client, Arc::new(InMemoryOwnerStore::new()))
    }

    pub fn with_owner_store(
        config: Config,
        client: ScriptedClient,
        owners: Arc<dyn OwnerStore>,
    ) -> Self {
        let client = Arc::new(client);
        let usage = Arc::new(SyntheticUsageRecorder::new(Arc::clone(&owners)));
        let service = AnalysisService::new(config, client.clone(), Arc::clone(&owners), usage);
        Self {
            service,
            client,
            owners,
        }
    }

    pub fn owner(&self) -> OwnerId {
        OwnerId::from(OWNER)
    }

    pub fn submit(&self, kind: AnalysisKind, name: &str, bytes: Vec<u8>) -> JobId {
        self.service
            .submit(SubmitRequest::new(self.owner(), kind, name, bytes))
            .unwrap()
    }
}
