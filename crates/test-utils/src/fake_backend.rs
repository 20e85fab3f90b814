use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use runner_bridge::errors::Result;
use runner_bridge::exec::{InstallOutcome, InstallTarget, RunTarget, RunnerBackend};
use serde_json::Value;

type Reply = Arc<dyn Fn(&[u8]) -> Result<Value> + Send + Sync>;

/// A fake backend that:
/// - records every target and body it was asked to run
/// - answers with whatever its reply closure returns, without spawning
/// - records install targets and reports a clean install for each.
#[derive(Clone)]
pub struct FakeBackend {
    calls: Arc<Mutex<Vec<(RunTarget, Vec<u8>)>>>,
    installs: Arc<Mutex<Vec<InstallTarget>>>,
    reply: Reply,
}

impl FakeBackend {
    pub fn new(reply: impl Fn(&[u8]) -> Result<Value> + Send + Sync + 'static) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            installs: Arc::new(Mutex::new(Vec::new())),
            reply: Arc::new(reply),
        }
    }

    /// Parse the request body and hand it back, like a `cat` runner.
    pub fn echo() -> Self {
        Self::new(|body| Ok(serde_json::from_slice(body).expect("test body is JSON")))
    }

    pub fn calls(&self) -> Vec<(RunTarget, Vec<u8>)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn installs(&self) -> Vec<InstallTarget> {
        self.installs.lock().unwrap().clone()
    }
}

impl RunnerBackend for FakeBackend {
    fn invoke(
        &self,
        target: RunTarget,
        body: Vec<u8>,
    ) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + '_>> {
        let result = (self.reply)(&body);
        self.calls.lock().unwrap().push((target, body));
        Box::pin(async move { result })
    }

    fn install(
        &self,
        target: InstallTarget,
    ) -> Pin<Box<dyn Future<Output = Result<InstallOutcome>> + Send + '_>> {
        self.installs.lock().unwrap().push(target);
        Box::pin(async move {
            Ok(InstallOutcome {
                code: 0,
                log: String::new(),
                stderr: String::new(),
            })
        })
    }
}
