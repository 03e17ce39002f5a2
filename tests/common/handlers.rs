//! Scan type handlers that record what the dispatcher asked of them.

use async_trait::async_trait;
use parking_lot::Mutex;
use scanner_core::orchestration::{HandlerError, ScanTypeRequest};
use scanner_core::{HandlerRegistry, ScanType, ScanTypeHandler};
use std::sync::Arc;
use std::time::Duration;

/// Start/finish events shared by every handler of one registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    Started(ScanType),
    Finished(ScanType),
}

#[derive(Debug, Clone, Default)]
pub struct CallLog {
    events: Arc<Mutex<Vec<CallEvent>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: CallEvent) {
        self.events.lock().push(event);
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.events.lock().clone()
    }

    /// Scan types in the order their handlers were entered
    pub fn started(&self) -> Vec<ScanType> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                CallEvent::Started(scan_type) => Some(*scan_type),
                CallEvent::Finished(_) => None,
            })
            .collect()
    }

    pub fn position(&self, event: CallEvent) -> Option<usize> {
        self.events.lock().iter().position(|e| *e == event)
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Succeed,
    Fail { tool: &'static str, message: &'static str },
}

/// Handler that logs its calls, optionally sleeps, then succeeds or fails
#[derive(Debug, Clone)]
pub struct ScriptedHandler {
    log: CallLog,
    delay: Duration,
    behavior: Behavior,
    requests: Arc<Mutex<Vec<ScanTypeRequest>>>,
}

impl ScriptedHandler {
    pub fn succeeding(log: &CallLog) -> Self {
        Self {
            log: log.clone(),
            delay: Duration::ZERO,
            behavior: Behavior::Succeed,
            requests: Arc::default(),
        }
    }

    pub fn failing(log: &CallLog, tool: &'static str, message: &'static str) -> Self {
        Self {
            behavior: Behavior::Fail { tool, message },
            ..Self::succeeding(log)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn requests(&self) -> Vec<ScanTypeRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ScanTypeHandler for ScriptedHandler {
    async fn execute(&self, request: ScanTypeRequest) -> Result<serde_json::Value, HandlerError> {
        let scan_type = request.scan_type;
        self.log.push(CallEvent::Started(scan_type));
        self.requests.lock().push(request.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.log.push(CallEvent::Finished(scan_type));

        match &self.behavior {
            Behavior::Succeed => Ok(serde_json::json!({
                "scan_type": scan_type.as_str(),
                "tools": request.tools.keys().collect::<Vec<_>>(),
            })),
            Behavior::Fail { tool, message } => Err(HandlerError::for_tool(*tool, *message)),
        }
    }
}

/// Registry with a succeeding handler for every scan type
pub fn succeeding_registry(log: &CallLog) -> HandlerRegistry {
    ScanType::ALL
        .into_iter()
        .fold(HandlerRegistry::new(), |registry, scan_type| {
            registry.with_handler(scan_type, ScriptedHandler::succeeding(log))
        })
}
