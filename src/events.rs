//! Typed cross-component events and the background worker that reacts to
//! them.
//!
//! Publishers never wait on the worker. A caller that does want the result
//! uses [`EventBus::request`] and awaits the returned receiver, with its own
//! timeout.

use crate::error::Error;
use crate::gateway::{BulkReport, Gateway};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

pub const WORKER_ACTOR: &str = "auto-translate";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DashboardEvent {
    /// A language was added (or reactivated) in a project with auto-translate on.
    LanguageAdded { project_id: String, code: String },
    /// A key's base text changed and its derived translations should follow.
    BaseTextChanged { key_id: String },
}

pub type Completion = std::result::Result<BulkReport, String>;

struct Envelope {
    event: DashboardEvent,
    reply: Option<oneshot::Sender<Completion>>,
}

#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<Envelope>,
}

pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

pub fn channel() -> (EventBus, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventBus { tx }, EventReceiver { rx })
}

impl EventBus {
    /// Fire and forget. Returns false when no worker is listening.
    pub fn publish(&self, event: DashboardEvent) -> bool {
        debug!("Publishing {:?}", event);
        self.tx.send(Envelope { event, reply: None }).is_ok()
    }

    /// Publish and get a receiver that resolves once the worker handled it.
    pub fn request(&self, event: DashboardEvent) -> oneshot::Receiver<Completion> {
        let (reply, rx) = oneshot::channel();
        if let Err(mpsc::error::SendError(envelope)) = self.tx.send(Envelope {
            event,
            reply: Some(reply),
        }) {
            warn!("No auto-translate worker for {:?}", envelope.event);
            if let Some(reply) = envelope.reply {
                let _ = reply.send(Err("auto-translate worker is not running".to_string()));
            }
        }
        rx
    }
}

impl EventReceiver {
    /// Next queued event without waiting. Any reply channel is dropped.
    pub fn try_next(&mut self) -> Option<DashboardEvent> {
        self.rx.try_recv().ok().map(|envelope| envelope.event)
    }
}

pub struct AutoTranslateWorker {
    gateway: Gateway,
    events: EventReceiver,
}

impl AutoTranslateWorker {
    pub fn new(gateway: Gateway, events: EventReceiver) -> Self {
        Self { gateway, events }
    }

    async fn handle(&self, event: &DashboardEvent) -> Completion {
        let result = match event {
            DashboardEvent::LanguageAdded { project_id, code } => {
                self.gateway
                    .translate_language(project_id, code, WORKER_ACTOR)
                    .await
            }
            DashboardEvent::BaseTextChanged { key_id } => {
                self.gateway.translate_key(key_id, None, WORKER_ACTOR).await
            }
        };
        result.map_err(|e: Error| e.to_string())
    }

    /// Process events one at a time until every [`EventBus`] is dropped.
    pub async fn run(mut self) {
        info!("Auto-translate worker started");
        while let Some(Envelope { event, reply }) = self.events.rx.recv().await {
            let outcome = self.handle(&event).await;
            match &outcome {
                Ok(report) => info!(
                    "Handled {:?}: {} ok, {} failed, {} skipped",
                    event, report.succeeded, report.failed, report.skipped
                ),
                Err(e) => error!("Auto-translate for {:?} failed: {}", event, e),
            }
            if let Some(reply) = reply {
                let _ = reply.send(outcome);
            }
        }
        info!("Auto-translate worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyStore, NewKey};
    use crate::model::{new_id, Language, Project};
    use crate::retry::RetryConfig;
    use crate::store::memory::InMemoryStore;
    use crate::store::SharedStore;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::{matchers::method, Mock, MockServer, ResponseTemplate};

    async fn seeded_store() -> SharedStore {
        let store: SharedStore = Arc::new(InMemoryStore::new());
        store
            .upsert_project(Project {
                id: "p1".to_string(),
                name: "Demo".to_string(),
                translate_api_key: Some("k".to_string()),
                auto_translate: true,
                created_at: Utc::now(),
            })
            .await
            .expect("project");
        for (code, is_base) in [("en", true), ("fr", false)] {
            store
                .insert_language(Language {
                    id: new_id(),
                    project_id: "p1".to_string(),
                    code: code.to_string(),
                    name: code.to_string(),
                    is_base,
                    is_active: true,
                    created_at: Utc::now(),
                })
                .await
                .expect("language");
        }
        store
    }

    #[tokio::test]
    async fn test_worker_stops_when_bus_dropped() {
        let server = MockServer::start().await;
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let (bus, rx) = channel();
        let worker = AutoTranslateWorker::new(Gateway::new(reqwest::Client::new(), server.uri(), store), rx);
        let handle = tokio::spawn(worker.run());

        drop(bus);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should stop")
            .expect("join");
    }

    #[tokio::test]
    async fn test_language_added_fills_existing_keys() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": { "translations": [ { "translatedText": "Bonjour" } ] }
            })))
            .mount(&server)
            .await;

        let store = seeded_store().await;
        let keys = KeyStore::new(store.clone());
        let key = keys
            .create(
                NewKey {
                    project_id: "p1".to_string(),
                    key: "greeting".to_string(),
                    base_text: "Hello".to_string(),
                    ..Default::default()
                },
                "alice",
            )
            .await
            .expect("create");

        let gateway = Gateway::new(reqwest::Client::new(), server.uri(), store)
            .with_retry(RetryConfig::once());
        let (bus, rx) = channel();
        tokio::spawn(AutoTranslateWorker::new(gateway, rx).run());

        let done = bus.request(DashboardEvent::LanguageAdded {
            project_id: "p1".to_string(),
            code: "fr".to_string(),
        });
        let report = done.await.expect("reply").expect("report");
        assert_eq!(report.succeeded, 1);

        // A duplicate dispatch finds nothing left to do.
        let again = bus
            .request(DashboardEvent::LanguageAdded {
                project_id: "p1".to_string(),
                code: "fr".to_string(),
            })
            .await
            .expect("reply")
            .expect("report");
        assert_eq!(again.succeeded, 0);
        assert_eq!(again.skipped, 1);

        let view = keys.get(&key.id).await.expect("get");
        assert_eq!(view.translations["fr"], "Bonjour");
    }

    #[tokio::test]
    async fn test_request_without_worker_resolves_with_error() {
        let (bus, rx) = channel();
        drop(rx);
        let reply = bus
            .request(DashboardEvent::BaseTextChanged {
                key_id: "k".to_string(),
            })
            .await
            .expect("reply");
        assert!(reply.is_err());
        assert!(!bus.publish(DashboardEvent::BaseTextChanged {
            key_id: "k".to_string()
        }));
    }
}
