use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;
use shared::messages::{ControlInbound, ControlReply, ControlRequest};
use crate::error::SessionError;
use crate::session::{Session, Subscription};

/// Requests waiting for a reply, keyed by `request_id`
#[derive(Default)]
struct PendingRequests {
    inner: Mutex<HashMap<String, oneshot::Sender<ControlReply>>>,
}

impl PendingRequests {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, oneshot::Sender<ControlReply>>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, request_id: String) -> oneshot::Receiver<ControlReply> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(request_id, tx);
        rx
    }

    fn remove(&self, request_id: &str) {
        self.lock().remove(request_id);
    }

    /// Returns false if nobody was waiting for this reply
    fn complete(&self, reply: ControlReply) -> bool {
        let waiter = self.lock().remove(&reply.request_id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(reply);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// The `/communicate` channel: commands, transcribed text, and
/// request/reply exchanges such as face-model management.
pub struct ControlChannel {
    session: Session,
    pending: Arc<PendingRequests>,
    default_timeout: Duration,
    router: Option<Subscription>,
}

impl ControlChannel {
    pub fn new(session: Session, default_timeout: Duration) -> Self {
        let pending = Arc::new(PendingRequests::default());
        let waiting = pending.clone();
        let router = session.on_message(move |frame| {
            if let Some(text) = frame.as_text() {
                if let ControlInbound::Reply(reply) = ControlInbound::parse(text) {
                    let request_id = reply.request_id.clone();
                    if waiting.complete(reply) {
                        tracing::debug!("Reply for request {}", request_id);
                    }
                }
            }
        });

        Self {
            session,
            pending,
            default_timeout,
            router: Some(router),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn send_json<T: Serialize>(&self, message: &T) -> Result<(), SessionError> {
        let text = serde_json::to_string(message)?;
        self.session.send_text(text)
    }

    /// Plain text, e.g. a finished transcription
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), SessionError> {
        self.session.send_text(text)
    }

    pub async fn request(&self, request: ControlRequest) -> Result<ControlReply, SessionError> {
        self.request_with_timeout(request, self.default_timeout).await
    }

    /// Send `request` and wait for the reply carrying its `request_id`.
    /// An id of the form `{action}_{uuid}` is assigned when none is set.
    pub async fn request_with_timeout(
        &self,
        mut request: ControlRequest,
        timeout: Duration,
    ) -> Result<ControlReply, SessionError> {
        let request_id = match &request.request_id {
            Some(id) => id.clone(),
            None => {
                let prefix = request.action.as_deref().unwrap_or(&request.kind);
                let id = format!("{}_{}", prefix, Uuid::new_v4());
                request.request_id = Some(id.clone());
                id
            }
        };

        let reply_rx = self.pending.insert(request_id.clone());
        if let Err(e) = self.send_json(&request) {
            self.pending.remove(&request_id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => Err(SessionError::Closed),
            Err(_) => {
                self.pending.remove(&request_id);
                tracing::warn!("Request {} timed out after {}ms", request_id, timeout.as_millis());
                Err(SessionError::Timeout(request_id))
            }
        }
    }

    /// Every inbound message, classified. Replies are delivered here too.
    pub fn on_event<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ControlInbound) + Send + Sync + 'static,
    {
        self.session.on_message(move |frame| match frame.as_text() {
            Some(text) => handler(&ControlInbound::parse(text)),
            None => tracing::debug!("Ignoring {}-byte binary frame on control channel", frame.len()),
        })
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        if let Some(router) = self.router.take() {
            router.unsubscribe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use crate::config::{QueueConfig, ReconnectConfig};
    use crate::session::SessionState;
    use crate::transport::testing::{Peer, ScriptedConnector};
    use crate::transport::Frame;

    async fn channel(timeout: Duration) -> (ControlChannel, Peer) {
        let connector = ScriptedConnector::default();
        let peer = connector.accept().await;
        let session = Session::spawn(Arc::new(connector), &ReconnectConfig::default(), &QueueConfig::default());
        (ControlChannel::new(session, timeout), peer)
    }

    async fn next_json(peer: &mut Peer) -> Value {
        match peer.received.recv().await {
            Some(Frame::Text(text)) => serde_json::from_str(&text).unwrap(),
            other => panic!("expected a text frame, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_request_resolves_with_matching_reply() {
        let (control, mut peer) = channel(Duration::from_secs(10)).await;

        let server = tokio::spawn(async move {
            let request = next_json(&mut peer).await;
            let request_id = request["request_id"].as_str().unwrap().to_string();
            assert!(request_id.starts_with("load_models_"));
            assert_eq!(request["type"], "face_recognition");

            peer.push_text(r#"{"type":"noise","request_id":"someone_else"}"#);
            peer.push_text(&json!({
                "type": "face_recognition_response",
                "request_id": request_id,
                "success": true,
                "models": ["alice", "bob"],
            }).to_string());
            peer
        });

        let reply = control
            .request(ControlRequest::new("face_recognition").with_action("load_models"))
            .await
            .unwrap();
        assert_eq!(reply.success, Some(true));
        assert_eq!(reply.fields.get("models"), Some(&json!(["alice", "bob"])));
        assert_eq!(control.pending_requests(), 0);
        let _peer = server.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_times_out_and_forgets_entry() {
        let (control, _peer) = channel(Duration::from_secs(10)).await;

        let result = control
            .request(ControlRequest::new("face_recognition").with_request_id("fixed-id"))
            .await;
        match result {
            Err(SessionError::Timeout(id)) => assert_eq!(id, "fixed-id"),
            other => panic!("expected timeout, got {:?}", other),
        }
        assert_eq!(control.pending_requests(), 0);
    }

    #[tokio::test]
    async fn test_on_event_classifies_messages() {
        let (control, mut peer) = channel(Duration::from_secs(10)).await;
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = control.on_event(move |event| {
            let _ = tx.send(event.clone());
        });

        control.send_text("what time is it").unwrap();
        control.session().wait_for_state(SessionState::Open).await.unwrap();
        assert_eq!(peer.received.recv().await, Some(Frame::Text("what time is it".to_string())));

        peer.push_text("It is noon.");
        peer.push_text(r#"{"type":"status","state":"thinking"}"#);
        assert_eq!(rx.recv().await, Some(ControlInbound::Text("It is noon.".to_string())));
        assert_eq!(
            rx.recv().await,
            Some(ControlInbound::Event(json!({"type": "status", "state": "thinking"})))
        );
    }

    #[tokio::test]
    async fn test_request_after_close_fails_without_pending_entry() {
        let (control, _peer) = channel(Duration::from_secs(10)).await;
        control.session().close();
        let result = control.request(ControlRequest::new("ping")).await;
        assert!(matches!(result, Err(SessionError::Closed)));
        assert_eq!(control.pending_requests(), 0);
    }
}
