use shared::messages::StatusReport;
use crate::session::{Session, Subscription};

/// The `/info` channel: periodic telemetry pushed by the backend
#[derive(Clone)]
pub struct StatusChannel {
    session: Session,
}

impl StatusChannel {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Nothing flows on this channel until it is connected
    pub fn connect(&self) {
        self.session.connect();
    }

    pub fn on_report<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&StatusReport) + Send + Sync + 'static,
    {
        self.session.on_message(move |frame| {
            let Some(text) = frame.as_text() else {
                return;
            };
            match StatusReport::parse(text) {
                Ok(report) => handler(&report),
                Err(e) => tracing::debug!("Skipping unparseable status report: {}", e),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use shared::messages::SystemHealth;
    use crate::config::{QueueConfig, ReconnectConfig};
    use crate::session::SessionState;
    use crate::transport::testing::ScriptedConnector;

    #[tokio::test]
    async fn test_reports_are_parsed_and_garbage_skipped() {
        let connector = ScriptedConnector::default();
        let peer = connector.accept().await;
        let status = StatusChannel::new(Session::spawn(
            Arc::new(connector),
            &ReconnectConfig::default(),
            &QueueConfig::default(),
        ));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let _sub = status.on_report(move |report| {
            let _ = tx.send(report.clone());
        });

        status.connect();
        status.session().wait_for_state(SessionState::Open).await.unwrap();
        peer.push_text("garbage");
        peer.push_text(r#"{"CPU": 97, "Memory": 98, "Network": 1.5, "GPU": 40, "UP_TIME": 120}"#);

        let report = rx.recv().await.unwrap();
        assert_eq!(report.cpu, Some(97.0));
        assert_eq!(report.up_time, Some(120.0));
        assert_eq!(report.health(), SystemHealth::Critical);
        assert!(rx.try_recv().is_err());
    }
}
