use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use shared::types::ServiceRecord;
use crate::directory::{hash, Directory};
pub use crate::mdns::browser::BrowserEvent;

/// Commands sent to the directory task
pub enum DirectoryCommand {
    Up(ServiceRecord, oneshot::Sender<bool>),
    Down(ServiceRecord, oneshot::Sender<bool>),
    Query(Option<String>, oneshot::Sender<Vec<ServiceRecord>>),
    Get(String, oneshot::Sender<Option<ServiceRecord>>),
    Shutdown,
}

/// Size and fingerprint of the directory, republished after every mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectorySummary {
    pub count: usize,
    pub hash: String,
}

impl DirectorySummary {
    fn of(directory: &Directory) -> Self {
        Self {
            count: directory.len(),
            hash: hash::compute_hash(directory.records()),
        }
    }
}

/// Handle to the task that owns the directory. All mutation goes through
/// this one task, so the map has a single writer.
#[derive(Clone)]
pub struct DirectoryHandle {
    tx: mpsc::Sender<DirectoryCommand>,
}

impl DirectoryHandle {
    /// Spawn the directory task. The returned receiver always holds the current summary.
    pub fn spawn(mut directory: Directory) -> (Self, watch::Receiver<DirectorySummary>) {
        let (tx, mut rx) = mpsc::channel::<DirectoryCommand>(256);
        let (summary_tx, summary_rx) = watch::channel(DirectorySummary::of(&directory));

        let publish = |directory: &Directory, summary_tx: &watch::Sender<DirectorySummary>| {
            summary_tx.send_replace(DirectorySummary::of(directory));
        };

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    DirectoryCommand::Up(record, reply) => {
                        let applied = directory.on_instance_up(record);
                        if applied {
                            publish(&directory, &summary_tx);
                        }
                        let _ = reply.send(applied);
                    }
                    DirectoryCommand::Down(record, reply) => {
                        let removed = directory.on_instance_down(&record);
                        if removed {
                            publish(&directory, &summary_tx);
                        }
                        let _ = reply.send(removed);
                    }
                    DirectoryCommand::Query(filter, reply) => {
                        let _ = reply.send(directory.query(filter.as_deref()));
                    }
                    DirectoryCommand::Get(id, reply) => {
                        let _ = reply.send(directory.get(&id).cloned());
                    }
                    DirectoryCommand::Shutdown => {
                        tracing::info!("Directory task shutting down");
                        break;
                    }
                }
            }
        });

        (Self { tx }, summary_rx)
    }

    /// Upsert a record. Returns false if it was ignored as malformed.
    pub async fn instance_up(&self, record: ServiceRecord) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(DirectoryCommand::Up(record, reply)).await?;
        Ok(rx.await?)
    }

    /// Remove a record. Returns true if it was present.
    pub async fn instance_down(&self, record: ServiceRecord) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(DirectoryCommand::Down(record, reply)).await?;
        Ok(rx.await?)
    }

    /// Records matching the filter (or the default filter)
    pub async fn query(&self, name_filter: Option<String>) -> Result<Vec<ServiceRecord>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(DirectoryCommand::Query(name_filter, reply)).await?;
        Ok(rx.await?)
    }

    /// A single record by id
    pub async fn get(&self, id: String) -> Result<Option<ServiceRecord>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(DirectoryCommand::Get(id, reply)).await?;
        Ok(rx.await?)
    }

    /// Stop the directory task
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(DirectoryCommand::Shutdown).await?;
        Ok(())
    }
}

/// Directory manager event loop - applies browser events to the directory
pub async fn run(
    directory: DirectoryHandle,
    mut rx: mpsc::Receiver<BrowserEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        tokio::select! {
            Some(event) = rx.recv() => {
                match event {
                    BrowserEvent::Up(record) => {
                        if let Err(e) = directory.instance_up(record).await {
                            tracing::error!("Failed to apply instance-up: {}", e);
                        }
                    }
                    BrowserEvent::Down(record) => {
                        if let Err(e) = directory.instance_down(record).await {
                            tracing::error!("Failed to apply instance-down: {}", e);
                        }
                    }
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Directory manager shutting down");
                break;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, port: u16) -> ServiceRecord {
        ServiceRecord::new(name, Some(format!("{}._http._tcp.local", name)), None, Some(port))
    }

    #[tokio::test]
    async fn test_summary_tracks_mutations() {
        let (handle, summary) = DirectoryHandle::spawn(Directory::new(None));
        let empty_hash = summary.borrow().hash.clone();
        assert_eq!(summary.borrow().count, 0);

        assert!(handle.instance_up(record("alpha", 8000)).await.unwrap());
        assert!(handle.instance_up(record("beta", 8000)).await.unwrap());
        assert_eq!(summary.borrow().count, 2);

        assert!(handle.instance_down(record("alpha", 8000)).await.unwrap());
        assert!(!handle.instance_down(record("alpha", 8000)).await.unwrap());
        assert_eq!(summary.borrow().count, 1);

        assert!(handle.instance_down(record("beta", 8000)).await.unwrap());
        assert_eq!(summary.borrow().hash, empty_hash);
    }

    #[tokio::test]
    async fn test_run_applies_browser_events_until_cancelled() {
        let (handle, summary) = DirectoryHandle::spawn(Directory::new(None));
        let (tx, rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(handle.clone(), rx, cancel.clone()));

        tx.send(BrowserEvent::Up(record("alpha", 8000))).await.unwrap();
        tx.send(BrowserEvent::Up(record("beta", 8000))).await.unwrap();
        tx.send(BrowserEvent::Down(record("alpha", 8000))).await.unwrap();

        let settled = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                let records = handle.query(None).await.unwrap();
                if records.len() == 1 && records[0].name == "beta" {
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
        .await;
        assert!(settled.is_ok(), "directory never reached the expected state");
        assert_eq!(summary.borrow().count, 1);

        cancel.cancel();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_calls_fail_after_shutdown() {
        let (handle, _summary) = DirectoryHandle::spawn(Directory::new(None));
        handle.shutdown().await.unwrap();
        tokio::task::yield_now().await;
        assert!(handle.get("missing".to_string()).await.is_err());
    }
}
