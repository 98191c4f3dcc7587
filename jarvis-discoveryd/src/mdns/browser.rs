use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::IpAddr;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::Future;
use anyhow::{Context, Result};
use shared::types::ServiceRecord;

const META_QUERY_TYPE: &str = "_services._dns-sd._udp.local.";

/// Advertisement changes forwarded to the directory
#[derive(Debug, PartialEq)]
pub enum BrowserEvent {
    Up(ServiceRecord),
    Down(ServiceRecord),
}

type RecvResult = (usize, flume::Receiver<ServiceEvent>, std::result::Result<ServiceEvent, flume::RecvError>);
type RecvFuture = Pin<Box<dyn Future<Output = RecvResult> + Send>>;

/// Each future owns a clone of its receiver, so the set of per-type
/// receivers can grow while others are being awaited.
fn make_recv_future(idx: usize, rx: flume::Receiver<ServiceEvent>) -> RecvFuture {
    Box::pin(async move {
        let result = rx.recv_async().await;
        (idx, rx, result)
    })
}

async fn recv_meta(
    rx: &Option<flume::Receiver<ServiceEvent>>,
) -> std::result::Result<ServiceEvent, flume::RecvError> {
    match rx {
        Some(rx) => rx.recv_async().await,
        None => futures::future::pending().await,
    }
}

/// Types being browsed and the last record resolved per instance fullname
#[derive(Default)]
struct BrowseState {
    browsed_types: HashSet<String>,
    // Removals only carry the fullname
    resolved: HashMap<String, ServiceRecord>,
}

impl BrowseState {
    /// The meta-query answers with a PTR per advertised type, surfaced as
    /// `ServiceFound(meta, type)`. Returns the type if it is not browsed yet.
    fn on_meta_event(&mut self, event: ServiceEvent) -> Option<String> {
        match event {
            ServiceEvent::ServiceFound(_, service_type) => {
                if service_type == META_QUERY_TYPE || !self.browsed_types.insert(service_type.clone()) {
                    return None;
                }
                tracing::info!("Discovered new service type: {}", service_type);
                Some(service_type)
            }
            _ => None,
        }
    }

    fn on_instance_event(&mut self, event: ServiceEvent) -> Vec<BrowserEvent> {
        match event {
            ServiceEvent::ServiceResolved(info) => {
                let Some(record) = convert_service_info(&info) else {
                    tracing::warn!("Ignoring malformed advertisement from {:?}", info.get_fullname());
                    return Vec::new();
                };
                tracing::debug!("Resolved service: {}", record.id);

                let mut events = Vec::with_capacity(2);
                if let Some(previous) = self.resolved.insert(info.get_fullname().to_string(), record.clone()) {
                    if previous.id != record.id {
                        tracing::debug!("Service {} moved to {}", previous.id, record.id);
                        events.push(BrowserEvent::Down(previous));
                    }
                }
                events.push(BrowserEvent::Up(record));
                events
            }
            ServiceEvent::ServiceRemoved(_, fullname) => match self.resolved.remove(&fullname) {
                Some(record) => {
                    tracing::debug!("Service removed: {}", fullname);
                    vec![BrowserEvent::Down(record)]
                }
                None => {
                    tracing::warn!("Removal for unknown instance {}", fullname);
                    Vec::new()
                }
            },
            _ => Vec::new(),
        }
    }
}

/// Browse `browse_type`, or every advertised type when `None`, until cancelled.
pub async fn run_browser(
    daemon: ServiceDaemon,
    browse_type: Option<String>,
    tx: mpsc::Sender<BrowserEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut state = BrowseState::default();
    let mut next_idx = 0usize;
    let mut type_futures: FuturesUnordered<RecvFuture> = FuturesUnordered::new();

    let meta_receiver = match &browse_type {
        Some(service_type) => {
            tracing::info!("Starting mDNS browser for {}", service_type);
            let receiver = daemon
                .browse(service_type)
                .with_context(|| format!("Failed to browse {}", service_type))?;
            state.browsed_types.insert(service_type.clone());
            type_futures.push(make_recv_future(next_idx, receiver));
            next_idx += 1;
            None
        }
        None => {
            tracing::info!("Starting mDNS browser for all service types");
            Some(
                daemon
                    .browse(META_QUERY_TYPE)
                    .context("Failed to start meta-query browse")?,
            )
        }
    };
    let mut meta_open = meta_receiver.is_some();

    loop {
        tokio::select! {
            event = recv_meta(&meta_receiver), if meta_open => {
                match event {
                    Ok(event) => {
                        if let Some(service_type) = state.on_meta_event(event) {
                            match daemon.browse(&service_type) {
                                Ok(receiver) => {
                                    type_futures.push(make_recv_future(next_idx, receiver));
                                    next_idx += 1;
                                }
                                Err(e) => {
                                    tracing::error!("Failed to browse {}: {}", service_type, e);
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Meta-query receiver disconnected: {}", e);
                        meta_open = false;
                    }
                }
            }

            Some((idx, rx, result)) = type_futures.next() => {
                match result {
                    Ok(event) => {
                        for event in state.on_instance_event(event) {
                            if let Err(e) = tx.send(event).await {
                                tracing::error!("Failed to forward browser event: {}", e);
                            }
                        }
                        type_futures.push(make_recv_future(idx, rx));
                    }
                    Err(e) => {
                        tracing::warn!("Receiver {} disconnected: {}", idx, e);
                    }
                }
            }

            _ = cancel.cancelled() => {
                tracing::info!("mDNS browser shutting down");
                break;
            }
        }
    }

    if meta_receiver.is_some() {
        state.browsed_types.insert(META_QUERY_TYPE.to_string());
    }
    for service_type in &state.browsed_types {
        if let Err(e) = daemon.stop_browse(service_type) {
            tracing::debug!("Failed to stop browsing {}: {}", service_type, e);
        }
    }

    Ok(())
}

/// Convert an mdns-sd ServiceInfo to a directory record
fn convert_service_info(info: &ServiceInfo) -> Option<ServiceRecord> {
    let fullname = info.get_fullname();
    if fullname.trim_end_matches('.').is_empty() {
        return None;
    }

    let service_type = info.get_type();
    let name = instance_name(fullname, service_type);
    let host = Some(trim_dot(info.get_hostname()).to_string()).filter(|h| !h.is_empty());
    let port = Some(info.get_port()).filter(|p| *p != 0);

    let mut addresses: Vec<IpAddr> = info.get_addresses().iter().copied().collect();
    addresses.sort();

    let txt: BTreeMap<String, String> = info
        .get_properties()
        .iter()
        .map(|prop| (prop.key().to_string(), prop.val_str().to_string()))
        .collect();

    let mut record = ServiceRecord::new(name, Some(trim_dot(fullname).to_string()), host, port)
        .with_addresses(addresses)
        .with_txt(txt);
    if let Some((kind, protocol)) = split_service_type(service_type) {
        record = record.with_service_type(kind, protocol);
    }
    Some(record)
}

fn trim_dot(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}

/// "Living Room._http._tcp.local." with type "_http._tcp.local." -> "Living Room"
fn instance_name(fullname: &str, service_type: &str) -> String {
    let name = fullname
        .strip_suffix(service_type)
        .map(|s| s.strip_suffix('.').unwrap_or(s))
        .unwrap_or_else(|| trim_dot(fullname));
    if name.is_empty() {
        trim_dot(fullname).to_string()
    } else {
        name.to_string()
    }
}

/// "_http._tcp.local." -> ("http", "tcp")
fn split_service_type(service_type: &str) -> Option<(String, String)> {
    let mut labels = service_type.split('.');
    let kind = labels.next()?.strip_prefix('_')?;
    let protocol = labels.next()?.strip_prefix('_')?;
    if kind.is_empty() || protocol.is_empty() {
        return None;
    }
    Some((kind.to_string(), protocol.to_string()))
}
