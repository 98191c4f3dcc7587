use std::collections::BTreeMap;
use std::net::IpAddr;
use serde::Serialize;
use sha2::{Sha256, Digest};
use shared::types::ServiceRecord;

/// Only the advertised data takes part in the fingerprint; `updated_at`
/// moves on every re-resolve without the instance changing.
#[derive(Serialize)]
struct HashView<'a> {
    id: &'a str,
    name: &'a str,
    fqdn: Option<&'a str>,
    host: Option<&'a str>,
    port: Option<u16>,
    addresses: &'a [IpAddr],
    txt: &'a BTreeMap<String, String>,
    service_type: Option<&'a str>,
    protocol: Option<&'a str>,
}

/// SHA-256 fingerprint of a set of records, independent of input order.
pub fn compute_hash<'a>(records: impl IntoIterator<Item = &'a ServiceRecord>) -> String {
    let mut views: Vec<HashView<'_>> = records
        .into_iter()
        .map(|r| HashView {
            id: &r.id,
            name: &r.name,
            fqdn: r.fqdn.as_deref(),
            host: r.host.as_deref(),
            port: r.port,
            addresses: &r.addresses,
            txt: &r.txt,
            service_type: r.service_type.as_deref(),
            protocol: r.protocol.as_deref(),
        })
        .collect();
    views.sort_by(|a, b| a.id.cmp(b.id));

    let json = serde_json::to_vec(&views).unwrap_or_default();
    hex::encode(Sha256::digest(&json))
}
