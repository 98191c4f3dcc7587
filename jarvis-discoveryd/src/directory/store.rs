use std::collections::HashMap;
use shared::types::ServiceRecord;

/// In-memory directory of advertised instances, keyed by record id.
/// Nothing is persisted; a restart rebuilds it from fresh advertisements.
#[derive(Debug, Default)]
pub struct Directory {
    records: HashMap<String, ServiceRecord>,
    default_filter: Option<String>,
}

impl Directory {
    pub fn new(default_filter: Option<String>) -> Self {
        Self {
            records: HashMap::new(),
            default_filter: default_filter.filter(|f| !f.is_empty()),
        }
    }

    /// Insert or fully replace the record with the same id.
    /// Returns false when the record was ignored.
    pub fn on_instance_up(&mut self, record: ServiceRecord) -> bool {
        if record.id.trim().is_empty() {
            tracing::warn!("Ignoring instance-up without an identity: {:?}", record.name);
            return false;
        }
        tracing::info!("Service up {} ({})", record.name, record.id);
        self.records.insert(record.id.clone(), record);
        true
    }

    /// Remove the record with the same id. Returns true if one was present.
    pub fn on_instance_down(&mut self, record: &ServiceRecord) -> bool {
        match self.records.remove(&record.id) {
            Some(_) => {
                tracing::info!("Service down {} ({})", record.name, record.id);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&ServiceRecord> {
        self.records.get(id)
    }

    /// Records matching `name_filter`, or the default filter when none is
    /// given. An empty filter counts as none. Sorted by id.
    pub fn query(&self, name_filter: Option<&str>) -> Vec<ServiceRecord> {
        let filter = name_filter
            .filter(|f| !f.is_empty())
            .or(self.default_filter.as_deref());

        let mut records: Vec<ServiceRecord> = self
            .records
            .values()
            .filter(|r| filter.map_or(true, |f| name_matches(&r.name, f)))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub fn records(&self) -> impl Iterator<Item = &ServiceRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Case-insensitive containment, tried verbatim and with punctuation
/// stripped from both sides so "Jarvis" finds "J.A.R.V.I.S Main".
pub fn name_matches(name: &str, filter: &str) -> bool {
    let name_lower = name.to_lowercase();
    let filter_lower = filter.to_lowercase();
    if name_lower.contains(&filter_lower) {
        return true;
    }

    let strip = |s: &str| -> String { s.chars().filter(|c| !c.is_ascii_punctuation()).collect() };
    let filter_stripped = strip(&filter_lower);
    !filter_stripped.trim().is_empty() && strip(&name_lower).contains(&filter_stripped)
}
