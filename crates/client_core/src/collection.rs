use crate::transport::RemoteRecord;

/// Key addressing one entry in a [`Collection`]. Created records carry a
/// client-side provisional key until the server assigns an id; a provisional
/// entry accepts no further mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKey {
    Provisional(u64),
    Server(i64),
}

impl RecordKey {
    pub fn is_provisional(self) -> bool {
        matches!(self, RecordKey::Provisional(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry<R> {
    pub key: RecordKey,
    pub record: R,
}

/// Ordered, id-keyed cache of one record kind. Insertion order is display
/// order; creates go to the front. The remote system owns canonical state,
/// this is the possibly-stale local copy the controller keeps consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<R> {
    entries: Vec<Entry<R>>,
}

impl<R> Default for Collection<R> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<R: RemoteRecord> Collection<R> {
    /// Builds a collection from a fresh server listing, preserving its order.
    pub fn from_records(records: Vec<R>) -> Self {
        Self {
            entries: records
                .into_iter()
                .map(|record| Entry {
                    key: RecordKey::Server(record.id()),
                    record,
                })
                .collect(),
        }
    }
}

impl<R: Clone> Collection<R> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: RecordKey) -> bool {
        self.position(key).is_some()
    }

    pub fn position(&self, key: RecordKey) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key == key)
    }

    pub fn get(&self, key: RecordKey) -> Option<&R> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.record)
    }

    pub fn insert_front(&mut self, key: RecordKey, record: R) {
        self.entries.insert(0, Entry { key, record });
    }

    pub fn insert_at(&mut self, index: usize, key: RecordKey, record: R) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, Entry { key, record });
    }

    /// Replaces an entry's record in place; a no-op when the key is gone
    /// (e.g. a late reconciliation after the list was refreshed).
    pub fn set(&mut self, key: RecordKey, record: R) -> bool {
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => {
                entry.record = record;
                true
            }
            None => false,
        }
    }

    /// Rekeys an entry in place, preserving its position. Used when a
    /// provisional create entry receives its canonical record.
    pub fn replace_key(&mut self, key: RecordKey, new_key: RecordKey, record: R) -> bool {
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => {
                entry.key = new_key;
                entry.record = record;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: RecordKey) -> Option<(usize, R)> {
        let index = self.position(key)?;
        let entry = self.entries.remove(index);
        Some((index, entry.record))
    }

    pub fn records(&self) -> Vec<R> {
        self.entries
            .iter()
            .map(|entry| entry.record.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &R)> {
        self.entries.iter().map(|entry| (&entry.key, &entry.record))
    }
}
