//! Indexing context shared by the HPACK encoder and decoder.
//!
//! One context exists per connection and direction. It owns the dynamic
//! table and resolves the unified index space:
//!
//! ```text
//!   <----------  Index Address Space ---------->
//!   <-- Static  Table -->  <-- Dynamic Table -->
//!   +---+-----------+---+  +---+-----------+---+
//!   | 1 |    ...    | s |  |s+1|    ...    |s+k|
//!   +---+-----------+---+  +---+-----------+---+
//!                          ^                   |
//!                          |                   V
//!                   Insertion Point      Dropping Point
//! ```

use bytes::Bytes;

use super::table::{DynamicTable, HeaderField, StaticTable};

/// Result of looking a field up in both tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableMatch {
    /// Name and value match the entry at this external index.
    Full(usize),
    /// Only the name matches the entry at this external index.
    Name(usize),
}

/// Dynamic table plus the index bridging logic.
#[derive(Debug, Clone)]
pub struct HpackContext {
    table: DynamicTable,
}

impl HpackContext {
    /// Create a context whose dynamic table holds at most `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            table: DynamicTable::new(max_size),
        }
    }

    /// Add a field to the front of the dynamic table, evicting as needed.
    ///
    /// The returned field may already have been evicted if it is larger
    /// than the table's maximum size.
    pub fn register(&mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) -> HeaderField {
        let field = HeaderField::new(name, value);
        self.table.insert(field.clone());
        tracing::trace!(
            size = field.size(),
            table_size = self.table.size(),
            entries = self.table.len(),
            "registered header field"
        );
        field
    }

    /// Change the dynamic table's maximum size, evicting immediately.
    ///
    /// Must be applied whenever SETTINGS_HEADER_TABLE_SIZE is negotiated or
    /// a dynamic table size update is decoded; skipping it desynchronises
    /// the two peers.
    pub fn update_max_size(&mut self, max_size: usize) {
        tracing::debug!(
            from = self.table.max_size(),
            to = max_size,
            "dynamic table max size update"
        );
        self.table.set_max_size(max_size);
    }

    /// Resolve an external index. Returns `None` when out of range; whether
    /// that is fatal is up to the caller.
    pub fn try_get_entry(&self, index: usize) -> Option<HeaderField> {
        let static_len = StaticTable::len();
        if index <= static_len {
            StaticTable::get(index).map(|e| e.to_field())
        } else {
            self.table.get(index - static_len - 1).cloned()
        }
    }

    /// Find the best entry for a field: a full match anywhere beats a name
    /// match, and the static table is preferred within each kind.
    pub fn find(&self, name: &[u8], value: &[u8]) -> Option<TableMatch> {
        let static_match = StaticTable::find(name, value);
        let dynamic_match = self.table.find(name, value);

        match (static_match, dynamic_match) {
            (Some((idx, true)), _) => Some(TableMatch::Full(idx)),
            (_, Some((idx, true))) => Some(TableMatch::Full(Self::dynamic_index(idx))),
            (Some((idx, false)), _) => Some(TableMatch::Name(idx)),
            (_, Some((idx, false))) => Some(TableMatch::Name(Self::dynamic_index(idx))),
            (None, None) => None,
        }
    }

    /// Maximum size of the dynamic table.
    pub fn max_size(&self) -> usize {
        self.table.max_size()
    }

    /// Current accounted size of the dynamic table.
    pub fn size(&self) -> usize {
        self.table.size()
    }

    /// The dynamic table.
    pub fn dynamic_table(&self) -> &DynamicTable {
        &self.table
    }

    fn dynamic_index(position: usize) -> usize {
        StaticTable::len() + 1 + position
    }
}
