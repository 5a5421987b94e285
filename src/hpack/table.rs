//! HPACK static and dynamic tables.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::metrics::HPACK_TABLE_EVICTIONS;

/// Per-entry accounting overhead (RFC 7541 Section 4.1).
pub const ENTRY_OVERHEAD: usize = 32;

/// A header field (name-value pair).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderField {
    pub name: Bytes,
    pub value: Bytes,
}

impl HeaderField {
    /// Create a new header field.
    pub fn new(name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Create a header field from static strings without allocating.
    pub const fn from_static(name: &'static [u8], value: &'static [u8]) -> Self {
        Self {
            name: Bytes::from_static(name),
            value: Bytes::from_static(value),
        }
    }

    /// Get the size of this header field for table accounting.
    /// Size = length of name + length of value + 32 (RFC 7541 Section 4.1)
    pub fn size(&self) -> usize {
        self.name.len() + self.value.len() + ENTRY_OVERHEAD
    }
}

/// A static table entry (references static data).
#[derive(Debug, Clone, Copy)]
pub struct StaticEntry {
    pub name: &'static [u8],
    pub value: &'static [u8],
}

impl StaticEntry {
    /// Materialise the entry as a [`HeaderField`]; no copy is made.
    pub fn to_field(&self) -> HeaderField {
        HeaderField::from_static(self.name, self.value)
    }
}

const fn entry(name: &'static [u8], value: &'static [u8]) -> StaticEntry {
    StaticEntry { name, value }
}

/// The HPACK static table (RFC 7541 Appendix A).
///
/// Indices are 1-based; index 0 is invalid.
pub struct StaticTable;

impl StaticTable {
    const ENTRIES: [StaticEntry; 61] = [
        entry(b":authority", b""), // 1
        entry(b":method", b"GET"), // 2
        entry(b":method", b"POST"), // 3
        entry(b":path", b"/"), // 4
        entry(b":path", b"/index.html"), // 5
        entry(b":scheme", b"http"), // 6
        entry(b":scheme", b"https"), // 7
        entry(b":status", b"200"), // 8
        entry(b":status", b"204"), // 9
        entry(b":status", b"206"), // 10
        entry(b":status", b"304"), // 11
        entry(b":status", b"400"), // 12
        entry(b":status", b"404"), // 13
        entry(b":status", b"500"), // 14
        entry(b"accept-charset", b""), // 15
        entry(b"accept-encoding", b"gzip, deflate"), // 16
        entry(b"accept-language", b""), // 17
        entry(b"accept-ranges", b""), // 18
        entry(b"accept", b""), // 19
        entry(b"access-control-allow-origin", b""), // 20
        entry(b"age", b""), // 21
        entry(b"allow", b""), // 22
        entry(b"authorization", b""), // 23
        entry(b"cache-control", b""), // 24
        entry(b"content-disposition", b""), // 25
        entry(b"content-encoding", b""), // 26
        entry(b"content-language", b""), // 27
        entry(b"content-length", b""), // 28
        entry(b"content-location", b""), // 29
        entry(b"content-range", b""), // 30
        entry(b"content-type", b""), // 31
        entry(b"cookie", b""), // 32
        entry(b"date", b""), // 33
        entry(b"etag", b""), // 34
        entry(b"expect", b""), // 35
        entry(b"expires", b""), // 36
        entry(b"from", b""), // 37
        entry(b"host", b""), // 38
        entry(b"if-match", b""), // 39
        entry(b"if-modified-since", b""), // 40
        entry(b"if-none-match", b""), // 41
        entry(b"if-range", b""), // 42
        entry(b"if-unmodified-since", b""), // 43
        entry(b"last-modified", b""), // 44
        entry(b"link", b""), // 45
        entry(b"location", b""), // 46
        entry(b"max-forwards", b""), // 47
        entry(b"proxy-authenticate", b""), // 48
        entry(b"proxy-authorization", b""), // 49
        entry(b"range", b""), // 50
        entry(b"referer", b""), // 51
        entry(b"refresh", b""), // 52
        entry(b"retry-after", b""), // 53
        entry(b"server", b""), // 54
        entry(b"set-cookie", b""), // 55
        entry(b"strict-transport-security", b""), // 56
        entry(b"transfer-encoding", b""), // 57
        entry(b"user-agent", b""), // 58
        entry(b"vary", b""), // 59
        entry(b"via", b""), // 60
        entry(b"www-authenticate", b""), // 61
    ];

    /// Get a static table entry by index (1-61).
    pub fn get(index: usize) -> Option<&'static StaticEntry> {
        index.checked_sub(1).and_then(|i| Self::ENTRIES.get(i))
    }

    /// Find an entry in the static table.
    /// Returns (index, exact_match) where exact_match is true if both name and value match.
    pub fn find(name: &[u8], value: &[u8]) -> Option<(usize, bool)> {
        let mut name_match = None;

        for (i, entry) in Self::ENTRIES.iter().enumerate() {
            if entry.name == name {
                if entry.value == value {
                    return Some((i + 1, true));
                }
                if name_match.is_none() {
                    name_match = Some(i + 1);
                }
            }
        }

        name_match.map(|i| (i, false))
    }

    /// Get the number of entries in the static table.
    pub const fn len() -> usize {
        Self::ENTRIES.len()
    }
}

/// The HPACK dynamic table.
///
/// The dynamic table is a FIFO queue of header fields, with newest entries
/// at the front. Entries are evicted from the back when the table exceeds
/// its maximum size.
#[derive(Debug, Clone)]
pub struct DynamicTable {
    /// Header entries, newest first.
    entries: VecDeque<HeaderField>,
    /// Current size in bytes.
    size: usize,
    /// Maximum size in bytes.
    max_size: usize,
}

impl DynamicTable {
    /// Create a new dynamic table with the given maximum size.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            size: 0,
            max_size,
        }
    }

    /// Set the maximum size of the table, evicting entries as needed.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.evict_to(max_size);
    }

    /// Get an entry by index (0 = newest entry).
    pub fn get(&self, index: usize) -> Option<&HeaderField> {
        self.entries.get(index)
    }

    /// Insert a new entry at the front of the table.
    ///
    /// An entry larger than the maximum size empties the table and is not
    /// stored (RFC 7541 Section 4.4).
    pub fn insert(&mut self, field: HeaderField) {
        let entry_size = field.size();

        if entry_size > self.max_size {
            let evicted = self.entries.len();
            self.entries.clear();
            self.size = 0;
            HPACK_TABLE_EVICTIONS.add(evicted as u64);
            tracing::trace!(
                entry_size,
                max_size = self.max_size,
                evicted,
                "oversized entry emptied dynamic table"
            );
            return;
        }

        self.evict_to(self.max_size - entry_size);

        self.entries.push_front(field);
        self.size += entry_size;
    }

    /// Find an entry in the dynamic table.
    /// Returns (index, exact_match) where index is 0-based within the dynamic table.
    pub fn find(&self, name: &[u8], value: &[u8]) -> Option<(usize, bool)> {
        let mut name_match = None;

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.name == name {
                if entry.value == value {
                    return Some((i, true));
                }
                if name_match.is_none() {
                    name_match = Some(i);
                }
            }
        }

        name_match.map(|i| (i, false))
    }

    /// Evict oldest entries until the table size is at most `target`.
    fn evict_to(&mut self, target: usize) {
        let mut evicted = 0u64;
        while self.size > target {
            match self.entries.pop_back() {
                Some(field) => {
                    self.size -= field.size();
                    evicted += 1;
                }
                None => break,
            }
        }
        if evicted > 0 {
            HPACK_TABLE_EVICTIONS.add(evicted);
            tracing::trace!(
                evicted,
                size = self.size,
                max_size = self.max_size,
                "evicted dynamic table entries"
            );
        }
    }

    /// Get the number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the current size of the table in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the maximum size of the table in bytes.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Iterate over entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &HeaderField> {
        self.entries.iter()
    }
}
