//! Label symbol table.
//!
//! Built during the scan pass (labels are *defined* at their line's address
//! and *referenced* by branch/load targets, possibly before definition) and
//! consulted during the encode pass. Forward references are held with a
//! pending sentinel until the defining line is reached; a lookup that still
//! sees the sentinel after the scan pass is a resolution failure, never a
//! valid address — address 0 is legitimate.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Placeholder address for a label referenced before (or without) definition.
pub const UNRESOLVED: u32 = u32::MAX;

/// Mapping from label name to resolved 32-bit address.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    entries: HashMap<String, u32>,
}

impl SymbolTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Define `name` at `addr`, overwriting any pending reference.
    pub fn define(&mut self, name: &str, addr: u32) {
        self.entries.insert(name.to_string(), addr);
    }

    /// Record a reference to `name`.
    ///
    /// Inserts the pending sentinel when the label is not yet known;
    /// an existing entry (defined or pending) is left untouched.
    pub fn reference(&mut self, name: &str) {
        self.entries
            .entry(name.to_string())
            .or_insert(UNRESOLVED);
    }

    /// Look up the resolved address of `name`.
    ///
    /// Returns `None` both for labels never seen and for labels that were
    /// referenced but never defined.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<u32> {
        match self.entries.get(name) {
            Some(&addr) if addr != UNRESOLVED => Some(addr),
            _ => None,
        }
    }

    /// Whether any entry (defined or pending) exists for `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of entries, pending ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All resolved `(name, address)` pairs, sorted by address then name.
    #[must_use]
    pub fn resolved(&self) -> Vec<(String, u32)> {
        let mut out: Vec<(String, u32)> = self
            .entries
            .iter()
            .filter(|&(_, &addr)| addr != UNRESOLVED)
            .map(|(name, &addr)| (name.clone(), addr))
            .collect();
        out.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        out
    }
}
