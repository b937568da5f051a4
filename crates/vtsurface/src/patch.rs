//! Patch slots: raw setup/cleanup escape fragments wrapped around cells.
//!
//! A fixed 255-slot table keeps the per-cell reference to one byte. Slots
//! are deduplicated by content and reclaimed when the table is full by
//! scanning which slots the current and shadow cells still reference.

/// One patch: raw escape fragments emitted around a cell's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    /// When set, adjacent cells sharing this patch keep it active across
    /// them; otherwise cleanup is emitted between every cell.
    pub optimize: bool,
    pub setup: Vec<u8>,
    pub cleanup: Vec<u8>,
}

pub const PATCH_SLOTS: usize = 255;

/// Fixed-size patch slot table. Index 0 means "no patch"; cell indices
/// 1..=255 address slots 0..=254.
#[derive(Debug, Default)]
pub struct PatchTable {
    slots: Vec<Option<Patch>>,
}

impl PatchTable {
    #[must_use]
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    #[must_use]
    pub fn get(&self, idx: u8) -> Option<&Patch> {
        if idx == 0 {
            return None;
        }
        self.slots.get(usize::from(idx) - 1)?.as_ref()
    }

    /// Find or allocate a slot for the given patch, returning the cell
    /// index (0 when the patch is empty or no slot could be found).
    ///
    /// `referenced` reports whether a cell index is still referenced by the
    /// owning surface; it is consulted only when the table is full.
    pub fn ensure(
        &mut self,
        optimize: bool,
        setup: &[u8],
        cleanup: &[u8],
        referenced: impl Fn(u8) -> bool,
    ) -> u8 {
        if setup.is_empty() || cleanup.is_empty() {
            return 0;
        }

        if self.slots.is_empty() {
            self.slots.resize(PATCH_SLOTS, None);
        }

        let mut free_slot = None;
        for (i, slot) in self.slots.iter().enumerate() {
            match slot {
                None => {
                    if free_slot.is_none() {
                        free_slot = Some(i);
                    }
                }
                Some(patch) => {
                    if patch.setup == setup && patch.cleanup == cleanup {
                        return (i + 1) as u8;
                    }
                }
            }
        }

        if free_slot.is_none() {
            // reclaim slots no cell references anymore
            for i in 0..self.slots.len() {
                if self.slots[i].is_some() && !referenced((i + 1) as u8) {
                    self.slots[i] = None;
                    if free_slot.is_none() {
                        free_slot = Some(i);
                    }
                }
            }
        }

        if let Some(i) = free_slot {
            self.slots[i] = Some(Patch {
                optimize,
                setup: setup.to_vec(),
                cleanup: cleanup.to_vec(),
            });
            return (i + 1) as u8;
        }

        // table exhausted, drop the patch
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_dedup_by_content() {
        let mut table = PatchTable::new();
        let a = table.ensure(true, b"\x1b[8m", b"\x1b[28m", |_| true);
        let b = table.ensure(true, b"\x1b[8m", b"\x1b[28m", |_| true);
        assert_eq!(a, b);
        assert_ne!(a, 0);
    }

    #[test]
    fn test_empty_fragments_drop_patch() {
        let mut table = PatchTable::new();
        assert_eq!(table.ensure(false, b"", b"\x1b[0m", |_| true), 0);
        assert_eq!(table.ensure(false, b"\x1b[8m", b"", |_| true), 0);
    }

    #[test]
    fn test_reclaims_unreferenced_when_full() {
        let mut table = PatchTable::new();
        for i in 0..PATCH_SLOTS {
            let setup = format!("\x1b[{i}m");
            let idx = table.ensure(false, setup.as_bytes(), b"\x1b[0m", |_| true);
            assert_eq!(usize::from(idx), i + 1);
        }
        // full and everything referenced: the patch is dropped
        assert_eq!(table.ensure(false, b"\x1b[999m", b"\x1b[0m", |_| true), 0);
        // slot 7 no longer referenced: it gets reused
        let idx = table.ensure(false, b"\x1b[999m", b"\x1b[0m", |idx| idx != 7);
        assert_eq!(idx, 7);
        assert_eq!(table.get(7).unwrap().setup, b"\x1b[999m");
    }
}
