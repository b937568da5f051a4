//! Color slot tracking.
//!
//! Slots address the terminal's default foreground/background, the cursor
//! color and the palette-adjacent OSC color settings. A set request only
//! becomes persistent after the current value has been queried and saved
//! for the restore sequence; until the report arrives the request stays
//! queued.

use num_enum::TryFromPrimitive;

/// OSC color slot numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum ColorSlot {
    Foreground = 10,
    Background = 11,
    Cursor = 12,
}

#[derive(Debug, Default)]
pub(crate) struct SlotEntry {
    pub saved: Option<Vec<u8>>,
    pub requested: Option<Vec<u8>>,
    pub dirty: bool,
    pub save_initiated: bool,
}

/// All tracked color slots plus the dirty queue flushed at end of paint.
#[derive(Debug, Default)]
pub(crate) struct ColorSlots {
    entries: Vec<(u32, SlotEntry)>,
    dirty: Vec<u32>,
}

impl ColorSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&mut self, slot: u32) -> &mut SlotEntry {
        if let Some(i) = self.entries.iter().position(|(s, _)| *s == slot) {
            return &mut self.entries[i].1;
        }
        self.entries.push((slot, SlotEntry::default()));
        &mut self.entries.last_mut().expect("just pushed").1
    }

    pub fn get(&self, slot: u32) -> Option<&SlotEntry> {
        self.entries
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, e)| e)
    }

    pub fn mark_dirty(&mut self, slot: u32) {
        let entry = self.entry(slot);
        if !entry.dirty {
            entry.dirty = true;
            self.dirty.push(slot);
        }
    }

    /// Drain the dirty queue, clearing the per-entry dirty flags.
    pub fn take_dirty(&mut self) -> Vec<u32> {
        let dirty = std::mem::take(&mut self.dirty);
        for &slot in &dirty {
            self.entry(slot).dirty = false;
        }
        dirty
    }

    /// All slots with a saved value, for unpause replay.
    pub fn saved_entries(&self) -> impl Iterator<Item = (u32, &SlotEntry)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.saved.is_some())
            .map(|(s, e)| (*s, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirty_queue_deduplicates() {
        let mut slots = ColorSlots::new();
        slots.mark_dirty(10);
        slots.mark_dirty(10);
        slots.mark_dirty(11);
        assert_eq!(slots.take_dirty(), vec![10, 11]);
        assert_eq!(slots.take_dirty(), Vec::<u32>::new());
        slots.mark_dirty(10);
        assert_eq!(slots.take_dirty(), vec![10]);
    }
}
