//! The terminal restore sequence.
//!
//! Every irreversible action prepends its undo sequence here, so emitting
//! the accumulated bytes undoes everything in reverse order. The host may
//! fetch it at any time for emergency restoration.

#[derive(Debug, Default)]
pub(crate) struct RestoreSequence {
    bytes: Vec<u8>,
}

impl RestoreSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend an undo fragment; prepending keeps reverse order.
    pub fn prepend(&mut self, fragment: &[u8]) {
        let mut combined = Vec::with_capacity(fragment.len() + self.bytes.len());
        combined.extend_from_slice(fragment);
        combined.extend_from_slice(&self.bytes);
        self.bytes = combined;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepend_keeps_reverse_order() {
        let mut seq = RestoreSequence::new();
        seq.prepend(b"\x1b[?1049l");
        seq.prepend(b"\x1b[?7h");
        seq.prepend(b"\x1b[?25h");
        assert_eq!(seq.as_bytes(), b"\x1b[?25h\x1b[?7h\x1b[?1049l");
    }
}
