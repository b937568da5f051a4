//! The restartable measurement accumulator.
//!
//! Four counts run while code units are fed: codepoints, clusters, columns
//! and source code units ("ref"). When any configured limit is hit, the
//! accumulator commits the counts at the last completed cluster boundary
//! and reports that the limit was reached; the caller may read the
//! committed counts, raise the limit and feed more input.

use bitflags::bitflags;

use crate::chars::{
    char_width, sanitize_codepoint, utf8_len, utf16_combine, utf16_is_high_surrogate,
    utf16_is_low_surrogate,
};

bitflags! {
    /// Result of feeding a single codepoint.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FeedOutcome: u8 {
        /// The codepoint started a new cluster.
        const NEW_CLUSTER = 1;
        /// A limit was reached; the committed counts are the best match.
        const LIMIT_REACHED = 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClusterState {
    Initial,
    InCluster,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Initial,
    PartialUtf16 { high: u16 },
    PartialUtf8 { size: u8, available: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Counts {
    codepoints: usize,
    clusters: usize,
    width: usize,
    ref_units: usize,
}

impl Counts {
    const ZERO: Counts = Counts {
        codepoints: 0,
        clusters: 0,
        width: 0,
        ref_units: 0,
    };
}

/// Restartable text measurement over UTF-8, UTF-16 or UTF-32 input.
#[derive(Debug, Clone)]
pub struct TextMeasurement {
    pending: Counts,
    last: Counts,
    state: ClusterState,

    limit_codepoints: Option<usize>,
    limit_clusters: Option<usize>,
    limit_width: Option<usize>,
    limit_ref: Option<usize>,

    decoder_state: DecoderState,
    utf8_units: [u8; 6],
}

impl Default for TextMeasurement {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMeasurement {
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: Counts::ZERO,
            last: Counts::ZERO,
            state: ClusterState::Initial,
            limit_codepoints: None,
            limit_clusters: None,
            limit_width: None,
            limit_ref: None,
            decoder_state: DecoderState::Initial,
            utf8_units: [0; 6],
        }
    }

    /// Reset counts and decoder state; limits are kept.
    pub fn reset(&mut self) {
        self.pending = Counts::ZERO;
        self.last = Counts::ZERO;
        self.state = ClusterState::Initial;
        self.decoder_state = DecoderState::Initial;
    }

    #[must_use]
    pub fn last_codepoints(&self) -> usize {
        self.last.codepoints
    }

    #[must_use]
    pub fn last_clusters(&self) -> usize {
        self.last.clusters
    }

    #[must_use]
    pub fn last_width(&self) -> usize {
        self.last.width
    }

    #[must_use]
    pub fn last_ref(&self) -> usize {
        self.last.ref_units
    }

    /// Code units consumed so far including the incomplete trailing cluster.
    #[must_use]
    pub fn pending_ref(&self) -> usize {
        self.pending.ref_units
    }

    #[must_use]
    pub fn limit_codepoints(&self) -> Option<usize> {
        self.limit_codepoints
    }

    pub fn set_limit_codepoints(&mut self, limit: Option<usize>) {
        self.limit_codepoints = limit;
    }

    #[must_use]
    pub fn limit_clusters(&self) -> Option<usize> {
        self.limit_clusters
    }

    pub fn set_limit_clusters(&mut self, limit: Option<usize>) {
        self.limit_clusters = limit;
    }

    #[must_use]
    pub fn limit_width(&self) -> Option<usize> {
        self.limit_width
    }

    pub fn set_limit_width(&mut self, limit: Option<usize>) {
        self.limit_width = limit;
    }

    #[must_use]
    pub fn limit_ref(&self) -> Option<usize> {
        self.limit_ref
    }

    pub fn set_limit_ref(&mut self, limit: Option<usize>) {
        self.limit_ref = limit;
    }

    fn commit(&mut self) {
        self.last = self.pending;
    }

    fn undo(&mut self) {
        self.pending = self.last;
        self.state = ClusterState::InCluster;
        self.decoder_state = DecoderState::Initial;
    }

    /// `None` if no limit reached, `Some(true)` if some limit exceeded,
    /// `Some(false)` if a limit is hit exactly and none exceeded.
    fn cmp_limits(&self) -> Option<bool> {
        let mut hit = None;
        for (limit, pending) in [
            (self.limit_codepoints, self.pending.codepoints),
            (self.limit_clusters, self.pending.clusters),
            (self.limit_width, self.pending.width),
            (self.limit_ref, self.pending.ref_units),
        ] {
            if let Some(limit) = limit {
                if pending > limit {
                    return Some(true);
                }
                if pending == limit {
                    hit = Some(false);
                }
            }
        }
        hit
    }

    /// Feed one codepoint. `ref_adjust` is the number of source code units
    /// the codepoint consumed.
    pub fn feed_codepoint(&mut self, cp: u32, ref_adjust: usize) -> FeedOutcome {
        // Segmentation must stay in sync with the surface write path.
        let sanitized = sanitize_codepoint(cp);
        let width = char_width(sanitized);
        if width == 0 {
            if self.state == ClusterState::Initial {
                // A leading zero-width codepoint is written with U+00A0 as
                // base; U+00A0 accounts the same codepoint/ref increments
                // plus the cluster and width increments the base adds.
                return self.feed_codepoint(0xa0, ref_adjust);
            }

            self.pending.codepoints += 1;
            self.pending.ref_units += ref_adjust;

            // accumulates into the open cluster
            return FeedOutcome::empty();
        }

        match self.cmp_limits() {
            Some(false) => {
                // limit hit exactly: commit and report the best match
                self.commit();
                self.state = ClusterState::InCluster;
                FeedOutcome::NEW_CLUSTER | FeedOutcome::LIMIT_REACHED
            }
            None => {
                self.commit();
                self.state = ClusterState::InCluster;

                self.pending.codepoints += 1;
                self.pending.ref_units += ref_adjust;
                self.pending.width += width;
                self.pending.clusters += 1;

                if cp == 0x7f {
                    // the clear marker does not accept combining codepoints
                    self.state = ClusterState::Initial;
                }

                FeedOutcome::NEW_CLUSTER
            }
            Some(true) => {
                self.undo();
                FeedOutcome::LIMIT_REACHED
            }
        }
    }

    fn finalize(&mut self) -> bool {
        match self.cmp_limits() {
            Some(false) => {
                self.commit();
                true
            }
            None => {
                self.commit();
                false
            }
            Some(true) => {
                self.undo();
                true
            }
        }
    }

    /// Feed UTF-32 code units. Returns true when a limit was reached.
    pub fn feed_utf32(&mut self, chars: &[u32], last: bool) -> bool {
        for &cp in chars {
            if self.feed_codepoint(cp, 1).contains(FeedOutcome::LIMIT_REACHED) {
                return true;
            }
        }
        if last {
            return self.finalize();
        }
        false
    }

    /// Feed UTF-16 code units. Returns true when a limit was reached.
    pub fn feed_utf16(&mut self, units: &[u16], last: bool) -> bool {
        if !matches!(
            self.decoder_state,
            DecoderState::Initial | DecoderState::PartialUtf16 { .. }
        ) {
            // bogus usage, paper over it
            self.decoder_state = DecoderState::Initial;
        }
        for &unit in units {
            let mut cp = u32::from(unit);
            let mut adjust = 1;
            if utf16_is_high_surrogate(unit) {
                if self.decoder_state == DecoderState::Initial {
                    self.decoder_state = DecoderState::PartialUtf16 { high: unit };
                    continue;
                }
                cp = 0xfffd;
            }
            if utf16_is_low_surrogate(unit) {
                if let DecoderState::PartialUtf16 { high } = self.decoder_state {
                    adjust = 2;
                    cp = utf16_combine(high, unit);
                } else {
                    cp = 0xfffd;
                }
            }
            self.decoder_state = DecoderState::Initial;

            if self.feed_codepoint(cp, adjust).contains(FeedOutcome::LIMIT_REACHED) {
                return true;
            }
        }
        if last {
            return self.finalize();
        }
        false
    }

    /// Feed UTF-8 code units. Returns true when a limit was reached.
    pub fn feed_utf8(&mut self, units: &[u8], last: bool) -> bool {
        if !matches!(
            self.decoder_state,
            DecoderState::Initial | DecoderState::PartialUtf8 { .. }
        ) {
            self.decoder_state = DecoderState::Initial;
        }

        for &unit in units {
            let cp;
            let adjust;

            if self.decoder_state == DecoderState::Initial {
                let len = utf8_len(unit);
                if len == 1 {
                    cp = u32::from(unit);
                    adjust = 1;
                } else {
                    self.utf8_units[0] = unit;
                    self.decoder_state = DecoderState::PartialUtf8 {
                        size: len as u8,
                        available: 1,
                    };
                    continue;
                }
            } else if let DecoderState::PartialUtf8 { size, available } = self.decoder_state {
                self.utf8_units[usize::from(available)] = unit;
                let available = available + 1;
                adjust = usize::from(available);
                if available == size {
                    let bytes = &self.utf8_units[..usize::from(size)];
                    cp = match core::str::from_utf8(bytes) {
                        Ok(s) => s.chars().next().map_or(0xfffd, |c| c as u32),
                        Err(_) => 0xfffd,
                    };
                } else if available > size {
                    cp = 0xfffd;
                } else {
                    self.decoder_state = DecoderState::PartialUtf8 { size, available };
                    continue;
                }
                self.decoder_state = DecoderState::Initial;
            } else {
                unreachable!();
            }

            if self.feed_codepoint(cp, adjust).contains(FeedOutcome::LIMIT_REACHED) {
                return true;
            }
        }
        if last {
            return self.finalize();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ascii_counts() {
        let mut m = TextMeasurement::new();
        assert!(!m.feed_utf8(b"sample", true));
        assert_eq!(m.last_codepoints(), 6);
        assert_eq!(m.last_clusters(), 6);
        assert_eq!(m.last_width(), 6);
        assert_eq!(m.last_ref(), 6);
    }

    #[test]
    fn test_wide_chars_count_double_width() {
        let mut m = TextMeasurement::new();
        assert!(!m.feed_utf8("あえ".as_bytes(), true));
        assert_eq!(m.last_clusters(), 2);
        assert_eq!(m.last_width(), 4);
        assert_eq!(m.last_ref(), 6);
    }

    #[test]
    fn test_combining_mark_joins_cluster() {
        let mut m = TextMeasurement::new();
        assert!(!m.feed_utf8("a\u{308}b".as_bytes(), true));
        assert_eq!(m.last_codepoints(), 3);
        assert_eq!(m.last_clusters(), 2);
        assert_eq!(m.last_width(), 2);
    }

    #[test]
    fn test_leading_combining_mark_counts_one_column() {
        let mut m = TextMeasurement::new();
        assert!(!m.feed_utf8("\u{308}".as_bytes(), true));
        assert_eq!(m.last_clusters(), 1);
        assert_eq!(m.last_width(), 1);
        assert_eq!(m.last_ref(), 2);
    }

    #[test]
    fn test_width_limit_commits_last_full_cluster() {
        let mut m = TextMeasurement::new();
        m.set_limit_width(Some(3));
        assert!(m.feed_utf8("ああ".as_bytes(), true));
        // only one double-width cluster fits into 3 columns
        assert_eq!(m.last_clusters(), 1);
        assert_eq!(m.last_width(), 2);
        assert_eq!(m.last_ref(), 3);
    }

    #[test]
    fn test_exact_width_limit() {
        let mut m = TextMeasurement::new();
        m.set_limit_width(Some(4));
        assert!(m.feed_utf8("ああa".as_bytes(), false));
        assert_eq!(m.last_width(), 4);
        assert_eq!(m.last_clusters(), 2);
    }

    #[test]
    fn test_resume_after_limit() {
        let mut m = TextMeasurement::new();
        m.set_limit_width(Some(2));
        let text = "abcd".as_bytes();
        assert!(m.feed_utf8(text, true));
        assert_eq!(m.last_ref(), 2);
        let consumed = m.last_ref();
        m.set_limit_width(Some(4));
        assert!(m.feed_utf8(&text[consumed..], true));
        assert_eq!(m.last_ref(), 4);
        assert_eq!(m.last_width(), 4);
    }

    #[test]
    fn test_utf16_surrogate_pair() {
        let mut m = TextMeasurement::new();
        // U+1F600 as a surrogate pair
        assert!(!m.feed_utf16(&[0xd83d, 0xde00], true));
        assert_eq!(m.last_codepoints(), 1);
        assert_eq!(m.last_ref(), 2);
        assert_eq!(m.last_width(), 2);
    }

    #[test]
    fn test_utf16_split_across_feeds() {
        let mut m = TextMeasurement::new();
        assert!(!m.feed_utf16(&[0xd83d], false));
        assert!(!m.feed_utf16(&[0xde00], true));
        assert_eq!(m.last_codepoints(), 1);
        assert_eq!(m.last_ref(), 2);
    }

    #[test]
    fn test_utf32_input() {
        let mut m = TextMeasurement::new();
        assert!(!m.feed_utf32(&[u32::from('a'), 0x1f600], true));
        assert_eq!(m.last_codepoints(), 2);
        assert_eq!(m.last_width(), 3);
        assert_eq!(m.last_ref(), 2);
    }

    #[test]
    fn test_cluster_limit() {
        let mut m = TextMeasurement::new();
        m.set_limit_clusters(Some(2));
        assert!(m.feed_utf8(b"abc", true));
        assert_eq!(m.last_clusters(), 2);
        assert_eq!(m.last_ref(), 2);
    }

    #[test]
    fn test_codepoint_limit_mid_cluster_backs_off() {
        let mut m = TextMeasurement::new();
        m.set_limit_codepoints(Some(2));
        // the three-codepoint cluster exceeds the limit, so the best match
        // is the state before it
        assert!(m.feed_utf8("a\u{308}\u{301}b".as_bytes(), true));
        assert_eq!(m.last_clusters(), 0);
        assert_eq!(m.last_codepoints(), 0);

        let mut m = TextMeasurement::new();
        m.set_limit_codepoints(Some(3));
        assert!(m.feed_utf8("a\u{308}\u{301}b".as_bytes(), true));
        assert_eq!(m.last_clusters(), 1);
        assert_eq!(m.last_codepoints(), 3);
    }
}
