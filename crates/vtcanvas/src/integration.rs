//! The host integration boundary.
//!
//! The core performs no I/O itself: every output byte goes through
//! [`Integration::write`] and input bytes are handed in by the host. The
//! optional callbacks let a host drive follow-up queries and persist the
//! restore sequence for crash recovery; a minimal integration only
//! implements `write`.

pub trait Integration {
    /// Write bytes towards the terminal. Ordering is preserved.
    fn write(&mut self, data: &[u8]);

    /// Pass a buffered-writer flush on to the tty.
    fn flush(&mut self) {}

    /// Whether the integration has hit a hard error. Once true, the
    /// terminal goes bad and further operations are no-ops.
    fn is_bad(&self) -> bool {
        false
    }

    /// The core wants to be called back soon (via
    /// [`Terminal::callback`](crate::Terminal::callback)) to drive a
    /// follow-up query.
    fn request_callback(&mut self) {}

    /// A query has been issued; terminal input should be expected even
    /// without user interaction.
    fn awaiting_response(&mut self) {}

    /// The cumulative restore sequence changed. Hosts that want crash
    /// recovery persist it somewhere a cleanup handler can reach.
    fn restore_sequence_updated(&mut self, _sequence: &[u8]) {}

    /// Diagnostic log line from the core.
    fn logging(&mut self, _message: &[u8]) {}
}
