//! The wave-based detection state machine.
//!
//! Transitions are driven by decoded input events and yield a list of
//! [`DetectAction`]s for the caller to execute. An event no outgoing
//! transition matches aborts detection: the terminal is classified
//! too-dumb and the capability set collapses to minimal, which keeps
//! detection from hanging on terminals that silently drop or reorder
//! queries.

use tracing::{debug, trace};
use vtdecode::{Event, MiscAtom, Modifiers};
use vtwire::{csi, dcs};

use crate::caps::{Capability, CapabilitySet};
use crate::family::Family;
use crate::profile::apply_family_profile;

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectAction {
    /// Write these bytes to the terminal.
    Send(Vec<u8>),
    /// The next `CSI … R` frame is a cursor position report.
    ExpectCursorPositionReport,
    /// A reply is expected; the integration should watch for input.
    AwaitingResponse,
}

/// Coarse external view of the detection progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionState {
    NotStarted,
    Running,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    // does CSI 5 n work at all?
    BasicCompat,
    // basics: cursor position, secondary device attributes, readiness
    BasicQuery,
    BasicCursorRecved,
    IncompatibleCursorRecved,
    BasicNoSecDevCursorRecved,
    BasicMisparsing,
    BasicSecDevRecved,
    BasicSecDevRecvedConsumeCursor,
    // urxvt 88 vs 256 color palette probe
    UrxvtPaletteProbe,
    // fingerprint 1: private cursor report, DA3, DECREQTPARM quirks
    Fingerprint1,
    Fp1TermIdRecved,
    Fp1TermIdAndSecDevRecved,
    Fp1SecDevRecved,
    Fp1SecDevAndSafeCursorRecved,
    Fp1SafeCursorRecved,
    Fp1TermIdAliasedToPrimary,
    Fp1CleanupAfterSync,
    Fp1Cleanup,
    ExpectSyncThenFinish,
    DrainToFinish,
    // fingerprint 2: konsole double answer, old VTE missing answer
    Fingerprint2,
    Fp2CursorDone,
    Fp2SecDevRecved1,
    Fp2SecDevRecved2,
    // self reporting via CSI > q and terminfo queries
    DrainToSelfReporting,
    ExpectSyncThenSelfReport,
    SelfReporting,
    // subroutine: walk the cursor back over glitch output
    GlitchPatching,
    // hterm sends its CSI 5 n reply with the bracket missing
    HtermRecovery1,
    HtermRecovery2,
    Finished,
}

/// Drives terminal identification over a decoded event stream.
#[derive(Debug)]
pub struct Detector {
    state: Option<State>,
    family: Family,
    version: i32,
    confidence: i32,
    sec_dev_attributes: Vec<u8>,
    self_reported_name: Vec<u8>,
    initial_cursor: (i32, i32),
    glitch_cursor: Option<(i32, i32)>,
    seen_dec_terminal_param: bool,
}

impl Default for Detector {
    fn default() -> Self {
        Self::new()
    }
}

fn send(actions: &mut Vec<DetectAction>, bytes: impl AsRef<[u8]>) {
    actions.push(DetectAction::Send(bytes.as_ref().to_vec()));
}

impl Detector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: None,
            family: Family::Unknown,
            version: 0,
            confidence: 0,
            sec_dev_attributes: Vec::new(),
            self_reported_name: Vec::new(),
            initial_cursor: (-1, -1),
            glitch_cursor: None,
            seen_dec_terminal_param: false,
        }
    }

    #[must_use]
    pub fn family(&self) -> Family {
        self.family
    }

    /// Version as `major * 1_000_000 + minor * 1_000 + patch`, 0 when not
    /// extractable.
    #[must_use]
    pub fn version(&self) -> i32 {
        self.version
    }

    /// The terminal's self-reported name/version string, if any.
    #[must_use]
    pub fn self_reported_name(&self) -> Option<&str> {
        if self.self_reported_name.is_empty() {
            None
        } else {
            core::str::from_utf8(&self.self_reported_name).ok()
        }
    }

    /// Cursor position observed at detection start.
    #[must_use]
    pub fn initial_cursor(&self) -> (i32, i32) {
        self.initial_cursor
    }

    /// Some terminals silently truncate long SGR parameter lists; the
    /// renderer splits at this bound.
    #[must_use]
    pub fn max_csi_parameters(&self) -> usize {
        if self.family == Family::Mlterm { 10 } else { 15 }
    }

    #[must_use]
    pub fn detection_state(&self) -> DetectionState {
        match self.state {
            None => DetectionState::NotStarted,
            Some(State::Finished) => DetectionState::Done,
            Some(_) => DetectionState::Running,
        }
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == Some(State::Finished)
    }

    /// Begin detection: reset identification state and issue the basic
    /// compatibility wave.
    pub fn start(&mut self, caps: &mut CapabilitySet) -> Vec<DetectAction> {
        self.family = Family::Unknown;
        self.version = 0;
        self.confidence = 0;
        self.initial_cursor = (-1, -1);
        self.glitch_cursor = None;
        self.seen_dec_terminal_param = false;
        *caps = CapabilitySet::new();

        self.state = Some(State::BasicCompat);
        let mut actions = Vec::new();
        actions.push(DetectAction::ExpectCursorPositionReport);
        actions.push(DetectAction::ExpectCursorPositionReport);
        send(
            &mut actions,
            concat!(csi!("5n"), csi!("6n"), csi!(">c"), csi!("6n"), csi!("5n")),
        );
        actions.push(DetectAction::AwaitingResponse);
        actions
    }

    fn set_family(&mut self, family: Family, confidence: i32) {
        debug!(%family, confidence, "terminal family candidate");
        self.family = family;
        self.confidence = confidence;
    }

    /// Queue the self-reporting wave (`CSI > q`, plus a terminfo name
    /// query on candidates known to answer it safely).
    fn prepare_self_reporting(&mut self, actions: &mut Vec<DetectAction>) {
        send(actions, csi!(">q"));

        let attrs = &self.sec_dev_attributes;
        let mut might_be_kitty = false;
        if let Some(rest) = attrs.strip_prefix(b"\x1b[>1;") {
            let mut val: i32 = 0;
            for &byte in rest {
                if byte.is_ascii_digit() {
                    val = val.saturating_mul(10).saturating_add(i32::from(byte - b'0'));
                } else {
                    if byte == b';' && val >= 4000 {
                        might_be_kitty = true;
                    }
                    break;
                }
            }
        }
        let might_be_iterm2 =
            !self.seen_dec_terminal_param && attrs.as_slice() == b"\x1b[>0;95;0c";
        let might_be_mlterm =
            self.seen_dec_terminal_param && attrs.as_slice() == b"\x1b[>24;279;0c";

        if might_be_kitty || might_be_iterm2 || might_be_mlterm {
            send(actions, dcs!("+q544e"));
        }
        send(actions, csi!("5n"));
        actions.push(DetectAction::AwaitingResponse);
        self.state = Some(State::SelfReporting);
    }

    /// Reposition to the initial cursor position and start walking over
    /// glitch output with space-then-report cycles.
    fn begin_glitch_patching(&mut self, actions: &mut Vec<DetectAction>, caps: &CapabilitySet) {
        self.state = Some(State::GlitchPatching);

        let (reset_x, mut reset_y) = (self.initial_cursor.0, self.initial_cursor.1);
        if let Some((glitch_x, glitch_y)) = self.glitch_cursor {
            if reset_y == glitch_y && reset_x > glitch_x {
                // glitches on the last line wrap and scroll, which moves
                // the reported position left on the same line; the drift
                // started one line up
                reset_y -= 1;
            }
        }

        let mut seq = format!("\x1b[{};{}H ", reset_y + 1, reset_x + 1).into_bytes();
        if caps.has(Capability::SafePositionReport) {
            seq.extend_from_slice(b"\x1b[?6n");
        } else {
            actions.push(DetectAction::ExpectCursorPositionReport);
            seq.extend_from_slice(b"\x1b[6n");
        }
        actions.push(DetectAction::Send(seq));
    }

    fn fingerprint1_wave(&mut self, actions: &mut Vec<DetectAction>) {
        send(actions, b"\x1b[=c\x1b[>1c\x1b[?6n\x1b[1x\x1b[5n");
        actions.push(DetectAction::AwaitingResponse);
        self.state = Some(State::Fingerprint1);
    }

    fn finish(&mut self) {
        self.state = Some(State::Finished);
    }

    /// Classify the terminal from the collected replies and set the final
    /// capability flags. Called once when detection is finished.
    pub fn apply_profile(&mut self, caps: &mut CapabilitySet) {
        apply_family_profile(self, caps);
        debug!(family = %self.family, version = self.version, "terminal detection finished");
    }

    pub(crate) fn sec_dev_attributes(&self) -> &[u8] {
        &self.sec_dev_attributes
    }

    pub(crate) fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    /// Advance the state machine by one event.
    #[allow(clippy::too_many_lines)]
    pub fn on_event(&mut self, event: &Event, caps: &mut CapabilitySet) -> Vec<DetectAction> {
        let Some(state) = self.state else {
            return Vec::new();
        };
        if state == State::Finished {
            return Vec::new();
        }
        let mut actions = Vec::new();
        trace!(?state, ?event, "detection event");

        let handled = match state {
            State::Finished => false,

            State::BasicCompat => match event {
                Event::Misc(MiscAtom::Resync) => {
                    self.state = Some(State::BasicQuery);
                    true
                }
                Event::CursorPosition { x, y, .. } => {
                    // the status report went unanswered but cursor
                    // reporting works: not usable for input handling
                    self.initial_cursor = (*x, *y);
                    self.set_family(Family::Incompatible, 0);
                    self.state = Some(State::IncompatibleCursorRecved);
                    true
                }
                Event::Char { ch: '0', modifier } if *modifier == Modifiers::ALT => {
                    // hterm answers CSI 5 n with the bracket missing
                    self.set_family(Family::Incompatible, 0);
                    self.state = Some(State::HtermRecovery1);
                    true
                }
                _ => false,
            },

            State::IncompatibleCursorRecved => match event {
                Event::CursorPosition { .. } => {
                    self.finish();
                    true
                }
                Event::RawSecondaryDeviceAttributes(_) => {
                    // no use, but the cursor report is still in flight
                    true
                }
                _ => false,
            },

            State::BasicQuery => match event {
                Event::CursorPosition { x, y, .. } => {
                    self.initial_cursor = (*x, *y);
                    self.state = Some(State::BasicCursorRecved);
                    true
                }
                Event::RawSecondaryDeviceAttributes(_) => {
                    // answered out of order: device attributes before the
                    // cursor report
                    self.set_family(Family::TooDumb, 0);
                    self.state = Some(State::ExpectSyncThenFinish);
                    true
                }
                Event::Misc(MiscAtom::Resync) => {
                    self.set_family(Family::TooDumb, 0);
                    self.finish();
                    true
                }
                _ => false,
            },

            State::BasicCursorRecved => match event {
                Event::RawSecondaryDeviceAttributes(data) => {
                    caps.promise(Capability::CsiGreater);
                    self.sec_dev_attributes = data.clone();
                    if data.starts_with(b"\x1b[>85;") {
                        // urxvt: first parameter is 'U' / 85 (except 7.3/7.4)
                        caps.promise(Capability::CsiEquals);
                        self.set_family(Family::Urxvt, 2);
                    }
                    if data.starts_with(b"\x1b[>83;") {
                        // 83 = 'S'; second parameter is the version
                        caps.promise(Capability::CsiEquals);
                        self.set_family(Family::Screen, 2);
                    }
                    if data.starts_with(b"\x1b[>84;") {
                        // 84 = 'T'; no version here
                        caps.promise(Capability::CsiEquals);
                        self.set_family(Family::Tmux, 2);
                    }
                    if data.starts_with(b"\x1b[>77;") {
                        // 77 = 'M'; second parameter is the version
                        caps.promise(Capability::CsiEquals);
                        self.set_family(Family::Mintty, 2);
                    }
                    self.state = Some(State::BasicSecDevRecvedConsumeCursor);
                    true
                }
                Event::RawPrimaryDeviceAttributes(_) => {
                    // primary attributes were never requested: the
                    // terminal gets basic parsing rules wrong
                    self.set_family(Family::TooDumb, 0);
                    self.state = Some(State::DrainToFinish);
                    true
                }
                Event::CursorPosition { x, y, .. } => {
                    if self.initial_cursor == (*x, *y) {
                        caps.promise(Capability::CsiGreater);
                        self.state = Some(State::BasicNoSecDevCursorRecved);
                    } else {
                        // the queries left printed characters behind
                        caps.disable(Capability::CsiGreater);
                        self.set_family(Family::Misparsing, 0);
                        self.glitch_cursor = Some((*x, *y));
                        self.state = Some(State::BasicMisparsing);
                    }
                    true
                }
                _ => false,
            },

            State::BasicMisparsing => match event {
                Event::Misc(MiscAtom::Resync) => {
                    self.begin_glitch_patching(&mut actions, caps);
                    true
                }
                _ => false,
            },

            State::BasicNoSecDevCursorRecved => match event {
                Event::Misc(MiscAtom::Resync) => {
                    caps.promise(Capability::CsiGreater);
                    self.fingerprint1_wave(&mut actions);
                    true
                }
                _ => false,
            },

            State::BasicSecDevRecvedConsumeCursor => match event {
                Event::CursorPosition { .. } => {
                    self.state = Some(State::BasicSecDevRecved);
                    true
                }
                _ => false,
            },

            State::BasicSecDevRecved => match event {
                Event::Misc(MiscAtom::Resync) => {
                    if self.confidence >= 2 {
                        if self.family == Family::Urxvt {
                            // distinguish 88 and 256 color mode by whether
                            // palette entry 255 answers. BEL terminated:
                            // urxvt mangles ESC \ terminated queries.
                            caps.promise(Capability::Color88);
                            send(&mut actions, b"\x1b]4;255;?\x07");
                            send(&mut actions, csi!("5n"));
                            self.state = Some(State::UrxvtPaletteProbe);
                        } else {
                            self.prepare_self_reporting(&mut actions);
                        }
                    } else {
                        self.fingerprint1_wave(&mut actions);
                    }
                    true
                }
                _ => false,
            },

            State::UrxvtPaletteProbe => match event {
                Event::Misc(MiscAtom::Resync) => {
                    self.prepare_self_reporting(&mut actions);
                    true
                }
                Event::PaletteColorReport { .. } => {
                    caps.disable(Capability::Color88);
                    true
                }
                _ => false,
            },

            State::Fingerprint1 => match event {
                Event::Misc(MiscAtom::Resync) => {
                    if self.confidence == 0 {
                        self.set_family(Family::Base, 0);
                    }
                    caps.disable(Capability::SafePositionReport);
                    // check whether CSI = c was misparsed
                    actions.push(DetectAction::ExpectCursorPositionReport);
                    send(&mut actions, csi!("6n"));
                    actions.push(DetectAction::AwaitingResponse);
                    self.state = Some(State::Fp1Cleanup);
                    true
                }
                Event::RawTertiaryDeviceAttributes(data) => {
                    caps.promise(Capability::CsiEquals);
                    self.classify_tertiary_id(data);
                    true
                }
                Event::RawSecondaryDeviceAttributes(_) => {
                    self.state = Some(State::Fp1SecDevRecved);
                    true
                }
                Event::CursorPosition { x, y, safe } => {
                    if *safe {
                        caps.promise(Capability::SafePositionReport);
                    } else {
                        caps.disable(Capability::SafePositionReport);
                    }
                    if self.initial_cursor != (*x, *y) {
                        self.glitch_cursor = Some((*x, *y));
                        self.set_family(Family::Base, 0);
                    } else {
                        caps.promise(Capability::CsiEquals);
                        self.set_family(Family::Base, 0);
                    }
                    self.state = Some(State::Fp1SafeCursorRecved);
                    true
                }
                Event::RawDecRequestTermParam(_) => {
                    self.seen_dec_terminal_param = true;
                    if self.confidence == 0 {
                        self.set_family(Family::Base, 0);
                    }
                    caps.disable(Capability::SafePositionReport);
                    self.state = Some(State::Fp1CleanupAfterSync);
                    true
                }
                Event::RawPrimaryDeviceAttributes(_) => {
                    // terminals that misinterpret CSI = c as CSI c
                    self.state = Some(State::Fp1TermIdAliasedToPrimary);
                    true
                }
                _ => false,
            },

            State::Fp1TermIdAliasedToPrimary => match event {
                Event::Misc(MiscAtom::Resync) => {
                    self.set_family(Family::Base, 0);
                    self.finish();
                    true
                }
                Event::RawDecRequestTermParam(_) => {
                    self.seen_dec_terminal_param = true;
                    self.set_family(Family::MacOs, 0);
                    self.state = Some(State::ExpectSyncThenFinish);
                    true
                }
                _ => {
                    self.set_family(Family::Base, 0);
                    self.state = Some(State::DrainToFinish);
                    true
                }
            },

            State::Fp1Cleanup => match event {
                Event::CursorPosition { x, y, .. } => {
                    if self.initial_cursor != (*x, *y) {
                        self.glitch_cursor = Some((*x, *y));
                        self.begin_glitch_patching(&mut actions, caps);
                    } else {
                        caps.promise(Capability::CsiEquals);
                        self.prepare_self_reporting(&mut actions);
                    }
                    true
                }
                _ => false,
            },

            State::ExpectSyncThenFinish => match event {
                Event::Misc(MiscAtom::Resync) => {
                    self.finish();
                    true
                }
                _ => false,
            },

            State::Fp1CleanupAfterSync => match event {
                Event::Misc(MiscAtom::Resync) => {
                    // check whether CSI = c was misparsed
                    if caps.has(Capability::SafePositionReport) {
                        send(&mut actions, csi!("?6n"));
                    } else {
                        actions.push(DetectAction::ExpectCursorPositionReport);
                        send(&mut actions, csi!("6n"));
                    }
                    actions.push(DetectAction::AwaitingResponse);
                    self.state = Some(State::Fp1Cleanup);
                    true
                }
                _ => false,
            },

            State::DrainToSelfReporting => match event {
                Event::Misc(MiscAtom::Resync) => {
                    self.prepare_self_reporting(&mut actions);
                    true
                }
                Event::Key { .. } | Event::Char { .. } => false,
                _ => true,
            },

            State::ExpectSyncThenSelfReport => match event {
                Event::Misc(MiscAtom::Resync) => {
                    self.prepare_self_reporting(&mut actions);
                    true
                }
                _ => false,
            },

            State::SelfReporting => match event {
                Event::Misc(MiscAtom::Resync) => {
                    self.finish();
                    true
                }
                Event::RawTermName(data) => {
                    self.self_reported_name = data.clone();
                    if data.starts_with(b"terminology ") {
                        self.family = Family::Terminology;
                    }
                    true
                }
                Event::RawTerminfoQueryReply(data) => {
                    self.classify_terminfo_reply(data);
                    true
                }
                _ => false,
            },

            State::DrainToFinish => match event {
                Event::Misc(MiscAtom::Resync) => {
                    self.finish();
                    true
                }
                Event::Key { .. } | Event::Char { .. } => false,
                _ => true,
            },

            State::Fp1TermIdRecved => match event {
                Event::Misc(MiscAtom::Resync) => {
                    caps.disable(Capability::SafePositionReport);
                    self.prepare_self_reporting(&mut actions);
                    true
                }
                Event::RawSecondaryDeviceAttributes(_) => {
                    self.state = Some(State::Fp1TermIdAndSecDevRecved);
                    true
                }
                Event::CursorPosition { safe, .. } => {
                    // keep the family derived from the terminal id
                    if *safe {
                        caps.promise(Capability::SafePositionReport);
                    } else {
                        caps.disable(Capability::SafePositionReport);
                    }
                    self.state = Some(State::DrainToSelfReporting);
                    true
                }
                Event::RawDecRequestTermParam(_) => {
                    self.seen_dec_terminal_param = true;
                    caps.disable(Capability::SafePositionReport);
                    self.state = Some(State::ExpectSyncThenSelfReport);
                    true
                }
                _ => false,
            },

            State::Fp1TermIdAndSecDevRecved => match event {
                Event::Misc(MiscAtom::Resync) => {
                    caps.disable(Capability::SafePositionReport);
                    self.prepare_self_reporting(&mut actions);
                    true
                }
                Event::CursorPosition { safe, .. } => {
                    if *safe {
                        caps.promise(Capability::SafePositionReport);
                    } else {
                        caps.disable(Capability::SafePositionReport);
                    }
                    self.state = Some(State::DrainToSelfReporting);
                    true
                }
                Event::RawDecRequestTermParam(_) => {
                    self.seen_dec_terminal_param = true;
                    true
                }
                _ => false,
            },

            State::Fp1SecDevRecved => match event {
                Event::Misc(MiscAtom::Resync) => {
                    caps.disable(Capability::SafePositionReport);
                    actions.push(DetectAction::ExpectCursorPositionReport);
                    // detect if CSI = c was misparsed, then fingerprint 2
                    send(&mut actions, concat!(csi!("6n"), csi!(">0;1c"), csi!("5n")));
                    actions.push(DetectAction::AwaitingResponse);
                    self.state = Some(State::Fingerprint2);
                    true
                }
                Event::CursorPosition { x, y, safe } => {
                    if *safe {
                        caps.promise(Capability::SafePositionReport);
                    } else {
                        caps.disable(Capability::SafePositionReport);
                    }
                    if self.initial_cursor != (*x, *y) {
                        self.glitch_cursor = Some((*x, *y));
                    } else {
                        caps.promise(Capability::CsiEquals);
                    }
                    self.state = Some(State::Fp1SecDevAndSafeCursorRecved);
                    true
                }
                Event::RawDecRequestTermParam(_) => {
                    self.seen_dec_terminal_param = true;
                    true
                }
                _ => false,
            },

            State::Fp1SafeCursorRecved => match event {
                Event::Misc(MiscAtom::Resync) => {
                    if self.glitch_cursor.is_some() {
                        self.begin_glitch_patching(&mut actions, caps);
                    } else {
                        self.prepare_self_reporting(&mut actions);
                    }
                    true
                }
                Event::RawDecRequestTermParam(_) => {
                    self.seen_dec_terminal_param = true;
                    if !self.sec_dev_attributes.is_empty()
                        && caps.has(Capability::SafePositionReport)
                        && caps.has(Capability::CsiEquals)
                        && self.sec_dev_attributes.ends_with(b";0c")
                    {
                        self.family = Family::Xterm;
                    }
                    true
                }
                _ => false,
            },

            State::Fp1SecDevAndSafeCursorRecved => match event {
                Event::Misc(MiscAtom::Resync) => {
                    send(&mut actions, concat!(csi!(">0;1c"), csi!("5n")));
                    actions.push(DetectAction::AwaitingResponse);
                    self.state = Some(State::Fp2CursorDone);
                    true
                }
                Event::RawDecRequestTermParam(data) => {
                    self.seen_dec_terminal_param = true;
                    if !self.sec_dev_attributes.is_empty()
                        && data.as_slice() == b"\x1b[?x"
                        && self.glitch_cursor.is_none()
                    {
                        // VTE < 0.54 answers CSI 1 x this way; its fragile
                        // dictionary parsing would misparse the self
                        // reporting wave, so skip it
                        self.family = Family::Vte;
                        self.state = Some(State::ExpectSyncThenFinish);
                    }
                    true
                }
                _ => false,
            },

            State::Fingerprint2 => match event {
                Event::CursorPosition { x, y, .. } => {
                    if self.initial_cursor != (*x, *y) {
                        self.glitch_cursor = Some((*x, *y));
                    } else {
                        caps.promise(Capability::CsiEquals);
                    }
                    self.state = Some(State::Fp2CursorDone);
                    true
                }
                _ => false,
            },

            State::Fp2CursorDone => match event {
                Event::Misc(MiscAtom::Resync) => {
                    if self.confidence == 0 {
                        self.set_family(Family::Base, 0);
                    }
                    if self.glitch_cursor.is_none() {
                        self.prepare_self_reporting(&mut actions);
                    } else {
                        self.begin_glitch_patching(&mut actions, caps);
                    }
                    true
                }
                Event::RawSecondaryDeviceAttributes(_) => {
                    self.state = Some(State::Fp2SecDevRecved1);
                    true
                }
                _ => false,
            },

            State::Fp2SecDevRecved1 => match event {
                Event::Misc(MiscAtom::Resync) => {
                    if self.confidence == 0 {
                        self.set_family(Family::Base, 0);
                    }
                    if self.glitch_cursor.is_none() {
                        self.prepare_self_reporting(&mut actions);
                    } else {
                        self.begin_glitch_patching(&mut actions, caps);
                    }
                    true
                }
                Event::RawSecondaryDeviceAttributes(_) => {
                    // a second answer to a single query: konsole
                    if self.sec_dev_attributes.is_empty() {
                        if self.confidence == 0 {
                            self.set_family(Family::Base, 0);
                        }
                    } else {
                        self.family = Family::Konsole;
                    }
                    self.state = Some(State::Fp2SecDevRecved2);
                    true
                }
                _ => false,
            },

            State::Fp2SecDevRecved2 => match event {
                Event::Misc(MiscAtom::Resync) => {
                    if self.glitch_cursor.is_none() {
                        self.prepare_self_reporting(&mut actions);
                    } else {
                        self.begin_glitch_patching(&mut actions, caps);
                    }
                    true
                }
                _ => false,
            },

            State::GlitchPatching => match event {
                Event::CursorPosition { x, y, .. } => {
                    let (glitch_x, glitch_y) = self.glitch_cursor.unwrap_or((0, 0));
                    if *y < glitch_y || (*y == glitch_y && *x < glitch_x) {
                        let mut seq = b" ".to_vec();
                        if caps.has(Capability::SafePositionReport) {
                            seq.extend_from_slice(b"\x1b[?6n");
                        } else {
                            actions.push(DetectAction::ExpectCursorPositionReport);
                            seq.extend_from_slice(b"\x1b[6n");
                        }
                        actions.push(DetectAction::Send(seq));
                    } else {
                        self.glitch_cursor = None;
                        self.finish();
                    }
                    true
                }
                _ => false,
            },

            State::HtermRecovery1 => match event {
                Event::Char { ch: '0', modifier } if *modifier == Modifiers::ALT => {
                    self.state = Some(State::HtermRecovery2);
                    true
                }
                Event::Char { ch: 'n', modifier } if modifier.is_empty() => true,
                Event::CursorPosition { .. } | Event::RawSecondaryDeviceAttributes(_) => true,
                _ => false,
            },

            State::HtermRecovery2 => match event {
                Event::Char { ch: 'n', modifier } if modifier.is_empty() => {
                    self.finish();
                    true
                }
                _ => false,
            },
        };

        if !handled {
            // ran off the state chart: give up instead of hanging
            debug!(?state, ?event, "detection ran off its state chart");
            self.set_family(Family::TooDumb, 0);
            *caps = CapabilitySet::minimal();
            self.finish();
        }

        actions
    }

    /// Map the DA3 hex id to a family. Unknown ids enable the full
    /// feature set; new terminals must allocate their own id rather than
    /// faking a known one.
    fn classify_tertiary_id(&mut self, data: &[u8]) {
        if data.len() == 8 {
            match data {
                b"7E565445" => self.set_family(Family::Vte, 2), // ~VTE
                b"7E7E5459" => self.set_family(Family::Terminology, 2), // ~~TY
                b"7E4C4E58" => self.set_family(Family::LinuxVc, 2), // ~LNX
                b"00000000" => {
                    // xterm uses this since 336, Microsoft Terminal too
                    self.set_family(Family::Base, 0);
                    if self.sec_dev_attributes.as_slice() == b"\x1b[>0;10;1c" {
                        self.set_family(Family::MsTerminal, 1);
                    } else if let Some(version) =
                        parse_second_parameter(&self.sec_dev_attributes)
                    {
                        if version >= 336 {
                            self.set_family(Family::Xterm, 1);
                        }
                    }
                }
                _ => self.set_family(Family::Full, 1),
            }
            self.state = Some(State::Fp1TermIdRecved);
        } else if data == b"0" {
            // xterm between 280 and 335
            let attrs = &self.sec_dev_attributes;
            if attrs.len() == 12
                && attrs.starts_with(b"\x1b[>41;")
                && attrs[6..9].iter().all(u8::is_ascii_digit)
                && &attrs[9..] == b";0c"
            {
                let version = i32::from(attrs[6] - b'0') * 100
                    + i32::from(attrs[7] - b'0') * 10
                    + i32::from(attrs[8] - b'0');
                if (280..=335).contains(&version) {
                    self.set_family(Family::Xterm, 1);
                    self.state = Some(State::Fp1TermIdRecved);
                }
            }
        }
    }

    /// Decode a `TN` terminfo reply; only successful reports count.
    fn classify_terminfo_reply(&mut self, data: &[u8]) {
        if data.len() < 8 || data[0] != b'1' {
            return;
        }
        if !data[3..].get(..5).is_some_and(|k| k.eq_ignore_ascii_case(b"544e=")) {
            return;
        }
        let Ok(name) = hex::decode(&data[8..]) else {
            return;
        };
        if name == b"xterm-kitty" {
            self.family = Family::Kitty;
        } else if name == b"iTerm2" {
            self.family = Family::Iterm2;
        } else if name == b"mlterm" {
            self.family = Family::Mlterm;
        }
    }
}

/// Extract the second `;`-separated numeric parameter from a secondary
/// device attributes reply (`CSI > a ; version ; c`).
pub(crate) fn parse_second_parameter(attrs: &[u8]) -> Option<i32> {
    if attrs.len() <= 10 {
        return None;
    }
    let first_sep = attrs.iter().position(|&b| b == b';')?;
    let mut version: i32 = 0;
    let mut saw_digit = false;
    for &byte in &attrs[first_sep + 1..] {
        if byte.is_ascii_digit() {
            version = version.saturating_mul(10).saturating_add(i32::from(byte - b'0'));
            saw_digit = true;
        } else if byte == b';' && saw_digit {
            return Some(version);
        } else {
            return None;
        }
    }
    None
}
