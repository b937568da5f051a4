//! Terminal assembly: surface, renderer, decoder and detector wired to an
//! [`Integration`].

use tracing::trace;
use vtdecode::{Event, InputDecoder, LegacyMouseMode, Quirk};
use vtwire::csi;
use vtdetect::{Capability, CapabilitySet, DetectAction, DetectionState, Detector, Family};
use vtsurface::Surface;

use crate::colors::ColorSlots;
use crate::cursor::CursorStyle;
use crate::integration::Integration;
use crate::render::{RenderSettings, render_frame};
use crate::restore::RestoreSequence;

const DISABLE_MOUSE_SEQUENCE: &str = concat!(
    csi!("?1003l"),
    csi!("?1002l"),
    csi!("?1000l"),
    csi!("?1006l"),
    csi!("?1015l")
);
const ENABLE_MOUSE_PROTOCOLS: &str = concat!(csi!("?1015h"), csi!("?1006h"));

/// Mouse reporting granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MouseMode {
    #[default]
    Off,
    /// Button presses and releases.
    Clicks,
    /// Clicks plus motion while a button is held.
    Drag,
    /// All motion events.
    Movement,
}

/// How title changes interact with the terminal's title stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleMode {
    /// Only change the title when it can be restored afterwards.
    EnsureRestore,
    /// Change the title even when restoring is not possible.
    PreferRestore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorCache {
    /// No style command sent yet; the first one registers a reset in the
    /// restore sequence.
    Untouched,
    /// Resend the style command regardless of the cached value.
    ForceResend,
    Sent(i32),
}

type EventHandler = Box<dyn FnMut(Event)>;
type RawFilter = Box<dyn FnMut(&[u8], bool) -> bool>;

/// A terminal attached through an [`Integration`].
pub struct Terminal<I: Integration> {
    integration: I,
    surface: Surface,
    decoder: InputDecoder,
    detector: Detector,
    caps: CapabilitySet,

    event_handler: Option<EventHandler>,
    raw_filter: Option<RawFilter>,

    bad: bool,
    force_full_repaint: bool,
    request_repaint: bool,
    data_pending_after_input: bool,
    max_csi_parameters: usize,

    cursor_position: Option<(i32, i32)>,
    cursor_visible: bool,
    cursor_style: Option<CursorStyle>,
    cursor_blink: bool,
    cursor_cache: CursorCache,

    did_disable_wrap: bool,
    did_push_title: bool,
    did_enable_mouse: bool,
    did_mouse_restore: bool,
    did_focus_restore: bool,
    did_paste_restore: bool,

    restore: RestoreSequence,
    colors: ColorSlots,
    unpause_basic_setup: Vec<u8>,
    unpause_snippets: Vec<(&'static str, Vec<u8>)>,
}

fn push_int(out: &mut Vec<u8>, value: i32) {
    let mut buffer = itoa::Buffer::new();
    out.extend_from_slice(buffer.format(value).as_bytes());
}

/// Space-separated option lookup for the setup option strings.
fn has_option(options: &str, name: &str) -> bool {
    options.split(' ').any(|word| word == name)
}

impl<I: Integration> Terminal<I> {
    #[must_use]
    pub fn new(integration: I, width: i32, height: i32) -> Self {
        Self {
            integration,
            surface: Surface::with_shadow(width, height),
            decoder: InputDecoder::new(),
            detector: Detector::new(),
            caps: CapabilitySet::new(),
            event_handler: None,
            raw_filter: None,
            bad: false,
            force_full_repaint: false,
            request_repaint: false,
            data_pending_after_input: false,
            max_csi_parameters: 15,
            cursor_position: None,
            cursor_visible: true,
            cursor_style: None,
            cursor_blink: true,
            cursor_cache: CursorCache::Untouched,
            did_disable_wrap: false,
            did_push_title: false,
            did_enable_mouse: false,
            did_mouse_restore: false,
            did_focus_restore: false,
            did_paste_restore: false,
            restore: RestoreSequence::new(),
            colors: ColorSlots::new(),
            unpause_basic_setup: Vec::new(),
            unpause_snippets: Vec::new(),
        }
    }

    // --- plumbing --------------------------------------------------------

    #[must_use]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut Surface {
        &mut self.surface
    }

    pub fn integration(&self) -> &I {
        &self.integration
    }

    pub fn integration_mut(&mut self) -> &mut I {
        &mut self.integration
    }

    /// Resize the primary surface; contents are discarded and the next
    /// flush repaints everything.
    pub fn resize(&mut self, width: i32, height: i32) {
        self.surface.resize(width, height);
        self.force_full_repaint = true;
    }

    pub fn set_event_handler(&mut self, handler: impl FnMut(Event) + 'static) {
        self.event_handler = Some(Box::new(handler));
    }

    /// Pre-empt event decoding: the filter sees raw frames and may swallow
    /// them. Not consulted while detection runs.
    pub fn set_raw_input_filter(&mut self, filter: impl FnMut(&[u8], bool) -> bool + 'static) {
        self.raw_filter = Some(Box::new(filter));
    }

    /// Sticky failure state; set when the integration reports a hard
    /// error. All output operations are no-ops afterwards.
    #[must_use]
    pub fn is_bad(&self) -> bool {
        self.bad || self.integration.is_bad()
    }

    fn guard(&mut self) -> bool {
        if self.bad {
            return true;
        }
        if self.integration.is_bad() {
            self.bad = true;
            self.integration
                .logging(b"integration reported failure; terminal output disabled");
            return true;
        }
        false
    }

    fn emit_event(&mut self, event: Event) {
        if let Some(mut handler) = self.event_handler.take() {
            handler(event);
            self.event_handler = Some(handler);
        }
    }

    // --- capabilities ----------------------------------------------------

    #[must_use]
    pub fn capable(&self, capability: Capability) -> bool {
        self.caps.has(capability)
    }

    /// Assert a capability the host knows the terminal has.
    pub fn promise_capability(&mut self, capability: Capability) {
        self.caps.promise(capability);
    }

    /// Drop a capability the host knows the terminal lacks.
    pub fn disable_capability(&mut self, capability: Capability) {
        self.caps.disable(capability);
    }

    #[must_use]
    pub fn should_use_truecolor(&self) -> bool {
        self.caps.use_truecolor()
    }

    // --- input -----------------------------------------------------------

    /// Feed raw bytes read from the terminal. Events are delivered to the
    /// event handler, or consumed by detection while it runs.
    pub fn add_input_data(&mut self, data: &[u8]) {
        let mut events = Vec::new();
        {
            let detecting = self.detector.detection_state() == DetectionState::Running;
            let raw_filter = &mut self.raw_filter;
            self.decoder.feed_with_filter(
                data,
                &mut |frame: &[u8], overflow: bool| {
                    if detecting {
                        return false;
                    }
                    match raw_filter.as_mut() {
                        Some(filter) => filter(frame, overflow),
                        None => false,
                    }
                },
                &mut |event| events.push(event),
            );
        }
        for event in events {
            self.dispatch_event(event);
        }

        let detecting = self.detector.detection_state() == DetectionState::Running;
        if !detecting && self.request_repaint {
            self.request_repaint = false;
            self.emit_event(Event::RepaintRequested);
        }

        if !detecting && self.decoder.buffered_len() > 0 {
            // a reply may be stuck in the tokenizer (e.g. a lone ESC); a
            // status query forces the terminal to flush it out
            self.data_pending_after_input = true;
            self.integration.request_callback();
        } else {
            self.data_pending_after_input = false;
        }
    }

    /// Host-driven follow-up after
    /// [`Integration::request_callback`]: issue the resync query that
    /// resolves incompletely received sequences.
    pub fn callback(&mut self) {
        if self.data_pending_after_input {
            self.data_pending_after_input = false;
            self.integration.write(b"\x1b[5n");
            self.integration.awaiting_response();
            self.integration.flush();
        }
    }

    fn dispatch_event(&mut self, event: Event) {
        if self.detector.detection_state() == DetectionState::Running {
            let actions = self.detector.on_event(&event, &mut self.caps);
            self.execute_actions(actions);
            self.integration.flush();
            if self.detector.is_finished() {
                self.detector.apply_profile(&mut self.caps);
                self.max_csi_parameters = self.detector.max_csi_parameters();
                let mut note = b"auto detection: ".to_vec();
                note.extend_from_slice(self.auto_detect_result_text().as_bytes());
                self.integration.logging(&note);
                self.emit_event(Event::AutoDetectFinished);
            }
            return;
        }

        if let Event::ColorSlotReport { slot, color } = &event {
            self.note_color_slot_report(*slot, color.clone());
        }
        self.emit_event(event);
    }

    fn execute_actions(&mut self, actions: Vec<DetectAction>) {
        for action in actions {
            match action {
                DetectAction::Send(bytes) => self.integration.write(&bytes),
                DetectAction::ExpectCursorPositionReport => {
                    self.decoder.expect_cursor_position_report();
                }
                DetectAction::AwaitingResponse => self.integration.awaiting_response(),
            }
        }
    }

    // --- input modes -----------------------------------------------------

    pub fn expect_cursor_position_report(&mut self) {
        self.decoder.expect_cursor_position_report();
    }

    pub fn expect_legacy_mouse_reports(&mut self, mode: LegacyMouseMode) {
        self.decoder.expect_legacy_mouse_reports(mode);
    }

    pub fn expect_apc_input_sequences(&mut self, enable: bool) {
        self.decoder.expect_apc_sequences(enable);
    }

    /// Toggle paste grouping (enabled by default).
    pub fn handle_paste(&mut self, enable: bool) {
        self.decoder.handle_paste(enable);
    }

    pub fn activate_input_quirk(&mut self, quirk: Quirk) {
        self.decoder.activate_quirk(quirk);
    }

    /// Apply input quirks derived from the host environment after
    /// detection (the terminfo `kbs` setting, in practice).
    pub fn apply_input_quirks(&mut self, backspace_is_x08: bool) {
        if backspace_is_x08 {
            self.decoder.activate_quirk(Quirk::BackspaceX08AndX7fSwapped);
        }
    }

    // --- detection -------------------------------------------------------

    /// Start terminal auto-detection. Returns false without an event
    /// handler, since completion is signalled through it.
    pub fn auto_detect(&mut self) -> bool {
        if self.event_handler.is_none() {
            return false;
        }
        let actions = self.detector.start(&mut self.caps);
        self.execute_actions(actions);
        self.integration.flush();
        true
    }

    #[must_use]
    pub fn auto_detect_state(&self) -> DetectionState {
        self.detector.detection_state()
    }

    #[must_use]
    pub fn might_be_supported(&self) -> bool {
        self.detector.family().might_be_supported()
    }

    #[must_use]
    pub fn family(&self) -> Family {
        self.detector.family()
    }

    #[must_use]
    pub fn version(&self) -> i32 {
        self.detector.version()
    }

    #[must_use]
    pub fn self_reported_name_and_version(&self) -> Option<&str> {
        self.detector.self_reported_name()
    }

    /// Human readable summary of the detection result.
    #[must_use]
    pub fn auto_detect_result_text(&self) -> String {
        let safe = if self.caps.has(Capability::SafePositionReport) {
            "safe"
        } else {
            "unsafe"
        };
        format!(
            "Terminal: {} version: {} ({} position reports)",
            self.detector.family(),
            self.detector.version(),
            safe
        )
    }

    // --- cursor ----------------------------------------------------------

    /// Position the cursor at flush time; `None` leaves it wherever
    /// painting ends.
    pub fn set_cursor_position(&mut self, position: Option<(i32, i32)>) {
        self.cursor_position = position;
    }

    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor_visible = visible;
    }

    pub fn set_cursor_style(&mut self, style: CursorStyle, blink: bool) {
        self.cursor_style = Some(style);
        self.cursor_blink = if style == CursorStyle::TermDefault {
            true
        } else {
            blink
        };
    }

    fn update_cursor_style(&mut self, out: &mut Vec<u8>) {
        let Some(style) = self.cursor_style else {
            return;
        };
        if !self.caps.has(Capability::MayTryCursorShape) {
            return;
        }

        let blink_offset = i32::from(!self.cursor_blink);
        let mut cmd = style as i32 + blink_offset;
        if style == CursorStyle::Bar && !self.caps.has(Capability::MayTryCursorShapeBar) {
            // e.g. xterm < 282 ignores the bar style
            cmd = CursorStyle::Block as i32 + blink_offset;
        }

        let mut reset_sequence: &[u8] = b"\x1b[0 q";
        if self.cursor_cache != CursorCache::Sent(cmd) {
            if self.caps.has(Capability::CursorShapeOsc50) {
                // konsole; versions that understand CSI SP q cannot be
                // told apart, so stay on the OSC form
                let shape = match style {
                    CursorStyle::Bar => "1",
                    CursorStyle::Underline => "2",
                    _ => "0",
                };
                out.extend_from_slice(b"\x1b]50;CursorShape=");
                out.extend_from_slice(shape.as_bytes());
                out.extend_from_slice(b";BlinkingCursorEnabled=");
                out.extend_from_slice(if self.cursor_blink { b"1" } else { b"0" });
                out.push(0x07);
                reset_sequence = b"\x1b]50;CursorShape=0;BlinkingCursorEnabled=0\x07";
            } else {
                out.extend_from_slice(b"\x1b[");
                push_int(out, cmd);
                out.extend_from_slice(b" q");
            }
        }
        if self.cursor_cache == CursorCache::Untouched {
            // the original style is unknowable; restore to the default
            self.restore.prepend(reset_sequence);
            self.integration
                .restore_sequence_updated(self.restore.as_bytes());
        }
        self.cursor_cache = CursorCache::Sent(cmd);
    }

    // --- painting --------------------------------------------------------

    /// Transmit the difference between the current surface and the last
    /// flushed state (everything, when `full_repaint` is set).
    pub fn flush(&mut self, full_repaint: bool) {
        if self.guard() {
            return;
        }
        let full_repaint = full_repaint || self.force_full_repaint;
        self.force_full_repaint = false;

        let mut out = Vec::with_capacity(1024);
        out.extend_from_slice(csi!("?25l").as_bytes());

        let settings = RenderSettings {
            full_repaint,
            did_disable_wrap: self.did_disable_wrap,
            max_csi_parameters: self.max_csi_parameters,
        };
        let trailing = match self.surface.flush_view() {
            Some(mut view) => render_frame(&mut view, &self.caps, &settings, &mut out),
            None => 0,
        };

        if let Some((x, y)) = self.cursor_position {
            out.extend_from_slice(b"\x1b[");
            push_int(&mut out, y + 1);
            out.push(b';');
            push_int(&mut out, x + 1);
            out.push(b'H');
        } else if trailing > 0 {
            out.extend_from_slice(b"\x1b[");
            if trailing != 1 {
                push_int(&mut out, trailing);
            }
            out.push(b'C');
        }

        self.update_cursor_style(&mut out);

        if self.cursor_visible {
            out.extend_from_slice(csi!("?25h").as_bytes());
        }

        for slot in self.colors.take_dirty() {
            let Some(entry) = self.colors.get(slot) else {
                continue;
            };
            if let Some(requested) = &entry.requested {
                out.extend_from_slice(b"\x1b]");
                push_int(&mut out, slot as i32);
                out.push(b';');
                out.extend_from_slice(requested);
                if self.caps.has(Capability::SevenBitSt) {
                    out.extend_from_slice(b"\x1b\\");
                } else {
                    out.push(0x07);
                }
            } else {
                out.extend_from_slice(b"\x1b]1");
                push_int(&mut out, slot as i32);
                out.extend_from_slice(b"\x1b\\");
            }
        }

        trace!(bytes = out.len(), full_repaint, "flush");
        self.integration.write(&out);
        self.integration.flush();
    }

    /// Emit a style reset, e.g. before handing the tty to a subprocess.
    pub fn reset_attributes(&mut self) {
        if self.guard() {
            return;
        }
        self.integration.write(csi!("0m").as_bytes());
    }

    // --- color slots -----------------------------------------------------

    /// Request a persistent color for an OSC color slot. The current value
    /// is queried and saved into the restore sequence before the first set
    /// takes effect.
    pub fn set_color(&mut self, slot: u32, r: u8, g: u8, b: u8) {
        if self.guard() {
            return;
        }
        let requested = format!("#{r:02x}{g:02x}{b:02x}").into_bytes();
        {
            let entry = self.colors.entry(slot);
            if entry.requested.as_deref() == Some(requested.as_slice()) {
                return;
            }
        }

        if slot == crate::colors::ColorSlot::Cursor as u32 {
            // even a report does not allow restoring the cursor color;
            // register a plain reset instead
            self.colors.entry(slot).saved = Some(Vec::new());
            self.restore.prepend(b"\x1b]112\x1b\\");
            self.integration
                .restore_sequence_updated(self.restore.as_bytes());
        }

        let needs_save_query = {
            let entry = self.colors.entry(slot);
            !entry.save_initiated && entry.saved.is_none()
        };
        if needs_save_query {
            let mut query = b"\x1b]".to_vec();
            push_int(&mut query, slot as i32);
            query.extend_from_slice(b";?\x1b\\");
            self.integration.write(&query);
            self.integration.awaiting_response();
            self.integration.flush();
            self.colors.entry(slot).save_initiated = true;
        } else {
            self.colors.mark_dirty(slot);
        }
        self.colors.entry(slot).requested = Some(requested);
    }

    /// Restore a color slot to the value saved before the first set.
    pub fn reset_color(&mut self, slot: u32) {
        if self.guard() {
            return;
        }
        let Some(entry) = self.colors.get(slot) else {
            return;
        };
        let Some(saved) = entry.saved.clone() else {
            return;
        };
        self.colors.mark_dirty(slot);
        self.colors.entry(slot).requested = if slot == crate::colors::ColorSlot::Cursor as u32 {
            None
        } else {
            Some(saved)
        };
    }

    fn note_color_slot_report(&mut self, slot: u32, color: Vec<u8>) {
        let needs_save = self.colors.entry(slot).saved.is_none();
        if !needs_save {
            return;
        }
        self.colors.entry(slot).saved = Some(color.clone());

        let mut restore_fragment = b"\x1b]".to_vec();
        push_int(&mut restore_fragment, slot as i32);
        restore_fragment.push(b';');
        restore_fragment.extend_from_slice(&color);
        restore_fragment.extend_from_slice(b"\x1b\\");
        self.restore.prepend(&restore_fragment);
        self.integration
            .restore_sequence_updated(self.restore.as_bytes());

        let entry = self.colors.entry(slot);
        if entry.requested.is_some() && !entry.dirty {
            self.colors.mark_dirty(slot);
            self.request_repaint = true;
        }
    }

    // --- restore sequence and session management -------------------------

    /// Cumulative undo sequence for everything irreversible done so far.
    #[must_use]
    pub fn restore_sequence(&self) -> &[u8] {
        self.restore.as_bytes()
    }

    fn unpause_slot(&mut self, name: &'static str) -> &mut Vec<u8> {
        if let Some(i) = self.unpause_snippets.iter().position(|(n, _)| *n == name) {
            return &mut self.unpause_snippets[i].1;
        }
        self.unpause_snippets.push((name, Vec::new()));
        &mut self.unpause_snippets.last_mut().expect("just pushed").1
    }

    /// Switch the terminal into fullscreen operation: alternate screen
    /// (unless the options contain `-altscreen`), wrap disabled,
    /// application keypad, meta-sends-escape; on xterm also the
    /// modifyOtherKeys keyboard mode (unless the options contain
    /// `+kbdsig`). Each enable registers its disable in the restore
    /// sequence.
    pub fn setup_fullscreen(&mut self, width: i32, height: i32, options: &str) {
        if self.guard() {
            return;
        }

        self.restore.prepend(b"\x1b[?7h");
        self.did_disable_wrap = true;
        self.unpause_basic_setup = b"\x1b[?7l".to_vec();

        if !has_option(options, "-altscreen") {
            self.restore.prepend(b"\r\n\x1b[?1049l");
            self.unpause_basic_setup.extend_from_slice(b"\x1b[?1049h");
        }
        self.restore.prepend(b"\x1b[?66l");
        self.unpause_basic_setup.extend_from_slice(b"\x1b[?66h");
        self.unpause_basic_setup.extend_from_slice(b"\x1b[?1036h");
        if !has_option(options, "+kbdsig") && self.detector.family() == Family::Xterm {
            // in this keyboard mode xterm no longer sends the single byte
            // ^C / ^Z / ^\ codes the kernel tty layer turns into signals
            self.restore.prepend(b"\x1b[>4m");
            self.unpause_basic_setup.extend_from_slice(b"\x1b[>4;2m");
        }
        let setup = self.unpause_basic_setup.clone();
        self.integration.write(&setup);
        self.integration.flush();
        self.integration
            .restore_sequence_updated(self.restore.as_bytes());

        self.resize(width, height);
    }

    /// Emit the restore sequence, handing the terminal back to the shell
    /// temporarily.
    pub fn pause(&mut self) {
        if self.guard() {
            return;
        }
        let restore = self.restore.as_bytes().to_vec();
        if !restore.is_empty() {
            self.integration.write(&restore);
        }
        self.integration.flush();
    }

    /// Reestablish terminal state after [`pause`](Self::pause).
    pub fn unpause(&mut self) {
        if self.guard() {
            return;
        }
        self.cursor_cache = CursorCache::ForceResend;

        let mut out = self.unpause_basic_setup.clone();
        if self.did_push_title {
            out.extend_from_slice(b"\x1b[22t");
        }
        if self.did_enable_mouse {
            out.extend_from_slice(ENABLE_MOUSE_PROTOCOLS.as_bytes());
        }
        for (slot, entry) in self.colors.saved_entries() {
            if let Some(requested) = &entry.requested {
                out.extend_from_slice(b"\x1b]");
                push_int(&mut out, slot as i32);
                out.push(b';');
                out.extend_from_slice(requested);
                out.extend_from_slice(b"\x1b\\");
            } else {
                out.extend_from_slice(b"\x1b]1");
                push_int(&mut out, slot as i32);
                out.extend_from_slice(b"\x1b\\");
            }
        }
        for (_, snippet) in &self.unpause_snippets {
            out.extend_from_slice(snippet);
        }
        self.integration.write(&out);
        self.integration.flush();
    }

    // --- one-off requests -------------------------------------------------

    pub fn bell(&mut self) {
        if self.guard() {
            return;
        }
        self.integration.write(b"\x07");
        self.integration.flush();
    }

    /// Set the window title. With [`TitleMode::EnsureRestore`] the call is
    /// a no-op on terminals whose title cannot be restored.
    pub fn set_title(&mut self, title: &str, mode: TitleMode) {
        self.set_title_with_osc(title, mode, b"\x1b]2;", "title");
    }

    /// Set the icon title (`OSC 1`).
    pub fn set_icon_title(&mut self, title: &str, mode: TitleMode) {
        self.set_title_with_osc(title, mode, b"\x1b]1;", "icon title");
    }

    fn set_title_with_osc(
        &mut self,
        title: &str,
        mode: TitleMode,
        osc: &'static [u8],
        slot_name: &'static str,
    ) {
        if self.guard() {
            return;
        }
        if mode == TitleMode::EnsureRestore && !self.caps.has(Capability::TitleRestore) {
            return;
        }

        if !self.did_push_title {
            self.restore.prepend(b"\x1b[23t");
            self.integration
                .restore_sequence_updated(self.restore.as_bytes());
            self.integration.write(b"\x1b[22t");
            self.did_push_title = true;
        }

        let mut sequence = osc.to_vec();
        sequence.extend_from_slice(title.as_bytes());
        sequence.extend_from_slice(b"\x1b\\");
        *self.unpause_slot(slot_name) = sequence.clone();

        self.integration.write(&sequence);
        self.integration.flush();
    }

    /// Select the mouse reporting mode, combining the granularity modes
    /// with SGR and urxvt coordinate encodings.
    pub fn set_mouse_mode(&mut self, mode: MouseMode) {
        if self.guard() {
            return;
        }

        if mode == MouseMode::Off {
            if self.did_enable_mouse {
                self.did_enable_mouse = false;
                self.integration.write(DISABLE_MOUSE_SEQUENCE.as_bytes());
                self.integration.flush();
                self.unpause_slot("mouse").clear();
            }
            return;
        }

        if !self.did_mouse_restore {
            self.decoder
                .expect_legacy_mouse_reports(LegacyMouseMode::SingleByte);
            self.restore.prepend(DISABLE_MOUSE_SEQUENCE.as_bytes());
            self.integration
                .restore_sequence_updated(self.restore.as_bytes());
            self.did_mouse_restore = true;
        }

        let snippet: &str = match mode {
            MouseMode::Clicks => concat!(csi!("?1002l"), csi!("?1003l"), csi!("?1000h")),
            MouseMode::Drag => concat!(csi!("?1003l"), csi!("?1000h"), csi!("?1002h")),
            MouseMode::Movement => concat!(csi!("?1000h"), csi!("?1002h"), csi!("?1003h")),
            MouseMode::Off => unreachable!(),
        };
        *self.unpause_slot("mouse") = snippet.as_bytes().to_vec();

        if !self.did_enable_mouse {
            self.did_enable_mouse = true;
            self.integration.write(ENABLE_MOUSE_PROTOCOLS.as_bytes());
        }
        self.integration.write(snippet.as_bytes());
        self.integration.flush();
    }

    /// Enable or disable focus in/out reporting.
    pub fn request_focus_change_reports(&mut self, enabled: bool) {
        if self.guard() {
            return;
        }
        if enabled && !self.did_focus_restore {
            self.did_focus_restore = true;
            self.restore.prepend(b"\x1b[?1004l");
            self.integration
                .restore_sequence_updated(self.restore.as_bytes());
        }
        let sequence: &str = if enabled {
            csi!("?1004h")
        } else {
            csi!("?1004l")
        };
        *self.unpause_slot("focus report") = sequence.as_bytes().to_vec();
        self.integration.write(sequence.as_bytes());
        self.integration.flush();
    }

    /// Enable or disable bracketed paste.
    pub fn request_tagged_paste(&mut self, enabled: bool) {
        if self.guard() {
            return;
        }
        if enabled && !self.did_paste_restore {
            self.did_paste_restore = true;
            self.restore.prepend(b"\x1b[?2004l");
            self.integration
                .restore_sequence_updated(self.restore.as_bytes());
        }
        let sequence: &str = if enabled {
            csi!("?2004h")
        } else {
            csi!("?2004l")
        };
        *self.unpause_slot("bracketed paste") = sequence.as_bytes().to_vec();
        self.integration.write(sequence.as_bytes());
        self.integration.flush();
    }
}

impl<I: Integration> std::fmt::Debug for Terminal<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("family", &self.detector.family())
            .field("bad", &self.bad)
            .field("width", &self.surface.width())
            .field("height", &self.surface.height())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_option() {
        assert!(has_option("-altscreen", "-altscreen"));
        assert!(has_option("+kbdsig -altscreen", "-altscreen"));
        assert!(!has_option("", "-altscreen"));
        assert!(!has_option("-altscreenx", "-altscreen"));
    }
}
