//! Detection, color slot and session management flows through the
//! integration boundary.

mod common;

use common::{take_output, test_terminal};
use pretty_assertions::assert_eq;
use vtcanvas::{Capability, Color, Event, Family, KeyAtom, Modifiers, MouseMode, TitleMode};

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[test]
fn test_auto_detect_xterm_end_to_end() {
    let (mut terminal, events) = test_terminal(80, 24);
    common::detect_as_xterm(&mut terminal);

    // detection events are consumed internally; only the completion is
    // visible to the application
    assert_eq!(events.borrow().as_slice(), &[Event::AutoDetectFinished]);
    assert_eq!(terminal.family(), Family::Xterm);
    assert_eq!(terminal.version(), 380);
    assert!(terminal.might_be_supported());
    assert!(terminal.capable(Capability::CsiGreater));
    assert!(terminal.capable(Capability::TruecolorSupported));
    assert_eq!(
        terminal.self_reported_name_and_version(),
        Some("XTerm(380)")
    );
    assert!(
        terminal
            .auto_detect_result_text()
            .contains("Terminal: xterm")
    );

    // the queries went out through the integration
    let output = take_output(&mut terminal);
    assert!(contains(&output, b"\x1b[5n\x1b[6n\x1b[>c\x1b[6n\x1b[5n"));
    assert!(contains(&output, b"\x1b[>q"));
    assert!(terminal.integration().awaiting_response_count >= 3);

    // input events flow to the handler from now on
    events.borrow_mut().clear();
    terminal.add_input_data(b"\x1b[1;5A");
    assert_eq!(
        events.borrow().as_slice(),
        &[Event::Key {
            atom: KeyAtom::ArrowUp,
            modifier: Modifiers::CTRL
        }]
    );
}

#[test]
fn test_auto_detect_requires_event_handler() {
    let mut terminal = vtcanvas::Terminal::new(common::CaptureIntegration::default(), 10, 2);
    assert!(!terminal.auto_detect());
}

#[test]
fn test_color_slot_save_then_set_and_reset() {
    let (mut terminal, events) = test_terminal(80, 24);
    terminal
        .surface_mut()
        .clear(Color::DEFAULT, Color::DEFAULT);

    // the first set queries the current value instead of setting
    terminal.set_color(11, 0x00, 0x00, 0x80);
    let output = take_output(&mut terminal);
    assert_eq!(output, b"\x1b]11;?\x1b\\");
    assert_eq!(terminal.integration().awaiting_response_count, 1);

    // the report is recorded for restoration and triggers a repaint
    // request; the actual set is queued
    terminal.add_input_data(b"\x1b]11;rgb:2828/2c2c/3434\x07");
    assert!(contains(
        terminal.restore_sequence(),
        b"\x1b]11;rgb:2828/2c2c/3434\x1b\\"
    ));
    assert!(
        events
            .borrow()
            .iter()
            .any(|e| matches!(e, Event::RepaintRequested))
    );
    assert!(
        events
            .borrow()
            .iter()
            .any(|e| matches!(e, Event::ColorSlotReport { slot: 11, .. }))
    );

    terminal.flush(false);
    let output = take_output(&mut terminal);
    assert!(contains(&output, b"\x1b]11;#000080\x1b\\"));

    // a second set with a saved value queues directly
    terminal.set_color(11, 0x10, 0x20, 0x30);
    terminal.flush(false);
    let output = take_output(&mut terminal);
    assert!(contains(&output, b"\x1b]11;#102030\x1b\\"));

    // reset restores the saved report value
    terminal.reset_color(11);
    terminal.flush(false);
    let output = take_output(&mut terminal);
    assert!(contains(&output, b"\x1b]11;rgb:2828/2c2c/3434\x1b\\"));
}

#[test]
fn test_color_slot_uses_bel_without_7bit_st() {
    let (mut terminal, _events) = test_terminal(80, 24);
    terminal
        .surface_mut()
        .clear(Color::DEFAULT, Color::DEFAULT);
    terminal.disable_capability(Capability::SevenBitSt);
    terminal.set_color(10, 0xff, 0xff, 0xff);
    terminal.add_input_data(b"\x1b]10;rgb:0000/0000/0000\x07");
    take_output(&mut terminal);
    terminal.flush(false);
    let output = take_output(&mut terminal);
    assert!(contains(&output, b"\x1b]10;#ffffff\x07"));
}

#[test]
fn test_cursor_color_registers_plain_reset() {
    let (mut terminal, _events) = test_terminal(80, 24);
    terminal.set_color(12, 0xff, 0x00, 0x00);
    assert!(contains(terminal.restore_sequence(), b"\x1b]112\x1b\\"));
}

#[test]
fn test_setup_fullscreen_and_restore_sequence() {
    let (mut terminal, _events) = test_terminal(80, 24);
    terminal.setup_fullscreen(80, 24, "");
    let output = take_output(&mut terminal);
    assert!(contains(&output, b"\x1b[?7l"));
    assert!(contains(&output, b"\x1b[?1049h"));
    assert!(contains(&output, b"\x1b[?66h"));
    assert!(contains(&output, b"\x1b[?1036h"));

    let restore = terminal.restore_sequence().to_vec();
    assert!(contains(&restore, b"\x1b[?7h"));
    assert!(contains(&restore, b"\x1b[?1049l"));
    assert!(contains(&restore, b"\x1b[?66l"));
    // the host saw the update too
    assert_eq!(terminal.integration().restore_sequence, restore);

    // pause emits the restore sequence verbatim
    terminal.pause();
    assert_eq!(take_output(&mut terminal), restore);

    // unpause replays the setup
    terminal.unpause();
    let output = take_output(&mut terminal);
    assert!(contains(&output, b"\x1b[?7l"));
    assert!(contains(&output, b"\x1b[?1049h"));
}

#[test]
fn test_setup_fullscreen_without_altscreen() {
    let (mut terminal, _events) = test_terminal(80, 24);
    terminal.setup_fullscreen(80, 24, "-altscreen");
    let output = take_output(&mut terminal);
    assert!(!contains(&output, b"\x1b[?1049h"));
    assert!(!contains(terminal.restore_sequence(), b"\x1b[?1049l"));
}

#[test]
fn test_mouse_mode_sequences_and_restore() {
    let (mut terminal, _events) = test_terminal(80, 24);
    terminal.set_mouse_mode(MouseMode::Clicks);
    let output = take_output(&mut terminal);
    assert!(contains(&output, b"\x1b[?1015h\x1b[?1006h"));
    assert!(contains(&output, b"\x1b[?1002l\x1b[?1003l\x1b[?1000h"));
    assert!(contains(
        terminal.restore_sequence(),
        b"\x1b[?1003l\x1b[?1002l\x1b[?1000l\x1b[?1006l\x1b[?1015l"
    ));

    terminal.set_mouse_mode(MouseMode::Movement);
    let output = take_output(&mut terminal);
    assert!(contains(&output, b"\x1b[?1000h\x1b[?1002h\x1b[?1003h"));
    // the encodings are not re-enabled
    assert!(!contains(&output, b"\x1b[?1006h"));

    terminal.set_mouse_mode(MouseMode::Off);
    let output = take_output(&mut terminal);
    assert!(contains(&output, b"\x1b[?1000l"));

    // legacy single byte mouse reports decode after enabling
    let (mut terminal, events) = test_terminal(80, 24);
    terminal.set_mouse_mode(MouseMode::Clicks);
    terminal.add_input_data(&[0x1b, b'[', b'M', 32, 34, 35]);
    assert!(
        events
            .borrow()
            .iter()
            .any(|e| matches!(e, Event::Mouse { x: 1, y: 2, .. }))
    );
}

#[test]
fn test_focus_and_tagged_paste_requests() {
    let (mut terminal, _events) = test_terminal(80, 24);
    terminal.request_focus_change_reports(true);
    assert!(contains(&take_output(&mut terminal), b"\x1b[?1004h"));
    assert!(contains(terminal.restore_sequence(), b"\x1b[?1004l"));

    terminal.request_tagged_paste(true);
    assert!(contains(&take_output(&mut terminal), b"\x1b[?2004h"));
    assert!(contains(terminal.restore_sequence(), b"\x1b[?2004l"));

    terminal.request_tagged_paste(false);
    assert!(contains(&take_output(&mut terminal), b"\x1b[?2004l"));
}

#[test]
fn test_title_requires_restore_capability() {
    let (mut terminal, _events) = test_terminal(80, 24);
    terminal.set_title("app", TitleMode::EnsureRestore);
    assert_eq!(take_output(&mut terminal), b"");

    terminal.promise_capability(Capability::TitleRestore);
    terminal.set_title("app", TitleMode::EnsureRestore);
    let output = take_output(&mut terminal);
    assert!(contains(&output, b"\x1b[22t"));
    assert!(contains(&output, b"\x1b]2;app\x1b\\"));
    assert!(contains(terminal.restore_sequence(), b"\x1b[23t"));

    // prefer-restore mode works without the capability
    let (mut terminal, _events) = test_terminal(80, 24);
    terminal.set_title("app", TitleMode::PreferRestore);
    assert!(contains(&take_output(&mut terminal), b"\x1b]2;app\x1b\\"));

    terminal.set_icon_title("app", TitleMode::PreferRestore);
    assert!(contains(&take_output(&mut terminal), b"\x1b]1;app\x1b\\"));
}

#[test]
fn test_callback_resolves_pending_input() {
    let (mut terminal, events) = test_terminal(80, 24);
    // a lone ESC stays buffered and the core asks to be called back
    terminal.add_input_data(b"\x1b");
    terminal.callback();
    let output = take_output(&mut terminal);
    assert_eq!(output, b"\x1b[5n");
    assert_eq!(terminal.integration().awaiting_response_count, 1);

    // the resync reply resolves the ESC into a bare Escape key
    terminal.add_input_data(b"\x1b[0n");
    let recorded = events.borrow();
    assert!(recorded.iter().any(|e| matches!(
        e,
        Event::Key {
            atom: KeyAtom::Escape,
            ..
        }
    )));
}

#[test]
fn test_resize_forces_full_repaint() {
    let (mut terminal, _events) = test_terminal(10, 2);
    terminal
        .surface_mut()
        .clear(Color::DEFAULT, Color::DEFAULT);
    terminal.flush(false);
    take_output(&mut terminal);

    terminal.resize(20, 3);
    terminal
        .surface_mut()
        .clear(Color::DEFAULT, Color::DEFAULT);
    terminal.flush(false);
    let output = take_output(&mut terminal);
    // a full repaint walks the rows explicitly instead of skipping
    assert!(contains(&output, b"\r\n"));
}

#[test]
fn test_bell() {
    let (mut terminal, _events) = test_terminal(10, 2);
    terminal.bell();
    assert_eq!(take_output(&mut terminal), b"\x07");
}
