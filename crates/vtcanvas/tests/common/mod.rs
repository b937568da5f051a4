#![allow(dead_code)]

//! Shared test fixture: an integration that captures everything.

use std::cell::RefCell;
use std::rc::Rc;

use vtcanvas::{Event, Integration, Terminal};

#[derive(Default)]
pub struct CaptureIntegration {
    pub output: Vec<u8>,
    pub flush_count: usize,
    pub awaiting_response_count: usize,
    pub restore_sequence: Vec<u8>,
    pub log: Vec<Vec<u8>>,
    pub bad: bool,
}

impl Integration for CaptureIntegration {
    fn write(&mut self, data: &[u8]) {
        self.output.extend_from_slice(data);
    }

    fn flush(&mut self) {
        self.flush_count += 1;
    }

    fn is_bad(&self) -> bool {
        self.bad
    }

    fn awaiting_response(&mut self) {
        self.awaiting_response_count += 1;
    }

    fn restore_sequence_updated(&mut self, sequence: &[u8]) {
        self.restore_sequence = sequence.to_vec();
    }

    fn logging(&mut self, message: &[u8]) {
        self.log.push(message.to_vec());
    }
}

pub type EventLog = Rc<RefCell<Vec<Event>>>;

/// Terminal with captured output and a recording event handler.
pub fn test_terminal(width: i32, height: i32) -> (Terminal<CaptureIntegration>, EventLog) {
    let mut terminal = Terminal::new(CaptureIntegration::default(), width, height);
    let events: EventLog = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    terminal.set_event_handler(move |event| sink.borrow_mut().push(event));
    (terminal, events)
}

/// Drain and return the captured output bytes.
pub fn take_output(terminal: &mut Terminal<CaptureIntegration>) -> Vec<u8> {
    std::mem::take(&mut terminal.integration_mut().output)
}

/// Drive auto-detection against canned xterm-like replies.
pub fn detect_as_xterm(terminal: &mut Terminal<CaptureIntegration>) {
    assert!(terminal.auto_detect());
    // basic compatibility wave
    terminal.add_input_data(b"\x1b[0n");
    terminal.add_input_data(b"\x1b[4;6R");
    terminal.add_input_data(b"\x1b[>41;380;0c");
    terminal.add_input_data(b"\x1b[4;6R");
    terminal.add_input_data(b"\x1b[0n");
    // fingerprint 1
    terminal.add_input_data(b"\x1bP!|00000000\x1b\\");
    terminal.add_input_data(b"\x1b[>41;380;0c");
    terminal.add_input_data(b"\x1b[?4;6R");
    terminal.add_input_data(b"\x1b[0n");
    // self reporting
    terminal.add_input_data(b"\x1bP>|XTerm(380)\x1b\\");
    terminal.add_input_data(b"\x1b[0n");
}
