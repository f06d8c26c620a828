//! Decoding raw terminal output into plain text.

use vte::{Params, Parser, Perform};

/// Output sanitizer using VTE parser.
pub struct OutputSanitizer;

impl OutputSanitizer {
    /// Decode terminal bytes, optionally stripping control sequences.
    ///
    /// Without stripping the bytes are only decoded (lossily) as UTF-8.
    pub fn decode(input: &[u8], strip_ansi: bool) -> String {
        if strip_ansi {
            Self::strip_ansi(input)
        } else {
            String::from_utf8_lossy(input).into_owned()
        }
    }

    /// Strip ANSI escape codes from raw bytes.
    ///
    /// Returns clean UTF-8 text with all control sequences removed. Line
    /// feeds, carriage returns and tabs survive; backspace erases the
    /// previous character, as a terminal would show it.
    pub fn strip_ansi(input: &[u8]) -> String {
        let mut extractor = PlainTextExtractor::new();
        let mut parser = Parser::new();

        parser.advance(&mut extractor, input);

        extractor.into_string()
    }
}

/// VTE performer that extracts plain text.
struct PlainTextExtractor {
    output: String,
}

impl PlainTextExtractor {
    fn new() -> Self {
        Self {
            output: String::new(),
        }
    }

    fn into_string(self) -> String {
        self.output
    }
}

impl Perform for PlainTextExtractor {
    fn print(&mut self, c: char) {
        self.output.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' | b'\r' | b'\t' => self.output.push(byte as char),
            // Backspace, as used by shells redrawing the line being edited
            0x08 => {
                if !self.output.ends_with(['\n', '\r']) {
                    self.output.pop();
                }
            }
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {
        // Window titles set by the prompt
    }

    fn csi_dispatch(
        &mut self,
        _params: &Params,
        _intermediates: &[u8],
        _ignore: bool,
        _action: char,
    ) {
        // Colors, cursor movement, bracketed paste toggles
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}
