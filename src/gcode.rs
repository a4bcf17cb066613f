//! Positioning state scraped from OctoPrint serial log lines.
//!
//! Only four commands matter: `G90`/`G91` select absolute or relative
//! positioning and `G0`/`G1` (with their zero-padded forms) carry the X
//! coordinate. Everything else on an outgoing line is uninteresting.

/// Marker of lines OctoPrint sent to the printer
const SEND_MARKER: &str = " Send: ";
/// Marker of lines OctoPrint received from the printer
const RECV_MARKER: &str = " Recv: ";

/// Toolhead positioning state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcodeState {
    /// True for absolute (`G90`), false for relative (`G91`) positioning
    pub is_absolute: bool,
    /// Last known X coordinate, `None` until a move establishes it
    pub x_pos: Option<f64>,
}

impl Default for GcodeState {
    fn default() -> Self {
        Self {
            is_absolute: true,
            x_pos: None,
        }
    }
}

impl GcodeState {
    /// Start in absolute mode with an unknown position
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the state from one OctoPrint serial log line.
    ///
    /// Returns `false` only for lines that look like neither sent nor
    /// received traffic, or outgoing lines without a command.
    pub fn parse_line(&mut self, line: &str) -> bool {
        let Some(start) = line.find(SEND_MARKER) else {
            return line.contains(RECV_MARKER);
        };
        let mut payload = &line[start + SEND_MARKER.len()..];
        if payload.split_whitespace().next().is_some_and(is_line_number) {
            payload = strip_checksum(payload);
        }

        let mut tokens = payload.split_whitespace();
        let mut command = tokens.next();
        if command.is_some_and(|c| c.starts_with('N')) {
            command = tokens.next();
        }

        match command {
            None => false,
            Some("G90") => {
                self.is_absolute = true;
                true
            }
            Some("G91") => {
                self.is_absolute = false;
                true
            }
            Some("G0" | "G00" | "G1" | "G01") => {
                self.apply_x_move(tokens);
                true
            }
            Some(_) => true,
        }
    }

    /// Apply every `X<number>` token of a linear move.
    ///
    /// A bare `X` leaves the state untouched for the whole line.
    fn apply_x_move<'a>(&mut self, tokens: impl Iterator<Item = &'a str>) {
        let mut x_pos = self.x_pos;
        for token in tokens {
            let Some(number) = token.strip_prefix('X') else {
                continue;
            };
            if number.is_empty() {
                return;
            }
            let Some(value) = number.parse::<f64>().ok().filter(|v| v.is_finite()) else {
                tracing::trace!(token, "Unparseable X coordinate");
                continue;
            };

            x_pos = if self.is_absolute {
                Some(value)
            } else {
                x_pos.map(|x| x + value)
            };
        }
        self.x_pos = x_pos;
    }
}

/// `N<digits>`, the line number OctoPrint prefixes to checksummed lines
fn is_line_number(token: &str) -> bool {
    token
        .strip_prefix('N')
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Drop the `*<digits>` checksum OctoPrint appends to numbered lines
fn strip_checksum(payload: &str) -> &str {
    let trimmed = payload.trim_end();
    match trimmed.rfind('*') {
        Some(star)
            if star + 1 < trimmed.len()
                && trimmed[star + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &trimmed[..star]
        }
        _ => payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(state: &mut GcodeState, lines: &[&str]) {
        for line in lines {
            state.parse_line(line);
        }
    }

    #[test]
    fn test_absolute_move() {
        let mut state = GcodeState::new();
        feed(
            &mut state,
            &[
                "2022-03-01 10:00:00,000 - Send: G90",
                "2022-03-01 10:00:00,100 - Send: G1 X12.5",
            ],
        );
        assert!(state.is_absolute);
        assert_eq!(state.x_pos, Some(12.5));
    }

    #[test]
    fn test_relative_move_accumulates() {
        let mut state = GcodeState {
            is_absolute: true,
            x_pos: Some(12.5),
        };
        feed(&mut state, &[" - Send: G91", " - Send: G1 X1.0"]);
        assert!(!state.is_absolute);
        assert_eq!(state.x_pos, Some(13.5));
    }

    #[test]
    fn test_first_move_defaults_to_absolute() {
        let mut state = GcodeState::new();
        assert!(state.parse_line(" - Send: G1 X1.0"));
        assert!(state.is_absolute);
        assert_eq!(state.x_pos, Some(1.0));
    }

    #[test]
    fn test_relative_move_from_unknown_stays_unknown() {
        let mut state = GcodeState::new();
        feed(&mut state, &[" - Send: G91", " - Send: G0 X5", " - Send: G1 X-2"]);
        assert_eq!(state.x_pos, None);

        feed(&mut state, &[" - Send: G90", " - Send: G1 X20"]);
        assert_eq!(state.x_pos, Some(20.0));
    }

    #[test]
    fn test_recv_line_is_recognized_but_ignored() {
        let mut state = GcodeState::new();
        assert!(state.parse_line("2022-03-01 10:00:01,000 - Recv: G1 X5"));
        assert_eq!(state, GcodeState::new());
    }

    #[test]
    fn test_unmarked_line_is_garbage() {
        let mut state = GcodeState::new();
        assert!(!state.parse_line("Connection to printer established"));
        assert!(!state.parse_line(""));
    }

    #[test]
    fn test_send_without_command_is_garbage() {
        let mut state = GcodeState::new();
        assert!(!state.parse_line(" - Send: "));
        assert!(!state.parse_line(" - Send: N42"));
    }

    #[test]
    fn test_line_number_is_skipped() {
        let mut state = GcodeState::new();
        assert!(state.parse_line(" - Send: N17 G1 X3.25 Y4"));
        assert_eq!(state.x_pos, Some(3.25));
    }

    #[test]
    fn test_checksum_is_stripped() {
        let mut state = GcodeState::new();
        assert!(state.parse_line(" - Send: N18 G1 X7.5*93"));
        assert_eq!(state.x_pos, Some(7.5));
    }

    #[test]
    fn test_checksum_kept_on_unnumbered_line() {
        let mut state = GcodeState {
            is_absolute: true,
            x_pos: Some(1.0),
        };
        assert!(state.parse_line(" - Send: G1 X5*87"));
        assert_eq!(state.x_pos, Some(1.0));
    }

    #[test]
    fn test_unparseable_x_is_skipped() {
        let mut state = GcodeState {
            is_absolute: true,
            x_pos: Some(4.0),
        };
        assert!(state.parse_line(" - Send: G1 XABC"));
        assert_eq!(state.x_pos, Some(4.0));

        assert!(state.parse_line(" - Send: G1 XABC X9 F3000"));
        assert_eq!(state.x_pos, Some(9.0));
    }

    #[test]
    fn test_bare_x_aborts_line() {
        let mut state = GcodeState {
            is_absolute: true,
            x_pos: Some(4.0),
        };
        assert!(state.parse_line(" - Send: G1 X8 X Y2"));
        assert_eq!(state.x_pos, Some(4.0));
    }

    #[test]
    fn test_other_commands_leave_state() {
        let mut state = GcodeState::new();
        assert!(state.parse_line(" - Send: M105"));
        assert!(state.parse_line(" - Send: G28 X0"));
        assert_eq!(state, GcodeState::new());
    }

    #[test]
    fn test_strip_checksum() {
        assert_eq!(strip_checksum("G1 X5*87"), "G1 X5");
        assert_eq!(strip_checksum("G1 X5*"), "G1 X5*");
        assert_eq!(strip_checksum("G1 X5"), "G1 X5");
    }

    #[test]
    fn test_is_line_number() {
        assert!(is_line_number("N18"));
        assert!(!is_line_number("N"));
        assert!(!is_line_number("N1a"));
        assert!(!is_line_number("G1"));
    }
}
