//! Telnet option negotiation
//!
//! Separates in-band content bytes from IAC command sequences in the raw
//! inbound stream and answers terminal-type requests. Everything else on the
//! wire is skipped without a reply.

use tracing::debug;

// Telnet command bytes (RFC 854)
pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const SE: u8 = 240;

/// TERMINAL-TYPE option (RFC 1091)
pub const OPT_TERMINAL_TYPE: u8 = 24;

// TERMINAL-TYPE subnegotiation qualifiers
const TTYPE_IS: u8 = 0;
const TTYPE_SEND: u8 = 1;

/// Terminal types offered to the server, in rotation order.
pub const TERMINAL_TYPES: [&str; 3] = ["256COLOR", "VT100", "ANSI"];

/// Cap on how much of an unterminated subnegotiation is carried across reads.
const MAX_PARTIAL: usize = 64;

/// Result of one negotiation pass over an inbound buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Negotiation {
    /// In-band content with all command sequences removed
    pub content: Vec<u8>,
    /// Reply bytes the transport must write back verbatim
    pub response: Vec<u8>,
}

/// Telnet negotiation state for one connection.
///
/// Reads arrive in arbitrary chunks, so a command sequence may be cut at any
/// byte. The tail of an incomplete sequence is held in `partial` and
/// prepended to the next buffer rather than being mis-read as content.
pub struct Negotiator {
    /// Index of the next terminal type to offer
    next_type: usize,
    /// Tail of a command sequence split across reads
    partial: Vec<u8>,
}

impl Default for Negotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl Negotiator {
    pub fn new() -> Self {
        Self {
            next_type: 0,
            partial: Vec::new(),
        }
    }

    /// Quick check whether a buffer needs a negotiation pass at all.
    pub fn requires_negotiation(&self, input: &[u8]) -> bool {
        !self.partial.is_empty() || input.contains(&IAC)
    }

    /// Scan a buffer, stripping command sequences out of the content and
    /// collecting any replies that must go back to the server.
    pub fn negotiate(&mut self, input: &[u8]) -> Negotiation {
        let carried: Vec<u8>;
        let bytes: &[u8] = if self.partial.is_empty() {
            input
        } else {
            let mut b = std::mem::take(&mut self.partial);
            b.extend_from_slice(input);
            carried = b;
            &carried
        };

        let mut out = Negotiation::default();
        let mut i = 0;
        let mut last = 0;

        while i < bytes.len() {
            if bytes[i] != IAC {
                i += 1;
                continue;
            }
            out.content.extend_from_slice(&bytes[last..i]);

            // Bare IAC at the end of the buffer: wait for the rest.
            if i + 1 >= bytes.len() {
                self.partial.extend_from_slice(&bytes[i..]);
                return out;
            }

            let command = bytes[i + 1];
            match command {
                DO | DONT | WILL | WONT => {
                    if i + 2 >= bytes.len() {
                        self.partial.extend_from_slice(&bytes[i..]);
                        return out;
                    }
                    if let Some(reply) = self.handle_command(command, bytes[i + 2]) {
                        out.response.extend_from_slice(&reply);
                    }
                    i += 3;
                }
                SB => match find_subnegotiation_end(&bytes[i + 2..]) {
                    Some(len) => {
                        if let Some(reply) = self.handle_subnegotiation(&bytes[i + 2..i + 2 + len])
                        {
                            out.response.extend_from_slice(&reply);
                        }
                        // payload plus the IAC SE terminator
                        i += 2 + len + 2;
                    }
                    None => {
                        let tail = &bytes[i..];
                        if tail.len() <= MAX_PARTIAL {
                            self.partial.extend_from_slice(tail);
                        } else {
                            debug!(len = tail.len(), "dropping oversized unterminated subnegotiation");
                        }
                        return out;
                    }
                },
                _ => {
                    // NOP, GA and friends carry no operand
                    i += 2;
                }
            }
            last = i;
        }

        out.content.extend_from_slice(&bytes[last..]);
        out
    }

    fn handle_command(&mut self, command: u8, option: u8) -> Option<Vec<u8>> {
        match (command, option) {
            (DO | WILL, OPT_TERMINAL_TYPE) => Some(self.next_terminal_type_reply()),
            _ => {
                debug!(command, option, "ignoring negotiation command");
                None
            }
        }
    }

    fn handle_subnegotiation(&mut self, payload: &[u8]) -> Option<Vec<u8>> {
        if payload.first() == Some(&OPT_TERMINAL_TYPE) && payload.get(1) == Some(&TTYPE_SEND) {
            Some(self.next_terminal_type_reply())
        } else {
            None
        }
    }

    /// Build `IAC SB TERMINAL-TYPE IS <name> IAC SE` for the next supported
    /// type, rotating through the list so repeated requests enumerate them.
    fn next_terminal_type_reply(&mut self) -> Vec<u8> {
        let name = TERMINAL_TYPES[self.next_type];
        self.next_type = (self.next_type + 1) % TERMINAL_TYPES.len();

        let mut reply = vec![IAC, SB, OPT_TERMINAL_TYPE, TTYPE_IS];
        reply.extend_from_slice(name.as_bytes());
        reply.extend_from_slice(&[IAC, SE]);
        reply
    }
}

/// Length of the subnegotiation payload before the `IAC SE` terminator, or
/// `None` when the terminator has not arrived yet.
fn find_subnegotiation_end(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == [IAC, SE])
}
