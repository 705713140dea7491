//! Content-based classification of input files.
//!
//! Classification never relies on file extensions. The first two lines are
//! checked for NDJSON shape with a streaming brace/quote state machine; if
//! that fails the source is rewound and the top-level object is scanned for
//! its `resourceType`.

use std::io::{BufRead, BufReader};

use tracing::trace;

use crate::error::{BundleError, Result};
use crate::file::Rewind;
use crate::scanner::JsonScanner;

/// Read-ahead buffer used while classifying and reading.
pub const READ_AHEAD: usize = 32 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    /// One JSON object per line
    Ndjson,
    /// A FHIR `Bundle` resource with an `entry` array
    Collection,
    /// A single JSON resource
    SingleResource,
    Unknown,
}

impl std::fmt::Display for BundleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ndjson => write!(f, "ndjson"),
            Self::Collection => write!(f, "bundle"),
            Self::SingleResource => write!(f, "resource"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineState {
    Start,
    Inside,
    Closed,
    Invalid,
}

/// Incremental check that a line holds exactly one complete JSON object.
///
/// Only braces, quotes and backslashes are tracked; this is a shape check,
/// not a parser.
#[derive(Debug, Clone)]
pub struct ObjectLineCheck {
    state: LineState,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Default for ObjectLineCheck {
    fn default() -> Self {
        Self {
            state: LineState::Start,
            depth: 0,
            in_string: false,
            escaped: false,
        }
    }
}

impl ObjectLineCheck {
    pub fn feed(&mut self, bytes: &[u8]) {
        for &b in bytes {
            match self.state {
                LineState::Start => {
                    if b == b'{' {
                        self.state = LineState::Inside;
                        self.depth = 1;
                    } else if !b.is_ascii_whitespace() {
                        self.state = LineState::Invalid;
                    }
                }
                LineState::Inside => self.step_inside(b),
                LineState::Closed => {
                    if !b.is_ascii_whitespace() {
                        self.state = LineState::Invalid;
                    }
                }
                LineState::Invalid => return,
            }
        }
    }

    fn step_inside(&mut self, b: u8) {
        if self.in_string {
            if self.escaped {
                self.escaped = false;
            } else if b == b'\\' {
                self.escaped = true;
            } else if b == b'"' {
                self.in_string = false;
            }
            return;
        }
        match b {
            b'"' => self.in_string = true,
            b'{' => self.depth += 1,
            b'}' => {
                self.depth -= 1;
                if self.depth == 0 {
                    self.state = LineState::Closed;
                }
            }
            _ => {}
        }
    }

    pub fn is_complete(&self) -> bool {
        self.state == LineState::Closed
    }

    pub fn is_invalid(&self) -> bool {
        self.state == LineState::Invalid
    }
}

/// Returns true if `line` is one brace-balanced JSON object.
pub fn is_complete_json_object(line: &str) -> bool {
    let mut check = ObjectLineCheck::default();
    check.feed(line.as_bytes());
    check.is_complete()
}

struct LineScan {
    check: ObjectLineCheck,
    /// The line ended with `\n` (as opposed to end of input)
    terminated: bool,
}

/// Streams one line through the shape check without retaining it.
fn scan_line<R: BufRead>(reader: &mut R) -> Result<LineScan> {
    let mut check = ObjectLineCheck::default();
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok(LineScan {
                check,
                terminated: false,
            });
        }
        match buf.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                check.feed(&buf[..pos]);
                reader.consume(pos + 1);
                return Ok(LineScan {
                    check,
                    terminated: true,
                });
            }
            None => {
                check.feed(buf);
                let len = buf.len();
                reader.consume(len);
                // no need to read the rest of a line that already failed
                if check.is_invalid() {
                    return Ok(LineScan {
                        check,
                        terminated: false,
                    });
                }
            }
        }
    }
}

/// Classifies the content of `source`.
///
/// The source position after the call is unspecified; callers rewind before
/// reading resources.
pub fn classify<R: Rewind>(source: &mut R) -> Result<BundleKind> {
    {
        let mut reader = BufReader::with_capacity(READ_AHEAD, &mut *source);
        let first = scan_line(&mut reader)?;

        if first.check.is_complete() && first.terminated {
            let second = scan_line(&mut reader)?;
            if second.check.is_complete() {
                trace!("first two lines are complete JSON objects");
                return Ok(BundleKind::Ndjson);
            }
        }
    }

    source.rewind()?;
    classify_json(BufReader::with_capacity(READ_AHEAD, source))
}

/// Scans the top-level object for its `resourceType`.
fn classify_json<R: BufRead>(reader: R) -> Result<BundleKind> {
    let mut scanner = JsonScanner::new(reader);

    match scanner.peek()? {
        Some(b'{') => {}
        _ => {
            return Err(BundleError::format(
                "expecting JSON object at the root of the resource",
            ));
        }
    }
    scanner.begin_object()?;

    while let Some(key) = scanner.next_key()? {
        if key == "resourceType" {
            return Ok(match scanner.read_string()?.as_deref() {
                Some("Bundle") => BundleKind::Collection,
                Some(rt) if !rt.is_empty() => BundleKind::SingleResource,
                _ => BundleKind::Unknown,
            });
        }
        scanner.skip_value()?;
    }

    // an object without resourceType is read as a collection; the
    // collection reader rejects it if there is no entry array
    Ok(BundleKind::Collection)
}
