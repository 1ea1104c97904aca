//! Wire protocol shared by server and client.
//!
//! Framing
//! - Request: `<SIGNATURE><command> [args]\n`, at most [`MAX_REQUEST`] bytes.
//! - Sequence commands (`query`, `protQuery`, `transQuery`) are answered with the
//!   single byte [`ACK`], after which the client writes exactly the announced
//!   number of raw sequence bytes.
//! - Response lines are short strings: one length byte, then up to 255 bytes.
//! - Hit lists of translated queries are long strings: a big-endian `u16`
//!   length, then `qStart tStart` pairs separated by spaces.
//! - A response ends with a line `end`; a line starting `Error:` reports a failure.

use byteorder::{BigEndian as BE, ReadBytesExt, WriteBytesExt};
use std::io::{BufRead, Read, Write};

use crate::clump::Clump;
use crate::error::ProtocolError;
use crate::search::{FramedClump, Strand};
use crate::source::SequenceSourceTable;

/// Prefix of every request. Changes whenever the protocol does.
pub const SIGNATURE: &str = "0ddf270562684f29";

/// Longest request line, newline included.
pub const MAX_REQUEST: usize = 256;

/// Acknowledgement byte before a sequence upload.
pub const ACK: u8 = b'Y';

/// Terminator line.
pub const END: &str = "end";

/// Prefix of error lines.
pub const ERROR_PREFIX: &str = "Error:";

/// Parsed request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Nucleotide query of `size` bytes.
    Query { size: usize },
    /// Protein query against a translated index.
    ProtQuery { size: usize },
    /// Nucleotide query translated against a translated index.
    TransQuery { size: usize },
    Pcr {
        f_primer: String,
        r_primer: String,
        max_distance: u32,
    },
    Status,
    Files,
    Quit,
}

impl Command {
    /// Parse a request line (trailing newline allowed).
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let body = line
            .trim_end_matches(['\r', '\n'])
            .strip_prefix(SIGNATURE)
            .ok_or(ProtocolError::NoSignature)?;
        let mut words = body.split_whitespace();
        let verb = words.next().ok_or(ProtocolError::Truncated)?;
        let cmd = match verb {
            "query" => Command::Query {
                size: number("query", words.next())?,
            },
            "protQuery" => Command::ProtQuery {
                size: number("protQuery", words.next())?,
            },
            "transQuery" => Command::TransQuery {
                size: number("transQuery", words.next())?,
            },
            "pcr" => {
                let f_primer = word("pcr", words.next())?;
                let r_primer = word("pcr", words.next())?;
                let max_distance = number("pcr", words.next())?;
                Command::Pcr {
                    f_primer,
                    r_primer,
                    max_distance,
                }
            }
            "status" => Command::Status,
            "files" => Command::Files,
            "quit" => Command::Quit,
            other => return Err(ProtocolError::UnknownCommand(other.to_string())),
        };
        Ok(cmd)
    }

    /// Request line for this command, newline included.
    pub fn to_request(&self) -> String {
        let body = match self {
            Command::Query { size } => format!("query {size}"),
            Command::ProtQuery { size } => format!("protQuery {size}"),
            Command::TransQuery { size } => format!("transQuery {size}"),
            Command::Pcr {
                f_primer,
                r_primer,
                max_distance,
            } => format!("pcr {f_primer} {r_primer} {max_distance}"),
            Command::Status => "status".to_string(),
            Command::Files => "files".to_string(),
            Command::Quit => "quit".to_string(),
        };
        format!("{SIGNATURE}{body}\n")
    }

    /// Announced upload size for sequence commands.
    pub fn upload_size(&self) -> Option<usize> {
        match self {
            Command::Query { size } | Command::ProtQuery { size } | Command::TransQuery { size } => {
                Some(*size)
            }
            _ => None,
        }
    }
}

fn word(command: &'static str, w: Option<&str>) -> Result<String, ProtocolError> {
    w.map(str::to_string).ok_or(ProtocolError::BadArgument {
        command,
        detail: "missing argument".to_string(),
    })
}

fn number<T: std::str::FromStr>(command: &'static str, w: Option<&str>) -> Result<T, ProtocolError> {
    let w = w.ok_or(ProtocolError::BadArgument {
        command,
        detail: "missing argument".to_string(),
    })?;
    w.parse().map_err(|_| ProtocolError::BadArgument {
        command,
        detail: format!("'{w}' is not a number"),
    })
}

/// Read one request line, newline excluded.
pub fn read_request<R: BufRead>(r: &mut R) -> Result<String, ProtocolError> {
    let mut buf = Vec::with_capacity(64);
    r.take(MAX_REQUEST as u64).read_until(b'\n', &mut buf)?;
    if buf.last() == Some(&b'\n') {
        buf.pop();
    } else if buf.len() >= MAX_REQUEST {
        return Err(ProtocolError::LineTooLong(buf.len()));
    }
    if buf.is_empty() {
        return Err(ProtocolError::Truncated);
    }
    String::from_utf8(buf).map_err(|_| ProtocolError::NoSignature)
}

// ---- Strings ----

/// Write a short string (1-byte length).
pub fn send_string<W: Write>(w: &mut W, s: &str) -> Result<(), ProtocolError> {
    let len = u8::try_from(s.len()).map_err(|_| ProtocolError::LineTooLong(s.len()))?;
    w.write_u8(len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

/// Read a short string.
pub fn recv_string<R: Read>(r: &mut R) -> Result<String, ProtocolError> {
    let len = r.read_u8()? as usize;
    read_utf8(r, len)
}

/// Write a long string (2-byte big-endian length).
pub fn send_long_string<W: Write>(w: &mut W, s: &str) -> Result<(), ProtocolError> {
    let len = u16::try_from(s.len()).map_err(|_| ProtocolError::LineTooLong(s.len()))?;
    w.write_u16::<BE>(len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

/// Read a long string.
pub fn recv_long_string<R: Read>(r: &mut R) -> Result<String, ProtocolError> {
    let len = r.read_u16::<BE>()? as usize;
    read_utf8(r, len)
}

fn read_utf8<R: Read>(r: &mut R, len: usize) -> Result<String, ProtocolError> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| ProtocolError::BadResponse(e.to_string()))
}

/// Turn an `Error:` line into [`ProtocolError::Server`].
pub fn check_error(line: &str) -> Result<(), ProtocolError> {
    match line.strip_prefix(ERROR_PREFIX) {
        Some(msg) => Err(ProtocolError::Server(msg.trim().to_string())),
        None => Ok(()),
    }
}

// ---- Clump lines ----

/// Clump as carried on the wire; target coordinates are local to `target`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteClump {
    pub q_start: u32,
    pub q_end: u32,
    pub target: String,
    pub t_start: u32,
    pub t_end: u32,
    pub hit_count: u32,
    /// Target strand; translated queries only.
    pub strand: Option<Strand>,
    /// Query frame; `transQuery` only.
    pub q_frame: Option<usize>,
    /// Target frame; translated queries only.
    pub t_frame: Option<usize>,
    /// `(q_start, t_start)` of each hit; translated queries only.
    pub hits: Vec<(u32, u32)>,
}

impl RemoteClump {
    /// Wire form of a nucleotide clump.
    pub fn from_clump(clump: &Clump, sources: &SequenceSourceTable) -> Self {
        let (t_start, t_end) = clump.local_target(sources);
        RemoteClump {
            q_start: clump.q_start,
            q_end: clump.q_end,
            target: clump.target_name(sources).to_string(),
            t_start,
            t_end,
            hit_count: clump.hit_count as u32,
            strand: None,
            q_frame: None,
            t_frame: None,
            hits: Vec::new(),
        }
    }

    /// Wire form of a translated clump, hits included; `sources` is the table
    /// of the frame the clump came from.
    pub fn from_framed(fc: &FramedClump, sources: &SequenceSourceTable) -> Self {
        let base = sources.get(fc.clump.source).map_or(0, |s| s.start);
        RemoteClump {
            strand: Some(fc.strand),
            q_frame: fc.q_frame,
            t_frame: Some(fc.t_frame),
            hits: fc
                .clump
                .hits
                .iter()
                .map(|h| (h.q_start, h.t_start - base))
                .collect(),
            ..Self::from_clump(&fc.clump, sources)
        }
    }

    /// Tab-separated line. Frame columns follow the strand when present.
    pub fn to_line(&self) -> String {
        let mut line = format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.q_start, self.q_end, self.target, self.t_start, self.t_end, self.hit_count
        );
        if let Some(strand) = self.strand {
            line.push('\t');
            line.push(strand.symbol());
            if let Some(qf) = self.q_frame {
                line.push_str(&format!("\t{qf}"));
            }
            if let Some(tf) = self.t_frame {
                line.push_str(&format!("\t{tf}"));
            }
        }
        line
    }

    /// Parse a clump line. `columns` is 6 (`query`), 8 (`protQuery`) or 9 (`transQuery`).
    pub fn parse_line(line: &str, columns: usize) -> Result<Self, ProtocolError> {
        let row: Vec<&str> = line.split_whitespace().collect();
        if row.len() < columns {
            return Err(ProtocolError::BadResponse(format!(
                "expecting {columns} words from server, got {}",
                row.len()
            )));
        }
        let num = |i: usize| -> Result<u32, ProtocolError> {
            row[i]
                .parse()
                .map_err(|_| ProtocolError::BadResponse(format!("bad number '{}'", row[i])))
        };
        let mut clump = RemoteClump {
            q_start: num(0)?,
            q_end: num(1)?,
            target: row[2].to_string(),
            t_start: num(3)?,
            t_end: num(4)?,
            hit_count: num(5)?,
            strand: None,
            q_frame: None,
            t_frame: None,
            hits: Vec::new(),
        };
        if columns >= 8 {
            let strand = row[6]
                .chars()
                .next()
                .and_then(Strand::from_symbol)
                .ok_or_else(|| ProtocolError::BadResponse(format!("bad strand '{}'", row[6])))?;
            clump.strand = Some(strand);
            if columns >= 9 {
                clump.q_frame = Some(num(7)? as usize);
                clump.t_frame = Some(num(8)? as usize);
            } else {
                clump.t_frame = Some(num(7)? as usize);
            }
        }
        Ok(clump)
    }
}

/// `q t q t ...` hit list of at most `max_len` bytes; pairs that do not fit
/// are dropped.
pub fn format_hits(hits: &[(u32, u32)], max_len: usize) -> String {
    let mut s = String::with_capacity(hits.len() * 12);
    for (q, t) in hits {
        let pair = format!("{q} {t}");
        let sep = usize::from(!s.is_empty());
        if s.len() + sep + pair.len() > max_len {
            break;
        }
        if sep == 1 {
            s.push(' ');
        }
        s.push_str(&pair);
    }
    s
}

/// Inverse of [`format_hits`].
pub fn parse_hits(line: &str) -> Result<Vec<(u32, u32)>, ProtocolError> {
    let nums: Vec<u32> = line
        .split_whitespace()
        .map(|w| {
            w.parse()
                .map_err(|_| ProtocolError::BadResponse(format!("bad hit '{w}'")))
        })
        .collect::<Result<_, _>>()?;
    if nums.len() % 2 != 0 {
        return Err(ProtocolError::BadResponse("odd hit list".to_string()));
    }
    Ok(nums.chunks_exact(2).map(|p| (p[0], p[1])).collect())
}

/// Value of `key` in a `key value key value` line.
pub fn find_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let words: Vec<&str> = line.split_whitespace().collect();
    words
        .chunks_exact(2)
        .find(|kv| kv[0] == key)
        .map(|kv| kv[1])
}
