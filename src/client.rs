//! ServerClient: the requesting side of the protocol.
//!
//! The server answers one request per connection, so every call below opens a
//! fresh [`Connection`]. Queries are single-strand; [`ServerClient::query_both_strands`]
//! is the client-side loop over both.

use log::debug;
use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};

use crate::encode::reverse_complement;
use crate::error::ProtocolError;
use crate::protocol::{
    ACK, Command, END, RemoteClump, check_error, find_value, parse_hits, recv_long_string,
    recv_string,
};
use crate::search::Strand;

/// One open connection to a server.
pub struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Connection {
    pub fn open<A: ToSocketAddrs>(addr: A) -> Result<Self, ProtocolError> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: stream,
        })
    }

    fn send(&mut self, cmd: &Command) -> Result<(), ProtocolError> {
        self.writer.write_all(cmd.to_request().as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    /// Announce and upload a sequence.
    fn start_seq_query(&mut self, cmd: &Command, seq: &[u8]) -> Result<(), ProtocolError> {
        self.send(cmd)?;
        let mut ack = [0u8; 1];
        std::io::Read::read_exact(&mut self.reader, &mut ack)?;
        if ack[0] != ACK {
            return Err(ProtocolError::NoAck(ack[0]));
        }
        self.writer.write_all(seq)?;
        self.writer.flush()?;
        Ok(())
    }

    fn line(&mut self) -> Result<String, ProtocolError> {
        let line = recv_string(&mut self.reader)?;
        check_error(&line)?;
        Ok(line)
    }

    /// Lines up to the `end` terminator.
    fn lines_until_end(&mut self) -> Result<Vec<String>, ProtocolError> {
        let mut out = Vec::new();
        loop {
            let line = self.line()?;
            if line == END {
                return Ok(out);
            }
            out.push(line);
        }
    }

    /// Send one strand of a nucleotide query. `is_rc` says whether `seq` is the
    /// reverse complement of the caller's query and tags the returned clumps.
    pub fn query_strand(mut self, seq: &[u8], is_rc: bool) -> Result<Vec<RemoteClump>, ProtocolError> {
        self.start_seq_query(&Command::Query { size: seq.len() }, seq)?;
        let strand = if is_rc { Strand::Reverse } else { Strand::Forward };
        self.lines_until_end()?
            .iter()
            .map(|l| {
                RemoteClump::parse_line(l, 6).map(|c| RemoteClump {
                    strand: Some(strand),
                    ..c
                })
            })
            .collect()
    }

    /// Translated query: `tileSize` line, then clump lines each followed by a
    /// long hit line.
    fn framed_query(
        mut self,
        cmd: Command,
        seq: &[u8],
        columns: usize,
    ) -> Result<(usize, Vec<RemoteClump>), ProtocolError> {
        self.start_seq_query(&cmd, seq)?;
        let header = self.line()?;
        let tile_size = find_value(&header, "tileSize")
            .and_then(|v| v.parse().ok())
            .filter(|&t: &usize| t > 0)
            .ok_or_else(|| ProtocolError::BadResponse(header.clone()))?;
        let mut clumps = Vec::new();
        loop {
            let line = self.line()?;
            if line == END {
                break;
            }
            let mut clump = RemoteClump::parse_line(&line, columns)?;
            clump.hits = parse_hits(&recv_long_string(&mut self.reader)?)?;
            if clump.hits.len() != clump.hit_count as usize {
                debug!(
                    "clump lists {} hits, got {}",
                    clump.hit_count,
                    clump.hits.len()
                );
            }
            clumps.push(clump);
        }
        Ok((tile_size, clumps))
    }
}

/// PCR product reported by a server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemotePcrMatch {
    pub target: String,
    pub t_start: u32,
    pub t_end: u32,
    pub strand: Strand,
}

impl RemotePcrMatch {
    fn parse(line: &str) -> Result<Self, ProtocolError> {
        let bad = || ProtocolError::BadResponse(line.to_string());
        let row: Vec<&str> = line.split_whitespace().collect();
        let [target, start, end, strand] = row[..] else {
            return Err(bad());
        };
        Ok(Self {
            target: target.to_string(),
            t_start: start.parse().map_err(|_| bad())?,
            t_end: end.parse().map_err(|_| bad())?,
            strand: strand
                .chars()
                .next()
                .and_then(Strand::from_symbol)
                .ok_or_else(bad)?,
        })
    }
}

/// Address of a server plus one method per request.
#[derive(Clone, Debug)]
pub struct ServerClient {
    host: String,
    port: u16,
}

impl ServerClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn connect(&self) -> Result<Connection, ProtocolError> {
        Connection::open((self.host.as_str(), self.port))
    }

    /// Forward-strand nucleotide query.
    pub fn query(&self, seq: &[u8]) -> Result<Vec<RemoteClump>, ProtocolError> {
        self.connect()?.query_strand(seq, false)
    }

    /// Query `seq`, then its reverse complement; forward clumps come first.
    pub fn query_both_strands(&self, seq: &[u8]) -> Result<Vec<RemoteClump>, ProtocolError> {
        let mut clumps = self.connect()?.query_strand(seq, false)?;
        let rc = reverse_complement(seq);
        clumps.extend(self.connect()?.query_strand(&rc, true)?);
        Ok(clumps)
    }

    /// Protein query against a translated server. Returns the server's tile size
    /// and clumps with strand and target frame.
    pub fn prot_query(&self, seq: &[u8]) -> Result<(usize, Vec<RemoteClump>), ProtocolError> {
        self.connect()?
            .framed_query(Command::ProtQuery { size: seq.len() }, seq, 8)
    }

    /// Translated nucleotide query against a translated server.
    pub fn trans_query(&self, seq: &[u8]) -> Result<(usize, Vec<RemoteClump>), ProtocolError> {
        self.connect()?
            .framed_query(Command::TransQuery { size: seq.len() }, seq, 9)
    }

    /// In-silico PCR.
    pub fn pcr(
        &self,
        f_primer: &str,
        r_primer: &str,
        max_distance: u32,
    ) -> Result<Vec<RemotePcrMatch>, ProtocolError> {
        let mut conn = self.connect()?;
        conn.send(&Command::Pcr {
            f_primer: f_primer.to_string(),
            r_primer: r_primer.to_string(),
            max_distance,
        })?;
        conn.lines_until_end()?
            .iter()
            .map(|l| RemotePcrMatch::parse(l))
            .collect()
    }

    /// Status lines, `end` excluded.
    pub fn status(&self) -> Result<Vec<String>, ProtocolError> {
        let mut conn = self.connect()?;
        conn.send(&Command::Status)?;
        conn.lines_until_end()
    }

    /// Names of the indexed sequences.
    pub fn files(&self) -> Result<Vec<String>, ProtocolError> {
        let mut conn = self.connect()?;
        conn.send(&Command::Files)?;
        let count_line = conn.line()?;
        let count: usize = count_line
            .trim()
            .parse()
            .map_err(|_| ProtocolError::BadResponse(count_line.clone()))?;
        (0..count).map(|_| conn.line()).collect()
    }

    /// Ask the server to stop. Servers not started with remote stop allowed
    /// ignore this.
    pub fn stop(&self) -> Result<(), ProtocolError> {
        self.connect()?.send(&Command::Quit)
    }
}

/// Value of a `status` entry such as `"blat requests"`.
pub fn status_value<'a>(lines: &'a [String], key: &str) -> Option<&'a str> {
    lines.iter().find_map(|l| {
        l.strip_prefix(key)
            .and_then(|rest| rest.strip_prefix(' '))
            .map(str::trim)
    })
}
