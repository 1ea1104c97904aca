//! QueryServer: one resident index, one connection at a time.
//!
//! `accept` → read request → dispatch → respond → close, then loop. Nothing runs
//! concurrently, so the counters are plain integers on the server instance.
//!
//! Each search runs inside [`isolate`]: a fresh [`SearchBudget`] bounds what the
//! query may allocate, allocation failures come back as `SearchError`s, and a
//! panic is caught at the same boundary. Either way the client gets an `Error:`
//! line and the loop moves on to the next connection.

use log::{debug, error, info, warn};
use std::io::{BufReader, BufWriter, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use crate::budget::{Ripcord, SearchBudget};
use crate::error::{ProtocolError, SearchError};
use crate::index::{GenomeIndex, TranslatedIndex};
use crate::pcr::pcr_both_strands;
use crate::protocol::{
    ACK, Command, END, ERROR_PREFIX, RemoteClump, format_hits, read_request, send_long_string,
    send_string,
};
use crate::search::{
    FramedClump, filter_dna, filter_protein, find_clumps, find_clumps_trans_trans,
    find_clumps_translated,
};
use crate::source::SequenceSourceTable;

/// Server settings.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    host: String,
    port: u16,
    max_dna_query: usize,
    max_aa_query: usize,
    allow_remote_stop: bool,
    query_budget: usize,
    read_timeout: Option<Duration>,
    ripcord_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 17779,
            max_dna_query: 100_000,
            max_aa_query: 8_000,
            allow_remote_stop: false,
            query_budget: 256 * 1024 * 1024,
            read_timeout: None,
            ripcord_size: 64 * 1024,
        }
    }
}

impl ServerConfig {
    /// Interface to bind.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
    /// Port to bind; 0 picks a free one.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
    /// Nucleotide queries are trimmed to this many bases.
    pub fn max_dna_query(mut self, n: usize) -> Self {
        self.max_dna_query = n;
        self
    }
    /// Protein queries are trimmed to this many residues.
    pub fn max_aa_query(mut self, n: usize) -> Self {
        self.max_aa_query = n;
        self
    }
    /// Honour `quit` requests (default: false).
    pub fn allow_remote_stop(mut self, yes: bool) -> Self {
        self.allow_remote_stop = yes;
        self
    }
    /// Bytes a single search may allocate.
    pub fn query_budget(mut self, bytes: usize) -> Self {
        self.query_budget = bytes;
        self
    }
    /// Give up on a client that stalls this long. Unset blocks forever.
    pub fn read_timeout(mut self, t: Option<Duration>) -> Self {
        self.read_timeout = t;
        self
    }
    /// Bytes held back during a search and released if it fails.
    pub fn ripcord_size(mut self, bytes: usize) -> Self {
        self.ripcord_size = bytes;
        self
    }
}

/// Index served by a [`QueryServer`].
pub enum ServerIndex {
    /// Nucleotide (or protein) index answering `query` and `pcr`.
    Genome(GenomeIndex),
    /// Six-frame index answering `protQuery` and `transQuery`.
    Translated(TranslatedIndex),
}

impl ServerIndex {
    pub fn sources(&self) -> &SequenceSourceTable {
        match self {
            ServerIndex::Genome(gf) => gf.sources(),
            ServerIndex::Translated(t) => t.sources(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ServerIndex::Genome(gf) if gf.is_protein() => "protein",
            ServerIndex::Genome(_) => "nucleotide",
            ServerIndex::Translated(_) => "translated",
        }
    }

    fn params(&self) -> &crate::index::SearchParams {
        match self {
            ServerIndex::Genome(gf) => gf.params(),
            ServerIndex::Translated(t) => t.params(),
        }
    }
}

/// Cumulative counters reported by `status`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ServerStats {
    pub blat_requests: u64,
    pub pcr_requests: u64,
    /// Nucleotides received in queries.
    pub bases: u64,
    /// Amino acids received in queries.
    pub aa: u64,
    /// Searches that found nothing or failed.
    pub misses: u64,
    /// Requests without the signature.
    pub no_sig: u64,
    /// Queries cut to the size limit.
    pub trimmed: u64,
    /// Protocol problems and ignored requests.
    pub warnings: u64,
}

enum Flow {
    Continue,
    Stop,
}

/// Why a search produced no result.
#[derive(Debug)]
enum Failure {
    Search(SearchError),
    Panic(String),
}

impl Failure {
    fn message(&self) -> String {
        match self {
            Failure::Search(e) if e.is_out_of_memory() => {
                "out of memory. Try reducing size of query.".to_string()
            }
            Failure::Search(e) => e.to_string(),
            Failure::Panic(msg) => format!("internal error: {msg}"),
        }
    }
}

/// Run `f` with a fresh budget, turning errors and panics into a [`Failure`].
/// The ripcord is pulled on failure and re-armed afterwards.
fn isolate<T, F>(ripcord: &mut Ripcord, limit: usize, f: F) -> Result<T, Failure>
where
    F: FnOnce(&mut SearchBudget) -> Result<T, SearchError>,
{
    let mut budget = SearchBudget::new(limit);
    let outcome = catch_unwind(AssertUnwindSafe(|| f(&mut budget)));
    let result = match outcome {
        Ok(Ok(v)) => {
            debug!("search used {} bytes", budget.used());
            Ok(v)
        }
        Ok(Err(e)) => {
            if e.is_out_of_memory() {
                ripcord.pull();
            }
            Err(Failure::Search(e))
        }
        Err(payload) => {
            ripcord.pull();
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            Err(Failure::Panic(msg))
        }
    };
    ripcord.rearm();
    result
}

/// Resident index plus a bound listener.
pub struct QueryServer {
    config: ServerConfig,
    index: ServerIndex,
    listener: TcpListener,
    stats: ServerStats,
    ripcord: Ripcord,
}

impl QueryServer {
    /// Bind `config.host:config.port`.
    pub fn bind(index: ServerIndex, config: ServerConfig) -> Result<Self, ProtocolError> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))?;
        info!(
            "Serving {} index of {} sequences on {}",
            index.kind(),
            index.sources().len(),
            listener.local_addr()?
        );
        let ripcord = Ripcord::new(config.ripcord_size);
        Ok(Self {
            config,
            index,
            listener,
            stats: ServerStats::default(),
            ripcord,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    /// Accept and answer connections until a permitted `quit` arrives.
    pub fn serve(mut self) -> Result<ServerStats, ProtocolError> {
        loop {
            let stream = match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!("connection from {peer}");
                    stream
                }
                Err(e) => {
                    warn!("accept failed: {e}");
                    self.stats.warnings += 1;
                    continue;
                }
            };
            match self.handle(stream) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => break,
                Err(e) => {
                    warn!("connection dropped: {e}");
                    self.stats.warnings += 1;
                }
            }
        }
        info!("Server stopped");
        Ok(self.stats)
    }

    fn handle(&mut self, stream: TcpStream) -> Result<Flow, ProtocolError> {
        stream.set_read_timeout(self.config.read_timeout)?;
        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = BufWriter::new(stream);

        let line = read_request(&mut reader)?;
        let cmd = match Command::parse(&line) {
            Ok(cmd) => cmd,
            Err(ProtocolError::NoSignature) => {
                warn!("request without signature");
                self.stats.no_sig += 1;
                return Ok(Flow::Continue);
            }
            Err(e) => {
                warn!("bad request: {e}");
                self.stats.warnings += 1;
                send_error(&mut writer, &e.to_string())?;
                writer.flush()?;
                return Ok(Flow::Continue);
            }
        };

        let flow = match cmd {
            Command::Query { .. } | Command::ProtQuery { .. } | Command::TransQuery { .. } => {
                writer.write_all(&[ACK])?;
                writer.flush()?;
                self.sequence_query(&cmd, &mut reader, &mut writer)?;
                Flow::Continue
            }
            Command::Pcr {
                f_primer,
                r_primer,
                max_distance,
            } => {
                self.pcr(&f_primer, &r_primer, max_distance, &mut writer)?;
                Flow::Continue
            }
            Command::Status => {
                self.status(&mut writer)?;
                Flow::Continue
            }
            Command::Files => {
                self.files(&mut writer)?;
                Flow::Continue
            }
            Command::Quit if self.config.allow_remote_stop => {
                info!("Stop requested by client");
                Flow::Stop
            }
            Command::Quit => {
                warn!("Ignoring remote stop request; server was not started with remote stop allowed");
                self.stats.warnings += 1;
                Flow::Continue
            }
        };
        writer.flush()?;
        Ok(flow)
    }

    fn sequence_query<R: Read, W: Write>(
        &mut self,
        cmd: &Command,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<(), ProtocolError> {
        let size = cmd.upload_size().unwrap_or(0);
        let protein_input = match (cmd, &self.index) {
            (Command::ProtQuery { .. }, _) => true,
            (Command::Query { .. }, ServerIndex::Genome(gf)) => gf.is_protein(),
            _ => false,
        };
        let max = if protein_input {
            self.config.max_aa_query
        } else {
            self.config.max_dna_query
        };
        let (seq, trimmed) = read_sequence(reader, size, max, protein_input)?;
        self.stats.blat_requests += 1;
        if trimmed {
            self.stats.trimmed += 1;
            warn!("query trimmed to {max} symbols");
        }
        if protein_input {
            self.stats.aa += seq.len() as u64;
        } else {
            self.stats.bases += seq.len() as u64;
        }

        let limit = self.config.query_budget;
        let ripcord = &mut self.ripcord;
        match (cmd, &self.index) {
            (Command::Query { .. }, ServerIndex::Genome(gf)) => {
                match isolate(ripcord, limit, |b| find_clumps(gf, &seq, b)) {
                    Ok(clumps) => {
                        if clumps.is_empty() {
                            self.stats.misses += 1;
                        }
                        for c in &clumps {
                            send_string(writer, &RemoteClump::from_clump(c, gf.sources()).to_line())?;
                        }
                        send_string(writer, END)?;
                    }
                    Err(f) => report(&mut self.stats, writer, &f)?,
                }
            }
            (Command::ProtQuery { .. }, ServerIndex::Translated(t)) => {
                let result = isolate(ripcord, limit, |b| find_clumps_translated(t, &seq, b));
                send_framed(&mut self.stats, writer, t, result)?;
            }
            (Command::TransQuery { .. }, ServerIndex::Translated(t)) => {
                let result = isolate(ripcord, limit, |b| find_clumps_trans_trans(t, &seq, b));
                send_framed(&mut self.stats, writer, t, result)?;
            }
            (Command::Query { .. }, ServerIndex::Translated(_)) => {
                let msg = "translated server: use protQuery or transQuery";
                unsupported(&mut self.stats, writer, msg)?;
            }
            _ => {
                unsupported(&mut self.stats, writer, "server has no translated index")?;
            }
        }
        Ok(())
    }

    fn pcr<W: Write>(
        &mut self,
        f_primer: &str,
        r_primer: &str,
        max_distance: u32,
        writer: &mut W,
    ) -> Result<(), ProtocolError> {
        self.stats.pcr_requests += 1;
        let ServerIndex::Genome(gf) = &self.index else {
            return unsupported(&mut self.stats, writer, "can't do PCR on a translated index");
        };
        let limit = self.config.query_budget;
        let result = isolate(&mut self.ripcord, limit, |b| {
            pcr_both_strands(gf, f_primer.as_bytes(), r_primer.as_bytes(), max_distance, b)
        });
        match result {
            Ok(matches) => {
                if matches.is_empty() {
                    self.stats.misses += 1;
                }
                for m in &matches {
                    let name = gf.sources().get(m.source).map_or("", |s| s.name.as_str());
                    let line = format!("{name}\t{}\t{}\t{}", m.t_start, m.t_end, m.strand.symbol());
                    send_string(writer, &line)?;
                }
                send_string(writer, END)
            }
            Err(f) => report(&mut self.stats, writer, &f),
        }
    }

    fn status<W: Write>(&mut self, writer: &mut W) -> Result<(), ProtocolError> {
        let p = self.index.params();
        let s = &self.stats;
        let lines = [
            format!("version {}", env!("CARGO_PKG_VERSION")),
            format!("type {}", self.index.kind()),
            format!("host {}", self.config.host),
            format!("port {}", self.local_addr()?.port()),
            format!("tileSize {}", p.tile_size),
            format!("stepSize {}", p.step_size),
            format!("minMatch {}", p.min_match),
            format!("pcr requests {}", s.pcr_requests),
            format!("blat requests {}", s.blat_requests),
            format!("bases {}", s.bases),
            format!("aa {}", s.aa),
            format!("misses {}", s.misses),
            format!("noSig {}", s.no_sig),
            format!("trimmed {}", s.trimmed),
            format!("warnings {}", s.warnings),
        ];
        for line in &lines {
            send_string(writer, line)?;
        }
        send_string(writer, END)
    }

    fn files<W: Write>(&mut self, writer: &mut W) -> Result<(), ProtocolError> {
        let sources = self.index.sources();
        send_string(writer, &sources.len().to_string())?;
        for s in sources.iter() {
            send_string(writer, &s.name)?;
        }
        Ok(())
    }
}

fn send_framed<W: Write>(
    stats: &mut ServerStats,
    writer: &mut W,
    tindex: &TranslatedIndex,
    result: Result<Vec<FramedClump>, Failure>,
) -> Result<(), ProtocolError> {
    let clumps = match result {
        Ok(c) => c,
        Err(f) => return report(stats, writer, &f),
    };
    if clumps.is_empty() {
        stats.misses += 1;
    }
    send_string(writer, &format!("tileSize {}", tindex.params().tile_size))?;
    for fc in &clumps {
        let sources = tindex.frame(fc.strand.index(), fc.t_frame).sources();
        let remote = RemoteClump::from_framed(fc, sources);
        send_string(writer, &remote.to_line())?;
        send_long_string(writer, &format_hits(&remote.hits, u16::MAX as usize))?;
    }
    send_string(writer, END)
}

fn report<W: Write>(
    stats: &mut ServerStats,
    writer: &mut W,
    failure: &Failure,
) -> Result<(), ProtocolError> {
    error!("search failed: {failure:?}");
    stats.misses += 1;
    send_error(writer, &failure.message())
}

fn unsupported<W: Write>(
    stats: &mut ServerStats,
    writer: &mut W,
    msg: &str,
) -> Result<(), ProtocolError> {
    warn!("{msg}");
    stats.warnings += 1;
    send_error(writer, msg)
}

fn send_error<W: Write>(writer: &mut W, msg: &str) -> Result<(), ProtocolError> {
    let mut line = format!("{ERROR_PREFIX} {msg}");
    let mut cut = u8::MAX as usize;
    if line.len() > cut {
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        line.truncate(cut);
    }
    send_string(writer, &line)
}

/// Read exactly `size` bytes, keeping at most `max` filtered symbols.
fn read_sequence<R: Read>(
    reader: &mut R,
    size: usize,
    max: usize,
    protein: bool,
) -> Result<(Vec<u8>, bool), ProtocolError> {
    let mut seq = Vec::with_capacity(size.min(max));
    let mut trimmed = false;
    let mut left = size;
    let mut chunk = vec![0u8; 64 * 1024];
    while left > 0 {
        let n = left.min(chunk.len());
        reader.read_exact(&mut chunk[..n])?;
        left -= n;
        let filtered = if protein {
            filter_protein(&chunk[..n])
        } else {
            filter_dna(&chunk[..n])
        };
        let room = max - seq.len();
        if filtered.len() > room {
            trimmed = true;
        }
        seq.extend_from_slice(&filtered[..filtered.len().min(room)]);
    }
    Ok((seq, trimmed))
}
