use anyhow::{Context, Result, bail};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::info;
use needletail::parse_fastx_file;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tilefind::logging::init_logger;
use tilefind::ooc::{OocSource, OocWriter, make_ooc};
use tilefind::*;

/// Tile index server and client.
#[derive(Parser, Debug)]
#[command(name = "tilefind", author, version, about)]
struct Cli {
    /// Verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Index FASTA files and serve queries until stopped.
    Start {
        host: String,
        port: u16,
        /// FASTA files with the target sequences
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        index: IndexArgs,
        /// Honour `stop` requests from clients
        #[arg(long)]
        can_stop: bool,
        /// Trim nucleotide queries to this many bases
        #[arg(long, default_value_t = 100_000)]
        max_dna_query: usize,
        /// Trim protein queries to this many residues
        #[arg(long, default_value_t = 8_000)]
        max_aa_query: usize,
        /// Memory a single query may use, in MiB
        #[arg(long, default_value_t = 256)]
        query_budget_mb: usize,
        /// Drop clients that stall longer than this many seconds
        #[arg(long)]
        read_timeout: Option<u64>,
    },
    /// Ask a server to stop.
    Stop { host: String, port: u16 },
    /// Print server status.
    Status { host: String, port: u16 },
    /// List the sequences a server has indexed.
    Files { host: String, port: u16 },
    /// Send every record of a FASTA file to a server and print the clumps.
    Query {
        host: String,
        port: u16,
        fasta: PathBuf,
        #[arg(long, value_enum, default_value_t = QueryKind::Dna)]
        kind: QueryKind,
        /// Also query the reverse complement (nucleotide queries)
        #[arg(long)]
        both_strands: bool,
    },
    /// In-silico PCR against a nucleotide server.
    Pcr {
        host: String,
        port: u16,
        f_primer: String,
        r_primer: String,
        max_distance: u32,
    },
    /// Build in process and search without a server.
    Direct {
        /// FASTA file with the queries
        query: PathBuf,
        /// FASTA files with the target sequences
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[command(flatten)]
        index: IndexArgs,
    },
    /// Write an overused-tile file for the given targets.
    MakeOoc {
        output: PathBuf,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, value_enum, default_value_t = SourceKind::Dna)]
        source: SourceKind,
        #[arg(long)]
        tile_size: Option<usize>,
        #[arg(long)]
        step_size: Option<usize>,
        #[arg(long)]
        rep_match: Option<u32>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum QueryKind {
    Dna,
    Prot,
    Trans,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum SourceKind {
    Dna,
    Prot,
    Trans,
}

#[derive(Args, Debug)]
struct IndexArgs {
    /// Six-frame translated index
    #[arg(long)]
    trans: bool,
    /// Targets are protein
    #[arg(long, conflicts_with = "trans")]
    prot: bool,
    #[arg(long)]
    tile_size: Option<usize>,
    /// Stride between indexed tiles (default: tile size)
    #[arg(long)]
    step_size: Option<usize>,
    #[arg(long)]
    min_match: Option<usize>,
    #[arg(long)]
    max_gap: Option<u32>,
    /// Overuse threshold (default: derived from tile and step size)
    #[arg(long)]
    rep_match: Option<u32>,
    /// Also look up one-mismatch variants of each query tile
    #[arg(long)]
    one_off: bool,
    /// Leave upper-case (masked) bases unindexed
    #[arg(long)]
    mask: bool,
    /// Overused-tile file
    #[arg(long)]
    ooc: Option<PathBuf>,
}

impl IndexArgs {
    fn params(&self) -> IndexParams {
        let mut p = if self.trans {
            IndexParams::translated()
        } else if self.prot {
            IndexParams::protein()
        } else {
            IndexParams::dna()
        };
        if let Some(n) = self.tile_size {
            p = p.tile_size(n);
        }
        if let Some(n) = self.step_size {
            p = p.step_size(n);
        }
        if let Some(n) = self.min_match {
            p = p.min_match(n);
        }
        if let Some(n) = self.max_gap {
            p = p.max_gap(n);
        }
        if let Some(n) = self.rep_match {
            p = p.rep_match(n);
        }
        if let Some(path) = &self.ooc {
            p = p.ooc(path);
        }
        p.allow_one_mismatch(self.one_off).mask_upper(self.mask)
    }

    fn build(&self, files: &[PathBuf]) -> Result<ServerIndex> {
        let targets = load_fasta_files(files)?;
        let params = self.params();
        let index = if self.trans {
            ServerIndex::Translated(build_translated_index(&targets, &params)?)
        } else {
            ServerIndex::Genome(build_index(&targets, &params)?)
        };
        Ok(index)
    }
}

/// Every record of `path`, named by the first word of its header.
fn load_fasta(path: &Path) -> Result<Vec<TargetSeq>> {
    let mut reader = parse_fastx_file(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut out = Vec::new();
    while let Some(record) = reader.next() {
        let rec = record.context("Invalid record")?;
        let id = String::from_utf8_lossy(rec.id()).to_string();
        let name = id.split_whitespace().next().unwrap_or_default().to_string();
        out.push(TargetSeq::new(name, rec.seq().into_owned()));
    }
    Ok(out)
}

fn load_fasta_files(files: &[PathBuf]) -> Result<Vec<TargetSeq>> {
    let mut targets = Vec::new();
    for f in files {
        info!("Loading {}", f.display());
        targets.extend(load_fasta(f)?);
    }
    Ok(targets)
}

fn print_clump(query: &str, c: &RemoteClump) {
    println!("{query}\t{}", c.to_line());
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match cli.command {
        Cmd::Start {
            host,
            port,
            files,
            index,
            can_stop,
            max_dna_query,
            max_aa_query,
            query_budget_mb,
            read_timeout,
        } => {
            let served = index.build(&files)?;
            let config = ServerConfig::default()
                .host(host)
                .port(port)
                .allow_remote_stop(can_stop)
                .max_dna_query(max_dna_query)
                .max_aa_query(max_aa_query)
                .query_budget(query_budget_mb * 1024 * 1024)
                .read_timeout(read_timeout.map(Duration::from_secs));
            let server = QueryServer::bind(served, config).context("Failed to bind")?;
            let stats = server.serve()?;
            info!(
                "Served {} queries and {} PCR requests",
                stats.blat_requests, stats.pcr_requests
            );
        }
        Cmd::Stop { host, port } => {
            ServerClient::new(host, port).stop()?;
        }
        Cmd::Status { host, port } => {
            for line in ServerClient::new(host, port).status()? {
                println!("{line}");
            }
        }
        Cmd::Files { host, port } => {
            for name in ServerClient::new(host, port).files()? {
                println!("{name}");
            }
        }
        Cmd::Query {
            host,
            port,
            fasta,
            kind,
            both_strands,
        } => {
            let client = ServerClient::new(host, port);
            for q in load_fasta(&fasta)? {
                let clumps = match kind {
                    QueryKind::Dna if both_strands => client.query_both_strands(&q.seq)?,
                    QueryKind::Dna => client.query(&q.seq)?,
                    QueryKind::Prot => client.prot_query(&q.seq)?.1,
                    QueryKind::Trans => client.trans_query(&q.seq)?.1,
                };
                for c in &clumps {
                    print_clump(&q.name, c);
                }
            }
        }
        Cmd::Pcr {
            host,
            port,
            f_primer,
            r_primer,
            max_distance,
        } => {
            let client = ServerClient::new(host, port);
            for m in client.pcr(&f_primer, &r_primer, max_distance)? {
                println!("{}\t{}\t{}\t{}", m.target, m.t_start, m.t_end, m.strand.symbol());
            }
        }
        Cmd::Direct {
            query,
            files,
            index,
        } => {
            let served = index.build(&files)?;
            let mut budget = SearchBudget::unlimited();
            for q in load_fasta(&query)? {
                match &served {
                    ServerIndex::Genome(gf) => {
                        let seq = if gf.is_protein() {
                            filter_protein(&q.seq)
                        } else {
                            filter_dna(&q.seq)
                        };
                        for c in find_clumps(gf, &seq, &mut budget)? {
                            print_clump(&q.name, &RemoteClump::from_clump(&c, gf.sources()));
                        }
                    }
                    ServerIndex::Translated(t) => {
                        let seq = filter_dna(&q.seq);
                        for fc in find_clumps_trans_trans(t, &seq, &mut budget)? {
                            let sources = t.frame(fc.strand.index(), fc.t_frame).sources();
                            print_clump(&q.name, &RemoteClump::from_framed(&fc, sources));
                        }
                    }
                }
            }
        }
        Cmd::MakeOoc {
            output,
            files,
            source,
            tile_size,
            step_size,
            rep_match,
        } => {
            let (mut params, src) = match source {
                SourceKind::Dna => (IndexParams::dna(), OocSource::Dna),
                SourceKind::Prot => (IndexParams::protein(), OocSource::Protein),
                SourceKind::Trans => (IndexParams::translated(), OocSource::TranslatedDna),
            };
            if let Some(n) = tile_size {
                params = params.tile_size(n);
            }
            if let Some(n) = step_size {
                params = params.step_size(n);
            }
            if let Some(n) = rep_match {
                params = params.rep_match(n);
            }
            let targets = load_fasta_files(&files)?;
            if targets.is_empty() {
                bail!("no sequences in input files");
            }
            let tiles = make_ooc(&targets, &params, src)?;
            let tile = params.resolve()?.tile_size;
            OocWriter::new(&tiles, tile)
                .write_to(&output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            info!("Wrote {} overused {}-mers to {}", tiles.len(), tile, output.display());
        }
    }
    Ok(())
}
