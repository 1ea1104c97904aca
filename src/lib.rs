//! Tile (k-mer) index over genomic or protein sequence, clump search, and a
//! small TCP query server.
//!
//! - Build once from named targets ([`build_index`], [`build_translated_index`]);
//!   the resulting indexes are immutable.
//! - Search in process ([`find_clumps`] and friends) or over the wire
//!   ([`QueryServer`] / [`ServerClient`]).
//! - Tiles seen more often than the overuse threshold are dropped at build time;
//!   they can also be listed in advance in an `.ooc` file ([`ooc`]).
//!
//! Coordinates inside an index are offsets into the concatenation of all
//! targets; [`SequenceSourceTable`] maps them back to `(name, local offset)`.

mod budget;
mod builder;
mod client;
mod clump;
pub mod encode;
mod error;
mod hits;
mod index;
pub mod logging;
pub mod ooc;
mod pcr;
pub mod protocol;
mod radix;
mod search;
mod server;
mod source;
pub mod translate;

pub use budget::{Ripcord, SearchBudget};
pub use builder::{IndexParams, TargetSeq, build_index, build_translated_index, default_rep_match};
pub use client::{Connection, RemotePcrMatch, ServerClient, status_value};
pub use clump::{
    BUCKET_SHIFT, Clump, ClumpParams, NEAR_ENOUGH_DNA, NEAR_ENOUGH_PROTEIN, assemble,
    assemble_with, query_coverage,
};
pub use encode::{Alphabet, TileCodec, reverse_complement};
pub use error::{IndexError, ProtocolError, SearchError};
pub use hits::{Hit, find_hits, find_hits_in_region};
pub use index::{
    DirectLayout, GenomeIndex, SearchParams, SegmentedLayout, TailPosting, TileLayout,
    TileLookup, TranslatedIndex,
};
pub use pcr::{PcrMatch, pcr_both_strands, pcr_clumps};
pub use protocol::RemoteClump;
pub use radix::sort_by_diagonal;
pub use search::{
    FramedClump, Strand, filter_dna, filter_protein, find_clumps, find_clumps_trans_trans,
    find_clumps_translated, trim_query,
};
pub use server::{QueryServer, ServerConfig, ServerIndex, ServerStats};
pub use source::{MAX_NAME_LEN, MAX_TOTAL_BASES, SeqSource, SequenceSourceTable};
