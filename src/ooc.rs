//! Overused-tile (`.ooc`) files: header + flat list of tile keys.
//!
//! Layout: u32 signature, u32 tile size, then one u32 key per overused tile.
//! Integers are written in native byte order; a reader on the other endianness
//! sees the signature byte-swapped and swaps the whole file.

use bytemuck::pod_collect_to_vec;
use byteorder::{NativeEndian as NE, ReadBytesExt, WriteBytesExt};
use log::info;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::builder::{IndexParams, TargetSeq, count_tiles};
use crate::encode::{Alphabet, TileCodec, reverse_complement};
use crate::error::IndexError;
use crate::translate::translate_frames;

pub const OOC_SIG: u32 = 0x5841_55f2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OocHeader {
    pub sig: u32,
    pub tile_size: u32,
}

impl OocHeader {
    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_u32::<NE>(self.sig)?;
        w.write_u32::<NE>(self.tile_size)?;
        Ok(())
    }

    pub fn read_from<R: Read>(r: &mut R) -> std::io::Result<Self> {
        let sig = r.read_u32::<NE>()?;
        let tile_size = r.read_u32::<NE>()?;
        Ok(OocHeader { sig, tile_size })
    }
}

fn ooc_err(path: &Path, detail: impl Into<String>) -> IndexError {
    IndexError::Ooc {
        path: path.to_path_buf(),
        detail: detail.into(),
    }
}

/// Read tile keys from `path`, checking that it was made for `tile_size`.
pub fn read_ooc(path: &Path, tile_size: usize) -> Result<Vec<u32>, IndexError> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    if bytes.len() < 8 {
        return Err(ooc_err(path, "file shorter than header"));
    }
    let header = OocHeader::read_from(&mut &bytes[..8])?;
    let swapped = if header.sig == OOC_SIG {
        false
    } else if header.sig.swap_bytes() == OOC_SIG {
        true
    } else {
        return Err(ooc_err(path, format!("bad signature {:#010x}", header.sig)));
    };
    let file_tile = if swapped {
        header.tile_size.swap_bytes()
    } else {
        header.tile_size
    };
    if file_tile as usize != tile_size {
        return Err(ooc_err(
            path,
            format!("made for tile size {file_tile}, index uses {tile_size}"),
        ));
    }
    let body = &bytes[8..];
    if body.len() % 4 != 0 {
        return Err(ooc_err(path, "truncated tile list"));
    }
    let mut keys: Vec<u32> = pod_collect_to_vec(body);
    if swapped {
        for k in keys.iter_mut() {
            *k = k.swap_bytes();
        }
    }
    Ok(keys)
}

/// Writer that serializes a list of overused tile keys.
pub struct OocWriter<'a> {
    tiles: &'a [u32],
    tile_size: usize,
}

impl<'a> OocWriter<'a> {
    pub fn new(tiles: &'a [u32], tile_size: usize) -> Self {
        Self { tiles, tile_size }
    }

    pub fn write_to(&self, path: &Path) -> Result<(), IndexError> {
        let mut w = BufWriter::new(File::create(path)?);
        OocHeader {
            sig: OOC_SIG,
            tile_size: self.tile_size as u32,
        }
        .write_to(&mut w)?;
        w.write_all(bytemuck::cast_slice::<u32, u8>(self.tiles))?;
        w.flush()?;
        Ok(())
    }
}

/// What the counted targets are.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OocSource {
    /// Nucleotides, counted on both strands.
    Dna,
    /// Protein, counted as is.
    Protein,
    /// Nucleotides translated in three frames on both strands.
    TranslatedDna,
}

/// Count every tile of `targets` and return the keys seen more than the
/// overuse threshold of `params`, ascending.
pub fn make_ooc(
    targets: &[TargetSeq],
    params: &IndexParams,
    source: OocSource,
) -> Result<Vec<u32>, IndexError> {
    let alphabet = match source {
        OocSource::Dna => Alphabet::Dna,
        OocSource::Protein | OocSource::TranslatedDna => Alphabet::Protein,
    };
    let params = params.clone().with_alphabet(alphabet);
    let resolved = params.resolve()?;
    let codec = TileCodec::new(alphabet, resolved.tile_size, false)?;
    if codec.is_segmented() {
        return Err(IndexError::OocOnSegmented(resolved.tile_size));
    }
    let cap = resolved.rep_match.saturating_add(1);
    let step = resolved.tile_size;
    let mut counts = vec![0u32; codec.head_space()];

    for t in targets {
        info!("Counting {}", t.name);
        match source {
            OocSource::Protein => count_tiles(&codec, &t.seq, step, &mut counts, cap),
            OocSource::Dna => {
                count_tiles(&codec, &t.seq, step, &mut counts, cap);
                count_tiles(&codec, &reverse_complement(&t.seq), step, &mut counts, cap);
            }
            OocSource::TranslatedDna => {
                for dna in [t.seq.clone(), reverse_complement(&t.seq)] {
                    for pep in translate_frames(&dna) {
                        count_tiles(&codec, &pep, step, &mut counts, cap);
                    }
                }
            }
        }
    }

    let overused: Vec<u32> = counts
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c > resolved.rep_match)
        .map(|(k, _)| k as u32)
        .collect();
    info!(
        "Found {} overused {}-mers",
        overused.len(),
        resolved.tile_size
    );
    Ok(overused)
}
