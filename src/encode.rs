//! Tile encoding: symbol lookup tables, tile keys, head/tail split.
//!
//! Conventions
//! - A tile key is the base-`alphabet_size` number spelled by the window, first
//!   symbol most significant. Keys cover exactly `[0, size^len)`.
//! - The weight of position `i` in a tile of length `n` is `size^(n-1-i)`, so
//!   substituting one symbol is a key delta, not a re-scan.
//! - Segmented layouts split a tile into a head (indexed) and a tail (stored per
//!   posting); `combine(head, tail) == encode(whole)`.

use crate::error::IndexError;

/// Marker for symbols outside the alphabet.
pub const INVALID: u8 = 0xFF;

/// Amino acids in key order.
pub const AMINO_ACIDS: &[u8; 20] = b"ACDEFGHIKLMNPQRSTVWY";

/// 256-entry LUT: ASCII → 2-bit (A=0, C=1, G=2, T/U=3), 0xFF otherwise. Case-insensitive.
pub static DNA_LUT: [u8; 256] = {
    let mut t = [INVALID; 256];
    t[b'A' as usize] = 0;
    t[b'a' as usize] = 0;
    t[b'C' as usize] = 1;
    t[b'c' as usize] = 1;
    t[b'G' as usize] = 2;
    t[b'g' as usize] = 2;
    t[b'T' as usize] = 3;
    t[b't' as usize] = 3;
    t[b'U' as usize] = 3;
    t[b'u' as usize] = 3;
    t
};

/// Like [`DNA_LUT`] but upper case is invalid, leaving soft-masked bases unindexed.
pub static DNA_LUT_LOWER: [u8; 256] = {
    let mut t = [INVALID; 256];
    t[b'a' as usize] = 0;
    t[b'c' as usize] = 1;
    t[b'g' as usize] = 2;
    t[b't' as usize] = 3;
    t[b'u' as usize] = 3;
    t
};

/// 256-entry LUT: ASCII amino acid → index into [`AMINO_ACIDS`]. Case-insensitive.
pub static AA_LUT: [u8; 256] = {
    let mut t = [INVALID; 256];
    let mut i = 0;
    while i < AMINO_ACIDS.len() {
        let c = AMINO_ACIDS[i];
        t[c as usize] = i as u8;
        t[(c + 32) as usize] = i as u8;
        i += 1;
    }
    t
};

/// Sequence alphabet of an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Alphabet {
    /// Nucleotides, 4 symbols.
    Dna,
    /// Amino acids, 20 symbols.
    Protein,
}

impl Alphabet {
    /// Number of symbols.
    #[inline]
    pub fn size(self) -> u32 {
        match self {
            Alphabet::Dna => 4,
            Alphabet::Protein => 20,
        }
    }

    /// Allowed tile sizes.
    pub fn tile_range(self) -> (usize, usize) {
        match self {
            Alphabet::Dna => (6, 18),
            Alphabet::Protein => (3, 8),
        }
    }

    /// Longest head that is still indexed directly (4^12 / 20^5 keys).
    pub fn max_head(self) -> usize {
        match self {
            Alphabet::Dna => 12,
            Alphabet::Protein => 5,
        }
    }

    /// Symbol lookup table. `mask_upper` only applies to DNA.
    pub fn lut(self, mask_upper: bool) -> &'static [u8; 256] {
        match (self, mask_upper) {
            (Alphabet::Dna, false) => &DNA_LUT,
            (Alphabet::Dna, true) => &DNA_LUT_LOWER,
            (Alphabet::Protein, _) => &AA_LUT,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Alphabet::Dna => "DNA",
            Alphabet::Protein => "protein",
        }
    }
}

/// Check that `tile_size` is legal for `alphabet`.
pub fn check_tile_size(tile_size: usize, alphabet: Alphabet) -> Result<(), IndexError> {
    let (min, max) = alphabet.tile_range();
    if tile_size < min || tile_size > max {
        return Err(IndexError::BadTileSize {
            alphabet: alphabet.name(),
            min,
            max,
            got: tile_size,
        });
    }
    Ok(())
}

/// `base^exp` for small tile arithmetic.
#[inline]
pub fn pow(base: u32, exp: usize) -> u32 {
    let mut r = 1u32;
    for _ in 0..exp {
        r *= base;
    }
    r
}

/// Encode `window` with `lut` in base `radix`. `None` on any invalid symbol.
#[inline]
pub fn encode_window(window: &[u8], lut: &[u8; 256], radix: u32) -> Option<u32> {
    let mut key = 0u32;
    for &b in window {
        let v = lut[b as usize];
        if v == INVALID {
            return None;
        }
        key = key * radix + v as u32;
    }
    Some(key)
}

/// Fixed-length tile codec for one alphabet and tile size.
#[derive(Clone, Debug)]
pub struct TileCodec {
    alphabet: Alphabet,
    tile_size: usize,
    head_size: usize,
    lut: &'static [u8; 256],
}

impl TileCodec {
    /// Codec for `tile_size`; tiles longer than the alphabet's max head are segmented.
    pub fn new(alphabet: Alphabet, tile_size: usize, mask_upper: bool) -> Result<Self, IndexError> {
        check_tile_size(tile_size, alphabet)?;
        Ok(Self {
            alphabet,
            tile_size,
            head_size: tile_size.min(alphabet.max_head()),
            lut: alphabet.lut(mask_upper),
        })
    }

    /// Same codec with a case-insensitive table, for scanning queries.
    pub fn unmasked(&self) -> Self {
        Self {
            lut: self.alphabet.lut(false),
            ..self.clone()
        }
    }

    #[inline]
    pub fn alphabet(&self) -> Alphabet {
        self.alphabet
    }
    #[inline]
    pub fn tile_size(&self) -> usize {
        self.tile_size
    }
    #[inline]
    pub fn head_size(&self) -> usize {
        self.head_size
    }
    /// Tail length; zero for the direct layout.
    #[inline]
    pub fn tail_size(&self) -> usize {
        self.tile_size - self.head_size
    }
    #[inline]
    pub fn is_segmented(&self) -> bool {
        self.tail_size() > 0
    }
    #[inline]
    pub fn lut(&self) -> &'static [u8; 256] {
        self.lut
    }

    /// Symbol value, `None` if outside the alphabet.
    #[inline]
    pub fn symbol(&self, b: u8) -> Option<u32> {
        let v = self.lut[b as usize];
        if v == INVALID { None } else { Some(v as u32) }
    }

    /// Number of distinct head keys, i.e. the directly indexed key space.
    pub fn head_space(&self) -> usize {
        pow(self.alphabet.size(), self.head_size) as usize
    }

    /// Key of the full tile at `seq[offset..offset + tile_size]`.
    #[inline]
    pub fn encode(&self, seq: &[u8], offset: usize) -> Option<u32> {
        let window = seq.get(offset..offset + self.tile_size)?;
        encode_window(window, self.lut, self.alphabet.size())
    }

    /// Key of the head part of the tile at `offset`.
    #[inline]
    pub fn encode_head(&self, seq: &[u8], offset: usize) -> Option<u32> {
        let window = seq.get(offset..offset + self.head_size)?;
        encode_window(window, self.lut, self.alphabet.size())
    }

    /// Key of the tail part of the tile at `offset`; `Some(0)` when there is no tail.
    #[inline]
    pub fn encode_tail(&self, seq: &[u8], offset: usize) -> Option<u32> {
        let start = offset + self.head_size;
        let window = seq.get(start..offset + self.tile_size)?;
        encode_window(window, self.lut, self.alphabet.size())
    }

    /// Reassemble a full key from head and tail keys.
    #[inline]
    pub fn combine(&self, head: u32, tail: u32) -> u64 {
        head as u64 * pow(self.alphabet.size(), self.tail_size()) as u64 + tail as u64
    }

    /// Weight of position `pos` within a window of `len` symbols.
    #[inline]
    pub fn weight(&self, pos: usize, len: usize) -> u32 {
        pow(self.alphabet.size(), len - 1 - pos)
    }
}

// ---- Sequence helpers ----

/// Complement of one nucleotide, preserving case; anything else maps to itself.
#[inline]
pub fn complement(b: u8) -> u8 {
    match b {
        b'A' => b'T',
        b'C' => b'G',
        b'G' => b'C',
        b'T' | b'U' => b'A',
        b'a' => b't',
        b'c' => b'g',
        b'g' => b'c',
        b't' | b'u' => b'a',
        other => other,
    }
}

/// Reverse complement of a nucleotide sequence.
pub fn reverse_complement(seq: &[u8]) -> Vec<u8> {
    seq.iter().rev().map(|&b| complement(b)).collect()
}

/// Reverse-complement in place.
pub fn reverse_complement_in_place(seq: &mut [u8]) {
    seq.reverse();
    for b in seq.iter_mut() {
        *b = complement(*b);
    }
}
