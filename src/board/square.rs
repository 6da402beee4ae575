/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, str::FromStr};

use anyhow::{bail, Result};

use super::{Bitboard, Color};

/// Represents a file (column) on a chess board.
///
/// Internally represented as `0..8`, with `0` being file A.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct File(pub(crate) u8);

impl File {
    pub const A: Self = Self(0);
    pub const B: Self = Self(1);
    pub const C: Self = Self(2);
    pub const D: Self = Self(3);
    pub const E: Self = Self(4);
    pub const F: Self = Self(5);
    pub const G: Self = Self(6);
    pub const H: Self = Self(7);

    /// Number of files on a chess board.
    pub const COUNT: usize = 8;

    /// Creates a new [`File`] from the provided value, which must be `[0,7]`.
    #[inline(always)]
    pub fn new(file: u8) -> Result<Self> {
        if file >= Self::COUNT as u8 {
            bail!("Invalid file value: must be between [0,7]. Got {file}");
        }
        Ok(Self::new_unchecked(file))
    }

    /// Creates a new [`File`] without bounds checking.
    #[inline(always)]
    pub const fn new_unchecked(file: u8) -> Self {
        Self(file)
    }

    /// Creates a [`File`] from a char like `'c'` (case-insensitive).
    #[inline(always)]
    pub fn from_char(file: char) -> Result<Self> {
        let file = file.to_ascii_lowercase();
        if !file.is_ascii_lowercase() || file > 'h' {
            bail!("Invalid file char: must be between [a,h]. Got {file:?}");
        }
        Ok(Self(file as u8 - b'a'))
    }

    /// Converts this [`File`] to a lowercase char (`'a'` through `'h'`).
    #[inline(always)]
    pub const fn char(&self) -> char {
        (b'a' + self.0) as char
    }

    /// Inner `u8` of this [`File`].
    #[inline(always)]
    pub const fn inner(&self) -> u8 {
        self.0
    }

    /// This [`File`] as a `usize`, for indexing.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// An iterator over all files, from A to H.
    #[inline(always)]
    pub fn iter() -> impl ExactSizeIterator<Item = Self> + DoubleEndedIterator<Item = Self> {
        (0..Self::COUNT as u8).map(Self)
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.char())
    }
}

/// Represents a rank (row) on a chess board.
///
/// Internally represented as `0..8`, with `0` being rank 1.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Rank(pub(crate) u8);

impl Rank {
    pub const ONE: Self = Self(0);
    pub const TWO: Self = Self(1);
    pub const THREE: Self = Self(2);
    pub const FOUR: Self = Self(3);
    pub const FIVE: Self = Self(4);
    pub const SIX: Self = Self(5);
    pub const SEVEN: Self = Self(6);
    pub const EIGHT: Self = Self(7);

    /// Number of ranks on a chess board.
    pub const COUNT: usize = 8;

    /// Creates a new [`Rank`] from the provided value, which must be `[0,7]`.
    #[inline(always)]
    pub fn new(rank: u8) -> Result<Self> {
        if rank >= Self::COUNT as u8 {
            bail!("Invalid rank value: must be between [0,7]. Got {rank}");
        }
        Ok(Self::new_unchecked(rank))
    }

    /// Creates a new [`Rank`] without bounds checking.
    #[inline(always)]
    pub const fn new_unchecked(rank: u8) -> Self {
        Self(rank)
    }

    /// Creates a [`Rank`] from a char like `'4'`.
    #[inline(always)]
    pub fn from_char(rank: char) -> Result<Self> {
        if !rank.is_ascii_digit() || rank == '0' || rank == '9' {
            bail!("Invalid rank char: must be between [1,8]. Got {rank:?}");
        }
        Ok(Self(rank as u8 - b'1'))
    }

    /// Converts this [`Rank`] to a char (`'1'` through `'8'`).
    #[inline(always)]
    pub const fn char(&self) -> char {
        (b'1' + self.0) as char
    }

    /// Inner `u8` of this [`Rank`].
    #[inline(always)]
    pub const fn inner(&self) -> u8 {
        self.0
    }

    /// This [`Rank`] as a `usize`, for indexing.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// The home rank of `color`'s back pieces.
    #[inline(always)]
    pub const fn first(color: Color) -> Self {
        [Self::ONE, Self::EIGHT][color.index()]
    }

    /// The home rank of `color`'s pawns.
    #[inline(always)]
    pub const fn second(color: Color) -> Self {
        [Self::TWO, Self::SEVEN][color.index()]
    }

    /// The rank on which `color`'s pawns promote.
    #[inline(always)]
    pub const fn eighth(color: Color) -> Self {
        [Self::EIGHT, Self::ONE][color.index()]
    }

    /// The rank at the same distance from `color`'s home rank as `self` is from White's.
    #[inline(always)]
    pub const fn relative_to(self, color: Color) -> Self {
        match color {
            Color::White => self,
            Color::Black => Self(Self::EIGHT.0 - self.0),
        }
    }

    /// Absolute difference between two ranks.
    #[inline(always)]
    pub const fn abs_diff(&self, other: Self) -> u8 {
        self.0.abs_diff(other.0)
    }

    /// An iterator over all ranks, from 1 to 8.
    #[inline(always)]
    pub fn iter() -> impl ExactSizeIterator<Item = Self> + DoubleEndedIterator<Item = Self> {
        (0..Self::COUNT as u8).map(Self)
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.char())
    }
}

impl fmt::Debug for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rank({})", self.char())
    }
}

/// Represents a single square on a chess board.
///
/// Internally represented as `0..64`, file-major with A1 = 0 and H8 = 63,
/// following [Little-Endian Rank-File mapping](https://www.chessprogramming.org/Square_Mapping_Considerations#Little-Endian_Rank-File_Mapping).
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Square(pub(crate) u8);

#[rustfmt::skip]
impl Square {
    pub const A1: Self = Self(0);
    pub const B1: Self = Self(1);
    pub const C1: Self = Self(2);
    pub const D1: Self = Self(3);
    pub const E1: Self = Self(4);
    pub const F1: Self = Self(5);
    pub const G1: Self = Self(6);
    pub const H1: Self = Self(7);
    pub const A2: Self = Self(8);
    pub const B2: Self = Self(9);
    pub const C2: Self = Self(10);
    pub const D2: Self = Self(11);
    pub const E2: Self = Self(12);
    pub const F2: Self = Self(13);
    pub const G2: Self = Self(14);
    pub const H2: Self = Self(15);
    pub const A3: Self = Self(16);
    pub const B3: Self = Self(17);
    pub const C3: Self = Self(18);
    pub const D3: Self = Self(19);
    pub const E3: Self = Self(20);
    pub const F3: Self = Self(21);
    pub const G3: Self = Self(22);
    pub const H3: Self = Self(23);
    pub const A4: Self = Self(24);
    pub const B4: Self = Self(25);
    pub const C4: Self = Self(26);
    pub const D4: Self = Self(27);
    pub const E4: Self = Self(28);
    pub const F4: Self = Self(29);
    pub const G4: Self = Self(30);
    pub const H4: Self = Self(31);
    pub const A5: Self = Self(32);
    pub const B5: Self = Self(33);
    pub const C5: Self = Self(34);
    pub const D5: Self = Self(35);
    pub const E5: Self = Self(36);
    pub const F5: Self = Self(37);
    pub const G5: Self = Self(38);
    pub const H5: Self = Self(39);
    pub const A6: Self = Self(40);
    pub const B6: Self = Self(41);
    pub const C6: Self = Self(42);
    pub const D6: Self = Self(43);
    pub const E6: Self = Self(44);
    pub const F6: Self = Self(45);
    pub const G6: Self = Self(46);
    pub const H6: Self = Self(47);
    pub const A7: Self = Self(48);
    pub const B7: Self = Self(49);
    pub const C7: Self = Self(50);
    pub const D7: Self = Self(51);
    pub const E7: Self = Self(52);
    pub const F7: Self = Self(53);
    pub const G7: Self = Self(54);
    pub const H7: Self = Self(55);
    pub const A8: Self = Self(56);
    pub const B8: Self = Self(57);
    pub const C8: Self = Self(58);
    pub const D8: Self = Self(59);
    pub const E8: Self = Self(60);
    pub const F8: Self = Self(61);
    pub const G8: Self = Self(62);
    pub const H8: Self = Self(63);
}

impl Square {
    /// Number of squares on a chess board.
    pub const COUNT: usize = 64;

    /// Creates a new [`Square`] from the provided [`File`] and [`Rank`].
    #[inline(always)]
    pub const fn new(file: File, rank: Rank) -> Self {
        Self(rank.0 << 3 | file.0)
    }

    /// Creates a new [`Square`] from an index, which must be `[0,63]`.
    #[inline(always)]
    pub fn from_index(index: usize) -> Result<Self> {
        if index >= Self::COUNT {
            bail!("Invalid square index: must be between [0,63]. Got {index}");
        }
        Ok(Self::from_index_unchecked(index))
    }

    /// Creates a new [`Square`] from an index without bounds checking.
    #[inline(always)]
    pub const fn from_index_unchecked(index: usize) -> Self {
        Self(index as u8)
    }

    /// Creates a new [`Square`] from the provided bits without bounds checking.
    #[inline(always)]
    pub const fn from_bits_unchecked(bits: u8) -> Self {
        Self(bits)
    }

    /// Fetches the [`File`] of this [`Square`].
    #[inline(always)]
    pub const fn file(&self) -> File {
        File(self.0 & 7)
    }

    /// Fetches the [`Rank`] of this [`Square`].
    #[inline(always)]
    pub const fn rank(&self) -> Rank {
        Rank(self.0 >> 3)
    }

    /// Inner `u8` of this [`Square`].
    #[inline(always)]
    pub const fn inner(&self) -> u8 {
        self.0
    }

    /// This [`Square`] as a `usize`, for indexing.
    #[inline(always)]
    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// A [`Bitboard`] with only this [`Square`]'s bit set.
    #[inline(always)]
    pub const fn bitboard(&self) -> Bitboard {
        Bitboard::from_square(*self)
    }

    /// Offsets this [`Square`] by the provided file and rank deltas,
    /// returning `None` if the result would fall off the board.
    #[inline(always)]
    pub const fn offset(&self, file_delta: i8, rank_delta: i8) -> Option<Self> {
        let file = self.file().0 as i8 + file_delta;
        let rank = self.rank().0 as i8 + rank_delta;

        if file < 0 || file > 7 || rank < 0 || rank > 7 {
            None
        } else {
            Some(Self::new(File(file as u8), Rank(rank as u8)))
        }
    }

    /// The square `n` ranks "forward", relative to `color`.
    #[inline(always)]
    pub const fn forward_by(&self, color: Color, n: u8) -> Option<Self> {
        match color {
            Color::White => self.offset(0, n as i8),
            Color::Black => self.offset(0, -(n as i8)),
        }
    }

    /// The square `n` ranks "backward", relative to `color`.
    #[inline(always)]
    pub const fn backward_by(&self, color: Color, n: u8) -> Option<Self> {
        self.forward_by(color.opponent(), n)
    }

    /// This [`Square`] mirrored across the board's horizontal center line if `color` is Black.
    ///
    /// Used for rank-relative table lookups like piece-square tables.
    #[inline(always)]
    pub const fn rank_relative_to(&self, color: Color) -> Self {
        Self::new(self.file(), self.rank().relative_to(color))
    }

    /// Number of files between `self` and `other`.
    #[inline(always)]
    pub const fn distance_files(&self, other: Self) -> u8 {
        self.file().0.abs_diff(other.file().0)
    }

    /// Number of ranks between `self` and `other`.
    #[inline(always)]
    pub const fn distance_ranks(&self, other: Self) -> u8 {
        self.rank().0.abs_diff(other.rank().0)
    }

    /// Creates a [`Square`] from a string like `"e4"`.
    #[inline(always)]
    pub fn from_uci(square: &str) -> Result<Self> {
        let bytes = square.as_bytes();
        if bytes.len() != 2 {
            bail!("Invalid square: must be 2 characters. Got {square:?}");
        }
        let file = File::from_char(bytes[0] as char)?;
        let rank = Rank::from_char(bytes[1] as char)?;

        Ok(Self::new(file, rank))
    }

    /// Converts this [`Square`] to a string like `"e4"`.
    #[inline(always)]
    pub fn to_uci(self) -> String {
        format!("{}{}", self.file(), self.rank())
    }

    /// An iterator over all squares, from A1 to H8.
    #[inline(always)]
    pub fn iter() -> impl ExactSizeIterator<Item = Self> + DoubleEndedIterator<Item = Self> {
        (0..Self::COUNT as u8).map(Self)
    }
}

impl FromStr for Square {
    type Err = anyhow::Error;
    #[inline(always)]
    fn from_str(s: &str) -> Result<Self> {
        Self::from_uci(s)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file(), self.rank())
    }
}

impl fmt::Debug for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Square({self})")
    }
}
