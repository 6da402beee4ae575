/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{fmt, str::FromStr};

use anyhow::{bail, Result};

/// Variant of chess being played.
///
/// Every rule difference in the core is a branch off this tag. The id bits
/// flow into the initial hash keys so that positions from different variants
/// never alias in a transposition table.
#[derive(Debug, Default, PartialEq, Eq, Hash, Clone, Copy)]
#[repr(u8)]
pub enum Variant {
    /// Standard chess.
    #[default]
    Standard,

    /// Fischer Random chess: shuffled home ranks, castling with variable rook files.
    Chess960,

    /// Bringing your King to one of the four center squares wins.
    KingOfTheHill,

    /// Delivering check three times wins.
    ThreeCheck,

    /// White plays 36 pawns and no King; Black must exterminate them.
    Horde,

    /// No checks; race your King to the eighth rank.
    RacingKings,

    /// Captures are compulsory and losing all pieces wins. There is no check.
    Antichess,

    /// Captures detonate, removing every non-pawn piece adjacent to the target.
    Atomic,
}

impl Variant {
    /// All variants, in id order.
    pub const ALL: [Self; 8] = [
        Self::Standard,
        Self::Chess960,
        Self::KingOfTheHill,
        Self::ThreeCheck,
        Self::Horde,
        Self::RacingKings,
        Self::Antichess,
        Self::Atomic,
    ];

    /// The variant id seeded into the hash keys.
    #[inline(always)]
    pub const fn id(&self) -> u64 {
        *self as u64
    }

    /// Whether FEN castling rights are written in Shredder (rook file) form.
    #[inline(always)]
    pub const fn is_chess960(&self) -> bool {
        matches!(self, Self::Chess960)
    }

    /// Whether this variant has the concept of check at all.
    ///
    /// Antichess has no royalty; Racing Kings forbids giving check, but the
    /// concept still exists there (checking moves must be detected to be
    /// rejected).
    #[inline(always)]
    pub const fn has_checks(&self) -> bool {
        !matches!(self, Self::Antichess)
    }

    /// Whether castling exists in this variant.
    #[inline(always)]
    pub const fn has_castling(&self) -> bool {
        !matches!(self, Self::Antichess | Self::RacingKings)
    }

    /// A short lowercase name, as used by UCI option strings.
    #[inline(always)]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Chess960 => "chess960",
            Self::KingOfTheHill => "kingofthehill",
            Self::ThreeCheck => "threecheck",
            Self::Horde => "horde",
            Self::RacingKings => "racingkings",
            Self::Antichess => "antichess",
            Self::Atomic => "atomic",
        }
    }
}

impl FromStr for Variant {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "standard" | "chess" => Ok(Self::Standard),
            "chess960" | "fischerandom" | "frc" => Ok(Self::Chess960),
            "kingofthehill" | "koth" => Ok(Self::KingOfTheHill),
            "threecheck" | "3check" => Ok(Self::ThreeCheck),
            "horde" => Ok(Self::Horde),
            "racingkings" | "race" => Ok(Self::RacingKings),
            "antichess" | "giveaway" | "suicide" => Ok(Self::Antichess),
            "atomic" => Ok(Self::Atomic),
            _ => bail!("Unrecognized variant {s:?}"),
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_ids_are_distinct() {
        for (i, a) in Variant::ALL.iter().enumerate() {
            for b in &Variant::ALL[i + 1..] {
                assert_ne!(a.id(), b.id());
            }
        }
    }

    #[test]
    fn test_variant_parsing() {
        assert_eq!("atomic".parse::<Variant>().unwrap(), Variant::Atomic);
        assert_eq!("3check".parse::<Variant>().unwrap(), Variant::ThreeCheck);
        assert!("crazyhouse".parse::<Variant>().is_err());
    }
}
