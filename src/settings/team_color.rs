//! Predefined team colors used to tint each team's characters

use rand::Rng;
use serde::Serialize;

/// Channel multiplier applied to the primary color to build the darker one
const DARKER_FACTOR: f32 = 0.3;

/// Most teams a match can have, one palette entry each
pub const PALETTE_SIZE: usize = 9;

/// Predefined palette, primaries first
const PREDEFINED_TEAM_COLORS: [u32; PALETTE_SIZE] = [
    0xFF0000, 0x5582E2, 0xFFFF00, 0x00FFFF, // primaries
    0x00E600, // darker
    0xFF8000, 0x8000FF, // primary combinations
    0x000000, 0xFFFFFF, // black and white
];

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as u8,
            g: ((hex >> 8) & 0xFF) as u8,
            b: (hex & 0xFF) as u8,
        }
    }

    fn scaled(self, factor: f32) -> Self {
        let scale = |c: u8| (c as f32 * factor) as u8;
        Self {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
        }
    }

    /// `#RRGGBB` form
    pub fn to_hex_string(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// A team's tint: a primary color and a darker companion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TeamColor {
    pub primary: Rgb,
    pub darker: Rgb,
}

impl TeamColor {
    /// Build from a primary color; the darker one is derived
    pub fn from_primary(primary: Rgb) -> Self {
        Self {
            primary,
            darker: primary.scaled(DARKER_FACTOR),
        }
    }

    pub fn new(primary: Rgb, darker: Rgb) -> Self {
        Self { primary, darker }
    }

    /// Fails when the palette cannot give `count` teams a distinct color
    pub fn ensure_available(count: usize) -> Result<(), PaletteError> {
        if count > PALETTE_SIZE {
            return Err(PaletteError::TooManyTeams {
                requested: count,
                available: PALETTE_SIZE,
            });
        }
        Ok(())
    }

    /// Pick `count` distinct palette entries at random
    pub fn predefined<R: Rng + ?Sized>(
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<TeamColor>, PaletteError> {
        Self::ensure_available(count)?;

        Ok(rand::seq::index::sample(rng, PALETTE_SIZE, count)
            .into_iter()
            .map(|i| TeamColor::from_primary(Rgb::from_hex(PREDEFINED_TEAM_COLORS[i])))
            .collect())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PaletteError {
    #[error("{requested} team colors requested but only {available} are predefined")]
    TooManyTeams { requested: usize, available: usize },
}
