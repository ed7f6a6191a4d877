//! Match settings carried across session transitions

pub mod codec;
pub mod team_color;

pub use codec::MatchSettings;
pub use team_color::{PaletteError, Rgb, TeamColor};
