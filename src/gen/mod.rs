//! Shape generators.
//!
//! Each generator carves tile kinds into a [`TileGrid`](crate::grid::TileGrid)
//! from an injected rng and returns enough structure for the later passes
//! (rooms for corridor attachment, the grid itself for terrain conversion).

pub mod cave;
pub mod layout;
pub mod maze;
pub mod rooms;
