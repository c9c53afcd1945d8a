//! Procedural zone generation library
//!
//! Builds themed zones (mazes, caves, room dungeons, wilderness), indexes
//! their contents spatially, and caches generated maps through a lazy
//! persistent atlas. Consumed by the engine; no binaries here.

pub mod atlas;
pub mod error;
pub mod gen;
pub mod generator;
pub mod geom;
pub mod grid;
pub mod hooks;
pub mod map;
pub mod random;
pub mod spatial;
pub mod store;
pub mod terrain;
pub mod theme;
pub mod worker;
pub mod zone;

pub use atlas::{Atlas, MapDef};
pub use error::{GenError, GenResult};
pub use geom::{Point, Rect, Side};
pub use hooks::{EntityFactory, GenContext, QuestPlacement, QuestProvider, ThemeSource};
pub use map::{Door, Map, MapKind};
pub use theme::{DungeonTheme, RegionTheme, ZoneTheme};
pub use zone::{Region, Renderables, Zone};
