//! Collaborator traits the host engine implements.
//!
//! Generation never constructs engine entities or reads resource files
//! itself. It asks a `ThemeSource` for parameter records, an `EntityFactory`
//! for fresh entity ids, and a `QuestProvider` for placements that must win
//! over random population.

use crate::geom::Point;
use crate::theme::{DungeonTheme, RegionTheme, ZoneTheme};

/// Resolves theme names to parameter records.
pub trait ThemeSource {
    fn zone_theme(&self, name: &str) -> Option<&ZoneTheme>;
    fn dungeon_theme(&self, name: &str) -> Option<&DungeonTheme>;
    fn region_theme(&self, name: &str) -> Option<&RegionTheme>;
}

/// Creates engine entities from resource identifiers and hands back their
/// ids. The zone only ever stores the id.
pub trait EntityFactory {
    fn create_creature(&mut self, resource_id: &str) -> u64;
    fn create_item(&mut self, resource_id: &str) -> u64;
}

/// What a quest wants placed in a zone.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuestPlacement {
    Creature {
        resource_id: String,
        /// Fixed cell, or `None` for any open cell.
        position: Option<Point>,
    },
    Item {
        resource_id: String,
        position: Option<Point>,
    },
}

/// Supplies quest placements for a zone about to be generated. These are
/// honored before random population so quest content never loses a spot
/// to a random spawn.
pub trait QuestProvider {
    fn placements_for(&self, map_id: u32, zone_index: usize) -> Vec<QuestPlacement>;
}

/// Borrowed bundle of all three collaborators, passed through generation.
pub struct GenContext<'a> {
    pub themes: &'a dyn ThemeSource,
    pub entities: &'a mut dyn EntityFactory,
    pub quests: &'a dyn QuestProvider,
}
