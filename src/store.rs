//! Persistent key-value store for maps and zones.
//!
//! One directory, one JSON file per entry. Zones are keyed
//! `"{map_id}:{zone_index}"` and saved independently of their map so a
//! dungeon loads zone by zone; the map file itself carries the door graph
//! and per-zone metadata. Records are versioned; an entry written by an
//! incompatible build reads back as absent rather than as garbage.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{GenError, GenResult};
use crate::geom::{Point, Rect};
use crate::map::Door;
use crate::zone::Region;

/// Bumped whenever a record layout changes shape.
pub const RECORD_VERSION: u32 = 1;

/// Serialized form of one zone.
#[derive(Debug, Serialize, Deserialize)]
pub struct ZoneRecord {
    pub version: u32,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub theme: Option<String>,
    pub origin_theme: Option<String>,
    pub regions: Vec<(u64, Region)>,
    pub creatures: Vec<(u64, Rect)>,
    pub items: Vec<(u64, Rect)>,
    pub tops: Vec<(u64, Rect)>,
    pub lights: Vec<(Point, u32)>,
    pub entries: Vec<Point>,
}

/// Per-zone metadata kept on the map record so a zone lost from the store
/// can be regenerated in place.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ZoneMeta {
    pub name: String,
    pub origin_theme: Option<String>,
}

/// Serialized form of one map, minus the zone payloads.
#[derive(Debug, Serialize, Deserialize)]
pub struct MapRecord {
    pub version: u32,
    pub id: u32,
    pub is_dungeon: bool,
    pub connections: HashMap<usize, Vec<Door>>,
    pub zones: Vec<ZoneMeta>,
}

/// Directory-backed store.
#[derive(Debug)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    /// Open (creating if needed) a store directory.
    pub fn open(dir: impl Into<PathBuf>) -> GenResult<Store> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Store { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn zone_path(&self, map_id: u32, index: usize) -> PathBuf {
        self.dir.join(format!("{map_id}:{index}.zone.json"))
    }

    fn map_path(&self, map_id: u32) -> PathBuf {
        self.dir.join(format!("{map_id}.map.json"))
    }

    pub fn save_zone(&self, map_id: u32, index: usize, record: &ZoneRecord) -> GenResult<()> {
        let json = serde_json::to_string(record).map_err(|source| GenError::Corrupt {
            key: format!("{map_id}:{index}"),
            source,
        })?;
        fs::write(self.zone_path(map_id, index), json)?;
        debug!("stored zone {map_id}:{index}");
        Ok(())
    }

    /// Load one zone. `Ok(None)` when the entry does not exist or was
    /// written by an incompatible version; `Err(Corrupt)` when it exists
    /// but does not decode.
    pub fn load_zone(&self, map_id: u32, index: usize) -> GenResult<Option<ZoneRecord>> {
        let path = self.zone_path(map_id, index);
        let Some(json) = read_if_present(&path)? else {
            return Ok(None);
        };
        let record: ZoneRecord =
            serde_json::from_str(&json).map_err(|source| GenError::Corrupt {
                key: format!("{map_id}:{index}"),
                source,
            })?;
        if record.version != RECORD_VERSION {
            warn!(
                "zone {map_id}:{index} has record version {} (want {RECORD_VERSION}); ignoring",
                record.version
            );
            return Ok(None);
        }
        debug!("loaded zone {map_id}:{index}");
        Ok(Some(record))
    }

    pub fn save_map(&self, record: &MapRecord) -> GenResult<()> {
        let json = serde_json::to_string(record).map_err(|source| GenError::Corrupt {
            key: format!("{}", record.id),
            source,
        })?;
        fs::write(self.map_path(record.id), json)?;
        debug!("stored map {}", record.id);
        Ok(())
    }

    pub fn load_map(&self, map_id: u32) -> GenResult<Option<MapRecord>> {
        let path = self.map_path(map_id);
        let Some(json) = read_if_present(&path)? else {
            return Ok(None);
        };
        let record: MapRecord =
            serde_json::from_str(&json).map_err(|source| GenError::Corrupt {
                key: format!("{map_id}"),
                source,
            })?;
        if record.version != RECORD_VERSION {
            warn!(
                "map {map_id} has record version {} (want {RECORD_VERSION}); ignoring",
                record.version
            );
            return Ok(None);
        }
        Ok(Some(record))
    }
}

fn read_if_present(path: &Path) -> GenResult<Option<String>> {
    match fs::read_to_string(path) {
        Ok(json) => Ok(Some(json)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
