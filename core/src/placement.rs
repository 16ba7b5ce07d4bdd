//! Spatial placement validator — footprints, world bounds and the wall ring.
//!
//! CHECK ORDER (fixed):
//!   1. building type resolves to dimensions
//!   2. anchor type sits at the origin (when position checking is on)
//!   3. footprint lies inside the world bounds
//!   4. footprint overlaps no other building
//!   5. footprint overlaps no part of the current wall ring
//!
//! All rectangles are closed-open: a footprint at (x, y) of size w×h covers
//! [x, x+w) × [y, y+h). Pure — safe to call from anywhere.

use crate::{
    config::{GameConfig, WallGenerationConfig},
    model::Building,
    types::{BuildingId, FiefdomId},
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x:      i64,
    pub y:      i64,
    pub width:  i64,
    pub height: i64,
}

impl Rect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> i64 { self.x + self.width }
    pub fn bottom(&self) -> i64 { self.y + self.height }

    /// Each rectangle's start is strictly less than the other's end on both axes.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WallDimensions {
    pub width:     i64,
    pub length:    i64,
    pub thickness: i64,
}

/// The band of tiles a wall generation occupies, centred on the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WallRing {
    pub outer: Rect,
    pub inner: Rect,
}

impl WallRing {
    pub fn from_dimensions(dims: WallDimensions) -> Self {
        let outer = Rect::new(-dims.width / 2, -dims.length / 2, dims.width, dims.length);
        let inner = Rect::new(
            outer.x + dims.thickness,
            outer.y + dims.thickness,
            (dims.width - 2 * dims.thickness).max(0),
            (dims.length - 2 * dims.thickness).max(0),
        );
        Self { outer, inner }
    }

    /// True if any tile of `rect` lands on the wall band.
    pub fn overlaps(&self, rect: &Rect) -> bool {
        rect.overlaps(&self.outer) && !self.inner.contains(rect)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementError {
    UnknownBuildingType,
    AnchorMustBeAtOrigin,
    InvalidPosition,
    BuildingOverlap,
    WallOverlap,
}

impl PlacementError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownBuildingType  => "unknown_building_type",
            Self::AnchorMustBeAtOrigin => "anchor_must_be_at_origin",
            Self::InvalidPosition      => "invalid_position",
            Self::BuildingOverlap      => "building_overlap",
            Self::WallOverlap          => "wall_overlap",
        }
    }
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementCheck {
    pub valid: bool,
    pub error: Option<PlacementError>,
    pub overlapping_building_ids: Vec<BuildingId>,
    pub message: String,
}

impl PlacementCheck {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
            overlapping_building_ids: Vec::new(),
            message: String::new(),
        }
    }

    fn fail(error: PlacementError, message: String) -> Self {
        Self {
            valid: false,
            error: Some(error),
            overlapping_building_ids: Vec::new(),
            message,
        }
    }
}

/// What the validator needs to know about one fiefdom's grid.
#[derive(Debug, Clone, Copy)]
pub struct SiteLayout<'a> {
    pub fiefdom_id:      FiefdomId,
    /// Active wall generation. 0 = no ring.
    pub wall_generation: i64,
    pub buildings:       &'a [Building],
}

pub struct PlacementValidator<'a> {
    config: &'a GameConfig,
}

impl<'a> PlacementValidator<'a> {
    pub fn new(config: &'a GameConfig) -> Self {
        Self { config }
    }

    pub fn building_dimensions(&self, building_type: &str) -> Option<(i64, i64)> {
        self.config.building(building_type).map(|b| (b.width, b.height))
    }

    pub fn footprint(&self, building_type: &str, x: i64, y: i64) -> Option<Rect> {
        self.building_dimensions(building_type)
            .map(|(w, h)| Rect::new(x, y, w, h))
    }

    pub fn wall_config_by_generation(&self, generation: i64) -> Option<&'a WallGenerationConfig> {
        self.config.wall(generation)
    }

    pub fn wall_dimensions(&self, generation: i64) -> Option<WallDimensions> {
        self.wall_config_by_generation(generation).map(|w| WallDimensions {
            width:     w.width,
            length:    w.length,
            thickness: w.thickness,
        })
    }

    pub fn wall_ring(&self, generation: i64) -> Option<WallRing> {
        self.wall_dimensions(generation).map(WallRing::from_dimensions)
    }

    pub fn in_bounds(&self, rect: &Rect) -> bool {
        let world = &self.config.world;
        rect.x >= world.grid_min
            && rect.y >= world.grid_min
            && rect.right() <= world.grid_max
            && rect.bottom() <= world.grid_max
    }

    /// Ids of buildings whose footprint intersects `rect`, skipping `exclude`.
    /// Buildings of unknown type are skipped.
    pub fn overlapping_buildings(
        &self,
        layout: &SiteLayout<'_>,
        rect: &Rect,
        exclude: Option<BuildingId>,
    ) -> Vec<BuildingId> {
        layout
            .buildings
            .iter()
            .filter(|b| Some(b.id) != exclude)
            .filter_map(|b| {
                let existing = self.footprint(&b.building_type, b.x, b.y)?;
                existing.overlaps(rect).then_some(b.id)
            })
            .collect()
    }

    /// True if `rect` touches the ring of `generation`. Generations with no
    /// configuration (including 0) have no ring.
    pub fn overlaps_walls(&self, generation: i64, rect: &Rect) -> bool {
        self.wall_ring(generation)
            .map(|ring| ring.overlaps(rect))
            .unwrap_or(false)
    }

    pub fn check_placement(
        &self,
        layout: &SiteLayout<'_>,
        building_type: &str,
        x: i64,
        y: i64,
        check_anchor_position: bool,
        exclude_building_id: Option<BuildingId>,
    ) -> PlacementCheck {
        let Some(rect) = self.footprint(building_type, x, y) else {
            return PlacementCheck::fail(
                PlacementError::UnknownBuildingType,
                format!("Unknown building type: {building_type}"),
            );
        };

        if check_anchor_position && self.config.is_anchor(building_type) && (x, y) != (0, 0) {
            return PlacementCheck::fail(
                PlacementError::AnchorMustBeAtOrigin,
                format!("{building_type} must be built at (0, 0), not ({x}, {y})"),
            );
        }

        if !self.in_bounds(&rect) {
            return PlacementCheck::fail(
                PlacementError::InvalidPosition,
                format!(
                    "Footprint {}x{} at ({x}, {y}) leaves the grid [{}, {})",
                    rect.width, rect.height, self.config.world.grid_min, self.config.world.grid_max
                ),
            );
        }

        let overlapping = self.overlapping_buildings(layout, &rect, exclude_building_id);
        if !overlapping.is_empty() {
            let mut check = PlacementCheck::fail(
                PlacementError::BuildingOverlap,
                format!("Location overlaps {} existing building(s)", overlapping.len()),
            );
            check.overlapping_building_ids = overlapping;
            return check;
        }

        if self.overlaps_walls(layout.wall_generation, &rect) {
            return PlacementCheck::fail(
                PlacementError::WallOverlap,
                format!("Location overlaps the generation {} wall", layout.wall_generation),
            );
        }

        PlacementCheck::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_open_edges_do_not_overlap() {
        let a = Rect::new(0, 0, 2, 2);
        assert!(!a.overlaps(&Rect::new(2, 0, 2, 2)));
        assert!(!a.overlaps(&Rect::new(0, 2, 2, 2)));
        assert!(a.overlaps(&Rect::new(1, 1, 2, 2)));
    }

    #[test]
    fn ring_band_blocks_but_interior_does_not() {
        let ring = WallRing::from_dimensions(WallDimensions { width: 20, length: 20, thickness: 1 });
        assert_eq!(ring.outer, Rect::new(-10, -10, 20, 20));
        assert_eq!(ring.inner, Rect::new(-9, -9, 18, 18));
        assert!(ring.overlaps(&Rect::new(-10, 0, 2, 2)));
        assert!(ring.overlaps(&Rect::new(8, 8, 2, 2)));
        assert!(!ring.overlaps(&Rect::new(0, 0, 4, 4)));
        assert!(!ring.overlaps(&Rect::new(10, 10, 2, 2)));
    }
}
