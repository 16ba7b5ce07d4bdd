//! Store methods for buildings and their production accumulators.

use crate::{
    error::GameResult,
    model::{Building, Resource},
    types::{BuildingId, FiefdomId, Timestamp},
};
use rusqlite::{params, OptionalExtension, Row};

use super::GameStore;

fn building_from_row(row: &Row<'_>) -> rusqlite::Result<Building> {
    Ok(Building {
        id:                 row.get(0)?,
        fiefdom_id:         row.get(1)?,
        building_type:      row.get(2)?,
        level:              row.get(3)?,
        x:                  row.get(4)?,
        y:                  row.get(5)?,
        construction_start: row.get(6)?,
        last_updated:       row.get(7)?,
    })
}

impl GameStore {
    // ── Buildings ──────────────────────────────────────────────

    pub fn insert_building(
        &self,
        fiefdom_id:         FiefdomId,
        building_type:      &str,
        level:              i64,
        x:                  i64,
        y:                  i64,
        construction_start: Timestamp,
        now:                Timestamp,
    ) -> GameResult<BuildingId> {
        self.conn.execute(
            "INSERT INTO building
                 (fiefdom_id, building_type, level, x, y, construction_start, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![fiefdom_id, building_type, level, x, y, construction_start, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_building(&self, id: BuildingId) -> GameResult<Option<Building>> {
        let building = self.conn
            .query_row(
                "SELECT id, fiefdom_id, building_type, level, x, y, construction_start, last_updated
                 FROM building WHERE id = ?1",
                params![id],
                building_from_row,
            )
            .optional()?;
        Ok(building)
    }

    pub fn buildings_for_fiefdom(&self, fiefdom_id: FiefdomId) -> GameResult<Vec<Building>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, fiefdom_id, building_type, level, x, y, construction_start, last_updated
             FROM building WHERE fiefdom_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![fiefdom_id], building_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Land a finished construction or upgrade.
    pub fn complete_building_construction(
        &self,
        id:           BuildingId,
        level:        i64,
        completed_at: Timestamp,
    ) -> GameResult<()> {
        self.conn.execute(
            "UPDATE building SET level = ?2, construction_start = 0, last_updated = ?3
             WHERE id = ?1",
            params![id, level, completed_at],
        )?;
        Ok(())
    }

    pub fn start_building_construction(&self, id: BuildingId, start: Timestamp) -> GameResult<()> {
        self.conn.execute(
            "UPDATE building SET construction_start = ?2 WHERE id = ?1",
            params![id, start],
        )?;
        Ok(())
    }

    pub fn update_building_position(&self, id: BuildingId, x: i64, y: i64) -> GameResult<()> {
        self.conn.execute(
            "UPDATE building SET x = ?2, y = ?3 WHERE id = ?1",
            params![id, x, y],
        )?;
        Ok(())
    }

    pub fn set_building_last_updated(&self, id: BuildingId, ts: Timestamp) -> GameResult<()> {
        self.conn.execute(
            "UPDATE building SET last_updated = ?2 WHERE id = ?1",
            params![id, ts],
        )?;
        Ok(())
    }

    /// Remove a building and its production accumulators.
    pub fn delete_building(&self, id: BuildingId) -> GameResult<()> {
        self.conn.execute(
            "DELETE FROM building_production WHERE building_id = ?1",
            params![id],
        )?;
        self.conn.execute("DELETE FROM building WHERE id = ?1", params![id])?;
        Ok(())
    }

    // ── Production accumulators ────────────────────────────────

    /// Fraction of a unit carried over from earlier passes. 0 if none.
    pub fn production_remainder(&self, building_id: BuildingId, resource: Resource) -> GameResult<f64> {
        let remainder = self.conn
            .query_row(
                "SELECT remainder FROM building_production
                 WHERE building_id = ?1 AND resource = ?2",
                params![building_id, resource.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(remainder.unwrap_or(0.0))
    }

    pub fn set_production_remainder(
        &self,
        building_id: BuildingId,
        resource:    Resource,
        remainder:   f64,
    ) -> GameResult<()> {
        self.conn.execute(
            "INSERT INTO building_production (building_id, resource, remainder)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (building_id, resource) DO UPDATE SET remainder = excluded.remainder",
            params![building_id, resource.as_str(), remainder],
        )?;
        Ok(())
    }
}
