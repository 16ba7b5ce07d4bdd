//! Store methods for wall rings.

use crate::{
    error::GameResult,
    model::Wall,
    types::{FiefdomId, Timestamp, WallId},
};
use rusqlite::{params, OptionalExtension, Row};

use super::GameStore;

fn wall_from_row(row: &Row<'_>) -> rusqlite::Result<Wall> {
    Ok(Wall {
        id:                 row.get(0)?,
        fiefdom_id:         row.get(1)?,
        generation:         row.get(2)?,
        level:              row.get(3)?,
        hp:                 row.get(4)?,
        construction_start: row.get(5)?,
        last_updated:       row.get(6)?,
    })
}

impl GameStore {
    pub fn insert_wall(
        &self,
        fiefdom_id:         FiefdomId,
        generation:         i64,
        level:              i64,
        hp:                 i64,
        construction_start: Timestamp,
        now:                Timestamp,
    ) -> GameResult<WallId> {
        self.conn.execute(
            "INSERT INTO wall (fiefdom_id, generation, level, hp, construction_start, last_updated)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![fiefdom_id, generation, level, hp, construction_start, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_wall(&self, id: WallId) -> GameResult<Option<Wall>> {
        let wall = self.conn
            .query_row(
                "SELECT id, fiefdom_id, generation, level, hp, construction_start, last_updated
                 FROM wall WHERE id = ?1",
                params![id],
                wall_from_row,
            )
            .optional()?;
        Ok(wall)
    }

    pub fn walls_for_fiefdom(&self, fiefdom_id: FiefdomId) -> GameResult<Vec<Wall>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, fiefdom_id, generation, level, hp, construction_start, last_updated
             FROM wall WHERE fiefdom_id = ?1
             ORDER BY generation ASC",
        )?;
        let rows = stmt
            .query_map(params![fiefdom_id], wall_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn complete_wall_construction(
        &self,
        id:           WallId,
        level:        i64,
        hp:           i64,
        completed_at: Timestamp,
    ) -> GameResult<()> {
        self.conn.execute(
            "UPDATE wall SET level = ?2, hp = ?3, construction_start = 0, last_updated = ?4
             WHERE id = ?1",
            params![id, level, hp, completed_at],
        )?;
        Ok(())
    }

    pub fn start_wall_construction(&self, id: WallId, start: Timestamp) -> GameResult<()> {
        self.conn.execute(
            "UPDATE wall SET construction_start = ?2 WHERE id = ?1",
            params![id, start],
        )?;
        Ok(())
    }
}
