//! Store methods for fiefdom rows and their stockpiles.

use crate::{
    error::GameResult,
    model::{Fiefdom, Resource, Resources},
    types::{CharacterId, FiefdomId, Timestamp},
};
use rusqlite::{params, OptionalExtension, Row};

use super::GameStore;

const FIEFDOM_COLUMNS: &str =
    "id, owner_id, name, x, y, peasants, gold, grain, wood, stone, steel, bronze, leather, mana,
     wall_count, morale, last_update_time";

fn fiefdom_from_row(row: &Row<'_>) -> rusqlite::Result<Fiefdom> {
    Ok(Fiefdom {
        id:       row.get(0)?,
        owner_id: row.get(1)?,
        name:     row.get(2)?,
        x:        row.get(3)?,
        y:        row.get(4)?,
        resources: Resources {
            peasants: row.get(5)?,
            gold:     row.get(6)?,
            grain:    row.get(7)?,
            wood:     row.get(8)?,
            stone:    row.get(9)?,
            steel:    row.get(10)?,
            bronze:   row.get(11)?,
            leather:  row.get(12)?,
            mana:     row.get(13)?,
        },
        wall_count:       row.get(14)?,
        morale:           row.get(15)?,
        last_update_time: row.get(16)?,
    })
}

impl GameStore {
    pub fn insert_fiefdom(
        &self,
        owner_id:  CharacterId,
        name:      &str,
        x:         i64,
        y:         i64,
        resources: &Resources,
        now:       Timestamp,
    ) -> GameResult<FiefdomId> {
        self.conn.execute(
            "INSERT INTO fiefdom
                 (owner_id, name, x, y, peasants, gold, grain, wood, stone, steel, bronze,
                  leather, mana, wall_count, morale, last_update_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0, 0, ?14)",
            params![
                owner_id,
                name,
                x,
                y,
                resources.peasants,
                resources.gold,
                resources.grain,
                resources.wood,
                resources.stone,
                resources.steel,
                resources.bronze,
                resources.leather,
                resources.mana,
                now,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_fiefdom(&self, id: FiefdomId) -> GameResult<Option<Fiefdom>> {
        let sql = format!("SELECT {FIEFDOM_COLUMNS} FROM fiefdom WHERE id = ?1");
        let fiefdom = self.conn
            .query_row(&sql, params![id], fiefdom_from_row)
            .optional()?;
        Ok(fiefdom)
    }

    pub fn all_fiefdom_ids(&self) -> GameResult<Vec<FiefdomId>> {
        let mut stmt = self.conn.prepare("SELECT id FROM fiefdom ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Overwrite every stockpile column at once.
    pub fn update_resources(&self, id: FiefdomId, resources: &Resources) -> GameResult<()> {
        self.conn.execute(
            "UPDATE fiefdom SET peasants = ?2, gold = ?3, grain = ?4, wood = ?5, stone = ?6,
                 steel = ?7, bronze = ?8, leather = ?9, mana = ?10
             WHERE id = ?1",
            params![
                id,
                resources.peasants,
                resources.gold,
                resources.grain,
                resources.wood,
                resources.stone,
                resources.steel,
                resources.bronze,
                resources.leather,
                resources.mana,
            ],
        )?;
        Ok(())
    }

    pub fn set_resource(&self, id: FiefdomId, resource: Resource, amount: i64) -> GameResult<()> {
        // Column names come from the closed Resource enum.
        let sql = format!("UPDATE fiefdom SET {} = ?2 WHERE id = ?1", resource.as_str());
        self.conn.execute(&sql, params![id, amount])?;
        Ok(())
    }

    pub fn update_wall_count(&self, id: FiefdomId, wall_count: i64) -> GameResult<()> {
        self.conn.execute(
            "UPDATE fiefdom SET wall_count = ?2 WHERE id = ?1",
            params![id, wall_count],
        )?;
        Ok(())
    }

    pub fn update_morale(&self, id: FiefdomId, morale: f64) -> GameResult<()> {
        self.conn.execute(
            "UPDATE fiefdom SET morale = ?2 WHERE id = ?1",
            params![id, morale],
        )?;
        Ok(())
    }

    pub fn update_last_update_time(&self, id: FiefdomId, ts: Timestamp) -> GameResult<()> {
        self.conn.execute(
            "UPDATE fiefdom SET last_update_time = ?2 WHERE id = ?1",
            params![id, ts],
        )?;
        Ok(())
    }
}
