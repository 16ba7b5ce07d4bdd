//! Store methods for officials, heroes, stationed combatants and the
//! training queue.

use crate::{
    error::GameResult,
    model::{Hero, Official, OfficialRole, StationedCombatant, TrainingJob},
    types::{EntityId, FiefdomId, OfficialId, Timestamp},
};
use rusqlite::{params, Row};

use super::GameStore;

fn official_from_row(row: &Row<'_>) -> rusqlite::Result<Official> {
    let role: String = row.get(2)?;
    let role = OfficialRole::parse(&role).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown official role '{role}'").into(),
        )
    })?;
    Ok(Official {
        id:           row.get(0)?,
        fiefdom_id:   row.get(1)?,
        role,
        template_id:  row.get(3)?,
        name:         row.get(4)?,
        level:        row.get(5)?,
        intelligence: row.get(6)?,
        charisma:     row.get(7)?,
        wisdom:       row.get(8)?,
        diligence:    row.get(9)?,
    })
}

impl GameStore {
    // ── Officials ──────────────────────────────────────────────

    /// Insert an official. `official.id` is ignored; the new id is returned.
    pub fn insert_official(&self, official: &Official) -> GameResult<OfficialId> {
        self.conn.execute(
            "INSERT INTO official
                 (fiefdom_id, role, template_id, name, level,
                  intelligence, charisma, wisdom, diligence)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                official.fiefdom_id,
                official.role.as_str(),
                official.template_id,
                official.name,
                official.level,
                official.intelligence,
                official.charisma,
                official.wisdom,
                official.diligence,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn officials_for_fiefdom(&self, fiefdom_id: FiefdomId) -> GameResult<Vec<Official>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, fiefdom_id, role, template_id, name, level,
                    intelligence, charisma, wisdom, diligence
             FROM official WHERE fiefdom_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![fiefdom_id], official_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Heroes ─────────────────────────────────────────────────

    pub fn insert_hero(&self, fiefdom_id: FiefdomId, hero_config_id: &str, level: i64) -> GameResult<EntityId> {
        self.conn.execute(
            "INSERT INTO hero (fiefdom_id, hero_config_id, level) VALUES (?1, ?2, ?3)",
            params![fiefdom_id, hero_config_id, level],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn heroes_for_fiefdom(&self, fiefdom_id: FiefdomId) -> GameResult<Vec<Hero>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, fiefdom_id, hero_config_id, level
             FROM hero WHERE fiefdom_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![fiefdom_id], |row| {
                Ok(Hero {
                    id:             row.get(0)?,
                    fiefdom_id:     row.get(1)?,
                    hero_config_id: row.get(2)?,
                    level:          row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Stationed combatants ───────────────────────────────────

    pub fn insert_stationed_combatant(
        &self,
        fiefdom_id:          FiefdomId,
        combatant_config_id: &str,
        level:               i64,
    ) -> GameResult<EntityId> {
        self.conn.execute(
            "INSERT INTO stationed_combatant (fiefdom_id, combatant_config_id, level)
             VALUES (?1, ?2, ?3)",
            params![fiefdom_id, combatant_config_id, level],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn combatants_for_fiefdom(&self, fiefdom_id: FiefdomId) -> GameResult<Vec<StationedCombatant>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, fiefdom_id, combatant_config_id, level
             FROM stationed_combatant WHERE fiefdom_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![fiefdom_id], |row| {
                Ok(StationedCombatant {
                    id:                  row.get(0)?,
                    fiefdom_id:          row.get(1)?,
                    combatant_config_id: row.get(2)?,
                    level:               row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Training queue ─────────────────────────────────────────

    pub fn insert_training_job(
        &self,
        fiefdom_id:          FiefdomId,
        combatant_config_id: &str,
        level:               i64,
        started_at:          Timestamp,
        duration_secs:       i64,
    ) -> GameResult<EntityId> {
        self.conn.execute(
            "INSERT INTO training_job
                 (fiefdom_id, combatant_config_id, level, started_at, duration_secs)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![fiefdom_id, combatant_config_id, level, started_at, duration_secs],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn training_jobs_for_fiefdom(&self, fiefdom_id: FiefdomId) -> GameResult<Vec<TrainingJob>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, fiefdom_id, combatant_config_id, level, started_at, duration_secs
             FROM training_job WHERE fiefdom_id = ?1
             ORDER BY started_at + duration_secs ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![fiefdom_id], |row| {
                Ok(TrainingJob {
                    id:                  row.get(0)?,
                    fiefdom_id:          row.get(1)?,
                    combatant_config_id: row.get(2)?,
                    level:               row.get(3)?,
                    started_at:          row.get(4)?,
                    duration_secs:       row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_training_job(&self, id: EntityId) -> GameResult<()> {
        self.conn.execute("DELETE FROM training_job WHERE id = ?1", params![id])?;
        Ok(())
    }
}
