use crate::{
    model::{OfficialRole, Resource, ResourceBundle},
    morale::{EffectMode, MoraleEffect},
};
use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;

// ── World ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Inclusive lower bound of the local grid on both axes.
    pub grid_min: i64,
    /// Exclusive upper bound of the local grid on both axes.
    pub grid_max: i64,
    /// The building type that must sit at the local origin, once per fiefdom.
    pub anchor_type: String,
    pub starting_resources: ResourceBundle,
    #[serde(default = "default_move_cost_fraction")]
    pub move_cost_fraction: f64,
    #[serde(default = "default_refund_fraction")]
    pub demolish_refund_fraction: f64,
}

fn default_move_cost_fraction() -> f64 { 0.10 }
fn default_refund_fraction() -> f64 { 0.80 }
fn default_multiplier() -> f64 { 1.0 }

// ── Buildings ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionConfig {
    /// Units produced per period at level 1.
    pub amount: f64,
    pub periodicity_hours: f64,
    /// Each level above 1 multiplies the level-1 rate by this factor.
    #[serde(default = "default_multiplier")]
    pub level_multiplier: f64,
}

impl ProductionConfig {
    pub fn rate_per_hour(&self, level: i64) -> f64 {
        if level <= 0 || self.periodicity_hours <= 0.0 {
            return 0.0;
        }
        let base = self.amount / self.periodicity_hours;
        base * self.level_multiplier.powi((level - 1) as i32)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildingTypeConfig {
    pub display_name: String,
    pub width:  i64,
    pub height: i64,
    pub max_level: i64,
    /// Per-resource cost tables, indexed by target level - 1.
    #[serde(default)]
    pub costs: BTreeMap<Resource, Vec<i64>>,
    /// Seconds to reach each level, indexed by target level - 1.
    pub construction_times: Vec<i64>,
    #[serde(default)]
    pub production: BTreeMap<Resource, ProductionConfig>,
    #[serde(default)]
    pub morale: Option<MoraleEffect>,
}

impl BuildingTypeConfig {
    /// Cost of reaching `target_level` from the level below it.
    pub fn cost_for_level(&self, target_level: i64) -> ResourceBundle {
        level_cost(&self.costs, target_level)
    }

    /// Everything paid to bring a building from nothing to `level`.
    pub fn cumulative_cost(&self, level: i64) -> ResourceBundle {
        let mut total = ResourceBundle::new();
        for lvl in 1..=level {
            for (res, amount) in self.cost_for_level(lvl) {
                *total.entry(res).or_insert(0) += amount;
            }
        }
        total
    }

    pub fn construction_time(&self, target_level: i64) -> Option<i64> {
        level_table_value(&self.construction_times, target_level)
    }
}

// ── Walls ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WallGenerationConfig {
    pub width:     i64,
    pub length:    i64,
    pub thickness: i64,
    /// Hit points per level. Its length is the generation's max level.
    pub hp: Vec<i64>,
    #[serde(default)]
    pub costs: BTreeMap<Resource, Vec<i64>>,
    pub construction_times: Vec<i64>,
    #[serde(default)]
    pub morale: Option<MoraleEffect>,
}

impl WallGenerationConfig {
    pub fn max_level(&self) -> i64 {
        self.hp.len() as i64
    }

    pub fn hp_at(&self, level: i64) -> i64 {
        if level <= 0 {
            return 0;
        }
        self.hp.get((level - 1) as usize).copied().unwrap_or(0)
    }

    pub fn cost_for_level(&self, target_level: i64) -> ResourceBundle {
        level_cost(&self.costs, target_level)
    }

    pub fn construction_time(&self, target_level: i64) -> Option<i64> {
        level_table_value(&self.construction_times, target_level)
    }
}

// ── Officials, heroes, combatants ─────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatTable {
    pub values: Vec<i64>,
    #[serde(default)]
    pub max: Option<i64>,
}

impl StatTable {
    /// Stat at `level`, extrapolated past the table and bounded to a byte.
    pub fn value_at(&self, level: i64) -> u8 {
        let raw = level_table_value(&self.values, level).unwrap_or(0);
        let capped = match self.max {
            Some(max) if max > 0 => raw.min(max),
            _ => raw,
        };
        capped.clamp(0, u8::MAX as i64) as u8
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfficialStats {
    pub intelligence: StatTable,
    pub charisma:     StatTable,
    pub wisdom:       StatTable,
    pub diligence:    StatTable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfficialTemplateConfig {
    pub name: String,
    pub max_level: i64,
    pub roles: Vec<OfficialRole>,
    #[serde(default)]
    pub stats: OfficialStats,
    #[serde(default)]
    pub morale: Option<MoraleEffect>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeroConfig {
    pub name: String,
    pub max_level: i64,
    #[serde(default)]
    pub morale: Option<MoraleEffect>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantConfig {
    pub name: String,
    pub max_level: i64,
    #[serde(default)]
    pub costs: BTreeMap<Resource, Vec<i64>>,
    /// Seconds to train one unit at each level.
    pub training_times: Vec<i64>,
    #[serde(default)]
    pub morale: Option<MoraleEffect>,
}

impl CombatantConfig {
    pub fn cost_for_level(&self, level: i64) -> ResourceBundle {
        level_cost(&self.costs, level)
    }

    pub fn training_time(&self, level: i64) -> Option<i64> {
        level_table_value(&self.training_times, level)
    }
}

// ── Level tables ──────────────────────────────────────────────────

/// Look up a 1-indexed level in a table. Levels past the end extrapolate
/// linearly from the last two entries; a single-entry table repeats.
pub fn level_table_value(table: &[i64], level: i64) -> Option<i64> {
    if level <= 0 || table.is_empty() {
        return None;
    }
    let idx = (level - 1) as usize;
    if let Some(v) = table.get(idx) {
        return Some(*v);
    }
    let last = table[table.len() - 1];
    if table.len() == 1 {
        return Some(last);
    }
    let slope = last - table[table.len() - 2];
    let beyond = level - table.len() as i64;
    Some(last + slope * beyond)
}

fn level_cost(costs: &BTreeMap<Resource, Vec<i64>>, target_level: i64) -> ResourceBundle {
    if target_level <= 0 {
        return ResourceBundle::new();
    }
    costs
        .iter()
        .filter_map(|(res, table)| {
            table
                .get((target_level - 1) as usize)
                .copied()
                .filter(|amount| *amount > 0)
                .map(|amount| (*res, amount))
        })
        .collect()
}

// ── Top level ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub world:          WorldConfig,
    pub building_types: BTreeMap<String, BuildingTypeConfig>,
    pub walls:          BTreeMap<i64, WallGenerationConfig>,
    pub officials:      BTreeMap<String, OfficialTemplateConfig>,
    pub heroes:         BTreeMap<String, HeroConfig>,
    pub combatants:     BTreeMap<String, CombatantConfig>,
}

fn read_json<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    serde_json::from_str(&content).with_context(|| format!("Cannot parse {path}"))
}

impl GameConfig {
    /// Load every configuration table from `data_dir`. Called once per process.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let world: WorldConfig = read_json(&format!("{data_dir}/world.json"))?;
        let building_types = read_json(&format!("{data_dir}/building_types.json"))?;
        let walls = read_json(&format!("{data_dir}/walls.json"))?;
        let officials = read_json(&format!("{data_dir}/officials.json"))?;
        let heroes = read_json(&format!("{data_dir}/heroes.json"))?;
        let combatants = read_json(&format!("{data_dir}/combatants.json"))?;

        let config = Self { world, building_types, walls, officials, heroes, combatants };
        config.check()?;
        log::info!(
            "config: loaded {} building types, {} wall generations, {} officials, {} heroes, {} combatants from {data_dir}",
            config.building_types.len(),
            config.walls.len(),
            config.officials.len(),
            config.heroes.len(),
            config.combatants.len(),
        );
        Ok(config)
    }

    /// Reject tables the simulation cannot run on.
    pub fn check(&self) -> anyhow::Result<()> {
        if self.world.grid_min >= self.world.grid_max {
            anyhow::bail!(
                "world grid is empty: grid_min {} >= grid_max {}",
                self.world.grid_min, self.world.grid_max
            );
        }
        if !self.building_types.contains_key(&self.world.anchor_type) {
            anyhow::bail!("anchor type '{}' has no building configuration", self.world.anchor_type);
        }
        for (name, b) in &self.building_types {
            if b.width <= 0 || b.height <= 0 {
                anyhow::bail!("building type '{name}' has non-positive footprint {}x{}", b.width, b.height);
            }
            if b.max_level < 1 {
                anyhow::bail!("building type '{name}' has max_level {}", b.max_level);
            }
        }
        for (generation, w) in &self.walls {
            if *generation < 1 {
                anyhow::bail!("wall generation keys start at 1, found {generation}");
            }
            if w.thickness <= 0 || w.width <= 2 * w.thickness || w.length <= 2 * w.thickness {
                anyhow::bail!("wall generation {generation} has a degenerate ring");
            }
        }
        Ok(())
    }

    pub fn building(&self, building_type: &str) -> Option<&BuildingTypeConfig> {
        self.building_types.get(building_type)
    }

    pub fn wall(&self, generation: i64) -> Option<&WallGenerationConfig> {
        self.walls.get(&generation)
    }

    pub fn is_anchor(&self, building_type: &str) -> bool {
        self.world.anchor_type == building_type
    }

    /// Templates that may fill `role`, in id order.
    pub fn officials_for_role(&self, role: OfficialRole) -> Vec<(&str, &OfficialTemplateConfig)> {
        self.officials
            .iter()
            .filter(|(_, t)| t.roles.contains(&role))
            .map(|(id, t)| (id.as_str(), t))
            .collect()
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        fn costs(entries: &[(Resource, &[i64])]) -> BTreeMap<Resource, Vec<i64>> {
            entries.iter().map(|(r, v)| (*r, v.to_vec())).collect()
        }
        fn effect(per_level: &[f64], mode: EffectMode, cap: f64) -> Option<MoraleEffect> {
            Some(MoraleEffect { per_level: per_level.to_vec(), mode, cap: Some(cap) })
        }
        fn stat(values: &[i64], max: i64) -> StatTable {
            StatTable { values: values.to_vec(), max: Some(max) }
        }

        let world = WorldConfig {
            grid_min: -64,
            grid_max: 64,
            anchor_type: "home_base".into(),
            starting_resources: [
                (Resource::Peasants, 50),
                (Resource::Gold, 1000),
                (Resource::Grain, 200),
                (Resource::Wood, 500),
                (Resource::Stone, 300),
                (Resource::Steel, 40),
            ].into_iter().collect(),
            move_cost_fraction: 0.10,
            demolish_refund_fraction: 0.80,
        };

        let mut building_types = BTreeMap::new();
        building_types.insert("home_base".to_string(), BuildingTypeConfig {
            display_name: "Manor House".into(),
            width: 4,
            height: 4,
            max_level: 3,
            costs: costs(&[(Resource::Gold, &[100, 500, 1500]), (Resource::Wood, &[50, 200, 600])]),
            construction_times: vec![60, 3600, 7200],
            production: [(Resource::Gold, ProductionConfig {
                amount: 10.0, periodicity_hours: 1.0, level_multiplier: 1.5,
            })].into_iter().collect(),
            morale: effect(&[5.0, 8.0, 12.0], EffectMode::Add, 20.0),
        });
        building_types.insert("farm".to_string(), BuildingTypeConfig {
            display_name: "Farm".into(),
            width: 2,
            height: 2,
            max_level: 5,
            costs: costs(&[(Resource::Gold, &[50, 100, 200, 400, 800]), (Resource::Wood, &[30, 60, 120, 240, 480])]),
            construction_times: vec![600, 1200, 2400],
            production: [(Resource::Grain, ProductionConfig {
                amount: 6.0, periodicity_hours: 1.0, level_multiplier: 1.5,
            })].into_iter().collect(),
            morale: None,
        });
        building_types.insert("quarry".to_string(), BuildingTypeConfig {
            display_name: "Quarry".into(),
            width: 2,
            height: 2,
            max_level: 3,
            costs: costs(&[(Resource::Gold, &[80, 160, 320]), (Resource::Wood, &[40, 80, 160])]),
            construction_times: vec![900, 1800, 3600],
            production: [(Resource::Stone, ProductionConfig {
                amount: 1.0, periodicity_hours: 3.0, level_multiplier: 2.0,
            })].into_iter().collect(),
            morale: None,
        });
        building_types.insert("lumber_mill".to_string(), BuildingTypeConfig {
            display_name: "Lumber Mill".into(),
            width: 3,
            height: 2,
            max_level: 3,
            costs: costs(&[(Resource::Gold, &[60, 120, 240])]),
            construction_times: vec![900, 1800, 3600],
            production: [(Resource::Wood, ProductionConfig {
                amount: 4.0, periodicity_hours: 1.0, level_multiplier: 1.5,
            })].into_iter().collect(),
            morale: None,
        });
        building_types.insert("tavern".to_string(), BuildingTypeConfig {
            display_name: "Tavern".into(),
            width: 2,
            height: 2,
            max_level: 2,
            costs: costs(&[(Resource::Gold, &[100, 200]), (Resource::Wood, &[50, 100])]),
            construction_times: vec![900, 1800],
            production: BTreeMap::new(),
            morale: effect(&[10.0, 15.0], EffectMode::Add, 25.0),
        });
        building_types.insert("chapel".to_string(), BuildingTypeConfig {
            display_name: "Chapel".into(),
            width: 2,
            height: 3,
            max_level: 2,
            costs: costs(&[(Resource::Gold, &[150, 300]), (Resource::Stone, &[100, 200])]),
            construction_times: vec![1200, 2400],
            production: BTreeMap::new(),
            morale: effect(&[15.0, 20.0], EffectMode::Max, 30.0),
        });
        building_types.insert("banner_hall".to_string(), BuildingTypeConfig {
            display_name: "Banner Hall".into(),
            width: 3,
            height: 3,
            max_level: 2,
            costs: costs(&[(Resource::Gold, &[300, 600]), (Resource::Steel, &[20, 40])]),
            construction_times: vec![1800, 3600],
            production: BTreeMap::new(),
            morale: effect(&[1.2, 1.5], EffectMode::Multiply, 2.0),
        });

        let mut walls = BTreeMap::new();
        walls.insert(1, WallGenerationConfig {
            width: 20,
            length: 20,
            thickness: 1,
            hp: vec![100, 200, 300],
            costs: costs(&[(Resource::Gold, &[200, 400, 800]), (Resource::Stone, &[100, 200, 400])]),
            construction_times: vec![1800, 3600, 7200],
            morale: effect(&[5.0, 7.0, 10.0], EffectMode::Add, 10.0),
        });
        walls.insert(2, WallGenerationConfig {
            width: 32,
            length: 32,
            thickness: 2,
            hp: vec![300, 450],
            costs: costs(&[(Resource::Gold, &[600, 1200]), (Resource::Stone, &[400, 800])]),
            construction_times: vec![3600, 7200],
            morale: effect(&[8.0, 12.0], EffectMode::Add, 12.0),
        });

        let mut officials = BTreeMap::new();
        officials.insert("seasoned_steward".to_string(), OfficialTemplateConfig {
            name: "Seasoned Steward".into(),
            max_level: 5,
            roles: vec![OfficialRole::Steward, OfficialRole::Reeve, OfficialRole::Bailiff],
            stats: OfficialStats {
                intelligence: stat(&[40, 50, 60], 120),
                charisma:     stat(&[30, 35], 90),
                wisdom:       stat(&[45, 55, 65], 150),
                diligence:    stat(&[60, 70, 80], 255),
            },
            morale: effect(&[3.0, 4.0, 5.0], EffectMode::Add, 10.0),
            description: "Keeps the granaries honest.".into(),
        });
        officials.insert("court_wizard".to_string(), OfficialTemplateConfig {
            name: "Court Wizard".into(),
            max_level: 3,
            roles: vec![OfficialRole::Wizard],
            stats: OfficialStats {
                intelligence: stat(&[90, 110, 130], 200),
                charisma:     stat(&[20], 60),
                wisdom:       stat(&[70, 80], 160),
                diligence:    stat(&[30, 35], 90),
            },
            morale: effect(&[6.0], EffectMode::Max, 10.0),
            description: String::new(),
        });

        let mut heroes = BTreeMap::new();
        heroes.insert("sir_aldric".to_string(), HeroConfig {
            name: "Sir Aldric".into(),
            max_level: 10,
            morale: effect(&[4.0, 6.0, 8.0], EffectMode::Add, 10.0),
        });

        let mut combatants = BTreeMap::new();
        combatants.insert("militia".to_string(), CombatantConfig {
            name: "Militia".into(),
            max_level: 3,
            costs: costs(&[(Resource::Gold, &[20, 40, 80]), (Resource::Grain, &[10, 20, 40])]),
            training_times: vec![300, 600, 1200],
            morale: effect(&[1.0, 2.0], EffectMode::Add, 5.0),
        });
        combatants.insert("knight".to_string(), CombatantConfig {
            name: "Knight".into(),
            max_level: 2,
            costs: costs(&[(Resource::Gold, &[150, 300]), (Resource::Steel, &[20, 40])]),
            training_times: vec![1800, 3600],
            morale: effect(&[3.0], EffectMode::Max, 5.0),
        });

        Self { world, building_types, walls, officials, heroes, combatants }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_table_extrapolates_linearly() {
        let t = [60, 3600, 7200];
        assert_eq!(level_table_value(&t, 1), Some(60));
        assert_eq!(level_table_value(&t, 3), Some(7200));
        assert_eq!(level_table_value(&t, 5), Some(7200 + 2 * 3600));
        assert_eq!(level_table_value(&t, 0), None);
        assert_eq!(level_table_value(&[300], 4), Some(300));
    }

    #[test]
    fn cumulative_cost_sums_every_level() {
        let config = GameConfig::default_test();
        let farm = config.building("farm").unwrap();
        let total = farm.cumulative_cost(2);
        assert_eq!(total.get(&Resource::Gold), Some(&150));
        assert_eq!(total.get(&Resource::Wood), Some(&90));
    }

    #[test]
    fn default_test_config_passes_check() {
        GameConfig::default_test().check().unwrap();
    }

    #[test]
    fn stat_table_caps_at_max() {
        let s = StatTable { values: vec![100, 150], max: Some(180) };
        assert_eq!(s.value_at(2), 150);
        assert_eq!(s.value_at(3), 180);
        let unbounded = StatTable { values: vec![200, 250], max: None };
        assert_eq!(unbounded.value_at(4), 255);
    }
}
