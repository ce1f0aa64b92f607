use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::GameError;

pub const STAT_HP: &str = "HP";
pub const STAT_PRICE: &str = "Price";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    pub name: String,
    pub damage: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    #[serde(default)]
    pub value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Defense {
    pub name: String,
    #[serde(default)]
    pub value: Option<i64>,
}

/// One catalog entry. Immutable after load; battles and the scheduler work
/// with cheap clones of these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDefinition {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub base_stats: BTreeMap<String, i64>,
    #[serde(default)]
    pub weapons: Vec<Weapon>,
    #[serde(default)]
    pub modules: Vec<Module>,
    #[serde(default)]
    pub defenses: Vec<Defense>,
    #[serde(default)]
    pub image: Option<String>,
}

impl ObjectDefinition {
    fn stat(&self, key: &str) -> i64 {
        self.base_stats.get(key).copied().unwrap_or(0)
    }

    pub fn hp(&self) -> i64 {
        self.stat(STAT_HP)
    }

    pub fn price(&self) -> i64 {
        self.stat(STAT_PRICE)
    }

    /// Aggregate arsenal: the sum of every weapon's damage. Used for the
    /// enemy's retaliation roll and reported in stat blocks.
    pub fn attack_value(&self) -> i64 {
        self.weapons.iter().map(|w| w.damage).sum()
    }

    /// The first defense entry with a defined value, else 0.
    pub fn defense_value(&self) -> i64 {
        self.defenses.iter().find_map(|d| d.value).unwrap_or(0)
    }

    pub fn combat_ready(&self) -> bool {
        !self.weapons.is_empty()
    }
}

/// Process-lifetime table of ship definitions, loaded once at startup.
/// Read-only at runtime; a reload means a process restart.
#[derive(Debug, Clone)]
pub struct Catalog {
    defs: Vec<ObjectDefinition>,
    by_name: HashMap<String, usize>, // lowercase name -> index
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self, GameError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| GameError::DataUnavailable(format!("read {}: {e}", path.display())))?;
        let defs: Vec<ObjectDefinition> = serde_json::from_str(&s)
            .map_err(|e| GameError::DataUnavailable(format!("parse {}: {e}", path.display())))?;
        Self::from_defs(defs)
    }

    pub fn from_defs(defs: Vec<ObjectDefinition>) -> Result<Self, GameError> {
        let mut by_name = HashMap::new();
        for (i, d) in defs.iter().enumerate() {
            if d.name.trim().is_empty() {
                return Err(GameError::DataUnavailable(
                    "catalog entry with empty name".to_string(),
                ));
            }
            if d.price() < 0 {
                return Err(GameError::DataUnavailable(format!(
                    "catalog entry \"{}\" has a negative price",
                    d.name
                )));
            }
            if by_name.insert(d.name.to_ascii_lowercase(), i).is_some() {
                return Err(GameError::DataUnavailable(format!(
                    "duplicate catalog entry \"{}\"",
                    d.name
                )));
            }
        }
        Ok(Self { defs, by_name })
    }

    /// Case-insensitive exact-name lookup.
    pub fn lookup(&self, name: &str) -> Option<&ObjectDefinition> {
        self.by_name
            .get(&name.trim().to_ascii_lowercase())
            .map(|&i| &self.defs[i])
    }

    /// Entries the scheduler may spawn: armed, and not on the boss exclusion
    /// list.
    pub fn spawnable(&self, boss_names: &[String]) -> Vec<&ObjectDefinition> {
        self.defs
            .iter()
            .filter(|d| d.combat_ready())
            .filter(|d| {
                !boss_names
                    .iter()
                    .any(|b| b.eq_ignore_ascii_case(d.name.as_str()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}


#[cfg(test)]
mod tests {
    use super::testdefs::ship;
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let cat = Catalog::from_defs(vec![ship("Star Jumper", 500, 1000, &[("Laser", 40)])])
            .expect("catalog");
        assert!(cat.lookup("star jumper").is_some());
        assert!(cat.lookup("  STAR JUMPER ").is_some());
        assert!(cat.lookup("star").is_none());
    }

    #[test]
    fn derived_values_follow_the_stat_block() {
        let mut def = ship("Reaper", 1200, 45000, &[("Pulse Laser", 120), ("Torpedo", 260)]);
        def.defenses = vec![
            Defense {
                name: "Hull Plating".to_string(),
                value: None,
            },
            Defense {
                name: "Deflector Shield".to_string(),
                value: Some(80),
            },
        ];
        assert_eq!(def.hp(), 1200);
        assert_eq!(def.price(), 45000);
        assert_eq!(def.attack_value(), 380);
        assert_eq!(def.defense_value(), 80); // first *defined* value wins
    }

    #[test]
    fn missing_stats_default_to_zero() {
        let def = ObjectDefinition {
            name: "Hulk".to_string(),
            ..Default::default()
        };
        assert_eq!(def.hp(), 0);
        assert_eq!(def.price(), 0);
        assert_eq!(def.defense_value(), 0);
        assert!(!def.combat_ready());
    }

    #[test]
    fn spawnable_excludes_bosses_and_unarmed_hulls() {
        let mut unarmed = ship("Drifting Husk", 100, 0, &[]);
        unarmed.weapons.clear();
        let cat = Catalog::from_defs(vec![
            ship("Corsair", 800, 20000, &[("Railgun", 90)]),
            ship("Leviathan", 9000, 0, &[("Doom Cannon", 800)]),
            unarmed,
        ])
        .expect("catalog");

        let names: Vec<&str> = cat
            .spawnable(&["leviathan".to_string()])
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["Corsair"]);
    }

    #[test]
    fn load_rejects_duplicates_and_negative_prices() {
        let dup = Catalog::from_defs(vec![
            ship("Corsair", 800, 100, &[("Railgun", 90)]),
            ship("CORSAIR", 800, 100, &[("Railgun", 90)]),
        ]);
        assert!(matches!(dup, Err(GameError::DataUnavailable(_))));

        let neg = Catalog::from_defs(vec![ship("Corsair", 800, -5, &[("Railgun", 90)])]);
        assert!(matches!(neg, Err(GameError::DataUnavailable(_))));
    }

    #[test]
    fn load_reports_missing_file_as_data_unavailable() {
        let err = Catalog::load(Path::new("/nonexistent/ships.json")).unwrap_err();
        assert!(matches!(err, GameError::DataUnavailable(_)));
    }

    #[test]
    fn the_shipped_catalog_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data/ships.json");
        let cat = Catalog::load(&path).expect("data/ships.json");
        let titanic = cat.lookup("titanic").expect("Titanic");
        assert_eq!(titanic.price(), 0); // the starter hull stays free
        assert!(titanic.combat_ready());

        let spawnable = cat.spawnable(&["Leviathan".to_string()]);
        assert!(!spawnable.is_empty());
        assert!(spawnable.iter().all(|d| d.name != "Leviathan"));
    }
}
