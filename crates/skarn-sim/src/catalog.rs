//! Effect catalog consumption.
//!
//! The catalog is a boundary artifact: a JSON map from entry id to
//! contract definition, produced by external tooling. The simulation
//! only consumes it. Loading validates hook names up front so the tick
//! loop never meets an unknown hook, and records the SHA-256 of the
//! exact input bytes for the `effectCatalogHash` handshake field.

use crate::effect::{Delivery, EndPolicy, HookId, HookSet, Replication, ShapeKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use skarn_core::Fx;
use std::error::Error;
use std::fmt;

/// Shape description inside a definition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeDef {
    /// Shape discriminant.
    pub kind: ShapeKind,
    /// Rect width.
    #[serde(default)]
    pub width: Fx,
    /// Rect height.
    #[serde(default)]
    pub height: Fx,
    /// Circle radius.
    #[serde(default)]
    pub radius: Fx,
}

/// Projectile impact behaviour.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImpactDef {
    /// Stop at the first actor hit.
    pub stop_on_hit: bool,
    /// Stop after this many distinct targets (0 = unlimited).
    pub max_targets: u32,
    /// Whether the owner can be hit.
    pub affects_owner: bool,
    /// Area entry spawned on obstacle impact.
    pub explode_on_impact: Option<String>,
    /// Area entry spawned on range expiry.
    pub explode_on_expiry: Option<String>,
    /// Suppress the expiry explosion when anything was hit.
    pub expiry_only_if_no_hits: bool,
}

/// Hook names inside a definition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HooksDef {
    /// Spawn hook name.
    pub on_spawn: Option<String>,
    /// Tick hook name.
    pub on_tick: Option<String>,
}

/// A contract definition from the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectDefinition {
    /// Effect type id.
    pub type_id: String,
    /// Delivery mode.
    pub delivery: Delivery,
    /// Geometry, when the effect has a shape.
    #[serde(default)]
    pub shape: Option<ShapeDef>,
    /// Motion model name (`linear` is the only moving model).
    #[serde(default)]
    pub motion: Option<String>,
    /// Impact behaviour for projectiles.
    #[serde(default)]
    pub impact: Option<ImpactDef>,
    /// Default lifetime in ticks.
    #[serde(default)]
    pub lifetime_ticks: u64,
    /// Status applied to victims of this effect's hits.
    #[serde(default)]
    pub status_effect: Option<String>,
    /// Hook names.
    #[serde(default)]
    pub hooks: HooksDef,
    /// Replication flags.
    pub client: Replication,
    /// End policy.
    pub end: EndPolicy,
}

/// Parameter blocks attached to an entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Blocks {
    /// Fixed-point default parameters.
    pub parameters: IndexMap<String, Fx>,
}

/// One catalog entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Contract id the entry resolves to.
    pub contract_id: String,
    /// The contract definition.
    pub definition: EffectDefinition,
    /// Parameter blocks.
    #[serde(default)]
    pub blocks: Blocks,
    /// The client owns presentation for this entry.
    #[serde(default)]
    pub managed_by_client: bool,
}

impl CatalogEntry {
    /// Resolve the definition's hook names, validated at load time.
    pub fn hook_set(&self) -> HookSet {
        HookSet {
            on_spawn: self
                .definition
                .hooks
                .on_spawn
                .as_deref()
                .and_then(HookId::parse),
            on_tick: self
                .definition
                .hooks
                .on_tick
                .as_deref()
                .and_then(HookId::parse),
        }
    }
}

/// Errors loading the catalog.
#[derive(Debug)]
pub enum CatalogError {
    /// The JSON did not parse into the catalog schema.
    Parse {
        /// Parser description.
        reason: String,
    },
    /// An entry named a hook the simulation does not implement.
    UnknownHook {
        /// Offending entry id.
        entry: String,
        /// The unknown hook name.
        hook: String,
    },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { reason } => write!(f, "catalog parse failed: {reason}"),
            Self::UnknownHook { entry, hook } => {
                write!(f, "entry '{entry}' names unknown hook '{hook}'")
            }
        }
    }
}

impl Error for CatalogError {}

/// The loaded effect catalog.
#[derive(Clone, Debug)]
pub struct EffectCatalog {
    entries: IndexMap<String, CatalogEntry>,
    hash: String,
}

impl EffectCatalog {
    /// Parse and validate a catalog from its JSON bytes.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON or on hook names the simulation does not
    /// implement. Unknown entries discovered later (from intents) are a
    /// per-intent drop, not a load failure.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let entries: IndexMap<String, CatalogEntry> =
            serde_json::from_str(json).map_err(|e| CatalogError::Parse {
                reason: e.to_string(),
            })?;

        for (id, entry) in &entries {
            for hook in [&entry.definition.hooks.on_spawn, &entry.definition.hooks.on_tick]
                .into_iter()
                .flatten()
            {
                if HookId::parse(hook).is_none() {
                    return Err(CatalogError::UnknownHook {
                        entry: id.clone(),
                        hook: hook.clone(),
                    });
                }
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        Ok(Self { entries, hash })
    }

    /// Look up an entry by id.
    pub fn entry(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    /// Lowercase-hex SHA-256 of the exact catalog bytes.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The default catalog shipped with the server.
///
/// External tooling generates production catalogs; this one covers the
/// built-in abilities and statuses and doubles as the test fixture.
pub const BUILTIN_CATALOG: &str = r#"{
  "attack": {
    "contractId": "melee-attack",
    "definition": {
      "typeId": "melee",
      "delivery": "area",
      "shape": { "kind": "rect", "width": 4000, "height": 5600 },
      "lifetimeTicks": 0,
      "hooks": { "onSpawn": "melee-spawn" },
      "client": {
        "sendSpawn": true,
        "sendUpdates": true,
        "sendEnd": true,
        "managedByClient": true
      },
      "end": { "kind": "instant" }
    },
    "blocks": {
      "parameters": { "healthDelta": -1000, "width": 4000, "height": 5600 }
    },
    "managedByClient": true
  },
  "fireball": {
    "contractId": "projectile-fireball",
    "definition": {
      "typeId": "projectile",
      "delivery": "area",
      "shape": { "kind": "circle", "radius": 1000 },
      "motion": "linear",
      "impact": { "stopOnHit": true, "maxTargets": 1, "affectsOwner": false },
      "lifetimeTicks": 23,
      "hooks": { "onSpawn": "projectile-lifecycle", "onTick": "projectile-lifecycle" },
      "client": {
        "sendSpawn": true,
        "sendUpdates": true,
        "sendEnd": true,
        "managedByClient": false
      },
      "end": { "kind": "duration" }
    },
    "blocks": {
      "parameters": {
        "spawnRadius": 1000,
        "speed": 32000,
        "range": 48000,
        "healthDelta": -1500
      }
    },
    "managedByClient": false
  },
  "status-burning": {
    "contractId": "status-visual-burning",
    "definition": {
      "typeId": "status-visual",
      "delivery": "visual",
      "shape": { "kind": "circle", "radius": 1200 },
      "lifetimeTicks": 45,
      "hooks": { "onSpawn": "status-visual" },
      "client": {
        "sendSpawn": true,
        "sendUpdates": false,
        "sendEnd": true,
        "managedByClient": true
      },
      "end": { "kind": "condition", "conditions": ["owner-lost", "status-cleared"] }
    },
    "managedByClient": true
  },
  "blood-decal": {
    "contractId": "decal-blood",
    "definition": {
      "typeId": "decal",
      "delivery": "visual",
      "shape": { "kind": "circle", "radius": 1400 },
      "lifetimeTicks": 90,
      "client": {
        "sendSpawn": true,
        "sendUpdates": false,
        "sendEnd": true,
        "managedByClient": true
      },
      "end": { "kind": "duration" }
    },
    "managedByClient": true
  }
}"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EndKind;

    #[test]
    fn builtin_catalog_parses() {
        let catalog = EffectCatalog::from_json(BUILTIN_CATALOG).unwrap();
        assert_eq!(catalog.len(), 4);
        assert!(catalog.entry("attack").is_some());
        assert!(catalog.entry("fireball").is_some());
        assert!(catalog.entry("no-such-entry").is_none());
    }

    #[test]
    fn hash_is_stable_and_input_sensitive() {
        let a = EffectCatalog::from_json(BUILTIN_CATALOG).unwrap();
        let b = EffectCatalog::from_json(BUILTIN_CATALOG).unwrap();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);

        let other = EffectCatalog::from_json("{}").unwrap();
        assert_ne!(a.hash(), other.hash());
    }

    #[test]
    fn attack_entry_is_instant_melee() {
        let catalog = EffectCatalog::from_json(BUILTIN_CATALOG).unwrap();
        let attack = catalog.entry("attack").unwrap();
        assert_eq!(attack.contract_id, "melee-attack");
        assert_eq!(attack.definition.end.kind, EndKind::Instant);
        assert_eq!(
            attack.hook_set().on_spawn,
            Some(crate::effect::HookId::MeleeSpawn)
        );
        assert_eq!(attack.blocks.parameters["healthDelta"], Fx(-1000));
    }

    #[test]
    fn unknown_hook_is_rejected_at_load() {
        let json = r#"{
          "bad": {
            "contractId": "bad",
            "definition": {
              "typeId": "melee",
              "delivery": "area",
              "hooks": { "onSpawn": "summon-dragon" },
              "client": { "sendSpawn": true, "sendUpdates": false, "sendEnd": true, "managedByClient": false },
              "end": { "kind": "instant" }
            }
          }
        }"#;
        let err = EffectCatalog::from_json(json).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownHook { .. }));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            EffectCatalog::from_json("not json"),
            Err(CatalogError::Parse { .. })
        ));
    }
}
