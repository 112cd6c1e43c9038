//! Wire message types.
//!
//! All fields are camelCase JSON. Optional sections are omitted, not
//! null, so frames stay compact and byte-stable across runs. Every
//! server→client message carries `ver`; a client seeing a different
//! version resyncs from scratch.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use skarn_core::{ActorId, EffectId, KeyframeSeq, MessageSeq, TickId, Vec2, WorldConfig};
use skarn_sim::effect::{EndEvent, SpawnEvent, UpdateEvent};
use skarn_sim::item::GroundItem;
use skarn_sim::obstacle::Obstacle;
use skarn_sim::patch::Patch;
use skarn_sim::snapshot::ActorSnapshot;

/// Protocol version stamped on every message.
pub const PROTOCOL_VERSION: u32 = 1;

/// Client-visible configuration, sent on join and with keyframes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    /// World width in units.
    pub world_width: f64,
    /// World height in units.
    pub world_height: f64,
    /// Simulation rate in Hz.
    pub tick_rate: f64,
    /// Expected heartbeat interval, ms.
    pub heartbeat_interval_ms: f64,
    /// Ticks between scheduled keyframes.
    pub keyframe_interval: u64,
}

impl ConfigSummary {
    /// Project the server config onto its client-visible subset.
    pub fn from_config(config: &WorldConfig) -> Self {
        Self {
            world_width: config.world_width,
            world_height: config.world_height,
            tick_rate: config.tick_rate_hz,
            heartbeat_interval_ms: config.heartbeat_interval_ms,
            keyframe_interval: config.keyframe_interval,
        }
    }
}

/// Sent once when a join completes; `id` is the assigned player id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    /// Protocol version.
    pub ver: u32,
    /// The joining player's assigned id.
    pub id: ActorId,
    /// Full player array.
    pub players: Vec<ActorSnapshot>,
    /// Full NPC array.
    pub npcs: Vec<ActorSnapshot>,
    /// Static obstacles.
    pub obstacles: Vec<Obstacle>,
    /// Ground item stacks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ground_items: Vec<GroundItem>,
    /// Client-visible config.
    pub config: ConfigSummary,
    /// Whether this join is a resync of an existing session.
    pub resync: bool,
    /// Ticks between scheduled keyframes.
    pub keyframe_interval: u64,
    /// SHA-256 of the effect catalog the server loaded.
    pub effect_catalog_hash: String,
}

/// A per-tick state frame: full snapshot or diff.
///
/// Full frames carry the entity arrays and omit `patches`; diff frames
/// always carry `patches` (possibly empty) plus any effect lifecycle
/// arrays staged this tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMessage {
    /// Protocol version.
    pub ver: u32,
    /// Message discriminator, always `state`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Full player array (full frames only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub players: Option<Vec<ActorSnapshot>>,
    /// Full NPC array (full frames only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub npcs: Option<Vec<ActorSnapshot>>,
    /// Obstacles (full frames only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obstacles: Option<Vec<Obstacle>>,
    /// Ground items (full frames only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ground_items: Option<Vec<GroundItem>>,
    /// Ordered patches (diff frames; always present there).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patches: Option<Vec<Patch>>,
    /// Effect spawn events staged this tick.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effect_spawned: Vec<SpawnEvent>,
    /// Effect update events staged this tick.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effect_update: Vec<UpdateEvent>,
    /// Effect end events staged this tick.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effect_ended: Vec<EndEvent>,
    /// Latest emitted sequence per instance; present on frames that
    /// carry effect events.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub effect_seq_cursors: IndexMap<EffectId, u64>,
    /// Frame tick.
    pub t: TickId,
    /// Per-subscriber message sequence.
    pub sequence: MessageSeq,
    /// Current keyframe sequence.
    pub keyframe_seq: KeyframeSeq,
    /// Synthetic server time, ms.
    pub server_time: u64,
    /// Config echo (full frames only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSummary>,
    /// Set when this full frame answers a resync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resync: Option<bool>,
    /// Keyframe cadence echo (full frames only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyframe_interval: Option<u64>,
}

/// A scheduled full-state keyframe.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyframeMessage {
    /// Protocol version.
    pub ver: u32,
    /// Message discriminator, always `keyframe`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Keyframe sequence.
    pub sequence: KeyframeSeq,
    /// Keyframe tick.
    pub t: TickId,
    /// Full player array.
    pub players: Vec<ActorSnapshot>,
    /// Full NPC array.
    pub npcs: Vec<ActorSnapshot>,
    /// Static obstacles.
    pub obstacles: Vec<Obstacle>,
    /// Ground item stacks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ground_items: Vec<GroundItem>,
    /// Client-visible config.
    pub config: ConfigSummary,
}

/// Negative acknowledgement of a keyframe request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyframeNack {
    /// Protocol version.
    pub ver: u32,
    /// Message discriminator, always `keyframeNack`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The keyframe sequence being nacked.
    pub sequence: KeyframeSeq,
    /// Why the keyframe could not be served.
    pub reason: String,
    /// Set when the client must fully resync.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resync: Option<bool>,
    /// Config echo for the resync path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<ConfigSummary>,
}

/// Inbound client messages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Continuous movement input.
    Move {
        /// Desired x velocity fraction.
        dx: f64,
        /// Desired y velocity fraction.
        dy: f64,
        /// Fallback facing when the vector is zero.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        facing: Option<String>,
    },
    /// Ability activation by name.
    Action {
        /// Ability name.
        name: String,
    },
    /// Path-follow request.
    Path {
        /// Waypoints in visit order.
        waypoints: Vec<Vec2>,
    },
    /// Liveness probe.
    Heartbeat {
        /// Client wall clock at send, ms.
        client_sent: f64,
    },
    /// Recovery request carrying the last keyframe the client applied.
    KeyframeRequest {
        /// Last known keyframe sequence.
        keyframe_seq: KeyframeSeq,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_move_parses_wire_shape() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"move","dx":0.5,"dy":-1.0,"facing":"up"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Move {
                dx: 0.5,
                dy: -1.0,
                facing: Some("up".into())
            }
        );
    }

    #[test]
    fn client_heartbeat_parses_client_sent() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"heartbeat","clientSent":123456.0}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Heartbeat {
                client_sent: 123456.0
            }
        );
    }

    #[test]
    fn client_path_parses_waypoints() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"path","waypoints":[{"x":1.0,"y":2.0}]}"#).unwrap();
        match msg {
            ClientMessage::Path { waypoints } => assert_eq!(waypoints[0], Vec2::new(1.0, 2.0)),
            other => panic!("expected path, got {other:?}"),
        }
    }

    #[test]
    fn unknown_client_type_is_an_error() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"teleport"}"#).is_err());
    }

    #[test]
    fn diff_frame_omits_entity_arrays() {
        let frame = StateMessage {
            ver: PROTOCOL_VERSION,
            kind: "state".into(),
            players: None,
            npcs: None,
            obstacles: None,
            ground_items: None,
            patches: Some(Vec::new()),
            effect_spawned: Vec::new(),
            effect_update: Vec::new(),
            effect_ended: Vec::new(),
            effect_seq_cursors: IndexMap::new(),
            t: TickId(42),
            sequence: MessageSeq(7),
            keyframe_seq: KeyframeSeq(2),
            server_time: 2800,
            config: None,
            resync: None,
            keyframe_interval: None,
        };
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"patches\":[]"), "{json}");
        assert!(!json.contains("players"), "{json}");
        assert!(!json.contains("effectSeqCursors"), "{json}");
        assert!(json.contains("\"keyframeSeq\":2"), "{json}");
    }

    #[test]
    fn config_summary_projects_world_config() {
        let summary = ConfigSummary::from_config(&WorldConfig::default());
        assert_eq!(summary.tick_rate, 15.0);
        assert_eq!(summary.keyframe_interval, 30);
        assert_eq!(summary.world_width, 640.0);
    }
}
