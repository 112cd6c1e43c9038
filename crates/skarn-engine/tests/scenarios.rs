//! End-to-end scenarios driven through the lockstep server: ability
//! lifecycles, hazards, timeouts, and admission control, asserted
//! against the marshaled wire frames where the contract lives.

use skarn_core::{ActorId, CommandType, DropReason, Fx, KeyframeSeq, TickId, Vec2, WorldConfig};
use skarn_engine::{LockstepServer, TickEngine};
use skarn_proto::messages::StateMessage;
use skarn_proto::apply_patches;
use skarn_sim::obstacle::ObstacleKind;
use skarn_core::Aabb;
use skarn_test_utils::{
    frames_as_json, lockstep_server_with, mk_action, mk_heartbeat, mk_move, test_catalog,
    test_config, CollectingSink, FrameLog,
};

/// Config with heartbeats effectively disabled, for long scenarios.
fn long_heartbeat_config() -> WorldConfig {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    WorldConfig {
        heartbeat_interval_ms: 3_600_000.0,
        ..test_config()
    }
}

/// Parse the state frames out of a frame log, skipping the join
/// response.
fn state_frames(log: &FrameLog) -> Vec<StateMessage> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|bytes| serde_json::from_slice::<StateMessage>(bytes).ok())
        .filter(|m| m.kind == "state")
        .collect()
}

/// Join an observer subscriber and move its player out of the way.
fn join_observer(server: &mut LockstepServer, corner: Vec2) -> (ActorId, FrameLog) {
    let (sink, log) = CollectingSink::new();
    let (_sub, player) = server.join(Box::new(sink));
    server.world_mut().set_position(&player, corner);
    (player, log)
}

// ── Scenario 1: melee spawn/update/end ─────────────────────────────

#[test]
fn melee_lifecycle_on_one_tick() {
    let mut server = lockstep_server_with(long_heartbeat_config());
    let (_observer, log) = join_observer(&mut server, Vec2::new(20.0, 20.0));

    let attacker = server
        .world_mut()
        .add_player_at(Vec2::new(208.0, 320.0), 0.0);
    // Face right before the swing.
    server.enqueue(mk_move(&attacker, 1.0, 0.0, TickId(0)));
    server.step();
    server.enqueue(mk_move(&attacker, 0.0, 0.0, TickId(1)));
    server.run_until(TickId(120));

    server.enqueue(mk_action(&attacker, "attack", TickId(120)));
    server.step();
    assert_eq!(server.tick(), TickId(121));

    let frames = state_frames(&log);
    let frame = frames.last().expect("tick 121 frame");
    assert_eq!(frame.t, TickId(121));
    assert_eq!(frame.effect_spawned.len(), 1);
    assert_eq!(frame.effect_update.len(), 1);
    assert_eq!(frame.effect_ended.len(), 1);

    let spawn = &frame.effect_spawned[0];
    assert_eq!(spawn.seq.0, 1);
    assert_eq!(spawn.tick, TickId(121));
    let g = spawn.instance.delivery_state.geometry;
    assert_eq!(g.width, Fx::from_int(40));
    assert_eq!(g.height, Fx::from_int(56));
    assert_eq!(g.offset_x, Fx::from_int(20));
    assert_eq!(g.offset_y, Fx::from_int(-28));

    assert_eq!(frame.effect_update[0].seq.0, 2);
    let ended = &frame.effect_ended[0];
    assert_eq!(ended.seq.0, 3);
    assert_eq!(
        serde_json::to_value(ended.reason).unwrap(),
        serde_json::json!("expired")
    );

    // The cursors map reports the latest emitted seq for the instance.
    assert_eq!(
        frame.effect_seq_cursors.get(&spawn.instance.id).copied(),
        Some(3)
    );
}

// ── Scenario 2: projectile max-range expiry ────────────────────────

#[test]
fn fireball_expires_at_max_range() {
    // Wide world so the 480-unit range expires before the world edge.
    let config = WorldConfig {
        world_width: 2000.0,
        ..long_heartbeat_config()
    };
    let mut server = lockstep_server_with(config);
    let (_observer, log) = join_observer(&mut server, Vec2::new(20.0, 620.0));

    let attacker = server
        .world_mut()
        .add_player_at(Vec2::new(256.0, 320.0), 0.0);
    server.enqueue(mk_move(&attacker, 1.0, 0.0, TickId(0)));
    server.step();
    server.enqueue(mk_move(&attacker, 0.0, 0.0, TickId(1)));
    server.run_until(TickId(64));

    server.enqueue(mk_action(&attacker, "fireball", TickId(64)));
    server.run_until(TickId(95));

    let frames = state_frames(&log);
    let spawn_frame = frames
        .iter()
        .find(|f| !f.effect_spawned.is_empty())
        .expect("spawn frame");
    let spawn = &spawn_frame.effect_spawned[0];
    assert_eq!(spawn.instance.start_tick, TickId(65));
    assert_eq!(spawn.seq.0, 1);
    assert_eq!(spawn.instance.delivery_state.geometry.radius, Fx::from_int(10));

    // Motion advances in +x only.
    let mut last_x = i64::MIN;
    for frame in &frames {
        for update in &frame.effect_update {
            if let Some(delivery) = &update.delivery_state {
                assert_eq!(delivery.motion.y, Fx::from_f64(320.0), "dy must stay 0");
                assert!(delivery.motion.x.raw() >= last_x, "x must be monotonic");
                last_x = delivery.motion.x.raw();
            }
        }
    }

    // ceil(480 · 15 / 320) = 23 advances, spawn tick included.
    let end_frame = frames
        .iter()
        .find(|f| !f.effect_ended.is_empty())
        .expect("end frame");
    assert_eq!(end_frame.t, TickId(65 + 22));
    assert_eq!(
        serde_json::to_value(end_frame.effect_ended[0].reason).unwrap(),
        serde_json::json!("expired")
    );
}

// ── Scenario 3: projectile hit ─────────────────────────────────────

#[test]
fn fireball_hit_decrements_health_and_ends_with_impact() {
    let mut server = lockstep_server_with(long_heartbeat_config());
    let (_observer, log) = join_observer(&mut server, Vec2::new(20.0, 620.0));

    let attacker = server
        .world_mut()
        .add_player_at(Vec2::new(100.0, 100.0), 0.0);
    let target = server
        .world_mut()
        .add_player_at(Vec2::new(200.0, 100.0), 0.0);
    server.enqueue(mk_move(&attacker, 1.0, 0.0, TickId(0)));
    server.step();
    server.enqueue(mk_move(&attacker, 0.0, 0.0, TickId(1)));
    server.run_until(TickId(10));

    server.enqueue(mk_action(&attacker, "fireball", TickId(10)));
    server.run_until(TickId(20));

    assert_eq!(server.world().actor(&target).unwrap().health, 85.0);

    let frames = state_frames(&log);
    let end_frame = frames
        .iter()
        .find(|f| !f.effect_ended.is_empty())
        .expect("impact frame");
    assert_eq!(
        serde_json::to_value(end_frame.effect_ended[0].reason).unwrap(),
        serde_json::json!("impact")
    );
    // The same frame carries the health-change patch for the target.
    let patches = end_frame.patches.as_ref().expect("diff frame has patches");
    let health_patch = patches.iter().any(|p| {
        serde_json::to_value(p)
            .map(|v| {
                v["kind"] == "player-health" && v["id"] == target.as_str() && v["health"] == 85.0
            })
            .unwrap_or(false)
    });
    assert!(health_patch, "expected player-health patch in {patches:?}");
}

// ── Scenario 4: burning over lava ──────────────────────────────────

#[test]
fn lava_burns_once_per_tick_without_underflow() {
    let mut server = lockstep_server_with(long_heartbeat_config());
    let lava_id = server
        .world_mut()
        .add_obstacle(ObstacleKind::Lava, Aabb::new(80.0, 80.0, 80.0, 80.0));
    let actor = server
        .world_mut()
        .add_player_at(Vec2::new(120.0, 120.0), 0.0);

    for _ in 0..3 {
        server.step();
    }

    let state = server.world().actor(&actor).unwrap();
    let expected = 100.0 - 3.0 * (20.0 / 15.0);
    assert!((state.health - expected).abs() < 1e-9);

    let burning = state.statuses.get("burning").expect("burning applied");
    assert_eq!(burning.source, ActorId::new(lava_id));

    // A status-visual instance follows the actor.
    assert!(server
        .engine()
        .effects()
        .live()
        .values()
        .any(|i| i.entry_id == "status-burning" && i.follow.as_ref() == Some(&actor)));

    // Sitting in lava for a long time clamps at zero, never below.
    server.run_until(TickId(80));
    let health = server.world().actor(&actor).unwrap().health;
    assert_eq!(health, 0.0);
}

// ── Scenario 5: heartbeat timeout ──────────────────────────────────

#[test]
fn silent_player_despawns_after_three_intervals() {
    let config = WorldConfig {
        heartbeat_interval_ms: 200.0,
        ..test_config()
    };
    let mut server = lockstep_server_with(config);
    // An observer that keeps heartbeating witnesses the removal.
    let (observer_sink, observer_log) = CollectingSink::new();
    let (_observer_sub, observer) = server.join(Box::new(observer_sink));
    let (silent_sink, _silent_log) = CollectingSink::new();
    let (_silent_sub, silent) = server.join(Box::new(silent_sink));

    // Timeout is 600ms = 9 ticks at 15 Hz; tick 10 is past it.
    let mut drive = |server: &mut LockstepServer, target: u64| {
        while server.tick() < TickId(target) {
            let tick = server.tick();
            let now_ms = tick.0 as f64 * 1000.0 / 15.0;
            server.enqueue(mk_heartbeat(&observer, now_ms, tick));
            server.step();
        }
    };
    drive(&mut server, 12);
    assert!(server.world().player(&silent).is_none());
    assert!(server.world().player(&observer).is_some());

    let frames = frames_as_json(&observer_log);
    let removed = frames.iter().any(|frame| {
        frame["patches"]
            .as_array()
            .map(|patches| {
                patches.iter().any(|p| {
                    p["kind"] == "actor-removed" && p["id"] == silent.as_str()
                })
            })
            .unwrap_or(false)
    });
    assert!(removed, "terminal removal patch must be broadcast");

    // Later keyframes no longer carry the player.
    drive(&mut server, 30);
    let keyframe = server
        .world()
        .journal()
        .keyframe(KeyframeSeq(1))
        .expect("keyframe recorded");
    assert!(keyframe.players.iter().all(|p| p.id != silent));
}

// ── Scenario 6: admission and drop telemetry ───────────────────────

#[test]
fn per_actor_limit_drops_the_excess_command() {
    let mut engine = TickEngine::new(test_config(), test_catalog()).unwrap();
    let actor = engine.world_mut().add_player_at(Vec2::new(100.0, 100.0), 0.0);

    let limit = engine.config().per_actor_command_limit;
    let mut accepted = 0;
    for i in 0..=limit {
        let admission = engine.enqueue(mk_move(&actor, 1.0, 0.0, TickId(i as u64)));
        if admission.accepted {
            accepted += 1;
        } else {
            assert_eq!(admission.reason, Some(DropReason::LimitExceeded));
        }
    }
    assert_eq!(accepted, limit);
    assert_eq!(
        engine
            .command_drops()
            .count(DropReason::LimitExceeded, CommandType::Move),
        1
    );

    engine.execute_tick();
    assert_eq!(engine.metrics().applied_commands, limit as u64);
}

// ── Round-trip: keyframe + diff stream == next keyframe ────────────

#[test]
fn patch_stream_reconstructs_the_next_keyframe() {
    let mut server = lockstep_server_with(long_heartbeat_config());
    let (sink, log) = CollectingSink::new();
    let (_sub, player) = server.join(Box::new(sink));

    // Activity between the two keyframes, quiescing well before t=60.
    server.run_until(TickId(30));
    server.enqueue(mk_move(&player, 0.6, -0.2, TickId(30)));
    server.run_until(TickId(40));
    server.enqueue(mk_move(&player, 0.0, 0.0, TickId(40)));
    server.run_until(TickId(60));

    let base = server
        .world()
        .journal()
        .keyframe(KeyframeSeq(1))
        .expect("keyframe 1")
        .clone();
    let next = server
        .world()
        .journal()
        .keyframe(KeyframeSeq(2))
        .expect("keyframe 2")
        .clone();

    let mut reconstructed = base;
    for frame in state_frames(&log) {
        if frame.t.0 <= 30 || frame.t.0 > 60 {
            continue;
        }
        if let Some(patches) = &frame.patches {
            apply_patches(&mut reconstructed, patches);
        }
    }
    reconstructed.t = next.t;
    assert_eq!(reconstructed, next);
}

// ── Marshal failure recovery ───────────────────────────────────────

#[test]
fn marshal_failure_restores_journal_for_retry() {
    let mut server = lockstep_server_with(long_heartbeat_config());
    let (sink, _log) = CollectingSink::new();
    let (_sub, player) = server.join(Box::new(sink));

    // A NaN coordinate cannot be encoded as JSON; the marshaller must
    // restore the drained buffers and nack.
    server
        .world_mut()
        .journal_mut()
        .record_patch(skarn_sim::patch::Patch::PlayerPosition {
            id: player.clone(),
            x: f64::NAN,
            y: 0.0,
            facing: skarn_core::Facing::Down,
        });
    let before = server.world().journal().pending_patches();
    server.step();
    let metrics = server.engine().metrics();
    assert_eq!(metrics.marshal_failures, 1);
    // Restored: the poisoned patch is still staged (plus this tick's).
    assert!(server.world().journal().pending_patches() >= before);
}
