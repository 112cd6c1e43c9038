//! Quantified invariants checked across busy simulated runs: health
//! bounds, world-bounds clamping, post-separation distances, cooldown
//! spacing, and per-instance lifecycle sequence discipline.

use skarn_core::{TickId, Vec2, WorldConfig};
use skarn_engine::LockstepServer;
use skarn_proto::messages::StateMessage;
use skarn_sim::ai::NpcKind;
use skarn_sim::obstacle::ObstacleKind;
use skarn_core::Aabb;
use skarn_test_utils::{lockstep_server_with, mk_action, mk_move, test_config, CollectingSink, FrameLog};
use std::collections::HashMap;

fn busy_server() -> (LockstepServer, Vec<skarn_core::ActorId>, FrameLog) {
    let config = WorldConfig {
        heartbeat_interval_ms: 3_600_000.0,
        ..test_config()
    };
    let mut server = lockstep_server_with(config);
    let (sink, log) = CollectingSink::new();
    let (_sub, p1) = server.join(Box::new(sink));
    server.world_mut().set_position(&p1, Vec2::new(100.0, 100.0));
    let p2 = server.world_mut().add_player_at(Vec2::new(140.0, 100.0), 0.0);
    let p3 = server.world_mut().add_player_at(Vec2::new(120.0, 130.0), 0.0);
    server
        .world_mut()
        .add_obstacle(ObstacleKind::Stone, Aabb::new(200.0, 80.0, 60.0, 60.0));
    server
        .world_mut()
        .add_obstacle(ObstacleKind::Lava, Aabb::new(300.0, 300.0, 80.0, 80.0));
    server
        .world_mut()
        .add_obstacle(ObstacleKind::GoldOre, Aabb::new(80.0, 160.0, 40.0, 40.0));
    server
        .world_mut()
        .add_npc(NpcKind::Goblin, Vec2::new(400.0, 150.0));
    server
        .world_mut()
        .add_npc(NpcKind::Rat, Vec2::new(500.0, 500.0));
    (server, vec![p1, p2, p3], log)
}

/// Drive a scripted brawl: players converge, swing, and lob fireballs.
fn run_brawl(server: &mut LockstepServer, players: &[skarn_core::ActorId], ticks: u64) {
    for tick in 0..ticks {
        let t = TickId(tick);
        match tick % 7 {
            0 => {
                server.enqueue(mk_move(&players[0], 1.0, 0.3, t));
                server.enqueue(mk_move(&players[1], -1.0, 0.0, t));
            }
            2 => {
                server.enqueue(mk_action(&players[0], "attack", t));
                server.enqueue(mk_move(&players[2], 0.0, -0.8, t));
            }
            4 => {
                server.enqueue(mk_action(&players[1], "fireball", t));
            }
            5 => {
                server.enqueue(mk_move(&players[0], -0.5, 0.5, t));
            }
            _ => {}
        }
        server.step();
    }
}

#[test]
fn health_stays_within_bounds_every_tick() {
    let (mut server, players, _log) = busy_server();
    for tick in 0..120u64 {
        let t = TickId(tick);
        if tick % 3 == 0 {
            server.enqueue(mk_action(&players[0], "attack", t));
            server.enqueue(mk_action(&players[1], "fireball", t));
        }
        server.enqueue(mk_move(&players[1], -1.0, 0.0, t));
        server.step();

        for id in server.world().actor_ids_in_order() {
            let actor = server.world().actor(&id).unwrap();
            assert!(
                actor.health >= 0.0 && actor.health <= actor.max_health,
                "tick {tick}: {id} health {} outside [0, {}]",
                actor.health,
                actor.max_health
            );
        }
    }
}

#[test]
fn actor_centers_stay_inside_world_bounds() {
    let (mut server, players, _log) = busy_server();
    for tick in 0..150u64 {
        let t = TickId(tick);
        // Ram the walls.
        server.enqueue(mk_move(&players[0], 1.0, 0.0, t));
        server.enqueue(mk_move(&players[1], 0.0, 1.0, t));
        server.enqueue(mk_move(&players[2], -1.0, -1.0, t));
        server.step();

        let half = server.engine().config().half_extent;
        let (w, h) = (
            server.engine().config().world_width,
            server.engine().config().world_height,
        );
        for id in server.world().actor_ids_in_order() {
            let pos = server.world().actor(&id).unwrap().pos;
            assert!(pos.x >= half - 1e-9 && pos.x <= w - half + 1e-9, "{id} x={}", pos.x);
            assert!(pos.y >= half - 1e-9 && pos.y <= h - half + 1e-9, "{id} y={}", pos.y);
        }
    }
}

#[test]
fn pairwise_separation_holds_after_collision_phase() {
    let (mut server, players, _log) = busy_server();
    // Everyone converges on the same point.
    for tick in 0..60u64 {
        let t = TickId(tick);
        server.enqueue(mk_move(&players[0], 1.0, 0.2, t));
        server.enqueue(mk_move(&players[1], -1.0, 0.2, t));
        server.enqueue(mk_move(&players[2], 0.0, -1.0, t));
        server.step();

        let ids = server.world().actor_ids_sorted();
        let min_sep = 2.0 * server.engine().config().half_extent;
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                let a = server.world().actor(&ids[i]).unwrap().pos;
                let b = server.world().actor(&ids[j]).unwrap().pos;
                assert!(
                    a.distance(b) >= min_sep - 1e-6,
                    "tick {tick}: {} and {} at {} apart",
                    ids[i],
                    ids[j],
                    a.distance(b)
                );
            }
        }
    }
}

#[test]
fn successful_triggers_respect_cooldown_spacing() {
    let (mut server, players, log) = busy_server();
    // Spam the melee ability every tick for 60 ticks.
    for tick in 0..60u64 {
        server.enqueue(mk_action(&players[0], "attack", TickId(tick)));
        server.step();
    }

    // Collect spawn ticks of attack instances owned by the spammer.
    let mut spawn_ticks = Vec::new();
    for frame in parse_states(&log) {
        for spawn in &frame.effect_spawned {
            if spawn.instance.entry_id == "attack"
                && spawn.instance.owner_actor_id.as_ref() == Some(&players[0])
            {
                spawn_ticks.push(spawn.tick.0);
            }
        }
    }
    assert!(spawn_ticks.len() > 3, "expected repeated triggers");
    // 0.4s cooldown at 15 Hz = 6 ticks between successful triggers.
    for pair in spawn_ticks.windows(2) {
        assert!(
            pair[1] - pair[0] >= 6,
            "triggers {} and {} closer than the cooldown",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn lifecycle_sequences_are_gapless_and_tick_ordered() {
    let (mut server, players, log) = busy_server();
    run_brawl(&mut server, &players, 90);

    let mut seqs: HashMap<String, Vec<(u64, u64)>> = HashMap::new();
    for frame in parse_states(&log) {
        for spawn in &frame.effect_spawned {
            seqs.entry(spawn.instance.id.to_string())
                .or_default()
                .push((spawn.seq.0, spawn.tick.0));
        }
        for update in &frame.effect_update {
            seqs.entry(update.id.to_string())
                .or_default()
                .push((update.seq.0, update.tick.0));
        }
        for end in &frame.effect_ended {
            seqs.entry(end.id.to_string())
                .or_default()
                .push((end.seq.0, end.tick.0));
        }
    }
    assert!(!seqs.is_empty(), "the brawl must produce effects");
    for (id, events) in seqs {
        for (i, (seq, _)) in events.iter().enumerate() {
            assert_eq!(
                *seq,
                i as u64 + 1,
                "instance {id}: seq gap at position {i}"
            );
        }
        for pair in events.windows(2) {
            assert!(pair[0].1 <= pair[1].1, "instance {id}: tick regression");
        }
    }
}

fn parse_states(log: &FrameLog) -> Vec<StateMessage> {
    log.lock()
        .unwrap()
        .iter()
        .filter_map(|bytes| serde_json::from_slice::<StateMessage>(bytes).ok())
        .filter(|m| m.kind == "state")
        .collect()
}
