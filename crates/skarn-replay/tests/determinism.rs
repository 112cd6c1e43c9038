//! Determinism verification: identical `(seed, script, tick count)`
//! must produce byte-identical marshaled output, and therefore
//! identical SHA-256 digests, on every run.

use skarn_core::{ActorId, Command, CommandPayload, TickId, WorldConfig};
use skarn_replay::{first_divergence, record, Script, ScriptCommand};

/// The recorder subscriber's player is always `player-1`.
fn player() -> ActorId {
    ActorId::new("player-1")
}

fn cmd(tick: u64, payload: CommandPayload) -> ScriptCommand {
    ScriptCommand {
        tick,
        command: Command {
            actor: player(),
            payload,
            origin_tick: TickId(tick),
            issued_at_ms: tick as f64 * 1000.0 / 15.0,
        },
    }
}

/// A busy 80-tick script: movement, melee, fireballs, NPCs, hazards.
fn brawl_script(seed: u64) -> Script {
    let mut commands = Vec::new();
    for tick in (0..80).step_by(5) {
        let angle = tick as f64 / 7.0;
        commands.push(cmd(
            tick,
            CommandPayload::Move {
                dx: angle.cos(),
                dy: angle.sin(),
                facing: None,
            },
        ));
    }
    for tick in (2..80).step_by(9) {
        commands.push(cmd(
            tick,
            CommandPayload::Action {
                name: "attack".into(),
            },
        ));
    }
    for tick in (4..80).step_by(16) {
        commands.push(cmd(
            tick,
            CommandPayload::Action {
                name: "fireball".into(),
            },
        ));
    }
    for tick in (0..80).step_by(20) {
        commands.push(cmd(
            tick,
            CommandPayload::Heartbeat {
                client_sent_ms: tick as f64 * 66.0,
            },
        ));
    }
    Script {
        name: "brawl".into(),
        config: WorldConfig {
            seed,
            npc_count: 4,
            stone_count: 6,
            gold_ore_count: 3,
            lava_count: 2,
            ..WorldConfig::default()
        },
        ticks: 80,
        commands,
    }
}

#[test]
fn identical_scripts_produce_identical_digests() {
    let script = brawl_script(1234);
    let a = record(&script).unwrap();
    let b = record(&script).unwrap();
    assert_eq!(a.final_digest, b.final_digest);
    assert_eq!(a.frame_digests, b.frame_digests);
    assert_eq!(first_divergence(&a, &b), None);
    assert_eq!(a.final_digest.len(), 64, "lowercase-hex SHA-256");
}

#[test]
fn digest_survives_a_script_json_round_trip() {
    let script = brawl_script(1234);
    let json = script.to_json().unwrap();
    let reparsed = Script::from_json(&json).unwrap();
    let a = record(&script).unwrap();
    let b = record(&reparsed).unwrap();
    assert_eq!(a.final_digest, b.final_digest);
}

#[test]
fn different_seed_diverges() {
    let a = record(&brawl_script(1234)).unwrap();
    let b = record(&brawl_script(1235)).unwrap();
    // Different world population must surface in the wire stream.
    assert_ne!(a.final_digest, b.final_digest);
    assert!(first_divergence(&a, &b).is_some());
}

#[test]
fn different_commands_diverge() {
    let base = brawl_script(1234);
    let mut edited = base.clone();
    edited.commands.push(cmd(
        40,
        CommandPayload::Action {
            name: "fireball".into(),
        },
    ));
    let a = record(&base).unwrap();
    let b = record(&edited).unwrap();
    assert_ne!(a.final_digest, b.final_digest);
}

#[test]
fn run_report_covers_every_state_frame() {
    let script = brawl_script(7);
    let report = record(&script).unwrap();
    assert_eq!(report.ticks, 80);
    // One state frame per executed tick reaches the recorder.
    assert_eq!(report.frame_digests.len(), 80);
}
