//! Probe-then-commit and action execution against the simulated game.

use emblem_bridge::{
    ActionExecutor, AttackPlan, InputDevice, Navigator, ProbeCommit, ProbeState,
    SimulatedGame, StateSource,
};
use emblem_core::items::VULNERARY;
use emblem_core::testing::SnapshotBuilder;
use emblem_core::{
    Action, ActionEnumerator, EngineConfig, EngineMetrics, InventorySlot, Pos, Snapshot,
    TerrainGrid, TurnStatus, UnitMaps,
};

fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.poll.interval_ms = 0;
    config
}

fn duel() -> Snapshot {
    SnapshotBuilder::new(8, 8)
        .ally(1, Pos::new(1, 1), |_| {})
        .enemy(10, Pos::new(1, 4), |_| {})
        .build()
}

fn attacks(snapshot: &Snapshot, unit: u8) -> Vec<Action> {
    let unit = snapshot.ally(unit).unwrap();
    let maps = UnitMaps::compute(snapshot, unit);
    ActionEnumerator::new(snapshot)
        .enumerate(unit, Some(&maps))
        .into_iter()
        .filter(|a| a.is_attack())
        .collect()
}

fn plan_from(snapshot: &Snapshot, tile: Pos) -> AttackPlan {
    let action = attacks(snapshot, 1)
        .into_iter()
        .find(|a| a.target == tile)
        .unwrap();
    AttackPlan::from_action(snapshot, &action).unwrap()
}

#[test]
fn test_probe_leaves_unit_unacted() {
    let scenario = duel();
    let plan = plan_from(&scenario, Pos::new(1, 3));
    let mut game = SimulatedGame::new(scenario);
    let config = test_config();
    let mut metrics = EngineMetrics::default();

    let mut probe = ProbeCommit::new(&mut game, &config, &mut metrics);
    let projection = probe.probe(&plan).unwrap();
    assert_eq!(probe.state(), ProbeState::Aborted);
    assert_eq!(projection.defender, 10);
    assert_eq!(projection.tile, Pos::new(1, 3));
    assert_eq!(projection.defender_hp_after, 9);
    assert_eq!(projection.attacker_hp_after, 12);

    let ally = game.state().ally(1).unwrap();
    assert_eq!(ally.pos, Pos::new(1, 1));
    assert_eq!(ally.status, TurnStatus::NotActed);
    assert_eq!(ally.hp, 20);
    assert_eq!(game.state().enemy(10).unwrap().hp, 18);
    assert_eq!(metrics.probes_issued, 1);
    assert_eq!(metrics.probes_failed, 0);
}

#[test]
fn test_commit_resolves_attack() {
    let scenario = duel();
    let plan = plan_from(&scenario, Pos::new(1, 3));
    let mut game = SimulatedGame::new(scenario);
    let config = test_config();
    let mut metrics = EngineMetrics::default();

    let mut probe = ProbeCommit::new(&mut game, &config, &mut metrics);
    let projection = probe.commit(&plan).unwrap();
    assert_eq!(probe.state(), ProbeState::Committed);
    assert_eq!(projection.defender_hp_after, 9);

    let ally = game.state().ally(1).unwrap();
    assert_eq!(ally.pos, Pos::new(1, 3));
    assert_eq!(ally.status, TurnStatus::Acted);
    assert_eq!(ally.hp, 12);
    assert_eq!(game.state().enemy(10).unwrap().hp, 9);
    assert_eq!(metrics.commits, 1);
}

#[test]
fn test_probe_recovers_from_swallowed_input() {
    let scenario = duel();
    let plan = plan_from(&scenario, Pos::new(1, 3));
    let mut game = SimulatedGame::new(scenario);
    game.swallow_next(1);
    let config = test_config();
    let mut metrics = EngineMetrics::default();

    let projection = ProbeCommit::new(&mut game, &config, &mut metrics)
        .probe(&plan)
        .unwrap();
    assert_eq!(projection.defender_hp_after, 9);
    assert_eq!(metrics.desyncs_recovered, 1);
    assert_eq!(metrics.probes_failed, 0);
    assert_eq!(game.state().ally(1).unwrap().status, TurnStatus::NotActed);
}

#[test]
fn test_jammed_input_gives_up_without_acting() {
    let scenario = duel();
    let plan = plan_from(&scenario, Pos::new(1, 3));
    let mut game = SimulatedGame::new(scenario);
    game.set_jammed(true);
    let config = test_config();
    let mut metrics = EngineMetrics::default();

    let mut probe = ProbeCommit::new(&mut game, &config, &mut metrics);
    assert!(probe.probe(&plan).is_err());
    assert!(probe.commit(&plan).is_err());
    assert_ne!(probe.state(), ProbeState::Committed);

    assert_eq!(metrics.probes_failed, 1);
    assert_eq!(metrics.commits, 0);
    let ally = game.state().ally(1).unwrap();
    assert_eq!(ally.status, TurnStatus::NotActed);
    assert_eq!(ally.pos, Pos::new(1, 1));
}

#[test]
fn test_lagging_process_still_commits() {
    let scenario = duel();
    let plan = plan_from(&scenario, Pos::new(1, 3));
    let mut game = SimulatedGame::new(scenario);
    game.set_lag(1);
    let config = test_config();
    let mut metrics = EngineMetrics::default();

    ProbeCommit::new(&mut game, &config, &mut metrics)
        .commit(&plan)
        .unwrap();
    assert_eq!(game.state().enemy(10).unwrap().hp, 9);
    assert_eq!(game.state().ally(1).unwrap().status, TurnStatus::Acted);
}

fn forest_skirmish() -> Snapshot {
    let terrain = TerrainGrid::from_rows(&[
        ". . . . . . . .",
        ". . . . . . . .",
        ". . . F . . . .",
        ". . . . . . . .",
        ". . . . . . . .",
        ". . . . . . . .",
        ". . . . . . . .",
        ". . . . . . . .",
    ])
    .unwrap();
    SnapshotBuilder::new(8, 8)
        .terrain(terrain)
        .ally(1, Pos::new(1, 1), |_| {})
        .enemy(10, Pos::new(3, 3), |_| {})
        .build()
}

#[test]
fn test_good_tiles_probed_first() {
    let scenario = forest_skirmish();
    let candidates = attacks(&scenario, 1);
    assert_eq!(candidates.len(), 4);

    let mut game = SimulatedGame::new(scenario.clone());
    let mut config = test_config();
    config.max_good_tile_probes = 1;
    let mut metrics = EngineMetrics::default();

    let (plan, projection) = ProbeCommit::new(&mut game, &config, &mut metrics)
        .best_attack(&scenario, &candidates)
        .unwrap();
    assert_eq!(plan.tile, Pos::new(3, 2));
    assert!(projection.terrain.defense > 0 || projection.terrain.avoid > 0);
    assert_eq!(metrics.probes_issued, 1);
}

#[test]
fn test_prefilter_disabled_probes_everything() {
    let scenario = forest_skirmish();
    let candidates = attacks(&scenario, 1);
    let mut game = SimulatedGame::new(scenario.clone());
    let mut config = test_config();
    config.max_good_tile_probes = 0;
    let mut metrics = EngineMetrics::default();

    let best = ProbeCommit::new(&mut game, &config, &mut metrics).best_attack(&scenario, &candidates);
    assert!(best.is_some());
    assert_eq!(metrics.probes_issued, 4);
    assert_eq!(game.state().ally(1).unwrap().status, TurnStatus::NotActed);
}

#[test]
fn test_execute_move_and_wait() {
    let scenario = duel();
    let unit = scenario.ally(1).unwrap();
    let action = Action::move_to(unit, Pos::new(3, 1));
    let mut game = SimulatedGame::new(scenario.clone());
    let config = test_config();
    let mut metrics = EngineMetrics::default();

    let mut executor = ActionExecutor::new(&mut game, &config, &mut metrics);
    assert!(executor.execute(&action).unwrap());
    let ally = game.state().ally(1).unwrap();
    assert_eq!(ally.pos, Pos::new(3, 1));
    assert_eq!(ally.status, TurnStatus::Acted);
}

#[test]
fn test_execute_item_heals() {
    let scenario = SnapshotBuilder::new(8, 8)
        .ally(1, Pos::new(1, 1), |u| {
            u.hp = 8;
            u.items.push(InventorySlot::new(VULNERARY, 3));
        })
        .build();
    let unit = scenario.ally(1).unwrap();
    let action = Action::use_item(unit, 1, VULNERARY);
    let mut game = SimulatedGame::new(scenario.clone());
    let config = test_config();
    let mut metrics = EngineMetrics::default();

    let done = ActionExecutor::new(&mut game, &config, &mut metrics).execute_all(&[action]);
    assert_eq!(done, 1);
    let ally = game.state().ally(1).unwrap();
    assert!(ally.hp > 8);
    assert_eq!(ally.items[1].uses, 2);
    assert_eq!(ally.status, TurnStatus::Acted);
}

#[test]
fn test_attack_is_not_executed_as_plain_action() {
    let scenario = duel();
    let action = attacks(&scenario, 1).remove(0);
    let mut game = SimulatedGame::new(scenario);
    let config = test_config();
    let mut metrics = EngineMetrics::default();

    let executed = ActionExecutor::new(&mut game, &config, &mut metrics)
        .execute(&action)
        .unwrap();
    assert!(!executed);
    assert_eq!(game.inputs_received(), 0);
}

#[test]
fn test_lagged_menus_back_out_to_the_map() {
    let mut game = SimulatedGame::new(duel());
    game.set_lag(2);
    let config = test_config();
    let mut nav = Navigator::new(&mut game, &config);
    nav.move_cursor_to(Pos::new(1, 1)).unwrap();
    nav.link().confirm().unwrap();
    nav.await_unit_maps().unwrap();
    nav.move_cursor_to(Pos::new(1, 3)).unwrap();
    // Tile, Attack, first weapon.
    nav.link().confirm().unwrap();
    nav.link().confirm().unwrap();
    nav.link().confirm().unwrap();
    assert_eq!(nav.settled_cursor().unwrap(), Pos::new(1, 4));

    nav.return_to_map().unwrap();
    assert!(nav.is_neutral().unwrap());
    assert!(game.unit_maps().unwrap().is_none());
    let ally = game.state().ally(1).unwrap();
    assert_eq!(ally.pos, Pos::new(1, 1));
    assert_eq!(ally.status, TurnStatus::NotActed);
}

#[test]
fn test_single_tile_map_is_neutral() {
    let scenario = SnapshotBuilder::new(1, 1)
        .ally(1, Pos::new(0, 0), |_| {})
        .build();
    let mut game = SimulatedGame::new(scenario);
    let config = test_config();
    assert!(Navigator::new(&mut game, &config).is_neutral().unwrap());
    assert_eq!(game.inputs_received(), 0);

    game.confirm().unwrap();
    assert!(!Navigator::new(&mut game, &config).is_neutral().unwrap());
}
