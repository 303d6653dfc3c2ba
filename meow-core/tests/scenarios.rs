//! End-to-end play scenarios through the public API.

use meow_core::contracts::check_expiry;
use meow_core::{
    ContractOutcome, ContractStatus, DistrictKey, FeatureKey, GoodKey, JobKey, SchemeId,
    SimConfig, SimState, abandon_active_contract, accept_contract, activate_scheme, assign_job,
    available_contracts, buy, contract_status, end_season, equip_scheme,
    is_active_contract_complete, redeem_active_contract, set_district, tick,
};

fn fresh(seed: u32) -> (SimState, SimConfig) {
    let config = SimConfig::default();
    let state = SimState::new_save(&config, Some(seed));
    (state, config)
}

fn run_for(state: &mut SimState, config: &SimConfig, seconds: u32) -> Vec<ContractOutcome> {
    (0..seconds)
        .filter_map(|_| tick(state, config, 1.0).contract_outcome)
        .collect()
}

#[test]
fn scenario_first_kibble_purchase() {
    let (mut state, config) = fresh(123);
    tick(&mut state, &config, 1.0);

    let price = state.price(GoodKey::Kibble);
    let pressure = state.pressure(GoodKey::Kibble);
    assert!(buy(&mut state, &config, GoodKey::Kibble, 1));

    assert!((state.coins - (50.0 - price)).abs() < 1e-9);
    assert_eq!(state.held(GoodKey::Kibble), 1);
    assert_eq!(state.pressure(GoodKey::Kibble), pressure + 1.0);
    assert!(state.price(GoodKey::Kibble) > price || price == 1.0);
}

#[test]
fn scenario_new_save_without_seed_gets_one_on_first_tick() {
    let config = SimConfig::default();
    let mut state: SimState = serde_json::from_str("{}").unwrap();
    assert_eq!(state.seed, None);
    tick(&mut state, &config, 0.5);
    assert!(state.seed.is_some());
    assert_eq!(state.coins, 50.0);
    assert!(state.is_unlocked(FeatureKey::Kibble));
    assert!(state.is_unlocked(FeatureKey::Contract));
}

// === CONTRACTS ===

#[test]
fn scenario_delivery_contract_lifecycle() {
    let (mut state, config) = fresh(5);
    state.coins = 200.0;

    assert!(accept_contract(&mut state, &config, "starter-kibble-8"));
    assert!(!accept_contract(&mut state, &config, "starter-profit-60"));
    assert!(available_contracts(&state, &config).is_empty());
    assert_eq!(contract_status(&state, &config), Some(ContractStatus::Active));

    let before = state.to_json().unwrap();
    assert!(!redeem_active_contract(&mut state, &config));
    assert_eq!(state.to_json().unwrap(), before, "failed redeem must not mutate");

    assert!(buy(&mut state, &config, GoodKey::Kibble, 8));
    assert!(is_active_contract_complete(&state, &config));
    let coins = state.coins;
    assert!(redeem_active_contract(&mut state, &config));

    assert_eq!(state.held(GoodKey::Kibble), 0);
    assert!((state.coins - (coins + 35.0)).abs() < 1e-9);
    assert_eq!(state.contracts.active_id, None);
    assert_eq!(state.contracts.last_outcome, Some(ContractOutcome::Redeemed));
}

#[test]
fn scenario_delivery_counts_stock_held_before_accept() {
    // Delivery checks absolute inventory, not units gained since accepting.
    let (mut state, config) = fresh(5);
    state.coins = 200.0;
    assert!(buy(&mut state, &config, GoodKey::Kibble, 8));
    assert!(accept_contract(&mut state, &config, "starter-kibble-8"));
    assert!(is_active_contract_complete(&state, &config));
}

#[test]
fn scenario_abandon_charges_penalty() {
    let (mut state, config) = fresh(5);
    assert!(accept_contract(&mut state, &config, "starter-profit-60"));
    assert!(abandon_active_contract(&mut state, &config));
    assert_eq!(state.coins, 40.0);
    assert_eq!(state.contracts.active_id, None);
    assert!(!abandon_active_contract(&mut state, &config));
    assert_eq!(state.coins, 40.0);
}

#[test]
fn scenario_expiry_penalty_applies_once() {
    let (mut state, config) = fresh(6);
    assert!(accept_contract(&mut state, &config, "starter-profit-60"));

    let outcomes = run_for(&mut state, &config, 240);

    assert_eq!(outcomes, vec![ContractOutcome::Failed]);
    assert_eq!(state.coins, 40.0);
    assert_eq!(state.contracts.active_id, None);
    assert_eq!(check_expiry(&mut state, &config), None);
}

#[test]
fn scenario_strict_mode_busts_on_expiry() {
    let (mut state, config) = fresh(6);
    state.meta.strict_mode = true;
    state.meta.whiskers = 3.0;
    state.coins = 90.0;
    assert!(buy(&mut state, &config, GoodKey::Kibble, 2));
    assert!(accept_contract(&mut state, &config, "starter-kibble-8"));

    let outcomes = run_for(&mut state, &config, 230);

    assert_eq!(outcomes, vec![ContractOutcome::Busted]);
    assert_eq!(state.coins, 50.0);
    assert_eq!(state.held(GoodKey::Kibble), 0);
    assert_eq!(state.meta.whiskers, 3.0);
    assert_eq!(state.meta.seasons, 0);
}

// === JOBS ===

#[test]
fn scenario_job_capacity() {
    let (mut state, config) = fresh(1);

    assert!(assign_job(&mut state, &config, "miso", Some(JobKey::Production)));
    assert!(assign_job(&mut state, &config, "miso", Some(JobKey::Production)));
    assert!(!assign_job(&mut state, &config, "beans", Some(JobKey::Production)));
    assert_eq!(state.job_of("beans"), None);

    assert!(assign_job(&mut state, &config, "beans", Some(JobKey::Guarding)));
    assert!(!assign_job(&mut state, &config, "miso", Some(JobKey::Guarding)));
    assert_eq!(state.job_of("miso"), Some(JobKey::Production));

    assert!(assign_job(&mut state, &config, "miso", None));
    assert!(assign_job(&mut state, &config, "beans", Some(JobKey::Production)));
    assert_eq!(state.job_count(JobKey::Guarding), 0);
    assert!(!assign_job(&mut state, &config, "whiskers", Some(JobKey::Scouting)));
}

#[test]
fn scenario_production_fills_inventory() {
    let (mut state, config) = fresh(1);
    assert!(assign_job(&mut state, &config, "miso", Some(JobKey::Production)));
    // 0.2 kibble/s over 21 s
    for _ in 0..21 {
        tick(&mut state, &config, 1.0);
    }
    assert_eq!(state.held(GoodKey::Kibble), 4);
    assert_eq!(meow_core::average_cost(&state, GoodKey::Kibble), Some(0.0));
}

// === SCHEMES AND HEAT ===

#[test]
fn scenario_nine_lives_absorbs_first_event() {
    let (mut state, config) = fresh(77);
    state.unlock(FeatureKey::Heat);
    state.unlock(FeatureKey::Schemes);
    assert!(equip_scheme(&mut state, 0, Some(SchemeId::NineLives)));
    assert!(activate_scheme(&mut state, &config, SchemeId::NineLives));
    assert!(!activate_scheme(&mut state, &config, SchemeId::NineLives), "cooling down");

    let mut events = Vec::new();
    for _ in 0..600 {
        state.heat = 100.0;
        if let Some(event) = tick(&mut state, &config, 1.0).event {
            events.push(event);
            if events.len() == 2 {
                break;
            }
        }
    }

    assert_eq!(events.len(), 2);
    assert!(events[0].mitigated);
    assert_eq!(events[0].coins_lost, 0.0);
    assert!(!events[1].mitigated);
    assert_eq!(state.events[0], events[1]);
    assert_eq!(state.schemes[&SchemeId::NineLives].charges, 0);
}

// === PRESTIGE ===

#[test]
fn scenario_prestige_converts_coins_to_whiskers() {
    let (mut state, config) = fresh(9);
    state.coins = 450.0;

    let summary = end_season(&mut state, &config);
    assert_eq!(summary.whiskers_awarded, 2.0);
    assert_eq!(summary.seasons, 1);
    assert_eq!(state.coins, 50.0);

    state.coins = 199.0;
    let summary = end_season(&mut state, &config);
    assert_eq!(summary.whiskers_awarded, 0.0);
    assert_eq!(summary.total_whiskers, 2.0);
    assert_eq!(state.meta.seasons, 2);
}

#[test]
fn scenario_veteran_unlocks_district_and_prestige_contract() {
    let (mut state, config) = fresh(9);
    assert!(!set_district(&mut state, &config, DistrictKey::Uptown));
    end_season(&mut state, &config);

    assert!(set_district(&mut state, &config, DistrictKey::Uptown));
    assert!(accept_contract(&mut state, &config, "prestige-heat-hedge"));
    let before = state.price(GoodKey::Kibble);
    run_for(&mut state, &config, 30);
    assert_ne!(state.price(GoodKey::Kibble), before);
}

// === PERSISTENCE ===

#[test]
fn scenario_save_and_resume_matches_uninterrupted_run() {
    let (mut live, config) = fresh(404);
    assert!(assign_job(&mut live, &config, "miso", Some(JobKey::Production)));
    run_for(&mut live, &config, 30);

    let mut restored = SimState::from_json(&live.to_json().unwrap(), &config).unwrap();
    for _ in 0..120 {
        let a = tick(&mut live, &config, 0.25);
        let b = tick(&mut restored, &config, 0.25);
        assert_eq!(a, b);
    }
    assert_eq!(live.to_json().unwrap(), restored.to_json().unwrap());
}
