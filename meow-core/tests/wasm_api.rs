#![cfg(target_arch = "wasm32")]
//! Browser-facing surface. Run with `wasm-pack test --headless --chrome`.

use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_test::*;

use meow_core::Simulation;

wasm_bindgen_test_configure!(run_in_browser);

#[wasm_bindgen_test]
fn unseeded_simulation_draws_a_seed() {
    let mut sim = Simulation::new(None);
    sim.tick(1.0);
    assert!(sim.state().seed.is_some());
}

#[wasm_bindgen_test]
fn contracts_cross_the_boundary_as_plain_objects() {
    let mut sim = Simulation::new(Some(5));
    let offers = sim.available_contracts().unwrap();
    assert!(js_sys::Array::is_array(&offers));
    assert_eq!(js_sys::Array::from(&offers).length(), 2);

    assert_eq!(sim.active_contract().unwrap(), JsValue::NULL);
    assert!(sim.accept_contract("starter-profit-60"));
    assert!(sim.active_contract().unwrap().is_object());
}

#[wasm_bindgen_test]
fn bad_config_becomes_a_js_error() {
    let err = match Simulation::with_config("{\"goods\": 3}", Some(1)) {
        Ok(_) => panic!("config should be rejected"),
        Err(err) => err,
    };
    assert!(err.is_instance_of::<js_sys::Error>());
}
