// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use float_cmp::approx_eq;

use stockflow_engine::{
    Category, Equation, ErrorCode, ErrorKind, Model, Point, SimSpecs, Simulation, Template,
};

fn simulate_template(template: Template, duration: f64, dt: f64) -> Simulation {
    let model = Model::from_template(template).unwrap();
    let mut sim = Simulation::new(model, SimSpecs::default()).unwrap();
    sim.simulate(Some(duration), Some(dt)).unwrap();
    sim
}

fn assert_series(expected: &[f64], actual: &[f64]) {
    assert_eq!(expected.len(), actual.len(), "{expected:?} vs {actual:?}");
    for (e, a) in expected.iter().zip(actual.iter()) {
        assert!(approx_eq!(f64, *e, *a, epsilon = 1e-9), "{expected:?} vs {actual:?}");
    }
}

#[test]
fn single_inflow() {
    let sim = simulate_template(Template::SingleInflow, 3.0, 1.0);
    assert_eq!(&[1.0, 5.0, 9.0, 13.0], sim.model().behavior("stock").unwrap());
    assert_eq!(&[4.0, 4.0, 4.0, 4.0], sim.model().behavior("inflow").unwrap());
    assert_eq!(&[0.0, 1.0, 2.0, 3.0], sim.times());
}

#[test]
fn single_outflow() {
    let sim = simulate_template(Template::SingleOutflow, 3.0, 1.0);
    assert_eq!(&[100.0, 96.0, 92.0, 88.0], sim.model().behavior("stock").unwrap());
}

#[test]
fn positive_feedback_compounds() {
    let sim = simulate_template(Template::FirstOrderPositiveFeedback, 3.0, 1.0);
    assert_series(&[1.0, 1.1, 1.21, 1.331], sim.model().behavior("stock").unwrap());
    assert_series(&[0.1, 0.11, 0.121], sim.model().behavior("growth").unwrap());
}

#[test]
fn negative_feedback_approaches_goal() {
    for steps in [1usize, 10, 100, 400] {
        let sim = simulate_template(
            Template::FirstOrderNegativeFeedback,
            steps as f64 * 0.25,
            0.25,
        );
        let stock = sim.model().behavior("stock").unwrap();
        assert_eq!(steps + 1, stock.len());
        for pair in stock.windows(2) {
            assert!(pair[1] < pair[0], "{} then {}", pair[0], pair[1]);
        }
        assert!(stock.iter().all(|value| *value >= 20.0));
    }

    let sim = simulate_template(Template::FirstOrderNegativeFeedback, 1.0, 1.0);
    // 100 - (100 - 20) / 5
    assert_series(&[100.0, 84.0], sim.model().behavior("stock").unwrap());
    assert_series(&[80.0], sim.model().behavior("gap").unwrap());
    assert_series(&[16.0], sim.model().behavior("adjustment").unwrap());
}

#[test]
fn division_by_zero_leaves_histories_alone() {
    let mut model = Model::from_template(Template::SingleInflow).unwrap();
    model.add_aux(Some("x"), Equation::Literal(1.0), Point::default()).unwrap();
    model.add_aux(Some("y"), Equation::Literal(0.0), Point::default()).unwrap();
    model
        .add_aux(Some("ratio"), Equation::div("x", "y"), Point::default())
        .unwrap();

    let mut sim = Simulation::new(model, SimSpecs::default()).unwrap();
    let err = sim.simulate(Some(3.0), Some(1.0)).unwrap_err();
    assert_eq!(ErrorCode::DivisionByZero, err.code);
    assert_eq!(ErrorKind::Simulation, err.kind);
    assert_eq!(&[1.0], sim.model().behavior("stock").unwrap());
    assert_eq!(&[4.0], sim.model().behavior("inflow").unwrap());
    assert_eq!(1, sim.times().len());

    // fixing the equation makes the model runnable again
    sim.model_mut()
        .replace_equation("y", Equation::Literal(2.0))
        .unwrap();
    sim.simulate(Some(3.0), Some(1.0)).unwrap();
    assert_eq!(&[0.5, 0.5, 0.5], sim.model().behavior("ratio").unwrap());
}

#[test]
fn dangling_flow_is_rejected() {
    let mut model = Model::from_template(Template::FirstOrderPositiveFeedback).unwrap();
    let before = model.clone().view();

    let err = model
        .add_flow(
            Some("leak"),
            Equation::Literal(1.0),
            Some("growth"),
            None,
            Point::default(),
            vec![],
        )
        .unwrap_err();
    assert_eq!(ErrorCode::DanglingFlowReference, err.code);
    assert_eq!(ErrorKind::Model, err.kind);
    assert_eq!(before, model.view());
}

#[test]
fn clear_run_is_deterministic() {
    let mut sim = simulate_template(Template::FirstOrderNegativeFeedback, 10.0, 0.5);
    let first = sim.results();

    sim.clear_run();
    assert_eq!(&[100.0], sim.model().behavior("stock").unwrap());
    assert_eq!(&[20.0], sim.model().behavior("goal").unwrap());
    assert!(sim.model().behavior("gap").unwrap().is_empty());
    assert_eq!(&[0.0], sim.times());

    sim.simulate(Some(10.0), Some(0.5)).unwrap();
    assert_eq!(first, sim.results());
}

#[test]
fn history_lengths_after_n_steps() {
    let steps = 8;
    let sim = simulate_template(Template::FirstOrderNegativeFeedback, steps as f64, 1.0);
    let model = sim.model();
    for element in model.elements() {
        let len = element.history().len();
        match element.category() {
            Category::Stock => assert_eq!(steps + 1, len),
            Category::Parameter => assert_eq!(steps + 1, len),
            _ => assert_eq!(steps, len, "{}", element.name()),
        }
    }
}

#[test]
fn defaults_come_from_specs() {
    let specs = SimSpecs::from_json(r#"{"duration": 2, "dt": 0.5}"#).unwrap();
    let model = Model::from_template(Template::SingleInflow).unwrap();
    let mut sim = Simulation::new(model, specs).unwrap();
    assert_eq!(4, sim.simulate(None, None).unwrap());
    assert_eq!(&[1.0, 3.0, 5.0, 7.0, 9.0], sim.model().behavior("stock").unwrap());
}

#[test]
fn replace_equation_rewires_dependencies() {
    let mut model = Model::from_template(Template::FirstOrderNegativeFeedback).unwrap();
    model
        .replace_equation("adjustment", Equation::div("stock", "adjustment_time"))
        .unwrap();

    let adjustment = model.uid_of("adjustment").unwrap();
    let mut sources: Vec<&str> = model
        .incoming(adjustment)
        .into_iter()
        .map(|link| model.name_of(link.from).unwrap())
        .collect();
    sources.sort();
    assert_eq!(vec!["adjustment_time", "stock"], sources);
    assert!(model.link("gap", "adjustment").is_none());

    let mut sim = Simulation::new(model, SimSpecs::default()).unwrap();
    sim.simulate(Some(1.0), Some(1.0)).unwrap();
    assert_series(&[100.0, 80.0], sim.model().behavior("stock").unwrap());
}

#[test]
fn results_table() {
    let sim = simulate_template(Template::SingleOutflow, 2.0, 1.0);
    let mut out: Vec<u8> = Vec::new();
    sim.results().write_tsv(&mut out).unwrap();
    assert_eq!(
        "time\tstock\toutflow\n0\t100\t4\n1\t96\t4\n2\t92\t4\n",
        String::from_utf8(out).unwrap()
    );
}
