// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use float_cmp::approx_eq;
use proptest::prelude::*;

use stockflow_engine::{Equation, Model, Operand, Point, SimSpecs, Simulation, canonicalize};

const PARAMS: [&str; 4] = ["alpha", "beta", "gamma", "delta"];

fn operand_strategy() -> impl Strategy<Value = Operand> {
    prop_oneof![
        (0..PARAMS.len()).prop_map(|i| Operand::from(PARAMS[i])),
        (1i32..100).prop_map(|n| Operand::from(n as f64)),
    ]
}

fn equation_strategy() -> impl Strategy<Value = Equation> {
    let leaf = prop_oneof![
        operand_strategy().prop_map(|x| Equation::linear(x)),
        (operand_strategy(), operand_strategy()).prop_map(|(l, r)| Equation::add(l, r)),
        (operand_strategy(), operand_strategy()).prop_map(|(l, r)| Equation::mul(l, r)),
    ];
    leaf.prop_recursive(3, 16, 2, |inner| {
        prop_oneof![
            (inner.clone(), operand_strategy()).prop_map(|(l, r)| Equation::sub(l, r)),
            (operand_strategy(), inner).prop_map(|(l, r)| Equation::add(l, r)),
        ]
    })
}

fn dt_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![Just(0.125), Just(0.25), Just(0.5), Just(1.0)]
}

fn param_model() -> Model {
    let mut model = Model::new();
    for (i, name) in PARAMS.into_iter().enumerate() {
        model
            .add_aux(Some(name), Equation::Literal(i as f64 + 1.0), Point::default())
            .unwrap();
    }
    model.add_aux(Some("target"), Equation::Literal(0.0), Point::default()).unwrap();
    model
}

proptest! {
    #[test]
    fn constant_flows_integrate_linearly(
        initial in -100i32..100,
        inflow in 0i32..20,
        outflow in 0i32..20,
        steps in 0usize..40,
        dt in dt_strategy(),
    ) {
        let mut model = Model::new();
        model.add_stock(Some("stock"), initial as f64, Point::default()).unwrap();
        model
            .add_flow(Some("in"), Equation::Literal(inflow as f64), None, Some("stock"), Point::default(), vec![])
            .unwrap();
        model
            .add_flow(Some("out"), Equation::Literal(outflow as f64), Some("stock"), None, Point::default(), vec![])
            .unwrap();

        let mut sim = Simulation::new(model, SimSpecs::default()).unwrap();
        let taken = sim.simulate(Some(steps as f64 * dt), Some(dt)).unwrap();
        prop_assert_eq!(steps, taken);

        let stock = sim.model().behavior("stock").unwrap();
        prop_assert_eq!(steps + 1, stock.len());
        prop_assert_eq!(steps + 1, sim.model().behavior("in").unwrap().len());
        let expected = initial as f64 + steps as f64 * dt * (inflow - outflow) as f64;
        let last = stock[stock.len() - 1];
        prop_assert!(approx_eq!(f64, expected, last, epsilon = 1e-9), "{} vs {}", expected, last);
    }

    #[test]
    fn cleared_runs_repeat_exactly(
        initial in 1i32..1000,
        goal in 0i32..100,
        adjustment_time in 1i32..20,
        steps in 1usize..50,
    ) {
        let mut model = Model::new();
        model.add_stock(Some("stock"), initial as f64, Point::default()).unwrap();
        model.add_aux(Some("goal"), Equation::Literal(goal as f64), Point::default()).unwrap();
        model.add_aux(Some("at"), Equation::Literal(adjustment_time as f64), Point::default()).unwrap();
        model
            .add_aux(Some("gap"), Equation::div(Equation::sub("stock", "goal"), "at"), Point::default())
            .unwrap();
        model
            .add_flow(Some("adjust"), Equation::linear("gap"), Some("stock"), None, Point::default(), vec![])
            .unwrap();

        let mut sim = Simulation::new(model, SimSpecs::default()).unwrap();
        sim.simulate(Some(steps as f64), Some(1.0)).unwrap();
        let first = sim.results();
        sim.clear_run();
        sim.simulate(Some(steps as f64), Some(1.0)).unwrap();
        prop_assert_eq!(first, sim.results());
    }

    #[test]
    fn replaced_equations_link_exactly_their_operands(equation in equation_strategy()) {
        let mut model = param_model();
        model.replace_equation("target", equation.clone()).unwrap();

        let target = model.uid_of("target").unwrap();
        let mut linked: Vec<&str> = model
            .incoming(target)
            .into_iter()
            .map(|link| model.name_of(link.from).unwrap())
            .collect();
        linked.sort_unstable();
        let mut expected = equation.references();
        expected.sort_unstable();
        prop_assert_eq!(expected, linked);
    }

    #[test]
    fn canonical_names_are_stable(name in "[A-Za-z][A-Za-z0-9 \n]{0,20}") {
        let once = canonicalize(&name);
        prop_assert_eq!(once.clone(), canonicalize(&once));
        prop_assert!(!once.contains(' '));
        prop_assert!(!once.contains('\n'));
    }
}
