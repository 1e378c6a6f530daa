//! Vertex modes exercised through a graph.
//!
//! Every test wires a small graph with the vertex under test feeding the
//! root, so the result is what `Dag::solve` returns.

use dagcalc_core::{
    Band, CmpOp, Comparator, DataPath, Dag, EventAccess, Operand, OutputFormat, PathKey, Value,
    VertexId,
};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

fn comparator(
    lhs: impl Into<Operand>,
    op: CmpOp,
    rhs: impl Into<Operand>,
    format: OutputFormat,
) -> Comparator {
    Comparator {
        lhs: lhs.into(),
        op,
        rhs: rhs.into(),
        format,
    }
}

fn input(n: usize) -> Operand {
    Operand::Ref(n)
}

fn band(
    value: Operand,
    stop1: impl Into<Operand>,
    stop2: impl Into<Operand>,
    format: OutputFormat,
) -> Band {
    Band {
        value,
        stop1: stop1.into(),
        stop2: stop2.into(),
        format,
    }
}

/// `under_test` reads payload elements 0..n in argument order.
fn indexed_inputs(n: usize) -> (Dag, VertexId) {
    let mut g = Dag::new();
    let inputs: Vec<VertexId> = (0..n)
        .map(|i| {
            g.make_node(format!("IN{}", i + 1))
                .set_path(DataPath::Keys(vec![PathKey::Index(i as u64)]))
                .id()
        })
        .collect();
    let under_test = g.make_node("UNDER_TEST").id();
    let root = g.root();
    g.connect(under_test, root);
    for id in inputs {
        g.connect(id, under_test);
    }
    (g, under_test)
}

fn set_cmp(g: &mut Dag, id: VertexId, cmp: Comparator) {
    g.vertex_mut(id).unwrap().set_comparator(cmp);
}

fn set_band(g: &mut Dag, id: VertexId, b: Band) {
    g.vertex_mut(id).unwrap().set_range(b);
}

// ---------------------------------------------------------------------------
// Math
// ---------------------------------------------------------------------------

#[test]
fn math_formula_and_constant() {
    let mut g = Dag::new();
    let a = g.make_node("A").set_math("17 - 3").id();
    let root = g.root();
    g.connect(a, root);
    assert_eq!(g.solve(Value::Undefined), Value::from(14));

    g.vertex_mut(a).unwrap().set_math(14);
    assert_eq!(g.solve(Value::Undefined), Value::from(14));

    // Letters are stripped; "-(17 - 3)" is left.
    g.vertex_mut(a).unwrap().set_math("balh-blah(17 - 3)");
    assert_eq!(g.solve(Value::Undefined), Value::from(-14));

    g.vertex_mut(a).unwrap().set_math("blah");
    assert_eq!(g.solve(Value::Undefined), Value::Undefined);
}

#[test]
fn math_references_follow_argument_order() {
    let mut g = Dag::new();
    let a = g.make_node("A").set_math("$1 - $2").id();
    let b = g.make_node("B").set_math(17).id();
    let c = g.make_node("C").set_math(3).id();
    let root = g.root();
    g.connect(a, root).connect(b, a).connect(c, a);
    assert_eq!(g.solve(Value::Undefined), Value::from(14));

    g.disconnect(b, a).connect(b, a);
    assert_eq!(g.solve(Value::Undefined), Value::from(-14));

    // One input left: $2 no longer resolves.
    g.disconnect(b, a);
    assert_eq!(g.solve(Value::Undefined), Value::Undefined);
}

#[test]
fn math_bitwise_and_builtins() {
    let mut g = Dag::new();
    let a = g.make_node("A").id();
    let root = g.root();
    g.connect(a, root);

    for (formula, expected) in [
        ("5 & 3", 1.0),
        ("5 | 3", 7.0),
        ("5 ^ 3", 6.0),
        ("~5", -6.0),
        ("1 << 4", 16.0),
        ("-16 >> 2", -4.0),
        ("-1 >>> 28", 15.0),
        ("int(7.9)", 7.0),
        ("len('12345')", 5.0),
        ("7 % 4", 3.0),
    ] {
        g.vertex_mut(a).unwrap().set_math(formula);
        assert_eq!(g.solve(Value::Undefined), Value::from(expected), "formula {}", formula);
    }
}

#[test]
fn math_division_by_zero_is_infinite() {
    let mut g = Dag::new();
    let a = g.make_node("A").set_math("1 / 0").id();
    let root = g.root();
    g.connect(a, root);
    assert_eq!(g.solve(Value::Undefined), Value::from(f64::INFINITY));
}

#[test]
fn math_string_length_of_extreme_numbers() {
    let mut g = Dag::new();
    let a = g.make_node("A").set_math("len($1)").id();
    let b = g.make_node("B").set_math(1e21).id();
    let root = g.root();
    g.connect(b, a).connect(a, root);
    assert_eq!(g.solve(Value::Undefined), Value::from(5));

    g.vertex_mut(b).unwrap().set_math(1e-7);
    assert_eq!(g.solve(Value::Undefined), Value::from(4));

    g.vertex_mut(a).unwrap().set_math("$1 + ''");
    assert_eq!(g.solve(Value::Undefined), Value::from("1e-7"));
}

#[test]
fn math_long_operator_chains() {
    let mut g = Dag::new();
    let a = g.make_node("A").set_fallback("too deep").id();
    let root = g.root();
    g.connect(a, root);

    g.vertex_mut(a).unwrap().set_math(format!("1{}", "+1".repeat(999)));
    assert_eq!(g.solve(Value::Undefined), Value::from(1000));

    // Too tall to evaluate: the formula is malformed and the fallback applies.
    g.vertex_mut(a).unwrap().set_math(format!("{}1", "1+".repeat(200_000)));
    assert_eq!(g.solve(Value::Undefined), Value::from("too deep"));
}

// ---------------------------------------------------------------------------
// Enumerator
// ---------------------------------------------------------------------------

#[test]
fn enumerator_maps_input_to_value() {
    let mut g = Dag::new();
    let a = g.make_node("A").id();
    let b = g.make_node("B").set_math(1).id();
    let root = g.root();
    g.connect(a, root).connect(b, a);

    g.vertex_mut(a).unwrap().add_enum(1, "A").add_enum(2, "B").add_enum(3, "C");
    assert_eq!(g.solve(Value::Undefined), Value::from("A"));

    g.vertex_mut(b).unwrap().set_math(2);
    assert_eq!(g.solve(Value::Undefined), Value::from("B"));

    // Last write wins, in place.
    g.vertex_mut(b).unwrap().set_math(1);
    g.vertex_mut(a).unwrap().add_enum(1, "C");
    assert_eq!(g.solve(Value::Undefined), Value::from("C"));
    assert_eq!(
        g.vertex(a).unwrap().enum_pairs(),
        &[
            (Value::from(1), Value::from("C")),
            (Value::from(2), Value::from("B")),
            (Value::from(3), Value::from("C")),
        ]
    );

    g.vertex_mut(a).unwrap().del_enum(&Value::from(1));
    assert_eq!(g.solve(Value::Undefined), Value::Undefined);

    g.vertex_mut(a).unwrap().add_enum(Value::Undefined, "something");
    assert_eq!(g.vertex(a).unwrap().enum_pairs().len(), 2);
}

#[test]
fn enumerator_values_can_reference_inputs() {
    let mut g = Dag::new();
    let input = g.make_node("INPUT").set_path(DataPath::Passthrough).id();
    let g3 = g.make_node("GIVE_3").set_math(3).id();
    let g4 = g.make_node("GIVE_4").set_math(4).id();
    let g5 = g.make_node("GIVE_5").set_math(5).id();
    let a = g
        .make_node("ENUM")
        .add_enum(1, "Value was 1")
        .add_enum(2, "$2")
        .add_enum(3, "$3")
        .add_enum(4, "$4")
        .id();
    let root = g.root();
    g.connect(a, root)
        .connect(input, a)
        .connect(g3, a)
        .connect(g4, a)
        .connect(g5, a);

    assert_eq!(g.solve(1), Value::from("Value was 1"));
    assert_eq!(g.solve(2), Value::from(3));
    assert_eq!(g.solve(3), Value::from(4));
    assert_eq!(g.solve(4), Value::from(5));
    assert_eq!(g.solve(5), Value::Undefined);
}

// ---------------------------------------------------------------------------
// Comparator
// ---------------------------------------------------------------------------

#[test]
fn comparator_equality_operators() {
    let (mut g, c) = indexed_inputs(2);
    let tf = OutputFormat::TrueFalse;

    set_cmp(&mut g, c, comparator(input(1), CmpOp::Eq, input(2), tf));
    assert_eq!(g.solve(json!([2, 1])), Value::Bool(false));
    assert_eq!(g.solve(json!([2.0, 2])), Value::Bool(true));
    assert_eq!(g.solve(json!(["2", 2])), Value::Bool(true));

    set_cmp(&mut g, c, comparator(input(1), CmpOp::Ne, input(2), tf));
    assert_eq!(g.solve(json!([1, 2])), Value::Bool(true));
    assert_eq!(g.solve(json!([2, 2])), Value::Bool(false));

    set_cmp(&mut g, c, comparator(input(1), CmpOp::StrictEq, input(2), tf));
    assert_eq!(g.solve(json!([2.0, 2])), Value::Bool(true));
    assert_eq!(g.solve(json!(["2", 2])), Value::Bool(false));

    set_cmp(&mut g, c, comparator(input(1), CmpOp::StrictNe, input(2), tf));
    assert_eq!(g.solve(json!([2, 2])), Value::Bool(false));
    assert_eq!(g.solve(json!(["2", 2])), Value::Bool(true));
}

#[test]
fn comparator_relational_operators() {
    let (mut g, c) = indexed_inputs(2);
    let tf = OutputFormat::TrueFalse;

    set_cmp(&mut g, c, comparator(input(1), CmpOp::Gt, input(2), tf));
    assert_eq!(g.solve(json!([2, 1])), Value::Bool(true));
    assert_eq!(g.solve(json!([1, 2])), Value::Bool(false));

    set_cmp(&mut g, c, comparator(input(1), CmpOp::Ge, input(2), tf));
    assert_eq!(g.solve(json!([2, 2])), Value::Bool(true));
    assert_eq!(g.solve(json!([1, 2])), Value::Bool(false));

    set_cmp(&mut g, c, comparator(input(1), CmpOp::Lt, input(2), tf));
    assert_eq!(g.solve(json!([1, 2])), Value::Bool(true));
    assert_eq!(g.solve(json!([2, 1])), Value::Bool(false));

    set_cmp(&mut g, c, comparator(input(1), CmpOp::Le, input(2), tf));
    assert_eq!(g.solve(json!([2, 2])), Value::Bool(true));
    assert_eq!(g.solve(json!([2, 1])), Value::Bool(false));
}

#[test]
fn comparator_against_constants() {
    let (mut g, c) = indexed_inputs(2);
    let tf = OutputFormat::TrueFalse;

    set_cmp(&mut g, c, comparator(input(1), CmpOp::StrictEq, 5, tf));
    assert_eq!(g.solve(json!([5, 11])), Value::Bool(true));
    assert_eq!(g.solve(json!([3, 11])), Value::Bool(false));

    set_cmp(&mut g, c, comparator(5, CmpOp::StrictEq, input(1), tf));
    assert_eq!(g.solve(json!([5, 11])), Value::Bool(true));

    set_cmp(&mut g, c, comparator(input(2), CmpOp::StrictEq, 100, tf));
    assert_eq!(g.solve(json!([2, 100])), Value::Bool(true));
    assert_eq!(g.solve(json!([2, 90])), Value::Bool(false));

    set_cmp(&mut g, c, comparator(5, CmpOp::StrictEq, 5, tf));
    assert_eq!(g.solve(json!([100, 200])), Value::Bool(true));
}

#[test]
fn comparator_output_formats() {
    let (mut g, c) = indexed_inputs(2);

    set_cmp(&mut g, c, comparator(input(1), CmpOp::Gt, input(2), OutputFormat::OneZero));
    assert_eq!(g.solve(json!([1, 2])), Value::from(0));
    assert_eq!(g.solve(json!([2, 1])), Value::from(1));

    set_cmp(&mut g, c, comparator(input(1), CmpOp::Gt, input(2), OutputFormat::ValueOrUndefined));
    assert_eq!(g.solve(json!([1, 2])), Value::Undefined);
    assert_eq!(g.solve(json!([2, 1])), Value::from(2));

    set_cmp(&mut g, c, comparator(input(1), CmpOp::Gt, input(2), OutputFormat::PassOrAlternate));
    assert_eq!(g.solve(json!([1, 22])), Value::from(22));
    assert_eq!(g.solve(json!([33, 22])), Value::from(33));
}

#[test]
fn comparator_parses_positional_form() {
    let cmp = Comparator::from_values(&[
        Value::from("$1"),
        Value::from(">="),
        Value::from(10),
        Value::from("ab"),
    ])
    .unwrap();
    assert_eq!(cmp, comparator(input(1), CmpOp::Ge, 10, OutputFormat::PassOrAlternate));
    assert_eq!(Comparator::from_values(&cmp.to_values()).unwrap(), cmp);

    assert!(Comparator::from_values(&[Value::from("$1"), Value::from("<>"), Value::from(1), Value::from("tf")]).is_err());
    assert!(Comparator::from_values(&[Value::from("$1"), Value::from("<"), Value::from(1), Value::from("xx")]).is_err());
    assert!(Comparator::from_values(&[Value::from("12"), Value::from("<"), Value::from(1), Value::from("tf")]).is_err());
}

// ---------------------------------------------------------------------------
// Range
// ---------------------------------------------------------------------------

#[test]
fn range_with_constant_stops_in_either_order() {
    let (mut g, f) = indexed_inputs(3);

    for (lo, hi) in [(1, 3), (3, 1)] {
        set_band(&mut g, f, band(input(1), lo, hi, OutputFormat::TrueFalse));
        assert_eq!(g.solve(json!([3.01])), Value::Bool(false));
        assert_eq!(g.solve(json!([0.99])), Value::Bool(false));
        assert_eq!(g.solve(json!([1])), Value::Bool(true));
        assert_eq!(g.solve(json!([2])), Value::Bool(true));
        assert_eq!(g.solve(json!([3])), Value::Bool(true));

        set_band(&mut g, f, band(input(1), lo, hi, OutputFormat::PassOrAlternate));
        assert_eq!(g.solve(json!([3.01])), Value::from(3));
        assert_eq!(g.solve(json!([0.99])), Value::from(1));
        assert_eq!(g.solve(json!([2])), Value::from(2));
    }
}

#[test]
fn range_output_formats() {
    let (mut g, f) = indexed_inputs(3);

    set_band(&mut g, f, band(input(1), 2, 4, OutputFormat::OneZero));
    assert_eq!(g.solve(json!([4.01])), Value::from(0));
    assert_eq!(g.solve(json!([1.99])), Value::from(0));
    assert_eq!(g.solve(json!([2])), Value::from(1));
    assert_eq!(g.solve(json!([4])), Value::from(1));

    set_band(&mut g, f, band(input(1), 2, 4, OutputFormat::ValueOrUndefined));
    assert_eq!(g.solve(json!([4.01])), Value::Undefined);
    assert_eq!(g.solve(json!([1.99])), Value::Undefined);
    assert_eq!(g.solve(json!([3])), Value::from(3));
}

#[test]
fn range_reads_stops_from_inputs() {
    let (mut g, f) = indexed_inputs(3);
    set_band(&mut g, f, band(input(1), input(2), input(3), OutputFormat::PassOrAlternate));

    assert_eq!(g.solve(json!([3.01, 1, 3])), Value::from(3));
    assert_eq!(g.solve(json!([0.99, 1, 3])), Value::from(1));
    assert_eq!(g.solve(json!([1, 1, 3])), Value::from(1));
    assert_eq!(g.solve(json!([2, 1, 3])), Value::from(2));
    assert_eq!(g.solve(json!([3, 1, 3])), Value::from(3));
}

#[test]
fn range_false_is_not_replaced_by_fallback() {
    let (mut g, f) = indexed_inputs(1);
    set_band(&mut g, f, band(input(1), 1, 3, OutputFormat::TrueFalse));
    g.vertex_mut(f).unwrap().set_fallback("fallback");
    assert_eq!(g.solve(json!([5])), Value::Bool(false));
}

// ---------------------------------------------------------------------------
// Rounding, data paths and event codes
// ---------------------------------------------------------------------------

#[test]
fn rounding_rounds_input() {
    let mut g = Dag::new();
    let a = g.make_node("A").set_round(2).id();
    let b = g.make_node("B").set_math(12.34567809).id();
    let root = g.root();
    g.connect(b, a).connect(a, root);
    assert_eq!(g.solve(Value::Undefined), Value::from(12.35));

    g.vertex_mut(a).unwrap().set_round(0);
    assert_eq!(g.solve(Value::Undefined), Value::from(12));
}

#[test]
fn data_path_reads_nested_payload() {
    let mut g = Dag::new();
    let a = g.make_node("A").id();
    let root = g.root();
    g.connect(a, root);
    let data = json!({"SOME": [1, 2, {"weird": {"data": [4, 10, "structure", [0, 3]]}}]});

    g.vertex_mut(a)
        .unwrap()
        .set_path(DataPath::Keys(vec!["SOME".into(), 0.into()]));
    assert_eq!(g.solve(data.clone()), Value::from(1));

    let deep = DataPath::Keys(vec!["SOME".into(), 2.into(), "weird".into(), "data".into(), 1.into()]);
    g.vertex_mut(a).unwrap().set_path(deep.clone());
    assert_eq!(g.solve(data.clone()), Value::from(10));
    assert_eq!(
        deep.to_values(),
        vec![
            Value::from("SOME"),
            Value::from(2),
            Value::from("weird"),
            Value::from("data"),
            Value::from(1),
        ]
    );

    g.vertex_mut(a)
        .unwrap()
        .set_path(DataPath::Keys(vec!["SOME".into(), 9.into()]));
    assert_eq!(g.solve(data), Value::Undefined);

    g.vertex_mut(a).unwrap().set_path(DataPath::Passthrough);
    assert_eq!(g.solve(1.23), Value::from(1.23));
}

#[test]
fn data_path_reads_upstream_result_when_connected() {
    let mut g = Dag::new();
    let src = g.make_node("SRC").set_path(DataPath::Keys(vec!["inner".into()])).id();
    let a = g.make_node("A").set_path(DataPath::Keys(vec!["x".into()])).id();
    let root = g.root();
    g.connect(src, a).connect(a, root);
    assert_eq!(g.solve(json!({"inner": {"x": 42}, "x": 1})), Value::from(42));
}

#[test]
fn event_codes_read_under_ev_key() {
    let mut g = Dag::new();
    let a = g.make_node("A").set_event_code(123, EventAccess::Data).id();
    let root = g.root();
    g.connect(a, root);
    let data = json!({
        "_ev": {
            "1": {"code": 1, "data": "string", "desc": null},
            "12": {"code": 12, "data": null, "desc": null},
            "123": {"code": 123, "data": true, "desc": "A true"},
            "1234": {"code": 1234, "data": 12, "desc": "A number"}
        },
        "123": {"data": "not an event"}
    });

    assert_eq!(g.solve(data.clone()), Value::Bool(true));

    g.vertex_mut(a).unwrap().set_event_code(12, EventAccess::Data);
    assert_eq!(g.solve(data.clone()), Value::Null);

    g.vertex_mut(a).unwrap().set_event_code(1, EventAccess::Data);
    assert_eq!(g.solve(data.clone()), Value::from("string"));

    g.vertex_mut(a).unwrap().set_event_code(1234, EventAccess::from_selector("DESC"));
    assert_eq!(g.solve(data.clone()), Value::from("A number"));

    g.vertex_mut(a).unwrap().set_event_code(1234, EventAccess::from_selector("code"));
    assert_eq!(g.solve(data.clone()), Value::from(1234));

    g.vertex_mut(a).unwrap().set_event_code(99, EventAccess::Data);
    assert_eq!(g.solve(data), Value::Undefined);
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

#[test]
fn fallback_replaces_only_undefined() {
    let mut g = Dag::new();
    let a = g.make_node("A").id();
    let b = g.make_node("B").set_math(10).id();
    let root = g.root();
    g.connect(b, a).connect(a, root);

    g.vertex_mut(a)
        .unwrap()
        .set_comparator(comparator(input(1), CmpOp::Lt, 5, OutputFormat::ValueOrUndefined));
    assert_eq!(g.solve(Value::Undefined), Value::Undefined);

    for fallback in [Value::from(100), Value::from("string"), Value::Bool(false), Value::from(3)] {
        g.vertex_mut(a).unwrap().set_fallback(fallback.clone());
        assert_eq!(g.solve(Value::Undefined), fallback);
    }
}

#[test]
fn failing_modes_invoke_fallback() {
    let mut g = Dag::new();
    let a = g.make_node("A").set_fallback("fallback").id();
    let b = g.make_node("B").set_math(10).id();
    let root = g.root();
    g.connect(b, a).connect(a, root);

    g.vertex_mut(a).unwrap().set_math("make me fail");
    assert_eq!(g.solve(Value::Undefined), Value::from("fallback"));

    g.vertex_mut(a).unwrap().add_enum(10, "pass").add_enum(9, "fail");
    assert_eq!(g.solve(Value::Undefined), Value::from("pass"));
    g.vertex_mut(a).unwrap().del_enum(&Value::from(10));
    assert_eq!(g.solve(Value::Undefined), Value::from("fallback"));
}

#[test]
fn constant_vertex_yields_its_fallback() {
    let mut g = Dag::new();
    let c = g.make_node("C").set_fallback("fallback").id();
    let root = g.root();
    g.connect(c, root);
    assert_eq!(g.solve(Value::Undefined), Value::from("fallback"));

    g.vertex_mut(c).unwrap().set_fallback(0);
    assert_eq!(g.solve(Value::Undefined), Value::from(0));

    g.vertex_mut(c).unwrap().reset();
    assert_eq!(g.solve(Value::Undefined), Value::Undefined);
}
