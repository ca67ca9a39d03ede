//! Property-based tests for constant folding.
//!
//! Folding must agree with evaluating the operands as f64, producing an
//! integer exactly when no operand is a float and the operator is not `/`.

use phpcc::analyzer::SemanticVisitor;
use phpcc::lexer::Lexer;
use phpcc::optimizer::{fold_binary, Optimizer};
use phpcc::parser::{BinOp, Node, Parser};
use proptest::prelude::*;

fn arb_small_int() -> impl Strategy<Value = i64> {
    -10_000i64..10_000i64
}

fn arb_arithmetic() -> impl Strategy<Value = BinOp> {
    prop::sample::select(vec![BinOp::Add, BinOp::Sub, BinOp::Mul])
}

fn arb_relational() -> impl Strategy<Value = BinOp> {
    prop::sample::select(vec![
        BinOp::Less,
        BinOp::LessEqual,
        BinOp::Greater,
        BinOp::GreaterEqual,
        BinOp::Equal,
        BinOp::NotEqual,
    ])
}

fn eval(op: BinOp, a: f64, b: f64) -> f64 {
    match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::Less => (a < b) as i64 as f64,
        BinOp::LessEqual => (a <= b) as i64 as f64,
        BinOp::Greater => (a > b) as i64 as f64,
        BinOp::GreaterEqual => (a >= b) as i64 as f64,
        BinOp::Equal => (a == b) as i64 as f64,
        BinOp::NotEqual => (a != b) as i64 as f64,
        _ => unreachable!(),
    }
}

/// Value of `$r` after analyzing and optimizing `$r = <expr>;`.
fn fold_source(expr: &str) -> Node {
    let source = format!("<?php\n$r = {};", expr);
    let tokens = Lexer::tokenize(&source).unwrap();
    let mut parser = Parser::new(tokens);
    let mut program = parser.parse().unwrap();
    SemanticVisitor::new(parser.take_symbol_table())
        .visit_program(&mut program)
        .unwrap();
    Optimizer::new().optimize(&mut program);

    let stmt = program.ast.statements(program.root)[0];
    let Node::Assign { value, .. } = &program.ast[stmt] else {
        panic!("not an assignment");
    };
    program.ast[*value].clone()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn integer_arithmetic_stays_integer(a in arb_small_int(), b in arb_small_int(), op in arb_arithmetic()) {
        let folded = fold_binary(op, &Node::Int(a), &Node::Int(b));
        prop_assert_eq!(folded, Some(Node::Int(eval(op, a as f64, b as f64) as i64)));
    }

    #[test]
    fn float_operand_gives_float(a in arb_small_int(), x in -1.0e6f64..1.0e6, op in arb_arithmetic()) {
        let folded = fold_binary(op, &Node::Int(a), &Node::Float(x));
        prop_assert_eq!(folded, Some(Node::Float(eval(op, a as f64, x))));
    }

    #[test]
    fn division_gives_float(a in arb_small_int(), b in arb_small_int()) {
        prop_assume!(b != 0);
        let folded = fold_binary(BinOp::Div, &Node::Int(a), &Node::Int(b));
        prop_assert_eq!(folded, Some(Node::Float(a as f64 / b as f64)));
    }

    #[test]
    fn relations_fold_to_zero_or_one(a in arb_small_int(), x in -10_000.0f64..10_000.0, op in arb_relational()) {
        let folded = fold_binary(op, &Node::Int(a), &Node::Float(x));
        let expected = eval(op, a as f64, x) as i64;
        prop_assert!(expected == 0 || expected == 1);
        prop_assert_eq!(folded, Some(Node::Int(expected)));
    }

    #[test]
    fn nested_expressions_fold_completely(a in 0i64..1000, b in 0i64..1000, c in 1i64..100) {
        let folded = fold_source(&format!("{} + {} * {} - {}", a, b, c, a));
        prop_assert_eq!(folded, Node::Int(a + b * c - a));

        let folded = fold_source(&format!("({} + {}) / {}", a, b, c));
        prop_assert_eq!(folded, Node::Float((a + b) as f64 / c as f64));
    }

    #[test]
    fn negation_folds(a in arb_small_int()) {
        prop_assert_eq!(fold_source(&format!("-{}", a.abs())), Node::Int(-a.abs()));
        prop_assert_eq!(fold_source(&format!("!{}", a)), Node::Int((a == 0) as i64));
    }
}
