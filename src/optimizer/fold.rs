use crate::parser::{Ast, BinOp, Node, NodeId, UnaryOp};

fn as_f64(node: &Node) -> Option<f64> {
    match node {
        Node::Int(i) => Some(*i as f64),
        Node::Float(f) => Some(*f),
        _ => None,
    }
}

fn bool_node(value: bool) -> Node {
    Node::Int(value as i64)
}

/// Numeric truth value of a literal condition; 0 is false.
pub fn truthiness(node: &Node) -> Option<bool> {
    match node {
        Node::Int(i) => Some(*i != 0),
        Node::Float(f) => Some(*f != 0.0),
        _ => None,
    }
}

/// Folded value of `left op right`, when both are numeric literals.
///
/// Division by zero and results outside the representable range are left to
/// the runtime.
pub fn fold_binary(op: BinOp, left: &Node, right: &Node) -> Option<Node> {
    if !left.is_numeric_literal() || !right.is_numeric_literal() {
        return None;
    }

    if let (Node::Int(a), Node::Int(b)) = (left, right) {
        let (a, b) = (*a, *b);
        let folded = match op {
            BinOp::Add => a.checked_add(b).map(Node::Int),
            BinOp::Sub => a.checked_sub(b).map(Node::Int),
            BinOp::Mul => a.checked_mul(b).map(Node::Int),
            BinOp::Less => Some(bool_node(a < b)),
            BinOp::LessEqual => Some(bool_node(a <= b)),
            BinOp::Greater => Some(bool_node(a > b)),
            BinOp::GreaterEqual => Some(bool_node(a >= b)),
            BinOp::Equal | BinOp::Identical => Some(bool_node(a == b)),
            BinOp::NotEqual | BinOp::NotIdentical => Some(bool_node(a != b)),
            _ => None,
        };
        if folded.is_some() || op != BinOp::Div {
            return folded;
        }
    }

    let same_type = std::mem::discriminant(left) == std::mem::discriminant(right);
    let (a, b) = (as_f64(left)?, as_f64(right)?);
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div if b == 0.0 => return None,
        BinOp::Div => a / b,
        BinOp::Less => return Some(bool_node(a < b)),
        BinOp::LessEqual => return Some(bool_node(a <= b)),
        BinOp::Greater => return Some(bool_node(a > b)),
        BinOp::GreaterEqual => return Some(bool_node(a >= b)),
        BinOp::Equal => return Some(bool_node(a == b)),
        BinOp::NotEqual => return Some(bool_node(a != b)),
        BinOp::Identical => return Some(bool_node(same_type && a == b)),
        BinOp::NotIdentical => return Some(bool_node(!same_type || a != b)),
        _ => return None,
    };
    value.is_finite().then_some(Node::Float(value))
}

pub fn fold_unary(op: UnaryOp, operand: &Node) -> Option<Node> {
    match (op, operand) {
        (UnaryOp::Negate, Node::Int(i)) => i.checked_neg().map(Node::Int),
        (UnaryOp::Negate, Node::Float(f)) => Some(Node::Float(-f)),
        (UnaryOp::Not, node) => truthiness(node).map(|t| bool_node(!t)),
        _ => None,
    }
}

/// Folds the expression rooted at `id` bottom-up; returns how many nodes were
/// replaced.
pub fn fold_constants(ast: &mut Ast, id: NodeId) -> usize {
    match ast[id].clone() {
        Node::Binary { op, left, right } => {
            let mut folded = fold_constants(ast, left) + fold_constants(ast, right);
            if let Some(node) = fold_binary(op, &ast[left], &ast[right]) {
                ast.replace(id, node);
                folded += 1;
            }
            folded
        }
        Node::Unary { op, operand } => {
            let mut folded = fold_constants(ast, operand);
            if let Some(node) = fold_unary(op, &ast[operand]) {
                ast.replace(id, node);
                folded += 1;
            }
            folded
        }
        Node::Call { args, .. } => ast
            .arguments(args)
            .into_iter()
            .map(|value| fold_constants(ast, value))
            .sum(),
        _ => 0,
    }
}
