use crate::parser::{Ast, Node, NodeId};

/// True if the subtree assigns `name` anywhere, function bodies excluded.
pub fn writes(ast: &Ast, id: NodeId, name: &str) -> bool {
    match &ast[id] {
        Node::Assign { target, .. } if target == name => true,
        Node::Function { .. } => false,
        _ => ast.children(id).into_iter().any(|c| writes(ast, c, name)),
    }
}

/// Replaces every read of `name` in an expression by a copy of `literal`.
pub fn replace_reads(ast: &mut Ast, id: NodeId, name: &str, literal: &Node) -> usize {
    match &ast[id] {
        Node::Var(var) if var != name => 0,
        Node::Var(_) => {
            ast.replace(id, literal.clone());
            1
        }
        Node::Function { .. } => 0,
        _ => ast
            .children(id)
            .into_iter()
            .map(|c| replace_reads(ast, c, name, literal))
            .sum(),
    }
}

/// Substitutes `literal` for reads of `name` in statement `id` that happen
/// before any write to it. Returns true once `name` may have been
/// reassigned, which ends the propagation.
pub fn propagate(
    ast: &mut Ast,
    id: NodeId,
    name: &str,
    literal: &Node,
    replaced: &mut usize,
) -> bool {
    match ast[id].clone() {
        Node::Sequence { .. } => {
            for stmt in ast.statements(id) {
                if propagate(ast, stmt, name, literal, replaced) {
                    return true;
                }
            }
            false
        }
        Node::Assign { target, value } => {
            *replaced += replace_reads(ast, value, name, literal);
            target == name
        }
        Node::If {
            cond,
            then,
            otherwise,
        } => {
            *replaced += replace_reads(ast, cond, name, literal);
            let mut written = propagate(ast, then, name, literal, replaced);
            if let Some(otherwise) = otherwise {
                written |= propagate(ast, otherwise, name, literal, replaced);
            }
            written
        }
        Node::While { cond, body } => {
            if writes(ast, body, name) {
                return true;
            }
            *replaced += replace_reads(ast, cond, name, literal);
            *replaced += replace_reads(ast, body, name, literal);
            false
        }
        Node::Function { .. } => false,
        _ => {
            *replaced += replace_reads(ast, id, name, literal);
            false
        }
    }
}
