mod fold;
mod propagate;

pub use fold::*;
pub use propagate::*;

use crate::parser::{Ast, Node, NodeId, Program};

/// Tree-rewriting optimizer: constant folding, constant propagation and
/// dead-branch elimination over every statement list.
///
/// Passes repeat until the tree stops changing, so optimizing an already
/// optimized program is a no-op.
#[derive(Debug, Default)]
pub struct Optimizer {
    rewrites: usize,
}

impl Optimizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn optimize(&mut self, program: &mut Program) {
        loop {
            let before = self.rewrites;
            self.optimize_sequence(&mut program.ast, program.root);
            if self.rewrites == before {
                break;
            }
        }
    }

    fn optimize_sequence(&mut self, ast: &mut Ast, seq: NodeId) {
        let stmts = ast.statements(seq);
        for (i, &stmt) in stmts.iter().enumerate() {
            self.optimize_stmt(ast, stmt);

            let Node::Assign { target, value } = &ast[stmt] else {
                continue;
            };
            if !ast[*value].is_literal() {
                continue;
            }
            let (target, literal) = (target.clone(), ast[*value].clone());
            let mut replaced = 0;
            for &later in &stmts[i + 1..] {
                if propagate(ast, later, &target, &literal, &mut replaced) {
                    break;
                }
            }
            self.rewrites += replaced;
        }
    }

    fn optimize_stmt(&mut self, ast: &mut Ast, id: NodeId) {
        match ast[id].clone() {
            Node::Sequence { .. } => self.optimize_sequence(ast, id),
            Node::Assign { value, .. } => self.rewrites += fold_constants(ast, value),
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                self.rewrites += fold_constants(ast, cond);
                match truthiness(&ast[cond]) {
                    Some(taken) => {
                        let branch = match (taken, otherwise) {
                            (true, _) => ast[then].clone(),
                            (false, Some(otherwise)) => ast[otherwise].clone(),
                            (false, None) => Node::empty_statement(),
                        };
                        ast.replace(id, branch);
                        self.rewrites += 1;
                        self.optimize_sequence(ast, id);
                    }
                    None => {
                        self.optimize_sequence(ast, then);
                        if let Some(otherwise) = otherwise {
                            self.optimize_sequence(ast, otherwise);
                        }
                    }
                }
            }
            Node::While { cond, body } => {
                self.rewrites += fold_constants(ast, cond);
                if truthiness(&ast[cond]) == Some(false) {
                    ast.replace(id, Node::empty_statement());
                    self.rewrites += 1;
                } else {
                    self.optimize_sequence(ast, body);
                }
            }
            Node::Function { body, .. } => self.optimize_sequence(ast, body),
            Node::Return { value: Some(value) } => self.rewrites += fold_constants(ast, value),
            Node::Return { value: None } => {}
            _ => self.rewrites += fold_constants(ast, id),
        }
    }
}
