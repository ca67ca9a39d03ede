use std::fmt::Write;
use std::ops::Index;

use crate::analyzer::Ty;

/// Handle of a node inside an [`Ast`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    Identical,
    NotIdentical,
    And,
    Or,
}

impl BinOp {
    pub fn is_arithmetic(self) -> bool {
        matches!(self, BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div)
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Less
                | BinOp::LessEqual
                | BinOp::Greater
                | BinOp::GreaterEqual
                | BinOp::Equal
                | BinOp::NotEqual
                | BinOp::Identical
                | BinOp::NotIdentical
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Concat => ".",
            BinOp::Less => "<",
            BinOp::LessEqual => "<=",
            BinOp::Greater => ">",
            BinOp::GreaterEqual => ">=",
            BinOp::Equal => "==",
            BinOp::NotEqual => "!=",
            BinOp::Identical => "===",
            BinOp::NotIdentical => "!==",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Node {
    Int(i64),
    Float(f64),
    Str(String),
    Null,
    Var(String),
    Binary {
        op: BinOp,
        left: NodeId,
        right: NodeId,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    Assign {
        target: String,
        value: NodeId,
    },
    Call {
        name: String,
        args: Option<NodeId>,
    },
    /// One link of a call's argument list, in source order.
    Argument {
        value: NodeId,
        next: Option<NodeId>,
    },
    /// `prev` holds the earlier statements, `stmt` the current one.
    Sequence {
        prev: Option<NodeId>,
        stmt: Option<NodeId>,
    },
    If {
        cond: NodeId,
        then: NodeId,
        otherwise: Option<NodeId>,
    },
    While {
        cond: NodeId,
        body: NodeId,
    },
    Function {
        name: String,
        params: Vec<Param>,
        ret: Option<Ty>,
        body: NodeId,
    },
    Return {
        value: Option<NodeId>,
    },
}

impl Node {
    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Int(_) | Node::Float(_) | Node::Str(_) | Node::Null)
    }

    pub fn is_numeric_literal(&self) -> bool {
        matches!(self, Node::Int(_) | Node::Float(_))
    }

    pub fn empty_statement() -> Node {
        Node::Sequence {
            prev: None,
            stmt: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    Sequence,
    Add,
    Sub,
    Mul,
    Div,
    Concat,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    Identical,
    NotIdentical,
    And,
    Or,
    Negate,
    Not,
    Integer,
    Float,
    String,
    Null,
    Variable,
    Assign,
    Call,
    Argument,
    If,
    While,
    Function,
    Return,
}

impl From<BinOp> for NodeType {
    fn from(op: BinOp) -> Self {
        match op {
            BinOp::Add => NodeType::Add,
            BinOp::Sub => NodeType::Sub,
            BinOp::Mul => NodeType::Mul,
            BinOp::Div => NodeType::Div,
            BinOp::Concat => NodeType::Concat,
            BinOp::Less => NodeType::Less,
            BinOp::LessEqual => NodeType::LessEqual,
            BinOp::Greater => NodeType::Greater,
            BinOp::GreaterEqual => NodeType::GreaterEqual,
            BinOp::Equal => NodeType::Equal,
            BinOp::NotEqual => NodeType::NotEqual,
            BinOp::Identical => NodeType::Identical,
            BinOp::NotIdentical => NodeType::NotIdentical,
            BinOp::And => NodeType::And,
            BinOp::Or => NodeType::Or,
        }
    }
}

/// Arena owning every node of a program.
#[derive(Clone, Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
}

impl Index<NodeId> for Ast {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl Ast {
    pub fn new() -> Self {
        Self { nodes: vec![] }
    }

    pub fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Overwrites the node at `id`, keeping every reference to it valid.
    pub fn replace(&mut self, id: NodeId, node: Node) {
        self.nodes[id.0] = node;
    }

    /// Child slots in left, middle, right order.
    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        let (left, middle, right) = match &self[id] {
            Node::Int(_) | Node::Float(_) | Node::Str(_) | Node::Null | Node::Var(_) => {
                (None, None, None)
            }
            Node::Binary { left, right, .. } => (Some(*left), None, Some(*right)),
            Node::Unary { operand, .. } => (Some(*operand), None, None),
            Node::Assign { value, .. } => (None, None, Some(*value)),
            Node::Call { args, .. } => (*args, None, None),
            Node::Argument { value, next } => (Some(*value), None, *next),
            Node::Sequence { prev, stmt } => (*prev, None, *stmt),
            Node::If {
                cond,
                then,
                otherwise,
            } => (Some(*cond), Some(*then), *otherwise),
            Node::While { cond, body } => (Some(*cond), None, Some(*body)),
            Node::Function { body, .. } => (None, None, Some(*body)),
            Node::Return { value } => (*value, None, None),
        };
        [left, middle, right].into_iter().flatten().collect()
    }

    pub fn node_type(&self, id: NodeId) -> NodeType {
        match &self[id] {
            Node::Int(_) => NodeType::Integer,
            Node::Float(_) => NodeType::Float,
            Node::Str(_) => NodeType::String,
            Node::Null => NodeType::Null,
            Node::Var(_) => NodeType::Variable,
            Node::Binary { op, .. } => NodeType::from(*op),
            Node::Unary {
                op: UnaryOp::Negate,
                ..
            } => NodeType::Negate,
            Node::Unary {
                op: UnaryOp::Not, ..
            } => NodeType::Not,
            Node::Assign { .. } => NodeType::Assign,
            Node::Call { .. } => NodeType::Call,
            Node::Argument { .. } => NodeType::Argument,
            Node::Sequence { .. } => NodeType::Sequence,
            Node::If { .. } => NodeType::If,
            Node::While { .. } => NodeType::While,
            Node::Function { .. } => NodeType::Function,
            Node::Return { .. } => NodeType::Return,
        }
    }

    /// Node types of the subtree in node, left, middle, right order.
    pub fn preorder(&self, id: NodeId) -> Vec<NodeType> {
        let mut types = vec![];
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            types.push(self.node_type(id));
            stack.extend(self.children(id).into_iter().rev());
        }
        types
    }

    /// The `Sequence` links of a statement list, first statement first.
    pub fn sequence(&self, id: NodeId) -> Vec<NodeId> {
        let mut links = vec![];
        let mut current = Some(id);
        while let Some(link) = current {
            match &self[link] {
                Node::Sequence { prev, .. } => {
                    links.push(link);
                    current = *prev;
                }
                _ => break,
            }
        }
        links.reverse();
        links
    }

    /// Statements of a statement list, first statement first.
    pub fn statements(&self, id: NodeId) -> Vec<NodeId> {
        self.sequence(id)
            .into_iter()
            .filter_map(|link| match &self[link] {
                Node::Sequence { stmt, .. } => *stmt,
                _ => None,
            })
            .collect()
    }

    /// Values of an argument chain, in source order.
    pub fn arguments(&self, args: Option<NodeId>) -> Vec<NodeId> {
        let mut values = vec![];
        let mut current = args;
        while let Some(link) = current {
            match &self[link] {
                Node::Argument { value, next } => {
                    values.push(*value);
                    current = *next;
                }
                _ => break,
            }
        }
        values
    }

    /// Structural copy of a subtree; no node is shared with the source.
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let node = match self[id].clone() {
            Node::Binary { op, left, right } => Node::Binary {
                op,
                left: self.deep_copy(left),
                right: self.deep_copy(right),
            },
            Node::Unary { op, operand } => Node::Unary {
                op,
                operand: self.deep_copy(operand),
            },
            Node::Assign { target, value } => Node::Assign {
                target,
                value: self.deep_copy(value),
            },
            Node::Call { name, args } => Node::Call {
                name,
                args: args.map(|a| self.deep_copy(a)),
            },
            Node::Argument { value, next } => Node::Argument {
                value: self.deep_copy(value),
                next: next.map(|n| self.deep_copy(n)),
            },
            Node::Sequence { prev, stmt } => Node::Sequence {
                prev: prev.map(|p| self.deep_copy(p)),
                stmt: stmt.map(|s| self.deep_copy(s)),
            },
            Node::If {
                cond,
                then,
                otherwise,
            } => Node::If {
                cond: self.deep_copy(cond),
                then: self.deep_copy(then),
                otherwise: otherwise.map(|o| self.deep_copy(o)),
            },
            Node::While { cond, body } => Node::While {
                cond: self.deep_copy(cond),
                body: self.deep_copy(body),
            },
            Node::Function {
                name,
                params,
                ret,
                body,
            } => Node::Function {
                name,
                params,
                ret,
                body: self.deep_copy(body),
            },
            Node::Return { value } => Node::Return {
                value: value.map(|v| self.deep_copy(v)),
            },
            leaf => leaf,
        };
        self.push(node)
    }

    /// Indented rendering of a subtree, one node per line.
    pub fn dump(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.dump_into(id, 0, &mut out);
        out
    }

    fn dump_into(&self, id: NodeId, depth: usize, out: &mut String) {
        let label = match &self[id] {
            Node::Int(i) => format!("Integer {}", i),
            Node::Float(f) => format!("Float {:?}", f),
            Node::Str(s) => format!("String {:?}", s),
            Node::Var(name) => format!("Variable {}", name),
            Node::Assign { target, .. } => format!("Assign {}", target),
            Node::Call { name, .. } => format!("Call {}", name),
            Node::Function {
                name, params, ret, ..
            } => {
                let params: Vec<_> = params
                    .iter()
                    .map(|p| format!("{} {}", p.ty, p.name))
                    .collect();
                match ret {
                    Some(ret) => format!("Function {}({}): {}", name, params.join(", "), ret),
                    None => format!("Function {}({})", name, params.join(", ")),
                }
            }
            _ => format!("{:?}", self.node_type(id)),
        };
        let _ = writeln!(out, "{}{}", "  ".repeat(depth), label);
        for child in self.children(id) {
            self.dump_into(child, depth + 1, out);
        }
    }
}

/// A parsed program: the node arena and its top-level statement list.
#[derive(Clone, Debug)]
pub struct Program {
    pub ast: Ast,
    pub root: NodeId,
}
