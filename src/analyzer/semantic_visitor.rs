use crate::error::{CompileError, CompileResult};
use crate::parser::{Ast, BinOp, Node, NodeId, Param, Program, UnaryOp};

use super::symbol_table::{Symbol, SymbolTable};
use super::Ty;

/// Result type of a binary operator applied to operands of the given types.
pub fn binary_type(op: BinOp, left: Ty, right: Ty) -> Ty {
    match op {
        BinOp::Div => Ty::FLOAT,
        BinOp::Concat => Ty::STRING,
        op if op.is_arithmetic() => left.arithmetic(right),
        _ => Ty::INT,
    }
}

pub fn unary_type(op: UnaryOp, operand: Ty) -> Ty {
    match op {
        UnaryOp::Negate => Ty::INT.arithmetic(operand),
        UnaryOp::Not => Ty::INT,
    }
}

/// Return type of a call; functions whose body was not analyzed yet are `any`.
pub fn call_type(callee: &Symbol) -> Ty {
    if callee.ty.is_empty() {
        Ty::ANY
    } else {
        callee.ty
    }
}

/// Type of an expression over fully populated tables.
///
/// `vars` is the table of the scope the expression lives in, `functions` the
/// global table. Unknown names yield `Ty::NONE`.
pub fn infer_type(ast: &Ast, id: NodeId, vars: &SymbolTable, functions: &SymbolTable) -> Ty {
    match &ast[id] {
        Node::Int(_) => Ty::INT,
        Node::Float(_) => Ty::FLOAT,
        Node::Str(_) => Ty::STRING,
        Node::Null => Ty::NULL,
        Node::Var(name) => vars.find(name).map(|s| s.ty).unwrap_or(Ty::NONE),
        Node::Binary { op, left, right } => binary_type(
            *op,
            infer_type(ast, *left, vars, functions),
            infer_type(ast, *right, vars, functions),
        ),
        Node::Unary { op, operand } => unary_type(*op, infer_type(ast, *operand, vars, functions)),
        Node::Call { name, .. } => functions.find(name).map(call_type).unwrap_or(Ty::NONE),
        Node::Assign { value, .. } => infer_type(ast, *value, vars, functions),
        _ => Ty::NONE,
    }
}

/// PHP's rendering of a float in a string context.
pub fn format_float(value: f64) -> String {
    let scaled = (value.abs() * 1e6 + 0.5) as i64;
    let (int_part, frac) = (scaled / 1_000_000, scaled % 1_000_000);
    let sign = if value < 0.0 && scaled != 0 { "-" } else { "" };
    if frac == 0 {
        return format!("{}{}", sign, int_part);
    }
    let digits = format!("{:06}", frac);
    format!("{}{}.{}", sign, int_part, digits.trim_end_matches('0'))
}

/// Replacement literal for `node` converted to `target`, if one applies.
pub fn coerce(node: &Node, target: Ty) -> Option<Node> {
    match (node, target) {
        (Node::Int(i), Ty::FLOAT) => Some(Node::Float(*i as f64)),
        (Node::Int(i), Ty::STRING) => Some(Node::Str(i.to_string())),
        (Node::Float(f), Ty::STRING) => Some(Node::Str(format_float(*f))),
        (Node::Null, Ty::STRING) => Some(Node::Str(String::new())),
        _ => None,
    }
}

/// Adds `ty` to the symbol's type; true if that widened it.
fn include_type(symbol: Option<&mut Symbol>, ty: Ty) -> bool {
    match symbol {
        Some(symbol) if !ty.is_subset_of(symbol.ty) => {
            symbol.ty |= ty;
            true
        }
        _ => false,
    }
}

#[derive(Debug)]
struct FunctionScope {
    name: String,
    inferred: bool,
}

#[derive(Debug)]
struct FunctionContext {
    name: String,
    declared: Option<Ty>,
    returned: bool,
}

pub struct SemanticVisitor {
    symbol_table: SymbolTable,
    current_function: Option<FunctionContext>,
}

impl SemanticVisitor {
    pub fn new(symbol_table: SymbolTable) -> Self {
        Self {
            symbol_table,
            current_function: None,
        }
    }

    pub fn visit_program(&mut self, program: &mut Program) -> CompileResult<SymbolTable> {
        self.hoist_functions(&program.ast, program.root)?;
        self.visit_stmt(&mut program.ast, program.root)?;
        while self.settle_types(&program.ast, program.root, None) {}
        Ok(std::mem::take(&mut self.symbol_table))
    }

    /// Widens every assigned variable and every inferred return type by the
    /// type of its values under the current tables. Returns whether anything
    /// changed; repeated until it does not, every stored value fits the type
    /// its readers are compiled against.
    fn settle_types(
        &mut self,
        ast: &Ast,
        id: NodeId,
        function: Option<&FunctionScope>,
    ) -> bool {
        match &ast[id] {
            Node::Sequence { .. } => {
                let mut changed = false;
                for stmt in ast.statements(id) {
                    changed |= self.settle_types(ast, stmt, function);
                }
                changed
            }
            Node::Assign { target, value } => {
                let ty = self.scoped_type(ast, *value, function);
                let symbol = match function {
                    Some(scope) => self
                        .symbol_table
                        .locals_mut(&scope.name)
                        .and_then(|locals| locals.find_mut(target)),
                    None => self.symbol_table.find_mut(target),
                };
                include_type(symbol, ty)
            }
            Node::If {
                then, otherwise, ..
            } => {
                let mut changed = self.settle_types(ast, *then, function);
                if let Some(otherwise) = otherwise {
                    changed |= self.settle_types(ast, *otherwise, function);
                }
                changed
            }
            Node::While { body, .. } => self.settle_types(ast, *body, function),
            Node::Function {
                name, ret, body, ..
            } => {
                let scope = FunctionScope {
                    name: name.clone(),
                    inferred: ret.is_none(),
                };
                self.settle_types(ast, *body, Some(&scope))
            }
            Node::Return { value } => match function {
                Some(scope) if scope.inferred => {
                    let ty = match value {
                        Some(value) => self.scoped_type(ast, *value, function),
                        None => Ty::NULL,
                    };
                    include_type(self.symbol_table.find_mut(&scope.name), ty)
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn scoped_type(&self, ast: &Ast, id: NodeId, function: Option<&FunctionScope>) -> Ty {
        let globals = &self.symbol_table;
        let vars = function
            .and_then(|scope| globals.locals(&scope.name))
            .unwrap_or(globals);
        infer_type(ast, id, vars, globals)
    }

    fn hoist_functions(&mut self, ast: &Ast, root: NodeId) -> CompileResult<()> {
        for stmt in ast.statements(root) {
            let Node::Function {
                name, params, ret, ..
            } = &ast[stmt]
            else {
                continue;
            };
            let arg_types = params.iter().map(|p| p.ty).collect();
            let ret = ret.unwrap_or(Ty::NONE);
            if !self
                .symbol_table
                .declare_function(name, ret, params.len() as i32, arg_types)
            {
                return Err(CompileError::undefined(format!(
                    "function {} is already declared",
                    name
                )));
            }
            if let Some(symbol) = self.symbol_table.find_mut(name) {
                symbol.defined = true;
            }
            self.declare_params(name, params)?;
        }
        Ok(())
    }

    fn declare_params(&mut self, function: &str, params: &[Param]) -> CompileResult<()> {
        for param in params {
            let taken = self
                .symbol_table
                .locals(function)
                .is_some_and(|locals| locals.find(&param.name).is_some());
            if taken {
                return Err(CompileError::undefined(format!(
                    "parameter {} of {} is declared twice",
                    param.name, function
                )));
            }
            self.symbol_table
                .declare_local(function, &param.name, param.ty)?;
        }
        Ok(())
    }

    fn find_variable(&self, name: &str) -> Option<&Symbol> {
        match &self.current_function {
            Some(ctx) => self.symbol_table.locals(&ctx.name)?.find(name),
            None => self.symbol_table.find(name),
        }
    }

    fn declare_variable(&mut self, name: &str, ty: Ty) -> CompileResult<()> {
        match &self.current_function {
            Some(ctx) => {
                let function = ctx.name.clone();
                self.symbol_table.declare_local(&function, name, ty)?;
            }
            None => {
                self.symbol_table.declare_global(name, ty);
            }
        }
        Ok(())
    }

    fn visit_stmt(&mut self, ast: &mut Ast, id: NodeId) -> CompileResult<()> {
        match ast[id].clone() {
            Node::Sequence { .. } => {
                for stmt in ast.statements(id) {
                    self.visit_stmt(ast, stmt)?;
                }
            }
            Node::Assign { target, value } => {
                let ty = self.visit_value(ast, value)?;
                self.declare_variable(&target, ty)?;
            }
            Node::If {
                cond,
                then,
                otherwise,
            } => {
                self.visit_value(ast, cond)?;
                self.visit_stmt(ast, then)?;
                if let Some(otherwise) = otherwise {
                    self.visit_stmt(ast, otherwise)?;
                }
            }
            Node::While { cond, body } => {
                self.visit_value(ast, cond)?;
                self.visit_stmt(ast, body)?;
            }
            Node::Function {
                name, ret, body, ..
            } => self.visit_function(ast, name, ret, body)?,
            Node::Return { value } => self.visit_return(ast, value)?,
            _ => {
                self.visit_expr(ast, id)?;
            }
        }
        Ok(())
    }

    fn visit_function(
        &mut self,
        ast: &mut Ast,
        name: String,
        declared: Option<Ty>,
        body: NodeId,
    ) -> CompileResult<()> {
        self.current_function = Some(FunctionContext {
            name: name.clone(),
            declared,
            returned: false,
        });
        self.visit_stmt(ast, body)?;
        let returned = self
            .current_function
            .take()
            .map(|ctx| ctx.returned)
            .unwrap_or(false);

        match declared {
            Some(ty) if !ty.is_void() && !returned => Err(CompileError::ret(format!(
                "function {} must return a value of type {}",
                name, ty
            ))),
            None => {
                if let Some(symbol) = self.symbol_table.find_mut(&name) {
                    if symbol.ty.is_empty() {
                        symbol.ty = Ty::NULL;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn visit_return(&mut self, ast: &mut Ast, value: Option<NodeId>) -> CompileResult<()> {
        let ty = match value {
            Some(value) => Some(self.visit_value(ast, value)?),
            None => None,
        };
        let Some(ctx) = self.current_function.as_mut() else {
            return Ok(());
        };
        ctx.returned = true;

        match (ctx.declared, ty) {
            (Some(Ty::VOID), Some(_)) => Err(CompileError::ret(format!(
                "void function {} must not return a value",
                ctx.name
            ))),
            (Some(Ty::VOID), None) => Ok(()),
            (Some(declared), None) => Err(CompileError::ret(format!(
                "function {} must return a value of type {}",
                ctx.name, declared
            ))),
            (Some(declared), Some(ty)) if !ty.intersects(declared) => {
                Err(CompileError::ret(format!(
                    "function {} returns {} but is declared {}",
                    ctx.name, ty, declared
                )))
            }
            (Some(_), Some(_)) => Ok(()),
            (None, ty) => {
                let name = ctx.name.clone();
                if let Some(symbol) = self.symbol_table.find_mut(&name) {
                    symbol.ty |= ty.unwrap_or(Ty::NULL);
                }
                Ok(())
            }
        }
    }

    /// Like `visit_expr`, for expressions whose value is used.
    fn visit_value(&mut self, ast: &mut Ast, id: NodeId) -> CompileResult<Ty> {
        let ty = self.visit_expr(ast, id)?;
        if ty.is_void() {
            return Err(CompileError::other("a void function result is used as a value"));
        }
        Ok(ty)
    }

    fn visit_expr(&mut self, ast: &mut Ast, id: NodeId) -> CompileResult<Ty> {
        let ty = match ast[id].clone() {
            Node::Int(_) => Ty::INT,
            Node::Float(_) => Ty::FLOAT,
            Node::Str(_) => Ty::STRING,
            Node::Null => Ty::NULL,
            Node::Var(name) => match self.find_variable(&name) {
                Some(symbol) => symbol.ty,
                None => {
                    return Err(CompileError::undefined(format!(
                        "variable {} is used before it is assigned",
                        name
                    )))
                }
            },
            Node::Binary { op, left, right } => self.visit_binary(ast, op, left, right)?,
            Node::Unary { op, operand } => {
                let ty = self.visit_value(ast, operand)?;
                if op == UnaryOp::Negate && ty.is_string_only() {
                    return Err(CompileError::ty("cannot negate a string"));
                }
                unary_type(op, ty)
            }
            Node::Call { name, args } => self.visit_call(ast, &name, args)?,
            node => {
                return Err(CompileError::internal(format!(
                    "unexpected statement in expression position: {:?}",
                    node
                )))
            }
        };
        Ok(ty)
    }

    fn visit_binary(
        &mut self,
        ast: &mut Ast,
        op: BinOp,
        left: NodeId,
        right: NodeId,
    ) -> CompileResult<Ty> {
        let lt = self.visit_value(ast, left)?;
        let rt = self.visit_value(ast, right)?;
        let numeric = op.is_arithmetic()
            || matches!(
                op,
                BinOp::Less
                    | BinOp::LessEqual
                    | BinOp::Greater
                    | BinOp::GreaterEqual
                    | BinOp::Equal
                    | BinOp::NotEqual
            );
        if numeric && (lt.is_string_only() || rt.is_string_only()) {
            return Err(CompileError::ty(format!(
                "operator {} needs numeric operands, got {} and {}",
                op.symbol(),
                lt,
                rt
            )));
        }

        let ty = binary_type(op, lt, rt);
        let target = match op {
            BinOp::Concat => Some(Ty::STRING),
            op if op.is_arithmetic() && ty == Ty::FLOAT => Some(Ty::FLOAT),
            _ => None,
        };
        if let Some(target) = target {
            for child in [left, right] {
                if let Some(node) = coerce(&ast[child], target) {
                    ast.replace(child, node);
                }
            }
        }
        Ok(ty)
    }

    fn visit_call(&mut self, ast: &mut Ast, name: &str, args: Option<NodeId>) -> CompileResult<Ty> {
        let values = ast.arguments(args);
        let mut arg_types = Vec::with_capacity(values.len());
        for value in values {
            arg_types.push(self.visit_value(ast, value)?);
        }

        let callee = match self.symbol_table.find(name) {
            Some(symbol) if symbol.is_function => symbol,
            _ => {
                return Err(CompileError::undefined(format!(
                    "call to undefined function {}",
                    name
                )))
            }
        };

        if !callee.is_variadic() {
            if callee.arity as usize != arg_types.len() {
                return Err(CompileError::argument(format!(
                    "{} expects {} argument(s), got {}",
                    name,
                    callee.arity,
                    arg_types.len()
                )));
            }
            for (i, (ty, expected)) in arg_types.iter().zip(&callee.param_types).enumerate() {
                if !ty.intersects(*expected) {
                    return Err(CompileError::argument(format!(
                        "argument {} of {} is {}, expected {}",
                        i + 1,
                        name,
                        ty,
                        expected
                    )));
                }
            }
        }

        let ty = call_type(callee);
        self.symbol_table.mark_called(name);
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floats_render_like_php() {
        assert_eq!(format_float(2.0), "2");
        assert_eq!(format_float(1.5), "1.5");
        assert_eq!(format_float(-0.25), "-0.25");
        assert_eq!(format_float(1.0 / 3.0), "0.333333");
    }

    #[test]
    fn coercion_only_rewrites_literals() {
        assert_eq!(coerce(&Node::Int(3), Ty::FLOAT), Some(Node::Float(3.0)));
        assert_eq!(coerce(&Node::Int(3), Ty::STRING), Some(Node::Str("3".into())));
        assert_eq!(coerce(&Node::Var("$a".into()), Ty::FLOAT), None);
        assert_eq!(coerce(&Node::Float(1.0), Ty::FLOAT), None);
    }
}
