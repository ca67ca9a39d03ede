use std::collections::BTreeSet;

use crate::{
    analyzer::{format_float, infer_type, SymbolTable, Ty},
    error::{CompileError, CompileResult},
    parser::{Ast, BinOp, Node, NodeId, Param, Program, UnaryOp},
};

use super::{Frame, Operand, Routine};

/// Instructions of one frame; its `DEFVAR`s are kept apart so they can be
/// hoisted ahead of the body.
#[derive(Debug)]
struct FrameCode {
    frame: Frame,
    defvars: Vec<String>,
    body: Vec<String>,
}

impl FrameCode {
    fn new(frame: Frame) -> Self {
        Self {
            frame,
            defvars: vec![],
            body: vec![],
        }
    }
}

pub struct Codegen {
    label_index: usize,
    temp_index: usize,
    symbol_table: SymbolTable,
    function: Option<String>,
    code: FrameCode,
    functions: Vec<String>,
    routines: BTreeSet<Routine>,
}

fn push_lines(out: &mut String, lines: &[String]) {
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
}

impl Codegen {
    pub fn new(symbol_table: SymbolTable) -> Self {
        Self {
            label_index: 0,
            temp_index: 0,
            symbol_table,
            function: None,
            code: FrameCode::new(Frame::Global),
            functions: vec![],
            routines: BTreeSet::new(),
        }
    }

    pub fn generate(&mut self, program: &Program) -> CompileResult<String> {
        self.gen_stmt(&program.ast, program.root)?;
        self.emit(format!("EXIT {}", Operand::Int(0)));

        let mut out = String::from(".IFJcode22\n");
        push_lines(&mut out, &self.code.defvars);
        push_lines(&mut out, &self.code.body);
        for function in &self.functions {
            out.push_str(function);
        }
        for routine in self.used_routines() {
            out.push_str(&routine.body());
        }
        Ok(out)
    }

    /// Called built-ins and the helpers the generated code jumps to, with
    /// their dependencies.
    fn used_routines(&self) -> BTreeSet<Routine> {
        let mut used: BTreeSet<Routine> = self
            .symbol_table
            .iter()
            .filter(|s| s.builtin && s.called)
            .filter_map(|s| Routine::builtin(&s.name))
            .collect();
        used.extend(self.routines.iter().copied());

        let dependencies: Vec<Routine> = used
            .iter()
            .flat_map(|r| r.dependencies().iter().copied())
            .collect();
        used.extend(dependencies);
        used
    }

    fn emit(&mut self, line: impl Into<String>) {
        self.code.body.push(line.into());
    }

    fn new_label(&mut self) -> usize {
        self.label_index += 1;
        self.label_index
    }

    fn declare(&mut self, name: String) -> Operand {
        let operand = Operand::Var(self.code.frame, name);
        self.code.defvars.push(format!("DEFVAR {}", operand));
        operand
    }

    fn new_temp(&mut self) -> Operand {
        self.temp_index += 1;
        self.declare(format!("%t{}", self.temp_index))
    }

    fn new_shadow(&mut self) -> Operand {
        self.temp_index += 1;
        self.declare(format!("%s{}", self.temp_index))
    }

    /// The frame variable of a user variable, declared on first use.
    fn variable(&mut self, name: &str) -> CompileResult<Operand> {
        let symbol = match &self.function {
            Some(f) => self
                .symbol_table
                .locals_mut(f)
                .and_then(|locals| locals.find_mut(name)),
            None => self.symbol_table.find_mut(name),
        }
        .ok_or_else(|| CompileError::internal(format!("no symbol for variable {}", name)))?;

        let operand = Operand::var(self.code.frame, name.trim_start_matches('$'));
        if !symbol.emitted {
            symbol.emitted = true;
            self.code.defvars.push(format!("DEFVAR {}", operand));
        }
        Ok(operand)
    }

    fn type_of(&self, ast: &Ast, id: NodeId) -> Ty {
        let empty = SymbolTable::new();
        let vars = match &self.function {
            Some(f) => self.symbol_table.locals(f).unwrap_or(&empty),
            None => &self.symbol_table,
        };
        infer_type(ast, id, vars, &self.symbol_table)
    }

    fn call_routine(&mut self, routine: Routine, value: &Operand, dest: &Operand) {
        self.routines.insert(routine);
        self.emit(format!("PUSHS {}", value));
        self.emit("CREATEFRAME");
        self.emit(format!("CALL {}", routine.label()));
        self.emit(format!("MOVE {} {}", dest, Operand::retval()));
    }

    fn gen_stmt(&mut self, ast: &Ast, id: NodeId) -> CompileResult<()> {
        match &ast[id] {
            Node::Sequence { .. } => {
                for stmt in ast.statements(id) {
                    self.gen_stmt(ast, stmt)?;
                }
            }
            Node::Assign { target, value } => {
                let value = self.gen_expr(ast, *value)?;
                let target = self.variable(target)?;
                self.emit(format!("MOVE {} {}", target, value));
            }
            Node::If {
                cond,
                then,
                otherwise,
            } => self.gen_if(ast, *cond, *then, *otherwise)?,
            Node::While { cond, body } => self.gen_while(ast, *cond, *body)?,
            Node::Function {
                name, params, body, ..
            } => self.gen_function(ast, name, params, *body)?,
            Node::Return { value } => self.gen_return(ast, *value)?,
            Node::Call { name, args } => self.gen_call(ast, name, *args)?,
            _ => {
                self.gen_expr(ast, id)?;
            }
        }
        Ok(())
    }

    fn gen_if(
        &mut self,
        ast: &Ast,
        cond: NodeId,
        then: NodeId,
        otherwise: Option<NodeId>,
    ) -> CompileResult<()> {
        let n = self.new_label();
        let cond = self.gen_cond(ast, cond)?;
        self.emit(format!(
            "JUMPIFEQ %if{}_else {} {}",
            n,
            cond,
            Operand::Bool(false)
        ));
        self.gen_stmt(ast, then)?;
        self.emit(format!("JUMP %if{}_end", n));
        self.emit(format!("LABEL %if{}_else", n));
        if let Some(otherwise) = otherwise {
            self.gen_stmt(ast, otherwise)?;
        }
        self.emit(format!("LABEL %if{}_end", n));
        Ok(())
    }

    fn gen_while(&mut self, ast: &Ast, cond: NodeId, body: NodeId) -> CompileResult<()> {
        let n = self.new_label();
        self.emit(format!("LABEL %while{}_start", n));
        let cond = self.gen_cond(ast, cond)?;
        self.emit(format!(
            "JUMPIFEQ %while{}_end {} {}",
            n,
            cond,
            Operand::Bool(false)
        ));
        self.gen_stmt(ast, body)?;
        self.emit(format!("JUMP %while{}_start", n));
        self.emit(format!("LABEL %while{}_end", n));
        Ok(())
    }

    fn gen_function(
        &mut self,
        ast: &Ast,
        name: &str,
        params: &[Param],
        body: NodeId,
    ) -> CompileResult<()> {
        let outer = std::mem::replace(&mut self.code, FrameCode::new(Frame::Local));
        self.function = Some(name.to_string());

        let mut pops = vec![];
        for param in params.iter().rev() {
            let operand = self.variable(&param.name)?;
            pops.push(format!("POPS {}", operand));
        }
        self.gen_stmt(ast, body)?;

        self.function = None;
        let code = std::mem::replace(&mut self.code, outer);

        let retval = Operand::var(Frame::Local, "%retval");
        let mut out = format!(
            "LABEL {}\nPUSHFRAME\nDEFVAR {}\nMOVE {} {}\n",
            name,
            retval,
            retval,
            Operand::Nil
        );
        push_lines(&mut out, &code.defvars);
        push_lines(&mut out, &pops);
        push_lines(&mut out, &code.body);
        out.push_str("POPFRAME\nRETURN\n");
        self.functions.push(out);
        Ok(())
    }

    fn gen_return(&mut self, ast: &Ast, value: Option<NodeId>) -> CompileResult<()> {
        if self.function.is_none() {
            if let Some(value) = value {
                self.gen_expr(ast, value)?;
            }
            self.emit(format!("EXIT {}", Operand::Int(0)));
            return Ok(());
        }
        if let Some(value) = value {
            let value = self.gen_expr(ast, value)?;
            let retval = Operand::var(Frame::Local, "%retval");
            self.emit(format!("MOVE {} {}", retval, value));
        }
        self.emit("POPFRAME");
        self.emit("RETURN");
        Ok(())
    }

    /// Pushes the arguments in source order and calls `name`; the result is
    /// left in `TF@%retval`.
    fn gen_call(&mut self, ast: &Ast, name: &str, args: Option<NodeId>) -> CompileResult<()> {
        let values = ast.arguments(args);
        let count = values.len();
        for value in values {
            let value = self.gen_expr(ast, value)?;
            self.emit(format!("PUSHS {}", value));
        }
        if name == "write" {
            self.emit(format!("PUSHS {}", Operand::Int(count as i64)));
        }
        self.emit("CREATEFRAME");
        self.emit(format!("CALL {}", name));
        Ok(())
    }

    /// Evaluates an expression to an operand holding its value.
    fn gen_expr(&mut self, ast: &Ast, id: NodeId) -> CompileResult<Operand> {
        let operand = match &ast[id] {
            Node::Int(i) => Operand::Int(*i),
            Node::Float(f) => Operand::Float(*f),
            Node::Str(s) => Operand::Str(s.clone()),
            Node::Null => Operand::Nil,
            Node::Var(name) => self.variable(name)?,
            Node::Call { name, args } => {
                self.gen_call(ast, name, *args)?;
                let t = self.new_temp();
                self.emit(format!("MOVE {} {}", t, Operand::retval()));
                t
            }
            Node::Binary { op, left, right } if op.is_arithmetic() => {
                self.gen_arithmetic(ast, id, *op, *left, *right)?
            }
            Node::Binary {
                op: BinOp::Concat,
                left,
                right,
            } => {
                let a = self.gen_expr(ast, *left)?;
                let a = self.stringify(ast, *left, a);
                let b = self.gen_expr(ast, *right)?;
                let b = self.stringify(ast, *right, b);
                let t = self.new_temp();
                self.emit(format!("CONCAT {} {} {}", t, a, b));
                t
            }
            Node::Unary {
                op: UnaryOp::Negate,
                operand,
            } => {
                let ty = self.type_of(ast, *operand);
                let target = self.type_of(ast, id);
                let value = self.gen_expr(ast, *operand)?;
                self.arithmetic(BinOp::Sub, (Operand::Int(0), Ty::INT), (value, ty), target)
            }
            Node::Binary { .. } | Node::Unary { .. } => {
                let cond = self.gen_cond(ast, id)?;
                self.bool_to_int(cond)
            }
            node => {
                return Err(CompileError::internal(format!(
                    "statement {:?} in expression position",
                    node
                )))
            }
        };
        Ok(operand)
    }

    fn gen_arithmetic(
        &mut self,
        ast: &Ast,
        id: NodeId,
        op: BinOp,
        left: NodeId,
        right: NodeId,
    ) -> CompileResult<Operand> {
        let target = self.type_of(ast, id);
        let (lt, rt) = (self.type_of(ast, left), self.type_of(ast, right));
        let a = self.gen_expr(ast, left)?;
        let b = self.gen_expr(ast, right)?;
        Ok(self.arithmetic(op, (a, lt), (b, rt), target))
    }

    /// Emits `op` over two operands with their static types. An `int|float`
    /// result is decided at runtime: ints stay ints unless either operand
    /// holds a float.
    fn arithmetic(
        &mut self,
        op: BinOp,
        (a, lt): (Operand, Ty),
        (b, rt): (Operand, Ty),
        target: Ty,
    ) -> Operand {
        let opcode = match op {
            BinOp::Add => "ADD",
            BinOp::Sub => "SUB",
            BinOp::Mul => "MUL",
            _ => "DIV",
        };
        let t = self.new_temp();
        if target == Ty::INT || target == Ty::FLOAT {
            let a = self.normalize(a, lt, target);
            let b = self.normalize(b, rt, target);
            self.emit(format!("{} {} {} {}", opcode, t, a, b));
            return t;
        }

        let number = Ty::INT | Ty::FLOAT;
        let numeric = |ty: Ty| if ty.is_subset_of(number) { ty } else { number };
        let (a, lt) = (self.to_number(a, lt), numeric(lt));
        let (b, rt) = (self.to_number(b, rt), numeric(rt));
        let n = self.new_label();
        for operand in [&a, &b] {
            if operand.is_immediate() {
                continue;
            }
            let ty = self.new_temp();
            self.emit(format!("TYPE {} {}", ty, operand));
            self.emit(format!(
                "JUMPIFNEQ %arith{}_float {} {}",
                n,
                ty,
                Operand::Str("int".into())
            ));
        }
        self.emit(format!("{} {} {} {}", opcode, t, a, b));
        self.emit(format!("JUMP %arith{}_end", n));
        self.emit(format!("LABEL %arith{}_float", n));
        let a = self.normalize(a, lt, Ty::FLOAT);
        let b = self.normalize(b, rt, Ty::FLOAT);
        self.emit(format!("{} {} {} {}", opcode, t, a, b));
        self.emit(format!("LABEL %arith{}_end", n));
        t
    }

    /// Reads null as int 0 so the operand is an int or a float at runtime.
    fn to_number(&mut self, value: Operand, ty: Ty) -> Operand {
        match value {
            Operand::Nil | Operand::Bool(false) => Operand::Int(0),
            Operand::Bool(true) => Operand::Int(1),
            value if value.is_immediate() || ty.is_subset_of(Ty::INT | Ty::FLOAT) => value,
            value => {
                let shadow = self.new_shadow();
                self.call_routine(Routine::ToNumber, &value, &shadow);
                shadow
            }
        }
    }

    fn gen_numeric_operands(
        &mut self,
        ast: &Ast,
        left: NodeId,
        right: NodeId,
        target: Ty,
    ) -> CompileResult<(Operand, Operand)> {
        let (lt, rt) = (self.type_of(ast, left), self.type_of(ast, right));
        let a = self.gen_expr(ast, left)?;
        let a = self.normalize(a, lt, target);
        let b = self.gen_expr(ast, right)?;
        let b = self.normalize(b, rt, target);
        Ok((a, b))
    }

    /// Converts a numeric operand of type `ty` to `target` (int or float).
    fn normalize(&mut self, value: Operand, ty: Ty, target: Ty) -> Operand {
        let int = target == Ty::INT;
        if value.is_immediate() {
            return match value {
                Operand::Int(i) if !int => Operand::Float(i as f64),
                Operand::Float(f) if int => Operand::Int(f as i64),
                Operand::Nil | Operand::Bool(false) if int => Operand::Int(0),
                Operand::Nil | Operand::Bool(false) => Operand::Float(0.0),
                Operand::Bool(true) if int => Operand::Int(1),
                Operand::Bool(true) => Operand::Float(1.0),
                other => other,
            };
        }
        if ty == target {
            return value;
        }
        let shadow = self.new_shadow();
        if ty == Ty::INT && !int {
            self.emit(format!("INT2FLOAT {} {}", shadow, value));
        } else {
            let routine = if int { Routine::ToInt } else { Routine::ToFloat };
            self.call_routine(routine, &value, &shadow);
        }
        shadow
    }

    fn stringify(&mut self, ast: &Ast, id: NodeId, value: Operand) -> Operand {
        if value.is_immediate() {
            return match value {
                Operand::Int(i) => Operand::Str(i.to_string()),
                Operand::Float(f) => Operand::Str(format_float(f)),
                Operand::Nil => Operand::Str(String::new()),
                other => other,
            };
        }
        if self.type_of(ast, id) == Ty::STRING {
            return value;
        }
        let shadow = self.new_shadow();
        self.call_routine(Routine::ToString, &value, &shadow);
        shadow
    }

    fn bool_to_int(&mut self, cond: Operand) -> Operand {
        if let Operand::Bool(b) = cond {
            return Operand::Int(b as i64);
        }
        let n = self.new_label();
        let t = self.new_temp();
        self.emit(format!("MOVE {} {}", t, Operand::Int(0)));
        self.emit(format!(
            "JUMPIFEQ %bool{} {} {}",
            n,
            cond,
            Operand::Bool(false)
        ));
        self.emit(format!("MOVE {} {}", t, Operand::Int(1)));
        self.emit(format!("LABEL %bool{}", n));
        t
    }

    /// Evaluates an expression to a `bool` operand.
    fn gen_cond(&mut self, ast: &Ast, id: NodeId) -> CompileResult<Operand> {
        match &ast[id] {
            Node::Binary { op, left, right } if op.is_comparison() => {
                self.gen_comparison(ast, *op, *left, *right)
            }
            Node::Binary { op, left, right } if op.is_logical() => {
                self.gen_logical(ast, *op, *left, *right)
            }
            Node::Unary {
                op: UnaryOp::Not,
                operand,
            } => {
                let value = self.gen_cond(ast, *operand)?;
                if let Operand::Bool(b) = value {
                    return Ok(Operand::Bool(!b));
                }
                let t = self.new_temp();
                self.emit(format!("NOT {} {}", t, value));
                Ok(t)
            }
            _ => {
                let ty = self.type_of(ast, id);
                let value = self.gen_expr(ast, id)?;
                Ok(self.truthiness(value, ty))
            }
        }
    }

    fn truthiness(&mut self, value: Operand, ty: Ty) -> Operand {
        let immediate = match &value {
            Operand::Int(i) => Some(*i != 0),
            Operand::Float(f) => Some(*f != 0.0),
            Operand::Str(s) => Some(!s.is_empty() && s != "0"),
            Operand::Bool(b) => Some(*b),
            Operand::Nil => Some(false),
            Operand::Var(..) => None,
        };
        if let Some(b) = immediate {
            return Operand::Bool(b);
        }

        let t = self.new_temp();
        if ty == Ty::INT {
            self.emit(format!("EQ {} {} {}", t, value, Operand::Int(0)));
            self.emit(format!("NOT {} {}", t, t));
        } else {
            self.call_routine(Routine::ToBool, &value, &t);
        }
        t
    }

    fn gen_comparison(
        &mut self,
        ast: &Ast,
        op: BinOp,
        left: NodeId,
        right: NodeId,
    ) -> CompileResult<Operand> {
        if matches!(op, BinOp::Identical | BinOp::NotIdentical) {
            return self.gen_identity(ast, op, left, right);
        }

        let target = self.type_of(ast, left).widen(self.type_of(ast, right));
        let (a, b) = self.gen_numeric_operands(ast, left, right, target)?;
        let (opcode, negate) = match op {
            BinOp::Less => ("LT", false),
            BinOp::Greater => ("GT", false),
            BinOp::LessEqual => ("GT", true),
            BinOp::GreaterEqual => ("LT", true),
            BinOp::Equal => ("EQ", false),
            _ => ("EQ", true),
        };
        let t = self.new_temp();
        self.emit(format!("{} {} {} {}", opcode, t, a, b));
        if negate {
            self.emit(format!("NOT {} {}", t, t));
        }
        Ok(t)
    }

    /// `===` holds when both the runtime types and the values are equal.
    fn gen_identity(
        &mut self,
        ast: &Ast,
        op: BinOp,
        left: NodeId,
        right: NodeId,
    ) -> CompileResult<Operand> {
        let a = self.gen_expr(ast, left)?;
        let b = self.gen_expr(ast, right)?;
        let n = self.new_label();
        let (ta, tb, t) = (self.new_temp(), self.new_temp(), self.new_temp());
        self.emit(format!("TYPE {} {}", ta, a));
        self.emit(format!("TYPE {} {}", tb, b));
        self.emit(format!("MOVE {} {}", t, Operand::Bool(false)));
        self.emit(format!("JUMPIFNEQ %cmp{} {} {}", n, ta, tb));
        self.emit(format!("EQ {} {} {}", t, a, b));
        self.emit(format!("LABEL %cmp{}", n));
        if op == BinOp::NotIdentical {
            self.emit(format!("NOT {} {}", t, t));
        }
        Ok(t)
    }

    fn gen_logical(
        &mut self,
        ast: &Ast,
        op: BinOp,
        left: NodeId,
        right: NodeId,
    ) -> CompileResult<Operand> {
        let n = self.new_label();
        let (label, short_circuit) = if op == BinOp::And {
            (format!("%and{}", n), Operand::Bool(false))
        } else {
            (format!("%or{}", n), Operand::Bool(true))
        };
        let t = self.new_temp();
        let a = self.gen_cond(ast, left)?;
        self.emit(format!("MOVE {} {}", t, a));
        self.emit(format!("JUMPIFEQ {} {} {}", label, t, short_circuit));
        let b = self.gen_cond(ast, right)?;
        self.emit(format!("MOVE {} {}", t, b));
        self.emit(format!("LABEL {}", label));
        Ok(t)
    }
}
