use std::collections::HashMap;

use crate::error::{CompileError, CompileResult};

use super::Ty;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    Global,
    Local,
}

/// Arity marker for functions accepting any number of arguments.
pub const VARIADIC: i32 = -1;

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    pub defined: bool,
    pub emitted: bool,
    pub called: bool,
    pub builtin: bool,
    pub scope: Scope,
    pub is_function: bool,
    pub ty: Ty,
    pub arity: i32,
    pub param_types: Vec<Ty>,
    pub param_mask: Ty,
    pub locals: Option<Box<SymbolTable>>,
}

impl Symbol {
    fn new(name: &str, scope: Scope) -> Self {
        Self {
            name: name.to_string(),
            defined: false,
            emitted: false,
            called: false,
            builtin: false,
            scope,
            is_function: false,
            ty: Ty::NONE,
            arity: 0,
            param_types: vec![],
            param_mask: Ty::NONE,
            locals: None,
        }
    }

    pub fn is_variadic(&self) -> bool {
        self.arity == VARIADIC
    }
}

/// Name to symbol map that remembers insertion order.
#[derive(Clone, Debug)]
pub struct SymbolTable {
    scope: Scope,
    index: HashMap<String, usize>,
    symbols: Vec<Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::with_scope(Scope::Global)
    }

    fn with_scope(scope: Scope) -> Self {
        Self {
            scope,
            index: HashMap::new(),
            symbols: vec![],
        }
    }

    /// Global table seeded with the built-in functions.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        let numeric_term = Ty::INT | Ty::FLOAT | Ty::NULL;
        let builtins: [(&str, Ty, i32, Vec<Ty>); 11] = [
            ("readi", Ty::INT.nullable(), 0, vec![]),
            ("readf", Ty::FLOAT.nullable(), 0, vec![]),
            ("reads", Ty::STRING.nullable(), 0, vec![]),
            ("write", Ty::VOID, VARIADIC, vec![]),
            ("strlen", Ty::INT, 1, vec![Ty::STRING]),
            ("ord", Ty::INT, 1, vec![Ty::STRING]),
            ("chr", Ty::STRING.nullable(), 1, vec![Ty::INT]),
            (
                "substring",
                Ty::STRING.nullable(),
                3,
                vec![Ty::STRING, Ty::INT, Ty::INT],
            ),
            ("intval", Ty::INT, 1, vec![numeric_term]),
            ("floatval", Ty::FLOAT, 1, vec![numeric_term]),
            ("strval", Ty::STRING, 1, vec![numeric_term | Ty::STRING]),
        ];
        for (name, ret, arity, params) in builtins {
            table.declare_function(name, ret, arity, params);
            if let Some(symbol) = table.find_mut(name) {
                symbol.builtin = true;
                symbol.defined = true;
                if arity == VARIADIC {
                    symbol.param_mask = Ty::ANY;
                }
            }
        }
        table
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Adds an undefined symbol; false if the name is already taken.
    pub fn insert(&mut self, name: &str) -> bool {
        if self.index.contains_key(name) {
            return false;
        }
        self.index.insert(name.to_string(), self.symbols.len());
        self.symbols.push(Symbol::new(name, self.scope));
        true
    }

    pub fn find(&self, name: &str) -> Option<&Symbol> {
        self.index.get(name).map(|&i| &self.symbols[i])
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        match self.index.get(name) {
            Some(&i) => Some(&mut self.symbols[i]),
            None => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    fn declare_variable(&mut self, name: &str, ty: Ty) -> &mut Symbol {
        self.insert(name);
        let i = self.index[name];
        let symbol = &mut self.symbols[i];
        symbol.defined = true;
        symbol.ty |= ty;
        symbol
    }

    /// Declares (or widens) a variable of the global scope.
    pub fn declare_global(&mut self, name: &str, ty: Ty) -> &mut Symbol {
        self.declare_variable(name, ty)
    }

    /// Declares (or widens) a variable local to `function`.
    pub fn declare_local(
        &mut self,
        function: &str,
        name: &str,
        ty: Ty,
    ) -> CompileResult<&mut Symbol> {
        let locals = self
            .locals_mut(function)
            .ok_or_else(|| CompileError::internal(format!("no local scope for {}", function)))?;
        Ok(locals.declare_variable(name, ty))
    }

    /// Registers a function signature; false if the name is already taken.
    pub fn declare_function(
        &mut self,
        name: &str,
        return_type: Ty,
        arity: i32,
        arg_types: Vec<Ty>,
    ) -> bool {
        if !self.insert(name) {
            return false;
        }
        let i = self.index[name];
        let symbol = &mut self.symbols[i];
        symbol.is_function = true;
        symbol.ty = return_type;
        symbol.arity = arity;
        symbol.param_mask = arg_types.iter().fold(Ty::NONE, |mask, &ty| mask | ty);
        symbol.param_types = arg_types;
        true
    }

    pub fn locals(&self, function: &str) -> Option<&SymbolTable> {
        self.find(function)?.locals.as_deref()
    }

    /// The local table of `function`, created on first use.
    pub fn locals_mut(&mut self, function: &str) -> Option<&mut SymbolTable> {
        let symbol = self.find_mut(function)?;
        if !symbol.is_function {
            return None;
        }
        let locals = symbol
            .locals
            .get_or_insert_with(|| Box::new(SymbolTable::with_scope(Scope::Local)));
        Some(&mut **locals)
    }

    pub fn mark_called(&mut self, name: &str) {
        if let Some(symbol) = self.find_mut(name) {
            symbol.called = true;
        }
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
