//! Two-scope symbol table for the Jack compiler.
//!
//! The symbol table maintains two scopes:
//! - **Class scope**: `static` and `field` variables, persists across subroutines
//! - **Subroutine scope**: `argument` and `local` variables, reset per subroutine
//!
//! Lookup is subroutine-first, allowing local variables to shadow class-level
//! ones. Indices are not tracked in separate counters; the next index for a
//! kind is derived by counting the symbols of that kind already in the scope,
//! so a scope clear resets everything and a rejected declaration consumes
//! nothing.

use crate::error::CompileError;
use crate::token::Span;
use std::collections::HashMap;
use std::fmt;

/// A declared Jack type: one of the three primitives or a class name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarType {
    Int,
    Char,
    Boolean,
    Class(String),
}

impl VarType {
    /// The type name as it appears in source and in qualified call targets.
    pub fn name(&self) -> &str {
        match self {
            VarType::Int => "int",
            VarType::Char => "char",
            VarType::Boolean => "boolean",
            VarType::Class(name) => name,
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The kind of symbol, determining its scope and VM segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Class-level static variable → `static` segment
    Static,
    /// Class-level field variable → `this` segment
    Field,
    /// Subroutine argument → `argument` segment
    Argument,
    /// Subroutine local variable → `local` segment
    Local,
}

impl SymbolKind {
    /// Convert to VM segment name.
    #[inline]
    pub fn segment(self) -> &'static str {
        match self {
            SymbolKind::Static => "static",
            SymbolKind::Field => "this",
            SymbolKind::Argument => "argument",
            SymbolKind::Local => "local",
        }
    }

    /// Check if this is a class-level symbol.
    #[inline]
    pub fn is_class_level(self) -> bool {
        matches!(self, SymbolKind::Static | SymbolKind::Field)
    }
}

/// A symbol entry. The owning map's key carries the name.
#[derive(Debug, Clone)]
pub struct Symbol {
    /// The declared type (int, char, boolean, or class name).
    pub var_type: VarType,
    /// The kind of symbol (determines VM segment).
    pub kind: SymbolKind,
    /// The index within its segment.
    pub index: u16,
}

impl Symbol {
    /// Get the VM segment for this symbol.
    #[inline]
    pub fn segment(&self) -> &'static str {
        self.kind.segment()
    }
}

/// Count the symbols of one kind in a scope; the next free index.
fn kind_count(scope: &HashMap<String, Symbol>, kind: SymbolKind) -> u16 {
    scope.values().filter(|s| s.kind == kind).count() as u16
}

/// Two-scope symbol table for Jack compilation.
///
/// Within each `(scope, kind)` pair, indices are contiguous from zero and
/// follow declaration order.
#[derive(Debug, Default)]
pub struct SymbolTable {
    /// Class-level symbols (static and field).
    class_scope: HashMap<String, Symbol>,
    /// Subroutine-level symbols (argument and local).
    subroutine_scope: HashMap<String, Symbol>,
    /// Current class name.
    class_name: String,
}

impl SymbolTable {
    /// Create a new empty symbol table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The scope a kind's symbols live in.
    fn scope_of(&self, kind: SymbolKind) -> &HashMap<String, Symbol> {
        if kind.is_class_level() {
            &self.class_scope
        } else {
            &self.subroutine_scope
        }
    }

    fn scope_of_mut(&mut self, kind: SymbolKind) -> &mut HashMap<String, Symbol> {
        if kind.is_class_level() {
            &mut self.class_scope
        } else {
            &mut self.subroutine_scope
        }
    }

    /// Start compiling a new class.
    ///
    /// Empties both scopes; a class clear implies an empty subroutine scope.
    pub fn start_class(&mut self, name: &str) {
        self.class_scope.clear();
        self.subroutine_scope.clear();
        self.class_name = name.to_string();
    }

    /// Start compiling a new subroutine.
    ///
    /// Empties the subroutine scope; class-level symbols remain accessible.
    pub fn start_subroutine(&mut self) {
        self.subroutine_scope.clear();
    }

    /// Define a new symbol in the scope its kind belongs to, assigning the
    /// next free index within `(scope, kind)`.
    ///
    /// Returns an error if the name is already defined in that scope.
    pub fn define(
        &mut self,
        name: &str,
        var_type: VarType,
        kind: SymbolKind,
        span: Span,
    ) -> Result<(), CompileError> {
        let scope = self.scope_of_mut(kind);
        if scope.contains_key(name) {
            return Err(CompileError::duplicate_definition(name, span));
        }

        let index = kind_count(scope, kind);
        scope.insert(
            name.to_string(),
            Symbol {
                var_type,
                kind,
                index,
            },
        );
        Ok(())
    }

    /// Look up a symbol by name.
    ///
    /// Searches subroutine scope first, then class scope (allowing shadowing).
    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.subroutine_scope
            .get(name)
            .or_else(|| self.class_scope.get(name))
    }

    /// Get the count of symbols of a given kind.
    pub fn var_count(&self, kind: SymbolKind) -> u16 {
        kind_count(self.scope_of(kind), kind)
    }

    /// Get the number of field variables (needed for Memory.alloc in constructors).
    #[inline]
    pub fn field_count(&self) -> u16 {
        self.var_count(SymbolKind::Field)
    }

    /// Get the current class name.
    #[inline]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_span() -> Span {
        Span::new(0, 1, 1, 1)
    }

    /// Shorthand: define and unwrap.
    fn def(table: &mut SymbolTable, name: &str, var_type: VarType, kind: SymbolKind) {
        table.define(name, var_type, kind, dummy_span()).unwrap();
    }

    fn index_of(table: &SymbolTable, name: &str) -> u16 {
        table.lookup(name).unwrap().index
    }

    #[test]
    fn test_empty_table() {
        let table = SymbolTable::new();
        for kind in [
            SymbolKind::Static,
            SymbolKind::Field,
            SymbolKind::Argument,
            SymbolKind::Local,
        ] {
            assert_eq!(table.var_count(kind), 0);
        }
        assert!(table.lookup("anything").is_none());
        assert_eq!(table.class_name(), "");
    }

    #[test]
    fn test_indices_follow_declaration_order() {
        let mut table = SymbolTable::new();
        table.start_class("Game");
        assert_eq!(table.class_name(), "Game");

        def(&mut table, "board", VarType::Class("Array".into()), SymbolKind::Field);
        def(&mut table, "score", VarType::Int, SymbolKind::Field);
        def(&mut table, "done", VarType::Boolean, SymbolKind::Field);

        assert_eq!(index_of(&table, "board"), 0);
        assert_eq!(index_of(&table, "score"), 1);
        assert_eq!(index_of(&table, "done"), 2);
        assert_eq!(table.field_count(), 3);
    }

    #[test]
    fn test_each_kind_has_its_own_index_space() {
        let mut table = SymbolTable::new();
        table.start_class("Mix");
        table.start_subroutine();

        // Interleave all four kinds; each sequence must count from zero.
        def(&mut table, "s0", VarType::Int, SymbolKind::Static);
        def(&mut table, "f0", VarType::Int, SymbolKind::Field);
        def(&mut table, "a0", VarType::Int, SymbolKind::Argument);
        def(&mut table, "s1", VarType::Int, SymbolKind::Static);
        def(&mut table, "l0", VarType::Int, SymbolKind::Local);
        def(&mut table, "f1", VarType::Int, SymbolKind::Field);
        def(&mut table, "l1", VarType::Int, SymbolKind::Local);

        assert_eq!(index_of(&table, "s0"), 0);
        assert_eq!(index_of(&table, "s1"), 1);
        assert_eq!(index_of(&table, "f0"), 0);
        assert_eq!(index_of(&table, "f1"), 1);
        assert_eq!(index_of(&table, "a0"), 0);
        assert_eq!(index_of(&table, "l0"), 0);
        assert_eq!(index_of(&table, "l1"), 1);

        assert_eq!(table.var_count(SymbolKind::Static), 2);
        assert_eq!(table.var_count(SymbolKind::Field), 2);
        assert_eq!(table.var_count(SymbolKind::Argument), 1);
        assert_eq!(table.var_count(SymbolKind::Local), 2);
    }

    #[test]
    fn test_segments() {
        let mut table = SymbolTable::new();
        table.start_class("Seg");
        table.start_subroutine();

        def(&mut table, "s", VarType::Int, SymbolKind::Static);
        def(&mut table, "f", VarType::Int, SymbolKind::Field);
        def(&mut table, "a", VarType::Int, SymbolKind::Argument);
        def(&mut table, "l", VarType::Int, SymbolKind::Local);

        assert_eq!(table.lookup("s").unwrap().segment(), "static");
        assert_eq!(table.lookup("f").unwrap().segment(), "this");
        assert_eq!(table.lookup("a").unwrap().segment(), "argument");
        assert_eq!(table.lookup("l").unwrap().segment(), "local");
    }

    #[test]
    fn test_subroutine_reset_spares_class_scope() {
        let mut table = SymbolTable::new();
        table.start_class("Counter");
        def(&mut table, "total", VarType::Int, SymbolKind::Static);

        table.start_subroutine();
        def(&mut table, "n", VarType::Int, SymbolKind::Local);
        assert_eq!(table.var_count(SymbolKind::Local), 1);

        table.start_subroutine();
        assert!(table.lookup("n").is_none());
        assert_eq!(table.var_count(SymbolKind::Local), 0);
        // Class scope untouched through both resets.
        assert!(table.lookup("total").is_some());
    }

    #[test]
    fn test_class_reset_clears_both_scopes() {
        let mut table = SymbolTable::new();
        table.start_class("First");
        def(&mut table, "f", VarType::Int, SymbolKind::Field);
        table.start_subroutine();
        def(&mut table, "a", VarType::Int, SymbolKind::Argument);

        table.start_class("Second");
        assert!(table.lookup("f").is_none());
        assert!(table.lookup("a").is_none());
        assert_eq!(table.var_count(SymbolKind::Field), 0);
        assert_eq!(table.var_count(SymbolKind::Argument), 0);
        assert_eq!(table.class_name(), "Second");
    }

    #[test]
    fn test_lookup_prefers_subroutine_scope() {
        let mut table = SymbolTable::new();
        table.start_class("Shadow");
        def(&mut table, "x", VarType::Int, SymbolKind::Field);
        table.start_subroutine();
        def(&mut table, "x", VarType::Boolean, SymbolKind::Local);

        let sym = table.lookup("x").unwrap();
        assert_eq!(sym.kind, SymbolKind::Local);
        assert_eq!(sym.var_type, VarType::Boolean);

        // The field is visible again once the subroutine scope resets.
        table.start_subroutine();
        assert_eq!(table.lookup("x").unwrap().kind, SymbolKind::Field);
    }

    #[test]
    fn test_duplicate_in_scope_rejected_without_consuming_index() {
        let mut table = SymbolTable::new();
        table.start_class("Dup");
        def(&mut table, "x", VarType::Int, SymbolKind::Field);

        let result = table.define("x", VarType::Int, SymbolKind::Field, dummy_span());
        assert!(matches!(
            result,
            Err(CompileError::DuplicateDefinition { .. })
        ));

        // The failed define must not leave a gap in the index sequence.
        def(&mut table, "y", VarType::Int, SymbolKind::Field);
        assert_eq!(index_of(&table, "y"), 1);
        assert_eq!(table.field_count(), 2);
    }

    #[test]
    fn test_static_and_field_share_one_namespace() {
        let mut table = SymbolTable::new();
        table.start_class("Clash");
        def(&mut table, "x", VarType::Int, SymbolKind::Static);

        let result = table.define("x", VarType::Int, SymbolKind::Field, dummy_span());
        assert!(result.is_err());
    }

    #[test]
    fn test_declared_types_survive_lookup() {
        let mut table = SymbolTable::new();
        table.start_class("Typed");
        def(&mut table, "n", VarType::Int, SymbolKind::Static);
        def(&mut table, "c", VarType::Char, SymbolKind::Static);
        def(&mut table, "ok", VarType::Boolean, SymbolKind::Static);
        def(
            &mut table,
            "p",
            VarType::Class("Point".into()),
            SymbolKind::Field,
        );

        assert_eq!(table.lookup("n").unwrap().var_type, VarType::Int);
        assert_eq!(table.lookup("c").unwrap().var_type, VarType::Char);
        assert_eq!(table.lookup("ok").unwrap().var_type, VarType::Boolean);
        assert_eq!(
            table.lookup("p").unwrap().var_type,
            VarType::Class("Point".into())
        );
    }

    #[test]
    fn test_method_receiver_layout() {
        // `this` first, then declared parameters: argument 0, 1, 2.
        let mut table = SymbolTable::new();
        table.start_class("Rect");
        table.start_subroutine();

        def(
            &mut table,
            "this",
            VarType::Class("Rect".into()),
            SymbolKind::Argument,
        );
        def(&mut table, "w", VarType::Int, SymbolKind::Argument);
        def(&mut table, "h", VarType::Int, SymbolKind::Argument);

        assert_eq!(index_of(&table, "this"), 0);
        assert_eq!(index_of(&table, "w"), 1);
        assert_eq!(index_of(&table, "h"), 2);
    }

    #[test]
    fn test_var_type_names() {
        assert_eq!(VarType::Int.name(), "int");
        assert_eq!(VarType::Char.name(), "char");
        assert_eq!(VarType::Boolean.name(), "boolean");
        assert_eq!(VarType::Class("Point".into()).name(), "Point");
        assert_eq!(VarType::Class("Point".into()).to_string(), "Point");
    }

    #[test]
    fn test_kind_predicates() {
        assert!(SymbolKind::Static.is_class_level());
        assert!(SymbolKind::Field.is_class_level());
        assert!(!SymbolKind::Argument.is_class_level());
        assert!(!SymbolKind::Local.is_class_level());

        assert_eq!(SymbolKind::Static.segment(), "static");
        assert_eq!(SymbolKind::Field.segment(), "this");
        assert_eq!(SymbolKind::Argument.segment(), "argument");
        assert_eq!(SymbolKind::Local.segment(), "local");
    }
}
