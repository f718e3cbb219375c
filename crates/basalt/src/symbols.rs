//! The symbol table: variables, temporaries, labels, arrays, and DEF FN
//! functions, each identified by a dense integer [`SymbolId`].
//!
//! A BASIC variable's identity is its bare name *plus* its data type, so `A%`
//! and `A!` coexist as distinct entries. Lookup resolves the type first (sigil
//! or default-type table) and then searches the declaration scopes innermost
//! first; DEF FN parameters live in a child scope and are invisible outside
//! their function, while temporaries always go to the flat global pool.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::datatype::{DataType, DefaultTypes, TypeSuffix, Value};

/// Index of an entry in the symbol table.
///
/// Ids are dense and stable for the lifetime of a compilation. The reserved
/// [`SymbolId::NULL`] marks an absent instruction operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SymbolId(u32);

impl SymbolId {
    /// The reserved "no operand" id.
    pub const NULL: Self = Self(u32::MAX);

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    #[must_use]
    pub fn is_null(self) -> bool {
        self == Self::NULL
    }
}

impl Default for SymbolId {
    fn default() -> Self {
        Self::NULL
    }
}

/// A variable's logical identity: normalised bare name plus data type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariableName {
    name: String,
    data_type: DataType,
}

impl VariableName {
    /// Creates an identity, normalising the name to upper case (BASIC names
    /// are case-insensitive).
    #[must_use]
    pub fn new(name: impl AsRef<str>, data_type: DataType) -> Self {
        Self {
            name: name.as_ref().to_ascii_uppercase(),
            data_type,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

/// Array shape recorded at DIM time.
///
/// Dimension extents are runtime values (DIM takes expressions), so only the
/// rank is tracked here; the element type is the variable's own data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayDescriptor {
    pub rank: usize,
}

/// What a label is keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelKind {
    /// A BASIC line number (explicit or synthetic).
    LineNumber(u32),
    /// A named source label.
    Named(String),
    /// An anonymous branch target allocated during lowering.
    Synthetic,
}

/// One entry in the symbol table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SymbolEntry {
    /// A scalar or (after DIM) array variable.
    Variable {
        name: VariableName,
        array: Option<ArrayDescriptor>,
    },
    /// An l-value alias over one element of an array variable; the index
    /// vector is built at runtime by RESET_ARRAY_IDX/SET_ARRAY_IDX.
    ArrayRef { variable: SymbolId },
    /// A DEF FN function. The name's data type is the return type.
    Udf {
        name: VariableName,
        params: Vec<SymbolId>,
        /// Temporary holding the return value.
        result: SymbolId,
        /// Label at the start of the function body.
        entry_label: SymbolId,
    },
    /// A compiler temporary, optionally preinitialised with a literal.
    Tmp {
        data_type: DataType,
        init: Option<Value>,
    },
    Label(LabelKind),
}

/// One declaration scope: the global scope or the parameter scope of the UDF
/// currently being compiled.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Scope {
    udf: Option<SymbolId>,
    names: AHashMap<VariableName, SymbolId>,
}

/// The symbol table for one compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolTable {
    entries: Vec<SymbolEntry>,
    scopes: Vec<Scope>,
    linenum_labels: AHashMap<u32, SymbolId>,
    named_labels: AHashMap<String, SymbolId>,
    defaults: DefaultTypes,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            scopes: vec![Scope::default()],
            linenum_labels: AHashMap::new(),
            named_labels: AHashMap::new(),
            defaults: DefaultTypes::default(),
        }
    }

    /// Resolves a bare name plus optional sigil to a data type.
    ///
    /// A sigil dictates the type; otherwise the first letter of the name is
    /// looked up in the default-type table.
    #[must_use]
    pub fn resolve_type(&self, bare_name: &str, suffix: Option<TypeSuffix>) -> DataType {
        suffix.map_or_else(|| self.defaults.resolve(bare_name), TypeSuffix::data_type)
    }

    /// Implements DEFINT/DEFLNG/DEFSNG/DEFDBL/DEFSTR over one letter range.
    pub fn set_default_range(&mut self, from: char, to: char, data_type: DataType) {
        self.defaults.set_range(from, to, data_type);
    }

    /// Finds a variable or UDF by identity, searching scopes innermost first.
    #[must_use]
    pub fn lookup(&self, name: &VariableName) -> Option<SymbolId> {
        self.scopes.iter().rev().find_map(|scope| scope.names.get(name).copied())
    }

    /// Idempotent get-or-create: returns the visible entry for `name`, or
    /// runs `factory` and registers the result in the current scope.
    pub fn get_or_insert_with(
        &mut self,
        name: &VariableName,
        factory: impl FnOnce(&VariableName) -> SymbolEntry,
    ) -> SymbolId {
        if let Some(id) = self.lookup(name) {
            return id;
        }
        let id = self.push(factory(name));
        self.current_scope_mut().names.insert(name.clone(), id);
        id
    }

    /// Registers a scalar variable, or returns the existing one.
    pub fn define_variable(&mut self, name: &VariableName) -> SymbolId {
        self.get_or_insert_with(name, |n| SymbolEntry::Variable {
            name: n.clone(),
            array: None,
        })
    }

    /// Declares a scalar in the innermost scope, shadowing any outer binding;
    /// used for DEF FN parameters. Returns `None` when the scope already
    /// declares the name.
    pub fn declare_scoped(&mut self, name: &VariableName) -> Option<SymbolId> {
        if self.current_scope_mut().names.contains_key(name) {
            return None;
        }
        let id = self.push(SymbolEntry::Variable {
            name: name.clone(),
            array: None,
        });
        self.current_scope_mut().names.insert(name.clone(), id);
        Some(id)
    }

    /// Allocates a fresh temporary of the given type.
    pub fn add_tmp(&mut self, data_type: DataType, init: Option<Value>) -> SymbolId {
        self.push(SymbolEntry::Tmp { data_type, init })
    }

    /// Allocates a temporary whose type copies the referent's.
    ///
    /// Returns `None` when the referent carries no data type (a label).
    pub fn add_tmp_like(&mut self, id: SymbolId) -> Option<SymbolId> {
        let data_type = self.data_type_of(id)?;
        Some(self.add_tmp(data_type, None))
    }

    /// Allocates an array-element alias bound to an array variable.
    pub fn add_array_ref(&mut self, variable: SymbolId) -> SymbolId {
        self.push(SymbolEntry::ArrayRef { variable })
    }

    /// Interns the label for a BASIC line number.
    pub fn linenum_label(&mut self, line: u32) -> SymbolId {
        if let Some(&id) = self.linenum_labels.get(&line) {
            return id;
        }
        let id = self.push(SymbolEntry::Label(LabelKind::LineNumber(line)));
        self.linenum_labels.insert(line, id);
        id
    }

    /// Interns a named label (case-insensitive).
    pub fn named_label(&mut self, name: &str) -> SymbolId {
        let key = name.to_ascii_uppercase();
        if let Some(&id) = self.named_labels.get(&key) {
            return id;
        }
        let id = self.push(SymbolEntry::Label(LabelKind::Named(key.clone())));
        self.named_labels.insert(key, id);
        id
    }

    /// Allocates a fresh anonymous branch target.
    pub fn add_goto_target(&mut self) -> SymbolId {
        self.push(SymbolEntry::Label(LabelKind::Synthetic))
    }

    /// Opens the parameter scope of a UDF whose body is about to be compiled.
    pub fn push_scope(&mut self, udf: SymbolId) {
        self.scopes.push(Scope {
            udf: Some(udf),
            names: AHashMap::new(),
        });
    }

    /// Closes the innermost scope. The global scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// The UDF whose body is currently being compiled, if any.
    #[must_use]
    pub fn current_udf(&self) -> Option<SymbolId> {
        self.scopes.last().and_then(|scope| scope.udf)
    }

    /// Looks up an entry by id.
    ///
    /// # Panics
    ///
    /// Panics when `id` is null or out of range; ids are only produced by
    /// this table, so that indicates a compiler bug.
    #[must_use]
    pub fn get(&self, id: SymbolId) -> &SymbolEntry {
        self.entries.get(id.index()).expect("invalid symbol id")
    }

    /// Mutable entry lookup; same invariants as [`SymbolTable::get`].
    pub fn get_mut(&mut self, id: SymbolId) -> &mut SymbolEntry {
        self.entries.get_mut(id.index()).expect("invalid symbol id")
    }

    /// The data type an operand id carries, or `None` for labels.
    ///
    /// Array refs report their referent's element type; UDFs report their
    /// return type.
    #[must_use]
    pub fn data_type_of(&self, id: SymbolId) -> Option<DataType> {
        match self.get(id) {
            SymbolEntry::Variable { name, .. } | SymbolEntry::Udf { name, .. } => Some(name.data_type()),
            SymbolEntry::ArrayRef { variable } => self.data_type_of(*variable),
            SymbolEntry::Tmp { data_type, .. } => Some(*data_type),
            SymbolEntry::Label(_) => None,
        }
    }

    /// All entries in id order; the interpreter indexes this by [`SymbolId`].
    #[must_use]
    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn current_scope_mut(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("scope stack is never empty")
    }

    fn push(&mut self, entry: SymbolEntry) -> SymbolId {
        let id = u32::try_from(self.entries.len()).expect("symbol table exceeds u32 range");
        self.entries.push(entry);
        SymbolId(id)
    }
}
