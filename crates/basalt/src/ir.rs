//! The linear IR: an append-only sequence of three-address instructions.
//!
//! Instructions are appended in emit order and never reordered; their position
//! is the interpreter's program counter. Forward branch targets are resolved
//! by back-patching: [`Ir::emit`] returns an [`InstrRef`] whose `op1`/`op2`
//! slots may be rewritten later, while the opcode and result are immutable.
//! Before execution the interpreter builds the label-id -> pc and line-number
//! -> pc indexes with [`Ir::label_index`] / [`Ir::linenum_index`].

use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::{CompileError, CompileResult},
    op::Opcode,
    symbols::{LabelKind, SymbolEntry, SymbolId, SymbolTable},
    tree::CodeRange,
};

/// Handle to an emitted instruction, used for operand patching and for
/// reading the result id back out of a child expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrRef(usize);

impl InstrRef {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One three-address instruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub range: CodeRange,
    pub opcode: Opcode,
    pub op1: SymbolId,
    pub op2: SymbolId,
    pub result: SymbolId,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn slot(id: SymbolId) -> String {
            if id.is_null() { "_".to_string() } else { id.index().to_string() }
        }
        write!(
            f,
            "{} {}, {} -> {}",
            self.opcode,
            slot(self.op1),
            slot(self.op2),
            slot(self.result)
        )
    }
}

/// The emitted program.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ir {
    instructions: Vec<Instruction>,
}

impl Ir {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instruction and returns its handle.
    pub fn emit(&mut self, range: CodeRange, opcode: Opcode, op1: SymbolId, op2: SymbolId, result: SymbolId) -> InstrRef {
        self.instructions.push(Instruction {
            range,
            opcode,
            op1,
            op2,
            result,
        });
        InstrRef(self.instructions.len() - 1)
    }

    /// Rewrites `op1` of an already-emitted instruction (forward-reference
    /// resolution). Patches must happen before interpretation.
    pub fn patch_op1(&mut self, instr: InstrRef, id: SymbolId) {
        self.instructions[instr.0].op1 = id;
    }

    /// Rewrites `op2` of an already-emitted instruction.
    pub fn patch_op2(&mut self, instr: InstrRef, id: SymbolId) {
        self.instructions[instr.0].op2 = id;
    }

    #[must_use]
    pub fn get(&self, instr: InstrRef) -> &Instruction {
        &self.instructions[instr.0]
    }

    /// The result id of an emitted instruction; how parent expressions read
    /// the value produced by a child.
    #[must_use]
    pub fn result_of(&self, instr: InstrRef) -> SymbolId {
        self.instructions[instr.0].result
    }

    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Builds the label-id -> instruction-index map.
    ///
    /// A label id appearing as `op1` of more than one LABEL violates the
    /// uniqueness invariant and reports an internal error.
    pub fn label_index(&self) -> CompileResult<AHashMap<SymbolId, usize>> {
        let mut index = AHashMap::new();
        for (pc, instr) in self.instructions.iter().enumerate() {
            if instr.opcode == Opcode::Label && index.insert(instr.op1, pc).is_some() {
                return Err(CompileError::internal(
                    instr.range,
                    format!("label {} marked more than once", instr.op1.index()),
                ));
            }
        }
        Ok(index)
    }

    /// Builds the BASIC line-number -> instruction-index map from the LABEL
    /// instructions whose label entries are line-number keyed.
    pub fn linenum_index(&self, symbols: &SymbolTable) -> CompileResult<AHashMap<u32, usize>> {
        let mut index = AHashMap::new();
        for (pc, instr) in self.instructions.iter().enumerate() {
            if instr.opcode != Opcode::Label {
                continue;
            }
            if let SymbolEntry::Label(LabelKind::LineNumber(line)) = symbols.get(instr.op1)
                && index.insert(*line, pc).is_some()
            {
                return Err(CompileError::internal(
                    instr.range,
                    format!("line number {line} marked more than once"),
                ));
            }
        }
        Ok(index)
    }

    /// Verifies that no branch-target slot is left unpatched.
    ///
    /// Run after lowering completes; a NULL in a label slot means a forward
    /// reference was allocated but never resolved, which is a compiler bug.
    pub fn check_patched(&self) -> CompileResult<()> {
        for instr in &self.instructions {
            let (op1_is_label, op2_is_label) = instr.opcode.label_operands();
            if (op1_is_label && instr.op1.is_null()) || (op2_is_label && instr.op2.is_null()) {
                return Err(CompileError::internal(
                    instr.range,
                    format!("unpatched branch target in {}", instr.opcode),
                ));
            }
        }
        Ok(())
    }
}
