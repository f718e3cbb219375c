//! End-to-end lowering tests: whole parse trees in, exact IR shapes out.

use basalt::{
    CompiledProgram, DataType, ErrorKind, Opcode, SymbolEntry, TypeSuffix, Value, VariableName, compile,
};
use basalt::tree::{
    BinOp, DataConst, Expr, FieldPart, FileAccessMode, FileLockMode, FileOpenMode, JumpTarget, Line, Program, Stmt,
    StmtKind, UnaryOp, VariableRef,
};
use pretty_assertions::assert_eq;

fn lower(lines: Vec<Line>) -> CompiledProgram {
    compile(&Program::new(lines)).expect("program should lower")
}

fn lower_err(lines: Vec<Line>) -> ErrorKind {
    compile(&Program::new(lines)).expect_err("program should be rejected").kind()
}

fn ops(program: &CompiledProgram) -> Vec<Opcode> {
    program.ir.instructions().iter().map(|instr| instr.opcode).collect()
}

fn stmt(kind: StmtKind) -> Stmt {
    Stmt::synthetic(kind)
}

fn let_stmt(target: VariableRef, value: Expr) -> Stmt {
    stmt(StmtKind::Let { target, value })
}

fn scalar(name: &str) -> VariableRef {
    VariableRef::scalar(name, None)
}

fn var_expr(name: &str) -> Expr {
    Expr::variable(scalar(name))
}

/// `LET A = <value>` on line 10, returning the compiled program.
fn lower_expr_program(value: Expr) -> CompiledProgram {
    lower(vec![Line::numbered(10, vec![let_stmt(scalar("A"), value)])])
}

// ==========================
// expressions and promotion

#[test]
fn integer_addition_promotes_and_assigns() {
    // LET X# = 2 + 3!
    let program = lower(vec![Line::numbered(
        10,
        vec![let_stmt(
            VariableRef::scalar("X", Some(TypeSuffix::Hash)),
            Expr::binary(BinOp::Add, Expr::number("2"), Expr::number("3!")),
        )],
    )]);
    assert_eq!(
        ops(&program),
        vec![
            Opcode::Label,
            Opcode::Value,
            Opcode::Value,
            Opcode::AddF32,
            Opcode::Copy,
            Opcode::Assign,
        ]
    );
    let instrs = program.ir.instructions();

    // the literal 2 is an Int32 temporary, 3! a Float32 one
    assert_eq!(
        program.symbols.get(instrs[1].result),
        &SymbolEntry::Tmp {
            data_type: DataType::Int32,
            init: Some(Value::Int32(2)),
        }
    );
    assert_eq!(program.symbols.data_type_of(instrs[2].result), Some(DataType::Float32));
    // the sum is Float32, widened to Float64 on its way into X#
    assert_eq!(program.symbols.data_type_of(instrs[3].result), Some(DataType::Float32));
    assert_eq!(program.symbols.data_type_of(instrs[4].result), Some(DataType::Float64));
    let x = program
        .symbols
        .lookup(&VariableName::new("X", DataType::Float64))
        .expect("X# exists");
    assert_eq!(instrs[5].op1, x);
    assert_eq!(instrs[5].op2, instrs[4].result);
}

#[test]
fn arithmetic_opcode_follows_the_join() {
    let cases = [
        (Expr::binary(BinOp::Add, Expr::number("2"), Expr::number("3")), Opcode::AddI32),
        (Expr::binary(BinOp::Add, Expr::number("2"), Expr::number("3@")), Opcode::AddI64),
        (Expr::binary(BinOp::Sub, Expr::number("2.5"), Expr::number("3")), Opcode::SubF64),
        (Expr::binary(BinOp::Mul, Expr::number("2!"), Expr::number("3")), Opcode::MulF32),
        (Expr::binary(BinOp::Exp, Expr::number("2"), Expr::number("3!")), Opcode::ExpF32),
    ];
    for (expr, expected) in cases {
        let program = lower_expr_program(expr);
        assert!(ops(&program).contains(&expected), "expected {expected}");
    }
}

#[test]
fn float_division_is_always_double() {
    let program = lower_expr_program(Expr::binary(BinOp::Div, Expr::number("1"), Expr::number("2")));
    let instr = &program.ir.instructions()[3];
    assert_eq!(instr.opcode, Opcode::FDiv);
    assert_eq!(program.symbols.data_type_of(instr.result), Some(DataType::Float64));
}

#[test]
fn integer_division_and_mod_are_int64() {
    for (op, opcode) in [(BinOp::IDiv, Opcode::IDiv), (BinOp::Mod, Opcode::Mod)] {
        let program = lower_expr_program(Expr::binary(op, Expr::number("5"), Expr::number("2")));
        let instr = &program.ir.instructions()[3];
        assert_eq!(instr.opcode, opcode);
        assert_eq!(program.symbols.data_type_of(instr.result), Some(DataType::Int64));
    }
}

#[test]
fn string_plus_is_concatenation() {
    let program = lower(vec![Line::numbered(
        10,
        vec![let_stmt(
            VariableRef::scalar("S", Some(TypeSuffix::Dollar)),
            Expr::binary(BinOp::Add, Expr::str_lit("AB"), Expr::str_lit("CD")),
        )],
    )]);
    let instr = &program.ir.instructions()[3];
    assert_eq!(instr.opcode, Opcode::Concat);
    assert_eq!(program.symbols.data_type_of(instr.result), Some(DataType::String));
}

#[test]
fn string_numeric_mixing_is_rejected() {
    let mix = Expr::binary(BinOp::Add, Expr::str_lit("AB"), Expr::number("1"));
    assert_eq!(
        lower_err(vec![Line::numbered(10, vec![let_stmt(scalar("A"), mix)])]),
        ErrorKind::DataTypeMismatch
    );
    let cmp = Expr::binary(BinOp::Lt, Expr::str_lit("AB"), Expr::number("1"));
    assert_eq!(
        lower_err(vec![Line::numbered(10, vec![let_stmt(scalar("A"), cmp)])]),
        ErrorKind::DataTypeMismatch
    );
}

#[test]
fn comparisons_produce_int64_booleans() {
    let program = lower_expr_program(Expr::binary(BinOp::Lt, Expr::number("1"), Expr::number("2.5")));
    let instr = &program.ir.instructions()[3];
    assert_eq!(instr.opcode, Opcode::LtF64);
    assert_eq!(program.symbols.data_type_of(instr.result), Some(DataType::Int64));

    let program = lower_expr_program(Expr::binary(BinOp::Eq, Expr::str_lit("A"), Expr::str_lit("B")));
    assert_eq!(program.ir.instructions()[3].opcode, Opcode::EqStr);
}

#[test]
fn unary_minus_keeps_the_operand_type() {
    let program = lower_expr_program(Expr::unary(UnaryOp::Minus, Expr::number("2")));
    let instr = &program.ir.instructions()[2];
    assert_eq!(instr.opcode, Opcode::UnaryMinus);
    assert_eq!(program.symbols.data_type_of(instr.result), Some(DataType::Int32));
}

#[test]
fn assignment_rejects_string_numeric_mix() {
    assert_eq!(
        lower_err(vec![Line::numbered(
            10,
            vec![let_stmt(VariableRef::scalar("S", Some(TypeSuffix::Dollar)), Expr::number("1"))],
        )]),
        ErrorKind::DataTypeMismatch
    );
}

#[test]
fn bad_literal_surfaces_as_bad_number() {
    assert_eq!(
        lower_err(vec![Line::numbered(10, vec![let_stmt(scalar("A"), Expr::number("&HZZ"))])]),
        ErrorKind::BadNumber
    );
}

#[test]
fn builtin_calls_check_types_and_allocate_results() {
    let program = lower_expr_program(Expr::function("SIN", vec![Expr::number("1")]));
    let instr = &program.ir.instructions()[2];
    assert_eq!(instr.opcode, Opcode::Sin);
    assert_eq!(program.symbols.data_type_of(instr.result), Some(DataType::Float64));

    // three-argument MID$ pushes the third argument through PARAM1
    let program = lower(vec![Line::numbered(
        10,
        vec![let_stmt(
            VariableRef::scalar("S", Some(TypeSuffix::Dollar)),
            Expr::function("MID$", vec![Expr::str_lit("HELLO"), Expr::number("2"), Expr::number("3")]),
        )],
    )]);
    assert_eq!(
        ops(&program),
        vec![
            Opcode::Label,
            Opcode::Value,
            Opcode::Value,
            Opcode::Value,
            Opcode::Param1,
            Opcode::Mid,
            Opcode::Assign,
        ]
    );

    let wrong_type = Expr::function("SIN", vec![Expr::str_lit("X")]);
    assert_eq!(
        lower_err(vec![Line::numbered(10, vec![let_stmt(scalar("A"), wrong_type)])]),
        ErrorKind::DataTypeMismatch
    );
    let wrong_arity = Expr::function("SIN", vec![]);
    assert_eq!(
        lower_err(vec![Line::numbered(10, vec![let_stmt(scalar("A"), wrong_arity)])]),
        ErrorKind::BadArgument
    );
    let unknown = Expr::function("FROB", vec![]);
    assert_eq!(
        lower_err(vec![Line::numbered(10, vec![let_stmt(scalar("A"), unknown)])]),
        ErrorKind::BadArgument
    );
}

#[test]
fn math_builtins_that_keep_the_argument_family() {
    // ABS, SGN, ROUND (and the truncations) answer in their argument's type;
    // a Float32 argument distinguishes this from any fixed result rule
    let cases = [
        ("ABS", Opcode::Abs),
        ("SGN", Opcode::Sgn),
        ("ROUND", Opcode::Round),
        ("FIX", Opcode::Fix),
        ("INT", Opcode::Int),
    ];
    for (name, opcode) in cases {
        let program = lower_expr_program(Expr::function(name, vec![Expr::number("2!")]));
        assert_eq!(
            ops(&program),
            vec![Opcode::Label, Opcode::Value, opcode, Opcode::Copy, Opcode::Assign],
            "{name}"
        );
        let instr = &program.ir.instructions()[2];
        assert_eq!(instr.op1, program.ir.instructions()[1].result, "{name}");
        assert!(instr.op2.is_null(), "{name}");
        assert_eq!(program.symbols.data_type_of(instr.result), Some(DataType::Float32), "{name}");
    }
}

#[test]
fn math_builtins_that_widen_to_double() {
    // the rest of the math family always answers in Float64, CEIL and FLOOR
    // included, even for integer arguments
    let cases = [
        ("SIN", Opcode::Sin),
        ("COS", Opcode::Cos),
        ("TAN", Opcode::Tan),
        ("ATN", Opcode::Atn),
        ("EXP", Opcode::Exp),
        ("LOG", Opcode::Log),
        ("SQR", Opcode::Sqr),
        ("CEIL", Opcode::Ceil),
        ("FLOOR", Opcode::Floor),
    ];
    for (name, opcode) in cases {
        let program = lower_expr_program(Expr::function(name, vec![Expr::number("2")]));
        assert_eq!(
            ops(&program),
            vec![Opcode::Label, Opcode::Value, opcode, Opcode::Assign],
            "{name}"
        );
        let instr = &program.ir.instructions()[2];
        assert_eq!(instr.op1, program.ir.instructions()[1].result, "{name}");
        assert!(instr.op2.is_null(), "{name}");
        assert_eq!(program.symbols.data_type_of(instr.result), Some(DataType::Float64), "{name}");
    }
}

#[test]
fn conversion_builtins_pin_their_result_types() {
    let cases = [
        ("CINT", Opcode::Cint, DataType::Int32),
        ("CLNG", Opcode::Clng, DataType::Int64),
        ("CSNG", Opcode::Csng, DataType::Float32),
        ("CDBL", Opcode::Cdbl, DataType::Float64),
    ];
    for (name, opcode, expected) in cases {
        let program = lower_expr_program(Expr::function(name, vec![Expr::number("2.5")]));
        let instr = &program.ir.instructions()[2];
        assert_eq!(instr.opcode, opcode, "{name}");
        assert_eq!(program.symbols.data_type_of(instr.result), Some(expected), "{name}");
    }
}

#[test]
fn string_builtins_shapes() {
    // LEN answers Int32
    let program = lower_expr_program(Expr::function("LEN", vec![Expr::str_lit("AB")]));
    assert_eq!(
        ops(&program),
        vec![Opcode::Label, Opcode::Value, Opcode::Len, Opcode::Copy, Opcode::Assign]
    );
    let len = &program.ir.instructions()[2];
    assert_eq!(program.symbols.data_type_of(len.result), Some(DataType::Int32));

    // string-producing functions answer String and assign to string targets
    for (name, opcode, arg) in [
        ("CHR$", Opcode::Chr, Expr::number("65")),
        ("UCASE$", Opcode::Ucase, Expr::str_lit("ab")),
        ("SPACE$", Opcode::Space, Expr::number("3")),
    ] {
        let program = lower(vec![Line::numbered(
            10,
            vec![let_stmt(
                VariableRef::scalar("S", Some(TypeSuffix::Dollar)),
                Expr::function(name, vec![arg]),
            )],
        )]);
        assert_eq!(
            ops(&program),
            vec![Opcode::Label, Opcode::Value, opcode, Opcode::Assign],
            "{name}"
        );
        let instr = &program.ir.instructions()[2];
        assert_eq!(program.symbols.data_type_of(instr.result), Some(DataType::String), "{name}");
    }

    // two-argument LEFT$ rides both operand slots, no PARAM pushes
    let program = lower(vec![Line::numbered(
        10,
        vec![let_stmt(
            VariableRef::scalar("S", Some(TypeSuffix::Dollar)),
            Expr::function("LEFT$", vec![Expr::str_lit("HELLO"), Expr::number("2")]),
        )],
    )]);
    assert_eq!(
        ops(&program),
        vec![Opcode::Label, Opcode::Value, Opcode::Value, Opcode::Left, Opcode::Assign]
    );
    let left = &program.ir.instructions()[3];
    assert_eq!(left.op1, program.ir.instructions()[1].result);
    assert_eq!(left.op2, program.ir.instructions()[2].result);
}

#[test]
fn misc_builtins_shapes() {
    // RND takes no arguments; both operand slots stay NULL
    let program = lower_expr_program(Expr::function("RND", vec![]));
    assert_eq!(ops(&program), vec![Opcode::Label, Opcode::Rnd, Opcode::Assign]);
    let rnd = &program.ir.instructions()[1];
    assert!(rnd.op1.is_null());
    assert!(rnd.op2.is_null());
    assert_eq!(program.symbols.data_type_of(rnd.result), Some(DataType::Float64));

    // EOF answers an Int64 boolean
    let program = lower_expr_program(Expr::function("EOF", vec![Expr::number("1")]));
    assert_eq!(
        ops(&program),
        vec![Opcode::Label, Opcode::Value, Opcode::Eof, Opcode::Copy, Opcode::Assign]
    );
    let eof = &program.ir.instructions()[2];
    assert_eq!(program.symbols.data_type_of(eof.result), Some(DataType::Int64));
}

// ==========================
// arrays

fn dim_a(dims: Vec<Expr>) -> Line {
    Line::numbered(10, vec![stmt(StmtKind::Dim { var: VariableRef::indexed("A", None, dims) })])
}

#[test]
fn dim_then_element_assignment() {
    let program = lower(vec![
        dim_a(vec![Expr::number("10")]),
        Line::numbered(
            20,
            vec![let_stmt(
                VariableRef::indexed("A", None, vec![Expr::number("2")]),
                Expr::number("5"),
            )],
        ),
    ]);
    assert_eq!(
        ops(&program),
        vec![
            // DIM A(10)
            Opcode::Label,
            Opcode::Value,
            Opcode::Param1,
            Opcode::Dim,
            // LET A(2) = 5
            Opcode::Label,
            Opcode::ResetArrayIdx,
            Opcode::Value,
            Opcode::SetArrayIdx,
            Opcode::ArrayRef,
            Opcode::Value,
            Opcode::Copy,
            Opcode::Assign,
        ]
    );
    let instrs = program.ir.instructions();
    let array = program
        .symbols
        .lookup(&VariableName::new("A", DataType::Float64))
        .expect("A exists");
    assert_eq!(instrs[3].op1, array);
    assert_eq!(instrs[5].op1, array);
    // the assignment target is the bound array ref, not the array itself
    assert_eq!(instrs[11].op1, instrs[8].result);
    assert!(matches!(program.symbols.get(instrs[8].result), SymbolEntry::ArrayRef { variable } if *variable == array));
}

#[test]
fn indexing_a_scalar_is_rejected() {
    // LET A% = 1: LET B% = A%(0)
    let program = vec![Line::numbered(
        10,
        vec![
            let_stmt(VariableRef::scalar("A", Some(TypeSuffix::Percent)), Expr::number("1")),
            let_stmt(
                VariableRef::scalar("B", Some(TypeSuffix::Percent)),
                Expr::variable(VariableRef::indexed("A", Some(TypeSuffix::Percent), vec![Expr::number("0")])),
            ),
        ],
    )];
    assert_eq!(lower_err(program), ErrorKind::ScalarVariableCannotBeIndexed);
}

#[test]
fn array_use_before_dim_is_rejected() {
    let program = vec![Line::numbered(
        10,
        vec![let_stmt(
            scalar("X"),
            Expr::variable(VariableRef::indexed("A", None, vec![Expr::number("0")])),
        )],
    )];
    assert_eq!(lower_err(program), ErrorKind::NotDefined);
}

#[test]
fn subscript_count_must_match_the_rank() {
    let program = vec![
        dim_a(vec![Expr::number("10")]),
        Line::numbered(
            20,
            vec![let_stmt(
                scalar("X"),
                Expr::variable(VariableRef::indexed("A", None, vec![Expr::number("1"), Expr::number("2")])),
            )],
        ),
    ];
    assert_eq!(lower_err(program), ErrorKind::BadArgument);
}

#[test]
fn redim_with_a_different_shape_is_rejected() {
    let program = vec![
        dim_a(vec![Expr::number("10")]),
        Line::numbered(
            20,
            vec![stmt(StmtKind::Dim {
                var: VariableRef::indexed("A", None, vec![Expr::number("2"), Expr::number("2")]),
            })],
        ),
    ];
    assert_eq!(lower_err(program), ErrorKind::BadArgument);

    let scalar_clash = vec![
        Line::numbered(10, vec![let_stmt(scalar("A"), Expr::number("1"))]),
        Line::numbered(20, vec![stmt(StmtKind::Dim { var: VariableRef::indexed("A", None, vec![Expr::number("4")]) })]),
    ];
    assert_eq!(lower_err(scalar_clash), ErrorKind::BadArgument);
}

#[test]
fn array_statistics_take_the_bare_array() {
    let program = lower(vec![
        dim_a(vec![Expr::number("10")]),
        Line::numbered(
            20,
            vec![let_stmt(scalar("M"), Expr::function("ARRAY1DMEAN", vec![var_expr("A")]))],
        ),
    ]);
    let array = program
        .symbols
        .lookup(&VariableName::new("A", DataType::Float64))
        .expect("A exists");
    let mean = program
        .ir
        .instructions()
        .iter()
        .find(|instr| instr.opcode == Opcode::Array1dMean)
        .expect("ARRAY1DMEAN emitted");
    assert_eq!(mean.op1, array);
    assert_eq!(program.symbols.data_type_of(mean.result), Some(DataType::Float64));

    let on_scalar = vec![
        Line::numbered(10, vec![let_stmt(scalar("B"), Expr::number("1"))]),
        Line::numbered(
            20,
            vec![let_stmt(scalar("M"), Expr::function("ARRAY1DMEAN", vec![var_expr("B")]))],
        ),
    ];
    assert_eq!(lower_err(on_scalar), ErrorKind::BadArgument);

    let undefined = vec![Line::numbered(
        10,
        vec![let_stmt(scalar("M"), Expr::function("ARRAY1DMEAN", vec![var_expr("Z")]))],
    )];
    assert_eq!(lower_err(undefined), ErrorKind::NotDefined);
}

// ==========================
// IF

#[test]
fn single_line_if_else_shape() {
    let program = lower(vec![Line::numbered(
        10,
        vec![stmt(StmtKind::If {
            cond: Expr::number("1"),
            then_stmts: vec![let_stmt(scalar("A"), Expr::number("1"))],
            else_stmts: vec![let_stmt(scalar("A"), Expr::number("2"))],
        })],
    )]);
    assert_eq!(
        ops(&program),
        vec![
            Opcode::Label,
            Opcode::Value,
            Opcode::GotoLabelIf,
            Opcode::GotoLabel,
            Opcode::Label, // then
            Opcode::Value,
            Opcode::Copy,
            Opcode::Assign,
            Opcode::GotoLabel,
            Opcode::Label, // after then
            Opcode::Label, // before else
            Opcode::Value,
            Opcode::Copy,
            Opcode::Assign,
            Opcode::Label, // after else
        ]
    );
    let instrs = program.ir.instructions();
    assert_eq!(instrs[2].op2, instrs[4].op1, "true branch enters the THEN block");
    assert_eq!(instrs[3].op1, instrs[10].op1, "false branch enters the ELSE block");
    assert_eq!(instrs[8].op1, instrs[14].op1, "THEN block exits past the ELSE block");
}

#[test]
fn nested_begin_blocks_pop_in_lifo_order() {
    let program = lower(vec![
        Line::numbered(10, vec![stmt(StmtKind::IfBegin { cond: Expr::number("1") })]),
        Line::numbered(20, vec![stmt(StmtKind::IfBegin { cond: Expr::number("0") })]),
        Line::numbered(30, vec![let_stmt(scalar("A"), Expr::number("1"))]),
        Line::numbered(40, vec![stmt(StmtKind::ElseBegin)]),
        Line::numbered(50, vec![let_stmt(scalar("A"), Expr::number("2"))]),
        Line::numbered(60, vec![stmt(StmtKind::EndIf)]),
        Line::numbered(70, vec![stmt(StmtKind::EndIf)]),
    ]);
    // every branch operand resolved (compile would have failed otherwise);
    // sanity-check each goto's target label exists exactly once
    let labels = program.ir.label_index().expect("labels are unique");
    for instr in program.ir.instructions() {
        if matches!(instr.opcode, Opcode::GotoLabel) {
            assert!(labels.contains_key(&instr.op1));
        }
        if matches!(instr.opcode, Opcode::GotoLabelIf) {
            assert!(labels.contains_key(&instr.op2));
        }
    }
}

#[test]
fn mismatched_block_conditionals_are_rejected() {
    assert_eq!(
        lower_err(vec![Line::numbered(10, vec![stmt(StmtKind::EndIf)])]),
        ErrorKind::MismatchedEndIf
    );
    assert_eq!(
        lower_err(vec![Line::numbered(10, vec![stmt(StmtKind::ElseBegin)])]),
        ErrorKind::MismatchedElseBegin
    );
    // unclosed IF THEN BEGIN at EOF
    assert_eq!(
        lower_err(vec![Line::numbered(10, vec![stmt(StmtKind::IfBegin { cond: Expr::number("1") })])]),
        ErrorKind::MismatchedEndIf
    );
    // double ELSE BEGIN
    assert_eq!(
        lower_err(vec![
            Line::numbered(10, vec![stmt(StmtKind::IfBegin { cond: Expr::number("1") })]),
            Line::numbered(20, vec![stmt(StmtKind::ElseBegin)]),
            Line::numbered(30, vec![stmt(StmtKind::ElseBegin)]),
        ]),
        ErrorKind::MismatchedElseBegin
    );
}

#[test]
fn deeply_nested_begin_blocks_hit_the_ceiling() {
    let lines: Vec<Line> = (0..70)
        .map(|i| Line::numbered(10 + i, vec![stmt(StmtKind::IfBegin { cond: Expr::number("1") })]))
        .collect();
    assert_eq!(lower_err(lines), ErrorKind::TooDeeplyNested);
}

// ==========================
// WHILE

#[test]
fn while_wend_shape() {
    let program = lower(vec![
        Line::numbered(
            10,
            vec![stmt(StmtKind::While {
                cond: Expr::binary(BinOp::Lt, var_expr("X"), Expr::number("3")),
            })],
        ),
        Line::numbered(20, vec![stmt(StmtKind::Wend)]),
    ]);
    assert_eq!(
        ops(&program),
        vec![
            Opcode::Label, // line 10
            Opcode::Label, // loop head
            Opcode::Variable,
            Opcode::Value,
            Opcode::LtF64,
            Opcode::Not,
            Opcode::GotoLabelIf,
            Opcode::Label, // line 20
            Opcode::GotoLabel,
            Opcode::Label, // after WEND
        ]
    );
    let instrs = program.ir.instructions();
    assert_eq!(instrs[8].op1, instrs[1].op1, "WEND jumps back to the loop head");
    assert_eq!(instrs[6].op2, instrs[9].op1, "negated condition exits past WEND");
}

#[test]
fn unbalanced_while_is_rejected() {
    assert_eq!(
        lower_err(vec![Line::numbered(
            10,
            vec![stmt(StmtKind::While { cond: Expr::number("1") })],
        )]),
        ErrorKind::WhileWithoutWend
    );
    assert_eq!(
        lower_err(vec![Line::numbered(10, vec![stmt(StmtKind::Wend)])]),
        ErrorKind::WendWithoutWhile
    );
}

// ==========================
// FOR

fn for_countdown() -> Vec<Line> {
    vec![
        Line::numbered(
            10,
            vec![stmt(StmtKind::For {
                var: scalar("I"),
                init: Expr::number("5"),
                end: Expr::number("1"),
                step: Some(Expr::unary(UnaryOp::Minus, Expr::number("1"))),
            })],
        ),
        Line::numbered(
            20,
            vec![stmt(StmtKind::Print {
                file_number: None,
                using: None,
                items: vec![var_expr("I")],
                trailing_separator: false,
            })],
        ),
        Line::numbered(30, vec![stmt(StmtKind::Next { vars: vec![] })]),
    ]
}

#[test]
fn for_with_negative_step_shape() {
    let program = lower(for_countdown());
    assert_eq!(
        ops(&program),
        vec![
            // line 10: FOR I = 5 TO 1 STEP -1
            Opcode::Label,
            Opcode::Value,      // 1
            Opcode::UnaryMinus, // -1
            Opcode::Copy,       // step temp
            Opcode::Value,      // 5
            Opcode::Copy,       // init widened to I's type
            Opcode::Assign,     // I = 5
            Opcode::Value,      // 1 (bound)
            Opcode::Copy,       // bound temp
            Opcode::GotoLabel,  // skip the increment on entry
            Opcode::Label,      // apply-step
            Opcode::AddF64,
            Opcode::Assign,
            Opcode::Label, // check
            Opcode::GeI32, // step >= 0
            Opcode::GtF64, // I > bound
            Opcode::And,
            Opcode::LtI32, // step < 0
            Opcode::LtF64, // I < bound
            Opcode::And,
            Opcode::Or,
            Opcode::GotoLabelIf, // loop exit
            // line 20: PRINT I
            Opcode::Label,
            Opcode::Variable,
            Opcode::Print,
            Opcode::Print, // newline
            Opcode::Flush,
            // line 30: NEXT
            Opcode::Label,
            Opcode::GotoLabel, // back to apply-step
            Opcode::Label,     // after NEXT
        ]
    );
    let instrs = program.ir.instructions();
    assert_eq!(instrs[9].op1, instrs[13].op1, "entry jump lands on the check");
    assert_eq!(instrs[28].op1, instrs[10].op1, "NEXT jumps to the increment");
    assert_eq!(instrs[21].op2, instrs[29].op1, "exit test jumps past NEXT");
    // loop variable drives both the init assignment and the increment
    let i = program
        .symbols
        .lookup(&VariableName::new("I", DataType::Float64))
        .expect("I exists");
    assert_eq!(instrs[6].op1, i);
    assert_eq!(instrs[11].op1, i);
    assert_eq!(instrs[12].op1, i);
}

#[test]
fn next_validates_the_loop_variable() {
    // NEXT J against FOR I
    let mismatch = vec![
        Line::numbered(
            10,
            vec![stmt(StmtKind::For {
                var: scalar("I"),
                init: Expr::number("1"),
                end: Expr::number("3"),
                step: None,
            })],
        ),
        Line::numbered(20, vec![stmt(StmtKind::Next { vars: vec![scalar("J")] })]),
    ];
    assert_eq!(lower_err(mismatch), ErrorKind::NextWithoutFor);

    assert_eq!(
        lower_err(vec![Line::numbered(10, vec![stmt(StmtKind::Next { vars: vec![] })])]),
        ErrorKind::NextWithoutFor
    );
}

#[test]
fn next_with_a_variable_list_closes_inner_loops_first() {
    let program = lower(vec![
        Line::numbered(
            10,
            vec![stmt(StmtKind::For {
                var: scalar("I"),
                init: Expr::number("1"),
                end: Expr::number("3"),
                step: None,
            })],
        ),
        Line::numbered(
            20,
            vec![stmt(StmtKind::For {
                var: scalar("J"),
                init: Expr::number("1"),
                end: Expr::number("3"),
                step: None,
            })],
        ),
        Line::numbered(30, vec![stmt(StmtKind::Next { vars: vec![scalar("J"), scalar("I")] })]),
    ]);
    // two loop exits, both patched
    let exits: Vec<_> = program
        .ir
        .instructions()
        .iter()
        .filter(|instr| instr.opcode == Opcode::GotoLabelIf)
        .collect();
    assert_eq!(exits.len(), 2);

    let unclosed = vec![Line::numbered(
        10,
        vec![stmt(StmtKind::For {
            var: scalar("I"),
            init: Expr::number("1"),
            end: Expr::number("3"),
            step: None,
        })],
    )];
    assert_eq!(lower_err(unclosed), ErrorKind::ForWithoutNext);
}

// ==========================
// GOTO / GOSUB / labels

#[test]
fn gosub_records_and_patches_the_return_point() {
    let program = lower(vec![
        Line::numbered(10, vec![stmt(StmtKind::Gosub { target: JumpTarget::LineNumber(100) })]),
        Line::numbered(20, vec![stmt(StmtKind::End)]),
        Line::numbered(100, vec![stmt(StmtKind::Return { target: None })]),
    ]);
    assert_eq!(
        ops(&program),
        vec![
            Opcode::Label,
            Opcode::PushRetLabel,
            Opcode::GotoLineNum,
            Opcode::Label, // return point
            Opcode::Label, // line 20
            Opcode::End,
            Opcode::Label, // line 100
            Opcode::Return,
        ]
    );
    let instrs = program.ir.instructions();
    assert_eq!(instrs[1].op1, instrs[3].op1, "return point follows the jump");
    assert_eq!(instrs[2].op1, instrs[6].op1, "GOSUB 100 targets line 100's label");

    let linenums = program.ir.linenum_index(&program.symbols).expect("unique lines");
    assert_eq!(linenums[&100], 6);
}

#[test]
fn goto_by_name_and_number() {
    let program = lower(vec![
        Line::numbered(10, vec![stmt(StmtKind::Goto { target: JumpTarget::LineNumber(40) })]),
        Line::numbered(20, vec![stmt(StmtKind::Label { name: "top".to_string() })]),
        Line::numbered(30, vec![stmt(StmtKind::Goto { target: JumpTarget::Label("TOP".to_string()) })]),
        Line::numbered(40, vec![stmt(StmtKind::End)]),
    ]);
    let instrs = program.ir.instructions();
    // forward GOTO 40 resolves through the line-number index
    assert_eq!(instrs[1].opcode, Opcode::GotoLineNum);
    let linenums = program.ir.linenum_index(&program.symbols).expect("unique lines");
    assert!(linenums.contains_key(&40));
    // named labels intern case-insensitively
    assert_eq!(instrs[5].opcode, Opcode::GotoLabel);
    assert_eq!(instrs[5].op1, instrs[3].op1);
}

#[test]
fn explicit_return_line_is_a_label_operand() {
    let program = lower(vec![
        Line::numbered(10, vec![stmt(StmtKind::Return { target: Some(50) })]),
        Line::numbered(50, vec![stmt(StmtKind::End)]),
    ]);
    let ret = &program.ir.instructions()[1];
    assert_eq!(ret.opcode, Opcode::Return);
    assert!(!ret.op1.is_null());
}

#[test]
fn duplicate_line_numbers_are_rejected() {
    let program = vec![
        Line::numbered(10, vec![stmt(StmtKind::End)]),
        Line::numbered(10, vec![stmt(StmtKind::End)]),
    ];
    assert_eq!(lower_err(program), ErrorKind::BadArgument);

    let labels = vec![
        Line::numbered(10, vec![stmt(StmtKind::Label { name: "A".to_string() })]),
        Line::numbered(20, vec![stmt(StmtKind::Label { name: "a".to_string() })]),
    ];
    assert_eq!(lower_err(labels), ErrorKind::BadArgument);
}

#[test]
fn unnumbered_lines_get_synthetic_numbers() {
    let program = lower(vec![
        Line::unnumbered(vec![let_stmt(scalar("A"), Expr::number("1"))]),
        Line::unnumbered(vec![let_stmt(scalar("B"), Expr::number("2"))]),
    ]);
    let linenums = program.ir.linenum_index(&program.symbols).expect("unique lines");
    assert_eq!(linenums.len(), 2);
    assert!(linenums.contains_key(&1));
    assert!(linenums.contains_key(&2));
}

// ==========================
// DEF FN

fn factorial_program() -> Vec<Line> {
    let n = || var_expr("N");
    let recursive_call = Expr::variable(VariableRef::indexed(
        "FNF",
        None,
        vec![Expr::binary(BinOp::Sub, n(), Expr::number("1"))],
    ));
    vec![
        Line::numbered(
            10,
            vec![stmt(StmtKind::DefFn {
                name: scalar("FNF"),
                params: vec![scalar("N")],
                body: Expr::if_expr(
                    Expr::binary(BinOp::Le, n(), Expr::number("1")),
                    Expr::number("1"),
                    Expr::binary(BinOp::Mul, n(), recursive_call),
                ),
            })],
        ),
        Line::numbered(
            20,
            vec![let_stmt(
                scalar("R"),
                Expr::variable(VariableRef::indexed("FNF", None, vec![Expr::number("5")])),
            )],
        ),
    ]
}

#[test]
fn recursive_udf_call_scopes_are_balanced() {
    let program = lower(factorial_program());
    let instrs = program.ir.instructions();

    let pushes: Vec<usize> = instrs
        .iter()
        .enumerate()
        .filter(|(_, i)| i.opcode == Opcode::PushRtScope)
        .map(|(pc, _)| pc)
        .collect();
    let pops = instrs.iter().filter(|i| i.opcode == Opcode::PopRtScope).count();
    // one recursive call inside the body, one outer call
    assert_eq!(pushes.len(), 2);
    assert_eq!(pops, 2);
    assert_eq!(instrs.iter().filter(|i| i.opcode == Opcode::GotoCaller).count(), 1);

    // each call site: PUSH_RT_SCOPE, one COPY per argument, GOTO_LABEL to
    // the body, the caller's return label, POP_RT_SCOPE
    for &pc in &pushes {
        assert_eq!(instrs[pc + 1].opcode, Opcode::Copy);
        assert_eq!(instrs[pc + 2].opcode, Opcode::GotoLabel);
        assert_eq!(instrs[pc + 3].opcode, Opcode::Label);
        assert_eq!(instrs[pc + 4].opcode, Opcode::PopRtScope);
        assert_eq!(instrs[pc].op2, instrs[pc + 3].op1, "return label patched into the scope push");
    }

    // the parameter N is invisible at top level, where N resolves afresh
    let global_n = program.symbols.lookup(&VariableName::new("N", DataType::Float64));
    let param_copy = &instrs[pushes[1] + 1];
    assert_ne!(Some(param_copy.result), global_n);
}

#[test]
fn udf_arity_and_assignment_rules() {
    let mut wrong_arity = factorial_program();
    wrong_arity[1] = Line::numbered(
        20,
        vec![let_stmt(
            scalar("R"),
            Expr::variable(VariableRef::indexed("FNF", None, vec![Expr::number("1"), Expr::number("2")])),
        )],
    );
    assert_eq!(lower_err(wrong_arity), ErrorKind::InsufficientUdfArgs);

    let mut assign_to_udf = factorial_program();
    assign_to_udf[1] = Line::numbered(20, vec![let_stmt(scalar("FNF"), Expr::number("1"))]);
    assert_eq!(lower_err(assign_to_udf), ErrorKind::BadAssignment);

    let mut redefine = factorial_program();
    redefine[1] = Line::numbered(
        20,
        vec![stmt(StmtKind::DefFn {
            name: scalar("FNF"),
            params: vec![scalar("X")],
            body: var_expr("X"),
        })],
    );
    assert_eq!(lower_err(redefine), ErrorKind::BadArgument);
}

#[test]
fn udf_body_type_must_match_the_declared_return() {
    let program = vec![Line::numbered(
        10,
        vec![stmt(StmtKind::DefFn {
            name: scalar("FNF"),
            params: vec![],
            body: Expr::str_lit("oops"),
        })],
    )];
    assert_eq!(lower_err(program), ErrorKind::DataTypeMismatch);
}

#[test]
fn def_fn_body_is_skipped_in_straight_line_execution() {
    let program = lower(factorial_program());
    let instrs = program.ir.instructions();
    // instruction 1 is the skip goto; its target label must sit after GOTO_CALLER
    assert_eq!(instrs[1].opcode, Opcode::GotoLabel);
    let labels = program.ir.label_index().expect("labels unique");
    let skip_target = labels[&instrs[1].op1];
    let goto_caller = instrs
        .iter()
        .position(|i| i.opcode == Opcode::GotoCaller)
        .expect("GOTO_CALLER present");
    assert!(skip_target > goto_caller);
}

// ==========================
// PRINT family

#[test]
fn print_using_reuses_one_format_id() {
    let program = lower(vec![Line::numbered(
        10,
        vec![stmt(StmtKind::Print {
            file_number: None,
            using: Some(Expr::str_lit("##.#")),
            items: vec![Expr::number("1"), Expr::number("2")],
            trailing_separator: false,
        })],
    )]);
    let using: Vec<_> = program
        .ir
        .instructions()
        .iter()
        .filter(|i| i.opcode == Opcode::PrintUsing)
        .collect();
    assert_eq!(using.len(), 2);
    assert_eq!(using[0].op1, using[1].op1);
}

#[test]
fn trailing_separator_suppresses_the_newline() {
    let with_newline = lower(vec![Line::numbered(
        10,
        vec![stmt(StmtKind::Print {
            file_number: None,
            using: None,
            items: vec![Expr::number("1")],
            trailing_separator: false,
        })],
    )]);
    assert_eq!(
        ops(&with_newline),
        vec![Opcode::Label, Opcode::Value, Opcode::Print, Opcode::Print, Opcode::Flush]
    );

    let without = lower(vec![Line::numbered(
        10,
        vec![stmt(StmtKind::Print {
            file_number: None,
            using: None,
            items: vec![Expr::number("1")],
            trailing_separator: true,
        })],
    )]);
    assert_eq!(ops(&without), vec![Opcode::Label, Opcode::Value, Opcode::Print, Opcode::Flush]);
}

#[test]
fn write_separates_items_and_always_ends_the_line() {
    let program = lower(vec![Line::numbered(
        10,
        vec![stmt(StmtKind::Write {
            file_number: None,
            items: vec![Expr::number("1"), Expr::number("2")],
        })],
    )]);
    assert_eq!(
        ops(&program),
        vec![
            Opcode::Label,
            Opcode::Value,
            Opcode::Print,
            Opcode::Print, // comma
            Opcode::Value,
            Opcode::Print,
            Opcode::Print, // newline
            Opcode::Flush,
        ]
    );
    let comma = &program.ir.instructions()[3];
    assert_eq!(
        program.symbols.get(comma.op1),
        &SymbolEntry::Tmp {
            data_type: DataType::String,
            init: Some(Value::Str(",".to_string())),
        }
    );
}

// ==========================
// file I/O

#[test]
fn open_pushes_its_clauses_through_the_param_channel() {
    let program = lower(vec![Line::numbered(
        10,
        vec![stmt(StmtKind::Open {
            filename: Expr::str_lit("data.txt"),
            file_number: Expr::number("1"),
            open_mode: FileOpenMode::Random,
            access_mode: FileAccessMode::ReadWrite,
            lock_mode: FileLockMode::Shared,
            record_len: None,
        })],
    )]);
    assert_eq!(
        ops(&program),
        vec![
            Opcode::Label,
            Opcode::Value,
            Opcode::Value,
            Opcode::Param2, // filename, file number
            Opcode::Param2, // open mode, access mode
            Opcode::Param2, // lock mode, record length (absent)
            Opcode::Open,
        ]
    );
    let instrs = program.ir.instructions();
    assert_eq!(
        program.symbols.get(instrs[4].op1),
        &SymbolEntry::Tmp {
            data_type: DataType::Int32,
            init: Some(Value::Int32(FileOpenMode::Random.code())),
        }
    );
    assert!(instrs[5].op2.is_null(), "absent record length stays NULL");
}

#[test]
fn close_with_and_without_file_numbers() {
    let program = lower(vec![Line::numbered(10, vec![stmt(StmtKind::Close { file_numbers: vec![] })])]);
    assert_eq!(ops(&program), vec![Opcode::Label, Opcode::CloseAll]);

    let program = lower(vec![Line::numbered(
        10,
        vec![stmt(StmtKind::Close {
            file_numbers: vec![Expr::number("1"), Expr::number("2")],
        })],
    )]);
    assert_eq!(
        ops(&program),
        vec![Opcode::Label, Opcode::Value, Opcode::Close, Opcode::Value, Opcode::Close]
    );
}

#[test]
fn field_counts_its_parts() {
    let program = lower(vec![Line::numbered(
        10,
        vec![stmt(StmtKind::Field {
            file_number: Expr::number("1"),
            parts: vec![
                FieldPart {
                    width: Expr::number("10"),
                    var: VariableRef::scalar("N", Some(TypeSuffix::Dollar)),
                },
                FieldPart {
                    width: Expr::number("20"),
                    var: VariableRef::scalar("ADDR", Some(TypeSuffix::Dollar)),
                },
            ],
        })],
    )]);
    let field = program
        .ir
        .instructions()
        .iter()
        .find(|i| i.opcode == Opcode::Field)
        .expect("FIELD emitted");
    assert_eq!(
        program.symbols.get(field.op2),
        &SymbolEntry::Tmp {
            data_type: DataType::Int32,
            init: Some(Value::Int32(2)),
        }
    );

    let numeric_part = vec![Line::numbered(
        10,
        vec![stmt(StmtKind::Field {
            file_number: Expr::number("1"),
            parts: vec![FieldPart {
                width: Expr::number("10"),
                var: scalar("N"),
            }],
        })],
    )];
    assert_eq!(lower_err(numeric_part), ErrorKind::DataTypeMismatch);
}

#[test]
fn record_io_takes_optional_record_numbers() {
    let program = lower(vec![
        Line::numbered(
            10,
            vec![stmt(StmtKind::GetRec {
                file_number: Expr::number("1"),
                record_number: Some(Expr::number("3")),
            })],
        ),
        Line::numbered(
            20,
            vec![stmt(StmtKind::PutRec {
                file_number: Expr::number("1"),
                record_number: None,
            })],
        ),
    ]);
    let instrs = program.ir.instructions();
    let get = instrs.iter().find(|i| i.opcode == Opcode::GetRec).expect("GET emitted");
    assert!(!get.op2.is_null());
    let put = instrs.iter().find(|i| i.opcode == Opcode::PutRec).expect("PUT emitted");
    assert!(put.op2.is_null());
}

// ==========================
// DATA / READ / INPUT

#[test]
fn data_constants_become_preinitialised_temporaries() {
    let program = lower(vec![Line::numbered(
        10,
        vec![stmt(StmtKind::Data {
            values: vec![DataConst::Number("1".to_string()), DataConst::Str("A".to_string())],
        })],
    )]);
    assert_eq!(ops(&program), vec![Opcode::Label, Opcode::Param1, Opcode::Param1, Opcode::Data]);
    let instrs = program.ir.instructions();
    assert_eq!(
        program.symbols.get(instrs[1].op1),
        &SymbolEntry::Tmp {
            data_type: DataType::Int32,
            init: Some(Value::Int32(1)),
        }
    );
    assert_eq!(
        program.symbols.get(instrs[2].op1),
        &SymbolEntry::Tmp {
            data_type: DataType::String,
            init: Some(Value::Str("A".to_string())),
        }
    );
}

#[test]
fn read_and_restore_shapes() {
    let program = lower(vec![
        Line::numbered(
            10,
            vec![stmt(StmtKind::Read {
                vars: vec![scalar("X"), VariableRef::scalar("S", Some(TypeSuffix::Dollar))],
            })],
        ),
        Line::numbered(20, vec![stmt(StmtKind::Restore)]),
    ]);
    assert_eq!(
        ops(&program),
        vec![Opcode::Label, Opcode::Read, Opcode::Read, Opcode::Label, Opcode::Restore]
    );
}

#[test]
fn input_pushes_targets_and_carries_the_prompt() {
    let program = lower(vec![Line::numbered(
        10,
        vec![stmt(StmtKind::Input {
            prompt: Some("NAME?".to_string()),
            file_number: None,
            vars: vec![VariableRef::scalar("N", Some(TypeSuffix::Dollar))],
        })],
    )]);
    assert_eq!(ops(&program), vec![Opcode::Label, Opcode::Param1, Opcode::Input]);
    let input = &program.ir.instructions()[2];
    assert_eq!(
        program.symbols.get(input.op1),
        &SymbolEntry::Tmp {
            data_type: DataType::String,
            init: Some(Value::Str("NAME?".to_string())),
        }
    );
    assert!(input.op2.is_null());

    let line_input_numeric = vec![Line::numbered(
        10,
        vec![stmt(StmtKind::LineInput {
            prompt: None,
            file_number: None,
            var: scalar("X"),
        })],
    )];
    assert_eq!(lower_err(line_input_numeric), ErrorKind::DataTypeMismatch);
}

// ==========================
// SWAP / MID$ / DEFtype

#[test]
fn swap_requires_matching_types() {
    let program = lower(vec![
        Line::numbered(10, vec![let_stmt(scalar("A"), Expr::number("1"))]),
        Line::numbered(20, vec![let_stmt(scalar("B"), Expr::number("2"))]),
        Line::numbered(30, vec![stmt(StmtKind::Swap { a: scalar("A"), b: scalar("B") })]),
    ]);
    assert!(ops(&program).contains(&Opcode::Swap));

    let mismatch = vec![
        Line::numbered(10, vec![let_stmt(scalar("A"), Expr::number("1"))]),
        Line::numbered(
            20,
            vec![let_stmt(VariableRef::scalar("S", Some(TypeSuffix::Dollar)), Expr::str_lit("x"))],
        ),
        Line::numbered(
            30,
            vec![stmt(StmtKind::Swap {
                a: scalar("A"),
                b: VariableRef::scalar("S", Some(TypeSuffix::Dollar)),
            })],
        ),
    ];
    assert_eq!(lower_err(mismatch), ErrorKind::DataTypeMismatch);
}

#[test]
fn mid_assignment_requires_a_defined_string_target() {
    let program = lower(vec![
        Line::numbered(
            10,
            vec![let_stmt(VariableRef::scalar("S", Some(TypeSuffix::Dollar)), Expr::str_lit("HELLO"))],
        ),
        Line::numbered(
            20,
            vec![stmt(StmtKind::MidAssign {
                target: VariableRef::scalar("S", Some(TypeSuffix::Dollar)),
                start: Expr::number("2"),
                length: Some(Expr::number("3")),
                value: Expr::str_lit("XY"),
            })],
        ),
    ]);
    let instrs = program.ir.instructions();
    let mid = instrs.iter().find(|i| i.opcode == Opcode::MidAssign).expect("MID$ emitted");
    assert_eq!(instrs[instrs.len() - 2].opcode, Opcode::Param2);
    let s = program
        .symbols
        .lookup(&VariableName::new("S", DataType::String))
        .expect("S$ exists");
    assert_eq!(mid.op1, s);

    let undefined = vec![Line::numbered(
        10,
        vec![stmt(StmtKind::MidAssign {
            target: VariableRef::scalar("S", Some(TypeSuffix::Dollar)),
            start: Expr::number("1"),
            length: None,
            value: Expr::str_lit("X"),
        })],
    )];
    assert_eq!(lower_err(undefined), ErrorKind::NotDefined);
}

#[test]
fn deftype_changes_unsuffixed_resolution() {
    let program = lower(vec![
        Line::numbered(
            10,
            vec![stmt(StmtKind::DefType {
                data_type: DataType::Int32,
                ranges: vec![('A', 'C')],
            })],
        ),
        Line::numbered(20, vec![let_stmt(scalar("ALPHA"), Expr::number("1"))]),
        Line::numbered(30, vec![let_stmt(scalar("X"), Expr::number("1"))]),
    ]);
    assert!(program.symbols.lookup(&VariableName::new("ALPHA", DataType::Int32)).is_some());
    assert!(program.symbols.lookup(&VariableName::new("X", DataType::Float64)).is_some());

    let backwards = vec![Line::numbered(
        10,
        vec![stmt(StmtKind::DefType {
            data_type: DataType::Int32,
            ranges: vec![('Z', 'A')],
        })],
    )];
    assert_eq!(lower_err(backwards), ErrorKind::BadArgument);
}

// ==========================
// graphics and sound

#[test]
fn graphics_get_requires_a_2d_int32_array() {
    let program = lower(vec![
        Line::numbered(
            10,
            vec![stmt(StmtKind::Dim {
                var: VariableRef::indexed(
                    "G",
                    Some(TypeSuffix::Percent),
                    vec![Expr::number("16"), Expr::number("16")],
                ),
            })],
        ),
        Line::numbered(
            20,
            vec![stmt(StmtKind::GraphicsGet {
                x1: Expr::number("0"),
                y1: Expr::number("0"),
                x2: Expr::number("15"),
                y2: Expr::number("15"),
                target: VariableRef::scalar("G", Some(TypeSuffix::Percent)),
            })],
        ),
    ]);
    let get = program
        .ir
        .instructions()
        .iter()
        .find(|i| i.opcode == Opcode::GraphicsGet)
        .expect("graphics GET emitted");
    let g = program
        .symbols
        .lookup(&VariableName::new("G", DataType::Int32))
        .expect("G% exists");
    assert_eq!(get.op1, g);

    // a 1-D array is the wrong shape
    let wrong_rank = vec![
        Line::numbered(
            10,
            vec![stmt(StmtKind::Dim {
                var: VariableRef::indexed("G", Some(TypeSuffix::Percent), vec![Expr::number("16")]),
            })],
        ),
        Line::numbered(
            20,
            vec![stmt(StmtKind::GraphicsPut {
                x: Expr::number("0"),
                y: Expr::number("0"),
                source: VariableRef::scalar("G", Some(TypeSuffix::Percent)),
            })],
        ),
    ];
    assert_eq!(lower_err(wrong_rank), ErrorKind::BadArgument);

    // an undefined array never lowers
    let undefined = vec![Line::numbered(
        10,
        vec![stmt(StmtKind::GraphicsPut {
            x: Expr::number("0"),
            y: Expr::number("0"),
            source: VariableRef::scalar("G", Some(TypeSuffix::Percent)),
        })],
    )];
    assert_eq!(lower_err(undefined), ErrorKind::NotDefined);
}

#[test]
fn screen_and_line_push_coordinates_in_pairs() {
    let program = lower(vec![
        Line::numbered(
            10,
            vec![stmt(StmtKind::Screen {
                title: Expr::str_lit("demo"),
                width: Expr::number("320"),
                height: Expr::number("200"),
                manual_repaint: true,
            })],
        ),
        Line::numbered(
            20,
            vec![stmt(StmtKind::DrawLine {
                x1: Expr::number("0"),
                y1: Expr::number("0"),
                x2: Expr::number("100"),
                y2: Expr::number("100"),
            })],
        ),
    ]);
    let opcodes = ops(&program);
    assert_eq!(
        opcodes,
        vec![
            Opcode::Label,
            Opcode::Value, // title
            Opcode::Value, // width
            Opcode::Value, // height
            Opcode::Param2,
            Opcode::Screen,
            Opcode::Label,
            Opcode::Value,
            Opcode::Value,
            Opcode::Value,
            Opcode::Value,
            Opcode::Param2,
            Opcode::Param2,
            Opcode::DrawLine,
        ]
    );
    let screen = &program.ir.instructions()[5];
    assert_eq!(
        program.symbols.get(screen.op2),
        &SymbolEntry::Tmp {
            data_type: DataType::Int32,
            init: Some(Value::Int32(1)),
        }
    );
}

#[test]
fn wav_statements_require_a_defined_handle() {
    let program = lower(vec![
        Line::numbered(
            10,
            vec![let_stmt(VariableRef::scalar("H", Some(TypeSuffix::Dollar)), Expr::str_lit(""))],
        ),
        Line::numbered(
            20,
            vec![stmt(StmtKind::LoadWav {
                path: Expr::str_lit("boom.wav"),
                handle: VariableRef::scalar("H", Some(TypeSuffix::Dollar)),
            })],
        ),
        Line::numbered(
            30,
            vec![stmt(StmtKind::PlayWav {
                handle: VariableRef::scalar("H", Some(TypeSuffix::Dollar)),
            })],
        ),
    ]);
    let opcodes = ops(&program);
    assert!(opcodes.contains(&Opcode::LoadWav));
    assert!(opcodes.contains(&Opcode::PlayWav));

    let undefined = vec![Line::numbered(
        10,
        vec![stmt(StmtKind::PlayWav {
            handle: VariableRef::scalar("H", Some(TypeSuffix::Dollar)),
        })],
    )];
    assert_eq!(lower_err(undefined), ErrorKind::NotDefined);
}

// ==========================
// whole-program properties

#[test]
fn lowering_is_deterministic() {
    let first = lower(factorial_program());
    let second = lower(factorial_program());
    assert_eq!(first.ir.instructions(), second.ir.instructions());
    assert_eq!(first.symbols.entries(), second.symbols.entries());
}

#[test]
fn labels_are_unique_and_branches_are_patched() {
    let mut lines = factorial_program();
    lines.extend(for_countdown().into_iter().map(|mut line| {
        // renumber to avoid clashing with the factorial lines
        line.number = line.number.map(|n| n + 100);
        line
    }));
    let program = lower(lines);
    let labels = program.ir.label_index().expect("every label marked once");
    for instr in program.ir.instructions() {
        match instr.opcode {
            Opcode::GotoLabel | Opcode::GotoLineNum | Opcode::PushRetLabel => {
                assert!(labels.contains_key(&instr.op1), "unresolved target in {}", instr.opcode);
            }
            Opcode::GotoLabelIf | Opcode::PushRtScope => {
                assert!(labels.contains_key(&instr.op2), "unresolved target in {}", instr.opcode);
            }
            _ => {}
        }
    }
}
