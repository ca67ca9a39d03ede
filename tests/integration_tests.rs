use phpcc::analyzer::{SemanticVisitor, Ty};
use phpcc::error::{CompileResult, ErrorKind};
use phpcc::lexer::Lexer;
use phpcc::optimizer::Optimizer;
use phpcc::parser::*;
use phpcc::{compile, CompileOptions};

fn wrap_in_php(input: &str) -> String {
    format!("<?php\n{}", input)
}

fn parse(input: &str) -> Program {
    let tokens = Lexer::tokenize(&wrap_in_php(input)).unwrap();
    Parser::new(tokens).parse().unwrap()
}

fn analyze(input: &str) -> CompileResult<Program> {
    let tokens = Lexer::tokenize(&wrap_in_php(input))?;
    let mut parser = Parser::new(tokens);
    let mut program = parser.parse()?;
    let mut visitor = SemanticVisitor::new(parser.take_symbol_table());
    visitor.visit_program(&mut program)?;
    Ok(program)
}

fn optimize(input: &str) -> Program {
    let mut program = analyze(input).unwrap();
    Optimizer::new().optimize(&mut program);
    program
}

fn error_kind(input: &str) -> ErrorKind {
    compile(&wrap_in_php(input), &CompileOptions::default())
        .unwrap_err()
        .kind()
}

fn generate(input: &str) -> String {
    compile(&wrap_in_php(input), &CompileOptions::default()).unwrap()
}

fn generate_unoptimized(input: &str) -> String {
    let options = CompileOptions {
        optimize: false,
        ..Default::default()
    };
    compile(&wrap_in_php(input), &options).unwrap()
}

/// Value of the `n`th top-level assignment.
fn assigned_value(program: &Program, n: usize) -> &Node {
    let stmt = program.ast.statements(program.root)[n];
    let Node::Assign { value, .. } = &program.ast[stmt] else {
        panic!("statement {} is not an assignment", n);
    };
    &program.ast[*value]
}

fn position(code: &str, needle: &str) -> usize {
    code.find(needle)
        .unwrap_or_else(|| panic!("`{}` not found in:\n{}", needle, code))
}

#[test]
fn node_type_sequences() {
    use NodeType::*;

    let program = parse("1 + 2;");
    assert_eq!(
        program.ast.preorder(program.root),
        vec![Sequence, Add, Integer, Integer]
    );

    let program = parse("1 + 2 * 3 / 12;");
    assert_eq!(
        program.ast.preorder(program.root),
        vec![Sequence, Add, Integer, Div, Mul, Integer, Integer, Integer]
    );
}

#[test]
fn logical_operators_bind_loosest() {
    use NodeType::*;

    let program = parse("$a = 1 < 2 && 3 == 3 || !0;");
    assert_eq!(
        program.ast.preorder(program.root),
        vec![
            Sequence, Assign, Or, And, Less, Integer, Integer, Equal, Integer, Integer, Not,
            Integer
        ]
    );
}

#[test]
fn concatenation_shares_additive_precedence() {
    use NodeType::*;

    let program = parse("$s = \"a\" . 1 + 2;");
    assert_eq!(
        program.ast.preorder(program.root),
        vec![Sequence, Assign, Add, Concat, String, Integer, Integer]
    );
}

#[test]
fn arguments_keep_source_order() {
    let program = parse("f(1, 2, 3);");
    let stmt = program.ast.statements(program.root)[0];
    let Node::Call { name, args } = &program.ast[stmt] else {
        panic!();
    };
    assert_eq!(name, "f");
    let values: Vec<_> = program
        .ast
        .arguments(*args)
        .into_iter()
        .map(|v| program.ast[v].clone())
        .collect();
    assert_eq!(values, vec![Node::Int(1), Node::Int(2), Node::Int(3)]);
}

#[test]
fn branches_are_always_sequences() {
    let program = parse("if ($a) $b = 1; else $b = 2; while ($a) $b = 3;");
    let stmts = program.ast.statements(program.root);
    let Node::If {
        then, otherwise, ..
    } = &program.ast[stmts[0]]
    else {
        panic!();
    };
    assert_eq!(program.ast.node_type(*then), NodeType::Sequence);
    assert_eq!(program.ast.node_type(otherwise.unwrap()), NodeType::Sequence);
    let Node::While { body, .. } = &program.ast[stmts[1]] else {
        panic!();
    };
    assert_eq!(program.ast.node_type(*body), NodeType::Sequence);
}

#[test]
fn compound_assignment_is_desugared() {
    use NodeType::*;

    let program = parse("$a += 2; $a++;");
    assert_eq!(
        program.ast.preorder(program.root),
        vec![
            Sequence, Sequence, Assign, Add, Variable, Integer, Assign, Add, Variable, Integer
        ]
    );
}

#[test]
fn function_declarations() {
    let program = parse("function f(int $a, ?string $b, $c): ?float { return 1.5; }");
    let stmt = program.ast.statements(program.root)[0];
    let Node::Function {
        name, params, ret, ..
    } = &program.ast[stmt]
    else {
        panic!();
    };
    assert_eq!(name, "f");
    let types: Vec<_> = params.iter().map(|p| p.ty).collect();
    assert_eq!(types, vec![Ty::INT, Ty::STRING | Ty::NULL, Ty::ANY]);
    assert_eq!(*ret, Some(Ty::FLOAT | Ty::NULL));
}

#[test]
fn prologue_and_close_tag() {
    let source = "<?php\ndeclare(strict_types=1);\n$a = 1;\n?>\n";
    let code = compile(source, &CompileOptions::default()).unwrap();
    assert!(code.starts_with(".IFJcode22\n"));
}

#[test]
fn syntax_errors() {
    assert_eq!(error_kind("if (1) { } else"), ErrorKind::Syntax);
    assert_eq!(error_kind("$a = ;"), ErrorKind::Syntax);
    assert_eq!(error_kind("$a = (1 + 2;"), ErrorKind::Syntax);
    assert_eq!(error_kind("function f() { function g() {} }"), ErrorKind::Syntax);
    assert_eq!(error_kind("while (1) $a = 1"), ErrorKind::Syntax);
}

#[test]
fn lexical_errors() {
    assert_eq!(error_kind("$1 = 2;"), ErrorKind::Lexical);
    assert_eq!(error_kind("$a = \"open;"), ErrorKind::Lexical);
    assert_eq!(error_kind("$a = 1 & 2;"), ErrorKind::Lexical);
}

#[test]
fn call_arguments_are_checked() {
    let f = "function f(int $a, int $b): int { return $a + $b; }\n";
    assert_eq!(error_kind(&format!("{}$x = f(1);", f)), ErrorKind::Argument);
    assert_eq!(error_kind(&format!("{}$x = f(1, \"a\");", f)), ErrorKind::Argument);
    assert!(analyze(&format!("{}$x = f(1, 2);", f)).is_ok());
    assert_eq!(error_kind("$x = strlen(1);"), ErrorKind::Argument);
    assert!(analyze("write(1, 2.5, \"a\", null);").is_ok());
}

#[test]
fn returns_are_checked() {
    assert_eq!(error_kind("function f(): int { $a = 1; }"), ErrorKind::Return);
    assert_eq!(error_kind("function f(): int { return \"a\"; }"), ErrorKind::Return);
    assert_eq!(error_kind("function f(): int { return; }"), ErrorKind::Return);
    assert_eq!(error_kind("function f(): void { return 1; }"), ErrorKind::Return);
    assert!(analyze("function f(): void { return; }").is_ok());
    assert!(analyze("function f(): ?int { return null; }").is_ok());
}

#[test]
fn undefined_symbols() {
    assert_eq!(error_kind("$b = $a + 1;"), ErrorKind::Undefined);
    assert_eq!(error_kind("$a = $a;"), ErrorKind::Undefined);
    assert_eq!(error_kind("g();"), ErrorKind::Undefined);
    assert_eq!(error_kind("function f() {} function f() {}"), ErrorKind::Undefined);
    assert_eq!(error_kind("function strlen($s) {}"), ErrorKind::Undefined);
    assert_eq!(error_kind("function f($a, $a) {}"), ErrorKind::Undefined);
    assert_eq!(
        error_kind("$g = 1; function f() { return $g; }"),
        ErrorKind::Undefined
    );
}

#[test]
fn functions_are_visible_before_their_declaration() {
    assert!(analyze("$a = f(3); function f(int $n): int { return f($n - 1); }").is_ok());
}

#[test]
fn string_operands_are_type_errors() {
    assert_eq!(error_kind("$a = \"x\" + 1;"), ErrorKind::Type);
    assert_eq!(error_kind("$a = reads(); $b = $a < 1;"), ErrorKind::Type);
    assert!(analyze("$a = reads(); $b = $a === null;").is_ok());
}

#[test]
fn void_results_cannot_be_used() {
    assert_eq!(error_kind("$a = write(1);"), ErrorKind::Other);
    assert_eq!(error_kind("function f(): void {} $a = 1 + f();"), ErrorKind::Other);
}

#[test]
fn mixed_arithmetic_coerces_int_literals() {
    let program = analyze("$a = 1 + 2.5; $b = 6 / 3; $s = \"n\" . 5;").unwrap();

    let Node::Binary { left, .. } = assigned_value(&program, 0) else {
        panic!();
    };
    assert_eq!(program.ast[*left], Node::Float(1.0));

    let Node::Binary { left, right, .. } = assigned_value(&program, 1) else {
        panic!();
    };
    assert_eq!(program.ast[*left], Node::Float(6.0));
    assert_eq!(program.ast[*right], Node::Float(3.0));

    let Node::Binary { right, .. } = assigned_value(&program, 2) else {
        panic!();
    };
    assert_eq!(program.ast[*right], Node::Str("5".into()));
}

#[test]
fn always_false_if_becomes_empty() {
    let program = optimize("if (0) $a = 1;");
    let stmt = program.ast.statements(program.root)[0];
    assert_eq!(program.ast[stmt], Node::empty_statement());
}

#[test]
fn always_true_if_keeps_then_branch() {
    let program = optimize("if (1) $a = 1; else { $a = 2; }");
    let expected = parse("{ $a = 1; }");
    assert_eq!(
        program.ast.dump(program.root),
        expected.ast.dump(expected.root)
    );
}

#[test]
fn always_false_if_keeps_else_branch() {
    let program = optimize("if (2 < 1) { $a = 1; } else { $a = 2; }");
    let expected = parse("{ $a = 2; }");
    assert_eq!(
        program.ast.dump(program.root),
        expected.ast.dump(expected.root)
    );
}

#[test]
fn block_branches_are_kept_or_dropped_whole() {
    let program = optimize("if (1) $a = 1; else { $a = 2; $b = 3; }");
    let expected = parse("{ $a = 1; }");
    assert_eq!(
        program.ast.dump(program.root),
        expected.ast.dump(expected.root)
    );

    let program = optimize("if (0) { $a = 1; } else { $a = 2; $b = 3; }");
    let expected = parse("{ $a = 2; $b = 3; }");
    assert_eq!(
        program.ast.dump(program.root),
        expected.ast.dump(expected.root)
    );
}

#[test]
fn always_false_while_is_removed() {
    let program = optimize("$a = 1; while (0) { $a = 2; }");
    let stmt = program.ast.statements(program.root)[1];
    assert_eq!(program.ast[stmt], Node::empty_statement());

    let program = optimize("$a = 1; while (1) { $a = 2; }");
    let stmt = program.ast.statements(program.root)[1];
    assert_eq!(program.ast.node_type(stmt), NodeType::While);
}

#[test]
fn constants_propagate_and_fold() {
    let program = optimize("$a = 1; $b = $a + 1;");
    assert_eq!(*assigned_value(&program, 1), Node::Int(2));
    assert!(!program
        .ast
        .preorder(program.root)
        .contains(&NodeType::Variable));
}

#[test]
fn propagation_stops_at_loops_that_reassign() {
    let program = optimize("$i = 0; while ($i < 3) { $i = $i + 1; } $j = $i;");
    let stmts = program.ast.statements(program.root);
    let Node::While { cond, .. } = &program.ast[stmts[1]] else {
        panic!();
    };
    assert_eq!(
        program.ast.preorder(*cond),
        vec![NodeType::Less, NodeType::Variable, NodeType::Integer]
    );
    assert_eq!(*assigned_value(&program, 2), Node::Var("$i".into()));
}

#[test]
fn propagation_enters_loops_that_only_read() {
    let program = optimize("$n = 5; $i = readi(); while ($i < $n) { write($n); }");
    let stmts = program.ast.statements(program.root);
    let Node::While { cond, body } = &program.ast[stmts[2]] else {
        panic!();
    };
    let Node::Binary { right, .. } = &program.ast[*cond] else {
        panic!();
    };
    assert_eq!(program.ast[*right], Node::Int(5));
    assert!(!program.ast.preorder(*body).contains(&NodeType::Variable));
}

#[test]
fn reassignment_receives_the_old_value() {
    let program = optimize("$a = 2; $a = $a * 3; $b = $a;");
    assert_eq!(*assigned_value(&program, 1), Node::Int(6));
    assert_eq!(*assigned_value(&program, 2), Node::Int(6));
}

#[test]
fn division_by_zero_is_not_folded() {
    let program = optimize("$a = 1 / 0;");
    assert!(matches!(
        assigned_value(&program, 0),
        Node::Binary { op: BinOp::Div, .. }
    ));
}

#[test]
fn optimizer_is_idempotent() {
    let sources = [
        "$x = 1; if (0) { $x = 2; } $y = $x;",
        "$a = 3; if ($a > 2) { $b = $a * 2; } else { $b = 0; } write($b);",
        "$i = 0; while ($i < 10) { $i = $i + 1; if (1) { $k = $i; } } write($i);",
        "function f(int $n): int { $m = 2; return $n * $m; } $r = f(4) + 2 * 3;",
        "$s = \"a\"; $t = $s . \"b\"; if (1 === 1.0) { write($t); }",
    ];
    for source in sources {
        let mut program = optimize(source);
        let once = program.ast.dump(program.root);
        Optimizer::new().optimize(&mut program);
        assert_eq!(program.ast.dump(program.root), once, "{}", source);
    }
}

#[test]
fn header_and_exit() {
    let code = generate("$a = 1;");
    assert!(code.starts_with(".IFJcode22\n"));
    assert!(code.contains("DEFVAR GF@a\n"));
    assert!(code.contains("MOVE GF@a int@1\n"));
    assert!(code.contains("EXIT int@0\n"));
}

#[test]
fn write_pushes_arguments_in_order_then_count() {
    let code = generate("write(\"a\", 1);");
    let a = position(&code, "PUSHS string@a\n");
    let one = position(&code, "PUSHS int@1\n");
    let count = position(&code, "PUSHS int@2\n");
    let call = position(&code, "CALL write\n");
    assert!(a < one && one < count && count < call);
    assert!(code.contains("LABEL write\n"));
    assert!(!code.contains("LABEL strlen\n"));
}

#[test]
fn declarations_are_hoisted_out_of_loops() {
    let code = generate_unoptimized("$i = 0; while ($i < 10) { $i = $i + 1; }");
    assert_eq!(code.matches("DEFVAR GF@i\n").count(), 1);
    let last_defvar = code.rfind("DEFVAR").unwrap();
    assert!(last_defvar < position(&code, "LABEL %while1_start"));
    assert!(code.contains("JUMPIFEQ %while1_end"));
    assert!(code.contains("JUMP %while1_start"));
}

#[test]
fn functions_follow_the_calling_convention() {
    let code = generate("function f(int $a, int $b): int { return $a - $b; } write(f(5, 3));");
    let exit = position(&code, "EXIT int@0\n");
    let label = position(&code, "LABEL f\n");
    assert!(exit < label);

    let body = &code[label..];
    assert!(body.starts_with("LABEL f\nPUSHFRAME\nDEFVAR LF@%retval\nMOVE LF@%retval nil@nil\n"));
    assert!(position(body, "POPS LF@b\n") < position(body, "POPS LF@a\n"));
    assert!(body.contains("SUB LF@%t"));
    assert!(body.contains("MOVE LF@%retval LF@%t"));
    assert!(body.contains("POPFRAME\nRETURN\n"));

    let five = position(&code, "PUSHS int@5\n");
    let three = position(&code, "PUSHS int@3\n");
    assert!(five < three && three < position(&code, "CALL f\n"));
    assert!(code.contains("TF@%retval"));
}

#[test]
fn immediates_are_encoded() {
    let code = generate("$f = 1.5; $s = \"a b#\"; $n = null;");
    assert!(code.contains("MOVE GF@f float@0x1.8p+0\n"));
    assert!(code.contains("MOVE GF@s string@a\\032b\\035\n"));
    assert!(code.contains("MOVE GF@n nil@nil\n"));
}

#[test]
fn negated_comparisons() {
    let code = generate("$a = readi(); if ($a <= 3) { write(1); }");
    assert!(code.contains("GT GF@%t"));
    assert!(code.contains("NOT GF@%t"));
    assert!(code.contains("CALL %toint\n"));
    assert!(code.contains("LABEL %toint\n"));
    assert!(code.contains("LABEL %type_error\nEXIT int@7\n"));
    assert!(code.contains("LABEL %if"));
}

#[test]
fn identity_compares_types_first() {
    let code = generate("$a = readi(); $b = $a === null;");
    let ty = position(&code, "TYPE GF@%t");
    let jump = position(&code, "JUMPIFNEQ %cmp");
    let eq = position(&code, "EQ GF@%t");
    assert!(ty < jump && jump < eq);
    assert!(code.contains("LABEL %bool"));
}

#[test]
fn int_operands_widen_inline() {
    let code = generate_unoptimized("$i = strlen(\"ab\"); $f = 1.5; $g = $i + $f;");
    assert!(code.contains("INT2FLOAT GF@%s"));
    assert!(code.contains("ADD GF@%t"));
    assert!(!code.contains("CALL %tofloat"));
}

#[test]
fn nullable_operands_go_through_helpers() {
    let code = generate("$f = readf(); $g = $f * 2;");
    assert!(code.contains("CALL %tofloat\n"));
    assert!(code.contains("float@0x1p+1"));
    assert!(code.contains("LABEL %tofloat\n"));
}

#[test]
fn logical_operators_short_circuit() {
    let code = generate("$a = readi(); if ($a && $a > 1) { write(1); } if ($a || 0) { write(2); }");
    assert!(code.contains("LABEL %and"));
    assert!(code.contains("LABEL %or"));
    assert!(code.contains("CALL %tobool\n"));
}

#[test]
fn concatenation_converts_numbers() {
    let code = generate("$i = readi(); $s = \"n=\" . $i;");
    assert!(code.contains("CALL %tostring\n"));
    assert!(code.contains("CONCAT GF@%t"));
    assert!(code.contains("LABEL %tostring\n"));
}

#[test]
fn only_used_builtins_are_emitted() {
    let code = generate("$c = chr(65); $n = strlen(\"abc\");");
    assert!(code.contains("LABEL chr\n"));
    assert!(code.contains("LABEL strlen\n"));
    assert!(!code.contains("LABEL substring\n"));
    assert!(!code.contains("LABEL readi\n"));
}

#[test]
fn top_level_return_exits() {
    let code = generate("write(1); return; write(2);");
    let first = position(&code, "EXIT int@0\n");
    assert!(first < position(&code, "PUSHS int@2\n"));
}

#[test]
fn stored_types_match_their_readers() {
    let source = "$x = readi(); $y = $x + 1; $x = readf(); $z = $y + 1; write($z);";
    let (_, symbols) =
        phpcc::analyze(&wrap_in_php(source), &CompileOptions::default()).unwrap();
    assert_eq!(symbols.find("$y").unwrap().ty, Ty::INT | Ty::FLOAT);

    let code = generate(source);
    let lines: Vec<&str> = code.lines().collect();
    let read = lines
        .iter()
        .position(|l| l.starts_with("ADD ") && l.contains(" GF@y "))
        .unwrap();
    assert!(lines[..read]
        .iter()
        .any(|l| l.starts_with("TYPE ") && l.ends_with(" GF@y")));
}

#[test]
fn untyped_parameters_keep_int_arithmetic() {
    let source = "function add($a, $b) { return $a + $b; } write(add(1, 2));";
    let (_, symbols) =
        phpcc::analyze(&wrap_in_php(source), &CompileOptions::default()).unwrap();
    assert_eq!(symbols.find("add").unwrap().ty, Ty::INT | Ty::FLOAT);

    let code = generate(source);
    let body = &code[position(&code, "LABEL add\n")..];
    let dispatch = position(body, "JUMPIFNEQ %arith");
    let int_add = position(body, "ADD LF@");
    assert!(dispatch < int_add);
    assert!(int_add < position(body, "CALL %tofloat\n"));
    assert!(body.contains("CALL %tonumber\n"));
}

#[test]
fn any_operands_do_not_coerce_literals() {
    let program = analyze("function f($a) { return $a * 2; }").unwrap();
    assert!(program
        .ast
        .preorder(program.root)
        .contains(&NodeType::Integer));
}

#[test]
fn helper_labels_do_not_clash_with_functions() {
    let code =
        generate("function intval_end() { return 1; } write(intval(2.5)); write(intval_end());");
    assert_eq!(code.matches("LABEL intval_end\n").count(), 1);
    assert!(code.contains("LABEL %intval_end\n"));
}
