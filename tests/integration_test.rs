// ABOUTME: End-to-end tests running whole Cirno programs through the public API

use cirno::error::CirnoError;
use cirno::interp::Interp;

/// Run a program with captured output.
fn run(src: &str) -> (Result<(), CirnoError>, String) {
    let mut interp = Interp::new();
    interp.capture_output();
    let result = interp.run_source(src, "<test>");
    let output = interp.take_output();
    (result, output)
}

/// Run a program that must succeed; returns its output.
fn run_ok(src: &str) -> String {
    let (result, output) = run(src);
    if let Err(e) = result {
        panic!("program failed: {}\noutput so far: {}", e, output);
    }
    output
}

/// Run a program that must fail; returns the diagnostic and any output
/// printed before the failure.
fn run_err(src: &str) -> (String, String) {
    let (result, output) = run(src);
    match result {
        Err(e) => (e.to_string(), output),
        Ok(()) => panic!("program unexpectedly succeeded, output: {}", output),
    }
}

// ============================================================================
// Specification Scenarios
// ============================================================================

#[test]
fn test_arithmetic_promotion() {
    let out = run_ok("i32 a = 3; f32 b = 2.0; print a + b;");
    assert_eq!(out, "5.000000 \n");
}

#[test]
fn test_array_round_trip() {
    let out = run_ok(
        "i32[] xs = array_init<i32>{1, 2, 3};\n\
         xs[1] = 42;\n\
         print xs[0], xs[1], xs[2], xs.length;",
    );
    assert_eq!(out, "1 42 3 3 \n");
}

#[test]
fn test_class_with_method_and_constructor() {
    let out = run_ok(
        "class_def Point {\n\
           i32 x;\n\
           i32 y;\n\
           fn sum(): i32 { return this.x + this.y; }\n\
           fn +new(i32 a, i32 b) { this.x = a; this.y = b; }\n\
         };\n\
         class Point p = new Point(10, 32);\n\
         print p.sum();",
    );
    assert_eq!(out, "42 \n");
}

#[test]
fn test_recursion() {
    let out = run_ok(
        "fn fact(i32 n): i32 {\n\
           if (n <= 1) { return 1; }\n\
           return n * fact(n - 1);\n\
         }\n\
         print fact(5);",
    );
    assert_eq!(out, "120 \n");
}

#[test]
fn test_gc_keeps_returned_string_alive() {
    let out = run_ok(
        "fn make(): string { return \"hi\" + \"!\"; }\n\
         string s = make();\n\
         string t = \"other\";\n\
         print s;",
    );
    assert_eq!(out, "hi! \n");
}

#[test]
fn test_out_of_bounds_fails_the_run() {
    let (err, output) = run_err("i32[] a = array_init<i32>(2); print a[5];");
    assert!(err.contains("index out of bounds"), "got: {}", err);
    assert_eq!(output, "");
}

// ============================================================================
// Expressions and Operators
// ============================================================================

#[test]
fn test_integer_arithmetic() {
    assert_eq!(run_ok("print 2 + 3 * 4;"), "14 \n");
    assert_eq!(run_ok("print (2 + 3) * 4;"), "20 \n");
    assert_eq!(run_ok("print 7 / 2;"), "3 \n");
    assert_eq!(run_ok("print 1 - 10;"), "-9 \n");
}

#[test]
fn test_unary_operators() {
    assert_eq!(run_ok("print -5;"), "-5 \n");
    assert_eq!(run_ok("print !0, !1, !42;"), "1 0 0 \n");
    assert_eq!(run_ok("f32 x = 1.5; print -x;"), "-1.500000 \n");
}

#[test]
fn test_comparisons_yield_i32() {
    assert_eq!(run_ok("print 1 < 2, 2 < 1, 3 <= 3, 4 >= 5;"), "1 0 1 0 \n");
    assert_eq!(run_ok("print 1 == 1, 1 != 1;"), "1 0 \n");
    assert_eq!(run_ok("print 1.5 < 2.5, 2.5 == 2.5;"), "1 1 \n");
}

#[test]
fn test_float_int_comparison_promotes() {
    assert_eq!(run_ok("print 1 < 1.5;"), "1 \n");
}

#[test]
fn test_logical_operators_evaluate_both_sides() {
    // No short-circuit: the right operand runs even when the left decides.
    let out = run_ok(
        "i32 g = 0;\n\
         fn side(): i32 { g = g + 1; return 0; }\n\
         print 0 && side();\n\
         print 1 || side();\n\
         print g;",
    );
    assert_eq!(out, "0 \n1 \n2 \n");
}

#[test]
fn test_assignment_is_an_expression() {
    assert_eq!(run_ok("i32 a = 0; i32 b = 0; a = b = 7; print a, b;"), "7 7 \n");
}

#[test]
fn test_compound_assignment() {
    assert_eq!(
        run_ok("i32 x = 10; x += 5; x -= 3; x *= 2; x /= 4; print x;"),
        "6 \n"
    );
    assert_eq!(run_ok("f32 x = 1.0; x += 0.5; print x;"), "1.500000 \n");
}

#[test]
fn test_postfix_increment_yields_original() {
    assert_eq!(run_ok("i32 i = 5; print i++, i;"), "5 6 \n");
    assert_eq!(run_ok("i32 i = 5; print i--, i;"), "5 4 \n");
}

#[test]
fn test_integer_assignment_truncates_float() {
    assert_eq!(run_ok("i32 x = 0; x = 2.9; print x;"), "2 \n");
}

#[test]
fn test_division_by_zero_is_an_error() {
    let (err, _) = run_err("print 1 / 0;");
    assert!(err.contains("division by zero"), "got: {}", err);
}

// ============================================================================
// Strings
// ============================================================================

#[test]
fn test_string_concatenation() {
    assert_eq!(run_ok("print \"ab\" + \"cde\";"), "abcde \n");
    assert_eq!(run_ok("string s = \"ab\"; s += \"cd\"; print s;"), "abcd \n");
}

#[test]
fn test_string_assignment_copies_reference() {
    let out = run_ok("string a = \"x\"; string b = a; print a, b;");
    assert_eq!(out, "x x \n");
}

#[test]
fn test_string_escapes() {
    assert_eq!(run_ok("print \"a\\tb\";"), "a\tb \n");
}

#[test]
fn test_string_subtraction_is_an_error() {
    let (err, _) = run_err("print \"a\" - \"b\";");
    assert!(err.contains("unknown operand type"), "got: {}", err);
}

// ============================================================================
// Control Flow
// ============================================================================

#[test]
fn test_if_else_chain() {
    let out = run_ok(
        "i32 x = 2;\n\
         if (x == 1) print 1;\n\
         else if (x == 2) print 2;\n\
         else print 3;",
    );
    assert_eq!(out, "2 \n");
}

#[test]
fn test_while_with_break_and_continue() {
    let out = run_ok(
        "i32 i = 0;\n\
         i32 sum = 0;\n\
         while (i < 10) {\n\
           i = i + 1;\n\
           if (i == 3) { continue; }\n\
           if (i > 5) { break; }\n\
           sum = sum + i;\n\
         }\n\
         print sum, i;",
    );
    assert_eq!(out, "12 6 \n");
}

#[test]
fn test_continue_works_every_iteration() {
    // Each loop iteration re-arms the flags, so a second continue still
    // skips the rest of the body.
    let out = run_ok(
        "i32 sum = 0;\n\
         for (i32 i = 0; i < 6; i++) {\n\
           if (i == 1) { continue; }\n\
           if (i == 3) { continue; }\n\
           sum += i;\n\
         }\n\
         print sum;",
    );
    assert_eq!(out, "11 \n");
}

#[test]
fn test_for_loop_counts() {
    assert_eq!(
        run_ok("for (i32 i = 0; i < 3; i = i + 1) print i;"),
        "0 \n1 \n2 \n"
    );
    // The increment runs for side effects only; the condition is
    // re-evaluated fresh.
    assert_eq!(
        run_ok("i32 n = 0; for (i32 i = 0; i < 4; i++) n += 1; print n;"),
        "4 \n"
    );
}

#[test]
fn test_break_terminates_innermost_loop_only() {
    let out = run_ok(
        "i32 hits = 0;\n\
         for (i32 i = 0; i < 3; i++) {\n\
           for (i32 j = 0; j < 3; j++) {\n\
             if (j == 1) { break; }\n\
             hits++;\n\
           }\n\
         }\n\
         print hits;",
    );
    assert_eq!(out, "3 \n");
}

#[test]
fn test_return_inside_loop_ends_the_call() {
    let out = run_ok(
        "fn first(): i32 {\n\
           while (1) { return 7; }\n\
         }\n\
         print first();",
    );
    assert_eq!(out, "7 \n");
}

#[test]
fn test_break_outside_loop_is_an_error() {
    let (err, _) = run_err("break;");
    assert!(err.contains("cannot break outside loop"), "got: {}", err);
    let (err, _) = run_err("continue;");
    assert!(err.contains("cannot continue outside loop"), "got: {}", err);
}

// ============================================================================
// Functions and Scoping
// ============================================================================

#[test]
fn test_globals_visible_inside_functions() {
    assert_eq!(run_ok("i32 g = 42; fn f(): i32 { return g; } print f();"), "42 \n");
}

#[test]
fn test_caller_locals_invisible_to_callee() {
    let (err, _) = run_err(
        "fn f(): i32 { return x; }\n\
         fn g(): i32 { i32 x = 5; return f(); }\n\
         print g();",
    );
    assert!(err.contains("'x' undeclared"), "got: {}", err);
}

#[test]
fn test_shadowing_across_blocks() {
    let out = run_ok(
        "i32 x = 1;\n\
         if (1) { i32 x = 2; print x; }\n\
         print x;",
    );
    assert_eq!(out, "2 \n1 \n");
}

#[test]
fn test_redefinition_in_one_region_is_an_error() {
    let (err, _) = run_err("i32 x = 1; i32 x = 2;");
    assert!(err.contains("redefinition of 'x'"), "got: {}", err);
}

#[test]
fn test_param_and_local_share_the_frame_region() {
    let (err, _) = run_err("fn f(i32 x): i32 { i32 x = 1; return x; } print f(0);");
    assert!(err.contains("redefinition"), "got: {}", err);
}

#[test]
fn test_arity_mismatch() {
    let (err, _) = run_err("fn f(i32 a, i32 b): i32 { return a + b; } print f(1);");
    assert!(err.contains("too few arguments"), "got: {}", err);

    let (err, _) = run_err("fn f(i32 a): i32 { return a; } print f(1, 2);");
    assert!(err.contains("too many arguments"), "got: {}", err);
}

#[test]
fn test_arguments_cast_to_parameter_types() {
    assert_eq!(run_ok("fn f(f32 x): f32 { return x; } print f(3);"), "3.000000 \n");
}

#[test]
fn test_return_type_is_checked_exactly() {
    let (err, _) = run_err("fn f(): f32 { return 1; } print f();");
    assert!(err.contains("incompatible types when returning"), "got: {}", err);
}

#[test]
fn test_call_of_non_function() {
    let (err, _) = run_err("i32 x = 1; x();");
    assert!(err.contains("attempt to call non-function"), "got: {}", err);
}

#[test]
fn test_mutual_recursion_binds_late() {
    // Callees resolve when the call runs, so definition order does not
    // matter for mutually recursive functions.
    let out = run_ok(
        "fn is_even(i32 n): i32 {\n\
           if (n == 0) { return 1; }\n\
           return is_odd(n - 1);\n\
         }\n\
         fn is_odd(i32 n): i32 {\n\
           if (n == 0) { return 0; }\n\
           return is_even(n - 1);\n\
         }\n\
         print is_even(10), is_odd(10);",
    );
    assert_eq!(out, "1 0 \n");
}

#[test]
fn test_unbound_forward_declaration_is_an_error() {
    let (err, _) = run_err("fn ghost(i32 n): i32;");
    assert!(err.contains("bodyless function 'ghost' is unbound"), "got: {}", err);
}

#[test]
fn test_deep_recursion_overflows_the_stack() {
    let (err, _) = run_err("fn f(i32 n): i32 { return f(n + 1); } print f(0);");
    assert!(err.contains("ran out of stack memory"), "got: {}", err);
}

// ============================================================================
// Classes and Arrays
// ============================================================================

#[test]
fn test_fields_read_zero_until_assigned() {
    let out = run_ok(
        "class_def C { i32 a; f32 b; string s; };\n\
         class C c = new C();\n\
         print c.a, c.b;",
    );
    assert_eq!(out, "0 0.000000 \n");
}

#[test]
fn test_member_access_on_null_instance_is_an_error() {
    let (err, _) = run_err("class_def C { i32 a; }; class C c; print c.a;");
    assert!(err.contains("uninitialised class"), "got: {}", err);
}

#[test]
fn test_unknown_member() {
    let (err, _) = run_err("class_def C { i32 a; }; class C c = new C(); print c.b;");
    assert!(err.contains("has no member named 'b'"), "got: {}", err);
}

#[test]
fn test_method_mutates_instance() {
    let out = run_ok(
        "class_def Counter {\n\
           i32 n;\n\
           fn bump() { this.n = this.n + 1; }\n\
           fn get(): i32 { return this.n; }\n\
         };\n\
         class Counter c = new Counter();\n\
         c.bump();\n\
         c.bump();\n\
         print c.get();",
    );
    assert_eq!(out, "2 \n");
}

#[test]
fn test_instance_assignment_copies_reference() {
    let out = run_ok(
        "class_def C { i32 v; };\n\
         class C a = new C();\n\
         class C b = a;\n\
         b.v = 9;\n\
         print a.v;",
    );
    assert_eq!(out, "9 \n");
}

#[test]
fn test_array_of_class_instances() {
    let out = run_ok(
        "class_def P { i32 v; fn +new(i32 x) { this.v = x; } };\n\
         class P[] ps = array_init<class P>(2);\n\
         ps[0] = new P(7);\n\
         ps[1] = new P(8);\n\
         print ps[0].v, ps[1].v;",
    );
    assert_eq!(out, "7 8 \n");
}

#[test]
fn test_self_referential_class() {
    let out = run_ok(
        "class_def Node { i32 v; class Node next; fn +new(i32 v) { this.v = v; } };\n\
         class Node a = new Node(1);\n\
         a.next = new Node(2);\n\
         print a.next.v;",
    );
    assert_eq!(out, "2 \n");
}

#[test]
fn test_zero_sized_array_init() {
    assert_eq!(run_ok("i32[] a = array_init<i32>(0); print a.length;"), "0 \n");
}

#[test]
fn test_negative_index_is_out_of_bounds() {
    let (err, _) = run_err("i32[] a = array_init<i32>(2); print a[-1];");
    assert!(err.contains("index out of bounds"), "got: {}", err);
}

#[test]
fn test_index_of_non_array() {
    let (err, _) = run_err("i32 x = 1; print x[0];");
    assert!(err.contains("subscripted value is not an array"), "got: {}", err);
}

#[test]
fn test_non_integer_subscript() {
    let (err, _) = run_err("i32[] a = array_init<i32>(2); print a[1.5];");
    assert!(err.contains("array subscript is of type"), "got: {}", err);
}

#[test]
fn test_indexing_null_array() {
    let (err, _) = run_err("i32[] a; print a[0];");
    assert!(err.contains("uninitialised array"), "got: {}", err);
}

#[test]
fn test_array_init_type_mismatch() {
    let (err, _) = run_err("i32[] a = array_init<i32>{1, 2.5};");
    assert!(err.contains("incompatible types"), "got: {}", err);
}

#[test]
fn test_class_redefinition() {
    let (err, _) = run_err("class_def C { i32 a; }; class_def C { i32 b; };");
    assert!(err.contains("redefinition of class 'C'"), "got: {}", err);
}

#[test]
fn test_field_initializer_is_an_error() {
    let (err, _) = run_err("class_def C { i32 a = 1; };");
    assert!(err.contains("cannot initialize 'a'"), "got: {}", err);
}

#[test]
fn test_undefined_class() {
    let (err, _) = run_err("class Missing m = new Missing();");
    assert!(err.contains("use of undefined class 'Missing'"), "got: {}", err);
}

// ============================================================================
// Declarations and Type Errors
// ============================================================================

#[test]
fn test_declaration_without_initializer_is_zero() {
    assert_eq!(run_ok("i32 x; f32 y; print x, y;"), "0 0.000000 \n");
}

#[test]
fn test_init_type_mismatch() {
    let (err, _) = run_err("i32 x = \"hi\";");
    assert!(err.contains("incompatible types when initializing"), "got: {}", err);
}

#[test]
fn test_undeclared_identifier() {
    let (err, _) = run_err("print nope;");
    assert!(err.contains("'nope' undeclared"), "got: {}", err);
}

#[test]
fn test_assignment_to_rvalue() {
    let (err, _) = run_err("1 = 2;");
    assert!(err.contains("lvalue required"), "got: {}", err);
}

#[test]
fn test_parse_errors_suppress_evaluation() {
    let (err, output) = run_err("print 1;\ni32 x = ;\n");
    assert!(err.contains("expected 'expression'"), "got: {}", err);
    // Nothing ran: the parse failed before evaluation.
    assert_eq!(output, "");
}
