// ABOUTME: Tests for mark-and-sweep precision and heap reclamation

use cirno::error::CirnoError;
use cirno::interp::Interp;

/// Run a program with captured output, returning the interpreter for heap
/// inspection.
fn run_interp(src: &str) -> (Interp, Result<(), CirnoError>, String) {
    let mut interp = Interp::new();
    interp.capture_output();
    let result = interp.run_source(src, "<test>");
    let output = interp.take_output();
    (interp, result, output)
}

#[test]
fn test_loop_garbage_is_reclaimed() {
    // Each iteration allocates literal and concatenation blocks that die
    // with the iteration's scope.
    let (interp, result, _) = run_interp(
        "for (i32 i = 0; i < 50; i++) {\n\
           string tmp = \"x\" + \"y\";\n\
         }",
    );
    result.unwrap();
    // Only the stack block survives.
    assert_eq!(interp.heap_stats().live_blocks, 1);
}

#[test]
fn test_rebinding_frees_the_old_string() {
    let (interp, result, _) = run_interp(
        "string s = \"a\" + \"b\";\n\
         s = \"c\" + \"d\";\n\
         i32 sync = 0;",
    );
    result.unwrap();
    // Stack plus the one concatenation s still references.
    assert_eq!(interp.heap_stats().live_blocks, 2);
}

#[test]
fn test_global_string_survives_collection() {
    let (interp, result, output) = run_interp(
        "string s = \"keep\" + \"!\";\n\
         i32 a = 0;\n\
         i32 b = 0;\n\
         print s;",
    );
    result.unwrap();
    assert_eq!(output, "keep! \n");
    assert_eq!(interp.heap_stats().live_blocks, 2);
}

#[test]
fn test_instance_reachable_only_through_array_survives() {
    let (_, result, output) = run_interp(
        "class_def P { i32 v; };\n\
         class P[] ps = array_init<class P>(1);\n\
         ps[0] = new P();\n\
         i32 a = 0;\n\
         i32 b = 0;\n\
         print ps[0].v;",
    );
    result.unwrap();
    assert_eq!(output, "0 \n");
}

#[test]
fn test_string_field_survives_through_instance() {
    let (_, result, output) = run_interp(
        "class_def Named { string name; };\n\
         class Named n = new Named();\n\
         n.name = \"alive\" + \"\";\n\
         i32 sync = 0;\n\
         print n.name;",
    );
    result.unwrap();
    assert_eq!(output, "alive \n");
}

#[test]
fn test_string_array_elements_survive() {
    let (_, result, output) = run_interp(
        "string[] words = array_init<string>(2);\n\
         words[0] = \"a\" + \"1\";\n\
         words[1] = \"b\" + \"2\";\n\
         i32 sync = 0;\n\
         print words[0], words[1];",
    );
    result.unwrap();
    assert_eq!(output, "a1 b2 \n");
}

#[test]
fn test_cyclic_instances_collect_and_terminate() {
    // A reference cycle must neither hang the marker nor leak once
    // unreachable.
    let (interp, result, output) = run_interp(
        "class_def Node { i32 v; class Node next; fn +new(i32 v) { this.v = v; } };\n\
         class Node a = new Node(1);\n\
         a.next = new Node(2);\n\
         a.next.next = a;\n\
         print a.next.v;\n\
         a = new Node(3);\n\
         a.next = a;\n\
         i32 sync = 0;",
    );
    result.unwrap();
    assert_eq!(output, "2 \n");
    // The two-node cycle is unreachable now; only node 3 and the stack
    // block remain.
    assert_eq!(interp.heap_stats().live_blocks, 2);
}

#[test]
fn test_unreferenced_return_value_is_reclaimed() {
    let (interp, result, _) = run_interp(
        "fn make(): string { return \"tmp\" + \"!\"; }\n\
         make();\n\
         i32 sync = 0;",
    );
    result.unwrap();
    assert_eq!(interp.heap_stats().live_blocks, 1);
}

#[test]
fn test_stop_collects_everything() {
    let (mut interp, result, _) = run_interp(
        "class_def C { string s; };\n\
         class C c = new C();\n\
         c.s = \"data\" + \"\";",
    );
    result.unwrap();
    assert!(interp.heap_stats().live_blocks > 1);
    interp.stop();
    assert_eq!(interp.heap_stats().live_blocks, 1);
}
