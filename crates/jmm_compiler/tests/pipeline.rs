//! End-to-end: syntax tree + symbol table in, OLLIR and Jasmin out.

use jmm_compiler::{compile_unit, liveness, lower_unit, CompilerOptions};
use jmm_syntax::ast::build::*;
use jmm_syntax::ast::{BinOp, Program, Stmt};
use jmm_syntax::symbols::{MethodSymbols, SymbolTable, Type};
use jmm_syntax::{CompilationUnit, GenerationError, Report};

fn init_logger() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

fn unit(symbols: SymbolTable, methods: Vec<jmm_syntax::ast::MethodDecl>) -> CompilationUnit {
    let name = symbols.class_name.clone();
    let program = Program {
        imports: Vec::new(),
        class: class(&name, None, methods),
    };
    CompilationUnit::new(program, symbols)
}

/// Body lines of the Jasmin method whose header line starts with `header`,
/// without the `.limit` directives.
fn method_body(jasmin: &str, header: &str) -> Vec<String> {
    let mut lines = jasmin.lines().skip_while(|l| !l.starts_with(header));
    lines.next();
    lines
        .take_while(|l| *l != ".end method")
        .filter(|l| !l.trim_start().starts_with(".limit"))
        .map(|l| l.trim().to_string())
        .collect()
}

fn stack_limit(jasmin: &str, header: &str) -> u32 {
    jasmin
        .lines()
        .skip_while(|l| !l.starts_with(header))
        .find_map(|l| l.trim().strip_prefix(".limit stack "))
        .and_then(|n| n.parse().ok())
        .unwrap()
}

fn foo_unit() -> CompilationUnit {
    let symbols = SymbolTable::new("Foo")
        .with_field("x", Type::int())
        .with_method(MethodSymbols::new("bar", Type::int()).param("y", Type::int()));
    unit(
        symbols,
        vec![method(
            "bar",
            vec![ret(Some(binary(BinOp::Add, ident("x"), ident("y"))))],
        )],
    )
}

#[test]
fn field_plus_parameter_end_to_end() {
    init_logger();
    let out = compile_unit(&foo_unit(), &CompilerOptions::default()).unwrap();
    assert_eq!(out.class_name, "Foo");

    assert!(out.ollir.contains("t1.i32 :=.i32 getfield(this, x.i32).i32;"));
    assert!(out.ollir.contains("t2.i32 :=.i32 t1.i32 +.i32 $1.y.i32;"));
    assert!(out.ollir.contains("ret.i32 t2.i32;"));

    let body = method_body(&out.jasmin, ".method public bar(I)I");
    assert!(body.contains(&"getfield Foo/x I".to_string()));
    assert!(body.contains(&"iadd".to_string()));
    assert_eq!(body.last().map(String::as_str), Some("ireturn"));
    assert!(stack_limit(&out.jasmin, ".method public bar(I)I") >= 2);
}

#[test]
fn zero_or_two_constructors() {
    init_logger();
    let symbols = SymbolTable::new("Empty");
    let out = compile_unit(&unit(symbols.clone(), vec![]), &CompilerOptions::default()).unwrap();
    assert_eq!(out.jasmin.matches(".method public <init>()V").count(), 1);
    assert_eq!(
        method_body(&out.jasmin, ".method public <init>()V"),
        vec!["aload_0", "invokespecial java/lang/Object/<init>()V", "return"]
    );

    let two = unit(
        symbols,
        vec![constructor("Empty", vec![]), constructor("Empty", vec![])],
    );
    assert_eq!(
        compile_unit(&two, &CompilerOptions::default()).unwrap_err(),
        GenerationError::MultipleConstructors {
            class: "Empty".into(),
            count: 2
        }
    );
}

#[test]
fn constructor_with_early_return_does_not_fall_off_the_end() {
    init_logger();
    let symbols = SymbolTable::new("A").with_field("x", Type::int());
    let ctor = constructor(
        "A",
        vec![
            if_else(boolean(true), ret(None), None),
            assign("x", int(1)),
        ],
    );
    let out = compile_unit(&unit(symbols, vec![ctor]), &CompilerOptions::default()).unwrap();
    let body = method_body(&out.jasmin, ".method public <init>()V");
    assert_eq!(
        body,
        vec![
            "aload_0",
            "invokespecial java/lang/Object/<init>()V",
            "iconst_1",
            "ifne then_0",
            "goto endif_0",
            "then_0:",
            "return",
            "endif_0:",
            "aload_0",
            "iconst_1",
            "putfield A/x I",
            "return",
        ]
    );
}

#[test]
fn void_method_without_return_returns_exactly_once() {
    init_logger();
    let symbols = SymbolTable::new("A")
        .with_import("io")
        .with_method(MethodSymbols::new("hello", Type::void()));
    let u = unit(
        symbols,
        vec![method(
            "hello",
            vec![expr(call(ident("io"), "println", vec![int(1)]))],
        )],
    );
    let class = lower_unit(&u).unwrap();
    let hello = class.methods.iter().find(|m| m.name == "hello").unwrap();
    let returns = hello
        .instructions
        .iter()
        .filter(|i| i.kind.to_string() == "ret.V")
        .count();
    assert_eq!(returns, 1);

    let out = compile_unit(&u, &CompilerOptions::default()).unwrap();
    let body = method_body(&out.jasmin, ".method public hello()V");
    assert_eq!(body, vec!["iconst_1", "invokestatic io/println(I)V", "return"]);
}

#[test]
fn local_sum_is_one_add_into_the_local() {
    init_logger();
    let symbols = SymbolTable::new("A").with_method(
        MethodSymbols::new("f", Type::void())
            .param("a", Type::int())
            .param("b", Type::int())
            .local("x", Type::int()),
    );
    let u = unit(
        symbols,
        vec![method(
            "f",
            vec![assign("x", binary(BinOp::Add, ident("a"), ident("b")))],
        )],
    );
    let out = compile_unit(&u, &CompilerOptions::default()).unwrap();
    assert!(out.ollir.contains("x.i32 :=.i32 $1.a.i32 +.i32 $2.b.i32;"));
    assert_eq!(
        method_body(&out.jasmin, ".method public f(II)V"),
        vec!["iload_1", "iload_2", "iadd", "istore_3", "return"]
    );
}

#[test]
fn local_shadows_field() {
    let symbols = SymbolTable::new("A")
        .with_field("n", Type::boolean())
        .with_method(MethodSymbols::new("f", Type::int()).local("n", Type::int()));
    let u = unit(
        symbols,
        vec![method("f", vec![assign("n", int(4)), ret(Some(ident("n")))])],
    );
    let out = compile_unit(&u, &CompilerOptions::default()).unwrap();
    assert!(!out.ollir.contains("getfield"));
    assert!(!out.jasmin.contains("getfield"));
    assert!(out.ollir.contains("ret.i32 n.i32;"));
}

#[test]
fn or_skips_right_operand_when_left_is_true() {
    let symbols = SymbolTable::new("A").with_method(
        MethodSymbols::new("f", Type::boolean())
            .param("p", Type::boolean())
            .param("k", Type::int()),
    );
    let rhs = binary(BinOp::Lt, ident("k"), int(3));
    let u = unit(
        symbols,
        vec![method(
            "f",
            vec![ret(Some(binary(BinOp::Or, ident("p"), rhs)))],
        )],
    );
    let class = lower_unit(&u).unwrap();
    let f = class.methods.iter().find(|m| m.name == "f").unwrap();
    let branch = &f.instructions[1];
    assert_eq!(branch.kind.to_string(), "if (t1.bool) goto or_end_0");
    let target = branch.successors[0];
    let comparison_id = f
        .instructions
        .iter()
        .find(|i| i.kind.to_string().contains("<.bool"))
        .map(|i| i.id)
        .unwrap();
    assert!(target > comparison_id);

    let out = compile_unit(&u, &CompilerOptions::default()).unwrap();
    assert!(out.jasmin.contains("ifne or_end_0"));
}

fn loop_unit() -> CompilationUnit {
    let symbols = SymbolTable::new("Loop")
        .with_import("io")
        .with_method(
            MethodSymbols::new("sum", Type::int())
                .param("n", Type::int())
                .local("i", Type::int())
                .local("s", Type::int())
                .local("sq", Type::int()),
        );
    let body: Stmt = block(vec![
        assign("sq", binary(BinOp::Mul, ident("i"), ident("i"))),
        assign("s", binary(BinOp::Add, ident("s"), ident("sq"))),
        assign("i", binary(BinOp::Add, ident("i"), int(1))),
    ]);
    unit(
        symbols,
        vec![method(
            "sum",
            vec![
                assign("i", int(0)),
                assign("s", int(0)),
                while_loop(binary(BinOp::Lt, ident("i"), ident("n")), body),
                if_else(
                    not(binary(BinOp::Lt, ident("s"), int(100))),
                    expr(call(ident("io"), "println", vec![ident("s")])),
                    None,
                ),
                ret(Some(ident("s"))),
            ],
        )],
    )
}

#[test]
fn loop_liveness_reaches_fixpoint() {
    init_logger();
    let class = lower_unit(&loop_unit()).unwrap();
    for m in &class.methods {
        let lv = liveness::analyze(m);
        assert!(lv.is_fixpoint(m), "{}", lv.render(m));
        assert!(lv.passes <= m.instructions.len() + 1);
    }
    let sum = class.methods.iter().find(|m| m.name == "sum").unwrap();
    let lv = liveness::analyze(sum);
    let branch = sum
        .instructions
        .iter()
        .find(|i| i.kind.to_string().starts_with("if (i.i32 <.bool"))
        .unwrap();
    for v in ["i", "n", "s"] {
        assert!(lv.live_in[&branch.id].contains(v), "{} not live at loop head", v);
    }
}

#[test]
fn slot_reuse_shrinks_locals() {
    init_logger();
    let u = loop_unit();
    let plain = compile_unit(&u, &CompilerOptions::default()).unwrap();
    let reuse = compile_unit(
        &u,
        &CompilerOptions {
            register_allocation: Some(0),
            ..CompilerOptions::default()
        },
    )
    .unwrap();
    let locals = |text: &str| -> u32 {
        text.lines()
            .skip_while(|l| !l.starts_with(".method public sum(I)I"))
            .find_map(|l| l.trim().strip_prefix(".limit locals "))
            .and_then(|n| n.parse().ok())
            .unwrap()
    };
    assert!(locals(&reuse.jasmin) <= locals(&plain.jasmin));
    assert_eq!(locals(&plain.jasmin), 6);

    let err = compile_unit(
        &u,
        &CompilerOptions {
            register_allocation: Some(1),
            ..CompilerOptions::default()
        },
    )
    .unwrap_err();
    assert!(matches!(err, GenerationError::RegisterLimit { .. }));
}

#[test]
fn negated_condition_branches_with_ifeq() {
    let out = compile_unit(&loop_unit(), &CompilerOptions::default()).unwrap();
    assert!(out.ollir.contains("if (!.bool t"));
    assert!(out.jasmin.contains("if_icmplt whilebody_0"));
}

#[test]
fn objects_arrays_and_calls() {
    let symbols = SymbolTable::new("Main")
        .with_import("io")
        .with_import("util.Counter")
        .with_field("total", Type::int())
        .with_method(
            MethodSymbols::new("main", Type::void())
                .param("args", Type::new("String", true))
                .local("m", Type::class("Main"))
                .local("r", Type::int()),
        )
        .with_method(
            MethodSymbols::new("run", Type::int())
                .param("size", Type::int())
                .local("xs", Type::int_array())
                .local("c", Type::class("Counter")),
        );
    let run_body = vec![
        assign("xs", new_int_array(ident("size"))),
        array_assign("xs", int(0), int(7)),
        assign("c", new_object("Counter")),
        assign("total", call(ident("c"), "count", vec![index(ident("xs"), int(0))])),
        ret(Some(binary(BinOp::Add, ident("total"), length(ident("xs"))))),
    ];
    let main_body = vec![
        assign("m", new_object("Main")),
        assign("r", call(ident("m"), "run", vec![int(10)])),
        expr(call(ident("io"), "println", vec![ident("r")])),
    ];
    let u = unit(
        symbols,
        vec![method("main", main_body), method("run", run_body)],
    );
    let out = compile_unit(&u, &CompilerOptions::default()).unwrap();

    let run = method_body(&out.jasmin, ".method public run(I)I");
    assert!(run.contains(&"newarray int".to_string()));
    assert!(run.contains(&"iastore".to_string()));
    assert!(run.contains(&"new util/Counter".to_string()));
    assert!(run.contains(&"invokespecial util/Counter/<init>()V".to_string()));
    assert!(run.contains(&"invokevirtual util/Counter/count(I)I".to_string()));
    assert!(run.contains(&"putfield Main/total I".to_string()));
    assert!(run.contains(&"arraylength".to_string()));
    assert!(run.contains(&"iaload".to_string()));

    let main = method_body(&out.jasmin, ".method public static main([Ljava/lang/String;)V");
    assert!(main.contains(&"invokevirtual Main/run(I)I".to_string()));
    assert!(main.contains(&"invokestatic io/println(I)V".to_string()));
}

#[test]
fn field_in_static_method_is_rejected() {
    let symbols = SymbolTable::new("A")
        .with_field("v", Type::int())
        .with_method(
            MethodSymbols::new("main", Type::void()).param("args", Type::new("String", true)),
        )
        .with_import("io");
    let u = unit(
        symbols,
        vec![method(
            "main",
            vec![expr(call(ident("io"), "println", vec![ident("v")]))],
        )],
    );
    assert!(matches!(
        compile_unit(&u, &CompilerOptions::default()),
        Err(GenerationError::UnsupportedNode { .. })
    ));
}

#[test]
fn reported_errors_stop_the_unit() {
    let mut u = foo_unit();
    u.reports.push(Report::warning("unused variable", None));
    assert!(compile_unit(&u, &CompilerOptions::default()).is_ok());
    u.reports.push(Report::error("type mismatch", None));
    assert_eq!(
        compile_unit(&u, &CompilerOptions::default()).unwrap_err(),
        GenerationError::RejectedUnit { errors: 1 }
    );
}

#[test]
fn unit_round_trips_through_json() {
    let u = foo_unit();
    let text = serde_json::to_string(&u).unwrap();
    let back = CompilationUnit::from_json(&text).unwrap();
    let a = compile_unit(&u, &CompilerOptions::default()).unwrap();
    let b = compile_unit(&back, &CompilerOptions::default()).unwrap();
    assert_eq!(a, b);
}
