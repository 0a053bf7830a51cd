//! Unit tests for the evaluator and built-in rules.

use super::*;
use crate::parser::parse;
use rstest::{fixture, rstest};
use std::fs;

#[derive(Debug, Clone)]
struct FakeResolver;

impl PackageResolver for FakeResolver {
    fn resolve(&self, package: &str) -> Result<PackageFlags, PackageConfigError> {
        if package == "missing" {
            return Err(PackageConfigError::Failed {
                program: "pkg-config".into(),
                flag: "--cflags",
                status: "exit status: 1".into(),
                stderr: format!("Package {package} was not found"),
            });
        }
        Ok(PackageFlags {
            cflags: vec![format!("-I/usr/include/{package}")],
            libs: vec![format!("-l{package}")],
        })
    }
}

#[fixture]
fn ctx() -> EvaluationContext {
    let mut ctx = EvaluationContext::with_package_resolver(
        "/repo",
        BuildMode::Debug,
        Toolchain::default(),
        FakeResolver,
    );
    ctx.set_current_dir("app");
    ctx
}

fn run(ctx: &mut EvaluationContext, source: &str) -> Result<Vec<ResolvedTarget>, EvalError> {
    let program = parse(source).expect("parse");
    Evaluator::new(ctx).evaluate_program(&program)
}

#[rstest]
fn cc_binary_in_debug_mode(mut ctx: EvaluationContext) {
    let targets = run(
        &mut ctx,
        r#"cc_binary(name = "server", sources = ["main.cc", "net/http.cc"], includes = ["include"], deps = ["@/lib/core"])"#,
    )
    .expect("evaluate");
    let [target] = targets.as_slice() else {
        panic!("expected one target, got {targets:?}");
    };
    assert_eq!(target.name, "@/app/server");
    assert_eq!(target.sources, vec!["./app/main.cc", "./app/net/http.cc"]);
    assert_eq!(
        target.objects,
        vec!["./build/obj/app/main.o", "./build/obj/app/net/http.o"]
    );
    assert_eq!(target.output, "build/bin/server");
    assert_eq!(target.include_flags, vec!["-I./app/include"]);
    assert!(target.link_flags.is_empty());
    assert_eq!(
        target.build_command,
        "c++ -c @IN@ -o @OBJ@ -I./app/include @ARGS@ -g -O1 -DDEBUG"
    );
    assert_eq!(
        target.link_command,
        "c++ @OBJ@ -o @OUT@ -I./app/include @ARGS@ -g -O1 -DDEBUG"
    );
    assert_eq!(target.deps, vec!["@/lib/core"]);
}

#[test]
fn cc_library_in_release_mode() {
    let mut ctx = EvaluationContext::with_package_resolver(
        "/repo",
        BuildMode::Release,
        Toolchain::default(),
        FakeResolver,
    );
    ctx.set_current_dir("lib");
    let targets = run(&mut ctx, r#"cc_library(name = "core", sources = ["core.cc"])"#)
        .expect("evaluate");
    let target = targets.first().expect("target");
    assert_eq!(target.name, "@/lib/core");
    assert_eq!(target.output, "build/lib/libcore.a");
    assert_eq!(target.link_flags, vec!["-lcore"]);
    assert_eq!(target.build_command, "c++ -c @IN@ -o @OBJ@ @ARGS@ -O2");
    assert_eq!(target.link_command, "ar rcs @OUT@ @OBJ@");
}

#[test]
fn toolchain_overrides_reach_command_templates() {
    let toolchain = Toolchain {
        cxx: "clang++".into(),
        ar: "llvm-ar".into(),
        ..Toolchain::default()
    };
    let mut ctx =
        EvaluationContext::with_package_resolver("/repo", BuildMode::Release, toolchain, FakeResolver);
    let targets = run(&mut ctx, r#"cc_library(name = "x", sources = ["x.cc"])"#).expect("evaluate");
    let target = targets.first().expect("target");
    assert!(target.build_command.starts_with("clang++ -c"));
    assert_eq!(target.link_command, "llvm-ar rcs @OUT@ @OBJ@");
}

#[rstest]
fn root_directory_targets_keep_an_empty_segment(mut ctx: EvaluationContext) {
    ctx.set_current_dir("");
    let targets = run(&mut ctx, r#"cc_binary(name = "tool", sources = ["tool.cc"])"#)
        .expect("evaluate");
    let target = targets.first().expect("target");
    assert_eq!(target.name, "@//tool");
    assert_eq!(target.sources, vec!["./tool.cc"]);
    assert_eq!(target.objects, vec!["./build/obj/tool.o"]);
}

#[rstest]
fn nested_rule_calls_register_targets(mut ctx: EvaluationContext) {
    run(
        &mut ctx,
        r#"cc_binary(name = "app", deps = [cc_library(name = "inner")])"#,
    )
    .expect("evaluate");
    let names: Vec<_> = ctx.targets().keys().map(String::as_str).collect();
    assert_eq!(names, vec!["@/app/inner", "@/app/app"]);
    let app = ctx.target("@/app/app").expect("app");
    assert_eq!(app.deps, vec!["@/app/inner"]);
}

#[rstest]
fn bound_targets_flatten_to_names(mut ctx: EvaluationContext) {
    let targets = run(
        &mut ctx,
        r#"
        core = cc_library(name = "core")
        extra = ["@/third_party/zlib", [core]]
        cc_binary(name = "app", deps = extra)
        "#,
    )
    .expect("evaluate");
    let app = targets.first().expect("app");
    assert_eq!(app.deps, vec!["@/third_party/zlib", "@/app/core"]);
}

#[rstest]
fn bindings_are_lazy(mut ctx: EvaluationContext) {
    run(&mut ctx, r#"lib = cc_library(name = "lazy")"#).expect("evaluate");
    assert!(ctx.targets().is_empty());
}

#[rstest]
fn rebinding_changes_later_references(mut ctx: EvaluationContext) {
    run(
        &mut ctx,
        r#"
        x = cc_library(name = "a")
        cc_binary(name = "b", deps = [x])
        x = cc_library(name = "c")
        cc_binary(name = "d", deps = [x])
        "#,
    )
    .expect("evaluate");
    let deps = |name: &str| ctx.target(name).map(|t| t.deps.clone());
    assert_eq!(deps("@/app/b"), Some(vec!["@/app/a".to_owned()]));
    assert_eq!(deps("@/app/d"), Some(vec!["@/app/c".to_owned()]));
    assert!(ctx.target("@/app/a").is_some());
    assert!(ctx.target("@/app/c").is_some());
}

#[test]
fn every_reference_reruns_the_bound_call() {
    struct Tick(std::rc::Rc<std::cell::Cell<usize>>);
    impl Rule for Tick {
        fn call(&self, _args: &RuleArgs, _ctx: &RuleContext<'_>) -> Result<RuleOutput, EvalError> {
            self.0.set(self.0.get() + 1);
            Ok(RuleOutput::Paths(Vec::new()))
        }
    }

    let calls = std::rc::Rc::new(std::cell::Cell::new(0));
    let mut ctx = EvaluationContext::without_rules("/repo", BuildMode::Debug, Toolchain::default());
    ctx.register_rule("tick", Tick(std::rc::Rc::clone(&calls)));
    run(&mut ctx, "x = tick()
[x, x]
x").expect("evaluate");
    assert_eq!(calls.get(), 3);
}

#[rstest]
fn later_registration_replaces_earlier(mut ctx: EvaluationContext) {
    run(
        &mut ctx,
        r#"
        cc_library(name = "dup", sources = ["a.cc"])
        cc_library(name = "dup", sources = ["b.cc"])
        "#,
    )
    .expect("evaluate");
    assert_eq!(ctx.targets().len(), 1);
    let dup = ctx.target("@/app/dup").expect("dup");
    assert_eq!(dup.sources, vec!["./app/b.cc"]);
}

#[rstest]
fn undefined_variable(mut ctx: EvaluationContext) {
    let err = run(&mut ctx, "nope").expect_err("fails");
    assert!(matches!(err, EvalError::UndefinedVariable { name } if name == "nope"));
    assert_eq!(
        run(&mut ctx, "nope").expect_err("fails").to_string(),
        "undefined variable: nope"
    );
}

#[rstest]
fn unknown_rule_is_reported_before_arguments(mut ctx: EvaluationContext) {
    let err = run(
        &mut ctx,
        r#"cc_test(name = "t", deps = [cc_library(name = "side")])"#,
    )
    .expect_err("fails");
    assert!(matches!(err, EvalError::UndefinedRule { name } if name == "cc_test"));
    assert!(ctx.targets().is_empty());
}

#[rstest]
fn self_referencing_binding_is_an_error(mut ctx: EvaluationContext) {
    let err = run(&mut ctx, "loop = [loop]\nloop").expect_err("fails");
    assert!(matches!(err, EvalError::RecursiveVariable { name } if name == "loop"));
}

#[rstest]
#[case(r#"cc_binary(sources = ["a.cc"])"#, "cc_binary() requires a name")]
#[case(r#"cc_library(name = "")"#, "cc_library() requires a name")]
#[case(r#"glob()"#, "glob() requires a pattern")]
#[case(r#"system_cc_library(name = "z")"#, "system_cc_library() requires a pkgconfig")]
fn missing_required_arguments(
    mut ctx: EvaluationContext,
    #[case] source: &str,
    #[case] message: &str,
) {
    let err = run(&mut ctx, source).expect_err("fails");
    assert!(matches!(err, EvalError::MissingArgument { .. }));
    assert_eq!(err.to_string(), message);
}

#[rstest]
fn list_where_string_expected(mut ctx: EvaluationContext) {
    let err = run(&mut ctx, r#"cc_binary(name = ["a", "b"])"#).expect_err("fails");
    assert!(matches!(
        err,
        EvalError::InvalidArgument { ref rule, ref arg, .. } if rule == "cc_binary" && arg == "name"
    ));
}

#[rstest]
fn scalar_where_list_expected(mut ctx: EvaluationContext) {
    let targets = run(&mut ctx, r#"cc_binary(name = "a", sources = "main.cc")"#)
        .expect("evaluate");
    assert_eq!(
        targets.first().map(|t| t.sources.clone()),
        Some(vec!["./app/main.cc".to_owned()])
    );
}

#[rstest]
fn target_where_paths_expected(mut ctx: EvaluationContext) {
    let source = r#"
        lib = cc_library(name = "lib")
        cc_binary(name = "a", sources = [lib])
    "#;
    let err = run(&mut ctx, source).expect_err("fails");
    assert!(matches!(
        err,
        EvalError::InvalidArgument { ref arg, .. } if arg == "sources"
    ));
}

#[rstest]
fn system_library_is_virtual(mut ctx: EvaluationContext) {
    ctx.set_current_dir("third_party");
    let targets = run(&mut ctx, r#"system_cc_library(name = "zlib", pkgconfig = "zlib")"#)
        .expect("evaluate");
    let target = targets.first().expect("target");
    assert_eq!(target.name, "@/third_party/zlib");
    assert_eq!(target.include_flags, vec!["-I/usr/include/zlib"]);
    assert_eq!(target.link_flags, vec!["-lzlib"]);
    assert!(target.is_virtual());
    assert!(target.deps.is_empty());
}

#[rstest]
fn system_library_resolver_failure(mut ctx: EvaluationContext) {
    let err = run(&mut ctx, r#"system_cc_library(name = "m", pkgconfig = "missing")"#)
        .expect_err("fails");
    assert!(matches!(err, EvalError::PackageConfig { package, .. } if package == "missing"));
}

#[test]
fn glob_feeds_sources() {
    let dir = tempfile::tempdir().expect("tempdir");
    let app = dir.path().join("app");
    fs::create_dir_all(app.join("sub")).expect("mkdir");
    for file in ["b.cc", "a.cc", "sub/c.cc", "notes.txt"] {
        fs::write(app.join(file), "").expect("write");
    }
    let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf8");
    let mut ctx =
        EvaluationContext::with_package_resolver(root, BuildMode::Debug, Toolchain::default(), FakeResolver);
    ctx.set_current_dir("app");

    let targets = run(
        &mut ctx,
        r#"cc_binary(name = "app", sources = glob(pattern = "**/*.cc"))"#,
    )
    .expect("evaluate");
    let target = targets.first().expect("target");
    assert_eq!(
        target.sources,
        vec!["./app/a.cc", "./app/b.cc", "./app/sub/c.cc"]
    );
    assert_eq!(target.objects.len(), target.sources.len());
}

#[rstest]
fn evaluating_a_target_node_returns_it(mut ctx: EvaluationContext) {
    let target = ResolvedTarget {
        name: "@/x".into(),
        ..ResolvedTarget::default()
    };
    let value = Evaluator::new(&mut ctx)
        .evaluate(&Node::Target(Box::new(target.clone())))
        .expect("evaluate");
    assert_eq!(value, Value::Target(Box::new(target)));
    assert!(ctx.targets().is_empty());
}

#[test]
fn custom_rules_can_be_registered() {
    struct Echo;
    impl Rule for Echo {
        fn call(&self, args: &RuleArgs, _ctx: &RuleContext<'_>) -> Result<RuleOutput, EvalError> {
            Ok(RuleOutput::Paths(args.list("items")))
        }
    }

    let mut ctx = EvaluationContext::without_rules("/repo", BuildMode::Debug, Toolchain::default());
    ctx.register_rule("echo", Echo);
    let program = parse(r#"echo(items = ["a", ["b", "c"]])"#).expect("parse");
    let Some(Item::Expr(node)) = program.items.first() else {
        panic!("expected expression");
    };
    let value = Evaluator::new(&mut ctx).evaluate(node).expect("evaluate");
    assert_eq!(
        value,
        Value::List(vec![
            Value::String("a".into()),
            Value::String("b".into()),
            Value::String("c".into()),
        ])
    );
}
