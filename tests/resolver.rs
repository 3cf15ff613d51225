mod common;

#[cfg(test)]
mod resolver_tests {
    use super::common;

    use popl as lang;

    use lang::diagnostics::Diagnostics;
    use lang::resolver::{Resolutions, Resolver};
    use lang::session::RunStatus;

    /// Parses cleanly, then resolves with a fresh diagnostics context.
    fn resolve(source: &str) -> (Resolutions, Vec<String>) {
        let (statements, parse_diagnostics) = common::parse(source);
        assert!(!parse_diagnostics.had_error());

        let mut diagnostics = Diagnostics::new();
        let resolutions = Resolver::new(&mut diagnostics).resolve(&statements);

        let reports = diagnostics
            .reports()
            .iter()
            .map(|e| e.to_string())
            .collect();

        (resolutions, reports)
    }

    #[test]
    fn test_own_initializer_at_top_level() {
        let outcome = common::run("var x = x;");

        assert_eq!(outcome.status, RunStatus::StaticError);
        assert_eq!(
            outcome.errors,
            vec!["[line 1] Error at 'x': Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn test_own_initializer_in_block_and_through_shadowing() {
        let outcome = common::run("{ var x = x; }");
        assert_eq!(outcome.status, RunStatus::StaticError);
        assert!(outcome.has_error("Can't read local variable in its own initializer."));

        let outcome = common::run("var a = 1;\n{\n  var a = a + 1;\n  print(a);\n}");
        assert_eq!(outcome.status, RunStatus::StaticError);
        assert!(outcome.has_error("[line 3] Error at 'a': Can't read local variable"));
    }

    #[test]
    fn test_assignment_in_own_initializer() {
        let outcome = common::run("{ var a = (a = 1); print(a); }");

        assert_eq!(outcome.status, RunStatus::StaticError);
        assert_eq!(outcome.output, "");
        assert_eq!(
            outcome.errors,
            vec!["[line 1] Error at 'a': Can't read local variable in its own initializer."]
        );
    }

    #[test]
    fn test_global_initializer_may_read_other_globals() {
        let outcome = common::run("var a = 1; var b = a + 1; print(b);");

        assert_eq!(outcome.status, RunStatus::Ok);
        assert_eq!(outcome.output, "2\n");
    }

    #[test]
    fn test_redeclaration_in_same_local_scope() {
        let outcome = common::run("{ var a = 1; var a = 2; print(a); }");

        assert_eq!(outcome.status, RunStatus::StaticError);
        assert!(outcome.has_error("Error at 'a': Variable 'a' already declared in this scope."));
    }

    #[test]
    fn test_global_redeclaration_is_allowed() {
        let outcome = common::run("var a = 1; var a = 2; print(a);");

        assert_eq!(outcome.status, RunStatus::Ok);
        assert_eq!(outcome.output, "2\n");
    }

    #[test]
    fn test_unused_locals_are_reported_in_source_order() {
        let outcome = common::run("{\n  var b = 1;\n  var a = 2;\n}");

        assert_eq!(outcome.status, RunStatus::StaticError);
        assert_eq!(
            outcome.errors,
            vec![
                "[line 2] Error at 'b': Unused local variable 'b'.",
                "[line 3] Error at 'a': Unused local variable 'a'.",
            ]
        );
    }

    #[test]
    fn test_alike_unused_locals_are_each_reported() {
        let outcome = common::run("{ var a = 1; } { var a = 2; }");

        assert_eq!(
            outcome.errors,
            vec![
                "[line 1] Error at 'a': Unused local variable 'a'.",
                "[line 1] Error at 'a': Unused local variable 'a'.",
            ]
        );
    }

    #[test]
    fn test_unused_parameter() {
        let outcome = common::run("fun f(a) { return 1; }\nprint(f(1));");

        assert_eq!(outcome.status, RunStatus::StaticError);
        assert_eq!(
            outcome.errors,
            vec!["[line 1] Error at 'a': Unused local variable 'a'."]
        );
    }

    #[test]
    fn test_assignment_and_recursion_count_as_use() {
        let outcome = common::run(
            "{ var a; a = 1; }\n{ fun f(n) { if (n > 0) f(n - 1); } f(2); }",
        );

        assert_eq!(outcome.status, RunStatus::Ok, "{:?}", outcome.errors);
    }

    #[test]
    fn test_static_error_prevents_execution() {
        let outcome = common::run("print(1);\n{ var unused = 1; }");

        assert_eq!(outcome.status, RunStatus::StaticError);
        assert_eq!(outcome.output, "");
    }

    #[test]
    fn test_this_outside_class() {
        let outcome = common::run("print(this);");

        assert_eq!(
            outcome.errors,
            vec!["[line 1] Error at 'this': Can't use 'this' outside of a class."]
        );
    }

    #[test]
    fn test_return_value_from_initializer() {
        let outcome = common::run("class A { init() { return 1; } }");

        assert_eq!(
            outcome.errors,
            vec!["[line 1] Error at 'return': Can't return a value from an initializer."]
        );

        let outcome = common::run("class B { init() { return; } }\nprint(B());");
        assert_eq!(outcome.status, RunStatus::Ok);
        assert_eq!(outcome.output, "B instance\n");
    }

    #[test]
    fn test_resolver_checks_control_flow_context_on_its_own() {
        let (statements, _) = common::parse("fun f() { return; }\nbreak;\ncontinue;");

        let mut diagnostics = Diagnostics::new();
        Resolver::new(&mut diagnostics).resolve(&statements);

        let reports: Vec<String> = diagnostics
            .reports()
            .iter()
            .map(|e| e.to_string())
            .collect();

        assert_eq!(
            reports,
            vec![
                "[line 2] Error at 'break': Can't use 'break' outside of a loop.",
                "[line 3] Error at 'continue': Can't use 'continue' outside of a loop.",
            ]
        );
    }

    #[test]
    fn test_misplaced_break_is_reported_once() {
        let outcome = common::run("break;");

        assert_eq!(
            outcome.errors,
            vec!["[line 1] Error at 'break': Can't use 'break' outside of a loop."]
        );
    }

    #[test]
    fn test_depths_are_recorded_for_locals_only() {
        let (resolutions, reports) = resolve("{ var a = 1; { print(a); } }");

        assert!(reports.is_empty(), "{:?}", reports);
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions.values().copied().collect::<Vec<_>>(), vec![1]);

        let (resolutions, reports) = resolve("var g = 1; print(g);");

        assert!(reports.is_empty());
        assert!(resolutions.is_empty());
    }

    #[test]
    fn test_closure_reference_depth() {
        let (resolutions, reports) =
            resolve("fun outer() { var x = 1; fun inner() { return x; } return inner; }");

        assert!(reports.is_empty(), "{:?}", reports);

        let mut depths: Vec<usize> = resolutions.values().copied().collect();
        depths.sort();

        // `x` from inside `inner` is one scope up, `inner` itself is local.
        assert_eq!(depths, vec![0, 1]);
    }
}
