mod common;

#[cfg(test)]
mod interpreter_tests {
    use super::common;
    use super::common::Outcome;

    use popl::session::RunStatus;

    fn run_ok(source: &str) -> String {
        let outcome: Outcome = common::run(source);

        assert_eq!(
            outcome.status,
            RunStatus::Ok,
            "program failed: {:?}",
            outcome.errors
        );

        outcome.output
    }

    fn runtime_error(source: &str) -> Outcome {
        let outcome: Outcome = common::run(source);

        assert_eq!(outcome.status, RunStatus::RuntimeError, "{:?}", outcome.errors);
        assert_eq!(outcome.errors.len(), 1);

        outcome
    }

    // ───── closures and scoping ─────

    #[test]
    fn test_counter_closure_keeps_its_state() {
        let output = run_ok(
            r#"
            fun makeCounter() {
                var count = 0;
                fun counter() {
                    count = count + 1;
                    return count;
                }
                return counter;
            }

            var c = makeCounter();
            print(c());
            print(c());
            "#,
        );

        assert_eq!(output, "1\n2\n");
    }

    #[test]
    fn test_sibling_closures_share_their_scope() {
        let output = run_ok(
            r#"
            var get;
            var set;
            {
                var shared = 0;
                get = fun () { return shared; };
                set = fun (v) { shared = v; };
            }
            set(5);
            print(get());
            "#,
        );

        assert_eq!(output, "5\n");
    }

    #[test]
    fn test_closure_binds_to_declaration_scope() {
        let output = run_ok(
            r#"
            var a = "global";
            {
                fun show() { print(a); }
                show();
                var a = "block";
                show();
                print(a);
            }
            "#,
        );

        assert_eq!(output, "global\nglobal\nblock\n");
    }

    #[test]
    fn test_recursion() {
        let output = run_ok(
            r#"
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print(fib(10));
            "#,
        );

        assert_eq!(output, "55\n");
    }

    // ───── control flow ─────

    #[test]
    fn test_break_only_leaves_the_innermost_loop() {
        let output = run_ok(
            r#"
            for (var i = 0; i < 3; i = i + 1) {
                for (var j = 0; j < 3; j = j + 1) {
                    if (j == 1) break;
                    print(i * 10 + j);
                }
            }
            "#,
        );

        assert_eq!(output, "0\n10\n20\n");
    }

    #[test]
    fn test_continue_in_for_still_runs_the_increment() {
        let output = run_ok(
            "for (var i = 0; i < 5; i = i + 1) { if (i == 2) continue; print(i); }",
        );

        assert_eq!(output, "0\n1\n3\n4\n");
    }

    #[test]
    fn test_continue_in_while() {
        let output = run_ok(
            "var i = 0; while (i < 3) { i = i + 1; if (i == 2) continue; print(i); }",
        );

        assert_eq!(output, "1\n3\n");
    }

    #[test]
    fn test_return_unwinds_through_loops() {
        let output = run_ok(
            r#"
            fun find() {
                var i = 0;
                while (true) {
                    if (i == 3) return i;
                    i = i + 1;
                }
            }
            print(find());
            "#,
        );

        assert_eq!(output, "3\n");
    }

    #[test]
    fn test_function_without_return_yields_nil() {
        assert_eq!(run_ok("fun f() {} print(f());"), "nil\n");
    }

    // ───── classes ─────

    #[test]
    fn test_class_init_fields_and_methods() {
        let output = run_ok(
            r#"
            class Point {
                init(x, y) {
                    this.x = x;
                    this.y = y;
                }
                sum() { return this.x + this.y; }
            }

            var p = Point(1, 2);
            print(p.sum());
            p.x = 10;
            print(p.sum());

            var m = p.sum;
            print(m());

            print(p.init(3, 4) == p);
            print(p.sum());

            print(p);
            print(Point);
            "#,
        );

        assert_eq!(output, "3\n12\n12\ntrue\n7\nPoint instance\nPoint\n");
    }

    #[test]
    fn test_fields_shadow_methods() {
        let output = run_ok(
            r#"
            class A { name() { return "method"; } }
            var a = A();
            a.name = "field";
            print(a.name);
            "#,
        );

        assert_eq!(output, "field\n");
    }

    #[test]
    fn test_undefined_property() {
        let outcome = runtime_error("class A {}\nvar a = A();\nprint(a.missing);");

        assert_eq!(outcome.errors, vec!["Undefined property 'missing'.\n[line 3]"]);
    }

    #[test]
    fn test_properties_need_instances() {
        let outcome = runtime_error("var n = 1; print(n.x);");
        assert_eq!(outcome.errors, vec!["Only instances have properties.\n[line 1]"]);

        let outcome = runtime_error("var n = 1; n.x = 2;");
        assert_eq!(outcome.errors, vec!["Only instances have fields.\n[line 1]"]);
    }

    // ───── calls ─────

    #[test]
    fn test_arity_mismatch_does_not_run_the_body() {
        let outcome = runtime_error("fun f(a) { print(\"ran\"); return a; }\nf(1, 2);");

        assert_eq!(outcome.output, "");
        assert_eq!(
            outcome.errors,
            vec!["Expected 1 arguments but got 2.\n[line 2]"]
        );
    }

    #[test]
    fn test_class_arity_follows_init() {
        let outcome = runtime_error("class A { init(a) { this.a = a; } }\nA();");

        assert_eq!(
            outcome.errors,
            vec!["Expected 1 arguments but got 0.\n[line 2]"]
        );
    }

    #[test]
    fn test_calling_a_non_callable() {
        let outcome = runtime_error("\"str\"();");

        assert_eq!(
            outcome.errors,
            vec!["Can only call functions and classes.\n[line 1]"]
        );
    }

    #[test]
    fn test_runaway_recursion_is_a_runtime_error() {
        let outcome = common::run("fun r() { r(); }\nr();");

        assert_eq!(outcome.status, RunStatus::RuntimeError);
        assert_eq!(outcome.errors, vec!["Stack overflow.\n[line 1]"]);
    }

    #[test]
    fn test_deep_recursion_within_the_limit() {
        let output = run_ok(
            r#"
            fun sum(n) {
                if (n == 0) return 0;
                return n + sum(n - 1);
            }
            print(sum(500));
            "#,
        );

        assert_eq!(output, "125250\n");
    }

    #[test]
    fn test_deep_recursion_through_nested_blocks() {
        let output = run_ok(
            r#"
            fun d(n) {
                var i = 0;
                while (i < 1) {
                    i = i + 1;
                    {
                        {
                            {
                                if (n > 0) return d(n - 1) + 1;
                            }
                        }
                    }
                }
                return 0;
            }
            print(d(600));
            "#,
        );

        assert_eq!(output, "600\n");
    }

    // ───── operators ─────

    #[test]
    fn test_string_concatenation_rules() {
        let output = run_ok(
            r#"
            print("a" + "b");
            print("n" + 1);
            print(1 + "n");
            print(1 + 2);
            print("x" + true);
            "#,
        );

        assert_eq!(output, "ab\nn1\n1n\n3\nxtrue\n");

        let outcome = runtime_error("print(true + 1);");
        assert_eq!(
            outcome.errors,
            vec!["Operands must be two numbers or two strings.\n[line 1]"]
        );
    }

    #[test]
    fn test_numeric_operand_checks() {
        let outcome = runtime_error("print(-\"x\");");
        assert_eq!(outcome.errors, vec!["Operand must be a number.\n[line 1]"]);

        let outcome = runtime_error("print(1 < \"x\");");
        assert_eq!(outcome.errors, vec!["Operands must be numbers.\n[line 1]"]);
    }

    #[test]
    fn test_division_by_zero() {
        let outcome = runtime_error("print(1 / 0);");

        assert_eq!(outcome.errors, vec!["Division by zero.\n[line 1]"]);
    }

    #[test]
    fn test_both_operands_run_before_the_uninitialized_check() {
        let outcome = runtime_error(
            "var x;\nfun side() { print(\"side\"); return 1; }\nprint(x + side());",
        );

        assert_eq!(outcome.output, "side\n");
        assert_eq!(outcome.errors, vec!["Use of uninitialized value.\n[line 3]"]);
    }

    #[test]
    fn test_uninitialized_values() {
        let outcome = runtime_error("var x;\nprint(x + 1);");
        assert_eq!(outcome.errors, vec!["Use of uninitialized value.\n[line 2]"]);

        let outcome = runtime_error("var y;\nprint(y);");
        assert_eq!(outcome.errors, vec!["Use of uninitialized value.\n[line 2]"]);

        // As a condition it is simply falsy.
        assert_eq!(
            run_ok("var z; if (z) print(\"yes\"); else print(\"no\");"),
            "no\n"
        );
    }

    #[test]
    fn test_logical_ternary_and_comma() {
        let output = run_ok(
            r#"
            print(nil or "default");
            print(false and 1);
            print(1 ? "yes" : "no");
            print(nil ? "yes" : "no");
            print((1, 2));
            "#,
        );

        assert_eq!(output, "default\nfalse\nyes\nno\n2\n");
    }

    #[test]
    fn test_equality() {
        let output = run_ok(
            r#"
            print(nil == nil);
            print(1 == "1");
            print("a" != "a");
            print(clock == clock);
            "#,
        );

        assert_eq!(output, "true\nfalse\nfalse\ntrue\n");
    }

    #[test]
    fn test_value_display() {
        let output = run_ok(
            r#"
            print(1.5);
            print(-0.25);
            print(100);
            print(fun () {});
            fun named() {}
            print(named);
            print(clock);
            "#,
        );

        assert_eq!(
            output,
            "1.5\n-0.25\n100\n<fn anonymous>\n<fn named>\n<native fn clock>\n"
        );
    }

    // ───── errors and natives ─────

    #[test]
    fn test_runtime_error_aborts_remaining_statements() {
        let outcome = runtime_error("print(1);\nprint(nil + 1);\nprint(2);");

        assert_eq!(outcome.output, "1\n");
        assert_eq!(
            outcome.errors,
            vec!["Operands must be two numbers or two strings.\n[line 2]"]
        );
    }

    #[test]
    fn test_undefined_variable() {
        let outcome = runtime_error("print(ghost);");

        assert_eq!(outcome.errors, vec!["Undefined variable 'ghost'.\n[line 1]"]);
    }

    #[test]
    fn test_input_reads_lines_until_end() {
        let outcome = common::run_with_input(
            "var line = input();\nprint(\"got \" + line);\nprint(input());",
            "hello\r\n",
        );

        assert_eq!(outcome.status, RunStatus::Ok);
        assert_eq!(outcome.output, "got hello\nnil\n");
    }

    #[test]
    fn test_clock_is_a_positive_number() {
        assert_eq!(run_ok("print(clock() > 0);"), "true\n");
    }
}
