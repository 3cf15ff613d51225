mod common;

#[cfg(test)]
mod repl_tests {
    use super::common::Repl;

    use popl as lang;

    use lang::diagnostics::Diagnostics;
    use lang::scanner::scan_tokens;
    use lang::session::{is_source_complete, is_statement_complete, RunStatus};

    #[test]
    fn test_globals_survive_between_entries() {
        let mut repl = Repl::new();

        assert_eq!(repl.enter("var a = 1;").status, RunStatus::Ok);

        let outcome = repl.enter("a + 1;");
        assert_eq!(outcome.status, RunStatus::Ok);
        assert_eq!(outcome.output, "2\n");
    }

    #[test]
    fn test_echo_skips_nil() {
        let mut repl = Repl::new();

        assert_eq!(repl.enter("nil;").output, "");
        assert_eq!(repl.enter("print(3);").output, "3\n");
        assert_eq!(repl.enter("\"text\";").output, "text\n");
    }

    #[test]
    fn test_echo_rejects_uninitialized() {
        let mut repl = Repl::new();
        repl.enter("var u;");

        let outcome = repl.enter("u;");

        assert_eq!(outcome.status, RunStatus::RuntimeError);
        assert_eq!(outcome.errors, vec!["Use of uninitialized value.\n[line 1]"]);
    }

    #[test]
    fn test_session_continues_after_static_error() {
        let mut repl = Repl::new();

        let outcome = repl.enter("var = ;");
        assert_eq!(outcome.status, RunStatus::StaticError);
        assert_eq!(outcome.errors.len(), 1);

        assert_eq!(repl.enter("var a = 4;").status, RunStatus::Ok);
        assert_eq!(repl.enter("a;").output, "4\n");
    }

    #[test]
    fn test_session_continues_after_runtime_error() {
        let mut repl = Repl::new();

        let outcome = repl.enter("var d = 1;\n{ var b = 1; d = nil + b; }");
        assert_eq!(outcome.status, RunStatus::RuntimeError);
        assert_eq!(
            outcome.errors,
            vec!["Operands must be two numbers or two strings.\n[line 2]"]
        );

        // Statements before the failure took effect; the block scope did not leak.
        assert_eq!(repl.enter("d;").output, "1\n");
        assert_eq!(repl.enter("var c = 2;").status, RunStatus::Ok);
        assert_eq!(repl.enter("c;").output, "2\n");
    }

    #[test]
    fn test_closures_defined_on_earlier_lines() {
        let mut repl = Repl::new();

        repl.enter("fun make() { var n = 0; fun inc() { n = n + 1; return n; } return inc; }");
        repl.enter("var f = make();");

        assert_eq!(repl.enter("f();").output, "1\n");
        assert_eq!(repl.enter("f();").output, "2\n");
    }

    #[test]
    fn test_entries_are_retained() {
        let mut repl = Repl::new();

        repl.enter("var a = 1;");
        repl.enter("fun f() { return a; }");
        repl.enter("var = ;");

        assert_eq!(repl.session.history().len(), 2);
    }

    fn complete(source: &str) -> bool {
        let mut diagnostics = Diagnostics::new();
        is_statement_complete(&scan_tokens(source, &mut diagnostics))
    }

    #[test]
    fn test_statement_completeness() {
        assert!(complete("var a = 1;"));
        assert!(complete("fun f() {\n  return 1;\n}"));
        assert!(complete("for (var i = 0; i < 2; i = i + 1) print(i);"));

        assert!(!complete(""));
        assert!(!complete("1 + 2"));
        assert!(!complete("fun f() {"));
        assert!(!complete("print(1"));
        assert!(!complete("for (var i = 0;"));

        // Stray closers are left for the parser to report.
        assert!(complete("}"));
    }

    #[test]
    fn test_open_string_needs_more_lines() {
        assert!(!is_source_complete("var s = \"first line"));
        assert!(is_source_complete("var s = \"first line\nsecond\";"));
    }
}
