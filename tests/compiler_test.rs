mod common;

use arbitrary::Unstructured;
use arbtest::arbtest;
use assert2::{check, let_assert};
use common::{run, run_fresh, Failure};
use loxc::{compile, world::value::NumberDisplay, World};

fn output(source: &str) -> Vec<String> {
    let_assert!(Ok(lines) = run_fresh(source));
    lines
}

fn compile_errors(source: &str) -> Vec<String> {
    let_assert!(Err(Failure::Compile(errors)) = run_fresh(source));
    errors
}

#[test]
fn arithmetic_follows_precedence() {
    check!(output("print 2 + 3 * 4 - 6 / 2;") == ["11"]);
    check!(output("print (2 + 3) * 4;") == ["20"]);
    check!(output("print -2 * -3;") == ["6"]);
    check!(output("print 10 - 4 - 3;") == ["3"]);
    check!(output("print 1 < 2 == true;") == ["true"]);
    check!(output("print !nil == !false;") == ["true"]);
    check!(output("print 3 >= 3; print 3 <= 2; print 1 != 1;") == ["true", "false", "false"]);
}

#[test]
fn if_else_runs_exactly_one_branch() {
    check!(output(r#"if (1 < 2) print "then"; else print "else";"#) == ["then"]);
    check!(output(r#"if (nil) print "then"; else print "else";"#) == ["else"]);
    // without an else-branch the condition is still popped on both paths
    check!(output(r#"if (false) print "skipped"; print "after";"#) == ["after"]);
    check!(output(r#"if (true) { var a = "in block"; print a; } print "after";"#) == ["in block", "after"]);
}

#[test]
fn logical_operators_short_circuit() {
    check!(output(r#"print nil or "default";"#) == ["default"]);
    check!(output(r#"print "first" or missing;"#) == ["first"]);
    check!(output("print 1 and 2;") == ["2"]);
    check!(output("print false and missing;") == ["false"]);
    check!(output("print nil or false and true;") == ["false"]);
}

#[test]
fn loops() {
    check!(output("var n = 3; while (n > 0) { print n; n = n - 1; }") == ["3", "2", "1"]);
    check!(
        output("var sum = 0; for (var i = 1; i <= 4; i = i + 1) sum = sum + i; print sum;")
            == ["10"]
    );
    check!(output("for (var i = 0; i < 2;) { print i; i = i + 1; }") == ["0", "1"]);
    check!(output("var i = 0; for (; i < 2; i = i + 1) print i; print i;") == ["0", "1", "2"]);
}

#[test]
fn scopes_shadow_and_clean_up() {
    let source = r#"
        var a = "global";
        {
            var a = "outer";
            {
                var a = "inner";
                print a;
            }
            print a;
        }
        print a;
    "#;
    check!(output(source) == ["inner", "outer", "global"]);

    // every local is popped on the way out, or the machine would report leftover values
    check!(output("{ var a = 1; var b = 2; { var c = a + b; print c; } } print 0;") == ["3", "0"]);
}

#[test]
fn assignment_is_an_expression() {
    check!(output("var a; var b; a = b = 5; print a; print b;") == ["5", "5"]);
    check!(output("{ var a; var b; a = b = 1; print a + b; }") == ["2"]);
}

#[test]
fn strings_are_interned() {
    check!(output(r#"print "a" + "b" == "ab";"#) == ["true"]);
    check!(output(r#"var s = "x"; print s == "x";"#) == ["true"]);
}

#[test]
fn globals_survive_across_compilations() {
    let mut world = World::new();
    let_assert!(Ok(_) = run(&mut world, "var counter = 1;"));
    let_assert!(Ok(lines) = run(&mut world, "counter = counter + 1; print counter;"));
    check!(lines == ["2"]);
}

#[test]
fn undefined_global_fails_at_runtime() {
    let_assert!(Err(Failure::Runtime(message)) = run_fresh("print nope;"));
    check!(message == "Undefined variable 'nope'.");

    let_assert!(Err(Failure::Runtime(message)) = run_fresh("nope = 1;"));
    check!(message == "Undefined variable 'nope'.");
}

#[test]
fn independent_errors_are_all_reported() {
    let errors = compile_errors("print 1 +;\n{ var a = a; }\nvar 1;\n(1 + 2) = 3;");
    check!(
        errors
            == [
                "[line 1] Error at ';': Expect expression.",
                "[line 2] Error at 'a': Can't read local variable in its own initializer.",
                "[line 3] Error at '1': Expect variable name.",
                "[line 4] Error at '=': Invalid assignment target.",
            ]
    );
}

#[test]
fn panic_mode_reports_once_per_statement() {
    check!(compile_errors("print (((;") == ["[line 1] Error at ';': Expect expression."]);
    check!(compile_errors("var = = = ;\nprint 1;") == ["[line 1] Error at '=': Expect variable name."]);
}

#[test]
fn errors_at_end_of_input() {
    check!(compile_errors("print") == ["[line 1] Error at end: Expect expression."]);
    check!(compile_errors("{\n var a;\n") == ["[line 3] Error at end: Expect '}' after block."]);
}

#[test]
fn compile_errors_keep_spans() {
    let mut world = World::new();
    let source = "var x = 1;\nx + = 2;";
    let compiled = compile(&mut world, source);
    let_assert!([error] = compiled.errors.as_slice());
    check!(&source[error.span.clone()] == "=");
    check!(error.line == 2);
}

/// Arithmetic over small integers, rendered with full parentheses.
#[derive(Debug)]
enum Expr {
    Num(u8),
    Neg(Box<Expr>),
    Bin(char, Box<Expr>, Box<Expr>),
}

impl Expr {
    fn generate(u: &mut Unstructured<'_>, depth: u32) -> arbitrary::Result<Self> {
        if depth == 0 || u.ratio(1, 3)? {
            return Ok(Self::Num(u.arbitrary()?));
        }
        if u.ratio(1, 5)? {
            return Ok(Self::Neg(Box::new(Self::generate(u, depth - 1)?)));
        }
        let op = *u.choose(&['+', '-', '*'])?;
        Ok(Self::Bin(
            op,
            Box::new(Self::generate(u, depth - 1)?),
            Box::new(Self::generate(u, depth - 1)?),
        ))
    }

    fn source(&self) -> String {
        match self {
            Self::Num(n) => n.to_string(),
            Self::Neg(inner) => format!("-({})", inner.source()),
            Self::Bin(op, lhs, rhs) => format!("({} {op} {})", lhs.source(), rhs.source()),
        }
    }

    fn eval(&self) -> f64 {
        match self {
            Self::Num(n) => f64::from(*n),
            Self::Neg(inner) => -inner.eval(),
            Self::Bin('+', lhs, rhs) => lhs.eval() + rhs.eval(),
            Self::Bin('-', lhs, rhs) => lhs.eval() - rhs.eval(),
            Self::Bin(_, lhs, rhs) => lhs.eval() * rhs.eval(),
        }
    }
}

#[test]
fn arithmetic_matches_a_reference_evaluator() {
    arbtest(|u| {
        let expr = Expr::generate(u, 5)?;
        let source = format!("print {};", expr.source());
        let_assert!(Ok(lines) = run_fresh(&source));
        check!(lines == [NumberDisplay(expr.eval()).to_string()], "source: {source}");
        Ok(())
    });
}
