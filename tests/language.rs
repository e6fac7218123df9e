//! End-to-end language tests: parse a source snippet, run it with captured
//! output, and check what came out the other side.

use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use indoc::indoc;
use pretty_assertions::assert_eq;

use ocl_script::interpreter::{Interpreter, Value};
use ocl_script::native::{RenderGateway, WindowHandle};
use ocl_script::parser;

fn run(source: &str) -> String {
    run_with_input(source, "")
}

fn run_with_input(source: &str, input: &str) -> String {
    let parsed = parser::parse(source).expect("lexing should succeed");
    assert_eq!(parsed.errors, vec![], "unexpected parse errors");
    let mut interpreter = Interpreter::with_input(
        Vec::new(),
        Box::new(io::Cursor::new(input.as_bytes().to_vec())),
    );
    interpreter.run(&parsed.program);
    String::from_utf8(interpreter.into_output()).expect("output should be UTF-8")
}

#[test]
fn function_scope_is_restored_after_return() {
    let output = run(indoc! {r#"
        let g = 1;
        define f(): {
            g = 2;
            return g
        }
        print f();
        print g
    "#});
    assert_eq!(output, "2\n1\n");
}

#[test]
fn object_mutations_survive_the_scope_restore() {
    let output = run(indoc! {r#"
        class Box: {
            define init(self): {
                self.n = 0
            }
        }
        define fill(box): {
            box.n = 7
        }
        let b = ocl.classes("Box");
        b.init();
        fill(b);
        print b.n
    "#});
    assert_eq!(output, "7\n");
}

#[test]
fn return_unwinds_out_of_nested_blocks() {
    let output = run(indoc! {r#"
        define classify(n): {
            if n < 10: {
                return "small"
            };
            return "big"
        }
        print classify(3);
        print classify(30)
    "#});
    assert_eq!(output, "small\nbig\n");
}

#[test]
fn instances_compare_by_identity() {
    let output = run(indoc! {r#"
        class C: {
            define init(self): {
                self.x = 0
            }
        }
        let a = ocl.classes("C");
        let b = ocl.classes("C");
        print a == b;
        print a == a
    "#});
    assert_eq!(output, "false\ntrue\n");
}

#[test]
fn only_the_first_runtime_error_is_reported() {
    let output = run(indoc! {r#"
        print 1 / 0;
        print 2 / 0;
        print "alive"
    "#});
    assert_eq!(output, "Error: Division by zero\nnull\nnull\nalive\n");
}

#[test]
fn addition_overflow_is_logged_and_execution_continues() {
    let output = run(indoc! {r#"
        print 9223372036854775807 + 1;
        print "after"
    "#});
    assert_eq!(output, "Error: Integer overflow in operation '+'\nnull\nafter\n");
}

#[test]
fn min_divided_by_negative_one_is_logged_and_execution_continues() {
    let output = run(indoc! {r#"
        let a = 0 - 9223372036854775807 - 1;
        let b = a / (0 - 1);
        print b;
        print "done"
    "#});
    assert_eq!(output, "Error: Integer overflow in operation '/'\nnull\ndone\n");
}

#[test]
fn stray_break_ends_the_run_quietly() {
    let output = run(indoc! {r#"
        print "first";
        break;
        print "unreached"
    "#});
    assert_eq!(output, "first\n");
}

#[test]
fn break_at_a_call_boundary_yields_null() {
    let output = run(indoc! {r#"
        define f(): {
            break
        }
        print f()
    "#});
    assert_eq!(output, "null\n");
}

#[test]
fn instantiating_an_unregistered_class_is_an_error() {
    let output = run(indoc! {r#"
        let p = ocl.classes("Missing");
        print p;
        print "after"
    "#});
    assert_eq!(output, "Error: Class 'Missing' not defined\nnull\nafter\n");
}

#[test]
fn last_error_records_message_and_line() {
    let parsed = parser::parse("let a = 1;\nprint 1 / 0").expect("lexing should succeed");
    let mut interpreter = Interpreter::with_input(Vec::new(), Box::new(io::empty()));
    interpreter.run(&parsed.program);
    let report = interpreter.last_error().expect("an error should be recorded");
    assert_eq!(report.message, "Division by zero");
    assert_eq!(report.line, Some(2));
}

#[test]
fn parse_errors_do_not_stop_the_rest_of_the_program() {
    let parsed =
        parser::parse("let a = 1;\nlet = 2;\nprint a").expect("lexing should succeed");
    assert_eq!(parsed.errors.len(), 1);
    let mut interpreter = Interpreter::with_input(Vec::new(), Box::new(io::empty()));
    interpreter.run(&parsed.program);
    let output = String::from_utf8(interpreter.into_output()).expect("utf-8");
    assert_eq!(output, "1\n");
}

#[test]
fn top_level_return_is_the_program_value() {
    let parsed = parser::parse("let a = 40;\nreturn a + 2").expect("lexing should succeed");
    assert_eq!(parsed.errors, vec![]);
    let mut interpreter = Interpreter::with_input(Vec::new(), Box::new(io::empty()));
    assert_eq!(interpreter.run(&parsed.program), Value::Int(42));
}

#[test]
fn augmented_assignment_needs_an_existing_variable() {
    let output = run("x += 1;\nprint \"next\"");
    assert_eq!(output, "Error: Variable 'x' is not defined\nnext\n");
}

#[test]
fn get_input_reads_a_line() {
    let output = run_with_input(
        indoc! {r#"
            let name = ocl.get_input("Name: ");
            print "hello {name}"
        "#},
        "Ada\n",
    );
    assert_eq!(output, "Name: \nhello Ada\n");
}

#[test]
fn get_set_input_stores_into_the_reserved_variable() {
    let output = run_with_input(
        indoc! {r#"
            ocl.get_set_input("? ");
            print input_value
        "#},
        "42\n",
    );
    assert_eq!(output, "? \n42\n");
}

struct InterruptingInput;

impl io::Read for InterruptingInput {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::ErrorKind::Interrupted.into())
    }
}

impl io::BufRead for InterruptingInput {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Err(io::ErrorKind::Interrupted.into())
    }

    fn consume(&mut self, _amt: usize) {}

    fn read_line(&mut self, _buf: &mut String) -> io::Result<usize> {
        Err(io::ErrorKind::Interrupted.into())
    }
}

#[test]
fn interrupted_input_is_reported_as_such() {
    let parsed = parser::parse(indoc! {r#"
        let x = ocl.get_input("? ");
        print x;
        print "after"
    "#})
    .expect("lexing should succeed");
    let mut interpreter = Interpreter::with_input(Vec::new(), Box::new(InterruptingInput));
    interpreter.run(&parsed.program);
    let output = String::from_utf8(interpreter.into_output()).expect("utf-8");
    assert_eq!(output, "? Error: Input interrupted by user\nnull\nafter\n");
}

/// Gateway fake that records every call and runs the event loop for a fixed
/// number of frames.
struct RecordingGateway {
    calls: Rc<RefCell<Vec<String>>>,
    frames_left: i64,
}

impl RecordingGateway {
    fn new(frames: i64) -> (Self, Rc<RefCell<Vec<String>>>) {
        let calls = Rc::new(RefCell::new(Vec::new()));
        (
            RecordingGateway {
                calls: calls.clone(),
                frames_left: frames,
            },
            calls,
        )
    }

    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl RenderGateway for RecordingGateway {
    fn init(&mut self, width: i64, height: i64, title: &str) -> Option<WindowHandle> {
        self.record(format!("init {width}x{height} '{title}'"));
        Some(7)
    }

    fn set_background(&mut self, h: WindowHandle, r: i64, g: i64, b: i64) {
        self.record(format!("set_background {h} {r},{g},{b}"));
    }

    fn set_title(&mut self, h: WindowHandle, title: &str) {
        self.record(format!("set_title {h} '{title}'"));
    }

    fn set_size(&mut self, h: WindowHandle, width: i64, height: i64) {
        self.record(format!("set_size {h} {width}x{height}"));
    }

    fn set_position(&mut self, h: WindowHandle, x: i64, y: i64) {
        self.record(format!("set_position {h} {x},{y}"));
    }

    fn set_fullscreen(&mut self, h: WindowHandle, fullscreen: bool) {
        self.record(format!("set_fullscreen {h} {fullscreen}"));
    }

    fn set_opacity(&mut self, h: WindowHandle, opacity: f64) {
        self.record(format!("set_opacity {h} {opacity}"));
    }

    fn set_border(&mut self, h: WindowHandle, bordered: bool) {
        self.record(format!("set_border {h} {bordered}"));
    }

    fn set_min_size(&mut self, h: WindowHandle, width: i64, height: i64) {
        self.record(format!("set_min_size {h} {width}x{height}"));
    }

    fn set_max_size(&mut self, h: WindowHandle, width: i64, height: i64) {
        self.record(format!("set_max_size {h} {width}x{height}"));
    }

    fn set_always_on_top(&mut self, h: WindowHandle, on_top: bool) {
        self.record(format!("set_always_on_top {h} {on_top}"));
    }

    fn set_resizable(&mut self, h: WindowHandle, resizable: bool) {
        self.record(format!("set_resizable {h} {resizable}"));
    }

    fn set_frame_rate(&mut self, h: WindowHandle, fps: i64) {
        self.record(format!("set_frame_rate {h} {fps}"));
    }

    fn set_icon(&mut self, h: WindowHandle, path: &str) {
        self.record(format!("set_icon {h} '{path}'"));
    }

    fn update(&mut self, h: WindowHandle) {
        self.record(format!("update {h}"));
    }

    fn is_running(&mut self, h: WindowHandle) -> bool {
        self.record(format!("is_running {h}"));
        self.frames_left -= 1;
        self.frames_left >= 0
    }

    fn destroy(&mut self, h: WindowHandle) {
        self.record(format!("destroy {h}"));
    }

    fn hide(&mut self, h: WindowHandle) {
        self.record(format!("hide {h}"));
    }

    fn show(&mut self, h: WindowHandle) {
        self.record(format!("show {h}"));
    }

    fn mouse_position(&mut self, _h: WindowHandle) -> (i64, i64) {
        (12, 34)
    }

    fn mouse_button_state(&mut self, _h: WindowHandle, _button: i64) -> i64 {
        1
    }

    fn key_state(&mut self, _h: WindowHandle, _key: &str) -> i64 {
        0
    }

    fn delta_time(&mut self, _h: WindowHandle) -> f64 {
        0.016
    }
}

#[test]
fn gateway_calls_flow_through_the_native_catalogue() {
    let parsed = parser::parse(indoc! {r#"
        let win = ocl.get_ocl2dra.init(320, 240, "Demo");
        ocl.get_ocl2dra.set_title(win, "Renamed");
        while ocl.get_ocl2dra.is_running(win): {
            ocl.get_ocl2dra.update(win)
        };
        let pos = ocl.get_ocl2dra.get_mouse_position(win);
        print pos;
        print pos.0;
        print pos[1];
        print ocl.get_ocl2dra.get_delta_time(win);
        ocl.get_ocl2dra.destroy(win);
        print win
    "#})
    .expect("lexing should succeed");
    assert_eq!(parsed.errors, vec![]);

    let (gateway, calls) = RecordingGateway::new(2);
    let mut interpreter = Interpreter::with_input(Vec::new(), Box::new(io::empty()));
    interpreter.set_gateway(Box::new(gateway));
    interpreter.run(&parsed.program);

    let output = String::from_utf8(interpreter.into_output()).expect("utf-8");
    assert_eq!(output, "(12, 34)\n12\n34\n0.016\n7\n");
    assert_eq!(
        *calls.borrow(),
        vec![
            "init 320x240 'Demo'".to_string(),
            "update 7".to_string(),
            "set_title 7 'Renamed'".to_string(),
            "is_running 7".to_string(),
            "update 7".to_string(),
            "is_running 7".to_string(),
            "update 7".to_string(),
            "is_running 7".to_string(),
            "destroy 7".to_string(),
        ]
    );
}

#[test]
fn gateway_arguments_are_validated_before_dispatch() {
    let parsed = parser::parse(indoc! {r#"
        let win = ocl.get_ocl2dra.init(320, 240, "Demo");
        ocl.get_ocl2dra.set_title(win, 5);
        print "after"
    "#})
    .expect("lexing should succeed");
    let (gateway, calls) = RecordingGateway::new(0);
    let mut interpreter = Interpreter::with_input(Vec::new(), Box::new(io::empty()));
    interpreter.set_gateway(Box::new(gateway));
    interpreter.run(&parsed.program);

    let output = String::from_utf8(interpreter.into_output()).expect("utf-8");
    assert_eq!(
        output,
        "Error: ocl.get_ocl2dra.set_title expects (context: handle, title: string)\nafter\n"
    );
    // The bad call never reached the gateway.
    assert_eq!(
        *calls.borrow(),
        vec!["init 320x240 'Demo'".to_string(), "update 7".to_string()]
    );
}

#[test]
fn missing_gateway_fails_soft() {
    let parsed =
        parser::parse("let h = ocl.get_ocl2dra.init(1, 1, \"x\");\nprint h").expect("lexing");
    let mut interpreter = Interpreter::with_input(Vec::new(), Box::new(io::empty()));
    interpreter.run(&parsed.program);
    let report = interpreter
        .last_error()
        .expect("an error should be recorded")
        .clone();
    assert_eq!(report.message, "Native library not loaded");
    assert_eq!(report.line, Some(1));
    let output = String::from_utf8(interpreter.into_output()).expect("utf-8");
    assert_eq!(output, "Error: Native library not loaded\nnull\n");
}

#[test]
fn dotted_assignment_creates_intermediates() {
    let output = run(indoc! {r#"
        class Player: {
            define init(self): {
                self.name = "p1"
            }
        }
        let p = ocl.classes("Player");
        p.init();
        print p.name;
        p.stats.hp = 10;
        print p.stats.hp
    "#});
    assert_eq!(output, "p1\n10\n");
}

#[test]
fn conditions_must_be_booleans() {
    let output = run(indoc! {r#"
        if 1: {
            print "yes"
        };
        print "after"
    "#});
    assert_eq!(
        output,
        "Error: If condition must evaluate to a boolean\nafter\n"
    );
}
