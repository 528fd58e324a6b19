//! Encoder/executor agreement tests.
//!
//! Every supported mnemonic family is assembled from text and executed on a
//! fresh machine; the observable effects (registers, flags, memory) must
//! match the semantics of the source instruction. This checks the two
//! halves of the crate against each other rather than against literal words.

use a64_rs::{assemble, emulate, Machine};

const HALT: &str = "and x0, x0, x0";

fn run(source: &str) -> Machine {
    let mut program = String::from(source);
    program.push('\n');
    program.push_str(HALT);
    emulate(&assemble(&program).unwrap()).unwrap()
}

/// Seed registers x1 = a, x2 = b through wide moves, then run `body`.
fn run_binop(a: u16, b: u16, body: &str) -> Machine {
    run(&format!("movz x1, #{}\nmovz x2, #{}\n{}", a, b, body))
}

#[test]
fn add_sub_register_and_immediate() {
    assert_eq!(run_binop(20, 22, "add x0, x1, x2").reg(0), 42);
    assert_eq!(run_binop(50, 8, "sub x0, x1, x2").reg(0), 42);
    assert_eq!(run_binop(40, 0, "add x0, x1, #2").reg(0), 42);
    assert_eq!(run_binop(44, 0, "sub x0, x1, #2").reg(0), 42);
    assert_eq!(run_binop(1, 0, "add x0, x1, #1, lsl #12").reg(0), 0x1001);
}

#[test]
fn flag_setting_variants() {
    let m = run_binop(7, 7, "subs x0, x1, x2");
    assert!(m.pstate().z && m.pstate().c);

    let m = run_binop(3, 7, "subs x0, x1, x2");
    assert!(m.pstate().n && !m.pstate().c);

    let m = run_binop(7, 3, "adds x0, x1, x2");
    assert!(!m.pstate().n && !m.pstate().z && !m.pstate().c && !m.pstate().v);
}

#[test]
fn logical_family() {
    assert_eq!(run_binop(0xFF0F, 0x0FF0, "and x0, x1, x2").reg(0), 0x0F00);
    assert_eq!(run_binop(0xFF0F, 0x0FF0, "orr x0, x1, x2").reg(0), 0xFFFF);
    assert_eq!(run_binop(0xFF0F, 0x0FF0, "eor x0, x1, x2").reg(0), 0xF0FF);
    assert_eq!(
        run_binop(0xFFFF, 0x00FF, "bic x0, x1, x2").reg(0),
        0xFF00
    );
    assert_eq!(
        run_binop(0x00F0, 0xFFFF, "orn x0, x1, x2").reg(0),
        0xFFFF_FFFF_FFFF_00F0
    );
    assert_eq!(
        run_binop(0, 0xFFFF, "eon x0, x1, x2").reg(0),
        0xFFFF_FFFF_FFFF_0000
    );
    let m = run_binop(0xF000, 0xF000, "ands x0, x1, x2");
    assert_eq!(m.reg(0), 0xF000);
    assert!(!m.pstate().z);
    let m = run_binop(0xF000, 0x0FFF, "bics x0, x1, x2");
    assert_eq!(m.reg(0), 0xF000);
    assert!(!m.pstate().z);
}

#[test]
fn shift_suffixes_apply_before_the_operation() {
    assert_eq!(run_binop(0, 1, "add x0, x1, x2, lsl #6").reg(0), 64);
    assert_eq!(run_binop(0, 64, "add x0, x1, x2, lsr #6").reg(0), 1);
    assert_eq!(
        run_binop(0, 0x8000, "orr x0, x1, x2, ror #4").reg(0),
        0x800
    );
    // asr keeps the sign at the operative width.
    let m = run("movn x2, #0\nadd x0, xzr, x2, asr #13");
    assert_eq!(m.reg(0), u64::MAX);
}

#[test]
fn wide_move_family() {
    assert_eq!(run("movz x0, #0x1234").reg(0), 0x1234);
    assert_eq!(run("movn x0, #0x1234").reg(0), !0x1234u64);
    assert_eq!(run("movn w0, #0").reg(0), 0xFFFF_FFFF);
    assert_eq!(
        run("movz x0, #0xaaaa\nmovk x0, #0xbbbb, lsl #32").reg(0),
        0x0000_BBBB_0000_AAAA
    );
}

#[test]
fn multiply_family() {
    assert_eq!(run_binop(6, 7, "mul x0, x1, x2").reg(0), 42);
    assert_eq!(run_binop(6, 7, "mneg x0, x1, x2").reg(0), (-42i64) as u64);
    assert_eq!(
        run_binop(6, 7, "movz x3, #100\nmadd x0, x1, x2, x3").reg(0),
        142
    );
    assert_eq!(
        run_binop(6, 7, "movz x3, #100\nmsub x0, x1, x2, x3").reg(0),
        58
    );
}

#[test]
fn alias_semantics() {
    // cmp drives flags without writing a destination.
    let m = run_binop(5, 5, "cmp x1, x2");
    assert!(m.pstate().z);
    assert_eq!(m.reg(1), 5);

    // cmn compares against the negation.
    let m = run("movz x1, #5\nmovn x2, #4\ncmn x1, x2"); // x2 = -5
    assert!(m.pstate().z);

    assert_eq!(run("movz x1, #42\nneg x0, x1").reg(0), (-42i64) as u64);
    assert_eq!(run("movz x1, #42\nmov x0, x1").reg(0), 42);
    assert_eq!(run("movz x1, #0xff\nmvn x0, x1").reg(0), !0xFFu64);

    let m = run_binop(0xF0, 0x0F, "tst x1, x2");
    assert!(m.pstate().z);

    let m = run("movz x1, #1\nnegs x0, x1");
    assert!(m.pstate().n);
    assert_eq!(m.reg(0), u64::MAX);
}

#[test]
fn load_store_round_trips_through_memory() {
    let m = run("\
movz x0, #0x7777
movz x1, #0x500
str x0, [x1]
ldr x2, [x1]
str w0, [x1, #8]
ldr w3, [x1, #8]
");
    assert_eq!(m.reg(2), 0x7777);
    assert_eq!(m.reg(3), 0x7777);
}

#[test]
fn load_store_indexing_round_trip() {
    let m = run("\
movz x0, #1
movz x1, #0x600
str x0, [x1], #8
movz x0, #2
str x0, [x1], #8
movz x0, #3
str x0, [x1], #8
");
    assert_eq!(m.read_mem(0x600, 8).unwrap(), 1);
    assert_eq!(m.read_mem(0x608, 8).unwrap(), 2);
    assert_eq!(m.read_mem(0x610, 8).unwrap(), 3);
    assert_eq!(m.reg(1), 0x618);
}

#[test]
fn register_offset_round_trip() {
    let m = run("\
movz x0, #0x9999
movz x1, #0x700
movz x2, #0x40
str x0, [x1, x2]
ldr x3, [x1, x2]
");
    assert_eq!(m.reg(3), 0x9999);
    assert_eq!(m.read_mem(0x740, 8).unwrap(), 0x9999);
}

#[test]
fn literal_load_round_trip() {
    let m = run("\
ldr x0, data
b over
data:
.int 0xdeadbeef
.int 0x0
over:
");
    assert_eq!(m.reg(0), 0xDEAD_BEEF);
}

#[test]
fn branch_family_round_trip() {
    // Unconditional, conditional (taken and not), and register branches in
    // one program, observed through which stores execute.
    let m = run("\
movz x5, #1
b first
movz x5, #99
first:
cmp x5, #1
b.ne bad
b.eq good
bad:
movz x6, #99
good:
movz x7, #7
");
    assert_eq!(m.reg(5), 1);
    assert_eq!(m.reg(6), 0);
    assert_eq!(m.reg(7), 7);
}

#[test]
fn every_condition_code_behaves() {
    // flags from cmp x1, x2 with x1 = 1, x2 = 2 (result negative).
    let cases = [
        ("b.eq", false),
        ("b.ne", true),
        ("b.ge", false),
        ("b.lt", true),
        ("b.gt", false),
        ("b.le", true),
        ("b.al", true),
    ];
    for (branch, taken) in cases {
        let m = run(&format!(
            "movz x1, #1\nmovz x2, #2\ncmp x1, x2\n{} hit\nmovz x0, #1\nb out\nhit:\nmovz x0, #2\nout:",
            branch
        ));
        let expect = if taken { 2 } else { 1 };
        assert_eq!(m.reg(0), expect, "{} mis-evaluated", branch);
    }
}

#[test]
fn thirty_two_bit_flag_width() {
    // 0x7FFFFFFF + 1 overflows signed 32-bit but not 64-bit.
    let m = run("\
movz w1, #0xffff
movk w1, #0x7fff, lsl #16
adds w0, w1, #1
");
    assert_eq!(m.reg(0), 0x8000_0000);
    assert!(m.pstate().v);
    assert!(m.pstate().n);
    assert!(!m.pstate().c);
}
