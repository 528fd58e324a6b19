//! A labelled countdown loop: forward/backward label resolution plus
//! conditional branching, stepped one instruction at a time.
//!
//! ```sh
//! cargo run --example countdown
//! ```

use a64_rs::{assemble, Machine, Step};

fn main() {
    let source = "\
movz x0, #5
loop:
subs x0, x0, #1
b.ne loop
and x0, x0, x0
";

    let code = assemble(source).expect("assembly failed");
    let mut machine = Machine::new();
    machine.load(&code).expect("image fits");

    let mut steps = 0u32;
    while machine.step().expect("clean execution") == Step::Continue {
        steps += 1;
    }

    println!(
        "halted after {} instructions: x0 = {}, flags = {}",
        steps,
        machine.reg(0),
        machine.pstate()
    );
}
