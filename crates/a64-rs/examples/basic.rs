//! Assemble a small program, run it, and print the machine report.
//!
//! ```sh
//! cargo run --example basic
//! ```

use a64_rs::{assemble, emulate};

fn main() {
    let source = "\
movz x0, #5
movz x1, #3
add x0, x0, x1
movz x2, #0x100
str x0, [x2]
and x0, x0, x0
";

    let code = assemble(source).expect("assembly failed");
    println!("assembled {} bytes:", code.len());
    for (i, word) in code.chunks_exact(4).enumerate() {
        let w = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        println!("  0x{:03x}: 0x{:08x}", i * 4, w);
    }

    let machine = emulate(&code).expect("emulation failed");
    let mut report = String::new();
    machine.dump(&mut report).unwrap();
    println!("\n{}", report);
}
