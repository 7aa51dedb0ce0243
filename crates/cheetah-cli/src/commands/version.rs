//! Version command.

use crate::style::SemanticStyle;

pub fn run() {
    println!("{} {}", "cheetah".header(), env!("CARGO_PKG_VERSION"));
    println!("  protocol:  optimistic 3f+1 commit path, 2f+1 binary fallback");
    println!("  codec:     postcard");
}
