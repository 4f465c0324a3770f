//! Progress output for `wallaby new`

use std::io::{self, Write};

/// Numbered step display
pub struct ProgressDisplay {
    current_step: usize,
    total_steps: usize,
}

impl ProgressDisplay {
    pub fn new(total_steps: usize) -> Self {
        Self {
            current_step: 0,
            total_steps,
        }
    }

    pub fn header(name: &str) {
        println!();
        println!(
            "  \x1b[1mCreating new Wallaby application:\x1b[0m \x1b[36m{}\x1b[0m",
            name
        );
        println!();
    }

    pub fn step(&mut self, description: &str) {
        self.current_step += 1;
        print!(
            "  \x1b[2m[{}/{}]\x1b[0m {} ",
            self.current_step, self.total_steps, description
        );
        let _ = io::stdout().flush();
    }

    pub fn done() {
        println!("\x1b[32mok\x1b[0m");
    }

    pub fn fail(reason: &str) {
        println!("\x1b[31mfailed\x1b[0m \x1b[2m{}\x1b[0m", reason);
    }
}
