// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::helpers::*;
use anyhow::Result;
use std::time::Instant;

type Task = fn() -> Result<()>;

pub fn build() -> Result<()> {
    print_task_start("Building All Crates", HAMMER, BLUE);
    print_info("Compiling all workspace crates in debug mode");
    execute_command("cargo", &["build", "--workspace"], "Build")
}

pub fn test() -> Result<()> {
    print_task_start("Running All Tests", TEST_TUBE, GREEN);
    print_info("Running unit tests, integration tests and doc tests");
    execute_command("cargo", &["test", "--workspace"], "Tests")
}

pub fn check() -> Result<()> {
    print_task_start("Checking All Crates", MAGNIFIER, CYAN);
    print_info("Checking code for errors without building executables");
    execute_command("cargo", &["check", "--workspace", "--all-targets"], "Check")
}

pub fn format() -> Result<()> {
    print_task_start("Formatting Code", BRUSH, MAGENTA);
    print_info("Formatting code using rustfmt with default settings");
    // `fmt` takes `--all`, not `--workspace`.
    execute_command("cargo", &["fmt", "--all"], "Format")
}

pub fn clippy() -> Result<()> {
    print_task_start("Running Clippy", CLIPPY, YELLOW);
    print_info("Running Clippy linter with warnings as errors");
    execute_command(
        "cargo",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        "Clippy",
    )
}

pub fn all() -> Result<()> {
    println!("{}", BANNER);
    print_info("Pipeline: build → test → check → format → clippy");

    let start_time = Instant::now();
    let tasks: [(&str, Task); 5] = [
        ("Build Phase", build),
        ("Test Phase", test),
        ("Check Phase", check),
        ("Format Phase", format),
        ("Clippy Phase", clippy),
    ];
    let mut failed = Vec::new();

    for (i, (name, task)) in tasks.iter().enumerate() {
        println!("\n{}{}[{}/{}] {}{}", BOLD, BLUE, i + 1, tasks.len(), name, RESET);
        if let Err(e) = task() {
            print_error(&e.to_string());
            failed.push(*name);
        }
    }

    let seconds = start_time.elapsed().as_secs_f64();
    if failed.is_empty() {
        print_success(&format!(
            "All {} tasks completed in {seconds:.2}s {ROCKET}",
            tasks.len()
        ));
        Ok(())
    } else {
        print_error(&format!("Failed: {} ({seconds:.2}s)", failed.join(", ")));
        anyhow::bail!("Pipeline failed with {}/{} successful tasks.", tasks.len() - failed.len(), tasks.len());
    }
}
