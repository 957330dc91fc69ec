// Copyright © 2024 Webgen. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Build script checking the minimum supported Rust version.

/// Warns when the compiler predates the std file locks the versions
/// module relies on.
fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    let min_version = "1.89.0";

    match version_check::is_min_version(min_version) {
        Some(true) => {}
        Some(false) => println!(
            "cargo:warning=webgen requires Rust {min_version} or newer"
        ),
        None => println!(
            "cargo:warning=could not determine the Rust compiler version"
        ),
    }
}
