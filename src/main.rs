// Copyright © 2024 Webgen. All rights reserved.
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! # Webgen CLI
//!
//! Entry point of the `webgen` binary. Argument parsing, logging and the
//! commands themselves live in [`webgen::cli`].

fn main() {
    std::process::exit(webgen::cli::execute());
}
