/*
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */
use anyhow::Result;
use concomp::cli::main as cli_main;

pub fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Call the main function of the CLI with cli args
    cli_main(std::env::args_os())
}
