// SPDX-License-Identifier: BSD-3-Clause
// Copyright 2025. Triad National Security, LLC.

use std::io::Write;
use std::process::ExitCode;

use env_logger::{Env, Target};
use log::*;

use provision::{cli, Error, SystemRunner};

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stdout)
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                buf.timestamp_seconds(),
                record.level(),
                record.args()
            )
        })
        .init();

    let res = cli::run(std::env::args_os(), &SystemRunner);
    match &res {
        Ok(()) => {}
        Err(Error::Usage(usage)) => eprintln!("{usage}"),
        Err(e) => error!("{e}"),
    }
    ExitCode::from(cli::exit_status(&res))
}
