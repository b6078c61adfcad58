// Copyright (C) 2019-2021  Pierre Krieger
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use juner_builder::{
    cli::{self, UsageError},
    Error, Harness,
};
use std::{env, process};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // The verb is resolved before anything else, so that an invalid command line has no
    // side effect.
    let verb = match cli::parse(env::args_os()) {
        Ok(verb) => verb,
        Err(UsageError::Help(err)) => err.exit(),
        Err(err) => {
            println!("{}", err);
            process::exit(Error::from(err).exit_code());
        }
    };

    let layout = match cli::layout_for(&verb) {
        Ok(layout) => layout,
        Err(err) => exit_with(err),
    };

    let mut harness = Harness::new(layout);
    // Set by `cargo run`.
    if let Some(cargo) = env::var_os("CARGO") {
        harness.cargo = cargo;
    }

    if let Err(err) = harness.execute(&verb) {
        exit_with(err);
    }
}

fn exit_with(err: Error) -> ! {
    log::error!("{}", err);
    process::exit(err.exit_code())
}
