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

use crate::{
    build::Toolchain,
    emulator,
    image::BootImage,
    layout::Layout,
    target::BuildTarget,
    Error,
};

use std::ffi::OsString;
use structopt::{clap::ErrorKind, StructOpt};

/// Names of the verbs, as typed on the command line.
pub const VERBS: [&str; 2] = ["build", "run"];

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq, StructOpt)]
#[structopt(
    name = "juner-builder",
    about = "Builds the juner-os UEFI application and runs it in QEMU."
)]
pub enum Verb {
    /// Compiles the application and assembles the boot image in `build/`.
    Build {
        /// Compiles with `--release`.
        #[structopt(long)]
        release: bool,
    },

    /// Boots the existing image in QEMU.
    ///
    /// Doesn't rebuild anything. Run `build` first after modifying the application.
    Run,
}

/// Invalid command line.
#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("Missing verb (expected one of: build, run)")]
    MissingVerb,

    #[error("Unknown verb '{0}' (expected one of: build, run)")]
    UnknownVerb(String),

    #[error("{0}")]
    Invalid(String),

    /// `--help` or `--version` was passed. Not an actual error.
    #[error("{0}")]
    Help(structopt::clap::Error),
}

/// Parses the command line, including the program name in first position.
pub fn parse<I>(args: I) -> Result<Verb, UsageError>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    let args = args.into_iter().map(Into::into).collect::<Vec<OsString>>();

    Verb::from_iter_safe(&args).map_err(|err| {
        let kind = err.kind;
        match kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => UsageError::Help(err),
            _ => match args.get(1).map(|a| a.to_string_lossy()) {
                None => UsageError::MissingVerb,
                Some(verb) if !VERBS.iter().any(|v| *v == verb) => {
                    UsageError::UnknownVerb(verb.into_owned())
                }
                Some(_) => UsageError::Invalid(err.message),
            },
        }
    })
}

/// Finds the layout of the workspace the verb operates on.
///
/// `run` doesn't compile anything, and works without Cargo as long as the current directory
/// is the workspace root.
pub fn layout_for(verb: &Verb) -> Result<Layout, Error> {
    let layout = match verb {
        Verb::Build { .. } => Layout::discover()?,
        Verb::Run => Layout::discover_or_current_dir()?,
    };
    Ok(layout)
}

/// Everything needed to execute a [`Verb`].
#[derive(Debug, Clone)]
pub struct Harness {
    /// Where things are located on disk.
    pub layout: Layout,

    /// Program used to compile the application.
    pub cargo: OsString,

    /// Program used to run the boot image.
    pub emulator: OsString,
}

impl Harness {
    /// Harness using `cargo` and QEMU from the `PATH`.
    pub fn new(layout: Layout) -> Self {
        Harness {
            layout,
            cargo: "cargo".into(),
            emulator: emulator::QEMU_X86_64.into(),
        }
    }

    pub fn boot_image(&self) -> BootImage {
        BootImage::new(&self.layout.build_dir)
    }

    pub fn execute(&self, verb: &Verb) -> Result<(), Error> {
        match verb {
            Verb::Build { release } => self.build(*release).map(|_| ()),
            Verb::Run => self.run(),
        }
    }

    /// Compiles the application, then copies it into the boot image.
    ///
    /// The image isn't touched if the compilation fails.
    pub fn build(&self, release: bool) -> Result<BootImage, Error> {
        let target = BuildTarget::uefi_app(release);
        let output = Toolchain {
            cargo: self.cargo.clone(),
            target: &target,
            target_specs_dir: &self.layout.workspace_root,
            target_directory: &self.layout.target_directory,
        }
        .build()?;

        let image = self.boot_image();
        image.assemble(&output.artifact_path)?;
        if log::log_enabled!(log::Level::Debug) {
            match image.files() {
                Ok(files) => {
                    for file in files {
                        log::debug!("  {}", file.display());
                    }
                }
                Err(err) => log::debug!("Failed to list the boot image: {}", err),
            }
        }
        Ok(image)
    }

    /// Runs the emulator on whatever image is currently on disk.
    pub fn run(&self) -> Result<(), Error> {
        let image = self.boot_image();
        emulator::Config {
            emulator: self.emulator.clone(),
            firmware_code: &self.layout.firmware_code,
            firmware_vars: &self.layout.firmware_vars,
            image: &image,
        }
        .run()?;
        Ok(())
    }
}
