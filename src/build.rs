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

use crate::target::BuildTarget;

use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::Command,
};

/// Environment variable that is removed before invoking Cargo, as it could change how the
/// application is compiled.
pub const CLEARED_ENV_VAR: &str = "RUSTFLAGS";

/// Environment variable pointing `rustc` at the directory containing the target specifications.
pub const TARGET_PATH_ENV_VAR: &str = "RUST_TARGET_PATH";

/// How to invoke the toolchain.
///
/// The environment of the compiler is entirely described by this struct. The environment of
/// the current process is never modified.
#[derive(Debug, Clone)]
pub struct Toolchain<'a> {
    /// Program to run. Normally `cargo`.
    pub cargo: OsString,

    /// What to compile.
    pub target: &'a BuildTarget,

    /// Directory containing the JSON target specifications. Passed as `RUST_TARGET_PATH`.
    pub target_specs_dir: &'a Path,

    /// Directory where Cargo writes its outputs.
    pub target_directory: &'a Path,
}

/// Successful build.
#[derive(Debug)]
pub struct BuildOutput {
    /// Path to the output of the compilation.
    pub artifact_path: PathBuf,
}

/// Error that can happen during the build.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Could not start Cargo: {0}")]
    CargoNotFound(io::Error),

    #[error("Error while building the application (exit code: {code:?})")]
    BuildFailure { code: Option<i32> },

    #[error("Build succeeded but produced no file at {}", .0.display())]
    ArtifactMissing(PathBuf),
}

impl<'a> Toolchain<'a> {
    /// Returns the command that compiles the application.
    ///
    /// The returned command inherits stdin, stdout and stderr, so that the compiler's
    /// diagnostics are shown as-is.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.cargo);
        command
            .env_remove(CLEARED_ENV_VAR)
            .env(TARGET_PATH_ENV_VAR, self.target_specs_dir)
            .arg("build")
            .arg("--target")
            .arg(self.target.target_name)
            .arg("--package")
            .arg(self.target.package)
            .args(if self.target.release {
                &["--release"][..]
            } else {
                &[][..]
            });
        command
    }

    /// Path to the file that Cargo will generate.
    pub fn artifact_path(&self) -> PathBuf {
        self.target.artifact_path(self.target_directory)
    }

    /// Compiles the application and waits for the compiler to finish.
    pub fn build(&self) -> Result<BuildOutput, Error> {
        log::info!(
            "Building {} for {} ({})",
            self.target.package,
            self.target.target_name,
            self.target.profile_dir()
        );

        let status = self.command().status().map_err(Error::CargoNotFound)?;
        if !status.success() {
            return Err(Error::BuildFailure {
                code: status.code(),
            });
        }

        let artifact_path = self.artifact_path();
        if !artifact_path.is_file() {
            return Err(Error::ArtifactMissing(artifact_path));
        }

        log::debug!("Compiled {}", artifact_path.display());
        Ok(BuildOutput { artifact_path })
    }
}
