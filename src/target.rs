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

use std::path::{Path, PathBuf};

/// Target triplet of the UEFI application.
///
/// This is a custom target, whose JSON specification is looked up by `rustc` in
/// `RUST_TARGET_PATH`.
pub const TARGET_NAME: &str = "x86_64-none-efi";

/// Name of the Cargo package of the UEFI application.
pub const PACKAGE_NAME: &str = "juner-os";

/// Architecture, ABI and package that the application is compiled for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    /// Name of the target to pass as `--target`.
    pub target_name: &'static str,

    /// Package to pass as `--package`.
    pub package: &'static str,

    /// If true, compiles with `--release`.
    pub release: bool,
}

impl BuildTarget {
    /// Returns the target of the UEFI application, compiled in debug or release mode.
    pub fn uefi_app(release: bool) -> Self {
        BuildTarget {
            target_name: TARGET_NAME,
            package: PACKAGE_NAME,
            release,
        }
    }

    /// Name of the profile directory Cargo writes into.
    pub fn profile_dir(&self) -> &'static str {
        if self.release {
            "release"
        } else {
            "debug"
        }
    }

    /// File name of the artifact produced by the compilation.
    pub fn artifact_name(&self) -> String {
        format!("{}.efi", self.package)
    }

    /// Path of the artifact that Cargo generates, given its target directory.
    pub fn artifact_path(&self, target_directory: impl AsRef<Path>) -> PathBuf {
        target_directory
            .as_ref()
            .join(self.target_name)
            .join(self.profile_dir())
            .join(self.artifact_name())
    }
}
