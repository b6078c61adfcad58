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

//! Locations of everything the harness reads or writes.

use std::{env, io, path::PathBuf};

/// Name of the directory, relative to the workspace root, where the boot image is assembled.
pub const BUILD_DIR_NAME: &str = "build";

/// File name of the read-only OVMF firmware code image.
pub const FIRMWARE_CODE_NAME: &str = "OVMF_CODE.fd";

/// File name of the writable OVMF variable store.
pub const FIRMWARE_VARS_NAME: &str = "OVMF_VARS-1024x768.fd";

/// Filesystem layout of the workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Root of the Cargo workspace. Also where the custom target specifications live.
    pub workspace_root: PathBuf,

    /// Directory where Cargo writes its outputs.
    pub target_directory: PathBuf,

    /// Root of the boot image.
    pub build_dir: PathBuf,

    /// OVMF code image, passed read-only to the emulator.
    pub firmware_code: PathBuf,

    /// OVMF variable store, mutated in place by the emulator.
    pub firmware_vars: PathBuf,
}

/// Error that can happen while discovering the layout.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to get metadata about the workspace: {0}")]
    MetadataFailed(#[from] cargo_metadata::Error),

    #[error("Failed to get the current directory: {0}")]
    CurrentDir(io::Error),
}

impl Layout {
    /// Builds the layout of the workspace whose root is `workspace_root`, assuming Cargo
    /// writes its outputs in the default `target` directory.
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        let target_directory = workspace_root.join("target");
        Layout::with_target_directory(workspace_root, target_directory)
    }

    /// Same as [`Layout::new`], but with an explicit Cargo target directory.
    pub fn with_target_directory(
        workspace_root: impl Into<PathBuf>,
        target_directory: impl Into<PathBuf>,
    ) -> Self {
        let workspace_root = workspace_root.into();
        Layout {
            build_dir: workspace_root.join(BUILD_DIR_NAME),
            firmware_code: workspace_root.join(FIRMWARE_CODE_NAME),
            firmware_vars: workspace_root.join(FIRMWARE_VARS_NAME),
            target_directory: target_directory.into(),
            workspace_root,
        }
    }

    /// Asks Cargo where the workspace containing the current directory is located.
    ///
    /// This honours `CARGO_TARGET_DIR` and `build.target-dir`, contrary to [`Layout::new`].
    pub fn discover() -> Result<Self, Error> {
        let metadata = cargo_metadata::MetadataCommand::new().no_deps().exec()?;
        log::debug!(
            "Workspace root: {}, target directory: {}",
            metadata.workspace_root.display(),
            metadata.target_directory.display()
        );
        Ok(Layout::with_target_directory(
            metadata.workspace_root,
            metadata.target_directory,
        ))
    }

    /// Same as [`Layout::discover`], but falls back to the current directory as workspace root
    /// if Cargo can't be queried.
    pub fn discover_or_current_dir() -> Result<Self, Error> {
        match Layout::discover() {
            Ok(layout) => Ok(layout),
            Err(err) => {
                log::warn!("{}; using the current directory as workspace root", err);
                let current_dir = env::current_dir().map_err(Error::CurrentDir)?;
                Ok(Layout::new(current_dir))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Layout;
    use std::path::Path;

    #[test]
    fn paths_relative_to_workspace() {
        let layout = Layout::new("/ws");
        assert_eq!(layout.target_directory, Path::new("/ws/target"));
        assert_eq!(layout.build_dir, Path::new("/ws/build"));
        assert_eq!(layout.firmware_code, Path::new("/ws/OVMF_CODE.fd"));
        assert_eq!(
            layout.firmware_vars,
            Path::new("/ws/OVMF_VARS-1024x768.fd")
        );
    }

    #[test]
    fn custom_target_directory() {
        let layout = Layout::with_target_directory("/ws", "/tmp/cargo-out");
        assert_eq!(layout.target_directory, Path::new("/tmp/cargo-out"));
        assert_eq!(layout.build_dir, Path::new("/ws/build"));
    }

    #[test]
    fn discover_own_workspace() {
        // Tests run from the root of the package.
        let layout = Layout::discover().unwrap();
        assert!(layout.workspace_root.join("Cargo.toml").is_file());
        assert_eq!(layout.build_dir, layout.workspace_root.join("build"));
    }
}
