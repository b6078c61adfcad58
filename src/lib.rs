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

//! Build and run harness for the juner-os UEFI application.
//!
//! The application runs directly on top of UEFI firmware. This crate compiles it, puts it in a
//! directory that the firmware knows how to boot from, and starts QEMU with the OVMF firmware
//! on top of that directory.
//!
//! # Workflow
//!
//! - `build` runs `cargo build --target x86_64-none-efi --package juner-os`, then copies the
//! resulting `juner-os.efi` to `build/EFI/BOOT/BOOTX64.EFI` and writes `build/startup.nsh`.
//! See the [`image`] module for the layout of the image.
//! - `run` starts `qemu-system-x86_64` with `build/` exposed as a FAT volume. It doesn't depend
//! on `build` having been run by the same process, only on the image being present on disk.
//!
//! Both subprocesses are waited upon synchronously and share the terminal of the harness. The
//! serial port of the virtual machine is connected to the terminal, and OVMF redirects the UEFI
//! console to it.
//!
//! # Workspace
//!
//! The following files are expected at the root of the Cargo workspace:
//!
//! - `x86_64-none-efi.json`, the target specifications. `RUST_TARGET_PATH` points to the
//! workspace root when compiling.
//! - `OVMF_CODE.fd` and `OVMF_VARS-1024x768.fd`, the firmware images. The emulator writes to
//! the second one, which is how UEFI variables persist between boots.

pub mod build;
pub mod cli;
pub mod emulator;
pub mod image;
pub mod layout;
pub mod target;

pub use cli::{Harness, Verb};

/// Error that can happen while executing a [`Verb`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Build failed: {0}")]
    BuildFailure(#[from] build::Error),

    #[error("Failed to assemble the boot image: {0}")]
    AssemblyFailure(#[from] image::Error),

    #[error("Failed to run the emulator: {0}")]
    LaunchFailure(#[from] emulator::Error),

    #[error("{0}")]
    Layout(#[from] layout::Error),

    #[error("{0}")]
    Usage(#[from] cli::UsageError),
}

impl Error {
    /// Exit code that the harness should exit with.
    ///
    /// When a subprocess exited with an error, this is its exit code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::BuildFailure(build::Error::BuildFailure { code: Some(code) }) => *code,
            Error::LaunchFailure(emulator::Error::EmulatorRunFailure { code: Some(code) }) => {
                *code
            }
            Error::Usage(cli::UsageError::Help(_)) => 0,
            Error::Usage(_) => 2,
            _ => 1,
        }
    }
}
