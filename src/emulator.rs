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

use crate::image::BootImage;

use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::Command,
};

/// Emulator binary for the x86_64 platform.
pub const QEMU_X86_64: &str = "qemu-system-x86_64";

/// Configuration for running the boot image in an emulator.
#[derive(Debug, Clone)]
pub struct Config<'a> {
    /// Program to run. Normally [`QEMU_X86_64`].
    pub emulator: OsString,

    /// Read-only firmware code image.
    pub firmware_code: &'a Path,

    /// Firmware variable store. The emulator writes to it.
    pub firmware_vars: &'a Path,

    /// Directory exposed to the guest as a FAT volume.
    pub image: &'a BootImage,
}

/// Error that can happen while running the emulator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Firmware file not found: {}", .0.display())]
    FirmwareMissing(PathBuf),

    #[error("Boot image not found: {0}")]
    ImageMissing(#[from] crate::image::Error),

    #[error("Emulator not found: {0}")]
    EmulatorNotFound(io::Error),

    #[error("Emulator run failed (exit code: {code:?})")]
    EmulatorRunFailure { code: Option<i32> },
}

impl<'a> Config<'a> {
    /// Returns the arguments passed to the emulator.
    ///
    /// They only depend on the paths of the configuration.
    pub fn args(&self) -> Vec<OsString> {
        let mut args = Vec::new();

        // QEMU enables by default a lot of devices that slow down the boot.
        args.push("-nodefaults".into());

        // The firmware's graphics output protocol drives a standard VGA.
        args.push("-vga".into());
        args.push("std".into());

        // Modern chipset, with KVM if available and pure emulation otherwise.
        args.push("-machine".into());
        args.push("q35,accel=kvm:tcg".into());

        args.push("-m".into());
        args.push("128M".into());

        args.push("-drive".into());
        args.push(with_path(
            "if=pflash,format=raw,readonly=on,file=",
            self.firmware_code,
        ));
        args.push("-drive".into());
        args.push(with_path("if=pflash,format=raw,file=", self.firmware_vars));

        // QEMU generates a FAT volume out of the directory.
        args.push("-drive".into());
        args.push(with_path("format=raw,file=fat:rw:", self.image.root()));

        // OVMF connects the UEFI console to the serial port.
        args.push("-serial".into());
        args.push("stdio".into());

        args.push("-monitor".into());
        args.push("vc:1024x768".into());

        args
    }

    /// Returns the command that starts the emulator.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.emulator);
        command.args(self.args());
        command
    }

    /// Runs the emulator and blocks until it exits.
    ///
    /// The emulator shares the terminal of the current process.
    pub fn run(&self) -> Result<(), Error> {
        for firmware in &[self.firmware_code, self.firmware_vars] {
            if !firmware.is_file() {
                return Err(Error::FirmwareMissing(firmware.to_path_buf()));
            }
        }
        self.image.check()?;

        log::info!("Starting {}", Path::new(&self.emulator).display());
        let status = self
            .command()
            .status()
            .map_err(Error::EmulatorNotFound)?;

        if !status.success() {
            return Err(Error::EmulatorRunFailure {
                code: status.code(),
            });
        }

        Ok(())
    }
}

fn with_path(prefix: &str, path: &Path) -> OsString {
    let mut out = OsString::from(prefix);
    out.push(path);
    out
}
