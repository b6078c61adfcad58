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

//! Boot image assembly.
//!
//! When no boot entry is configured, UEFI firmwares look for a boot loader at
//! `\EFI\BOOT\BOOTX64.EFI` on every FAT volume. The UEFI shell additionally executes
//! `startup.nsh` from the root of the volume, if present. The image built here contains both:
//!
//! ```text
//! <root>/
//! ├── EFI/
//! │   └── BOOT/
//! │       └── BOOTX64.EFI
//! └── startup.nsh          (content: \EFI\BOOT\BOOTX64.EFI)
//! ```
//!
//! The directory is not a disk image. The emulator synthesizes a FAT volume out of it.
//!
//! # Consistency
//!
//! Copying the boot loader and writing the startup script are two separate filesystem
//! operations. If the process is interrupted between the two, the image is left with one of
//! them updated and the other stale. Nothing attempts to detect or repair this state; running
//! `build` again fixes it.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Components of the path, relative to the image root, of the directory containing the boot
/// loader.
pub const BOOT_DIR_COMPONENTS: [&str; 2] = ["EFI", "BOOT"];

/// Name the firmware expects the x86_64 boot loader to have.
pub const BOOT_LOADER_NAME: &str = "BOOTX64.EFI";

/// Name of the script automatically executed by the UEFI shell.
pub const STARTUP_SCRIPT_NAME: &str = "startup.nsh";

/// Bootable directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootImage {
    root: PathBuf,
}

/// Error that can happen while assembling the image.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to create {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to copy {} to {}: {source}", from.display(), to.display())]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("No boot loader found at {}", .0.display())]
    Incomplete(PathBuf),

    #[error("{0}")]
    Io(#[from] io::Error),
}

impl BootImage {
    /// Image whose root is the given directory. Doesn't touch the filesystem.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        BootImage { root: root.into() }
    }

    /// Root directory of the image.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory where the firmware looks for the boot loader.
    pub fn boot_dir(&self) -> PathBuf {
        BOOT_DIR_COMPONENTS
            .iter()
            .fold(self.root.clone(), |path, component| path.join(component))
    }

    /// Location of the boot loader.
    pub fn boot_loader_path(&self) -> PathBuf {
        self.boot_dir().join(BOOT_LOADER_NAME)
    }

    pub fn startup_script_path(&self) -> PathBuf {
        self.root.join(STARTUP_SCRIPT_NAME)
    }

    /// Copies `artifact` as the boot loader of the image and writes the startup script.
    ///
    /// Missing directories are created. Existing files are overwritten. The permissions and
    /// modification time of `artifact` are carried over to the copy.
    pub fn assemble(&self, artifact: impl AsRef<Path>) -> Result<(), Error> {
        let artifact = artifact.as_ref();

        let boot_dir = self.boot_dir();
        fs::create_dir_all(&boot_dir).map_err(|source| Error::CreateDir {
            path: boot_dir.clone(),
            source,
        })?;

        let boot_loader = self.boot_loader_path();
        copy_with_mtime(artifact, &boot_loader).map_err(|source| Error::Copy {
            from: artifact.to_owned(),
            to: boot_loader.clone(),
            source,
        })?;

        let script = self.startup_script_path();
        fs::write(&script, startup_script()).map_err(|source| Error::Write {
            path: script.clone(),
            source,
        })?;

        log::info!("Boot image assembled in {}", self.root.display());
        Ok(())
    }

    /// Checks that the image contains a boot loader.
    pub fn check(&self) -> Result<(), Error> {
        let boot_loader = self.boot_loader_path();
        if boot_loader.is_file() {
            Ok(())
        } else {
            Err(Error::Incomplete(boot_loader))
        }
    }

    /// Returns the paths of all the files of the image, relative to its root, sorted.
    pub fn files(&self) -> Result<Vec<PathBuf>, Error> {
        let mut out = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(path) = entry.path().strip_prefix(&self.root) {
                out.push(path.to_owned());
            }
        }
        Ok(out)
    }
}

/// Content of `startup.nsh`.
///
/// The UEFI shell uses backslashes as path separator. There is no trailing newline.
pub fn startup_script() -> String {
    let mut script = String::new();
    for component in BOOT_DIR_COMPONENTS.iter().chain(Some(&BOOT_LOADER_NAME)) {
        script.push('\\');
        script.push_str(component);
    }
    script
}

/// Copies `from` to `to`, then applies the modification time and permissions of `from`.
///
/// The permissions are applied last, as they can make `to` read-only.
fn copy_with_mtime(from: &Path, to: &Path) -> Result<(), io::Error> {
    let metadata = fs::metadata(from)?;

    // A previous copy may be read-only and can't be opened for writing.
    match fs::remove_file(to) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    let mut src = fs::File::open(from)?;
    let mut dest = fs::File::create(to)?;
    io::copy(&mut src, &mut dest)?;
    dest.set_modified(metadata.modified()?)?;
    drop(dest);

    fs::set_permissions(to, metadata.permissions())
}

#[cfg(test)]
mod tests {
    use super::{startup_script, BootImage, Error};

    use std::{fs, path::PathBuf};
    use tempdir::TempDir;

    #[test]
    fn script_content() {
        assert_eq!(startup_script(), "\\EFI\\BOOT\\BOOTX64.EFI");
    }

    #[test]
    fn paths() {
        let image = BootImage::new("/ws/build");
        assert_eq!(
            image.boot_loader_path(),
            PathBuf::from("/ws/build/EFI/BOOT/BOOTX64.EFI")
        );
        assert_eq!(
            image.startup_script_path(),
            PathBuf::from("/ws/build/startup.nsh")
        );
    }

    #[test]
    fn assemble_fresh() {
        let dir = TempDir::new("juner-builder-test").unwrap();
        let artifact = dir.path().join("juner-os.efi");
        fs::write(&artifact, b"ABCDEFGHIJ").unwrap();

        let image = BootImage::new(dir.path().join("build"));
        image.assemble(&artifact).unwrap();

        assert_eq!(fs::read(image.boot_loader_path()).unwrap(), b"ABCDEFGHIJ");
        assert_eq!(
            fs::read_to_string(image.startup_script_path()).unwrap(),
            "\\EFI\\BOOT\\BOOTX64.EFI"
        );
        assert_eq!(
            image.files().unwrap(),
            [
                PathBuf::from("EFI/BOOT/BOOTX64.EFI"),
                PathBuf::from("startup.nsh")
            ]
        );
        image.check().unwrap();
    }

    #[test]
    fn assemble_overwrites() {
        let dir = TempDir::new("juner-builder-test").unwrap();
        let image = BootImage::new(dir.path().join("build"));
        fs::create_dir_all(image.boot_dir()).unwrap();
        fs::write(image.boot_loader_path(), b"a much longer previous boot loader").unwrap();
        fs::write(image.startup_script_path(), "echo stale\r\n").unwrap();

        let artifact = dir.path().join("juner-os.efi");
        fs::write(&artifact, b"new").unwrap();
        image.assemble(&artifact).unwrap();

        assert_eq!(fs::read(image.boot_loader_path()).unwrap(), b"new");
        assert_eq!(
            fs::read_to_string(image.startup_script_path()).unwrap(),
            "\\EFI\\BOOT\\BOOTX64.EFI"
        );
    }

    #[test]
    fn assemble_preserves_mtime() {
        let dir = TempDir::new("juner-builder-test").unwrap();
        let artifact = dir.path().join("juner-os.efi");
        fs::write(&artifact, b"ABCDEFGHIJ").unwrap();

        let image = BootImage::new(dir.path().join("build"));
        image.assemble(&artifact).unwrap();

        let src = fs::metadata(&artifact).unwrap().modified().unwrap();
        let dst = fs::metadata(image.boot_loader_path())
            .unwrap()
            .modified()
            .unwrap();
        assert_eq!(src, dst);
    }

    #[cfg(unix)]
    #[test]
    fn read_only_artifact() {
        use std::os::unix::fs::PermissionsExt as _;

        let dir = TempDir::new("juner-builder-test").unwrap();
        let artifact = dir.path().join("juner-os.efi");
        fs::write(&artifact, b"ABCDEFGHIJ").unwrap();
        fs::set_permissions(&artifact, fs::Permissions::from_mode(0o444)).unwrap();

        // Twice, as the first copy is read-only as well.
        let image = BootImage::new(dir.path().join("build"));
        image.assemble(&artifact).unwrap();
        image.assemble(&artifact).unwrap();

        let copy = fs::metadata(image.boot_loader_path()).unwrap();
        assert_eq!(copy.permissions().mode() & 0o777, 0o444);
        assert_eq!(
            copy.modified().unwrap(),
            fs::metadata(&artifact).unwrap().modified().unwrap()
        );
        assert_eq!(fs::read(image.boot_loader_path()).unwrap(), b"ABCDEFGHIJ");
        assert_eq!(
            fs::read_to_string(image.startup_script_path()).unwrap(),
            "\\EFI\\BOOT\\BOOTX64.EFI"
        );
    }

    #[test]
    fn unwritable_destination() {
        let dir = TempDir::new("juner-builder-test").unwrap();
        let artifact = dir.path().join("juner-os.efi");
        fs::write(&artifact, b"ABCDEFGHIJ").unwrap();

        // The image root is a file, so no directory can be created under it.
        let root = dir.path().join("build");
        fs::write(&root, b"").unwrap();

        let image = BootImage::new(&root);
        assert!(matches!(
            image.assemble(&artifact),
            Err(Error::CreateDir { .. })
        ));
    }

    #[test]
    fn missing_artifact() {
        let dir = TempDir::new("juner-builder-test").unwrap();
        let image = BootImage::new(dir.path().join("build"));

        let err = image.assemble(dir.path().join("nope.efi")).unwrap_err();
        assert!(matches!(err, Error::Copy { .. }));
        assert!(!image.startup_script_path().exists());
    }

    #[test]
    fn check_empty_image() {
        let dir = TempDir::new("juner-builder-test").unwrap();
        let image = BootImage::new(dir.path());
        assert!(matches!(image.check(), Err(Error::Incomplete(_))));
    }
}
