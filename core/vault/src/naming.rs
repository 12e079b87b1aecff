//! Output path derivation and mode detection.

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

/// Suffix added to the stem of every vault image.
pub const VAULT_SUFFIX: &str = "_VAULT";

/// Suffix added to the stem of every recovered file.
pub const RECOVERED_SUFFIX: &str = "_RECOVERED";

/// Extension of carrier images.
pub const CARRIER_EXTENSION: &str = "png";

/// Direction of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Encrypt,
    Decrypt,
}

impl Mode {
    /// PNG files (any case) are treated as vault images, everything else as
    /// plain files.
    pub fn detect(path: &Path) -> Self {
        let is_png = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(CARRIER_EXTENSION))
            .unwrap_or(false);
        if is_png {
            Mode::Decrypt
        } else {
            Mode::Encrypt
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Encrypt => write!(f, "encrypt"),
            Mode::Decrypt => write!(f, "decrypt"),
        }
    }
}

/// Extension of `path` with its leading dot, or empty if there is none.
pub fn source_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn target_dir(path: &Path, output_dir: Option<&Path>) -> PathBuf {
    match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => path.parent().map(Path::to_path_buf).unwrap_or_default(),
    }
}

/// Vault image path for `source`: `<dir>/<stem>_VAULT.png`.
///
/// `output_dir` replaces the source's directory when given.
pub fn encrypted_output_path(source: &Path, output_dir: Option<&Path>) -> PathBuf {
    let name = format!("{}{}.{}", stem_of(source), VAULT_SUFFIX, CARRIER_EXTENSION);
    target_dir(source, output_dir).join(name)
}

/// Recovered file path for `carrier`: the carrier stem without `_VAULT`,
/// then `_RECOVERED` and the original extension.
///
/// # Examples
/// `photos/hello_VAULT.png` with `.txt` becomes `photos/hello_RECOVERED.txt`.
pub fn recovered_output_path(carrier: &Path, extension: &str, output_dir: Option<&Path>) -> PathBuf {
    let stem = stem_of(carrier);
    let base = stem.strip_suffix(VAULT_SUFFIX).unwrap_or(&stem);
    let name = format!("{}{}{}", base, RECOVERED_SUFFIX, extension);
    target_dir(carrier, output_dir).join(name)
}

/// Numbered alternative for a taken path: `name.ext` becomes `name (n).ext`.
pub fn numbered_path(path: &Path, n: u32) -> PathBuf {
    let mut name = OsString::from(stem_of(path));
    name.push(format!(" ({})", n));
    if let Some(ext) = path.extension() {
        name.push(".");
        name.push(ext);
    }
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_detection() {
        assert_eq!(Mode::detect(Path::new("a/b/photo.png")), Mode::Decrypt);
        assert_eq!(Mode::detect(Path::new("PHOTO.PNG")), Mode::Decrypt);
        assert_eq!(Mode::detect(Path::new("x.Png")), Mode::Decrypt);
        assert_eq!(Mode::detect(Path::new("notes.txt")), Mode::Encrypt);
        assert_eq!(Mode::detect(Path::new("png")), Mode::Encrypt);
        assert_eq!(Mode::detect(Path::new("archive.png.gz")), Mode::Encrypt);
    }

    #[test]
    fn test_source_extension() {
        assert_eq!(source_extension(Path::new("hello.txt")), ".txt");
        assert_eq!(source_extension(Path::new("archive.tar.gz")), ".gz");
        assert_eq!(source_extension(Path::new("Makefile")), "");
        assert_eq!(source_extension(Path::new(".bashrc")), "");
    }

    #[test]
    fn test_encrypted_output_path() {
        assert_eq!(
            encrypted_output_path(Path::new("/data/hello.txt"), None),
            PathBuf::from("/data/hello_VAULT.png")
        );
        assert_eq!(
            encrypted_output_path(Path::new("hello.txt"), Some(Path::new("/out"))),
            PathBuf::from("/out/hello_VAULT.png")
        );
        assert_eq!(
            encrypted_output_path(Path::new("README"), None),
            PathBuf::from("README_VAULT.png")
        );
    }

    #[test]
    fn test_recovered_output_path() {
        assert_eq!(
            recovered_output_path(Path::new("/data/hello_VAULT.png"), ".txt", None),
            PathBuf::from("/data/hello_RECOVERED.txt")
        );
        assert_eq!(
            recovered_output_path(Path::new("/data/scan.PNG"), ".pdf", None),
            PathBuf::from("/data/scan_RECOVERED.pdf")
        );
        assert_eq!(
            recovered_output_path(Path::new("a_VAULT_VAULT.png"), "", Some(Path::new("/o"))),
            PathBuf::from("/o/a_VAULT_RECOVERED")
        );
    }

    #[test]
    fn test_numbered_path() {
        assert_eq!(
            numbered_path(Path::new("/d/hello_VAULT.png"), 1),
            PathBuf::from("/d/hello_VAULT (1).png")
        );
        assert_eq!(
            numbered_path(Path::new("/d/README"), 3),
            PathBuf::from("/d/README (3)")
        );
    }
}
