//! Byte order, text fields and file-type identification.
//!
//! Both architectures begin with an 8-character id word of the form
//! `ARCH/TYPE` (for example `DAF/SPK ` or `DAS/DSK `) and record their
//! binary format as `LTL-IEEE` or `BIG-IEEE`. Files in either format can be
//! read; only native little-endian files are written.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use bytes::{Buf, BufMut};

use crate::{ErrorKind, KernelError, Result};

/// Length of the id word at the start of every file record
pub const ID_WORD_LEN: usize = 8;

/// Length of the binary format word
pub const FORMAT_WORD_LEN: usize = 8;

/// FTP validation string, used to detect ASCII-mode transfer damage
pub const FTP_STRING: &[u8; 28] = b"FTPSTR:\r:\n:\r\n:\r\x00:\x81:\x10\xce:ENDFTP";

/// Byte offset of the FTP validation string within the file record
pub const FTP_OFFSET: usize = 699;

/// Byte order of numeric data in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Parse a binary format word. A blank word predates format tagging and
    /// is treated as native.
    pub fn from_format_word(word: &str) -> Result<Self> {
        match word.trim() {
            "LTL-IEEE" | "" => Ok(ByteOrder::Little),
            "BIG-IEEE" => Ok(ByteOrder::Big),
            other => Err(KernelError::new(
                ErrorKind::InvalidFormat,
                format!("unsupported binary file format '{}'", other),
            )),
        }
    }

    pub fn format_word(self) -> &'static str {
        match self {
            ByteOrder::Little => "LTL-IEEE",
            ByteOrder::Big => "BIG-IEEE",
        }
    }

    /// Whether files in this order may be opened for write
    pub fn is_native(self) -> bool {
        self == ByteOrder::Little
    }

    #[inline]
    pub fn get_f64(self, buf: &mut impl Buf) -> f64 {
        match self {
            ByteOrder::Little => buf.get_f64_le(),
            ByteOrder::Big => buf.get_f64(),
        }
    }

    #[inline]
    pub fn get_i32(self, buf: &mut impl Buf) -> i32 {
        match self {
            ByteOrder::Little => buf.get_i32_le(),
            ByteOrder::Big => buf.get_i32(),
        }
    }

    #[inline]
    pub fn put_f64(self, buf: &mut impl BufMut, value: f64) {
        match self {
            ByteOrder::Little => buf.put_f64_le(value),
            ByteOrder::Big => buf.put_f64(value),
        }
    }

    #[inline]
    pub fn put_i32(self, buf: &mut impl BufMut, value: i32) {
        match self {
            ByteOrder::Little => buf.put_i32_le(value),
            ByteOrder::Big => buf.put_i32(value),
        }
    }
}

/// File architecture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    /// Double precision Array File (SPK, CK, PCK)
    Daf,
    /// Direct Access, Segmented file (DLA, DSK)
    Das,
}

impl Architecture {
    pub fn tag(self) -> &'static str {
        match self {
            Architecture::Daf => "DAF",
            Architecture::Das => "DAS",
        }
    }
}

/// Architecture and type tags read from an id word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileType {
    pub architecture: Architecture,
    /// Type tag such as `SPK`, `CK`, `PCK`, `DLA` or `DSK`; empty for
    /// pre-tagging files
    pub kind: String,
}

impl FileType {
    pub fn new(architecture: Architecture, kind: &str) -> Self {
        Self {
            architecture,
            kind: kind.trim().to_string(),
        }
    }

    /// Parse an id word such as `DAF/SPK ` or the legacy `NAIF/DAF`.
    pub fn parse_id_word(word: &str) -> Result<Self> {
        let word = word.trim_end();
        match word {
            "NAIF/DAF" => return Ok(Self::new(Architecture::Daf, "")),
            "NAIF/DAS" => return Ok(Self::new(Architecture::Das, "")),
            _ => {}
        }
        let (arch, kind) = word.split_once('/').ok_or_else(|| {
            KernelError::new(
                ErrorKind::InvalidFormat,
                format!("unrecognized id word '{}'", word),
            )
        })?;
        let architecture = match arch {
            "DAF" => Architecture::Daf,
            "DAS" => Architecture::Das,
            _ => {
                return Err(KernelError::new(
                    ErrorKind::InvalidFormat,
                    format!("unrecognized architecture '{}' in id word", arch),
                ))
            }
        };
        Ok(Self::new(architecture, kind))
    }

    /// The 8-character id word for this type, blank padded.
    pub fn id_word(&self) -> String {
        format!(
            "{:<width$}",
            format!("{}/{}", self.architecture.tag(), self.kind),
            width = ID_WORD_LEN
        )
    }

    /// Fail with `WrongFileType` unless the tags match one of `kinds`.
    pub fn expect(&self, architecture: Architecture, kinds: &[&str]) -> Result<()> {
        if self.architecture == architecture && kinds.iter().any(|k| *k == self.kind) {
            return Ok(());
        }
        Err(KernelError::new(
            ErrorKind::WrongFileType,
            format!(
                "file has architecture {} and type '{}'; expected {} file of type {}",
                self.architecture.tag(),
                self.kind,
                architecture.tag(),
                kinds.join(" or ")
            ),
        ))
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.architecture.tag(), self.kind)
    }
}

/// Read the architecture and type of a file from its id word.
pub fn identify<P: AsRef<Path>>(path: P) -> Result<FileType> {
    let mut file = File::open(path.as_ref())?;
    let mut word = [0u8; ID_WORD_LEN];
    file.read_exact(&mut word).map_err(|_| {
        KernelError::new(
            ErrorKind::InvalidFormat,
            format!("{} is too short to hold an id word", path.as_ref().display()),
        )
    })?;
    FileType::parse_id_word(&read_text(&word))
}

/// Decode a blank- or NUL-padded text field.
pub fn read_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}

/// Encode `text` into `dst`, truncating or blank padding to fit.
pub fn write_text(dst: &mut [u8], text: &str) {
    let src = text.as_bytes();
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
    dst[n..].fill(b' ');
}

/// Validate a name or internal file name: printable ASCII only.
pub fn check_printable(what: &str, text: &str) -> Result<()> {
    if let Some(c) = text.chars().find(|c| !(' '..='~').contains(c)) {
        return Err(KernelError::new(
            ErrorKind::InvalidValue,
            format!("{} contains non-printable character {:?}", what, c),
        ));
    }
    Ok(())
}

/// Check the FTP validation string of a file record.
///
/// Records written before the string existed carry no `FTPSTR:` prefix and
/// pass unchecked.
pub fn check_ftp(record: &[u8]) -> Result<()> {
    let field = &record[FTP_OFFSET..FTP_OFFSET + FTP_STRING.len()];
    if !field.starts_with(b"FTPSTR:") {
        return Ok(());
    }
    if field != FTP_STRING {
        return Err(KernelError::new(
            ErrorKind::InvalidFormat,
            "FTP validation string is damaged; the file was probably transferred in ASCII mode",
        ));
    }
    Ok(())
}
