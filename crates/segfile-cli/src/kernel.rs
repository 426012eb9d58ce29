//! Open a file as the view its id word names.

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use segfile_daf::{Daf, Summary};
use segfile_das::{Das, Dla, DlaDescriptor};
use segfile_kernels::{Ck, CkDescriptor, Dsk, DskDescriptor, Pck, PckDescriptor, Spk, SpkDescriptor};
use segfile_record::{identify, Architecture, CommentStore, FileType, SegmentDirectory};

/// A file opened through the most specific view available for its type
#[derive(Debug)]
pub enum KernelFile {
    Spk(Spk),
    Ck(Ck),
    Pck(Pck),
    Dsk(Dsk),
    Dla(Dla),
    /// DAF with a type tag that has no typed view
    Daf(Daf),
    /// DAS without a segment list
    Das(Das),
}

impl KernelFile {
    pub fn open_read(path: &Path) -> Result<Self> {
        Self::open(path, false)
    }

    pub fn open_write(path: &Path) -> Result<Self> {
        Self::open(path, true)
    }

    fn open(path: &Path, write: bool) -> Result<Self> {
        let file_type = identify(path)
            .with_context(|| format!("Failed to identify {}", path.display()))?;
        segfile_config::log_cli_debug!("Identified file", kind = file_type.kind.as_str(), write = write);

        macro_rules! open_as {
            ($variant:ident, $view:ty) => {
                if write {
                    KernelFile::$variant(<$view>::open_write(path)?)
                } else {
                    KernelFile::$variant(<$view>::open_read(path)?)
                }
            };
        }

        let file = match (file_type.architecture, file_type.kind.as_str()) {
            (Architecture::Daf, "SPK") => open_as!(Spk, Spk),
            (Architecture::Daf, "CK") => open_as!(Ck, Ck),
            (Architecture::Daf, "PCK") => open_as!(Pck, Pck),
            (Architecture::Daf, _) => open_as!(Daf, Daf),
            (Architecture::Das, "DSK") => open_as!(Dsk, Dsk),
            (Architecture::Das, "DLA") => open_as!(Dla, Dla),
            (Architecture::Das, _) => open_as!(Das, Das),
        };
        Ok(file)
    }

    pub fn file_type(&self) -> &FileType {
        match self {
            KernelFile::Spk(spk) => spk.daf().file_type(),
            KernelFile::Ck(ck) => ck.daf().file_type(),
            KernelFile::Pck(pck) => pck.daf().file_type(),
            KernelFile::Daf(daf) => daf.file_type(),
            KernelFile::Dsk(dsk) => dsk.dla().das().file_type(),
            KernelFile::Dla(dla) => dla.das().file_type(),
            KernelFile::Das(das) => das.file_type(),
        }
    }

    /// The DAF underneath, if this is a DAF-based file
    pub fn daf(&self) -> Option<&Daf> {
        match self {
            KernelFile::Spk(spk) => Some(spk.daf()),
            KernelFile::Ck(ck) => Some(ck.daf()),
            KernelFile::Pck(pck) => Some(pck.daf()),
            KernelFile::Daf(daf) => Some(daf),
            _ => None,
        }
    }

    /// The DAS underneath, if this is a DAS-based file
    pub fn das(&self) -> Option<&Das> {
        match self {
            KernelFile::Dsk(dsk) => Some(dsk.dla().das()),
            KernelFile::Dla(dla) => Some(dla.das()),
            KernelFile::Das(das) => Some(das),
            _ => None,
        }
    }

    pub fn comments(&mut self) -> &mut dyn CommentStore {
        match self {
            KernelFile::Spk(spk) => spk,
            KernelFile::Ck(ck) => ck,
            KernelFile::Pck(pck) => pck,
            KernelFile::Dsk(dsk) => dsk,
            KernelFile::Dla(dla) => dla,
            KernelFile::Daf(daf) => daf,
            KernelFile::Das(das) => das,
        }
    }

    /// Every segment in directory order. A DAS without a segment list has none.
    pub fn segments(&self) -> Result<Vec<SegmentRow>> {
        let rows = match self {
            KernelFile::Spk(spk) => named_rows(spk.daf(), spk.descriptors()?, SegmentInfo::Spk)?,
            KernelFile::Ck(ck) => named_rows(ck.daf(), ck.descriptors()?, SegmentInfo::Ck)?,
            KernelFile::Pck(pck) => named_rows(pck.daf(), pck.descriptors()?, SegmentInfo::Pck)?,
            KernelFile::Daf(daf) => {
                let segments = daf
                    .segments()
                    .map(|segment| segment.map(|s| (s.clone(), s.summary)))
                    .collect::<segfile_record::Result<Vec<_>>>()?;
                named_rows(daf, segments, SegmentInfo::Daf)?
            }
            KernelFile::Dsk(dsk) => dsk
                .segments()?
                .into_iter()
                .map(|(_, descriptor)| SegmentRow {
                    name: None,
                    segment: SegmentInfo::Dsk(descriptor),
                })
                .collect(),
            KernelFile::Dla(dla) => dla
                .segments()
                .map(|entry| {
                    entry.map(|descriptor| SegmentRow {
                        name: None,
                        segment: SegmentInfo::Dla(descriptor),
                    })
                })
                .collect::<segfile_record::Result<Vec<_>>>()?,
            KernelFile::Das(_) => Vec::new(),
        };
        Ok(rows)
    }

    pub fn close(&mut self) -> Result<()> {
        match self {
            KernelFile::Spk(spk) => spk.close()?,
            KernelFile::Ck(ck) => ck.close()?,
            KernelFile::Pck(pck) => pck.close()?,
            KernelFile::Dsk(dsk) => dsk.close()?,
            KernelFile::Dla(dla) => dla.close()?,
            KernelFile::Daf(daf) => daf.close()?,
            KernelFile::Das(das) => das.close()?,
        }
        Ok(())
    }
}

fn named_rows<D>(
    daf: &Daf,
    segments: Vec<(segfile_daf::DafSegment, D)>,
    wrap: fn(D) -> SegmentInfo,
) -> Result<Vec<SegmentRow>> {
    segments
        .into_iter()
        .map(|(segment, descriptor)| {
            Ok(SegmentRow {
                name: Some(daf.segment_name(&segment)?),
                segment: wrap(descriptor),
            })
        })
        .collect()
}

/// One line of the `segments` listing
#[derive(Debug, Serialize)]
pub struct SegmentRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub segment: SegmentInfo,
}

#[derive(Debug, Serialize)]
#[serde(tag = "kind", content = "descriptor")]
pub enum SegmentInfo {
    #[serde(rename = "SPK")]
    Spk(SpkDescriptor),
    #[serde(rename = "CK")]
    Ck(CkDescriptor),
    #[serde(rename = "PCK")]
    Pck(PckDescriptor),
    #[serde(rename = "DSK")]
    Dsk(DskDescriptor),
    #[serde(rename = "DLA")]
    Dla(DlaDescriptor),
    #[serde(rename = "DAF")]
    Daf(Summary),
}

impl fmt::Display for SegmentRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "{:<40} ", name)?;
        }
        write!(f, "{}", self.segment)
    }
}

impl fmt::Display for SegmentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentInfo::Spk(d) => write!(
                f,
                "body {} center {} frame {} type {} [{}, {}]",
                d.body, d.center, d.frame, d.data_type, d.start, d.stop
            ),
            SegmentInfo::Ck(d) => write!(
                f,
                "instrument {} frame {} type {} av {} [{}, {}] ticks",
                d.instrument,
                d.frame,
                d.data_type,
                if d.has_angular_velocity { "yes" } else { "no" },
                d.start,
                d.stop
            ),
            SegmentInfo::Pck(d) => write!(
                f,
                "class {} frame {} type {} [{}, {}]",
                d.class_id, d.frame, d.data_type, d.start, d.stop
            ),
            SegmentInfo::Dsk(d) => write!(
                f,
                "surface {} center {} frame {} type {} {:?} [{}, {}]",
                d.surface, d.center, d.frame, d.data_type, d.coordinate_system, d.start, d.stop
            ),
            SegmentInfo::Dla(d) => write!(
                f,
                "descriptor {} ints {}+{} doubles {}+{} chars {}+{}",
                d.pointer,
                d.int_base,
                d.int_size,
                d.double_base,
                d.double_size,
                d.char_base,
                d.char_size
            ),
            SegmentInfo::Daf(s) => write!(f, "doubles {:?} ints {:?}", s.doubles, s.ints),
        }
    }
}
