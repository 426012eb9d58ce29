//! Handle plumbing shared by the DAF-based kernels.
//!
//! Each view wraps a [`Daf`](segfile_daf::Daf) of a fixed type tag and
//! descriptor shape; `daf_view!` generates the open/create methods, the
//! typed descriptor listing, the checked segment append and the comment
//! delegation.

use segfile_record::format::check_printable;
use segfile_record::{ErrorKind, KernelError, Result};

/// Check a segment name against the directory's name length.
pub(crate) fn check_segment_name(name: &str, max: usize) -> Result<()> {
    check_printable("segment name", name)?;
    if name.len() > max {
        return Err(KernelError::new(
            ErrorKind::InvalidValue,
            format!("segment name '{}' is longer than {} characters", name, max),
        ));
    }
    Ok(())
}

/// Check that a descriptor time range is ordered.
pub(crate) fn check_time_bounds(start: f64, stop: f64) -> Result<()> {
    if start.is_nan() || stop.is_nan() || start >= stop {
        return Err(KernelError::new(
            ErrorKind::InvalidValue,
            format!("segment start {} is not before its stop {}", start, stop),
        ));
    }
    Ok(())
}

/// Check that `times` is strictly increasing.
pub(crate) fn check_increasing(what: &str, times: &[f64]) -> Result<()> {
    if let Some(i) = times.windows(2).position(|w| w[0].is_nan() || w[0] >= w[1]) {
        return Err(KernelError::new(
            ErrorKind::InvalidValue,
            format!(
                "{} are not strictly increasing at index {} ({} then {})",
                what,
                i + 1,
                times[i],
                times[i + 1]
            ),
        ));
    }
    Ok(())
}

/// Every 100th epoch, used as a coarse search directory.
pub(crate) fn epoch_directory(epochs: &[f64]) -> impl Iterator<Item = f64> + '_ {
    epochs.iter().copied().skip(99).step_by(100).take((epochs.len().max(1) - 1) / 100)
}

macro_rules! daf_view {
    ($view:ident, $kind:literal, $descriptor:ty) => {
        impl $view {
            /// Create a new, empty kernel open for write.
            pub fn create<P: AsRef<std::path::Path>>(
                path: P,
                internal_name: &str,
                comment_chars: usize,
            ) -> segfile_record::Result<Self> {
                use segfile_daf::DescriptorCodec;
                let daf = segfile_daf::Daf::create(
                    path,
                    internal_name,
                    <$descriptor>::ND,
                    <$descriptor>::NI,
                    comment_chars,
                    $kind,
                )?;
                segfile_config::log_kernel_info!("Created kernel", kind = $kind);
                Ok(Self { daf })
            }

            pub fn open_read<P: AsRef<std::path::Path>>(path: P) -> segfile_record::Result<Self> {
                Self::from_daf(segfile_daf::Daf::open_read(path)?)
            }

            pub fn open_write<P: AsRef<std::path::Path>>(path: P) -> segfile_record::Result<Self> {
                Self::from_daf(segfile_daf::Daf::open_write(path)?)
            }

            fn from_daf(daf: segfile_daf::Daf) -> segfile_record::Result<Self> {
                use segfile_daf::DescriptorCodec;
                daf.file_type()
                    .expect(segfile_record::Architecture::Daf, &[$kind])?;
                if daf.nd() != <$descriptor>::ND || daf.ni() != <$descriptor>::NI {
                    return Err(segfile_record::KernelError::new(
                        segfile_record::ErrorKind::InvalidFormat,
                        format!(
                            "{} file has ND={} NI={}; expected ND={} NI={}",
                            $kind,
                            daf.nd(),
                            daf.ni(),
                            <$descriptor>::ND,
                            <$descriptor>::NI
                        ),
                    ));
                }
                Ok(Self { daf })
            }

            /// The underlying DAF
            pub fn daf(&self) -> &segfile_daf::Daf {
                &self.daf
            }

            pub fn count_segments(&self) -> segfile_record::Result<usize> {
                self.daf.count_segments()
            }

            /// Every segment with its decoded descriptor, in directory order.
            pub fn descriptors(
                &self,
            ) -> segfile_record::Result<Vec<(segfile_daf::DafSegment, $descriptor)>> {
                use segfile_daf::DescriptorCodec;
                use segfile_record::SegmentDirectory;
                self.daf
                    .segments()
                    .map(|segment| {
                        let segment = segment?;
                        let descriptor = <$descriptor>::from_summary(&segment.summary)?;
                        Ok((segment, descriptor))
                    })
                    .collect()
            }

            /// Data of one segment, without the descriptor.
            pub fn segment_data(
                &self,
                segment: &segfile_daf::DafSegment,
            ) -> segfile_record::Result<Vec<f64>> {
                self.daf.segment_data(segment)
            }

            pub fn close(&mut self) -> segfile_record::Result<()> {
                self.daf.close()
            }

            fn append(
                &mut self,
                descriptor: &$descriptor,
                name: &str,
                data: &[f64],
            ) -> segfile_record::Result<segfile_daf::DafSegment> {
                use segfile_daf::DescriptorCodec;
                $crate::daf_view::check_time_bounds(descriptor.start, descriptor.stop)?;
                $crate::daf_view::check_segment_name(
                    name,
                    segfile_daf::summary::name_len(<$descriptor>::ND, <$descriptor>::NI),
                )?;
                let segment = self.daf.append_segment(&descriptor.to_summary(), name, data)?;
                segfile_config::log_kernel_debug!(
                    "Wrote segment",
                    kind = $kind,
                    data_type = descriptor.data_type,
                    len = data.len()
                );
                Ok(segment)
            }
        }

        impl segfile_record::CommentStore for $view {
            fn add_comments(&mut self, lines: &[&str]) -> segfile_record::Result<()> {
                segfile_record::CommentStore::add_comments(&mut self.daf, lines)
            }

            fn read_comments(&self, max_line_len: usize) -> segfile_record::Result<Vec<String>> {
                segfile_record::CommentStore::read_comments(&self.daf, max_line_len)
            }

            fn delete_comments(&mut self) -> segfile_record::Result<()> {
                segfile_record::CommentStore::delete_comments(&mut self.daf)
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_directory() {
        let epochs: Vec<f64> = (1..=250).map(f64::from).collect();
        assert_eq!(epoch_directory(&epochs).collect::<Vec<_>>(), vec![100.0, 200.0]);

        let epochs: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(epoch_directory(&epochs).count(), 0);

        let epochs: Vec<f64> = (1..=101).map(f64::from).collect();
        assert_eq!(epoch_directory(&epochs).collect::<Vec<_>>(), vec![100.0]);
        assert_eq!(epoch_directory(&[]).count(), 0);
    }

    #[test]
    fn test_checks() {
        assert!(check_increasing("epochs", &[1.0, 2.0, 3.0]).is_ok());
        assert!(check_increasing("epochs", &[1.0, 1.0]).is_err());
        assert!(check_time_bounds(1.0, 1.0).is_err());
        assert!(check_segment_name("ok", 40).is_ok());
        assert!(check_segment_name(&"x".repeat(41), 40).is_err());
        assert!(check_segment_name("tab\there", 40).is_err());
    }
}
