//! Fixed-length Chebyshev record sets shared by SPK types 2/3 and PCK type 2.
//!
//! Each record covers one interval of equal length and holds the interval
//! midpoint, its half length, and `degree + 1` coefficients per component.
//! The segment ends with `[INIT, INTLEN, RSIZE, N]`.

use serde::Serialize;

use segfile_record::{ErrorKind, KernelError, Result};

use crate::time::Et;

/// Words in the record set trailer
pub const TRAILER_LEN: usize = 4;

/// Chebyshev coefficients for consecutive equal-length intervals
#[derive(Debug, Clone, Copy)]
pub struct ChebyshevSeries<'a> {
    /// Start of the first interval
    pub first: Et,
    pub interval_length: f64,
    pub degree: usize,
    /// Coefficients ordered by record, then component, then degree
    pub coefficients: &'a [f64],
}

impl ChebyshevSeries<'_> {
    /// Number of records for `components` components per record.
    pub fn record_count(&self, components: usize) -> Result<usize> {
        let per_record = components * (self.degree + 1);
        if self.coefficients.is_empty() || self.coefficients.len() % per_record != 0 {
            return Err(KernelError::new(
                ErrorKind::InvalidArraySize,
                format!(
                    "{} coefficients do not form whole records of {} components of degree {}",
                    self.coefficients.len(),
                    components,
                    self.degree
                ),
            ));
        }
        Ok(self.coefficients.len() / per_record)
    }

    /// End of the last interval
    pub fn last(&self, components: usize) -> Result<Et> {
        Ok(self.first + self.record_count(components)? as f64 * self.interval_length)
    }

    /// Flatten into segment data: records followed by the trailer.
    pub fn pack(&self, components: usize) -> Result<Vec<f64>> {
        if !(self.interval_length.is_finite() && self.interval_length > 0.0) {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("interval length must be positive, got {}", self.interval_length),
            ));
        }
        let n = self.record_count(components)?;
        let per_record = components * (self.degree + 1);
        let radius = self.interval_length / 2.0;

        let mut data = Vec::with_capacity(n * (per_record + 2) + TRAILER_LEN);
        for (i, coeffs) in self.coefficients.chunks(per_record).enumerate() {
            data.push(self.first + (i as f64 + 0.5) * self.interval_length);
            data.push(radius);
            data.extend_from_slice(coeffs);
        }
        data.extend_from_slice(&[
            self.first,
            self.interval_length,
            (per_record + 2) as f64,
            n as f64,
        ]);
        Ok(data)
    }
}

/// Trailer of a packed record set
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChebyshevTrailer {
    pub first: Et,
    pub interval_length: f64,
    pub record_size: usize,
    pub record_count: usize,
}

impl ChebyshevTrailer {
    /// Read the trailer at the end of segment data.
    pub fn from_data(data: &[f64]) -> Result<Self> {
        let tail = data
            .len()
            .checked_sub(TRAILER_LEN)
            .map(|at| &data[at..])
            .ok_or_else(|| {
                KernelError::new(
                    ErrorKind::InvalidFormat,
                    "segment is too short to hold a Chebyshev trailer",
                )
            })?;
        let trailer = Self {
            first: tail[0],
            interval_length: tail[1],
            record_size: tail[2] as usize,
            record_count: tail[3] as usize,
        };
        if trailer.record_size * trailer.record_count + TRAILER_LEN != data.len() {
            return Err(KernelError::new(
                ErrorKind::InvalidFormat,
                format!(
                    "trailer describes {} records of {} words but the segment holds {} words",
                    trailer.record_count,
                    trailer.record_size,
                    data.len()
                ),
            ));
        }
        Ok(trailer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_layout() {
        let coefficients: Vec<f64> = (0..12).map(f64::from).collect();
        let series = ChebyshevSeries {
            first: 100.0,
            interval_length: 10.0,
            degree: 1,
            coefficients: &coefficients,
        };
        assert_eq!(series.record_count(3).unwrap(), 2);
        assert_eq!(series.last(3).unwrap(), 120.0);

        let data = series.pack(3).unwrap();
        assert_eq!(&data[..8], &[105.0, 5.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(&data[8..10], &[115.0, 5.0]);
        assert_eq!(&data[16..], &[100.0, 10.0, 8.0, 2.0]);

        let trailer = ChebyshevTrailer::from_data(&data).unwrap();
        assert_eq!(trailer.record_count, 2);
        assert_eq!(trailer.record_size, 8);
    }

    #[test]
    fn test_partial_record_rejected() {
        let coefficients = [1.0; 7];
        let series = ChebyshevSeries {
            first: 0.0,
            interval_length: 1.0,
            degree: 1,
            coefficients: &coefficients,
        };
        assert_eq!(series.pack(3).unwrap_err().kind(), ErrorKind::InvalidArraySize);
    }

    #[test]
    fn test_bad_interval_length() {
        let coefficients = [1.0; 6];
        let series = ChebyshevSeries {
            first: 0.0,
            interval_length: 0.0,
            degree: 1,
            coefficients: &coefficients,
        };
        assert_eq!(series.pack(3).unwrap_err().kind(), ErrorKind::InvalidValue);
    }

    #[test]
    fn test_trailer_mismatch() {
        assert!(ChebyshevTrailer::from_data(&[1.0, 2.0]).is_err());
        assert!(ChebyshevTrailer::from_data(&[0.0, 1.0, 5.0, 3.0]).is_err());
    }
}
