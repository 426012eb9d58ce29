//! # segfile-kernels
//!
//! Typed kernel views over the segment directories:
//!
//! - [`Spk`], [`Ck`] and [`Pck`] hold a [`Daf`](segfile_daf::Daf) with the
//!   descriptor shape of their kind
//! - [`Dsk`] holds a [`Dla`](segfile_das::Dla) whose segments start with a
//!   24-double descriptor
//!
//! Views validate the file's architecture and type tag on open, convert
//! caller times into the file's native time representation, and flatten
//! per-record inputs into the single data array each segment is written as.

#[macro_use]
mod daf_view;

pub mod chebyshev;
pub mod ck;
pub mod dsk;
pub mod dsk02;
pub mod pck;
pub mod spk;
pub mod time;
pub mod window;

pub use chebyshev::ChebyshevSeries;
pub use ck::{Ck, CkCoverageOptions, CkDescriptor, CkSegment, CkType02Records, CkType03Records, CoverageLevel};
pub use dsk::{CoordinateSystem, DataClass, Dsk, DskDescriptor};
pub use dsk02::{Dsk02Segment, SpatialIndex};
pub use pck::{Pck, PckDescriptor, PckSegment};
pub use spk::{Spk, SpkDescriptor, SpkSegment};
pub use time::{Et, Instrument, LinearClock, SclkDuration, TickClock, Ticks, TimeSystem};
pub use window::Window;

pub use segfile_config::{ToleranceConfig, ToleranceKey};
