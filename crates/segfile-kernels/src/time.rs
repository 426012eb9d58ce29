//! Time representations used by kernel descriptors.
//!
//! SPK and PCK segments are stamped in TDB seconds past J2000 ([`Et`]).
//! CK segments use continuous spacecraft clock ticks ([`Ticks`]); the
//! mapping between the two is supplied by the caller through [`TickClock`].

use serde::Serialize;

use segfile_record::{ErrorKind, KernelError, Result};

/// TDB seconds past J2000
pub type Et = f64;

/// Continuous spacecraft clock ticks
pub type Ticks = f64;

/// A spacecraft clock: converts between TDB and encoded ticks.
pub trait TickClock {
    /// Clock identifier, conventionally the spacecraft id
    fn clock_id(&self) -> i32;

    fn to_ticks(&self, et: Et) -> Result<Ticks>;

    fn to_et(&self, ticks: Ticks) -> Result<Et>;
}

/// A clock whose tick count grows linearly with TDB.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearClock {
    pub id: i32,
    /// TDB at tick zero
    pub epoch: Et,
    pub ticks_per_second: f64,
}

impl LinearClock {
    pub fn new(id: i32, epoch: Et, ticks_per_second: f64) -> Result<Self> {
        if !ticks_per_second.is_finite() || ticks_per_second <= 0.0 {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("clock rate must be positive, got {}", ticks_per_second),
            ));
        }
        Ok(Self {
            id,
            epoch,
            ticks_per_second,
        })
    }
}

impl TickClock for LinearClock {
    fn clock_id(&self) -> i32 {
        self.id
    }

    fn to_ticks(&self, et: Et) -> Result<Ticks> {
        let ticks = (et - self.epoch) * self.ticks_per_second;
        if ticks < 0.0 {
            return Err(KernelError::new(
                ErrorKind::InvalidValue,
                format!("epoch {} precedes the start of clock {}", et, self.id),
            ));
        }
        Ok(ticks)
    }

    fn to_et(&self, ticks: Ticks) -> Result<Et> {
        Ok(self.epoch + ticks / self.ticks_per_second)
    }
}

/// A duration measured in ticks of a specific clock
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SclkDuration {
    pub clock_id: i32,
    pub ticks: Ticks,
}

impl SclkDuration {
    pub fn new(clock_id: i32, ticks: Ticks) -> Self {
        Self { clock_id, ticks }
    }

    /// A zero-length duration on `clock`
    pub fn zero(clock: &dyn TickClock) -> Self {
        Self::new(clock.clock_id(), 0.0)
    }
}

/// An instrument and the clock that stamps its pointing
#[derive(Clone, Copy)]
pub struct Instrument<'a> {
    pub id: i32,
    pub clock: &'a dyn TickClock,
}

impl<'a> Instrument<'a> {
    pub fn new(id: i32, clock: &'a dyn TickClock) -> Self {
        Self { id, clock }
    }
}

impl std::fmt::Debug for Instrument<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("id", &self.id)
            .field("clock", &self.clock.clock_id())
            .finish()
    }
}

/// Time system of a CK coverage window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeSystem {
    Sclk,
    Tdb,
}
