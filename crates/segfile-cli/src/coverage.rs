//! # Coverage
//!
//! Union of the time coverage of one object across any number of kernels of
//! the same type.

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;

use segfile_kernels::{
    CkCoverageOptions, CoverageLevel, Instrument, LinearClock, SclkDuration, TimeSystem, Window,
};

use crate::kernel::KernelFile;

#[derive(Args, Debug)]
pub struct CoverageArgs {
    /// Kernel files; all must have the same type
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Body (SPK, DSK), frame class (PCK) or instrument (CK) id
    #[arg(long, allow_hyphen_values = true)]
    pub id: i32,

    /// CK: widen each interval by this many ticks
    #[arg(long, value_name = "TICKS", default_value_t = 0.0)]
    pub tol: f64,

    /// CK: report interpolation intervals instead of segment bounds
    #[arg(long)]
    pub intervals: bool,

    /// CK: only count segments with angular velocity
    #[arg(long)]
    pub need_av: bool,

    /// CK: report TDB seconds through a linear clock instead of ticks
    #[arg(long)]
    pub tdb: bool,

    /// CK: TDB at tick zero of the linear clock
    #[arg(long, value_name = "ET", default_value_t = 0.0, allow_hyphen_values = true)]
    pub clock_epoch: f64,

    /// CK: tick rate of the linear clock
    #[arg(long, value_name = "RATE", default_value_t = 1.0)]
    pub ticks_per_second: f64,

    /// Print JSON instead of one interval per line
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct CoverageReport {
    pub id: i32,
    pub kind: String,
    pub intervals: Vec<(f64, f64)>,
    pub measure: f64,
}

pub fn run(args: CoverageArgs, pretty_json: bool) -> Result<()> {
    let report = collect(&args)?;
    if args.json {
        let json = if pretty_json {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        println!("{}", json);
        return Ok(());
    }
    if report.intervals.is_empty() {
        println!("No coverage for {} in {} file(s)", report.id, args.files.len());
    }
    for (start, stop) in &report.intervals {
        println!("{:>24.6} {:>24.6}", start, stop);
    }
    Ok(())
}

/// Spacecraft clock id conventionally paired with a CK instrument id
pub fn clock_id(instrument: i32) -> i32 {
    instrument / 1000
}

pub fn collect(args: &CoverageArgs) -> Result<CoverageReport> {
    let clock = LinearClock::new(clock_id(args.id), args.clock_epoch, args.ticks_per_second)?;
    let instrument = Instrument::new(args.id, &clock);
    let options = CkCoverageOptions {
        need_av: args.need_av,
        level: if args.intervals {
            CoverageLevel::Interval
        } else {
            CoverageLevel::Segment
        },
        tolerance: SclkDuration::new(clock.id, args.tol),
        time_system: if args.tdb {
            TimeSystem::Tdb
        } else {
            TimeSystem::Sclk
        },
    };

    let mut window = Window::new();
    let mut kind: Option<String> = None;
    for path in &args.files {
        let mut file = KernelFile::open_read(path)?;
        let this_kind = file.file_type().to_string();
        if let Some(first) = kind.as_deref().filter(|first| *first != this_kind) {
            bail!("{} is {} but earlier files are {}", path.display(), this_kind, first);
        }
        kind.get_or_insert(this_kind);

        match &file {
            KernelFile::Spk(spk) => spk.coverage_into(args.id, &mut window)?,
            KernelFile::Pck(pck) => pck.coverage_into(args.id, &mut window)?,
            KernelFile::Ck(ck) => ck.coverage_into(&instrument, &options, &mut window)?,
            KernelFile::Dsk(dsk) => {
                for (_, descriptor) in dsk.segments()? {
                    if descriptor.center == args.id {
                        window.insert(descriptor.start, descriptor.stop)?;
                    }
                }
            }
            _ => bail!("{} files carry no time coverage", file.file_type()),
        }
        file.close()?;
    }
    segfile_config::log_cli_debug!("Coverage collected", id = args.id, intervals = window.len());

    Ok(CoverageReport {
        id: args.id,
        kind: kind.unwrap_or_default(),
        intervals: window.intervals().to_vec(),
        measure: window.measure(),
    })
}
