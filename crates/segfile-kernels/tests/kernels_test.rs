//! Typed view tests through the public API.

use segfile_config::testing::TestEnvironment;
use segfile_kernels::{
    ChebyshevSeries, Ck, CkCoverageOptions, CkSegment, CkType02Records, CkType03Records,
    CoordinateSystem, CoverageLevel, DataClass, Dsk, Dsk02Segment, DskDescriptor, Instrument,
    LinearClock, Pck, SclkDuration, SpatialIndex, Spk, SpkSegment, TimeSystem, ToleranceConfig,
};
use segfile_record::{CommentStore, ErrorKind};

const IDENTITY: [f64; 4] = [1.0, 0.0, 0.0, 0.0];

fn spk_segment(body: i32, start: f64, stop: f64) -> SpkSegment<'static> {
    SpkSegment {
        body,
        center: 399,
        frame: 1,
        start,
        stop,
        name: "TEST SEGMENT",
    }
}

fn write_chebyshev(spk: &mut Spk, body: i32, start: f64, records: usize) {
    let coefficients = vec![0.25; records * 3 * 6];
    let series = ChebyshevSeries {
        first: start,
        interval_length: 100.0,
        degree: 5,
        coefficients: &coefficients,
    };
    let stop = series.last(3).unwrap();
    spk.write_type02(&spk_segment(body, start, stop), &series).unwrap();
}

#[test]
fn test_spk_bodies_and_coverage() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("moons.bsp");
    let mut spk = Spk::create(&path, "MOONS", 0).unwrap();
    write_chebyshev(&mut spk, 301, 0.0, 3);
    write_chebyshev(&mut spk, 301, 300.0, 2);
    write_chebyshev(&mut spk, 301, 1000.0, 1);
    write_chebyshev(&mut spk, 401, 0.0, 1);
    spk.close().unwrap();

    let spk = Spk::open_read(&path).unwrap();
    assert_eq!(spk.bodies().unwrap().into_iter().collect::<Vec<_>>(), vec![301, 401]);
    // touching segments merge, the later one stays separate
    assert_eq!(
        spk.coverage(301).unwrap().intervals(),
        &[(0.0, 500.0), (1000.0, 1100.0)]
    );
    let mut window = spk.coverage(401).unwrap();
    spk.coverage_into(301, &mut window).unwrap();
    assert_eq!(window.len(), 2);

    let descriptors = spk.descriptors().unwrap();
    assert_eq!(descriptors.len(), 4);
    let (segment, descriptor) = &descriptors[0];
    assert_eq!(descriptor.data_type, 2);
    assert_eq!(descriptor.begin, segment.summary.begin_address());
    assert_eq!(spk.daf().segment_name(segment).unwrap(), "TEST SEGMENT");
    // 3 records of 2 + 18 words plus the trailer
    assert_eq!(spk.segment_data(segment).unwrap().len(), 3 * 20 + 4);
}

#[test]
fn test_empty_files_aggregate_to_nothing() {
    let env = TestEnvironment::new().unwrap();
    let spk_path = env.kernel_path("empty.bsp");
    Spk::create(&spk_path, "EMPTY", 0).unwrap().close().unwrap();
    let spk = Spk::open_read(&spk_path).unwrap();
    assert!(spk.bodies().unwrap().is_empty());
    assert!(spk.coverage(399).unwrap().is_empty());
    assert_eq!(spk.count_segments().unwrap(), 0);

    let dsk_path = env.kernel_path("empty.bds");
    Dsk::create(&dsk_path, "EMPTY", 0).unwrap().close().unwrap();
    let dsk = Dsk::open_read(&dsk_path).unwrap();
    assert!(dsk.bodies().unwrap().is_empty());
    assert_eq!(dsk.segment_count().unwrap(), 0);
}

#[test]
fn test_views_check_file_type() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("typed.bsp");
    Spk::create(&path, "TYPED", 0).unwrap().close().unwrap();

    assert_eq!(Ck::open_read(&path).unwrap_err().kind(), ErrorKind::WrongFileType);
    assert_eq!(Pck::open_read(&path).unwrap_err().kind(), ErrorKind::WrongFileType);
    assert_eq!(Dsk::open_read(&path).unwrap_err().kind(), ErrorKind::WrongFileType);

    let mut reader = Spk::open_read(&path).unwrap();
    assert_eq!(Spk::open_write(&path).unwrap_err().kind(), ErrorKind::AccessModeConflict);
    let coefficients = [0.0; 6];
    let series = ChebyshevSeries {
        first: 0.0,
        interval_length: 1.0,
        degree: 1,
        coefficients: &coefficients,
    };
    assert_eq!(
        reader
            .write_type02(&spk_segment(301, 0.0, 1.0), &series)
            .unwrap_err()
            .kind(),
        ErrorKind::NotWritable
    );
    assert_eq!(reader.add_comments(&["x"]).unwrap_err().kind(), ErrorKind::NotWritable);
}

fn ck_type02(ck: &mut Ck, instrument: Instrument<'_>, intervals: &[(f64, f64)]) {
    let starts: Vec<f64> = intervals.iter().map(|i| i.0).collect();
    let stops: Vec<f64> = intervals.iter().map(|i| i.1).collect();
    let n = intervals.len();
    let segment = CkSegment {
        instrument,
        frame: 1,
        first: starts[0],
        last: stops[n - 1],
        name: "ATTITUDE",
    };
    ck.write_type02(
        &segment,
        &CkType02Records {
            starts: &starts,
            stops: &stops,
            quaternions: &vec![IDENTITY; n],
            angular_velocities: &vec![[0.0, 0.0, 0.01]; n],
            rates: &vec![1.0; n],
        },
    )
    .unwrap();
}

#[test]
fn test_ck_disjoint_intervals_stay_separate() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("disjoint.bc");
    let clock = LinearClock::new(-82, 0.0, 1.0).unwrap();
    let instrument = Instrument::new(-82000, &clock);

    let mut ck = Ck::create(&path, "DISJOINT", 0).unwrap();
    ck_type02(&mut ck, instrument, &[(100.0, 200.0)]);
    ck_type02(&mut ck, instrument, &[(250.0, 300.0)]);
    ck.close().unwrap();

    let ck = Ck::open_read(&path).unwrap();
    assert_eq!(ck.instruments().unwrap().into_iter().collect::<Vec<_>>(), vec![-82000]);

    let options = CkCoverageOptions::segment_level(&instrument);
    let window = ck.coverage(&instrument, &options).unwrap();
    assert_eq!(window.intervals(), &[(100.0, 200.0), (250.0, 300.0)]);

    let interval_level = CkCoverageOptions {
        level: CoverageLevel::Interval,
        ..options
    };
    let window = ck.coverage(&instrument, &interval_level).unwrap();
    assert_eq!(window.len(), 2);
}

#[test]
fn test_ck_clock_mismatch() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("mismatch.bc");
    let clock = LinearClock::new(-82, 0.0, 1.0).unwrap();
    let instrument = Instrument::new(-82000, &clock);
    let mut ck = Ck::create(&path, "MISMATCH", 0).unwrap();
    ck_type02(&mut ck, instrument, &[(10.0, 20.0)]);

    let options = CkCoverageOptions {
        need_av: false,
        level: CoverageLevel::Segment,
        tolerance: SclkDuration::new(-99, 1.0),
        time_system: TimeSystem::Sclk,
    };
    assert_eq!(
        ck.coverage(&instrument, &options).unwrap_err().kind(),
        ErrorKind::ClockMismatch
    );
}

#[test]
fn test_ck_type03_interval_coverage_in_tdb() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("type03.bc");
    // two ticks per second, tick zero at TDB 1000
    let clock = LinearClock::new(-77, 1000.0, 2.0).unwrap();
    let instrument = Instrument::new(-77001, &clock);

    let tags = [1000.0, 1010.0, 1020.0, 1100.0, 1110.0];
    let mut ck = Ck::create(&path, "TYPE03", 0).unwrap();
    let segment = CkSegment {
        instrument,
        frame: 1,
        first: 1000.0,
        last: 1110.0,
        name: "DISCRETE",
    };
    ck.write_type03(
        &segment,
        &CkType03Records {
            tags: &tags,
            quaternions: &[IDENTITY; 5],
            angular_velocities: None,
            interval_starts: &[1000.0, 1100.0],
        },
    )
    .unwrap();

    let options = CkCoverageOptions {
        need_av: false,
        level: CoverageLevel::Interval,
        tolerance: SclkDuration::new(-77, 0.0),
        time_system: TimeSystem::Tdb,
    };
    let window = ck.coverage(&instrument, &options).unwrap();
    assert_eq!(window.intervals(), &[(1000.0, 1020.0), (1100.0, 1110.0)]);

    // no angular velocity in this segment
    let need_av = CkCoverageOptions {
        need_av: true,
        ..options
    };
    assert!(ck.coverage(&instrument, &need_av).unwrap().is_empty());

    // interval starts must be time tags
    let bad = CkType03Records {
        tags: &tags,
        quaternions: &[IDENTITY; 5],
        angular_velocities: None,
        interval_starts: &[1000.0, 1050.0],
    };
    assert_eq!(
        ck.write_type03(&segment, &bad).unwrap_err().kind(),
        ErrorKind::InvalidValue
    );
}

fn plate_box(surface: i32, center: i32, scale: f64, lon: [f64; 2]) -> Dsk02Segment {
    let vertices: Vec<[f64; 3]> = [
        [-1.0, -1.0, -1.0],
        [1.0, -1.0, -1.0],
        [1.0, 1.0, -1.0],
        [-1.0, 1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, 1.0, 1.0],
        [-1.0, 1.0, 1.0],
    ]
    .iter()
    .map(|v| [v[0] * scale, v[1] * scale, v[2] * scale])
    .collect();
    let plates = vec![
        [1, 3, 2],
        [1, 4, 3],
        [5, 6, 7],
        [5, 7, 8],
        [1, 2, 6],
        [1, 6, 5],
        [2, 3, 7],
        [2, 7, 6],
        [3, 4, 8],
        [3, 8, 7],
        [4, 1, 5],
        [4, 5, 8],
    ];
    let index = SpatialIndex::single_voxel(&vertices, &plates).unwrap();
    Dsk02Segment {
        descriptor: DskDescriptor {
            surface,
            center,
            data_class: DataClass::General,
            data_type: 2,
            frame: 10000 + center,
            coordinate_system: CoordinateSystem::Latitudinal,
            parameters: [0.0; 10],
            bounds: [
                lon,
                [-std::f64::consts::FRAC_PI_2, std::f64::consts::FRAC_PI_2],
                [scale, scale * 3.0_f64.sqrt()],
            ],
            start: -1.0e10,
            stop: 1.0e10,
        },
        vertices,
        plates,
        index,
    }
}

#[test]
fn test_dsk_segments_bodies_and_selection() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("boxes.bds");
    let whole = [-std::f64::consts::PI, std::f64::consts::PI];
    let east = [0.0, std::f64::consts::PI];

    let mut dsk = Dsk::create(&path, "BOXES", 0).unwrap();
    dsk.write_type02(&plate_box(1, 2000, 1.0, whole)).unwrap();
    dsk.write_type02(&plate_box(2, 2000, 1.0, east)).unwrap();
    dsk.write_type02(&plate_box(1, 3000, 5.0, whole)).unwrap();
    dsk.add_comments(&["Three boxes.", "Not to scale."]).unwrap();
    dsk.close().unwrap();

    let dsk = Dsk::open_read(&path).unwrap();
    assert_eq!(dsk.segment_count().unwrap(), 3);
    assert_eq!(dsk.bodies().unwrap().into_iter().collect::<Vec<_>>(), vec![2000, 3000]);
    assert_eq!(dsk.surfaces(2000).unwrap().into_iter().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(dsk.read_comments(80).unwrap(), vec!["Three boxes.", "Not to scale."]);

    let segments = dsk.segments().unwrap();
    let (last, descriptor) = &segments[2];
    assert_eq!(descriptor.center, 3000);
    assert_eq!(dsk.plate_model_counts(last).unwrap(), (8, 12));
    assert_eq!(dsk.vertices(last, 7, 1).unwrap(), vec![[5.0, 5.0, 5.0]]);
    assert_eq!(dsk.segment_type02(last).unwrap(), plate_box(1, 3000, 5.0, whole));

    let tolerances = ToleranceConfig::default();
    // a point on the +y face is in the eastern hemisphere
    let selected = dsk
        .select_segments(2000, &[], 0.0, [0.0, 1.2, 0.0], &tolerances)
        .unwrap();
    assert_eq!(selected.len(), 2);
    let west = dsk
        .select_segments(2000, &[], 0.0, [0.0, -1.2, 0.0], &tolerances)
        .unwrap();
    assert_eq!(west, vec![segments[0].0]);
    let only_two = dsk
        .select_segments(2000, &[2], 0.0, [0.0, 1.2, 0.0], &tolerances)
        .unwrap();
    assert_eq!(only_two, vec![segments[1].0]);
    assert!(dsk
        .select_segments(3000, &[], 0.0, [0.0, 1.2, 0.0], &tolerances)
        .unwrap()
        .is_empty());
}
