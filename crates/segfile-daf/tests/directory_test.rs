//! End-to-end tests for the DAF directory: write, close, reopen, traverse.

use segfile_config::testing::TestEnvironment;
use segfile_daf::{Daf, Summary};
use segfile_record::{CommentStore, ErrorKind, SegmentDirectory};

fn summary(body: i32, start: f64) -> Summary {
    Summary::new(vec![start, start + 100.0], vec![body, 0, 1, 2, 0, 0])
}

fn segment_data(body: i32) -> Vec<f64> {
    (0..(body as usize % 7 + 1) * 40).map(|i| body as f64 + i as f64 / 1000.0).collect()
}

/// Write `n` segments and close the file
fn write_file(path: &std::path::Path, n: i32, comment_chars: usize) {
    let mut daf = Daf::create(path, "ROUND TRIP", 2, 6, comment_chars, "SPK").unwrap();
    for body in 1..=n {
        daf.append_segment(
            &summary(body, body as f64 * 1000.0),
            &format!("SEGMENT {}", body),
            &segment_data(body),
        )
        .unwrap();
    }
    daf.close().unwrap();
}

#[test]
fn test_round_trip_across_summary_records() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("many.bsp");
    // 25 SPK summaries fit in one record, so this needs three
    write_file(&path, 60, 0);

    let daf = Daf::open_read(&path).unwrap();
    assert_eq!(daf.nd(), 2);
    assert_eq!(daf.ni(), 6);
    assert_eq!(daf.internal_name(), "ROUND TRIP");
    assert_eq!(daf.count_segments().unwrap(), 60);

    let mut search = daf.begin_forward_search().unwrap();
    let mut body = 0;
    while search.find_next(&daf).unwrap() {
        body += 1;
        let descr = search.descriptor().unwrap();
        assert_eq!(descr.ints[0], body);
        assert_eq!(descr.doubles[0], body as f64 * 1000.0);
        assert_eq!(search.name(&daf).unwrap(), format!("SEGMENT {}", body));
        let data = daf.segment_data(search.segment().unwrap()).unwrap();
        assert_eq!(data, segment_data(body));
    }
    assert_eq!(body, 60);

    let mut search = daf.begin_backward_search().unwrap();
    let mut expected = 60;
    while search.find_previous(&daf).unwrap() {
        assert_eq!(search.descriptor().unwrap().ints[0], expected);
        expected -= 1;
    }
    assert_eq!(expected, 0);
}

#[test]
fn test_iterators_match_search() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("iter.bsp");
    write_file(&path, 30, 0);

    let daf = Daf::open_read(&path).unwrap();
    let forward: Vec<i32> = daf
        .segments()
        .map(|s| s.unwrap().summary.ints[0])
        .collect();
    let mut backward: Vec<i32> = daf
        .segments_rev()
        .map(|s| s.unwrap().summary.ints[0])
        .collect();
    backward.reverse();
    assert_eq!(forward, (1..=30).collect::<Vec<_>>());
    assert_eq!(forward, backward);
}

#[test]
fn test_comments_added_after_segments_shift_directory() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("shift.bsp");
    write_file(&path, 27, 0);

    let lines: Vec<String> = (0..120).map(|i| format!("comment line {:03} {}", i, "=".repeat(20))).collect();
    let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
    {
        let mut daf = Daf::open_write(&path).unwrap();
        daf.add_comments(&refs).unwrap();
        assert!(daf.file_record().reserved_records() >= 4);
        daf.close().unwrap();
    }

    let daf = Daf::open_read(&path).unwrap();
    assert_eq!(daf.read_comments(255).unwrap(), lines);
    let bodies: Vec<i32> = daf.segments().map(|s| s.unwrap().summary.ints[0]).collect();
    assert_eq!(bodies, (1..=27).collect::<Vec<_>>());
    for segment in daf.segments() {
        let segment = segment.unwrap();
        let body = segment.summary.ints[0];
        assert_eq!(daf.segment_data(&segment).unwrap(), segment_data(body));
    }
}

#[test]
fn test_delete_comments_then_append() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("delete.bsp");
    write_file(&path, 3, 4000);

    let mut daf = Daf::open_write(&path).unwrap();
    daf.add_comments(&["kept until deleted"]).unwrap();
    daf.delete_comments().unwrap();
    assert!(daf.read_comments(80).unwrap().is_empty());
    assert_eq!(daf.file_record().reserved_records(), 0);

    daf.append_segment(&summary(4, 4000.0), "SEGMENT 4", &segment_data(4))
        .unwrap();
    daf.add_comments(&["after delete"]).unwrap();
    assert_eq!(daf.read_comments(80).unwrap(), vec!["after delete"]);

    for segment in daf.segments() {
        let segment = segment.unwrap();
        let body = segment.summary.ints[0];
        assert_eq!(daf.segment_data(&segment).unwrap(), segment_data(body));
    }
    assert_eq!(daf.count_segments().unwrap(), 4);
}

#[test]
fn test_access_modes() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("modes.bsp");
    write_file(&path, 1, 0);

    let mut reader = Daf::open_read(&path).unwrap();
    let err = Daf::open_write(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccessModeConflict);

    let err = reader.add_comments(&["nope"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotWritable);
    let err = reader
        .append_segment(&summary(2, 0.0), "nope", &[1.0])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotWritable);
    let err = reader.delete_comments().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotWritable);

    reader.close().unwrap();
    let err = reader.begin_forward_search().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileClosed);

    assert!(Daf::open_write(&path).is_ok());
}

#[test]
fn test_empty_file_counts_zero() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("empty.bsp");
    Daf::create(&path, "EMPTY", 2, 6, 0, "SPK").unwrap().close().unwrap();

    let daf = Daf::open_read(&path).unwrap();
    assert_eq!(daf.count_segments().unwrap(), 0);
    let mut search = daf.begin_backward_search().unwrap();
    assert!(!search.find_previous(&daf).unwrap());
}

#[test]
fn test_non_daf_rejected() {
    let env = TestEnvironment::new().unwrap();
    let path = env.create_file("notes.txt", &[b'x'; 2048]).unwrap();
    let err = Daf::open_read(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WrongFileType);
}
