//! DLA segment list tests through the public API.

use segfile_config::testing::TestEnvironment;
use segfile_das::{Das, Dla, DlaDescriptor};
use segfile_record::{CommentStore, ErrorKind, SegmentDirectory};

/// Write `n` segments whose components encode their index.
fn write_segments(dla: &mut Dla, n: i32) {
    for i in 1..=n {
        dla.begin_segment().unwrap();
        let ints: Vec<i32> = (0..i * 50).map(|k| i * 1000 + k).collect();
        let doubles: Vec<f64> = (0..i * 30).map(|k| i as f64 + k as f64 * 0.25).collect();
        dla.das_mut().append_ints(&ints).unwrap();
        dla.das_mut().append_doubles(&doubles).unwrap();
        if i % 2 == 0 {
            dla.das_mut().append_chars(format!("segment {}", i).as_bytes()).unwrap();
        }
        dla.end_segment().unwrap();
    }
}

fn first_int(dla: &Dla, d: &DlaDescriptor) -> i32 {
    let at = d.int_base as u32 + 1;
    dla.das().read_ints(at, at).unwrap()[0]
}

#[test]
fn test_empty_file_policy() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("empty.dla");
    Dla::create(&path, "EMPTY", "DLA", 0).unwrap().close().unwrap();

    let dla = Dla::open_read(&path).unwrap();
    assert_eq!(dla.segment_count().unwrap(), 0);
    assert_eq!(dla.begin_forward_search().unwrap_err().kind(), ErrorKind::NoSegments);
    assert_eq!(dla.begin_backward_search().unwrap_err().kind(), ErrorKind::NoSegments);
}

#[test]
fn test_round_trip_and_symmetry() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("list.dsk");
    let mut dla = Dla::create(&path, "LIST", "DSK", 0).unwrap();
    write_segments(&mut dla, 12);
    dla.close().unwrap();

    let dla = Dla::open_read(&path).unwrap();
    assert_eq!(dla.segment_count().unwrap(), 12);

    let mut forward = vec![dla.begin_forward_search().unwrap()];
    while dla.has_next(forward.last().unwrap()) {
        let next = dla.get_next(forward.last().unwrap()).unwrap();
        forward.push(next);
    }
    assert_eq!(forward.len(), 12);
    for (i, d) in forward.iter().enumerate() {
        let index = i as i32 + 1;
        assert_eq!(d.int_size, index * 50);
        assert_eq!(d.double_size, index * 30);
        assert_eq!(d.char_size, if index % 2 == 0 { format!("segment {}", index).len() as i32 } else { 0 });
        assert_eq!(first_int(&dla, d), index * 1000);
    }

    let mut backward = vec![dla.begin_backward_search().unwrap()];
    while dla.has_previous(backward.last().unwrap()) {
        let previous = dla.get_previous(backward.last().unwrap()).unwrap();
        backward.push(previous);
    }
    backward.reverse();
    assert_eq!(forward, backward);

    for d in &forward[1..forward.len() - 1] {
        assert_eq!(&dla.get_next(&dla.get_previous(d).unwrap()).unwrap(), d);
        assert_eq!(&dla.get_previous(&dla.get_next(d).unwrap()).unwrap(), d);
    }

    let first = &forward[0];
    let last = &forward[11];
    assert_eq!(dla.get_previous(first).unwrap_err().kind(), ErrorKind::NoPredecessor);
    assert_eq!(dla.get_next(last).unwrap_err().kind(), ErrorKind::NoSuccessor);

    let via_iter: Vec<DlaDescriptor> = dla.segments().map(|d| d.unwrap()).collect();
    assert_eq!(via_iter, forward);
}

#[test]
fn test_append_after_reopen() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("reopen.dla");
    let mut dla = Dla::create(&path, "REOPEN", "DLA", 0).unwrap();
    write_segments(&mut dla, 2);
    dla.close().unwrap();

    let mut dla = Dla::open_write(&path).unwrap();
    dla.begin_segment().unwrap();
    dla.das_mut().append_ints(&[42]).unwrap();
    dla.end_segment().unwrap();

    let last = dla.begin_backward_search().unwrap();
    assert_eq!(first_int(&dla, &last), 42);
    let previous = dla.get_previous(&last).unwrap();
    assert_eq!(first_int(&dla, &previous), 2000);
    assert_eq!(dla.segment_count().unwrap(), 3);
}

#[test]
fn test_comments_preserve_segments() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("comments.dsk");
    let mut dla = Dla::create(&path, "COMMENTS", "DSK", 0).unwrap();
    write_segments(&mut dla, 4);

    let lines = ["Shape model of a small body.", "", "Plates: 12"];
    dla.add_comments(&lines).unwrap();
    dla.close().unwrap();

    let mut dla = Dla::open_write(&path).unwrap();
    assert_eq!(dla.read_comments(255).unwrap(), lines);
    let ints: Vec<i32> = dla.segments().map(|d| first_int(&dla, &d.unwrap())).collect();
    assert_eq!(ints, vec![1000, 2000, 3000, 4000]);

    dla.delete_comments().unwrap();
    assert!(dla.read_comments(255).unwrap().is_empty());
    assert_eq!(dla.segment_count().unwrap(), 4);
}

#[test]
fn test_wrong_type_and_access_modes() {
    let env = TestEnvironment::new().unwrap();
    let path = env.kernel_path("plain.das");
    Das::create(&path, "PLAIN", "XYZ", 0).unwrap().close().unwrap();
    assert_eq!(Dla::open_read(&path).unwrap_err().kind(), ErrorKind::WrongFileType);

    let path = env.kernel_path("modes.dla");
    Dla::create(&path, "MODES", "DLA", 0).unwrap().close().unwrap();
    let mut reader = Dla::open_read(&path).unwrap();
    assert_eq!(Dla::open_write(&path).unwrap_err().kind(), ErrorKind::AccessModeConflict);
    assert_eq!(reader.begin_segment().unwrap_err().kind(), ErrorKind::NotWritable);
    assert_eq!(reader.add_comments(&["x"]).unwrap_err().kind(), ErrorKind::NotWritable);

    reader.close().unwrap();
    assert_eq!(reader.segment_count().unwrap_err().kind(), ErrorKind::FileClosed);
}
