use imseg::{ImageBlocker, ImageSegmentComputer, Limits};

const ROW_LIMIT: u64 = 99_328;

fn computer(rows: u64) -> ImageSegmentComputer {
    ImageSegmentComputer::blocked(rows, 37_287, 1, 1024, 1024, Limits::default()).unwrap()
}

#[test]
fn test_perfect_split_has_no_empty_trailer() {
    assert_eq!(computer(2 * ROW_LIMIT).rows_per_segment(), vec![ROW_LIMIT, ROW_LIMIT]);
}

#[test]
fn test_one_row_past_whole_segments() {
    assert_eq!(computer(ROW_LIMIT + 1).rows_per_segment(), vec![ROW_LIMIT, 1]);
    assert_eq!(
        computer(2 * ROW_LIMIT + 1).rows_per_segment(),
        vec![ROW_LIMIT, ROW_LIMIT, 1]
    );
}

#[test]
fn test_ranges_conserve_rows_and_stay_aligned() {
    let cases = [
        (1u64, 1u64, 1u64, 0u64, 0u64),
        (383_735, 37_287, 1, 1024, 1024),
        (250_000, 60_000, 2, 512, 256),
        (120_001, 100, 3, 0, 0),
        (99_999, 1, 8, 7, 0),
    ];

    for &(rows, cols, bpp, block_rows, block_cols) in cases.iter() {
        let computer =
            ImageSegmentComputer::blocked(rows, cols, bpp, block_rows, block_cols, Limits::default())
                .unwrap();
        let segments = computer.segments();
        println!("{} rows -> {:?}", rows, computer.rows_per_segment());

        assert_eq!(segments.first().map(|s| s.first_row()), Some(0));
        assert_eq!(segments.iter().map(|s| s.num_rows()).sum::<u64>(), rows);
        for pair in segments.windows(2) {
            assert_eq!(pair[0].end_row(), pair[1].first_row());
            assert_eq!(pair[1].row_offset(), pair[0].num_rows());
            if block_rows > 0 {
                assert_eq!(pair[0].num_rows() % block_rows, 0);
            }
        }
        for segment in segments {
            assert!(segment.num_rows() > 0);
            assert!(segment.row_offset() <= Limits::default().iloc_max);
            let bytes = segment.num_rows() * cols * bpp;
            assert!(bytes <= Limits::default().num_bytes_max || block_cols > 0);
        }
    }
}

#[test]
fn test_blocking_across_segment_boundary() {
    let limits = Limits {
        iloc_max: 4,
        num_bytes_max: 1_000,
    };
    let computer = ImageSegmentComputer::blocked(6, 3, 1, 2, 2, limits).unwrap();
    assert_eq!(computer.rows_per_segment(), vec![4, 2]);

    let blocker = ImageBlocker::new(&computer.rows_per_segment(), 3, 2, 2).unwrap();
    let src: Vec<u8> = (1..=18).collect();
    let needed = blocker.num_bytes_required(2, 4, 1).unwrap() as usize;
    let mut dst = vec![0xff; needed];
    blocker.block(&src[6..], 2, 4, 1, &mut dst).unwrap();

    // Rows 2..4 close the first segment, rows 4..6 are the second.
    assert_eq!(
        dst,
        vec![7, 8, 10, 11, 9, 0, 12, 0, 13, 14, 16, 17, 15, 0, 18, 0]
    );
}
