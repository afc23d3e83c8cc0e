use image::{GrayImage, Luma};
use ttc_toolkit::config::{NmsConfig, PipelineConfig};
use ttc_toolkit::detected_points::{KeyPoint, KeypointMatch};
use ttc_toolkit::pipeline::{
    associate_lidar, detect_corners, estimate_frame_pair, process_sequence, track_frame_pair,
};
use ttc_toolkit::projection::LidarProjection;
use ttc_toolkit::synthetic::{SceneParams, generate_sequence};
use ttc_toolkit::types::{BoundingBox, Frame, LidarPoint, Roi};

#[test]
fn test_sequence_ttc_close_to_ground_truth() {
    let params = SceneParams::default();
    let (mut frames, calibration) = generate_sequence(&params);
    let projection = LidarProjection::from_calibration(&calibration);
    let config = PipelineConfig::default();

    let reports = process_sequence(&mut frames, &projection, &config).unwrap();
    assert_eq!(reports.len(), params.num_frames - 1);

    for (i, report) in reports.iter().enumerate() {
        let k = i + 1;
        assert_eq!(report.frame_index, k);
        assert_eq!(report.bb_matches.get(&0), Some(&0));
        assert_eq!(report.bb_matches.get(&1), Some(&1));
        // the side box never receives lidar returns
        assert_eq!(report.objects.len(), 1);

        let vehicle = &report.objects[0];
        assert_eq!(vehicle.curr_box_id, 0);
        assert!(vehicle.lidar_points_curr >= 150);
        assert!(vehicle.num_kpt_matches > 0);

        let truth = params.true_ttc(k);
        let lidar = vehicle.ttc_lidar.seconds();
        let camera = vehicle.ttc_camera.seconds();
        assert!((lidar - truth).abs() / truth < 0.08, "frame {}: lidar {} vs {}", k, lidar, truth);
        assert!((camera - truth).abs() / truth < 0.25, "frame {}: camera {} vs {}", k, camera, truth);
    }

    // results are written back into the current frames
    assert!(frames[0].bb_matches.is_empty());
    assert_eq!(frames[3].bb_matches.get(&0), Some(&0));
    let vehicle = frames[3].bounding_box(0).unwrap();
    assert_eq!(vehicle.kpt_matches.len(), reports[2].objects[0].num_kpt_matches);
}

#[test]
fn test_track_frame_pair_matches_batch() {
    let params = SceneParams {
        num_frames: 3,
        seed: 5,
        ..Default::default()
    };
    let (frames, calibration) = generate_sequence(&params);
    let projection = LidarProjection::from_calibration(&calibration);
    let config = PipelineConfig::default();

    let mut batch = frames.clone();
    let reports = process_sequence(&mut batch, &projection, &config).unwrap();

    let mut prev = frames[0].clone();
    associate_lidar(&mut prev, &projection, &config).unwrap();
    let mut curr = frames[1].clone();
    let report = track_frame_pair(&prev, &mut curr, 1, &projection, &config).unwrap();

    assert_eq!(report.bb_matches, reports[0].bb_matches);
    assert_eq!(report.objects.len(), reports[0].objects.len());
    assert_eq!(report.objects[0].ttc_lidar, reports[0].objects[0].ttc_lidar);
    assert_eq!(report.objects[0].ttc_camera, reports[0].objects[0].ttc_camera);
    assert_eq!(curr.bb_matches, report.bb_matches);
}

#[test]
fn test_sequence_without_lidar_support_has_no_objects() {
    let (mut frames, calibration) = generate_sequence(&SceneParams {
        num_frames: 2,
        ..Default::default()
    });
    for frame in frames.iter_mut() {
        frame.lidar_points.clear();
    }
    let projection = LidarProjection::from_calibration(&calibration);
    let reports = process_sequence(&mut frames, &projection, &PipelineConfig::default()).unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].objects.is_empty());
    assert_eq!(reports[0].bb_matches.get(&0), Some(&0));
}

fn overlapping_boxes_frame(keypoints: Vec<KeyPoint>, distance: f64) -> Frame {
    let mut boxes = vec![
        BoundingBox::new(0, Roi::new(0.0, 0.0, 400.0, 400.0)),
        BoundingBox::new(1, Roi::new(300.0, 0.0, 400.0, 400.0)),
    ];
    for bb in boxes.iter_mut() {
        bb.lidar_points = vec![
            LidarPoint::new(distance, -0.5, 0.0),
            LidarPoint::new(distance, 0.0, 0.0),
            LidarPoint::new(distance, 0.5, 0.0),
        ];
    }
    Frame {
        keypoints,
        bounding_boxes: boxes,
        ..Default::default()
    }
}

#[test]
fn test_match_in_box_overlap_joins_no_box() {
    // three keypoints only in box 0, three only in box 1, two in the overlap
    let xs = [50.0, 150.0, 250.0, 450.0, 550.0, 650.0, 321.0, 381.0];
    let curr_kpts: Vec<KeyPoint> = xs.iter().map(|&x| KeyPoint::new(x, 200.0)).collect();
    let prev_kpts: Vec<KeyPoint> = xs.iter().map(|&x| KeyPoint::new(x - 1.0, 200.0)).collect();
    let matches: Vec<KeypointMatch> = (0..xs.len()).map(|i| KeypointMatch::new(i, i)).collect();

    let prev = overlapping_boxes_frame(prev_kpts, 10.0);
    let mut curr = overlapping_boxes_frame(curr_kpts, 9.0);
    curr.kpt_matches = matches.clone();

    let report = estimate_frame_pair(&prev, &curr, 1, &PipelineConfig::default()).unwrap();
    assert_eq!(report.bb_matches.get(&0), Some(&0));
    assert_eq!(report.bb_matches.get(&1), Some(&1));
    assert_eq!(report.objects.len(), 2);
    assert_eq!(report.objects[0].kpt_matches, matches[0..3].to_vec());
    assert_eq!(report.objects[1].kpt_matches, matches[3..6].to_vec());

    report.apply_to(&mut curr);
    let in_box_0 = &curr.bounding_box(0).unwrap().kpt_matches;
    let in_box_1 = &curr.bounding_box(1).unwrap().kpt_matches;
    assert!(in_box_0.iter().all(|m| !in_box_1.contains(m)));
}

#[test]
fn test_detect_corners_on_square() {
    let img = GrayImage::from_fn(60, 60, |x, y| {
        if (20..40).contains(&x) && (20..40).contains(&y) {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    let config = NmsConfig {
        min_response: 250.0,
        ..Default::default()
    };
    let corners = detect_corners(&img, &config).unwrap();
    assert!(!corners.is_empty());

    let square_corners = [(19.5, 19.5), (39.5, 19.5), (19.5, 39.5), (39.5, 39.5)];
    for c in &corners {
        let near = square_corners.iter().any(|&(x, y)| {
            let dx = c.pos.x as f32 - x;
            let dy = c.pos.y as f32 - y;
            (dx * dx + dy * dy).sqrt() < 3.5
        });
        assert!(near, "{:?} is not at a corner", c);
        assert!(c.score > 250.0);
    }
    for (i, a) in corners.iter().enumerate() {
        for b in &corners[i + 1..] {
            assert_eq!(a.overlap(b), 0.0);
        }
    }
}

#[test]
fn test_detect_corners_rejects_bad_config() {
    let img = GrayImage::new(10, 10);
    let config = NmsConfig {
        block_size: 0,
        ..Default::default()
    };
    assert!(detect_corners(&img, &config).is_err());
}
