use super::*;

/// Helper to create a classifier with default thresholds
fn create_classifier() -> Classifier {
    Classifier::new(ClassifierConfig::default())
}

fn v(x: f32, y: f32, z: f32) -> Vector3 {
    Vector3::new(x, y, z)
}

/// Centro at (10, 10, 10) plus the given references
fn calibrated_map(refs: &[(Position, Vector3)]) -> CalibrationMap {
    let mut map = CalibrationMap::new();
    map.insert(Position::Centro, v(10.0, 10.0, 10.0));
    for (pos, reference) in refs {
        map.insert(*pos, *reference);
    }
    map
}

#[test]
fn test_heuristic_horizontal_gestures() {
    let classifier = create_classifier();
    let map = CalibrationMap::new();

    let right = classifier.classify(v(25.0, 0.0, 0.0), Some(Vector3::ZERO), &map);
    assert_eq!(right.position, Position::Derecha);
    assert_eq!(right.path, ClassificationPath::Heuristic);
    assert!(right.best.is_none());

    let left = classifier.classify(v(-25.0, 3.0, 0.0), Some(Vector3::ZERO), &map);
    assert_eq!(left.position, Position::Izquierda);
}

#[test]
fn test_heuristic_vertical_gestures() {
    let classifier = create_classifier();
    let map = CalibrationMap::new();

    let up = classifier.classify(v(0.0, 18.0, 0.0), Some(Vector3::ZERO), &map);
    assert_eq!(up.position, Position::Arriba, "threshold is inclusive");

    let down = classifier.classify(v(-10.0, -30.0, 0.0), Some(Vector3::ZERO), &map);
    assert_eq!(down.position, Position::Abajo, "cross tolerance is inclusive");
}

#[test]
fn test_heuristic_diagonal_falls_through_to_approach() {
    let classifier = create_classifier();
    let map = CalibrationMap::new();

    // Both axes exceed the cross tolerance, distance from baseline is 35.36
    let detection = classifier.classify(v(25.0, 25.0, 0.0), Some(Vector3::ZERO), &map);
    assert_eq!(detection.position, Position::Acercar);

    // Same shape but closer to baseline
    let detection = classifier.classify(v(20.0, 20.0, 0.0), Some(Vector3::ZERO), &map);
    assert_eq!(detection.position, Position::Centro);
}

#[test]
fn test_heuristic_approach_without_window_movement() {
    let classifier = create_classifier();
    let map = CalibrationMap::new();

    let ema = v(0.0, 0.0, 40.0);
    let detection = classifier.classify(ema, Some(ema), &map);
    assert_eq!(detection.position, Position::Acercar);

    let detection = classifier.classify(ema, None, &map);
    assert_eq!(detection.position, Position::Acercar);
}

#[test]
fn test_heuristic_measures_approach_from_ambient() {
    let classifier = create_classifier();
    let mut map = CalibrationMap::new();
    map.insert(Position::Ambiente, v(0.0, 0.0, 40.0));

    let ema = v(0.0, 0.0, 40.0);
    let detection = classifier.classify(ema, Some(ema), &map);
    assert_eq!(detection.position, Position::Centro);
}

#[test]
fn test_centro_only_calibration_always_detects_centro() {
    let classifier = create_classifier();
    let map = calibrated_map(&[]);

    let detection = classifier.classify(v(40.0, 10.0, 10.0), Some(v(10.0, 10.0, 10.0)), &map);
    assert_eq!(detection.path, ClassificationPath::Calibrated);
    assert_eq!(detection.position, Position::Centro);
    assert!(detection.best.is_none());

    let detection = classifier.classify(v(10.0, 10.0, 80.0), None, &map);
    assert_eq!(detection.position, Position::Centro);
}

#[test]
fn test_ambient_only_calibration_uses_heuristic() {
    let classifier = create_classifier();
    let mut map = CalibrationMap::new();
    map.insert(Position::Ambiente, v(10.0, 10.0, 10.0));

    let detection = classifier.classify(v(40.0, 10.0, 10.0), Some(v(10.0, 10.0, 10.0)), &map);
    assert_eq!(detection.path, ClassificationPath::Heuristic);
    assert_eq!(detection.position, Position::Derecha);
}

#[test]
fn test_exact_reference_match_accepts_regardless_of_ratio() {
    let reference = v(10.0, 50.0, 10.0); // refDelta (0, 40, 0)
    let map = calibrated_map(&[(Position::Arriba, reference)]);

    for ratio in [0.1, 0.5, 1.0] {
        let classifier = Classifier::new(ClassifierConfig {
            calibrated_magnitude_ratio: ratio,
            ..ClassifierConfig::default()
        });
        let detection = classifier.classify(reference, None, &map);
        assert_eq!(detection.position, Position::Arriba);
        assert_eq!(detection.path, ClassificationPath::Calibrated);

        let best = detection.best.expect("best candidate");
        assert_eq!(best.abs_dist, 0.0);
        assert!((best.ref_magnitude - 40.0).abs() < 1e-5);
        assert!(best.accepted);
    }
}

#[test]
fn test_magnitude_branch_accepts_partial_movement() {
    let classifier = create_classifier();
    let map = calibrated_map(&[(Position::Derecha, v(50.0, 10.0, 10.0))]); // refDelta (40, 0, 0)

    // delta (25, 5, 0): |delta| 25.5 >= 20, absDist 15.8 <= max(12, 20)
    let detection = classifier.classify(v(35.0, 15.0, 10.0), None, &map);
    assert_eq!(detection.position, Position::Derecha);
    let best = detection.best.unwrap();
    assert!(best.abs_dist > 12.0 && best.abs_dist <= 20.0);
}

#[test]
fn test_far_sample_is_rejected_to_centro() {
    let classifier = create_classifier();
    let map = calibrated_map(&[(Position::Arriba, v(10.0, 50.0, 10.0))]);

    let detection = classifier.classify(v(10.0, 10.0, -50.0), None, &map);
    assert_eq!(detection.position, Position::Centro);
    assert_eq!(detection.path, ClassificationPath::Calibrated);
    let best = detection.best.unwrap();
    assert_eq!(best.position, Position::Arriba);
    assert!(!best.accepted);
}

#[test]
fn test_small_movement_near_baseline_is_centro() {
    let classifier = create_classifier();
    let map = calibrated_map(&[(Position::Derecha, v(50.0, 10.0, 10.0))]);

    // delta (4, 0, 0): absDist 36 and |delta| below 20
    let detection = classifier.classify(v(14.0, 10.0, 10.0), None, &map);
    assert_eq!(detection.position, Position::Centro);
}

#[test]
fn test_nearest_reference_wins() {
    let classifier = create_classifier();
    let map = calibrated_map(&[
        (Position::Izquierda, v(-30.0, 10.0, 10.0)),
        (Position::Derecha, v(50.0, 10.0, 10.0)),
        (Position::Arriba, v(10.0, 50.0, 10.0)),
        (Position::Abajo, v(10.0, -30.0, 10.0)),
        (Position::Acercar, v(10.0, 10.0, 70.0)),
    ]);

    let cases = [
        (v(-28.0, 12.0, 9.0), Position::Izquierda),
        (v(47.0, 8.0, 10.0), Position::Derecha),
        (v(11.0, 49.0, 12.0), Position::Arriba),
        (v(9.0, -31.0, 10.0), Position::Abajo),
        (v(10.0, 12.0, 66.0), Position::Acercar),
        (v(10.5, 9.5, 10.0), Position::Centro),
    ];

    for (ema, expected) in cases {
        let detection = classifier.classify(ema, None, &map);
        assert_eq!(
            detection.position, expected,
            "sample {} should classify as {}",
            ema, expected
        );
    }
}

#[test]
fn test_ties_resolve_in_priority_order() {
    let classifier = create_classifier();
    let shared = v(10.0, 10.0, 50.0);
    let map = calibrated_map(&[
        (Position::Acercar, shared),
        (Position::Abajo, shared),
        (Position::Derecha, shared),
    ]);

    let detection = classifier.classify(shared, None, &map);
    assert_eq!(detection.position, Position::Derecha);
}

#[test]
fn test_degenerate_reference_is_skipped() {
    let classifier = create_classifier();
    // Izquierda equals the baseline, so it can never be scored
    let map = calibrated_map(&[
        (Position::Izquierda, v(10.0, 10.0, 10.0)),
        (Position::Derecha, v(50.0, 10.0, 10.0)),
    ]);

    let detection = classifier.classify(v(10.0, 10.0, 10.0), None, &map);
    assert_eq!(detection.best.unwrap().position, Position::Derecha);
    assert_eq!(detection.position, Position::Centro);

    let only_degenerate = calibrated_map(&[(Position::Izquierda, v(10.0, 10.0, 10.0005))]);
    let detection = classifier.classify(v(40.0, 10.0, 10.0), None, &only_degenerate);
    assert_eq!(detection.path, ClassificationPath::Calibrated);
    assert!(detection.best.is_none());
    assert_eq!(detection.position, Position::Centro);
}

#[test]
fn test_ambient_is_baseline_without_centro() {
    let classifier = create_classifier();
    let mut map = CalibrationMap::new();
    map.insert(Position::Ambiente, v(100.0, 0.0, 0.0));
    map.insert(Position::Derecha, v(140.0, 0.0, 0.0));

    let detection = classifier.classify(v(140.0, 0.0, 0.0), None, &map);
    assert_eq!(detection.position, Position::Derecha);

    let detection = classifier.classify(v(100.0, 0.0, 0.0), None, &map);
    assert_eq!(detection.position, Position::Centro);
}

#[test]
fn test_classification_is_pure() {
    let classifier = create_classifier();
    let map = calibrated_map(&[
        (Position::Derecha, v(50.0, 10.0, 10.0)),
        (Position::Arriba, v(10.0, 50.0, 10.0)),
    ]);
    let ema = v(33.0, 28.0, 10.0);

    let first = classifier.classify(ema, Some(Vector3::ZERO), &map);
    for _ in 0..10 {
        assert_eq!(classifier.classify(ema, Some(Vector3::ZERO), &map), first);
    }
}

#[test]
fn test_classifier_never_outputs_ambiente() {
    let classifier = create_classifier();
    let mut map = CalibrationMap::new();
    map.insert(Position::Ambiente, v(5.0, 5.0, 5.0));

    for i in -5..5 {
        let ema = v(i as f32 * 10.0, i as f32 * -7.0, i as f32 * 3.0);
        let detection = classifier.classify(ema, Some(Vector3::ZERO), &map);
        assert!(detection.position.is_gesture());
    }
}
