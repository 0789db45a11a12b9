mod common;

use image::GenericImageView;
use image_authenticity::{
    AnalysisConfig, DetectorKind, ForensicsAnalyzer, Verdict, analyze,
    report::visualization::Visualizer,
};

use common::{camera_gradient_jpeg, camera_jpeg, cloned_noise_png, flat_jpeg};

#[test]
fn test_results_follow_detector_order() {
    let analysis = analyze(&camera_jpeg(256, 128));
    let kinds = analysis.results.iter().map(|r| r.detector).collect::<Vec<_>>();
    assert_eq!(kinds, DetectorKind::ALL.to_vec());
}

#[test]
fn test_clean_camera_photo_scores_authentic() {
    let analysis = analyze(&camera_jpeg(256, 128));

    for result in &analysis.results {
        assert_eq!(result.verdict, Verdict::Pass, "{}: {}", result.detector, result.details);
    }
    assert!(analysis.final_score >= 68.0);
    assert_eq!(analysis.final_score, 100.0);
    assert_eq!(analysis.manipulation_score(), 0.0);
}

#[test]
fn test_scores_stay_in_range() {
    for bytes in [camera_jpeg(256, 128), flat_jpeg(64, 30), cloned_noise_png()] {
        let analysis = analyze(&bytes);
        assert!((0.0..=100.0).contains(&analysis.final_score));
        assert_eq!(analysis.final_score.fract(), 0.0);
        for result in &analysis.results {
            assert!((0.0..=100.0).contains(&result.score));
        }
    }
}

#[test]
fn test_analysis_is_deterministic() {
    let bytes = cloned_noise_png();
    let first = analyze(&bytes);
    let second = analyze(&bytes);

    assert_eq!(first.results, second.results);
    assert_eq!(first.final_score, second.final_score);
    assert_eq!(first.debug_images, second.debug_images);
}

#[test]
fn test_sequential_matches_parallel() {
    let bytes = cloned_noise_png();
    let sequential = AnalysisConfig { parallel: false, ..AnalysisConfig::default() };

    let parallel = ForensicsAnalyzer::new().analyze(&bytes);
    let serial = ForensicsAnalyzer::new().with_config(sequential).analyze(&bytes);

    assert_eq!(parallel.results, serial.results);
    assert_eq!(parallel.final_score, serial.final_score);
}

#[test]
fn test_undecodable_input_degrades_every_detector() {
    let analysis = analyze(b"definitely not an image");

    let scores = analysis.results.iter().map(|r| r.score).collect::<Vec<_>>();
    assert_eq!(scores, vec![10.0, 15.0, 10.0, 10.0]);
    assert!(analysis.results.iter().all(|r| r.verdict == Verdict::Warning));
    assert!(
        analysis.results[0]
            .details
            .starts_with("Could not read image metadata")
    );

    // 0.15*10 + 0.30*15 + 0.25*10 + 0.30*10 = 11.5, no consensus
    assert_eq!(analysis.final_score, 88.0);

    let placeholder = Visualizer::new().placeholder_jpeg();
    assert_eq!(analysis.debug_images.ela, placeholder);
    assert_eq!(analysis.debug_images.noise_map, placeholder);
}

#[test]
fn test_truncated_jpeg_still_reports() {
    let bytes = camera_jpeg(256, 128);
    let analysis = analyze(&bytes[..bytes.len() / 3]);
    assert_eq!(analysis.results.len(), 4);
    assert!((0.0..=100.0).contains(&analysis.final_score));
}

#[test]
fn test_tiny_image_skips_noise_blocks() {
    let analysis = analyze(&flat_jpeg(48, 100));
    let noise = analysis.result(DetectorKind::NoiseVariance).unwrap();

    assert_eq!(noise.verdict, Verdict::Warning);
    assert_eq!(noise.score, 10.0);
    assert_eq!(analysis.debug_images.noise_map, Visualizer::new().placeholder_jpeg());
}

#[test]
fn test_debug_images_match_input_size() {
    let analysis = analyze(&camera_jpeg(256, 128));

    let ela = image::load_from_memory(&analysis.debug_images.ela).unwrap();
    let noise = image::load_from_memory(&analysis.debug_images.noise_map).unwrap();
    assert_eq!(ela.dimensions(), (256, 256));
    assert_eq!(noise.dimensions(), (256, 256));
}

#[test]
fn test_cloned_region_raises_ai_forensics() {
    let analysis = analyze(&cloned_noise_png());
    let ai = analysis.result(DetectorKind::AiForensics).unwrap();

    assert_ne!(ai.verdict, Verdict::Pass);
    assert!(ai.details.contains("⚠️ Copy-Move Detection: 100.0%"));
}

#[test]
fn test_noisy_camera_photo_stays_authentic() {
    let analysis = analyze(&camera_gradient_jpeg(640, 480));
    let metadata = analysis.result(DetectorKind::Metadata).unwrap();
    let ai = analysis.result(DetectorKind::AiForensics).unwrap();

    assert_eq!(metadata.verdict, Verdict::Pass);
    assert_ne!(ai.verdict, Verdict::Fail, "{}", ai.details);
    assert!(ai.details.contains("✓ Copy-Move Detection"), "{}", ai.details);
    assert!(analysis.final_score >= 68.0, "final score {}", analysis.final_score);
}
