use super::*;
use crate::analysis::result::Mask;

const RED: image::Rgba<u8> = image::Rgba([255, 0, 0, 255]);

fn white_frame(w: u32, h: u32) -> RawFrame {
    let mut f = RawFrame::new(w, h);
    f.fill_solid(235, 128, 128);
    f
}

fn red_overlay() -> OverlayContent {
    OverlayContent::RegionOverlay(image::RgbaImage::from_pixel(4, 4, RED))
}

#[test]
fn all_foreground_mask_reproduces_the_converted_frame() {
    let frame = white_frame(8, 6);
    let mask = Mask::filled(8, 6, 1.0);
    let mut c = CpuCompositor::new(OverlayContent::background_color(Rgb8::new(0, 0, 255)));
    c.prepare(8, 6).unwrap();

    let mut out = CompositeFrame::new(8, 6);
    c.composite(&frame, AnalysisResult::Mask(&mask), &mut out)
        .unwrap();

    let mut expected = CompositeFrame::new(8, 6);
    convert_frame(&frame, TargetEncoding::Srgb, &mut expected);
    assert_eq!(out.data, expected.data);
    assert_eq!(out.pixel(3, 3), [255, 255, 255]);
}

#[test]
fn all_background_mask_yields_the_fill_color() {
    let frame = white_frame(4, 4);
    let mask = Mask::new(4, 4);
    let mut c = CpuCompositor::new(OverlayContent::background_color(Rgb8::new(0, 200, 10)));
    let mut out = CompositeFrame::new(4, 4);
    c.composite(&frame, AnalysisResult::Mask(&mask), &mut out)
        .unwrap();
    assert!(out.data.chunks_exact(3).all(|p| p == [0, 200, 10]));
}

#[test]
fn mask_value_of_exactly_half_is_background() {
    let frame = white_frame(2, 2);
    let mask = Mask::from_vec(2, 2, vec![0.5, 0.51, 0.5, 1.0]).unwrap();
    let mut c = CpuCompositor::new(OverlayContent::background_color(Rgb8::new(1, 2, 3)));
    let mut out = CompositeFrame::new(2, 2);
    c.composite(&frame, AnalysisResult::Mask(&mask), &mut out)
        .unwrap();
    assert_eq!(out.pixel(0, 0), [1, 2, 3]);
    assert_eq!(out.pixel(1, 0), [255, 255, 255]);
    assert_eq!(out.pixel(0, 1), [1, 2, 3]);
    assert_eq!(out.pixel(1, 1), [255, 255, 255]);
}

#[test]
fn background_image_is_scaled_to_the_frame() {
    let frame = white_frame(8, 8);
    let mask = Mask::new(8, 8);
    let bg = image::RgbImage::from_pixel(3, 5, image::Rgb([10, 20, 30]));
    let mut c = CpuCompositor::new(OverlayContent::Background(BackgroundFill::Image(bg)));
    c.prepare(8, 8).unwrap();
    let mut out = CompositeFrame::new(8, 8);
    c.composite(&frame, AnalysisResult::Mask(&mask), &mut out)
        .unwrap();
    assert!(out.data.chunks_exact(3).all(|p| p == [10, 20, 30]));
}

#[test]
fn mismatched_mask_size_fails_the_frame() {
    let frame = white_frame(4, 4);
    let mask = Mask::new(2, 2);
    let mut c = CpuCompositor::new(OverlayContent::background_color(Rgb8::default()));
    let mut out = CompositeFrame::new(4, 4);
    assert!(matches!(
        c.composite(&frame, AnalysisResult::Mask(&mask), &mut out),
        Err(FailureReason::Analysis(_))
    ));
}

#[test]
fn low_confidence_regions_contribute_no_pixels() {
    let frame = RawFrame::new(20, 20);
    let regions = [
        Region::new(0.1, 0.1, 0.3, 0.3, 0.5),
        Region::new(0.5, 0.5, 0.3, 0.3, 0.1),
    ];
    let mut c = CpuCompositor::new(red_overlay());
    let mut out = CompositeFrame::new(20, 20);
    c.composite(&frame, AnalysisResult::Regions(&regions), &mut out)
        .unwrap();
    assert!(out.data.iter().all(|&b| b == 0));
}

#[test]
fn confident_region_is_covered_at_one_and_a_half_times_its_size() {
    let frame = RawFrame::new(20, 20);
    // 4x4 px box centered at (10, 10); the overlay covers 6x6 px from (7, 7).
    let regions = [Region::new(0.4, 0.4, 0.2, 0.2, 0.9)];
    let (left, top, w, h) = overlay_rect(&regions[0], 20, 20);
    for (got, want) in [(left, 7.0), (top, 7.0), (w, 6.0), (h, 6.0)] {
        assert!((got - want).abs() < 1e-9, "{got} != {want}");
    }

    let mut c = CpuCompositor::new(red_overlay());
    let mut out = CompositeFrame::new(20, 20);
    c.composite(&frame, AnalysisResult::Regions(&regions), &mut out)
        .unwrap();

    assert_eq!(out.pixel(7, 7), [255, 0, 0]);
    assert_eq!(out.pixel(12, 12), [255, 0, 0]);
    assert_eq!(out.pixel(6, 6), [0, 0, 0]);
    assert_eq!(out.pixel(13, 13), [0, 0, 0]);
    let red = out.data.chunks_exact(3).filter(|p| *p == [255, 0, 0]).count();
    assert_eq!(red, 36);
}

#[test]
fn overlay_is_clipped_at_frame_edges() {
    let frame = RawFrame::new(10, 10);
    let regions = [Region::new(0.8, 0.8, 0.4, 0.4, 0.99)];
    let mut c = CpuCompositor::new(red_overlay());
    let mut out = CompositeFrame::new(10, 10);
    c.composite(&frame, AnalysisResult::Regions(&regions), &mut out)
        .unwrap();
    assert_eq!(out.pixel(9, 9), [255, 0, 0]);
    assert_eq!(out.pixel(0, 0), [0, 0, 0]);
}

#[test]
fn overlapping_regions_draw_in_list_order() {
    let frame = RawFrame::new(20, 20);
    let mut overlay = image::RgbaImage::from_pixel(2, 1, RED);
    overlay.put_pixel(1, 0, image::Rgba([0, 0, 255, 255]));
    // Overlays span x 3..9 and x 6..12; at x 7 and 8 the first is blue, the second red.
    let first = Region::new(0.2, 0.4, 0.2, 0.2, 0.9);
    let second = Region::new(0.35, 0.4, 0.2, 0.2, 0.9);
    let mut c = CpuCompositor::new(OverlayContent::RegionOverlay(overlay));

    let mut out = CompositeFrame::new(20, 20);
    c.composite(&frame, AnalysisResult::Regions(&[first, second]), &mut out)
        .unwrap();
    assert_eq!(out.pixel(7, 10), [255, 0, 0]);
    assert_eq!(out.pixel(8, 10), [255, 0, 0]);

    let mut out = CompositeFrame::new(20, 20);
    c.composite(&frame, AnalysisResult::Regions(&[second, first]), &mut out)
        .unwrap();
    assert_eq!(out.pixel(7, 10), [0, 0, 255]);
    assert_eq!(out.pixel(8, 10), [0, 0, 255]);
}

#[test]
fn transparent_overlay_pixels_keep_the_frame() {
    let frame = white_frame(10, 10);
    let mut overlay = image::RgbaImage::from_pixel(2, 1, RED);
    overlay.put_pixel(1, 0, image::Rgba([0, 0, 0, 0]));
    let regions = [Region::new(0.0, 0.0, 1.0, 1.0, 0.9)];
    let mut c = CpuCompositor::new(OverlayContent::RegionOverlay(overlay));
    let mut out = CompositeFrame::new(10, 10);
    c.composite(&frame, AnalysisResult::Regions(&regions), &mut out)
        .unwrap();
    // The 15x15 overlay box is centered, so its left half spans x < 5.
    assert_eq!(out.pixel(2, 5), [255, 0, 0]);
    assert_eq!(out.pixel(7, 5), [255, 255, 255]);
}

#[test]
fn analysis_kind_must_match_overlay() {
    let frame = RawFrame::new(4, 4);
    let mask = Mask::new(4, 4);
    let mut c = CpuCompositor::new(red_overlay());
    assert_eq!(c.expects(), AnalysisKind::Regions);
    let mut out = CompositeFrame::new(4, 4);
    assert!(matches!(
        c.composite(&frame, AnalysisResult::Mask(&mask), &mut out),
        Err(FailureReason::Internal(_))
    ));
}

#[test]
fn missing_pixels_and_bad_targets_are_rejected() {
    let mut c = CpuCompositor::new(red_overlay());
    let mut out = CompositeFrame::new(4, 4);
    assert_eq!(
        c.composite(&RawFrame::empty(), AnalysisResult::Regions(&[]), &mut out),
        Err(FailureReason::MissingFrameImageBuffer)
    );
    let mut wrong = CompositeFrame::new(2, 2);
    assert!(
        c.composite(&RawFrame::new(4, 4), AnalysisResult::Regions(&[]), &mut wrong)
            .is_err()
    );
}

#[test]
fn missing_overlay_file_is_a_setup_error() {
    let err = OverlayContent::region_overlay("target/no/such/overlay.png").unwrap_err();
    assert!(err.to_string().starts_with("setup error:"), "{err}");
}
