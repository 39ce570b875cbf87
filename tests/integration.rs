use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::SeedableRng;

use stencil_watermark_removal::events::EngineEvent;
use stencil_watermark_removal::mask::{MaskAsset, MaskConfig, MaskSource};
use stencil_watermark_removal::repository::MaskRepository;
use stencil_watermark_removal::{ProcessOptions, WatermarkEngine};

/// A ring-shaped stencil: black background, white glyph, like the shipped
/// mask bitmaps.
fn ring_stencil(size: u32) -> RgbImage {
    let center = f32::from(u16::try_from(size).unwrap()) / 2.0;
    RgbImage::from_fn(size, size, |x, y| {
        let dx = f32::from(u16::try_from(x).unwrap()) - center;
        let dy = f32::from(u16::try_from(y).unwrap()) - center;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist < center * 0.8 && dist > center * 0.3 {
            Rgb([200, 200, 200])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

fn stencil_png_bytes(size: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(ring_stencil(size))
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
    bytes
}

fn synthetic_engine() -> WatermarkEngine {
    let mut repo = MaskRepository::empty();
    repo.insert(48, MaskAsset::from_stencil(&ring_stencil(48), 32));
    repo.insert(96, MaskAsset::from_stencil(&ring_stencil(96), 64));
    WatermarkEngine::with_repository(repo)
}

/// Forward-composite the white overlay through `mask` at its anchor.
fn composite(image: &mut RgbImage, mask: &MaskAsset) {
    let (off_x, off_y) = mask.anchor_in(image.width(), image.height()).unwrap();
    for my in 0..mask.height() {
        for mx in 0..mask.width() {
            let alpha = mask.alpha_at(mx, my);
            let px = image.get_pixel_mut(off_x + mx, off_y + my);
            for ch in 0..3 {
                let blended = alpha * 255.0 + (1.0 - alpha) * f32::from(px[ch]);
                px[ch] = u8::try_from(blended.round().clamp(0.0, 255.0) as i64).unwrap();
            }
        }
    }
}

#[test]
fn load_from_bytes_builds_a_working_engine() {
    let configs = vec![
        MaskConfig {
            nominal_size: 96,
            source: MaskSource::Bytes(stencil_png_bytes(96)),
            margin: 64,
        },
        MaskConfig {
            nominal_size: 48,
            source: MaskSource::Bytes(stencil_png_bytes(48)),
            margin: 32,
        },
    ];
    let (engine, failures) = WatermarkEngine::load(&configs);
    assert!(failures.is_empty());
    assert_eq!(engine.repository().len(), 2);
    assert!(engine.repository().get(48).is_some());
    assert!(engine.repository().get(96).is_some());
}

#[test]
fn partial_load_still_yields_an_engine() {
    let configs = vec![
        MaskConfig {
            nominal_size: 96,
            source: MaskSource::Bytes(vec![0xde, 0xad]),
            margin: 64,
        },
        MaskConfig {
            nominal_size: 48,
            source: MaskSource::Bytes(stencil_png_bytes(48)),
            margin: 32,
        },
    ];
    let (engine, failures) = WatermarkEngine::load(&configs);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].nominal_size, 96);
    assert_eq!(engine.repository().len(), 1);

    // The failed size class routes to manual mode, the loaded one works.
    let opts = ProcessOptions::default();
    let small = RgbImage::from_pixel(400, 400, Rgb([100, 100, 100]));
    assert!(engine.detect(&small, &opts).is_some());
    let large = RgbImage::from_pixel(2048, 2048, Rgb([100, 100, 100]));
    assert!(engine.detect(&large, &opts).is_none());
}

#[test]
fn composite_then_detect_then_unblend_round_trips() {
    let engine = synthetic_engine();
    let opts = ProcessOptions::default();

    let pristine = RgbImage::from_pixel(300, 260, Rgb([110, 90, 70]));
    let mut image = pristine.clone();
    let mask = engine.select_for(300, 260, &opts).unwrap();
    composite(&mut image, mask);

    let detected = engine.detect(&image, &opts).unwrap();
    assert!(detected.present, "difference was {}", detected.difference);

    let stats = engine.remove(&mut image, &opts).unwrap();
    assert!(stats.processed > 0);

    for (x, y, px) in image.enumerate_pixels() {
        let orig = pristine.get_pixel(x, y);
        for ch in 0..3 {
            let diff = (i32::from(px[ch]) - i32::from(orig[ch])).abs();
            assert!(diff <= 2, "pixel ({x},{y}) ch {ch} off by {diff}");
        }
    }
}

#[test]
fn clean_image_is_not_detected() {
    let engine = synthetic_engine();
    let opts = ProcessOptions::default();
    let image = RgbImage::from_pixel(300, 260, Rgb([110, 90, 70]));
    let detected = engine.detect(&image, &opts).unwrap();
    assert!(!detected.present);
}

#[test]
fn footprint_misfit_reports_absent_without_panicking() {
    let engine = synthetic_engine();
    let opts = ProcessOptions::default();
    // 48 + 32 margin needs 80px; 60x60 cannot host the footprint.
    let image = RgbImage::from_pixel(60, 60, Rgb([110, 90, 70]));
    let detected = engine.detect(&image, &opts).unwrap();
    assert!(!detected.present);
}

#[test]
fn manual_repair_only_touches_marked_pixels() {
    let engine = synthetic_engine();
    let opts = ProcessOptions::default();

    let original = RgbImage::from_fn(120, 80, |x, y| {
        Rgb([
            u8::try_from((x * 7) % 251).unwrap(),
            u8::try_from((y * 11) % 251).unwrap(),
            60,
        ])
    });
    let mut image = original.clone();
    let mut overlay = original.clone();
    for x in 50..70 {
        for y in 30..40 {
            overlay.put_pixel(x, y, Rgb([255, 40, 40]));
        }
    }

    let mut rng = StdRng::seed_from_u64(11);
    let stats = engine
        .manual_repair_with_rng(&mut image, &original, &overlay, &mut rng, &opts)
        .unwrap();
    assert_eq!(stats.marked, 20 * 10);
    assert!(stats.copied > 0);

    for (x, y, px) in image.enumerate_pixels() {
        let marked = (50..70).contains(&x) && (30..40).contains(&y);
        if !marked {
            assert_eq!(px, original.get_pixel(x, y));
        }
    }
}

#[test]
fn engine_events_arrive_in_order() {
    let seen: Arc<Mutex<Vec<EngineEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_log = Arc::clone(&seen);
    let engine = synthetic_engine().with_event_sink(move |event: &EngineEvent| {
        sink_log.lock().unwrap().push(event.clone());
    });

    let opts = ProcessOptions::default();
    let mut image = RgbImage::from_pixel(300, 260, Rgb([110, 90, 70]));
    let mask = engine.select_for(300, 260, &opts).unwrap();
    composite(&mut image, mask);
    seen.lock().unwrap().clear();

    let _ = engine.detect(&image, &opts);
    let _ = engine.remove(&mut image, &opts);

    let events = seen.lock().unwrap();
    assert!(matches!(
        events[0],
        EngineEvent::MaskSelected {
            nominal_size: 48,
            found: true
        }
    ));
    assert!(matches!(events[1], EngineEvent::Detection(_)));
    assert!(matches!(
        events[2],
        EngineEvent::MaskSelected {
            nominal_size: 48,
            found: true
        }
    ));
    assert!(matches!(events[3], EngineEvent::Unblend(_)));
    assert_eq!(events.len(), 4);
}

#[test]
fn process_file_skips_images_too_small_for_the_footprint() {
    let dir = test_dir("too-small");
    let input = dir.join("tiny.png");
    RgbImage::from_pixel(40, 40, Rgb([120, 120, 120]))
        .save(&input)
        .unwrap();

    let engine = synthetic_engine();
    let result = engine.process_file(&input, &dir.join("out.png"), &ProcessOptions::default());
    assert!(result.skipped);
    assert!(result.success);
    assert!(result.message.contains("too small"));

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn process_file_round_trips_through_disk() {
    let dir = test_dir("disk-round-trip");
    let input = dir.join("photo.png");
    let output = dir.join("photo_cleaned.png");

    let engine = synthetic_engine();
    let opts = ProcessOptions::default();
    let pristine = RgbImage::from_pixel(300, 260, Rgb([110, 90, 70]));
    let mut watermarked = pristine.clone();
    let mask = engine.select_for(300, 260, &opts).unwrap();
    composite(&mut watermarked, mask);
    watermarked.save(&input).unwrap();

    let result = engine.process_file(&input, &output, &opts);
    assert!(result.success, "{}", result.message);
    assert!(!result.skipped);

    let cleaned = image::open(&output).unwrap().to_rgb8();
    for (x, y, px) in cleaned.enumerate_pixels() {
        let orig = pristine.get_pixel(x, y);
        for ch in 0..3 {
            let diff = (i32::from(px[ch]) - i32::from(orig[ch])).abs();
            assert!(diff <= 2, "pixel ({x},{y}) ch {ch} off by {diff}");
        }
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn cancelled_batch_reports_images_as_not_processed() {
    let dir = test_dir("cancelled-batch");
    for name in ["a.png", "b.png"] {
        RgbImage::from_pixel(120, 120, Rgb([100, 100, 100]))
            .save(dir.join(name))
            .unwrap();
    }

    let flag = Arc::new(AtomicBool::new(true));
    let opts = ProcessOptions {
        cancel: Some(Arc::clone(&flag)),
        ..ProcessOptions::default()
    };

    let engine = synthetic_engine();
    let results = engine.process_directory(&dir, &dir.join("out"), &opts);
    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(result.skipped);
        assert!(!result.success);
        assert!(result.message.contains("cancelled"));
    }

    std::fs::remove_dir_all(&dir).ok();
}

fn test_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "stencil-watermark-test-{}-{tag}",
        std::process::id()
    ));
    std::fs::remove_dir_all(&dir).ok();
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
