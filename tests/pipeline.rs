//! End-to-end tests of the capture and recognition pipeline.
//!
//! Drives a selection session, the capture engine, the recognition client
//! and history against in-memory fakes: no windows, no screens, no network.

use image::{DynamicImage, Rgba, RgbaImage};
use sniptex_lib::capture::{
    layout_displays, CaptureEngine, CaptureError, CaptureSource, Display, DisplayEnumerator,
    PlatformMonitor, SourceEnumerator,
};
use sniptex_lib::geometry::{Absolute, Point, Rect, Size};
use sniptex_lib::history::History;
use sniptex_lib::overlay::{SelectionSession, SessionEvent, SurfaceHandle};
use sniptex_lib::recognition::{
    ApiCredentials, HttpReply, RecognitionClient, RecognitionResult, Transport, TransportError,
    Upload,
};
use sniptex_lib::temp_files::TempFileRegistry;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

// ── Fakes ───────────────────────────────────────────────────────────

struct Displays(Vec<Display>);

impl DisplayEnumerator for Displays {
    fn displays(&self) -> Result<Vec<Display>, CaptureError> {
        Ok(self.0.clone())
    }
}

struct Sources(fn() -> Vec<CaptureSource>);

impl SourceEnumerator for Sources {
    fn sources(&self) -> Result<Vec<CaptureSource>, CaptureError> {
        Ok((self.0)())
    }
}

struct NoopSurface;

impl SurfaceHandle for NoopSurface {
    fn close(self) {}
}

struct ScriptedServer {
    replies: Mutex<VecDeque<(u16, String)>>,
    attempts: Mutex<usize>,
}

impl ScriptedServer {
    fn new(replies: &[(u16, &str)]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|(s, b)| (*s, b.to_string())).collect()),
            attempts: Mutex::new(0),
        }
    }
}

impl ScriptedServer {
    fn attempts(&self) -> usize {
        *self.attempts.lock().unwrap()
    }
}

impl Transport for &ScriptedServer {
    async fn send(&self, _upload: &Upload) -> Result<HttpReply, TransportError> {
        *self.attempts.lock().unwrap() += 1;
        match self.replies.lock().unwrap().pop_front() {
            Some((status, body)) => Ok(HttpReply { status, body }),
            None => Err(TransportError::Network("no more replies".into())),
        }
    }
}

fn display(id: &str, x: i32, y: i32, w: u32, h: u32, scale: f64, primary: bool) -> Display {
    Display {
        id: id.to_string(),
        bounds: Rect::new(x, y, w, h),
        scale_factor: scale,
        primary,
        physical: None,
    }
}

fn solid(id: &str, hint: Option<&str>, w: u32, h: u32, color: [u8; 4]) -> CaptureSource {
    CaptureSource {
        id: id.to_string(),
        display_id_hint: hint.map(str::to_string),
        pixels: DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba(color))),
    }
}

fn select(displays: &[Display], surface: usize, from: (i32, i32), to: (i32, i32)) -> SessionEvent {
    let mut session =
        SelectionSession::open(displays.to_vec(), |_, _| Ok::<_, ()>(NoopSurface)).unwrap();
    session.pointer_down(surface, Point::new(from.0, from.1));
    session.pointer_move(surface, Point::new(to.0, to.1));
    session.pointer_up(surface, Point::new(to.0, to.1))
}

fn ok_body(latex: &str) -> String {
    format!(
        r#"{{"status":true,"res":{{"latex":"{}","conf":0.91}},"request_id":"tr-1"}}"#,
        latex
    )
}

// ── Selection → capture ─────────────────────────────────────────────

#[test]
fn tiny_drag_never_reaches_capture() {
    let displays = vec![display("1", 0, 0, 1920, 1080, 1.0, true)];
    let event = select(&displays, 0, (100, 100), (110, 180));
    assert_eq!(event, SessionEvent::Cancelled);
}

#[test]
fn hidpi_selection_crops_physical_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(TempFileRegistry::create(dir.path()).unwrap());
    let displays = vec![display("1", 0, 0, 1920, 1080, 2.0, true)];

    let SessionEvent::Committed(selection) = select(&displays, 0, (1160, 640), (960, 540)) else {
        panic!("selection should commit");
    };
    assert_eq!(selection, Rect::<Absolute>::new(960, 540, 200, 100));

    fn sources() -> Vec<CaptureSource> {
        let mut img = RgbaImage::from_pixel(3840, 2160, Rgba([0, 0, 0, 255]));
        // Marker at the physical top-left of the expected crop.
        img.put_pixel(1920, 1080, Rgba([255, 255, 255, 255]));
        vec![CaptureSource {
            id: "screen:0".into(),
            display_id_hint: Some("1".into()),
            pixels: DynamicImage::ImageRgba8(img),
        }]
    }

    let engine = CaptureEngine::new(Displays(displays), Sources(sources), Arc::clone(&registry));
    let result = engine.capture(selection).unwrap();

    assert_eq!(result.pixel_dimensions, Size::new(400, 200));
    let png = image::open(&result.file_path).unwrap().to_rgba8();
    assert_eq!(png.dimensions(), (400, 200));
    assert_eq!(png.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    assert_eq!(png.get_pixel(1, 1), &Rgba([0, 0, 0, 255]));
    assert_eq!(registry.count(), 1);
}

#[test]
fn display_left_of_primary_with_negative_origin() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(TempFileRegistry::create(dir.path()).unwrap());
    let displays = vec![
        display("1", 0, 0, 1920, 1080, 1.0, true),
        display("2", -1280, -100, 1280, 1024, 1.0, false),
    ];

    let SessionEvent::Committed(selection) = select(&displays, 1, (100, 200), (400, 300)) else {
        panic!("selection should commit");
    };
    assert_eq!(selection, Rect::new(-1180, 100, 300, 100));

    fn sources() -> Vec<CaptureSource> {
        vec![
            solid("screen:0", Some("1"), 1920, 1080, [255, 0, 0, 255]),
            solid("screen:1", Some("2"), 1280, 1024, [0, 255, 0, 255]),
        ]
    }

    let engine = CaptureEngine::new(Displays(displays), Sources(sources), registry);
    let result = engine.capture(selection).unwrap();
    let png = image::open(&result.file_path).unwrap().to_rgba8();
    assert_eq!(png.dimensions(), (300, 100));
    assert_eq!(png.get_pixel(150, 50), &Rgba([0, 255, 0, 255]));
}

#[test]
fn mixed_dpi_secondary_captures_its_own_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(TempFileRegistry::create(dir.path()).unwrap());
    let displays = layout_displays(&[
        PlatformMonitor {
            name: Some("P".into()),
            bounds: Rect::new(0, 0, 1920, 1080),
            scale_factor: 1.0,
            primary: true,
        },
        PlatformMonitor {
            name: Some("S".into()),
            bounds: Rect::new(1920, 0, 3840, 2160),
            scale_factor: 2.0,
            primary: false,
        },
    ]);

    let SessionEvent::Committed(selection) = select(&displays, 1, (100, 100), (300, 300)) else {
        panic!("selection should commit");
    };
    assert_eq!(selection, Rect::new(2020, 100, 200, 200));

    fn sources() -> Vec<CaptureSource> {
        vec![
            solid("screen:0", Some("P"), 1920, 1080, [255, 0, 0, 255]),
            solid("screen:1", Some("S"), 3840, 2160, [0, 0, 255, 255]),
        ]
    }

    let engine = CaptureEngine::new(Displays(displays), Sources(sources), registry);
    let result = engine.capture(selection).unwrap();
    assert_eq!(result.pixel_dimensions, Size::new(400, 400));
    let png = image::open(&result.file_path).unwrap().to_rgba8();
    assert_eq!(png.get_pixel(200, 200), &Rgba([0, 0, 255, 255]));
}

#[test]
fn unmatched_ids_fall_back_to_enumeration_order() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(TempFileRegistry::create(dir.path()).unwrap());
    let displays = vec![
        display("\\\\.\\DISPLAY1", 0, 0, 800, 600, 1.0, true),
        display("\\\\.\\DISPLAY2", 800, 0, 800, 600, 1.0, false),
    ];

    fn sources() -> Vec<CaptureSource> {
        vec![
            solid("screen:a", Some("garbage"), 800, 600, [10, 10, 10, 255]),
            solid("screen:b", None, 800, 600, [200, 200, 200, 255]),
        ]
    }

    let engine = CaptureEngine::new(Displays(displays), Sources(sources), registry);
    // Primary target: no identity match and the secondary rule does not
    // apply, so the source at the same index wins.
    let result = engine.capture(Rect::new(100, 100, 50, 50)).unwrap();
    let png = image::open(&result.file_path).unwrap().to_rgba8();
    assert_eq!(png.get_pixel(0, 0), &Rgba([10, 10, 10, 255]));

    let diag = engine.diagnose().unwrap();
    let strategies: Vec<_> = diag
        .displays
        .iter()
        .map(|d| d.resolution.map(|r| r.strategy))
        .collect();
    assert_eq!(
        strategies,
        [Some("ordinal-index"), Some("secondary-heuristic")]
    );
}

#[test]
fn selection_past_the_edge_is_clamped() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(TempFileRegistry::create(dir.path()).unwrap());
    let displays = vec![display("1", 0, 0, 1000, 500, 1.0, true)];

    fn sources() -> Vec<CaptureSource> {
        vec![solid("screen:0", Some("1"), 1000, 500, [1, 2, 3, 255])]
    }

    let engine = CaptureEngine::new(Displays(displays), Sources(sources), registry);
    let result = engine.capture(Rect::new(950, 480, 200, 200)).unwrap();
    assert_eq!(result.pixel_dimensions, Size::new(50, 20));
}

// ── Capture → recognition → history ─────────────────────────────────

#[tokio::test(start_paused = true)]
async fn captured_file_is_recognized_after_rate_limit() {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(TempFileRegistry::create(dir.path()).unwrap());
    let displays = vec![display("1", 0, 0, 640, 480, 1.0, true)];

    fn sources() -> Vec<CaptureSource> {
        vec![solid("screen:0", Some("1"), 640, 480, [255, 255, 255, 255])]
    }

    let engine = CaptureEngine::new(Displays(displays), Sources(sources), Arc::clone(&registry));
    let capture = engine.capture(Rect::new(10, 10, 120, 40)).unwrap();

    let server = ScriptedServer::new(&[(429, ""), (200, &ok_body("E=mc^2"))]);
    let client = RecognitionClient::new(&server);
    let result = client
        .recognize(&capture.file_path, &ApiCredentials::new("app", "secret"))
        .await;

    assert_eq!(
        result,
        RecognitionResult::Success {
            markup: "E=mc^2".into(),
            confidence: 0.91
        }
    );

    let mut history = History::default();
    let now = chrono::Utc::now();
    assert!(history.record(result.markup().unwrap(), now));
    assert!(!history.record("E=mc^2", now));
    assert_eq!(history.len(), 1);

    assert!(registry.remove(&capture.file_path));
    assert!(!capture.file_path.exists());
}

#[tokio::test(start_paused = true)]
async fn persistent_rate_limit_gives_up_after_three_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("sniptex-upload.png");
    std::fs::write(&image, b"\x89PNG").unwrap();

    let server = ScriptedServer::new(&[(429, ""), (429, ""), (429, ""), (200, &ok_body("x"))]);
    let client = RecognitionClient::new(&server);
    let result = client
        .recognize(&image, &ApiCredentials::new("app", "secret"))
        .await;

    assert_eq!(
        result,
        RecognitionResult::failure("Request failed with status code 429")
    );
    assert_eq!(server.attempts(), 3);
}
