use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use svgrec::render::surface::Surface;
use svgrec::{
    Capabilities, CaptureError, CaptureOptions, CaptureResult, EncoderEvent, MimeType,
    OutputKind, Rgb8, ScriptedTicks, SessionManager, SessionState, StreamConfig, StreamEncoder,
    SvgSource, Timestamp,
};

const SVG: &[u8] = br##"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="4"><circle cx="2" cy="2" r="2" fill="#00ff00"/></svg>"##;

fn options(mime: &str, duration_ms: u32) -> CaptureOptions {
    CaptureOptions {
        source: Arc::new(SvgSource::from_data("dot.svg", SVG).unwrap()),
        width: 4,
        height: 4,
        duration_ms,
        frame_rate: 25,
        background: Rgb8::WHITE,
        output: OutputKind::Stream {
            mime: MimeType::parse(mime).unwrap(),
        },
    }
}

#[derive(Debug, Default)]
struct Observed {
    configs: Vec<StreamConfig>,
    presents: Vec<f64>,
    states: Vec<SessionState>,
    stops: u32,
}

/// Sends one chunk per present (the present count), then a trailer and `Stopped` on stop.
struct FakeStream {
    observed: Arc<Mutex<Observed>>,
    manager: Option<SessionManager>,
    fail_after: Option<usize>,
    tx: Option<mpsc::UnboundedSender<EncoderEvent>>,
}

impl FakeStream {
    fn new(observed: Arc<Mutex<Observed>>) -> Self {
        Self {
            observed,
            manager: None,
            fail_after: None,
            tx: None,
        }
    }
}

impl StreamEncoder for FakeStream {
    fn is_type_supported(&self, mime: &str) -> bool {
        mime.starts_with("video/webm") || mime.starts_with("video/x-matroska")
    }

    fn begin(&mut self, cfg: &StreamConfig) -> CaptureResult<mpsc::UnboundedReceiver<EncoderEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        self.observed.lock().configs.push(cfg.clone());
        Ok(rx)
    }

    fn present(&mut self, surface: &Surface, at: Timestamp) -> CaptureResult<()> {
        assert_eq!(surface.canvas().width, 4);
        let mut observed = self.observed.lock();
        observed.presents.push(at.as_millis());
        if let Some(manager) = &self.manager {
            observed.states.push(manager.state());
        }
        let n = observed.presents.len();
        if let Some(tx) = &self.tx {
            if self.fail_after == Some(n) {
                let _ = tx.send(EncoderEvent::Error("muxer gave up".to_owned()));
            } else {
                let _ = tx.send(EncoderEvent::Chunk(vec![n as u8]));
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> CaptureResult<()> {
        self.observed.lock().stops += 1;
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(EncoderEvent::Chunk(vec![0xEE]));
            let _ = tx.send(EncoderEvent::Stopped);
        }
        Ok(())
    }
}

#[tokio::test]
async fn renders_every_tick_and_concatenates_chunks_in_arrival_order() {
    let observed = Arc::new(Mutex::new(Observed::default()));
    let manager = SessionManager::new();
    let mut enc = FakeStream::new(observed.clone());
    enc.manager = Some(manager.clone());

    // Origin at 100; ticks every 50 ms; the window closes after 500 ms.
    let caps = Capabilities::new(ScriptedTicks::uniform(100.0, 50.0, 30)).with_stream_encoder(enc);
    let artifact = manager
        .record(options("video/webm;codecs=vp8", 500), caps)
        .await
        .unwrap();

    let stream = artifact.as_stream().unwrap();
    assert_eq!(stream.mime_type, "video/webm;codecs=vp8");
    let mut expected: Vec<u8> = (1..=11).collect();
    expected.push(0xEE);
    assert_eq!(stream.data, expected);

    let observed = observed.lock();
    assert_eq!(observed.configs.len(), 1);
    assert_eq!(observed.configs[0].frame_rate, 25);
    assert_eq!(observed.configs[0].mime.as_str(), "video/webm;codecs=vp8");
    // Every tick is presented, not just frame-boundary ticks.
    assert_eq!(observed.presents.len(), 11);
    assert_eq!(observed.presents.first(), Some(&100.0));
    assert_eq!(observed.presents.last(), Some(&600.0));
    assert_eq!(observed.stops, 1);
    assert!(observed.states.iter().all(|s| *s == SessionState::Recording));
    assert_eq!(manager.state(), SessionState::Idle);
}

#[tokio::test]
async fn encoder_error_rejects_with_encoding_failed() {
    let observed = Arc::new(Mutex::new(Observed::default()));
    let mut enc = FakeStream::new(observed.clone());
    enc.fail_after = Some(3);
    let manager = SessionManager::new();
    let caps = Capabilities::new(ScriptedTicks::uniform(0.0, 10.0, 200)).with_stream_encoder(enc);

    let err = manager
        .record(options("video/x-matroska;codecs=avc1", 1000), caps)
        .await
        .unwrap_err();
    assert!(matches!(err, CaptureError::EncodingFailed(ref m) if m == "muxer gave up"));
    assert!(!manager.is_recording());
    // The session stopped ticking soon after the error arrived.
    assert!(observed.lock().presents.len() < 10);
}

#[tokio::test]
async fn unsupported_mime_rejects_before_any_tick() {
    let observed = Arc::new(Mutex::new(Observed::default()));
    let manager = SessionManager::new();
    let caps = Capabilities::new(ScriptedTicks::uniform(0.0, 10.0, 10))
        .with_stream_encoder(FakeStream::new(observed.clone()));

    let err = manager
        .start(options("video/mp4;codecs=avc1", 100), caps)
        .unwrap_err();
    assert!(matches!(err, CaptureError::UnsupportedFormat(_)));
    assert!(observed.lock().configs.is_empty());
    assert_eq!(manager.state(), SessionState::Idle);
}

#[tokio::test]
async fn stream_output_without_stream_encoder_is_unsupported() {
    let manager = SessionManager::new();
    let caps = Capabilities::new(ScriptedTicks::uniform(0.0, 10.0, 10));
    let err = manager
        .start(options("video/webm;codecs=vp9", 100), caps)
        .unwrap_err();
    assert!(matches!(err, CaptureError::UnsupportedFormat(_)));
    assert!(!manager.is_recording());
}
