use std::sync::Arc;

use svgrec::encode::ffmpeg::is_ffmpeg_on_path;
use svgrec::encode::format::Container;
use svgrec::render::surface::Surface;
use svgrec::{
    Canvas, Capabilities, CaptureError, CaptureOptions, EncoderEvent, FfmpegStreamEncoder,
    MimeType, OutputKind, Rgb8, ScriptedTicks, SessionManager, StreamConfig, StreamEncoder,
    SvgSource, Timestamp, supported_formats,
};

const SVG: &[u8] = br##"<svg xmlns="http://www.w3.org/2000/svg" width="16" height="16"><rect width="8" height="16" fill="#ff0000"/></svg>"##;

const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// A Matroska or WebM type the local ffmpeg can encode, if any.
fn matroska_family_format(enc: &FfmpegStreamEncoder) -> Option<MimeType> {
    supported_formats(|mime| enc.is_type_supported(mime), false)
        .into_iter()
        .filter_map(|f| MimeType::parse(&f.value))
        .find(|m| matches!(m.container, Container::Matroska | Container::WebM))
}

fn options(mime: MimeType) -> CaptureOptions {
    CaptureOptions {
        source: Arc::new(SvgSource::from_data("half.svg", SVG).unwrap()),
        width: 16,
        height: 16,
        duration_ms: 200,
        frame_rate: 10,
        background: Rgb8::WHITE,
        output: OutputKind::Stream { mime },
    }
}

#[tokio::test]
async fn ffmpeg_session_produces_a_matroska_stream() {
    if !is_ffmpeg_on_path() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let enc = FfmpegStreamEncoder::new();
    let Some(mime) = matroska_family_format(&enc) else {
        eprintln!("skipping: ffmpeg has no Matroska/WebM-capable video encoder");
        return;
    };
    let expected_type = mime.to_string();

    let manager = SessionManager::new();
    let caps = Capabilities::new(ScriptedTicks::uniform(0.0, 20.0, 30)).with_stream_encoder(enc);
    let artifact = manager.record(options(mime), caps).await.unwrap();

    let stream = artifact.as_stream().unwrap();
    assert_eq!(stream.mime_type, expected_type);
    assert!(stream.data.len() > EBML_MAGIC.len());
    assert_eq!(stream.data[..4], EBML_MAGIC);
    assert!(!manager.is_recording());
}

#[tokio::test]
async fn ffmpeg_encoder_reports_stopped_after_its_last_chunk() {
    if !is_ffmpeg_on_path() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let mut enc = FfmpegStreamEncoder::new();
    let Some(mime) = matroska_family_format(&enc) else {
        eprintln!("skipping: ffmpeg has no Matroska/WebM-capable video encoder");
        return;
    };
    let cfg = StreamConfig {
        canvas: Canvas::new(16, 16).unwrap(),
        frame_rate: 10,
        mime,
    };

    let mut events = enc.begin(&cfg).unwrap();
    assert!(enc.begin(&cfg).is_err());
    let surface = Surface::new(cfg.canvas).unwrap();
    for at in [0.0, 100.0, 200.0, 300.0] {
        enc.present(&surface, Timestamp(at)).unwrap();
    }
    enc.stop().unwrap();

    let mut data = Vec::new();
    let mut last = None;
    while let Some(event) = events.recv().await {
        match event {
            EncoderEvent::Chunk(bytes) => data.extend_from_slice(&bytes),
            other => last = Some(other),
        }
    }
    assert!(matches!(last, Some(EncoderEvent::Stopped)), "{last:?}");
    assert_eq!(data[..4], EBML_MAGIC);
}

#[tokio::test]
async fn unmuxable_pair_is_refused_before_ffmpeg_starts() {
    if !is_ffmpeg_on_path() {
        eprintln!("skipping: ffmpeg not on PATH");
        return;
    }
    let manager = SessionManager::new();
    let caps = Capabilities::new(ScriptedTicks::uniform(0.0, 20.0, 30))
        .with_stream_encoder(FfmpegStreamEncoder::new());
    let mime = MimeType::parse("video/webm;codecs=avc1").unwrap();

    let err = manager.start(options(mime), caps).unwrap_err();
    assert!(matches!(err, CaptureError::UnsupportedFormat(_)), "{err:?}");
    assert!(!manager.is_recording());
}
