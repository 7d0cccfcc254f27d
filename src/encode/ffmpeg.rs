use std::collections::HashSet;
use std::io::{Read, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::thread::JoinHandle;

use tokio::sync::mpsc;

use crate::encode::format::{Codec, Container, MimeType};
use crate::encode::stream::{EncoderEvent, SampleCadence, StreamConfig, StreamEncoder};
use crate::foundation::core::Timestamp;
use crate::foundation::error::{CaptureError, CaptureResult};
use crate::render::surface::Surface;

const STDOUT_CHUNK_BYTES: usize = 64 * 1024;
const FRAME_QUEUE_DEPTH: usize = 4;

pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn video_encoder(codec: Codec) -> &'static str {
    match codec {
        Codec::Av1 => "libaom-av1",
        Codec::Vp9 => "libvpx-vp9",
        Codec::Vp8 => "libvpx",
        Codec::Hevc => "libx265",
        Codec::H264 => "libx264",
        Codec::Theora => "libtheora",
    }
}

fn muxer(container: Container) -> &'static str {
    match container {
        Container::Matroska => "matroska",
        Container::WebM => "webm",
        Container::Ogg => "ogg",
        Container::Mp4 => "mp4",
        Container::Mpeg => "mpeg",
        Container::QuickTime => "mov",
    }
}

/// Whether ffmpeg can mux `codec` into `container`.
pub fn is_muxable(container: Container, codec: Codec) -> bool {
    match container {
        Container::Matroska => true,
        Container::WebM => matches!(codec, Codec::Av1 | Codec::Vp9 | Codec::Vp8),
        Container::Ogg => matches!(codec, Codec::Theora | Codec::Vp8),
        Container::Mp4 => matches!(codec, Codec::Av1 | Codec::Vp9 | Codec::Hevc | Codec::H264),
        Container::Mpeg => matches!(codec, Codec::H264),
        Container::QuickTime => matches!(codec, Codec::Hevc | Codec::H264),
    }
}

/// Build the ffmpeg argument list: raw RGBA frames on stdin, the muxed container on stdout.
pub fn ffmpeg_args(cfg: &StreamConfig) -> Vec<String> {
    let mut args: Vec<String> = [
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgba",
        "-s",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push(format!("{}x{}", cfg.canvas.width, cfg.canvas.height));
    args.extend(["-r".to_owned(), cfg.frame_rate.to_string()]);
    args.extend(["-i", "pipe:0", "-an", "-c:v"].map(str::to_owned));
    args.push(video_encoder(cfg.mime.codec).to_owned());

    // yuv420p needs even dimensions; pad by one pixel when necessary.
    args.extend(
        [
            "-vf",
            "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-pix_fmt",
            "yuv420p",
        ]
        .map(str::to_owned),
    );

    if matches!(cfg.mime.container, Container::Mp4 | Container::QuickTime) {
        // Seekless output: fragmented so the moov atom does not need a rewind.
        args.extend(["-movflags", "frag_keyframe+empty_moov"].map(str::to_owned));
    }

    args.extend(["-f".to_owned(), muxer(cfg.mime.container).to_owned()]);
    args.push("pipe:1".to_owned());
    args
}

/// Names of the video encoders compiled into the `ffmpeg` on PATH, or `None` when it cannot
/// be run.
pub fn list_video_encoders() -> Option<HashSet<String>> {
    let output = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(parse_video_encoders(&String::from_utf8_lossy(&output.stdout)))
}

fn parse_video_encoders(listing: &str) -> HashSet<String> {
    listing
        .lines()
        .skip_while(|line| !line.trim_start().starts_with("---"))
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let flags = fields.next()?;
            if !flags.starts_with('V') {
                return None;
            }
            fields.next().map(str::to_owned)
        })
        .collect()
}

/// One queued write: the flattened frame and how many sampling slots it fills.
#[derive(Debug)]
struct FrameWrite {
    rgba: Vec<u8>,
    repeat: u64,
}

/// Stream encoder backed by the system `ffmpeg` binary.
///
/// `present` never touches the pipe. Frames go through a bounded queue to a writer thread that
/// owns ffmpeg's stdin; a reader thread forwards stdout as [`EncoderEvent::Chunk`]s and reports
/// the exit status once the pipe closes. When the queue is full the due slots are carried over
/// to the next present instead of waiting.
pub struct FfmpegStreamEncoder {
    encoders: HashSet<String>,
    frames: Option<SyncSender<FrameWrite>>,
    cadence: Option<SampleCadence>,
    frame_len: usize,
    backlog: u64,
    max_backlog: u64,
}

impl Default for FfmpegStreamEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegStreamEncoder {
    pub fn new() -> Self {
        Self::with_encoders(list_video_encoders().unwrap_or_default())
    }

    fn with_encoders(encoders: HashSet<String>) -> Self {
        Self {
            encoders,
            frames: None,
            cadence: None,
            frame_len: 0,
            backlog: 0,
            max_backlog: 0,
        }
    }

    pub fn is_available(&self) -> bool {
        !self.encoders.is_empty()
    }

    fn spawn(&mut self, cfg: &StreamConfig) -> CaptureResult<mpsc::UnboundedReceiver<EncoderEvent>> {
        let mut cmd = Command::new("ffmpeg");
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .args(ffmpeg_args(cfg));
        tracing::debug!(mime = %cfg.mime, "spawning ffmpeg stream encoder");

        let mut child = cmd.spawn().map_err(|e| {
            CaptureError::encoding(format!(
                "failed to spawn ffmpeg (is it installed and on PATH?): {e}"
            ))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CaptureError::encoding("failed to open ffmpeg stdin (unexpected)"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::encoding("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| CaptureError::encoding("failed to open ffmpeg stderr (unexpected)"))?;

        let stderr_drain = std::thread::spawn(move || {
            let mut stderr_bytes = Vec::new();
            stderr.read_to_end(&mut stderr_bytes)?;
            Ok::<_, std::io::Error>(stderr_bytes)
        });

        let (frame_tx, frame_rx) = std::sync::mpsc::sync_channel(FRAME_QUEUE_DEPTH);
        let writer = std::thread::spawn(move || write_frames(stdin, frame_rx));

        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || forward_output(child, stdout, stderr_drain, writer, tx));

        let frame_rate = cfg.frame_rate.max(1);
        self.frame_len = cfg.canvas.bytes_rgba8();
        self.cadence = Some(SampleCadence::new(frame_rate));
        self.backlog = 0;
        self.max_backlog = u64::from(frame_rate) * 2;
        self.frames = Some(frame_tx);
        Ok(rx)
    }
}

impl StreamEncoder for FfmpegStreamEncoder {
    fn is_type_supported(&self, mime: &str) -> bool {
        MimeType::parse(mime).is_some_and(|m| {
            is_muxable(m.container, m.codec) && self.encoders.contains(video_encoder(m.codec))
        })
    }

    fn begin(&mut self, cfg: &StreamConfig) -> CaptureResult<mpsc::UnboundedReceiver<EncoderEvent>> {
        if self.frames.is_some() {
            return Err(CaptureError::encoding("ffmpeg encoder already started"));
        }
        if !self.is_type_supported(cfg.mime.as_str()) {
            return Err(CaptureError::unsupported_format(cfg.mime.to_string()));
        }
        self.spawn(cfg)
    }

    fn present(&mut self, surface: &Surface, at: Timestamp) -> CaptureResult<()> {
        let (Some(frames), Some(cadence)) = (self.frames.as_ref(), self.cadence.as_mut()) else {
            return Err(CaptureError::encoding("ffmpeg encoder not started"));
        };

        let due = (cadence.samples_due(at) + self.backlog).min(self.max_backlog);
        if due == 0 {
            return Ok(());
        }

        let src = surface.data_premul();
        if src.len() != self.frame_len {
            return Err(CaptureError::encoding(
                "surface size does not match the encoder configuration",
            ));
        }
        let mut rgba = vec![0u8; src.len()];
        flatten_to_opaque_rgba8(&mut rgba, src);

        match frames.try_send(FrameWrite { rgba, repeat: due }) {
            Ok(()) => {
                self.backlog = 0;
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                tracing::trace!(backlog = due, "ffmpeg is behind; carrying samples over");
                self.backlog = due;
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => {
                Err(CaptureError::encoding("ffmpeg stopped accepting frames"))
            }
        }
    }

    fn stop(&mut self) -> CaptureResult<()> {
        // Dropping the queue lets the writer flush and close stdin; ffmpeg then exits and the
        // reader thread reports completion.
        match self.frames.take() {
            Some(frames) => {
                if self.backlog > 0 {
                    tracing::debug!(backlog = self.backlog, "dropping samples ffmpeg never took");
                }
                drop(frames);
                Ok(())
            }
            None => Err(CaptureError::encoding("ffmpeg encoder not started")),
        }
    }
}

fn write_frames(mut stdin: ChildStdin, frames: Receiver<FrameWrite>) -> std::io::Result<()> {
    for frame in frames {
        for _ in 0..frame.repeat {
            stdin.write_all(&frame.rgba)?;
        }
    }
    Ok(())
}

fn stderr_text(stderr_drain: JoinHandle<std::io::Result<Vec<u8>>>) -> String {
    match stderr_drain.join() {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).trim().to_owned(),
        Ok(Err(e)) => format!("<failed to read stderr: {e}>"),
        Err(_) => "<stderr drain thread panicked>".to_owned(),
    }
}

fn forward_output(
    mut child: Child,
    mut stdout: ChildStdout,
    stderr_drain: JoinHandle<std::io::Result<Vec<u8>>>,
    writer: JoinHandle<std::io::Result<()>>,
    tx: mpsc::UnboundedSender<EncoderEvent>,
) {
    let mut buf = vec![0u8; STDOUT_CHUNK_BYTES];
    loop {
        match stdout.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                // A closed receiver means the session is gone; keep draining so ffmpeg can exit.
                let _ = tx.send(EncoderEvent::Chunk(buf[..n].to_vec()));
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                let stderr = stderr_text(stderr_drain);
                let _ = tx.send(EncoderEvent::Error(format!(
                    "read ffmpeg stdout: {e}: {stderr}"
                )));
                return;
            }
        }
    }

    let event = match child.wait() {
        // A clean exit means stdin reached EOF, so the writer has already returned.
        Ok(status) if status.success() => match writer.join() {
            Ok(Ok(())) => EncoderEvent::Stopped,
            Ok(Err(e)) => EncoderEvent::Error(format!("failed to write frames to ffmpeg: {e}")),
            Err(_) => EncoderEvent::Error("ffmpeg writer thread panicked".to_owned()),
        },
        Ok(status) => {
            let stderr = stderr_text(stderr_drain);
            EncoderEvent::Error(format!("ffmpeg exited with status {status}: {stderr}"))
        }
        Err(e) => EncoderEvent::Error(format!("failed to wait for ffmpeg to finish: {e}")),
    };
    let _ = tx.send(event);
}

/// Convert premultiplied RGBA8 to opaque straight RGBA8 (over black).
fn flatten_to_opaque_rgba8(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        d[0] = s[0];
        d[1] = s[1];
        d[2] = s[2];
        d[3] = 255;
    }
}
