//! Output naming and file delivery for finished artifacts.

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::capture::{CaptureArtifact, FrameSequence, StreamArtifact};
use crate::encode::format::MimeType;
use crate::foundation::error::{CaptureError, CaptureResult};

/// Source file name without directories and without a trailing `.svg`/`.svgz` (any case).
pub fn output_stem(source_name: &str) -> &str {
    let name = Path::new(source_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(source_name);
    for ext in [".svgz", ".svg"] {
        if name.len() > ext.len() {
            let (head, tail) = name.split_at(name.len() - ext.len());
            if tail.eq_ignore_ascii_case(ext) {
                return head;
            }
        }
    }
    name
}

/// `<stem>.<container extension>` for a stream artifact.
pub fn stream_file_name(source_name: &str, mime_type: &str) -> CaptureResult<String> {
    let mime = MimeType::parse(mime_type)
        .ok_or_else(|| CaptureError::unsupported_format(mime_type.to_owned()))?;
    Ok(format!(
        "{}.{}",
        output_stem(source_name),
        mime.container.extension()
    ))
}

/// File name of one frame in a sequence: its index.
pub fn frame_file_name(index: usize) -> String {
    format!("{index}.png")
}

pub fn ensure_parent_dir(path: &Path) -> CaptureResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

pub fn write_stream(stream: &StreamArtifact, path: &Path) -> CaptureResult<()> {
    ensure_parent_dir(path)?;
    std::fs::write(path, &stream.data)
        .with_context(|| format!("failed to write '{}'", path.display()))?;
    Ok(())
}

/// Write every frame as `<index>.png` into `dir`, returning the written paths in index order.
pub fn write_sequence(sequence: &FrameSequence, dir: &Path) -> CaptureResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
    sequence
        .frames
        .iter()
        .enumerate()
        .map(|(i, frame)| -> CaptureResult<PathBuf> {
            let path = dir.join(frame_file_name(i));
            std::fs::write(&path, frame.data.as_slice())
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            Ok(path)
        })
        .collect()
}

/// Deliver an artifact next to `out_dir` using names derived from the source.
///
/// Streams become `<out_dir>/<stem>.<ext>`; sequences become `<out_dir>/<stem>/<index>.png`.
/// Returns the file or directory written.
pub fn deliver(
    artifact: &CaptureArtifact,
    source_name: &str,
    out_dir: &Path,
) -> CaptureResult<PathBuf> {
    match artifact {
        CaptureArtifact::Stream(stream) => {
            let path = out_dir.join(stream_file_name(source_name, &stream.mime_type)?);
            write_stream(stream, &path)?;
            tracing::info!(path = %path.display(), bytes = stream.data.len(), "wrote stream");
            Ok(path)
        }
        CaptureArtifact::Sequence(sequence) => {
            let dir = out_dir.join(output_stem(source_name));
            let written = write_sequence(sequence, &dir)?;
            tracing::info!(
                dir = %dir.display(),
                frames = written.len(),
                dropped = sequence.dropped_frame_count,
                "wrote frame sequence"
            );
            Ok(dir)
        }
    }
}
