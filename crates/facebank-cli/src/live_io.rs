//! Camera source, preview sink and quit signal for `facebank cam`.

use facebank_core::annotate::verdict_text;
use facebank_core::live::SinkError;
use facebank_core::{FaceAnnotation, FrameSink, FrameSource};
use facebank_hw::CaptureSession;
use image::{ImageFormat, RgbImage};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Frames from a running V4L2 capture session. A failed capture ends the stream.
pub struct CameraSource<'a> {
    session: CaptureSession<'a>,
    last_sequence: Option<u32>,
}

impl<'a> CameraSource<'a> {
    pub fn new(session: CaptureSession<'a>) -> Self {
        Self {
            session,
            last_sequence: None,
        }
    }
}

/// Buffers the driver skipped between two consecutive sequence numbers.
/// A sequence that does not increase is a counter restart, not a gap.
fn dropped_between(previous: u32, next: u32) -> u32 {
    if next <= previous {
        return 0;
    }
    next - previous - 1
}

impl FrameSource for CameraSource<'_> {
    fn next_frame(&mut self) -> Option<RgbImage> {
        match self.session.capture() {
            Ok(frame) => {
                if let Some(previous) = self.last_sequence {
                    let dropped = dropped_between(previous, frame.sequence);
                    if dropped > 0 {
                        tracing::debug!(dropped, sequence = frame.sequence, "driver dropped frames");
                    }
                }
                self.last_sequence = Some(frame.sequence);
                tracing::trace!(sequence = frame.sequence, "captured frame");
                Some(frame.image)
            }
            Err(e) => {
                tracing::warn!(error = %e, "frame capture failed, stopping");
                None
            }
        }
    }
}

/// Shared cancellation flag, set by `q` on stdin or by Ctrl-C.
#[derive(Clone, Default)]
pub struct QuitSignal(Arc<AtomicBool>);

impl QuitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Watch stdin on a dedicated thread and trigger on a line reading `q`.
    ///
    /// The thread is detached; it may stay blocked on stdin until the process exits.
    pub fn watch_stdin(&self) {
        let quit = self.clone();
        let spawned = std::thread::Builder::new()
            .name("stdin-quit".into())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if is_quit_command(&line) {
                        tracing::debug!("quit requested from stdin");
                        quit.trigger();
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "could not watch stdin; use Ctrl-C to stop");
        }
    }
}

fn is_quit_command(line: &str) -> bool {
    matches!(line.trim(), "q" | "Q" | "quit")
}

/// Headless renderer: logs each frame's verdicts and, when configured,
/// replaces a JPEG preview file with the annotated frame.
pub struct PreviewSink {
    preview_path: Option<PathBuf>,
    quit: QuitSignal,
}

impl PreviewSink {
    pub fn new(preview_path: Option<PathBuf>, quit: QuitSignal) -> Self {
        Self { preview_path, quit }
    }

    fn write_preview(&self, frame: &RgbImage) -> Result<(), SinkError> {
        let Some(path) = &self.preview_path else {
            return Ok(());
        };
        // Write beside the target and rename so readers never see a partial JPEG.
        let tmp = path.with_extension("part");
        frame.save_with_format(&tmp, ImageFormat::Jpeg)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl FrameSink for PreviewSink {
    fn render(&mut self, frame: &RgbImage, faces: &[FaceAnnotation]) -> Result<(), SinkError> {
        if !faces.is_empty() {
            let verdicts: Vec<String> = faces.iter().map(|f| verdict_text(&f.verdict)).collect();
            tracing::info!(faces = %verdicts.join(", "), "frame");
        }
        self.write_preview(frame)
    }

    fn should_stop(&mut self) -> bool {
        self.quit.is_set()
    }
}
