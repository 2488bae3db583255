//! Frame-by-frame classification over a camera stream.
//!
//! Each frame goes through detect → gate → crop → embed → classify → annotate
//! → render, then the sink is polled for cancellation. Frames are handled
//! strictly one at a time and every face is classified on its own: nothing
//! is carried from one face or frame to the next.

use crate::analyzer::FaceAnalyzer;
use crate::annotate;
use crate::bank::PrototypeBank;
use crate::matcher::{Classification, Matcher};
use crate::types::BoundingBox;
use image::imageops;
use image::RgbImage;
use std::error::Error;

/// Minimum detector confidence before a live face is classified.
pub const DEFAULT_LIVE_GATE: f32 = 0.8;

pub type SinkError = Box<dyn Error + Send + Sync>;

/// Where frames come from.
pub trait FrameSource {
    /// The next frame, or `None` once the stream has ended or capture fails.
    fn next_frame(&mut self) -> Option<RgbImage>;
}

/// Where annotated frames go.
pub trait FrameSink {
    /// Show or store one fully annotated frame.
    fn render(&mut self, frame: &RgbImage, faces: &[FaceAnnotation]) -> Result<(), SinkError>;

    /// Non-blocking cancellation check, polled once per completed frame.
    fn should_stop(&mut self) -> bool;
}

/// Per-face decision.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceVerdict {
    Classified(Classification),
    /// Detector confidence under the live gate; not classified.
    LowConfidence,
    /// Cropping or embedding this face failed.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FaceAnnotation {
    pub bbox: BoundingBox,
    pub verdict: FaceVerdict,
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSummary {
    pub frames: u64,
    pub faces: u64,
    pub matched: u64,
    pub unknown: u64,
    pub low_confidence: u64,
    pub failed: u64,
    /// Whether the loop ended through the sink's cancellation signal.
    pub cancelled: bool,
}

impl LiveSummary {
    fn record(&mut self, face: &FaceAnnotation) {
        self.faces += 1;
        match &face.verdict {
            FaceVerdict::Classified(c) if c.identity.is_known() => self.matched += 1,
            FaceVerdict::Classified(_) => self.unknown += 1,
            FaceVerdict::LowConfidence => self.low_confidence += 1,
            FaceVerdict::Failed => self.failed += 1,
        }
    }
}

/// The live recognition loop and its fixed collaborators.
pub struct LiveLoop<'a, A: ?Sized, M: ?Sized> {
    pub analyzer: &'a mut A,
    pub matcher: &'a M,
    pub bank: &'a PrototypeBank,
    pub face_gate: f32,
}

impl<A, M> LiveLoop<'_, A, M>
where
    A: FaceAnalyzer + ?Sized,
    M: Matcher + ?Sized,
{
    /// Run until the source runs dry or the sink asks to stop.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K) -> LiveSummary
    where
        S: FrameSource + ?Sized,
        K: FrameSink + ?Sized,
    {
        let mut summary = LiveSummary::default();
        tracing::info!(face_gate = self.face_gate, labels = self.bank.len(), "live loop started");

        loop {
            let Some(mut frame) = source.next_frame() else {
                tracing::info!("frame stream ended");
                break;
            };

            let faces = self.classify_frame(&frame);
            for face in &faces {
                annotate::annotate(&mut frame, face);
                summary.record(face);
            }
            summary.frames += 1;

            if let Err(e) = sink.render(&frame, &faces) {
                tracing::warn!(error = %e, frame = summary.frames, "failed to render frame");
            }

            if sink.should_stop() {
                tracing::info!("live loop cancelled");
                summary.cancelled = true;
                break;
            }
        }

        tracing::info!(
            frames = summary.frames,
            faces = summary.faces,
            matched = summary.matched,
            unknown = summary.unknown,
            low_confidence = summary.low_confidence,
            failed = summary.failed,
            "live loop finished"
        );
        summary
    }

    /// Detect and classify every face in one frame, each independently.
    pub fn classify_frame(&mut self, frame: &RgbImage) -> Vec<FaceAnnotation> {
        let boxes = match self.analyzer.detect_all(frame) {
            Ok(boxes) => boxes,
            Err(e) => {
                tracing::warn!(error = %e, "detection failed, frame left unannotated");
                return Vec::new();
            }
        };

        boxes
            .into_iter()
            .map(|bbox| {
                let verdict = self.classify_face(frame, &bbox);
                tracing::debug!(
                    x1 = bbox.x1,
                    y1 = bbox.y1,
                    confidence = bbox.confidence,
                    ?verdict,
                    "face"
                );
                FaceAnnotation { bbox, verdict }
            })
            .collect()
    }

    fn classify_face(&mut self, frame: &RgbImage, bbox: &BoundingBox) -> FaceVerdict {
        if bbox.confidence < self.face_gate {
            return FaceVerdict::LowConfidence;
        }

        let Some((x, y, w, h)) = bbox.clip_to(frame.width(), frame.height()) else {
            tracing::debug!(?bbox, "face box lies outside the frame");
            return FaceVerdict::Failed;
        };
        let crop = imageops::crop_imm(frame, x, y, w, h).to_image();

        match self.analyzer.embed_crop(&crop) {
            Ok(embedding) => FaceVerdict::Classified(self.matcher.predict(&embedding, self.bank)),
            Err(e) => {
                tracing::warn!(error = %e, "embedding failed for face");
                FaceVerdict::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::fake::{self, FakeAnalyzer};
    use crate::bank::LabelMap;
    use crate::matcher::{Identity, PrototypeMatcher};
    use crate::types::Embedding;
    use image::Rgb;
    use std::collections::VecDeque;

    struct QueueSource(VecDeque<RgbImage>);

    impl FrameSource for QueueSource {
        fn next_frame(&mut self) -> Option<RgbImage> {
            self.0.pop_front()
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<Vec<FaceVerdict>>,
        stop_after: Option<usize>,
        fail_render: bool,
    }

    impl FrameSink for RecordingSink {
        fn render(&mut self, _frame: &RgbImage, faces: &[FaceAnnotation]) -> Result<(), SinkError> {
            self.frames.push(faces.iter().map(|f| f.verdict.clone()).collect());
            if self.fail_render {
                return Err("display went away".into());
            }
            Ok(())
        }

        fn should_stop(&mut self) -> bool {
            self.stop_after.is_some_and(|n| self.frames.len() >= n)
        }
    }

    /// A frame with one 8-pixel face band per entry.
    fn frame(bands: &[Rgb<u8>]) -> RgbImage {
        let mut image = RgbImage::new(8 * bands.len() as u32, 8);
        for (i, px) in bands.iter().enumerate() {
            for y in 0..8 {
                for x in 0..8 {
                    image.put_pixel(i as u32 * 8 + x, y, *px);
                }
            }
        }
        image
    }

    fn bank() -> PrototypeBank {
        let mut examples = LabelMap::new();
        examples.insert("alice".into(), vec![Embedding::new(vec![200.0, 10.0])]).unwrap();
        examples.insert("bob".into(), vec![Embedding::new(vec![10.0, 200.0])]).unwrap();
        PrototypeBank::from_examples(examples).unwrap()
    }

    fn run(frames: Vec<RgbImage>, sink: &mut RecordingSink) -> (LiveSummary, FakeAnalyzer) {
        let bank = bank();
        let matcher = PrototypeMatcher::new(0.8);
        let mut analyzer = FakeAnalyzer::default();
        let summary = LiveLoop {
            analyzer: &mut analyzer,
            matcher: &matcher,
            bank: &bank,
            face_gate: DEFAULT_LIVE_GATE,
        }
        .run(&mut QueueSource(frames.into()), sink);
        (summary, analyzer)
    }

    #[test]
    fn test_faces_classified_independently() {
        let alice = fake::face_pixel(0.99, 200, 12);
        let weak = fake::face_pixel(0.5, 200, 12);
        let stranger = fake::face_pixel(0.9, 100, 100);
        let mut sink = RecordingSink::default();

        let (summary, analyzer) = run(vec![frame(&[alice, weak, stranger])], &mut sink);

        let verdicts = &sink.frames[0];
        assert_eq!(verdicts.len(), 3);
        // Highest detector confidence first.
        assert!(matches!(&verdicts[0], FaceVerdict::Classified(c) if c.identity == Identity::Known("alice".into())));
        assert!(matches!(&verdicts[1], FaceVerdict::Classified(c) if c.identity == Identity::Unknown && c.similarity > 0.7));
        assert_eq!(verdicts[2], FaceVerdict::LowConfidence);

        // The weak face was never embedded.
        assert_eq!(analyzer.embed_calls, 2);
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.unknown, 1);
        assert_eq!(summary.low_confidence, 1);
    }

    #[test]
    fn test_runs_until_stream_ends() {
        let alice = fake::face_pixel(0.99, 200, 12);
        let mut sink = RecordingSink::default();
        let (summary, _) = run(vec![frame(&[alice]); 4], &mut sink);

        assert_eq!(summary.frames, 4);
        assert!(!summary.cancelled);
        assert_eq!(sink.frames.len(), 4);
    }

    #[test]
    fn test_cancellation_checked_after_each_frame() {
        let alice = fake::face_pixel(0.99, 200, 12);
        let mut sink = RecordingSink {
            stop_after: Some(2),
            ..Default::default()
        };
        let (summary, _) = run(vec![frame(&[alice]); 5], &mut sink);

        assert!(summary.cancelled);
        assert_eq!(summary.frames, 2);
        assert_eq!(sink.frames.len(), 2);
    }

    #[test]
    fn test_detection_failure_only_affects_its_frame() {
        let alice = fake::face_pixel(0.99, 200, 12);
        let mut sink = RecordingSink::default();
        let (summary, _) = run(vec![frame(&[fake::BROKEN]), frame(&[alice])], &mut sink);

        assert_eq!(summary.frames, 2);
        assert!(sink.frames[0].is_empty());
        assert_eq!(sink.frames[1].len(), 1);
    }

    #[test]
    fn test_embed_failure_only_affects_its_face() {
        let alice = fake::face_pixel(0.99, 200, 12);
        let bad = fake::face_pixel(0.95, 255, 255);
        let mut sink = RecordingSink::default();
        let (summary, _) = run(vec![frame(&[bad, alice])], &mut sink);

        assert_eq!(sink.frames[0][1], FaceVerdict::Failed);
        assert!(matches!(&sink.frames[0][0], FaceVerdict::Classified(_)));
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.matched, 1);
    }

    #[test]
    fn test_gate_runs_before_embedding() {
        // Would fail to embed, but is under the gate so it is never embedded.
        let weak_bad = fake::face_pixel(0.5, 255, 255);
        let mut sink = RecordingSink::default();
        let (summary, analyzer) = run(vec![frame(&[weak_bad])], &mut sink);

        assert_eq!(sink.frames[0], vec![FaceVerdict::LowConfidence]);
        assert_eq!(analyzer.embed_calls, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.low_confidence, 1);
    }

    #[test]
    fn test_render_failure_does_not_stop_loop() {
        let alice = fake::face_pixel(0.99, 200, 12);
        let mut sink = RecordingSink {
            fail_render: true,
            ..Default::default()
        };
        let (summary, _) = run(vec![frame(&[alice]); 3], &mut sink);
        assert_eq!(summary.frames, 3);
    }

    #[test]
    fn test_no_state_across_frames() {
        let alice = fake::face_pixel(0.99, 200, 12);
        let bob = fake::face_pixel(0.99, 12, 200);
        let mut sink = RecordingSink::default();
        run(vec![frame(&[alice]), frame(&[bob]), frame(&[alice])], &mut sink);

        assert_eq!(sink.frames[0], sink.frames[2]);
        assert!(matches!(&sink.frames[1][0], FaceVerdict::Classified(c) if c.identity == Identity::Known("bob".into())));
    }
}
