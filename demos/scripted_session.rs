//! Run a synthetic capture session end to end and print the encoded record

use synheart_face::adapters::blendshape::names;
use synheart_face::adapters::{ActionUnits, FaceClassifier, FrameSource, TimedFrame};
use synheart_face::{
    run_session, CaptureError, MemoryRecordStore, ProtocolConfig, RecordEncoder, Subject,
};

const FRAME_MS: f64 = 1000.0 / 30.0;
const SESSION_MS: f64 = 25_000.0;

/// 30 fps camera whose frames are just their capture time
struct ScriptedCamera {
    next_ms: f64,
    open: bool,
}

impl FrameSource for ScriptedCamera {
    type Frame = f64;

    fn start(&mut self) -> Result<(), CaptureError> {
        self.open = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Option<TimedFrame<f64>> {
        if !self.open || self.next_ms > SESSION_MS {
            return None;
        }
        let at_ms = self.next_ms;
        self.next_ms += FRAME_MS;
        Some(TimedFrame { at_ms, frame: at_ms })
    }

    fn stop(&mut self) {
        self.open = false;
    }
}

/// Pretends to see a subject who smiles slightly lopsided, frowns, and blinks
/// every couple of seconds
struct ScriptedFace;

impl FaceClassifier for ScriptedFace {
    type Frame = f64;

    fn init(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn detect(&mut self, t: &f64, _timestamp_ms: u64) -> Option<ActionUnits> {
        let t = *t;
        let ramp = |start: f64| ((t - start) / 600.0).clamp(0.0, 1.0);
        let (smile, frown) = match t {
            t if (6_500.0..11_000.0).contains(&t) => (0.85 * ramp(6_500.0), 0.05),
            t if (12_800.0..17_000.0).contains(&t) => (0.08, 0.65 * ramp(12_800.0)),
            _ => (0.08, 0.05),
        };
        let blink = if t % 2_300.0 < 90.0 { 0.9 } else { 0.05 };

        Some(
            [
                (names::MOUTH_SMILE_LEFT, smile),
                (names::MOUTH_SMILE_RIGHT, smile * 0.85),
                (names::BROW_DOWN_LEFT, frown),
                (names::BROW_DOWN_RIGHT, frown),
                (names::EYE_BLINK_LEFT, blink),
                (names::EYE_BLINK_RIGHT, blink),
            ]
            .into_iter()
            .collect(),
        )
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let subject = match Subject::new("Demo Subject", 42) {
        Ok(subject) => subject,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    let mut camera = ScriptedCamera {
        next_ms: 0.0,
        open: false,
    };
    let mut store = MemoryRecordStore::new();

    match run_session(
        subject,
        &mut camera,
        ScriptedFace,
        &mut store,
        ProtocolConfig::default(),
    ) {
        Ok(outcome) => match RecordEncoder::new().encode_to_json(&outcome.record) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Error: {e:?}"),
        },
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
