//! Frame player
//!
//! Runs one frame script per step until the movie stops, quits or hits
//! the configured frame cap. A pending jump (GotoFrame and friends) is
//! taken even when the script also stopped playback.

use log::debug;

use super::{Interpreter, RuntimeResult};
use crate::context::Context;
use crate::translator::Program;

/// Why playback ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Stopped with no pending jump
    Stopped,
    /// FSCommand quit
    Quit,
    /// Playhead moved past the last script
    EndOfMovie,
    /// Frame cap reached
    FrameLimit,
}

/// Outcome of a playback run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaySummary {
    /// Frame scripts executed
    pub frames_run: usize,
    /// Zero-based frame the playhead ended on
    pub last_frame: usize,
    pub reason: StopReason,
}

/// Plays a translated program frame by frame
pub struct Player {
    interpreter: Interpreter,
}

impl Player {
    pub fn new(program: Program) -> Self {
        Player {
            interpreter: Interpreter::new(program),
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    /// Install the program and play it
    pub fn play(&self, ctx: &mut Context) -> RuntimeResult<PlaySummary> {
        self.interpreter.install(ctx);
        play_installed(ctx)
    }
}

/// Play whatever scripts are installed in `ctx`
///
/// Also used by generated code, whose `install` loads compiled scripts.
pub fn play_installed(ctx: &mut Context) -> RuntimeResult<PlaySummary> {
    let script_count = ctx.script_count();
    let max_frames = ctx.config().max_frames;
    ctx.timeline.set_total_frames(script_count);

    let mut frames_run = 0;
    let reason = loop {
        if ctx.timeline.quit_requested() {
            break StopReason::Quit;
        }
        if frames_run >= max_frames {
            break StopReason::FrameLimit;
        }
        let frame = ctx.timeline.current_frame();
        if frame >= script_count {
            debug!("no script for frame {}, stopping", frame);
            break StopReason::EndOfMovie;
        }

        debug!("frame {}", frame);
        ctx.run_script(frame)?;
        frames_run += 1;

        if !ctx.timeline.advance() {
            break if ctx.timeline.quit_requested() {
                StopReason::Quit
            } else {
                StopReason::Stopped
            };
        }
    };
    ctx.flush_output()?;

    let summary = PlaySummary {
        frames_run,
        last_frame: ctx.timeline.current_frame(),
        reason,
    };
    debug!("playback ended: {:?}", summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Config, SharedBuffer};
    use crate::translator::Translator;

    fn trace(text: &str) -> Vec<u8> {
        let mut code = vec![0x96];
        code.extend(((text.len() + 2) as u16).to_le_bytes());
        code.push(0);
        code.extend(text.as_bytes());
        code.push(0);
        code.push(0x26);
        code
    }

    fn play(scripts: Vec<Vec<u8>>, config: Config) -> (String, PlaySummary) {
        let program = Translator::new().translate_scripts(&scripts).unwrap();
        let out = SharedBuffer::new();
        let mut ctx = Context::with_output(config, Box::new(out.clone()));
        let summary = Player::new(program).play(&mut ctx).unwrap();
        (out.text(), summary)
    }

    fn script(parts: &[Vec<u8>]) -> Vec<u8> {
        let mut code = parts.concat();
        code.push(0);
        code
    }

    #[test]
    fn test_plays_through_to_the_end() {
        let scripts = vec![script(&[trace("a")]), script(&[trace("b")])];
        let (out, summary) = play(scripts, Config::default());
        assert_eq!(out, "a\nb\n");
        assert_eq!(summary.frames_run, 2);
        assert_eq!(summary.reason, StopReason::EndOfMovie);
    }

    #[test]
    fn test_goto_and_stop_runs_target_frame() {
        // frame 0: gotoAndStop(3); frame 1: trace("skipped"); frame 2: trace("c")
        let goto = vec![0x81, 0x02, 0x00, 0x02, 0x00, 0x07];
        let scripts = vec![script(&[goto]), script(&[trace("skipped")]), script(&[trace("c")])];
        let (out, summary) = play(scripts, Config::default());
        assert_eq!(out, "c\n");
        assert_eq!(summary.reason, StopReason::Stopped);
        assert_eq!(summary.last_frame, 2);
    }

    #[test]
    fn test_quit_and_frame_limit() {
        let mut quit = vec![0x83];
        let payload = b"FSCommand:quit\0\0";
        quit.extend((payload.len() as u16).to_le_bytes());
        quit.extend(payload);
        let scripts = vec![script(&[trace("x"), quit]), script(&[trace("never")])];
        let (out, summary) = play(scripts, Config::default());
        assert_eq!(out, "x\n");
        assert_eq!(summary.reason, StopReason::Quit);

        // gotoAndPlay(1) forever
        let loop_back = vec![0x81, 0x02, 0x00, 0x00, 0x00];
        let config = Config {
            max_frames: 5,
            ..Config::default()
        };
        let (out, summary) = play(vec![script(&[trace("tick"), loop_back])], config);
        assert_eq!(out.lines().count(), 5);
        assert_eq!(summary.reason, StopReason::FrameLimit);
    }
}
