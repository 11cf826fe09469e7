//! Timeline collaborator
//!
//! The script engine never touches the display list. Timeline opcodes
//! update this state: the playhead, the root movie clip property table,
//! drag state, URL requests for the host to act on, and sprite bookkeeping.
//! The frame player reads it back between frames.

use std::rc::Rc;

use log::debug;
use rustc_hash::FxHashMap;

/// URL prefix that routes a GetURL to the host command handler
pub const FSCOMMAND_PREFIX: &[u8] = b"FSCommand:";

/// Movie clip property indices used by GetProperty/SetProperty
pub mod prop {
    pub const X: u32 = 0;
    pub const Y: u32 = 1;
    pub const XSCALE: u32 = 2;
    pub const YSCALE: u32 = 3;
    pub const CURRENT_FRAME: u32 = 4;
    pub const TOTAL_FRAMES: u32 = 5;
    pub const ALPHA: u32 = 6;
    pub const VISIBLE: u32 = 7;
    pub const WIDTH: u32 = 8;
    pub const HEIGHT: u32 = 9;
    pub const ROTATION: u32 = 10;
    pub const TARGET: u32 = 11;
    pub const FRAMES_LOADED: u32 = 12;
    pub const NAME: u32 = 13;
    pub const DROP_TARGET: u32 = 14;
    pub const URL: u32 = 15;
    pub const HIGH_QUALITY: u32 = 16;
    pub const FOCUS_RECT: u32 = 17;
    pub const SOUND_BUF_TIME: u32 = 18;
    pub const QUALITY: u32 = 19;
    pub const XMOUSE: u32 = 20;
    pub const YMOUSE: u32 = 21;
}

/// Value of a movie clip property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Number(f32),
    Text(Rc<[u8]>),
}

/// Geometry and identity of a movie clip
#[derive(Debug, Clone, PartialEq)]
pub struct MovieClip {
    pub x: f32,
    pub y: f32,
    pub xscale: f32,
    pub yscale: f32,
    pub rotation: f32,
    pub alpha: f32,
    pub width: f32,
    pub height: f32,
    pub visible: bool,
    pub name: Rc<[u8]>,
    pub target: Rc<[u8]>,
}

impl Default for MovieClip {
    fn default() -> Self {
        MovieClip {
            x: 0.0,
            y: 0.0,
            xscale: 100.0,
            yscale: 100.0,
            rotation: 0.0,
            alpha: 100.0,
            width: 550.0,
            height: 400.0,
            visible: true,
            name: Rc::from(&b""[..]),
            target: Rc::from(&b""[..]),
        }
    }
}

/// How GetURL2 sends variables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMethod {
    None,
    Get,
    Post,
}

impl SendMethod {
    /// Decode the top two bits of the GetURL2 flags byte
    pub fn from_flags(flags: u8) -> Self {
        match (flags & 0xC0) >> 6 {
            1 => SendMethod::Get,
            2 => SendMethod::Post,
            _ => SendMethod::None,
        }
    }
}

/// A URL load the host should perform
#[derive(Debug, Clone, PartialEq)]
pub struct UrlRequest {
    pub url: Vec<u8>,
    pub target: Vec<u8>,
    pub method: SendMethod,
    pub load_target: bool,
    pub load_variables: bool,
}

/// Active drag
#[derive(Debug, Clone, PartialEq)]
pub struct DragState {
    pub target: Vec<u8>,
    pub lock_center: bool,
    /// left, top, right, bottom
    pub constraint: Option<[f32; 4]>,
}

/// A sprite created by CloneSprite
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteClone {
    pub source: Vec<u8>,
    pub name: Vec<u8>,
    pub depth: i32,
}

/// Playhead and host-facing timeline state
#[derive(Debug)]
pub struct Timeline {
    current_frame: usize,
    next_frame: usize,
    manual_jump: bool,
    playing: bool,
    quit: bool,
    total_frames: usize,
    labels: FxHashMap<Rc<[u8]>, usize>,
    root: MovieClip,
    target: Vec<u8>,
    high_quality: bool,
    drag: Option<DragState>,
    url_requests: Vec<UrlRequest>,
    fs_commands: Vec<(Vec<u8>, Vec<u8>)>,
    clones: Vec<SpriteClone>,
    sounds_stopped: u32,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Timeline {
    /// Timeline with `total_frames` frames, playing from frame 0
    pub fn new(total_frames: usize) -> Self {
        Timeline {
            current_frame: 0,
            next_frame: 0,
            manual_jump: false,
            playing: true,
            quit: false,
            total_frames: total_frames.max(1),
            labels: FxHashMap::default(),
            root: MovieClip::default(),
            target: Vec::new(),
            high_quality: true,
            drag: None,
            url_requests: Vec::new(),
            fs_commands: Vec::new(),
            clones: Vec::new(),
            sounds_stopped: 0,
        }
    }

    /// Zero-based index of the frame being executed
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    #[inline]
    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn set_total_frames(&mut self, total: usize) {
        self.total_frames = total.max(1);
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    #[inline]
    pub fn quit_requested(&self) -> bool {
        self.quit
    }

    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    /// Pending manual jump target, if any
    pub fn pending_jump(&self) -> Option<usize> {
        self.manual_jump.then_some(self.next_frame)
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Schedule a jump to a zero-based frame
    pub fn goto_frame(&mut self, frame: usize) {
        if frame >= self.total_frames {
            debug!("goto frame {} beyond {} frames", frame, self.total_frames);
        }
        self.next_frame = frame;
        self.manual_jump = true;
    }

    pub fn next_frame(&mut self) {
        self.goto_frame(self.current_frame + 1);
        self.playing = false;
    }

    pub fn prev_frame(&mut self) {
        if self.current_frame > 0 {
            self.goto_frame(self.current_frame - 1);
        }
        self.playing = false;
    }

    /// Register a frame label
    pub fn add_label(&mut self, label: &[u8], frame: usize) {
        self.labels.insert(Rc::from(label), frame);
    }

    pub fn label_frame(&self, label: &[u8]) -> Option<usize> {
        self.labels.get(label).copied()
    }

    /// Jump to a labelled frame; returns false for unknown labels
    pub fn goto_label(&mut self, label: &[u8]) -> bool {
        match self.label_frame(label) {
            Some(frame) => {
                self.goto_frame(frame);
                true
            }
            None => {
                debug!("unknown frame label {:?}", String::from_utf8_lossy(label));
                false
            }
        }
    }

    /// Whether a frame has loaded; everything is resident up front
    pub fn frame_loaded(&self, frame: usize) -> bool {
        frame < self.total_frames
    }

    /// Move the playhead after a frame's script ran
    ///
    /// A manual jump wins over natural advance. Returns false when the
    /// movie is stopped with nowhere to go.
    pub fn advance(&mut self) -> bool {
        if self.manual_jump {
            self.current_frame = self.next_frame;
            self.manual_jump = false;
            true
        } else if self.playing {
            self.current_frame += 1;
            true
        } else {
            false
        }
    }

    /// Current SetTarget path (empty = main timeline)
    pub fn target(&self) -> &[u8] {
        &self.target
    }

    pub fn set_target(&mut self, target: &[u8]) {
        self.target = target.to_vec();
    }

    pub fn toggle_quality(&mut self) {
        self.high_quality = !self.high_quality;
    }

    pub fn high_quality(&self) -> bool {
        self.high_quality
    }

    pub fn stop_sounds(&mut self) {
        self.sounds_stopped += 1;
    }

    pub fn sounds_stopped(&self) -> u32 {
        self.sounds_stopped
    }

    /// Handle a GetURL; FSCommands go to the host command list
    pub fn get_url(&mut self, request: UrlRequest) {
        if let Some(command) = request.url.strip_prefix(FSCOMMAND_PREFIX) {
            if command.eq_ignore_ascii_case(b"quit") {
                self.quit = true;
            }
            self.fs_commands.push((command.to_vec(), request.target.clone()));
            return;
        }
        self.url_requests.push(request);
    }

    pub fn url_requests(&self) -> &[UrlRequest] {
        &self.url_requests
    }

    pub fn fs_commands(&self) -> &[(Vec<u8>, Vec<u8>)] {
        &self.fs_commands
    }

    pub fn start_drag(&mut self, drag: DragState) {
        self.drag = Some(drag);
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    pub fn drag(&self) -> Option<&DragState> {
        self.drag.as_ref()
    }

    pub fn clone_sprite(&mut self, clone: SpriteClone) {
        self.clones.retain(|c| c.name != clone.name);
        self.clones.push(clone);
    }

    /// Remove a cloned sprite; returns false if no such clone exists
    pub fn remove_sprite(&mut self, name: &[u8]) -> bool {
        let before = self.clones.len();
        self.clones.retain(|c| c.name != name);
        before != self.clones.len()
    }

    pub fn clones(&self) -> &[SpriteClone] {
        &self.clones
    }

    /// Whether a target path names the root clip
    fn is_root(target: &[u8]) -> bool {
        matches!(target, b"" | b"_root" | b"/" | b"_level0")
    }

    pub fn root(&self) -> &MovieClip {
        &self.root
    }

    /// Read a movie clip property
    ///
    /// Unknown targets report the defaults of an untransformed clip with
    /// no size; unknown indices report 0.
    pub fn get_property(&self, target: &[u8], index: u32) -> PropertyValue {
        let clip = Self::is_root(target).then_some(&self.root);
        let num = |f: fn(&MovieClip) -> f32, fallback: f32| {
            PropertyValue::Number(clip.map_or(fallback, f))
        };

        match index {
            prop::X => num(|c| c.x, 0.0),
            prop::Y => num(|c| c.y, 0.0),
            prop::XSCALE => num(|c| c.xscale, 100.0),
            prop::YSCALE => num(|c| c.yscale, 100.0),
            prop::CURRENT_FRAME => PropertyValue::Number(match clip {
                Some(_) => (self.current_frame + 1) as f32,
                None => 1.0,
            }),
            prop::TOTAL_FRAMES | prop::FRAMES_LOADED => PropertyValue::Number(match clip {
                Some(_) => self.total_frames as f32,
                None => 1.0,
            }),
            prop::ALPHA => num(|c| c.alpha, 100.0),
            prop::VISIBLE => num(|c| if c.visible { 1.0 } else { 0.0 }, 1.0),
            prop::WIDTH => num(|c| c.width, 0.0),
            prop::HEIGHT => num(|c| c.height, 0.0),
            prop::ROTATION => num(|c| c.rotation, 0.0),
            prop::TARGET => PropertyValue::Text(clip.map_or(Rc::from(&b""[..]), |c| c.target.clone())),
            prop::NAME => PropertyValue::Text(clip.map_or(Rc::from(&b""[..]), |c| c.name.clone())),
            prop::HIGH_QUALITY => PropertyValue::Number(if self.high_quality { 1.0 } else { 0.0 }),
            _ => PropertyValue::Number(0.0),
        }
    }

    /// Write a numeric movie clip property; returns false if ignored
    pub fn set_property(&mut self, target: &[u8], index: u32, value: f32) -> bool {
        if !Self::is_root(target) {
            debug!("set property {} on unknown target {:?}", index, String::from_utf8_lossy(target));
            return false;
        }
        let clip = &mut self.root;
        match index {
            prop::X => clip.x = value,
            prop::Y => clip.y = value,
            prop::XSCALE => clip.xscale = value,
            prop::YSCALE => clip.yscale = value,
            prop::ALPHA => clip.alpha = value,
            prop::VISIBLE => clip.visible = value != 0.0,
            prop::WIDTH => clip.width = value,
            prop::HEIGHT => clip.height = value,
            prop::ROTATION => clip.rotation = value,
            prop::HIGH_QUALITY => self.high_quality = value != 0.0,
            _ => {
                debug!("property {} is read-only", index);
                return false;
            }
        }
        true
    }
}
