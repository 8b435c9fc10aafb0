//! The in-memory model of a decoded FEV bank.
//!
//! Everything here is owned by the [`Bank`] that produced it. Floating point values mostly
//! represent a `0.0..=1.0` range which FMOD maps to different decibel values; no conversion is
//! applied at decode time.

use crate::guid::Guid;
use crate::property::PropertyMap;

/// If an event is 2D or 3D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventMode {
    TwoD,
    ThreeD,
}

impl EventMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EventMode::TwoD => "2D",
            EventMode::ThreeD => "3D",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rolloff3DType {
    Logarithmic,
    Linear,
    Custom,
    Unspecified,
}

impl Rolloff3DType {
    pub fn as_str(self) -> &'static str {
        match self {
            Rolloff3DType::Logarithmic => "Logarithmic",
            Rolloff3DType::Linear => "Linear",
            Rolloff3DType::Custom => "Custom",
            Rolloff3DType::Unspecified => "Unspecified",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position3DType {
    WorldRelative,
    HeadRelative,
}

impl Position3DType {
    pub fn as_str(self) -> &'static str {
        match self {
            Position3DType::WorldRelative => "WorldRelative",
            Position3DType::HeadRelative => "HeadRelative",
        }
    }
}

/// How the sounds of a wave bank are loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamingType {
    DecompressIntoMemory,
    LoadIntoMemory,
    StreamFromDisk,
}

impl StreamingType {
    /// Unrecognized codes fall back to `DecompressIntoMemory`.
    pub fn from_code(code: u32) -> Self {
        match code {
            0x0001_0000 => StreamingType::DecompressIntoMemory,
            0x0002_0000 => StreamingType::LoadIntoMemory,
            0x0B00_0000 => StreamingType::StreamFromDisk,
            _ => StreamingType::DecompressIntoMemory,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StreamingType::DecompressIntoMemory => "DecompressIntoMemory",
            StreamingType::LoadIntoMemory => "LoadIntoMemory",
            StreamingType::StreamFromDisk => "StreamFromDisk",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayMode {
    Sequential,
    Random,
    RandomNoRepeat,
    SequentialNoRepeat,
    Shuffle,
    ProgrammerSelected,
    /// A code outside the known range, kept verbatim.
    Unknown(u32),
}

impl PlayMode {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => PlayMode::Sequential,
            1 => PlayMode::Random,
            2 => PlayMode::RandomNoRepeat,
            3 => PlayMode::SequentialNoRepeat,
            4 => PlayMode::Shuffle,
            5 => PlayMode::ProgrammerSelected,
            other => PlayMode::Unknown(other),
        }
    }
}

/// Reference to an external wave bank.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveBank {
    pub name: String,
    pub max_streams: u32,
    pub streaming_type: StreamingType,
    /// The 8 opaque bytes stored between the stream count and the name.
    pub reserved: [u8; 8],
}

/// A mixing category, organized hierarchically.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Category {
    pub name: String,
    pub volume: u32,
    pub pitch: u32,
    pub subcategories: Vec<Category>,
}

impl Category {
    /// Iterate this category and all of its descendants, depth-first, parents first.
    pub fn iter(&self) -> CategoryIter<'_> {
        CategoryIter { stack: vec![self] }
    }
}

pub struct CategoryIter<'a> {
    stack: Vec<&'a Category>,
}

impl<'a> Iterator for CategoryIter<'a> {
    type Item = &'a Category;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.subcategories.iter().rev());
        Some(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventLayer {
    pub priority: i16,
}

/// An FMOD event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub type_id: u32,
    pub name: String,
    pub guid: Guid,
    pub volume: f32,
    pub pitch: f32,
    pub pitch_randomization: f32,
    pub volume_randomization: f32,
    pub priority: u32,
    pub max_playbacks: u32,
    pub flags: crate::event_flags::EventFlags,
    pub mode: EventMode,
    pub rolloff_3d: Rolloff3DType,
    pub position_3d: Position3DType,
    pub min_distance_3d: f32,
    pub max_distance_3d: f32,
    pub speaker_2d_l: f32,
    pub speaker_2d_r: f32,
    pub speaker_2d_c: f32,
    pub speaker_lfe: f32,
    pub speaker_2d_lr: f32,
    pub speaker_2d_rr: f32,
    pub speaker_2d_ls: f32,
    pub speaker_2d_rs: f32,
    pub cone_inside_angle_3d: f32,
    pub cone_outside_angle_3d: f32,
    /// `[0, 1]` maps to `[0, -1024]` dB.
    pub cone_outside_volume_3d: f32,
    pub max_playbacks_behavior: u32,
    pub doppler_factor_3d: f32,
    pub reverb_dry_level: f32,
    pub reverb_wet_level: f32,
    pub speaker_spread_3d: f32,
    pub fade_in_time: u32,
    pub fade_out_time: u32,
    pub spawn_intensity: f32,
    pub spawn_intensity_randomization: f32,
    pub pan_level_3d: f32,
    pub position_randomization_3d: u32,
    pub layers: Vec<EventLayer>,
    pub user_properties: PropertyMap,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SoundDefinition {
    pub play_mode: PlayMode,
    /// Empty while the definition is still an unnamed template.
    pub name: String,
    pub spawn_time_min: u32,
    pub spawn_time_max: u32,
    pub maximum_spawned_sounds: u32,
    pub volume: f32,
    pub volume_randomization: f32,
    pub pitch: f32,
    pub pitch_randomization: f32,
    pub position_3d_randomization: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReverbDefinition {
    pub name: String,
    pub room: i32,
    pub room_hf: i32,
    pub room_rolloff: f32,
    pub decay_time: f32,
    pub decay_hf_ratio: f32,
    pub reflections: i32,
    pub reflect_delay: f32,
    pub reverb: i32,
    pub reverb_delay: f32,
    pub diffusion: f32,
    pub density: f32,
    pub hf_reference: f32,
    pub room_lf: i32,
    pub lf_reference: f32,
}

/// A fully decoded FEV bank.
///
/// A bank is only ever produced by a successful decode and cannot be modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Bank {
    pub(crate) bank_name: String,
    pub(crate) wave_banks: Vec<WaveBank>,
    pub(crate) categories: Vec<Category>,
    pub(crate) events: Vec<Event>,
    pub(crate) sound_definitions: Vec<SoundDefinition>,
    pub(crate) reverb_definitions: Vec<ReverbDefinition>,
}

impl Bank {
    pub fn bank_name(&self) -> &str {
        &self.bank_name
    }

    pub fn wave_banks(&self) -> &[WaveBank] {
        &self.wave_banks
    }

    /// Root categories only, nested categories are reachable through their parents.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Every category of the tree, depth-first, parents before their children.
    pub fn all_categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter().flat_map(Category::iter)
    }

    /// Events of every event category, in decode order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn sound_definitions(&self) -> &[SoundDefinition] {
        &self.sound_definitions
    }

    pub fn reverb_definitions(&self) -> &[ReverbDefinition] {
        &self.reverb_definitions
    }

    pub fn find_event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name == name)
    }

    pub fn sound_definition(&self, name: &str) -> Option<&SoundDefinition> {
        self.sound_definitions.iter().find(|d| d.name == name)
    }
}
