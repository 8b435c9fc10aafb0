//! Decoding of the FEV1 bank layout.
//!
//! The layout is a fixed sequence of sections, most of them count-prefixed:
//!
//! 1. header (`FEV1` magic, reserved block, bank name), see [`FevFileHeader`]
//! 2. wave banks
//! 3. a single root mixing category, with nested subcategories
//! 4. event category groups, each a tree whose nodes own events
//! 5. sound definition templates (unnamed)
//! 6. sound definitions, each a name plus an index into the templates
//! 7. reverb definitions
//!
//! Both trees are walked with an explicit stack, so hostile nesting depth cannot exhaust the
//! call stack. Node order is the same as a recursive descent: a node's subcategories are fully
//! decoded before its own events.

use crate::err::{DeserializationError, DeserializationResult};
use crate::event_flags::EventFlags;
use crate::fev_file_header::FevFileHeader;
use crate::fev_parser::ParserSettings;
use crate::guid::Guid;
use crate::model::{
    Bank, Category, Event, EventLayer, PlayMode, ReverbDefinition, SoundDefinition,
    StreamingType, WaveBank,
};
use crate::property::PropertyMap;
use crate::utils::ByteCursor;

use encoding::EncodingRef;
use log::{debug, trace};

/// Events of this type carry a longer, undocumented block around their user properties.
const EXTENDED_EVENT_TYPE_ID: u32 = 16;

/// Upper bound for preallocations driven by counts read from the input.
const MAX_PREALLOCATED_ITEMS: usize = 1024;

// Smallest encoded size of each counted record, used to bound preallocations by the input size.
const MIN_WAVE_BANK_SIZE: usize = 20;
const MIN_LAYER_SIZE: usize = 10;
const MIN_TEMPLATE_SIZE: usize = 60;
const MIN_SOUND_DEFINITION_SIZE: usize = 12;
const MIN_REVERB_SIZE: usize = 100;

/// The kind of tree node reported to a [`NodeObserver`](crate::NodeObserver).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Category,
    EventCategory,
    Event,
}

/// A node visited while decoding, handed to the configured node observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeVisit<'a> {
    pub kind: NodeKind,
    /// `0` for the roots of the category tree and of every event category group.
    pub depth: usize,
    pub name: &'a str,
    /// Offset of the node's first byte in the input.
    pub offset: u64,
}

struct CategoryFrame {
    category: Category,
    remaining_subcategories: u32,
}

/// An event category is only needed to drive the traversal, it is not kept in the bank.
struct EventCategoryFrame {
    name: String,
    remaining_subcategories: u32,
    event_count: u32,
}

pub(crate) struct BankDecoder<'a> {
    cursor: ByteCursor<'a>,
    settings: &'a ParserSettings,
    ansi_codec: EncodingRef,
}

impl<'a> BankDecoder<'a> {
    pub(crate) fn new(data: &'a [u8], settings: &'a ParserSettings) -> Self {
        BankDecoder {
            cursor: ByteCursor::new(data),
            settings,
            ansi_codec: settings.get_ansi_codec(),
        }
    }

    pub(crate) fn decode(mut self) -> DeserializationResult<Bank> {
        let header = FevFileHeader::from_cursor(&mut self.cursor, self.ansi_codec)?;
        debug!("FEV header: {:?}", header);

        let wave_banks = self.read_wave_banks()?;
        let root_category = self.read_category_tree()?;
        let events = self.read_event_category_groups()?;
        let templates = self.read_sound_definition_templates()?;
        let sound_definitions = self.read_sound_definitions(&templates)?;
        let reverb_definitions = self.read_reverb_definitions()?;

        if self.cursor.remaining() > 0 {
            debug!(
                "{} trailing bytes after the reverb definitions were ignored",
                self.cursor.remaining()
            );
        }

        Ok(Bank {
            bank_name: header.bank_name,
            wave_banks,
            categories: vec![root_category],
            events,
            sound_definitions,
            reverb_definitions,
        })
    }

    /// How many of `count` records to preallocate for. Never more than the remaining input
    /// could hold.
    fn capacity_hint(&self, count: u32, min_record_size: usize) -> usize {
        let fits = self.cursor.remaining() / min_record_size;
        (count as usize).min(fits).min(MAX_PREALLOCATED_ITEMS)
    }

    fn visit(&self, kind: NodeKind, depth: usize, name: &str, offset: u64) {
        trace!(
            "Offset `0x{offset:08x} ({offset})` {kind:?} `{name}` at depth {depth}",
        );

        if let Some(observer) = self.settings.get_node_observer() {
            observer(&NodeVisit {
                kind,
                depth,
                name,
                offset,
            });
        }
    }

    fn read_wave_banks(&mut self) -> DeserializationResult<Vec<WaveBank>> {
        let count = self.cursor.u32_named("wave bank count")?;
        debug!(
            "Offset `0x{offset:08x}` reading {count} wave banks",
            offset = self.cursor.position()
        );

        let mut wave_banks = Vec::with_capacity(self.capacity_hint(count, MIN_WAVE_BANK_SIZE));
        for _ in 0..count {
            let streaming_code = self.cursor.u32_named("wave bank streaming type")?;
            let max_streams = self.cursor.u32_named("wave bank max streams")?;
            let reserved = self.cursor.array::<8>("wave bank reserved")?;
            let name = self
                .cursor
                .len_prefixed_string(self.ansi_codec, "wave bank name")?;

            let streaming_type = StreamingType::from_code(streaming_code);
            trace!(
                "Wave bank `{}` streaming code 0x{:08x} -> {:?}",
                name, streaming_code, streaming_type
            );

            wave_banks.push(WaveBank {
                name,
                max_streams,
                streaming_type,
                reserved,
            });
        }

        Ok(wave_banks)
    }

    fn read_category_node(&mut self, depth: usize) -> DeserializationResult<CategoryFrame> {
        let offset = self.cursor.position();
        let name = self
            .cursor
            .len_prefixed_string(self.ansi_codec, "category name")?;
        // Stored as floats, kept as their truncated integer value.
        let volume = self.cursor.f32_named("category volume")? as u32;
        let pitch = self.cursor.f32_named("category pitch")? as u32;
        self.cursor.skip(8, "category reserved")?;
        let remaining_subcategories = self.cursor.u32_named("subcategory count")?;

        self.visit(NodeKind::Category, depth, &name, offset);

        Ok(CategoryFrame {
            category: Category {
                name,
                volume,
                pitch,
                subcategories: Vec::new(),
            },
            remaining_subcategories,
        })
    }

    /// Decodes the root category together with all of its descendants.
    fn read_category_tree(&mut self) -> DeserializationResult<Category> {
        debug!(
            "Offset `0x{offset:08x}` reading category tree",
            offset = self.cursor.position()
        );

        let mut ancestors: Vec<CategoryFrame> = Vec::new();
        let mut current = self.read_category_node(0)?;

        loop {
            if current.remaining_subcategories > 0 {
                current.remaining_subcategories -= 1;
                let child = self.read_category_node(ancestors.len() + 1)?;
                ancestors.push(std::mem::replace(&mut current, child));
                continue;
            }

            match ancestors.pop() {
                Some(mut parent) => {
                    parent.category.subcategories.push(current.category);
                    current = parent;
                }
                None => return Ok(current.category),
            }
        }
    }

    fn read_event_category_node(
        &mut self,
        depth: usize,
    ) -> DeserializationResult<EventCategoryFrame> {
        let offset = self.cursor.position();
        let name = self
            .cursor
            .len_prefixed_string(self.ansi_codec, "event category name")?;
        let properties = PropertyMap::from_cursor(&mut self.cursor, self.ansi_codec)?;
        trace!(
            "Event category `{}` has {} properties (discarded)",
            name,
            properties.len()
        );
        let remaining_subcategories = self.cursor.u32_named("event subcategory count")?;
        let event_count = self.cursor.u32_named("event count")?;

        self.visit(NodeKind::EventCategory, depth, &name, offset);

        Ok(EventCategoryFrame {
            name,
            remaining_subcategories,
            event_count,
        })
    }

    /// Decodes every event category group, returning their events flattened in decode order.
    fn read_event_category_groups(&mut self) -> DeserializationResult<Vec<Event>> {
        let group_count = self.cursor.u32_named("event category group count")?;
        debug!(
            "Offset `0x{offset:08x}` reading {group_count} event category groups",
            offset = self.cursor.position()
        );

        let mut events = Vec::new();
        for _ in 0..group_count {
            let root = self.read_event_category_node(0)?;
            let mut stack = vec![root];

            while let Some(top) = stack.last_mut() {
                if top.remaining_subcategories > 0 {
                    top.remaining_subcategories -= 1;
                    let child = self.read_event_category_node(stack.len())?;
                    stack.push(child);
                    continue;
                }

                if let Some(done) = stack.pop() {
                    trace!(
                        "Event category `{}` owns {} events",
                        done.name, done.event_count
                    );
                    let depth = stack.len() + 1;
                    for _ in 0..done.event_count {
                        events.push(self.read_event(depth)?);
                    }
                }
            }
        }

        debug!("Decoded {} events", events.len());
        Ok(events)
    }

    fn read_event(&mut self, depth: usize) -> DeserializationResult<Event> {
        let offset = self.cursor.position();

        let type_id = self.cursor.u32_named("event type id")?;
        let name = self
            .cursor
            .len_prefixed_string(self.ansi_codec, "event name")?;
        let guid = Guid::from_bytes(self.cursor.array::<16>("event guid")?);

        self.visit(NodeKind::Event, depth, &name, offset);

        let volume = self.cursor.f32_named("event volume")?;
        let pitch = self.cursor.f32_named("event pitch")?;
        let pitch_randomization = self.cursor.f32_named("event pitch randomization")?;
        let volume_randomization = self.cursor.f32_named("event volume randomization")?;
        let priority = self.cursor.u32_named("event priority")?;
        let max_playbacks = self.cursor.u32_named("event max playbacks")?;
        self.cursor.skip(4, "event reserved")?;

        let flags_offset = self.cursor.position();
        let flags = EventFlags::from_bits_retain(self.cursor.u32_be_named("event flags")?);
        let mode = flags.mode(flags_offset)?;
        let rolloff_3d = flags.rolloff();
        let position_3d = flags.position();

        let min_distance_3d = self.cursor.f32_named("event min distance 3d")?;
        let max_distance_3d = self.cursor.f32_named("event max distance 3d")?;
        let speaker_2d_l = self.cursor.f32_named("event speaker l")?;
        let speaker_2d_r = self.cursor.f32_named("event speaker r")?;
        let speaker_2d_c = self.cursor.f32_named("event speaker c")?;
        let speaker_lfe = self.cursor.f32_named("event speaker lfe")?;
        let speaker_2d_lr = self.cursor.f32_named("event speaker lr")?;
        let speaker_2d_rr = self.cursor.f32_named("event speaker rr")?;
        let speaker_2d_ls = self.cursor.f32_named("event speaker ls")?;
        let speaker_2d_rs = self.cursor.f32_named("event speaker rs")?;
        self.cursor.skip(4, "event reserved")?;
        let cone_inside_angle_3d = self.cursor.f32_named("event cone inside angle")?;
        let cone_outside_angle_3d = self.cursor.f32_named("event cone outside angle")?;
        let cone_outside_volume_3d = self.cursor.f32_named("event cone outside volume")?;
        let max_playbacks_behavior = self.cursor.u32_named("event max playbacks behavior")?;
        let doppler_factor_3d = self.cursor.f32_named("event doppler factor")?;
        let reverb_dry_level = self.cursor.f32_named("event reverb dry level")?;
        let reverb_wet_level = self.cursor.f32_named("event reverb wet level")?;
        let speaker_spread_3d = self.cursor.f32_named("event speaker spread")?;
        let fade_in_time = self.cursor.u32_named("event fade in time")?;
        let fade_out_time = self.cursor.u32_named("event fade out time")?;
        let spawn_intensity = self.cursor.f32_named("event spawn intensity")?;
        let spawn_intensity_randomization =
            self.cursor.f32_named("event spawn intensity randomization")?;
        let pan_level_3d = self.cursor.f32_named("event pan level")?;
        let position_randomization_3d = self.cursor.u32_named("event position randomization")?;

        let layer_count = self.cursor.u32_named("event layer count")?;
        let mut layers = Vec::with_capacity(self.capacity_hint(layer_count, MIN_LAYER_SIZE));
        for _ in 0..layer_count {
            self.cursor.skip(2, "event layer reserved")?;
            let priority = self.cursor.i16_named("event layer priority")?;
            self.cursor.skip(6, "event layer reserved")?;
            layers.push(EventLayer { priority });
        }

        // The meaning of these blocks is unknown, their size only depends on the type id.
        let extended = type_id == EXTENDED_EVENT_TYPE_ID;
        self.cursor.skip(
            if extended { 36 } else { 4 },
            "event pre-properties block",
        )?;
        let user_properties = PropertyMap::from_cursor(&mut self.cursor, self.ansi_codec)?;
        self.cursor.skip(
            if extended { 12 } else { 4 },
            "event post-properties block",
        )?;

        let category = self
            .cursor
            .len_prefixed_string(self.ansi_codec, "event category path")?;

        Ok(Event {
            type_id,
            name,
            guid,
            volume,
            pitch,
            pitch_randomization,
            volume_randomization,
            priority,
            max_playbacks,
            flags,
            mode,
            rolloff_3d,
            position_3d,
            min_distance_3d,
            max_distance_3d,
            speaker_2d_l,
            speaker_2d_r,
            speaker_2d_c,
            speaker_lfe,
            speaker_2d_lr,
            speaker_2d_rr,
            speaker_2d_ls,
            speaker_2d_rs,
            cone_inside_angle_3d,
            cone_outside_angle_3d,
            cone_outside_volume_3d,
            max_playbacks_behavior,
            doppler_factor_3d,
            reverb_dry_level,
            reverb_wet_level,
            speaker_spread_3d,
            fade_in_time,
            fade_out_time,
            spawn_intensity,
            spawn_intensity_randomization,
            pan_level_3d,
            position_randomization_3d,
            layers,
            user_properties,
            category,
        })
    }

    fn read_sound_definition_templates(&mut self) -> DeserializationResult<Vec<SoundDefinition>> {
        let count = self.cursor.u32_named("sound definition template count")?;
        debug!(
            "Offset `0x{offset:08x}` reading {count} sound definition templates",
            offset = self.cursor.position()
        );

        let mut templates = Vec::with_capacity(self.capacity_hint(count, MIN_TEMPLATE_SIZE));
        for _ in 0..count {
            let play_mode = PlayMode::from_code(self.cursor.u32_named("template play mode")?);
            let spawn_time_min = self.cursor.u32_named("template spawn time min")?;
            let spawn_time_max = self.cursor.u32_named("template spawn time max")?;
            let maximum_spawned_sounds = self.cursor.u32_named("template max spawned")?;
            let volume = self.cursor.f32_named("template volume")?;
            self.cursor.skip(12, "template reserved")?;
            let volume_randomization = self.cursor.f32_named("template volume randomization")?;
            let pitch = self.cursor.f32_named("template pitch")?;
            self.cursor.skip(12, "template reserved")?;
            let pitch_randomization = self.cursor.f32_named("template pitch randomization")?;
            let position_3d_randomization =
                self.cursor.f32_named("template position randomization")?;

            templates.push(SoundDefinition {
                play_mode,
                name: String::new(),
                spawn_time_min,
                spawn_time_max,
                maximum_spawned_sounds,
                volume,
                volume_randomization,
                pitch,
                pitch_randomization,
                position_3d_randomization,
            });
        }

        Ok(templates)
    }

    fn read_sound_definitions(
        &mut self,
        templates: &[SoundDefinition],
    ) -> DeserializationResult<Vec<SoundDefinition>> {
        let count = self.cursor.u32_named("sound definition count")?;
        debug!(
            "Offset `0x{offset:08x}` reading {count} sound definitions",
            offset = self.cursor.position()
        );

        let mut definitions =
            Vec::with_capacity(self.capacity_hint(count, MIN_SOUND_DEFINITION_SIZE));
        for _ in 0..count {
            let name = self
                .cursor
                .len_prefixed_string(self.ansi_codec, "sound definition name")?;
            self.cursor.skip(4, "sound definition reserved")?;
            let index = self.cursor.u32_named("sound definition template index")?;

            let template = templates.get(index as usize).ok_or_else(|| {
                DeserializationError::TemplateIndexOutOfRange {
                    name: name.clone(),
                    index,
                    count: templates.len(),
                }
            })?;

            definitions.push(SoundDefinition {
                name,
                ..template.clone()
            });
        }

        Ok(definitions)
    }

    fn read_reverb_definitions(&mut self) -> DeserializationResult<Vec<ReverbDefinition>> {
        let count = self.cursor.u32_named("reverb definition count")?;
        debug!(
            "Offset `0x{offset:08x}` reading {count} reverb definitions",
            offset = self.cursor.position()
        );

        let mut reverbs = Vec::with_capacity(self.capacity_hint(count, MIN_REVERB_SIZE));
        for _ in 0..count {
            let reverb = ReverbDefinition {
                name: self
                    .cursor
                    .len_prefixed_string(self.ansi_codec, "reverb name")?,
                room: self.cursor.i32_named("reverb room")?,
                room_hf: self.cursor.i32_named("reverb room hf")?,
                room_rolloff: self.cursor.f32_named("reverb room rolloff")?,
                decay_time: self.cursor.f32_named("reverb decay time")?,
                decay_hf_ratio: self.cursor.f32_named("reverb decay hf ratio")?,
                reflections: self.cursor.i32_named("reverb reflections")?,
                reflect_delay: self.cursor.f32_named("reverb reflect delay")?,
                reverb: self.cursor.i32_named("reverb reverb")?,
                reverb_delay: self.cursor.f32_named("reverb reverb delay")?,
                diffusion: self.cursor.f32_named("reverb diffusion")?,
                density: self.cursor.f32_named("reverb density")?,
                hf_reference: self.cursor.f32_named("reverb hf reference")?,
                room_lf: self.cursor.i32_named("reverb room lf")?,
                lf_reference: self.cursor.f32_named("reverb lf reference")?,
            };
            self.cursor.skip(76, "reverb reserved")?;
            reverbs.push(reverb);
        }

        Ok(reverbs)
    }
}
