use crate::err::SerializationResult;
use crate::fev_parser::ParserSettings;
use crate::model::{Bank, Event, ReverbDefinition, WaveBank};
use crate::property::Property;

use log::{debug, trace};
use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event as XmlEvent};
use std::io::Write;

/// Fixed notation with 6 fractional digits, independent of locale.
pub(crate) fn format_float(value: f32) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value == f32::INFINITY {
        "Infinity".to_owned()
    } else if value == f32::NEG_INFINITY {
        "-Infinity".to_owned()
    } else {
        format!("{value:.6}")
    }
}

/// Adds an attribute, escaping only `<`, `>`, `&` and `"`.
fn push_attribute(element: &mut BytesStart<'_>, key: &str, value: &str) {
    let escaped = partial_escape(value).replace('"', "&quot;");
    element.push_attribute((key.as_bytes(), escaped.as_bytes()));
}

/// Thin adapter over the quick-xml event writer.
///
/// Elements without children or text are always written self-closing.
pub struct XmlOutput<W: Write> {
    writer: Writer<W>,
}

impl<W: Write> XmlOutput<W> {
    pub fn with_writer(target: W, settings: &ParserSettings) -> Self {
        let writer = if settings.should_indent() {
            Writer::new_with_indent(target, b'\t', 1)
        } else {
            Writer::new(target)
        };

        XmlOutput { writer }
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    fn declaration(&mut self) -> SerializationResult<()> {
        self.writer
            .write_event(XmlEvent::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(())
    }

    fn open(&mut self, element: BytesStart<'_>) -> SerializationResult<()> {
        self.writer.write_event(XmlEvent::Start(element))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> SerializationResult<()> {
        self.writer.write_event(XmlEvent::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, element: BytesStart<'_>) -> SerializationResult<()> {
        self.writer.write_event(XmlEvent::Empty(element))?;
        Ok(())
    }

    /// `<name attr..>text</name>`, or `<name attr../>` for empty text.
    fn text_element(&mut self, element: BytesStart<'_>, text: &str) -> SerializationResult<()> {
        if text.is_empty() {
            return self.empty(element);
        }

        let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
        self.open(element)?;
        self.writer
            .write_event(XmlEvent::Text(BytesText::from_escaped(partial_escape(text))))?;
        self.close(&name)
    }

    fn field(&mut self, name: &str, text: &str) -> SerializationResult<()> {
        self.text_element(BytesStart::new(name), text)
    }

    fn float_field(&mut self, name: &str, value: f32) -> SerializationResult<()> {
        self.field(name, &format_float(value))
    }

    fn randomized_field(
        &mut self,
        name: &str,
        randomization: &str,
        text: &str,
    ) -> SerializationResult<()> {
        let mut element = BytesStart::new(name);
        push_attribute(&mut element, "randomization", randomization);
        self.text_element(element, text)
    }

    /// Writes `<name>` and returns `true` when there are children to follow, otherwise writes
    /// `<name/>` and returns `false`.
    fn open_container(&mut self, name: &str, has_children: bool) -> SerializationResult<bool> {
        if has_children {
            self.open(BytesStart::new(name))?;
        } else {
            self.empty(BytesStart::new(name))?;
        }
        Ok(has_children)
    }

    pub fn write_bank(&mut self, bank: &Bank) -> SerializationResult<()> {
        self.declaration()?;

        let mut root = BytesStart::new("fev");
        push_attribute(&mut root, "bankname", bank.bank_name());
        self.open(root)?;

        if self.open_container("wavebanks", !bank.wave_banks().is_empty())? {
            for wave_bank in bank.wave_banks() {
                self.write_wave_bank(wave_bank)?;
            }
            self.close("wavebanks")?;
        }

        if self.open_container("events", !bank.events().is_empty())? {
            for event in bank.events() {
                self.write_event(event)?;
            }
            self.close("events")?;
        }

        if self.open_container("reverbs", !bank.reverb_definitions().is_empty())? {
            for reverb in bank.reverb_definitions() {
                self.write_reverb(reverb)?;
            }
            self.close("reverbs")?;
        }

        self.close("fev")?;
        self.writer.get_mut().flush()?;
        Ok(())
    }

    fn write_wave_bank(&mut self, wave_bank: &WaveBank) -> SerializationResult<()> {
        self.open(BytesStart::new("wavebank"))?;
        self.field("name", &wave_bank.name)?;
        self.field("maxstreams", &wave_bank.max_streams.to_string())?;
        self.field("banktype", wave_bank.streaming_type.as_str())?;
        self.close("wavebank")
    }

    fn write_event(&mut self, event: &Event) -> SerializationResult<()> {
        trace!("Serializing event `{}`", event.name);
        self.open(BytesStart::new("event"))?;

        self.field("name", &event.name)?;
        self.field("mode", event.mode.as_str())?;
        self.field("category", &event.category)?;
        self.randomized_field(
            "volume",
            &format_float(event.volume_randomization),
            &format_float(event.volume),
        )?;
        self.randomized_field(
            "pitch",
            &format_float(event.pitch_randomization),
            &format_float(event.pitch),
        )?;
        self.field("priority", &event.priority.to_string())?;
        self.field("nmaxplaybacks", &event.max_playbacks.to_string())?;
        self.field(
            "maxplaybacksbehaviour",
            &event.max_playbacks_behavior.to_string(),
        )?;
        self.field("rolloff3d", event.rolloff_3d.as_str())?;
        self.float_field("mindistance3d", event.min_distance_3d)?;
        self.float_field("maxdistance3d", event.max_distance_3d)?;
        self.randomized_field(
            "position3d",
            &event.position_randomization_3d.to_string(),
            event.position_3d.as_str(),
        )?;
        self.float_field("coneinsideangle3d", event.cone_inside_angle_3d)?;
        self.float_field("coneoutsideangle3d", event.cone_outside_angle_3d)?;
        self.float_field("outsidevolume3d", event.cone_outside_volume_3d)?;
        self.float_field("dopplerfactor3d", event.doppler_factor_3d)?;
        self.float_field("speakerspread3d", event.speaker_spread_3d)?;
        self.float_field("panlevel3d", event.pan_level_3d)?;

        self.float_field("speakerl2d", event.speaker_2d_l)?;
        self.float_field("speakerc2d", event.speaker_2d_c)?;
        self.float_field("speakerr2d", event.speaker_2d_r)?;
        self.float_field("speakerlr2d", event.speaker_2d_lr)?;
        self.float_field("speakerrr2d", event.speaker_2d_rr)?;
        self.float_field("speakerls2d", event.speaker_2d_ls)?;
        self.float_field("speakerrs2d", event.speaker_2d_rs)?;
        self.float_field("speakerlfe", event.speaker_lfe)?;

        self.float_field("reverbdrylevel", event.reverb_dry_level)?;
        self.float_field("reverbwetlevel", event.reverb_wet_level)?;
        self.field("fadeintime", &event.fade_in_time.to_string())?;
        self.field("fadeouttime", &event.fade_out_time.to_string())?;
        self.randomized_field(
            "spawnintensity",
            &format_float(event.spawn_intensity_randomization),
            &format_float(event.spawn_intensity),
        )?;

        if self.open_container("userproperties", !event.user_properties.is_empty())? {
            for (name, value) in event.user_properties.iter() {
                let mut element = BytesStart::new("property");
                push_attribute(&mut element, "name", name);
                push_attribute(&mut element, "type", value.property_type().as_str());

                let text = match value {
                    Property::Int(v) => v.to_string(),
                    Property::Float(v) => format_float(*v),
                    Property::String(v) => v.clone(),
                };
                self.text_element(element, &text)?;
            }
            self.close("userproperties")?;
        }

        self.close("event")
    }

    fn write_reverb(&mut self, reverb: &ReverbDefinition) -> SerializationResult<()> {
        self.open(BytesStart::new("reverb"))?;
        self.field("name", &reverb.name)?;
        self.field("room", &reverb.room.to_string())?;
        self.field("roomhf", &reverb.room_hf.to_string())?;
        self.float_field("decaytime", reverb.decay_time)?;
        self.float_field("decayhfratio", reverb.decay_hf_ratio)?;
        self.field("reflections", &reverb.reflections.to_string())?;
        self.float_field("reflectdelay", reverb.reflect_delay)?;
        self.field("reverb", &reverb.reverb.to_string())?;
        self.float_field("reverbdelay", reverb.reverb_delay)?;
        self.float_field("hfreference", reverb.hf_reference)?;
        self.field("roomlf", &reverb.room_lf.to_string())?;
        self.float_field("lfreference", reverb.lf_reference)?;
        self.close("reverb")
    }
}

/// Writes the XML projection of `bank` to `writer`.
///
/// Sound definitions are part of the model but are not projected.
pub fn write_bank_xml<W: Write>(
    bank: &Bank,
    settings: &ParserSettings,
    writer: W,
) -> SerializationResult<()> {
    debug!(
        "Serializing bank `{}` ({} events, {} reverbs)",
        bank.bank_name(),
        bank.events().len(),
        bank.reverb_definitions().len()
    );

    let mut output = XmlOutput::with_writer(writer, settings);
    output.write_bank(bank)
}
