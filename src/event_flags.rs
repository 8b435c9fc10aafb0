use crate::err::{DeserializationError, DeserializationResult};
use crate::model::{EventMode, Position3DType, Rolloff3DType};

use bitflags::bitflags;

bitflags! {
    /// The big-endian flag word of an event record.
    ///
    /// Only the bits listed here carry a known meaning, every other bit is retained as-is.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventFlags: u32 {
        const ROLLOFF_CUSTOM = 0x0000_0004;
        const POSITION_HEAD_RELATIVE = 0x0000_0400;
        const ROLLOFF_LOGARITHMIC = 0x0000_1000;
        const ROLLOFF_LINEAR = 0x0000_2000;
        const MODE_2D = 0x0800_0000;
        const MODE_3D = 0x1000_0000;

        const _ = !0;
    }
}

impl EventFlags {
    /// 3D wins over 2D when both bits are set. A word with neither is rejected.
    pub fn mode(self, offset: u64) -> DeserializationResult<EventMode> {
        if self.contains(EventFlags::MODE_3D) {
            Ok(EventMode::ThreeD)
        } else if self.contains(EventFlags::MODE_2D) {
            Ok(EventMode::TwoD)
        } else {
            Err(DeserializationError::InvalidEventMode {
                flags: self.bits(),
                offset,
            })
        }
    }

    pub fn rolloff(self) -> Rolloff3DType {
        if self.contains(EventFlags::ROLLOFF_LOGARITHMIC) {
            Rolloff3DType::Logarithmic
        } else if self.contains(EventFlags::ROLLOFF_LINEAR) {
            Rolloff3DType::Linear
        } else if self.contains(EventFlags::ROLLOFF_CUSTOM) {
            Rolloff3DType::Custom
        } else {
            Rolloff3DType::Unspecified
        }
    }

    pub fn position(self) -> Position3DType {
        if self.contains(EventFlags::POSITION_HEAD_RELATIVE) {
            Position3DType::HeadRelative
        } else {
            Position3DType::WorldRelative
        }
    }
}
