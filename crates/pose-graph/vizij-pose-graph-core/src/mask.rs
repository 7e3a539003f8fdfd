//! Body masks: which skeletal regions a masked layer may affect.

use serde::{Deserialize, Serialize};

/// Humanoid body regions a mask can enable or disable.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyPart {
    Root,
    Body,
    Head,
    LeftLeg,
    RightLeg,
    LeftArm,
    RightArm,
    LeftFingers,
    RightFingers,
    LeftFootIk,
    RightFootIk,
    LeftHandIk,
    RightHandIk,
}

impl BodyPart {
    pub const COUNT: usize = 13;

    /// Every region, in declaration order.
    pub const ALL: [BodyPart; BodyPart::COUNT] = [
        BodyPart::Root,
        BodyPart::Body,
        BodyPart::Head,
        BodyPart::LeftLeg,
        BodyPart::RightLeg,
        BodyPart::LeftArm,
        BodyPart::RightArm,
        BodyPart::LeftFingers,
        BodyPart::RightFingers,
        BodyPart::LeftFootIk,
        BodyPart::RightFootIk,
        BodyPart::LeftHandIk,
        BodyPart::RightHandIk,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Body => "body",
            Self::Head => "head",
            Self::LeftLeg => "leftLeg",
            Self::RightLeg => "rightLeg",
            Self::LeftArm => "leftArm",
            Self::RightArm => "rightArm",
            Self::LeftFingers => "leftFingers",
            Self::RightFingers => "rightFingers",
            Self::LeftFootIk => "leftFootIk",
            Self::RightFootIk => "rightFootIk",
            Self::LeftHandIk => "leftHandIk",
            Self::RightHandIk => "rightHandIk",
        }
    }
}

/// A transform path inside the rig and whether the mask lets it through.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskTransform {
    pub path: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Named set of affected regions and transforms.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyMask {
    pub name: String,
    #[serde(default)]
    pub transforms: Vec<MaskTransform>,
    /// Active flag per [`BodyPart`], indexed by [`BodyPart::index`].
    #[serde(default = "all_parts_active")]
    pub parts: [bool; BodyPart::COUNT],
}

fn all_parts_active() -> [bool; BodyPart::COUNT] {
    [true; BodyPart::COUNT]
}

impl BodyMask {
    /// Mask that lets every region through.
    pub fn full(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transforms: Vec::new(),
            parts: all_parts_active(),
        }
    }

    /// Mask that blocks every region; enable parts with [`BodyMask::with_part`].
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transforms: Vec::new(),
            parts: [false; BodyPart::COUNT],
        }
    }

    pub fn with_part(mut self, part: BodyPart, active: bool) -> Self {
        self.parts[part.index()] = active;
        self
    }

    pub fn with_transform(mut self, path: impl Into<String>, active: bool) -> Self {
        self.transforms.push(MaskTransform {
            path: path.into(),
            active,
        });
        self
    }

    #[inline]
    pub fn is_active(&self, part: BodyPart) -> bool {
        self.parts[part.index()]
    }

    /// Iterate enabled regions in declaration order.
    pub fn active_parts(&self) -> impl Iterator<Item = BodyPart> + '_ {
        BodyPart::ALL.into_iter().filter(|p| self.is_active(*p))
    }
}
