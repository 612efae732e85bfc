use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;

/// Wire discriminant of an edit
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditType {
    UpdateText = 1,
    PrependFrame = 2,
    RemoveFrame = 3,
    SetAttribute = 4,
    RemoveAttribute = 5,
    UpdateMarkup = 6,
    StepIn = 7,
    StepOut = 8,
    PermutationListEntry = 9,
    PermutationListEnd = 10,
}

impl EditType {
    #[inline]
    pub fn from_i32(val: i32) -> Option<Self> {
        match val {
            1 => Some(Self::UpdateText),
            2 => Some(Self::PrependFrame),
            3 => Some(Self::RemoveFrame),
            4 => Some(Self::SetAttribute),
            5 => Some(Self::RemoveAttribute),
            6 => Some(Self::UpdateMarkup),
            7 => Some(Self::StepIn),
            8 => Some(Self::StepOut),
            9 => Some(Self::PermutationListEntry),
            10 => Some(Self::PermutationListEnd),
            _ => None,
        }
    }
}

/// One operation of an edit script.
///
/// Sibling indices are relative to the current parent, which changes with
/// `StepIn` and `StepOut`. Reference frame indices point into the batch's
/// reference frame array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RenderTreeEdit {
    UpdateText {
        sibling_index: i32,
        reference_frame_index: i32,
    },
    PrependFrame {
        sibling_index: i32,
        reference_frame_index: i32,
    },
    RemoveFrame {
        sibling_index: i32,
    },
    SetAttribute {
        sibling_index: i32,
        reference_frame_index: i32,
    },
    RemoveAttribute {
        sibling_index: i32,
        removed_attribute_name: SmartString,
    },
    UpdateMarkup {
        sibling_index: i32,
        reference_frame_index: i32,
    },
    StepIn {
        sibling_index: i32,
    },
    StepOut,
    PermutationListEntry {
        sibling_index: i32,
        move_to_sibling_index: i32,
    },
    PermutationListEnd,
}

impl RenderTreeEdit {
    pub fn edit_type(&self) -> EditType {
        match self {
            RenderTreeEdit::UpdateText { .. } => EditType::UpdateText,
            RenderTreeEdit::PrependFrame { .. } => EditType::PrependFrame,
            RenderTreeEdit::RemoveFrame { .. } => EditType::RemoveFrame,
            RenderTreeEdit::SetAttribute { .. } => EditType::SetAttribute,
            RenderTreeEdit::RemoveAttribute { .. } => EditType::RemoveAttribute,
            RenderTreeEdit::UpdateMarkup { .. } => EditType::UpdateMarkup,
            RenderTreeEdit::StepIn { .. } => EditType::StepIn,
            RenderTreeEdit::StepOut => EditType::StepOut,
            RenderTreeEdit::PermutationListEntry { .. } => EditType::PermutationListEntry,
            RenderTreeEdit::PermutationListEnd => EditType::PermutationListEnd,
        }
    }

    pub fn sibling_index(&self) -> i32 {
        match self {
            RenderTreeEdit::UpdateText { sibling_index, .. }
            | RenderTreeEdit::PrependFrame { sibling_index, .. }
            | RenderTreeEdit::RemoveFrame { sibling_index }
            | RenderTreeEdit::SetAttribute { sibling_index, .. }
            | RenderTreeEdit::RemoveAttribute { sibling_index, .. }
            | RenderTreeEdit::UpdateMarkup { sibling_index, .. }
            | RenderTreeEdit::StepIn { sibling_index }
            | RenderTreeEdit::PermutationListEntry { sibling_index, .. } => *sibling_index,
            RenderTreeEdit::StepOut | RenderTreeEdit::PermutationListEnd => 0,
        }
    }

    /// Value stored in the shared new-tree-index / move-to slot on the wire
    pub fn reference_frame_index(&self) -> i32 {
        match self {
            RenderTreeEdit::UpdateText {
                reference_frame_index,
                ..
            }
            | RenderTreeEdit::PrependFrame {
                reference_frame_index,
                ..
            }
            | RenderTreeEdit::SetAttribute {
                reference_frame_index,
                ..
            }
            | RenderTreeEdit::UpdateMarkup {
                reference_frame_index,
                ..
            } => *reference_frame_index,
            RenderTreeEdit::PermutationListEntry {
                move_to_sibling_index,
                ..
            } => *move_to_sibling_index,
            _ => 0,
        }
    }

    pub fn removed_attribute_name(&self) -> Option<&str> {
        match self {
            RenderTreeEdit::RemoveAttribute {
                removed_attribute_name,
                ..
            } => Some(removed_attribute_name),
            _ => None,
        }
    }
}
