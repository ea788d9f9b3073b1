use crate::codec;

use serde::Deserialize;

/// The kind of change a stream record describes.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq)]
pub enum ChangeEventType {
    /// A new item was written.
    #[serde(rename = "INSERT")]
    Insert,
    /// An existing item was mutated.
    #[serde(rename = "MODIFY")]
    Modify,
    /// An item was deleted.
    #[serde(rename = "REMOVE")]
    Remove,
}

/// A change-event record as delivered by the store's stream collaborator.
///
/// Images are plain attribute maps: translating the store's wire encoding
/// into them is the stream collaborator's concern, not the engine's.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ChangeRecord {
    /// The kind of change.
    #[serde(rename = "eventType")]
    pub event_type: ChangeEventType,
    /// The item after the change, absent for removals.
    #[serde(default, rename = "newImage")]
    pub new_image: Option<codec::Item>,
    /// The item before the change, absent for inserts.
    #[serde(default, rename = "oldImage")]
    pub old_image: Option<codec::Item>,
}

/// A change record with both images decoded back to logical entities.
///
/// The raw images are preserved alongside: the snapshot writer operates on
/// the raw physical form, while consumers usually want the decoded one.
#[derive(Clone, Debug, PartialEq)]
pub struct UnpackedChangeEvent {
    /// The kind of change.
    pub event_type: ChangeEventType,
    /// The decoded entity after the change.
    pub new_entity: Option<codec::Item>,
    /// The decoded entity before the change.
    pub old_entity: Option<codec::Item>,
    /// The physical item after the change, untouched.
    pub raw_new_image: Option<codec::Item>,
    /// The physical item before the change, untouched.
    pub raw_old_image: Option<codec::Item>,
}
