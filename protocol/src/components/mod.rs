//! Typed views over decoded section values.
//!
//! Each view is a snapshot converted from a [`FieldValues`](crate::values::FieldValues) tree with
//! `TryFrom`. The tree stays the source of truth; views are rebuilt whenever it changes.

mod assignments;
mod cables;
mod description;
mod labels;
mod load;
mod modules;
mod morphs;
mod note;
mod params;
mod settings;

pub use assignments::{ControlAssignment, GlobalKnob, Knob, KnobTarget};
pub use cables::Cable;
pub use description::{CableColour, PatchSettings, VoiceMode};
pub use labels::{ModuleLabels, MorphLabel};
pub use load::{PatchLoad, SelectedParam};
pub use modules::{ModuleName, UserModule};
pub use morphs::{MorphAssignment, VariationMorphs};
pub use note::{CurrentNote, Note};
pub use params::{ModuleParams, ParamChange};
pub use settings::{PerformanceSettings, SlotSettings, SynthSettings};
