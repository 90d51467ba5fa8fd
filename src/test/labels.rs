use crate::{
    contract::{Feature, Marker, Tag},
    tree::EntityClass,
};

pub const PARSED: Tag = Tag::new("Parsed");
pub const MARKED: Tag = Tag::new("Marked");
pub const SHRUNK: Tag = Tag::new("Shrunk");
pub const EMITTED: Tag = Tag::new("Emitted");
pub const FOLDED: Tag = Tag::new("Folded");

pub const INLINED: Marker =
    Marker::new("Inlined", EntityClass::METHOD.union(EntityClass::TYPE));

pub const SHRINK: Feature = Feature::new("Shrink");
