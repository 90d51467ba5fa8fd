//! Granularity levels and the adapters that narrow between them.

use strum::{Display, EnumIter};

use crate::tree::{EntityClass, NodeId, NodeKind, ProgramTree};

/// The kind of entity a schedulable is invoked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum Granularity {
    /// Invoked once for the whole program
    Session,
    /// Invoked once per package
    Package,
    /// Invoked once per class or interface, nested types included
    Type,
    /// Invoked once per method of a type
    Method,
    /// Invoked once per field of a type
    Field,
}

impl Granularity {
    /// The entity class of the nodes this granularity iterates.
    #[must_use]
    pub fn entity_class(&self) -> EntityClass {
        match self {
            Self::Session => EntityClass::PROGRAM,
            Self::Package => EntityClass::PACKAGE,
            Self::Type => EntityClass::TYPE,
            Self::Method => EntityClass::METHOD,
            Self::Field => EntityClass::FIELD,
        }
    }

    /// Adapter chain narrowing from `self` to `target`.
    ///
    /// Returns an empty chain for `self == target` and `None` if `target` is not finer
    /// than `self` (e.g. from methods back to types, or from fields to methods).
    #[must_use]
    pub fn path_to(&self, target: Granularity) -> Option<Vec<Adapter>> {
        use Adapter::*;
        use Granularity::*;

        let path: &[Adapter] = match (self, target) {
            (a, b) if *a == b => &[],
            (Session, Package) => &[SessionToPackage],
            (Session, Type) => &[SessionToType],
            (Session, Method) => &[SessionToType, TypeToMethod],
            (Session, Field) => &[SessionToType, TypeToField],
            (Package, Type) => &[PackageToType],
            (Package, Method) => &[PackageToType, TypeToMethod],
            (Package, Field) => &[PackageToType, TypeToField],
            (Type, Method) => &[TypeToMethod],
            (Type, Field) => &[TypeToField],
            _ => return None,
        };
        Some(path.to_vec())
    }

    /// Returns `true` if schedulables of `target` can be reached from `self`.
    #[must_use]
    pub fn reaches(&self, target: Granularity) -> bool {
        self.path_to(target).is_some()
    }
}

/// Narrows an entity to the collection of finer entities a sub-plan iterates.
///
/// Collections are derived from the live tree every time they are requested, so entities
/// added by an earlier step of the same sub-plan are picked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Adapter {
    /// Every package of the program
    SessionToPackage,
    /// Every type of the program, nested types included
    SessionToType,
    /// Every type of a package, nested types included
    PackageToType,
    /// The methods declared directly in a type
    TypeToMethod,
    /// The fields declared directly in a type
    TypeToField,
}

impl Adapter {
    /// Granularity of the entity the adapter starts from
    #[must_use]
    pub fn source(&self) -> Granularity {
        match self {
            Self::SessionToPackage | Self::SessionToType => Granularity::Session,
            Self::PackageToType => Granularity::Package,
            Self::TypeToMethod | Self::TypeToField => Granularity::Type,
        }
    }

    /// Granularity of the entities the adapter yields
    #[must_use]
    pub fn target(&self) -> Granularity {
        match self {
            Self::SessionToPackage => Granularity::Package,
            Self::SessionToType | Self::PackageToType => Granularity::Type,
            Self::TypeToMethod => Granularity::Method,
            Self::TypeToField => Granularity::Field,
        }
    }

    /// Returns the adapter narrowing `from` to `to` in a single hop, if one exists.
    #[must_use]
    pub fn between(from: Granularity, to: Granularity) -> Option<Adapter> {
        match from.path_to(to)?.as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }

    /// Current live entities below `parent`, in declaration order.
    ///
    /// Stale parents yield an empty collection.
    #[must_use]
    pub fn entities(&self, tree: &ProgramTree, parent: NodeId) -> Vec<NodeId> {
        match self {
            Self::SessionToPackage => descendants_of_kind(tree, parent, |k| {
                matches!(k, NodeKind::Package { .. })
            }),
            Self::SessionToType | Self::PackageToType => {
                descendants_of_kind(tree, parent, |k| matches!(k, NodeKind::Type { .. }))
            }
            Self::TypeToMethod => children_of_kind(tree, parent, |k| {
                matches!(k, NodeKind::Method { .. })
            }),
            Self::TypeToField => {
                children_of_kind(tree, parent, |k| matches!(k, NodeKind::Field { .. }))
            }
        }
    }
}

fn descendants_of_kind(
    tree: &ProgramTree,
    parent: NodeId,
    predicate: impl Fn(&NodeKind) -> bool,
) -> Vec<NodeId> {
    tree.descendants(parent)
        .into_iter()
        .filter(|id| *id != parent)
        .filter(|id| tree.kind(*id).is_some_and(&predicate))
        .collect()
}

fn children_of_kind(
    tree: &ProgramTree,
    parent: NodeId,
    predicate: impl Fn(&NodeKind) -> bool,
) -> Vec<NodeId> {
    tree.children(parent)
        .iter()
        .copied()
        .filter(|id| tree.kind(*id).is_some_and(&predicate))
        .collect()
}
