//! SNOMED CT reference set member types.
//!
//! Every reference set member shares six header fields; the remaining
//! columns vary per reference set and are described by a pattern string of
//! `c` (component id), `i` (integer) and `s` (string) characters carried in
//! the release file name. [`RefsetBody`] is the closed enum over the member
//! shapes this server understands; unrecognized shapes are retained as
//! [`RefsetBody::Other`] so lenient imports lose nothing.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{well_known, SctId};

/// The six header fields common to every reference set member, plus the
/// shape-specific body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefsetItem {
    /// Unique member identifier (UUID).
    pub id: Uuid,
    /// Effective date in YYYYMMDD format.
    pub effective_time: u32,
    /// Whether this membership is active.
    pub active: bool,
    /// The module containing this member.
    pub module_id: SctId,
    /// The reference set this member belongs to.
    pub refset_id: SctId,
    /// The component this member references (concept or description).
    pub referenced_component_id: SctId,
    /// The shape-specific fields.
    pub body: RefsetBody,
}

/// One dynamic field of a generic reference set row, typed by its pattern
/// character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RefsetField {
    /// A `c` field: a component identifier.
    ComponentId(SctId),
    /// An `i` field: a signed integer.
    Integer(i64),
    /// An `s` field: a string.
    Str(String),
}

impl RefsetField {
    /// Returns the component id, if this is a `c` field.
    pub fn as_component_id(&self) -> Option<SctId> {
        match self {
            RefsetField::ComponentId(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the integer, if this is an `i` field.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RefsetField::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string, if this is an `s` field.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RefsetField::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// The concrete member shapes, keyed by the reference set's
/// attribute-description prefix (or, absent a descriptor, by its pattern
/// string).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefsetKind {
    /// Plain membership, no extra fields.
    Simple,
    /// Historical or other association (`targetComponentId`).
    Association,
    /// Language refset (`acceptabilityId`).
    Language,
    /// Simple map (`mapTarget`).
    SimpleMap,
    /// Complex map (six map fields).
    ComplexMap,
    /// Extended map (complex map plus `mapCategoryId`).
    ExtendedMap,
    /// Attribute value (`valueId`).
    AttributeValue,
    /// OWL axiom or ontology expression (`owlExpression`).
    OwlExpression,
    /// Module dependency (`sourceEffectiveTime`, `targetEffectiveTime`).
    ModuleDependency,
    /// Refset descriptor (`attributeDescriptionId`, `attributeTypeId`,
    /// `attributeOrder`).
    RefsetDescriptor,
    /// Anything else; fields retained generically.
    Other,
}

/// Shape-specific fields of a reference set member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RefsetBody {
    /// Plain membership, no extra fields.
    Simple,
    /// An association member, e.g. a historical REPLACED-BY link.
    Association {
        /// The component the referenced component is associated with.
        target_component_id: SctId,
    },
    /// A language refset member attached to a description.
    Language {
        /// Preferred or Acceptable.
        acceptability_id: SctId,
    },
    /// A simple map member.
    SimpleMap {
        /// The code in the target scheme.
        map_target: String,
    },
    /// A complex map member.
    ComplexMap {
        /// Map group.
        map_group: i64,
        /// Priority within the group.
        map_priority: i64,
        /// Machine-readable rule.
        map_rule: String,
        /// Human advice.
        map_advice: String,
        /// The code in the target scheme.
        map_target: String,
        /// Correlation between source and target.
        correlation_id: SctId,
    },
    /// An extended map member (complex map plus category).
    ExtendedMap {
        /// Map group.
        map_group: i64,
        /// Priority within the group.
        map_priority: i64,
        /// Machine-readable rule.
        map_rule: String,
        /// Human advice.
        map_advice: String,
        /// The code in the target scheme.
        map_target: String,
        /// Correlation between source and target.
        correlation_id: SctId,
        /// Map category.
        map_category_id: SctId,
    },
    /// An attribute-value member, e.g. an inactivation reason.
    AttributeValue {
        /// The value concept.
        value_id: SctId,
    },
    /// An OWL expression member.
    OwlExpression {
        /// OWL functional syntax.
        owl_expression: String,
    },
    /// A module dependency member.
    ModuleDependency {
        /// Source module effective time (YYYYMMDD).
        source_effective_time: u32,
        /// Target module effective time (YYYYMMDD).
        target_effective_time: u32,
    },
    /// A refset descriptor member describing another refset's columns.
    RefsetDescriptor {
        /// The attribute description concept.
        attribute_description_id: SctId,
        /// The attribute type concept.
        attribute_type_id: SctId,
        /// Column order.
        attribute_order: i64,
    },
    /// An unrecognized shape; dynamic fields kept as parsed.
    Other(Vec<RefsetField>),
}

impl RefsetBody {
    /// Returns the kind tag for this body.
    pub fn kind(&self) -> RefsetKind {
        match self {
            RefsetBody::Simple => RefsetKind::Simple,
            RefsetBody::Association { .. } => RefsetKind::Association,
            RefsetBody::Language { .. } => RefsetKind::Language,
            RefsetBody::SimpleMap { .. } => RefsetKind::SimpleMap,
            RefsetBody::ComplexMap { .. } => RefsetKind::ComplexMap,
            RefsetBody::ExtendedMap { .. } => RefsetKind::ExtendedMap,
            RefsetBody::AttributeValue { .. } => RefsetKind::AttributeValue,
            RefsetBody::OwlExpression { .. } => RefsetKind::OwlExpression,
            RefsetBody::ModuleDependency { .. } => RefsetKind::ModuleDependency,
            RefsetBody::RefsetDescriptor { .. } => RefsetKind::RefsetDescriptor,
            RefsetBody::Other(_) => RefsetKind::Other,
        }
    }

    /// Returns the map target, for the map member shapes.
    pub fn map_target(&self) -> Option<&str> {
        match self {
            RefsetBody::SimpleMap { map_target }
            | RefsetBody::ComplexMap { map_target, .. }
            | RefsetBody::ExtendedMap { map_target, .. } => Some(map_target),
            _ => None,
        }
    }
}

impl RefsetItem {
    /// Returns true if this is a language member with Preferred
    /// acceptability.
    pub fn is_preferred(&self) -> bool {
        matches!(
            self.body,
            RefsetBody::Language { acceptability_id } if acceptability_id == well_known::PREFERRED
        )
    }

    /// Returns true if this member belongs to one of the historical
    /// association reference sets.
    pub fn is_historical_association(&self) -> bool {
        matches!(
            self.refset_id,
            well_known::REPLACED_BY
                | well_known::SAME_AS
                | well_known::POSSIBLY_EQUIVALENT_TO
                | well_known::MOVED_TO
        ) && matches!(self.body, RefsetBody::Association { .. })
    }
}

/// Acceptability of a description within a language reference set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Acceptability {
    /// The preferred term for the dialect.
    Preferred,
    /// An acceptable alternative.
    Acceptable,
}

impl Acceptability {
    /// Maps an acceptability concept id to the enum.
    pub fn from_id(id: SctId) -> Option<Self> {
        match id {
            well_known::PREFERRED => Some(Acceptability::Preferred),
            well_known::ACCEPTABLE => Some(Acceptability::Acceptable),
            _ => None,
        }
    }
}
