//! Core SNOMED CT component records.
//!
//! These structs mirror the column layouts of the RF2 Concept, Description
//! and Relationship snapshot files. Effective times are YYYYMMDD ordinals
//! stored as `u32`.

use serde::{Deserialize, Serialize};

use crate::{well_known, SctId};

/// A SNOMED CT concept from an RF2 Concept file.
///
/// # Examples
///
/// ```
/// use snomed_types::{Concept, well_known};
///
/// let concept = Concept {
///     id: 73211009,
///     effective_time: 20020131,
///     active: true,
///     module_id: well_known::CORE_MODULE,
///     definition_status_id: well_known::PRIMITIVE,
/// };
///
/// assert!(concept.is_primitive());
/// assert!(!concept.is_fully_defined());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    /// Unique identifier for this concept (SCTID).
    pub id: SctId,
    /// Effective date in YYYYMMDD format.
    pub effective_time: u32,
    /// Whether this concept is active.
    pub active: bool,
    /// The module containing this concept.
    pub module_id: SctId,
    /// Whether this concept is primitive or fully defined.
    pub definition_status_id: SctId,
}

impl Concept {
    /// Returns true if this concept is primitively defined.
    pub fn is_primitive(&self) -> bool {
        self.definition_status_id == well_known::PRIMITIVE
    }

    /// Returns true if this concept is fully defined.
    pub fn is_fully_defined(&self) -> bool {
        self.definition_status_id == well_known::FULLY_DEFINED
    }
}

/// A SNOMED CT description from an RF2 Description or TextDefinition file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Description {
    /// Unique identifier for this description (SCTID).
    pub id: SctId,
    /// Effective date in YYYYMMDD format.
    pub effective_time: u32,
    /// Whether this description is active.
    pub active: bool,
    /// The module containing this description.
    pub module_id: SctId,
    /// The concept this description belongs to.
    pub concept_id: SctId,
    /// ISO 639 language code (e.g., "en").
    pub language_code: String,
    /// Type of description (FSN, Synonym, Definition).
    pub type_id: SctId,
    /// The description text.
    pub term: String,
    /// Case significance rules for this term.
    pub case_significance_id: SctId,
}

impl Description {
    /// Returns true if this is a Fully Specified Name.
    pub fn is_fsn(&self) -> bool {
        self.type_id == well_known::FULLY_SPECIFIED_NAME
    }

    /// Returns true if this is a Synonym.
    pub fn is_synonym(&self) -> bool {
        self.type_id == well_known::SYNONYM
    }

    /// Returns the term folded according to its case significance.
    ///
    /// - initial character case-insensitive: lowercase the first code point
    /// - entire term case-insensitive: lowercase the whole term
    /// - case-sensitive: unchanged
    ///
    /// # Examples
    ///
    /// ```
    /// use snomed_types::{Description, well_known};
    ///
    /// let mut d = Description {
    ///     id: 1223979019,
    ///     effective_time: 20020131,
    ///     active: true,
    ///     module_id: well_known::CORE_MODULE,
    ///     concept_id: 73211009,
    ///     language_code: "en".into(),
    ///     type_id: well_known::SYNONYM,
    ///     term: "Diabetes".into(),
    ///     case_significance_id: well_known::INITIAL_CHARACTER_CASE_INSENSITIVE,
    /// };
    /// assert_eq!(d.lowercase_term(), "diabetes");
    ///
    /// d.case_significance_id = well_known::CASE_SENSITIVE;
    /// assert_eq!(d.lowercase_term(), "Diabetes");
    /// ```
    pub fn lowercase_term(&self) -> String {
        match self.case_significance_id {
            well_known::ENTIRE_TERM_CASE_INSENSITIVE => self.term.to_lowercase(),
            well_known::INITIAL_CHARACTER_CASE_INSENSITIVE => {
                let mut chars = self.term.chars();
                match chars.next() {
                    Some(first) => {
                        first.to_lowercase().chain(chars).collect()
                    }
                    None => String::new(),
                }
            }
            _ => self.term.clone(),
        }
    }
}

/// A SNOMED CT relationship from an RF2 Relationship file.
///
/// The destination is another concept; relationships with literal
/// destinations are [`ConcreteRelationship`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique identifier for this relationship (SCTID).
    pub id: SctId,
    /// Effective date in YYYYMMDD format.
    pub effective_time: u32,
    /// Whether this relationship is active.
    pub active: bool,
    /// The module containing this relationship.
    pub module_id: SctId,
    /// The source concept.
    pub source_id: SctId,
    /// The destination concept.
    pub destination_id: SctId,
    /// Relationship group number (0 = ungrouped).
    pub relationship_group: u32,
    /// The relationship type (attribute).
    pub type_id: SctId,
    /// Stated or inferred.
    pub characteristic_type_id: SctId,
    /// Modifier (existential/universal).
    pub modifier_id: SctId,
}

impl Relationship {
    /// Returns true if this is an IS-A (subsumption) relationship.
    pub fn is_is_a(&self) -> bool {
        self.type_id == well_known::IS_A
    }

    /// Returns true if this relationship is inferred rather than stated.
    pub fn is_inferred(&self) -> bool {
        self.characteristic_type_id == well_known::INFERRED_RELATIONSHIP
    }
}

/// A concrete (literal-valued) relationship from an RF2
/// RelationshipConcreteValues file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcreteRelationship {
    /// Unique identifier for this relationship (SCTID).
    pub id: SctId,
    /// Effective date in YYYYMMDD format.
    pub effective_time: u32,
    /// Whether this relationship is active.
    pub active: bool,
    /// The module containing this relationship.
    pub module_id: SctId,
    /// The source concept.
    pub source_id: SctId,
    /// The literal value, decoded from its RF2 rendering.
    pub value: ConcreteValue,
    /// Relationship group number (0 = ungrouped).
    pub relationship_group: u32,
    /// The relationship type (attribute).
    pub type_id: SctId,
    /// Stated or inferred.
    pub characteristic_type_id: SctId,
    /// Modifier (existential/universal).
    pub modifier_id: SctId,
}

/// A concrete value, decoded from its RF2 string form.
///
/// The first character of the raw value encodes the type: `#` introduces a
/// number, `"` a quoted string, anything else a boolean or other literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConcreteValue {
    /// A numeric value, e.g. `#500` or `#0.5`.
    Decimal(f64),
    /// A string value, e.g. `"tablet"`.
    String(String),
    /// A boolean value, e.g. `true`.
    Boolean(bool),
}

impl ConcreteValue {
    /// Decodes an RF2 concrete value.
    ///
    /// # Examples
    ///
    /// ```
    /// use snomed_types::ConcreteValue;
    ///
    /// assert_eq!(ConcreteValue::parse("#500"), Some(ConcreteValue::Decimal(500.0)));
    /// assert_eq!(
    ///     ConcreteValue::parse("\"tablet\""),
    ///     Some(ConcreteValue::String("tablet".into()))
    /// );
    /// assert_eq!(ConcreteValue::parse("true"), Some(ConcreteValue::Boolean(true)));
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some(number) = raw.strip_prefix('#') {
            return number.parse::<f64>().ok().map(ConcreteValue::Decimal);
        }
        if raw.starts_with('"') {
            let stripped = raw.trim_matches('"');
            return Some(ConcreteValue::String(stripped.to_string()));
        }
        match raw {
            "true" => Some(ConcreteValue::Boolean(true)),
            "false" => Some(ConcreteValue::Boolean(false)),
            _ => None,
        }
    }

    /// Renders the value back to its RF2 string form.
    pub fn unparse(&self) -> String {
        match self {
            ConcreteValue::Decimal(n) => {
                if n.fract() == 0.0 {
                    format!("#{}", *n as i64)
                } else {
                    format!("#{n}")
                }
            }
            ConcreteValue::String(s) => format!("\"{s}\""),
            ConcreteValue::Boolean(b) => b.to_string(),
        }
    }

    /// Returns the numeric value, if any.
    pub fn as_decimal(&self) -> Option<f64> {
        match self {
            ConcreteValue::Decimal(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the string value, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConcreteValue::String(s) => Some(s),
            _ => None,
        }
    }
}
