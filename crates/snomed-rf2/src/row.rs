//! RF2 row parsing and unparsing.
//!
//! Rows are tab-delimited; the first line of each file is a header. Core
//! component files have fixed column layouts; reference set files have six
//! header columns followed by pattern-driven dynamic fields.
//!
//! Every parser has an inverse so component records round-trip through
//! their RF2 rendering.

use uuid::Uuid;

use snomed_types::{
    Concept, ConcreteRelationship, ConcreteValue, Description, RefsetField, Relationship, SctId,
};

use crate::error::{Rf2Error, Rf2Result};

/// A reference set row before reification: the six header fields plus the
/// dynamic field vector parsed from the file's `c|i|s` pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct RefsetRow {
    /// Member UUID.
    pub id: Uuid,
    /// Effective date in YYYYMMDD format.
    pub effective_time: u32,
    /// Whether this membership is active.
    pub active: bool,
    /// Module containing this member.
    pub module_id: SctId,
    /// The reference set.
    pub refset_id: SctId,
    /// The referenced component.
    pub referenced_component_id: SctId,
    /// Dynamic fields, one per pattern character.
    pub fields: Vec<RefsetField>,
}

fn columns(line: &str, expected: usize) -> Rf2Result<Vec<&str>> {
    let cols: Vec<&str> = line.trim_end_matches(['\r', '\n']).split('\t').collect();
    if cols.len() != expected {
        return Err(Rf2Error::parse(format!(
            "expected {expected} columns, found {}",
            cols.len()
        )));
    }
    Ok(cols)
}

fn sctid(raw: &str, column: &str) -> Rf2Result<SctId> {
    raw.parse()
        .map_err(|_| Rf2Error::parse(format!("{column} is not an identifier: {raw:?}")))
}

fn date(raw: &str) -> Rf2Result<u32> {
    if raw.len() != 8 {
        return Err(Rf2Error::parse(format!("bad effectiveTime: {raw:?}")));
    }
    raw.parse()
        .map_err(|_| Rf2Error::parse(format!("bad effectiveTime: {raw:?}")))
}

fn boolean(raw: &str) -> Rf2Result<bool> {
    match raw {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(Rf2Error::parse(format!("bad active flag: {other:?}"))),
    }
}

fn bool_str(b: bool) -> &'static str {
    if b {
        "1"
    } else {
        "0"
    }
}

/// Parses a Concept row: `id effectiveTime active moduleId definitionStatusId`.
pub fn parse_concept(line: &str) -> Rf2Result<Concept> {
    let cols = columns(line, 5)?;
    Ok(Concept {
        id: sctid(cols[0], "id")?,
        effective_time: date(cols[1])?,
        active: boolean(cols[2])?,
        module_id: sctid(cols[3], "moduleId")?,
        definition_status_id: sctid(cols[4], "definitionStatusId")?,
    })
}

/// Renders a concept back to its RF2 row.
pub fn unparse_concept(concept: &Concept) -> String {
    format!(
        "{}\t{:08}\t{}\t{}\t{}",
        concept.id,
        concept.effective_time,
        bool_str(concept.active),
        concept.module_id,
        concept.definition_status_id
    )
}

/// Parses a Description or TextDefinition row.
pub fn parse_description(line: &str) -> Rf2Result<Description> {
    let cols = columns(line, 9)?;
    Ok(Description {
        id: sctid(cols[0], "id")?,
        effective_time: date(cols[1])?,
        active: boolean(cols[2])?,
        module_id: sctid(cols[3], "moduleId")?,
        concept_id: sctid(cols[4], "conceptId")?,
        language_code: cols[5].to_string(),
        type_id: sctid(cols[6], "typeId")?,
        term: cols[7].to_string(),
        case_significance_id: sctid(cols[8], "caseSignificanceId")?,
    })
}

/// Renders a description back to its RF2 row.
pub fn unparse_description(description: &Description) -> String {
    format!(
        "{}\t{:08}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        description.id,
        description.effective_time,
        bool_str(description.active),
        description.module_id,
        description.concept_id,
        description.language_code,
        description.type_id,
        description.term,
        description.case_significance_id
    )
}

/// Parses a Relationship (or StatedRelationship) row.
pub fn parse_relationship(line: &str) -> Rf2Result<Relationship> {
    let cols = columns(line, 10)?;
    Ok(Relationship {
        id: sctid(cols[0], "id")?,
        effective_time: date(cols[1])?,
        active: boolean(cols[2])?,
        module_id: sctid(cols[3], "moduleId")?,
        source_id: sctid(cols[4], "sourceId")?,
        destination_id: sctid(cols[5], "destinationId")?,
        relationship_group: cols[6]
            .parse()
            .map_err(|_| Rf2Error::parse(format!("bad relationshipGroup: {:?}", cols[6])))?,
        type_id: sctid(cols[7], "typeId")?,
        characteristic_type_id: sctid(cols[8], "characteristicTypeId")?,
        modifier_id: sctid(cols[9], "modifierId")?,
    })
}

/// Renders a relationship back to its RF2 row.
pub fn unparse_relationship(rel: &Relationship) -> String {
    format!(
        "{}\t{:08}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        rel.id,
        rel.effective_time,
        bool_str(rel.active),
        rel.module_id,
        rel.source_id,
        rel.destination_id,
        rel.relationship_group,
        rel.type_id,
        rel.characteristic_type_id,
        rel.modifier_id
    )
}

/// Parses a RelationshipConcreteValues row. The destination column carries
/// a literal value instead of a concept id.
pub fn parse_concrete_relationship(line: &str) -> Rf2Result<ConcreteRelationship> {
    let cols = columns(line, 10)?;
    let value = ConcreteValue::parse(cols[5])
        .ok_or_else(|| Rf2Error::parse(format!("bad concrete value: {:?}", cols[5])))?;
    Ok(ConcreteRelationship {
        id: sctid(cols[0], "id")?,
        effective_time: date(cols[1])?,
        active: boolean(cols[2])?,
        module_id: sctid(cols[3], "moduleId")?,
        source_id: sctid(cols[4], "sourceId")?,
        value,
        relationship_group: cols[6]
            .parse()
            .map_err(|_| Rf2Error::parse(format!("bad relationshipGroup: {:?}", cols[6])))?,
        type_id: sctid(cols[7], "typeId")?,
        characteristic_type_id: sctid(cols[8], "characteristicTypeId")?,
        modifier_id: sctid(cols[9], "modifierId")?,
    })
}

/// Renders a concrete relationship back to its RF2 row.
pub fn unparse_concrete_relationship(rel: &ConcreteRelationship) -> String {
    format!(
        "{}\t{:08}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
        rel.id,
        rel.effective_time,
        bool_str(rel.active),
        rel.module_id,
        rel.source_id,
        rel.value.unparse(),
        rel.relationship_group,
        rel.type_id,
        rel.characteristic_type_id,
        rel.modifier_id
    )
}

/// Parses a reference set row: six header columns plus one column per
/// pattern character.
pub fn parse_refset_row(line: &str, pattern: &str) -> Rf2Result<RefsetRow> {
    let cols = columns(line, 6 + pattern.len())?;
    let id = Uuid::parse_str(cols[0])
        .map_err(|_| Rf2Error::parse(format!("member id is not a UUID: {:?}", cols[0])))?;

    let mut fields = Vec::with_capacity(pattern.len());
    for (i, kind) in pattern.chars().enumerate() {
        let raw = cols[6 + i];
        let field = match kind {
            'c' => RefsetField::ComponentId(sctid(raw, "refset field")?),
            'i' => RefsetField::Integer(
                raw.parse()
                    .map_err(|_| Rf2Error::parse(format!("refset field is not an integer: {raw:?}")))?,
            ),
            's' => RefsetField::Str(raw.to_string()),
            other => {
                return Err(Rf2Error::parse(format!("bad pattern character: {other:?}")));
            }
        };
        fields.push(field);
    }

    Ok(RefsetRow {
        id,
        effective_time: date(cols[1])?,
        active: boolean(cols[2])?,
        module_id: sctid(cols[3], "moduleId")?,
        refset_id: sctid(cols[4], "refsetId")?,
        referenced_component_id: sctid(cols[5], "referencedComponentId")?,
        fields,
    })
}
