//! RF2 file name classification.
//!
//! Release file names follow the convention
//! `[FileType]_[ContentType]_[ContentSubType]_[CountryNamespace]_[VersionDate].[Extension]`,
//! e.g. `sct2_Concept_Snapshot_INT_20230731.txt` or
//! `der2_cRefset_LanguageSnapshot-en_INT_20230731.txt`.
//!
//! For reference set files, the characters of the ContentType preceding
//! `Refset` form the field pattern: `c` component id, `i` integer, `s`
//! string. The ContentSubType names the member shape and the release type
//! (Full, Snapshot or Delta).

use snomed_types::RefsetKind;

use crate::error::{Rf2Error, Rf2Result};

/// The release flavor named in the ContentSubType field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseType {
    /// Every historical version of every component.
    Full,
    /// The most recent version of every component.
    Snapshot,
    /// Components changed since the previous release.
    Delta,
}

/// What a release file contains, as decoded from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentFile {
    /// `sct2_Concept_*`.
    Concept,
    /// `sct2_Description_*`.
    Description,
    /// `sct2_TextDefinition_*` — same layout as descriptions.
    TextDefinition,
    /// `sct2_Relationship_*` (inferred).
    Relationship,
    /// `sct2_StatedRelationship_*`.
    StatedRelationship,
    /// `sct2_RelationshipConcreteValues_*`.
    ConcreteRelationship,
    /// `sct2_Identifier_*` — recognized and skipped.
    Identifier,
    /// `der2_<pattern>Refset_*`.
    Refset {
        /// The `c|i|s` field pattern.
        pattern: String,
        /// Member shape suggested by the ContentSubType, used when no
        /// refset descriptor is available for a row's refset.
        hint: RefsetKind,
    },
    /// A well-formed RF2 name this server does not ingest.
    Unknown,
}

/// A decoded RF2 file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rf2Filename {
    /// `sct2` for core component files, `der2` for derived (refset) files.
    pub file_type: String,
    /// The raw ContentType field, e.g. `Concept` or `iissscRefset`.
    pub content_type: String,
    /// The raw ContentSubType field, e.g. `Snapshot` or `LanguageSnapshot-en`.
    pub content_subtype: String,
    /// Country or namespace identifier, e.g. `INT`.
    pub country_namespace: String,
    /// Version date as a YYYYMMDD ordinal.
    pub version_date: u32,
    /// Release flavor, when the ContentSubType names one.
    pub release_type: Option<ReleaseType>,
    /// What the file contains.
    pub component: ComponentFile,
}

/// Decodes an RF2 file name.
///
/// # Example
///
/// ```
/// use snomed_rf2::{parse_filename, ComponentFile, ReleaseType};
///
/// let decoded = parse_filename("sct2_Concept_Snapshot_INT_20230731.txt").unwrap();
/// assert_eq!(decoded.component, ComponentFile::Concept);
/// assert_eq!(decoded.release_type, Some(ReleaseType::Snapshot));
/// assert_eq!(decoded.version_date, 20230731);
/// ```
pub fn parse_filename(name: &str) -> Rf2Result<Rf2Filename> {
    let stem = name.strip_suffix(".txt").ok_or_else(|| Rf2Error::Filename(name.to_string()))?;
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() != 5 {
        return Err(Rf2Error::Filename(name.to_string()));
    }

    let version_date: u32 = parts[4]
        .parse()
        .map_err(|_| Rf2Error::Filename(name.to_string()))?;
    if parts[4].len() != 8 {
        return Err(Rf2Error::Filename(name.to_string()));
    }

    let content_type = parts[1].to_string();
    let content_subtype = parts[2].to_string();
    let release_type = release_type_of(&content_subtype);
    let component = component_of(&content_type, &content_subtype);

    Ok(Rf2Filename {
        file_type: parts[0].to_string(),
        content_type,
        content_subtype,
        country_namespace: parts[3].to_string(),
        version_date,
        release_type,
        component,
    })
}

fn release_type_of(content_subtype: &str) -> Option<ReleaseType> {
    if content_subtype.contains("Snapshot") {
        Some(ReleaseType::Snapshot)
    } else if content_subtype.contains("Full") {
        Some(ReleaseType::Full)
    } else if content_subtype.contains("Delta") {
        Some(ReleaseType::Delta)
    } else {
        None
    }
}

fn component_of(content_type: &str, content_subtype: &str) -> ComponentFile {
    match content_type {
        "Concept" => return ComponentFile::Concept,
        "Description" => return ComponentFile::Description,
        "TextDefinition" => return ComponentFile::TextDefinition,
        "Relationship" => return ComponentFile::Relationship,
        "StatedRelationship" => return ComponentFile::StatedRelationship,
        "RelationshipConcreteValues" => return ComponentFile::ConcreteRelationship,
        "Identifier" => return ComponentFile::Identifier,
        _ => {}
    }

    if let Some(pattern) = content_type.strip_suffix("Refset") {
        if pattern.chars().all(|c| matches!(c, 'c' | 'i' | 's')) {
            return ComponentFile::Refset {
                pattern: pattern.to_string(),
                hint: hint_of(content_subtype, pattern),
            };
        }
    }

    ComponentFile::Unknown
}

/// Guesses the member shape from the ContentSubType, falling back to the
/// field pattern. The refset descriptor, when loaded, takes precedence over
/// this hint at reification time.
fn hint_of(content_subtype: &str, pattern: &str) -> RefsetKind {
    if content_subtype.contains("Language") {
        RefsetKind::Language
    } else if content_subtype.contains("Association") {
        RefsetKind::Association
    } else if content_subtype.contains("ExtendedMap") {
        RefsetKind::ExtendedMap
    } else if content_subtype.contains("ComplexMap") {
        RefsetKind::ComplexMap
    } else if content_subtype.contains("SimpleMap") {
        RefsetKind::SimpleMap
    } else if content_subtype.contains("AttributeValue") {
        RefsetKind::AttributeValue
    } else if content_subtype.contains("OWL") || content_subtype.contains("Owl") {
        RefsetKind::OwlExpression
    } else if content_subtype.contains("ModuleDependency") {
        RefsetKind::ModuleDependency
    } else if content_subtype.contains("RefsetDescriptor") {
        RefsetKind::RefsetDescriptor
    } else if pattern.is_empty() {
        RefsetKind::Simple
    } else {
        RefsetKind::Other
    }
}
