//! Well-known SNOMED CT identifiers.
//!
//! Constants for the metadata concepts the terminology server dispatches on:
//! description and relationship types, acceptability and case-significance
//! values, historical-association reference sets, and the
//! attribute-description concepts that drive reference-set reification.

use crate::SctId;

// =============================================================================
// Hierarchy
// =============================================================================

/// SNOMED CT root concept (138875005).
pub const ROOT: SctId = 138875005;

/// IS-A relationship type - 116680003.
pub const IS_A: SctId = 116680003;

// =============================================================================
// Description types
// =============================================================================

/// Fully specified name description type - 900000000000003001.
pub const FULLY_SPECIFIED_NAME: SctId = 900000000000003001;

/// Synonym description type - 900000000000013009.
pub const SYNONYM: SctId = 900000000000013009;

/// Definition description type - 900000000000550004.
pub const DEFINITION: SctId = 900000000000550004;

// =============================================================================
// Case significance
// =============================================================================

/// Initial character case-insensitive - 900000000000020002.
pub const INITIAL_CHARACTER_CASE_INSENSITIVE: SctId = 900000000000020002;

/// Entire term case-insensitive - 900000000000448009.
pub const ENTIRE_TERM_CASE_INSENSITIVE: SctId = 900000000000448009;

/// Entire term case-sensitive - 900000000000017005.
pub const CASE_SENSITIVE: SctId = 900000000000017005;

// =============================================================================
// Acceptability
// =============================================================================

/// Preferred acceptability - 900000000000548007.
pub const PREFERRED: SctId = 900000000000548007;

/// Acceptable acceptability - 900000000000549004.
pub const ACCEPTABLE: SctId = 900000000000549004;

// =============================================================================
// Language reference sets
// =============================================================================

/// GB English language reference set - 900000000000508004.
pub const GB_ENGLISH: SctId = 900000000000508004;

/// US English language reference set - 900000000000509007.
pub const US_ENGLISH: SctId = 900000000000509007;

// =============================================================================
// Definition status
// =============================================================================

/// Primitive definition status - 900000000000074008.
pub const PRIMITIVE: SctId = 900000000000074008;

/// Fully defined definition status - 900000000000073002.
pub const FULLY_DEFINED: SctId = 900000000000073002;

// =============================================================================
// Relationship characteristics
// =============================================================================

/// Stated relationship - 900000000000010007.
pub const STATED_RELATIONSHIP: SctId = 900000000000010007;

/// Inferred relationship - 900000000000011006.
pub const INFERRED_RELATIONSHIP: SctId = 900000000000011006;

/// Existential restriction modifier - 900000000000451002.
pub const EXISTENTIAL_MODIFIER: SctId = 900000000000451002;

// =============================================================================
// Historical association reference sets
// =============================================================================

/// REPLACED BY association reference set - 900000000000526001.
pub const REPLACED_BY: SctId = 900000000000526001;

/// SAME AS association reference set - 900000000000527005.
pub const SAME_AS: SctId = 900000000000527005;

/// POSSIBLY EQUIVALENT TO association reference set - 900000000000523009.
pub const POSSIBLY_EQUIVALENT_TO: SctId = 900000000000523009;

/// MOVED TO association reference set - 900000000000524003.
pub const MOVED_TO: SctId = 900000000000524003;

/// CTV3 simple map reference set - 900000000000497000.
pub const CTV3_MAP: SctId = 900000000000497000;

/// Refset descriptor reference set - 900000000000456007.
///
/// Members describe the column layout of other reference sets.
pub const REFSET_DESCRIPTOR_REFSET: SctId = 900000000000456007;

/// Module dependency reference set - 900000000000534007.
pub const MODULE_DEPENDENCY_REFSET: SctId = 900000000000534007;

// =============================================================================
// Modules
// =============================================================================

/// SNOMED CT core module - 900000000000207008.
pub const CORE_MODULE: SctId = 900000000000207008;

/// SNOMED CT model component module - 900000000000012004.
pub const MODEL_MODULE: SctId = 900000000000012004;

// =============================================================================
// Reference set attribute descriptions
// =============================================================================
//
// RefsetDescriptor rows describe the shape of each reference set as an
// ordered list of attribute-description concepts. The leading entries of
// that list identify the concrete member shape.

/// Referenced component attribute description - 449608002.
pub const REFERENCED_COMPONENT: SctId = 449608002;

/// Association target component attribute description - 900000000000533001.
pub const TARGET_COMPONENT: SctId = 900000000000533001;

/// Acceptability attribute description - 900000000000511003.
pub const ACCEPTABILITY_ATTRIBUTE: SctId = 900000000000511003;

/// Map source concept attribute description - 900000000000500006.
pub const MAP_SOURCE: SctId = 900000000000500006;

/// Map target attribute description - 900000000000505001.
pub const MAP_TARGET_ATTRIBUTE: SctId = 900000000000505001;

/// Map group attribute description - 1193546000.
pub const MAP_GROUP_ATTRIBUTE: SctId = 1193546000;

/// Map category attribute description - 609330002.
pub const MAP_CATEGORY_ATTRIBUTE: SctId = 609330002;

/// Value attribute description (attribute-value refsets) - 900000000000491004.
pub const VALUE_ATTRIBUTE: SctId = 900000000000491004;

/// OWL expression attribute description - 762677007.
pub const OWL_EXPRESSION_ATTRIBUTE: SctId = 762677007;

/// Module dependency source effective time attribute - 900000000000535008.
pub const SOURCE_EFFECTIVE_TIME_ATTRIBUTE: SctId = 900000000000535008;

/// Module dependency target effective time attribute - 900000000000536009.
pub const TARGET_EFFECTIVE_TIME_ATTRIBUTE: SctId = 900000000000536009;

/// Refset descriptor attribute description - 900000000000537000.
pub const ATTRIBUTE_DESCRIPTION: SctId = 900000000000537000;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verhoeff_valid;

    #[test]
    fn test_constants_are_valid_sctids() {
        for id in [
            ROOT,
            IS_A,
            FULLY_SPECIFIED_NAME,
            SYNONYM,
            PREFERRED,
            ACCEPTABLE,
            GB_ENGLISH,
            US_ENGLISH,
            REPLACED_BY,
            SAME_AS,
            POSSIBLY_EQUIVALENT_TO,
            MOVED_TO,
            CTV3_MAP,
            CORE_MODULE,
        ] {
            assert!(verhoeff_valid(id), "{id} should carry a valid check digit");
        }
    }
}
