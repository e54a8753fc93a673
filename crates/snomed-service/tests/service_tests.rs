//! End-to-end tests over a synthetic RF2 release: import, closure and
//! index build, then lookup, locale resolution, ECL realization and
//! search through the service facade.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use snomed_service::{
    well_known, AttributeConstraint, AttributeValue, EclExpression, Refinement, SearchRequest,
    Service,
};

const ROOT: u64 = 138875005;
const CLINICAL_FINDING: u64 = 404684003;
const DEMYELINATING: u64 = 6118003;
const MS: u64 = 24700007;
const RRMS: u64 = 426373005;
const DIABETES: u64 = 73211009;
const T1DM: u64 = 46635009;
const LUNG_DISORDER: u64 = 19829001;
const ACUTE_PULMONARY_OEDEMA: u64 = 40541001;
const OEDEMA: u64 = 79654002;
const ACUTE_OEDEMA: u64 = 448276003;
const PROCEDURE: u64 = 71388002;
const APPENDECTOMY: u64 = 80146002;
const ASSOC_MORPH: u64 = 116676008;
const RETIRED_CONCEPT: u64 = 362969004;

fn write_file(path: &Path, header: &str, rows: &[String]) {
    let mut file = File::create(path).unwrap();
    writeln!(file, "{header}").unwrap();
    for row in rows {
        writeln!(file, "{row}").unwrap();
    }
}

fn concept_row(id: u64, active: u8) -> String {
    format!("{id}\t20230731\t{active}\t900000000000207008\t900000000000074008")
}

fn description_row(id: u64, concept: u64, type_id: u64, term: &str, case_sig: u64) -> String {
    format!("{id}\t20230731\t1\t900000000000207008\t{concept}\ten\t{type_id}\t{term}\t{case_sig}")
}

fn is_a_row(id: u64, source: u64, destination: u64) -> String {
    relationship_row(id, source, destination, well_known::IS_A)
}

fn relationship_row(id: u64, source: u64, destination: u64, type_id: u64) -> String {
    format!(
        "{id}\t20230731\t1\t900000000000207008\t{source}\t{destination}\t0\t{type_id}\t900000000000011006\t900000000000451002"
    )
}

fn member_row(seq: u32, refset: u64, referenced: u64, extra: &str) -> String {
    format!(
        "0000{seq:04}-1111-4222-8333-444455556666\t20230731\t1\t900000000000207008\t{refset}\t{referenced}\t{extra}"
    )
}

/// Writes the synthetic release tree and builds a fully-indexed service.
fn build_service() -> (tempfile::TempDir, Service) {
    let dir = tempfile::tempdir().unwrap();
    let release = dir.path().join("release/Snapshot");
    std::fs::create_dir_all(release.join("Terminology")).unwrap();
    std::fs::create_dir_all(release.join("Refset")).unwrap();

    write_file(
        &release.join("Terminology/sct2_Concept_Snapshot_INT_20230731.txt"),
        "id\teffectiveTime\tactive\tmoduleId\tdefinitionStatusId",
        &[
            concept_row(ROOT, 1),
            concept_row(CLINICAL_FINDING, 1),
            concept_row(DEMYELINATING, 1),
            concept_row(MS, 1),
            concept_row(RRMS, 1),
            concept_row(DIABETES, 1),
            concept_row(T1DM, 1),
            concept_row(LUNG_DISORDER, 1),
            concept_row(ACUTE_PULMONARY_OEDEMA, 1),
            concept_row(OEDEMA, 1),
            concept_row(ACUTE_OEDEMA, 1),
            concept_row(PROCEDURE, 1),
            concept_row(APPENDECTOMY, 1),
            concept_row(RETIRED_CONCEPT, 0),
        ],
    );

    let synonym = well_known::SYNONYM;
    let fsn = well_known::FULLY_SPECIFIED_NAME;
    let initial_insensitive = well_known::INITIAL_CHARACTER_CASE_INSENSITIVE;
    let case_sensitive = well_known::CASE_SENSITIVE;
    write_file(
        &release.join("Terminology/sct2_Description_Snapshot-en_INT_20230731.txt"),
        "id\teffectiveTime\tactive\tmoduleId\tconceptId\tlanguageCode\ttypeId\tterm\tcaseSignificanceId",
        &[
            description_row(1011, MS, synonym, "Multiple sclerosis", initial_insensitive),
            description_row(2011, MS, fsn, "Multiple sclerosis (disorder)", initial_insensitive),
            description_row(3011, RRMS, synonym, "Relapsing remitting multiple sclerosis", initial_insensitive),
            description_row(4011, DIABETES, synonym, "Diabetes mellitus", initial_insensitive),
            description_row(5011, DIABETES, synonym, "Diabetes", initial_insensitive),
            description_row(6011, DIABETES, synonym, "Diabetes", case_sensitive),
            description_row(7011, T1DM, synonym, "Type 1 diabetes mellitus", initial_insensitive),
            description_row(8011, CLINICAL_FINDING, synonym, "Clinical finding", initial_insensitive),
            description_row(9011, DEMYELINATING, synonym, "Demyelinating disease", initial_insensitive),
            description_row(10011, LUNG_DISORDER, synonym, "Lung disease", initial_insensitive),
            description_row(11011, ACUTE_PULMONARY_OEDEMA, synonym, "Acute pulmonary oedema", initial_insensitive),
            description_row(12011, OEDEMA, synonym, "Oedema", initial_insensitive),
            description_row(13011, ACUTE_OEDEMA, synonym, "Acute oedema", initial_insensitive),
            description_row(14011, PROCEDURE, synonym, "Procedure", initial_insensitive),
            description_row(15011, APPENDECTOMY, synonym, "Appendicectomy", initial_insensitive),
            description_row(16011, APPENDECTOMY, synonym, "Appendectomy", initial_insensitive),
            description_row(17011, ROOT, synonym, "SNOMED CT Concept", initial_insensitive),
            description_row(18011, RETIRED_CONCEPT, synonym, "Disordered action of heart", initial_insensitive),
        ],
    );

    write_file(
        &release.join("Terminology/sct2_Relationship_Snapshot_INT_20230731.txt"),
        "id\teffectiveTime\tactive\tmoduleId\tsourceId\tdestinationId\trelationshipGroup\ttypeId\tcharacteristicTypeId\tmodifierId",
        &[
            is_a_row(1024, CLINICAL_FINDING, ROOT),
            is_a_row(2024, DEMYELINATING, CLINICAL_FINDING),
            is_a_row(3024, MS, DEMYELINATING),
            is_a_row(4024, RRMS, MS),
            is_a_row(5024, DIABETES, CLINICAL_FINDING),
            is_a_row(6024, T1DM, DIABETES),
            is_a_row(7024, LUNG_DISORDER, CLINICAL_FINDING),
            is_a_row(8024, ACUTE_PULMONARY_OEDEMA, LUNG_DISORDER),
            is_a_row(9024, OEDEMA, ROOT),
            is_a_row(10024, ACUTE_OEDEMA, OEDEMA),
            is_a_row(11024, PROCEDURE, ROOT),
            is_a_row(12024, APPENDECTOMY, PROCEDURE),
            is_a_row(13024, RETIRED_CONCEPT, CLINICAL_FINDING),
            relationship_row(14024, ACUTE_PULMONARY_OEDEMA, ACUTE_OEDEMA, ASSOC_MORPH),
        ],
    );

    write_file(
        &release.join("Refset/der2_cRefset_LanguageSnapshot-en_INT_20230731.txt"),
        "id\teffectiveTime\tactive\tmoduleId\trefsetId\treferencedComponentId\tacceptabilityId",
        &[
            member_row(1, well_known::GB_ENGLISH, 15011, &well_known::PREFERRED.to_string()),
            member_row(2, well_known::GB_ENGLISH, 16011, &well_known::ACCEPTABLE.to_string()),
            member_row(3, well_known::US_ENGLISH, 16011, &well_known::PREFERRED.to_string()),
            member_row(4, well_known::US_ENGLISH, 15011, &well_known::ACCEPTABLE.to_string()),
            member_row(5, well_known::GB_ENGLISH, 1011, &well_known::PREFERRED.to_string()),
            member_row(6, well_known::US_ENGLISH, 1011, &well_known::PREFERRED.to_string()),
        ],
    );

    write_file(
        &release.join("Refset/der2_cRefset_AssociationSnapshot_INT_20230731.txt"),
        "id\teffectiveTime\tactive\tmoduleId\trefsetId\treferencedComponentId\ttargetComponentId",
        &[member_row(7, well_known::SAME_AS, RETIRED_CONCEPT, &MS.to_string())],
    );

    write_file(
        &release.join("Refset/der2_sRefset_SimpleMapSnapshot_INT_20230731.txt"),
        "id\teffectiveTime\tactive\tmoduleId\trefsetId\treferencedComponentId\tmapTarget",
        &[member_row(8, well_known::CTV3_MAP, MS, "F20..")],
    );

    let service = Service::open(dir.path().join("db")).unwrap();
    let summary = service.import_rf2(dir.path().join("release")).unwrap();
    assert_eq!(summary.parse_errors, 0);
    service.build_index().unwrap();
    (dir, service)
}

fn dos(concept_id: u64) -> EclExpression {
    EclExpression::DescendantOrSelfOf(Box::new(EclExpression::concept(concept_id)))
}

fn descendants(concept_id: u64) -> EclExpression {
    EclExpression::DescendantOf(Box::new(EclExpression::concept(concept_id)))
}

#[test]
fn import_populates_store() {
    let (_dir, service) = build_service();

    let ms = service.get_concept(MS).unwrap().unwrap();
    assert!(ms.active);
    assert_eq!(ms.effective_time, 20230731);
    assert!(service.get_concept(999999).unwrap().is_none());

    let descriptions = service.get_concept_descriptions(MS).unwrap();
    assert_eq!(descriptions.len(), 2);

    let parents = service.get_parent_relationships_of_type(MS, well_known::IS_A).unwrap();
    assert_eq!(parents.len(), 1);
    assert_eq!(parents[0].destination_id, DEMYELINATING);
}

#[test]
fn descendant_of_excludes_self() {
    let (_dir, service) = build_service();

    // Multiple sclerosis sits below demyelinating disease and the root.
    let ancestors = service.store().ancestors_of(MS).unwrap();
    assert!(ancestors.contains(&DEMYELINATING));
    assert!(ancestors.contains(&ROOT));

    let realized = service.realize_ecl(&descendants(MS)).unwrap();
    assert!(!realized.contains(MS));
    assert!(realized.contains(RRMS));
}

#[test]
fn descendant_or_self_includes_self() {
    let (_dir, service) = build_service();
    let realized = service.realize_ecl(&dos(DIABETES)).unwrap();
    assert!(realized.contains(DIABETES));
    assert!(realized.contains(T1DM));
}

#[test]
fn refinement_with_subsumed_morphology() {
    let (_dir, service) = build_service();

    // < disorder of lung : associated morphology = << oedema
    let expr = EclExpression::Refined {
        focus: Box::new(descendants(LUNG_DISORDER)),
        refinement: Refinement {
            ungrouped: vec![AttributeConstraint {
                cardinality: None,
                attribute_type: Box::new(EclExpression::concept(ASSOC_MORPH)),
                value: AttributeValue::Expression(Box::new(dos(OEDEMA))),
            }],
            groups: vec![],
        },
    };
    let realized = service.realize_ecl(&expr).unwrap();

    // Acute pulmonary oedema matches through Acute oedema, a descendant
    // of Oedema.
    assert!(realized.contains(ACUTE_PULMONARY_OEDEMA));
    assert!(!realized.contains(MS));
}

#[test]
fn locale_resolution_picks_dialect() {
    let (_dir, service) = build_service();

    let gb = service.get_preferred_synonym(APPENDECTOMY, "en-GB").unwrap().unwrap();
    assert_eq!(gb.term, "Appendicectomy");

    let us = service.get_preferred_synonym(APPENDECTOMY, "en-US").unwrap().unwrap();
    assert_eq!(us.term, "Appendectomy");

    let fsn = service.get_fully_specified_name(MS, "en-GB").unwrap().unwrap();
    assert_eq!(fsn.term, "Multiple sclerosis (disorder)");
}

#[test]
fn case_significance_folding() {
    let (_dir, service) = build_service();

    let insensitive = service.get_description(5011).unwrap().unwrap();
    assert_eq!(insensitive.lowercase_term(), "diabetes");

    let sensitive = service.get_description(6011).unwrap().unwrap();
    assert_eq!(sensitive.lowercase_term(), "Diabetes");
}

#[test]
fn constrained_search_finds_multiple_sclerosis() {
    let (_dir, service) = build_service();

    let request = SearchRequest {
        s: Some("mult scl".to_string()),
        constraint: Some(descendants(CLINICAL_FINDING)),
        max_hits: 1,
        ..SearchRequest::default()
    };
    let hits = service.search(&request, "en-GB").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].concept_id, MS);
    assert_eq!(hits[0].preferred_term.as_deref(), Some("Multiple sclerosis"));
}

#[test]
fn search_excludes_inactive_concepts_by_default() {
    let (_dir, service) = build_service();

    let request = SearchRequest {
        s: Some("disordered action".to_string()),
        max_hits: 10,
        ..SearchRequest::default()
    };
    assert!(service.search(&request, "en").unwrap().is_empty());

    let include_inactive = SearchRequest {
        include_inactive_concepts: true,
        ..request
    };
    let hits = service.search(&include_inactive, "en").unwrap();
    assert!(hits.iter().any(|hit| hit.concept_id == RETIRED_CONCEPT));
}

#[test]
fn historical_associations_grouped_by_refset() {
    let (_dir, service) = build_service();

    let history = service.historical_associations(RETIRED_CONCEPT).unwrap();
    let same_as = &history[&well_known::SAME_AS];
    assert_eq!(same_as.len(), 1);
    assert_eq!(same_as[0].referenced_component_id, RETIRED_CONCEPT);
}

#[test]
fn reverse_map_finds_source_concept() {
    let (_dir, service) = build_service();

    let items = service.reverse_map(well_known::CTV3_MAP, "F20..").unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].referenced_component_id, MS);

    assert!(service.reverse_map(well_known::CTV3_MAP, "F20").unwrap().is_empty());
}

#[test]
fn component_refset_ids_for_concept() {
    let (_dir, service) = build_service();
    let refsets = service.get_component_refset_ids(MS).unwrap();
    assert!(refsets.contains(&well_known::CTV3_MAP));
}

#[test]
fn reopened_service_uses_persisted_index() {
    let (dir, service) = build_service();
    let db_path: PathBuf = dir.path().join("db");
    service.close();

    let reopened = Service::open(&db_path).unwrap();
    let realized = reopened.realize_ecl(&dos(DIABETES)).unwrap();
    assert!(realized.contains(T1DM));

    let request = SearchRequest {
        s: Some("appendicectomy".to_string()),
        max_hits: 5,
        ..SearchRequest::default()
    };
    let hits = reopened.search(&request, "en-GB").unwrap();
    assert_eq!(hits[0].concept_id, APPENDECTOMY);
}

#[test]
fn realize_is_cached_until_rebuild() {
    let (_dir, service) = build_service();
    let first = service.realize_ecl(&dos(DEMYELINATING)).unwrap();
    let second = service.realize_ecl(&dos(DEMYELINATING)).unwrap();
    assert_eq!(first, second);
}
