//! Reification of generic reference set rows into concrete member shapes.
//!
//! A parsed [`RefsetRow`](crate::row::RefsetRow) carries an untyped field
//! vector. The shape it should take is determined by the reference set's
//! RefsetDescriptor entries: the leading attribute-description concept ids
//! form a prefix that names the member kind. When no descriptor has been
//! loaded for a refset, the kind hint decoded from the file name is used
//! instead.

use snomed_types::{
    well_known, RefsetBody, RefsetField, RefsetItem, RefsetKind, SctId,
};

use crate::error::{Rf2Error, Rf2Result};
use crate::row::RefsetRow;

/// Maps a refset's attribute-description prefix to its member kind.
///
/// The prefix comes from the refset's RefsetDescriptor entries in
/// attribute order; only the leading identifiers matter.
pub fn kind_for_prefix(prefix: &[SctId]) -> RefsetKind {
    match prefix {
        [] => RefsetKind::Other,
        [well_known::REFERENCED_COMPONENT] => RefsetKind::Simple,
        [well_known::REFERENCED_COMPONENT, rest @ ..] => match rest.first() {
            Some(&well_known::TARGET_COMPONENT) => RefsetKind::Association,
            Some(&well_known::ACCEPTABILITY_ATTRIBUTE) => RefsetKind::Language,
            Some(&well_known::VALUE_ATTRIBUTE) => RefsetKind::AttributeValue,
            Some(&well_known::OWL_EXPRESSION_ATTRIBUTE) => RefsetKind::OwlExpression,
            _ => RefsetKind::Other,
        },
        [well_known::MAP_SOURCE, rest @ ..] => {
            if rest.contains(&well_known::MAP_GROUP_ATTRIBUTE) {
                if rest.contains(&well_known::MAP_CATEGORY_ATTRIBUTE) {
                    RefsetKind::ExtendedMap
                } else {
                    RefsetKind::ComplexMap
                }
            } else if rest.first() == Some(&well_known::MAP_TARGET_ATTRIBUTE) {
                RefsetKind::SimpleMap
            } else {
                RefsetKind::Other
            }
        }
        [well_known::SOURCE_EFFECTIVE_TIME_ATTRIBUTE, well_known::TARGET_EFFECTIVE_TIME_ATTRIBUTE, ..] => {
            RefsetKind::ModuleDependency
        }
        [well_known::ATTRIBUTE_DESCRIPTION, ..] => RefsetKind::RefsetDescriptor,
        _ => RefsetKind::Other,
    }
}

struct FieldReader {
    fields: std::vec::IntoIter<RefsetField>,
}

impl FieldReader {
    fn new(fields: Vec<RefsetField>) -> Self {
        FieldReader {
            fields: fields.into_iter(),
        }
    }

    fn component_id(&mut self) -> Rf2Result<SctId> {
        match self.fields.next() {
            Some(RefsetField::ComponentId(id)) => Ok(id),
            other => Err(Rf2Error::parse(format!(
                "expected component id field, found {other:?}"
            ))),
        }
    }

    fn integer(&mut self) -> Rf2Result<i64> {
        match self.fields.next() {
            Some(RefsetField::Integer(n)) => Ok(n),
            other => Err(Rf2Error::parse(format!(
                "expected integer field, found {other:?}"
            ))),
        }
    }

    fn string(&mut self) -> Rf2Result<String> {
        match self.fields.next() {
            Some(RefsetField::Str(s)) => Ok(s),
            other => Err(Rf2Error::parse(format!(
                "expected string field, found {other:?}"
            ))),
        }
    }

    fn date(&mut self) -> Rf2Result<u32> {
        let raw = self.string()?;
        raw.parse()
            .map_err(|_| Rf2Error::parse(format!("bad date field: {raw:?}")))
    }

    fn finish(mut self) -> Rf2Result<()> {
        match self.fields.next() {
            None => Ok(()),
            Some(extra) => Err(Rf2Error::parse(format!("unconsumed field: {extra:?}"))),
        }
    }
}

/// Reifies a generic refset row into a typed member.
///
/// Shape mismatches between the kind and the field vector are parse
/// errors; [`RefsetKind::Other`] retains the fields as parsed.
pub fn reify(row: RefsetRow, kind: RefsetKind) -> Rf2Result<RefsetItem> {
    let RefsetRow {
        id,
        effective_time,
        active,
        module_id,
        refset_id,
        referenced_component_id,
        fields,
    } = row;

    let mut reader = FieldReader::new(fields);
    let body = match kind {
        RefsetKind::Simple => RefsetBody::Simple,
        RefsetKind::Association => RefsetBody::Association {
            target_component_id: reader.component_id()?,
        },
        RefsetKind::Language => RefsetBody::Language {
            acceptability_id: reader.component_id()?,
        },
        RefsetKind::SimpleMap => RefsetBody::SimpleMap {
            map_target: reader.string()?,
        },
        RefsetKind::ComplexMap => RefsetBody::ComplexMap {
            map_group: reader.integer()?,
            map_priority: reader.integer()?,
            map_rule: reader.string()?,
            map_advice: reader.string()?,
            map_target: reader.string()?,
            correlation_id: reader.component_id()?,
        },
        RefsetKind::ExtendedMap => RefsetBody::ExtendedMap {
            map_group: reader.integer()?,
            map_priority: reader.integer()?,
            map_rule: reader.string()?,
            map_advice: reader.string()?,
            map_target: reader.string()?,
            correlation_id: reader.component_id()?,
            map_category_id: reader.component_id()?,
        },
        RefsetKind::AttributeValue => RefsetBody::AttributeValue {
            value_id: reader.component_id()?,
        },
        RefsetKind::OwlExpression => RefsetBody::OwlExpression {
            owl_expression: reader.string()?,
        },
        RefsetKind::ModuleDependency => RefsetBody::ModuleDependency {
            source_effective_time: reader.date()?,
            target_effective_time: reader.date()?,
        },
        RefsetKind::RefsetDescriptor => RefsetBody::RefsetDescriptor {
            attribute_description_id: reader.component_id()?,
            attribute_type_id: reader.component_id()?,
            attribute_order: reader.integer()?,
        },
        RefsetKind::Other => {
            // Keep the dynamic fields; nothing left to consume.
            let mut remaining = Vec::new();
            for field in reader.fields.by_ref() {
                remaining.push(field);
            }
            return Ok(RefsetItem {
                id,
                effective_time,
                active,
                module_id,
                refset_id,
                referenced_component_id,
                body: RefsetBody::Other(remaining),
            });
        }
    };
    reader.finish()?;

    Ok(RefsetItem {
        id,
        effective_time,
        active,
        module_id,
        refset_id,
        referenced_component_id,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn row(fields: Vec<RefsetField>) -> RefsetRow {
        RefsetRow {
            id: Uuid::from_u128(1),
            effective_time: 20200101,
            active: true,
            module_id: well_known::CORE_MODULE,
            refset_id: well_known::GB_ENGLISH,
            referenced_component_id: 1223979019,
            fields,
        }
    }

    #[test]
    fn test_kind_for_prefix_table() {
        use RefsetKind::*;
        assert_eq!(
            kind_for_prefix(&[449608002, 900000000000533001]),
            Association
        );
        assert_eq!(kind_for_prefix(&[449608002, 900000000000511003]), Language);
        assert_eq!(
            kind_for_prefix(&[900000000000500006, 900000000000505001]),
            SimpleMap
        );
        assert_eq!(
            kind_for_prefix(&[900000000000500006, 900000000000505001, 1193546000]),
            ComplexMap
        );
        assert_eq!(
            kind_for_prefix(&[
                900000000000500006,
                900000000000505001,
                1193546000,
                609330002
            ]),
            ExtendedMap
        );
        assert_eq!(
            kind_for_prefix(&[449608002, 900000000000491004]),
            AttributeValue
        );
        assert_eq!(kind_for_prefix(&[449608002, 762677007]), OwlExpression);
        assert_eq!(
            kind_for_prefix(&[900000000000535008, 900000000000536009, 900000000000537000]),
            ModuleDependency
        );
        assert_eq!(kind_for_prefix(&[449608002]), Simple);
        assert_eq!(kind_for_prefix(&[]), Other);
        assert_eq!(kind_for_prefix(&[42, 43]), Other);
    }

    #[test]
    fn test_reify_language_member() {
        let item = reify(
            row(vec![RefsetField::ComponentId(well_known::PREFERRED)]),
            RefsetKind::Language,
        )
        .unwrap();
        assert!(item.is_preferred());
    }

    #[test]
    fn test_reify_extended_map() {
        let fields = vec![
            RefsetField::Integer(1),
            RefsetField::Integer(1),
            RefsetField::Str(String::new()),
            RefsetField::Str("ALWAYS G35.9".into()),
            RefsetField::Str("G35.9".into()),
            RefsetField::ComponentId(447561005),
            RefsetField::ComponentId(447637006),
        ];
        let item = reify(row(fields), RefsetKind::ExtendedMap).unwrap();
        assert_eq!(item.body.map_target(), Some("G35.9"));
    }

    #[test]
    fn test_reify_module_dependency_dates() {
        let fields = vec![
            RefsetField::Str("20230731".into()),
            RefsetField::Str("20230131".into()),
        ];
        let item = reify(row(fields), RefsetKind::ModuleDependency).unwrap();
        assert_eq!(
            item.body,
            RefsetBody::ModuleDependency {
                source_effective_time: 20230731,
                target_effective_time: 20230131,
            }
        );
    }

    #[test]
    fn test_reify_shape_mismatch_is_parse_error() {
        // A language member must carry exactly one component id field.
        assert!(reify(row(vec![]), RefsetKind::Language).is_err());
        assert!(reify(
            row(vec![RefsetField::Str("oops".into())]),
            RefsetKind::Language
        )
        .is_err());
        assert!(reify(
            row(vec![
                RefsetField::ComponentId(well_known::PREFERRED),
                RefsetField::Integer(2)
            ]),
            RefsetKind::Simple
        )
        .is_err());
    }

    #[test]
    fn test_reify_other_keeps_fields() {
        let fields = vec![RefsetField::Integer(5), RefsetField::Str("x".into())];
        let item = reify(row(fields.clone()), RefsetKind::Other).unwrap();
        assert_eq!(item.body, RefsetBody::Other(fields));
    }

    #[test]
    fn test_refset_item_round_trip_shapes() {
        // Reifying and reading back each shape preserves the fields.
        let shapes: Vec<(RefsetKind, Vec<RefsetField>)> = vec![
            (RefsetKind::Simple, vec![]),
            (
                RefsetKind::Association,
                vec![RefsetField::ComponentId(73211009)],
            ),
            (
                RefsetKind::SimpleMap,
                vec![RefsetField::Str("C10..".into())],
            ),
            (
                RefsetKind::AttributeValue,
                vec![RefsetField::ComponentId(900000000000495008)],
            ),
            (
                RefsetKind::OwlExpression,
                vec![RefsetField::Str("SubClassOf(:73211009 :64572001)".into())],
            ),
            (
                RefsetKind::RefsetDescriptor,
                vec![
                    RefsetField::ComponentId(well_known::REFERENCED_COMPONENT),
                    RefsetField::ComponentId(well_known::REFERENCED_COMPONENT),
                    RefsetField::Integer(0),
                ],
            ),
        ];
        for (kind, fields) in shapes {
            let item = reify(row(fields), kind).unwrap();
            assert_eq!(item.body.kind(), kind);
        }
    }
}
