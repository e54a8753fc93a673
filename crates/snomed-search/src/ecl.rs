//! ECL abstract syntax tree and evaluator.
//!
//! The expression tree is produced by an external ECL parser; this module
//! defines the node variants the evaluator understands and compiles them
//! into index queries from [`crate::query`].
//!
//! Evaluation follows the expression-constraint semantics: a bare concept
//! reference denotes the concept and its descendants, prefix operators
//! select the hierarchy relation, and attribute names in refinements are
//! themselves subsumed (a constraint on `attr` covers descendant
//! attributes too). `MINUS` compiles through an include/exclude rewrite so
//! nested exclusions keep their meaning when combined with `OR`.

use std::fmt;

use roaring::RoaringTreemap;

use snomed_types::{well_known, SctId};

use crate::error::{SearchError, SearchResult};
use crate::query::{BoxQuery, QueryContext};

// =============================================================================
// AST
// =============================================================================

/// Comparison operators for concrete values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ComparisonOperator::Equal => "=",
            ComparisonOperator::NotEqual => "!=",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanOrEqual => "<=",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanOrEqual => ">=",
        };
        write!(f, "{symbol}")
    }
}

/// Cardinality constraint for attributes: `[min..max]`, `max = None`
/// meaning unbounded (`*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    /// Minimum occurrences.
    pub min: u32,
    /// Maximum occurrences, `None` for `*`.
    pub max: Option<u32>,
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}..{}]", self.min, max),
            None => write!(f, "[{}..*]", self.min),
        }
    }
}

/// A concrete comparand in an attribute constraint, e.g. `#500`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConcreteComparand {
    /// A numeric literal.
    Number(f64),
    /// A string literal.
    String(String),
    /// A boolean literal.
    Boolean(bool),
}

impl fmt::Display for ConcreteComparand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcreteComparand::Number(n) => write!(f, "#{n}"),
            ConcreteComparand::String(s) => write!(f, "\"{s}\""),
            ConcreteComparand::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// The value side of an attribute constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// A subexpression the attribute value must satisfy.
    Expression(Box<EclExpression>),
    /// A concrete-value comparison.
    Concrete {
        /// The comparison operator.
        operator: ComparisonOperator,
        /// The literal compared against.
        value: ConcreteComparand,
    },
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Expression(expr) => write!(f, "= {expr}"),
            AttributeValue::Concrete { operator, value } => write!(f, "{operator} {value}"),
        }
    }
}

/// A single attribute constraint within a refinement, e.g.
/// `116676008 = << 79654002`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeConstraint {
    /// Optional cardinality.
    pub cardinality: Option<Cardinality>,
    /// The attribute type; subsumed when applied.
    pub attribute_type: Box<EclExpression>,
    /// The value constraint.
    pub value: AttributeValue,
}

impl fmt::Display for AttributeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(cardinality) = self.cardinality {
            write!(f, "{cardinality} ")?;
        }
        write!(f, "{} {}", self.attribute_type, self.value)
    }
}

/// A group of attribute constraints: `{ a = x, b = y }`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeGroup {
    /// Optional group cardinality. Not supported by this evaluator.
    pub cardinality: Option<Cardinality>,
    /// The constraints in the group.
    pub constraints: Vec<AttributeConstraint>,
}

/// A refinement clause: ungrouped constraints plus attribute groups.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Refinement {
    /// Ungrouped constraints, AND-combined.
    pub ungrouped: Vec<AttributeConstraint>,
    /// Grouped constraints.
    pub groups: Vec<AttributeGroup>,
}

/// An ECL expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum EclExpression {
    /// A concept reference; denotes the concept and its descendants
    /// unless wrapped in a prefix operator.
    ConceptReference {
        /// The referenced concept.
        concept_id: SctId,
        /// Optional pipe-delimited term from the source text.
        term: Option<String>,
    },
    /// `*` — any concept.
    Any,
    /// `< expr`.
    DescendantOf(Box<EclExpression>),
    /// `<< expr`.
    DescendantOrSelfOf(Box<EclExpression>),
    /// `> expr`.
    AncestorOf(Box<EclExpression>),
    /// `>> expr`.
    AncestorOrSelfOf(Box<EclExpression>),
    /// `<! expr`.
    ChildOf(Box<EclExpression>),
    /// `>! expr`.
    ParentOf(Box<EclExpression>),
    /// `^ expr`.
    MemberOf(Box<EclExpression>),
    /// `!!> expr` — most general members of the set.
    TopOfSet(Box<EclExpression>),
    /// `!!< expr` — most specific members of the set.
    BottomOfSet(Box<EclExpression>),
    /// Conjunction.
    And(Box<EclExpression>, Box<EclExpression>),
    /// Disjunction.
    Or(Box<EclExpression>, Box<EclExpression>),
    /// Exclusion.
    Minus(Box<EclExpression>, Box<EclExpression>),
    /// `focus : refinement`.
    Refined {
        /// The focus expression.
        focus: Box<EclExpression>,
        /// The refinement clause.
        refinement: Refinement,
    },
    /// A parenthesized subexpression.
    Nested(Box<EclExpression>),
}

impl EclExpression {
    /// A bare concept reference.
    pub fn concept(concept_id: SctId) -> Self {
        EclExpression::ConceptReference {
            concept_id,
            term: None,
        }
    }

    /// Strips any nesting wrappers.
    pub fn unwrap_nested(&self) -> &EclExpression {
        let mut current = self;
        while let EclExpression::Nested(inner) = current {
            current = inner;
        }
        current
    }
}

impl fmt::Display for EclExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EclExpression::ConceptReference { concept_id, .. } => write!(f, "{concept_id}"),
            EclExpression::Any => write!(f, "*"),
            EclExpression::DescendantOf(e) => write!(f, "< {e}"),
            EclExpression::DescendantOrSelfOf(e) => write!(f, "<< {e}"),
            EclExpression::AncestorOf(e) => write!(f, "> {e}"),
            EclExpression::AncestorOrSelfOf(e) => write!(f, ">> {e}"),
            EclExpression::ChildOf(e) => write!(f, "<! {e}"),
            EclExpression::ParentOf(e) => write!(f, ">! {e}"),
            EclExpression::MemberOf(e) => write!(f, "^ {e}"),
            EclExpression::TopOfSet(e) => write!(f, "!!> {e}"),
            EclExpression::BottomOfSet(e) => write!(f, "!!< {e}"),
            EclExpression::And(l, r) => write!(f, "({l} AND {r})"),
            EclExpression::Or(l, r) => write!(f, "({l} OR {r})"),
            EclExpression::Minus(l, r) => write!(f, "({l} MINUS {r})"),
            EclExpression::Refined { focus, refinement } => {
                write!(f, "{focus} :")?;
                let mut first = true;
                for constraint in &refinement.ungrouped {
                    write!(f, "{} {constraint}", if first { "" } else { "," })?;
                    first = false;
                }
                for group in &refinement.groups {
                    write!(f, "{} {{", if first { "" } else { "," })?;
                    for (i, constraint) in group.constraints.iter().enumerate() {
                        write!(f, "{}{constraint}", if i == 0 { " " } else { ", " })?;
                    }
                    write!(f, " }}")?;
                    first = false;
                }
                Ok(())
            }
            EclExpression::Nested(e) => write!(f, "({e})"),
        }
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// A compiled expression as an include query plus an optional exclusion.
///
/// Exclusions are kept separate until the query is finally assembled so a
/// `MINUS` nested under other operators composes correctly: `AND` merges
/// exclusions upward, `OR` seals each branch before joining.
pub struct CompiledQuery {
    include: BoxQuery,
    exclude: Option<BoxQuery>,
}

impl CompiledQuery {
    fn simple(include: BoxQuery) -> Self {
        CompiledQuery {
            include,
            exclude: None,
        }
    }

    /// Assembles the final index query.
    pub fn into_query(self, ctx: &QueryContext<'_>) -> BoxQuery {
        match self.exclude {
            Some(exclude) => ctx.q_not(self.include, exclude),
            None => self.include,
        }
    }
}

/// Compiles ECL expression trees into index queries and realizes concept
/// sets.
pub struct EclEvaluator<'a> {
    ctx: QueryContext<'a>,
}

impl<'a> EclEvaluator<'a> {
    /// Creates an evaluator over a query context.
    pub fn new(ctx: QueryContext<'a>) -> Self {
        EclEvaluator { ctx }
    }

    /// Evaluates an expression and returns the distinct matching concept
    /// ids.
    pub fn realize(&self, expr: &EclExpression) -> SearchResult<RoaringTreemap> {
        let compiled = self.compile(expr)?;
        self.ctx.realize(&*compiled.into_query(&self.ctx))
    }

    /// Compiles an expression to its include/exclude query pair.
    pub fn compile(&self, expr: &EclExpression) -> SearchResult<CompiledQuery> {
        let ctx = &self.ctx;
        match expr.unwrap_nested() {
            EclExpression::ConceptReference { concept_id, .. } => {
                Ok(CompiledQuery::simple(ctx.q_descendant_or_self_of(*concept_id)))
            }
            EclExpression::Any => Ok(CompiledQuery::simple(
                ctx.q_descendant_or_self_of(well_known::ROOT),
            )),
            EclExpression::DescendantOf(inner) => {
                let focus = self.focus_concept(inner)?;
                Ok(CompiledQuery::simple(ctx.q_descendant_of(focus)))
            }
            EclExpression::DescendantOrSelfOf(inner) => {
                let focus = self.focus_concept(inner)?;
                Ok(CompiledQuery::simple(ctx.q_descendant_or_self_of(focus)))
            }
            EclExpression::AncestorOf(inner) => {
                let focus = self.focus_concept(inner)?;
                Ok(CompiledQuery::simple(ctx.q_ancestor_of(focus)?))
            }
            EclExpression::AncestorOrSelfOf(inner) => {
                let focus = self.focus_concept(inner)?;
                Ok(CompiledQuery::simple(ctx.q_ancestor_or_self_of(focus)?))
            }
            EclExpression::ChildOf(inner) => {
                let focus = self.focus_concept(inner)?;
                Ok(CompiledQuery::simple(ctx.q_child_of(focus)))
            }
            EclExpression::ParentOf(inner) => {
                let focus = self.focus_concept(inner)?;
                Ok(CompiledQuery::simple(ctx.q_parent_of(focus)?))
            }
            EclExpression::MemberOf(inner) => match inner.unwrap_nested() {
                EclExpression::ConceptReference { concept_id, .. } => {
                    Ok(CompiledQuery::simple(ctx.q_member_of(*concept_id)))
                }
                other => {
                    // ^ (expr): members of every refset the inner
                    // expression realizes.
                    let refsets = self.realize(other)?;
                    let queries = refsets.iter().map(|id| ctx.q_member_of(id)).collect();
                    Ok(CompiledQuery::simple(ctx.q_or(queries)))
                }
            },
            EclExpression::TopOfSet(inner) => {
                let set = self.realize(inner)?;
                let top = ctx.top_of_set(&set)?;
                Ok(CompiledQuery::simple(ctx.q_concept_set(top)))
            }
            EclExpression::BottomOfSet(inner) => {
                let set = self.realize(inner)?;
                let bottom = ctx.bottom_of_set(&set)?;
                Ok(CompiledQuery::simple(ctx.q_concept_set(bottom)))
            }
            EclExpression::And(left, right) => {
                let left = self.compile(left)?;
                let right = self.compile(right)?;
                // (a \ x) AND (b \ y) = (a AND b) \ (x OR y)
                let include = ctx.q_and(vec![left.include, right.include]);
                let exclude = self.merge_excludes(left.exclude, right.exclude);
                Ok(CompiledQuery { include, exclude })
            }
            EclExpression::Or(left, right) => {
                let left = self.compile(left)?.into_query(ctx);
                let right = self.compile(right)?.into_query(ctx);
                Ok(CompiledQuery::simple(ctx.q_or(vec![left, right])))
            }
            EclExpression::Minus(left, right) => {
                let left = self.compile(left)?;
                let right = self.compile(right)?.into_query(ctx);
                let exclude = self.merge_excludes(left.exclude, Some(right));
                Ok(CompiledQuery {
                    include: left.include,
                    exclude,
                })
            }
            EclExpression::Refined { focus, refinement } => {
                let focus = self.compile(focus)?;
                let mut clauses = vec![focus.include];
                for constraint in &refinement.ungrouped {
                    clauses.push(self.attribute_query(constraint)?);
                }
                for group in &refinement.groups {
                    if group.cardinality.is_some() {
                        return Err(SearchError::Unsupported(
                            "grouped attribute cardinality".to_string(),
                        ));
                    }
                    // Groups approximate to conjunction at the concept
                    // level; same-group co-occurrence is not enforced.
                    for constraint in &group.constraints {
                        clauses.push(self.attribute_query(constraint)?);
                    }
                }
                Ok(CompiledQuery {
                    include: self.ctx.q_and(clauses),
                    exclude: focus.exclude,
                })
            }
            EclExpression::Nested(_) => {
                unreachable!("nested expressions are unwrapped before dispatch")
            }
        }
    }

    fn merge_excludes(&self, left: Option<BoxQuery>, right: Option<BoxQuery>) -> Option<BoxQuery> {
        match (left, right) {
            (Some(left), Some(right)) => Some(self.ctx.q_or(vec![left, right])),
            (left, None) => left,
            (None, right) => right,
        }
    }

    /// The single concept a hierarchy operator applies to.
    fn focus_concept(&self, expr: &EclExpression) -> SearchResult<SctId> {
        match expr.unwrap_nested() {
            EclExpression::ConceptReference { concept_id, .. } => Ok(*concept_id),
            other => Err(SearchError::Unsupported(format!(
                "hierarchy operator over a compound expression: {other}"
            ))),
        }
    }

    /// The attribute type ids a constraint applies to: the named type and
    /// its descendants, restricted to types present in the snapshot.
    fn attribute_type_ids(&self, expr: &EclExpression) -> SearchResult<Vec<SctId>> {
        let present = self.ctx.store.relationship_type_ids()?;
        match expr.unwrap_nested() {
            EclExpression::Any => Ok(present.into_iter().collect()),
            EclExpression::ConceptReference { concept_id, .. } => {
                let mut type_ids = Vec::new();
                for candidate in present {
                    if candidate == *concept_id
                        || self.ctx.store.ancestors_of(candidate)?.contains(concept_id)
                    {
                        type_ids.push(candidate);
                    }
                }
                Ok(type_ids)
            }
            other => {
                let realized = self.realize(other)?;
                Ok(present.into_iter().filter(|t| realized.contains(*t)).collect())
            }
        }
    }

    /// Compiles one attribute constraint into an index query.
    fn attribute_query(&self, constraint: &AttributeConstraint) -> SearchResult<BoxQuery> {
        let ctx = &self.ctx;
        let type_ids = self.attribute_type_ids(&constraint.attribute_type)?;

        if let Some(cardinality) = constraint.cardinality {
            return self.cardinality_query(constraint, cardinality, &type_ids);
        }
        if type_ids.is_empty() {
            return Ok(ctx.q_empty());
        }

        let per_type: SearchResult<Vec<BoxQuery>> = type_ids
            .iter()
            .map(|type_id| self.value_query(*type_id, &constraint.value))
            .collect();
        Ok(ctx.q_or(per_type?))
    }

    fn cardinality_query(
        &self,
        constraint: &AttributeConstraint,
        cardinality: Cardinality,
        type_ids: &[SctId],
    ) -> SearchResult<BoxQuery> {
        let ctx = &self.ctx;
        let Cardinality { min, max } = cardinality;
        if let Some(max) = max {
            if max < min {
                return Err(SearchError::Query(format!(
                    "invalid cardinality [{min}..{max}]"
                )));
            }
        }

        if min == 0 && max.is_none() {
            return Ok(ctx.q_match_all());
        }
        if min == 0 && max == Some(0) {
            // No attribute of any matching type.
            let anys = type_ids.iter().map(|t| ctx.q_attribute_any(*t)).collect();
            return Ok(ctx.q_not(ctx.q_match_all(), ctx.q_or(anys)));
        }
        if type_ids.is_empty() {
            return Ok(if min == 0 { ctx.q_match_all() } else { ctx.q_empty() });
        }

        let counts: SearchResult<Vec<BoxQuery>> = type_ids
            .iter()
            .map(|t| ctx.q_attribute_count(*t, min, max))
            .collect();
        let mut clauses = vec![ctx.q_or(counts?)];
        if min > 0 {
            let values: SearchResult<Vec<BoxQuery>> = type_ids
                .iter()
                .map(|t| self.value_query(*t, &constraint.value))
                .collect();
            clauses.push(ctx.q_or(values?));
        }
        Ok(ctx.q_and(clauses))
    }

    /// Compiles the value side of an attribute constraint for one type.
    fn value_query(&self, type_id: SctId, value: &AttributeValue) -> SearchResult<BoxQuery> {
        let ctx = &self.ctx;
        match value {
            AttributeValue::Concrete { operator, value } => Ok(match value {
                ConcreteComparand::Number(n) => ctx.q_concrete_numeric(type_id, *operator, *n),
                ConcreteComparand::String(s) => match operator {
                    ComparisonOperator::Equal => ctx.q_concrete_string(type_id, s),
                    ComparisonOperator::NotEqual => ctx.q_not(
                        ctx.q_attribute_any(type_id),
                        ctx.q_concrete_string(type_id, s),
                    ),
                    other => {
                        return Err(SearchError::Query(format!(
                            "operator {other} does not apply to string values"
                        )))
                    }
                },
                ConcreteComparand::Boolean(b) => {
                    ctx.q_concrete_string(type_id, if *b { "true" } else { "false" })
                }
            }),
            AttributeValue::Expression(expr) => match expr.unwrap_nested() {
                EclExpression::Any => Ok(ctx.q_attribute_any(type_id)),
                EclExpression::ConceptReference { concept_id, .. } => {
                    Ok(ctx.q_attribute_descendant_or_self_of(type_id, *concept_id))
                }
                EclExpression::DescendantOrSelfOf(inner) => {
                    let focus = self.focus_concept(inner)?;
                    Ok(ctx.q_attribute_descendant_or_self_of(type_id, focus))
                }
                EclExpression::DescendantOf(inner) => {
                    let focus = self.focus_concept(inner)?;
                    Ok(ctx.q_not(
                        ctx.q_attribute_descendant_or_self_of(type_id, focus),
                        ctx.q_attribute_exactly_equal(type_id, focus),
                    ))
                }
                other => {
                    // General value expressions realize to a concept set
                    // matched exactly.
                    let values = self.realize(other)?;
                    let queries = values
                        .iter()
                        .map(|v| ctx.q_attribute_exactly_equal(type_id, v))
                        .collect();
                    Ok(ctx.q_or(queries))
                }
            },
        }
    }
}
