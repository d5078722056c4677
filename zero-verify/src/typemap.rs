//! Program types to solver sorts, well-formedness predicates and defaults.

use std::sync::Arc;

use num::{BigInt, One, Zero};
use zero_ast::{ElementaryType, StructId, TypeArena, TypeName, UserType};

use crate::error::VerifyError;
use crate::smt::{DatatypeSort, SmtSort, SmtTerm};

/// Inclusive arithmetic bounds of an integer-like type, if it has any.
pub fn range(ty: &TypeName) -> Option<(BigInt, BigInt)> {
    let two = BigInt::from(2);
    match ty.as_elementary()? {
        ElementaryType::Uint(bits) => Some((BigInt::zero(), two.pow(u32::from(bits)) - BigInt::one())),
        ElementaryType::Int(bits) => {
            let half = two.pow(u32::from(bits) - 1);
            Some((-half.clone(), half - BigInt::one()))
        }
        ElementaryType::Address => Some((BigInt::zero(), two.pow(160) - BigInt::one())),
        _ => None,
    }
}

/// Range predicate `lo <= term <= hi`, or `true` for unbounded types.
pub fn range_predicate(term: &SmtTerm, ty: &TypeName) -> SmtTerm {
    match range(ty) {
        Some((lo, hi)) => SmtTerm::and(vec![
            term.clone().ge(SmtTerm::int(lo)),
            term.clone().le(SmtTerm::int(hi)),
        ]),
        None => SmtTerm::bool(true),
    }
}

/// Maps program types onto solver sorts.
///
/// Struct references resolve through the arena; reaching a struct again
/// while building its own sort is a type-resolution error.
#[derive(Debug)]
pub struct SortMapper<'p> {
    types: &'p TypeArena,
    allow_quantifiers: bool,
}

impl<'p> SortMapper<'p> {
    pub fn new(types: &'p TypeArena, allow_quantifiers: bool) -> Self {
        Self {
            types,
            allow_quantifiers,
        }
    }

    pub fn types(&self) -> &'p TypeArena {
        self.types
    }

    pub fn sort_for(&self, ty: &TypeName) -> Result<SmtSort, VerifyError> {
        self.sort_inner(ty, &mut Vec::new())
    }

    fn sort_inner(&self, ty: &TypeName, visiting: &mut Vec<StructId>) -> Result<SmtSort, VerifyError> {
        Ok(match ty {
            TypeName::Elementary(e) => match e {
                ElementaryType::Bool => SmtSort::Bool,
                ElementaryType::String | ElementaryType::Bytes => SmtSort::String,
                ElementaryType::Uint(_)
                | ElementaryType::Int(_)
                | ElementaryType::Address
                | ElementaryType::FixedBytes(_) => SmtSort::Int,
            },
            TypeName::UserDefined(UserType::Contract(_)) => SmtSort::Int,
            TypeName::Mapping(key, value) => {
                SmtSort::array(self.sort_inner(key, visiting)?, self.sort_inner(value, visiting)?)
            }
            TypeName::Array(base, _) => {
                let element = self.sort_inner(base, visiting)?;
                SmtSort::Datatype(Arc::new(DatatypeSort {
                    name: format!("array<{}>", sort_tag(&element)),
                    fields: vec![
                        ("data".to_string(), SmtSort::array(SmtSort::Int, element)),
                        ("length".to_string(), SmtSort::Int),
                    ],
                }))
            }
            TypeName::UserDefined(UserType::Struct(id)) => {
                let def = self.types.get(*id).ok_or_else(|| {
                    VerifyError::type_resolution(format!("struct#{}", id.0), "unknown struct id")
                })?;
                if visiting.contains(id) {
                    return Err(VerifyError::type_resolution(
                        def.name.clone(),
                        format!("struct `{}` contains itself", def.name),
                    ));
                }
                visiting.push(*id);
                let mut fields = Vec::with_capacity(def.members.len());
                for m in &def.members {
                    fields.push((m.name.clone(), self.sort_inner(&m.ty, visiting)?));
                }
                visiting.pop();
                SmtSort::Datatype(Arc::new(DatatypeSort {
                    name: self.struct_sort_name(*id, &def.name),
                    fields,
                }))
            }
        })
    }

    // Struct names are not unique across contracts.
    fn struct_sort_name(&self, id: StructId, name: &str) -> String {
        let clash = self
            .types
            .iter()
            .any(|(other, def)| other != id && def.name == name);
        if clash {
            format!("{name}!{}", id.0)
        } else {
            name.to_string()
        }
    }

    /// Well-formedness predicate over `term` of type `ty`.
    pub fn well_formed(&self, term: &SmtTerm, ty: &TypeName) -> Result<SmtTerm, VerifyError> {
        self.wf_inner(term, ty, 0)
    }

    fn wf_inner(&self, term: &SmtTerm, ty: &TypeName, depth: usize) -> Result<SmtTerm, VerifyError> {
        Ok(match ty {
            TypeName::Elementary(e) if e.is_unsigned() => term.clone().ge(SmtTerm::int(0)),
            TypeName::Elementary(_) => SmtTerm::bool(true),
            TypeName::UserDefined(UserType::Contract(_)) => term.clone().ge(SmtTerm::int(0)),
            TypeName::UserDefined(UserType::Struct(_)) => {
                let sort = self.sort_for(ty)?;
                let (dt, members) = self.struct_parts(&sort, ty)?;
                let mut parts = Vec::with_capacity(members.len());
                for (i, m) in members.iter().enumerate() {
                    parts.push(self.wf_inner(&term.clone().field(&dt, i), &m.ty, depth)?);
                }
                SmtTerm::and(parts)
            }
            TypeName::Array(base, len) => {
                let sort = self.sort_for(ty)?;
                let dt = datatype_of(&sort)?;
                let length = term.clone().field(&dt, 1);
                let shape = match len {
                    Some(n) => length.clone().eq(SmtTerm::int(*n)),
                    None => length.clone().ge(SmtTerm::int(0)),
                };
                if !self.allow_quantifiers {
                    return Ok(shape);
                }
                let k = format!("k!{depth}");
                let element = term.clone().field(&dt, 0).select(SmtTerm::var(&k));
                let element_wf = self.wf_inner(&element, base, depth + 1)?;
                if element_wf.is_true() {
                    return Ok(shape);
                }
                let in_bounds = SmtTerm::and(vec![
                    SmtTerm::var(&k).ge(SmtTerm::int(0)),
                    SmtTerm::var(&k).lt(length),
                ]);
                SmtTerm::and(vec![
                    shape,
                    SmtTerm::forall(vec![(k, SmtSort::Int)], in_bounds.implies(element_wf)),
                ])
            }
            TypeName::Mapping(key, value) => {
                if !self.allow_quantifiers {
                    return Ok(SmtTerm::bool(true));
                }
                let k = format!("k!{depth}");
                let element_wf = self.wf_inner(&term.clone().select(SmtTerm::var(&k)), value, depth + 1)?;
                if element_wf.is_true() {
                    return Ok(element_wf);
                }
                SmtTerm::forall(vec![(k, self.sort_for(key)?)], element_wf)
            }
        })
    }

    /// The zero value of `ty`.
    pub fn default_value(&self, ty: &TypeName) -> Result<SmtTerm, VerifyError> {
        Ok(match ty {
            TypeName::Elementary(ElementaryType::Bool) => SmtTerm::bool(false),
            TypeName::Elementary(ElementaryType::String | ElementaryType::Bytes) => SmtTerm::string(""),
            TypeName::Elementary(_) | TypeName::UserDefined(UserType::Contract(_)) => SmtTerm::int(0),
            TypeName::Mapping(key, value) => {
                SmtTerm::const_array(self.sort_for(key)?, self.default_value(value)?)
            }
            TypeName::Array(base, len) => {
                let dt = datatype_of(&self.sort_for(ty)?)?;
                let data = SmtTerm::const_array(SmtSort::Int, self.default_value(base)?);
                let length = SmtTerm::int(len.unwrap_or(0));
                SmtTerm::Construct(dt, vec![data, length])
            }
            TypeName::UserDefined(UserType::Struct(_)) => {
                let sort = self.sort_for(ty)?;
                let (dt, members) = self.struct_parts(&sort, ty)?;
                let mut values = Vec::with_capacity(members.len());
                for m in members {
                    values.push(self.default_value(&m.ty)?);
                }
                SmtTerm::Construct(dt, values)
            }
        })
    }

    fn struct_parts(
        &self,
        sort: &SmtSort,
        ty: &TypeName,
    ) -> Result<(Arc<DatatypeSort>, &'p [zero_ast::VarDecl]), VerifyError> {
        let dt = datatype_of(sort)?;
        let TypeName::UserDefined(UserType::Struct(id)) = ty else {
            return Err(VerifyError::type_resolution(dt.name.clone(), "not a struct"));
        };
        let def = self
            .types
            .get(*id)
            .ok_or_else(|| VerifyError::type_resolution(dt.name.clone(), "unknown struct id"))?;
        Ok((dt, def.members.as_slice()))
    }

    /// Check every struct in the arena once, so later lookups cannot fail.
    pub fn validate_structs(&self) -> Result<(), VerifyError> {
        for (id, def) in self.types.iter() {
            self.sort_for(&TypeName::UserDefined(UserType::Struct(id)))
                .map_err(|e| match e {
                    VerifyError::TypeResolution { message, span, .. } => VerifyError::TypeResolution {
                        name: def.name.clone(),
                        message,
                        span,
                    },
                    other => other,
                })?;
        }
        Ok(())
    }
}

fn datatype_of(sort: &SmtSort) -> Result<Arc<DatatypeSort>, VerifyError> {
    sort.as_datatype()
        .cloned()
        .ok_or_else(|| VerifyError::type_resolution(sort.to_string(), "expected a record sort"))
}

/// Compact sort name used inside generated datatype names.
fn sort_tag(sort: &SmtSort) -> String {
    match sort {
        SmtSort::Bool => "Bool".to_string(),
        SmtSort::Int => "Int".to_string(),
        SmtSort::String => "String".to_string(),
        SmtSort::Array(i, e) => format!("map<{},{}>", sort_tag(i), sort_tag(e)),
        SmtSort::Datatype(dt) => dt.name.clone(),
    }
}
