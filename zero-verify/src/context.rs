//! Immutable tables shared by every path verification of one run.

use std::collections::HashMap;

use tracing::{debug, warn};
use zero_ast::{FunctionId, Program, ProgramIndex};

use crate::config::VerifyOptions;
use crate::error::VerifyError;
use crate::spec_compiler::{CompiledSpec, NameGen};
use crate::typemap::SortMapper;

/// Program index, sort mapper and compiled contracts.
///
/// Built once, sequentially, before any path is verified. Compiled contracts
/// live in a side table keyed by [`FunctionId`], so the program stays untouched.
#[derive(Debug)]
pub struct VerificationContext<'p> {
    index: ProgramIndex<'p>,
    mapper: SortMapper<'p>,
    options: VerifyOptions,
    specs: HashMap<FunctionId, CompiledSpec>,
    spec_errors: HashMap<FunctionId, VerifyError>,
}

impl<'p> VerificationContext<'p> {
    /// Resolve every declared type and compile every function's specification.
    ///
    /// A type that cannot be mapped to a solver sort fails the whole run.
    /// A malformed specification only fails its own function.
    pub fn new(program: &'p Program, options: VerifyOptions) -> Result<Self, VerifyError> {
        let mapper = SortMapper::new(&program.types, options.allow_quantifiers);
        mapper.validate_structs()?;
        for contract in &program.contracts {
            for v in &contract.state_vars {
                mapper
                    .sort_for(&v.ty)
                    .map_err(|e| e.at_declaration(&v.name, v.span))?;
            }
        }
        for function in &program.functions {
            for v in function.params.iter().chain(&function.returns) {
                mapper
                    .sort_for(&v.ty)
                    .map_err(|e| e.at_declaration(&v.name, v.span))?;
            }
        }

        let mut names = NameGen::new();
        let mut specs = HashMap::new();
        let mut spec_errors = HashMap::new();
        for function in &program.functions {
            match CompiledSpec::compile(function, &mut names) {
                Ok(spec) => {
                    if !spec.is_identity() {
                        debug!(
                            function = %function.name,
                            clauses = spec.clauses.len(),
                            reverts_if = spec.reverts_if.len(),
                            "compiled specification"
                        );
                    }
                    specs.insert(function.id, spec);
                }
                Err(err) => {
                    warn!(function = %function.name, error = %err, "specification rejected");
                    spec_errors.insert(function.id, err);
                }
            }
        }

        Ok(Self {
            index: ProgramIndex::new(program),
            mapper,
            options,
            specs,
            spec_errors,
        })
    }

    pub fn index(&self) -> &ProgramIndex<'p> {
        &self.index
    }

    pub fn mapper(&self) -> &SortMapper<'p> {
        &self.mapper
    }

    pub fn options(&self) -> &VerifyOptions {
        &self.options
    }

    pub fn spec(&self, function: FunctionId) -> Option<&CompiledSpec> {
        self.specs.get(&function)
    }

    pub fn spec_error(&self, function: FunctionId) -> Option<&VerifyError> {
        self.spec_errors.get(&function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zero_ast::builder::{block, call_stmt, ident, num, ProgramBuilder};
    use zero_ast::{ContractKind, TypeName, UserType};

    #[test]
    fn self_containing_struct_aborts_the_run() {
        let mut pb = ProgramBuilder::new();
        let c = pb.contract("C", ContractKind::Contract, &[]);
        let node = pb.reserve_struct(c, "Node");
        pb.define_struct(node, &[("next", TypeName::UserDefined(UserType::Struct(node)))]);
        let program = pb.finish();

        let err = VerificationContext::new(&program, VerifyOptions::default()).expect_err("cycle");
        assert!(matches!(err, VerifyError::TypeResolution { ref name, .. } if name == "Node"));
    }

    #[test]
    fn malformed_specification_is_kept_per_function() {
        let mut pb = ProgramBuilder::new();
        let c = pb.contract("C", ContractKind::Contract, &[]);
        let bad = pb.function(c, "bad", &[], &[], Some(block(vec![call_stmt("ensures", vec![num(1)])])));
        let good = pb.function(
            c,
            "good",
            &[("x", TypeName::uint(256))],
            &[],
            Some(block(vec![call_stmt("assert", vec![ident("x")])])),
        );
        let program = pb.finish();

        let ctx = VerificationContext::new(&program, VerifyOptions::default()).expect("context");
        assert!(matches!(ctx.spec_error(bad), Some(VerifyError::Configuration { .. })));
        assert!(ctx.spec(bad).is_none());
        assert!(ctx.spec(good).is_some_and(CompiledSpec::is_identity));
    }
}
