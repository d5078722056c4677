#![forbid(unsafe_code)]

//! Name resolution over linearized contracts.
//!
//! Flattened member tables are built by inserting ancestors from most-base to
//! most-derived and then the contract's own members, so a later insertion
//! shadows an earlier one of the same name.

use std::collections::HashMap;

use crate::{Contract, ContractId, Function, FunctionId, Program, VarDecl};

#[derive(Debug)]
pub struct ProgramIndex<'p> {
    program: &'p Program,
    by_name: HashMap<&'p str, ContractId>,
    state_vars: HashMap<ContractId, Vec<&'p VarDecl>>,
    functions: HashMap<ContractId, HashMap<&'p str, FunctionId>>,
}

impl<'p> ProgramIndex<'p> {
    pub fn new(program: &'p Program) -> Self {
        let mut by_name = HashMap::new();
        let mut state_vars = HashMap::new();
        let mut functions = HashMap::new();

        for contract in &program.contracts {
            by_name.insert(contract.name.as_str(), contract.id);

            let chain = linearization(program, contract);

            let mut vars: Vec<&'p VarDecl> = Vec::new();
            let mut fns: HashMap<&'p str, FunctionId> = HashMap::new();
            for c in chain {
                for v in &c.state_vars {
                    vars.retain(|existing| existing.name != v.name);
                    vars.push(v);
                }
                for fid in &c.functions {
                    if let Some(f) = program.function(*fid) {
                        fns.insert(f.name.as_str(), f.id);
                    }
                }
            }
            state_vars.insert(contract.id, vars);
            functions.insert(contract.id, fns);
        }

        Self {
            program,
            by_name,
            state_vars,
            functions,
        }
    }

    pub fn contract(&self, id: ContractId) -> Option<&'p Contract> {
        self.program.contract(id)
    }

    pub fn function(&self, id: FunctionId) -> Option<&'p Function> {
        self.program.function(id)
    }

    pub fn contract_by_name(&self, name: &str) -> Option<&'p Contract> {
        self.by_name.get(name).and_then(|id| self.contract(*id))
    }

    /// State variables visible inside `contract`, inherited ones included.
    pub fn state_vars(&self, contract: ContractId) -> &[&'p VarDecl] {
        self.state_vars
            .get(&contract)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Resolve a function name as seen from inside `contract`.
    pub fn resolve_member(&self, contract: ContractId, name: &str) -> Option<&'p Function> {
        let id = self.functions.get(&contract)?.get(name)?;
        self.function(*id)
    }

    /// Resolve `super.<name>` from inside `contract`: the first declaration
    /// strictly above the contract in its linearization.
    pub fn resolve_super(&self, contract: ContractId, name: &str) -> Option<&'p Function> {
        let c = self.contract(contract)?;
        c.bases.iter().find_map(|base| {
            let base = self.contract(*base)?;
            base.functions
                .iter()
                .filter_map(|fid| self.function(*fid))
                .find(|f| f.name == name)
        })
    }
}

/// The contract's ancestors from most-base to most-derived, followed by the contract.
fn linearization<'p>(program: &'p Program, contract: &'p Contract) -> Vec<&'p Contract> {
    let mut chain: Vec<&'p Contract> = contract
        .bases
        .iter()
        .rev()
        .filter_map(|id| program.contract(*id))
        .collect();
    chain.push(contract);
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ProgramBuilder, block};
    use crate::{ContractKind, TypeName};

    fn two_level() -> Program {
        let mut pb = ProgramBuilder::new();
        let base = pb.contract("Base", ContractKind::Contract, &[]);
        pb.state_var(base, "total", TypeName::uint(256));
        pb.state_var(base, "owner", TypeName::address());
        pb.function(base, "bump", &[], &[], Some(block(vec![])));
        pb.function(base, "only_base", &[], &[], Some(block(vec![])));

        let derived = pb.contract("Derived", ContractKind::Contract, &[base]);
        pb.state_var(derived, "total", TypeName::uint(8));
        pb.function(derived, "bump", &[], &[], Some(block(vec![])));
        pb.finish()
    }

    #[test]
    fn own_members_shadow_inherited_ones() {
        let program = two_level();
        let index = ProgramIndex::new(&program);
        let derived = index.contract_by_name("Derived").expect("derived").id;

        let vars = index.state_vars(derived);
        let names: Vec<&str> = vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["owner", "total"]);
        assert_eq!(vars[1].ty, TypeName::uint(8));

        let bump = index.resolve_member(derived, "bump").expect("bump");
        assert_eq!(bump.contract, derived);
        let inherited = index.resolve_member(derived, "only_base").expect("only_base");
        assert_ne!(inherited.contract, derived);
    }

    #[test]
    fn super_skips_the_redeclaring_contract() {
        let program = two_level();
        let index = ProgramIndex::new(&program);
        let derived = index.contract_by_name("Derived").expect("derived").id;
        let base = index.contract_by_name("Base").expect("base").id;

        let sup = index.resolve_super(derived, "bump").expect("super.bump");
        assert_eq!(sup.contract, base);
        assert!(index.resolve_super(base, "bump").is_none());
    }
}
