use std::fmt;
use std::sync::Arc;

/// SMT sorts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SmtSort {
    Bool,
    Int,
    String,
    Array(Box<SmtSort>, Box<SmtSort>),
    Datatype(Arc<DatatypeSort>),
}

/// A single-constructor record datatype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatatypeSort {
    pub name: String,
    pub fields: Vec<(String, SmtSort)>,
}

impl DatatypeSort {
    pub fn constructor_name(&self) -> String {
        format!("mk-{}", self.name)
    }

    pub fn field_name(&self, index: usize) -> Option<String> {
        self.fields
            .get(index)
            .map(|(f, _)| format!("{}-{}", self.name, f))
    }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|(f, _)| f == field)
    }

    pub fn field_sort(&self, index: usize) -> Option<&SmtSort> {
        self.fields.get(index).map(|(_, s)| s)
    }
}

impl SmtSort {
    pub fn array(index: SmtSort, element: SmtSort) -> Self {
        SmtSort::Array(Box::new(index), Box::new(element))
    }

    pub fn as_datatype(&self) -> Option<&Arc<DatatypeSort>> {
        match self {
            SmtSort::Datatype(dt) => Some(dt),
            _ => None,
        }
    }
}

impl fmt::Display for SmtSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmtSort::Bool => write!(f, "Bool"),
            SmtSort::Int => write!(f, "Int"),
            SmtSort::String => write!(f, "String"),
            SmtSort::Array(i, e) => write!(f, "(Array {i} {e})"),
            SmtSort::Datatype(dt) => write!(f, "{}", dt.name),
        }
    }
}
