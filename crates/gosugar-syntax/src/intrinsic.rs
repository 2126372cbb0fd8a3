//! Name resolution for the memory intrinsics.

use crate::diagnostic::Position;
use crate::parse::{SourceUnit, named_children};
use crate::track::{BindingId, BindingTable};
use serde::Serialize;
use tree_sitter::Node;

/// The dialect's built-in memory operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intrinsic {
    Clone,
    Free,
    Grow,
}

impl Intrinsic {
    pub const ALL: [Intrinsic; 3] = [Intrinsic::Clone, Intrinsic::Free, Intrinsic::Grow];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|i| i.name() == name)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Intrinsic::Clone => "clone",
            Intrinsic::Free => "free",
            Intrinsic::Grow => "grow",
        }
    }

    /// Number of arguments the intrinsic takes.
    pub fn arity(&self) -> usize {
        match self {
            Intrinsic::Clone | Intrinsic::Free => 1,
            Intrinsic::Grow => 2,
        }
    }
}

/// A resolved call to an intrinsic.
#[derive(Debug, Clone)]
pub struct IntrinsicCall<'t> {
    pub kind: Intrinsic,
    pub node: Node<'t>,
    pub arguments: Vec<Node<'t>>,
    /// Binding of the first argument when it is a resolved identifier.
    pub target: Option<BindingId>,
    pub position: Position,
}

impl<'t> IntrinsicCall<'t> {
    /// Resolve `node` as an intrinsic call.
    ///
    /// Returns `None` for anything else, including calls whose callee name
    /// resolves to a user definition that shadows the intrinsic.
    pub fn resolve(unit: &'t SourceUnit, table: &BindingTable, node: Node<'t>) -> Option<Self> {
        if node.kind() != "call_expression" {
            return None;
        }
        let function = node.child_by_field_name("function")?;
        if function.kind() != "identifier" || table.resolve_id(function).is_some() {
            return None;
        }
        let kind = Intrinsic::from_name(unit.node_text(function))?;
        let arguments = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();
        let target = arguments
            .first()
            .filter(|a| a.kind() == "identifier")
            .and_then(|a| table.resolve_id(*a));
        Some(Self {
            kind,
            node,
            arguments,
            target,
            position: unit.position(node),
        })
    }

    pub fn has_arity(&self) -> bool {
        self.arguments.len() == self.kind.arity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::track;

    fn calls(src: &str) -> Vec<(Intrinsic, usize, bool)> {
        let unit = SourceUnit::parse(src).unwrap();
        let tracked = track(&unit);
        let mut out = Vec::new();
        let mut stack = vec![unit.root()];
        while let Some(node) = stack.pop() {
            if let Some(call) = IntrinsicCall::resolve(&unit, &tracked.table, node) {
                out.push((call.kind, call.arguments.len(), call.target.is_some()));
            }
            let mut cursor = node.walk();
            stack.extend(node.children(&mut cursor));
        }
        out
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Intrinsic::from_name("grow"), Some(Intrinsic::Grow));
        assert_eq!(Intrinsic::from_name("copy"), None);
        assert_eq!(Intrinsic::Grow.arity(), 2);
    }

    #[test]
    fn test_resolves_target() {
        let found = calls("package p\n\nfunc f() {\n\ts := &[]int{1}\n\tfree(s)\n}\n");
        assert_eq!(found, vec![(Intrinsic::Free, 1, true)]);
    }

    #[test]
    fn test_shadowed_by_user_function() {
        let found = calls("package p\n\nfunc free(x int) {}\n\nfunc f() {\n\tfree(1)\n}\n");
        assert!(found.is_empty());
    }

    #[test]
    fn test_shadowed_by_local() {
        let found = calls(
            "package p\n\nfunc f() {\n\tclone := func(x int) int { return x }\n\t_ = clone(1)\n}\n",
        );
        assert!(found.is_empty());
    }
}
