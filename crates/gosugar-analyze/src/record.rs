//! Per-function collection of clone, free and use sites.

use gosugar_syntax::parse::named_children;
use gosugar_syntax::{BindingId, BindingTable, Intrinsic, IntrinsicCall, Position, SourceUnit};
use std::collections::BTreeMap;
use std::ops::Range;
use tree_sitter::Node;

/// Identity of a tracked name: its binding, or its text when unresolved.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BindingKey {
    Bound(BindingId),
    Named(String),
}

/// A place in the source worth pointing a diagnostic at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    pub position: Position,
    pub span: Range<usize>,
    /// End of the node in parsed text; orders sites within the unit.
    pub end: usize,
}

impl Site {
    fn of(unit: &SourceUnit, node: Node) -> Self {
        Self {
            position: unit.position(node),
            span: unit.span(node),
            end: node.end_byte(),
        }
    }
}

/// Clone/free balance of one binding within one function.
#[derive(Debug, Clone, Default)]
pub struct AllocationRecord {
    pub name: String,
    /// Clone-producing assignments, in source order.
    pub clones: Vec<Site>,
    /// `free` calls, in source order.
    pub frees: Vec<Site>,
    /// Start offsets of plain references.
    uses: Vec<usize>,
}

impl AllocationRecord {
    /// Referenced after the first allocation by anything but `free`.
    pub fn used(&self) -> bool {
        match self.clones.first() {
            Some(first) => self.uses.iter().any(|&u| u >= first.end),
            None => !self.uses.is_empty(),
        }
    }
}

/// Everything collected from one function body.
#[derive(Debug, Clone, Default)]
pub struct UnitRecords {
    pub records: BTreeMap<BindingKey, AllocationRecord>,
    /// Clone calls whose result is thrown away.
    pub discarded_clones: Vec<Site>,
}

pub struct Collector<'a, 't> {
    unit: &'t SourceUnit,
    table: &'a BindingTable,
    out: UnitRecords,
}

impl<'a, 't> Collector<'a, 't> {
    pub fn new(unit: &'t SourceUnit, table: &'a BindingTable) -> Self {
        Self {
            unit,
            table,
            out: UnitRecords::default(),
        }
    }

    pub fn finish(self) -> UnitRecords {
        self.out
    }

    fn key(&self, node: Node) -> BindingKey {
        match self.table.resolve_id(node) {
            Some(id) => BindingKey::Bound(id),
            None => BindingKey::Named(self.unit.node_text(node).to_string()),
        }
    }

    fn record(&mut self, node: Node) -> &mut AllocationRecord {
        let key = self.key(node);
        let name = self.unit.node_text(node);
        self.out
            .records
            .entry(key)
            .or_insert_with(|| AllocationRecord {
                name: name.to_string(),
                ..AllocationRecord::default()
            })
    }

    fn clone_call(&self, node: Node<'t>) -> Option<IntrinsicCall<'t>> {
        let node = strip_parens(node);
        IntrinsicCall::resolve(self.unit, self.table, node).filter(|c| c.kind == Intrinsic::Clone)
    }

    pub fn visit(&mut self, node: Node<'t>) {
        match node.kind() {
            "expression_statement" => {
                if let Some(expr) = node.named_child(0)
                    && let Some(call) = self.clone_call(expr)
                {
                    self.out.discarded_clones.push(Site::of(self.unit, call.node));
                }
                self.visit_children(node);
            }
            "short_var_declaration" | "assignment_statement" => self.visit_assignment(node),
            "var_spec" => self.visit_var_spec(node),
            "call_expression" => {
                if let Some(call) = IntrinsicCall::resolve(self.unit, self.table, node)
                    && call.kind == Intrinsic::Free
                {
                    let site = Site::of(self.unit, node);
                    let mut args = call.arguments.iter();
                    if let Some(&target) = args.next() {
                        if target.kind() == "identifier" {
                            self.record(target).frees.push(site);
                        } else {
                            self.visit(target);
                        }
                    }
                    for &arg in args {
                        self.visit(arg);
                    }
                    return;
                }
                self.visit_children(node);
            }
            "identifier" => {
                let offset = node.start_byte();
                self.record(node).uses.push(offset);
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node<'t>) {
        for child in named_children(node) {
            self.visit(child);
        }
    }

    fn visit_assignment(&mut self, node: Node<'t>) {
        let lhs = node
            .child_by_field_name("left")
            .map(named_children)
            .unwrap_or_default();
        let right = node.child_by_field_name("right");
        let rhs = right.map(named_children).unwrap_or_default();
        let plain = node.kind() == "short_var_declaration"
            || node.child_by_field_name("operator").map(|op| op.kind()) == Some("=");
        let paired = lhs.len() == rhs.len();

        if let Some(right) = right {
            self.visit(right);
        }
        for (i, target) in lhs.into_iter().enumerate() {
            let value = if paired { rhs.get(i).copied() } else { None };
            self.bind(target, value, plain);
        }
    }

    fn visit_var_spec(&mut self, node: Node<'t>) {
        let value = node.child_by_field_name("value");
        let rhs = value.map(named_children).unwrap_or_default();
        if let Some(value) = value {
            self.visit(value);
        }
        let mut cursor = node.walk();
        let names: Vec<_> = node.children_by_field_name("name", &mut cursor).collect();
        let paired = names.len() == rhs.len();
        for (i, name) in names.into_iter().enumerate() {
            let value = if paired { rhs.get(i).copied() } else { None };
            self.bind(name, value, true);
        }
    }

    /// One `target = value` pair. Plain targets are not uses.
    fn bind(&mut self, target: Node<'t>, value: Option<Node<'t>>, plain: bool) {
        let clone = value.and_then(|v| self.clone_call(v));
        if target.kind() != "identifier" {
            self.visit(target);
            return;
        }
        if self.unit.node_text(target) == "_" {
            if let Some(call) = clone {
                self.out.discarded_clones.push(Site::of(self.unit, call.node));
            }
            return;
        }
        if !plain {
            // `x += y` reads x.
            self.visit(target);
        }
        if let Some(call) = clone {
            let site = Site::of(self.unit, call.node);
            self.record(target).clones.push(site);
        }
    }
}

fn strip_parens(mut node: Node) -> Node {
    while node.kind() == "parenthesized_expression" {
        match node.named_child(0) {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}
