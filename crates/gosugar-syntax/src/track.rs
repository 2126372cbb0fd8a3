//! Pointer-sugar type tracker.
//!
//! One linear walk over the parsed tree with a lexical scope stack:
//!
//! ```text
//!   package scope       top-level funcs, vars, consts, imports
//!     function scope    receiver, parameters, named results, body
//!       block scope     { ... }, if/for/switch/select headers, case clauses
//! ```
//!
//! Every binding gets a [`ContainerKind`] from its declaration: a declared
//! `*[]T`, `*map[K]V` or `*string` type, a `&[]T{..}` / `&map[K]V{..}`
//! literal, `new(..)` of a container type, a coercion, a `clone` of another
//! binding, or a call to a same-file function with a single sugared result.
//! A binding keeps its first kind; rebinding it to a different sugared kind
//! is a `classification_conflict` error.

use crate::diagnostic::{Check, Diagnostic, Position};
use crate::parse::{SourceUnit, int_literal_value, literal_elements, named_children};
use crate::preprocess::Sugar;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tree_sitter::Node;

/// Dialect-level container kind of a binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    #[default]
    #[serde(rename = "none")]
    Plain,
    Slice,
    Map,
    String,
}

impl ContainerKind {
    pub fn is_sugar(&self) -> bool {
        !matches!(self, ContainerKind::Plain)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Plain => "none",
            ContainerKind::Slice => "slice",
            ContainerKind::Map => "map",
            ContainerKind::String => "string",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct BindingId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub id: BindingId,
    pub name: String,
    pub kind: ContainerKind,
    pub site: Position,
    pub scope: ScopeId,
    /// Byte length when initialized from a byte-sequence literal and never
    /// reassigned or address-taken.
    pub byte_len: Option<usize>,
    /// Start of the declaring identifier in the parsed text.
    #[serde(skip)]
    pub offset: usize,
}

/// Every binding of a unit plus identifier resolution.
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    bindings: Vec<Binding>,
    /// Identifier start byte -> binding it denotes.
    references: HashMap<usize, BindingId>,
    /// Local import name -> import path.
    imports: BTreeMap<String, String>,
}

impl BindingTable {
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn get(&self, id: BindingId) -> &Binding {
        &self.bindings[id.0 as usize]
    }

    fn get_mut(&mut self, id: BindingId) -> &mut Binding {
        &mut self.bindings[id.0 as usize]
    }

    /// Binding an identifier node denotes, if any.
    pub fn resolve_id(&self, node: Node) -> Option<BindingId> {
        if node.kind() != "identifier" {
            return None;
        }
        self.references.get(&node.start_byte()).copied()
    }

    pub fn resolve(&self, node: Node) -> Option<&Binding> {
        self.resolve_id(node).map(|id| self.get(id))
    }

    /// Container kind of an identifier node; `Plain` for anything else.
    pub fn kind_of(&self, node: Node) -> ContainerKind {
        self.resolve(node).map_or(ContainerKind::Plain, |b| b.kind)
    }

    pub fn imports(&self) -> &BTreeMap<String, String> {
        &self.imports
    }

    pub fn is_import(&self, name: &str) -> bool {
        self.imports.contains_key(name)
    }

    pub fn import_path(&self, name: &str) -> Option<&str> {
        self.imports.get(name).map(String::as_str)
    }

    /// Package-level user definitions named like an intrinsic.
    pub fn shadowed_intrinsics(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(|b| {
            b.scope == ScopeId(0) && crate::intrinsic::Intrinsic::from_name(&b.name).is_some()
        })
    }

    /// Statically known byte length of an expression.
    pub fn static_byte_len(&self, unit: &SourceUnit, node: Node) -> Option<usize> {
        match node.kind() {
            "parenthesized_expression" => self.static_byte_len(unit, node.named_child(0)?),
            "unary_expression" if operator(node) == Some("&") => {
                self.static_byte_len(unit, node.child_by_field_name("operand")?)
            }
            "identifier" => self.resolve(node)?.byte_len,
            "interpreted_string_literal" => {
                let text = unit.node_text(node);
                (!text.contains('\\')).then(|| text.len().saturating_sub(2))
            }
            "raw_string_literal" => {
                let text = unit.node_text(node);
                // Carriage returns are discarded from raw strings.
                Some(text.len().saturating_sub(2) - text.matches('\r').count())
            }
            "composite_literal" => {
                let ty = node.child_by_field_name("type")?;
                let elements = literal_elements(node.child_by_field_name("body")?);
                if elements.iter().any(|e| e.kind() == "keyed_element") {
                    return None;
                }
                let element = ty.child_by_field_name("element")?;
                if !is_byte_type(unit, element) {
                    return None;
                }
                match ty.kind() {
                    "slice_type" | "implicit_length_array_type" => Some(elements.len()),
                    "array_type" => {
                        let len = ty.child_by_field_name("length")?;
                        int_literal_value(unit.node_text(len)).map(|n| n as usize)
                    }
                    _ => None,
                }
            }
            "type_conversion_expression" => {
                let ty = node.child_by_field_name("type")?;
                if ty.kind() != "slice_type" || !is_byte_type(unit, ty.child_by_field_name("element")?)
                {
                    return None;
                }
                self.static_byte_len(unit, node.child_by_field_name("operand")?)
            }
            "call_expression" => {
                let function = node.child_by_field_name("function")?;
                let args = named_children(node.child_by_field_name("arguments")?);
                let is_string_conversion = function.kind() == "identifier"
                    && unit.node_text(function) == "string"
                    && self.resolve_id(function).is_none();
                match args.as_slice() {
                    [arg] if is_string_conversion => self.static_byte_len(unit, *arg),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

fn is_byte_type(unit: &SourceUnit, node: Node) -> bool {
    matches!(unit.node_text(node), "byte" | "uint8")
}

fn operator(node: Node) -> Option<&'static str> {
    node.child_by_field_name("operator").map(|op| op.kind())
}

fn has_token(node: Node, token: &str) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor).any(|c| c.kind() == token)
}

/// Kind implied by a declared type: `*[]T`, `*map[K]V`, `*string`.
pub fn type_kind(unit: &SourceUnit, ty: Node) -> ContainerKind {
    match ty.kind() {
        "parenthesized_type" => ty
            .named_child(0)
            .map_or(ContainerKind::Plain, |inner| type_kind(unit, inner)),
        "pointer_type" => match ty.named_child(0) {
            Some(inner) if inner.kind() == "slice_type" => ContainerKind::Slice,
            Some(inner) if inner.kind() == "map_type" => ContainerKind::Map,
            Some(inner) if unit.node_text(inner) == "string" => ContainerKind::String,
            _ => ContainerKind::Plain,
        },
        _ => ContainerKind::Plain,
    }
}

/// Output of [`track`].
#[derive(Debug, Clone, Default)]
pub struct Tracked {
    pub table: BindingTable,
    pub diagnostics: Vec<Diagnostic>,
}

/// Classify every binding of `unit`.
pub fn track(unit: &SourceUnit) -> Tracked {
    let mut tracker = Tracker {
        unit,
        table: BindingTable::default(),
        scopes: Vec::new(),
        next_scope: 0,
        results: HashMap::new(),
        diagnostics: Vec::new(),
    };
    tracker.run();
    tracing::debug!(
        bindings = tracker.table.bindings.len(),
        diagnostics = tracker.diagnostics.len(),
        "tracked bindings"
    );
    Tracked {
        table: tracker.table,
        diagnostics: tracker.diagnostics,
    }
}

struct Scope {
    id: ScopeId,
    names: HashMap<String, BindingId>,
}

struct Tracker<'u> {
    unit: &'u SourceUnit,
    table: BindingTable,
    scopes: Vec<Scope>,
    next_scope: u32,
    /// Same-file function -> kind of its single result.
    results: HashMap<BindingId, ContainerKind>,
    diagnostics: Vec<Diagnostic>,
}

impl<'u> Tracker<'u> {
    fn run(&mut self) {
        let root = self.unit.root();
        self.push_scope();
        let top = named_children(root);
        for &node in &top {
            self.predeclare(node);
        }
        // Package-level state first so function bodies see it regardless of order.
        let (functions, rest): (Vec<_>, Vec<_>) = top
            .into_iter()
            .partition(|n| matches!(n.kind(), "function_declaration" | "method_declaration"));
        for node in rest.into_iter().chain(functions) {
            self.visit(node);
        }
        self.pop_scope();
    }

    fn predeclare(&mut self, node: Node<'u>) {
        match node.kind() {
            "import_declaration" => self.record_imports(node),
            "function_declaration" => {
                let Some(name) = node.child_by_field_name("name") else {
                    return;
                };
                let id = self.declare(name, ContainerKind::Plain, None);
                if let Some(result) = node.child_by_field_name("result") {
                    let kind = self.single_result_kind(result);
                    if kind.is_sugar() {
                        self.results.insert(id, kind);
                    }
                }
            }
            _ => {}
        }
    }

    fn record_imports(&mut self, node: Node<'u>) {
        let unit = self.unit;
        for spec in descendants_of_kind(node, "import_spec") {
            let Some(path) = spec.child_by_field_name("path") else {
                continue;
            };
            let path = unit.node_text(path).trim_matches(|c| c == '"' || c == '`');
            let name = match spec.child_by_field_name("name") {
                Some(name) => unit.node_text(name).to_string(),
                None => path.rsplit('/').next().unwrap_or(path).to_string(),
            };
            if name != "_" && name != "." {
                self.table.imports.insert(name, path.to_string());
            }
        }
    }

    fn single_result_kind(&self, result: Node<'u>) -> ContainerKind {
        if result.kind() != "parameter_list" {
            return type_kind(self.unit, result);
        }
        let params: Vec<_> = named_children(result)
            .into_iter()
            .filter(|p| p.kind() == "parameter_declaration")
            .collect();
        match params.as_slice() {
            [param] => {
                let mut cursor = param.walk();
                if param.children_by_field_name("name", &mut cursor).count() > 1 {
                    return ContainerKind::Plain;
                }
                param
                    .child_by_field_name("type")
                    .map_or(ContainerKind::Plain, |ty| type_kind(self.unit, ty))
            }
            _ => ContainerKind::Plain,
        }
    }

    // =========================================================================
    // Scopes
    // =========================================================================

    fn push_scope(&mut self) {
        let id = ScopeId(self.next_scope);
        self.next_scope += 1;
        self.scopes.push(Scope {
            id,
            names: HashMap::new(),
        });
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn lookup(&self, name: &str) -> Option<BindingId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.names.get(name).copied())
    }

    fn lookup_local(&self, name: &str) -> Option<BindingId> {
        self.scopes.last()?.names.get(name).copied()
    }

    fn declare(&mut self, node: Node<'u>, kind: ContainerKind, byte_len: Option<usize>) -> BindingId {
        let unit = self.unit;
        let name = unit.node_text(node).to_string();
        let id = BindingId(self.table.bindings.len() as u32);
        let scope = self.scopes.last().map_or(ScopeId(0), |s| s.id);
        tracing::trace!(%name, %kind, ?scope, "declare");
        self.table.bindings.push(Binding {
            id,
            name: name.clone(),
            kind,
            site: unit.position(node),
            scope,
            byte_len,
            offset: node.start_byte(),
        });
        self.table.references.insert(node.start_byte(), id);
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.insert(name, id);
        }
        id
    }

    /// Record a new value for an existing binding.
    fn rebind(&mut self, id: BindingId, kind: ContainerKind, at: Node<'u>) {
        let binding = self.table.get_mut(id);
        binding.byte_len = None;
        if binding.kind.is_sugar() && kind.is_sugar() && binding.kind != kind {
            let message = format!(
                "`{}` is a pointer-sugared {} and cannot be rebound to a {} in the same scope",
                binding.name, binding.kind, kind
            );
            let diag = Diagnostic::error(Check::ClassificationConflict, message)
                .with_hint("declare a new variable for the second container");
            self.diagnostics.push(self.unit.locate(diag, at));
        }
    }

    // =========================================================================
    // Walk
    // =========================================================================

    fn visit(&mut self, node: Node<'u>) {
        match node.kind() {
            "function_declaration" | "method_declaration" | "func_literal" => {
                self.visit_function(node)
            }
            "block"
            | "if_statement"
            | "for_statement"
            | "expression_switch_statement"
            | "select_statement"
            | "expression_case"
            | "default_case"
            | "type_case"
            | "communication_case" => {
                self.push_scope();
                self.visit_children(node);
                self.pop_scope();
            }
            "type_switch_statement" => self.visit_type_switch(node),
            "short_var_declaration" => self.visit_short_var(node),
            "assignment_statement" => self.visit_assignment(node),
            "var_spec" | "const_spec" => self.visit_spec(node),
            "range_clause" | "receive_statement" => self.visit_binding_clause(node),
            "import_declaration" | "package_clause" => {}
            "unary_expression" => {
                self.visit_children(node);
                if operator(node) == Some("&")
                    && let Some(operand) = node.child_by_field_name("operand")
                    && let Some(id) = self.table.resolve_id(operand)
                {
                    self.table.get_mut(id).byte_len = None;
                }
            }
            "identifier" => {
                let unit = self.unit;
                if let Some(id) = self.lookup(unit.node_text(node)) {
                    self.table.references.insert(node.start_byte(), id);
                }
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node<'u>) {
        for child in named_children(node) {
            self.visit(child);
        }
    }

    fn visit_function(&mut self, node: Node<'u>) {
        self.push_scope();
        for field in ["receiver", "parameters"] {
            if let Some(list) = node.child_by_field_name(field) {
                self.declare_params(list);
            }
        }
        if let Some(result) = node.child_by_field_name("result")
            && result.kind() == "parameter_list"
        {
            self.declare_params(result);
        }
        // Parameters and the body's top level share one scope.
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children(body);
        }
        self.pop_scope();
    }

    fn declare_params(&mut self, list: Node<'u>) {
        for param in named_children(list) {
            let kind = match param.kind() {
                "parameter_declaration" => param
                    .child_by_field_name("type")
                    .map_or(ContainerKind::Plain, |ty| type_kind(self.unit, ty)),
                "variadic_parameter_declaration" => ContainerKind::Plain,
                _ => continue,
            };
            let mut cursor = param.walk();
            let names: Vec<_> = param.children_by_field_name("name", &mut cursor).collect();
            for name in names {
                self.declare(name, kind, None);
            }
        }
    }

    fn visit_short_var(&mut self, node: Node<'u>) {
        let unit = self.unit;
        let right = node.child_by_field_name("right");
        if let Some(right) = right {
            self.visit(right);
        }
        let lhs = node
            .child_by_field_name("left")
            .map(named_children)
            .unwrap_or_default();
        let rhs = right.map(named_children).unwrap_or_default();
        let paired = lhs.len() == rhs.len();

        for (i, target) in lhs.into_iter().enumerate() {
            if target.kind() != "identifier" {
                self.visit(target);
                continue;
            }
            let name = unit.node_text(target);
            if name == "_" {
                continue;
            }
            let value = paired.then(|| rhs[i]);
            let kind = value.map_or(ContainerKind::Plain, |v| self.classify(v));
            match self.lookup_local(name) {
                // Redeclaration in `a, err := ...` reuses the existing binding.
                Some(existing) => {
                    self.table.references.insert(target.start_byte(), existing);
                    self.rebind(existing, kind, target);
                }
                None => {
                    let byte_len = value.and_then(|v| self.table.static_byte_len(unit, v));
                    self.declare(target, kind, byte_len);
                }
            }
        }
    }

    fn visit_assignment(&mut self, node: Node<'u>) {
        let right = node.child_by_field_name("right");
        if let Some(right) = right {
            self.visit(right);
        }
        let plain = operator(node) == Some("=");
        let lhs = node
            .child_by_field_name("left")
            .map(named_children)
            .unwrap_or_default();
        let rhs = right.map(named_children).unwrap_or_default();
        let paired = lhs.len() == rhs.len();

        for (i, target) in lhs.into_iter().enumerate() {
            self.visit(target);
            let Some(id) = self.table.resolve_id(target) else {
                continue;
            };
            if plain && paired {
                let kind = self.classify(rhs[i]);
                self.rebind(id, kind, target);
            } else {
                self.table.get_mut(id).byte_len = None;
            }
        }
    }

    fn visit_spec(&mut self, node: Node<'u>) {
        let unit = self.unit;
        let value = node.child_by_field_name("value");
        if let Some(value) = value {
            self.visit(value);
        }
        let ty = node.child_by_field_name("type");
        if let Some(ty) = ty {
            self.visit(ty);
        }
        let declared = ty.map_or(ContainerKind::Plain, |ty| type_kind(unit, ty));
        let rhs = value.map(named_children).unwrap_or_default();

        let mut cursor = node.walk();
        let names: Vec<_> = node.children_by_field_name("name", &mut cursor).collect();
        let paired = names.len() == rhs.len();
        for (i, name) in names.into_iter().enumerate() {
            if unit.node_text(name) == "_" {
                continue;
            }
            let value = paired.then(|| rhs[i]);
            let kind = if declared.is_sugar() {
                declared
            } else {
                value.map_or(ContainerKind::Plain, |v| self.classify(v))
            };
            let byte_len = value.and_then(|v| self.table.static_byte_len(unit, v));
            self.declare(name, kind, byte_len);
        }
    }

    /// `for k, v := range x` and `case v := <-ch`.
    fn visit_binding_clause(&mut self, node: Node<'u>) {
        if let Some(right) = node.child_by_field_name("right") {
            self.visit(right);
        }
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        if !has_token(node, ":=") {
            self.visit(left);
            return;
        }
        let unit = self.unit;
        for target in named_children(left) {
            if target.kind() == "identifier" && unit.node_text(target) != "_" {
                self.declare(target, ContainerKind::Plain, None);
            }
        }
    }

    fn visit_type_switch(&mut self, node: Node<'u>) {
        let unit = self.unit;
        self.push_scope();
        let alias = node.child_by_field_name("alias");
        let value = node.child_by_field_name("value");
        for child in named_children(node) {
            if Some(child) == alias {
                continue;
            }
            self.visit(child);
            if Some(child) == value
                && let Some(alias) = alias
            {
                for name in named_children(alias) {
                    if unit.node_text(name) != "_" {
                        self.declare(name, ContainerKind::Plain, None);
                    }
                }
            }
        }
        self.pop_scope();
    }

    // =========================================================================
    // Classification
    // =========================================================================

    fn classify(&self, node: Node<'u>) -> ContainerKind {
        match node.kind() {
            "parenthesized_expression" => node
                .named_child(0)
                .map_or(ContainerKind::Plain, |inner| self.classify(inner)),
            "unary_expression" if operator(node) == Some("&") => {
                let literal_type = node
                    .child_by_field_name("operand")
                    .filter(|operand| operand.kind() == "composite_literal")
                    .and_then(|operand| operand.child_by_field_name("type"));
                match literal_type.map(|ty| ty.kind()) {
                    Some("slice_type") => ContainerKind::Slice,
                    Some("map_type") => ContainerKind::Map,
                    _ => ContainerKind::Plain,
                }
            }
            "call_expression" => self.classify_call(node),
            "identifier" => self.table.kind_of(node),
            _ => ContainerKind::Plain,
        }
    }

    fn classify_call(&self, node: Node<'u>) -> ContainerKind {
        let unit = self.unit;
        if let Some((_, sub)) = unit.preprocessed().substitution_at(node.start_byte())
            && matches!(sub.sugar, Sugar::Cast { .. })
        {
            return ContainerKind::Slice;
        }
        let Some(function) = node.child_by_field_name("function") else {
            return ContainerKind::Plain;
        };
        if function.kind() != "identifier" {
            return ContainerKind::Plain;
        }
        if let Some(id) = self.table.resolve_id(function) {
            return self.results.get(&id).copied().unwrap_or_default();
        }
        let args = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();
        match (unit.node_text(function), args.first()) {
            ("new", Some(ty)) => match ty.kind() {
                "slice_type" => ContainerKind::Slice,
                "map_type" => ContainerKind::Map,
                _ if unit.node_text(*ty) == "string" => ContainerKind::String,
                _ => ContainerKind::Plain,
            },
            ("clone", Some(arg)) => self.classify(*arg),
            _ => ContainerKind::Plain,
        }
    }
}

fn descendants_of_kind<'t>(node: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    let mut stack = vec![node];
    while let Some(n) = stack.pop() {
        if n.kind() == kind {
            found.push(n);
            continue;
        }
        let mut cursor = n.walk();
        stack.extend(n.named_children(&mut cursor));
    }
    found.sort_by_key(|n| n.start_byte());
    found
}
