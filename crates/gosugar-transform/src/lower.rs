//! Lowering of dialect constructs to plain Go.
//!
//! | Dialect              | Go                                              |
//! |----------------------|-------------------------------------------------|
//! | `&chan T{}`, `{0}`   | `make(chan T)`                                  |
//! | `&chan T{n}`         | `make(chan T, n)`                               |
//! | `&chan<- T{n}`       | `(chan<- T)(make(chan T, n))`                   |
//! | `&<-chan T{n}`       | `(<-chan T)(make(chan T, n))`                   |
//! | `clone(x)`           | `sugar.Clone{Slice,Map,String,}(x)` by kind     |
//! | `free(x)`            | `sugar.Free{Slice,Map,String,}(x)` by kind      |
//! | `grow(x, n)`         | `sugar.GrowSlice(x, n)`, slices only            |
//! | `(*[]T)(b)`          | `sugar.Cast[T](b)`                              |
//! | `(*[]T, Order)(b)`   | `sugar.CastOrder[T](b, sugar.Order)`            |
//!
//! Lowering only records [`Rewrites`]; the tree stays as parsed.

use crate::layout::{ByteOrder, elem_layout, element_count};
use crate::rewrite::{Piece, Rewrites};
use gosugar_syntax::case::{self, CaseConfig};
use gosugar_syntax::parse::{int_literal_value, literal_elements, named_children, unwrap_literal_element};
use gosugar_syntax::preprocess::{ChanDir, Substitution, Sugar};
use gosugar_syntax::{
    BindingTable, Check, ContainerKind, Diagnostic, Intrinsic, IntrinsicCall, SourceUnit,
};
use std::collections::BTreeSet;
use tree_sitter::Node;

pub const DEFAULT_RUNTIME_IMPORT: &str = "gosugar.dev/runtime/sugar";
pub const DEFAULT_RUNTIME_ALIAS: &str = "sugar";

/// Settings threaded through one transform call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformConfig {
    pub case: CaseConfig,
    pub runtime_import: String,
    pub runtime_alias: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            case: CaseConfig::default(),
            runtime_import: DEFAULT_RUNTIME_IMPORT.to_string(),
            runtime_alias: DEFAULT_RUNTIME_ALIAS.to_string(),
        }
    }
}

/// Output of [`transform`].
#[derive(Debug, Clone)]
pub struct Transformed<'t> {
    pub rewrites: Rewrites<'t>,
    pub diagnostics: Vec<Diagnostic>,
    /// Whether any runtime call was emitted.
    pub uses_runtime: bool,
}

/// Lower every dialect construct in `unit`.
pub fn transform<'t>(
    unit: &'t SourceUnit,
    table: &BindingTable,
    config: &TransformConfig,
) -> Transformed<'t> {
    let mut lowerer = Lowerer {
        unit,
        table,
        config,
        rewrites: Rewrites::new(),
        diagnostics: Vec::new(),
        uses_runtime: false,
        consumed: BTreeSet::new(),
    };
    lowerer.visit(unit.root());
    lowerer.report_unconsumed();
    if lowerer.uses_runtime {
        lowerer.add_runtime_import();
    }
    tracing::debug!(
        rewrites = lowerer.rewrites.len(),
        diagnostics = lowerer.diagnostics.len(),
        uses_runtime = lowerer.uses_runtime,
        "lowered unit"
    );
    Transformed {
        rewrites: lowerer.rewrites,
        diagnostics: lowerer.diagnostics,
        uses_runtime: lowerer.uses_runtime,
    }
}

struct Lowerer<'a, 't> {
    unit: &'t SourceUnit,
    table: &'a BindingTable,
    config: &'a TransformConfig,
    rewrites: Rewrites<'t>,
    diagnostics: Vec<Diagnostic>,
    uses_runtime: bool,
    /// Substitutions turned into Go.
    consumed: BTreeSet<usize>,
}

impl<'a, 't> Lowerer<'a, 't> {
    fn visit(&mut self, node: Node<'t>) {
        match node.kind() {
            "composite_literal" => {
                if let Some((idx, sub)) = self.placeholder(node, "type")
                    && let Sugar::Chan { dir, elem } = &sub.sugar
                {
                    self.consumed.insert(idx);
                    self.lower_chan(node, *dir, elem);
                    return;
                }
            }
            "call_expression" => {
                if let Some((idx, sub)) = self.placeholder(node, "function")
                    && let Sugar::Cast { elem, order } = &sub.sugar
                {
                    self.consumed.insert(idx);
                    self.lower_cast(node, elem, order.as_deref());
                    return;
                }
                if let Some(call) = IntrinsicCall::resolve(self.unit, self.table, node) {
                    self.lower_intrinsic(call);
                    return;
                }
            }
            "import_declaration" | "package_clause" => return,
            "identifier" | "field_identifier" | "type_identifier" => {
                self.rename(node);
                return;
            }
            _ => {}
        }
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            self.visit(child);
        }
    }

    /// The substitution whose placeholder is exactly `node`'s `field` child.
    fn placeholder(&self, node: Node<'t>, field: &str) -> Option<(usize, &'t Substitution)> {
        let head = node.child_by_field_name(field)?;
        let (idx, sub) = self.unit.preprocessed().substitution_at(node.start_byte())?;
        (head.start_byte() == sub.rewritten.start && head.end_byte() <= sub.rewritten.end)
            .then_some((idx, sub))
    }

    fn runtime(&mut self, function: &str) -> String {
        self.uses_runtime = true;
        format!("{}.{function}", self.config.runtime_alias)
    }

    fn error_at(&mut self, node: Node<'t>, diagnostic: Diagnostic) {
        self.diagnostics.push(self.unit.locate(diagnostic, node));
    }

    // =========================================================================
    // Channels
    // =========================================================================

    fn lower_chan(&mut self, node: Node<'t>, dir: ChanDir, elem: &str) {
        let elements = node
            .child_by_field_name("body")
            .map(literal_elements)
            .unwrap_or_default();

        let capacity = match elements.as_slice() {
            [] => None,
            [element] if element.kind() == "literal_element" => {
                let value = unwrap_literal_element(*element);
                if value.kind() == "literal_value" {
                    return self.malformed_chan(node, "the capacity cannot be a braced list");
                }
                let zero = value.kind() == "int_literal"
                    && int_literal_value(self.unit.node_text(value)) == Some(0);
                (!zero).then_some(value)
            }
            [_] => return self.malformed_chan(node, "the capacity cannot be keyed"),
            _ => {
                return self.malformed_chan(
                    node,
                    &format!("expected at most one capacity value, found {}", elements.len()),
                );
            }
        };

        let elem = case::map_type_text(elem, &self.config.case);
        let mut pieces: Vec<Piece<'t>> = Vec::new();
        let make = format!("make(chan {elem}");
        if dir != ChanDir::Both {
            pieces.push(format!("({})(", dir.type_text(&elem)).into());
        }
        pieces.push(make.into());
        if let Some(capacity) = capacity {
            pieces.push(", ".into());
            pieces.push(capacity.into());
            self.visit(capacity);
        }
        pieces.push(")".into());
        if dir != ChanDir::Both {
            pieces.push(")".into());
        }

        tracing::trace!(?dir, %elem, buffered = capacity.is_some(), "lower channel literal");
        self.rewrites.replace(node, pieces);
    }

    fn malformed_chan(&mut self, node: Node<'t>, detail: &str) {
        let text = self.unit.node_text(node).to_string();
        self.error_at(
            node,
            Diagnostic::error(
                Check::MalformedChannel,
                format!("malformed channel literal `{text}`: {detail}"),
            )
            .with_hint("write `&chan T{}` for unbuffered or `&chan T{n}` for capacity n"),
        );
        // Nested sugar still gets lowered or reported on its own.
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body);
        }
    }

    // =========================================================================
    // Coercions
    // =========================================================================

    fn lower_cast(&mut self, node: Node<'t>, elem: &str, order: Option<&str>) {
        let args = node
            .child_by_field_name("arguments")
            .map(named_children)
            .unwrap_or_default();
        let [operand] = args.as_slice() else {
            let surface = Sugar::Cast {
                elem: elem.to_string(),
                order: order.map(str::to_string),
            }
            .surface();
            self.error_at(
                node,
                Diagnostic::error(
                    Check::MalformedCoercion,
                    format!("coercion `{surface}` takes one byte-sequence operand, found {}", args.len()),
                ),
            );
            for arg in args {
                self.visit(arg);
            }
            return;
        };
        let operand = *operand;

        let order = match order {
            None => ByteOrder::Native,
            Some(name) => match ByteOrder::from_name(name) {
                Some(order) => order,
                None => {
                    self.error_at(
                        node,
                        Diagnostic::error(
                            Check::MalformedCoercion,
                            format!("unknown byte order `{name}`"),
                        )
                        .with_hint("use NativeEndian, LittleEndian or BigEndian"),
                    );
                    return;
                }
            },
        };

        if let Some(len) = self.table.static_byte_len(self.unit, operand)
            && let Some(layout) = elem_layout(elem)
            && let Err(err) = element_count(len, layout)
        {
            self.error_at(
                node,
                Diagnostic::error(
                    Check::CoercionRemainder,
                    format!("cannot view as []{elem}: {err}"),
                )
                .with_hint(format!("pad or trim the input to a multiple of {} bytes", layout.size)),
            );
            return;
        }

        let elem = case::map_type_text(elem, &self.config.case);
        let mut pieces: Vec<Piece<'t>> = Vec::new();
        let function = match order {
            ByteOrder::Native => self.runtime("Cast"),
            _ => self.runtime("CastOrder"),
        };
        pieces.push(format!("{function}[{elem}](").into());
        match self.table.kind_of(operand) {
            ContainerKind::Slice => pieces.push("*".into()),
            ContainerKind::String => pieces.push("[]byte(*".into()),
            _ => {}
        }
        pieces.push(operand.into());
        if self.table.kind_of(operand) == ContainerKind::String {
            pieces.push(")".into());
        }
        if order != ByteOrder::Native {
            let constant = self.runtime(order.runtime_name());
            pieces.push(format!(", {constant}").into());
        }
        pieces.push(")".into());
        self.visit(operand);

        tracing::trace!(%elem, ?order, "lower coercion");
        self.rewrites.replace(node, pieces);
    }

    // =========================================================================
    // Intrinsics
    // =========================================================================

    fn lower_intrinsic(&mut self, call: IntrinsicCall<'t>) {
        let name = call.kind.name();
        if !call.has_arity() {
            self.error_at(
                call.node,
                Diagnostic::error(
                    Check::IntrinsicArity,
                    format!(
                        "`{name}` takes {} argument{}, found {}",
                        call.kind.arity(),
                        if call.kind.arity() == 1 { "" } else { "s" },
                        call.arguments.len()
                    ),
                ),
            );
            return;
        }

        let target = call.arguments[0];
        let kind = call.target.map(|id| self.table.get(id).kind);

        let function = match (call.kind, kind) {
            (Intrinsic::Grow, Some(ContainerKind::Slice)) => "GrowSlice",
            (Intrinsic::Grow, other) => {
                let what = match other {
                    Some(kind) => format!("is tracked as `{kind}`"),
                    None => "has no tracked kind".to_string(),
                };
                let text = self.unit.node_text(target).to_string();
                self.error_at(
                    call.node,
                    Diagnostic::error(
                        Check::GrowRequiresSlice,
                        format!("`grow` requires a pointer-sugared slice, but `{text}` {what}"),
                    )
                    .with_hint("declare the operand as `*[]T` or initialize it from `&[]T{...}`"),
                );
                return;
            }
            (intrinsic, kind) => {
                if kind.is_none() {
                    let text = self.unit.node_text(target).to_string();
                    self.error_at(
                        call.node,
                        Diagnostic::info(
                            Check::UnknownContainerKind,
                            format!(
                                "container kind of `{text}` is unknown; `{name}` uses the struct lowering"
                            ),
                        )
                        .with_hint("pass a variable declared with a pointer-sugared type"),
                    );
                }
                match (intrinsic, kind.unwrap_or_default()) {
                    (Intrinsic::Clone, ContainerKind::Slice) => "CloneSlice",
                    (Intrinsic::Clone, ContainerKind::Map) => "CloneMap",
                    (Intrinsic::Clone, ContainerKind::String) => "CloneString",
                    (Intrinsic::Clone, ContainerKind::Plain) => "Clone",
                    (Intrinsic::Free, ContainerKind::Slice) => "FreeSlice",
                    (Intrinsic::Free, ContainerKind::Map) => "FreeMap",
                    (Intrinsic::Free, ContainerKind::String) => "FreeString",
                    (Intrinsic::Free, ContainerKind::Plain) => "Free",
                    (Intrinsic::Grow, _) => "GrowSlice",
                }
            }
        };

        let function = self.runtime(function);
        let mut pieces: Vec<Piece<'t>> = vec![format!("{function}(").into()];
        for (i, arg) in call.arguments.iter().enumerate() {
            if i > 0 {
                pieces.push(", ".into());
            }
            pieces.push((*arg).into());
            self.visit(*arg);
        }
        pieces.push(")".into());

        tracing::trace!(intrinsic = name, ?kind, "lower intrinsic");
        self.rewrites.replace(call.node, pieces);
    }

    // =========================================================================
    // Renaming
    // =========================================================================

    fn rename(&mut self, node: Node<'t>) {
        if !self.config.case.enabled || self.is_foreign(node) {
            return;
        }
        let text = self.unit.node_text(node);
        let renamed = case::to_host_case(text, &self.config.case);
        if renamed != text {
            self.rewrites.replace_text(node, renamed);
        }
    }

    /// Names owned by another package: qualifiers and what they select.
    fn is_foreign(&self, node: Node<'t>) -> bool {
        let Some(parent) = node.parent() else {
            return false;
        };
        match parent.kind() {
            "qualified_type" => true,
            "selector_expression" => {
                let Some(operand) = parent.child_by_field_name("operand") else {
                    return false;
                };
                operand.kind() == "identifier"
                    && self.table.resolve_id(operand).is_none()
                    && self.table.is_import(self.unit.node_text(operand))
            }
            _ => false,
        }
    }

    // =========================================================================
    // Bookkeeping
    // =========================================================================

    fn report_unconsumed(&mut self) {
        let unit = self.unit;
        for (idx, sub) in unit.preprocessed().substitutions.iter().enumerate() {
            if self.consumed.contains(&idx) {
                continue;
            }
            let form = match sub.sugar {
                Sugar::Chan { .. } => "channel literal",
                Sugar::Cast { .. } => "coercion",
            };
            self.diagnostics.push(
                Diagnostic::error(
                    Check::UnsupportedPlaceholder,
                    format!("{form} `{}` is not allowed here", sub.sugar.surface()),
                )
                .with_hint("use the construct as a standalone expression")
                .at(unit.position_of(sub.original.start), Some(sub.original.clone())),
            );
        }
    }

    fn add_runtime_import(&mut self) {
        let alias = &self.config.runtime_alias;
        let path = &self.config.runtime_import;
        if self.table.import_path(alias) == Some(path.as_str()) {
            return;
        }
        let import = format!("import {alias} \"{path}\"");
        let root = self.unit.root();
        let mut cursor = root.walk();
        let package = root
            .named_children(&mut cursor)
            .find(|n| n.kind() == "package_clause");
        match package {
            Some(package) => self.rewrites.append(package, format!("\n\n{import}")),
            None => self.rewrites.set_prelude(format!("{import}\n\n")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::emit;
    use gosugar_syntax::track;

    fn lower(src: &str, config: &TransformConfig) -> (String, Vec<Diagnostic>) {
        let unit = SourceUnit::parse(src).unwrap();
        let tracked = track(&unit);
        let out = transform(&unit, &tracked.table, config);
        (emit(&unit, &out.rewrites), out.diagnostics)
    }

    fn lower_default(src: &str) -> (String, Vec<Diagnostic>) {
        lower(src, &TransformConfig::default())
    }

    #[test]
    fn test_channel_capacities() {
        let (out, diags) = lower_default(
            "package p\n\nfunc f() {\n\ta := &chan int{}\n\tb := &chan int{0}\n\tc := &chan string{2}\n\t_, _, _ = a, b, c\n}\n",
        );
        assert!(diags.is_empty(), "{diags:?}");
        insta::assert_snapshot!(out, @r"
        package p

        func f() {
        	a := make(chan int)
        	b := make(chan int)
        	c := make(chan string, 2)
        	_, _, _ = a, b, c
        }
        ");
    }

    #[test]
    fn test_directional_channels() {
        let (out, diags) = lower_default(
            "package p\n\nfunc f(n int) {\n\ts := &chan<- int{n}\n\tr := &<-chan []byte{}\n\t_, _ = s, r\n}\n",
        );
        assert!(diags.is_empty(), "{diags:?}");
        assert!(out.contains("s := (chan<- int)(make(chan int, n))"));
        assert!(out.contains("r := (<-chan []byte)(make(chan []byte))"));
        assert!(!out.contains("import sugar"));
    }

    #[test]
    fn test_malformed_channel() {
        let (_, diags) = lower_default("package p\n\nvar c = &chan int{1, 2}\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].check, Check::MalformedChannel);
        assert!(diags[0].message.contains("&chan int{1, 2}"), "{}", diags[0].message);
        assert!(!diags[0].message.contains("__sugar"));
    }

    #[test]
    fn test_intrinsics_by_kind() {
        let (out, diags) = lower_default(
            "package p\n\nfunc f(m *map[string]int, s *string) {\n\tv := &[]int{1}\n\tc := clone(v)\n\tgrow(c, 8)\n\tfree(v)\n\tfree(c)\n\tfree(m)\n\tfree(s)\n}\n",
        );
        assert!(diags.is_empty(), "{diags:?}");
        insta::assert_snapshot!(out, @r#"
        package p

        import sugar "gosugar.dev/runtime/sugar"

        func f(m *map[string]int, s *string) {
        	v := &[]int{1}
        	c := sugar.CloneSlice(v)
        	sugar.GrowSlice(c, 8)
        	sugar.FreeSlice(v)
        	sugar.FreeSlice(c)
        	sugar.FreeMap(m)
        	sugar.FreeString(s)
        }
        "#);
    }

    #[test]
    fn test_unknown_kind_falls_back() {
        let (out, diags) = lower_default(
            "package p\n\ntype T struct{}\n\nfunc f() {\n\tp := clone(&T{})\n\tfree(p)\n}\n",
        );
        assert!(out.contains("p := sugar.Clone(&T{})"));
        assert!(out.contains("sugar.Free(p)"));
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].check, Check::UnknownContainerKind);
        assert!(!diags[0].is_fatal());
    }

    #[test]
    fn test_grow_requires_slice() {
        let (_, diags) = lower_default(
            "package p\n\nfunc f() {\n\tm := &map[int]int{}\n\tgrow(m, 4)\n}\n",
        );
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].check, Check::GrowRequiresSlice);
        assert!(diags[0].is_fatal());
    }

    #[test]
    fn test_intrinsic_arity() {
        let (_, diags) = lower_default("package p\n\nfunc f(a, b *[]int) {\n\tfree(a, b)\n}\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].check, Check::IntrinsicArity);
        assert_eq!(diags[0].message, "`free` takes 1 argument, found 2");
    }

    #[test]
    fn test_coercions() {
        let (out, diags) = lower_default(
            "package p\n\nfunc f(raw []byte, buf *[]byte) {\n\ta := (*[]uint32)(raw)\n\tb := (*[]int16, binary.NativeEndian)(raw)\n\tc := (*[]float64, BigEndian)(buf)\n\t_, _, _ = a, b, c\n}\n",
        );
        assert!(diags.is_empty(), "{diags:?}");
        assert!(out.contains("a := sugar.Cast[uint32](raw)"));
        assert!(out.contains("b := sugar.Cast[int16](raw)"));
        assert!(out.contains("c := sugar.CastOrder[float64](*buf, sugar.BigEndian)"));
        assert!(out.contains("import sugar \"gosugar.dev/runtime/sugar\""));
    }

    #[test]
    fn test_static_remainder() {
        let (_, diags) = lower_default(
            "package p\n\nfunc f() {\n\tb := []byte{1, 2, 3, 4}\n\tok := (*[]uint32)(b)\n\tbad := (*[]uint64)(b)\n\t_, _ = ok, bad\n}\n",
        );
        assert_eq!(diags.len(), 1);
        let diag = &diags[0];
        assert_eq!(diag.check, Check::CoercionRemainder);
        assert_eq!(diag.position.line, 6);
        assert_eq!(diag.hint.as_deref(), Some("pad or trim the input to a multiple of 8 bytes"));
    }

    #[test]
    fn test_nested_sugar_in_malformed_channel() {
        let (_, diags) = lower_default("package p\n\nvar c = &chan int{&chan int{}, 2}\n");
        assert_eq!(diags.len(), 1, "{diags:?}");
        assert_eq!(diags[0].check, Check::MalformedChannel);
    }

    #[test]
    fn test_sugar_in_type_position() {
        let (_, diags) = lower_default(
            "package p\n\nvar cs = []&chan int{}\nvar ms = map[string]&chan<- int{}\n",
        );
        assert_eq!(diags.len(), 2, "{diags:?}");
        assert!(diags.iter().all(|d| d.check == Check::UnsupportedPlaceholder && d.is_fatal()));
        assert_eq!(diags[0].message, "channel literal `&chan int` is not allowed here");
        assert_eq!(diags[0].position.line, 3);
        assert_eq!(diags[0].position.column, 12);
        assert_eq!(diags[1].message, "channel literal `&chan<- int` is not allowed here");
        assert!(diags.iter().all(|d| !d.message.contains("__sugar")));
    }

    #[test]
    fn test_oversized_array_coercion_is_not_checked_statically() {
        let (out, diags) = lower_default(
            "package p\n\nfunc f() {\n\tb := []byte{1}\n\tv := (*[][4611686018427387904]uint64)(b)\n\t_ = v\n}\n",
        );
        assert!(diags.is_empty(), "{diags:?}");
        assert!(out.contains("v := sugar.Cast[[4611686018427387904]uint64](b)"));
    }

    #[test]
    fn test_unknown_order() {
        let (_, diags) = lower_default("package p\n\nvar v = (*[]int32, MiddleEndian)(b)\n");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].check, Check::MalformedCoercion);
    }

    #[test]
    fn test_existing_runtime_import_kept() {
        let (out, _) = lower_default(
            "package p\n\nimport sugar \"gosugar.dev/runtime/sugar\"\n\nfunc f(s *[]int) { free(s) }\n",
        );
        assert_eq!(out.matches("gosugar.dev/runtime/sugar").count(), 1);
    }

    #[test]
    fn test_renaming() {
        let config = TransformConfig {
            case: CaseConfig::enabled(),
            ..TransformConfig::default()
        };
        let (out, diags) = lower(
            "package p\n\nimport \"net/http\"\n\ntype user_record struct {\n\tuser_id int\n}\n\nfunc load_user(req_url string) *user_record {\n\tr := &user_record{user_id: 1}\n\t_ = http.StatusOK\n\t_ = r.user_id\n\treturn r\n}\n",
            &config,
        );
        assert!(diags.is_empty(), "{diags:?}");
        insta::assert_snapshot!(out, @r#"
        package p

        import "net/http"

        type userRecord struct {
        	userID int
        }

        func loadUser(reqURL string) *userRecord {
        	r := &userRecord{userID: 1}
        	_ = http.StatusOK
        	_ = r.userID
        	return r
        }
        "#);
    }

    #[test]
    fn test_shadowed_intrinsic_untouched() {
        let src = "package p\n\nfunc free(x int) {}\n\nfunc f() {\n\tfree(1)\n}\n";
        let (out, diags) = lower_default(src);
        assert!(diags.is_empty());
        assert_eq!(out, src);
    }
}
