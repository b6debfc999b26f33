//! Sum-type lowering: one declaration becomes a tag enumeration, a carrier
//! shape with one optional slot per (variant, field), a constructor per
//! variant and an `Is<Variant>` predicate per variant.

use rustc_hash::{FxHashMap, FxHashSet};
use tagc_ast::{BinOp, SumTypeDecl, Variant};
use tagc_common::{LowerConfig, LowerError, SourcePos, Span};
use tagc_typeck::{Ty, TypeService};

use crate::lir::{
    CarrierShape, LExpr, LExprKind, LFunction, LParam, LStmt, LStmtKind, LType, LoweredSumType,
    Slot, TagEnum, TagRef, TagVariant, VariantLayout,
};
use crate::naming::{predicate_name, tag_const_name, tag_enum_name, UnitCtx};

/// Name of the tag field every carrier starts with.
pub const TAG_FIELD: &str = "tag";

/// Lower one declaration.
///
/// Duplicate variant names are fatal for the declaration. Naming
/// collisions are resolved by qualification and reported as warnings
/// through `ctx`.
#[tracing::instrument(level = "debug", skip_all, fields(decl = %decl.name))]
pub fn lower_sum_type(
    decl: &SumTypeDecl,
    ctx: &mut UnitCtx,
    service: &dyn TypeService,
) -> Result<LoweredSumType, Vec<LowerError>> {
    let duplicates = duplicate_variants(decl);
    if !duplicates.is_empty() {
        return Err(duplicates);
    }

    let warnings = ctx.registry.register_variants(decl);
    ctx.report_all(warnings);

    let enum_name = tag_enum_name(&decl.name);
    let mut variants = Vec::with_capacity(decl.variants.len());
    for (ordinal, variant) in decl.variants.iter().enumerate() {
        let ctor = ctx
            .registry
            .ident_for(&decl.name, &variant.name)
            .unwrap_or(&variant.name)
            .to_string();
        variants.push(VariantLayout {
            name: variant.name.clone(),
            ordinal,
            tag: TagRef {
                enum_name: enum_name.clone(),
                ident: tag_const_name(&ctor),
                ordinal,
            },
            predicate: predicate_name(&variant.name),
            ctor,
        });
    }

    let tag_enum = TagEnum {
        name: enum_name.clone(),
        variants: variants
            .iter()
            .map(|v| TagVariant {
                ident: v.tag.ident.clone(),
                ordinal: v.ordinal,
            })
            .collect(),
        pos: SourcePos::Synthesized,
    };

    let carrier = CarrierShape {
        name: decl.name.clone(),
        type_params: decl.type_params.clone(),
        tag_field: TAG_FIELD.to_string(),
        tag_enum: enum_name,
        slots: layout_slots(decl, service, &ctx.config),
        pos: SourcePos::Synthesized,
    };

    let self_ty = LType::Named {
        name: decl.name.clone(),
        args: decl
            .type_params
            .iter()
            .map(|p| LType::Param(p.clone()))
            .collect(),
    };

    let constructors = decl
        .variants
        .iter()
        .zip(&variants)
        .map(|(variant, layout)| constructor(decl, variant, layout, &carrier, &self_ty))
        .collect();
    let predicates = variants
        .iter()
        .map(|layout| predicate(decl, layout, &self_ty))
        .collect();

    tracing::debug!(
        variants = variants.len(),
        slots = carrier.slots.len(),
        boxed = carrier.slots.iter().filter(|s| s.boxed).count(),
        "lowered sum type"
    );

    Ok(LoweredSumType {
        decl_name: decl.name.clone(),
        tag_enum,
        carrier,
        variants,
        constructors,
        predicates,
    })
}

fn duplicate_variants(decl: &SumTypeDecl) -> Vec<LowerError> {
    let mut first_seen: FxHashMap<&str, Span> = FxHashMap::default();
    let mut errors = Vec::new();
    for variant in &decl.variants {
        match first_seen.get(variant.name.as_str()) {
            Some(first) => errors.push(LowerError::DuplicateVariantName {
                type_name: decl.name.clone(),
                variant: variant.name.clone(),
                first: *first,
                second: variant.span,
            }),
            None => {
                first_seen.insert(&variant.name, variant.span);
            }
        }
    }
    errors
}

// ── Carrier layout ──────────────────────────────────────────────────

fn layout_slots(decl: &SumTypeDecl, service: &dyn TypeService, config: &LowerConfig) -> Vec<Slot> {
    let mut used: FxHashSet<String> = FxHashSet::default();
    used.insert(TAG_FIELD.to_string());

    let mut slots = Vec::new();
    for variant in &decl.variants {
        for (index, field) in variant.fields.iter().enumerate() {
            let suffix = field.name.clone().unwrap_or_else(|| index.to_string());
            let base = format!("{}_{}", variant.name, suffix);
            let mut name = base.clone();
            let mut n = 2;
            while used.contains(&name) {
                name = format!("{}_{}", base, n);
                n += 1;
            }
            used.insert(name.clone());

            let ty = Ty::from_type_ref(&field.ty, &decl.type_params);
            let boxed = reaches(&ty, &decl.name, service, config, &mut FxHashSet::default());
            let inner = LType::from_ty(&ty);
            let inner = if boxed {
                LType::Boxed(Box::new(inner))
            } else {
                inner
            };
            slots.push(Slot {
                name,
                variant: variant.name.clone(),
                field_index: index,
                field_name: field.name.clone(),
                ty: LType::Optional(Box::new(inner)),
                boxed,
            });
        }
    }
    slots
}

/// Whether a value of type `ty` stores a `target` inline, directly,
/// through generic arguments, or through another declaration's fields.
/// Indirect containers (already pointer-backed) stop the search.
fn reaches(
    ty: &Ty,
    target: &str,
    service: &dyn TypeService,
    config: &LowerConfig,
    visited: &mut FxHashSet<String>,
) -> bool {
    match ty {
        Ty::Con(_) | Ty::App(..) => {
            let Some(head) = ty.head_name() else {
                return false;
            };
            if config.is_indirect_container(head) {
                return false;
            }
            if head == target {
                return true;
            }
            if ty
                .args()
                .iter()
                .any(|arg| reaches(arg, target, service, config, visited))
            {
                return true;
            }
            if !visited.insert(head.to_string()) {
                return false;
            }
            let Some(decl) = service.sum_decl(head) else {
                return false;
            };
            decl.variants.iter().any(|v| {
                v.fields.iter().any(|f| {
                    let field_ty = Ty::from_type_ref(&f.ty, &decl.type_params);
                    reaches(&field_ty, target, service, config, visited)
                })
            })
        }
        Ty::Tuple(elems) => elems
            .iter()
            .any(|e| reaches(e, target, service, config, visited)),
        Ty::Param(_) | Ty::Fun(..) | Ty::Never => false,
    }
}

// ── Constructors and predicates ─────────────────────────────────────

fn param_name(variant: &Variant, index: usize) -> String {
    variant.fields[index]
        .name
        .clone()
        .unwrap_or_else(|| format!("_{}", index))
}

fn constructor(
    decl: &SumTypeDecl,
    variant: &Variant,
    layout: &VariantLayout,
    carrier: &CarrierShape,
    self_ty: &LType,
) -> LFunction {
    let params: Vec<LParam> = variant
        .fields
        .iter()
        .enumerate()
        .map(|(i, f)| LParam {
            name: param_name(variant, i),
            ty: LType::from_ty(&Ty::from_type_ref(&f.ty, &decl.type_params)),
        })
        .collect();

    let mut fields = vec![(
        carrier.tag_field.clone(),
        LExpr::synth(LExprKind::Tag(layout.tag.clone())),
    )];
    for slot in &carrier.slots {
        let value = if slot.variant == variant.name {
            let arg = LExpr::var(param_name(variant, slot.field_index));
            let arg = if slot.boxed {
                LExpr::synth(LExprKind::MakeBox(Box::new(arg)))
            } else {
                arg
            };
            LExprKind::Present(Box::new(arg))
        } else {
            LExprKind::Absent
        };
        fields.push((slot.name.clone(), LExpr::synth(value)));
    }

    let body = LExpr::synth(LExprKind::Carrier {
        type_name: decl.name.clone(),
        fields,
    });
    LFunction {
        name: layout.ctor.clone(),
        type_params: decl.type_params.clone(),
        receiver: None,
        params,
        ret: self_ty.clone(),
        body: vec![LStmt::synth(LStmtKind::Return(Some(body)))],
        pos: SourcePos::Synthesized,
    }
}

fn predicate(decl: &SumTypeDecl, layout: &VariantLayout, self_ty: &LType) -> LFunction {
    let test = LExpr::synth(LExprKind::Binary {
        op: BinOp::Eq,
        lhs: Box::new(LExpr::var("self").field(TAG_FIELD)),
        rhs: Box::new(LExpr::synth(LExprKind::Tag(layout.tag.clone()))),
    });
    LFunction {
        name: layout.predicate.clone(),
        type_params: decl.type_params.clone(),
        receiver: Some(self_ty.clone()),
        params: Vec::new(),
        ret: LType::Bool,
        body: vec![LStmt::synth(LStmtKind::Return(Some(test)))],
        pos: SourcePos::Synthesized,
    }
}

/// Validate a constructor call site against the declaration.
pub fn check_constructor_call<'d>(
    service: &'d dyn TypeService,
    type_name: &str,
    variant: &str,
    arg_count: usize,
    span: Span,
) -> Result<&'d Variant, LowerError> {
    let decl = service
        .sum_decl(type_name)
        .ok_or_else(|| LowerError::UnresolvedType {
            what: format!("`{}`, which is not a declared sum type", type_name),
            span,
        })?;
    let (_, v) = decl
        .variant(variant)
        .ok_or_else(|| LowerError::UnknownVariant {
            type_name: type_name.to_string(),
            variant: variant.to_string(),
            span,
        })?;
    if v.arity() != arg_count {
        return Err(LowerError::Arity {
            subject: format!("constructor `{}.{}`", type_name, variant),
            expected: v.arity(),
            found: arg_count,
            span,
        });
    }
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagc_ast::{AstBuilder, CompilationUnit, Expr, TypeRef};
    use tagc_typeck::TypeServiceError;

    struct Decls(Vec<SumTypeDecl>);

    impl TypeService for Decls {
        fn type_of(&self, expr: &Expr) -> Result<Ty, TypeServiceError> {
            Err(TypeServiceError::Unknown(expr.id))
        }

        fn sum_decl(&self, name: &str) -> Option<&SumTypeDecl> {
            self.0.iter().find(|d| d.name == name)
        }
    }

    fn lower(decls: Vec<SumTypeDecl>, which: &str) -> (Result<LoweredSumType, Vec<LowerError>>, UnitCtx) {
        let unit = CompilationUnit {
            name: "test".to_string(),
            decls: decls.clone(),
            functions: Vec::new(),
        };
        let mut ctx = UnitCtx::new(&unit, &LowerConfig::default());
        let service = Decls(decls);
        let decl = service.sum_decl(which).unwrap().clone();
        let lowered = lower_sum_type(&decl, &mut ctx, &service);
        (lowered, ctx)
    }

    fn shape(b: &mut AstBuilder) -> SumTypeDecl {
        let variants = vec![
            b.struct_variant("Circle", vec![("radius", TypeRef::named("Float"))]),
            b.struct_variant(
                "Rectangle",
                vec![
                    ("width", TypeRef::named("Float")),
                    ("height", TypeRef::named("Float")),
                ],
            ),
            b.unit_variant("Point"),
        ];
        b.sum_type("Shape", &[], variants)
    }

    #[test]
    fn tags_follow_declaration_order() {
        let mut b = AstBuilder::new();
        let (lowered, _) = lower(vec![shape(&mut b)], "Shape");
        let lowered = lowered.unwrap();
        let tags: Vec<(String, usize)> = lowered
            .tag_enum
            .variants
            .iter()
            .map(|v| (v.ident.clone(), v.ordinal))
            .collect();
        assert_eq!(
            tags,
            vec![
                ("CircleTag".to_string(), 0),
                ("RectangleTag".to_string(), 1),
                ("PointTag".to_string(), 2),
            ]
        );
        assert_eq!(lowered.tag_enum.name, "ShapeTag");
        assert!(lowered.tag_enum.pos.is_synthesized());
    }

    #[test]
    fn every_slot_is_optional() {
        let mut b = AstBuilder::new();
        let (lowered, _) = lower(vec![shape(&mut b)], "Shape");
        let carrier = lowered.unwrap().carrier;
        let names: Vec<&str> = carrier.slots.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Circle_radius", "Rectangle_width", "Rectangle_height"]);
        assert!(carrier
            .slots
            .iter()
            .all(|s| matches!(s.ty, LType::Optional(_)) && !s.boxed));
    }

    #[test]
    fn constructor_fills_only_its_own_slots() {
        let mut b = AstBuilder::new();
        let (lowered, _) = lower(vec![shape(&mut b)], "Shape");
        let lowered = lowered.unwrap();
        let circle = &lowered.constructors[0];
        assert_eq!(circle.name, "Circle");
        assert_eq!(circle.params.len(), 1);
        let LStmtKind::Return(Some(LExpr {
            kind: LExprKind::Carrier { fields, .. },
            ..
        })) = &circle.body[0].kind
        else {
            panic!("constructor should return a carrier literal");
        };
        let present: Vec<&str> = fields
            .iter()
            .filter(|(_, e)| matches!(e.kind, LExprKind::Present(_)))
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(present, ["Circle_radius"]);
        assert_eq!(fields[0].0, "tag");
    }

    #[test]
    fn duplicate_variants_are_fatal() {
        let mut b = AstBuilder::new();
        let variants = vec![b.unit_variant("A"), b.unit_variant("B"), b.unit_variant("A")];
        let decl = b.sum_type("Dup", &[], variants);
        let (lowered, _) = lower(vec![decl], "Dup");
        let errs = lowered.unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(matches!(
            &errs[0],
            LowerError::DuplicateVariantName { variant, .. } if variant == "A"
        ));
    }

    #[test]
    fn direct_recursion_is_boxed() {
        let mut b = AstBuilder::new();
        let variants = vec![
            b.unit_variant("Leaf"),
            b.tuple_variant(
                "Node",
                vec![
                    TypeRef::named("Tree"),
                    TypeRef::named("Int"),
                    TypeRef::named("Tree"),
                ],
            ),
        ];
        let tree = b.sum_type("Tree", &[], variants);
        let (lowered, _) = lower(vec![tree], "Tree");
        let slots = lowered.unwrap().carrier.slots;
        let boxed: Vec<bool> = slots.iter().map(|s| s.boxed).collect();
        assert_eq!(boxed, [true, false, true]);
        assert_eq!(slots[0].ty.to_string(), "Box<Tree>?");
    }

    #[test]
    fn recursion_through_indirect_container_is_not_boxed() {
        let mut b = AstBuilder::new();
        let variants = vec![b.tuple_variant(
            "Dir",
            vec![TypeRef::app("List", vec![TypeRef::named("Fs")])],
        )];
        let fs = b.sum_type("Fs", &[], variants);
        let (lowered, _) = lower(vec![fs], "Fs");
        assert!(!lowered.unwrap().carrier.slots[0].boxed);
    }

    #[test]
    fn transitive_recursion_is_boxed() {
        let mut b = AstBuilder::new();
        let v = vec![
            b.tuple_variant("Lit", vec![TypeRef::named("Int")]),
            b.tuple_variant("Neg", vec![TypeRef::named("Wrapper")]),
        ];
        let expr = b.sum_type("Expr", &[], v);
        let v = vec![b.tuple_variant(
            "Wrap",
            vec![TypeRef::app("Pair", vec![TypeRef::named("Expr")])],
        )];
        let wrapper = b.sum_type("Wrapper", &[], v);
        let v = vec![b.tuple_variant(
            "Both",
            vec![TypeRef::named("A"), TypeRef::named("A")],
        )];
        let pair = b.sum_type("Pair", &["A"], v);
        let (lowered, _) = lower(vec![expr, wrapper, pair], "Expr");
        let boxed: Vec<bool> = lowered.unwrap().carrier.slots.iter().map(|s| s.boxed).collect();
        assert_eq!(boxed, [false, true]);
    }

    #[test]
    fn constructor_call_validation() {
        let mut b = AstBuilder::new();
        let service = Decls(vec![shape(&mut b)]);
        let span = Span::new(3, 9);
        assert!(check_constructor_call(&service, "Shape", "Circle", 1, span).is_ok());
        let err = check_constructor_call(&service, "Shape", "Rectangle", 1, span).unwrap_err();
        assert_eq!(
            err,
            LowerError::Arity {
                subject: "constructor `Shape.Rectangle`".to_string(),
                expected: 2,
                found: 1,
                span,
            }
        );
        assert!(matches!(
            check_constructor_call(&service, "Shape", "Hexagon", 0, span),
            Err(LowerError::UnknownVariant { .. })
        ));
    }
}
