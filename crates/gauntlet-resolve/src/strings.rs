//! Template string resolution.
//!
//! Walks a parsed [`Template`] against a variable manager, producing the
//! final string or a deferred marker. Repeat sections expand here: the
//! body is resolved once per combination of the multi-valued variables it
//! references (without an explicit index), joined by the separator.

use crate::eval::{evaluate, Eval, EvalError, EvalErrorKind};
use gauntlet_ast::{Expr, Template, TemplateItem, VarKey};
use gauntlet_vars::{DeferredTag, SetName, VarIndex, VariableSetManager};

/// Outcome of resolving one template.
#[derive(Debug, Clone, PartialEq)]
pub enum StringResult {
    Resolved(String),
    /// Some referenced variable is deferred; the whole string waits for
    /// phase 2.
    Deferred(DeferredTag),
}

/// Resolve a full template against a variable manager.
pub fn resolve_template(
    template: &Template,
    var_man: &VariableSetManager,
) -> Result<StringResult, EvalError> {
    let mut out = String::new();

    for item in &template.items {
        match resolve_item(item, var_man)? {
            StringResult::Resolved(part) => out.push_str(&part),
            deferred @ StringResult::Deferred(_) => return Ok(deferred),
        }
    }

    Ok(StringResult::Resolved(out))
}

fn resolve_item(
    item: &TemplateItem,
    var_man: &VariableSetManager,
) -> Result<StringResult, EvalError> {
    match item {
        TemplateItem::Literal(text) => Ok(StringResult::Resolved(text.clone())),
        TemplateItem::Expr(block) => {
            let value = match evaluate(&block.expr, var_man)? {
                Eval::Ready(value) => value,
                Eval::Deferred(tag) => return Ok(StringResult::Deferred(tag)),
            };

            if !value.is_scalar() {
                return Err(EvalError::value(
                    format!(
                        "expressions must resolve to a string, int, float, or boolean; \
                         got a {}",
                        value.type_name()
                    ),
                    block.span,
                ));
            }

            let text = match &block.format {
                Some(spec) => spec.apply(&value).map_err(|err| EvalError {
                    kind: EvalErrorKind::Value,
                    span: block.span,
                    message: err.to_string(),
                })?,
                None => value.render(),
            };
            Ok(StringResult::Resolved(text))
        }
        TemplateItem::Repeat(repeat) => resolve_repeat(repeat, var_man),
    }
}

/// Expand a repeat section.
///
/// Variables referenced in the body *without an explicit index* are
/// iterated over; the body is resolved once per combination of their
/// values. A variable may not be both indexed and iterated in the same
/// section.
fn resolve_repeat(
    repeat: &gauntlet_ast::RepeatBlock,
    var_man: &VariableSetManager,
) -> Result<StringResult, EvalError> {
    let items = &repeat.items;
    let separator = &repeat.separator;

    // Collect variable references from the body's expressions.
    let mut refs: Vec<(&Expr, Vec<&VarKey>)> = Vec::new();
    for item in items {
        if let TemplateItem::Expr(block) = item {
            let mut keys = Vec::new();
            block.expr.referenced_vars(&mut keys);
            refs.push((&block.expr, keys));
        }
    }

    let mut iterated: Vec<(SetName, String)> = Vec::new();
    let mut direct: Vec<(SetName, String, VarKey)> = Vec::new();

    for (expr, keys) in &refs {
        for key in keys {
            let resolved = var_man
                .resolve_key(key)
                .map_err(|err| EvalError::variable(err, expr.span))?;
            match resolved.index {
                None => {
                    if !iterated.iter().any(|(s, n)| (*s, n.as_str()) == (resolved.set, resolved.name.as_str())) {
                        iterated.push((resolved.set, resolved.name.clone()));
                    }
                }
                Some(VarIndex::At(_)) => {
                    direct.push((resolved.set, resolved.name.clone(), (*key).clone()));
                }
                // Wildcards read the whole list at once; they don't drive
                // the iteration.
                Some(VarIndex::All) => {}
            }
        }
    }

    // Indexing into a variable we're iterating over is ambiguous.
    for (set, name, key) in &direct {
        if iterated.iter().any(|(s, n)| (*s, n.as_str()) == (*set, name.as_str())) {
            return Err(EvalError::value(
                format!(
                    "variable '{}' was referenced by index, but is also being iterated over; \
                     it can't be both",
                    key
                ),
                repeat.span,
            ));
        }
    }

    // Iterating over a deferred variable defers the whole string; the
    // repeat count isn't knowable yet.
    for (set, name) in &iterated {
        if var_man.any_deferred(*set, name) {
            return Ok(StringResult::Deferred(DeferredTag {
                set: *set,
                name: name.clone(),
            }));
        }
    }

    let permutations = var_man
        .get_permutations(&iterated)
        .map_err(|err| EvalError::variable(err, repeat.span))?;

    let mut parts = Vec::with_capacity(permutations.len());
    for (_, perm_man) in &permutations {
        let mut section = String::new();
        for item in items {
            match item {
                TemplateItem::Literal(text) => section.push_str(text),
                TemplateItem::Expr(_) => match resolve_item(item, perm_man)? {
                    StringResult::Resolved(text) => section.push_str(&text),
                    deferred @ StringResult::Deferred(_) => return Ok(deferred),
                },
                TemplateItem::Repeat(_) => {
                    // The scanner rejects nested repeats.
                    unreachable!("nested repeat section survived parsing")
                }
            }
        }
        parts.push(section);
    }

    Ok(StringResult::Resolved(parts.join(separator)))
}
