//! # The Variable Resolver
//!
//! This module implements the post-merge, fixed-point template expansion
//! pass. It renders every string leaf in a document's body as a
//! [minijinja](https://docs.rs/minijinja) template, repeating until a full
//! pass produces no change, then invokes the kind's `after_vars` hook.
//!
//! Sub-documents are always resolved before their parent: a template like
//! `{{ parent().some_var }}` inside a child document needs the parent's own
//! string leaves already expanded, or it would see an un-rendered
//! placeholder instead of a value. Requires the `variables` feature.
//!
//! `minijinja::Environment::add_function` requires its functions to be
//! `Send + Sync`, a bound a closure capturing a `Document` (an
//! `Rc<RefCell<_>>` handle, never shared across threads) cannot meet. The
//! functions registered here therefore capture nothing but plain `fn`
//! pointers and look up the document actually being rendered through a
//! thread-local set for the duration of each `render_str` call, the same
//! single-threaded-by-construction assumption the rest of the document
//! algebra already makes (§5).

use std::cell::RefCell;

use minijinja::value::Rest;
use minijinja::{Environment, UndefinedBehavior, Value as JinjaValue};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::kind::HelperDescriptor;
use crate::value::Value;

thread_local! {
    /// The document currently being rendered, visible to the `fn` pointers
    /// registered on its `Environment` for the duration of one
    /// `render_template` call. Never observed across threads.
    static CURRENT_DOC: RefCell<Option<Document>> = const { RefCell::new(None) };
}

/// A generous bound on how many fixed-point iterations a single document's
/// variable expansion may take before it is treated as non-terminating.
/// Scaled by the number of string leaves so pathological cases in large
/// documents still get enough headroom, with a floor for small ones.
fn iteration_bound(body: &Value) -> usize {
    count_strings(body).saturating_mul(4).max(16)
}

fn count_strings(value: &Value) -> usize {
    match value {
        Value::String(_) => 1,
        Value::Map(map) => map.values().map(count_strings).sum(),
        Value::Seq(items) => items.iter().map(count_strings).sum(),
        Value::Doc(_) | Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) => 0,
    }
}

/// Expands every string leaf of `doc`'s body in place, resolving
/// sub-documents first, then invokes the kind's `after_vars` hook.
pub fn process_vars(doc: &Document) -> Result<()> {
    doc.with_body_mut(resolve_subdocuments)?;

    let bound = doc.with_body_mut(|body| iteration_bound(body));
    let mut iterations: usize = 0;
    loop {
        iterations += 1;
        if iterations > bound {
            return Err(Error::VariableProcessingError {
                label: Some(doc.kind().name().to_string()),
                template: String::new(),
                message: format!("variable expansion did not converge within {bound} iterations"),
            });
        }
        if iterations * 4 > bound * 3 {
            log::warn!(
                "variable expansion for `{}` approaching iteration bound ({iterations}/{bound})",
                doc.kind().name()
            );
        }

        let env = build_environment(doc, &[]);
        let mut changed = false;
        doc.with_body_mut(|body| render_strings(body, &env, doc, &mut changed))?;
        if !changed {
            break;
        }
    }

    doc.with_body_mut(|body| doc.kind().after_vars(body))?;
    Ok(())
}

/// Renders a single template string in the context of `doc` (its own
/// declared helpers, plus `parent()`, plus any `extra_helpers` supplied only
/// for this call), without touching `doc`'s own body. Used for one-off
/// template strings that are not part of a document tree, e.g. a value read
/// from outside the merged document that still wants access to its helpers.
pub fn process_vars_for(doc: &Document, template: &str, extra_helpers: &[HelperDescriptor]) -> Result<String> {
    let env = build_environment(doc, extra_helpers);
    render_template(&env, template, doc)
}

fn resolve_subdocuments(value: &mut Value) -> Result<()> {
    match value {
        Value::Map(map) => {
            for (_, child) in map.iter_mut() {
                resolve_subdocuments(child)?;
            }
            Ok(())
        }
        Value::Seq(items) => {
            for child in items.iter_mut() {
                resolve_subdocuments(child)?;
            }
            Ok(())
        }
        Value::Doc(child) => child.process_vars(),
        _ => Ok(()),
    }
}

fn render_strings(value: &mut Value, env: &Environment<'static>, doc: &Document, changed: &mut bool) -> Result<()> {
    match value {
        Value::String(s) => {
            let rendered = render_template(env, s, doc)?;
            if &rendered != s {
                *s = rendered;
                *changed = true;
            }
            Ok(())
        }
        Value::Map(map) => {
            for (_, child) in map.iter_mut() {
                render_strings(child, env, doc, changed)?;
            }
            Ok(())
        }
        Value::Seq(items) => {
            for child in items.iter_mut() {
                render_strings(child, env, doc, changed)?;
            }
            Ok(())
        }
        // Sub-documents were already fully resolved in the depth-first pass.
        Value::Doc(_) => Ok(()),
        _ => Ok(()),
    }
}

fn render_template(env: &Environment<'static>, template: &str, doc: &Document) -> Result<String> {
    let previous = CURRENT_DOC.with(|cell| cell.replace(Some(doc.clone())));
    let rendered = env.render_str(template, minijinja::context! {});
    CURRENT_DOC.with(|cell| *cell.borrow_mut() = previous);

    rendered.map_err(|e| Error::VariableProcessingError {
        label: Some(doc.kind().name().to_string()),
        template: template.to_string(),
        message: e.to_string(),
    })
}

/// Reads the document `render_template` set as current, for use inside a
/// registered function body. Absent only if called outside of a
/// `render_template` call, which the functions registered below never do.
fn current_doc() -> std::result::Result<Document, minijinja::Error> {
    CURRENT_DOC.with(|cell| cell.borrow().clone()).ok_or_else(|| {
        minijinja::Error::new(minijinja::ErrorKind::InvalidOperation, "no document is currently being rendered")
    })
}

fn build_environment(doc: &Document, extra_helpers: &[HelperDescriptor]) -> Environment<'static> {
    let mut env = Environment::new();
    // The spec requires an undefined placeholder to fail the render rather
    // than silently disappear (§4.4/§7); minijinja's default is lenient.
    env.set_undefined_behavior(UndefinedBehavior::Strict);

    env.add_function("parent", |_args: Rest<JinjaValue>| -> std::result::Result<JinjaValue, minijinja::Error> {
        Ok(document_to_jinja_value(&current_doc()?.parent()))
    });

    // Extra, call-site-only helpers are registered first so a kind's own
    // declared helper of the same name takes precedence, matching the way a
    // document's own methods would shadow an externally supplied one.
    for helper in extra_helpers.iter().chain(doc.kind().helpers()) {
        // `func` is a plain `fn` pointer, not a captured `Document` — the
        // closure below is `Send + Sync` on its own merits, independent of
        // which document is actually rendering when it runs.
        let func = helper.func;
        env.add_function(helper.name, move |args: Rest<JinjaValue>| -> std::result::Result<JinjaValue, minijinja::Error> {
            func(&current_doc()?, &args)
        });
    }

    env
}

fn document_to_jinja_value(doc: &Document) -> JinjaValue {
    JinjaValue::from_serialize(doc.body().to_plain())
}
