//! Placeholder expansion for request variable templates.
//!
//! Scenario variables are a tree of [`VarValue`]s whose string leaves may
//! contain `{{random.KIND(args)}}` tokens. Each request renders the tree with
//! fresh random draws:
//!
//! - `string(len)`, `int(min,max)` / `number(min,max)`, `float(min,max)`
//! - `uuid`, `email`, `name`, `timestamp`
//! - `choice(a,b,c)`
//!
//! Compile a tree once with [`CompiledVars::compile`] and call
//! [`CompiledVars::render`] per request; [`expand`] does both in one step.
//! Rendering takes the caller's RNG, so concurrent callers never share state.

pub mod generate;
pub mod token;
pub mod value;

pub use token::{Generator, Segment, Template};
pub use value::VarValue;

use rand::Rng;
use std::collections::BTreeMap;

/// A variable tree with every string leaf pre-parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledVars {
    /// Non-string leaves and strings without tokens.
    Static(VarValue),
    Template(Template),
    List(Vec<CompiledVars>),
    Map(BTreeMap<String, CompiledVars>),
}

impl CompiledVars {
    pub fn compile(value: &VarValue) -> Self {
        match value {
            VarValue::String(s) => {
                let template = Template::parse(s);
                if template.has_tokens() {
                    CompiledVars::Template(template)
                } else {
                    CompiledVars::Static(value.clone())
                }
            }
            VarValue::List(items) => CompiledVars::List(items.iter().map(Self::compile).collect()),
            VarValue::Map(entries) => CompiledVars::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::compile(v)))
                    .collect(),
            ),
            other => CompiledVars::Static(other.clone()),
        }
    }

    /// Produce a concrete tree with the same shape as the source.
    pub fn render<R: Rng + ?Sized>(&self, rng: &mut R) -> VarValue {
        match self {
            CompiledVars::Static(v) => v.clone(),
            CompiledVars::Template(t) => t.render(rng),
            CompiledVars::List(items) => VarValue::List(items.iter().map(|i| i.render(rng)).collect()),
            CompiledVars::Map(entries) => VarValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.render(rng)))
                    .collect(),
            ),
        }
    }
}

/// Expand every placeholder in `value` once.
pub fn expand<R: Rng + ?Sized>(value: &VarValue, rng: &mut R) -> VarValue {
    CompiledVars::compile(value).render(rng)
}

/// Expand placeholders in a plain string, always yielding text.
///
/// Used for header values, where a lone numeric token still renders as a
/// string.
pub fn expand_str<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    Template::parse(text).render_string(rng)
}
