//! Top-level compiler loop
//!
//! The loop alternates between two states until the input is exhausted:
//!
//! ```text
//!   ┌──────────┐  form   ┌─────────────┐
//!   │ ReadForm │ ──────▶ │ ExpandEval  │
//!   └──────────┘ ◀────── └─────────────┘
//!        │ end of input      context'
//!        ▼
//!   EvalResult { value of last form, final context }
//! ```
//!
//! Each form is expanded against the context produced by the previous one,
//! so a definition is visible to every later form in the same source.

use tracing::{debug, info_span};

use crate::config::CompilerConfig;
use crate::context::{initial_context, Context};
use crate::error::Result;
use crate::expander::Expander;
use crate::node::{Bindings, EvalResult, Node};
use crate::reader::Reader;
use crate::symbol::{CORE_NS, NS_SLOT};
use crate::value::{CallDepthLimit, Value};

enum State {
    ReadForm,
    ExpandEval(Value),
}

/// Drives reading, expansion and evaluation of source text.
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    /// Create a compiler with the given configuration.
    pub fn new(config: CompilerConfig) -> Self {
        Compiler { config }
    }

    /// The compiler's configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// The initial context, switched to the configured namespace.
    pub fn initial_context(&self) -> Result<Context> {
        let context = initial_context()?;
        if self.config.namespace == CORE_NS {
            return Ok(context);
        }
        Ok(context.define(
            &NS_SLOT,
            Node::constant(Value::string(&self.config.namespace)),
        ))
    }

    /// Compile every form in `source` against `context`.
    ///
    /// Returns the value of the last form (nil for empty input) and the
    /// final context. The first failure aborts the remaining forms.
    pub fn eval(&self, context: &Context, source: &str) -> Result<EvalResult> {
        self.eval_reader(context, Reader::new(source))
    }

    /// Compile every form in a file's contents, reporting locations in
    /// `file`.
    pub fn eval_named(&self, context: &Context, source: &str, file: &str) -> Result<EvalResult> {
        self.eval_reader(context, Reader::with_file(source, file))
    }

    fn eval_reader(&self, context: &Context, mut reader: Reader) -> Result<EvalResult> {
        let _span = info_span!("compile").entered();
        let _limit = CallDepthLimit::enter(self.config.max_call_depth);
        let mut result = EvalResult::new(Value::Nil, context.clone());
        let mut state = State::ReadForm;
        loop {
            state = match state {
                State::ReadForm => match reader.read_next()? {
                    Some(form) => State::ExpandEval(form),
                    None => break,
                },
                State::ExpandEval(form) => {
                    debug!(form = ?form, "compiling form");
                    result = self.eval_form(&result.context, &form)?;
                    State::ReadForm
                }
            };
        }
        Ok(result)
    }

    /// Expand, optionally optimize, then evaluate a single form.
    pub fn eval_form(&self, context: &Context, form: &Value) -> Result<EvalResult> {
        let _limit = CallDepthLimit::enter(self.config.max_call_depth);
        let node = self.expand(context, form)?;
        node.eval(context, &Bindings::new())
    }

    /// Expand a form with the initial expander, optimizing if configured.
    pub fn expand(&self, context: &Context, form: &Value) -> Result<Node> {
        let ex = Expander::with_depth_limit(self.config.max_expansion_depth);
        let node = ex.expand(context, form, &ex)?;
        Ok(if self.config.optimize {
            node.optimize()
        } else {
            node
        })
    }
}

/// Compile `source` against `context` with the default configuration.
pub fn eval(context: &Context, source: &str) -> Result<EvalResult> {
    Compiler::default().eval(context, source)
}
