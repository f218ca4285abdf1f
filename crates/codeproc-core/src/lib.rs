//! Rule-processing engine for Titanium mobile JavaScript projects
//!
//! A [`Processor`] walks a project starting at its entry point, follows
//! `Ti.include` and `require` into other files, and dispatches every AST node
//! to the listeners registered for its rule. Listeners grouped under a tag run
//! in their own pass with a fresh scope model, so passes never see each
//! other's state.
//!
//! ```no_run
//! use codeproc_core::Processor;
//!
//! let mut processor = Processor::new();
//! processor.on_rule("Call", true, None, |ctx, event| {
//!     if let Some(context) = &event.current_context {
//!         println!("call in {} at line {}", context.name, context.line);
//!     }
//!     let _ = ctx.lookup_variable("Ti");
//! });
//! let report = processor.process("path/to/project".as_ref())?;
//! println!("{} file(s)", report.passes[0].files.len());
//! # Ok::<(), codeproc_core::ProcessError>(())
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod events;
pub mod parser;
pub mod processor;
pub mod project;
pub mod rules;
pub mod semantic;
pub mod value;

pub use ast::{Node, NodeKind, Rule};
pub use config::Config;
pub use error::{InternalError, PluginError, ProcessError};
pub use events::{EventData, RuleEvent, StateEvent};
pub use parser::{JsonAstParser, ParseError, SourceParser, SwcParser};
pub use processor::{PassContext, PassSummary, ProcessReport, Processor};
pub use rules::{Completion, CompletionKind, RuleValue};
pub use value::{JsValue, ValueType};
