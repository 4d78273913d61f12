//! Call resolution for the kres engine.
//!
//! Given a call expression, its scope tower and an expected type, the
//! resolver:
//! - collects candidate declarations by tower priority (`collector`)
//! - checks each candidate's applicability against a fresh constraint
//!   system (`applicability`)
//! - picks the most specific applicable candidate (`overload`)
//! - completes inference, analyzing lambdas and callable references as
//!   their input types become known (`completion`, `postponed`)
//! - reports user-facing diagnostics for failures (`diagnostics`)
//!
//! Types, subtyping and the constraint system live in `kres-solver`.

// Tree of scope levels consulted for implicit receivers and names
pub mod tower;
pub use tower::{
    ClassContext, ClassTowers, ImplicitReceiver, ImportScope, LocalScope, ReceiverId, ReceiverKind,
    ScopeTower, TowerLevel, TowerMode,
};

// Declarations and the provider boundary
pub mod declarations;
pub use declarations::{
    CallableDescriptor, CallableKind, DeclFlags, DeclId, DeclarationProvider, DescriptorBuilder,
    SymbolTable, TypeParameterDescriptor, ValueParameter, Visibility,
};

// Expression arena the resolver walks
pub mod expr;
pub use expr::{Argument, BinaryOp, Expr, ExprArena, ExprId, LambdaParam, Literal};

// Data-flow snapshot: smart casts and stability
pub mod flow;
pub use flow::{DataFlowInfo, FlowFact, FlowSubject};

pub mod collector;
pub use collector::{CallShape, Candidate, CandidateGroup, CandidateKind, ExplicitReceiverKind};

pub mod argument_mapping;
pub use argument_mapping::{ArgumentMapping, CallArgument, MappingError, MappingErrorKind};

pub mod applicability;
pub use applicability::{ApplicabilityStatus, InapplicabilityReason};

pub mod completion;
pub use completion::{CompletionError, CompletionMode, CompletionState};

mod postponed;

mod overload;

pub mod diagnostics;
pub use diagnostics::{Diagnostic, DiagnosticCollector, DiagnosticKind, DiagnosticSink};

pub mod results;
pub use results::{
    CallSiteResult, ExpectedType, ExprResolution, ResolvedArgument, ResolvedCall, ResolvedCallKind,
};

pub mod cache;
pub use cache::ResolutionCache;

// Resolver options (JSON, camelCase)
pub mod config;
pub use config::{ResolverOptions, SafeCallNullability, load_options, parse_options};

mod resolver;
pub use resolver::CallResolver;

// Tracing setup (KRES_LOG / KRES_LOG_FORMAT)
pub mod tracing_config;
