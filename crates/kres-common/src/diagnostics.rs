//! Diagnostic categories and stable diagnostic codes.
//!
//! The resolver classifies failures into diagnostic *kinds*; message
//! formatting and localization belong to the embedding compiler. Codes are
//! stable so that external reporters can key their templates on them.

use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DiagnosticCategory {
    Error,
    Warning,
}

impl DiagnosticCategory {
    pub fn is_error(self) -> bool {
        self == DiagnosticCategory::Error
    }
}

pub mod diagnostic_codes {
    pub const UNRESOLVED_REFERENCE: u32 = 1001;
    pub const OVERLOAD_AMBIGUITY: u32 = 1002;
    pub const NONE_APPLICABLE: u32 = 1003;
    pub const ARGUMENT_TYPE_MISMATCH: u32 = 1101;
    pub const ARGUMENT_NULLABILITY_MISMATCH: u32 = 1102;
    pub const ARGUMENTS_MAPPING_ERROR: u32 = 1103;
    pub const WRONG_NUMBER_OF_TYPE_ARGUMENTS: u32 = 1104;
    pub const CONSTRAINT_CONTRADICTION: u32 = 1201;
    pub const EMPTY_INTERSECTION: u32 = 1202;
    pub const NOT_ENOUGH_INFORMATION_FOR_TYPE_PARAMETER: u32 = 1203;
    pub const RECURSION_IN_INFERENCE: u32 = 1204;
    pub const RESULT_TYPE_MISMATCH: u32 = 1205;
    pub const VISIBILITY_ERROR: u32 = 1301;
    pub const RECEIVER_TYPE_MISMATCH: u32 = 1302;
    pub const UNSAFE_CALL_ON_NULLABLE: u32 = 1303;
    pub const OPERATOR_MODIFIER_REQUIRED: u32 = 1304;
    pub const UNSTABLE_SMART_CAST: u32 = 1401;
}
