use std::fmt;

/// SCORM 1.2 API error codes.
///
/// Content packages poll `LMSGetLastError` after every call and branch on the
/// numeric code, so the set of codes and their string forms are fixed by the
/// SCORM 1.2 runtime specification. The eight API calls never raise across the
/// boundary; every failure is reported through this channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NoError,
    GeneralException,
    InvalidArgument,
    NoChildren,
    NotAnArray,
    NotInitialized,
    NotImplemented,
    KeywordViolation,
    ReadOnly,
    WriteOnly,
    TypeMismatch,
}

impl ErrorCode {
    /// The numeric code as the string the content-facing API returns.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::NoError => "0",
            ErrorCode::GeneralException => "101",
            ErrorCode::InvalidArgument => "201",
            ErrorCode::NoChildren => "202",
            ErrorCode::NotAnArray => "203",
            ErrorCode::NotInitialized => "301",
            ErrorCode::NotImplemented => "401",
            ErrorCode::KeywordViolation => "402",
            ErrorCode::ReadOnly => "403",
            ErrorCode::WriteOnly => "404",
            ErrorCode::TypeMismatch => "405",
        }
    }

    /// The human-readable message for this code.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::NoError => "No error",
            ErrorCode::GeneralException => "General exception",
            ErrorCode::InvalidArgument => "Invalid argument error",
            ErrorCode::NoChildren => "Element cannot have children",
            ErrorCode::NotAnArray => "Element not an array - cannot have count",
            ErrorCode::NotInitialized => "Not initialized",
            ErrorCode::NotImplemented => "Not implemented error",
            ErrorCode::KeywordViolation => "Invalid set value, element is a keyword",
            ErrorCode::ReadOnly => "Element is read only",
            ErrorCode::WriteOnly => "Element is write only",
            ErrorCode::TypeMismatch => "Incorrect data type",
        }
    }

    /// Parse a numeric code string back into an `ErrorCode`.
    pub fn from_code(code: &str) -> Option<ErrorCode> {
        match code {
            "0" => Some(ErrorCode::NoError),
            "101" => Some(ErrorCode::GeneralException),
            "201" => Some(ErrorCode::InvalidArgument),
            "202" => Some(ErrorCode::NoChildren),
            "203" => Some(ErrorCode::NotAnArray),
            "301" => Some(ErrorCode::NotInitialized),
            "401" => Some(ErrorCode::NotImplemented),
            "402" => Some(ErrorCode::KeywordViolation),
            "403" => Some(ErrorCode::ReadOnly),
            "404" => Some(ErrorCode::WriteOnly),
            "405" => Some(ErrorCode::TypeMismatch),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for ErrorCode {}

/// Look up the message for a numeric code string. Unknown codes yield "".
pub fn error_string(code: &str) -> &'static str {
    ErrorCode::from_code(code).map(|c| c.message()).unwrap_or("")
}
