use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatementLayoutError {
    #[error("Unknown statement identifier: {0}")]
    UnknownStatement(String),

    #[error("Invalid scale factor {0}: must be greater than zero")]
    InvalidScaleFactor(f64),

    #[error("Invalid year count {0}: must be at least one")]
    InvalidYearCount(usize),

    #[error("Malformed vendor payload: {0}")]
    MalformedPayload(String),

    #[error("Subtotal '{subtotal}' references undefined constituent '{constituent}'")]
    UnknownConstituent {
        subtotal: String,
        constituent: String,
    },

    #[error("Schema defect in {statement} catalog: {details}")]
    SchemaDefect { statement: String, details: String },

    #[error("Conservation violation in {statement} for FY{year}: raw total {raw_total} != row total {row_total}")]
    ConservationViolation {
        statement: String,
        year: i32,
        raw_total: f64,
        row_total: f64,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StatementLayoutError>;
