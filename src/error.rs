use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    
    #[error("Response type probabilities must sum to 1.0, got {sum:.4}")]
    ResponseTypeProbabilities { sum: f64 },
    
    #[error("Parameter validation error: {0}")]
    Validation(String),
    
    #[error("Random number generation error")]
    Random,
}

pub type SimResult<T> = Result<T, SimError>;
