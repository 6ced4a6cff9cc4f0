use mongodb::error::Error as MongoError;
use thiserror::Error;

/// Result of a MongoDB backend call.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures of the MongoDB roster backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to replace collection `{collection}`")]
    Replace {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to load collection `{collection}`")]
    Load {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("malformed document in `{collection}`: {message}")]
    Decode {
        collection: &'static str,
        message: String,
    },
}
