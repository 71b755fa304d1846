use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid Solana address format: {0}")]
    InvalidSolanaAddress(String),

    #[error("Invalid transaction signature format: {0}")]
    InvalidSignature(String),
}

pub fn validate_solana_address(address: &str) -> Result<(), ValidationError> {
    if address.trim().is_empty() {
        return Err(ValidationError::MissingParameter("address".to_string()));
    }

    // Decode base58 string
    let decoded = match bs58::decode(address).into_vec() {
        Ok(bytes) => bytes,
        Err(_) => return Err(ValidationError::InvalidSolanaAddress(address.to_string())),
    };

    // Solana addresses are 32 bytes
    if decoded.len() != 32 {
        return Err(ValidationError::InvalidSolanaAddress(address.to_string()));
    }

    Ok(())
}

pub fn validate_signature(signature: &str) -> Result<(), ValidationError> {
    if signature.trim().is_empty() {
        return Err(ValidationError::MissingParameter("signature".to_string()));
    }

    let decoded = match bs58::decode(signature).into_vec() {
        Ok(bytes) => bytes,
        Err(_) => return Err(ValidationError::InvalidSignature(signature.to_string())),
    };

    // Transaction signatures are 64 bytes
    if decoded.len() != 64 {
        return Err(ValidationError::InvalidSignature(signature.to_string()));
    }

    Ok(())
}
