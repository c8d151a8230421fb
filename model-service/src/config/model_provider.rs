use std::fmt;
use std::str::FromStr;

use crate::error_handler::ConfigError;

/// Backend that serves a model profile.
///
/// Embedding profiles accept [`ModelProvider::Ollama`] and [`ModelProvider::OpenAI`];
/// rerank profiles accept [`ModelProvider::Cohere`] and [`ModelProvider::Tei`].
///
/// # Examples
///
/// ```
/// use model_service::ModelProvider;
///
/// let p: ModelProvider = "ollama".parse().unwrap();
/// assert!(p.supports_embeddings());
/// assert!(!p.supports_rerank());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelProvider {
    /// Local Ollama runtime.
    Ollama,
    /// OpenAI or any server speaking the `/v1/embeddings` protocol.
    OpenAI,
    /// Cohere-compatible `/v1/rerank` (`{results: [{index, relevance_score}]}`).
    Cohere,
    /// Hugging Face text-embeddings-inference `/rerank` (`[{index, score}]`).
    Tei,
}

impl ModelProvider {
    /// True when this backend can serve an embedding profile.
    pub fn supports_embeddings(self) -> bool {
        matches!(self, Self::Ollama | Self::OpenAI)
    }

    /// True when this backend can serve a rerank profile.
    pub fn supports_rerank(self) -> bool {
        matches!(self, Self::Cohere | Self::Tei)
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
            Self::Cohere => "cohere",
            Self::Tei => "tei",
        };
        f.write_str(s)
    }
}

impl FromStr for ModelProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" | "open_ai" | "chatgpt" => Ok(Self::OpenAI),
            "cohere" => Ok(Self::Cohere),
            "tei" | "hf-tei" => Ok(Self::Tei),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names_case_insensitively() {
        assert_eq!("Ollama".parse::<ModelProvider>().unwrap(), ModelProvider::Ollama);
        assert_eq!(" OPENAI ".parse::<ModelProvider>().unwrap(), ModelProvider::OpenAI);
        assert_eq!("tei".parse::<ModelProvider>().unwrap(), ModelProvider::Tei);
        assert!("mistral".parse::<ModelProvider>().is_err());
    }

    #[test]
    fn capability_split() {
        assert!(ModelProvider::OpenAI.supports_embeddings());
        assert!(ModelProvider::Cohere.supports_rerank());
        assert!(!ModelProvider::Tei.supports_embeddings());
    }
}
