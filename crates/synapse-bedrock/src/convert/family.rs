use strum::{Display, IntoStaticStr};

/// Bedrock model family, derived from the model identifier
///
/// The request encoder and the response and stream decoders all call
/// [`ModelFamily::detect`] on the same identifier, so a body built for one
/// family is never parsed by another family's decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum ModelFamily {
    Anthropic,
    Nova,
    Ai21Jamba,
    CohereCommand,
    CohereCommandR,
    Llama,
    Mistral,
    TitanEmbedding,
    TitanImage,
    /// Anything else Bedrock serves through Converse
    Converse,
}

impl ModelFamily {
    /// Detect the family by substring match on the lower-cased identifier
    ///
    /// Works on bare ids, region-prefixed inference profiles and ARNs.
    pub fn detect(model: &str) -> Self {
        let model = model.to_ascii_lowercase();

        if model.contains("titan-image") || model.contains("nova-canvas") {
            Self::TitanImage
        } else if model.contains("titan-embed") {
            Self::TitanEmbedding
        } else if model.contains("anthropic.") || model.contains("claude") {
            Self::Anthropic
        } else if model.contains("nova") {
            Self::Nova
        } else if model.contains("ai21") || model.contains("jamba") {
            Self::Ai21Jamba
        } else if model.contains("cohere.command-r") {
            Self::CohereCommandR
        } else if model.contains("cohere.command") {
            Self::CohereCommand
        } else if model.contains("llama") {
            Self::Llama
        } else if model.contains("mistral") || model.contains("codestral") || model.contains("mixtral") {
            Self::Mistral
        } else {
            Self::Converse
        }
    }

    /// Families with a legacy `prompt` completion body
    pub const fn supports_text_completion(self) -> bool {
        matches!(
            self,
            Self::Anthropic | Self::Mistral | Self::Llama | Self::CohereCommand | Self::Ai21Jamba
        )
    }

    /// Families that can hold a chat through Converse
    pub const fn supports_chat(self) -> bool {
        !matches!(self, Self::TitanEmbedding | Self::TitanImage)
    }
}
