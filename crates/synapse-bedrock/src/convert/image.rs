//! Titan Image / Nova Canvas generation

use crate::error::BedrockError;
use crate::protocol::native::{ImageGenerationConfig, TextToImageParams, TitanImageRequest, TitanImageResponse};
use crate::types::{ImageData, ImageGenerationRequest, ImageGenerationResponse};

/// Parse `WIDTHxHEIGHT`
///
/// `auto` in any case, or no size at all, leaves the dimensions to the model.
pub fn parse_size(size: Option<&str>) -> Result<Option<(u32, u32)>, BedrockError> {
    let Some(size) = size.map(|s| s.trim().to_ascii_lowercase()) else {
        return Ok(None);
    };

    if size == "auto" {
        return Ok(None);
    }

    let Some((width, height)) = size.split_once('x').filter(|(_, h)| !h.contains('x')) else {
        return Err(BedrockError::InvalidRequest(format!(
            "invalid size format: expected 'WIDTHxHEIGHT', got {size:?}"
        )));
    };

    let width = width
        .parse()
        .map_err(|e| BedrockError::InvalidRequest(format!("invalid width in size {size:?}: {e}")))?;
    let height = height
        .parse()
        .map_err(|e| BedrockError::InvalidRequest(format!("invalid height in size {size:?}: {e}")))?;

    Ok(Some((width, height)))
}

/// Map unified quality names onto `standard` / `premium`
pub fn map_quality(quality: &str) -> String {
    match quality.trim().to_ascii_lowercase().as_str() {
        "low" | "medium" | "standard" => "standard".to_owned(),
        "high" | "premium" => "premium".to_owned(),
        _ => quality.to_owned(),
    }
}

/// Build a `TEXT_IMAGE` task body
pub fn encode(request: &ImageGenerationRequest) -> Result<TitanImageRequest, BedrockError> {
    if request.prompt.trim().is_empty() {
        return Err(BedrockError::InvalidRequest("image prompt must not be empty".to_owned()));
    }

    let dimensions = parse_size(request.size.as_deref())?;

    let mut extra = request.extra_params.clone();
    let cfg_scale = extra.shift_remove("cfgScale").and_then(|v| v.as_f64());
    let quality = request
        .quality
        .as_deref()
        .or_else(|| extra.get("quality").and_then(|v| v.as_str()))
        .map(map_quality);
    extra.shift_remove("quality");

    Ok(TitanImageRequest {
        task_type: "TEXT_IMAGE".to_owned(),
        text_to_image_params: TextToImageParams {
            text: request.prompt.clone(),
            negative_text: request.negative_prompt.clone(),
            style: request.style.clone(),
        },
        image_generation_config: ImageGenerationConfig {
            number_of_images: request.n,
            quality,
            width: dimensions.map(|(w, _)| w),
            height: dimensions.map(|(_, h)| h),
            seed: request.seed,
            cfg_scale,
        },
        extra: super::residual_extras(extra, TitanImageRequest::FIELDS),
    })
}

pub fn decode(model: &str, response: TitanImageResponse) -> Result<ImageGenerationResponse, BedrockError> {
    if let Some(error) = response.error.filter(|e| !e.is_empty()) {
        return Err(BedrockError::InvalidRequest(format!("image generation failed: {error}")));
    }

    let data = (0u32..)
        .zip(response.images)
        .map(|(index, b64_json)| ImageData { index, b64_json })
        .collect();

    Ok(ImageGenerationResponse {
        created: super::unix_now(),
        model: model.to_owned(),
        data,
    })
}
