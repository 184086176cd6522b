//! Edit dispatcher: tool + prompt → one image-generation call.
//!
//! DESIGN
//! ======
//! Each of the five tools has a fixed prompt template and payload order.
//! `EditCommand::prepare` validates the user's input and computes the
//! effective prompt; `build_request` turns a prepared command plus the
//! current image into exactly one `GenerateRequest`; `dispatch` makes the
//! call and insists on an image in the response.
//!
//! Payload order is part of the contract: the primary image always comes
//! first for the object tool, with the optional reference image inserted
//! immediately after it and the instruction last.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::image::DataUri;
use crate::model::ImageModel;
use crate::model::types::{BlockThreshold, GenerateRequest, HarmCategory, ModelError, Part, SafetySetting};

/// Artistic presets offered by the style tool.
pub const STYLE_OPTIONS: [&str; 10] = [
    "Ghibli",
    "Contour",
    "Sketch",
    "Blur Background",
    "Pixel Art",
    "Van Gogh",
    "Cyberpunk",
    "Impressionistic",
    "Watercolor",
    "Oil Painting",
];

const DRESS_SAFETY: [SafetySetting; 4] = [
    SafetySetting { category: HarmCategory::HateSpeech, threshold: BlockThreshold::OnlyHigh },
    SafetySetting { category: HarmCategory::DangerousContent, threshold: BlockThreshold::None },
    SafetySetting { category: HarmCategory::Harassment, threshold: BlockThreshold::MediumAndAbove },
    SafetySetting { category: HarmCategory::SexuallyExplicit, threshold: BlockThreshold::LowAndAbove },
];

// =============================================================================
// TOOL
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    General,
    Background,
    Dress,
    Style,
    Object,
}

impl Tool {
    pub const ALL: [Tool; 5] = [Self::General, Self::Background, Self::Dress, Self::Style, Self::Object];

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::General => "General Edit",
            Self::Background => "Background",
            Self::Dress => "Dress Style",
            Self::Style => "Artistic Style",
            Self::Object => "Add/Remove Object",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Background => "background",
            Self::Dress => "dress",
            Self::Style => "style",
            Self::Object => "object",
        }
    }

    /// Message surfaced when the model answers without an image.
    #[must_use]
    fn missing_image_message(self) -> &'static str {
        match self {
            Self::General => "AI did not return an edited image.",
            Self::Background | Self::Object => "AI did not return a modified image.",
            Self::Dress => "AI did not return an edited image for the dress style change.",
            Self::Style => "AI did not return a stylized image.",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Please describe the {} you want.", .0.display_name().to_lowercase())]
    MissingPrompt(Tool),
    #[error("Please select a style or provide a style description.")]
    MissingStyle,
    #[error("Please describe what to add or remove.")]
    MissingCommand,
    #[error("{}", .0.missing_image_message())]
    NoImage(Tool),
    #[error("{0}")]
    Model(#[from] ModelError),
}

impl crate::error::ErrorCode for DispatchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingPrompt(_) => "E_MISSING_PROMPT",
            Self::MissingStyle => "E_MISSING_STYLE",
            Self::MissingCommand => "E_MISSING_COMMAND",
            Self::NoImage(_) => "E_NO_IMAGE",
            Self::Model(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::NoImage(_) => true,
            Self::Model(e) => e.retryable(),
            _ => false,
        }
    }
}

// =============================================================================
// EDIT COMMAND
// =============================================================================

/// A validated edit: which tool, the effective prompt sent to the model, the
/// line shown in the chat transcript, and the optional reference image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditCommand {
    pub tool: Tool,
    pub prompt: String,
    pub chat_line: String,
    pub reference: Option<DataUri>,
}

impl EditCommand {
    /// Validate user input for `tool` and compute the effective prompt.
    ///
    /// The reference image is only carried by the object tool; other tools
    /// ignore it.
    ///
    /// # Errors
    ///
    /// Returns the tool-specific missing-input error when nothing usable was
    /// provided.
    pub fn prepare(
        tool: Tool,
        prompt: &str,
        selected_style: Option<&str>,
        reference: Option<&DataUri>,
    ) -> Result<Self, DispatchError> {
        let prompt = prompt.trim();
        match tool {
            Tool::General | Tool::Background | Tool::Dress => {
                if prompt.is_empty() {
                    return Err(DispatchError::MissingPrompt(tool));
                }
                Ok(Self { tool, prompt: prompt.to_owned(), chat_line: prompt.to_owned(), reference: None })
            }
            Tool::Style => {
                let style = selected_style.map(str::trim).filter(|s| !s.is_empty());
                let effective = match (style, prompt.is_empty()) {
                    (None, true) => return Err(DispatchError::MissingStyle),
                    (None, false) => prompt.to_owned(),
                    (Some(style), true) => style.to_owned(),
                    (Some(style), false) => format!("{style} {prompt}"),
                };
                Ok(Self { tool, chat_line: format!("Style: {effective}"), prompt: effective, reference: None })
            }
            Tool::Object => {
                if prompt.is_empty() {
                    return Err(DispatchError::MissingCommand);
                }
                let chat_line = if reference.is_some() {
                    format!("{prompt} (Using reference image)")
                } else {
                    prompt.to_owned()
                };
                Ok(Self { tool, prompt: prompt.to_owned(), chat_line, reference: reference.cloned() })
            }
        }
    }
}

// =============================================================================
// REQUEST BUILDING
// =============================================================================

/// Build the single generation request for `command` against `image`.
#[must_use]
pub fn build_request(command: &EditCommand, image: &DataUri, api_key: Option<&str>) -> GenerateRequest {
    let p = &command.prompt;
    let (parts, safety) = match command.tool {
        Tool::General => (vec![Part::media(image), Part::text(format!("Apply the following edit: {p}"))], Vec::new()),
        Tool::Background => {
            (vec![Part::media(image), Part::text(format!("Modify the background to: {p}"))], Vec::new())
        }
        Tool::Dress => (
            vec![
                Part::media(image),
                Part::text(format!(
                    "Change the style of the dress in the image to match the following description: {p}. \
                     Ensure the person and the rest of the image remain as unchanged as possible, \
                     focusing only on altering the dress."
                )),
            ],
            DRESS_SAFETY.to_vec(),
        ),
        Tool::Style => (
            vec![Part::text(format!("Apply the following style to the image: \"{p}\"")), Part::media(image)],
            Vec::new(),
        ),
        Tool::Object => {
            let mut parts = vec![Part::media(image)];
            let mut instruction = format!("Modify the image according to the following command: \"{p}\".");
            if let Some(reference) = &command.reference {
                parts.push(Part::media(reference));
                instruction.push_str(
                    " Use the provided reference image as a visual guide for this command. \
                     The reference image is the second image provided, the primary image to modify is the first.",
                );
            }
            parts.push(Part::text(instruction));
            (parts, Vec::new())
        }
    };

    GenerateRequest { parts, safety, api_key: api_key.map(str::to_owned) }
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Make exactly one model call for `command` and return the result image.
///
/// # Errors
///
/// Returns [`DispatchError::Model`] when the call fails and
/// [`DispatchError::NoImage`] when the model answers without an image.
pub async fn dispatch(
    model: &dyn ImageModel,
    command: &EditCommand,
    image: &DataUri,
    api_key: Option<&str>,
) -> Result<DataUri, DispatchError> {
    let request = build_request(command, image, api_key);
    info!(
        tool = %command.tool,
        prompt_len = command.prompt.len(),
        images = request.media_count(),
        custom_key = api_key.is_some(),
        "dispatch: sending edit"
    );

    let response = model.generate(&request).await?;
    match response.image {
        Some(result) => {
            info!(tool = %command.tool, model = %response.model, bytes = result.decoded_len(), "dispatch: image received");
            Ok(result)
        }
        None => {
            warn!(tool = %command.tool, text = ?response.text, "dispatch: model returned no image");
            Err(DispatchError::NoImage(command.tool))
        }
    }
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
