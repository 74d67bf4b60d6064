use crate::{
    wire::{Content, GenerateContentRequest, GenerateContentResponse, Part},
    RelayError, Result,
};

const TUTOR_TEMPLATE_PREFIX: &str = "Responde a la siguiente pregunta de un estudiante de forma concisa y amigable, como un tutor experto. La pregunta es: \"";

pub(crate) fn build_tutor_request(prompt: &str) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            parts: vec![Part {
                text: Some(format!("{TUTOR_TEMPLATE_PREFIX}{prompt}\"")),
            }],
        }],
    }
}

/// Extracts the first candidate's first text part from a 2xx body.
pub(crate) fn decode_candidate_text(body: &str) -> Result<String> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|err| RelayError::Decode(format!("invalid generateContent JSON: {err}")))?;

    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or(RelayError::EmptyOutput)
}
