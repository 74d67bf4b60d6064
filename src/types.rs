pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "Method Not Allowed";
pub const PROMPT_REQUIRED_MESSAGE: &str = "Prompt is required";
pub const CONFIG_INCOMPLETE_MESSAGE: &str = "La configuración del servidor está incompleta.";
pub const UPSTREAM_FAILURE_MESSAGE: &str = "Error al comunicarse con el asistente de IA.";
pub const EMPTY_OUTPUT_MESSAGE: &str = "El asistente de IA no pudo generar una respuesta.";
pub const OVERLOADED_MESSAGE: &str =
    "El asistente de IA está sobrecargado. Inténtalo de nuevo en unos momentos.";
pub const INTERNAL_ERROR_MESSAGE: &str = "Ha ocurrido un error interno en el servidor.";

/// Raw outcome of a single upstream attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// What one invocation produces for the transport layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NormalizedResult {
    Success { text: String },
    Failure { status_code: u16, message: String },
}

/// Status and JSON body ready to be written by the hosting runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: serde_json::Value,
}
