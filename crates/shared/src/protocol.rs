use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// How a form's fields are put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Json,
    Multipart,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("field '{field}' holds a file upload and cannot be encoded as json")]
    FileInJsonForm { field: String },
    #[error("field '{field}' carries an invalid mime type '{mime}'")]
    InvalidMime { field: String, mime: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn wav(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: Some("audio/wav".to_string()),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    File(FileUpload),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormField {
    pub name: String,
    pub value: FieldValue,
}

/// Ordered form contents, the unit a submission serializes. Field order is
/// submission order; a name may repeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    fields: Vec<FormField>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push(FormField {
            name: name.into(),
            value: FieldValue::Text(value.into()),
        });
        self
    }

    pub fn file(mut self, name: impl Into<String>, upload: FileUpload) -> Self {
        self.fields.push(FormField {
            name: name.into(),
            value: FieldValue::File(upload),
        });
        self
    }

    pub fn fields(&self) -> &[FormField] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<FormField> {
        self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Flattens the fields into the flat string map a json-mode form
    /// submits. The last value wins for a repeated name, matching form-data
    /// iteration order. File uploads are not expressible in json mode.
    pub fn json_payload(&self) -> Result<Map<String, Value>, EncodeError> {
        let mut payload = Map::new();
        for field in &self.fields {
            match &field.value {
                FieldValue::Text(value) => {
                    payload.insert(field.name.clone(), Value::String(value.clone()));
                }
                FieldValue::File(_) => {
                    return Err(EncodeError::FileInJsonForm {
                        field: field.name.clone(),
                    });
                }
            }
        }
        Ok(payload)
    }
}

fn num(value: f32) -> String {
    format!("{value}")
}

/// Parameters of a speech generation request. Defaults match the server's
/// route defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct TtsRequest {
    pub text: String,
    pub audio_prompt_path: Option<String>,
    pub exaggeration: f32,
    pub temperature: f32,
    pub seed: i64,
    pub cfg_weight: f32,
    pub min_p: f32,
    pub top_p: f32,
    pub repetition_penalty: f32,
}

impl Default for TtsRequest {
    fn default() -> Self {
        Self {
            text: String::new(),
            audio_prompt_path: None,
            exaggeration: 0.5,
            temperature: 0.8,
            seed: 0,
            cfg_weight: 0.5,
            min_p: 0.05,
            top_p: 1.0,
            repetition_penalty: 1.2,
        }
    }
}

impl TtsRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn into_form(self) -> FormData {
        let mut form = FormData::new().text("text", self.text);
        if let Some(path) = self.audio_prompt_path {
            form = form.text("audio_prompt_path", path);
        }
        form.text("exaggeration", num(self.exaggeration))
            .text("temperature", num(self.temperature))
            .text("seed", self.seed.to_string())
            .text("cfg_weight", num(self.cfg_weight))
            .text("min_p", num(self.min_p))
            .text("top_p", num(self.top_p))
            .text("repetition_penalty", num(self.repetition_penalty))
    }
}

/// Voice conversion: a source recording plus an optional target voice
/// sample the server converts toward.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConvertRequest {
    pub audio: FileUpload,
    pub target_voice: Option<FileUpload>,
}

impl VoiceConvertRequest {
    pub fn into_form(self) -> FormData {
        let mut form = FormData::new().file("audio", self.audio);
        if let Some(target) = self.target_voice {
            form = form.file("target_voice", target);
        }
        form
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpliceRequest {
    pub audio1: FileUpload,
    pub audio2: FileUpload,
}

impl SpliceRequest {
    pub fn into_form(self) -> FormData {
        FormData::new()
            .file("audio1", self.audio1)
            .file("audio2", self.audio2)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrimRequest {
    pub audio: FileUpload,
    pub start: f32,
    pub end: f32,
}

impl TrimRequest {
    pub fn into_form(self) -> FormData {
        FormData::new()
            .file("audio", self.audio)
            .text("start", num(self.start))
            .text("end", num(self.end))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertRequest {
    pub base: FileUpload,
    pub insert: FileUpload,
    pub position: f32,
}

impl InsertRequest {
    pub fn into_form(self) -> FormData {
        FormData::new()
            .file("base", self.base)
            .file("insert", self.insert)
            .text("position", num(self.position))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteSegmentRequest {
    pub audio: FileUpload,
    pub start: f32,
    pub end: f32,
}

impl DeleteSegmentRequest {
    pub fn into_form(self) -> FormData {
        FormData::new()
            .file("audio", self.audio)
            .text("start", num(self.start))
            .text("end", num(self.end))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossfadeRequest {
    pub audio1: FileUpload,
    pub audio2: FileUpload,
    pub duration: f32,
}

impl CrossfadeRequest {
    pub fn new(audio1: FileUpload, audio2: FileUpload) -> Self {
        Self {
            audio1,
            audio2,
            duration: 0.01,
        }
    }

    pub fn into_form(self) -> FormData {
        FormData::new()
            .file("audio1", self.audio1)
            .file("audio2", self.audio2)
            .text("duration", num(self.duration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_value(form: &FormData, name: &str) -> Option<String> {
        form.fields().iter().rev().find_map(|field| {
            if field.name != name {
                return None;
            }
            match &field.value {
                FieldValue::Text(value) => Some(value.clone()),
                FieldValue::File(_) => None,
            }
        })
    }

    #[test]
    fn json_payload_keeps_last_value_for_repeated_name() {
        let form = FormData::new().text("text", "first").text("text", "second");
        let payload = form.json_payload().expect("payload");
        assert_eq!(payload.len(), 1);
        assert_eq!(payload["text"], Value::String("second".to_string()));
    }

    #[test]
    fn json_payload_rejects_file_fields() {
        let form = FormData::new().file("audio", FileUpload::wav("a.wav", vec![1, 2]));
        let err = form.json_payload().expect_err("file field must not encode");
        assert!(matches!(err, EncodeError::FileInJsonForm { field } if field == "audio"));
    }

    #[test]
    fn tts_request_renders_route_defaults_as_strings() {
        let form = TtsRequest::new("hi").into_form();
        assert_eq!(text_value(&form, "text").as_deref(), Some("hi"));
        assert_eq!(text_value(&form, "exaggeration").as_deref(), Some("0.5"));
        assert_eq!(text_value(&form, "temperature").as_deref(), Some("0.8"));
        assert_eq!(text_value(&form, "seed").as_deref(), Some("0"));
        assert_eq!(text_value(&form, "cfg_weight").as_deref(), Some("0.5"));
        assert_eq!(text_value(&form, "min_p").as_deref(), Some("0.05"));
        assert_eq!(text_value(&form, "top_p").as_deref(), Some("1"));
        assert_eq!(
            text_value(&form, "repetition_penalty").as_deref(),
            Some("1.2")
        );
        assert!(text_value(&form, "audio_prompt_path").is_none());
    }

    #[test]
    fn crossfade_request_defaults_duration() {
        let request = CrossfadeRequest::new(
            FileUpload::wav("a.wav", vec![0]),
            FileUpload::wav("b.wav", vec![1]),
        );
        let form = request.into_form();
        assert_eq!(text_value(&form, "duration").as_deref(), Some("0.01"));
    }

    #[test]
    fn voice_convert_omits_absent_target_voice() {
        let form = VoiceConvertRequest {
            audio: FileUpload::wav("src.wav", vec![0]),
            target_voice: None,
        }
        .into_form();
        assert_eq!(form.fields().len(), 1);
        assert_eq!(form.fields()[0].name, "audio");
    }
}
