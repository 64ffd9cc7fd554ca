use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use playback::{AudioClip, AudioPlayer, PlaybackError};
use reqwest::{header::CONTENT_TYPE, Client};
use shared::{
    domain::{AudioTargetId, FormId},
    protocol::{
        CrossfadeRequest, DeleteSegmentRequest, EncodeError, Encoding, FieldValue, FormData,
        InsertRequest, SpliceRequest, TrimRequest, TtsRequest, VoiceConvertRequest,
    },
};
use tokio::sync::Mutex;
use tracing::{debug, warn};

pub mod error;
pub mod theme;

pub use error::SubmitError;
pub use theme::ThemeController;

/// Fixed user-facing message for any server-reported failure. The status
/// code and response body are deliberately not surfaced.
pub const ERROR_NOTICE: &str = "Error processing request";

pub const TTS_FORM: &str = "tts-form";
pub const VC_FORM: &str = "vc-form";
pub const EDIT_SPLICE_FORM: &str = "edit-splice";
pub const EDIT_TRIM_FORM: &str = "edit-trim";
pub const EDIT_INSERT_FORM: &str = "edit-insert";
pub const EDIT_DELETE_FORM: &str = "edit-delete";
pub const EDIT_CROSSFADE_FORM: &str = "edit-crossfade";

pub const TTS_AUDIO: &str = "tts-audio";
pub const VC_AUDIO: &str = "vc-audio";
pub const EDIT_AUDIO: &str = "edit-audio";

/// Blocking user-facing notification seam, the `alert` analog.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Swallows notifications. The default until a surface is attached.
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn notify(&self, _message: &str) {}
}

/// Rejects every clip until a real playback backend is injected.
pub struct MissingAudioPlayer;

impl AudioPlayer for MissingAudioPlayer {
    fn play(&self, _clip: &AudioClip) -> Result<(), PlaybackError> {
        Err(PlaybackError::Output(
            "no playback backend configured".to_string(),
        ))
    }
}

/// One form wired to one endpoint: created at page-ready time, immutable
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormBinding {
    pub form: FormId,
    pub endpoint: String,
    pub target: AudioTargetId,
    pub encoding: Encoding,
}

impl FormBinding {
    pub fn json(
        form: impl Into<FormId>,
        endpoint: impl Into<String>,
        target: impl Into<AudioTargetId>,
    ) -> Self {
        Self {
            form: form.into(),
            endpoint: endpoint.into(),
            target: target.into(),
            encoding: Encoding::Json,
        }
    }

    pub fn multipart(
        form: impl Into<FormId>,
        endpoint: impl Into<String>,
        target: impl Into<AudioTargetId>,
    ) -> Self {
        Self {
            form: form.into(),
            endpoint: endpoint.into(),
            target: target.into(),
            encoding: Encoding::Multipart,
        }
    }
}

/// The declarative set of forms the embedding surface actually offers.
/// Bindings whose form is absent are skipped, never errors: a page carrying
/// only a subset of forms is expected.
#[derive(Debug, Clone, Default)]
pub struct PageSurface {
    forms: HashSet<FormId>,
}

impl PageSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every form of the original page.
    pub fn full() -> Self {
        let mut surface = Self::new();
        for form in [
            TTS_FORM,
            VC_FORM,
            EDIT_SPLICE_FORM,
            EDIT_TRIM_FORM,
            EDIT_INSERT_FORM,
            EDIT_DELETE_FORM,
            EDIT_CROSSFADE_FORM,
        ] {
            surface = surface.with_form(form);
        }
        surface
    }

    pub fn with_form(mut self, form: impl Into<FormId>) -> Self {
        self.forms.insert(form.into());
        self
    }

    pub fn has_form(&self, form: &FormId) -> bool {
        self.forms.contains(form)
    }
}

#[derive(Debug, Default)]
struct OutputState {
    current: Option<AudioClip>,
    visible: bool,
}

/// The audio-element analog: holds at most one clip, reveals itself when a
/// result arrives, and hands the clip to the player. Bindings naming the
/// same target share one output, so concurrent submissions race and the
/// last response to arrive wins.
pub struct AudioOutput {
    id: AudioTargetId,
    player: Arc<dyn AudioPlayer>,
    state: Mutex<OutputState>,
}

impl AudioOutput {
    fn new(id: AudioTargetId, player: Arc<dyn AudioPlayer>) -> Self {
        Self {
            id,
            player,
            state: Mutex::new(OutputState::default()),
        }
    }

    pub fn id(&self) -> &AudioTargetId {
        &self.id
    }

    pub async fn current_clip(&self) -> Option<AudioClip> {
        self.state.lock().await.current.clone()
    }

    pub async fn is_visible(&self) -> bool {
        self.state.lock().await.visible
    }

    async fn present(&self, clip: AudioClip) -> Result<(), PlaybackError> {
        {
            let mut state = self.state.lock().await;
            // The superseded clip is released before its replacement is
            // stored; its bytes are reclaimed once no player holds them.
            let previous = state.current.replace(clip.clone());
            drop(previous);
            state.visible = true;
        }
        self.player.play(&clip)
    }
}

struct BoundForm {
    binding: FormBinding,
    output: Arc<AudioOutput>,
}

/// Client-side controller for the speech service: binds forms to endpoints,
/// serializes submissions as json or multipart, performs one POST per
/// submission, and routes the returned audio into the bound output.
pub struct StudioClient {
    http: Client,
    base_url: String,
    player: Arc<dyn AudioPlayer>,
    notifier: Arc<dyn Notifier>,
    bindings: HashMap<FormId, BoundForm>,
    outputs: HashMap<AudioTargetId, Arc<AudioOutput>>,
}

impl StudioClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::new_with_dependencies(
            base_url,
            Arc::new(MissingAudioPlayer),
            Arc::new(SilentNotifier),
        )
    }

    pub fn new_with_dependencies(
        base_url: impl Into<String>,
        player: Arc<dyn AudioPlayer>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
            player,
            notifier,
            bindings: HashMap::new(),
            outputs: HashMap::new(),
        }
    }

    /// Wires every default binding present on the surface, the page-ready
    /// step of the original page.
    pub fn bind_default_page(&mut self, surface: &PageSurface) {
        for binding in default_bindings() {
            self.bind(binding, surface);
        }
    }

    /// Binds a multipart form. A form id missing from the surface is a
    /// no-op, not an error; returns whether a handler was registered.
    pub fn bind_form(
        &mut self,
        form: impl Into<FormId>,
        endpoint: impl Into<String>,
        target: impl Into<AudioTargetId>,
        surface: &PageSurface,
    ) -> bool {
        self.bind(FormBinding::multipart(form, endpoint, target), surface)
    }

    /// Binds a json form; otherwise identical to [`bind_form`].
    ///
    /// [`bind_form`]: StudioClient::bind_form
    pub fn bind_json_form(
        &mut self,
        form: impl Into<FormId>,
        endpoint: impl Into<String>,
        target: impl Into<AudioTargetId>,
        surface: &PageSurface,
    ) -> bool {
        self.bind(FormBinding::json(form, endpoint, target), surface)
    }

    pub fn bind(&mut self, binding: FormBinding, surface: &PageSurface) -> bool {
        if !surface.has_form(&binding.form) {
            debug!(form = %binding.form, "form not present on surface, skipping binding");
            return false;
        }

        let player = Arc::clone(&self.player);
        let output = self
            .outputs
            .entry(binding.target.clone())
            .or_insert_with(|| Arc::new(AudioOutput::new(binding.target.clone(), player)));
        let bound = BoundForm {
            output: Arc::clone(output),
            binding: binding.clone(),
        };
        debug!(form = %binding.form, endpoint = %binding.endpoint, "registered form binding");
        self.bindings.insert(binding.form, bound);
        true
    }

    pub fn is_bound(&self, form: &FormId) -> bool {
        self.bindings.contains_key(form)
    }

    pub fn binding(&self, form: &FormId) -> Option<&FormBinding> {
        self.bindings.get(form).map(|bound| &bound.binding)
    }

    pub fn output(&self, target: &AudioTargetId) -> Option<Arc<AudioOutput>> {
        self.outputs.get(target).cloned()
    }

    /// Submits form contents through a registered binding: one POST, no
    /// retry, no timeout. A non-success status fires the fixed notification
    /// and leaves the bound output untouched; a success routes the body
    /// into the output and starts playback.
    pub async fn submit(&self, form: &FormId, data: FormData) -> Result<(), SubmitError> {
        let bound = self
            .bindings
            .get(form)
            .ok_or_else(|| SubmitError::UnboundForm { form: form.clone() })?;

        let url = format!("{}{}", self.base_url, bound.binding.endpoint);
        let request = match bound.binding.encoding {
            Encoding::Json => self.http.post(&url).json(&data.json_payload()?),
            Encoding::Multipart => self.http.post(&url).multipart(multipart_payload(data)?),
        };

        let response = request.send().await.map_err(SubmitError::Network)?;
        let status = response.status();
        if !status.is_success() {
            warn!(form = %form, %status, "submission rejected by server");
            self.notifier.notify(ERROR_NOTICE);
            return Err(SubmitError::Status { status });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(SubmitError::Network)?;
        debug!(form = %form, bytes = bytes.len(), "routing returned audio to output");

        let clip = AudioClip::new(bytes.to_vec(), content_type);
        bound.output.present(clip).await?;
        Ok(())
    }

    pub async fn synthesize(&self, request: TtsRequest) -> Result<(), SubmitError> {
        self.submit(&FormId::from(TTS_FORM), request.into_form())
            .await
    }

    pub async fn convert_voice(&self, request: VoiceConvertRequest) -> Result<(), SubmitError> {
        self.submit(&FormId::from(VC_FORM), request.into_form())
            .await
    }

    pub async fn splice(&self, request: SpliceRequest) -> Result<(), SubmitError> {
        self.submit(&FormId::from(EDIT_SPLICE_FORM), request.into_form())
            .await
    }

    pub async fn trim(&self, request: TrimRequest) -> Result<(), SubmitError> {
        self.submit(&FormId::from(EDIT_TRIM_FORM), request.into_form())
            .await
    }

    pub async fn insert(&self, request: InsertRequest) -> Result<(), SubmitError> {
        self.submit(&FormId::from(EDIT_INSERT_FORM), request.into_form())
            .await
    }

    pub async fn delete_segment(&self, request: DeleteSegmentRequest) -> Result<(), SubmitError> {
        self.submit(&FormId::from(EDIT_DELETE_FORM), request.into_form())
            .await
    }

    pub async fn crossfade(&self, request: CrossfadeRequest) -> Result<(), SubmitError> {
        self.submit(&FormId::from(EDIT_CROSSFADE_FORM), request.into_form())
            .await
    }
}

fn multipart_payload(data: FormData) -> Result<reqwest::multipart::Form, SubmitError> {
    let mut form = reqwest::multipart::Form::new();
    for field in data.into_fields() {
        form = match field.value {
            FieldValue::Text(value) => form.text(field.name, value),
            FieldValue::File(upload) => {
                let mut part =
                    reqwest::multipart::Part::bytes(upload.bytes).file_name(upload.filename);
                if let Some(mime) = upload.mime_type {
                    part = part.mime_str(&mime).map_err(|_| EncodeError::InvalidMime {
                        field: field.name.clone(),
                        mime,
                    })?;
                }
                form.part(field.name, part)
            }
        };
    }
    Ok(form)
}

/// The seven bindings of the original page. Five of them deliberately share
/// the editing output.
pub fn default_bindings() -> Vec<FormBinding> {
    vec![
        FormBinding::json(TTS_FORM, "/api/tts", TTS_AUDIO),
        FormBinding::multipart(VC_FORM, "/api/vc", VC_AUDIO),
        FormBinding::multipart(EDIT_SPLICE_FORM, "/api/edit/splice", EDIT_AUDIO),
        FormBinding::multipart(EDIT_TRIM_FORM, "/api/edit/trim", EDIT_AUDIO),
        FormBinding::multipart(EDIT_INSERT_FORM, "/api/edit/insert", EDIT_AUDIO),
        FormBinding::multipart(EDIT_DELETE_FORM, "/api/edit/delete", EDIT_AUDIO),
        FormBinding::multipart(EDIT_CROSSFADE_FORM, "/api/edit/crossfade", EDIT_AUDIO),
    ]
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
