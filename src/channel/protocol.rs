//! JSON messages spoken over the live WebSocket.

use super::{InboundEvent, MediaChunk};
use crate::config::ChannelConfig;
use crate::log_debug;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct SetupEnvelope<'a> {
    setup: Setup<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Setup<'a> {
    model: String,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: [&'static str; 1],
    speech_config: SpeechConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoice<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoice<'a> {
    voice_name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeEnvelope {
    realtime_input: RealtimeInput,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RealtimeInput {
    media_chunks: Vec<WireBlob>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireBlob {
    #[serde(default)]
    mime_type: String,
    data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerMessage {
    setup_complete: Option<serde_json::Value>,
    server_content: Option<ServerContent>,
    go_away: Option<GoAway>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerContent {
    model_turn: Option<ModelTurn>,
}

#[derive(Debug, Default, Deserialize)]
struct ModelTurn {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<WireBlob>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoAway {
    time_left: Option<String>,
}

/// First message on a fresh connection.
pub fn setup_message(config: &ChannelConfig) -> String {
    let model = if config.model.starts_with("models/") {
        config.model.clone()
    } else {
        format!("models/{}", config.model)
    };
    let envelope = SetupEnvelope {
        setup: Setup {
            model,
            generation_config: GenerationConfig {
                response_modalities: ["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoice {
                            voice_name: &config.voice,
                        },
                    },
                },
            },
        },
    };
    serde_json::to_string(&envelope).unwrap_or_default()
}

pub fn realtime_input_message(chunk: &MediaChunk) -> String {
    let envelope = RealtimeEnvelope {
        realtime_input: RealtimeInput {
            media_chunks: vec![WireBlob {
                mime_type: chunk.mime_type(),
                data: STANDARD.encode(&chunk.bytes),
            }],
        },
    };
    serde_json::to_string(&envelope).unwrap_or_default()
}

/// Map one server message onto inbound events, audio parts in order.
/// Parts that are not audio or whose payload is not valid base64 are skipped.
pub fn parse_server_message(text: &str) -> Result<Vec<InboundEvent>, serde_json::Error> {
    let message: ServerMessage = serde_json::from_str(text)?;
    let mut events = Vec::new();
    if message.setup_complete.is_some() {
        events.push(InboundEvent::SessionOpened);
    }
    let parts = message
        .server_content
        .and_then(|content| content.model_turn)
        .map(|turn| turn.parts)
        .unwrap_or_default();
    for blob in parts.into_iter().filter_map(|part| part.inline_data) {
        if !blob.mime_type.is_empty() && !blob.mime_type.starts_with("audio/") {
            continue;
        }
        match STANDARD.decode(blob.data.as_bytes()) {
            Ok(bytes) => events.push(InboundEvent::AudioPayload(bytes)),
            Err(err) => log_debug(&format!("dropping inline audio with bad base64: {err}")),
        }
    }
    if let Some(go_away) = message.go_away {
        let reason = match go_away.time_left {
            Some(left) => format!("server going away (time left {left})"),
            None => "server going away".to_string(),
        };
        events.push(InboundEvent::SessionClosed(reason));
    }
    Ok(events)
}
