use super::protocol::{parse_server_message, realtime_input_message, setup_message};
use super::*;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

fn config_with_key(key: Option<&str>) -> ChannelConfig {
    ChannelConfig {
        api_key: key.map(str::to_string),
        ..ChannelConfig::default()
    }
}

#[test]
fn audio_chunk_mime_carries_input_rate() {
    let chunk = MediaChunk::audio(vec![0, 0], 16_000, Instant::now());
    assert_eq!(chunk.mime_type(), "audio/pcm;rate=16000");
    assert!(chunk.is_audio());
    let frame = MediaChunk::video(vec![0xff, 0xd8], Instant::now());
    assert_eq!(frame.mime_type(), "image/jpeg");
    assert!(!frame.is_audio());
}

#[test]
fn setup_message_names_model_voice_and_audio_modality() {
    let config = ChannelConfig {
        model: "test-model".to_string(),
        voice: "Puck".to_string(),
        ..ChannelConfig::default()
    };
    let value: Value = serde_json::from_str(&setup_message(&config)).unwrap();
    assert_eq!(value["setup"]["model"], "models/test-model");
    assert_eq!(
        value["setup"]["generationConfig"]["responseModalities"][0],
        "AUDIO"
    );
    assert_eq!(
        value["setup"]["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
            ["voiceName"],
        "Puck"
    );
}

#[test]
fn setup_message_keeps_existing_models_prefix() {
    let config = ChannelConfig {
        model: "models/already".to_string(),
        ..ChannelConfig::default()
    };
    let value: Value = serde_json::from_str(&setup_message(&config)).unwrap();
    assert_eq!(value["setup"]["model"], "models/already");
}

#[test]
fn realtime_input_wraps_base64_payload() {
    let chunk = MediaChunk::audio(vec![1, 2, 3, 4], 16_000, Instant::now());
    let value: Value = serde_json::from_str(&realtime_input_message(&chunk)).unwrap();
    let blob = &value["realtimeInput"]["mediaChunks"][0];
    assert_eq!(blob["mimeType"], "audio/pcm;rate=16000");
    assert_eq!(blob["data"], STANDARD.encode([1u8, 2, 3, 4]));
}

#[test]
fn setup_complete_opens_session() {
    let events = parse_server_message(r#"{"setupComplete":{}}"#).unwrap();
    assert_eq!(events, vec![InboundEvent::SessionOpened]);
}

#[test]
fn every_audio_part_becomes_a_payload_in_order() {
    let first = STANDARD.encode([1u8, 0]);
    let second = STANDARD.encode([2u8, 0]);
    let text = format!(
        r#"{{"serverContent":{{"modelTurn":{{"parts":[
            {{"inlineData":{{"mimeType":"audio/pcm;rate=24000","data":"{first}"}}}},
            {{"text":"ignored"}},
            {{"inlineData":{{"mimeType":"image/png","data":"{first}"}}}},
            {{"inlineData":{{"mimeType":"audio/pcm;rate=24000","data":"{second}"}}}}
        ]}}}}}}"#
    );
    let events = parse_server_message(&text).unwrap();
    assert_eq!(
        events,
        vec![
            InboundEvent::AudioPayload(vec![1, 0]),
            InboundEvent::AudioPayload(vec![2, 0]),
        ]
    );
}

#[test]
fn bad_base64_part_is_skipped() {
    let text = r#"{"serverContent":{"modelTurn":{"parts":[{"inlineData":{"mimeType":"audio/pcm","data":"@@@"}}]}}}"#;
    assert!(parse_server_message(text).unwrap().is_empty());
}

#[test]
fn go_away_closes_session() {
    let events = parse_server_message(r#"{"goAway":{"timeLeft":"5s"}}"#).unwrap();
    assert!(matches!(
        events.as_slice(),
        [InboundEvent::SessionClosed(reason)] if reason.contains("5s")
    ));
}

#[test]
fn unrelated_server_messages_yield_nothing() {
    assert!(parse_server_message(r#"{"serverContent":{"turnComplete":true}}"#)
        .unwrap()
        .is_empty());
    assert!(parse_server_message("not json").is_err());
}

#[test]
fn session_url_requires_key_and_ws_scheme() {
    assert_eq!(
        session_url(&config_with_key(None)),
        Err(crate::error::ChannelError::MissingApiKey)
    );
    assert_eq!(
        session_url(&config_with_key(Some("   "))),
        Err(crate::error::ChannelError::MissingApiKey)
    );
    let url = session_url(&config_with_key(Some("secret"))).unwrap();
    assert_eq!(url.scheme(), "wss");
    assert!(url.query_pairs().any(|(k, v)| k == "key" && v == "secret"));

    let http = ChannelConfig {
        endpoint: "https://example.com/live".to_string(),
        api_key: Some("secret".to_string()),
        ..ChannelConfig::default()
    };
    assert!(matches!(
        session_url(&http),
        Err(crate::error::ChannelError::InvalidEndpoint(_))
    ));
}

#[test]
fn redact_key_hides_secret() {
    assert_eq!(
        redact_key("GET wss://host/?key=abc123 failed", Some("abc123")),
        "GET wss://host/?key=*** failed"
    );
    assert_eq!(redact_key("no key here", None), "no key here");
}

#[test]
fn memory_channel_records_sends_and_delivers_events_in_order() {
    let remote = MemoryRemote::new();
    let connector = MemoryConnector::new(remote.clone());
    let mut channel = connector.open(&ChannelConfig::default()).unwrap();
    assert_eq!(remote.opens(), 1);

    channel.send(MediaChunk::audio(vec![0, 0], 16_000, Instant::now()));
    channel.send(MediaChunk::video(vec![1], Instant::now()));
    assert_eq!(remote.sent_count(true), 1);
    assert_eq!(remote.sent_count(false), 1);

    assert!(remote.push(InboundEvent::SessionOpened));
    assert!(remote.push(InboundEvent::AudioPayload(vec![1, 0])));
    assert_eq!(channel.try_recv(), Some(InboundEvent::SessionOpened));
    assert_eq!(channel.try_recv(), Some(InboundEvent::AudioPayload(vec![1, 0])));
    assert_eq!(channel.try_recv(), None);
}

#[test]
fn memory_channel_close_is_idempotent_and_stops_sends() {
    let remote = MemoryRemote::new();
    let mut channel = MemoryConnector::new(remote.clone())
        .open(&ChannelConfig::default())
        .unwrap();
    channel.close();
    channel.close();
    assert!(channel.is_closed());
    assert!(remote.is_closed());
    channel.send(MediaChunk::audio(vec![0, 0], 16_000, Instant::now()));
    assert!(remote.sent().is_empty());
}

#[test]
fn refused_memory_connect_reports_error() {
    let remote = MemoryRemote::new();
    remote.refuse_with(Some(crate::error::ChannelError::Timeout(10)));
    let result = MemoryConnector::new(remote.clone()).open(&ChannelConfig::default());
    assert!(matches!(result, Err(crate::error::ChannelError::Timeout(10))));
    assert_eq!(remote.opens(), 0);
}
