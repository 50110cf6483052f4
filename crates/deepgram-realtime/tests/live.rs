use tracing_subscriber::fmt::time::ChronoLocal;

// This is an integration test that opens a live connection to the
// transcription API. It is ignored by default so `cargo test` runs without
// a key. To run it, set DEEPGRAM_API_KEY and use `cargo test -- --ignored`.
#[tokio::test]
#[ignore]
async fn connect_send_silence_disconnect() {
    dotenvy::dotenv_override().ok();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let mut client = deepgram_realtime::connect()
        .await
        .expect("failed to connect");
    assert!(client.is_connected());

    let _events = client.server_events().expect("subscription");

    // 100ms of PCM16 silence at the default 16kHz rate.
    let silence = vec![0u8; 16_000 / 10 * 2];
    client.send_audio(silence).await.expect("send audio");

    client.disconnect().await;
    assert!(!client.is_connected());
}
