use codecam_decode::{DecodeDispatcher, DecodeError, DecodeRequest, Symbol};
use codecam_sample::PixelPayload;
use tokio_stream::StreamExt;

#[tokio::test]
async fn dispatcher_smoke() -> anyhow::Result<()> {
    // "Decoder" that reports bright frames only.
    let (dispatcher, mut responses) = DecodeDispatcher::spawn(|p: &PixelPayload| {
        let bright = p.data.iter().all(|&px| px > 200);
        Ok::<Vec<Symbol>, DecodeError>(if bright { vec!["ABC123".into()] } else { Vec::new() })
    })?;

    let mut results = Vec::new();
    for (seq, level) in [(1u64, 0u8), (2, 255)] {
        let payload = PixelPayload { width: 4, height: 4, data: vec![level; 48] };
        dispatcher.submit(DecodeRequest { seq, payload })?;
        let resp = responses.next().await.expect("response");
        results.push((resp.seq, resp.outcome?));
    }

    assert_eq!(results[0].0, 1);
    assert!(!results[0].1.is_success());
    assert_eq!(results[1].0, 2);
    assert_eq!(results[1].1.symbols, vec![Symbol::from("ABC123")]);
    Ok(())
}
