use std::time::Duration;

use folio_embed::{
    provider_from_settings, EmbedError, EmbedSettings, EmbeddingProvider, FakeEmbedder,
    OpenAiEmbedder, DEFAULT_BASE_URL,
};

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[tokio::test]
async fn fake_embedder_is_deterministic_and_normalized() -> anyhow::Result<()> {
    let embedder = FakeEmbedder::new(64);
    let a = embedder.embed("machine learning forecasts").await?;
    let b = embedder.embed("machine learning forecasts").await?;
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);

    let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-4, "vector should be unit length, norm={}", norm);
    Ok(())
}

#[tokio::test]
async fn fake_embedder_ignores_case_and_punctuation() -> anyhow::Result<()> {
    let embedder = FakeEmbedder::new(64);
    let a = embedder.embed("Machine learning?").await?;
    let b = embedder.embed("machine learning").await?;
    assert_eq!(a, b);
    Ok(())
}

#[tokio::test]
async fn fake_embedder_ranks_by_token_overlap() -> anyhow::Result<()> {
    let embedder = FakeEmbedder::new(64);
    let query = embedder.embed("Which projects use machine learning?").await?;
    let ml = embedder.embed("Foo applies machine learning to sales forecasts").await?;
    let other = embedder.embed("Bar renders static recipe pages").await?;
    assert!(
        dot(&query, &ml) > dot(&query, &other),
        "shared tokens should pull vectors together"
    );
    Ok(())
}

#[tokio::test]
async fn fake_embedder_batch_matches_single_calls() -> anyhow::Result<()> {
    let embedder = FakeEmbedder::new(32);
    let texts = vec!["alpha bravo".to_string(), "charlie delta".to_string()];
    let batch = embedder.embed_batch(&texts).await?;
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0], embedder.embed("alpha bravo").await?);
    assert_eq!(batch[1], embedder.embed("charlie delta").await?);

    let empty = embedder.embed_batch(&[]).await?;
    assert!(empty.is_empty());
    Ok(())
}

#[test]
fn openai_embedder_requires_an_api_key() {
    let err = OpenAiEmbedder::new(
        DEFAULT_BASE_URL,
        "  ",
        "text-embedding-3-large",
        3072,
        Duration::from_secs(5),
    )
    .err()
    .unwrap();
    assert!(matches!(err, EmbedError::MissingApiKey));

    let embedder = OpenAiEmbedder::new(
        "https://api.openai.com/v1/",
        "test-key",
        "text-embedding-3-large",
        3072,
        Duration::from_secs(5),
    )
    .expect("key present");
    assert_eq!(embedder.model_name(), "text-embedding-3-large");
    assert_eq!(embedder.dimensions(), 3072);
}

#[test]
fn provider_selection_honors_fake_toggle_and_missing_key() {
    let settings = EmbedSettings {
        base_url: DEFAULT_BASE_URL.to_string(),
        api_key: None,
        model: "text-embedding-3-large".to_string(),
        dimensions: 64,
        timeout: Duration::from_secs(5),
    };

    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let provider = provider_from_settings(&settings).expect("fake provider");
    assert_eq!(provider.model_name(), "fake-hash");
    assert_eq!(provider.dimensions(), 64);

    std::env::remove_var("APP_USE_FAKE_EMBEDDINGS");
    let err = provider_from_settings(&settings).err().unwrap();
    assert!(matches!(err, EmbedError::MissingApiKey));
}
