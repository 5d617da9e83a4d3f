//! Renders one synthetic discharge summary to a PDF without starting the server.
//!
//! Usage: `render_sample [OUTPUT_PATH]`. Uses the Mistral key from the environment
//! when present; otherwise the fallback summary text is rendered.

use anyhow::Context as _;
use discharge_summary_service::{
    Config,
    generator::PatientGenerator,
    render::{document_filename, render_document},
    summary::{MistralClient, request_summary},
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "discharge_summary_service=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let generator = PatientGenerator::new(config.load_vocabulary()?)?;
    let record = generator.generate();

    let client = MistralClient::new(
        config.mistral_api_url.clone(),
        config.mistral_api_key.clone(),
        config.mistral_model.clone(),
    );
    let outcome = request_summary(&client, &record).await;
    if outcome.is_fallback {
        info!("Rendering fallback summary text");
    }

    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| document_filename(&record));
    let pdf = render_document(&record, &outcome.text)?;
    std::fs::write(&output, &pdf).with_context(|| format!("writing {}", output))?;

    info!(
        path = %output,
        bytes = pdf.len(),
        patient = %format!("{} {}", record.patient_info.first_name, record.patient_info.last_name),
        "Discharge summary written"
    );
    println!("{}", output);

    Ok(())
}
